use std::borrow::Cow;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{Instrument, instrument};

use crate::{
    dao::store::{GuideStore, PropertyStore, ReferenceStore},
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{ConstructionRecord, GuideOverviewType, GuideStatus, NewTaxGuide, PriceReferences, PropertyRecord, ReferenceAddInputType, ReferenceEntryType, ReferenceKind, TaxGuide},
    },
};

/**
 * Database response type for querying a property.
 */
pub type QueryPropertyDbResp = (i64, Option<String>, Option<String>, Option<String>, Option<String>, Option<f64>, Option<f64>, Option<String>);

/**
 * Database response type for querying the constructions of a property.
 */
pub type QueryConstructionDbResp = (i64, String, Option<f64>, Option<String>, Option<String>);

/**
 * Database response type for querying a reference table.
 */
pub type QueryReferenceDbResp = (i64, String, f64);

/**
 * Database response type for querying guides.
 */
pub type QueryGuideDbResp = (i64, i64, i32, f64, DateTime<Utc>, String);

/**
 * Database response type for querying guides joined with the owner of the property.
 */
pub type QueryGuideOverviewDbResp = (i64, i64, i32, f64, DateTime<Utc>, String, Option<String>, Option<String>, Option<String>);

/**
 * SQL query to retrieve a property by id.
 */
const QUERY_PROPERTY: &str = "SELECT id, owner_name, owner_document, registration_number, street, total_area, family_income, owns_other_property FROM property_registration WHERE id = $1";

/**
 * SQL query to retrieve a property by registration number.
 */
const QUERY_PROPERTY_BY_REGISTRATION: &str =
    "SELECT id, owner_name, owner_document, registration_number, street, total_area, family_income, owns_other_property FROM property_registration WHERE registration_number = $1 ORDER BY id LIMIT 1";

/**
 * SQL query to retrieve the constructions of a property in stored order.
 */
const QUERY_CONSTRUCTIONS: &str = "SELECT id, name, built_area, primary_use, construction_standard FROM construction WHERE property_id = $1 ORDER BY id";

const QUERY_CONSTRUCTION_STANDARDS: &str = "SELECT id, description, price_per_area FROM construction_standard ORDER BY id";
const QUERY_STREET_VALUES: &str = "SELECT id, street, price_per_area FROM street_value ORDER BY id";
const QUERY_TAX_RATES: &str = "SELECT id, use_type, rate FROM tax_rate ORDER BY id";

const ADD_CONSTRUCTION_STANDARD: &str = "INSERT INTO construction_standard (description, price_per_area) VALUES ($1, $2) RETURNING id";
const ADD_STREET_VALUE: &str = "INSERT INTO street_value (street, price_per_area) VALUES ($1, $2) RETURNING id";
const ADD_TAX_RATE: &str = "INSERT INTO tax_rate (use_type, rate) VALUES ($1, $2) RETURNING id";

const DELETE_CONSTRUCTION_STANDARD: &str = "DELETE FROM construction_standard WHERE id = $1";
const DELETE_STREET_VALUE: &str = "DELETE FROM street_value WHERE id = $1";
const DELETE_TAX_RATE: &str = "DELETE FROM tax_rate WHERE id = $1";

/**
 * SQL query to find the guide of a property for a fiscal year.
 */
const QUERY_GUIDE_BY_PROPERTY_AND_YEAR: &str = "SELECT id, property_id, fiscal_year, emitted_amount, issued_at, status FROM tax_guide WHERE property_id = $1 AND fiscal_year = $2";

/**
 * SQL query to retrieve the guides of a property.
 */
const QUERY_GUIDES_BY_PROPERTY: &str = "SELECT id, property_id, fiscal_year, emitted_amount, issued_at, status FROM tax_guide WHERE property_id = $1 ORDER BY fiscal_year DESC";

/**
 * SQL query to retrieve all guides with the owner of the property.
 */
const QUERY_GUIDES: &str = "SELECT g.id, g.property_id, g.fiscal_year, g.emitted_amount, g.issued_at, g.status, p.owner_name, p.owner_document, p.registration_number
                            FROM tax_guide g, property_registration p
                            WHERE g.property_id = p.id
                            ORDER BY g.id DESC";

/**
* SQL query next guide id.
*/
const NEXT_GUIDE_ID: &str = "SELECT nextval('tax_guide_id_seq')";

const ADD_GUIDE: &str = "INSERT INTO tax_guide (id, property_id, fiscal_year, emitted_amount, issued_at, status) VALUES ($1, $2, $3, $4, $5, $6)";

const UPDATE_GUIDE_STATUS: &str = "UPDATE tax_guide SET status = $1 WHERE id = $2";

const DELETE_GUIDE: &str = "DELETE FROM tax_guide WHERE id = $1";

/**
 * SQL query summing guide amounts by status.
 */
const SUM_EMITTED_AMOUNT: &str = "SELECT COALESCE(SUM(emitted_amount), 0)::float8 FROM tax_guide WHERE status = $1";

/**
 * Store backed by one PostgreSQL connection, either pooled or inside a transaction.
 */
pub struct PgStore<'c> {
    connection: &'c mut PgConnection,
}

impl<'c> PgStore<'c> {
    /**
     * Creates a new instance of `PgStore`.
     *
     * # Arguments
     * `connection`: The connection or transaction to execute queries on.
     */
    pub fn new(connection: &'c mut PgConnection) -> Self {
        PgStore { connection }
    }

    /**
     * Loads the constructions of a property and assembles the record.
     */
    async fn with_constructions(&mut self, row: QueryPropertyDbResp) -> Result<PropertyRecord, ApplicationError> {
        let span = tracing::Span::current();
        let constructions: Vec<QueryConstructionDbResp> = sqlx::query_as(QUERY_CONSTRUCTIONS)
            .bind(row.0)
            .fetch_all(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get constructions: {err}")))?;
        let (id, owner_name, owner_document, registration_number, street, total_area, family_income, owns_other_property) = row;
        Ok(PropertyRecord {
            id,
            owner_name,
            owner_document,
            registration_number,
            street,
            total_area,
            family_income,
            owns_other_property,
            constructions: constructions.into_iter().map(ConstructionRecord::from).collect(),
        })
    }

    async fn get_reference_rows(&mut self, query: &'static str) -> Result<Vec<QueryReferenceDbResp>, ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query_as(query)
            .fetch_all(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get reference values: {err}")))
    }

    /**
     * Retrieves all entries of a reference table.
     *
     * # Arguments
     * `kind`: The reference table.
     *
     * # Returns
     * The entries ordered by id.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn list_reference_entries(&mut self, kind: ReferenceKind) -> Result<Vec<ReferenceEntryType>, ApplicationError> {
        let (query, _, _) = Self::reference_queries(kind);
        let rows = self.get_reference_rows(query).await?;
        Ok(rows.into_iter().map(|(id, key, value)| ReferenceEntryType { id, key, value }).collect())
    }

    /**
     * Adds an entry to a reference table.
     *
     * # Arguments
     * `reference_add_input`: The validated entry.
     *
     * # Returns
     * The id of the new entry.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn add_reference_entry(&mut self, reference_add_input: ReferenceAddInputType) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let (_, query, _) = Self::reference_queries(reference_add_input.kind);
        let id: (i64,) = sqlx::query_as(query)
            .bind(reference_add_input.key)
            .bind(reference_add_input.value)
            .fetch_one(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        Ok(id.0)
    }

    /**
     * Deletes an entry from a reference table.
     *
     * # Arguments
     * `kind`: The reference table.
     * `entry_id`: The id of the entry.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn delete_reference_entry(&mut self, kind: ReferenceKind, entry_id: i64) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let (_, _, query) = Self::reference_queries(kind);
        let result = sqlx::query(query)
            .bind(entry_id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to delete reference entry: {err}")))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Reference entry with ID {} not found for deletion", entry_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Reference entry not found".to_string()));
        }
        if result.rows_affected() > 1 {
            tracing::warn!("Multiple reference entries attempted deleted. Rolled back");
            return Err(ApplicationError::new(ErrorType::Application, "Multiple reference entries attempted deleted. Rolled back".to_string()));
        }
        Ok(())
    }

    /**
     * List, insert and delete statements of a reference table.
     */
    fn reference_queries(kind: ReferenceKind) -> (&'static str, &'static str, &'static str) {
        match kind {
            ReferenceKind::ConstructionStandard => (QUERY_CONSTRUCTION_STANDARDS, ADD_CONSTRUCTION_STANDARD, DELETE_CONSTRUCTION_STANDARD),
            ReferenceKind::Street => (QUERY_STREET_VALUES, ADD_STREET_VALUE, DELETE_STREET_VALUE),
            ReferenceKind::TaxRate => (QUERY_TAX_RATES, ADD_TAX_RATE, DELETE_TAX_RATE),
        }
    }

    /**
     * Handles database errors and maps them to application errors.
     *
     * # Arguments
     * `error`: The database error to handle.
     *
     * # Returns
     * An `ApplicationError` corresponding to the database error.
     */
    fn handle_database_error(error: Option<&dyn sqlx::error::DatabaseError>) -> ApplicationError {
        if let Some(db_error) = error {
            tracing::debug!("Database error: {}", db_error);
            tracing::info!("Add/Update error: {:?}", db_error.code());
            if db_error.code() == Some(Cow::Borrowed("23505")) {
                // Unique violation
                return ApplicationError::new(ErrorType::Conflict, "Already exists".to_string());
            } else if db_error.code() == Some(Cow::Borrowed("23503")) {
                // Foreign key violation
                return ApplicationError::new(ErrorType::InvalidArgument, "Missing parent value".to_string());
            } else if db_error.code() == Some(Cow::Borrowed("22001")) {
                // Value too long
                return ApplicationError::new(ErrorType::InvalidArgument, "Value too long".to_string());
            }
            tracing::error!("Unhandled database error: {}", db_error);
            return ApplicationError::new(ErrorType::DatabaseError, "Unhandled database error".to_string());
        }
        ApplicationError::new(ErrorType::DatabaseError, "Failed to execute database operation".to_string())
    }
}

impl From<QueryConstructionDbResp> for ConstructionRecord {
    fn from((id, name, built_area, primary_use, construction_standard): QueryConstructionDbResp) -> Self {
        ConstructionRecord { id, name, built_area, primary_use, construction_standard }
    }
}

impl TryFrom<QueryGuideDbResp> for TaxGuide {
    type Error = ApplicationError;

    fn try_from((id, property_id, fiscal_year, emitted_amount, issued_at, status): QueryGuideDbResp) -> Result<Self, Self::Error> {
        let status = GuideStatus::from_str(&status).map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Stored guide {id} has unknown status: {err}")))?;
        Ok(TaxGuide { id, property_id, fiscal_year, emitted_amount, issued_at, status })
    }
}

impl TryFrom<QueryGuideOverviewDbResp> for GuideOverviewType {
    type Error = ApplicationError;

    fn try_from(row: QueryGuideOverviewDbResp) -> Result<Self, Self::Error> {
        let (id, property_id, fiscal_year, emitted_amount, issued_at, status, owner_name, owner_document, registration_number) = row;
        let guide = TaxGuide::try_from((id, property_id, fiscal_year, emitted_amount, issued_at, status))?;
        Ok(GuideOverviewType { guide, owner_name, owner_document, registration_number })
    }
}

#[async_trait]
impl<'c> PropertyStore for PgStore<'c> {
    #[instrument(skip(self), fields(result))]
    async fn get_property(&mut self, property_id: i64) -> Result<Option<PropertyRecord>, ApplicationError> {
        let span = tracing::Span::current();
        let row: Option<QueryPropertyDbResp> = sqlx::query_as(QUERY_PROPERTY)
            .bind(property_id)
            .fetch_optional(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get property: {err}")))?;
        match row {
            Some(row) => Ok(Some(self.with_constructions(row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(result))]
    async fn get_property_by_registration(&mut self, registration_number: &str) -> Result<Option<PropertyRecord>, ApplicationError> {
        let span = tracing::Span::current();
        let row: Option<QueryPropertyDbResp> = sqlx::query_as(QUERY_PROPERTY_BY_REGISTRATION)
            .bind(registration_number)
            .fetch_optional(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get property by registration: {err}")))?;
        match row {
            Some(row) => Ok(Some(self.with_constructions(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<'c> ReferenceStore for PgStore<'c> {
    #[instrument(skip(self), fields(result))]
    async fn get_price_references(&mut self) -> Result<PriceReferences, ApplicationError> {
        let to_pairs = |rows: Vec<QueryReferenceDbResp>| rows.into_iter().map(|(_, key, value)| (key, value)).collect::<Vec<_>>();
        let construction_standards = to_pairs(self.get_reference_rows(QUERY_CONSTRUCTION_STANDARDS).await?);
        let streets = to_pairs(self.get_reference_rows(QUERY_STREET_VALUES).await?);
        let tax_rates = to_pairs(self.get_reference_rows(QUERY_TAX_RATES).await?);
        Ok(PriceReferences::new(construction_standards, streets, tax_rates))
    }
}

#[async_trait]
impl<'c> GuideStore for PgStore<'c> {
    #[instrument(skip(self), fields(result))]
    async fn find_guide(&mut self, property_id: i64, fiscal_year: i32) -> Result<Option<TaxGuide>, ApplicationError> {
        let span = tracing::Span::current();
        let row: Option<QueryGuideDbResp> = sqlx::query_as(QUERY_GUIDE_BY_PROPERTY_AND_YEAR)
            .bind(property_id)
            .bind(fiscal_year)
            .fetch_optional(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to find guide: {err}")))?;
        row.map(TaxGuide::try_from).transpose()
    }

    #[instrument(skip(self), fields(result))]
    async fn add_guide(&mut self, guide: NewTaxGuide) -> Result<TaxGuide, ApplicationError> {
        let span = tracing::Span::current();
        let next_id: (i64,) = sqlx::query_as(NEXT_GUIDE_ID)
            .fetch_one(&mut *self.connection)
            .instrument(span.clone())
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        sqlx::query(ADD_GUIDE)
            .bind(next_id.0)
            .bind(guide.property_id)
            .bind(guide.fiscal_year)
            .bind(guide.emitted_amount)
            .bind(guide.issued_at)
            .bind(guide.status.as_str())
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        Ok(TaxGuide { id: next_id.0, property_id: guide.property_id, fiscal_year: guide.fiscal_year, emitted_amount: guide.emitted_amount, issued_at: guide.issued_at, status: guide.status })
    }

    #[instrument(skip(self), fields(result))]
    async fn update_guide_status(&mut self, guide_id: i64, status: GuideStatus) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(UPDATE_GUIDE_STATUS)
            .bind(status.as_str())
            .bind(guide_id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Guide with id {} not found for update", guide_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Guide not found".to_string()));
        }
        if result.rows_affected() > 1 {
            tracing::warn!("Multiple guides attempted updated. Rolled back");
            return Err(ApplicationError::new(ErrorType::Application, "Multiple guides attempted updated. Rolled back".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(result))]
    async fn delete_guide(&mut self, guide_id: i64) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_GUIDE)
            .bind(guide_id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to delete guide: {err}")))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Guide with ID {} not found for deletion", guide_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Guide not found".to_string()));
        }
        if result.rows_affected() > 1 {
            tracing::warn!("Multiple guides attempted deleted. Rolled back");
            return Err(ApplicationError::new(ErrorType::Application, "Multiple guides attempted deleted. Rolled back".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(result))]
    async fn list_guides_by_property(&mut self, property_id: i64) -> Result<Vec<TaxGuide>, ApplicationError> {
        let span = tracing::Span::current();
        let rows: Vec<QueryGuideDbResp> = sqlx::query_as(QUERY_GUIDES_BY_PROPERTY)
            .bind(property_id)
            .fetch_all(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get guides of property: {err}")))?;
        rows.into_iter().map(TaxGuide::try_from).collect()
    }

    #[instrument(skip(self), fields(result))]
    async fn list_guides(&mut self) -> Result<Vec<GuideOverviewType>, ApplicationError> {
        let span = tracing::Span::current();
        let rows: Vec<QueryGuideOverviewDbResp> = sqlx::query_as(QUERY_GUIDES)
            .fetch_all(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get guides: {err}")))?;
        rows.into_iter().map(GuideOverviewType::try_from).collect()
    }

    #[instrument(skip(self), fields(result))]
    async fn sum_emitted_amount(&mut self, status: GuideStatus) -> Result<f64, ApplicationError> {
        let span = tracing::Span::current();
        let sum: (f64,) = sqlx::query_as(SUM_EMITTED_AMOUNT)
            .bind(status.as_str())
            .fetch_one(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to sum guide amounts: {err}")))?;
        Ok(sum.0)
    }
}


#[cfg(feature = "integration-test")]
#[cfg(test)]
mod integration_test {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_add_list_then_delete_reference_entry() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let mut store = PgStore::new(&mut *transaction);
        let input = ReferenceAddInputType { kind: ReferenceKind::Street, key: "Rua de Teste".to_string(), value: 50.0 };
        let id = store.add_reference_entry(input.clone()).await.unwrap();
        let entries = store.list_reference_entries(ReferenceKind::Street).await.unwrap();
        assert!(entries.iter().any(|entry| entry.id == id && entry.key == "Rua de Teste"));
        let references = store.get_price_references().await.unwrap();
        assert_eq!(references.street_price("Rua de Teste"), Some(50.0));
        let duplicate = store.add_reference_entry(input).await;
        assert_eq!(duplicate.unwrap_err().error_type, ErrorType::Conflict);
        drop(store);
        transaction.rollback().await.unwrap(); // Rollback the transaction to avoid leaving test data in the database
    }

    #[sqlx::test]
    async fn test_add_update_then_delete_guide() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let property_id: (i64,) = sqlx::query_as("INSERT INTO property_registration (owner_name, registration_number, street, total_area) VALUES ('Maria', 'T-0001', 'Rua de Teste', 100) RETURNING id")
            .fetch_one(&mut *transaction)
            .await
            .unwrap();
        let mut store = PgStore::new(&mut *transaction);
        let property = store.get_property(property_id.0).await.unwrap().unwrap();
        assert_eq!(property.registration_number.as_deref(), Some("T-0001"));
        assert!(property.constructions.is_empty());

        let new_guide = NewTaxGuide { property_id: property_id.0, fiscal_year: 2024, emitted_amount: 74.0, issued_at: Utc::now(), status: GuideStatus::Open };
        store.add_guide(new_guide.clone()).await.unwrap();
        assert!(store.find_guide(property_id.0, 2024).await.unwrap().is_some());
        let duplicate = store.add_guide(new_guide).await;
        assert_eq!(duplicate.unwrap_err().error_type, ErrorType::Conflict);
        drop(store);
        transaction.rollback().await.unwrap();

        let mut transaction = pool.begin().await.unwrap();
        let property_id: (i64,) = sqlx::query_as("INSERT INTO property_registration (owner_name, registration_number) VALUES ('Maria', 'T-0002') RETURNING id")
            .fetch_one(&mut *transaction)
            .await
            .unwrap();
        let mut store = PgStore::new(&mut *transaction);
        let guide = store.add_guide(NewTaxGuide { property_id: property_id.0, fiscal_year: 2025, emitted_amount: 74.0, issued_at: Utc::now(), status: GuideStatus::Open }).await.unwrap();
        store.update_guide_status(guide.id, GuideStatus::Paid).await.unwrap();
        let guides = store.list_guides_by_property(property_id.0).await.unwrap();
        assert_eq!(guides.first().map(|guide| guide.status), Some(GuideStatus::Paid));
        let overview = store.list_guides().await.unwrap();
        assert!(overview.iter().any(|element| element.guide.id == guide.id && element.registration_number.as_deref() == Some("T-0002")));
        assert!(store.sum_emitted_amount(GuideStatus::Paid).await.unwrap() >= 74.0);
        store.delete_guide(guide.id).await.unwrap();
        assert_eq!(store.delete_guide(guide.id).await.unwrap_err().error_type, ErrorType::NotFound);
        drop(store);
        transaction.rollback().await.unwrap();
    }

    /**
     * Initialize the database connection pool.
     */
    async fn init_db() -> PgPool {
        dotenv::from_filename("./sqlx-postgresql-migration/.env-test").ok();
        let pool = PgPool::connect(dotenv::var("DATABASE_URL").unwrap().as_str()).await.unwrap();
        sqlx::migrate!("./sqlx-postgresql-migration/migrations").run(&pool).await.unwrap();
        pool
    }
}
