use sqlx::{Pool, Postgres, Transaction, pool::PoolConnection};

use crate::{
    dao::postgres::PgStore,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{
            FinancialSummaryType, GuideIssueInputType, GuideOverviewType, GuideStatus, PropertySummaryType, ReferenceAddInputType, ReferenceEntryType, ReferenceKind, TaxGuide, ValuationPreviewType,
        },
    },
    service::guides,
};

/**
 * Represents the service for issuing and managing tax guides and their reference data.
 */
pub struct TaxationService {
    /**
     * Optional connection pool for database operations. Optional for test purposes until we have a better way to mock the database.
     */
    connection_pool: Option<Pool<Postgres>>,
}

impl TaxationService {
    /**
     * Creates a new instance of `TaxationService`.
     *
     * # Arguments
     * `connection_pool`: Optional connection pool for database operations.
     *
     * # Returns
     * A new instance of `TaxationService`.
     */
    pub fn new(connection_pool: Option<Pool<Postgres>>) -> Self {
        TaxationService { connection_pool }
    }

    /**
     * Issues a guide for a property and fiscal year.
     *
     * # Arguments
     * `guide_issue_input`: Property id and fiscal year.
     *
     * # Returns
     * The issued guide or an `ApplicationError`.
     */
    pub async fn issue_guide(&self, guide_issue_input: GuideIssueInputType) -> Result<TaxGuide, ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = guides::issue_guide(&mut PgStore::new(&mut transaction), guide_issue_input).await;
        Self::finish(transaction, result).await
    }

    /**
     * Updates the payment status of a guide.
     *
     * # Arguments
     * `guide_id`: The ID of the guide.
     * `status`: The new status.
     *
     * # Returns
     * A Result indicating success or an `ApplicationError`.
     */
    pub async fn update_guide_status(&self, guide_id: i64, status: GuideStatus) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = guides::update_guide_status(&mut PgStore::new(&mut transaction), guide_id, status).await;
        Self::finish(transaction, result).await
    }

    /**
     * Deletes a guide by its ID.
     *
     * # Arguments
     * `guide_id`: The ID of the guide to be deleted.
     *
     * # Returns
     * A Result indicating success or an `ApplicationError`.
     */
    pub async fn delete_guide(&self, guide_id: i64) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = guides::delete_guide(&mut PgStore::new(&mut transaction), guide_id).await;
        Self::finish(transaction, result).await
    }

    /**
     * Retrieves the guides of a property.
     */
    pub async fn list_guides_by_property(&self, property_id: i64) -> Result<Vec<TaxGuide>, ApplicationError> {
        let mut connection = self.acquire().await?;
        guides::list_guides_by_property(&mut PgStore::new(&mut connection), property_id).await
    }

    /**
     * Retrieves all guides with owner identification.
     */
    pub async fn list_guides(&self) -> Result<Vec<GuideOverviewType>, ApplicationError> {
        let mut connection = self.acquire().await?;
        guides::list_guides(&mut PgStore::new(&mut connection)).await
    }

    /**
     * Retrieves the collected and outstanding totals.
     */
    pub async fn get_financial_summary(&self) -> Result<FinancialSummaryType, ApplicationError> {
        let mut connection = self.acquire().await?;
        guides::get_financial_summary(&mut PgStore::new(&mut connection)).await
    }

    /**
     * Looks up a property by registration number.
     */
    pub async fn find_property(&self, registration_number: &str) -> Result<PropertySummaryType, ApplicationError> {
        let mut connection = self.acquire().await?;
        guides::find_property(&mut PgStore::new(&mut connection), registration_number).await
    }

    /**
     * Computes the current valuation of a property by registration number.
     */
    pub async fn preview_valuation(&self, registration_number: &str) -> Result<ValuationPreviewType, ApplicationError> {
        let mut connection = self.acquire().await?;
        guides::preview_valuation(&mut PgStore::new(&mut connection), registration_number).await
    }

    /**
     * Retrieves the entries of a reference table.
     */
    pub async fn list_reference_entries(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntryType>, ApplicationError> {
        let mut connection = self.acquire().await?;
        PgStore::new(&mut connection).list_reference_entries(kind).await
    }

    /**
     * Adds an entry to a reference table.
     *
     * # Arguments
     * `reference_add_input`: The validated entry.
     *
     * # Returns
     * The id of the new entry or an `ApplicationError`.
     */
    pub async fn add_reference_entry(&self, reference_add_input: ReferenceAddInputType) -> Result<i64, ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = PgStore::new(&mut transaction).add_reference_entry(reference_add_input).await;
        Self::finish(transaction, result).await
    }

    /**
     * Deletes an entry from a reference table.
     */
    pub async fn delete_reference_entry(&self, kind: ReferenceKind, entry_id: i64) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = PgStore::new(&mut transaction).delete_reference_entry(kind, entry_id).await;
        Self::finish(transaction, result).await
    }

    fn connection_pool(&self) -> Result<&Pool<Postgres>, ApplicationError> {
        self.connection_pool.as_ref().ok_or_else(|| ApplicationError::new(ErrorType::DatabaseError, "No database connection available".to_string()))
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, ApplicationError> {
        self.connection_pool()?.acquire().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to acquire connection: {err}")))
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, ApplicationError> {
        self.connection_pool()?.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))
    }

    /**
     * Commits the transaction if the operation succeeded, otherwise rolls it back.
     *
     * # Arguments
     * `transaction`: The open transaction.
     * `result`: The result of the operation executed within the transaction.
     *
     * # Returns
     * The result of the operation, or the commit/rollback failure.
     */
    async fn finish<T>(transaction: Transaction<'static, Postgres>, result: Result<T, ApplicationError>) -> Result<T, ApplicationError> {
        match result {
            Ok(value) => {
                transaction.commit().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to commit transaction: {err}")))?;
                Ok(value)
            }
            Err(err) => {
                transaction.rollback().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to rollback transaction: {err}")))?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[actix_web::test]
    async fn test_operations_without_pool() {
        let service = TaxationService::new(None);
        assert_eq!(service.list_guides().await.unwrap_err().error_type, ErrorType::DatabaseError);
        assert_eq!(service.issue_guide(GuideIssueInputType { property_id: 1, fiscal_year: 2024 }).await.unwrap_err().error_type, ErrorType::DatabaseError);
    }
}
