use chrono::Utc;
use tracing::instrument;

use crate::{
    dao::store::PersistenceContext,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{FinancialSummaryType, GuideIssueInputType, GuideOverviewType, GuideStatus, NewTaxGuide, PropertySummaryType, TaxGuide, ValuationPreviewType},
    },
    service::valuation,
};

/**
 * Issues the tax guide of a property for a fiscal year.
 *
 * The amount is the tax computed from the property, its constructions and the reference tables at this moment, and
 * is never recomputed afterwards.
 *
 * # Arguments
 * `context`: The persistence context.
 * `guide_issue_input`: Property id and fiscal year.
 *
 * # Returns
 * The stored guide with status `Open`. `NotFound` if the property does not exist, `Conflict` if the property already
 * has a guide for the year, `InvalidState` if the computed tax is not positive.
 */
#[instrument(skip(context), fields(result))]
pub async fn issue_guide<C: PersistenceContext>(context: &mut C, guide_issue_input: GuideIssueInputType) -> Result<TaxGuide, ApplicationError> {
    let GuideIssueInputType { property_id, fiscal_year } = guide_issue_input;
    let Some(property) = context.get_property(property_id).await? else {
        return Err(ApplicationError::new(ErrorType::NotFound, "Property not found".to_string()));
    };
    if context.find_guide(property_id, fiscal_year).await?.is_some() {
        tracing::debug!("Property {} already has a guide for {}", property_id, fiscal_year);
        return Err(ApplicationError::new(ErrorType::Conflict, format!("A guide has already been issued for {fiscal_year}")));
    }
    let references = context.get_price_references().await?;
    let valuation = valuation::try_calculate(&property, &references)?;
    if valuation.tax_amount <= 0.0 {
        return Err(ApplicationError::new(ErrorType::InvalidState, "Computed tax is zero or negative. Guide not issued".to_string()));
    }
    let guide = context.add_guide(NewTaxGuide { property_id, fiscal_year, emitted_amount: valuation.tax_amount, issued_at: Utc::now(), status: GuideStatus::Open }).await?;
    tracing::info!("Issued guide {} for property {} and year {} with amount {}", guide.id, property_id, fiscal_year, guide.emitted_amount);
    Ok(guide)
}

/**
 * Sets the payment status of a guide. Amount and year are left untouched.
 */
#[instrument(skip(context), fields(result))]
pub async fn update_guide_status<C: PersistenceContext>(context: &mut C, guide_id: i64, status: GuideStatus) -> Result<(), ApplicationError> {
    context.update_guide_status(guide_id, status).await
}

/**
 * Deletes a guide permanently.
 */
#[instrument(skip(context), fields(result))]
pub async fn delete_guide<C: PersistenceContext>(context: &mut C, guide_id: i64) -> Result<(), ApplicationError> {
    context.delete_guide(guide_id).await
}

/**
 * Guides of a property, latest fiscal year first. Empty for an unknown property.
 */
#[instrument(skip(context), fields(result))]
pub async fn list_guides_by_property<C: PersistenceContext>(context: &mut C, property_id: i64) -> Result<Vec<TaxGuide>, ApplicationError> {
    context.list_guides_by_property(property_id).await
}

/**
 * All guides with owner identification, newest guide first.
 */
#[instrument(skip(context), fields(result))]
pub async fn list_guides<C: PersistenceContext>(context: &mut C) -> Result<Vec<GuideOverviewType>, ApplicationError> {
    context.list_guides().await
}

/**
 * Sums guide amounts into collected (paid) and outstanding (open).
 */
#[instrument(skip(context), fields(result))]
pub async fn get_financial_summary<C: PersistenceContext>(context: &mut C) -> Result<FinancialSummaryType, ApplicationError> {
    let collected = context.sum_emitted_amount(GuideStatus::Paid).await?;
    let outstanding = context.sum_emitted_amount(GuideStatus::Open).await?;
    Ok(FinancialSummaryType { collected, outstanding })
}

/**
 * Identification of the property with the registration number.
 */
#[instrument(skip(context), fields(result))]
pub async fn find_property<C: PersistenceContext>(context: &mut C, registration_number: &str) -> Result<PropertySummaryType, ApplicationError> {
    let Some(property) = context.get_property_by_registration(registration_number).await? else {
        return Err(ApplicationError::new(ErrorType::NotFound, "Registration number not found".to_string()));
    };
    Ok(PropertySummaryType::from(&property))
}

/**
 * Current valuation of the property with the registration number, without issuing anything.
 */
#[instrument(skip(context), fields(result))]
pub async fn preview_valuation<C: PersistenceContext>(context: &mut C, registration_number: &str) -> Result<ValuationPreviewType, ApplicationError> {
    let Some(property) = context.get_property_by_registration(registration_number).await? else {
        return Err(ApplicationError::new(ErrorType::NotFound, "Registration number not found".to_string()));
    };
    let references = context.get_price_references().await?;
    let valuation = valuation::calculate(&property, &references);
    Ok(ValuationPreviewType { property: PropertySummaryType::from(&property), reurb_type: property.reurb_type(), valuation })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dao::memory::MemoryStore,
        model::models::{PriceReferences, ReurbType},
        service::valuation::test::{construction, property, references},
    };

    fn store() -> MemoryStore {
        MemoryStore::new(
            vec![
                property(1, Some("Rua das Flores"), Some(100.0), vec![construction(1, Some(80.0), Some("Popular"), Some("Residencial"))]),
                property(2, Some("Rua Inexistente"), Some(100.0), vec![]),
                property(3, Some("Avenida Brasil"), Some(10.0), vec![construction(2, Some(10.0), Some("Alto"), Some("Comercial"))]),
            ],
            references(),
        )
    }

    fn issue_input(property_id: i64, fiscal_year: i32) -> GuideIssueInputType {
        GuideIssueInputType { property_id, fiscal_year }
    }

    #[actix_web::test]
    async fn test_issue_guide() {
        let mut store = store();
        let guide = issue_guide(&mut store, issue_input(1, 2024)).await.unwrap();
        assert_eq!(guide.property_id, 1);
        assert_eq!(guide.fiscal_year, 2024);
        assert_eq!(guide.emitted_amount, 74.0);
        assert_eq!(guide.status, GuideStatus::Open);
        assert_eq!(store.guides.len(), 1);
    }

    #[actix_web::test]
    async fn test_issue_guide_twice_conflicts() {
        let mut store = store();
        issue_guide(&mut store, issue_input(1, 2024)).await.unwrap();
        let second = issue_guide(&mut store, issue_input(1, 2024)).await;
        assert_eq!(second.unwrap_err().error_type, ErrorType::Conflict);
        assert_eq!(store.guides.len(), 1);
        assert!(issue_guide(&mut store, issue_input(1, 2025)).await.is_ok());
        assert_eq!(store.guides.len(), 2);
    }

    #[actix_web::test]
    async fn test_issue_guide_unknown_property() {
        let mut store = store();
        let result = issue_guide(&mut store, issue_input(99, 2024)).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
        assert!(store.guides.is_empty());
    }

    #[actix_web::test]
    async fn test_issue_guide_nothing_to_bill() {
        let mut store = store();
        let result = issue_guide(&mut store, issue_input(2, 2024)).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::InvalidState);
        assert!(store.guides.is_empty());
    }

    #[actix_web::test]
    async fn test_issue_guide_corrupted_data() {
        let mut store = store();
        store.properties.push(property(4, Some("Rua das Flores"), Some(f64::INFINITY), vec![construction(3, Some(10.0), Some("Alto"), Some("Residencial"))]));
        let result = issue_guide(&mut store, issue_input(4, 2024)).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::Valuation);
        assert!(store.guides.is_empty());
    }

    #[actix_web::test]
    async fn test_issued_amount_is_a_snapshot() {
        let mut store = store();
        let guide = issue_guide(&mut store, issue_input(1, 2024)).await.unwrap();
        store.references = PriceReferences::new(vec![("Popular".to_string(), 1000.0)], vec![], vec![("Residencial".to_string(), 0.5)]);
        store.properties[0].constructions.clear();
        let guides = list_guides_by_property(&mut store, 1).await.unwrap();
        assert_eq!(guides, vec![guide]);
        assert_eq!(guides[0].emitted_amount, 74.0);
    }

    #[actix_web::test]
    async fn test_update_status_moves_amount_between_totals() {
        let mut store = store();
        let guide = issue_guide(&mut store, issue_input(1, 2024)).await.unwrap();
        let before = get_financial_summary(&mut store).await.unwrap();
        assert_eq!(before, FinancialSummaryType { collected: 0.0, outstanding: 74.0 });
        update_guide_status(&mut store, guide.id, GuideStatus::Paid).await.unwrap();
        let after = get_financial_summary(&mut store).await.unwrap();
        assert_eq!(after.outstanding, before.outstanding - 74.0);
        assert_eq!(after.collected, before.collected + 74.0);
        let stored = &store.guides[0];
        assert_eq!(stored.emitted_amount, 74.0);
        assert_eq!(stored.fiscal_year, 2024);
    }

    #[actix_web::test]
    async fn test_update_status_unknown_guide() {
        let mut store = store();
        let result = update_guide_status(&mut store, 42, GuideStatus::Paid).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
    }

    #[actix_web::test]
    async fn test_financial_summary_empty() {
        let mut store = store();
        assert_eq!(get_financial_summary(&mut store).await.unwrap(), FinancialSummaryType { collected: 0.0, outstanding: 0.0 });
    }

    #[actix_web::test]
    async fn test_financial_summary_covers_all_guides() {
        let mut store = store();
        let first = issue_guide(&mut store, issue_input(1, 2023)).await.unwrap();
        issue_guide(&mut store, issue_input(1, 2024)).await.unwrap();
        issue_guide(&mut store, issue_input(3, 2024)).await.unwrap();
        update_guide_status(&mut store, first.id, GuideStatus::Paid).await.unwrap();
        let summary = get_financial_summary(&mut store).await.unwrap();
        let total: f64 = store.guides.iter().map(|guide| guide.emitted_amount).sum();
        assert!((summary.collected + summary.outstanding - total).abs() < 1e-9);
        assert_eq!(summary.collected, 74.0);
    }

    #[actix_web::test]
    async fn test_list_ordering() {
        let mut store = store();
        issue_guide(&mut store, issue_input(1, 2023)).await.unwrap();
        issue_guide(&mut store, issue_input(3, 2024)).await.unwrap();
        issue_guide(&mut store, issue_input(1, 2025)).await.unwrap();
        let by_property: Vec<i32> = list_guides_by_property(&mut store, 1).await.unwrap().iter().map(|guide| guide.fiscal_year).collect();
        assert_eq!(by_property, vec![2025, 2023]);
        let all = list_guides(&mut store).await.unwrap();
        let ids: Vec<i64> = all.iter().map(|element| element.guide.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(all[1].registration_number.as_deref(), Some("01.02.0003"));
        assert_eq!(all[1].owner_name.as_deref(), Some("Maria da Silva"));
        assert!(list_guides_by_property(&mut store, 2).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_delete_guide() {
        let mut store = store();
        let guide = issue_guide(&mut store, issue_input(1, 2024)).await.unwrap();
        delete_guide(&mut store, guide.id).await.unwrap();
        assert!(store.guides.is_empty());
        assert_eq!(delete_guide(&mut store, guide.id).await.unwrap_err().error_type, ErrorType::NotFound);
        assert!(issue_guide(&mut store, issue_input(1, 2024)).await.is_ok());
    }

    #[actix_web::test]
    async fn test_find_property() {
        let mut store = store();
        let summary = find_property(&mut store, "01.02.0001").await.unwrap();
        assert_eq!(summary.id, 1);
        assert_eq!(summary.owner_document.as_deref(), Some("123.456.789-00"));
        assert_eq!(find_property(&mut store, "99.99.9999").await.unwrap_err().error_type, ErrorType::NotFound);
    }

    #[actix_web::test]
    async fn test_preview_valuation() {
        let mut store = store();
        let preview = preview_valuation(&mut store, "01.02.0001").await.unwrap();
        assert_eq!(preview.property.id, 1);
        assert_eq!(preview.reurb_type, ReurbType::Social);
        assert_eq!(preview.valuation.tax_amount, 74.0);
        assert!(store.guides.is_empty());
        assert_eq!(preview_valuation(&mut store, "99.99.9999").await.unwrap_err().error_type, ErrorType::NotFound);
    }
}
