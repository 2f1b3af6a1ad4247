use async_trait::async_trait;

use crate::{
    dao::store::{GuideStore, PropertyStore, ReferenceStore},
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{GuideOverviewType, GuideStatus, NewTaxGuide, PriceReferences, PropertyRecord, TaxGuide},
    },
};

/**
 * Store keeping everything in vectors. Mirrors the uniqueness of (property, fiscal year) enforced by the database.
 */
pub struct MemoryStore {
    pub properties: Vec<PropertyRecord>,
    pub references: PriceReferences,
    pub guides: Vec<TaxGuide>,
    next_guide_id: i64,
}

impl MemoryStore {
    pub fn new(properties: Vec<PropertyRecord>, references: PriceReferences) -> Self {
        MemoryStore { properties, references, guides: vec![], next_guide_id: 1 }
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn get_property(&mut self, property_id: i64) -> Result<Option<PropertyRecord>, ApplicationError> {
        Ok(self.properties.iter().find(|property| property.id == property_id).cloned())
    }

    async fn get_property_by_registration(&mut self, registration_number: &str) -> Result<Option<PropertyRecord>, ApplicationError> {
        Ok(self.properties.iter().find(|property| property.registration_number.as_deref() == Some(registration_number)).cloned())
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn get_price_references(&mut self) -> Result<PriceReferences, ApplicationError> {
        Ok(self.references.clone())
    }
}

#[async_trait]
impl GuideStore for MemoryStore {
    async fn find_guide(&mut self, property_id: i64, fiscal_year: i32) -> Result<Option<TaxGuide>, ApplicationError> {
        Ok(self.guides.iter().find(|guide| guide.property_id == property_id && guide.fiscal_year == fiscal_year).cloned())
    }

    async fn add_guide(&mut self, guide: NewTaxGuide) -> Result<TaxGuide, ApplicationError> {
        if self.guides.iter().any(|existing| existing.property_id == guide.property_id && existing.fiscal_year == guide.fiscal_year) {
            return Err(ApplicationError::new(ErrorType::Conflict, "Already exists".to_string()));
        }
        let stored = TaxGuide { id: self.next_guide_id, property_id: guide.property_id, fiscal_year: guide.fiscal_year, emitted_amount: guide.emitted_amount, issued_at: guide.issued_at, status: guide.status };
        self.next_guide_id += 1;
        self.guides.push(stored.clone());
        Ok(stored)
    }

    async fn update_guide_status(&mut self, guide_id: i64, status: GuideStatus) -> Result<(), ApplicationError> {
        let Some(guide) = self.guides.iter_mut().find(|guide| guide.id == guide_id) else {
            return Err(ApplicationError::new(ErrorType::NotFound, "Guide not found".to_string()));
        };
        guide.status = status;
        Ok(())
    }

    async fn delete_guide(&mut self, guide_id: i64) -> Result<(), ApplicationError> {
        let count = self.guides.len();
        self.guides.retain(|guide| guide.id != guide_id);
        if self.guides.len() == count {
            return Err(ApplicationError::new(ErrorType::NotFound, "Guide not found".to_string()));
        }
        Ok(())
    }

    async fn list_guides_by_property(&mut self, property_id: i64) -> Result<Vec<TaxGuide>, ApplicationError> {
        let mut guides: Vec<TaxGuide> = self.guides.iter().filter(|guide| guide.property_id == property_id).cloned().collect();
        guides.sort_by(|a, b| b.fiscal_year.cmp(&a.fiscal_year));
        Ok(guides)
    }

    async fn list_guides(&mut self) -> Result<Vec<GuideOverviewType>, ApplicationError> {
        let mut guides: Vec<GuideOverviewType> = self
            .guides
            .iter()
            .filter_map(|guide| {
                let property = self.properties.iter().find(|property| property.id == guide.property_id)?;
                Some(GuideOverviewType {
                    guide: guide.clone(),
                    owner_name: property.owner_name.clone(),
                    owner_document: property.owner_document.clone(),
                    registration_number: property.registration_number.clone(),
                })
            })
            .collect();
        guides.sort_by(|a, b| b.guide.id.cmp(&a.guide.id));
        Ok(guides)
    }

    async fn sum_emitted_amount(&mut self, status: GuideStatus) -> Result<f64, ApplicationError> {
        Ok(self.guides.iter().filter(|guide| guide.status == status).map(|guide| guide.emitted_amount).sum())
    }
}
