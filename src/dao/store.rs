use async_trait::async_trait;

use crate::model::{
    apperror::ApplicationError,
    models::{GuideOverviewType, GuideStatus, NewTaxGuide, PriceReferences, PropertyRecord, TaxGuide},
};

/**
 * Read access to registered properties. Constructions are always loaded with the property.
 */
#[async_trait]
pub trait PropertyStore {
    async fn get_property(&mut self, property_id: i64) -> Result<Option<PropertyRecord>, ApplicationError>;

    async fn get_property_by_registration(&mut self, registration_number: &str) -> Result<Option<PropertyRecord>, ApplicationError>;
}

/**
 * Read access to the valuation reference tables.
 */
#[async_trait]
pub trait ReferenceStore {
    async fn get_price_references(&mut self) -> Result<PriceReferences, ApplicationError>;
}

/**
 * Storage of tax guides.
 */
#[async_trait]
pub trait GuideStore {
    /**
     * Finds the guide of a property for a fiscal year.
     */
    async fn find_guide(&mut self, property_id: i64, fiscal_year: i32) -> Result<Option<TaxGuide>, ApplicationError>;

    /**
     * Stores a new guide. Fails with `Conflict` if the property already has a guide for the year.
     */
    async fn add_guide(&mut self, guide: NewTaxGuide) -> Result<TaxGuide, ApplicationError>;

    /**
     * Sets the status of a guide. Fails with `NotFound` if the guide does not exist.
     */
    async fn update_guide_status(&mut self, guide_id: i64, status: GuideStatus) -> Result<(), ApplicationError>;

    /**
     * Deletes a guide. Fails with `NotFound` if the guide does not exist.
     */
    async fn delete_guide(&mut self, guide_id: i64) -> Result<(), ApplicationError>;

    /**
     * Guides of one property, latest fiscal year first.
     */
    async fn list_guides_by_property(&mut self, property_id: i64) -> Result<Vec<TaxGuide>, ApplicationError>;

    /**
     * All guides with owner identification, newest guide first.
     */
    async fn list_guides(&mut self) -> Result<Vec<GuideOverviewType>, ApplicationError>;

    /**
     * Sum of emitted amounts of guides with the status. Zero when there are none.
     */
    async fn sum_emitted_amount(&mut self, status: GuideStatus) -> Result<f64, ApplicationError>;
}

/**
 * Everything the tax guide operations need from persistence, passed explicitly into each operation.
 */
pub trait PersistenceContext: PropertyStore + ReferenceStore + GuideStore + Send {}

impl<T> PersistenceContext for T where T: PropertyStore + ReferenceStore + GuideStore + Send {}
