use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use actix_web::web;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    api::rest::{GuideIssueRequest, GuideStatusUpdateRequest, ReferenceAddRequest},
    model::apperror::{ApplicationError, ErrorType},
};

/**
 * Family income up to which a regularization can qualify as social interest.
 */
pub const REURB_SOCIAL_INCOME_LIMIT: f64 = 7500.0;

/**
 * Answer in the "owns other property" field meaning the applicant owns no other property.
 */
const OWNS_NO_OTHER_PROPERTY: &str = "nao";

/***************** Property models *********************/

/**
 * A building on a registered parcel.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionRecord {
    pub id: i64,
    pub name: String,
    /**
     * Built area. Absent means not measured.
     */
    pub built_area: Option<f64>,
    /**
     * Primary use label, key into the tax rate table.
     */
    pub primary_use: Option<String>,
    /**
     * Construction standard label, key into the construction standard table.
     */
    pub construction_standard: Option<String>,
}

/**
 * A registered land parcel and its applicant.
 *
 * Only the fields taking part in valuation, classification and owner display are loaded.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub id: i64,
    pub owner_name: Option<String>,
    pub owner_document: Option<String>,
    /**
     * External identifier of the parcel in the municipal register.
     */
    pub registration_number: Option<String>,
    /**
     * Street name, key into the street value table.
     */
    pub street: Option<String>,
    pub total_area: Option<f64>,
    pub family_income: Option<f64>,
    /**
     * Free text yes/no answer.
     */
    pub owns_other_property: Option<String>,
    /**
     * Constructions in stored order.
     */
    pub constructions: Vec<ConstructionRecord>,
}

/**
 * Regularization modality of a property.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReurbType {
    #[serde(rename = "REURB-S")]
    Social,
    #[serde(rename = "REURB-E")]
    Specific,
}

impl PropertyRecord {
    /**
     * Classifies the property as social or specific interest regularization.
     *
     * # Returns
     * `ReurbType::Social` when the family income is within the limit and the applicant owns no other property.
     */
    pub fn reurb_type(&self) -> ReurbType {
        let income = self.family_income.unwrap_or(0.0);
        let owns_other = self.owns_other_property.as_deref().unwrap_or("");
        if income <= REURB_SOCIAL_INCOME_LIMIT && owns_other.to_lowercase() == OWNS_NO_OTHER_PROPERTY { ReurbType::Social } else { ReurbType::Specific }
    }
}

/**
 * Identification of a property as shown next to its guides.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySummaryType {
    pub id: i64,
    pub owner_name: Option<String>,
    pub owner_document: Option<String>,
    pub registration_number: Option<String>,
}

impl From<&PropertyRecord> for PropertySummaryType {
    fn from(property: &PropertyRecord) -> Self {
        PropertySummaryType {
            id: property.id,
            owner_name: property.owner_name.clone(),
            owner_document: property.owner_document.clone(),
            registration_number: property.registration_number.clone(),
        }
    }
}

/***************** Reference models *********************/

/**
 * The three valuation reference tables.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /**
     * Construction standard to price per area.
     */
    ConstructionStandard,
    /**
     * Street name to land price per area.
     */
    Street,
    /**
     * Use type to tax rate.
     */
    TaxRate,
}

impl FromStr for ReferenceKind {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "standards" => Ok(ReferenceKind::ConstructionStandard),
            "streets" => Ok(ReferenceKind::Street),
            "rates" => Ok(ReferenceKind::TaxRate),
            _ => Err(ApplicationError::new(ErrorType::NotFound, format!("Unknown reference table {value}"))),
        }
    }
}

/**
 * One row of a reference table.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntryType {
    pub id: i64,
    pub key: String,
    pub value: f64,
}

/**
 * Lookup tables used by the valuation engine. Keys are matched by exact string equality.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceReferences {
    construction_standards: HashMap<String, f64>,
    streets: HashMap<String, f64>,
    tax_rates: HashMap<String, f64>,
}

impl PriceReferences {
    /**
     * Builds the lookup tables from rows. When a key repeats the first row wins.
     *
     * # Arguments
     * `construction_standards`: Construction standard and price per area.
     * `streets`: Street name and land price per area.
     * `tax_rates`: Use type and tax rate.
     */
    pub fn new(construction_standards: Vec<(String, f64)>, streets: Vec<(String, f64)>, tax_rates: Vec<(String, f64)>) -> Self {
        PriceReferences { construction_standards: Self::to_lookup(construction_standards), streets: Self::to_lookup(streets), tax_rates: Self::to_lookup(tax_rates) }
    }

    fn to_lookup(rows: Vec<(String, f64)>) -> HashMap<String, f64> {
        let mut lookup = HashMap::with_capacity(rows.len());
        for (key, value) in rows {
            lookup.entry(key).or_insert(value);
        }
        lookup
    }

    pub fn construction_price(&self, standard: &str) -> Option<f64> {
        self.construction_standards.get(standard).copied()
    }

    pub fn street_price(&self, street: &str) -> Option<f64> {
        self.streets.get(street).copied()
    }

    pub fn tax_rate(&self, use_type: &str) -> Option<f64> {
        self.tax_rates.get(use_type).copied()
    }
}

/**
 * Validated input for adding a reference entry.
 */
#[derive(Debug, Clone)]
pub struct ReferenceAddInputType {
    pub kind: ReferenceKind,
    pub key: String,
    pub value: f64,
}

impl From<(ReferenceKind, web::Json<ReferenceAddRequest>)> for ReferenceAddInputType {
    fn from((kind, request): (ReferenceKind, web::Json<ReferenceAddRequest>)) -> Self {
        let request = request.into_inner();
        ReferenceAddInputType { kind, key: request.key.unwrap_or_default().trim().to_string(), value: request.value.unwrap_or(f64::NAN) }
    }
}

impl ReferenceAddInputType {
    /**
     * Validates the entry.
     *
     * # Returns
     * The input if the key is non-empty and the value is finite, non-negative and, for tax rates, at most 1.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.key.is_empty() {
            return Err(ApplicationError::new(ErrorType::InvalidArgument, "Key is required".to_string()));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(ApplicationError::new(ErrorType::InvalidArgument, "Value must be a non-negative number".to_string()));
        }
        if self.kind == ReferenceKind::TaxRate && self.value > 1.0 {
            return Err(ApplicationError::new(ErrorType::InvalidArgument, "Tax rate must be a fraction between 0 and 1".to_string()));
        }
        Ok(self)
    }
}

/***************** Valuation models *********************/

/**
 * Output of the valuation engine.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Valuation {
    /**
     * Land value (VVT).
     */
    pub land_value: f64,
    /**
     * Construction value (VVC).
     */
    pub construction_value: f64,
    /**
     * Total improved value (VVI), land plus construction.
     */
    pub improved_value: f64,
    /**
     * Property tax (IPTU).
     */
    pub tax_amount: f64,
}

/**
 * Valuation of a property together with its identification and classification.
 */
#[derive(Debug, Clone)]
pub struct ValuationPreviewType {
    pub property: PropertySummaryType,
    pub reurb_type: ReurbType,
    pub valuation: Valuation,
}

/***************** Guide models *********************/

/**
 * Payment status of a tax guide.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GuideStatus {
    Paid,
    Open,
}

impl GuideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuideStatus::Paid => "Paid",
            GuideStatus::Open => "Open",
        }
    }
}

impl FromStr for GuideStatus {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Paid" => Ok(GuideStatus::Paid),
            "Open" => Ok(GuideStatus::Open),
            _ => Err(ApplicationError::new(ErrorType::InvalidArgument, format!("Invalid status {value}. Use \"Paid\" or \"Open\"."))),
        }
    }
}

impl fmt::Display for GuideStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/**
 * One year's tax obligation for one property.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TaxGuide {
    pub id: i64,
    pub property_id: i64,
    pub fiscal_year: i32,
    /**
     * Amount fixed at issuance.
     */
    pub emitted_amount: f64,
    pub issued_at: DateTime<Utc>,
    pub status: GuideStatus,
}

/**
 * A guide that has not been stored yet.
 */
#[derive(Debug, Clone)]
pub struct NewTaxGuide {
    pub property_id: i64,
    pub fiscal_year: i32,
    pub emitted_amount: f64,
    pub issued_at: DateTime<Utc>,
    pub status: GuideStatus,
}

/**
 * A guide joined with the identification of its property, read at query time.
 */
#[derive(Debug, Clone)]
pub struct GuideOverviewType {
    pub guide: TaxGuide,
    pub owner_name: Option<String>,
    pub owner_document: Option<String>,
    pub registration_number: Option<String>,
}

/**
 * Guide amounts summed by payment status.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FinancialSummaryType {
    /**
     * Sum of paid guides.
     */
    pub collected: f64,
    /**
     * Sum of open guides.
     */
    pub outstanding: f64,
}

/**
 * Validated input for issuing a guide.
 */
#[derive(Debug, Clone)]
pub struct GuideIssueInputType {
    pub property_id: i64,
    pub fiscal_year: i32,
}

impl From<web::Json<GuideIssueRequest>> for GuideIssueInputType {
    fn from(request: web::Json<GuideIssueRequest>) -> Self {
        GuideIssueInputType { property_id: request.property_id.unwrap_or(0), fiscal_year: request.fiscal_year.unwrap_or(0) }
    }
}

impl GuideIssueInputType {
    /**
     * Validates that both the property id and the fiscal year are given.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.property_id <= 0 {
            return Err(ApplicationError::new(ErrorType::InvalidArgument, "Property id is required".to_string()));
        }
        if self.fiscal_year <= 0 {
            return Err(ApplicationError::new(ErrorType::InvalidArgument, "Fiscal year is required".to_string()));
        }
        Ok(self)
    }
}

/**
 * Input for changing the payment status of a guide.
 */
#[derive(Debug, Clone)]
pub struct GuideStatusUpdateInputType {
    pub status: Option<String>,
}

impl From<web::Json<GuideStatusUpdateRequest>> for GuideStatusUpdateInputType {
    fn from(request: web::Json<GuideStatusUpdateRequest>) -> Self {
        GuideStatusUpdateInputType { status: request.into_inner().status }
    }
}

impl GuideStatusUpdateInputType {
    /**
     * Parses the requested status.
     *
     * # Returns
     * The status, or `InvalidArgument` for anything other than "Paid" and "Open".
     */
    pub fn validate(self) -> Result<GuideStatus, ApplicationError> {
        let Some(status) = self.status else {
            return Err(ApplicationError::new(ErrorType::InvalidArgument, "Status is required".to_string()));
        };
        GuideStatus::from_str(&status)
    }
}
