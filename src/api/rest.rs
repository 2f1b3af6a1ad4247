use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{FinancialSummaryType, GuideOverviewType, GuideStatus, PropertySummaryType, ReferenceEntryType, ReurbType, TaxGuide, ValuationPreviewType},
};

/**
 * Format of timestamps in guide payloads.
 */
const ISSUED_AT_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/***************** Guides models *********************/

/**
 * Request structure for issuing a guide.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideIssueRequest {
    pub property_id: Option<i64>,
    pub fiscal_year: Option<i32>,
}

/**
 * Request structure for changing the payment status of a guide.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideStatusUpdateRequest {
    /**
     * "Paid" or "Open".
     */
    pub status: Option<String>,
}

/**
 * A tax guide.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideElement {
    guide_id: i64,
    property_id: i64,
    fiscal_year: i32,
    emitted_amount: f64,
    /**
     * Issuance time as DD/MM/YYYY HH:MM:SS.
     */
    issued_at: String,
    status: GuideStatus,
}

impl From<TaxGuide> for GuideElement {
    fn from(guide: TaxGuide) -> Self {
        GuideElement {
            guide_id: guide.id,
            property_id: guide.property_id,
            fiscal_year: guide.fiscal_year,
            emitted_amount: guide.emitted_amount,
            issued_at: format_issued_at(&guide.issued_at),
            status: guide.status,
        }
    }
}

/**
 * A tax guide with the identification of the property owner.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideOverviewElement {
    #[serde(flatten)]
    guide: GuideElement,
    owner_name: Option<String>,
    owner_document: Option<String>,
    registration_number: Option<String>,
}

impl From<GuideOverviewType> for GuideOverviewElement {
    fn from(overview: GuideOverviewType) -> Self {
        GuideOverviewElement {
            guide: GuideElement::from(overview.guide),
            owner_name: overview.owner_name,
            owner_document: overview.owner_document,
            registration_number: overview.registration_number,
        }
    }
}

/**
 * Response structure for issuing a guide.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideIssueResponse {
    message: String,
    guide: GuideElement,
}

impl From<TaxGuide> for GuideIssueResponse {
    fn from(guide: TaxGuide) -> Self {
        GuideIssueResponse { message: "Tax guide issued".to_string(), guide: GuideElement::from(guide) }
    }
}

/**
 * Collected and outstanding totals.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummaryResponse {
    collected: f64,
    outstanding: f64,
}

impl From<FinancialSummaryType> for FinancialSummaryResponse {
    fn from(summary: FinancialSummaryType) -> Self {
        FinancialSummaryResponse { collected: summary.collected, outstanding: summary.outstanding }
    }
}

/***************** Property models *********************/

/**
 * Identification of a property.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummaryResponse {
    property_id: i64,
    owner_name: Option<String>,
    owner_document: Option<String>,
    registration_number: Option<String>,
}

impl From<PropertySummaryType> for PropertySummaryResponse {
    fn from(summary: PropertySummaryType) -> Self {
        PropertySummaryResponse { property_id: summary.id, owner_name: summary.owner_name, owner_document: summary.owner_document, registration_number: summary.registration_number }
    }
}

/**
 * Valuation of a property.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResponse {
    #[serde(flatten)]
    property: PropertySummaryResponse,
    reurb_type: ReurbType,
    land_value: f64,
    construction_value: f64,
    improved_value: f64,
    tax_amount: f64,
}

impl From<ValuationPreviewType> for ValuationResponse {
    fn from(preview: ValuationPreviewType) -> Self {
        ValuationResponse {
            property: PropertySummaryResponse::from(preview.property),
            reurb_type: preview.reurb_type,
            land_value: preview.valuation.land_value,
            construction_value: preview.valuation.construction_value,
            improved_value: preview.valuation.improved_value,
            tax_amount: preview.valuation.tax_amount,
        }
    }
}

/***************** Reference models *********************/

/**
 * Request structure for adding a reference entry.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAddRequest {
    /**
     * Construction standard, street name or use type.
     */
    pub key: Option<String>,
    /**
     * Price per area, or the tax rate as a fraction.
     */
    pub value: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntryElement {
    id: i64,
    key: String,
    value: f64,
}

impl From<ReferenceEntryType> for ReferenceEntryElement {
    fn from(entry: ReferenceEntryType) -> Self {
        ReferenceEntryElement { id: entry.id, key: entry.key, value: entry.value }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAddResponse {
    pub id: i64,
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error. Internal errors are logged and answered with a generic message.
     */
    fn error_response(&self) -> HttpResponse {
        let status_code = get_statuscode(&self.error_type);
        let message = if status_code.is_server_error() {
            tracing::error!("Internal error {:?}: {}", self.error_type, self.message);
            "Internal server error".to_string()
        } else {
            self.message.clone()
        };
        let error_response = ErrorResponse { code: get_error_code(&self.error_type), message };
        HttpResponse::build(status_code).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::JwtAuthorization => StatusCode::UNAUTHORIZED,
        ErrorType::Forbidden => StatusCode::FORBIDDEN,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Conflict => StatusCode::CONFLICT,
        ErrorType::InvalidArgument | ErrorType::InvalidState => StatusCode::BAD_REQUEST,
        ErrorType::Initialization | ErrorType::Valuation | ErrorType::DatabaseError | ErrorType::Application => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::JwtAuthorization => 1000,
        ErrorType::Initialization => 1001,
        ErrorType::Application => 1002,
        ErrorType::DatabaseError => 1003,
        ErrorType::NotFound => 1004,
        ErrorType::Conflict => 1005,
        ErrorType::InvalidArgument => 1006,
        ErrorType::Forbidden => 1007,
        ErrorType::InvalidState => 1008,
        ErrorType::Valuation => 1009,
    }
}

fn format_issued_at(issued_at: &DateTime<Utc>) -> String {
    issued_at.format(ISSUED_AT_FORMAT).to_string()
}
