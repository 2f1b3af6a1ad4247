use std::str::FromStr;

use actix_web::{
    HttpRequest, HttpResponse, delete, get, post, put,
    web::{self, Path},
};
use tracing::{Instrument, instrument};

use crate::{
    api::{
        rest::{
            FinancialSummaryResponse, GuideElement, GuideIssueRequest, GuideIssueResponse, GuideOverviewElement, GuideStatusUpdateRequest, PropertySummaryResponse, ReferenceAddRequest,
            ReferenceAddResponse, ReferenceEntryElement, ValuationResponse,
        },
        state::AppState,
    },
    model::{
        apperror::ApplicationError,
        models::{GuideIssueInputType, GuideStatusUpdateInputType, ReferenceAddInputType, ReferenceKind},
    },
};

/**
 * Endpoint to issue the tax guide of a property for a fiscal year.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "issueGuide", trace_id = get_trace_id(&http_request), result))]
#[post("/api/services/v1_0/guides")]
pub async fn guide_issue(http_request: HttpRequest, request_body: web::Json<GuideIssueRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let guide_issue_input = GuideIssueInputType::from(request_body).validate()?;
    let guide = app_state.taxation_service.issue_guide(guide_issue_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(GuideIssueResponse::from(guide)))
}

/**
 * Endpoint to retrieve all guides with owner identification.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "listGuides", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/guides")]
pub async fn guides_list(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let guides = app_state.taxation_service.list_guides().instrument(span).await?;
    Ok(HttpResponse::Ok().json(guides.into_iter().map(GuideOverviewElement::from).collect::<Vec<_>>()))
}

/**
 * Endpoint to change the payment status of a guide.
 */
#[instrument(skip(http_request, app_state), fields(service = "updateGuideStatus", trace_id = get_trace_id(&http_request), result))]
#[put("/api/services/v1_0/guides/{guideId}/status")]
pub async fn guide_status_update(path: Path<i64>, http_request: HttpRequest, request_body: web::Json<GuideStatusUpdateRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let guide_id = path.into_inner();
    let status = GuideStatusUpdateInputType::from(request_body).validate()?;
    app_state.taxation_service.update_guide_status(guide_id, status).instrument(span).await?;
    Ok(HttpResponse::Ok().finish())
}

/**
 * Endpoint to delete a guide.
 */
#[instrument(skip(http_request, app_state), fields(service = "deleteGuide", trace_id = get_trace_id(&http_request), result))]
#[delete("/api/services/v1_0/guides/{guideId}")]
pub async fn guide_delete(path: Path<i64>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let guide_id = path.into_inner();
    app_state.taxation_service.delete_guide(guide_id).instrument(span).await?;
    Ok(HttpResponse::NoContent().finish())
}

/**
 * Endpoint to retrieve the guides of a property.
 */
#[instrument(skip(http_request, app_state), fields(service = "listPropertyGuides", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/properties/{propertyId}/guides")]
pub async fn property_guides_list(path: Path<i64>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let property_id = path.into_inner();
    let guides = app_state.taxation_service.list_guides_by_property(property_id).instrument(span).await?;
    Ok(HttpResponse::Ok().json(guides.into_iter().map(GuideElement::from).collect::<Vec<_>>()))
}

/**
 * Endpoint to retrieve the collected and outstanding totals.
 */
#[instrument(skip(http_request, app_state), fields(service = "summarizeGuides", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/guides:summary")]
pub async fn guides_summary(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let summary = app_state.taxation_service.get_financial_summary().instrument(span).await?;
    Ok(HttpResponse::Ok().json(FinancialSummaryResponse::from(summary)))
}

/**
 * Endpoint to look up a property by registration number.
 */
#[instrument(skip(http_request, app_state), fields(service = "lookupProperty", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/properties:lookup/{registrationNumber}")]
pub async fn property_lookup(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let registration_number = path.into_inner();
    let summary = app_state.taxation_service.find_property(&registration_number).instrument(span).await?;
    Ok(HttpResponse::Ok().json(PropertySummaryResponse::from(summary)))
}

/**
 * Endpoint to compute the current valuation of a property.
 */
#[instrument(skip(http_request, app_state), fields(service = "previewValuation", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/valuations/{registrationNumber}")]
pub async fn valuation_preview(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let registration_number = path.into_inner();
    let preview = app_state.taxation_service.preview_valuation(&registration_number).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ValuationResponse::from(preview)))
}

/**
 * Endpoint to retrieve the entries of a reference table.
 */
#[instrument(skip(http_request, app_state), fields(service = "listReferences", trace_id = get_trace_id(&http_request), result))]
#[get("/api/services/v1_0/references/{kind}")]
pub async fn references_list(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate(&http_request)?;
    let kind = ReferenceKind::from_str(&path.into_inner())?;
    let entries = app_state.taxation_service.list_reference_entries(kind).instrument(span).await?;
    Ok(HttpResponse::Ok().json(entries.into_iter().map(ReferenceEntryElement::from).collect::<Vec<_>>()))
}

/**
 * Endpoint to add an entry to a reference table. Administrators only.
 */
#[instrument(skip(http_request, app_state), fields(service = "addReference", trace_id = get_trace_id(&http_request), result))]
#[post("/api/services/v1_0/references/{kind}")]
pub async fn reference_add(path: Path<String>, http_request: HttpRequest, request_body: web::Json<ReferenceAddRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate_admin(&http_request)?;
    let kind = ReferenceKind::from_str(&path.into_inner())?;
    let reference_add_input = ReferenceAddInputType::from((kind, request_body)).validate()?;
    let id = app_state.taxation_service.add_reference_entry(reference_add_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(ReferenceAddResponse { id }))
}

/**
 * Endpoint to delete an entry from a reference table. Administrators only.
 */
#[instrument(skip(http_request, app_state), fields(service = "deleteReference", trace_id = get_trace_id(&http_request), result))]
#[delete("/api/services/v1_0/references/{kind}/{entryId}")]
pub async fn reference_delete(path: Path<(String, i64)>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let _ = app_state.jwt_service.validate_admin(&http_request)?;
    let (kind, entry_id) = path.into_inner();
    let kind = ReferenceKind::from_str(&kind)?;
    app_state.taxation_service.delete_reference_entry(kind, entry_id).instrument(span).await?;
    Ok(HttpResponse::NoContent().finish())
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID").and_then(|v| v.to_str().ok().map(std::string::ToString::to_string)).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod test {
    use actix_web::{App, http::StatusCode, test, test::TestRequest};

    use super::*;
    use crate::{
        api::security::{
            JwtSecurityService,
            test::{TEST_SECRET, create_token},
        },
        service::taxation::TaxationService,
    };

    fn app_state() -> web::Data<AppState> {
        let jwt_service = JwtSecurityService::new(TEST_SECRET, "HS256", "Administrador").unwrap();
        web::Data::new(AppState::new(jwt_service, TaxationService::new(None)))
    }

    fn bearer(acesso: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", create_token(acesso)))
    }

    #[actix_web::test]
    async fn test_get_trace_id_exists() {
        let request = TestRequest::default().insert_header(("X-Trace-ID", "test")).to_http_request();
        let trace_id = get_trace_id(&request);
        assert_eq!(trace_id, "test");
    }

    #[actix_web::test]
    async fn test_get_trace_id_not_exists() {
        let request = TestRequest::default().to_http_request();
        let trace_id = get_trace_id(&request);
        assert!(!trace_id.is_empty());
    }

    #[actix_web::test]
    async fn test_guides_require_token() {
        let app = test::init_service(App::new().app_data(app_state()).service(guides_list).service(guides_summary)).await;
        let request = test::TestRequest::get().uri("/api/services/v1_0/guides").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let request = test::TestRequest::get().uri("/api/services/v1_0/guides:summary").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_guide_status_update_rejects_unknown_status() {
        let app = test::init_service(App::new().app_data(app_state()).service(guide_status_update)).await;
        let request = test::TestRequest::put().uri("/api/services/v1_0/guides/1/status").insert_header(bearer("Usuario")).set_json(serde_json::json!({ "status": "Cancelled" })).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["code"], 1006);
    }

    #[actix_web::test]
    async fn test_guide_issue_requires_fields() {
        let app = test::init_service(App::new().app_data(app_state()).service(guide_issue)).await;
        let request = test::TestRequest::post().uri("/api/services/v1_0/guides").insert_header(bearer("Usuario")).set_json(serde_json::json!({ "propertyId": 1 })).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_reference_add_requires_admin() {
        let app = test::init_service(App::new().app_data(app_state()).service(reference_add).service(reference_delete)).await;
        let request = test::TestRequest::post().uri("/api/services/v1_0/references/rates").insert_header(bearer("Usuario")).set_json(serde_json::json!({ "key": "Residencial", "value": 0.01 })).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let request = test::TestRequest::delete().uri("/api/services/v1_0/references/rates/1").insert_header(bearer("Usuario")).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_reference_unknown_kind() {
        let app = test::init_service(App::new().app_data(app_state()).service(reference_add)).await;
        let request = test::TestRequest::post().uri("/api/services/v1_0/references/owners").insert_header(bearer("Administrador")).set_json(serde_json::json!({ "key": "x", "value": 1.0 })).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_database_unavailable_is_internal_error() {
        let app = test::init_service(App::new().app_data(app_state()).service(guides_list)).await;
        let request = test::TestRequest::get().uri("/api/services/v1_0/guides").insert_header(bearer("Usuario")).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
