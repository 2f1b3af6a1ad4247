use crate::{api::security::JwtSecurityService, service::taxation::TaxationService};

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * Verifies bearer tokens and administrator rights.
     */
    pub jwt_service: JwtSecurityService,
    /**
     * Issues and manages tax guides and their reference data.
     */
    pub taxation_service: TaxationService,
}

impl AppState {
    /**
     * Creates a new instance of `AppState`.
     *
     * # Arguments
     * `jwt_service`: The JWT security service.
     * `taxation_service`: The taxation service.
     */
    pub fn new(jwt_service: JwtSecurityService, taxation_service: TaxationService) -> Self {
        AppState { jwt_service, taxation_service }
    }
}
