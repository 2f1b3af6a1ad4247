use std::str::FromStr;

use actix_web::{FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Claims read from the bearer token.
 */
#[derive(Debug, Clone, Deserialize)]
pub struct Claim {
    /**
     * Id of the user the token was issued to.
     */
    pub public_id: Option<i64>,
    /**
     * Login name.
     */
    pub usuario: Option<String>,
    /**
     * Access role.
     */
    pub acesso: Option<String>,
    pub exp: Option<usize>,
}

/**
 * JWT Security Service for handling JWT authentication.
 */
#[derive(Clone)]
pub struct JwtSecurityService {
    /**
     * The decoding key used to verify JWT tokens.
     */
    decoding_key: DecodingKey,
    /**
     * The validation rules for JWT tokens.
     */
    validation: Validation,
    /**
     * Role granting administrator rights.
     */
    admin_role: String,
}

impl JwtSecurityService {
    /**
     * Creates a new instance of JwtSecurityService.
     *
     * # Arguments
     * `key`: The public key in PEM format, or the shared secret for HMAC algorithms.
     * `algorithm`: The algorithm used for JWT token validation.
     * `admin_role`: Value of the `acesso` claim that grants administrator rights.
     *
     * # Returns
     * A Result containing the JwtSecurityService or an ApplicationError if initialization fails.
     */
    pub fn new(key: &str, algorithm: &str, admin_role: &str) -> Result<Self, ApplicationError> {
        let algorithm = Algorithm::from_str(algorithm).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid algorithm: {err}")))?;
        let decoding_key = match algorithm {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => DecodingKey::from_rsa_pem(key.as_bytes()).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create decoding key: {err}")))?,
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key.as_bytes()).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create decoding key: {err}")))?,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => DecodingKey::from_secret(key.as_bytes()),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(key.as_bytes()).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create decoding key: {err}")))?,
            _ => return Err(ApplicationError::new(ErrorType::Initialization, "Unsupported algorithm".to_string())),
        };
        let validation = Validation::new(algorithm);
        Ok(JwtSecurityService { decoding_key, validation, admin_role: admin_role.to_string() })
    }

    /**
     * Validates the JWT token from the HTTP request.
     *
     * # Arguments
     * `http_request`: The HTTP request containing the JWT token in the Authorization header.
     *
     * # Returns
     * The token claims or an ApplicationError if validation fails.
     */
    pub fn validate(&self, http_request: &HttpRequest) -> Result<Claim, ApplicationError> {
        let credentials = BearerAuth::from_request(http_request, &mut actix_web::dev::Payload::None).into_inner().ok();
        let Some(credentials) = credentials else {
            return Err(ApplicationError::new(ErrorType::JwtAuthorization, "Unauthorized".to_string()));
        };
        match jsonwebtoken::decode::<Claim>(credentials.token(), &self.decoding_key, &self.validation) {
            Ok(token_data) => Ok(token_data.claims),
            Err(err) => {
                tracing::debug!("JWT validation error: {err}");
                Err(ApplicationError::new(ErrorType::JwtAuthorization, "Unauthorized".to_string()))
            }
        }
    }

    /**
     * Validates the JWT token and requires the administrator role.
     *
     * # Arguments
     * `http_request`: The HTTP request containing the JWT token in the Authorization header.
     *
     * # Returns
     * The token claims, `JwtAuthorization` for a bad token or `Forbidden` for a non-administrator.
     */
    pub fn validate_admin(&self, http_request: &HttpRequest) -> Result<Claim, ApplicationError> {
        let claim = self.validate(http_request)?;
        if claim.acesso.as_deref() != Some(self.admin_role.as_str()) {
            tracing::info!("User {:?} denied administrator operation", claim.usuario);
            return Err(ApplicationError::new(ErrorType::Forbidden, "Administrator permission required".to_string()));
        }
        Ok(claim)
    }
}
