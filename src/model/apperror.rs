use std::fmt;

/**
 * Represents the type of error that can occur within the application.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /**
     * Start-up failed, e.g. unreadable keys or configuration.
     */
    Initialization,
    /**
     * Missing or invalid bearer token.
     */
    JwtAuthorization,
    /**
     * Valid token, but the caller lacks the required role.
     */
    Forbidden,
    /**
     * A referenced property, guide or reference entry does not exist.
     */
    NotFound,
    /**
     * The write would duplicate an existing row, e.g. a second guide for the same property and year.
     */
    Conflict,
    /**
     * Input failed validation.
     */
    InvalidArgument,
    /**
     * The request is well formed but the current state does not allow it.
     */
    InvalidState,
    /**
     * The valuation could not be computed from the stored data.
     */
    Valuation,
    DatabaseError,
    Application,
}

/**
 * Represents an error that occurs within the application.
 */
#[derive(Debug, Clone)]
pub struct ApplicationError {
    /**
     * Error type.
     */
    pub error_type: ErrorType,
    /**
     * Error message describing problem.
     */
    pub message: String,
}

impl ApplicationError {
    /**
     * Creates a new ApplicationError.
     *
     * #Arguments
     * `error_type`: The type of error.
     * `message`: A description of the error.
     */
    pub fn new(error_type: ErrorType, message: String) -> Self {
        ApplicationError { error_type, message }
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
