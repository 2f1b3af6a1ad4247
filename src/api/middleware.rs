use actix_web::{
    Error,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
};
use tracing::{debug, warn};

/**
 * Slow requests are reported at warn level.
 */
const SLOW_REQUEST_MILLIS: u128 = 1000;

/**
 * Middleware for timing requests.
 */
pub async fn timing_middleware(request: ServiceRequest, next: Next<impl MessageBody>) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start_time = std::time::Instant::now();
    let path = request.path().to_owned();
    let method = request.method().to_owned();
    let response = next.call(request).await;
    let response_code = match &response {
        Ok(service_response) => service_response.status().as_u16(),
        Err(err) => err.as_response_error().status_code().as_u16(),
    };
    let elapsed = start_time.elapsed().as_millis();
    if elapsed >= SLOW_REQUEST_MILLIS {
        warn!(target: "performance", "Slow request {} {} with status {} processed in {}ms", method, path, response_code, elapsed);
    } else {
        debug!(target: "performance", "Request for {} {} with status {} processed in {}ms", method, path, response_code, elapsed);
    }
    response
}
