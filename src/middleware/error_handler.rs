use actix_web::{error::JsonPayloadError, web, HttpRequest};

use crate::core::AppError;

/// JSON extractor config that renders body errors in the API's error shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(json_error_handler)
}

/// Turn a rejected JSON body into a `Validation` error
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected JSON body");

    let message = match &err {
        JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
        JsonPayloadError::Deserialize(e) => format!("Invalid request body: {}", e),
        other => format!("Invalid request body: {}", other),
    };

    AppError::validation(message).into()
}
