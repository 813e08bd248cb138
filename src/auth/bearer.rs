/// Bearer token extraction from the `Authorization` header

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::error::BearerError;

const BEARER_SCHEME: &str = "Bearer";

/// Read the raw token out of `Authorization: Bearer <token>`
///
/// The value must be exactly two space-separated fields, the first being
/// the literal `Bearer`.
///
/// # Errors
/// - `MissingHeader` if the header is absent or empty
/// - `MalformedHeader` for any other shape, including non-ASCII values
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, BearerError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(BearerError::MissingHeader)?;

    if value.is_empty() {
        return Err(BearerError::MissingHeader);
    }

    let value = value.to_str().map_err(|_| BearerError::MalformedHeader)?;
    parse_bearer(value).map(str::to_string)
}

fn parse_bearer(value: &str) -> Result<&str, BearerError> {
    let mut fields = value.split(' ');

    match (fields.next(), fields.next(), fields.next()) {
        (Some(BEARER_SCHEME), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(BearerError::MalformedHeader),
    }
}
