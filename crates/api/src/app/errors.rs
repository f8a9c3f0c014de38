use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tradebinder_core::DomainError;
use tradebinder_infra::marketplace::MarketplaceError;

/// Map a marketplace error onto the HTTP error contract.
///
/// Domain rejections carry a stable machine-readable code; infrastructure
/// failures collapse to 500.
pub fn marketplace_error_to_response(err: MarketplaceError) -> axum::response::Response {
    match err {
        MarketplaceError::Domain(domain) => domain_error_to_response(domain),
        MarketplaceError::Infra(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::InsufficientInventory { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_inventory", message)
        }
        DomainError::InvalidPrice => json_error(StatusCode::BAD_REQUEST, "invalid_price", message),
        DomainError::ListingNotActive => {
            json_error(StatusCode::CONFLICT, "listing_not_active", message)
        }
        DomainError::ListingUnavailable => {
            json_error(StatusCode::CONFLICT, "listing_unavailable", message)
        }
        DomainError::IllegalStateTransition { .. } => {
            json_error(StatusCode::CONFLICT, "illegal_state_transition", message)
        }
        DomainError::RatingNotAllowed => {
            json_error(StatusCode::CONFLICT, "rating_not_allowed", message)
        }
        DomainError::InvalidScore => json_error(StatusCode::BAD_REQUEST, "invalid_score", message),
        DomainError::NotBuyer => json_error(StatusCode::FORBIDDEN, "not_buyer", message),
        DomainError::Validation(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
