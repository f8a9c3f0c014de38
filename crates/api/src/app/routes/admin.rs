use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use tradebinder_auth::{Permission, Role};
use tradebinder_core::{AggregateId, UserId};
use tradebinder_infra::event_store::{EventFilter, Pagination};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/accounts", post(register_account).get(list_accounts))
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/suspend", post(suspend_account))
        .route("/accounts/:id/reinstate", post(reinstate_account))
        .route("/ledger", get(list_events))
        .route("/ledger/:event_id", get(get_event))
}

fn require_admin(actor: &ActorContext, permission: &str) -> Option<axum::response::Response> {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new(permission.to_string())],
    };
    match crate::authz::authorize_command(actor, &auth) {
        Ok(()) => None,
        Err(e) => Some(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            e.to_string(),
        )),
    }
}

/// POST /admin/accounts - register a marketplace account.
pub async fn register_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RegisterAccountRequest>,
) -> axum::response::Response {
    if let Some(resp) = require_admin(&actor, "accounts.manage") {
        return resp;
    }

    let user_id = match body.user_id.parse::<UserId>() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };
    let roles = body
        .roles
        .map(|names| names.into_iter().map(Role::new).collect::<Vec<_>>())
        .unwrap_or_else(|| vec![Role::trader()]);

    match services
        .marketplace
        .register_account(user_id, &body.display_name, roles)
    {
        Ok(rm) => (StatusCode::CREATED, Json(dto::account_to_json(rm))).into_response(),
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// GET /admin/accounts
pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    if let Some(resp) = require_admin(&actor, "accounts.manage") {
        return resp;
    }

    let items = services
        .marketplace
        .list_accounts()
        .into_iter()
        .map(dto::account_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// GET /admin/accounts/:id
pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Some(resp) = require_admin(&actor, "accounts.manage") {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.marketplace.get_account(user_id) {
        Some(rm) => (StatusCode::OK, Json(dto::account_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
    }
}

/// POST /admin/accounts/:id/suspend - block the account from trading.
pub async fn suspend_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SuspendAccountRequest>,
) -> axum::response::Response {
    if let Some(resp) = require_admin(&actor, "accounts.manage") {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = body
        .reason
        .unwrap_or_else(|| "suspended by admin".to_string());

    match services.marketplace.suspend_account(user_id, &reason) {
        Ok(rm) => (StatusCode::OK, Json(dto::account_to_json(rm))).into_response(),
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// POST /admin/accounts/:id/reinstate
pub async fn reinstate_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Some(resp) = require_admin(&actor, "accounts.manage") {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.marketplace.reinstate_account(user_id) {
        Ok(rm) => (StatusCode::OK, Json(dto::account_to_json(rm))).into_response(),
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub aggregate_id: Option<String>,
    pub aggregate_type: Option<String>,
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /admin/ledger - query the append-only event ledger.
pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<EventListQuery>,
) -> axum::response::Response {
    if let Some(resp) = require_admin(&actor, "ledger.read") {
        return resp;
    }

    let aggregate_id = match query
        .aggregate_id
        .as_deref()
        .map(str::parse::<AggregateId>)
        .transpose()
    {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid aggregate id",
            )
        }
    };

    let filter = EventFilter {
        aggregate_id,
        aggregate_type: query.aggregate_type,
        event_type: query.event_type,
        occurred_after: query.occurred_after,
        occurred_before: query.occurred_before,
    };
    let pagination = Pagination::new(query.limit, query.offset);

    match services.query_events(&filter, pagination) {
        Ok(result) => {
            let events = result
                .events
                .iter()
                .map(dto::event_to_json)
                .collect::<Vec<_>>();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "events": events,
                    "total": result.total,
                    "pagination": {
                        "limit": result.pagination.limit,
                        "offset": result.pagination.offset,
                    },
                    "has_more": result.has_more,
                })),
            )
                .into_response()
        }
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            e.to_string(),
        ),
    }
}

/// GET /admin/ledger/:event_id
pub async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    if let Some(resp) = require_admin(&actor, "ledger.read") {
        return resp;
    }

    let event_id = match event_id.parse::<Uuid>() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id")
        }
    };

    match services.get_event_by_id(event_id) {
        Ok(Some(event)) => (StatusCode::OK, Json(dto::event_to_json(&event))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "event not found"),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            e.to_string(),
        ),
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse::<UserId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}
