use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tradebinder_auth::Permission;
use tradebinder_catalog::{CardId, Grade};
use tradebinder_collection::EntryId;
use tradebinder_core::AggregateId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/entries", post(add_entry).get(list_entries))
        .route("/entries/:id", get(get_entry).patch(update_entry))
}

/// POST /collection/entries - add cards to the caller's collection.
pub async fn add_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::AddEntryRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("collection.write")],
    };
    if let Err(e) = crate::authz::authorize_command(&actor, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let card_id = match CardId::new(body.card_id) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let grade = match Grade::new(body.grade) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Some(raw) = body.card.as_ref() {
        services.remember_card(&card_id, raw);
    }

    match services
        .marketplace
        .add_entry(actor.user_id(), card_id, grade, body.quantity, body.notes)
    {
        Ok(rm) => {
            let card = services.card_summary(&rm.card_id);
            (StatusCode::CREATED, Json(dto::entry_to_json(rm, card))).into_response()
        }
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// GET /collection/entries - the caller's collection, sorted by card.
pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    let items = services
        .marketplace
        .list_collection(actor.user_id())
        .into_iter()
        .map(|rm| {
            let card = services.card_summary(&rm.card_id);
            dto::entry_to_json(rm, card)
        })
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// GET /collection/entries/:id
pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let entry_id = match parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.marketplace.get_entry(actor.user_id(), entry_id) {
        Ok(rm) => {
            let card = services.card_summary(&rm.card_id);
            (StatusCode::OK, Json(dto::entry_to_json(rm, card))).into_response()
        }
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// PATCH /collection/entries/:id - edit quantity/grade/notes.
///
/// Editing the quantity to zero deletes the entry; the response then carries
/// `"entry": null`.
pub async fn update_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateEntryRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("collection.write")],
    };
    if let Err(e) = crate::authz::authorize_command(&actor, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let entry_id = match parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let grade = match body.grade.map(Grade::new).transpose() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.marketplace.update_entry(
        actor.user_id(),
        entry_id,
        body.quantity,
        grade,
        body.notes,
    ) {
        Ok(rm) => {
            let entry = rm.map(|rm| {
                let card = services.card_summary(&rm.card_id);
                dto::entry_to_json(rm, card)
            });
            (StatusCode::OK, Json(serde_json::json!({ "entry": entry }))).into_response()
        }
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

fn parse_entry_id(raw: &str) -> Result<EntryId, axum::response::Response> {
    raw.parse::<AggregateId>()
        .map(EntryId::new)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid entry id"))
}
