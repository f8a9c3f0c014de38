use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use tradebinder_auth::Permission;
use tradebinder_catalog::{CardId, Grade};
use tradebinder_core::AggregateId;
use tradebinder_listings::ListingId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_listing).get(browse_listings))
        .route("/mine", get(list_own_listings))
        .route("/:id", get(get_listing).delete(withdraw_listing))
        .route("/:id/price", put(update_price))
}

/// POST /listings - open a listing backed by the caller's collection.
pub async fn create_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateListingRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("listings.write")],
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

    match services.marketplace.create_listing(
        actor.user_id(),
        card_id,
        grade,
        body.quantity,
        body.price_cents,
        body.notes,
    ) {
        Ok(rm) => {
            let card = services.card_summary(&rm.card_id);
            (StatusCode::CREATED, Json(dto::listing_to_json(rm, card))).into_response()
        }
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// GET /listings - browse active listings.
pub async fn browse_listings(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .marketplace
        .browse_listings()
        .into_iter()
        .map(|rm| {
            let card = services.card_summary(&rm.card_id);
            dto::listing_to_json(rm, card)
        })
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// GET /listings/mine - the caller's listings, all statuses.
pub async fn list_own_listings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    let items = services
        .marketplace
        .list_seller_listings(actor.user_id())
        .into_iter()
        .map(|rm| {
            let card = services.card_summary(&rm.card_id);
            dto::listing_to_json(rm, card)
        })
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// GET /listings/:id
pub async fn get_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let listing_id = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.marketplace.get_listing(listing_id) {
        Some(rm) => {
            let card = services.card_summary(&rm.card_id);
            (StatusCode::OK, Json(dto::listing_to_json(rm, card))).into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "listing not found"),
    }
}

/// PUT /listings/:id/price - edit the price of an active listing.
pub async fn update_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePriceRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("listings.write")],
    };
    if let Err(e) = crate::authz::authorize_command(&actor, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let listing_id = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .marketplace
        .update_price(actor.user_id(), listing_id, body.price_cents)
    {
        Ok(rm) => {
            let card = services.card_summary(&rm.card_id);
            (StatusCode::OK, Json(dto::listing_to_json(rm, card))).into_response()
        }
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// DELETE /listings/:id - withdraw and restore the units to the collection.
pub async fn withdraw_listing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("listings.write")],
    };
    if let Err(e) = crate::authz::authorize_command(&actor, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let listing_id = match parse_listing_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .marketplace
        .withdraw_listing(actor.user_id(), listing_id)
    {
        Ok(rm) => {
            let card = services.card_summary(&rm.card_id);
            (StatusCode::OK, Json(dto::listing_to_json(rm, card))).into_response()
        }
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

fn parse_listing_id(raw: &str) -> Result<ListingId, axum::response::Response> {
    raw.parse::<AggregateId>().map(ListingId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid listing id")
    })
}
