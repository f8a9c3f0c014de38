use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use tradebinder_auth::Permission;
use tradebinder_core::{AggregateId, UserId};
use tradebinder_listings::ListingId;
use tradebinder_sales::{SaleId, SaleState};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(purchase).get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id/state", put(request_transition))
        .route("/:id/rating", post(submit_rating))
        .route("/sellers/:id/rating", get(seller_rating))
}

/// POST /sales - buy a listing at its current price.
pub async fn purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::PurchaseRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("sales.purchase")],
    };
    if let Err(e) = crate::authz::authorize_command(&actor, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let listing_id = match body.listing_id.parse::<AggregateId>().map(ListingId::new) {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid listing id")
        }
    };

    match services.marketplace.purchase(actor.user_id(), listing_id) {
        Ok(rm) => (StatusCode::CREATED, Json(dto::sale_to_json(rm))).into_response(),
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// GET /sales - the caller's purchase/sale history; admins see the full
/// ledger.
pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    let records = if actor.is_admin() {
        services.marketplace.list_all_sales()
    } else {
        services.marketplace.list_sales_for(actor.user_id())
    };
    let items = records.into_iter().map(dto::sale_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// GET /sales/:id - visible to the buyer, the seller, and admins.
pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.marketplace.get_sale(sale_id) {
        Some(rm)
            if actor.is_admin()
                || rm.buyer == actor.user_id()
                || rm.seller == actor.user_id() =>
        {
            (StatusCode::OK, Json(dto::sale_to_json(rm))).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sale not found"),
    }
}

/// PUT /sales/:id/state - move the sale along its fulfilment states.
pub async fn request_transition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransitionRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("sales.transition")],
    };
    if let Err(e) = crate::authz::authorize_command(&actor, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let target = match SaleState::try_from(body.state) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.marketplace.request_transition(sale_id, target) {
        Ok(rm) => (StatusCode::OK, Json(dto::sale_to_json(rm))).into_response(),
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// POST /sales/:id/rating - buyer rates the seller once the goods arrived.
pub async fn submit_rating(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SubmitRatingRequest>,
) -> axum::response::Response {
    let auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("sales.rate")],
    };
    if let Err(e) = crate::authz::authorize_command(&actor, &auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .marketplace
        .submit_rating(actor.user_id(), sale_id, body.score, body.comment)
    {
        Ok(rm) => (StatusCode::CREATED, Json(dto::sale_to_json(rm))).into_response(),
        Err(e) => errors::marketplace_error_to_response(e),
    }
}

/// GET /sales/sellers/:id/rating - average rating a seller has received.
pub async fn seller_rating(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let seller = match id.parse::<UserId>() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };

    let average = services.marketplace.seller_rating(seller);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "seller": seller.to_string(),
            "average_score": average,
        })),
    )
        .into_response()
}

fn parse_sale_id(raw: &str) -> Result<SaleId, axum::response::Response> {
    raw.parse::<AggregateId>()
        .map(SaleId::new)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sale id"))
}
