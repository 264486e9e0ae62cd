use anyhow::Context;
use axum::{
    Extension, Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    cart::{CartLine, format_taka},
    checkout::{
        self, CheckoutError, CheckoutForm, DeliveryMethod, DeliveryOption, OrderTotals,
    },
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    orders::{self, OrderDetail},
    routes::cart::CART_PATH,
    session::{self, SessionCtx},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(checkout_summary, place_order))
        .routes(utoipa_axum::routes!(order_success))
}

#[derive(Serialize, ToSchema)]
struct CheckoutSummaryRes {
    items: Vec<CartLine>,
    /// Totals assuming the default delivery method and no coupon.
    totals: OrderTotals,
    subtotal_formatted: String,
    delivery: Vec<DeliveryOption>,
}

/// Cart summary and delivery charges for the checkout page. An empty cart redirects to the cart.
#[utoipa::path(
    get,
    path = "/checkout/",
    tags = ["Checkout"],
    responses(
        (status = 200, description = "Checkout summary", body = StdResponse<CheckoutSummaryRes, String>),
        (status = 303, description = "Cart is empty, redirect to the cart")
    )
)]
async fn checkout_summary(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
) -> Result<Response, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (cart, _) = session::load_cart(conn, session.id).await?;
    if cart.is_empty() {
        return Ok(Redirect::to(CART_PATH).into_response());
    }

    let totals = OrderTotals::compute(&cart, DeliveryMethod::Home, None);

    Ok(StdResponse {
        data: Some(CheckoutSummaryRes {
            subtotal_formatted: format_taka(&totals.subtotal),
            totals,
            items: cart.items,
            delivery: checkout::delivery_options(),
        }),
        message: Some("Get checkout summary successfully"),
    }
    .into_response())
}

/// Place an order from the session cart.
///
/// Guests are identified by phone and become the session's user. Delivery charge and coupon
/// discount are recomputed on the server.
#[utoipa::path(
    post,
    path = "/checkout/",
    tags = ["Checkout"],
    request_body(content = CheckoutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Order placed, redirect to the success page"),
        (status = 409, description = "Cart changed while the order was being placed"),
        (status = 422, description = "Invalid phone, delivery method, payment method or coupon")
    )
)]
async fn place_order(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    match checkout::place_order(conn, &session, form, Utc::now().date_naive()).await {
        Ok(order) => Ok(Redirect::to(&format!("/success/{}/", order.id)).into_response()),
        Err(CheckoutError::EmptyCart) => Ok(Redirect::to(CART_PATH).into_response()),
        Err(err) => {
            tracing::debug!("Checkout rejected for session {}: {}", session.id, err);
            Err(err.into())
        }
    }
}

/// Order confirmation, visible only to the session that placed the order.
#[utoipa::path(
    get,
    path = "/success/{id}/",
    tags = ["Checkout"],
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Placed order", body = StdResponse<OrderDetail, String>),
        (status = 404, description = "No such order for this session")
    )
)]
async fn order_success(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let detail = orders::order_for_session(conn, id, &session).await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Order placed successfully"),
    })
}
