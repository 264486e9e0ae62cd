use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::OrderEntity,
    orders::{self, Invoice, OrderDetail, OrderFilter, OrderListing, PaymentUpdate},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(update_payment))
            .routes(utoipa_axum::routes!(get_invoice)),
    )
}

/// Search, filter and sort all orders, with the revenue of the matching set.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin orders"],
    security(("sessionCookie" = [])),
    params(OrderFilter),
    responses(
        (status = 200, description = "Matching orders", body = StdResponse<OrderListing, String>)
    )
)]
async fn list_orders(
    Query(filter): Query<OrderFilter>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let listing = orders::list_orders(conn, &filter).await?;

    Ok(StdResponse {
        data: Some(listing),
        message: Some("Get orders successfully"),
    })
}

/// One order with its line items.
#[utoipa::path(
    get,
    path = "/{id}/",
    tags = ["Admin orders"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderDetail, String>),
        (status = 404, description = "No such order")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let detail = orders::order_detail(conn, id).await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Get order successfully"),
    })
}

/// Record a payment against an order.
#[utoipa::path(
    post,
    path = "/{id}/update-payment/",
    tags = ["Admin orders"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = PaymentUpdate,
    responses(
        (status = 200, description = "Payment info updated successfully", body = StdResponse<OrderEntity, String>),
        (status = 404, description = "No such order"),
        (status = 422, description = "Invalid payment info")
    )
)]
async fn update_payment(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(staff_id): Extension<i32>,
    Json(body): Json<PaymentUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = orders::update_payment(conn, id, body).await?;
    tracing::debug!("Payment of order {} updated by staff {}", order.id, staff_id);

    Ok(StdResponse {
        data: Some(order),
        message: Some("Payment info updated successfully!"),
    })
}

/// Printable invoice with amounts formatted as taka.
#[utoipa::path(
    get,
    path = "/{id}/invoice/",
    tags = ["Admin orders"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Invoice", body = StdResponse<Invoice, String>),
        (status = 404, description = "No such order")
    )
)]
async fn get_invoice(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let invoice = Invoice::from(orders::order_detail(conn, id).await?);

    Ok(StdResponse {
        data: Some(invoice),
        message: Some("Get invoice successfully"),
    })
}
