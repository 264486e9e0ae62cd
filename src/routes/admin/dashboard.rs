use anyhow::Context;
use axum::{extract::State, response::IntoResponse};
use bigdecimal::{BigDecimal, Zero};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    checkout::PaymentStatus,
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{OrderEntity, ProductEntity},
    schema::{brands, categories, orders, products},
};

const RECENT_LIMIT: i64 = 10;

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(utoipa_axum::routes!(dashboard))
}

#[derive(Serialize, ToSchema)]
struct DashboardRes {
    product_count: i64,
    category_count: i64,
    brand_count: i64,
    order_count: i64,
    pending_order_count: i64,
    #[schema(value_type = String)]
    total_revenue: BigDecimal,
    recent_products: Vec<ProductEntity>,
    recent_orders: Vec<OrderEntity>,
}

/// Catalog and order counts for the admin landing page.
#[utoipa::path(
    get,
    path = "/my-admin/",
    tags = ["Admin"],
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "Dashboard", body = StdResponse<DashboardRes, String>),
        (status = 303, description = "Not staff, redirect to admin login")
    )
)]
async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product_count: i64 = products::table
        .count()
        .get_result(conn)
        .await
        .context("Failed to count products")?;
    let category_count: i64 = categories::table
        .count()
        .get_result(conn)
        .await
        .context("Failed to count categories")?;
    let brand_count: i64 = brands::table
        .count()
        .get_result(conn)
        .await
        .context("Failed to count brands")?;
    let order_count: i64 = orders::table
        .count()
        .get_result(conn)
        .await
        .context("Failed to count orders")?;
    let pending_order_count: i64 = orders::table
        .filter(orders::payment_status.eq(PaymentStatus::Pending.as_str()))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count pending orders")?;
    let total_revenue: Option<BigDecimal> = orders::table
        .select(diesel::dsl::sum(orders::total))
        .first(conn)
        .await
        .context("Failed to sum revenue")?;

    let recent_products: Vec<ProductEntity> = products::table
        .order_by(products::created_at.desc())
        .limit(RECENT_LIMIT)
        .select(ProductEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get recent products")?;
    let recent_orders: Vec<OrderEntity> = orders::table
        .order_by(orders::created_at.desc())
        .limit(RECENT_LIMIT)
        .select(OrderEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get recent orders")?;

    Ok(StdResponse {
        data: Some(DashboardRes {
            product_count,
            category_count,
            brand_count,
            order_count,
            pending_order_count,
            total_revenue: total_revenue.unwrap_or_else(BigDecimal::zero),
            recent_products,
            recent_orders,
        }),
        message: Some("Get dashboard successfully"),
    })
}
