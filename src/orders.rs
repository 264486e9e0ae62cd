//! Order queries for the admin panel and the order owner.

use anyhow::Context;
use bigdecimal::{BigDecimal, Zero};
use diesel::{
    BoolExpressionMethods, ExpressionMethods, NullableExpressionMethods, PgTextExpressionMethods,
    QueryDsl, SelectableHelper, dsl::sql, pg::Pg, sql_types::Text,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    checkout::PaymentStatus,
    infra::{aliases::DbConn, app_error::AppError},
    models::{OrderEntity, OrderItemEntity},
    schema::{order_items, orders, users},
    session::SessionCtx,
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
pub enum OrderSort {
    #[serde(rename = "created_at")]
    CreatedAt,
    #[default]
    #[serde(rename = "-created_at")]
    CreatedAtDesc,
    #[serde(rename = "total")]
    Total,
    #[serde(rename = "-total")]
    TotalDesc,
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "-id")]
    IdDesc,
}

impl OrderSort {
    /// Anything outside the allow-list sorts newest first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).unwrap_or_default() {
            "created_at" => OrderSort::CreatedAt,
            "-created_at" => OrderSort::CreatedAtDesc,
            "total" => OrderSort::Total,
            "-total" => OrderSort::TotalDesc,
            "id" => OrderSort::Id,
            "-id" => OrderSort::IdDesc,
            _ => OrderSort::default(),
        }
    }
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    /// Case-insensitive substring of id, name, email, mobile or username.
    pub search: Option<String>,
    /// Exact payment status.
    pub status: Option<String>,
    pub sort: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderListing {
    pub orders: Vec<OrderEntity>,
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    pub sort: OrderSort,
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn filtered(filter: &OrderFilter) -> orders::BoxedQuery<'static, Pg> {
    let mut query = orders::table.into_boxed();

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        let username_matches = users::table
            .filter(users::username.ilike(pattern.clone()))
            .select(users::id.nullable());

        query = query.filter(
            sql::<Text>("orders.id::text")
                .ilike(pattern.clone())
                .or(orders::first_name.ilike(pattern.clone()))
                .or(orders::last_name.ilike(pattern.clone()))
                .or(orders::email.ilike(pattern.clone()))
                .or(orders::mobile.ilike(pattern))
                .or(orders::user_id.eq_any(username_matches)),
        );
    }

    if let Some(status) = filter.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(orders::payment_status.eq(status.to_string()));
    }

    query
}

pub async fn list_orders(conn: &mut DbConn, filter: &OrderFilter) -> Result<OrderListing, AppError> {
    let sort = OrderSort::parse(filter.sort.as_deref());
    let query = filtered(filter);
    let query = match sort {
        OrderSort::CreatedAt => query.order_by((orders::created_at.asc(), orders::id.asc())),
        OrderSort::CreatedAtDesc => query.order_by((orders::created_at.desc(), orders::id.desc())),
        OrderSort::Total => query.order_by((orders::total.asc(), orders::id.asc())),
        OrderSort::TotalDesc => query.order_by((orders::total.desc(), orders::id.desc())),
        OrderSort::Id => query.order_by(orders::id.asc()),
        OrderSort::IdDesc => query.order_by(orders::id.desc()),
    };

    let orders: Vec<OrderEntity> = query
        .select(OrderEntity::as_select())
        .load(conn)
        .await
        .context("Failed to list orders")?;

    let total_revenue: Option<BigDecimal> = filtered(filter)
        .select(diesel::dsl::sum(orders::total))
        .first(conn)
        .await
        .context("Failed to sum order revenue")?;

    Ok(OrderListing {
        orders,
        total_revenue: total_revenue.unwrap_or_else(BigDecimal::zero),
        sort,
    })
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderDetail {
    pub order: OrderEntity,
    pub items: Vec<OrderItemEntity>,
}

pub async fn order_detail(conn: &mut DbConn, id: i32) -> Result<OrderDetail, AppError> {
    let order: OrderEntity = orders::table
        .find(id)
        .select(OrderEntity::as_select())
        .first(conn)
        .await?;

    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .order_by(order_items::id.asc())
        .select(OrderItemEntity::as_select())
        .load(conn)
        .await
        .context("Failed to load order items")?;

    Ok(OrderDetail { order, items })
}

/// Order detail visible to the session that placed it. Anyone else gets a 404.
pub async fn order_for_session(
    conn: &mut DbConn,
    id: i32,
    session: &SessionCtx,
) -> Result<OrderDetail, AppError> {
    let detail = order_detail(conn, id).await?;
    let owner = session.user.as_ref().map(|user| user.id);

    if owner.is_none() || detail.order.user_id != owner {
        return Err(AppError::NotFound);
    }
    Ok(detail)
}

pub async fn orders_of_user(conn: &mut DbConn, user_id: i32) -> Result<Vec<OrderEntity>, AppError> {
    let orders = orders::table
        .filter(orders::user_id.eq(user_id))
        .order_by(orders::created_at.desc())
        .select(OrderEntity::as_select())
        .load(conn)
        .await
        .context("Failed to load user orders")?;
    Ok(orders)
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct PaymentUpdate {
    #[schema(value_type = String)]
    pub amount_paid: BigDecimal,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_transaction_id: Option<String>,
}

pub async fn update_payment(
    conn: &mut DbConn,
    id: i32,
    update: PaymentUpdate,
) -> Result<OrderEntity, AppError> {
    if update.amount_paid < BigDecimal::zero() {
        return Err(AppError::Validation("Amount paid can't be negative".into()));
    }

    let transaction_id = update
        .payment_transaction_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let order = diesel::update(orders::table.find(id))
        .set((
            orders::amount_paid.eq(update.amount_paid),
            orders::payment_status.eq(update.payment_status.as_str()),
            orders::payment_transaction_id.eq(transaction_id),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!(
        "Order {} payment set to {} ({} paid)",
        order.id,
        order.payment_status,
        order.amount_paid
    );
    Ok(order)
}

#[derive(Serialize, Debug, ToSchema)]
pub struct InvoiceLine {
    pub product_name: String,
    pub qty: i32,
    pub unit_price: String,
    pub line_total: String,
}

/// Printable view of an order with every amount formatted as taka.
#[derive(Serialize, Debug, ToSchema)]
pub struct Invoice {
    pub order: OrderEntity,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: String,
    pub delivery_charge: String,
    pub discount: String,
    pub total: String,
    pub amount_paid: String,
    pub amount_due: String,
}

impl From<OrderDetail> for Invoice {
    fn from(detail: OrderDetail) -> Self {
        use crate::cart::format_taka;

        let lines = detail
            .items
            .iter()
            .map(|item| InvoiceLine {
                product_name: item.product_name.clone(),
                qty: item.qty,
                unit_price: format_taka(&item.price),
                line_total: format_taka(&item.line_total()),
            })
            .collect();
        let order = detail.order;
        let due = &order.total - &order.amount_paid;
        let due = if due < BigDecimal::zero() { BigDecimal::zero() } else { due };

        Invoice {
            lines,
            subtotal: format_taka(&order.subtotal),
            delivery_charge: format_taka(&order.delivery_charge),
            discount: format_taka(&order.discount),
            total: format_taka(&order.total),
            amount_paid: format_taka(&order.amount_paid),
            amount_due: format_taka(&due),
            order,
        }
    }
}
