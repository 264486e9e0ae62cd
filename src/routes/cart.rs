use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    cart::{Cart, CartError, CartLine, QtyChange, format_taka},
    coupon::{self, CouponError},
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::ProductEntity,
    schema::products,
    session::{self, SessionCtx},
};

pub const CART_PATH: &str = "/cart/";

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(add_to_cart))
        .routes(utoipa_axum::routes!(view_cart))
        .routes(utoipa_axum::routes!(update_cart))
        .routes(utoipa_axum::routes!(remove_from_cart))
        .routes(utoipa_axum::routes!(apply_coupon))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AddToCartParams {
    /// Units to add, defaults to 1.
    qty: Option<i64>,
}

#[derive(Serialize, ToSchema)]
struct AddToCartRes {
    product_name: String,
    cart_qty: u64,
    /// Formatted as taka, e.g. `৳1,234.00`.
    cart_total: String,
    cart_items: Vec<CartLine>,
}

/// Add a product to the session cart at its current discounted price.
#[utoipa::path(
    method(get, post),
    path = "/add-to-cart/{product_id}/",
    tags = ["Cart"],
    params(
        ("product_id" = i32, Path, description = "Product to add"),
        AddToCartParams
    ),
    responses(
        (status = 200, description = "Product added", body = StdResponse<AddToCartRes, String>),
        (status = 404, description = "No such product"),
        (status = 422, description = "Invalid quantity")
    )
)]
async fn add_to_cart(
    Path(product_id): Path<i32>,
    Query(params): Query<AddToCartParams>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
) -> Result<impl IntoResponse, AppError> {
    let qty = params.qty.unwrap_or(1);
    let qty = u32::try_from(qty)
        .ok()
        .filter(|qty| *qty >= 1)
        .ok_or(CartError::InvalidQuantity)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity = products::table
        .find(product_id)
        .filter(products::is_active.eq(true))
        .select(ProductEntity::as_select())
        .first(conn)
        .await?;
    let unit_price = product.discount_price();

    let (cart, _) = session::mutate_cart(conn, session.id, |cart| {
        cart.add(product.id, &product.name, unit_price.clone(), qty)?;
        Ok(())
    })
    .await?;

    tracing::debug!("Added {} x product {} to session {}", qty, product.id, session.id);

    Ok(StdResponse {
        data: Some(AddToCartRes {
            product_name: product.name,
            cart_qty: cart.total_qty(),
            cart_total: format_taka(&cart.total()),
            cart_items: cart.items,
        }),
        message: Some("Added to cart successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct CartRes {
    items: Vec<CartLine>,
    #[schema(value_type = String)]
    total: BigDecimal,
    total_formatted: String,
    total_qty: u64,
}

impl From<Cart> for CartRes {
    fn from(cart: Cart) -> Self {
        let total = cart.total();
        CartRes {
            total_formatted: format_taka(&total),
            total_qty: cart.total_qty(),
            total,
            items: cart.items,
        }
    }
}

/// Current session cart.
#[utoipa::path(
    get,
    path = "/cart/",
    tags = ["Cart"],
    responses(
        (status = 200, description = "Cart contents", body = StdResponse<CartRes, String>)
    )
)]
async fn view_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (cart, _) = session::load_cart(conn, session.id).await?;

    Ok(StdResponse {
        data: Some(CartRes::from(cart)),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct UpdateCartParams {
    /// `plus` or `minus`.
    #[serde(rename = "type")]
    change: Option<String>,
}

/// Step a cart line up or down by one unit. Unknown lines and change types are ignored.
#[utoipa::path(
    method(get, post),
    path = "/update-cart/{key}/",
    tags = ["Cart"],
    params(
        ("key" = String, Path, description = "Product ID of the cart line"),
        UpdateCartParams
    ),
    responses(
        (status = 303, description = "Redirect to the cart")
    )
)]
async fn update_cart(
    Path(key): Path<String>,
    Query(params): Query<UpdateCartParams>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
) -> Result<impl IntoResponse, AppError> {
    let product_id = key.trim().parse::<i32>().ok();
    let change = params
        .change
        .as_deref()
        .and_then(|raw| raw.parse::<QtyChange>().ok());

    if let (Some(product_id), Some(change)) = (product_id, change) {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        session::mutate_cart(conn, session.id, |cart| Ok(cart.update(product_id, change)))
            .await?;
    }

    Ok(Redirect::to(CART_PATH))
}

/// Drop a line from the cart regardless of quantity.
#[utoipa::path(
    method(get, post),
    path = "/remove/{product_id}/",
    tags = ["Cart"],
    params(
        ("product_id" = i32, Path, description = "Product to remove")
    ),
    responses(
        (status = 303, description = "Redirect to the cart")
    )
)]
async fn remove_from_cart(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<SessionCtx>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    session::mutate_cart(conn, session.id, |cart| Ok(cart.remove(product_id))).await?;

    Ok(Redirect::to(CART_PATH))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ApplyCouponParams {
    code: Option<String>,
}

/// Coupon check result, shaped for the storefront's coupon box.
#[derive(Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
enum CouponCheck {
    Success {
        #[serde(rename = "type")]
        kind: String,
        discount: f64,
        message: String,
    },
    Error {
        message: String,
    },
}

/// Check a coupon or gift code without applying it to an order.
#[utoipa::path(
    get,
    path = "/apply-coupon/",
    tags = ["Cart"],
    params(ApplyCouponParams),
    responses(
        (status = 200, description = "Coupon check result", body = CouponCheck)
    )
)]
async fn apply_coupon(
    Query(params): Query<ApplyCouponParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let code = params.code.unwrap_or_default();
    let check = match coupon::validate(conn, &code, Utc::now().date_naive()).await {
        Ok(grant) => CouponCheck::Success {
            kind: grant.kind.as_str().to_string(),
            discount: grant.discount.to_f64().unwrap_or_default(),
            message: format!("{} applied successfully!", grant.kind.label()),
        },
        Err(CouponError::Lookup(err)) => return Err(err),
        Err(err) => CouponCheck::Error {
            message: err.to_string(),
        },
    };

    Ok(axum::Json(check))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_check_serializes_like_the_storefront_expects() {
        let ok = serde_json::to_value(CouponCheck::Success {
            kind: "gift".into(),
            discount: 150.0,
            message: "Gift applied successfully!".into(),
        })
        .unwrap();
        assert_eq!(
            ok,
            serde_json::json!({
                "status": "success",
                "type": "gift",
                "discount": 150.0,
                "message": "Gift applied successfully!"
            })
        );

        let err = serde_json::to_value(CouponCheck::Error {
            message: "Invalid coupon or gift code.".into(),
        })
        .unwrap();
        assert_eq!(
            err,
            serde_json::json!({"status": "error", "message": "Invalid coupon or gift code."})
        );
    }

    #[test]
    fn cart_errors_are_validation_errors() {
        let err: AppError = CartError::InvalidQuantity.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
