use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::{NaiveDate, Utc};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    coupon::CouponKind,
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{CouponEntity, CreateCouponEntity, CreateHotDealEntity, HotDealEntity},
    schema::{coupons, hot_deals},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest(
            "/coupons",
            OpenApiRouter::new()
                .routes(utoipa_axum::routes!(list_coupons, create_coupon))
                .routes(utoipa_axum::routes!(delete_coupon)),
        )
        .nest(
            "/hot-deals",
            OpenApiRouter::new()
                .routes(utoipa_axum::routes!(list_hot_deals, create_hot_deal))
                .routes(utoipa_axum::routes!(delete_hot_deal)),
        )
}

// Coupons

fn coupon_kind_default() -> CouponKind {
    CouponKind::Coupon
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
struct CouponReq {
    code: String,
    #[serde(default = "coupon_kind_default")]
    kind: CouponKind,
    #[schema(value_type = String)]
    discount_amount: BigDecimal,
    #[serde(default = "default_true")]
    is_active: bool,
    expiry_date: Option<NaiveDate>,
}

impl TryFrom<CouponReq> for CreateCouponEntity {
    type Error = AppError;

    fn try_from(req: CouponReq) -> Result<Self, Self::Error> {
        let code = req.code.trim().to_string();
        if code.is_empty() {
            return Err(AppError::Validation("Coupon code must be set".into()));
        }
        if req.discount_amount < BigDecimal::zero() {
            return Err(AppError::Validation("Discount amount can't be negative".into()));
        }

        Ok(CreateCouponEntity {
            code,
            kind: req.kind.as_str().to_string(),
            discount_amount: req.discount_amount,
            is_active: req.is_active,
            expiry_date: req.expiry_date,
        })
    }
}

#[derive(Serialize, ToSchema)]
struct CouponRes {
    #[serde(flatten)]
    coupon: CouponEntity,
    is_valid_today: bool,
}

impl From<CouponEntity> for CouponRes {
    fn from(coupon: CouponEntity) -> Self {
        CouponRes {
            is_valid_today: coupon.is_valid_on(Utc::now().date_naive()),
            coupon,
        }
    }
}

#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin promotions"],
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "List all coupons", body = StdResponse<Vec<CouponRes>, String>)
    )
)]
async fn list_coupons(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let coupons: Vec<CouponEntity> = coupons::table
        .order_by(coupons::code.asc())
        .select(CouponEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get coupons")?;

    Ok(StdResponse {
        data: Some(coupons.into_iter().map(CouponRes::from).collect::<Vec<_>>()),
        message: Some("Get coupons successfully"),
    })
}

/// Create a coupon or gift code. Codes are unique regardless of case.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin promotions"],
    security(("sessionCookie" = [])),
    request_body = CouponReq,
    responses(
        (status = 200, description = "Created coupon successfully", body = StdResponse<CouponRes, String>),
        (status = 409, description = "Code already exists"),
        (status = 422, description = "Invalid coupon")
    )
)]
async fn create_coupon(
    State(state): State<AppState>,
    Json(body): Json<CouponReq>,
) -> Result<impl IntoResponse, AppError> {
    let new_coupon = CreateCouponEntity::try_from(body)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let coupon: CouponEntity = diesel::insert_into(coupons::table)
        .values(new_coupon)
        .returning(CouponEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Created {} {}", coupon.kind, coupon.code);

    Ok(StdResponse {
        data: Some(CouponRes::from(coupon)),
        message: Some("Created coupon successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/{id}/delete/",
    tags = ["Admin promotions"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Coupon ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted coupon successfully", body = StdResponse<CouponEntity, String>),
        (status = 404, description = "No such coupon")
    )
)]
async fn delete_coupon(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let coupon: CouponEntity = diesel::delete(coupons::table.find(id))
        .returning(CouponEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(coupon),
        message: Some("Deleted coupon successfully"),
    })
}

// Hot deals

#[derive(Serialize, ToSchema)]
struct HotDealRes {
    #[serde(flatten)]
    deal: HotDealEntity,
    is_active: bool,
}

impl From<HotDealEntity> for HotDealRes {
    fn from(deal: HotDealEntity) -> Self {
        HotDealRes {
            is_active: deal.is_active_at(Utc::now()),
            deal,
        }
    }
}

#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin promotions"],
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "List all hot deals", body = StdResponse<Vec<HotDealRes>, String>)
    )
)]
async fn list_hot_deals(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deals: Vec<HotDealEntity> = hot_deals::table
        .order_by(hot_deals::start_date.desc())
        .select(HotDealEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get hot deals")?;

    Ok(StdResponse {
        data: Some(deals.into_iter().map(HotDealRes::from).collect::<Vec<_>>()),
        message: Some("Get hot deals successfully"),
    })
}

/// Schedule a special price for a product.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin promotions"],
    security(("sessionCookie" = [])),
    request_body = CreateHotDealEntity,
    responses(
        (status = 200, description = "Created hot deal successfully", body = StdResponse<HotDealRes, String>),
        (status = 422, description = "Invalid hot deal")
    )
)]
async fn create_hot_deal(
    State(state): State<AppState>,
    Json(body): Json<CreateHotDealEntity>,
) -> Result<impl IntoResponse, AppError> {
    if body.end_date < body.start_date {
        return Err(AppError::Validation(
            "A hot deal can't end before it starts".into(),
        ));
    }
    if body.special_price < BigDecimal::zero() {
        return Err(AppError::Validation("Special price can't be negative".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deal: HotDealEntity = diesel::insert_into(hot_deals::table)
        .values(body)
        .returning(HotDealEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(HotDealRes::from(deal)),
        message: Some("Created hot deal successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/{id}/delete/",
    tags = ["Admin promotions"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Hot deal ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted hot deal successfully", body = StdResponse<HotDealEntity, String>),
        (status = 404, description = "No such hot deal")
    )
)]
async fn delete_hot_deal(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deal: HotDealEntity = diesel::delete(hot_deals::table.find(id))
        .returning(HotDealEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deal),
        message: Some("Deleted hot deal successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_code_is_trimmed_and_kind_defaults() {
        let req: CouponReq = serde_json::from_value(serde_json::json!({
            "code": "  EID500 ",
            "discount_amount": "500"
        }))
        .unwrap();
        let coupon = CreateCouponEntity::try_from(req).unwrap();
        assert_eq!(coupon.code, "EID500");
        assert_eq!(coupon.kind, "coupon");
        assert!(coupon.is_active);
    }

    #[test]
    fn negative_discount_is_rejected() {
        let req: CouponReq = serde_json::from_value(serde_json::json!({
            "code": "OOPS",
            "kind": "gift",
            "discount_amount": "-1"
        }))
        .unwrap();
        assert!(CreateCouponEntity::try_from(req).is_err());
    }
}
