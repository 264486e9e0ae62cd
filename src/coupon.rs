use std::{fmt, str::FromStr};

use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, sql_types::Text};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    infra::{aliases::DbConn, app_error::AppError},
    models::CouponEntity,
    schema::coupons,
};

diesel::define_sql_function!(fn lower(x: Text) -> Text);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    Coupon,
    Gift,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Coupon => "coupon",
            CouponKind::Gift => "gift",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CouponKind::Coupon => "Coupon",
            CouponKind::Gift => "Gift",
        }
    }
}

impl fmt::Display for CouponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CouponKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coupon" => Ok(CouponKind::Coupon),
            "gift" => Ok(CouponKind::Gift),
            other => Err(AppError::Validation(format!("Unknown coupon type: {other}"))),
        }
    }
}

#[derive(Debug, Error)]
pub enum CouponError {
    #[error("Invalid coupon or gift code.")]
    NotFound,
    #[error("Code expired or inactive.")]
    Inactive,
    #[error(transparent)]
    Lookup(#[from] AppError),
}

/// What a valid code is worth.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponGrant {
    pub code: String,
    pub kind: CouponKind,
    pub discount: BigDecimal,
}

impl CouponEntity {
    /// Usable iff active and not past its expiry date (the expiry day itself still counts).
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        self.is_active && self.expiry_date.is_none_or(|expiry| expiry >= today)
    }

    pub fn grant(&self, today: NaiveDate) -> Result<CouponGrant, CouponError> {
        if !self.is_valid_on(today) {
            return Err(CouponError::Inactive);
        }

        Ok(CouponGrant {
            code: self.code.clone(),
            kind: self.kind.parse().unwrap_or(CouponKind::Coupon),
            discount: self.discount_amount.clone(),
        })
    }
}

pub async fn find_by_code(conn: &mut DbConn, code: &str) -> Result<Option<CouponEntity>, AppError> {
    let coupon = coupons::table
        .filter(lower(coupons::code).eq(code.trim().to_lowercase()))
        .select(CouponEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up coupon")?;
    Ok(coupon)
}

/// Case-insensitive lookup followed by the activity/expiry check.
pub async fn validate(
    conn: &mut DbConn,
    code: &str,
    today: NaiveDate,
) -> Result<CouponGrant, CouponError> {
    if code.trim().is_empty() {
        return Err(CouponError::NotFound);
    }

    let coupon = find_by_code(conn, code).await?.ok_or(CouponError::NotFound)?;
    coupon.grant(today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(is_active: bool, expiry: Option<&str>) -> CouponEntity {
        CouponEntity {
            id: 1,
            code: "SAVE10".into(),
            kind: "coupon".into(),
            discount_amount: BigDecimal::from(10),
            is_active,
            expiry_date: expiry.map(|d| d.parse().unwrap()),
        }
    }

    fn day(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    #[test]
    fn active_without_expiry_is_valid() {
        let grant = coupon(true, None).grant(day("2026-10-19")).unwrap();
        assert_eq!(grant.discount, BigDecimal::from(10));
        assert_eq!(grant.kind, CouponKind::Coupon);
    }

    #[test]
    fn expiry_day_itself_is_still_valid() {
        assert!(coupon(true, Some("2026-10-19")).is_valid_on(day("2026-10-19")));
    }

    #[test]
    fn expired_coupon_is_invalid_even_when_active() {
        let err = coupon(true, Some("2026-10-18"))
            .grant(day("2026-10-19"))
            .unwrap_err();
        assert!(matches!(err, CouponError::Inactive));
        assert_eq!(err.to_string(), "Code expired or inactive.");
    }

    #[test]
    fn inactive_coupon_is_invalid() {
        assert!(!coupon(false, None).is_valid_on(day("2026-10-19")));
        assert!(!coupon(false, Some("2030-01-01")).is_valid_on(day("2026-10-19")));
    }

    #[test]
    fn gift_kind_is_reported() {
        let mut gift = coupon(true, None);
        gift.kind = "gift".into();
        let grant = gift.grant(day("2026-10-19")).unwrap();
        assert_eq!(grant.kind, CouponKind::Gift);
        assert_eq!(grant.kind.label(), "Gift");
    }
}
