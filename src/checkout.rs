//! Order placement: turns the session cart plus the checkout form into an order.
//!
//! Amounts the browser echoes back (delivery charge, coupon discount) are never trusted. The
//! delivery charge comes from [`DeliveryMethod::charge`] and the coupon is looked up again at
//! order time.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::Context;
use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    cart::Cart,
    coupon::{self, CouponError, CouponGrant},
    identity::{self, GuestDetails},
    infra::{aliases::DbConn, app_error::AppError},
    models::{CreateOrderEntity, CreateOrderItemEntity, OrderEntity},
    phone::{self, PhoneError},
    schema::{order_items, orders, products},
    session::{self, SessionCtx},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Home,
    Pickup,
    Express,
}

impl DeliveryMethod {
    pub const ALL: [DeliveryMethod; 3] = [
        DeliveryMethod::Home,
        DeliveryMethod::Pickup,
        DeliveryMethod::Express,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Home => "home",
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::Express => "express",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliveryMethod::Home => "Home Delivery",
            DeliveryMethod::Pickup => "Store Pickup",
            DeliveryMethod::Express => "Express Delivery",
        }
    }

    pub fn charge(&self) -> BigDecimal {
        match self {
            DeliveryMethod::Home => BigDecimal::from(60),
            DeliveryMethod::Pickup => BigDecimal::zero(),
            DeliveryMethod::Express => BigDecimal::from(300),
        }
    }

    /// A blank or missing value means home delivery.
    pub fn from_form(raw: Option<&str>) -> Result<Self, CheckoutError> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(DeliveryMethod::Home),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMethod {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(DeliveryMethod::Home),
            "pickup" => Ok(DeliveryMethod::Pickup),
            "express" => Ok(DeliveryMethod::Express),
            other => Err(CheckoutError::UnknownDelivery(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Online,
    Pos,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Online => "online",
            PaymentMethod::Pos => "pos",
        }
    }

    /// A blank or missing value means cash on delivery.
    pub fn from_form(raw: Option<&str>) -> Result<Self, CheckoutError> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(PaymentMethod::Cod),
            Some(value) => value.parse(),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(PaymentMethod::Cod),
            "online" => Ok(PaymentMethod::Online),
            "pos" => Ok(PaymentMethod::Pos),
            other => Err(CheckoutError::UnknownPayment(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    PartialPaid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::PartialPaid => "partial_paid",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::PartialPaid => "Partial Paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "partial_paid" => Ok(PaymentStatus::PartialPaid),
            other => Err(AppError::Validation(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct DeliveryOption {
    pub method: DeliveryMethod,
    pub label: String,
    #[schema(value_type = String)]
    pub charge: BigDecimal,
}

pub fn delivery_options() -> Vec<DeliveryOption> {
    DeliveryMethod::ALL
        .iter()
        .map(|method| DeliveryOption {
            method: *method,
            label: method.label().to_string(),
            charge: method.charge(),
        })
        .collect()
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct OrderTotals {
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
    #[schema(value_type = String)]
    pub delivery_charge: BigDecimal,
    #[schema(value_type = String)]
    pub discount: BigDecimal,
    #[schema(value_type = String)]
    pub total: BigDecimal,
}

impl OrderTotals {
    /// `total = subtotal + delivery_charge - discount`, with the discount never exceeding the
    /// subtotal.
    pub fn compute(cart: &Cart, delivery: DeliveryMethod, coupon: Option<&CouponGrant>) -> Self {
        let subtotal = cart.total();
        let delivery_charge = delivery.charge();
        let discount = match coupon {
            Some(grant) if grant.discount > subtotal => subtotal.clone(),
            Some(grant) => grant.discount.clone(),
            None => BigDecimal::zero(),
        };
        let total = &subtotal + &delivery_charge - &discount;

        OrderTotals {
            subtotal,
            delivery_charge,
            discount,
            total,
        }
    }
}

/// Checkout form as posted by the storefront. `delivery_charge` and `coupon_discount` are
/// accepted for compatibility only.
#[derive(Deserialize, Debug, Default, Clone, ToSchema)]
#[serde(default)]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub upazila: String,
    pub district: String,
    pub comment: Option<String>,
    pub payment_method: Option<String>,
    pub delivery_method: Option<String>,
    pub delivery_charge: Option<String>,
    pub coupon_discount: Option<String>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty.")]
    EmptyCart,
    #[error(transparent)]
    Phone(#[from] PhoneError),
    #[error("Unknown delivery method: {0}")]
    UnknownDelivery(String),
    #[error("Unknown payment method: {0}")]
    UnknownPayment(String),
    #[error("{0}")]
    Coupon(String),
    #[error("Quantity of {0} is too large")]
    QuantityOverflow(String),
    #[error(transparent)]
    App(#[from] AppError),
}

impl From<CouponError> for CheckoutError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::Lookup(err) => CheckoutError::App(err),
            other => CheckoutError::Coupon(other.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::App(err) => err,
            CheckoutError::EmptyCart => AppError::BadRequest("Your cart is empty.".into()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

fn normalized(value: &str) -> String {
    value.trim().to_string()
}

fn log_echo_mismatch(field: &str, sent: Option<&str>, computed: &BigDecimal) {
    let Some(sent) = sent.map(str::trim).filter(|value| !value.is_empty()) else {
        return;
    };
    match sent.parse::<BigDecimal>() {
        Ok(amount) if &amount == computed => {}
        Ok(amount) => tracing::warn!(
            "Client sent {} {} but server computed {}, using server value",
            field,
            amount,
            computed
        ),
        Err(_) => tracing::warn!("Client sent unparseable {} {:?}, ignoring", field, sent),
    }
}

/// Places an order from the session cart.
///
/// The guest's account is resolved before the order transaction, but the session is only signed
/// in as that account if the order commits. The order, its items and the cart reset are
/// committed together; if the cart changed since it was read the whole order is rolled back with
/// a conflict.
pub async fn place_order(
    conn: &mut DbConn,
    session: &SessionCtx,
    form: CheckoutForm,
    today: NaiveDate,
) -> Result<OrderEntity, CheckoutError> {
    let (cart, cart_version) = session::load_cart(conn, session.id).await?;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mobile = phone::validate_bd_phone(&form.phone)?.to_string();
    let delivery = DeliveryMethod::from_form(form.delivery_method.as_deref())?;
    let payment = PaymentMethod::from_form(form.payment_method.as_deref())?;

    let coupon_code = form
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());
    let grant = match coupon_code {
        Some(code) => Some(coupon::validate(conn, code, today).await?),
        None => None,
    };

    let totals = OrderTotals::compute(&cart, delivery, grant.as_ref());
    log_echo_mismatch(
        "delivery_charge",
        form.delivery_charge.as_deref(),
        &totals.delivery_charge,
    );
    log_echo_mismatch(
        "coupon_discount",
        form.coupon_discount.as_deref(),
        &totals.discount,
    );

    let (user_id, signs_in_guest) = match &session.user {
        Some(user) => (user.id, false),
        None => {
            let full_name = format!("{} {}", form.first_name.trim(), form.last_name.trim());
            let details = GuestDetails {
                name: Some(full_name.trim().to_string()).filter(|name| !name.is_empty()),
                email: Some(form.email.trim().to_lowercase()).filter(|email| !email.is_empty()),
            };
            let user = identity::resolve_guest(conn, &mobile, &details).await?;
            (user.id, true)
        }
    };

    let mut lines = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let qty = i32::try_from(line.qty)
            .map_err(|_| CheckoutError::QuantityOverflow(line.name.clone()))?;
        lines.push((line.product_id, line.name.clone(), line.price.clone(), qty));
    }

    let new_order = CreateOrderEntity {
        user_id: Some(user_id),
        first_name: normalized(&form.first_name),
        last_name: normalized(&form.last_name),
        address: normalized(&form.address),
        mobile,
        email: form.email.trim().to_lowercase(),
        upazila: normalized(&form.upazila),
        district: normalized(&form.district),
        comment: form
            .comment
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty()),
        payment_method: payment.as_str().to_string(),
        delivery_method: delivery.as_str().to_string(),
        coupon_code: grant.map(|grant| grant.code),
        subtotal: totals.subtotal,
        discount: totals.discount,
        delivery_charge: totals.delivery_charge,
        total: totals.total,
    };
    let session_id = session.id;

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order = diesel::insert_into(orders::table)
                    .values(new_order)
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                // Lines whose product was deleted since it was carted keep only the snapshot.
                let cart_ids: Vec<i32> = lines.iter().map(|(id, ..)| *id).collect();
                let live_ids: HashSet<i32> = products::table
                    .filter(products::id.eq_any(cart_ids))
                    .select(products::id)
                    .for_key_share()
                    .load::<i32>(conn)
                    .await
                    .context("Failed to check cart products")?
                    .into_iter()
                    .collect();

                let items: Vec<CreateOrderItemEntity> = lines
                    .into_iter()
                    .map(|(product_id, product_name, price, qty)| CreateOrderItemEntity {
                        order_id: order.id,
                        product_id: live_ids.contains(&product_id).then_some(product_id),
                        product_name,
                        price,
                        qty,
                    })
                    .collect();

                diesel::insert_into(order_items::table)
                    .values(items)
                    .execute(conn)
                    .await
                    .context("Failed to create order items")?;

                if !session::store_cart(conn, session_id, &Cart::default(), cart_version).await? {
                    return Err(AppError::Conflict(
                        "Your cart changed while placing the order, please review it and retry"
                            .into(),
                    ));
                }

                if signs_in_guest {
                    session::set_user(conn, session_id, Some(user_id)).await?;
                }

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    tracing::info!(
        "Placed order {} for user {} ({} via {})",
        order.id,
        user_id,
        order.total,
        order.delivery_method
    );
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::CouponKind;

    fn dec(raw: &str) -> BigDecimal {
        raw.parse().unwrap()
    }

    fn widget_cart() -> Cart {
        let mut cart = Cart::default();
        cart.add(7, "Widget", dec("100.0"), 2).unwrap();
        cart
    }

    fn grant(amount: &str) -> CouponGrant {
        CouponGrant {
            code: "SAVE".into(),
            kind: CouponKind::Coupon,
            discount: dec(amount),
        }
    }

    #[test]
    fn home_delivery_adds_sixty() {
        let totals = OrderTotals::compute(&widget_cart(), DeliveryMethod::Home, None);
        assert_eq!(totals.subtotal, dec("200"));
        assert_eq!(totals.delivery_charge, dec("60"));
        assert_eq!(totals.discount, dec("0"));
        assert_eq!(totals.total, dec("260"));
    }

    #[test]
    fn coupon_reduces_total() {
        let totals =
            OrderTotals::compute(&widget_cart(), DeliveryMethod::Pickup, Some(&grant("50")));
        assert_eq!(totals.total, dec("150"));
    }

    #[test]
    fn discount_is_capped_at_subtotal() {
        let totals =
            OrderTotals::compute(&widget_cart(), DeliveryMethod::Express, Some(&grant("999")));
        assert_eq!(totals.discount, dec("200"));
        assert_eq!(totals.total, dec("300"));
    }

    #[test]
    fn totals_always_balance() {
        for method in DeliveryMethod::ALL {
            for amount in ["0", "10", "200", "5000"] {
                let t = OrderTotals::compute(&widget_cart(), method, Some(&grant(amount)));
                assert_eq!(t.total, &t.subtotal + &t.delivery_charge - &t.discount);
                assert!(t.discount <= t.subtotal);
            }
        }
    }

    #[test]
    fn delivery_method_defaults_to_home() {
        assert_eq!(DeliveryMethod::from_form(None).unwrap(), DeliveryMethod::Home);
        assert_eq!(
            DeliveryMethod::from_form(Some("  ")).unwrap(),
            DeliveryMethod::Home
        );
        assert_eq!(
            DeliveryMethod::from_form(Some("express")).unwrap(),
            DeliveryMethod::Express
        );
        assert!(matches!(
            DeliveryMethod::from_form(Some("drone")),
            Err(CheckoutError::UnknownDelivery(_))
        ));
    }

    #[test]
    fn payment_method_defaults_to_cod() {
        assert_eq!(PaymentMethod::from_form(None).unwrap(), PaymentMethod::Cod);
        assert_eq!(
            PaymentMethod::from_form(Some("pos")).unwrap(),
            PaymentMethod::Pos
        );
        assert!(PaymentMethod::from_form(Some("barter")).is_err());
    }

    #[test]
    fn payment_status_parses_all_values() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::PartialPaid,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn delivery_table_matches_charges() {
        let options = delivery_options();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].charge, dec("60"));
        assert_eq!(options[1].charge, dec("0"));
        assert_eq!(options[2].charge, dec("300"));
    }

    #[test]
    fn phone_errors_become_validation_errors() {
        let err: AppError = CheckoutError::from(PhoneError::LocalPrefix).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.to_string(),
            "Local Bangladeshi numbers must start with 01."
        );
    }

    #[test]
    fn coupon_failures_keep_their_message() {
        let err = CheckoutError::from(CouponError::Inactive);
        assert_eq!(err.to_string(), "Code expired or inactive.");
    }
}
