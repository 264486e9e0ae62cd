use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Associations, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Catalog

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::brands)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BrandEntity {
    pub id: i32,
    pub name: String,
    pub logo: Option<String>,
    pub history: Option<String>,
    pub is_active: bool,
}

#[derive(Insertable, AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::brands)]
#[diesel(treat_none_as_null = true)]
pub struct CreateBrandEntity {
    pub name: String,
    pub logo: Option<String>,
    pub history: Option<String>,
    pub is_active: bool,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryEntity {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub is_featured: bool,
    pub parent_id: Option<i32>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub is_featured: bool,
    pub parent_id: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(CategoryEntity, foreign_key = category_id))]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i32,
    pub category_id: i32,
    pub brand_id: Option<i32>,
    pub name: String,
    pub slug: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub specifications: Option<String>,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    #[schema(value_type = Option<String>)]
    pub old_price: Option<BigDecimal>,
    pub discount_percent: i32,
    pub stock_quantity: i32,
    pub rating: f64,
    pub status: String,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = crate::schema::products)]
#[diesel(treat_none_as_null = true)]
pub struct CreateProductEntity {
    pub category_id: i32,
    pub brand_id: Option<i32>,
    pub name: String,
    pub slug: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub specifications: Option<String>,
    pub price: BigDecimal,
    pub old_price: Option<BigDecimal>,
    pub discount_percent: i32,
    pub stock_quantity: i32,
    pub status: String,
    pub is_featured: bool,
    pub is_active: bool,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(ProductEntity, foreign_key = product_id))]
#[diesel(table_name = crate::schema::product_images)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductImageEntity {
    pub id: i32,
    pub product_id: i32,
    pub image: String,
    pub alt_text: Option<String>,
    pub is_banner: bool,
    pub sort_order: i32,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::product_images)]
pub struct CreateProductImageEntity {
    #[serde(default)]
    pub product_id: i32,
    pub image: String,
    pub alt_text: Option<String>,
    #[serde(default)]
    pub is_banner: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::hot_deals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HotDealEntity {
    pub id: i32,
    pub product_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[schema(value_type = String)]
    pub special_price: BigDecimal,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::hot_deals)]
pub struct CreateHotDealEntity {
    pub product_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[schema(value_type = String)]
    pub special_price: BigDecimal,
}

// Coupons

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::coupons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CouponEntity {
    pub id: i32,
    pub code: String,
    pub kind: String,
    #[schema(value_type = String)]
    pub discount_amount: BigDecimal,
    pub is_active: bool,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::coupons)]
pub struct CreateCouponEntity {
    pub code: String,
    pub kind: String,
    pub discount_amount: BigDecimal,
    pub is_active: bool,
    pub expiry_date: Option<NaiveDate>,
}

// Accounts

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub has_credential: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub password_hash: Option<String>,
    pub has_credential: bool,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(primary_key(user_id))]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileEntity {
    pub user_id: i32,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionEntity {
    pub id: Uuid,
    pub user_id: Option<i32>,
    pub cart: Value,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub user_id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub mobile: String,
    pub email: String,
    pub upazila: String,
    pub district: String,
    pub comment: Option<String>,
    pub payment_method: String,
    pub delivery_method: String,
    pub coupon_code: Option<String>,
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
    #[schema(value_type = String)]
    pub discount: BigDecimal,
    #[schema(value_type = String)]
    pub delivery_charge: BigDecimal,
    #[schema(value_type = String)]
    pub total: BigDecimal,
    pub payment_status: String,
    #[schema(value_type = String)]
    pub amount_paid: BigDecimal,
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub user_id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub mobile: String,
    pub email: String,
    pub upazila: String,
    pub district: String,
    pub comment: Option<String>,
    pub payment_method: String,
    pub delivery_method: String,
    pub coupon_code: Option<String>,
    pub subtotal: BigDecimal,
    pub discount: BigDecimal,
    pub delivery_charge: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: i32,
    pub product_id: Option<i32>,
    pub product_name: String,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    pub qty: i32,
}

impl OrderItemEntity {
    pub fn line_total(&self) -> BigDecimal {
        &self.price * BigDecimal::from(self.qty)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub product_id: Option<i32>,
    pub product_name: String,
    pub price: BigDecimal,
    pub qty: i32,
}
