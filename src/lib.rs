pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupon;
pub mod identity;
pub mod infra;
pub mod models;
pub mod orders;
pub mod phone;
pub mod routes;
pub mod schema;
pub mod session;
