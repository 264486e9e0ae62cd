pub mod accounts;
pub mod admin;
pub mod cart;
pub mod checkout;
pub mod storefront;
