//! Shared fixtures for tests that talk to a real Postgres. They read `DATABASE_URL` (a `.env`
//! file works too) and apply the embedded migrations before handing out connections.

#![allow(dead_code)]

use bigdecimal::BigDecimal;
use diesel::SelectableHelper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use storefront::{
    cart::Cart,
    catalog,
    infra::{
        aliases::{DbConn, DbPool},
        config::DatabaseConfig,
        db,
    },
    models::{CategoryEntity, CreateCategoryEntity, CreateProductEntity, ProductEntity},
    schema::{categories, products},
    session::{self, SessionCtx},
};
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub async fn pool() -> DbPool {
    let _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for DB tests");
    db::run_migrations_blocking(MIGRATIONS, &url)
        .await
        .expect("migrations should apply");
    db::create_pool(&DatabaseConfig { url, pool_size: 4 })
        .await
        .expect("pool should connect")
}

/// A valid Bangladeshi mobile number nobody else has used yet.
pub fn fresh_phone() -> String {
    let tail = Uuid::new_v4().as_u128() % 100_000_000;
    format!("017{tail:08}")
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix} {}", &Uuid::new_v4().simple().to_string()[..8])
}

pub async fn seed_product(conn: &mut DbConn, name: &str, price: &str) -> ProductEntity {
    let category_name = unique("Gadgets");
    let category_slug = catalog::allocate_category_slug(conn, &category_name, None)
        .await
        .unwrap();
    let category: CategoryEntity = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            name: category_name,
            slug: category_slug,
            icon: None,
            is_featured: false,
            parent_id: None,
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap();

    let slug = catalog::allocate_product_slug(conn, name, None).await.unwrap();
    diesel::insert_into(products::table)
        .values(CreateProductEntity {
            category_id: category.id,
            brand_id: None,
            name: name.to_string(),
            slug,
            short_description: None,
            description: None,
            specifications: None,
            price: price.parse::<BigDecimal>().unwrap(),
            old_price: None,
            discount_percent: 0,
            stock_quantity: 10,
            status: "regular".into(),
            is_featured: false,
            is_active: true,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .unwrap()
}

/// An anonymous session whose cart holds `qty` units of `product`. The first cart write creates
/// the session row.
pub async fn session_with(conn: &mut DbConn, product: &ProductEntity, qty: u32) -> SessionCtx {
    let ctx = SessionCtx {
        id: Uuid::new_v4(),
        user: None,
    };
    let mut cart = Cart::default();
    cart.add(product.id, &product.name, product.price.clone(), qty)
        .unwrap();
    assert!(session::store_cart(conn, ctx.id, &cart, 0).await.unwrap());

    ctx
}
