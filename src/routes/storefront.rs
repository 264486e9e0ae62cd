use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    catalog::{self, BrandIndex},
    infra::{
        aliases::DbConn,
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{BrandEntity, CategoryEntity, HotDealEntity, ProductEntity, ProductImageEntity},
    schema::{brands, categories, hot_deals, product_images, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(home))
        .routes(utoipa_axum::routes!(category_menu))
        .routes(utoipa_axum::routes!(category_products))
        .routes(utoipa_axum::routes!(product_detail))
        .routes(utoipa_axum::routes!(product_quickview))
        .routes(utoipa_axum::routes!(brand_list))
        .routes(utoipa_axum::routes!(brand_products))
}

/// Product as listed on storefront pages, with its effective price.
#[derive(Serialize, ToSchema)]
pub struct ProductCard {
    #[serde(flatten)]
    pub product: ProductEntity,
    #[schema(value_type = String)]
    pub discount_price: BigDecimal,
}

impl From<ProductEntity> for ProductCard {
    fn from(product: ProductEntity) -> Self {
        ProductCard {
            discount_price: product.discount_price(),
            product,
        }
    }
}

fn cards(products: Vec<ProductEntity>) -> Vec<ProductCard> {
    products.into_iter().map(ProductCard::from).collect()
}

#[derive(Serialize, ToSchema)]
struct HomeRes {
    products: Vec<ProductCard>,
    deals: Vec<HotDealEntity>,
    brands: Vec<BrandEntity>,
}

/// Storefront landing page: newest active products, active brands and running hot deals.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Storefront"],
    responses(
        (status = 200, description = "Home page data", body = StdResponse<HomeRes, String>)
    )
)]
async fn home(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let products: Vec<ProductEntity> = products::table
        .filter(products::is_active.eq(true))
        .order_by(products::created_at.desc())
        .select(ProductEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get products")?;

    let brands: Vec<BrandEntity> = brands::table
        .filter(brands::is_active.eq(true))
        .order_by(brands::name.asc())
        .select(BrandEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get brands")?;

    let now = Utc::now();
    let deals: Vec<HotDealEntity> = hot_deals::table
        .filter(hot_deals::start_date.le(now))
        .filter(hot_deals::end_date.ge(now))
        .order_by(hot_deals::end_date.asc())
        .select(HotDealEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get hot deals")?;

    Ok(StdResponse {
        data: Some(HomeRes {
            products: cards(products),
            deals,
            brands,
        }),
        message: Some("Get home page successfully"),
    })
}

#[derive(Serialize, ToSchema)]
pub struct MenuEntry {
    #[serde(flatten)]
    pub category: CategoryEntity,
    pub children: Vec<CategoryEntity>,
}

/// Top-level categories with their direct children, for the navigation menu.
#[utoipa::path(
    get,
    path = "/categories/menu",
    tags = ["Storefront"],
    responses(
        (status = 200, description = "Category menu", body = StdResponse<Vec<MenuEntry>, String>)
    )
)]
async fn category_menu(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let all: Vec<CategoryEntity> = categories::table
        .order_by(categories::name.asc())
        .select(CategoryEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get categories")?;

    let (roots, children): (Vec<_>, Vec<_>) =
        all.into_iter().partition(|category| category.parent_id.is_none());

    let menu: Vec<MenuEntry> = roots
        .into_iter()
        .map(|category| MenuEntry {
            children: children
                .iter()
                .filter(|child| child.parent_id == Some(category.id))
                .cloned()
                .collect(),
            category,
        })
        .collect();

    Ok(StdResponse {
        data: Some(menu),
        message: Some("Get category menu successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct CategoryProductsRes {
    category: CategoryEntity,
    products: Vec<ProductCard>,
}

/// Active products of a category and every category below it, newest first.
#[utoipa::path(
    get,
    path = "/category/{slug}/",
    tags = ["Storefront"],
    params(
        ("slug" = String, Path, description = "Category slug")
    ),
    responses(
        (status = 200, description = "Category products", body = StdResponse<CategoryProductsRes, String>),
        (status = 404, description = "No such category")
    )
)]
async fn category_products(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = categories::table
        .filter(categories::slug.eq(&slug))
        .order_by(categories::id.asc())
        .select(CategoryEntity::as_select())
        .first(conn)
        .await?;

    let edges = catalog::category_edges(conn).await?;
    let mut ids = catalog::descendant_ids(category.id, &edges);
    ids.push(category.id);

    let products: Vec<ProductEntity> = products::table
        .filter(products::category_id.eq_any(ids))
        .filter(products::is_active.eq(true))
        .order_by(products::created_at.desc())
        .select(ProductEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get category products")?;

    Ok(StdResponse {
        data: Some(CategoryProductsRes {
            category,
            products: cards(products),
        }),
        message: Some("Get category products successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct ProductDetailRes {
    product: ProductCard,
    images: Vec<ProductImageEntity>,
    category: CategoryEntity,
    brand: Option<BrandEntity>,
    hot_deal: Option<HotDealEntity>,
}

async fn load_product_detail(
    conn: &mut DbConn,
    product: ProductEntity,
) -> Result<ProductDetailRes, AppError> {
    let images: Vec<ProductImageEntity> = product_images::table
        .filter(product_images::product_id.eq(product.id))
        .order_by((product_images::sort_order.asc(), product_images::id.asc()))
        .select(ProductImageEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get product images")?;

    let category: CategoryEntity = categories::table
        .find(product.category_id)
        .select(CategoryEntity::as_select())
        .first(conn)
        .await
        .context("Failed to get product category")?;

    let brand: Option<BrandEntity> = match product.brand_id {
        Some(brand_id) => brands::table
            .find(brand_id)
            .select(BrandEntity::as_select())
            .first(conn)
            .await
            .optional()
            .context("Failed to get product brand")?,
        None => None,
    };

    let now = Utc::now();
    let hot_deal: Option<HotDealEntity> = hot_deals::table
        .filter(hot_deals::product_id.eq(product.id))
        .filter(hot_deals::start_date.le(now))
        .filter(hot_deals::end_date.ge(now))
        .order_by(hot_deals::end_date.asc())
        .select(HotDealEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get hot deal")?;

    Ok(ProductDetailRes {
        product: product.into(),
        images,
        category,
        brand,
        hot_deal,
    })
}

/// Product page by slug.
#[utoipa::path(
    get,
    path = "/product/{slug}/",
    tags = ["Storefront"],
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 200, description = "Product detail", body = StdResponse<ProductDetailRes, String>),
        (status = 404, description = "No such product")
    )
)]
async fn product_detail(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity = products::table
        .filter(products::slug.eq(&slug))
        .select(ProductEntity::as_select())
        .first(conn)
        .await?;

    let detail = load_product_detail(conn, product).await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Get product successfully"),
    })
}

/// Product summary for the quick-view popup.
#[utoipa::path(
    get,
    path = "/product/quickview/{id}/",
    tags = ["Storefront"],
    params(
        ("id" = i32, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product detail", body = StdResponse<ProductDetailRes, String>),
        (status = 404, description = "No such product")
    )
)]
async fn product_quickview(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity = products::table
        .find(id)
        .select(ProductEntity::as_select())
        .first(conn)
        .await?;

    let detail = load_product_detail(conn, product).await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Get product successfully"),
    })
}

/// All brands grouped by initial letter.
#[utoipa::path(
    get,
    path = "/brands/list/",
    tags = ["Storefront"],
    responses(
        (status = 200, description = "Brand index", body = StdResponse<BrandIndex, String>)
    )
)]
async fn brand_list(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brands: Vec<BrandEntity> = brands::table
        .select(BrandEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get brands")?;

    Ok(StdResponse {
        data: Some(catalog::brand_index(brands)),
        message: Some("Get brands successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct BrandProductsRes {
    brand: BrandEntity,
    products: Vec<ProductCard>,
}

/// A brand and its active products.
#[utoipa::path(
    get,
    path = "/brand/{id}/",
    tags = ["Storefront"],
    params(
        ("id" = i32, Path, description = "Brand ID")
    ),
    responses(
        (status = 200, description = "Brand products", body = StdResponse<BrandProductsRes, String>),
        (status = 404, description = "No such brand")
    )
)]
async fn brand_products(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brand: BrandEntity = brands::table
        .find(id)
        .select(BrandEntity::as_select())
        .first(conn)
        .await?;

    let products: Vec<ProductEntity> = products::table
        .filter(products::brand_id.eq(brand.id))
        .filter(products::is_active.eq(true))
        .order_by(products::created_at.desc())
        .select(ProductEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get brand products")?;

    Ok(StdResponse {
        data: Some(BrandProductsRes {
            brand,
            products: cards(products),
        }),
        message: Some("Get brand products successfully"),
    })
}
