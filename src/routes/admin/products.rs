use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::{BigDecimal, Zero};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    catalog::{self, ProductStatus},
    infra::{
        aliases::DbConn,
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{CreateProductEntity, CreateProductImageEntity, ProductEntity, ProductImageEntity},
    schema::{product_images, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/products",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_products, create_product))
            .routes(utoipa_axum::routes!(edit_product))
            .routes(utoipa_axum::routes!(delete_product)),
    )
}

fn default_status() -> String {
    ProductStatus::Regular.as_str().to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
struct ProductReq {
    category_id: i32,
    brand_id: Option<i32>,
    name: String,
    short_description: Option<String>,
    description: Option<String>,
    specifications: Option<String>,
    #[schema(value_type = String)]
    price: BigDecimal,
    #[schema(value_type = Option<String>)]
    old_price: Option<BigDecimal>,
    #[serde(default)]
    discount_percent: i32,
    #[serde(default)]
    stock_quantity: i32,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    is_featured: bool,
    #[serde(default = "default_true")]
    is_active: bool,
    /// When present, replaces every image of the product.
    images: Option<Vec<CreateProductImageEntity>>,
}

impl ProductReq {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Product name must be set".into()));
        }
        if self.price < BigDecimal::zero() {
            return Err(AppError::Validation("Price can't be negative".into()));
        }
        if !(0..=100).contains(&self.discount_percent) {
            return Err(AppError::Validation(
                "Discount percent must be between 0 and 100".into(),
            ));
        }
        if self.stock_quantity < 0 {
            return Err(AppError::Validation("Stock quantity can't be negative".into()));
        }
        if self.images.iter().flatten().any(|image| image.sort_order < 0) {
            return Err(AppError::Validation("Image order can't be negative".into()));
        }
        self.status.parse::<ProductStatus>()?;
        Ok(())
    }

    fn into_entities(
        self,
        slug: String,
    ) -> (CreateProductEntity, Option<Vec<CreateProductImageEntity>>) {
        let product = CreateProductEntity {
            category_id: self.category_id,
            brand_id: self.brand_id,
            name: self.name.trim().to_string(),
            slug,
            short_description: self.short_description,
            description: self.description,
            specifications: self.specifications,
            price: self.price,
            old_price: self.old_price,
            discount_percent: self.discount_percent,
            stock_quantity: self.stock_quantity,
            status: self.status,
            is_featured: self.is_featured,
            is_active: self.is_active,
        };
        (product, self.images)
    }
}

#[derive(Serialize, ToSchema)]
struct ProductRes {
    product: ProductEntity,
    images: Vec<ProductImageEntity>,
}

/// All products, newest first, including inactive ones.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "List all products", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let products: Vec<ProductEntity> = products::table
        .order_by(products::created_at.desc())
        .select(ProductEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get products")?;

    Ok(StdResponse {
        data: Some(products),
        message: Some("Get products successfully"),
    })
}

/// Create a product and its images. The slug is derived from the name.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    request_body = ProductReq,
    responses(
        (status = 200, description = "Created product successfully", body = StdResponse<ProductRes, String>),
        (status = 422, description = "Invalid product")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let slug = catalog::allocate_product_slug(conn, &body.name, None).await?;
    let (new_product, images) = body.into_entities(slug);

    let (product, images) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let product: ProductEntity = diesel::insert_into(products::table)
                    .values(new_product)
                    .returning(ProductEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let images = insert_images(conn, product.id, images.unwrap_or_default()).await?;

                Ok::<(ProductEntity, Vec<ProductImageEntity>), AppError>((product, images))
            })
        })
        .await?;

    tracing::info!("Created product {} ({})", product.id, product.slug);

    Ok(StdResponse {
        data: Some(ProductRes { product, images }),
        message: Some("Created product successfully"),
    })
}

async fn insert_images(
    conn: &mut DbConn,
    product_id: i32,
    images: Vec<CreateProductImageEntity>,
) -> Result<Vec<ProductImageEntity>, AppError> {
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let images: Vec<CreateProductImageEntity> = images
        .into_iter()
        .map(|image| CreateProductImageEntity {
            product_id,
            ..image
        })
        .collect();

    let inserted = diesel::insert_into(product_images::table)
        .values(images)
        .returning(ProductImageEntity::as_returning())
        .get_results(conn)
        .await?;
    Ok(inserted)
}

/// Update a product. A renamed product gets a fresh slug.
#[utoipa::path(
    post,
    path = "/{id}/edit/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to edit")
    ),
    request_body = ProductReq,
    responses(
        (status = 200, description = "Updated product successfully", body = StdResponse<ProductRes, String>),
        (status = 404, description = "No such product"),
        (status = 422, description = "Invalid product")
    )
)]
async fn edit_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let current: ProductEntity = products::table
        .find(id)
        .select(ProductEntity::as_select())
        .first(conn)
        .await?;

    let slug = if current.name == body.name.trim() {
        current.slug
    } else {
        catalog::allocate_product_slug(conn, &body.name, Some(id)).await?
    };
    let (changes, images) = body.into_entities(slug);

    let (product, images) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let product: ProductEntity = diesel::update(products::table.find(id))
                    .set((&changes, products::updated_at.eq(diesel::dsl::now)))
                    .returning(ProductEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let images = match images {
                    Some(images) => {
                        diesel::delete(
                            product_images::table.filter(product_images::product_id.eq(id)),
                        )
                        .execute(conn)
                        .await?;
                        insert_images(conn, id, images).await?
                    }
                    None => product_images::table
                        .filter(product_images::product_id.eq(id))
                        .order_by((product_images::sort_order.asc(), product_images::id.asc()))
                        .select(ProductImageEntity::as_select())
                        .load(conn)
                        .await?,
                };

                Ok::<(ProductEntity, Vec<ProductImageEntity>), AppError>((product, images))
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(ProductRes { product, images }),
        message: Some("Updated product successfully"),
    })
}

/// Delete a product together with its images and hot deals. Past order lines keep their
/// snapshot.
#[utoipa::path(
    post,
    path = "/{id}/delete/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted product successfully", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "No such product")
    )
)]
async fn delete_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity = diesel::delete(products::table.find(id))
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Deleted product {} ({})", product.id, product.slug);

    Ok(StdResponse {
        data: Some(product),
        message: Some("Deleted product successfully"),
    })
}
