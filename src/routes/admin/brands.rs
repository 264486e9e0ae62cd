use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{BrandEntity, CreateBrandEntity},
    schema::brands,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/brands",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_brands, create_brand))
            .routes(utoipa_axum::routes!(edit_brand))
            .routes(utoipa_axum::routes!(delete_brand)),
    )
}

fn validated(mut body: CreateBrandEntity) -> Result<CreateBrandEntity, AppError> {
    body.name = body.name.trim().to_string();
    if body.name.is_empty() {
        return Err(AppError::Validation("Brand name must be set".into()));
    }
    Ok(body)
}

#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "List all brands", body = StdResponse<Vec<BrandEntity>, String>)
    )
)]
async fn list_brands(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brands: Vec<BrandEntity> = brands::table
        .order_by(brands::name.asc())
        .select(BrandEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get brands")?;

    Ok(StdResponse {
        data: Some(brands),
        message: Some("Get brands successfully"),
    })
}

/// Create a brand. Names are unique.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    request_body = CreateBrandEntity,
    responses(
        (status = 200, description = "Created brand successfully", body = StdResponse<BrandEntity, String>),
        (status = 409, description = "Brand name already exists"),
        (status = 422, description = "Invalid brand")
    )
)]
async fn create_brand(
    State(state): State<AppState>,
    Json(body): Json<CreateBrandEntity>,
) -> Result<impl IntoResponse, AppError> {
    let body = validated(body)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brand: BrandEntity = diesel::insert_into(brands::table)
        .values(body)
        .returning(BrandEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(brand),
        message: Some("Created brand successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/{id}/edit/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Brand ID to edit")
    ),
    request_body = CreateBrandEntity,
    responses(
        (status = 200, description = "Updated brand successfully", body = StdResponse<BrandEntity, String>),
        (status = 404, description = "No such brand"),
        (status = 409, description = "Brand name already exists")
    )
)]
async fn edit_brand(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<CreateBrandEntity>,
) -> Result<impl IntoResponse, AppError> {
    let body = validated(body)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brand: BrandEntity = diesel::update(brands::table.find(id))
        .set(&body)
        .returning(BrandEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(brand),
        message: Some("Updated brand successfully"),
    })
}

/// Delete a brand together with its products.
#[utoipa::path(
    post,
    path = "/{id}/delete/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Brand ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted brand successfully", body = StdResponse<BrandEntity, String>),
        (status = 404, description = "No such brand")
    )
)]
async fn delete_brand(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let brand: BrandEntity = diesel::delete(brands::table.find(id))
        .returning(BrandEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Deleted brand {} ({})", brand.id, brand.name);

    Ok(StdResponse {
        data: Some(brand),
        message: Some("Deleted brand successfully"),
    })
}
