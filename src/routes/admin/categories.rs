use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    catalog,
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{CategoryEntity, CreateCategoryEntity},
    schema::categories,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/categories",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_categories, create_category))
            .routes(utoipa_axum::routes!(edit_category))
            .routes(utoipa_axum::routes!(delete_category))
            .routes(utoipa_axum::routes!(child_categories)),
    )
}

#[derive(Deserialize, ToSchema)]
struct CategoryReq {
    name: String,
    icon: Option<String>,
    #[serde(default)]
    is_featured: bool,
    parent_id: Option<i32>,
}

impl CategoryReq {
    fn name(&self) -> Result<&str, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Category name must be set".into()));
        }
        Ok(name)
    }
}

/// Every category, flat, ordered by name.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "List all categories", body = StdResponse<Vec<CategoryEntity>, String>)
    )
)]
async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<CategoryEntity> = categories::table
        .order_by((categories::name.asc(), categories::id.asc()))
        .select(CategoryEntity::as_select())
        .load(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get categories successfully"),
    })
}

/// Create a category, optionally under a parent. The slug is derived from the name.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Created category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 422, description = "Invalid category")
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name()?.to_string();

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let slug = catalog::allocate_category_slug(conn, &name, None).await?;
    let category: CategoryEntity = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            name,
            slug,
            icon: body.icon,
            is_featured: body.is_featured,
            parent_id: body.parent_id,
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Created category {} ({})", category.id, category.slug);

    Ok(StdResponse {
        data: Some(category),
        message: Some("Created category successfully"),
    })
}

/// Update a category. Moving it under itself or one of its descendants is rejected.
#[utoipa::path(
    post,
    path = "/{id}/edit/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Category ID to edit")
    ),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Updated category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "No such category"),
        (status = 422, description = "Invalid category or parent")
    )
)]
async fn edit_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name()?.to_string();

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let current: CategoryEntity = categories::table
        .find(id)
        .select(CategoryEntity::as_select())
        .first(conn)
        .await?;

    let edges = catalog::category_edges(conn).await?;
    if catalog::creates_cycle(id, body.parent_id, &edges) {
        return Err(AppError::Validation(
            "A category can't be placed under itself or one of its subcategories".into(),
        ));
    }

    let slug = if current.name == name {
        current.slug
    } else {
        catalog::allocate_category_slug(conn, &name, Some(id)).await?
    };

    let category: CategoryEntity = diesel::update(categories::table.find(id))
        .set((
            categories::name.eq(name),
            categories::slug.eq(slug),
            categories::icon.eq(body.icon),
            categories::is_featured.eq(body.is_featured),
            categories::parent_id.eq(body.parent_id),
        ))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Updated category successfully"),
    })
}

/// Delete a category. Subcategories and their products go with it.
#[utoipa::path(
    post,
    path = "/{id}/delete/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    params(
        ("id" = i32, Path, description = "Category ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "No such category")
    )
)]
async fn delete_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::delete(categories::table.find(id))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Deleted category {} ({})", category.id, category.slug);

    Ok(StdResponse {
        data: Some(category),
        message: Some("Deleted category successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ChildrenParams {
    parent_id: i32,
}

#[derive(Serialize, ToSchema, diesel::Queryable)]
struct CategoryOption {
    id: i32,
    name: String,
}

/// Direct children of a category, for cascading category pickers.
#[utoipa::path(
    get,
    path = "/children/",
    tags = ["Admin catalog"],
    security(("sessionCookie" = [])),
    params(ChildrenParams),
    responses(
        (status = 200, description = "Child categories", body = Vec<CategoryOption>)
    )
)]
async fn child_categories(
    Query(params): Query<ChildrenParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let children: Vec<CategoryOption> = categories::table
        .filter(categories::parent_id.eq(params.parent_id))
        .order_by(categories::name.asc())
        .select((categories::id, categories::name))
        .load(conn)
        .await
        .context("Failed to get child categories")?;

    Ok(Json(children))
}
