//! Staff-only panel. Every route here sits behind [`middleware::staff_authorization`].

use utoipa_axum::router::OpenApiRouter;

use crate::infra::{app_state::AppState, middleware};

pub mod brands;
pub mod categories;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod promotions;

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let panel = OpenApiRouter::new()
        .merge(orders::routes_with_openapi())
        .merge(products::routes_with_openapi())
        .merge(categories::routes_with_openapi())
        .merge(brands::routes_with_openapi())
        .merge(promotions::routes_with_openapi());

    OpenApiRouter::new()
        .merge(dashboard::routes_with_openapi())
        .nest("/admin", panel)
        .route_layer(axum::middleware::from_fn(middleware::staff_authorization))
}
