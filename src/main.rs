use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use storefront::{
    infra::{
        bootstrap::{self, bootstrap},
        config, db, swagger,
    },
    routes,
};

/// Migrations embedded into the binary so a single artifact can upgrade its own schema
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let routes = routes::storefront::routes_with_openapi()
        .merge(routes::cart::routes_with_openapi())
        .merge(routes::checkout::routes_with_openapi())
        .merge(routes::accounts::routes_with_openapi())
        .merge(routes::admin::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Storefront API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app = Router::new().merge(routes).merge(swagger_ui);

    tracing::info!("Running migrations...");
    let config = config::load()?;
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    tracing::info!("Bootstrapping...");
    bootstrap("Storefront", app, config).await?;
    Ok(())
}
