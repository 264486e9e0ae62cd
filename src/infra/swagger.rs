use anyhow::Result;
use utoipa::openapi::{
    OpenApi,
    security::{ApiKey, ApiKeyValue, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::session::SESSION_COOKIE;

pub fn create_swagger_ui(mut openapi: OpenApi) -> Result<SwaggerUi> {
    let components = openapi.components.get_or_insert_with(Default::default);
    components.add_security_scheme(
        "sessionCookie",
        SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
    );

    Ok(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
}
