use utoipa::openapi::{
    OpenApi,
    security::{ApiKey, ApiKeyValue, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{CLIENT_ID_HEADER, TENANT_ID_HEADER};

/// Registers the gateway identity headers and mounts Swagger UI.
pub fn create_swagger_ui(mut openapi: OpenApi) -> SwaggerUi {
    let components = openapi.components.get_or_insert_with(Default::default);
    components.add_security_scheme(
        "clientId",
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(CLIENT_ID_HEADER))),
    );
    components.add_security_scheme(
        "staffTenantId",
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(TENANT_ID_HEADER))),
    );

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi)
}
