use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use uuid::Uuid;

use crate::app_error::AppError;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Client identity forwarded by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthClient {
    pub client_id: Uuid,
}

/// Staff identity forwarded by the gateway, scoped to one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthStaff {
    pub tenant_id: Uuid,
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or(AppError::Unauthorized)
}

pub async fn clients_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let client_id = header_uuid(req.headers(), CLIENT_ID_HEADER)?;
    req.extensions_mut().insert(AuthClient { client_id });
    Ok(next.run(req).await)
}

pub async fn staff_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let tenant_id = header_uuid(req.headers(), TENANT_ID_HEADER)?;
    req.extensions_mut().insert(AuthStaff { tenant_id });
    Ok(next.run(req).await)
}
