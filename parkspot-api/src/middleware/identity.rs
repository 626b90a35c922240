use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_HEADER: &str = "x-user-id";
pub const MERCHANT_HEADER: &str = "x-merchant-id";

/// The calling driver, resolved by the gateway in front of this service.
#[derive(Debug, Clone, Copy)]
pub struct UserContext {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct MerchantContext {
    pub merchant_id: Uuid,
}

fn header_uuid(req: &Request, name: &'static str) -> Result<Uuid, AppError> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing or malformed {} header", name)))
}

pub async fn user_identity_middleware(mut req: Request, next: Next) -> Result<Response, AppError> {
    let user_id = header_uuid(&req, USER_HEADER)?;
    req.extensions_mut().insert(UserContext { user_id });
    Ok(next.run(req).await)
}

pub async fn merchant_identity_middleware(
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let merchant_id = header_uuid(&req, MERCHANT_HEADER)?;
    req.extensions_mut().insert(MerchantContext { merchant_id });
    Ok(next.run(req).await)
}
