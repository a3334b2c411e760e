//! Tenant context extraction for multi-tenancy support.
//!
//! The BFF in front of this service authenticates the user and sets the
//! tenant and actor headers. Every business route requires a tenant.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const TENANT_HEADER: &str = "X-Tenant-ID";
pub const USER_HEADER: &str = "X-User-ID";

/// Actor recorded when no user header is present.
const SYSTEM_ACTOR: &str = "system";

/// Tenant context extracted from request headers.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// ISP business account every read and write is scoped to
    pub tenant_id: Uuid,
    /// Staff member making the request, `system` for automated callers
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-Tenant-ID header (required from BFF)"
                ))
            })?;

        let tenant_id = Uuid::parse_str(raw_tenant.trim()).map_err(|_| {
            AppError::AuthError(anyhow::anyhow!("X-Tenant-ID must be a UUID"))
        })?;

        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(SYSTEM_ACTOR)
            .to_string();

        let span = tracing::Span::current();
        span.record("tenant_id", tracing::field::display(tenant_id));
        span.record("user_id", user_id.as_str());

        Ok(TenantContext { tenant_id, user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<TenantContext, AppError> {
        let (mut parts, _) = request.into_parts();
        TenantContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_tenant_and_defaults_actor() {
        let tenant_id = Uuid::new_v4();
        let request = Request::builder()
            .header(TENANT_HEADER, tenant_id.to_string())
            .body(())
            .unwrap();

        let ctx = extract(request).await.unwrap();
        assert_eq!(ctx.tenant_id, tenant_id);
        assert_eq!(ctx.user_id, "system");
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_tenant() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(extract(missing).await, Err(AppError::AuthError(_))));

        let malformed = Request::builder()
            .header(TENANT_HEADER, "tenant-one")
            .body(())
            .unwrap();
        assert!(matches!(extract(malformed).await, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn keeps_user_header() {
        let request = Request::builder()
            .header(TENANT_HEADER, Uuid::new_v4().to_string())
            .header(USER_HEADER, "staff-42")
            .body(())
            .unwrap();

        assert_eq!(extract(request).await.unwrap().user_id, "staff-42");
    }
}
