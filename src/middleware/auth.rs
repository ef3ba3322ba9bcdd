use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::future::{ready, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::modules::organizations::repositories::ProjectRepository;

/// Authenticated project identity attached to the request after key checks
#[derive(Debug, Clone)]
pub struct ProjectIdentity {
    pub project_id: Uuid,
    pub org_id: Uuid,
}

/// SHA-256 digest of a project API key, hex encoded
///
/// Only this digest is ever stored or compared; raw keys never touch the
/// database.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Middleware for project API key authentication on the ingestion surface
///
/// Expects `Authorization: Bearer <key>`; the key digest is matched against
/// `projects.api_key_hash`. Inactive projects and organisations are refused.
pub struct ProjectKeyAuth;

impl<S> Transform<S, ServiceRequest> for ProjectKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse;
    type Error = Error;
    type InitError = ();
    type Transform = ProjectKeyAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProjectKeyAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct ProjectKeyAuthMiddleware<S> {
    service: Rc<S>,
}

fn unauthorized(message: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "error": {
            "code": 401,
            "message": message,
        }
    }))
}

impl<S> Service<ServiceRequest> for ProjectKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            let token = match header.as_deref().and_then(|h| h.strip_prefix("Bearer ")) {
                Some(token) if !token.is_empty() => token.to_owned(),
                _ => {
                    let response = unauthorized("Missing or malformed Authorization header");
                    return Ok(req.into_response(response).map_into_boxed_body());
                }
            };

            let pool = match req.app_data::<actix_web::web::Data<PgPool>>() {
                Some(pool) => pool.get_ref().clone(),
                None => {
                    let response = HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": {
                            "code": 500,
                            "message": "Database pool not available",
                        }
                    }));
                    return Ok(req.into_response(response).map_into_boxed_body());
                }
            };

            let key_hash = hash_api_key(&token);
            let projects = ProjectRepository::new(pool);

            match projects.find_auth_identity(&key_hash).await {
                Ok(Some(identity)) if identity.project_active && identity.org_active => {
                    req.extensions_mut().insert(ProjectIdentity {
                        project_id: identity.project_id,
                        org_id: identity.org_id,
                    });
                    service.call(req).await
                }
                Ok(Some(_)) => {
                    // Known key but the project or its organisation is disabled
                    let response = HttpResponse::NotFound().json(serde_json::json!({
                        "error": {
                            "code": 404,
                            "message": "Project not found or inactive",
                        }
                    }));
                    Ok(req.into_response(response).map_into_boxed_body())
                }
                Ok(None) => {
                    let response = unauthorized("Invalid API key");
                    Ok(req.into_response(response).map_into_boxed_body())
                }
                Err(e) => {
                    // A storage failure is not an authentication verdict
                    tracing::error!(error = %e, "API key lookup failed");
                    let response = HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": {
                            "code": 500,
                            "message": "A database error occurred",
                        }
                    }));
                    Ok(req.into_response(response).map_into_boxed_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_api_key_is_stable_hex() {
        let digest = hash_api_key("mb_test_key");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_api_key("mb_test_key"));
        assert_ne!(digest, hash_api_key("mb_other_key"));
    }
}
