use crate::error::AppError;
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

// Paths reachable without a token
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    // public for GET only
    read_only_prefixes: Vec<&'static str>,
    // always need a token, even under a public prefix
    excluded_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec!["/swagger-ui", "/swagger-ui/", "/api-docs/openapi.json"],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/api/v1/auth/", "/uploads/"],
            read_only_prefixes: vec!["/api/v1/listings", "/api/v1/subscriptions/plans"],
            excluded_paths: vec!["/api/v1/listings/mine"],
        }
    }

    fn is_public_path(&self, method: &Method, path: &str) -> bool {
        if self
            .excluded_paths
            .iter()
            .any(|&excluded| path.starts_with(excluded))
        {
            return false;
        }

        if self.exact_paths.contains(&path) {
            return true;
        }

        if self
            .prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        *method == Method::GET
            && self
                .read_only_prefixes
                .iter()
                .any(|&prefix| path.starts_with(prefix))
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let user_id = bearer_token(&req).map(|token| {
            self.jwt_service
                .verify_access_token(token)
                .ok()
                .and_then(|claims| claims.user_id().ok())
        });

        if self.public_paths.is_public_path(req.method(), req.path()) {
            // a valid token still identifies the viewer on public pages
            if let Some(Some(user_id)) = user_id {
                req.extensions_mut().insert(user_id);
            }
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        match user_id {
            Some(Some(user_id)) => {
                req.extensions_mut().insert(user_id);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Some(None) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
            None => {
                let error = AppError::AuthError("Missing access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path(&Method::POST, "/api/v1/auth/login"));
        assert!(paths.is_public_path(&Method::GET, "/api/v1/listings"));
        assert!(paths.is_public_path(&Method::GET, "/api/v1/listings/3"));
        assert!(paths.is_public_path(&Method::GET, "/uploads/listings/1/a.png"));
        assert!(paths.is_public_path(&Method::GET, "/api/v1/subscriptions/plans"));
        assert!(!paths.is_public_path(&Method::POST, "/api/v1/listings"));
        assert!(!paths.is_public_path(&Method::GET, "/api/v1/listings/mine"));
        assert!(!paths.is_public_path(&Method::GET, "/api/v1/subscriptions/usage"));
        assert!(!paths.is_public_path(&Method::GET, "/api/v1/admin/users"));
    }
}
