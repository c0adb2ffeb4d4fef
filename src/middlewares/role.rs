use crate::context::UserInfo;
use crate::error::Error as AppError;
use crate::models::user::Role;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    HttpMessage,
};
use sqlx::{query_scalar, PgPool};
use std::future::Future;
use std::future::{ready, Ready};
use std::pin::Pin;
use std::task::Poll;

/// Guards a scope behind a role looked up fresh from the database, so a
/// just-elevated or just-demoted account is judged by its current role
/// rather than by whatever its token was minted with.
pub struct RoleGuard {
    db: PgPool,
    role: Role,
}

impl RoleGuard {
    pub fn new(db: PgPool, role: Role) -> Self {
        Self { db, role }
    }
}

impl<S> Transform<S, ServiceRequest> for RoleGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = actix_web::Error>,
    S::Future: 'static,
{
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type Response = S::Response;
    type Error = S::Error;
    type InitError = ();
    type Transform = RoleGuardMiddleware<S>;
    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RoleGuardMiddleware {
            db: self.db.clone(),
            role: self.role,
            service,
        }))
    }
}

pub struct RoleGuardMiddleware<S> {
    db: PgPool,
    role: Role,
    service: S,
}

impl<S> Service<ServiceRequest> for RoleGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = actix_web::Error>,
    S::Future: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<ServiceResponse, Self::Error>>>>;
    fn poll_ready(&self, _: &mut core::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user_info = req.extensions().get::<UserInfo>().cloned();
        if let Some(user_info) = user_info {
            let db = self.db.clone();
            let required = self.role;
            let next = self.service.call(req);
            return Box::pin(async move {
                let mut conn = db.acquire().await.map_err(AppError::from)?;
                let role: Option<Role> = query_scalar("SELECT role FROM users WHERE id = $1")
                    .bind(user_info.id)
                    .fetch_optional(&mut conn)
                    .await
                    .map_err(AppError::from)?;
                match role {
                    None => Err(AppError::Unauthorized("login required".into()).into()),
                    Some(r) if r != required => Err(AppError::Forbidden("admin access required".into()).into()),
                    Some(_) => next.await,
                }
            });
        }
        Box::pin(async move { Err(AppError::Unauthorized("login required".into()).into()) })
    }
}
