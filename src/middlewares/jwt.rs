use serde::{Deserialize, Serialize};

use crate::actix_web::{
    dev::{Service, ServiceRequest, Transform},
    Error, HttpMessage,
};
use crate::context::UserInfo;
use crate::error::Error as AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::future::{ready, Future, Ready};
use std::pin::Pin;

pub static JWT_TOKEN: &str = "JWT_TOKEN";
pub static JWT_SECRET: &str = "JWT_SECRET";

#[derive(Debug, Deserialize, Serialize)]
pub struct Claim {
    pub user: String,
    pub exp: i64,
}

pub fn gen_token(secret: &[u8], claim: &Claim) -> Result<String, AppError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret);
    let token = encode(&header, claim, &key)?;
    Ok(token)
}

pub fn verify_token(secret: &[u8], token: &str) -> Result<Claim, AppError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::new(Algorithm::HS256);
    let payload = decode::<Claim>(token, &key, &validation)?;
    Ok(payload.claims)
}

/// Attaches a `UserInfo` to the request when a valid token is presented,
/// either as an `Authorization` header (with or without a `Bearer ` prefix)
/// or as the login cookie. Requests without a token pass through untouched;
/// route handlers that need an identity reject them via the `UserInfo`
/// extractor. A token that is present but invalid is rejected here.
pub struct Jwt {
    secret: Vec<u8>,
}

impl Jwt {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<S> Transform<S, ServiceRequest> for Jwt
where
    S: Service<ServiceRequest> + 'static,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Error = Error;
    type Response = S::Response;
    type Transform = JwtService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtService {
            secret: self.secret.clone(),
            next_service: service,
        }))
    }
}

pub struct JwtService<S> {
    secret: Vec<u8>,
    next_service: S,
}

impl<S> Service<ServiceRequest> for JwtService<S>
where
    S: Service<ServiceRequest>,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    fn poll_ready(&self, ctx: &mut core::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.next_service.poll_ready(ctx).map_err(|e| e.into())
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .map(|h| h.trim_start_matches("Bearer ").to_owned())
            .or_else(|| req.request().cookie(JWT_TOKEN).map(|c| c.value().to_owned()));
        if let Some(token) = token {
            match verify_token(&self.secret, &token) {
                Err(_) => return Box::pin(async move { Err(AppError::Unauthorized("invalid token".into()).into()) }),
                Ok(claim) => match claim.user.parse::<i32>() {
                    Err(_) => return Box::pin(async move { Err(AppError::Unauthorized("invalid token".into()).into()) }),
                    Ok(id) => {
                        req.extensions_mut().insert(UserInfo { id });
                    }
                },
            }
        }

        let res_fut = self.next_service.call(req);
        Box::pin(async move {
            let resp = res_fut.await.map_err(|e| e.into())?;
            Ok(resp)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gen_and_verify_token() {
        let secret = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 0];
        let claim = Claim {
            user: "42".into(),
            exp: chrono::offset::Utc::now().timestamp() + 3600,
        };
        let token = gen_token(&secret, &claim).unwrap();
        let c = verify_token(&secret, &token).unwrap();
        assert_eq!(claim.user, c.user);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let claim = Claim {
            user: "42".into(),
            exp: chrono::offset::Utc::now().timestamp() + 3600,
        };
        let token = gen_token(b"first secret", &claim).unwrap();
        assert!(verify_token(b"other secret", &token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let secret = b"secret".to_vec();
        let claim = Claim {
            user: "42".into(),
            exp: chrono::offset::Utc::now().timestamp() - 3600,
        };
        let token = gen_token(&secret, &claim).unwrap();
        assert!(verify_token(&secret, &token).is_err());
    }
}
