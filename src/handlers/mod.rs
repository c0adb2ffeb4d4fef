pub mod admin;
pub mod application;
pub mod chatbot;
pub mod farmer;
pub mod feed;
pub mod message;
pub mod product;
pub mod project;
pub mod stats;
pub mod user;

use actix_web::{
    cookie::{time::OffsetDateTime, Cookie, CookieBuilder},
    http::StatusCode,
    web::{Data, Json},
    HttpResponse, HttpResponseBuilder,
};
use rand::Rng;
use sqlx::{query_scalar, PgExecutor, PgPool};

use crate::error::Error;
use crate::hex::ToHex;
use crate::middlewares::jwt::{gen_token, Claim, JWT_SECRET, JWT_TOKEN};
use crate::models::user::{Role, User};
use crate::rand::thread_rng;
use crate::response::MessageResponse;
use crate::serde::{Deserialize, Serialize};
use crate::sha2::{Digest, Sha256};

pub fn hash_password(pass: &str, slt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pass);
    hasher.update(slt);
    hasher.finalize().encode_hex()
}

pub fn random_salt() -> String {
    let chars: Vec<char> = ('0'..='9').chain('a'..='z').chain('A'..='Z').collect();
    let mut slt = String::new();
    let mut rng = thread_rng();
    for _ in 0..32 {
        let i = rng.gen_range(0..chars.len());
        slt.push(chars[i]);
    }
    slt
}

pub(crate) async fn fetch_role<'e, E: PgExecutor<'e>>(db: E, user_id: i32) -> Result<Option<Role>, Error> {
    let role = query_scalar("SELECT role FROM users WHERE id = $1").bind(user_id).fetch_optional(db).await?;
    Ok(role)
}

/// Role check done against the database rather than the token, so an
/// elevation through the review workflow takes effect immediately.
pub(crate) async fn require_role<'e, E: PgExecutor<'e>>(db: E, user_id: i32, role: Role) -> Result<(), Error> {
    match fetch_role(db, user_id).await? {
        None => Err(Error::Unauthorized("login required".into())),
        Some(r) if r == role => Ok(()),
        Some(_) => Err(Error::Forbidden("access denied".into())),
    }
}

#[derive(Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

pub async fn login(Json(Login { email, password }): Json<Login>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    let mut conn = db.acquire().await?;
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&mut conn)
        .await?;
    if let Some(user) = user {
        // guest users created through the CS channel carry no credentials
        if let (Some(stored), Some(salt)) = (&user.password, &user.salt) {
            if &hash_password(&password, salt) == stored {
                let claim = Claim {
                    user: user.id.to_string(),
                    exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp(),
                };
                let secret = dotenv::var(JWT_SECRET)?;
                let token = gen_token(secret.as_bytes(), &claim)?;
                return Ok(HttpResponse::build(StatusCode::OK)
                    .cookie(Cookie::new(JWT_TOKEN, token.clone()))
                    .json(LoginResponse { token }));
            }
        }
    }
    Err(Error::Unauthorized("invalid email or password".into()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    email: String,
    password: String,
}

pub async fn signup(Json(Signup { email, password }): Json<Signup>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    let email = email.trim().to_owned();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(Error::Validation("invalid email address".into()));
    }
    if password.len() < 8 {
        return Err(Error::Validation("password must be at least 8 characters".into()));
    }
    let mut tx = db.begin().await?;
    let taken: bool = query_scalar("SELECT EXISTS(SELECT id FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&mut tx)
        .await?;
    if taken {
        return Err(Error::Conflict("email already registered".into()));
    }
    let name = email.split('@').next().unwrap_or_default().to_owned();
    let slt = random_salt();
    sqlx::query("INSERT INTO users (email, name, password, salt, role) VALUES ($1, $2, $3, $4, $5)")
        .bind(&email)
        .bind(&name)
        .bind(hash_password(&password, &slt))
        .bind(&slt)
        .bind(Role::Pembeli)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(MessageResponse::new("registration successful, please log in")))
}

pub async fn logout() -> HttpResponse {
    HttpResponseBuilder::new(StatusCode::OK)
        .cookie(CookieBuilder::new(JWT_TOKEN, "").expires(OffsetDateTime::now_utc()).finish())
        .json(MessageResponse::new("logged out"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_password_is_salt_sensitive() {
        let a = hash_password("rahasia123", "salt-one");
        let b = hash_password("rahasia123", "salt-two");
        assert_ne!(a, b);
        assert_eq!(a, hash_password("rahasia123", "salt-one"));
    }

    #[test]
    fn test_random_salt_shape() {
        let s = random_salt();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
