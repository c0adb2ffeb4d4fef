use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Pembeli,
    Petani,
    Admin,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub salt: Option<String>,
    pub role: Role,
    pub bio: Option<String>,
    pub lokasi: Option<String>,
    pub link_whatsapp: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset of a user shown to other users.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PublicUser {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewerInfo {
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i32,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: String,
    pub bio: Option<String>,
    pub lokasi: Option<String>,
    pub link_whatsapp: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
