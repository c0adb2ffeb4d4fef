use actix_web::web::{Data, Json};
use rand::Rng;
use sqlx::{query, query_as, query_scalar, PgPool};

use crate::context::UserInfo;
use crate::error::Error;
use crate::models::user::Profile;
use crate::rand::thread_rng;
use crate::response::MessageResponse;
use crate::serde::Deserialize;

pub async fn profile(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<Profile>, Error> {
    let profile: Option<Profile> = query_as(
        "SELECT id, name, username, email, bio, lokasi, link_whatsapp, role, created_at
        FROM users WHERE id = $1",
    )
    .bind(user_info.id)
    .fetch_optional(&mut db.acquire().await?)
    .await?;
    match profile {
        None => Err(Error::NotFound("user not found".into())),
        Some(profile) => Ok(Json(profile)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub lokasi: Option<String>,
    pub link_whatsapp: Option<String>,
}

pub async fn update_profile(user_info: UserInfo, Json(body): Json<ProfileUpdate>, db: Data<PgPool>) -> Result<Json<Profile>, Error> {
    let mut conn = db.acquire().await?;
    if let Some(username) = &body.username {
        let taken: bool = query_scalar("SELECT EXISTS(SELECT id FROM users WHERE username = $1 AND id != $2)")
            .bind(username)
            .bind(user_info.id)
            .fetch_one(&mut conn)
            .await?;
        if taken {
            return Err(Error::Conflict("username already taken".into()));
        }
    }
    if let Some(email) = &body.email {
        let taken: bool = query_scalar("SELECT EXISTS(SELECT id FROM users WHERE email = $1 AND id != $2)")
            .bind(email)
            .bind(user_info.id)
            .fetch_one(&mut conn)
            .await?;
        if taken {
            return Err(Error::Conflict("email already in use".into()));
        }
    }
    // an omitted field clears the column, matching the profile form which
    // always sends the full field set
    let updated: Option<Profile> = query_as(
        "UPDATE users
        SET name = $1, username = $2, email = COALESCE($3, email), bio = $4, lokasi = $5,
            link_whatsapp = $6, updated_at = NOW()
        WHERE id = $7
        RETURNING id, name, username, email, bio, lokasi, link_whatsapp, role, created_at",
    )
    .bind(&body.name)
    .bind(&body.username)
    .bind(&body.email)
    .bind(&body.bio)
    .bind(&body.lokasi)
    .bind(&body.link_whatsapp)
    .bind(user_info.id)
    .fetch_optional(&mut conn)
    .await?;
    match updated {
        None => Err(Error::NotFound("user not found".into())),
        Some(profile) => Ok(Json(profile)),
    }
}

pub async fn delete_account(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let deleted: Option<i32> = query_scalar("DELETE FROM users WHERE id = $1 RETURNING id")
        .bind(user_info.id)
        .fetch_optional(&mut db.acquire().await?)
        .await?;
    if deleted.is_none() {
        return Err(Error::NotFound("user not found".into()));
    }
    Ok(Json(MessageResponse::new("account deleted")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileViewRequest {
    pub petani_id: Option<i32>,
}

/// Records a profile visit. Self-views are ignored, and once in a while
/// the handler prunes views older than a week so the table stays small.
pub async fn record_profile_view(viewer: Option<UserInfo>, Json(body): Json<ProfileViewRequest>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let petani_id = match body.petani_id {
        Some(id) => id,
        None => return Err(Error::Validation("petaniId is required".into())),
    };
    let viewer_id = viewer.map(|v| v.id);
    if viewer_id == Some(petani_id) {
        return Ok(Json(MessageResponse::new("self view ignored")));
    }
    let mut conn = db.acquire().await?;
    query("INSERT INTO profile_views (petani_id, viewer_id) VALUES ($1, $2)")
        .bind(petani_id)
        .bind(viewer_id)
        .execute(&mut conn)
        .await?;
    if thread_rng().gen_bool(0.01) {
        query("DELETE FROM profile_views WHERE created_at < NOW() - INTERVAL '7 days'")
            .execute(&mut conn)
            .await?;
    }
    Ok(Json(MessageResponse::new("view recorded")))
}
