use actix_web::{
    http::StatusCode,
    web::{Data, Json, Path, Query},
    HttpResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, query_scalar, FromRow, PgPool};

use crate::context::UserInfo;
use crate::error::Error;
use crate::models::message::{CsMessage, CsMessageStatus};
use crate::response::MessageResponse;
use crate::serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsChatRequest {
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Takes a message from the public widget. The sender is looked up by
/// email and created as a guest account when unknown, so the channel works
/// without a login.
pub async fn create(Json(req): Json<CsChatRequest>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    if req.user_email.trim().is_empty() {
        return Err(Error::Validation("field userEmail is required".into()));
    }
    if req.message.trim().is_empty() {
        return Err(Error::Validation("field message is required".into()));
    }
    let mut tx = db.begin().await?;
    let user_id: Option<i32> = query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&req.user_email)
        .fetch_optional(&mut tx)
        .await?;
    let user_id = match user_id {
        Some(id) => id,
        None => {
            query_scalar("INSERT INTO users (email, name) VALUES ($1, $2) RETURNING id")
                .bind(&req.user_email)
                .bind(req.user_name.as_deref().unwrap_or("Guest User"))
                .fetch_one(&mut tx)
                .await?
        }
    };
    query("INSERT INTO cs_messages (user_id, message) VALUES ($1, $2)")
        .bind(user_id)
        .bind(req.message.trim())
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(MessageResponse::new("message received")))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<CsMessage>,
}

/// Chat history for one email, oldest first. The widget polls this every
/// few seconds; an unknown email is just an empty history.
pub async fn history(Query(HistoryParams { email }): Query<HistoryParams>, db: Data<PgPool>) -> Result<Json<HistoryResponse>, Error> {
    let email = match email {
        Some(email) if !email.trim().is_empty() => email,
        _ => return Err(Error::Validation("query parameter email is required".into())),
    };
    let mut conn = db.acquire().await?;
    let user_id: Option<i32> = query_scalar("SELECT id FROM users WHERE email = $1").bind(&email).fetch_optional(&mut conn).await?;
    let messages = match user_id {
        None => Vec::new(),
        Some(user_id) => {
            query_as("SELECT * FROM cs_messages WHERE user_id = $1 ORDER BY created_at ASC")
                .bind(user_id)
                .fetch_all(&mut conn)
                .await?
        }
    };
    Ok(Json(HistoryResponse { messages }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteHistoryRequest {
    #[serde(default)]
    pub user_email: String,
}

pub async fn delete_history(Json(req): Json<DeleteHistoryRequest>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let mut conn = db.acquire().await?;
    let user_id: Option<i32> = query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&req.user_email)
        .fetch_optional(&mut conn)
        .await?;
    let user_id = match user_id {
        Some(id) => id,
        None => return Err(Error::NotFound("user not found".into())),
    };
    query("DELETE FROM cs_messages WHERE user_id = $1").bind(user_id).execute(&mut conn).await?;
    Ok(Json(MessageResponse::new("chat history deleted")))
}

#[derive(Debug, FromRow)]
struct AdminMessageRow {
    id: i32,
    user_id: i32,
    message: String,
    admin_reply: Option<String>,
    admin_email: Option<String>,
    status: CsMessageStatus,
    created_at: DateTime<Utc>,
    replied_at: Option<DateTime<Utc>>,
    user_name: Option<String>,
    user_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMessageView {
    #[serde(flatten)]
    pub message: CsMessage,
    pub user: Sender,
}

#[derive(Debug, Serialize)]
pub struct AdminMessageList {
    pub messages: Vec<AdminMessageView>,
}

pub async fn admin_list(db: Data<PgPool>) -> Result<Json<AdminMessageList>, Error> {
    let rows: Vec<AdminMessageRow> = query_as(
        "SELECT m.*, u.name AS user_name, u.email AS user_email
        FROM cs_messages AS m
        JOIN users AS u ON m.user_id = u.id
        ORDER BY m.created_at DESC",
    )
    .fetch_all(&mut db.acquire().await?)
    .await?;
    let messages = rows
        .into_iter()
        .map(|r| AdminMessageView {
            message: CsMessage {
                id: r.id,
                user_id: r.user_id,
                message: r.message,
                admin_reply: r.admin_reply,
                admin_email: r.admin_email,
                status: r.status,
                created_at: r.created_at,
                replied_at: r.replied_at,
            },
            user: Sender {
                name: r.user_name,
                email: r.user_email,
            },
        })
        .collect();
    Ok(Json(AdminMessageList { messages }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub message_id: Option<i32>,
    #[serde(default)]
    pub reply: String,
}

/// Attaches an admin reply. The reviewer's email is taken from the
/// authenticated admin, not from the request body.
pub async fn admin_reply(user_info: UserInfo, Json(req): Json<ReplyRequest>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let message_id = match req.message_id {
        Some(id) => id,
        None => return Err(Error::Validation("messageId is required".into())),
    };
    if req.reply.trim().is_empty() {
        return Err(Error::Validation("field reply is required".into()));
    }
    let mut conn = db.acquire().await?;
    let admin_email: Option<String> = query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_info.id)
        .fetch_optional(&mut conn)
        .await?;
    let admin_email = match admin_email {
        Some(email) => email,
        None => return Err(Error::Unauthorized("login required".into())),
    };
    let updated: Option<i32> = query_scalar(
        "UPDATE cs_messages
        SET admin_reply = $1, admin_email = $2, status = 'REPLIED', replied_at = NOW()
        WHERE id = $3
        RETURNING id",
    )
    .bind(req.reply.trim())
    .bind(&admin_email)
    .bind(message_id)
    .fetch_optional(&mut conn)
    .await?;
    if updated.is_none() {
        return Err(Error::NotFound("message not found".into()));
    }
    Ok(Json(MessageResponse::new("reply sent")))
}

pub async fn mark_read(message_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let message_id = message_id.into_inner().0;
    let updated: Option<i32> = query_scalar("UPDATE cs_messages SET status = 'READ' WHERE id = $1 RETURNING id")
        .bind(message_id)
        .fetch_optional(&mut db.acquire().await?)
        .await?;
    if updated.is_none() {
        return Err(Error::NotFound("message not found".into()));
    }
    Ok(Json(MessageResponse::new("marked as read")))
}
