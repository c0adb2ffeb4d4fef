use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cs_message_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CsMessageStatus {
    Unread,
    Read,
    Replied,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CsMessage {
    pub id: i32,
    pub user_id: i32,
    pub message: String,
    pub admin_reply: Option<String>,
    pub admin_email: Option<String>,
    pub status: CsMessageStatus,
    pub created_at: DateTime<Utc>,
    pub replied_at: Option<DateTime<Utc>>,
}
