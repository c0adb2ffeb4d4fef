use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FarmingUpdate {
    pub id: i32,
    pub proyek_tani_id: i32,
    pub judul: String,
    pub deskripsi: String,
    pub foto_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingUpdateCreation {
    #[serde(default)]
    pub judul: String,
    #[serde(default)]
    pub deskripsi: String,
    #[serde(default)]
    pub foto_url: Option<String>,
    pub proyek_tani_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub farming_update_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreation {
    #[serde(default)]
    pub content: String,
    pub farming_update_id: i32,
}
