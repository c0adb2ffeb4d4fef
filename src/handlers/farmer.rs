use actix_web::web::{Data, Json, Query};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{query_as, FromRow, PgPool, Postgres};

use crate::error::Error;
use crate::models::project::ProyekStatus;
use crate::response::DataList;
use crate::serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct FarmerListParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, FromRow)]
struct FarmerRow {
    id: i32,
    name: Option<String>,
    username: Option<String>,
    lokasi: Option<String>,
    bio: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBrief {
    pub id: i32,
    pub nama_proyek: String,
    pub status: ProyekStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerItem {
    pub id: i32,
    pub name: Option<String>,
    pub username: Option<String>,
    pub lokasi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub proyek_tani: Vec<ProjectBrief>,
}

async fn top_projects(conn: &mut PoolConnection<Postgres>, petani_id: i32, active_only: bool) -> Result<Vec<ProjectBrief>, Error> {
    let sql = if active_only {
        "SELECT id, nama_proyek, status FROM proyek_tani
        WHERE petani_id = $1 AND status IN ('PENANAMAN', 'PERAWATAN', 'PANEN')
        ORDER BY created_at DESC LIMIT 3"
    } else {
        "SELECT id, nama_proyek, status FROM proyek_tani
        WHERE petani_id = $1
        ORDER BY created_at DESC LIMIT 3"
    };
    let list = query_as(sql).bind(petani_id).fetch_all(&mut *conn).await?;
    Ok(list)
}

pub async fn list(Query(params): Query<FarmerListParams>, db: Data<PgPool>) -> Result<Json<DataList<FarmerItem>>, Error> {
    let limit = params.limit.unwrap_or(10);
    let mut conn = db.acquire().await?;
    let kind = params.kind.as_deref().unwrap_or("all");
    let farmers: Vec<FarmerRow> = match kind {
        "active" => {
            query_as(
                "SELECT DISTINCT u.id, u.name, u.username, u.lokasi, u.bio, u.created_at, u.updated_at
                FROM users AS u
                JOIN proyek_tani AS pt ON u.id = pt.petani_id
                WHERE u.role = 'PETANI' AND pt.status IN ('PENANAMAN', 'PERAWATAN', 'PANEN')
                ORDER BY u.updated_at DESC
                LIMIT $1",
            )
            .bind(limit)
            .fetch_all(&mut conn)
            .await?
        }
        _ => {
            query_as(
                "SELECT id, name, username, lokasi, bio, created_at FROM users
                WHERE role = 'PETANI'
                ORDER BY created_at DESC
                LIMIT $1",
            )
            .bind(limit)
            .fetch_all(&mut conn)
            .await?
        }
    };
    let active_only = kind == "active";
    let include_bio = kind != "new" && kind != "active";
    let mut data = Vec::with_capacity(farmers.len());
    for farmer in farmers {
        let proyek_tani = top_projects(&mut conn, farmer.id, active_only).await?;
        data.push(FarmerItem {
            id: farmer.id,
            name: farmer.name,
            username: farmer.username,
            lokasi: farmer.lokasi,
            bio: if include_bio { farmer.bio } else { None },
            created_at: farmer.created_at,
            proyek_tani,
        });
    }
    Ok(Json(DataList::new(data)))
}
