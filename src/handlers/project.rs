use actix_web::{
    http::StatusCode,
    web::{Data, Json, Path},
    HttpResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, query_scalar, FromRow, PgPool};

use crate::context::UserInfo;
use crate::error::Error;
use crate::models::feed::FarmingUpdate;
use crate::models::product::Produk;
use crate::models::project::{FasePayload, FaseProyek, ProyekCreation, ProyekTani, ProyekUpdate};
use crate::models::user::Role;
use crate::response::MessageResponse;
use crate::serde::Serialize;

use super::require_role;

#[derive(Debug, Serialize)]
pub struct ProyekCreated {
    pub message: String,
    pub data: ProyekTani,
}

pub async fn create(user_info: UserInfo, Json(body): Json<ProyekCreation>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    if let Err(msg) = body.validate() {
        return Err(Error::Validation(msg.into()));
    }
    let proyek: ProyekTani = query_as(
        "INSERT INTO proyek_tani (petani_id, nama_proyek, deskripsi, lokasi_lahan)
        VALUES ($1, $2, $3, $4)
        RETURNING *",
    )
    .bind(user_info.id)
    .bind(body.nama_proyek.trim())
    .bind(body.deskripsi.trim())
    .bind(body.lokasi_lahan.trim())
    .fetch_one(&mut conn)
    .await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(ProyekCreated {
        message: "project created".into(),
        data: proyek,
    }))
}

pub async fn list(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<Vec<ProyekTani>>, Error> {
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    let list = query_as("SELECT * FROM proyek_tani WHERE petani_id = $1 ORDER BY created_at DESC")
        .bind(user_info.id)
        .fetch_all(&mut conn)
        .await?;
    Ok(Json(list))
}

#[derive(Debug, Serialize, FromRow)]
pub struct PetaniBrief {
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProyekDetail {
    #[serde(flatten)]
    pub proyek: ProyekTani,
    pub petani: Option<PetaniBrief>,
    pub produk: Vec<Produk>,
    pub fase: Vec<FaseProyek>,
}

pub async fn detail(proyek_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<ProyekDetail>, Error> {
    let proyek_id = proyek_id.into_inner().0;
    let mut conn = db.acquire().await?;
    let proyek: Option<ProyekTani> = query_as("SELECT * FROM proyek_tani WHERE id = $1")
        .bind(proyek_id)
        .fetch_optional(&mut conn)
        .await?;
    let proyek = match proyek {
        Some(proyek) => proyek,
        None => return Err(Error::NotFound("project not found".into())),
    };
    let petani: Option<PetaniBrief> = query_as("SELECT name, email, image FROM users WHERE id = $1")
        .bind(proyek.petani_id)
        .fetch_optional(&mut conn)
        .await
        .ok()
        .flatten();
    let produk: Vec<Produk> = query_as("SELECT * FROM produk WHERE proyek_tani_id = $1 ORDER BY created_at DESC")
        .bind(proyek_id)
        .fetch_all(&mut conn)
        .await?;
    let fase: Vec<FaseProyek> = query_as("SELECT * FROM fase_proyek WHERE proyek_tani_id = $1 ORDER BY urutan ASC")
        .bind(proyek_id)
        .fetch_all(&mut conn)
        .await?;
    Ok(Json(ProyekDetail {
        proyek,
        petani,
        produk,
        fase,
    }))
}

/// Loads the project and refuses with 404/403 unless it belongs to the
/// caller. Shared by every owner-scoped mutation below.
async fn owned_project(conn: &mut sqlx::pool::PoolConnection<sqlx::Postgres>, proyek_id: i32, user_id: i32) -> Result<ProyekTani, Error> {
    let proyek: Option<ProyekTani> = query_as("SELECT * FROM proyek_tani WHERE id = $1")
        .bind(proyek_id)
        .fetch_optional(&mut *conn)
        .await?;
    match proyek {
        None => Err(Error::NotFound("project not found".into())),
        Some(p) if p.petani_id != user_id => Err(Error::Forbidden("you do not own this project".into())),
        Some(p) => Ok(p),
    }
}

pub async fn update(user_info: UserInfo, proyek_id: Path<(i32,)>, Json(body): Json<ProyekUpdate>, db: Data<PgPool>) -> Result<Json<ProyekTani>, Error> {
    let proyek_id = proyek_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    owned_project(&mut conn, proyek_id, user_info.id).await?;
    let updated: ProyekTani = query_as(
        "UPDATE proyek_tani
        SET nama_proyek = $1, deskripsi = $2, lokasi_lahan = $3, status = $4, updated_at = NOW()
        WHERE id = $5
        RETURNING *",
    )
    .bind(&body.nama_proyek)
    .bind(&body.deskripsi)
    .bind(&body.lokasi_lahan)
    .bind(body.status)
    .bind(proyek_id)
    .fetch_one(&mut conn)
    .await?;
    Ok(Json(updated))
}

pub async fn delete_proyek(user_info: UserInfo, proyek_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let proyek_id = proyek_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    owned_project(&mut conn, proyek_id, user_info.id).await?;
    query("DELETE FROM proyek_tani WHERE id = $1").bind(proyek_id).execute(&mut conn).await?;
    Ok(Json(MessageResponse::new("project deleted")))
}

pub async fn create_fase(user_info: UserInfo, proyek_id: Path<(i32,)>, Json(body): Json<FasePayload>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    let proyek_id = proyek_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    owned_project(&mut conn, proyek_id, user_info.id).await?;
    let fase: FaseProyek = query_as(
        "INSERT INTO fase_proyek (proyek_tani_id, nama, slug, cerita, gambar, urutan)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *",
    )
    .bind(proyek_id)
    .bind(&body.nama)
    .bind(&body.slug)
    .bind(&body.cerita)
    .bind(&body.gambar)
    .bind(body.urutan)
    .fetch_one(&mut conn)
    .await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(fase))
}

pub async fn fase_detail(path: Path<(i32, i32)>, db: Data<PgPool>) -> Result<Json<FaseProyek>, Error> {
    let (proyek_id, fase_id) = path.into_inner();
    let fase: Option<FaseProyek> = query_as("SELECT * FROM fase_proyek WHERE id = $1 AND proyek_tani_id = $2")
        .bind(fase_id)
        .bind(proyek_id)
        .fetch_optional(&mut db.acquire().await?)
        .await?;
    match fase {
        None => Err(Error::NotFound("phase not found".into())),
        Some(fase) => Ok(Json(fase)),
    }
}

pub async fn update_fase(user_info: UserInfo, path: Path<(i32, i32)>, Json(body): Json<FasePayload>, db: Data<PgPool>) -> Result<Json<FaseProyek>, Error> {
    let (proyek_id, fase_id) = path.into_inner();
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    owned_project(&mut conn, proyek_id, user_info.id).await?;
    let fase: Option<FaseProyek> = query_as(
        "UPDATE fase_proyek
        SET nama = $1, slug = $2, cerita = $3, gambar = $4, urutan = $5
        WHERE id = $6 AND proyek_tani_id = $7
        RETURNING *",
    )
    .bind(&body.nama)
    .bind(&body.slug)
    .bind(&body.cerita)
    .bind(&body.gambar)
    .bind(body.urutan)
    .bind(fase_id)
    .bind(proyek_id)
    .fetch_optional(&mut conn)
    .await?;
    match fase {
        None => Err(Error::NotFound("phase not found".into())),
        Some(fase) => Ok(Json(fase)),
    }
}

pub async fn delete_fase(user_info: UserInfo, path: Path<(i32, i32)>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let (proyek_id, fase_id) = path.into_inner();
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    owned_project(&mut conn, proyek_id, user_info.id).await?;
    let deleted: Option<i32> = query_scalar("DELETE FROM fase_proyek WHERE id = $1 AND proyek_tani_id = $2 RETURNING id")
        .bind(fase_id)
        .bind(proyek_id)
        .fetch_optional(&mut conn)
        .await?;
    if deleted.is_none() {
        return Err(Error::NotFound("phase not found".into()));
    }
    Ok(Json(MessageResponse::new("phase deleted")))
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectName {
    pub id: i32,
    pub nama_proyek: String,
}

pub async fn name_list(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<Vec<ProjectName>>, Error> {
    let list = query_as("SELECT id, nama_proyek FROM proyek_tani WHERE petani_id = $1 ORDER BY created_at DESC")
        .bind(user_info.id)
        .fetch_all(&mut db.acquire().await?)
        .await?;
    Ok(Json(list))
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: i32,
    judul: String,
    deskripsi: String,
    foto_url: Option<String>,
    created_at: DateTime<Utc>,
    proyek_tani_id: i32,
    nama_proyek: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(flatten)]
    update: FarmingUpdate,
    nama_proyek: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    proyek_aktif: i64,
    total_produk: i64,
    pengunjung_profil: i64,
    aktivitas_terbaru: Vec<Activity>,
}

pub async fn dashboard_stats(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<DashboardStats>, Error> {
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    let proyek_aktif: i64 = query_scalar("SELECT COUNT(*) FROM proyek_tani WHERE petani_id = $1 AND status != 'SELESAI'")
        .bind(user_info.id)
        .fetch_one(&mut conn)
        .await?;
    let total_produk: i64 = query_scalar(
        "SELECT COUNT(*)
        FROM produk AS p
        JOIN proyek_tani AS pt ON p.proyek_tani_id = pt.id
        WHERE pt.petani_id = $1",
    )
    .bind(user_info.id)
    .fetch_one(&mut conn)
    .await?;
    let pengunjung_profil: i64 = query_scalar("SELECT COUNT(*) FROM profile_views WHERE petani_id = $1 AND created_at >= NOW() - INTERVAL '30 days'")
        .bind(user_info.id)
        .fetch_one(&mut conn)
        .await?;
    let rows: Vec<ActivityRow> = query_as(
        "SELECT fu.id, fu.judul, fu.deskripsi, fu.foto_url, fu.created_at, fu.proyek_tani_id, pt.nama_proyek
        FROM farming_updates AS fu
        JOIN proyek_tani AS pt ON fu.proyek_tani_id = pt.id
        WHERE pt.petani_id = $1
        ORDER BY fu.created_at DESC
        LIMIT 5",
    )
    .bind(user_info.id)
    .fetch_all(&mut conn)
    .await?;
    let aktivitas_terbaru = rows
        .into_iter()
        .map(|r| Activity {
            update: FarmingUpdate {
                id: r.id,
                proyek_tani_id: r.proyek_tani_id,
                judul: r.judul,
                deskripsi: r.deskripsi,
                foto_url: r.foto_url,
                created_at: r.created_at,
            },
            nama_proyek: r.nama_proyek,
        })
        .collect();
    Ok(Json(DashboardStats {
        proyek_aktif,
        total_produk,
        pengunjung_profil,
        aktivitas_terbaru,
    }))
}
