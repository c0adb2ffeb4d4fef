use actix_web::{
    http::StatusCode,
    web::{Data, Json, Path, Query},
    HttpResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{query_as, query_scalar, FromRow, PgPool, QueryBuilder};

use crate::context::UserInfo;
use crate::error::Error;
use crate::models::product::{Produk, ProdukPayload, ProdukStatus};
use crate::models::user::Role;
use crate::response::{DataList, MessageResponse};
use crate::serde::{Deserialize, Serialize};

use super::require_role;

#[derive(Debug, Deserialize)]
pub struct ProductListParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i32,
    nama_produk: String,
    deskripsi: String,
    foto_url: Option<String>,
    harga: i64,
    unit: String,
    stok_tersedia: i32,
    status: ProdukStatus,
    estimasi_panen: Option<String>,
    created_at: DateTime<Utc>,
    proyek_id: i32,
    nama_proyek: String,
    petani_id: i32,
    petani_name: Option<String>,
    petani_username: Option<String>,
    petani_lokasi: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPetani {
    pub id: i32,
    pub name: Option<String>,
    pub username: Option<String>,
    pub lokasi: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProject {
    pub id: i32,
    pub nama_proyek: String,
    pub petani: ProductPetani,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductItem {
    pub id: i32,
    pub nama_produk: String,
    pub deskripsi: String,
    pub foto_url: Option<String>,
    pub harga: i64,
    pub unit: String,
    pub stok_tersedia: i32,
    pub status: ProdukStatus,
    pub estimasi_panen: Option<String>,
    pub created_at: DateTime<Utc>,
    pub proyek_tani: ProductProject,
}

pub async fn list(Query(params): Query<ProductListParams>, db: Data<PgPool>) -> Result<Json<DataList<ProductItem>>, Error> {
    let limit = params.limit.unwrap_or(10);
    let mut builder = QueryBuilder::new(
        "SELECT p.id, p.nama_produk, p.deskripsi, p.foto_url, p.harga, p.unit, p.stok_tersedia,
            p.status, p.estimasi_panen, p.created_at,
            pt.id AS proyek_id, pt.nama_proyek,
            u.id AS petani_id, u.name AS petani_name, u.username AS petani_username, u.lokasi AS petani_lokasi
        FROM produk AS p
        JOIN proyek_tani AS pt ON p.proyek_tani_id = pt.id
        JOIN users AS u ON pt.petani_id = u.id
        WHERE 1 = 1",
    );
    match params.kind.as_deref() {
        Some("new") => {
            builder.push(" AND p.created_at >= NOW() - INTERVAL '30 days'");
        }
        Some("available") => {
            builder.push(" AND p.status = 'TERSEDIA' AND p.stok_tersedia > 0");
        }
        Some("preorder") => {
            builder.push(" AND p.status = 'PREORDER'");
        }
        _ => {}
    }
    if let Some(category) = &params.category {
        builder.push(" AND p.nama_produk ILIKE ");
        builder.push_bind(format!("%{}%", category));
    }
    builder.push(" ORDER BY p.created_at DESC LIMIT ");
    builder.push_bind(limit);
    let rows: Vec<ProductRow> = builder.build_query_as().fetch_all(&mut db.acquire().await?).await?;
    let data = rows
        .into_iter()
        .map(|r| ProductItem {
            id: r.id,
            nama_produk: r.nama_produk,
            deskripsi: r.deskripsi,
            foto_url: r.foto_url,
            harga: r.harga,
            unit: r.unit,
            stok_tersedia: r.stok_tersedia,
            status: r.status,
            estimasi_panen: r.estimasi_panen,
            created_at: r.created_at,
            proyek_tani: ProductProject {
                id: r.proyek_id,
                nama_proyek: r.nama_proyek,
                petani: ProductPetani {
                    id: r.petani_id,
                    name: r.petani_name,
                    username: r.petani_username,
                    lokasi: r.petani_lokasi,
                },
            },
        })
        .collect();
    Ok(Json(DataList::new(data)))
}

pub async fn create(user_info: UserInfo, proyek_id: Path<(i32,)>, Json(body): Json<ProdukPayload>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    let proyek_id = proyek_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    if let Err(msg) = body.validate() {
        return Err(Error::Validation(msg.into()));
    }
    let owned: bool = query_scalar("SELECT EXISTS(SELECT id FROM proyek_tani WHERE id = $1 AND petani_id = $2)")
        .bind(proyek_id)
        .bind(user_info.id)
        .fetch_one(&mut conn)
        .await?;
    if !owned {
        return Err(Error::NotFound("project not found or not yours".into()));
    }
    let produk: Produk = query_as(
        "INSERT INTO produk (proyek_tani_id, nama_produk, deskripsi, foto_url, harga, unit, stok_tersedia, status, estimasi_panen)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *",
    )
    .bind(proyek_id)
    .bind(body.nama_produk.trim())
    .bind(body.deskripsi.trim())
    .bind(&body.foto_url)
    .bind(body.harga)
    .bind(&body.unit)
    .bind(body.stok_tersedia)
    .bind(body.status)
    .bind(&body.estimasi_panen)
    .fetch_one(&mut conn)
    .await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(produk))
}

pub async fn update(user_info: UserInfo, produk_id: Path<(i32,)>, Json(body): Json<ProdukPayload>, db: Data<PgPool>) -> Result<Json<Produk>, Error> {
    let produk_id = produk_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    if let Err(msg) = body.validate() {
        return Err(Error::Validation(msg.into()));
    }
    let produk: Option<Produk> = query_as(
        "UPDATE produk
        SET nama_produk = $1, deskripsi = $2, foto_url = $3, harga = $4, unit = $5,
            stok_tersedia = $6, status = $7, estimasi_panen = $8, updated_at = NOW()
        WHERE id = $9
        AND proyek_tani_id IN (SELECT id FROM proyek_tani WHERE petani_id = $10)
        RETURNING *",
    )
    .bind(body.nama_produk.trim())
    .bind(body.deskripsi.trim())
    .bind(&body.foto_url)
    .bind(body.harga)
    .bind(&body.unit)
    .bind(body.stok_tersedia)
    .bind(body.status)
    .bind(&body.estimasi_panen)
    .bind(produk_id)
    .bind(user_info.id)
    .fetch_optional(&mut conn)
    .await?;
    match produk {
        None => Err(Error::NotFound("product not found or not yours".into())),
        Some(produk) => Ok(Json(produk)),
    }
}

pub async fn delete_produk(user_info: UserInfo, produk_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let produk_id = produk_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    let deleted: Option<i32> = query_scalar(
        "DELETE FROM produk
        WHERE id = $1
        AND proyek_tani_id IN (SELECT id FROM proyek_tani WHERE petani_id = $2)
        RETURNING id",
    )
    .bind(produk_id)
    .bind(user_info.id)
    .fetch_optional(&mut conn)
    .await?;
    if deleted.is_none() {
        return Err(Error::NotFound("product not found or not yours".into()));
    }
    Ok(Json(MessageResponse::new("product deleted")))
}
