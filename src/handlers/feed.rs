use actix_web::{
    http::StatusCode,
    web::{Data, Json, Path, Query},
    HttpResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, query_scalar, FromRow, PgPool, QueryBuilder};

use crate::context::UserInfo;
use crate::error::{is_unique_violation, Error};
use crate::models::feed::{CommentCreation, FarmingUpdate, FarmingUpdateCreation, LikeRequest};
use crate::models::user::Role;
use crate::response::{DataList, MessageResponse};
use crate::serde::{Deserialize, Serialize};

use super::require_role;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPetani {
    pub id: i32,
    pub name: Option<String>,
    pub username: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedProject {
    pub id: i32,
    pub nama_proyek: String,
    pub petani: FeedPetani,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub likes: i64,
    pub comments: i64,
}

#[derive(Debug, FromRow)]
struct FeedRow {
    id: i32,
    judul: String,
    deskripsi: String,
    foto_url: Option<String>,
    created_at: DateTime<Utc>,
    proyek_id: i32,
    nama_proyek: String,
    petani_id: i32,
    petani_name: Option<String>,
    petani_username: Option<String>,
    petani_image: Option<String>,
    liked_by: Vec<i32>,
    like_count: i64,
    comment_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: i32,
    pub judul: String,
    pub deskripsi: String,
    pub foto_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub proyek_tani: FeedProject,
    pub liked_by: Vec<i32>,
    pub count: Counts,
}

impl From<FeedRow> for FeedItem {
    fn from(r: FeedRow) -> Self {
        FeedItem {
            id: r.id,
            judul: r.judul,
            deskripsi: r.deskripsi,
            foto_url: r.foto_url,
            created_at: r.created_at,
            proyek_tani: FeedProject {
                id: r.proyek_id,
                nama_proyek: r.nama_proyek,
                petani: FeedPetani {
                    id: r.petani_id,
                    name: r.petani_name,
                    username: r.petani_username,
                    image: r.petani_image,
                },
            },
            liked_by: r.liked_by,
            count: Counts {
                likes: r.like_count,
                comments: r.comment_count,
            },
        }
    }
}

const FEED_SELECT: &str = "SELECT fu.id, fu.judul, fu.deskripsi, fu.foto_url, fu.created_at,
    pt.id AS proyek_id, pt.nama_proyek,
    u.id AS petani_id, u.name AS petani_name, u.username AS petani_username, u.image AS petani_image,
    COALESCE(ARRAY_AGG(DISTINCT l.user_id) FILTER (WHERE l.user_id IS NOT NULL), '{}') AS liked_by,
    COUNT(DISTINCT l.id) AS like_count,
    COUNT(DISTINCT c.id) AS comment_count
FROM farming_updates AS fu
JOIN proyek_tani AS pt ON fu.proyek_tani_id = pt.id
JOIN users AS u ON pt.petani_id = u.id
LEFT JOIN likes AS l ON fu.id = l.farming_update_id
LEFT JOIN comments AS c ON fu.id = c.farming_update_id
GROUP BY fu.id, pt.id, u.id";

/// The public feed: the latest thirty updates with their likers and counts.
pub async fn jejak(db: Data<PgPool>) -> Result<Json<Vec<FeedItem>>, Error> {
    let rows: Vec<FeedRow> = query_as(&format!("{} ORDER BY fu.created_at DESC LIMIT 30", FEED_SELECT))
        .fetch_all(&mut db.acquire().await?)
        .await?;
    Ok(Json(rows.into_iter().map(FeedItem::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct UpdatesParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

pub async fn updates(Query(params): Query<UpdatesParams>, db: Data<PgPool>) -> Result<Json<DataList<FeedItem>>, Error> {
    let limit = params.limit.unwrap_or(10);
    let order = match params.kind.as_deref() {
        Some("popular") => " ORDER BY COUNT(DISTINCT l.id) DESC",
        _ => " ORDER BY fu.created_at DESC",
    };
    let mut builder = QueryBuilder::new(FEED_SELECT);
    builder.push(order);
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    let rows: Vec<FeedRow> = builder.build_query_as().fetch_all(&mut db.acquire().await?).await?;
    Ok(Json(DataList::new(rows.into_iter().map(FeedItem::from).collect())))
}

pub async fn create_update(user_info: UserInfo, Json(body): Json<FarmingUpdateCreation>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    if body.deskripsi.trim().is_empty() {
        return Err(Error::Validation("field deskripsi is required".into()));
    }
    let owned: bool = query_scalar("SELECT EXISTS(SELECT id FROM proyek_tani WHERE id = $1 AND petani_id = $2)")
        .bind(body.proyek_tani_id)
        .bind(user_info.id)
        .fetch_one(&mut conn)
        .await?;
    if !owned {
        return Err(Error::NotFound("project not found or not yours".into()));
    }
    let update: FarmingUpdate = query_as(
        "INSERT INTO farming_updates (proyek_tani_id, judul, deskripsi, foto_url)
        VALUES ($1, $2, $3, $4)
        RETURNING *",
    )
    .bind(body.proyek_tani_id)
    .bind(&body.judul)
    .bind(body.deskripsi.trim())
    .bind(&body.foto_url)
    .fetch_one(&mut conn)
    .await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(update))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePayload {
    #[serde(default)]
    pub judul: String,
    #[serde(default)]
    pub deskripsi: String,
}

pub async fn update_jejak(user_info: UserInfo, update_id: Path<(i32,)>, Json(body): Json<UpdatePayload>, db: Data<PgPool>) -> Result<Json<FarmingUpdate>, Error> {
    let update_id = update_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    if body.judul.trim().is_empty() || body.deskripsi.trim().is_empty() {
        return Err(Error::Validation("judul and deskripsi are required".into()));
    }
    let updated: Option<FarmingUpdate> = query_as(
        "UPDATE farming_updates
        SET judul = $1, deskripsi = $2
        WHERE id = $3
        AND proyek_tani_id IN (SELECT id FROM proyek_tani WHERE petani_id = $4)
        RETURNING *",
    )
    .bind(body.judul.trim())
    .bind(body.deskripsi.trim())
    .bind(update_id)
    .bind(user_info.id)
    .fetch_optional(&mut conn)
    .await?;
    match updated {
        None => Err(Error::NotFound("update not found or not yours".into())),
        Some(updated) => Ok(Json(updated)),
    }
}

pub async fn delete_jejak(user_info: UserInfo, update_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let update_id = update_id.into_inner().0;
    let mut conn = db.acquire().await?;
    require_role(&mut conn, user_info.id, Role::Petani).await?;
    let deleted: Option<i32> = query_scalar(
        "DELETE FROM farming_updates
        WHERE id = $1
        AND proyek_tani_id IN (SELECT id FROM proyek_tani WHERE petani_id = $2)
        RETURNING id",
    )
    .bind(update_id)
    .bind(user_info.id)
    .fetch_optional(&mut conn)
    .await?;
    if deleted.is_none() {
        return Err(Error::NotFound("update not found or not yours".into()));
    }
    Ok(Json(MessageResponse::new("update deleted")))
}

pub async fn like(user_info: UserInfo, Json(body): Json<LikeRequest>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    query("INSERT INTO likes (user_id, farming_update_id) VALUES ($1, $2)")
        .bind(user_info.id)
        .bind(body.farming_update_id)
        .execute(&mut db.acquire().await?)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("already liked".into())
            } else {
                e.into()
            }
        })?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(MessageResponse::new("liked")))
}

pub async fn unlike(user_info: UserInfo, Json(body): Json<LikeRequest>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    query("DELETE FROM likes WHERE user_id = $1 AND farming_update_id = $2")
        .bind(user_info.id)
        .bind(body.farming_update_id)
        .execute(&mut db.acquire().await?)
        .await?;
    Ok(Json(MessageResponse::new("unliked")))
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i32,
    content: String,
    created_at: DateTime<Utc>,
    user_id: i32,
    user_name: Option<String>,
    user_username: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commenter {
    pub id: i32,
    pub name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user: Commenter,
}

impl From<CommentRow> for CommentView {
    fn from(r: CommentRow) -> Self {
        CommentView {
            id: r.id,
            content: r.content,
            created_at: r.created_at,
            user: Commenter {
                id: r.user_id,
                name: r.user_name,
                username: r.user_username,
            },
        }
    }
}

pub async fn create_comment(user_info: UserInfo, Json(body): Json<CommentCreation>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    if body.content.trim().is_empty() {
        return Err(Error::Validation("field content is required".into()));
    }
    let mut conn = db.acquire().await?;
    let row: CommentRow = query_as(
        "WITH inserted AS (
            INSERT INTO comments (user_id, farming_update_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, content, created_at, user_id
        )
        SELECT i.id, i.content, i.created_at, i.user_id,
            u.name AS user_name, u.username AS user_username
        FROM inserted AS i
        JOIN users AS u ON i.user_id = u.id",
    )
    .bind(user_info.id)
    .bind(body.farming_update_id)
    .bind(body.content.trim())
    .fetch_one(&mut conn)
    .await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(CommentView::from(row)))
}

pub async fn comments(jejak_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<Vec<CommentView>>, Error> {
    let jejak_id = jejak_id.into_inner().0;
    let rows: Vec<CommentRow> = query_as(
        "SELECT c.id, c.content, c.created_at, c.user_id,
            u.name AS user_name, u.username AS user_username
        FROM comments AS c
        JOIN users AS u ON c.user_id = u.id
        WHERE c.farming_update_id = $1
        ORDER BY c.created_at DESC",
    )
    .bind(jejak_id)
    .fetch_all(&mut db.acquire().await?)
    .await?;
    Ok(Json(rows.into_iter().map(CommentView::from).collect()))
}
