use actix_web::{
    http::StatusCode,
    web::{Data, Json},
    HttpResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{query_as, query_scalar, FromRow, PgPool};

use crate::context::UserInfo;
use crate::error::{is_unique_violation, Error};
use crate::models::application::{valid_whatsapp_link, ApplicationStatus, ApplicationSubmission};
use crate::models::user::Role;
use crate::response::CreateResponse;
use crate::serde::Serialize;

/// Files a farmer application for the calling user. The row starts out
/// PENDING; the caller keeps their current role until an admin approves.
pub async fn submit(user_info: UserInfo, Json(data): Json<ApplicationSubmission>, db: Data<PgPool>) -> Result<HttpResponse, Error> {
    if let Some(field) = data.missing_field() {
        return Err(Error::Validation(format!("field {} is required", field)));
    }

    let mut tx = db.begin().await?;

    let already_applied: bool = query_scalar("SELECT EXISTS(SELECT id FROM petani_applications WHERE user_id = $1)")
        .bind(user_info.id)
        .fetch_one(&mut tx)
        .await?;
    if already_applied {
        return Err(Error::Conflict("you have already applied, please wait for the review".into()));
    }

    match super::fetch_role(&mut tx, user_info.id).await? {
        None => return Err(Error::Unauthorized("login required".into())),
        Some(Role::Petani) => return Err(Error::Validation("you are already registered as a petani".into())),
        Some(_) => {}
    }

    let username_taken: bool = query_scalar("SELECT EXISTS(SELECT id FROM users WHERE username = $1 AND id != $2)")
        .bind(&data.username)
        .bind(user_info.id)
        .fetch_one(&mut tx)
        .await?;
    if username_taken {
        return Err(Error::Conflict("username already taken, please pick another one".into()));
    }

    if !valid_whatsapp_link(&data.link_whatsapp) {
        return Err(Error::Validation("invalid WhatsApp link, use the format https://wa.me/628123456789".into()));
    }

    let id: i32 = query_scalar(
        "INSERT INTO petani_applications
            (user_id, nama, username, bio, lokasi, link_whatsapp, alasan_menjadi, pengalaman_bertani,
             jenis_komoditas, luas_lahan, lokasi_lahan, foto_profil, foto_ktp, sertifikat_lahan)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING id",
    )
    .bind(user_info.id)
    .bind(&data.nama)
    .bind(&data.username)
    .bind(&data.bio)
    .bind(&data.lokasi)
    .bind(&data.link_whatsapp)
    .bind(&data.alasan_menjadi)
    .bind(&data.pengalaman_bertani)
    .bind(&data.jenis_komoditas)
    .bind(&data.luas_lahan)
    .bind(&data.lokasi_lahan)
    .bind(&data.foto_profil)
    .bind(&data.foto_ktp)
    .bind(&data.sertifikat_lahan)
    .fetch_one(&mut tx)
    .await
    .map_err(|e| {
        // a concurrent submission can slip past the existence check and
        // land on the unique constraint instead
        if is_unique_violation(&e) {
            Error::Conflict("you have already applied, please wait for the review".into())
        } else {
            e.into()
        }
    })?;
    tx.commit().await?;

    // notification to the admins would go out here once a mail channel exists
    Ok(HttpResponse::build(StatusCode::CREATED).json(CreateResponse { id }))
}

#[derive(Debug, FromRow)]
struct StatusRow {
    id: i32,
    status: ApplicationStatus,
    admin_notes: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    reviewer_name: Option<String>,
    reviewer_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewedBy {
    name: Option<String>,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    id: i32,
    status: ApplicationStatus,
    admin_notes: Option<String>,
    reviewed_by: Option<ReviewedBy>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    has_application: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    application: Option<StatusView>,
}

/// The caller's own application status. There is no id parameter on
/// purpose: the query is always scoped to the authenticated user.
pub async fn status(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<StatusResponse>, Error> {
    let mut conn = db.acquire().await?;
    let row: Option<StatusRow> = query_as(
        "SELECT a.id, a.status, a.admin_notes, a.reviewed_at, a.created_at, a.updated_at,
                r.name AS reviewer_name, r.email AS reviewer_email
        FROM petani_applications AS a
        LEFT JOIN users AS r ON a.reviewed_by = r.id
        WHERE a.user_id = $1",
    )
    .bind(user_info.id)
    .fetch_optional(&mut conn)
    .await?;
    match row {
        None => Ok(Json(StatusResponse {
            has_application: false,
            application: None,
        })),
        Some(row) => Ok(Json(StatusResponse {
            has_application: true,
            application: Some(StatusView {
                id: row.id,
                status: row.status,
                admin_notes: row.admin_notes,
                reviewed_by: row.reviewer_email.map(|email| ReviewedBy {
                    name: row.reviewer_name,
                    email,
                }),
                reviewed_at: row.reviewed_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            }),
        })),
    }
}
