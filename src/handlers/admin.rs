use actix_web::web::{Data, Json, Path, Query};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{query_as, query_scalar, FromRow, PgPool, Postgres, QueryBuilder, Transaction};

use crate::context::UserInfo;
use crate::error::Error;
use crate::models::application::{ApplicationStatus, PetaniApplication, ProfilePatch};
use crate::models::user::{PublicUser, ReviewerInfo};
use crate::request::Pagination;
use crate::response::{MessageResponse, PageInfo};
use crate::serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct EnrichedApplication {
    #[serde(flatten)]
    pub application: PetaniApplication,
    pub user: Option<PublicUser>,
    pub reviewer: Option<ReviewerInfo>,
}

// Relation lookups are made one by one and degrade to null when the
// referenced user is gone, so one dangling reference never takes down a
// whole listing page.
async fn enrich(conn: &mut PoolConnection<Postgres>, application: PetaniApplication) -> EnrichedApplication {
    let user: Option<PublicUser> = query_as("SELECT id, name, email, image FROM users WHERE id = $1")
        .bind(application.user_id)
        .fetch_optional(&mut *conn)
        .await
        .ok()
        .flatten();
    let reviewer: Option<ReviewerInfo> = match application.reviewed_by {
        Some(reviewer_id) => query_as("SELECT name, email FROM users WHERE id = $1")
            .bind(reviewer_id)
            .fetch_optional(&mut *conn)
            .await
            .ok()
            .flatten(),
        None => None,
    };
    EnrichedApplication {
        application,
        user,
        reviewer,
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationPage {
    pub applications: Vec<EnrichedApplication>,
    pub pagination: PageInfo,
}

pub async fn list_applications(
    Query(StatusFilter { status }): Query<StatusFilter>,
    Query(pagination): Query<Pagination>,
    db: Data<PgPool>,
) -> Result<Json<ApplicationPage>, Error> {
    let filter = match status.as_deref() {
        None | Some("all") | Some("") => None,
        Some(s) => Some(ApplicationStatus::parse(s).ok_or_else(|| Error::Validation("invalid status filter".into()))?),
    };
    let mut conn = db.acquire().await?;

    let mut total_query = QueryBuilder::new("SELECT COUNT(*) FROM petani_applications WHERE 1 = 1");
    if let Some(status) = filter {
        total_query.push(" AND status = ");
        total_query.push_bind(status);
    }
    let (total,): (i64,) = total_query.build_query_as().fetch_one(&mut conn).await?;

    let mut list_query = QueryBuilder::new("SELECT * FROM petani_applications WHERE 1 = 1");
    if let Some(status) = filter {
        list_query.push(" AND status = ");
        list_query.push_bind(status);
    }
    list_query.push(" ORDER BY created_at DESC LIMIT ");
    list_query.push_bind(pagination.limit);
    list_query.push(" OFFSET ");
    list_query.push_bind(pagination.offset());
    let applications: Vec<PetaniApplication> = list_query.build_query_as().fetch_all(&mut conn).await?;

    let mut enriched = Vec::with_capacity(applications.len());
    for application in applications {
        enriched.push(enrich(&mut conn, application).await);
    }
    Ok(Json(ApplicationPage {
        applications: enriched,
        pagination: PageInfo::new(&pagination, total),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub application_id: Option<i32>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub message: String,
    pub application: EnrichedApplication,
}

/// Moves an application to the requested status. Approval additionally
/// elevates the applicant to PETANI and copies the filled-in profile
/// fields over, all inside one transaction.
pub async fn transition(user_info: UserInfo, Json(req): Json<TransitionRequest>, db: Data<PgPool>) -> Result<Json<TransitionResponse>, Error> {
    let (application_id, status) = match (req.application_id, req.status.as_deref()) {
        (Some(id), Some(status)) => (id, status),
        _ => return Err(Error::Validation("applicationId and status are required".into())),
    };
    let status = ApplicationStatus::parse(status).ok_or_else(|| Error::Validation("invalid status".into()))?;

    let mut tx = db.begin().await?;
    let application: Option<PetaniApplication> = query_as(
        "UPDATE petani_applications
        SET status = $1, admin_notes = $2, reviewed_by = $3, reviewed_at = NOW(), updated_at = NOW()
        WHERE id = $4
        RETURNING *",
    )
    .bind(status)
    .bind(&req.admin_notes)
    .bind(user_info.id)
    .bind(application_id)
    .fetch_optional(&mut tx)
    .await?;
    let application = match application {
        Some(application) => application,
        None => return Err(Error::NotFound("application not found".into())),
    };

    if status == ApplicationStatus::Approved {
        apply_approval(&mut tx, &application).await?;
    }
    tx.commit().await?;

    let mut conn = db.acquire().await?;
    let enriched = enrich(&mut conn, application).await;
    Ok(Json(TransitionResponse {
        message: "application status updated".into(),
        application: enriched,
    }))
}

async fn apply_approval(tx: &mut Transaction<'_, Postgres>, application: &PetaniApplication) -> Result<(), Error> {
    let user_exists: bool = query_scalar("SELECT EXISTS(SELECT id FROM users WHERE id = $1)")
        .bind(application.user_id)
        .fetch_one(&mut *tx)
        .await?;
    if !user_exists {
        log::error!("application {} approved but user {} no longer exists", application.id, application.user_id);
        return Ok(());
    }
    let patch = ProfilePatch::from_application(application);
    patch.apply(tx, application.user_id).await?;
    Ok(())
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct ApplicantInfo {
    id: i32,
    name: Option<String>,
    email: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    application: PetaniApplication,
    user: Option<ApplicantInfo>,
    reviewer: Option<ReviewerInfo>,
}

pub async fn application_detail(application_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<ApplicationDetail>, Error> {
    let application_id = application_id.into_inner().0;
    let mut conn = db.acquire().await?;
    let application: Option<PetaniApplication> = query_as("SELECT * FROM petani_applications WHERE id = $1")
        .bind(application_id)
        .fetch_optional(&mut conn)
        .await?;
    let application = match application {
        Some(application) => application,
        None => return Err(Error::NotFound("application not found".into())),
    };
    let user: Option<ApplicantInfo> = query_as("SELECT id, name, email, image, created_at FROM users WHERE id = $1")
        .bind(application.user_id)
        .fetch_optional(&mut conn)
        .await
        .ok()
        .flatten();
    let reviewer: Option<ReviewerInfo> = match application.reviewed_by {
        Some(reviewer_id) => query_as("SELECT name, email FROM users WHERE id = $1")
            .bind(reviewer_id)
            .fetch_optional(&mut conn)
            .await
            .ok()
            .flatten(),
        None => None,
    };
    Ok(Json(ApplicationDetail {
        application,
        user,
        reviewer,
    }))
}

pub async fn delete_application(application_id: Path<(i32,)>, db: Data<PgPool>) -> Result<Json<MessageResponse>, Error> {
    let application_id = application_id.into_inner().0;
    let deleted: Option<i32> = query_scalar("DELETE FROM petani_applications WHERE id = $1 RETURNING id")
        .bind(application_id)
        .fetch_optional(&mut db.acquire().await?)
        .await?;
    if deleted.is_none() {
        return Err(Error::NotFound("application not found".into()));
    }
    Ok(Json(MessageResponse::new("application deleted")))
}
