use actix_web::web::{Data, Json};
use sqlx::{query_as, query_scalar, FromRow, PgPool};

use crate::error::Error;
use crate::serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Totals {
    pub farmers: i64,
    pub products: i64,
    pub projects: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recent {
    pub new_farmers_this_week: i64,
    pub new_products_this_week: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Active {
    pub active_projects: i64,
    pub available_products: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct NameCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct LocationCount {
    pub location: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub top_product_types: Vec<NameCount>,
    pub top_locations: Vec<LocationCount>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub totals: Totals,
    pub recent: Recent,
    pub active: Active,
    pub insights: Insights,
}

pub async fn overview(db: Data<PgPool>) -> Result<Json<StatsResponse>, Error> {
    let mut conn = db.acquire().await?;
    let farmers: i64 = query_scalar("SELECT COUNT(*) FROM users WHERE role = 'PETANI'").fetch_one(&mut conn).await?;
    let products: i64 = query_scalar("SELECT COUNT(*) FROM produk").fetch_one(&mut conn).await?;
    let projects: i64 = query_scalar("SELECT COUNT(*) FROM proyek_tani").fetch_one(&mut conn).await?;
    let new_farmers_this_week: i64 = query_scalar("SELECT COUNT(*) FROM users WHERE role = 'PETANI' AND created_at >= NOW() - INTERVAL '7 days'")
        .fetch_one(&mut conn)
        .await?;
    let new_products_this_week: i64 = query_scalar("SELECT COUNT(*) FROM produk WHERE created_at >= NOW() - INTERVAL '7 days'")
        .fetch_one(&mut conn)
        .await?;
    let active_projects: i64 = query_scalar("SELECT COUNT(*) FROM proyek_tani WHERE status IN ('PENANAMAN', 'PERAWATAN', 'PANEN')")
        .fetch_one(&mut conn)
        .await?;
    let available_products: i64 = query_scalar("SELECT COUNT(*) FROM produk WHERE status = 'TERSEDIA' AND stok_tersedia > 0")
        .fetch_one(&mut conn)
        .await?;
    let top_product_types: Vec<NameCount> = query_as(
        "SELECT nama_produk AS name, COUNT(*) AS count
        FROM produk
        GROUP BY nama_produk
        ORDER BY COUNT(*) DESC
        LIMIT 5",
    )
    .fetch_all(&mut conn)
    .await?;
    let top_locations: Vec<LocationCount> = query_as(
        "SELECT lokasi AS location, COUNT(*) AS count
        FROM users
        WHERE role = 'PETANI' AND lokasi IS NOT NULL
        GROUP BY lokasi
        ORDER BY COUNT(*) DESC
        LIMIT 5",
    )
    .fetch_all(&mut conn)
    .await?;
    Ok(Json(StatsResponse {
        totals: Totals {
            farmers,
            products,
            projects,
        },
        recent: Recent {
            new_farmers_this_week,
            new_products_this_week,
        },
        active: Active {
            active_projects,
            available_products,
        },
        insights: Insights {
            top_product_types,
            top_locations,
        },
    }))
}
