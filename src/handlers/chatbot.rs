use actix_web::web::{Data, Json};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use sqlx::pool::PoolConnection;
use sqlx::{query_as, query_scalar, FromRow, PgPool, Postgres};

use crate::error::Error;
use crate::serde::{Deserialize, Serialize};

/// What the user is asking TaniBot about. Produced by one pass over the
/// lowercased message; the variants are listed in match precedence order,
/// first hit wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProductsNew,
    ProductsAvailable,
    ProductsRice,
    ProductsVegetables,
    ProductsFruits,
    ProductsCheap,
    FarmersNew,
    FarmersActive,
    ProjectsInfo,
    Stats,
    Updates,
    Locations,
    General,
}

pub fn classify(message: &str) -> Intent {
    let m = message.to_lowercase();
    let has = |kw: &str| m.contains(kw);
    if has("produk") && (has("terbaru") || has("baru")) {
        return Intent::ProductsNew;
    }
    if has("produk") && (has("tersedia") || has("ada")) {
        return Intent::ProductsAvailable;
    }
    if has("beras") || has("padi") {
        return Intent::ProductsRice;
    }
    if has("sayur") || has("sayuran") || has("kangkung") || has("bayam") || has("tomat") {
        return Intent::ProductsVegetables;
    }
    if has("buah") || has("jeruk") || has("apel") || has("pisang") {
        return Intent::ProductsFruits;
    }
    if has("murah") || has("harga") {
        return Intent::ProductsCheap;
    }
    if has("petani") && (has("baru") || has("bergabung")) {
        return Intent::FarmersNew;
    }
    if has("petani") && (has("aktif") || has("terbaik")) {
        return Intent::FarmersActive;
    }
    if has("proyek") || has("project") || has("tanam") {
        return Intent::ProjectsInfo;
    }
    if has("statistik") || has("data") || has("jumlah") {
        return Intent::Stats;
    }
    if has("update") || has("berita") || has("kabar") {
        return Intent::Updates;
    }
    if has("lokasi") || has("daerah") || has("tempat") {
        return Intent::Locations;
    }
    Intent::General
}

/// Formats rupiah the Indonesian way: `Rp15.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .join(".");
    if amount < 0 {
        format!("-Rp{}", grouped)
    } else {
        format!("Rp{}", grouped)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[allow(dead_code)]
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub text: String,
    pub intent: Intent,
}

#[derive(Debug, FromRow)]
struct ChatProduct {
    nama_produk: String,
    harga: i64,
    unit: String,
    stok_tersedia: i32,
    petani_name: Option<String>,
    petani_lokasi: Option<String>,
}

#[derive(Debug, FromRow)]
struct ChatFarmer {
    name: Option<String>,
    lokasi: Option<String>,
}

#[derive(Debug, FromRow)]
struct ChatProject {
    nama_proyek: String,
    status: String,
    petani_name: Option<String>,
    petani_lokasi: Option<String>,
}

#[derive(Debug, FromRow)]
struct ChatUpdate {
    judul: String,
    created_at: DateTime<Utc>,
    nama_proyek: String,
    petani_name: Option<String>,
}

#[derive(Debug, FromRow)]
struct ChatLocation {
    lokasi: Option<String>,
    jumlah: i64,
}

const PRODUCT_SELECT: &str = "SELECT p.nama_produk, p.harga, p.unit, p.stok_tersedia,
    u.name AS petani_name, u.lokasi AS petani_lokasi
FROM produk AS p
JOIN proyek_tani AS pt ON p.proyek_tani_id = pt.id
JOIN users AS u ON pt.petani_id = u.id";

async fn products_for(conn: &mut PoolConnection<Postgres>, intent: Intent) -> Result<Vec<ChatProduct>, Error> {
    let sql = match intent {
        Intent::ProductsNew => format!(
            "{} WHERE p.created_at >= NOW() - INTERVAL '7 days' ORDER BY p.created_at DESC LIMIT 6",
            PRODUCT_SELECT
        ),
        Intent::ProductsAvailable => format!(
            "{} WHERE p.status = 'TERSEDIA' AND p.stok_tersedia > 0 ORDER BY p.created_at DESC LIMIT 8",
            PRODUCT_SELECT
        ),
        Intent::ProductsRice => format!(
            "{} WHERE p.nama_produk ILIKE ANY(ARRAY['%beras%', '%padi%']) LIMIT 5",
            PRODUCT_SELECT
        ),
        Intent::ProductsVegetables => format!(
            "{} WHERE p.nama_produk ILIKE ANY(ARRAY['%sayur%', '%tomat%', '%cabai%', '%kangkung%', '%bayam%', '%wortel%']) LIMIT 8",
            PRODUCT_SELECT
        ),
        Intent::ProductsFruits => format!(
            "{} WHERE p.nama_produk ILIKE ANY(ARRAY['%buah%', '%jeruk%', '%apel%', '%pisang%', '%mangga%']) LIMIT 8",
            PRODUCT_SELECT
        ),
        Intent::ProductsCheap => format!(
            "{} WHERE p.harga < 50000 AND p.status = 'TERSEDIA' ORDER BY p.harga ASC LIMIT 8",
            PRODUCT_SELECT
        ),
        _ => return Ok(Vec::new()),
    };
    let list = query_as(&sql).fetch_all(&mut *conn).await?;
    Ok(list)
}

fn product_lines(products: &[ChatProduct]) -> String {
    products
        .iter()
        .map(|p| {
            format!(
                "- **{}** — {}/{}, stok {} (petani **{}**, {})",
                p.nama_produk,
                format_rupiah(p.harga),
                p.unit,
                p.stok_tersedia,
                p.petani_name.as_deref().unwrap_or("tanpa nama"),
                p.petani_lokasi.as_deref().unwrap_or("lokasi belum diisi"),
            )
        })
        .join("\n")
}

fn farmer_lines(farmers: &[ChatFarmer]) -> String {
    farmers
        .iter()
        .map(|f| {
            format!(
                "- **{}** dari {}",
                f.name.as_deref().unwrap_or("tanpa nama"),
                f.lokasi.as_deref().unwrap_or("lokasi belum diisi"),
            )
        })
        .join("\n")
}

pub async fn chat(Json(req): Json<ChatRequest>, db: Data<PgPool>) -> Result<Json<ChatResponse>, Error> {
    let last_message = req.messages.last().map(|m| m.content.as_str()).unwrap_or("");
    let intent = classify(last_message);
    let mut conn = db.acquire().await?;

    let text = match intent {
        Intent::ProductsNew
        | Intent::ProductsAvailable
        | Intent::ProductsRice
        | Intent::ProductsVegetables
        | Intent::ProductsFruits
        | Intent::ProductsCheap => {
            let products = products_for(&mut conn, intent).await?;
            if products.is_empty() {
                "Belum ada produk yang cocok saat ini. Coba lagi nanti ya!".to_owned()
            } else {
                let heading = match intent {
                    Intent::ProductsNew => "Ini dia produk terbaru dari para petani:",
                    Intent::ProductsAvailable => "Produk yang tersedia sekarang:",
                    Intent::ProductsCheap => "Produk ramah kantong untukmu:",
                    _ => "Produk yang cocok dengan pencarianmu:",
                };
                format!("{}\n{}", heading, product_lines(&products))
            }
        }
        Intent::FarmersNew => {
            let farmers: Vec<ChatFarmer> = query_as(
                "SELECT name, lokasi FROM users
                WHERE role = 'PETANI' AND created_at >= NOW() - INTERVAL '7 days'
                ORDER BY created_at DESC LIMIT 5",
            )
            .fetch_all(&mut conn)
            .await?;
            if farmers.is_empty() {
                "Belum ada petani baru minggu ini.".to_owned()
            } else {
                format!("Petani yang baru bergabung minggu ini:\n{}", farmer_lines(&farmers))
            }
        }
        Intent::FarmersActive => {
            let farmers: Vec<ChatFarmer> = query_as(
                "SELECT DISTINCT u.name, u.lokasi FROM users AS u
                JOIN proyek_tani AS pt ON u.id = pt.petani_id
                WHERE u.role = 'PETANI' AND pt.status IN ('PENANAMAN', 'PERAWATAN', 'PANEN')
                LIMIT 5",
            )
            .fetch_all(&mut conn)
            .await?;
            if farmers.is_empty() {
                "Belum ada petani dengan proyek aktif saat ini.".to_owned()
            } else {
                format!("Petani paling aktif saat ini:\n{}", farmer_lines(&farmers))
            }
        }
        Intent::ProjectsInfo => {
            let projects: Vec<ChatProject> = query_as(
                "SELECT pt.nama_proyek, pt.status::TEXT AS status, u.name AS petani_name, u.lokasi AS petani_lokasi
                FROM proyek_tani AS pt
                JOIN users AS u ON pt.petani_id = u.id
                WHERE pt.status IN ('PENANAMAN', 'PERAWATAN', 'PANEN')
                ORDER BY pt.updated_at DESC LIMIT 6",
            )
            .fetch_all(&mut conn)
            .await?;
            if projects.is_empty() {
                "Belum ada proyek tanam yang aktif saat ini.".to_owned()
            } else {
                let lines = projects
                    .iter()
                    .map(|p| {
                        format!(
                            "- **{}** ({}) oleh **{}** di {}",
                            p.nama_proyek,
                            p.status,
                            p.petani_name.as_deref().unwrap_or("tanpa nama"),
                            p.petani_lokasi.as_deref().unwrap_or("lokasi belum diisi"),
                        )
                    })
                    .join("\n");
                format!("Proyek tanam yang sedang berjalan:\n{}", lines)
            }
        }
        Intent::Stats => {
            let total_farmers: i64 = query_scalar("SELECT COUNT(*) FROM users WHERE role = 'PETANI'").fetch_one(&mut conn).await?;
            let total_products: i64 = query_scalar("SELECT COUNT(*) FROM produk").fetch_one(&mut conn).await?;
            let active_projects: i64 = query_scalar("SELECT COUNT(*) FROM proyek_tani WHERE status IN ('PENANAMAN', 'PERAWATAN', 'PANEN')")
                .fetch_one(&mut conn)
                .await?;
            let available_products: i64 = query_scalar("SELECT COUNT(*) FROM produk WHERE status = 'TERSEDIA' AND stok_tersedia > 0")
                .fetch_one(&mut conn)
                .await?;
            format!(
                "Statistik Tandur saat ini:\n- **{}** petani terdaftar\n- **{}** produk ({} tersedia)\n- **{}** proyek aktif",
                total_farmers, total_products, available_products, active_projects
            )
        }
        Intent::Updates => {
            let updates: Vec<ChatUpdate> = query_as(
                "SELECT fu.judul, fu.created_at, pt.nama_proyek, u.name AS petani_name
                FROM farming_updates AS fu
                JOIN proyek_tani AS pt ON fu.proyek_tani_id = pt.id
                JOIN users AS u ON pt.petani_id = u.id
                ORDER BY fu.created_at DESC LIMIT 5",
            )
            .fetch_all(&mut conn)
            .await?;
            if updates.is_empty() {
                "Belum ada kabar terbaru dari ladang.".to_owned()
            } else {
                let lines = updates
                    .iter()
                    .map(|up| {
                        format!(
                            "- **{}** dari proyek **{}** ({}, {})",
                            up.judul,
                            up.nama_proyek,
                            up.petani_name.as_deref().unwrap_or("tanpa nama"),
                            up.created_at.format("%d-%m-%Y"),
                        )
                    })
                    .join("\n");
                format!("Kabar terbaru dari ladang:\n{}", lines)
            }
        }
        Intent::Locations => {
            let locations: Vec<ChatLocation> = query_as(
                "SELECT lokasi, COUNT(*) AS jumlah FROM users
                WHERE role = 'PETANI' AND lokasi IS NOT NULL
                GROUP BY lokasi ORDER BY COUNT(*) DESC LIMIT 8",
            )
            .fetch_all(&mut conn)
            .await?;
            if locations.is_empty() {
                "Belum ada data lokasi petani.".to_owned()
            } else {
                let lines = locations
                    .iter()
                    .map(|l| format!("- **{}**: {} petani", l.lokasi.as_deref().unwrap_or("-"), l.jumlah))
                    .join("\n");
                format!("Daerah dengan petani terbanyak:\n{}", lines)
            }
        }
        Intent::General => "Halo! Aku TaniBot. Tanyakan soal produk, petani, proyek tanam, atau statistik Tandur ya!".to_owned(),
    };

    Ok(Json(ChatResponse { text, intent }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify_precedence() {
        // "produk baru" must win over the generic product intents
        assert_eq!(classify("ada produk terbaru nggak?"), Intent::ProductsNew);
        assert_eq!(classify("produk apa yang tersedia?"), Intent::ProductsAvailable);
        // "beras murah" hits the rice rule before the price rule
        assert_eq!(classify("beras murah"), Intent::ProductsRice);
        assert_eq!(classify("harga sayur kangkung"), Intent::ProductsVegetables);
        assert_eq!(classify("jeruk manis"), Intent::ProductsFruits);
        assert_eq!(classify("yang murah dong"), Intent::ProductsCheap);
        assert_eq!(classify("petani baru minggu ini"), Intent::FarmersNew);
        assert_eq!(classify("siapa petani paling aktif"), Intent::FarmersActive);
        // bare "petani" has no dedicated rule and falls through to general
        assert_eq!(classify("petani"), Intent::General);
        assert_eq!(classify("proyek tanam apa saja"), Intent::ProjectsInfo);
        assert_eq!(classify("statistik platform"), Intent::Stats);
        assert_eq!(classify("kabar dari ladang"), Intent::Updates);
        assert_eq!(classify("daerah mana yang banyak petaninya"), Intent::Locations);
        assert_eq!(classify("halo bot"), Intent::General);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("PRODUK TERBARU"), Intent::ProductsNew);
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(0), "Rp0");
        assert_eq!(format_rupiah(500), "Rp500");
        assert_eq!(format_rupiah(15000), "Rp15.000");
        assert_eq!(format_rupiah(1234567), "Rp1.234.567");
        assert_eq!(format_rupiah(-2500), "-Rp2.500");
    }
}
