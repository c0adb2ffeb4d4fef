use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "produk_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProdukStatus {
    Tersedia,
    Preorder,
    Habis,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Produk {
    pub id: i32,
    pub proyek_tani_id: i32,
    pub nama_produk: String,
    pub deskripsi: String,
    pub foto_url: Option<String>,
    pub harga: i64,
    pub unit: String,
    pub stok_tersedia: i32,
    pub status: ProdukStatus,
    pub estimasi_panen: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProdukPayload {
    #[serde(default)]
    pub nama_produk: String,
    #[serde(default)]
    pub deskripsi: String,
    #[serde(default)]
    pub foto_url: Option<String>,
    pub harga: i64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub stok_tersedia: i32,
    pub status: ProdukStatus,
    #[serde(default)]
    pub estimasi_panen: Option<String>,
}

impl ProdukPayload {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.nama_produk.trim().is_empty() || self.deskripsi.trim().is_empty() || self.unit.trim().is_empty() {
            return Err("namaProduk, deskripsi and unit are required");
        }
        if self.harga < 0 {
            return Err("harga must not be negative");
        }
        if self.stok_tersedia < 0 {
            return Err("stokTersedia must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        let mut p = ProdukPayload {
            nama_produk: "Beras Organik".into(),
            deskripsi: "Beras hasil panen sendiri".into(),
            foto_url: None,
            harga: 15000,
            unit: "kg".into(),
            stok_tersedia: 20,
            status: ProdukStatus::Tersedia,
            estimasi_panen: None,
        };
        assert!(p.validate().is_ok());
        p.harga = -1;
        assert!(p.validate().is_err());
    }
}
