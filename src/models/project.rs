use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "proyek_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProyekStatus {
    Persiapan,
    Penanaman,
    Perawatan,
    Panen,
    Selesai,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProyekTani {
    pub id: i32,
    pub petani_id: i32,
    pub nama_proyek: String,
    pub deskripsi: String,
    pub lokasi_lahan: String,
    pub status: ProyekStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProyekCreation {
    #[serde(default)]
    pub nama_proyek: String,
    #[serde(default)]
    pub deskripsi: String,
    #[serde(default)]
    pub lokasi_lahan: String,
}

impl ProyekCreation {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.nama_proyek.trim().is_empty() || self.deskripsi.trim().is_empty() || self.lokasi_lahan.trim().is_empty() {
            return Err("namaProyek, deskripsi and lokasiLahan are required");
        }
        if self.nama_proyek.len() > 100 {
            return Err("namaProyek must be at most 100 characters");
        }
        if self.deskripsi.len() > 500 {
            return Err("deskripsi must be at most 500 characters");
        }
        if self.lokasi_lahan.len() > 200 {
            return Err("lokasiLahan must be at most 200 characters");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProyekUpdate {
    pub nama_proyek: String,
    pub deskripsi: String,
    pub lokasi_lahan: String,
    pub status: ProyekStatus,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FaseProyek {
    pub id: i32,
    pub proyek_tani_id: i32,
    pub nama: String,
    pub slug: String,
    pub cerita: String,
    pub gambar: Vec<String>,
    pub urutan: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FasePayload {
    pub nama: String,
    pub slug: String,
    pub cerita: String,
    #[serde(default)]
    pub gambar: Vec<String>,
    pub urutan: i32,
}

#[cfg(test)]
mod test {
    use super::*;

    fn creation() -> ProyekCreation {
        ProyekCreation {
            nama_proyek: "Padi Organik Musim Tanam II".into(),
            deskripsi: "Penanaman padi organik di lahan 2 hektar".into(),
            lokasi_lahan: "Sleman, Yogyakarta".into(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_payload() {
        assert!(creation().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized_fields() {
        let mut c = creation();
        c.deskripsi = "  ".into();
        assert!(c.validate().is_err());

        let mut c = creation();
        c.nama_proyek = "x".repeat(101);
        assert!(c.validate().is_err());

        let mut c = creation();
        c.deskripsi = "x".repeat(501);
        assert!(c.validate().is_err());

        let mut c = creation();
        c.lokasi_lahan = "x".repeat(201);
        assert!(c.validate().is_err());
    }
}
