use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    /// Parses the wire representation; anything outside the four states is refused.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ApplicationStatus::Pending),
            "UNDER_REVIEW" => Some(ApplicationStatus::UnderReview),
            "APPROVED" => Some(ApplicationStatus::Approved),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PetaniApplication {
    pub id: i32,
    pub user_id: i32,
    pub nama: String,
    pub username: String,
    pub bio: String,
    pub lokasi: String,
    pub link_whatsapp: String,
    pub alasan_menjadi: String,
    pub pengalaman_bertani: String,
    pub jenis_komoditas: String,
    pub luas_lahan: String,
    pub lokasi_lahan: String,
    pub foto_profil: Option<String>,
    #[serde(rename = "fotoKTP")]
    pub foto_ktp: String,
    pub sertifikat_lahan: Vec<String>,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSubmission {
    #[serde(default)]
    pub nama: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub lokasi: String,
    #[serde(default)]
    pub link_whatsapp: String,
    #[serde(default)]
    pub alasan_menjadi: String,
    #[serde(default)]
    pub pengalaman_bertani: String,
    #[serde(default)]
    pub jenis_komoditas: String,
    #[serde(default)]
    pub luas_lahan: String,
    #[serde(default)]
    pub lokasi_lahan: String,
    #[serde(default)]
    pub foto_profil: Option<String>,
    #[serde(default, rename = "fotoKTP")]
    pub foto_ktp: String,
    #[serde(default)]
    pub sertifikat_lahan: Vec<String>,
}

impl ApplicationSubmission {
    /// First required field that came in empty, in form order.
    pub fn missing_field(&self) -> Option<&'static str> {
        let required: [(&'static str, &str); 12] = [
            ("nama", &self.nama),
            ("username", &self.username),
            ("email", &self.email),
            ("bio", &self.bio),
            ("lokasi", &self.lokasi),
            ("linkWhatsapp", &self.link_whatsapp),
            ("alasanMenjadi", &self.alasan_menjadi),
            ("pengalamanBertani", &self.pengalaman_bertani),
            ("jenisKomoditas", &self.jenis_komoditas),
            ("luasLahan", &self.luas_lahan),
            ("lokasiLahan", &self.lokasi_lahan),
            ("fotoKTP", &self.foto_ktp),
        ];
        required.into_iter().find(|(_, v)| v.trim().is_empty()).map(|(name, _)| name)
    }
}

static WHATSAPP_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https://wa\.me/\d+$").unwrap());

pub fn valid_whatsapp_link(link: &str) -> bool {
    WHATSAPP_LINK.is_match(link)
}

/// Per-field patch applied to a user on approval. Only fields the
/// application actually filled in are carried; an empty string never
/// overwrites what the user already has.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

impl ProfilePatch {
    pub fn from_application(app: &PetaniApplication) -> Self {
        ProfilePatch {
            name: non_empty(&app.nama),
            username: non_empty(&app.username),
            bio: non_empty(&app.bio),
            image: app.foto_profil.as_deref().and_then(non_empty),
        }
    }

    /// Elevates the user to PETANI and applies the filled-in fields,
    /// one column per present value.
    pub async fn apply(&self, tx: &mut Transaction<'_, Postgres>, user_id: i32) -> Result<(), sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET role = 'PETANI', updated_at = NOW()");
        if let Some(name) = &self.name {
            builder.push(", name = ");
            builder.push_bind(name);
        }
        if let Some(username) = &self.username {
            builder.push(", username = ");
            builder.push_bind(username);
        }
        if let Some(bio) = &self.bio {
            builder.push(", bio = ");
            builder.push_bind(bio);
        }
        if let Some(image) = &self.image {
            builder.push(", image = ");
            builder.push_bind(image);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(user_id);
        builder.build().execute(&mut *tx).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn application() -> PetaniApplication {
        PetaniApplication {
            id: 1,
            user_id: 7,
            nama: "Budi".into(),
            username: "budi_tani".into(),
            bio: "".into(),
            lokasi: "Sleman".into(),
            link_whatsapp: "https://wa.me/628123456789".into(),
            alasan_menjadi: "ingin berjualan langsung".into(),
            pengalaman_bertani: "10 tahun".into(),
            jenis_komoditas: "padi".into(),
            luas_lahan: "2 ha".into(),
            lokasi_lahan: "Sleman".into(),
            foto_profil: None,
            foto_ktp: "ktp.jpg".into(),
            sertifikat_lahan: vec![],
            status: ApplicationStatus::Pending,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_patch_skips_empty_fields() {
        let app = application();
        let patch = ProfilePatch::from_application(&app);
        assert_eq!(patch.name.as_deref(), Some("Budi"));
        assert_eq!(patch.username.as_deref(), Some("budi_tani"));
        // empty bio and absent photo must not end up in the patch
        assert_eq!(patch.bio, None);
        assert_eq!(patch.image, None);
    }

    #[test]
    fn test_patch_ignores_whitespace_only_values() {
        let mut app = application();
        app.nama = "   ".into();
        app.foto_profil = Some(" ".into());
        let patch = ProfilePatch::from_application(&app);
        assert_eq!(patch.name, None);
        assert_eq!(patch.image, None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ApplicationStatus::parse("PENDING"), Some(ApplicationStatus::Pending));
        assert_eq!(ApplicationStatus::parse("UNDER_REVIEW"), Some(ApplicationStatus::UnderReview));
        assert_eq!(ApplicationStatus::parse("APPROVED"), Some(ApplicationStatus::Approved));
        assert_eq!(ApplicationStatus::parse("REJECTED"), Some(ApplicationStatus::Rejected));
        assert_eq!(ApplicationStatus::parse("SOMETHING_ELSE"), None);
        assert_eq!(ApplicationStatus::parse("approved"), None);
    }

    #[test]
    fn test_whatsapp_link() {
        assert!(valid_whatsapp_link("https://wa.me/628123456789"));
        assert!(!valid_whatsapp_link("628123456789"));
        assert!(!valid_whatsapp_link("http://wa.me/628123456789"));
        assert!(!valid_whatsapp_link("https://wa.me/"));
        assert!(!valid_whatsapp_link("https://wa.me/62812abc"));
        assert!(!valid_whatsapp_link("https://wa.me/628123456789 "));
    }

    #[test]
    fn test_missing_field_order() {
        let mut sub = ApplicationSubmission {
            nama: "Budi".into(),
            username: "budi".into(),
            email: "budi@tandur.id".into(),
            bio: "petani padi".into(),
            lokasi: "Sleman".into(),
            link_whatsapp: "https://wa.me/628123456789".into(),
            alasan_menjadi: "x".into(),
            pengalaman_bertani: "x".into(),
            jenis_komoditas: "padi".into(),
            luas_lahan: "2 ha".into(),
            lokasi_lahan: "Sleman".into(),
            foto_profil: None,
            foto_ktp: "ktp.jpg".into(),
            sertifikat_lahan: vec![],
        };
        assert_eq!(sub.missing_field(), None);
        sub.bio = "".into();
        sub.lokasi = "".into();
        assert_eq!(sub.missing_field(), Some("bio"));
    }
}
