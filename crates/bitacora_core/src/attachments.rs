//! crates/bitacora_core/src/attachments.rs
//!
//! Base64 image payloads: signatures, evidence photos and gallery uploads
//! all travel as data URLs (`data:image/png;base64,...`) or bare base64.

use crate::domain::{MediaCategory, NewMedia, SessionContext};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Largest accepted upload, after decoding.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttachmentError {
    #[error("El archivo está vacío")]
    Empty,
    #[error("Formato de imagen no soportado: {0}")]
    UnsupportedType(String),
    #[error("El contenido no es base64 válido")]
    InvalidBase64,
    #[error("El archivo excede el límite de 5MB")]
    TooLarge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decodes a data URL or bare base64 string. Bare base64 is assumed PNG,
/// which is what signature canvases produce.
pub fn decode_image(payload: &str) -> Result<DecodedImage, AttachmentError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(AttachmentError::Empty);
    }

    let (mime, data) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or(AttachmentError::InvalidBase64)?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or(AttachmentError::InvalidBase64)?;
            if !mime.starts_with("image/") {
                return Err(AttachmentError::UnsupportedType(mime.to_string()));
            }
            (mime.to_string(), data)
        }
        None => ("image/png".to_string(), payload),
    };

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| AttachmentError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(AttachmentError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AttachmentError::TooLarge);
    }
    Ok(DecodedImage { mime, bytes })
}

/// Human-readable size as shown in the media gallery.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

/// A gallery upload as the client sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaUpload {
    pub url: String,
    pub name: String,
    pub category: MediaCategory,
}

impl MediaUpload {
    pub fn into_new_media(self, ctx: &SessionContext) -> Result<NewMedia, AttachmentError> {
        let image = decode_image(&self.url)?;
        let name = if self.name.trim().is_empty() {
            "Archivo sin nombre".to_string()
        } else {
            self.name.trim().to_string()
        };
        Ok(NewMedia {
            url: self.url,
            name,
            category: self.category,
            uploader_id: ctx.user_id.clone(),
            uploader_name: ctx.user_name.clone(),
            timestamp: Utc::now(),
            size: Some(format_size(image.bytes.len())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;

    // 1x1 transparent PNG
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn decodes_data_urls_and_bare_base64() {
        let url = format!("data:image/jpeg;base64,{}", PIXEL);
        assert_eq!(decode_image(&url).unwrap().mime, "image/jpeg");
        assert_eq!(decode_image(PIXEL).unwrap().mime, "image/png");
    }

    #[test]
    fn rejects_bad_payloads() {
        assert_eq!(decode_image("   "), Err(AttachmentError::Empty));
        assert_eq!(decode_image("not base64 at all!"), Err(AttachmentError::InvalidBase64));
        assert_eq!(
            decode_image(&format!("data:application/pdf;base64,{}", PIXEL)),
            Err(AttachmentError::UnsupportedType("application/pdf".to_string()))
        );
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn uploads_get_a_default_name_and_uploader() {
        let ctx = SessionContext {
            user_id: "op-9".to_string(),
            user_name: "Mario".to_string(),
            role: UserRole::Operator,
        };
        let media = MediaUpload {
            url: format!("data:image/png;base64,{}", PIXEL),
            name: " ".to_string(),
            category: MediaCategory::Unidad,
        }
        .into_new_media(&ctx)
        .unwrap();
        assert_eq!(media.name, "Archivo sin nombre");
        assert_eq!(media.uploader_id, "op-9");
        assert!(media.size.unwrap().ends_with(" B"));
    }
}
