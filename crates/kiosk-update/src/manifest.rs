//! Update manifest decoding
//!
//! Manifests come from more than one publishing tool, so each field is
//! accepted under a few names:
//!
//! | field | accepted keys |
//! |---|---|
//! | version | `version`, `hash` (number or string) |
//! | asset URL | `videoURL`, `video_url`, `url` |
//! | field of view | `fieldOfView`, `fov` (degrees) |
//! | digest | `sha256`, `digest` (hex, optional `sha256:` prefix) |

use serde::Deserialize;

use kiosk_core::{AssetVersion, KioskError, KioskResult};

/// Field of view used when a manifest carries none (degrees)
pub const DEFAULT_FIELD_OF_VIEW: f64 = 75.0;

/// Narrowest accepted field of view (degrees)
pub const MIN_FIELD_OF_VIEW: f64 = 30.0;

/// Widest accepted field of view (degrees)
pub const MAX_FIELD_OF_VIEW: f64 = 120.0;

#[derive(Deserialize)]
struct RawManifest {
    version: Option<AssetVersion>,
    hash: Option<AssetVersion>,
    #[serde(rename = "videoURL", alias = "video_url", alias = "url")]
    video_url: Option<String>,
    #[serde(rename = "fieldOfView", alias = "fov")]
    field_of_view: Option<f64>,
    #[serde(alias = "digest")]
    sha256: Option<String>,
}

/// A validated update manifest
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    pub version: AssetVersion,
    pub video_url: String,
    /// Clamped to the accepted range
    pub field_of_view: Option<f64>,
    /// Lower-case hex SHA-256 of the asset
    pub sha256: Option<String>,
}

impl Manifest {
    /// Decode and validate a manifest document
    pub fn parse(bytes: &[u8]) -> KioskResult<Self> {
        let raw: RawManifest =
            serde_json::from_slice(bytes).map_err(|e| KioskError::MalformedManifest(e.to_string()))?;

        let version = raw.version.or(raw.hash).ok_or(KioskError::MissingField("version"))?;

        let video_url = raw
            .video_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(KioskError::MissingField("videoURL"))?;

        let field_of_view = match raw.field_of_view {
            Some(fov) if !fov.is_finite() => {
                return Err(KioskError::MalformedManifest(format!("field of view {}", fov)));
            }
            Some(fov) => Some(clamp_field_of_view(fov)),
            None => None,
        };

        let sha256 = raw.sha256.map(|d| normalize_digest(&d)).transpose()?;

        Ok(Manifest {
            version,
            video_url,
            field_of_view,
            sha256,
        })
    }

    /// Manifest field of view, or `default` when absent
    pub fn field_of_view_or(&self, default: f64) -> f64 {
        self.field_of_view.unwrap_or(default)
    }
}

/// Clamp a field of view to the accepted range
pub fn clamp_field_of_view(fov: f64) -> f64 {
    fov.clamp(MIN_FIELD_OF_VIEW, MAX_FIELD_OF_VIEW)
}

fn normalize_digest(digest: &str) -> KioskResult<String> {
    let trimmed = digest.trim();
    let hex = trimmed.strip_prefix("sha256:").unwrap_or(trimmed).to_ascii_lowercase();
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(KioskError::MalformedManifest(format!("invalid sha256 digest {:?}", digest)));
    }
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B2B0B822CD15D6C15B0F00A08";

    #[test]
    fn test_canonical_manifest() {
        let m = Manifest::parse(br#"{"version": 9, "videoURL": "https://cdn.example/v9.mp4", "fieldOfView": 90}"#)
            .unwrap();
        assert_eq!(m.version.as_str(), "9");
        assert_eq!(m.video_url, "https://cdn.example/v9.mp4");
        assert_eq!(m.field_of_view, Some(90.0));
        assert_eq!(m.sha256, None);
    }

    #[test]
    fn test_aliases() {
        let doc = format!(
            r#"{{"hash": "a1b2c3", "url": "https://cdn.example/a.mp4", "fov": 80.5, "digest": "sha256:{}"}}"#,
            DIGEST
        );
        let m = Manifest::parse(doc.as_bytes()).unwrap();
        assert_eq!(m.version.as_str(), "a1b2c3");
        assert_eq!(m.field_of_view, Some(80.5));
        assert_eq!(m.sha256.as_deref(), Some(DIGEST.to_ascii_lowercase().as_str()));

        let m = Manifest::parse(br#"{"version": "3", "video_url": "https://x/y.mp4"}"#).unwrap();
        assert_eq!(m.video_url, "https://x/y.mp4");
        assert_eq!(m.field_of_view_or(DEFAULT_FIELD_OF_VIEW), DEFAULT_FIELD_OF_VIEW);
    }

    #[test]
    fn test_version_wins_over_hash() {
        let m = Manifest::parse(br#"{"version": "5", "hash": "abc", "url": "https://x/y.mp4"}"#).unwrap();
        assert_eq!(m.version.as_str(), "5");
    }

    #[test]
    fn test_missing_fields() {
        let err = Manifest::parse(br#"{"videoURL": "https://x/y.mp4"}"#).unwrap_err();
        assert!(matches!(err, KioskError::MissingField("version")));

        let err = Manifest::parse(br#"{"version": 4, "videoURL": "  "}"#).unwrap_err();
        assert!(matches!(err, KioskError::MissingField("videoURL")));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            Manifest::parse(b"<html>503</html>").unwrap_err(),
            KioskError::MalformedManifest(_)
        ));
        assert!(Manifest::parse(br#"{"version": "", "url": "https://x/y.mp4"}"#).is_err());
        assert!(Manifest::parse(br#"{"version": 1, "url": "https://x/y.mp4", "sha256": "abc"}"#).is_err());
    }

    #[test]
    fn test_field_of_view_is_clamped() {
        let m = Manifest::parse(br#"{"version": 1, "url": "https://x/y.mp4", "fov": 170}"#).unwrap();
        assert_eq!(m.field_of_view, Some(MAX_FIELD_OF_VIEW));
        let m = Manifest::parse(br#"{"version": 1, "url": "https://x/y.mp4", "fov": 5}"#).unwrap();
        assert_eq!(m.field_of_view, Some(MIN_FIELD_OF_VIEW));
    }
}
