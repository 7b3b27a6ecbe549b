//! Plate-image storage.
//!
//! Images land as `{PLATE}_{epoch}.jpg` under a per-kind directory
//! (`images/in`, `images/out`). The same layout is used by the Cloud and,
//! under a different root, by each Gate Node's local fallback storage.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::support::errors::ApiError;
use crate::support::time;

/// Which side of the yard the image documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    In,
    Out,
}

impl ImageKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Filesystem store for plate images
#[derive(Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create `{root}/in` and `{root}/out`.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.root.join("in")).await?;
        fs::create_dir_all(self.root.join("out")).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist image bytes; returns the store-relative path
    /// (`<root>/<kind>/<PLATE>_<epoch>.jpg`).
    pub async fn save(
        &self,
        kind: ImageKind,
        plate: &str,
        bytes: &[u8],
    ) -> Result<String, ApiError> {
        let filename = format!("{}_{}.jpg", sanitize_plate(plate), time::epoch_secs());
        let rel = PathBuf::from(kind.dir_name()).join(&filename);
        let full = self.root.join(&rel);

        fs::write(&full, bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Cannot write image: {}", e)))?;

        debug!(path = %full.display(), size = bytes.len(), "Image stored");
        Ok(self.root.join(rel).to_string_lossy().into_owned())
    }

    /// Resolve a stored path for serving. Rejects paths that escape the
    /// image root.
    pub async fn resolve(&self, path: &str) -> Result<PathBuf, ApiError> {
        let requested = Path::new(path);
        // Accept absolute paths, store-prefixed paths ("images/in/x.jpg")
        // and bare kind-relative paths ("in/x.jpg")
        let full = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            let rel = strip_cur_dir(requested);
            let root_rel = strip_cur_dir(&self.root);
            match rel.strip_prefix(&root_rel) {
                Ok(inner) => self.root.join(inner),
                Err(_) => self.root.join(rel),
            }
        };

        let canonical = fs::canonicalize(&full)
            .await
            .map_err(|_| ApiError::NotFound("Image not found".into()))?;
        let root = fs::canonicalize(&self.root)
            .await
            .map_err(|_| ApiError::NotFound("Image not found".into()))?;

        if !canonical.starts_with(&root) {
            return Err(ApiError::BadInput("Path escapes image storage".into()));
        }

        Ok(canonical)
    }
}

/// Drop leading `./` components so prefix comparison works on the raw
/// strings clients send.
fn strip_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

/// Strip path separators from an operator-supplied plate string.
fn sanitize_plate(plate: &str) -> String {
    let p = if plate.is_empty() { "UNKNOWN" } else { plate };
    p.replace(['/', '\\'], "_")
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_plate("51H/123\\45"), "51H_123_45");
        assert_eq!(sanitize_plate(""), "UNKNOWN");
    }

    #[test]
    fn strip_cur_dir_normalizes_prefixes() {
        assert_eq!(
            strip_cur_dir(Path::new("./images/in/x.jpg")),
            PathBuf::from("images/in/x.jpg")
        );
        assert_eq!(
            strip_cur_dir(Path::new("in/x.jpg")),
            PathBuf::from("in/x.jpg")
        );
    }

    #[tokio::test]
    async fn save_and_resolve_roundtrip() {
        let root = std::env::temp_dir().join("parkwatch_img_test");
        let store = ImageStore::new(&root);
        store.ensure_dirs().await.unwrap();

        let path = store
            .save(ImageKind::In, "51H-123.45", b"jpegdata")
            .await
            .unwrap();
        assert!(path.contains("in/"));
        assert!(path.ends_with(".jpg"));

        let resolved = store.resolve(&path).await.unwrap();
        let bytes = fs::read(&resolved).await.unwrap();
        assert_eq!(bytes, b"jpegdata");

        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn resolve_rejects_escape() {
        let root = std::env::temp_dir().join("parkwatch_img_escape_test");
        let store = ImageStore::new(&root);
        store.ensure_dirs().await.unwrap();

        // A file outside the root must not be servable
        let outside = std::env::temp_dir().join("parkwatch_outside.jpg");
        fs::write(&outside, b"x").await.unwrap();
        let err = store
            .resolve(&outside.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::BadInput(_) | ApiError::NotFound(_)
        ));

        let _ = fs::remove_dir_all(&root).await;
        let _ = fs::remove_file(&outside).await;
    }

    #[tokio::test]
    async fn resolve_missing_is_not_found() {
        let root = std::env::temp_dir().join("parkwatch_img_missing_test");
        let store = ImageStore::new(&root);
        store.ensure_dirs().await.unwrap();

        let err = store.resolve("in/NOPE_0.jpg").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let _ = fs::remove_dir_all(&root).await;
    }
}
