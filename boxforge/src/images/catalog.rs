//! Image catalog: where built artifacts live on the host.
//!
//! ```text
//! {images_root}/
//! └── {name}/
//!     └── {major}/{minor}/{patch}/              # bucket, one per release
//!         ├── {name}_{major}.{minor}.{patch}.{build}.tar.gz
//!         └── ...
//! ```
//!
//! Does NOT decide what to build (BuildPlanner's responsibility) and never
//! produces archives itself; it only answers existence and path questions
//! and owns the directory structure.

use std::path::{Path, PathBuf};

use boxforge_shared::constants::artifact;
use boxforge_shared::errors::{ForgeError, ForgeResult};

use crate::templates::TemplateVersion;

#[derive(Clone, Debug)]
pub struct ImageCatalog {
    root: PathBuf,
}

impl ImageCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-template root: {images_root}/{name}
    pub fn template_root(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Release bucket: {images_root}/{name}/{major}/{minor}/{patch}
    pub fn bucket_dir(&self, name: &str, version: TemplateVersion) -> PathBuf {
        let [major, minor, patch] = version.release();
        self.template_root(name)
            .join(major.to_string())
            .join(minor.to_string())
            .join(patch.to_string())
    }

    /// Artifact filename: {name}_{major}.{minor}.{patch}.{build}.tar.gz
    pub fn artifact_file_name(name: &str, version: TemplateVersion) -> String {
        format!("{}_{}.{}", name, version, artifact::CATALOG_EXTENSION)
    }

    /// Canonical artifact path for an exact version.
    pub fn artifact_path(&self, name: &str, version: TemplateVersion) -> PathBuf {
        self.bucket_dir(name, version)
            .join(Self::artifact_file_name(name, version))
    }

    pub fn has_artifact(&self, name: &str, version: TemplateVersion) -> bool {
        self.artifact_path(name, version).is_file()
    }

    /// Create the per-template root. Idempotent.
    pub fn ensure_template_root(&self, name: &str) -> ForgeResult<PathBuf> {
        let dir = self.template_root(name);
        create_dir(&dir)?;
        Ok(dir)
    }

    /// Create the per-template root and the release bucket. Idempotent.
    pub fn ensure_bucket(&self, name: &str, version: TemplateVersion) -> ForgeResult<PathBuf> {
        self.ensure_template_root(name)?;
        let dir = self.bucket_dir(name, version);
        create_dir(&dir)?;
        Ok(dir)
    }

    /// Versions with an artifact present for a template, ascending.
    pub fn versions(&self, name: &str) -> ForgeResult<Vec<TemplateVersion>> {
        let root = self.template_root(name);
        if !root.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{name}_");
        let suffix = format!(".{}", artifact::CATALOG_EXTENSION);

        let mut versions = Vec::new();
        for entry in walkdir::WalkDir::new(&root).min_depth(4).max_depth(4) {
            let entry = entry.map_err(|e| {
                ForgeError::Storage(format!("failed to walk {}: {}", root.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let Some(version) = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .and_then(parse_version)
            else {
                continue;
            };

            if entry.path() == self.artifact_path(name, version) {
                versions.push(version);
            }
        }

        versions.sort();
        Ok(versions)
    }
}

fn parse_version(s: &str) -> Option<TemplateVersion> {
    let parts = s
        .split('.')
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let parts: [u32; 4] = parts.try_into().ok()?;
    Some(TemplateVersion::from(parts))
}

fn create_dir(dir: &Path) -> ForgeResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| ForgeError::Storage(format!("failed to create {}: {}", dir.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_path_layout() {
        let catalog = ImageCatalog::new("/images");
        let version = TemplateVersion::new(1, 0, 0, 2);
        assert_eq!(
            catalog.artifact_path("web", version),
            PathBuf::from("/images/web/1/0/0/web_1.0.0.2.tar.gz")
        );
    }

    #[test]
    fn test_same_release_shares_bucket() {
        let catalog = ImageCatalog::new("/images");
        let a = TemplateVersion::new(1, 2, 3, 1);
        let b = TemplateVersion::new(1, 2, 3, 9);
        assert_eq!(catalog.bucket_dir("web", a), catalog.bucket_dir("web", b));
        assert_ne!(catalog.artifact_path("web", a), catalog.artifact_path("web", b));
    }

    #[test]
    fn test_ensure_bucket_and_has_artifact() {
        let temp = TempDir::new().unwrap();
        let catalog = ImageCatalog::new(temp.path());
        let version = TemplateVersion::new(0, 1, 0, 1);

        let bucket = catalog.ensure_bucket("web", version).unwrap();
        assert!(bucket.is_dir());
        assert!(!catalog.has_artifact("web", version));

        // Idempotent
        catalog.ensure_bucket("web", version).unwrap();

        std::fs::write(catalog.artifact_path("web", version), b"archive").unwrap();
        assert!(catalog.has_artifact("web", version));
        assert!(!catalog.has_artifact("web", TemplateVersion::new(0, 1, 0, 2)));
    }

    #[test]
    fn test_versions_lists_only_canonical_artifacts() {
        let temp = TempDir::new().unwrap();
        let catalog = ImageCatalog::new(temp.path());

        for v in [
            TemplateVersion::new(1, 0, 0, 2),
            TemplateVersion::new(1, 0, 0, 1),
            TemplateVersion::new(0, 9, 0, 4),
        ] {
            catalog.ensure_bucket("web", v).unwrap();
            std::fs::write(catalog.artifact_path("web", v), b"x").unwrap();
        }

        // Wrong bucket for its name, and an unrelated file
        let stray = catalog.bucket_dir("web", TemplateVersion::new(1, 0, 0, 0));
        std::fs::write(stray.join("web_2.0.0.0.tar.gz"), b"x").unwrap();
        std::fs::write(stray.join("notes.txt"), b"x").unwrap();

        assert_eq!(
            catalog.versions("web").unwrap(),
            vec![
                TemplateVersion::new(0, 9, 0, 4),
                TemplateVersion::new(1, 0, 0, 1),
                TemplateVersion::new(1, 0, 0, 2),
            ]
        );
        assert!(catalog.versions("missing").unwrap().is_empty());
    }
}
