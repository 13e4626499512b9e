//! Stage transfer: template inputs into the staging area, artifacts out.

use std::path::{Path, PathBuf};

use boxforge_shared::errors::{ForgeError, ForgeResult};
use boxforge_shared::layout::StagingLayout;
use walkdir::WalkDir;

use crate::templates::Template;

/// Moves files across the host/VM boundary through the staging area.
#[derive(Clone, Debug)]
pub struct StageTransfer {
    staging: StagingLayout,
}

impl StageTransfer {
    pub fn new(staging: StagingLayout) -> Self {
        Self { staging }
    }

    pub fn staging(&self) -> &StagingLayout {
        &self.staging
    }

    /// Copy the full template directory (descriptor, scripts, overlay)
    /// into `{staging}/Templates/{name}`, replacing any previous copy.
    pub fn stage_template(&self, template: &Template) -> ForgeResult<PathBuf> {
        let dest = self.staging.template_dir(&template.name);

        if dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|e| {
                ForgeError::Transfer(format!("failed to clear {}: {}", dest.display(), e))
            })?;
        }

        copy_tree(&template.dir, &dest)?;
        tracing::debug!(template = %template.name, dest = %dest.display(), "Staged template");
        Ok(dest)
    }

    /// Copy the forge binary into the staging area so the VM can run it.
    pub fn install_forge_binary(&self, source: &Path) -> ForgeResult<PathBuf> {
        let dest = self.staging.forge_binary();
        std::fs::copy(source, &dest).map_err(|e| {
            ForgeError::Transfer(format!(
                "failed to copy forge binary {}: {}",
                source.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755))?;
        }

        Ok(dest)
    }

    /// Relocate the archive exported for `name` to `dest`.
    ///
    /// Returns `Ok(false)` when the forge produced no archive. Nothing is
    /// written at `dest` unless the source archive exists, and `dest` only
    /// ever appears complete.
    pub fn collect_artifact(&self, name: &str, dest: &Path) -> ForgeResult<bool> {
        let Some(source) = self.staging.find_staged_artifact(name) else {
            return Ok(false);
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ForgeError::Transfer(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        move_file(&source, dest)?;
        tracing::info!(template = name, dest = %dest.display(), "Collected artifact");
        Ok(true)
    }
}

/// Rename, falling back to copy-then-rename when crossing filesystems.
fn move_file(source: &Path, dest: &Path) -> ForgeResult<()> {
    if std::fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let copied = std::fs::copy(source, &partial).and_then(|_| std::fs::rename(&partial, dest));
    if let Err(e) = copied {
        let _ = std::fs::remove_file(&partial);
        return Err(ForgeError::Transfer(format!(
            "failed to move {} to {}: {}",
            source.display(),
            dest.display(),
            e
        )));
    }

    if let Err(e) = std::fs::remove_file(source) {
        tracing::warn!(source = %source.display(), "Failed to remove staged artifact: {}", e);
    }
    Ok(())
}

/// Recursively copy `src` to `dst`, preserving relative paths.
fn copy_tree(src: &Path, dst: &Path) -> ForgeResult<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            ForgeError::Transfer(format!("failed to walk {}: {}", src.display(), e))
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| ForgeError::Internal(format!("walk escaped its root: {e}")))?;
        let target = dst.join(relative);

        let result = if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
        } else if entry.file_type().is_symlink() {
            copy_symlink(entry.path(), &target)
        } else {
            std::fs::copy(entry.path(), &target).map(|_| ())
        };

        result.map_err(|e| {
            ForgeError::Transfer(format!(
                "failed to copy {} to {}: {}",
                entry.path().display(),
                target.display(),
                e
            ))
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let link = std::fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dst).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateStore;
    use crate::testing::TemplateFixture;
    use tempfile::TempDir;

    fn setup() -> (TempDir, StageTransfer) {
        let temp = TempDir::new().unwrap();
        let staging = StagingLayout::new(temp.path().join("Shared"));
        staging.prepare().unwrap();
        (temp, StageTransfer::new(staging))
    }

    #[test]
    fn test_stage_template_copies_full_tree() {
        let (temp, transfer) = setup();
        let templates = temp.path().join("Templates");
        TemplateFixture::new("web")
            .overlay_file("etc/app/app.conf", "port=80")
            .write_to(&templates);
        let template = TemplateStore::new(&templates).load("web").unwrap();

        let dest = transfer.stage_template(&template).unwrap();

        assert!(dest.join("config.json").is_file());
        assert!(dest.join("provision.sh").is_file());
        assert_eq!(
            std::fs::read_to_string(dest.join("Root/etc/app/app.conf")).unwrap(),
            "port=80"
        );

        // Restaging replaces stale content
        std::fs::write(dest.join("stale"), b"x").unwrap();
        transfer.stage_template(&template).unwrap();
        assert!(!dest.join("stale").exists());
    }

    #[test]
    fn test_collect_missing_artifact() {
        let (temp, transfer) = setup();
        let dest = temp.path().join("images/web/1/0/0/web_1.0.0.2.tar.gz");

        assert!(!transfer.collect_artifact("web", &dest).unwrap());
        assert!(!dest.exists());
    }

    #[test]
    fn test_collect_artifact_moves_file() {
        let (temp, transfer) = setup();
        let staged = transfer.staging().staged_artifact("web");
        std::fs::write(&staged, b"archive-bytes").unwrap();
        let dest = temp.path().join("images/web/1/0/0/web_1.0.0.2.tar.gz");

        assert!(transfer.collect_artifact("web", &dest).unwrap());
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");
        assert!(!staged.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_install_forge_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let (temp, transfer) = setup();
        let source = temp.path().join("boxforge-build");
        std::fs::write(&source, b"#!/bin/sh\n").unwrap();

        let dest = transfer.install_forge_binary(&source).unwrap();
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
