//! Template store: reads templates from the templates root directory.

use std::path::{Path, PathBuf};

use boxforge_shared::errors::{ForgeError, ForgeResult};

use super::descriptor::Template;

/// Directory of templates, one subdirectory per template.
#[derive(Clone, Debug)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.template_dir(name).exists()
    }

    /// Names of all template directories, sorted.
    ///
    /// A missing root yields an empty list.
    pub fn names(&self) -> ForgeResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            ForgeError::Storage(format!(
                "failed to read templates dir {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load a single template by name.
    pub fn load(&self, name: &str) -> ForgeResult<Template> {
        Template::load(name, self.template_dir(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TemplateFixture;
    use tempfile::TempDir;

    #[test]
    fn test_names_sorted_and_dirs_only() {
        let temp = TempDir::new().unwrap();
        let store = TemplateStore::new(temp.path().join("Templates"));
        assert!(store.names().unwrap().is_empty());

        TemplateFixture::new("web").write_to(store.root());
        TemplateFixture::new("api").write_to(store.root());
        std::fs::write(store.root().join("README"), b"notes").unwrap();

        assert_eq!(store.names().unwrap(), vec!["api", "web"]);
        assert!(store.contains("web"));
        assert!(!store.contains("db"));
    }

    #[test]
    fn test_load() {
        let temp = TempDir::new().unwrap();
        let store = TemplateStore::new(temp.path());
        TemplateFixture::new("web").version([2, 1, 0, 7]).write_to(temp.path());

        let template = store.load("web").unwrap();
        assert_eq!(template.name, "web");
        assert_eq!(template.version().to_string(), "2.1.0.7");
        assert_eq!(template.overlay_dir(), temp.path().join("web").join("Root"));
    }

    #[test]
    fn test_load_missing_descriptor() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("empty")).unwrap();
        let store = TemplateStore::new(temp.path());
        assert!(matches!(store.load("empty"), Err(ForgeError::Config(_))));
    }
}
