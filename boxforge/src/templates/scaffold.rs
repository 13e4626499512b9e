//! Blank template creation.

use std::path::{Path, PathBuf};

use boxforge_shared::constants::template as template_names;
use boxforge_shared::errors::{ForgeError, ForgeResult};

use super::descriptor::{StartupCommand, TemplateDescriptor, TemplateVersion};

/// Base images offered when creating a template: (label, reference).
pub const BASE_IMAGES: &[(&str, &str)] = &[
    ("Ubuntu LTS 10", "images:ubuntu/10.04/cloud"),
    ("Ubuntu LTS 11", "images:ubuntu/11.04/cloud"),
    ("Ubuntu LTS 12", "images:ubuntu/12.04/cloud"),
    ("Ubuntu LTS 13", "images:ubuntu/13.04/cloud"),
    ("Ubuntu LTS 14", "images:ubuntu/14.04/cloud"),
    ("Ubuntu LTS 15", "images:ubuntu/15.04/cloud"),
    ("Ubuntu LTS 16", "images:ubuntu/16.04/cloud"),
    ("Ubuntu LTS 17", "images:ubuntu/17.04/cloud"),
    ("Ubuntu LTS 18", "images:ubuntu/18.04/cloud"),
    ("Ubuntu LTS 19", "images:ubuntu/19.04/cloud"),
    ("Ubuntu LTS 20", "images:ubuntu/20.04/cloud"),
    ("Ubuntu LTS 21", "images:ubuntu/21.04/cloud"),
];

/// Version given to freshly created templates.
pub const INITIAL_VERSION: TemplateVersion = TemplateVersion::new(0, 1, 0, 1);

/// Provisioning script created alongside a new descriptor.
pub const DEFAULT_SCRIPT: &str = "provision.sh";

const DEFAULT_SCRIPT_BODY: &str = "#!/bin/sh\n\
# Runs inside the build container; removed before the image is exported.\n";

/// Create `{templates_root}/{name}` with a default descriptor, an empty
/// overlay tree and a placeholder provisioning script.
///
/// Fails if a template with that name already exists.
pub fn create_template(templates_root: &Path, name: &str, base_image: &str) -> ForgeResult<PathBuf> {
    validate_name(name)?;

    let dir = templates_root.join(name);
    if dir.exists() {
        return Err(ForgeError::Config(format!(
            "template '{}' already exists at {}",
            name,
            dir.display()
        )));
    }

    std::fs::create_dir_all(dir.join(template_names::OVERLAY_DIR)).map_err(|e| {
        ForgeError::Storage(format!("failed to create {}: {}", dir.display(), e))
    })?;

    let descriptor = TemplateDescriptor {
        version: INITIAL_VERSION,
        base_image: base_image.to_string(),
        provision_scripts: vec![DEFAULT_SCRIPT.to_string()],
        startup_commands: vec![StartupCommand::default()],
    };
    descriptor.save(&dir.join(template_names::DESCRIPTOR))?;

    std::fs::write(dir.join(DEFAULT_SCRIPT), DEFAULT_SCRIPT_BODY).map_err(|e| {
        ForgeError::Storage(format!("failed to write {}: {}", DEFAULT_SCRIPT, e))
    })?;

    tracing::info!(template = name, base_image, "Template created");
    Ok(dir)
}

/// Template names double as directory and container names.
fn validate_name(name: &str) -> ForgeResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !name.starts_with('-');

    if valid {
        Ok(())
    } else {
        Err(ForgeError::Config(format!(
            "invalid template name '{name}': use letters, digits and '-'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateStore;
    use tempfile::TempDir;

    #[test]
    fn test_create_template_layout() {
        let temp = TempDir::new().unwrap();
        let dir = create_template(temp.path(), "web", BASE_IMAGES[10].1).unwrap();

        assert!(dir.join("Root").is_dir());
        assert!(dir.join("provision.sh").is_file());

        let template = TemplateStore::new(temp.path()).load("web").unwrap();
        assert_eq!(template.version(), INITIAL_VERSION);
        assert_eq!(template.descriptor.base_image, "images:ubuntu/20.04/cloud");
        assert_eq!(template.descriptor.provision_scripts, vec!["provision.sh"]);
        assert_eq!(template.descriptor.startup_commands.len(), 1);
        assert!(template.descriptor.startup_commands[0].is_placeholder());
    }

    #[test]
    fn test_create_template_refuses_existing() {
        let temp = TempDir::new().unwrap();
        create_template(temp.path(), "web", "img").unwrap();
        let err = create_template(temp.path(), "web", "img").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_invalid_names() {
        let temp = TempDir::new().unwrap();
        for name in ["", "a b", "../escape", "-lead", "under_score"] {
            assert!(
                create_template(temp.path(), name, "img").is_err(),
                "name {name:?} should be rejected"
            );
        }
    }
}
