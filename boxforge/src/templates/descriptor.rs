//! Template descriptor (`config.json`) types.

use std::fmt;
use std::path::{Path, PathBuf};

use boxforge_shared::constants::template as template_names;
use boxforge_shared::errors::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};

/// Four-part template version: major.minor.patch.build.
///
/// The first three parts select the catalog bucket, all four form the
/// artifact filename. Serialized as a JSON array of exactly four integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct TemplateVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl TemplateVersion {
    pub const fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// The (major, minor, patch) release this build belongs to.
    pub fn release(&self) -> [u32; 3] {
        [self.major, self.minor, self.patch]
    }
}

impl From<[u32; 4]> for TemplateVersion {
    fn from([major, minor, patch, build]: [u32; 4]) -> Self {
        Self::new(major, minor, patch, build)
    }
}

impl From<TemplateVersion> for [u32; 4] {
    fn from(v: TemplateVersion) -> Self {
        [v.major, v.minor, v.patch, v.build]
    }
}

impl fmt::Display for TemplateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

/// One `Startup_Commands` entry.
///
/// Empty strings mean "unspecified"; an empty `Command` is a placeholder
/// and installs nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupCommand {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Command", default)]
    pub command: String,
    #[serde(rename = "RunAs", default)]
    pub run_as: String,
    #[serde(rename = "StartIn", default)]
    pub start_in: String,
}

impl StartupCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.command.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    pub fn run_as(&self) -> Option<&str> {
        non_empty(&self.run_as)
    }

    pub fn start_in(&self) -> Option<&str> {
        non_empty(&self.start_in)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

/// Contents of a template's `config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    #[serde(rename = "Version")]
    pub version: TemplateVersion,

    #[serde(rename = "Base_Image")]
    pub base_image: String,

    /// Executed in listed order; later scripts may rely on earlier ones.
    #[serde(rename = "Provision_Scripts", default)]
    pub provision_scripts: Vec<String>,

    #[serde(rename = "Startup_Commands", default)]
    pub startup_commands: Vec<StartupCommand>,
}

impl TemplateDescriptor {
    /// Read and validate a descriptor file.
    pub fn load(path: &Path) -> ForgeResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let descriptor: Self = serde_json::from_str(&raw).map_err(|e| {
            ForgeError::Config(format!("malformed descriptor {}: {}", path.display(), e))
        })?;

        descriptor.validate().map_err(|reason| {
            ForgeError::Config(format!("invalid descriptor {}: {}", path.display(), reason))
        })?;

        Ok(descriptor)
    }

    /// Write the descriptor as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> ForgeResult<()> {
        let json = to_json_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            ForgeError::Storage(format!("failed to write {}: {}", path.display(), e))
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.base_image.trim().is_empty() {
            return Err("Base_Image is empty".into());
        }

        for script in &self.provision_scripts {
            if script.trim().is_empty() {
                return Err("Provision_Scripts contains an empty entry".into());
            }
            if Path::new(script).is_absolute() {
                return Err(format!(
                    "provision script '{script}' must be relative to the template directory"
                ));
            }
        }

        Ok(())
    }
}

/// Serialize with 4-space indentation, the layout the descriptor files use.
pub(crate) fn to_json_pretty<T: Serialize>(value: &T) -> ForgeResult<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| ForgeError::Internal(format!("non-utf8 json: {e}")))
}

/// A template loaded from a directory: its name, location and descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub dir: PathBuf,
    pub descriptor: TemplateDescriptor,
}

impl Template {
    /// Load the template rooted at `dir`, named after the directory.
    pub fn load(name: impl Into<String>, dir: impl Into<PathBuf>) -> ForgeResult<Self> {
        let dir = dir.into();
        let descriptor = TemplateDescriptor::load(&dir.join(template_names::DESCRIPTOR))?;
        Ok(Self {
            name: name.into(),
            dir,
            descriptor,
        })
    }

    pub fn version(&self) -> TemplateVersion {
        self.descriptor.version
    }

    /// Overlay tree mirrored onto the container root: {dir}/Root
    pub fn overlay_dir(&self) -> PathBuf {
        self.dir.join(template_names::OVERLAY_DIR)
    }

    /// Host path of a provisioning script.
    pub fn script_path(&self, script: &str) -> PathBuf {
        self.dir.join(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "Version": [1, 0, 0, 2],
        "Base_Image": "images:ubuntu/20.04/cloud",
        "Provision_Scripts": ["provision.sh", "extra.sh"],
        "Startup_Commands": [
            {"Name": "", "Command": "/opt/app/run.sh", "RunAs": "", "StartIn": "/opt/app"}
        ]
    }"#;

    #[test]
    fn test_parse_descriptor() {
        let d: TemplateDescriptor = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(d.version, TemplateVersion::new(1, 0, 0, 2));
        assert_eq!(d.base_image, "images:ubuntu/20.04/cloud");
        assert_eq!(d.provision_scripts, vec!["provision.sh", "extra.sh"]);

        let cmd = &d.startup_commands[0];
        assert_eq!(cmd.name(), None);
        assert_eq!(cmd.run_as(), None);
        assert_eq!(cmd.start_in(), Some("/opt/app"));
        assert!(!cmd.is_placeholder());
    }

    #[test]
    fn test_version_requires_four_parts() {
        let err = serde_json::from_str::<TemplateVersion>("[1, 0, 0]");
        assert!(err.is_err());
        let err = serde_json::from_str::<TemplateVersion>("[1, 0, -1, 0]");
        assert!(err.is_err());
    }

    #[test]
    fn test_version_display_and_order() {
        let v = TemplateVersion::new(1, 2, 3, 4);
        assert_eq!(v.to_string(), "1.2.3.4");
        assert_eq!(v.release(), [1, 2, 3]);
        assert!(TemplateVersion::new(1, 2, 3, 5) > v);
        assert!(TemplateVersion::new(1, 10, 0, 0) > TemplateVersion::new(1, 9, 9, 9));
    }

    #[test]
    fn test_missing_optional_lists_default_empty() {
        let d: TemplateDescriptor =
            serde_json::from_str(r#"{"Version": [0,1,0,1], "Base_Image": "img"}"#).unwrap();
        assert!(d.provision_scripts.is_empty());
        assert!(d.startup_commands.is_empty());
    }

    #[test]
    fn test_load_rejects_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        assert!(matches!(
            TemplateDescriptor::load(&path),
            Err(ForgeError::Config(_))
        ));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TemplateDescriptor::load(&path),
            Err(ForgeError::Config(_))
        ));

        std::fs::write(&path, r#"{"Version": [0,1,0,1], "Base_Image": "  "}"#).unwrap();
        let err = TemplateDescriptor::load(&path).unwrap_err();
        assert!(err.to_string().contains("Base_Image"));

        std::fs::write(
            &path,
            r#"{"Version": [0,1,0,1], "Base_Image": "img", "Provision_Scripts": ["/etc/x.sh"]}"#,
        )
        .unwrap();
        assert!(TemplateDescriptor::load(&path).is_err());
    }

    #[test]
    fn test_save_uses_original_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let d: TemplateDescriptor = serde_json::from_str(SAMPLE).unwrap();

        d.save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"Base_Image\""));
        assert!(written.contains("    \"Version\""));
        assert_eq!(TemplateDescriptor::load(&path).unwrap(), d);
    }
}
