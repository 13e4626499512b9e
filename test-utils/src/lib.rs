//! Shared test support for the boxforge crates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use boxforge::images::ImageCatalog;
use boxforge::runtime::{ForgeRuntime, WorkspaceConfig, WorkspaceLayout};
use boxforge::templates::TemplateVersion;
use boxforge::util::ProcessRunner;
use tempfile::TempDir;

pub use boxforge::testing::{PushedFile, ScriptedRunner, TemplateFixture};

/// Name of the stand-in forge binary written into every test workspace.
pub const FAKE_FORGE_BINARY: &str = "forge-bin";

/// A throwaway workspace with a `config.json` on disk.
///
/// The configuration points `Forge.ForgeBinary` at a dummy file so builds
/// never copy the test executable into the staging area.
pub struct TestWorkspace {
    dir: TempDir,
    config: WorkspaceConfig,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp workspace");
        std::fs::write(dir.path().join(FAKE_FORGE_BINARY), b"#!/bin/sh\n")
            .expect("write fake forge binary");

        let mut config = WorkspaceConfig::default();
        config.forge.forge_binary = Some(PathBuf::from(FAKE_FORGE_BINARY));
        config
            .save(&dir.path().join("config.json"))
            .expect("write workspace config");

        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.json")
    }

    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::from_config(&self.config, self.path())
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.layout().templates_dir().to_path_buf()
    }

    pub fn working_dir(&self) -> PathBuf {
        self.layout().working_dir().to_path_buf()
    }

    pub fn catalog(&self) -> ImageCatalog {
        self.layout().image_catalog()
    }

    /// Write `fixture` into the templates root.
    pub fn add_template(&self, fixture: TemplateFixture) -> PathBuf {
        fixture.write_to(&self.templates_dir())
    }

    /// Canonical catalog path of `name` at `version`.
    pub fn artifact_path(&self, name: &str, version: [u32; 4]) -> PathBuf {
        self.catalog()
            .artifact_path(name, TemplateVersion::from(version))
    }

    /// Pretend `name` at `version` was built on an earlier run.
    pub fn place_artifact(&self, name: &str, version: [u32; 4]) -> PathBuf {
        let path = self.artifact_path(name, version);
        std::fs::create_dir_all(path.parent().expect("artifact has a bucket"))
            .expect("create bucket");
        std::fs::write(&path, b"archive").expect("write artifact");
        path
    }

    /// Open the workspace through its config file, as the CLI does.
    pub fn runtime(&self, runner: Arc<dyn ProcessRunner>) -> ForgeRuntime {
        ForgeRuntime::open(&self.config_path(), runner).expect("open workspace")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// A runner whose `vagrant ssh` (the forge stage) exports an archive for
/// each of `templates` into the staging area of `workspace`.
pub fn forge_exporting(workspace: &TestWorkspace, templates: &[&str]) -> ScriptedRunner {
    let staging = workspace.layout().staging();
    let names: Vec<String> = templates.iter().map(|t| t.to_string()).collect();

    ScriptedRunner::new().on_run("vagrant ssh", move |_| {
        for name in &names {
            std::fs::write(staging.staged_artifact(name), format!("{name}-archive"))
                .expect("write staged archive");
        }
    })
}
