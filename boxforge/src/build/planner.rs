//! Build planner: which templates need a new image this run.

use std::path::PathBuf;

use boxforge_shared::errors::ForgeResult;

use super::transfer::StageTransfer;
use crate::images::ImageCatalog;
use crate::templates::{Template, TemplateStore, TemplateVersion};

/// One template lacking an artifact for its exact version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildTask {
    pub template: Template,
    /// Canonical catalog path the artifact is relocated to.
    pub output_path: PathBuf,
}

impl BuildTask {
    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn version(&self) -> TemplateVersion {
        self.template.version()
    }
}

/// A template excluded from this run, with the reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidTemplate {
    pub name: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub tasks: Vec<BuildTask>,
    /// Templates whose exact version already has an artifact.
    pub up_to_date: Vec<String>,
    /// Templates that could not be loaded or staged.
    pub invalid: Vec<InvalidTemplate>,
}

impl BuildPlan {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

pub struct BuildPlanner<'a> {
    store: &'a TemplateStore,
    catalog: &'a ImageCatalog,
    transfer: &'a StageTransfer,
}

impl<'a> BuildPlanner<'a> {
    pub fn new(store: &'a TemplateStore, catalog: &'a ImageCatalog, transfer: &'a StageTransfer) -> Self {
        Self {
            store,
            catalog,
            transfer,
        }
    }

    /// Decide what to build and stage the inputs of every emitted task.
    ///
    /// Every loadable template gets its catalog root and release bucket
    /// created, built or not. Only templates with a pending task are copied
    /// into the staging area. A template whose descriptor is missing or
    /// malformed, or whose staging copy fails, is rejected without affecting
    /// the others.
    pub fn plan(&self) -> ForgeResult<BuildPlan> {
        let mut plan = BuildPlan::default();

        for name in self.store.names()? {
            self.catalog.ensure_template_root(&name)?;

            let template = match self.store.load(&name) {
                Ok(template) => template,
                Err(e) => {
                    tracing::warn!(template = %name, "Skipping template: {}", e);
                    plan.invalid.push(InvalidTemplate {
                        name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let version = template.version();
            self.catalog.ensure_bucket(&name, version)?;

            if self.catalog.has_artifact(&name, version) {
                tracing::debug!(template = %name, %version, "Artifact present, skipping");
                plan.up_to_date.push(name);
                continue;
            }

            if let Err(e) = self.transfer.stage_template(&template) {
                tracing::warn!(template = %name, "Failed to stage template: {}", e);
                plan.invalid.push(InvalidTemplate {
                    name,
                    reason: e.to_string(),
                });
                continue;
            }

            match self.catalog.versions(&name).map(|v| v.last().copied()) {
                Ok(Some(previous)) => {
                    tracing::info!(template = %name, %version, %previous, "Scheduled image build")
                }
                Ok(None) => tracing::info!(template = %name, %version, "Scheduled first image build"),
                Err(e) => {
                    tracing::warn!(template = %name, "Failed to list built versions: {}", e);
                    tracing::info!(template = %name, %version, "Scheduled image build")
                }
            }
            plan.tasks.push(BuildTask {
                output_path: self.catalog.artifact_path(&name, version),
                template,
            });
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TemplateFixture;
    use boxforge_shared::layout::StagingLayout;
    use proptest::prelude::*;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: TemplateStore,
        catalog: ImageCatalog,
        transfer: StageTransfer,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let store = TemplateStore::new(temp.path().join("Templates"));
            let catalog = ImageCatalog::new(temp.path().join("Images"));
            let staging = StagingLayout::new(temp.path().join("Temp/Shared"));
            staging.prepare().unwrap();
            std::fs::create_dir_all(store.root()).unwrap();
            Self {
                _temp: temp,
                store,
                catalog,
                transfer: StageTransfer::new(staging),
            }
        }

        fn plan(&self) -> BuildPlan {
            BuildPlanner::new(&self.store, &self.catalog, &self.transfer)
                .plan()
                .unwrap()
        }

        fn place_artifact(&self, name: &str, version: [u32; 4]) {
            let version = TemplateVersion::from(version);
            self.catalog.ensure_bucket(name, version).unwrap();
            std::fs::write(self.catalog.artifact_path(name, version), b"archive").unwrap();
        }
    }

    #[test]
    fn test_missing_artifact_emits_one_task_and_stages() {
        let fx = Fixture::new();
        TemplateFixture::new("web").version([1, 0, 0, 2]).write_to(fx.store.root());

        let plan = fx.plan();

        assert_eq!(plan.tasks.len(), 1);
        let task = &plan.tasks[0];
        assert_eq!(task.name(), "web");
        assert!(task.output_path.ends_with("web/1/0/0/web_1.0.0.2.tar.gz"));
        assert!(fx.transfer.staging().template_dir("web").join("config.json").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_catalog_corner_does_not_abort_plan() {
        use std::os::unix::fs::PermissionsExt;

        // Permission bits do not restrict root.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let fx = Fixture::new();
        TemplateFixture::new("web").version([1, 0, 0, 2]).write_to(fx.store.root());
        TemplateFixture::new("api").write_to(fx.store.root());
        let locked = fx.catalog.root().join("web/9");
        std::fs::create_dir_all(locked.join("0")).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let result = BuildPlanner::new(&fx.store, &fx.catalog, &fx.transfer).plan();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let plan = result.unwrap();
        let names: Vec<_> = plan.tasks.iter().map(BuildTask::name).collect();
        assert_eq!(names, ["api", "web"]);
    }

    #[test]
    fn test_existing_artifact_is_skipped_and_not_staged() {
        let fx = Fixture::new();
        TemplateFixture::new("web").version([1, 0, 0, 2]).write_to(fx.store.root());
        fx.place_artifact("web", [1, 0, 0, 2]);

        let plan = fx.plan();

        assert!(plan.is_empty());
        assert_eq!(plan.up_to_date, vec!["web"]);
        assert!(!fx.transfer.staging().template_dir("web").exists());
    }

    #[test]
    fn test_new_build_number_in_existing_bucket_is_built() {
        let fx = Fixture::new();
        TemplateFixture::new("web").version([1, 0, 0, 3]).write_to(fx.store.root());
        fx.place_artifact("web", [1, 0, 0, 2]);

        let plan = fx.plan();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].version(), TemplateVersion::new(1, 0, 0, 3));
    }

    #[test]
    fn test_bucket_created_even_without_task() {
        let fx = Fixture::new();
        TemplateFixture::new("web").version([2, 3, 4, 5]).write_to(fx.store.root());
        fx.place_artifact("web", [2, 3, 4, 5]);
        TemplateFixture::new("api").version([0, 9, 1, 0]).write_to(fx.store.root());

        fx.plan();

        assert!(fx.catalog.bucket_dir("web", TemplateVersion::new(2, 3, 4, 5)).is_dir());
        assert!(fx.catalog.bucket_dir("api", TemplateVersion::new(0, 9, 1, 0)).is_dir());
    }

    #[test]
    fn test_malformed_descriptor_does_not_block_others() {
        let fx = Fixture::new();
        let broken = fx.store.root().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("config.json"), "{oops").unwrap();
        TemplateFixture::new("web").write_to(fx.store.root());

        let plan = fx.plan();

        assert_eq!(plan.invalid.len(), 1);
        assert_eq!(plan.invalid[0].name, "broken");
        assert_eq!(plan.tasks.len(), 1);
        // Catalog root still exists for every known template
        assert!(fx.catalog.template_root("broken").is_dir());
    }

    #[test]
    fn test_replanning_after_build_is_empty() {
        let fx = Fixture::new();
        TemplateFixture::new("web").version([1, 0, 0, 2]).write_to(fx.store.root());

        let first = fx.plan();
        assert_eq!(first.tasks.len(), 1);
        std::fs::write(&first.tasks[0].output_path, b"archive").unwrap();

        assert!(fx.plan().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_task_emitted_iff_artifact_absent(
            version in proptest::array::uniform4(0u32..50),
            built in any::<bool>(),
        ) {
            let fx = Fixture::new();
            TemplateFixture::new("web").version(version).write_to(fx.store.root());
            if built {
                fx.place_artifact("web", version);
            }

            let plan = fx.plan();
            prop_assert_eq!(plan.tasks.len(), usize::from(!built));
            prop_assert!(fx.catalog.bucket_dir("web", TemplateVersion::from(version)).is_dir());
        }
    }
}
