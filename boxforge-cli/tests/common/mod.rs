#![allow(dead_code)]

use assert_cmd::Command;
use boxforge_test_utils::TestWorkspace;
use std::time::Duration;

pub struct TestContext {
    pub workspace: TestWorkspace,
}

impl TestContext {
    /// A `boxforge` invocation bound to this workspace's config file.
    pub fn new_cmd(&self) -> Command {
        let mut cmd = self.base_cmd();
        cmd.env_remove("BOXFORGE_CONFIG");
        cmd.arg("--config").arg(self.workspace.config_path());
        cmd
    }

    /// Like [`Self::new_cmd`], but the config comes from the environment so
    /// the first argument is left to the test.
    pub fn env_cmd(&self) -> Command {
        let mut cmd = self.base_cmd();
        cmd.env("BOXFORGE_CONFIG", self.workspace.config_path());
        cmd
    }

    fn base_cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_boxforge"));
        cmd.timeout(Duration::from_secs(30));
        cmd.env("RUST_LOG", "warn");
        cmd
    }
}

pub fn boxforge() -> TestContext {
    TestContext {
        workspace: TestWorkspace::new(),
    }
}
