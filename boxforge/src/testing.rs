//! Test doubles: a scripted process runner and template fixtures.
//!
//! Compiled for this crate's unit tests and, through the `testing` feature,
//! for downstream test crates.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use boxforge_shared::constants::template as template_names;
use boxforge_shared::errors::{ForgeError, ForgeResult};

use crate::templates::{StartupCommand, TemplateDescriptor, TemplateVersion};
use crate::util::{Invocation, ProcessRunner, ProcessStatus};

type Effect = Arc<dyn Fn(&Invocation) + Send + Sync>;

#[derive(Clone)]
enum Response {
    Exit(i32),
    Spawn(String),
    Effect(Effect),
}

#[derive(Clone)]
struct Rule {
    pattern: String,
    response: Response,
}

/// A file pushed into a container, captured at push time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushedFile {
    pub source: PathBuf,
    pub target: String,
    pub contents: Option<String>,
}

/// Process runner that records invocations instead of executing them.
///
/// Rules match when the command line contains their pattern; the first
/// matching rule decides the outcome. Unmatched commands succeed.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
    pushed: Mutex<Vec<PushedFile>>,
}

impl std::fmt::Debug for ScriptedRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedRunner")
            .field("rules", &self.rules.len())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit with `code`.
    pub fn exit_code(mut self, pattern: &str, code: i32) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Exit(code),
        });
        self
    }

    /// Commands containing `pattern` fail to spawn.
    pub fn spawn_error(mut self, pattern: &str) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Spawn(pattern.to_string()),
        });
        self
    }

    /// Commands containing `pattern` run `effect` and then succeed.
    pub fn on_run(
        mut self,
        pattern: &str,
        effect: impl Fn(&Invocation) + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Effect(Arc::new(effect)),
        });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        lock(&self.calls).clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.calls).iter().map(Invocation::command_line).collect()
    }

    /// Number of recorded commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.command_line().contains(pattern))
            .count()
    }

    /// Position of the first recorded command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        lock(&self.calls)
            .iter()
            .position(|c| c.command_line().contains(pattern))
    }

    pub fn pushed_files(&self) -> Vec<PushedFile> {
        lock(&self.pushed).clone()
    }

    /// Capture `lxc file push [flags] <src> <dst>` sources before they vanish.
    fn capture_push(&self, invocation: &Invocation) {
        let args = &invocation.args;
        let is_push = args.len() >= 4 && args[0] == "file" && args[1] == "push";
        if !is_push {
            return;
        }

        let source = PathBuf::from(&args[args.len() - 2]);
        let target = args[args.len() - 1].clone();
        let contents = std::fs::read_to_string(&source).ok();
        lock(&self.pushed).push(PushedFile {
            source,
            target,
            contents,
        });
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> ForgeResult<ProcessStatus> {
        lock(&self.calls).push(invocation.clone());
        self.capture_push(invocation);

        let line = invocation.command_line();
        let rule = self.rules.iter().find(|r| line.contains(&r.pattern));

        match rule.map(|r| &r.response) {
            None => Ok(ProcessStatus::SUCCESS),
            Some(Response::Exit(code)) => Ok(ProcessStatus::exited(*code)),
            Some(Response::Spawn(pattern)) => Err(ForgeError::Infrastructure(format!(
                "scripted spawn failure for '{pattern}'"
            ))),
            Some(Response::Effect(effect)) => {
                effect(invocation);
                Ok(ProcessStatus::SUCCESS)
            }
        }
    }
}

/// Builder writing a template directory for tests.
#[derive(Clone, Debug)]
pub struct TemplateFixture {
    name: String,
    descriptor: TemplateDescriptor,
    scripts: Vec<(String, String)>,
    overlay: Vec<(String, String)>,
}

impl TemplateFixture {
    /// A template with version 0.1.0.1, one `provision.sh` and no startup jobs.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: TemplateDescriptor {
                version: TemplateVersion::new(0, 1, 0, 1),
                base_image: "images:ubuntu/20.04/cloud".to_string(),
                provision_scripts: vec!["provision.sh".to_string()],
                startup_commands: Vec::new(),
            },
            scripts: vec![("provision.sh".to_string(), "#!/bin/sh\ntrue\n".to_string())],
            overlay: Vec::new(),
        }
    }

    pub fn version(mut self, version: [u32; 4]) -> Self {
        self.descriptor.version = TemplateVersion::from(version);
        self
    }

    pub fn base_image(mut self, image: &str) -> Self {
        self.descriptor.base_image = image.to_string();
        self
    }

    /// Replace the provisioning scripts (listed in the given order).
    pub fn scripts(mut self, scripts: &[(&str, &str)]) -> Self {
        self.descriptor.provision_scripts = scripts.iter().map(|(n, _)| n.to_string()).collect();
        self.scripts = scripts
            .iter()
            .map(|(n, body)| (n.to_string(), body.to_string()))
            .collect();
        self
    }

    pub fn startup(mut self, command: StartupCommand) -> Self {
        self.descriptor.startup_commands.push(command);
        self
    }

    /// Add a file under `Root/` at `relative` (e.g. `etc/app/app.conf`).
    pub fn overlay_file(mut self, relative: &str, contents: &str) -> Self {
        self.overlay.push((relative.to_string(), contents.to_string()));
        self
    }

    /// Write the template under `templates_root` and return its directory.
    ///
    /// Panics on I/O failure; intended for tests only.
    pub fn write_to(&self, templates_root: &Path) -> PathBuf {
        let dir = templates_root.join(&self.name);
        std::fs::create_dir_all(dir.join(template_names::OVERLAY_DIR))
            .expect("create template dir");

        self.descriptor
            .save(&dir.join(template_names::DESCRIPTOR))
            .expect("write descriptor");

        for (name, body) in &self.scripts {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create script dir");
            }
            std::fs::write(path, body).expect("write script");
        }

        for (relative, contents) in &self.overlay {
            let path = dir.join(template_names::OVERLAY_DIR).join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create overlay dir");
            }
            std::fs::write(path, contents).expect("write overlay file");
        }

        dir
    }
}
