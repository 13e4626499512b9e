//! Startup jobs rendered as `/etc/cron.d` entries run at boot.

use boxforge_shared::constants::container as paths;

use crate::templates::StartupCommand;

/// A scheduled-task file to install in a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CronJob {
    /// File name under the scheduler directory.
    pub name: String,
    pub contents: String,
    /// Script to mark executable, if the command is a bare `.sh` path.
    pub script: Option<String>,
}

impl CronJob {
    /// Absolute path of the job file inside the container.
    pub fn target(&self) -> String {
        format!("{}/{}", paths::CRON_DIR, self.name)
    }
}

/// Render the startup jobs of one template.
///
/// Placeholder entries (empty command) produce nothing. Unnamed jobs are
/// numbered from 0 in listed order; the counter only advances for unnamed,
/// non-empty entries.
pub fn render_jobs(commands: &[StartupCommand]) -> Vec<CronJob> {
    let mut counter: u32 = 0;
    let mut jobs = Vec::new();

    for cmd in commands.iter().filter(|c| !c.is_placeholder()) {
        let name = match cmd.name() {
            Some(name) => name.to_string(),
            None => {
                let name = counter.to_string();
                counter += 1;
                name
            }
        };

        let mut lines = Vec::with_capacity(2);
        if let Some(dir) = cmd.start_in() {
            lines.push(format!("HOME={dir}"));
        }
        let user = cmd.run_as().unwrap_or(paths::DEFAULT_USER);
        lines.push(format!("@reboot {} {}", user, cmd.command));

        jobs.push(CronJob {
            name,
            contents: lines.join("\n") + "\n",
            script: is_bare_script(&cmd.command).then(|| cmd.command.clone()),
        });
    }

    jobs
}

/// A single `.sh` path with no whitespace is taken to be a script.
///
/// Known edge case: a command with redirections but no spaces
/// (`a.sh>out.sh`) is misclassified.
fn is_bare_script(command: &str) -> bool {
    command.ends_with(".sh") && !command.chars().any(char::is_whitespace)
}
