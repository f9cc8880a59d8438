//! Process introspection through `ps`, `defaults` and System Events.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use textlift::{Pid, ProcessInspector};
use tracing::{debug, trace};

/// Upper bound on names read from each bundle directory.
pub const MAX_BUNDLE_ENTRIES: usize = 128;

/// Subdirectories of `Contents` listed for framework signatures.
const BUNDLE_DIRS: [&str; 2] = ["Frameworks", "PlugIns"];

/// [`ProcessInspector`] for macOS application processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacProcesses;

impl MacProcesses {
    /// Create a process inspector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        trace!(program, "command returned non-zero exit code");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn system_events_command(script: &str) -> Command {
    let mut command = Command::new("osascript");
    command.args(["-e", &format!(r#"tell application "System Events" to {script}"#)]);
    command
}

fn system_events(script: &str) -> Option<String> {
    let output = system_events_command(script).output().ok()?;
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (output.status.success() && !text.is_empty()).then_some(text)
}

/// Nearest ancestor of `path` that is an application bundle.
#[must_use]
pub fn enclosing_bundle(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("app")))
        .map(Path::to_path_buf)
}

/// File names directly under `dir`, at most `limit` of them, sorted.
#[must_use]
pub fn list_names(dir: &Path, limit: usize) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .take(limit)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

impl ProcessInspector for MacProcesses {
    fn bundle_identifier(&self, pid: Pid) -> Option<String> {
        let bundle = self.bundle_path(pid)?;
        let info = bundle.join("Contents").join("Info");
        run("defaults", &["read", &info.to_string_lossy(), "CFBundleIdentifier"])
    }

    fn bundle_path(&self, pid: Pid) -> Option<PathBuf> {
        enclosing_bundle(&self.executable_path(pid)?)
    }

    fn executable_path(&self, pid: Pid) -> Option<PathBuf> {
        run("ps", &["-p", &pid.to_string(), "-o", "comm="]).map(PathBuf::from)
    }

    fn framework_entries(&self, pid: Pid) -> Vec<String> {
        let Some(bundle) = self.bundle_path(pid) else {
            return Vec::new();
        };
        let contents = bundle.join("Contents");
        BUNDLE_DIRS
            .iter()
            .flat_map(|dir| list_names(&contents.join(dir), MAX_BUNDLE_ENTRIES))
            .collect()
    }

    fn frontmost_pid(&self) -> Option<Pid> {
        system_events("get unix id of first process whose frontmost is true")?
            .parse()
            .ok()
    }

    fn activate(&self, pid: Pid) -> bool {
        let activated = system_events_command(&format!(
            "set frontmost of (first process whose unix id is {pid}) to true"
        ))
        .status()
        .is_ok_and(|s| s.success());
        debug!(pid, activated, "activate process");
        activated
    }
}
