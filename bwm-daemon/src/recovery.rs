//! Recovery after the rendezvous reports a corrupted session cache.

use std::path::Path;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

use crate::auth;
use crate::error::DaemonError;

pub const CORRUPTION_MESSAGE: &str =
    "Cache file was corrupted. Stopping all instances. Please try again";

/// Remove the auth file and terminate every other process called
/// `process_name`. Returns how many processes were signalled.
pub fn recover_from_corruption(auth_path: &Path, process_name: &str) -> Result<usize, DaemonError> {
    auth::remove(auth_path)?;
    let stopped = stop_other_instances(process_name);
    tracing::warn!(stopped, "session cache corrupted, other instances stopped");
    Ok(stopped)
}

fn stop_other_instances(process_name: &str) -> usize {
    let own = sysinfo::get_current_pid().ok();
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut stopped = 0;
    for (pid, process) in sys.processes() {
        if Some(*pid) == own || process.name().to_string_lossy() != process_name {
            continue;
        }
        let signalled = process
            .kill_with(Signal::Term)
            .unwrap_or_else(|| process.kill());
        if signalled {
            stopped += 1;
        } else {
            tracing::warn!(pid = pid.as_u32(), "could not stop instance");
        }
    }
    stopped
}

/// Pids of running processes called `process_name`, this one excluded.
pub fn other_instances(process_name: &str) -> Vec<Pid> {
    let own = sysinfo::get_current_pid().ok();
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);
    sys.processes()
        .iter()
        .filter(|(pid, process)| {
            Some(**pid) != own && process.name().to_string_lossy() == process_name
        })
        .map(|(pid, _)| *pid)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recovery_removes_auth_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bwm.auth");
        std::fs::write(&path, "garbage").unwrap();

        let stopped = recover_from_corruption(&path, "bwm-test-no-such-process").unwrap();
        assert_eq!(stopped, 0);
        assert!(!path.exists());
    }

    #[test]
    fn missing_auth_file_is_fine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bwm.auth");
        assert!(recover_from_corruption(&path, "bwm-test-no-such-process").is_ok());
    }

    #[test]
    fn own_process_is_never_listed() {
        let own = sysinfo::get_current_pid().unwrap();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        let name = sys
            .process(own)
            .map(|p| p.name().to_string_lossy().into_owned())
            .unwrap_or_default();
        assert!(!other_instances(&name).contains(&own));
    }
}
