use std::net::{Ipv4Addr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bwm_daemon::protocol::send_trigger;
use bwm_daemon::runtime::{self, DaemonOptions};
use bwm_daemon::{
    establish, AuthEnvelope, BoundDaemon, DaemonError, DaemonState, Outcome, Role, SessionHost,
    TriggerArgs,
};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct FakeHost {
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeHost {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SessionHost for FakeHost {
    fn cycle(&mut self, args: &TriggerArgs) -> Outcome {
        self.record(format!("cycle {:?}", args.autotype));
        Outcome::Stop
    }

    fn reload(&mut self) -> Result<(), DaemonError> {
        self.record("reload".to_string());
        Ok(())
    }

    fn switch(&mut self, target: Option<&str>) -> Result<(), DaemonError> {
        self.record(format!("switch {target:?}"));
        Ok(())
    }

    fn lock(&mut self) {
        self.record("lock".to_string());
    }

    fn report(&mut self, error: &DaemonError) {
        self.record(format!("report {error}"));
    }
}

fn bind(auth: &Path) -> BoundDaemon {
    match establish(auth).unwrap() {
        Role::Daemon(bound) => bound,
        Role::Client(_) => panic!("fresh directory must yield the daemon role"),
    }
}

fn options(auth: PathBuf, timeout: Duration) -> DaemonOptions {
    DaemonOptions {
        auth_path: auth,
        log_path: None,
        timeout,
    }
}

fn client_trigger(auth: PathBuf, args: TriggerArgs) -> Result<(), DaemonError> {
    match establish(&auth)? {
        Role::Client(link) => link.trigger(&args).map(drop),
        Role::Daemon(_) => panic!("daemon must still be running"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inactivity_locks_and_removes_auth_file() {
    let dir = TempDir::new().unwrap();
    let auth = dir.path().join(".bwm-auth");
    let host = FakeHost::default();

    let state = tokio::time::timeout(
        Duration::from_secs(10),
        runtime::run(
            bind(&auth),
            options(auth.clone(), Duration::from_millis(200)),
            host.clone(),
            TriggerArgs::default(),
        ),
    )
    .await
    .expect("daemon must lock on its own")
    .unwrap();

    assert_eq!(state, DaemonState::Locked);
    assert!(!auth.exists());
    assert_eq!(host.calls(), vec!["switch None", "cycle None", "lock"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initial_lock_skips_unlock() {
    let dir = TempDir::new().unwrap();
    let auth = dir.path().join(".bwm-auth");
    let host = FakeHost::default();
    let initial = TriggerArgs {
        lock: true,
        ..TriggerArgs::default()
    };

    let state = runtime::run(
        bind(&auth),
        options(auth.clone(), Duration::from_secs(60)),
        host.clone(),
        initial,
    )
    .await
    .unwrap();

    assert_eq!(state, DaemonState::Locked);
    assert_eq!(host.calls(), vec!["lock"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_triggers_run_cycles_until_lock() {
    let dir = TempDir::new().unwrap();
    let auth = dir.path().join(".bwm-auth");
    let host = FakeHost::default();
    let daemon = tokio::spawn(runtime::run(
        bind(&auth),
        options(auth.clone(), Duration::from_secs(60)),
        host.clone(),
        TriggerArgs::default(),
    ));

    let path = auth.clone();
    let observed = host.clone();
    tokio::task::spawn_blocking(move || {
        client_trigger(
            path.clone(),
            TriggerArgs {
                autotype: Some("{PASSWORD}".to_string()),
                ..TriggerArgs::default()
            },
        )
        .unwrap();
        // A lock queued behind the trigger would be merged into it.
        for _ in 0..250 {
            if observed.calls().iter().filter(|c| c.starts_with("cycle")).count() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        client_trigger(
            path,
            TriggerArgs {
                lock: true,
                ..TriggerArgs::default()
            },
        )
        .unwrap();
    })
    .await
    .unwrap();

    let state = tokio::time::timeout(Duration::from_secs(10), daemon)
        .await
        .expect("lock trigger must stop the daemon")
        .unwrap()
        .unwrap();

    assert_eq!(state, DaemonState::Locked);
    assert!(!auth.exists());
    let calls = host.calls();
    assert_eq!(calls.first().map(String::as_str), Some("switch None"));
    assert!(calls.contains(&"cycle Some(\"{PASSWORD}\")".to_string()));
    assert_eq!(calls.last().map(String::as_str), Some("lock"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wrong_authkey_is_a_corrupt_session() {
    let dir = TempDir::new().unwrap();
    let auth = dir.path().join(".bwm-auth");
    let host = FakeHost::default();
    let daemon = tokio::spawn(runtime::run(
        bind(&auth),
        options(auth.clone(), Duration::from_secs(60)),
        host.clone(),
        TriggerArgs::default(),
    ));

    let path = auth.clone();
    let result = tokio::task::spawn_blocking(move || {
        let envelope = AuthEnvelope::load(&path).unwrap().unwrap();
        let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, envelope.port)).unwrap();
        let forged = send_trigger(stream, "not-the-key", &TriggerArgs::default());
        client_trigger(
            path,
            TriggerArgs {
                lock: true,
                ..TriggerArgs::default()
            },
        )
        .unwrap();
        forged
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(DaemonError::SessionCorrupt(_))));
    let state = daemon.await.unwrap().unwrap();
    assert_eq!(state, DaemonState::Locked);
    let cycles = host.calls().iter().filter(|c| c.starts_with("cycle")).count();
    assert_eq!(cycles, 1, "the forged trigger must not start a cycle");
}
