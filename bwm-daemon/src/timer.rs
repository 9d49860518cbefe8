//! Inactivity timer on its own thread.
//!
//! The timer never touches session state. When a deadline passes it sends
//! [`DaemonEvent::Tick`] tagged with the generation it was armed with; the
//! run loop ignores ticks from generations it has since replaced.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;

use crate::state::DaemonEvent;

enum Command {
    Arm { generation: u64, after: Duration },
    Cancel,
    Shutdown,
}

pub struct InactivityTimer {
    commands: mpsc::Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl InactivityTimer {
    pub fn spawn(events: UnboundedSender<DaemonEvent>) -> Self {
        let (commands, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("bwm-timer".to_string())
            .spawn(move || timer_loop(rx, events))
            .ok();
        if thread.is_none() {
            tracing::error!("could not start inactivity timer thread");
        }
        Self { commands, thread }
    }

    /// Replace any pending deadline with one `after` from now.
    pub fn arm(&self, generation: u64, after: Duration) {
        let _ = self.commands.send(Command::Arm { generation, after });
    }

    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn timer_loop(rx: mpsc::Receiver<Command>, events: UnboundedSender<DaemonEvent>) {
    let mut deadline: Option<(u64, Instant)> = None;
    loop {
        let next = match deadline {
            Some((_, at)) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(Command::Arm { generation, after }) => {
                deadline = Some((generation, Instant::now() + after));
            }
            Ok(Command::Cancel) => deadline = None,
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Some((generation, _)) = deadline.take() {
                    tracing::info!(generation, "inactivity timeout reached");
                    if events.send(DaemonEvent::Tick(generation)).is_err() {
                        break;
                    }
                }
            }
        }
    }
}
