//! The daemon state machine: `Idle`, `Active` (one interactive cycle) and
//! the terminal `Locked`.
//!
//! Everything that can wake the daemon arrives on one channel as a
//! [`DaemonEvent`]. The loop runs on a blocking thread and is the only code
//! that mutates session state.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver, UnboundedSender};

use bwm_menu::MenuGate;

use crate::error::DaemonError;
use crate::protocol::TriggerArgs;
use crate::timer::InactivityTimer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    /// Run a cycle with no one-shot arguments.
    Trigger,
    /// Run a cycle with these one-shot arguments.
    ArgsReady(TriggerArgs),
    /// The inactivity deadline armed with this generation passed.
    Tick(u64),
    /// Signal or shutdown request: lock and exit.
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Active,
    Locked,
}

/// How one interactive cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Stop,
    Reload,
    Switch,
    Lock,
}

/// The vault-facing side the run loop drives.
pub trait SessionHost {
    /// One interactive cycle. Errors inside it are shown to the user by the
    /// host itself.
    fn cycle(&mut self, args: &TriggerArgs) -> Outcome;

    fn reload(&mut self) -> Result<(), DaemonError>;

    /// Select a vault (`target` server URL, or ask) and unlock it.
    /// [`DaemonError::Cancelled`] means nothing changed and any previous
    /// session still stands; every other error leaves no session.
    fn switch(&mut self, target: Option<&str>) -> Result<(), DaemonError>;

    /// Lock the vault and forget every cached secret.
    fn lock(&mut self);

    /// Show an error through the menu.
    fn report(&mut self, error: &DaemonError);

    /// Closed on shutdown so a prompt left open does not hold up the lock.
    fn menu_gate(&self) -> Option<MenuGate> {
        None
    }
}

pub struct RunLoop<H> {
    host: H,
    events: UnboundedReceiver<DaemonEvent>,
    deferred: VecDeque<DaemonEvent>,
    timer: InactivityTimer,
    timeout: Duration,
    generation: u64,
    state: DaemonState,
}

impl<H: SessionHost> RunLoop<H> {
    pub fn new(
        host: H,
        events: UnboundedReceiver<DaemonEvent>,
        timer_events: UnboundedSender<DaemonEvent>,
        timeout: Duration,
    ) -> Self {
        Self {
            host,
            events,
            deferred: VecDeque::new(),
            timer: InactivityTimer::spawn(timer_events),
            timeout,
            generation: 0,
            state: DaemonState::Idle,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Unlock a vault, run the invoking process's own cycle, then serve
    /// triggers until the vault locks.
    pub fn run(&mut self, initial: TriggerArgs) -> DaemonState {
        self.arm();
        if !initial.lock {
            if let Err(err) = self.host.switch(initial.vault.as_deref()) {
                tracing::error!(error = %err, "no usable vault at startup");
                self.fail(&err);
                return self.state;
            }
        }
        self.activate(TriggerArgs {
            vault: None,
            ..initial
        });

        while self.state != DaemonState::Locked {
            let Some(event) = self.next_event() else {
                tracing::warn!("event channel closed");
                self.lock();
                break;
            };
            match event {
                DaemonEvent::Kill => {
                    tracing::info!("kill requested");
                    self.lock();
                }
                DaemonEvent::Tick(generation) if generation == self.generation => {
                    tracing::info!("locking after inactivity");
                    self.lock();
                }
                DaemonEvent::Tick(generation) => {
                    tracing::debug!(generation, current = self.generation, "stale tick ignored");
                }
                DaemonEvent::Trigger => {
                    let args = self.coalesce(TriggerArgs::default());
                    self.activate(args);
                }
                DaemonEvent::ArgsReady(args) => {
                    let args = self.coalesce(args);
                    self.activate(args);
                }
            }
        }
        self.state
    }

    fn next_event(&mut self) -> Option<DaemonEvent> {
        self.deferred
            .pop_front()
            .or_else(|| self.events.blocking_recv())
    }

    /// Triggers that queued up while a cycle ran collapse into one.
    fn coalesce(&mut self, mut args: TriggerArgs) -> TriggerArgs {
        loop {
            match self.events.try_recv() {
                Ok(DaemonEvent::Trigger) => {}
                Ok(DaemonEvent::ArgsReady(later)) => args.merge(later),
                Ok(other) => {
                    self.deferred.push_back(other);
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        args
    }

    fn arm(&mut self) {
        self.generation += 1;
        self.timer.arm(self.generation, self.timeout);
    }

    fn activate(&mut self, args: TriggerArgs) {
        self.state = DaemonState::Active;
        self.arm();
        tracing::debug!(generation = self.generation, "cycle started");

        if args.lock {
            self.lock();
            return;
        }
        if let Some(target) = args.vault.as_deref() {
            if let Err(err) = self.host.switch(Some(target)) {
                self.fail(&err);
                return;
            }
        }

        let outcome = self.host.cycle(&args);
        tracing::debug!(?outcome, "cycle finished");
        match outcome {
            Outcome::Continue | Outcome::Stop => self.state = DaemonState::Idle,
            Outcome::Reload => {
                if let Err(err) = self.host.reload() {
                    self.host.report(&err);
                }
                self.state = DaemonState::Idle;
            }
            Outcome::Switch => match self.host.switch(None) {
                Ok(()) => self.state = DaemonState::Idle,
                Err(DaemonError::Cancelled) => {
                    tracing::debug!("vault switch cancelled, keeping session");
                    self.state = DaemonState::Idle;
                }
                Err(err) => self.fail(&err),
            },
            Outcome::Lock => self.lock(),
        }
    }

    /// No valid session is left: report, then lock.
    fn fail(&mut self, err: &DaemonError) {
        if !err.is_cancel() {
            self.host.report(err);
        }
        self.lock();
    }

    fn lock(&mut self) {
        self.timer.cancel();
        self.host.lock();
        self.state = DaemonState::Locked;
        tracing::info!("vault locked");
    }
}
