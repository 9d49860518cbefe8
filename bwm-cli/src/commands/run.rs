//! `bwm` without a subcommand: trigger the running daemon, or become it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use bwm_autotype::Backend;
use bwm_core::{paths, Config, MenuConfig};
use bwm_daemon::{
    establish, init_file_tracing, init_stderr_tracing, recover_from_corruption, start_blocking,
    BoundDaemon, Bwm, DaemonError, DaemonOptions, Role, TriggerArgs, CORRUPTION_MESSAGE,
};
use bwm_menu::{DmenuMenu, Menu};
use bwm_vault::BwCli;

/// Name every instance runs under; used to find them after corruption.
const PROCESS_NAME: &str = "bwm";

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Autotype sequence for this invocation only, e.g. "{PASSWORD}{ENTER}".
    #[arg(long, value_name = "SEQ")]
    pub autotype: Option<String>,

    /// Server URL of the vault to unlock or switch to.
    #[arg(long, value_name = "URL")]
    pub vault: Option<String>,

    /// Lock the vault and stop the daemon.
    #[arg(long)]
    pub lock: bool,

    /// Copy to the clipboard instead of typing, for this invocation only.
    #[arg(long)]
    pub clipboard: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = match Config::load() {
            Ok(config) => config,
            Err(err) => {
                show_error(&DmenuMenu::new(&MenuConfig::default()), &err.to_string());
                return Err(err).context("failed to load configuration");
            }
        };
        let auth_path = paths::auth_path().context("could not determine cache directory")?;
        let args = self.into_trigger();

        let outcome = match establish(&auth_path) {
            Ok(Role::Client(link)) => {
                init_stderr_tracing();
                link.trigger(&args).map(|response| {
                    tracing::debug!(data = ?response.data, "trigger delivered");
                })
            }
            Ok(Role::Daemon(bound)) => return serve(config, auth_path, bound, args),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(DaemonError::SessionCorrupt(reason)) => recover(&config, &auth_path, &reason),
            Err(err) => Err(err).context("could not reach the bwm daemon"),
        }
    }

    fn into_trigger(self) -> TriggerArgs {
        TriggerArgs {
            autotype: self.autotype,
            vault: self.vault,
            lock: self.lock,
            clipboard: self.clipboard,
        }
    }
}

fn serve(config: Config, auth_path: PathBuf, bound: BoundDaemon, args: TriggerArgs) -> Result<()> {
    let log_path = paths::log_path().context("could not determine log location")?;
    init_file_tracing(&log_path).context("failed to set up logging")?;
    tracing::info!(port = bound.envelope.port, "starting daemon");

    let host = match prepare(config, &args) {
        Ok(host) => host,
        Err(err) => {
            if let Err(cleanup) = bound.envelope.remove_if_current(&auth_path) {
                tracing::warn!(error = %cleanup, "could not remove auth file");
            }
            return Err(err);
        }
    };

    let options = DaemonOptions {
        auth_path,
        log_path: Some(log_path),
        timeout: host.config().session_timeout(),
    };
    let state = start_blocking(bound, options, host, args).context("daemon exited with error")?;
    tracing::info!(?state, "daemon finished");
    Ok(())
}

/// Everything that must hold before the first menu is shown.
fn prepare(config: Config, args: &TriggerArgs) -> Result<Bwm<DmenuMenu>> {
    let menu = DmenuMenu::new(&config.menu);
    let typing = !(args.lock || args.clipboard || config.clipboard.enabled);
    if typing {
        if let Err(err) = Backend::from_library(config.vault.type_library).check_available() {
            show_error(&menu, &err.to_string());
            return Err(err).context("autotype backend unavailable");
        }
    }

    let config = Arc::new(config);
    let backend = Box::new(BwCli::from_config(&config));
    Bwm::new(config, backend, menu).context("failed to prepare the entry menu")
}

fn recover(config: &Config, auth_path: &Path, reason: &str) -> Result<()> {
    init_stderr_tracing();
    tracing::error!(reason, "session cache corrupted");
    let stopped = recover_from_corruption(auth_path, PROCESS_NAME)
        .context("failed to clean up after a corrupted cache")?;
    tracing::warn!(stopped, "other instances stopped");
    show_error(&DmenuMenu::new(&config.menu), CORRUPTION_MESSAGE);
    bail!("{CORRUPTION_MESSAGE}")
}

fn show_error(menu: &dyn Menu, message: &str) {
    if let Err(err) = menu.error(message) {
        eprintln!("bwm: {message} ({err})");
    }
}
