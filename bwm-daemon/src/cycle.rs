//! The interactive cycle and the real [`SessionHost`] behind the daemon.
//!
//! Main menu = option lines followed by the numbered entry list. Picking an
//! entry types it (or copies its secret in clipboard mode); the options
//! lead to the per-field view, the entry editor, folder and collection
//! management, a sync, a vault switch or a lock.

use std::sync::Arc;

use bwm_autotype::{
    totp, AutotypeEngine, AutotypeError, Backend, ClipboardSink, KeyInjector, OutputMode,
};
use bwm_core::{Config, VaultCandidate, VaultItem};
use bwm_menu::{folder_name, select_field, EntryRenderer, FieldAction, Menu, MenuGate};
use bwm_vault::VaultBackend;

use crate::edit::Editor;
use crate::error::DaemonError;
use crate::protocol::TriggerArgs;
use crate::select;
use crate::session::DaemonSession;
use crate::state::{Outcome, SessionHost};

pub const VIEW: &str = "View/Type individual entries";
pub const PREVIOUS: &str = "View previous entry";
pub const EDIT: &str = "Edit entries";
pub const ADD: &str = "Add entry";
pub const FOLDERS: &str = "Manage folders";
pub const COLLECTIONS: &str = "Manage collections";
pub const SYNC: &str = "Sync vault";
pub const SWITCH: &str = "Switch vaults";
pub const LOCK: &str = "Lock vault";

/// Opens a key injector for one dispatch.
pub type InjectorFactory =
    Box<dyn Fn(Backend) -> Result<Box<dyn KeyInjector>, AutotypeError> + Send>;

pub struct Bwm<M> {
    config: Arc<Config>,
    backend: Box<dyn VaultBackend>,
    menu: M,
    session: DaemonSession,
    candidates: Vec<VaultCandidate>,
    engine: AutotypeEngine,
    clipboard: ClipboardSink,
    renderer: EntryRenderer,
    injectors: InjectorFactory,
}

impl<M: Menu> Bwm<M> {
    pub fn new(
        config: Arc<Config>,
        backend: Box<dyn VaultBackend>,
        menu: M,
    ) -> Result<Self, DaemonError> {
        let clipboard = ClipboardSink::from_config(&config);
        Self::with_parts(
            config,
            backend,
            menu,
            clipboard,
            Box::new(|backend: Backend| backend.injector()),
        )
    }

    pub fn with_parts(
        config: Arc<Config>,
        backend: Box<dyn VaultBackend>,
        menu: M,
        clipboard: ClipboardSink,
        injectors: InjectorFactory,
    ) -> Result<Self, DaemonError> {
        let renderer = EntryRenderer::new(config.entry_format.as_deref())?;
        Ok(Self {
            engine: AutotypeEngine::new(&config),
            candidates: config.vault.candidates.clone(),
            session: DaemonSession::new(),
            config,
            backend,
            menu,
            clipboard,
            renderer,
            injectors,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &DaemonSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DaemonSession {
        &mut self.session
    }

    pub fn candidates(&self) -> &[VaultCandidate] {
        &self.candidates
    }

    fn mode(&self, args: &TriggerArgs) -> OutputMode {
        if args.clipboard || self.config.clipboard.enabled {
            OutputMode::Clipboard
        } else {
            OutputMode::Autotype
        }
    }

    fn options(&self) -> Vec<String> {
        let mut options = vec![VIEW.to_string()];
        if self.session.previous().is_some() {
            options.push(PREVIOUS.to_string());
        }
        options.extend([EDIT, ADD, FOLDERS].map(String::from));
        if !self.session.organizations.is_empty() {
            options.push(COLLECTIONS.to_string());
        }
        options.push(SYNC.to_string());
        if self.candidates.len() > 1 {
            options.push(SWITCH.to_string());
        }
        options.push(LOCK.to_string());
        options
    }

    fn run_cycle(&mut self, args: &TriggerArgs) -> Result<Outcome, DaemonError> {
        let mode = self.mode(args);
        let entries = self.renderer.entry_list(
            &self.session.items,
            &self.session.folders,
            &self.config.vault.hide_folders,
        )?;
        let mut lines = self.options();
        lines.extend(entries.lines.iter().cloned());

        let prompt = match mode {
            OutputMode::Autotype => "Select entry",
            OutputMode::Clipboard => "Copy to clipboard",
        };
        let Some(choice) = self.menu.select(prompt, &lines, false)? else {
            return Ok(Outcome::Stop);
        };

        match choice.as_str() {
            VIEW => {
                let Some(pick) = self.menu.select("Select entry", &entries.lines, false)? else {
                    return Ok(Outcome::Continue);
                };
                if let Some(index) = entries.item_index(&pick) {
                    self.view_entry(index, mode)?;
                }
                Ok(Outcome::Continue)
            }
            PREVIOUS => {
                let index = self.session.previous().and_then(|previous| {
                    self.session
                        .items
                        .iter()
                        .position(|item| item.id == previous.id)
                });
                if let Some(index) = index {
                    self.view_entry(index, mode)?;
                }
                Ok(Outcome::Continue)
            }
            EDIT => {
                let Some(pick) = self.menu.select("Select entry to edit", &entries.lines, false)?
                else {
                    return Ok(Outcome::Continue);
                };
                let Some(index) = entries.item_index(&pick) else {
                    return Ok(Outcome::Continue);
                };
                let item = self.session.items[index].clone();
                let edited = self.editor()?.edit_entry(item)?;
                Ok(reload_if(edited.changed()))
            }
            ADD => Ok(reload_if(self.editor()?.add_entry()?.changed())),
            FOLDERS => Ok(reload_if(self.editor()?.manage_folders()?)),
            COLLECTIONS => Ok(reload_if(self.editor()?.manage_collections()?)),
            SYNC => {
                let key = self.session.require_key()?;
                self.backend.sync(key)?;
                tracing::info!("vault synced");
                Ok(Outcome::Reload)
            }
            SWITCH => Ok(Outcome::Switch),
            LOCK => Ok(Outcome::Lock),
            line => {
                let Some(index) = entries.item_index(line) else {
                    tracing::debug!("selection matched no entry");
                    return Ok(Outcome::Continue);
                };
                let item = &self.session.items[index];
                self.engine.deliver(
                    item,
                    args.autotype.as_deref(),
                    mode,
                    &self.clipboard,
                    |backend| (self.injectors)(backend),
                )?;
                let id = item.id.clone();
                self.session.set_previous(id);
                Ok(Outcome::Continue)
            }
        }
    }

    fn editor(&self) -> Result<Editor<'_>, DaemonError> {
        Ok(Editor {
            menu: &self.menu,
            backend: self.backend.as_ref(),
            key: self.session.require_key()?,
            config: &self.config.edit,
            folders: &self.session.folders,
            collections: &self.session.collections,
            organizations: &self.session.organizations,
        })
    }

    /// Per-field view of `items[index]`; the chosen field is typed or copied.
    fn view_entry(&mut self, index: usize, mode: OutputMode) -> Result<(), DaemonError> {
        let item: &VaultItem = &self.session.items[index];
        let folder = folder_name(&self.session.folders, item.folder_id.as_ref());
        let action = select_field(&self.menu, item, folder)?;
        let id = item.id.clone();
        self.session.set_previous(id);

        let text = match action {
            Some(FieldAction::Type(text)) => text,
            Some(FieldAction::Totp(secret)) => {
                zeroize::Zeroizing::new(totp::generate_now(&secret).map_err(AutotypeError::from)?)
            }
            Some(FieldAction::Notes) | Some(FieldAction::Nothing) | None => return Ok(()),
        };
        match mode {
            OutputMode::Clipboard => self.clipboard.copy(&text)?,
            OutputMode::Autotype => {
                let mut injector = (self.injectors)(self.engine.backend())?;
                self.engine.type_text(&text, injector.as_mut())?;
            }
        }
        Ok(())
    }
}

fn reload_if(changed: bool) -> Outcome {
    if changed {
        Outcome::Reload
    } else {
        Outcome::Continue
    }
}

impl<M: Menu> SessionHost for Bwm<M> {
    fn cycle(&mut self, args: &TriggerArgs) -> Outcome {
        match self.run_cycle(args) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report(&err);
                Outcome::Continue
            }
        }
    }

    fn reload(&mut self) -> Result<(), DaemonError> {
        self.session.reload(self.backend.as_ref())
    }

    fn switch(&mut self, target: Option<&str>) -> Result<(), DaemonError> {
        if self.candidates.is_empty() {
            return Err(DaemonError::NoVault);
        }
        select::choose_candidate(&mut self.candidates, target, &self.menu)?;
        let key = match select::unlock_any(&mut self.candidates, self.backend.as_ref(), &self.menu)
        {
            Ok(key) => key,
            Err(err) => {
                self.session.clear();
                return Err(match err {
                    DaemonError::Cancelled => DaemonError::LoginCancelled,
                    other => other,
                });
            }
        };
        self.session.set_key(key);
        match self.session.reload(self.backend.as_ref()) {
            Err(err @ DaemonError::PartialReload { .. }) => {
                self.report(&err);
                Ok(())
            }
            other => other,
        }
    }

    fn lock(&mut self) {
        if let Err(err) = self.backend.lock() {
            tracing::warn!(error = %err, "vault lock failed");
        }
        if let Err(err) = self.clipboard.clear_now() {
            tracing::warn!(error = %err, "clipboard clear failed");
        }
        self.session.clear();
    }

    fn report(&mut self, error: &DaemonError) {
        tracing::warn!(error = %error, "reported to user");
        if let Err(err) = self.menu.error(&error.to_string()) {
            tracing::warn!(error = %err, "could not show error");
        }
    }

    fn menu_gate(&self) -> Option<MenuGate> {
        self.menu.gate()
    }
}
