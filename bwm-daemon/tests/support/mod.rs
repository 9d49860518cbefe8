#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bwm_autotype::{
    AutotypeError, Backend, ClipboardProvider, ClipboardSink, KeyInjector, NativeKey,
};
use bwm_core::{
    Collection, CollectionId, Config, Folder, FolderId, ItemId, Organization, OrganizationId,
    VaultCandidate, VaultItem,
};
use bwm_daemon::{Bwm, InjectorFactory};
use bwm_menu::{Menu, MenuError};
use bwm_vault::{LockState, SessionKey, TwoFactor, VaultBackend, VaultError, VaultStatus};
use serde_json::json;

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

pub struct FakeState {
    pub status: VaultStatus,
    pub items: Vec<VaultItem>,
    pub folders: Vec<Folder>,
    pub collections: Vec<Collection>,
    pub organizations: Vec<Organization>,
    pub rejected_servers: Vec<String>,
    pub fail_folders: bool,
    pub calls: Vec<String>,
    next_id: usize,
}

impl FakeState {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-new{}", self.next_id)
    }
}

#[derive(Clone)]
pub struct FakeVault(pub Arc<Mutex<FakeState>>);

impl FakeVault {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(FakeState {
            status: VaultStatus {
                server_url: None,
                last_sync: None,
                user_email: None,
                user_id: None,
                status: LockState::Unauthenticated,
            },
            items: sample_items(),
            folders: vec![Folder {
                id: Some(FolderId::from("f-work")),
                name: "work".to_string(),
            }],
            collections: Vec::new(),
            organizations: Vec::new(),
            rejected_servers: Vec::new(),
            fail_folders: false,
            calls: Vec::new(),
            next_id: 0,
        })))
    }

    /// One organization, Acme (`o1`), holding the collection Team (`c1`).
    pub fn with_organization(self) -> Self {
        {
            let mut state = self.0.lock().unwrap();
            state.organizations.push(Organization {
                id: OrganizationId::from("o1"),
                name: "Acme".to_string(),
                extra: Default::default(),
            });
            state.collections.push(Collection {
                id: Some(CollectionId::from("c1")),
                organization_id: Some(OrganizationId::from("o1")),
                name: "Team".to_string(),
                external_id: None,
            });
        }
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    pub fn reject(self, server: &str) -> Self {
        self.0.lock().unwrap().rejected_servers.push(server.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().calls.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().calls.push(call.into());
    }

    fn open_session(&self) -> Result<SessionKey, VaultError> {
        let mut state = self.0.lock().unwrap();
        let server = state.status.server_url.clone().unwrap_or_default();
        if state.rejected_servers.contains(&server) {
            return Err(VaultError::Command {
                args: "unlock".to_string(),
                stderr: "Invalid master password.".to_string(),
            });
        }
        state.status.status = LockState::Unlocked;
        Ok(SessionKey::new(format!("key-for-{server}")))
    }
}

fn not_found(what: &str) -> VaultError {
    VaultError::Command {
        args: what.to_string(),
        stderr: "Not found.".to_string(),
    }
}

fn ids(collections: &[CollectionId]) -> String {
    collections
        .iter()
        .map(CollectionId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

impl VaultBackend for FakeVault {
    fn status(&self, _session: Option<&SessionKey>) -> Result<VaultStatus, VaultError> {
        Ok(self.0.lock().unwrap().status.clone())
    }

    fn set_server(&self, url: &str) -> Result<(), VaultError> {
        self.record(format!("set_server {url}"));
        let mut state = self.0.lock().unwrap();
        state.status.server_url = Some(url.to_string());
        state.status.user_email = None;
        state.status.status = LockState::Unauthenticated;
        Ok(())
    }

    fn login(
        &self,
        email: &str,
        _password: &str,
        _two_factor: Option<&TwoFactor>,
    ) -> Result<SessionKey, VaultError> {
        self.record(format!("login {email}"));
        let key = self.open_session()?;
        self.0.lock().unwrap().status.user_email = Some(email.to_string());
        Ok(key)
    }

    fn unlock(&self, _password: &str) -> Result<SessionKey, VaultError> {
        self.record("unlock");
        self.open_session()
    }

    fn lock(&self) -> Result<(), VaultError> {
        self.record("lock");
        let mut state = self.0.lock().unwrap();
        if state.status.status == LockState::Unlocked {
            state.status.status = LockState::Locked;
        }
        Ok(())
    }

    fn logout(&self) -> Result<(), VaultError> {
        self.record("logout");
        let mut state = self.0.lock().unwrap();
        state.status.status = LockState::Unauthenticated;
        state.status.user_email = None;
        Ok(())
    }

    fn sync(&self, _session: &SessionKey) -> Result<(), VaultError> {
        self.record("sync");
        Ok(())
    }

    fn list_items(&self, _session: &SessionKey) -> Result<Vec<VaultItem>, VaultError> {
        Ok(self.0.lock().unwrap().items.clone())
    }

    fn list_folders(&self, _session: &SessionKey) -> Result<Vec<Folder>, VaultError> {
        let state = self.0.lock().unwrap();
        if state.fail_folders {
            return Err(VaultError::Command {
                args: "list folders".to_string(),
                stderr: "network down".to_string(),
            });
        }
        Ok(state.folders.clone())
    }

    fn list_collections(
        &self,
        _session: &SessionKey,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<Collection>, VaultError> {
        let state = self.0.lock().unwrap();
        Ok(state
            .collections
            .iter()
            .filter(|c| organization.is_none() || c.organization_id.as_ref() == organization)
            .cloned()
            .collect())
    }

    fn list_organizations(&self, _session: &SessionKey) -> Result<Vec<Organization>, VaultError> {
        Ok(self.0.lock().unwrap().organizations.clone())
    }

    fn create_item(&self, _: &SessionKey, item: &VaultItem) -> Result<VaultItem, VaultError> {
        self.record(format!("create_item {}", item.name));
        let mut state = self.0.lock().unwrap();
        let mut created = item.clone();
        created.id = Some(ItemId::from(state.fresh_id("i")));
        state.items.push(created.clone());
        Ok(created)
    }

    fn update_item(&self, _: &SessionKey, item: &VaultItem) -> Result<VaultItem, VaultError> {
        let id = item.id.clone().ok_or(VaultError::MissingId("item"))?;
        self.record(format!("update_item {id}"));
        let mut state = self.0.lock().unwrap();
        let slot = state
            .items
            .iter_mut()
            .find(|i| i.id.as_ref() == Some(&id))
            .ok_or_else(|| not_found("edit item"))?;
        *slot = item.clone();
        Ok(item.clone())
    }

    fn delete_item(&self, _: &SessionKey, id: &ItemId) -> Result<(), VaultError> {
        self.record(format!("delete_item {id}"));
        let mut state = self.0.lock().unwrap();
        let before = state.items.len();
        state.items.retain(|i| i.id.as_ref() != Some(id));
        if state.items.len() == before {
            return Err(not_found("delete item"));
        }
        Ok(())
    }

    fn move_item(
        &self,
        _: &SessionKey,
        id: &ItemId,
        organization: &OrganizationId,
        collections: &[CollectionId],
    ) -> Result<VaultItem, VaultError> {
        self.record(format!("move_item {id} {organization} {}", ids(collections)));
        let mut state = self.0.lock().unwrap();
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id.as_ref() == Some(id))
            .ok_or_else(|| not_found("move"))?;
        item.organization_id = Some(organization.clone());
        item.collection_ids = collections.to_vec();
        Ok(item.clone())
    }

    fn set_item_collections(
        &self,
        _: &SessionKey,
        id: &ItemId,
        collections: &[CollectionId],
    ) -> Result<(), VaultError> {
        self.record(format!("set_item_collections {id} {}", ids(collections)));
        let mut state = self.0.lock().unwrap();
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id.as_ref() == Some(id))
            .ok_or_else(|| not_found("edit item-collections"))?;
        item.collection_ids = collections.to_vec();
        Ok(())
    }

    fn create_folder(&self, _: &SessionKey, name: &str) -> Result<Folder, VaultError> {
        self.record(format!("create_folder {name}"));
        let mut state = self.0.lock().unwrap();
        let folder = Folder {
            id: Some(FolderId::from(state.fresh_id("f"))),
            name: name.to_string(),
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }

    fn rename_folder(&self, _: &SessionKey, id: &FolderId, name: &str) -> Result<Folder, VaultError> {
        self.record(format!("rename_folder {id} {name}"));
        let mut state = self.0.lock().unwrap();
        let folder = state
            .folders
            .iter_mut()
            .find(|f| f.id.as_ref() == Some(id))
            .ok_or_else(|| not_found("edit folder"))?;
        folder.name = name.to_string();
        Ok(folder.clone())
    }

    fn delete_folder(&self, _: &SessionKey, id: &FolderId) -> Result<(), VaultError> {
        self.record(format!("delete_folder {id}"));
        let mut state = self.0.lock().unwrap();
        state.folders.retain(|f| f.id.as_ref() != Some(id));
        for item in &mut state.items {
            if item.folder_id.as_ref() == Some(id) {
                item.folder_id = None;
            }
        }
        Ok(())
    }

    fn create_collection(
        &self,
        _: &SessionKey,
        organization: &OrganizationId,
        name: &str,
    ) -> Result<Collection, VaultError> {
        self.record(format!("create_collection {organization} {name}"));
        let mut state = self.0.lock().unwrap();
        let collection = Collection {
            id: Some(CollectionId::from(state.fresh_id("c"))),
            organization_id: Some(organization.clone()),
            name: name.to_string(),
            external_id: None,
        };
        state.collections.push(collection.clone());
        Ok(collection)
    }

    fn rename_collection(
        &self,
        _: &SessionKey,
        collection: &Collection,
        name: &str,
    ) -> Result<Collection, VaultError> {
        let id = collection
            .id
            .clone()
            .ok_or(VaultError::MissingId("collection"))?;
        self.record(format!("rename_collection {id} {name}"));
        let mut state = self.0.lock().unwrap();
        let slot = state
            .collections
            .iter_mut()
            .find(|c| c.id.as_ref() == Some(&id))
            .ok_or_else(|| not_found("edit org-collection"))?;
        slot.name = name.to_string();
        Ok(slot.clone())
    }

    fn delete_collection(
        &self,
        _: &SessionKey,
        organization: &OrganizationId,
        id: &CollectionId,
    ) -> Result<(), VaultError> {
        self.record(format!("delete_collection {organization} {id}"));
        let mut state = self.0.lock().unwrap();
        state.collections.retain(|c| c.id.as_ref() != Some(id));
        Ok(())
    }
}

pub fn sample_items() -> Vec<VaultItem> {
    let raw = json!([
        {
            "id": "i-github",
            "folderId": "f-work",
            "type": 1,
            "name": "github",
            "login": {
                "username": "alice",
                "password": "hunter2",
                "uris": [{ "uri": "https://github.com" }]
            }
        },
        {
            "id": "i-note",
            "type": 2,
            "name": "recovery codes",
            "notes": "one\ntwo"
        }
    ]);
    serde_json::from_value(raw).unwrap()
}

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

pub enum Pick {
    /// First offered line containing the text.
    Containing(&'static str),
    /// Exactly this text, as if typed.
    Typed(&'static str),
    Cancel,
}

#[derive(Clone, Default)]
pub struct ScriptedMenu {
    picks: Arc<Mutex<VecDeque<Pick>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl ScriptedMenu {
    pub fn new(picks: impl IntoIterator<Item = Pick>) -> Self {
        Self {
            picks: Arc::new(Mutex::new(picks.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn push(&self, pick: Pick) {
        self.picks.lock().unwrap().push_back(pick);
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Menu for ScriptedMenu {
    fn select(
        &self,
        prompt: &str,
        lines: &[String],
        _obscure: bool,
    ) -> Result<Option<String>, MenuError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let pick = self.picks.lock().unwrap().pop_front();
        Ok(match pick {
            Some(Pick::Containing(text)) => lines.iter().find(|line| line.contains(text)).cloned(),
            Some(Pick::Typed(text)) => Some(text.to_string()),
            Some(Pick::Cancel) | None => None,
        })
    }

    fn error(&self, message: &str) -> Result<(), MenuError> {
        self.errors.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Recorder(pub Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

pub struct RecordingInjector(Recorder);

impl KeyInjector for RecordingInjector {
    fn backend(&self) -> &'static str {
        "recording"
    }

    fn type_text(&mut self, text: &str) -> Result<(), AutotypeError> {
        self.0 .0.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn tap_key(&mut self, key: NativeKey) -> Result<(), AutotypeError> {
        self.0 .0.lock().unwrap().push(format!("<{key:?}>"));
        Ok(())
    }

    fn pause(&mut self, _duration: Duration) {}
}

pub struct RecordingClipboard(pub Recorder);

impl ClipboardProvider for RecordingClipboard {
    fn set(&self, contents: &str) -> Result<(), AutotypeError> {
        self.0 .0.lock().unwrap().push(contents.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

pub fn candidate(server: &str) -> VaultCandidate {
    VaultCandidate {
        server: server.to_string(),
        email: Some("alice@example.com".to_string()),
        password: Some("master".to_string()),
        ..VaultCandidate::default()
    }
}

pub struct Harness {
    pub bwm: Bwm<ScriptedMenu>,
    pub vault: FakeVault,
    pub menu: ScriptedMenu,
    pub typed: Recorder,
    pub clipboard: Recorder,
    pub injector_calls: Arc<Mutex<usize>>,
}

pub fn harness(servers: &[&str], vault: FakeVault, menu: ScriptedMenu) -> Harness {
    harness_with(servers, vault, menu, Config::default())
}

pub fn harness_with(
    servers: &[&str],
    vault: FakeVault,
    menu: ScriptedMenu,
    mut config: Config,
) -> Harness {
    config.vault.candidates = servers.iter().map(|s| candidate(s)).collect();

    let typed = Recorder::default();
    let clipboard = Recorder::default();
    let injector_calls = Arc::new(Mutex::new(0));

    let factory: InjectorFactory = {
        let typed = typed.clone();
        let calls = Arc::clone(&injector_calls);
        Box::new(move |_backend: Backend| {
            *calls.lock().unwrap() += 1;
            Ok(Box::new(RecordingInjector(typed.clone())) as Box<dyn KeyInjector>)
        })
    };
    let sink = ClipboardSink::new(
        Arc::new(RecordingClipboard(clipboard.clone())),
        Duration::from_secs(600),
    );

    let bwm = Bwm::with_parts(
        Arc::new(config),
        Box::new(vault.clone()),
        menu.clone(),
        sink,
        factory,
    )
    .unwrap();

    Harness {
        bwm,
        vault,
        menu,
        typed,
        clipboard,
        injector_calls,
    }
}
