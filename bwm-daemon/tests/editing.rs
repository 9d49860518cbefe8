mod support;

use bwm_core::{CommandLine, Config, FolderId, ItemId, VaultItem};
use bwm_daemon::cycle::{ADD, COLLECTIONS, EDIT, FOLDERS};
use bwm_daemon::edit::{CONFIRM_DELETE, DELETE, GENERATE, MANUAL, MISMATCH, SAVE};
use bwm_daemon::manage::{CREATE_COLLECTION, CREATE_FOLDER, NO_PARENT, RENAME_FOLDER};
use bwm_daemon::{Outcome, SessionHost, TriggerArgs};
use support::{harness, harness_with, FakeVault, Harness, Pick, ScriptedMenu};

const SERVER: &str = "https://vault.example.com";

fn unlocked(vault: FakeVault, picks: impl IntoIterator<Item = Pick>) -> Harness {
    let mut h = harness(&[SERVER], vault, ScriptedMenu::new(picks));
    h.bwm.switch(None).unwrap();
    h
}

fn run(h: &mut Harness) -> Outcome {
    h.bwm.cycle(&TriggerArgs::default())
}

fn stored(vault: &FakeVault, id: &str) -> Option<VaultItem> {
    vault
        .state()
        .items
        .iter()
        .find(|item| item.id == Some(ItemId::from(id)))
        .cloned()
}

fn writes(vault: &FakeVault) -> Vec<String> {
    vault
        .calls()
        .into_iter()
        .filter(|call| !call.starts_with("set_server") && !call.starts_with("login"))
        .collect()
}

fn edit_github(then: impl IntoIterator<Item = Pick>) -> Vec<Pick> {
    let mut picks = vec![Pick::Containing(EDIT), Pick::Containing("github")];
    picks.extend(then);
    picks
}

#[test]
fn edited_username_is_saved() {
    let mut h = unlocked(
        FakeVault::new(),
        edit_github([
            Pick::Containing("Username:"),
            Pick::Typed("bob"),
            Pick::Containing(SAVE),
        ]),
    );

    assert_eq!(run(&mut h), Outcome::Reload);
    assert_eq!(writes(&h.vault), vec!["update_item i-github"]);
    let github = stored(&h.vault, "i-github").unwrap();
    let login = github.login.unwrap();
    assert_eq!(login.username.as_deref(), Some("bob"));
    assert_eq!(login.password.as_deref(), Some("hunter2"));
    assert_eq!(github.folder_id, Some(FolderId::from("f-work")));
}

#[test]
fn cancelled_form_discards_changes() {
    let mut h = unlocked(
        FakeVault::new(),
        edit_github([
            Pick::Containing("Name:"),
            Pick::Typed("renamed"),
            Pick::Cancel,
        ]),
    );

    assert_eq!(run(&mut h), Outcome::Continue);
    assert!(writes(&h.vault).is_empty());
    assert_eq!(stored(&h.vault, "i-github").unwrap().name, "github");
}

#[test]
fn delete_needs_confirmation() {
    let mut h = unlocked(
        FakeVault::new(),
        edit_github([Pick::Containing(DELETE), Pick::Containing("NO"), Pick::Cancel]),
    );
    assert_eq!(run(&mut h), Outcome::Continue);
    assert!(stored(&h.vault, "i-github").is_some());

    for pick in edit_github([Pick::Containing(DELETE), Pick::Containing(CONFIRM_DELETE)]) {
        h.menu.push(pick);
    }
    assert_eq!(run(&mut h), Outcome::Reload);
    assert_eq!(writes(&h.vault), vec!["delete_item i-github"]);
    assert!(stored(&h.vault, "i-github").is_none());
}

#[test]
fn added_entry_lands_in_the_chosen_folder() {
    let mut h = unlocked(
        FakeVault::new(),
        [
            Pick::Containing(ADD),
            Pick::Containing("work"),
            Pick::Containing(SAVE),
            Pick::Containing("Name:"),
            Pick::Typed("gitlab"),
            Pick::Containing("Username:"),
            Pick::Typed("carol"),
            Pick::Containing(SAVE),
        ],
    );

    assert_eq!(run(&mut h), Outcome::Reload);
    assert_eq!(h.menu.errors(), vec!["Entry needs a name"]);
    assert_eq!(writes(&h.vault), vec!["create_item gitlab"]);
    let created = stored(&h.vault, "i-new1").unwrap();
    assert_eq!(created.folder_id, Some(FolderId::from("f-work")));
    assert_eq!(
        created.login.unwrap().username.as_deref(),
        Some("carol")
    );
}

#[test]
fn generated_password_uses_the_picked_preset() {
    let mut h = unlocked(
        FakeVault::new(),
        edit_github([
            Pick::Containing("Password:"),
            Pick::Containing(GENERATE),
            Pick::Typed("12"),
            Pick::Typed("Digits"),
            Pick::Containing(SAVE),
        ]),
    );

    assert_eq!(run(&mut h), Outcome::Reload);
    let password = stored(&h.vault, "i-github")
        .unwrap()
        .login
        .unwrap()
        .password
        .unwrap();
    assert_eq!(password.len(), 12);
    assert!(password.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn manual_password_must_match() {
    let mut h = unlocked(
        FakeVault::new(),
        edit_github([
            Pick::Containing("Password:"),
            Pick::Containing(MANUAL),
            Pick::Typed("one"),
            Pick::Typed("two"),
            Pick::Containing("Password:"),
            Pick::Containing(MANUAL),
            Pick::Typed("s3cret"),
            Pick::Typed("s3cret"),
            Pick::Containing(SAVE),
        ]),
    );

    assert_eq!(run(&mut h), Outcome::Reload);
    assert_eq!(h.menu.errors(), vec![MISMATCH]);
    let login = stored(&h.vault, "i-github").unwrap().login.unwrap();
    assert_eq!(login.password.as_deref(), Some("s3cret"));
}

#[cfg(unix)]
#[test]
fn notes_go_through_the_configured_editor() {
    let mut config = Config::default();
    config.edit.gui_editor = Some(CommandLine::new([
        "sh",
        "-c",
        "printf 'fresh notes\\n' > \"$0\"",
    ]));
    let mut h = harness_with(
        &[SERVER],
        FakeVault::new(),
        ScriptedMenu::new(edit_github([
            Pick::Containing("Notes:"),
            Pick::Containing(SAVE),
        ])),
        config,
    );
    h.bwm.switch(None).unwrap();

    assert_eq!(run(&mut h), Outcome::Reload);
    let github = stored(&h.vault, "i-github").unwrap();
    assert_eq!(github.notes.as_deref(), Some("fresh notes"));
}

#[test]
fn nested_folder_is_created_then_renamed_with_its_parent() {
    let mut h = unlocked(
        FakeVault::new(),
        [
            Pick::Containing(FOLDERS),
            Pick::Containing(CREATE_FOLDER),
            Pick::Containing("work"),
            Pick::Typed("clients"),
            Pick::Containing(RENAME_FOLDER),
            Pick::Containing("work"),
            Pick::Typed("jobs"),
            Pick::Cancel,
        ],
    );

    assert_eq!(run(&mut h), Outcome::Reload);
    assert_eq!(
        writes(&h.vault),
        vec![
            "create_folder work/clients",
            "rename_folder f-work jobs",
            "rename_folder f-new1 jobs/clients",
        ]
    );
}

#[test]
fn sharing_moves_the_item_into_the_collection() {
    let mut h = unlocked(
        FakeVault::new().with_organization(),
        edit_github([
            Pick::Containing("Collections:"),
            Pick::Containing("Team"),
            Pick::Containing("Done"),
            Pick::Containing(SAVE),
        ]),
    );

    assert_eq!(run(&mut h), Outcome::Reload);
    assert_eq!(
        writes(&h.vault),
        vec!["update_item i-github", "move_item i-github o1 c1"]
    );
    let github = stored(&h.vault, "i-github").unwrap();
    assert_eq!(github.organization_id.unwrap().as_str(), "o1");
}

#[test]
fn collection_is_created_in_the_only_organization() {
    let mut h = unlocked(
        FakeVault::new().with_organization(),
        [
            Pick::Containing(COLLECTIONS),
            Pick::Containing(CREATE_COLLECTION),
            Pick::Containing(NO_PARENT),
            Pick::Typed("Ops"),
            Pick::Cancel,
        ],
    );

    assert_eq!(run(&mut h), Outcome::Reload);
    assert_eq!(writes(&h.vault), vec!["create_collection o1 Ops"]);
}

#[test]
fn collections_are_not_offered_without_organizations() {
    let mut h = unlocked(FakeVault::new(), [Pick::Containing(COLLECTIONS)]);
    assert_eq!(run(&mut h), Outcome::Stop);
    assert!(writes(&h.vault).is_empty());
}
