//! [`VaultBackend`] over the Bitwarden command-line client.
//!
//! Each call spawns the configured `bw` command once. The session key is
//! passed through `BW_SESSION` and master passwords through an environment
//! variable named with `--passwordenv`, so neither appears on a command
//! line. Create/edit payloads are base64-encoded JSON, as `bw encode` would
//! produce.

use std::process::{Command, Stdio};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bwm_core::{
    Collection, CollectionId, CommandLine, Config, Folder, FolderId, ItemId, Organization,
    OrganizationId, VaultItem,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::backend::VaultBackend;
use crate::error::{io_err, VaultError};
use crate::session::{SessionKey, TwoFactor, VaultStatus};

const SESSION_ENV: &str = "BW_SESSION";
const PASSWORD_ENV: &str = "BWM_MASTER_PASSWORD";

#[derive(Debug, Clone)]
pub struct BwCli {
    command: CommandLine,
}

/// Extra inputs for one invocation that must stay off the command line.
#[derive(Default)]
struct Secrets<'a> {
    session: Option<&'a SessionKey>,
    password: Option<&'a str>,
}

impl<'a> Secrets<'a> {
    fn session(session: &'a SessionKey) -> Self {
        Self {
            session: Some(session),
            password: None,
        }
    }
}

impl BwCli {
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.vault.bw_command.clone())
    }

    /// Only the subcommand words, never payloads or secrets.
    fn describe(args: &[&str]) -> String {
        args.iter().take(2).copied().collect::<Vec<_>>().join(" ")
    }

    fn run(&self, args: &[&str], secrets: Secrets<'_>) -> Result<String, VaultError> {
        let program = self.command.program().ok_or(VaultError::NoCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(self.command.args())
            .args(args)
            .env("BW_NOINTERACTION", "true")
            .env_remove(SESSION_ENV)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(session) = secrets.session {
            cmd.env(SESSION_ENV, session.expose());
        }
        if let Some(password) = secrets.password {
            cmd.env(PASSWORD_ENV, password);
        }

        tracing::debug!(args = %Self::describe(args), "running bw");
        let output = cmd.output().map_err(|e| io_err(program, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(VaultError::Command {
                args: Self::describe(args),
                stderr: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run and require non-empty stdout.
    fn run_output(&self, args: &[&str], secrets: Secrets<'_>) -> Result<String, VaultError> {
        let stdout = self.run(args, secrets)?;
        if stdout.is_empty() {
            return Err(VaultError::Command {
                args: Self::describe(args),
                stderr: "no output".to_string(),
            });
        }
        Ok(stdout)
    }

    fn run_json<T: DeserializeOwned>(
        &self,
        args: &[&str],
        secrets: Secrets<'_>,
    ) -> Result<T, VaultError> {
        let stdout = self.run_output(args, secrets)?;
        serde_json::from_str(&stdout).map_err(|source| VaultError::Json {
            args: Self::describe(args),
            source,
        })
    }
}

/// Base64 of the JSON form of `value`.
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<String, VaultError> {
    let raw = serde_json::to_string(value).map_err(|source| VaultError::Json {
        args: "encode".to_string(),
        source,
    })?;
    Ok(BASE64.encode(raw))
}

impl VaultBackend for BwCli {
    fn status(&self, session: Option<&SessionKey>) -> Result<VaultStatus, VaultError> {
        self.run_json(
            &["status"],
            Secrets {
                session,
                password: None,
            },
        )
    }

    fn set_server(&self, url: &str) -> Result<(), VaultError> {
        self.run(&["config", "server", url], Secrets::default())
            .map(drop)
    }

    fn login(
        &self,
        email: &str,
        password: &str,
        two_factor: Option<&TwoFactor>,
    ) -> Result<SessionKey, VaultError> {
        let method;
        let mut args = vec!["login", email, "--passwordenv", PASSWORD_ENV, "--raw"];
        if let Some(tf) = two_factor {
            method = tf.method.to_string();
            args.extend(["--method", method.as_str(), "--code", tf.code.as_str()]);
        }
        let secrets = Secrets {
            session: None,
            password: Some(password),
        };
        self.run_output(&args, secrets).map(SessionKey::new)
    }

    fn unlock(&self, password: &str) -> Result<SessionKey, VaultError> {
        let secrets = Secrets {
            session: None,
            password: Some(password),
        };
        self.run_output(&["unlock", "--passwordenv", PASSWORD_ENV, "--raw"], secrets)
            .map(SessionKey::new)
    }

    fn lock(&self) -> Result<(), VaultError> {
        self.run(&["lock"], Secrets::default()).map(drop)
    }

    fn logout(&self) -> Result<(), VaultError> {
        self.run(&["logout"], Secrets::default()).map(drop)
    }

    fn sync(&self, session: &SessionKey) -> Result<(), VaultError> {
        self.run(&["sync"], Secrets::session(session)).map(drop)
    }

    fn list_items(&self, session: &SessionKey) -> Result<Vec<VaultItem>, VaultError> {
        self.run_json(&["list", "items"], Secrets::session(session))
    }

    fn list_folders(&self, session: &SessionKey) -> Result<Vec<Folder>, VaultError> {
        self.run_json(&["list", "folders"], Secrets::session(session))
    }

    fn list_collections(
        &self,
        session: &SessionKey,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<Collection>, VaultError> {
        match organization {
            Some(org) => self.run_json(
                &["list", "org-collections", "--organizationid", org.as_str()],
                Secrets::session(session),
            ),
            None => self.run_json(&["list", "collections"], Secrets::session(session)),
        }
    }

    fn list_organizations(&self, session: &SessionKey) -> Result<Vec<Organization>, VaultError> {
        self.run_json(&["list", "organizations"], Secrets::session(session))
    }

    fn create_item(
        &self,
        session: &SessionKey,
        item: &VaultItem,
    ) -> Result<VaultItem, VaultError> {
        let payload = encode_payload(item)?;
        self.run_json(&["create", "item", &payload], Secrets::session(session))
    }

    fn update_item(
        &self,
        session: &SessionKey,
        item: &VaultItem,
    ) -> Result<VaultItem, VaultError> {
        let id = item.id.as_ref().ok_or(VaultError::MissingId("item"))?;
        let payload = encode_payload(item)?;
        self.run_json(
            &["edit", "item", id.as_str(), &payload],
            Secrets::session(session),
        )
    }

    fn delete_item(&self, session: &SessionKey, id: &ItemId) -> Result<(), VaultError> {
        self.run(&["delete", "item", id.as_str()], Secrets::session(session))
            .map(drop)
    }

    fn move_item(
        &self,
        session: &SessionKey,
        id: &ItemId,
        organization: &OrganizationId,
        collections: &[CollectionId],
    ) -> Result<VaultItem, VaultError> {
        let payload = encode_payload(collections)?;
        self.run_json(
            &["move", id.as_str(), organization.as_str(), &payload],
            Secrets::session(session),
        )
    }

    fn set_item_collections(
        &self,
        session: &SessionKey,
        id: &ItemId,
        collections: &[CollectionId],
    ) -> Result<(), VaultError> {
        let payload = encode_payload(collections)?;
        self.run(
            &["edit", "item-collections", id.as_str(), &payload],
            Secrets::session(session),
        )
        .map(drop)
    }

    fn create_folder(&self, session: &SessionKey, name: &str) -> Result<Folder, VaultError> {
        let payload = encode_payload(&json!({ "name": name }))?;
        self.run_json(&["create", "folder", &payload], Secrets::session(session))
    }

    fn rename_folder(
        &self,
        session: &SessionKey,
        id: &FolderId,
        name: &str,
    ) -> Result<Folder, VaultError> {
        let payload = encode_payload(&json!({ "name": name }))?;
        self.run_json(
            &["edit", "folder", id.as_str(), &payload],
            Secrets::session(session),
        )
    }

    fn delete_folder(&self, session: &SessionKey, id: &FolderId) -> Result<(), VaultError> {
        self.run(&["delete", "folder", id.as_str()], Secrets::session(session))
            .map(drop)
    }

    fn create_collection(
        &self,
        session: &SessionKey,
        organization: &OrganizationId,
        name: &str,
    ) -> Result<Collection, VaultError> {
        let payload = encode_payload(&json!({
            "organizationId": organization,
            "name": name,
            "externalId": null,
            "groups": [],
        }))?;
        self.run_json(
            &[
                "create",
                "org-collection",
                &payload,
                "--organizationid",
                organization.as_str(),
            ],
            Secrets::session(session),
        )
    }

    fn rename_collection(
        &self,
        session: &SessionKey,
        collection: &Collection,
        name: &str,
    ) -> Result<Collection, VaultError> {
        let id = collection
            .id
            .as_ref()
            .ok_or(VaultError::MissingId("collection"))?;
        let organization = collection
            .organization_id
            .as_ref()
            .ok_or(VaultError::MissingId("collection organization"))?;
        let mut renamed = collection.clone();
        renamed.name = name.to_string();
        let payload = encode_payload(&renamed)?;
        self.run_json(
            &[
                "edit",
                "org-collection",
                id.as_str(),
                &payload,
                "--organizationid",
                organization.as_str(),
            ],
            Secrets::session(session),
        )
    }

    fn delete_collection(
        &self,
        session: &SessionKey,
        organization: &OrganizationId,
        id: &CollectionId,
    ) -> Result<(), VaultError> {
        self.run(
            &[
                "delete",
                "org-collection",
                id.as_str(),
                "--organizationid",
                organization.as_str(),
            ],
            Secrets::session(session),
        )
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["create", "item", "eyJzZWNyZXQiOjF9"], "create item")]
    #[case(&["status"], "status")]
    #[case(&["edit", "item-collections", "i1", "WyJjMSJd"], "edit item-collections")]
    fn describe_hides_payloads(#[case] args: &[&str], #[case] expected: &str) {
        assert_eq!(BwCli::describe(args), expected);
    }

    #[test]
    fn payload_is_base64_json() {
        let encoded = encode_payload(&json!({ "name": "Work" })).unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, br#"{"name":"Work"}"#);
    }

    #[test]
    fn collection_ids_encode_as_array() {
        let ids = [CollectionId::from("c1"), CollectionId::from("c2")];
        let decoded = BASE64.decode(encode_payload(&ids[..]).unwrap()).unwrap();
        assert_eq!(decoded, br#"["c1","c2"]"#);
    }

    #[test]
    fn empty_command_is_rejected() {
        let bw = BwCli::new(CommandLine::new(Vec::<String>::new()));
        assert!(matches!(bw.lock(), Err(VaultError::NoCommand)));
    }
}
