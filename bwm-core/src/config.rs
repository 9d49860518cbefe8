//! Immutable runtime configuration.
//!
//! Loaded once at startup from `$XDG_CONFIG_HOME/bwm/config.yaml` and passed
//! by reference to every component. A commented default file is written on
//! first run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{io_err, ConfigError};

pub const DEFAULT_SEQUENCE: &str = "{USERNAME}{TAB}{PASSWORD}{ENTER}";
pub const DEFAULT_SESSION_TIMEOUT_MIN: u64 = 360;
pub const DEFAULT_MAX_LINES: usize = 24;
pub const DEFAULT_CLIPBOARD_CLEAR_SECS: u64 = 30;
pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

/// Character sets every password preset can draw from.
pub const BUILTIN_CHAR_SETS: [(&str, &str); 4] = [
    ("upper", "ABCDEFGHIJKLMNOPQRSTUVWXYZ"),
    ("lower", "abcdefghijklmnopqrstuvwxyz"),
    ("digits", "0123456789"),
    ("punctuation", r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##),
];

const BUILTIN_PRESETS: [(&str, &[&str]); 4] = [
    ("Letters+Digits+Punctuation", &["upper", "lower", "digits", "punctuation"]),
    ("Letters+Digits", &["upper", "lower", "digits"]),
    ("Letters", &["upper", "lower"]),
    ("Digits", &["digits"]),
];

const DEFAULT_CONFIG_YAML: &str = r##"# bwm configuration
menu:
  # Menu program and its arguments: dmenu, rofi -dmenu, wofi --dmenu, bemenu, tofi, fuzzel --dmenu
  command: dmenu
  # max_lines: 24
  # pinentry: pinentry-gtk-2
  obscure: true
  obscure_color: "#222222"

vault:
  candidates:
    - server: https://vault.bitwarden.com
      email: ""
      # password_cmd: pass show bitwarden
      # twofactor: 0
  session_timeout_min: 360
  autotype_default: "{USERNAME}{TAB}{PASSWORD}{ENTER}"
  # uinput | xdotool | ydotool | wtype
  type_library: xdotool
  hide_folders: []

clipboard:
  enabled: false
  # command: wl-copy
  clear_after_secs: 30

edit:
  # Notes open in gui_editor, or in editor (default $EDITOR, then vim)
  # inside terminal.
  # gui_editor: gvim -f
  # editor: nano
  terminal: xterm
  password_length: 20
  # password_chars:
  #   symbols: "!@#$%"
  # password_char_presets:
  #   Alnum: [upper, lower, digits]
"##;

// ---------------------------------------------------------------------------
// Command lines
// ---------------------------------------------------------------------------

/// Program plus arguments. Accepts either a YAML list or a single string,
/// which is split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandLine(pub Vec<String>);

impl CommandLine {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn parse(line: &str) -> Self {
        Self::new(line.split_whitespace())
    }

    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl<'de> Deserialize<'de> for CommandLine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Line(String),
            Args(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Line(line) => CommandLine::parse(&line),
            Raw::Args(args) => CommandLine(args),
        })
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    pub command: CommandLine,
    pub max_lines: Option<usize>,
    pub pinentry: Option<CommandLine>,
    pub obscure: bool,
    pub obscure_color: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            command: CommandLine::parse("dmenu"),
            max_lines: None,
            pinentry: None,
            obscure: true,
            obscure_color: "#222222".to_string(),
        }
    }
}

impl MenuConfig {
    /// Upper bound on visible lines: explicit `max_lines`, else the value of
    /// a `-l N` pair in the command, else 24.
    pub fn max_lines(&self) -> usize {
        if let Some(lines) = self.max_lines {
            return lines;
        }
        self.command
            .0
            .windows(2)
            .find(|pair| pair[0] == "-l")
            .and_then(|pair| pair[1].parse().ok())
            .unwrap_or(DEFAULT_MAX_LINES)
    }
}

/// Key-injection mechanism used for autotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeLibrary {
    Uinput,
    #[default]
    Xdotool,
    Ydotool,
    Wtype,
}

impl fmt::Display for TypeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeLibrary::Uinput => write!(f, "uinput"),
            TypeLibrary::Xdotool => write!(f, "xdotool"),
            TypeLibrary::Ydotool => write!(f, "ydotool"),
            TypeLibrary::Wtype => write!(f, "wtype"),
        }
    }
}

/// One vault the user can log into.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultCandidate {
    pub server: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_cmd: Option<CommandLine>,
    /// Two-factor method as understood by the vault backend
    /// (0 authenticator, 1 email, 3 yubikey).
    pub twofactor: Option<u8>,
}

impl fmt::Debug for VaultCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultCandidate")
            .field("server", &self.server)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_cmd", &self.password_cmd)
            .field("twofactor", &self.twofactor)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub candidates: Vec<VaultCandidate>,
    pub session_timeout_min: u64,
    pub autotype_default: String,
    pub type_library: TypeLibrary,
    pub hide_folders: Vec<String>,
    pub bw_command: CommandLine,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            session_timeout_min: DEFAULT_SESSION_TIMEOUT_MIN,
            autotype_default: DEFAULT_SEQUENCE.to_string(),
            type_library: TypeLibrary::default(),
            hide_folders: Vec::new(),
            bw_command: CommandLine::parse("bw"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    pub enabled: bool,
    pub command: Option<CommandLine>,
    pub clear_after_secs: u64,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: None,
            clear_after_secs: DEFAULT_CLIPBOARD_CLEAR_SECS,
        }
    }
}

impl ClipboardConfig {
    /// Configured clipboard setter, falling back to `wl-copy` on Wayland
    /// and `xsel -b -i` elsewhere.
    pub fn command_for(&self, wayland: bool) -> CommandLine {
        match &self.command {
            Some(command) => command.clone(),
            None if wayland => CommandLine::parse("wl-copy"),
            None => CommandLine::parse("xsel -b -i"),
        }
    }
}

/// Entry editing: the notes editor and password generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Run directly with the notes file appended.
    pub gui_editor: Option<CommandLine>,
    /// Run inside `terminal`; `$EDITOR` and then `vim` when unset.
    pub editor: Option<CommandLine>,
    pub terminal: CommandLine,
    pub password_length: usize,
    /// Extra named character sets, added to (or overriding) the built-ins.
    pub password_chars: BTreeMap<String, String>,
    /// Preset name to set names. When present these are the only presets.
    pub password_char_presets: BTreeMap<String, Vec<String>>,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            gui_editor: None,
            editor: None,
            terminal: CommandLine::parse("xterm"),
            password_length: DEFAULT_PASSWORD_LENGTH,
            password_chars: BTreeMap::new(),
            password_char_presets: BTreeMap::new(),
        }
    }
}

/// A named choice in the password generator: one string per character set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPreset {
    pub name: String,
    pub sets: Vec<String>,
}

impl EditConfig {
    /// Command that edits the file path appended to it.
    pub fn notes_editor(&self, env_editor: Option<&str>) -> CommandLine {
        if let Some(gui) = &self.gui_editor {
            return gui.clone();
        }
        let editor = match (&self.editor, env_editor.filter(|e| !e.trim().is_empty())) {
            (Some(editor), _) => editor.clone(),
            (None, Some(env)) => CommandLine::parse(env),
            (None, None) => CommandLine::parse("vim"),
        };
        let mut line = self.terminal.0.clone();
        line.push("-e".to_string());
        line.extend(editor.0);
        CommandLine(line)
    }

    /// Built-in sets overlaid with `password_chars`.
    pub fn char_sets(&self) -> BTreeMap<String, String> {
        let mut sets: BTreeMap<String, String> = BUILTIN_CHAR_SETS
            .iter()
            .map(|(name, chars)| (name.to_string(), chars.to_string()))
            .collect();
        sets.extend(self.password_chars.clone());
        sets
    }

    /// Presets in menu order. Configured presets replace the built-in ones,
    /// which otherwise get one extra preset per custom set.
    pub fn password_presets(&self) -> Vec<PasswordPreset> {
        let sets = self.char_sets();
        let resolve = |names: &[String]| -> Vec<String> {
            names.iter().filter_map(|n| sets.get(n).cloned()).collect()
        };

        if !self.password_char_presets.is_empty() {
            return self
                .password_char_presets
                .iter()
                .map(|(name, names)| PasswordPreset {
                    name: name.clone(),
                    sets: resolve(names),
                })
                .collect();
        }

        let mut presets: Vec<PasswordPreset> = BUILTIN_PRESETS
            .iter()
            .map(|(name, names)| PasswordPreset {
                name: name.to_string(),
                sets: names.iter().filter_map(|n| sets.get(*n).cloned()).collect(),
            })
            .collect();
        for (name, chars) in &self.password_chars {
            presets.push(PasswordPreset {
                name: title_case(name),
                sets: vec![chars.clone()],
            });
        }
        presets
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.terminal.is_empty() && self.gui_editor.is_none() {
            return Err(ConfigError::Invalid {
                field: "edit.terminal",
                reason: "must name a terminal when no gui_editor is set".to_string(),
            });
        }
        let sets = self.char_sets();
        if let Some(name) = sets.iter().find(|(_, chars)| chars.is_empty()).map(|(n, _)| n) {
            return Err(ConfigError::Invalid {
                field: "edit.password_chars",
                reason: format!("set `{name}` is empty"),
            });
        }
        for (preset, names) in &self.password_char_presets {
            if let Some(unknown) = names.iter().find(|n| !sets.contains_key(*n)) {
                return Err(ConfigError::Invalid {
                    field: "edit.password_char_presets",
                    reason: format!("preset `{preset}` names unknown set `{unknown}`"),
                });
            }
        }
        Ok(())
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub menu: MenuConfig,
    pub vault: VaultConfig,
    pub clipboard: ClipboardConfig,
    pub edit: EditConfig,
    /// Tera template for one line of the entry list.
    pub entry_format: Option<String>,
}

impl Config {
    /// Load from `path`, writing the default file first when it is missing.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            write_default(path)?;
        }
        let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let config: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `$XDG_CONFIG_HOME/bwm/config.yaml`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&crate::paths::config_path()?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.vault.session_timeout_min.saturating_mul(60))
    }

    pub fn clipboard_clear_after(&self) -> Duration {
        Duration::from_secs(self.clipboard.clear_after_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.menu.command.is_empty() {
            return Err(ConfigError::Invalid {
                field: "menu.command",
                reason: "must name a menu program".to_string(),
            });
        }
        if self.vault.bw_command.is_empty() {
            return Err(ConfigError::Invalid {
                field: "vault.bw_command",
                reason: "must name the vault CLI".to_string(),
            });
        }
        if self.vault.session_timeout_min == 0 {
            return Err(ConfigError::Invalid {
                field: "vault.session_timeout_min",
                reason: "must be at least one minute".to_string(),
            });
        }
        self.edit.validate()
    }
}

fn write_default(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_YAML).map_err(|e| io_err(path, e))?;
    set_file_permissions(path)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_file_parses_to_defaults_plus_one_candidate() {
        let config = Config::from_yaml_str(DEFAULT_CONFIG_YAML).expect("default yaml");
        assert_eq!(config.menu, MenuConfig::default());
        assert_eq!(config.edit, EditConfig::default());
        assert_eq!(config.vault.session_timeout_min, DEFAULT_SESSION_TIMEOUT_MIN);
        assert_eq!(config.vault.autotype_default, DEFAULT_SEQUENCE);
        assert_eq!(config.vault.type_library, TypeLibrary::Xdotool);
        assert_eq!(config.vault.candidates.len(), 1);
        assert_eq!(config.vault.candidates[0].server, "https://vault.bitwarden.com");
    }

    #[rstest]
    #[case("command: dmenu", 24)]
    #[case("command: dmenu -l 10", 10)]
    #[case("command: [rofi, -dmenu, -l, '7']", 7)]
    #[case("command: dmenu -l 10\nmax_lines: 3", 3)]
    fn max_lines_resolution(#[case] menu: &str, #[case] expected: usize) {
        let yaml = format!("menu:\n  {}", menu.replace('\n', "\n  "));
        let config = Config::from_yaml_str(&yaml).expect("parse");
        assert_eq!(config.menu.max_lines(), expected);
    }

    #[test]
    fn command_line_accepts_string_or_list() {
        let config = Config::from_yaml_str(
            "menu:\n  command: rofi -dmenu -i\nvault:\n  bw_command: [/opt/bw/bw, --nointeraction]\n",
        )
        .expect("parse");
        assert_eq!(config.menu.command.program(), Some("rofi"));
        assert_eq!(config.menu.command.args(), ["-dmenu", "-i"]);
        assert_eq!(config.vault.bw_command.program(), Some("/opt/bw/bw"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::from_yaml_str("vault:\n  session_timeout_min: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "vault.session_timeout_min", .. }));
    }

    #[test]
    fn candidate_debug_hides_password() {
        let candidate = VaultCandidate {
            server: "https://vault.example".into(),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let rendered = format!("{candidate:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn clipboard_command_falls_back_per_session_type() {
        let clipboard = ClipboardConfig::default();
        assert_eq!(clipboard.command_for(true), CommandLine::parse("wl-copy"));
        assert_eq!(clipboard.command_for(false), CommandLine::parse("xsel -b -i"));
    }

    #[test]
    fn notes_editor_resolution() {
        let mut edit = EditConfig::default();
        assert_eq!(edit.notes_editor(None), CommandLine::parse("xterm -e vim"));
        assert_eq!(edit.notes_editor(Some("nano -w")), CommandLine::parse("xterm -e nano -w"));

        edit.editor = Some(CommandLine::parse("emacs -nw"));
        assert_eq!(edit.notes_editor(Some("nano")), CommandLine::parse("xterm -e emacs -nw"));

        edit.gui_editor = Some(CommandLine::parse("gvim -f"));
        assert_eq!(edit.notes_editor(None), CommandLine::parse("gvim -f"));
    }

    #[test]
    fn default_presets_and_custom_sets() {
        let config = Config::from_yaml_str("edit:\n  password_chars:\n    symbols: '!@#'\n")
            .expect("parse");
        let presets = config.edit.password_presets();
        let names: Vec<&str> = presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Letters+Digits+Punctuation", "Letters+Digits", "Letters", "Digits", "Symbols"]
        );
        assert_eq!(presets[3].sets, vec!["0123456789"]);
        assert_eq!(presets[4].sets, vec!["!@#"]);
    }

    #[test]
    fn configured_presets_replace_builtins() {
        let config = Config::from_yaml_str(
            "edit:\n  password_char_presets:\n    Hex: [digits, hex]\n  password_chars:\n    hex: abcdef\n",
        )
        .expect("parse");
        assert_eq!(
            config.edit.password_presets(),
            vec![PasswordPreset {
                name: "Hex".to_string(),
                sets: vec!["0123456789".to_string(), "abcdef".to_string()],
            }]
        );
    }

    #[rstest]
    #[case("edit:\n  password_char_presets:\n    Odd: [nope]\n", "edit.password_char_presets")]
    #[case("edit:\n  password_chars:\n    blank: ''\n", "edit.password_chars")]
    #[case("edit:\n  terminal: []\n", "edit.terminal")]
    fn bad_edit_settings_are_rejected(#[case] yaml: &str, #[case] expected: &str) {
        match Config::from_yaml_str(yaml) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected invalid {expected}, got {other:?}"),
        }
    }
}
