//! Keystroke-injection backends and the shared dispatch loop.

use std::io;
use std::process::{Command, Stdio};
use std::time::Duration;

use bwm_core::{TypeLibrary, VaultEntryView};

use crate::error::AutotypeError;
use crate::keys::{KeyTable, NativeKey, UINPUT_KEYS, WTYPE_KEYS, XDOTOOL_KEYS, YDOTOOL_KEYS};
use crate::resolver::{Action, Resolver};
use crate::tokenizer::tokenize;

/// The closed set of injection mechanisms. Each bundles its key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Uinput,
    Xdotool,
    Ydotool,
    Wtype,
}

impl Backend {
    pub fn from_library(library: TypeLibrary) -> Self {
        match library {
            TypeLibrary::Uinput => Backend::Uinput,
            TypeLibrary::Xdotool => Backend::Xdotool,
            TypeLibrary::Ydotool => Backend::Ydotool,
            TypeLibrary::Wtype => Backend::Wtype,
        }
    }

    pub fn name(self) -> &'static str {
        self.key_table().backend
    }

    pub fn key_table(self) -> &'static KeyTable {
        match self {
            Backend::Uinput => &UINPUT_KEYS,
            Backend::Xdotool => &XDOTOOL_KEYS,
            Backend::Ydotool => &YDOTOOL_KEYS,
            Backend::Wtype => &WTYPE_KEYS,
        }
    }

    /// External program this backend runs per token, if any.
    pub fn program(self) -> Option<&'static str> {
        match self {
            Backend::Uinput => None,
            Backend::Xdotool => Some("xdotool"),
            Backend::Ydotool => Some("ydotool"),
            Backend::Wtype => Some("wtype"),
        }
    }

    /// Startup check: the program is on `PATH`, or `/dev/uinput` exists.
    pub fn check_available(self) -> Result<(), AutotypeError> {
        match self.program() {
            Some(program) => which::which(program).map(drop).map_err(|e| {
                AutotypeError::BackendUnavailable {
                    backend: self.name(),
                    reason: format!("{program} not found on PATH: {e}"),
                }
            }),
            None => uinput_available(),
        }
    }

    /// Open an injector for one dispatch.
    pub fn injector(self) -> Result<Box<dyn KeyInjector>, AutotypeError> {
        match self {
            #[cfg(target_os = "linux")]
            Backend::Uinput => Ok(Box::new(crate::uinput::UinputInjector::open()?)),
            #[cfg(not(target_os = "linux"))]
            Backend::Uinput => Err(AutotypeError::BackendUnavailable {
                backend: "uinput",
                reason: "only supported on Linux".to_string(),
            }),
            other => Ok(Box::new(ProcessInjector::new(other))),
        }
    }
}

#[cfg(target_os = "linux")]
fn uinput_available() -> Result<(), AutotypeError> {
    std::fs::OpenOptions::new()
        .write(true)
        .open("/dev/uinput")
        .map(drop)
        .map_err(|e| AutotypeError::BackendUnavailable {
            backend: "uinput",
            reason: format!("/dev/uinput: {e}"),
        })
}

#[cfg(not(target_os = "linux"))]
fn uinput_available() -> Result<(), AutotypeError> {
    Err(AutotypeError::BackendUnavailable {
        backend: "uinput",
        reason: "only supported on Linux".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Injector trait + dispatch loop
// ---------------------------------------------------------------------------

/// How one backend physically issues instructions.
pub trait KeyInjector {
    fn backend(&self) -> &'static str;

    fn type_text(&mut self, text: &str) -> Result<(), AutotypeError>;

    fn tap_key(&mut self, key: NativeKey) -> Result<(), AutotypeError>;

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Tokenize, resolve and execute `template` for one entry.
///
/// Tokens are pulled lazily, so the first tokenize, resolve or injection
/// error stops everything after it. Output already issued is not undone.
/// Returns the number of actions executed.
pub fn dispatch(
    template: &str,
    entry: VaultEntryView<'_>,
    table: &'static KeyTable,
    injector: &mut dyn KeyInjector,
) -> Result<usize, AutotypeError> {
    let resolver = Resolver::new(entry, table);
    let mut executed = 0;
    let mut enter_doubled = false;

    for token in tokenize(template) {
        match resolver.resolve(token?)? {
            Action::Type(text) => {
                if !text.is_empty() {
                    injector.type_text(&text)?;
                }
            }
            Action::Tap { key, native } => {
                // Quirk: the first Enter of every sequence is tapped twice.
                if key.is_enter() && !enter_doubled {
                    enter_doubled = true;
                    injector.tap_key(native)?;
                }
                injector.tap_key(native)?;
            }
            Action::Delay(duration) => injector.pause(duration),
        }
        executed += 1;
    }

    tracing::debug!(backend = injector.backend(), executed, "autotype dispatch finished");
    Ok(executed)
}

// ---------------------------------------------------------------------------
// External-process injectors (xdotool, ydotool, wtype)
// ---------------------------------------------------------------------------

/// Runs the backend's program once per instruction.
#[derive(Debug)]
pub struct ProcessInjector {
    backend: Backend,
    program: String,
}

impl ProcessInjector {
    fn new(backend: Backend) -> Self {
        Self {
            backend,
            program: backend.program().unwrap_or_default().to_string(),
        }
    }

    /// Use a specific executable instead of the one found on `PATH`.
    pub fn with_program(backend: Backend, program: impl Into<String>) -> Self {
        Self {
            backend,
            program: program.into(),
        }
    }

    fn type_args(&self, text: &str) -> Vec<String> {
        let mut args = match self.backend {
            Backend::Wtype => vec!["--".to_string()],
            _ => vec!["type".to_string(), "--".to_string()],
        };
        args.push(text.to_string());
        args
    }

    fn key_args(&self, key: NativeKey) -> Result<Vec<String>, AutotypeError> {
        let args = match (self.backend, key) {
            (Backend::Wtype, NativeKey::Key(name)) => vec!["-k", name],
            (Backend::Wtype, NativeKey::Modifier(name)) => vec!["-M", name, "-m", name],
            (_, NativeKey::Key(name)) | (_, NativeKey::Modifier(name)) => vec!["key", name],
            (_, NativeKey::Text(text)) => return Ok(self.type_args(text)),
            (_, NativeKey::Code(code)) => {
                return Err(AutotypeError::Injection {
                    backend: self.backend.name(),
                    reason: format!("raw key code {code} cannot be sent by a process backend"),
                })
            }
        };
        Ok(args.into_iter().map(String::from).collect())
    }

    fn run(&self, args: &[String]) -> Result<(), AutotypeError> {
        let backend = self.backend.name();
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => AutotypeError::BackendUnavailable {
                    backend,
                    reason: format!("{} not found", self.program),
                },
                _ => AutotypeError::Injection {
                    backend,
                    reason: e.to_string(),
                },
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutotypeError::Injection {
                backend,
                reason: format!("{} ({})", stderr.trim(), output.status),
            });
        }
        Ok(())
    }
}

impl KeyInjector for ProcessInjector {
    fn backend(&self) -> &'static str {
        self.backend.name()
    }

    fn type_text(&mut self, text: &str) -> Result<(), AutotypeError> {
        self.run(&self.type_args(text))
    }

    fn tap_key(&mut self, key: NativeKey) -> Result<(), AutotypeError> {
        let args = self.key_args(key)?;
        self.run(&args)
    }
}
