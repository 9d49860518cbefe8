//! Menu program invocation and passphrase prompts.
//!
//! | Program | Prompt / lines        | Hidden input          |
//! |---------|-----------------------|-----------------------|
//! | dmenu   | `-p P -l N`           | `-nb C -nf C`         |
//! | rofi    | `-dmenu -p P -l N`    | `-password`           |
//! | wofi    | `--dmenu -p P -L N`   | `-P`                  |
//! | bemenu  | `-p P -l N`           | `-x`                  |
//! | tofi    | `--prompt-text P`     | `--hide-input=true`   |
//! | fuzzel  | `--dmenu -p P -l N`   | `--password`          |

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bwm_core::{CommandLine, MenuConfig};
use zeroize::Zeroizing;

use crate::error::{io_err, MenuError};

/// A line-based chooser. `None` means the user cancelled.
pub trait Menu {
    fn select(
        &self,
        prompt: &str,
        lines: &[String],
        obscure: bool,
    ) -> Result<Option<String>, MenuError>;

    /// Show an error message the user has to dismiss.
    fn error(&self, message: &str) -> Result<(), MenuError> {
        tracing::warn!(message, "menu error shown");
        self.select(&format!("Error: {message}"), &[String::new()], false)
            .map(drop)
    }

    /// Ask for a secret with hidden input.
    fn passphrase(&self, prompt: &str) -> Result<Option<Zeroizing<String>>, MenuError> {
        Ok(self.select(prompt, &[], true)?.map(Zeroizing::new))
    }

    /// Handle for tearing down an open prompt from another thread.
    fn gate(&self) -> Option<MenuGate> {
        None
    }
}

/// Tracks the menu or pinentry process currently on screen. Once closed,
/// the running process is killed and every later prompt reads as a cancel.
#[derive(Debug, Clone, Default)]
pub struct MenuGate(Arc<GateState>);

#[derive(Debug, Default)]
struct GateState {
    closed: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl MenuGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the open prompt, if any, and refuse new ones.
    pub fn close(&self) {
        self.0.closed.store(true, Ordering::SeqCst);
        let mut slot = self.0.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(child) = slot.as_mut() {
            if let Err(err) = child.kill() {
                tracing::debug!(error = %err, "menu already gone");
            } else {
                tracing::info!(pid = child.id(), "menu closed for shutdown");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    /// Park the running child here so [`MenuGate::close`] can reach it.
    fn hold(&self, mut child: Child) {
        let mut slot = self.0.child.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            let _ = child.kill();
        }
        *slot = Some(child);
    }

    fn release(&self) -> Option<Child> {
        self.0
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuFlavor {
    Dmenu,
    Rofi,
    Wofi,
    Bemenu,
    Tofi,
    Fuzzel,
    Other,
}

impl MenuFlavor {
    pub fn detect(program: &str) -> Self {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        match name {
            "dmenu" | "dmenu-wl" => MenuFlavor::Dmenu,
            "rofi" => MenuFlavor::Rofi,
            "wofi" => MenuFlavor::Wofi,
            "bemenu" => MenuFlavor::Bemenu,
            "tofi" => MenuFlavor::Tofi,
            "fuzzel" => MenuFlavor::Fuzzel,
            _ => MenuFlavor::Other,
        }
    }
}

/// Runs the configured dmenu-compatible program once per prompt.
#[derive(Debug, Clone)]
pub struct DmenuMenu {
    command: CommandLine,
    max_lines: usize,
    obscure: bool,
    obscure_color: String,
    pinentry: Option<CommandLine>,
    gate: MenuGate,
}

impl DmenuMenu {
    pub fn new(config: &MenuConfig) -> Self {
        Self {
            command: config.command.clone(),
            max_lines: config.max_lines(),
            obscure: config.obscure,
            obscure_color: config.obscure_color.clone(),
            pinentry: config.pinentry.clone(),
            gate: MenuGate::new(),
        }
    }

    pub fn flavor(&self) -> MenuFlavor {
        MenuFlavor::detect(self.command.program().unwrap_or_default())
    }

    /// Full argument list (after the program) for one prompt.
    pub fn args(&self, prompt: &str, line_count: usize, obscure: bool) -> Vec<String> {
        let base = self.command.args();
        let mut args: Vec<String> = base.to_vec();
        let has = |flag: &str| base.iter().any(|a| a == flag);
        let lines = line_count.min(self.max_lines).to_string();
        let hide = obscure && self.obscure;

        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));
        match self.flavor() {
            MenuFlavor::Dmenu | MenuFlavor::Other => {
                push(&["-p", prompt, "-l", lines.as_str()]);
                if hide {
                    let color = self.obscure_color.as_str();
                    push(&["-nb", color, "-nf", color]);
                }
            }
            MenuFlavor::Rofi => {
                if !has("-dmenu") {
                    push(&["-dmenu"]);
                }
                push(&["-p", prompt, "-l", lines.as_str()]);
                if hide {
                    push(&["-password"]);
                }
            }
            MenuFlavor::Wofi => {
                if !has("--dmenu") && !has("-d") {
                    push(&["--dmenu"]);
                }
                push(&["-p", prompt, "-L", lines.as_str()]);
                if hide {
                    push(&["-P"]);
                }
            }
            MenuFlavor::Bemenu => {
                push(&["-p", prompt, "-l", lines.as_str()]);
                if hide {
                    push(&["-x"]);
                }
            }
            MenuFlavor::Tofi => {
                let prompt_text = format!("--prompt-text={prompt}");
                push(&[prompt_text.as_str()]);
                if hide {
                    push(&["--hide-input=true"]);
                }
            }
            MenuFlavor::Fuzzel => {
                if !has("--dmenu") && !has("-d") {
                    push(&["--dmenu"]);
                }
                push(&["-p", prompt, "-l", lines.as_str()]);
                if hide {
                    push(&["--password"]);
                }
            }
        }
        args
    }

    fn ask_pinentry(
        &self,
        pinentry: &CommandLine,
        prompt: &str,
    ) -> Result<Option<Zeroizing<String>>, MenuError> {
        let program = pinentry.program().ok_or(MenuError::NoCommand)?;
        let script = format!("setdesc {prompt}\ngetpin\n");
        let stdout = run(&self.gate, program, pinentry.args(), &script)?;
        Ok(parse_pinentry(&stdout))
    }
}

impl Menu for DmenuMenu {
    fn select(
        &self,
        prompt: &str,
        lines: &[String],
        obscure: bool,
    ) -> Result<Option<String>, MenuError> {
        let program = self.command.program().ok_or(MenuError::NoCommand)?;
        let args = self.args(prompt, lines.len(), obscure);
        let mut input = lines.join("\n");
        if !input.is_empty() {
            input.push('\n');
        }

        let stdout = run(&self.gate, program, &args, &input)?;
        let choice = stdout.trim_end_matches(['\n', '\r']);
        if choice.is_empty() {
            return Ok(None);
        }
        Ok(Some(choice.to_string()))
    }

    fn passphrase(&self, prompt: &str) -> Result<Option<Zeroizing<String>>, MenuError> {
        match &self.pinentry {
            Some(pinentry) => self.ask_pinentry(pinentry, prompt),
            None => Ok(self.select(prompt, &[], true)?.map(Zeroizing::new)),
        }
    }

    fn gate(&self) -> Option<MenuGate> {
        Some(self.gate.clone())
    }
}

/// Feed `input` on stdin and collect stdout. A non-zero exit is a cancel,
/// which dmenu-style programs signal with empty output. So is a closed
/// gate, before or while the program runs.
fn run(
    gate: &MenuGate,
    program: &str,
    args: &[String],
    input: &str,
) -> Result<Zeroizing<String>, MenuError> {
    let mut stdout = Zeroizing::new(String::new());
    if gate.is_closed() {
        tracing::debug!(program, "menu gate closed, not prompting");
        return Ok(stdout);
    }

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| io_err(program, e))?;
    let stdin = child.stdin.take();
    let out = child.stdout.take();
    gate.hold(child);

    if let Some(mut stdin) = stdin {
        // A program that exits without reading all input is not an error.
        if let Err(e) = stdin.write_all(input.as_bytes()) {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                reap(gate, program);
                return Err(io_err(program, e));
            }
        }
    }

    if let Some(mut out) = out {
        if let Err(e) = out.read_to_string(&mut stdout) {
            reap(gate, program);
            return Err(io_err(program, e));
        }
    }
    let Some(mut child) = gate.release() else {
        stdout.clear();
        return Ok(stdout);
    };
    let status = child.wait().map_err(|e| io_err(program, e))?;
    if !status.success() || gate.is_closed() {
        tracing::debug!(program, %status, "menu cancelled");
        stdout.clear();
    }
    Ok(stdout)
}

/// Kill and wait for a child abandoned on an I/O error.
fn reap(gate: &MenuGate, program: &str) {
    if let Some(mut child) = gate.release() {
        let _ = child.kill();
        if let Err(err) = child.wait() {
            tracing::debug!(program, error = %err, "could not reap menu");
        }
    }
}

/// Extract the PIN from an Assuan `getpin` exchange. `ERR` means cancelled.
pub fn parse_pinentry(output: &str) -> Option<Zeroizing<String>> {
    let data = output.lines().find_map(|line| line.strip_prefix("D "))?;
    Some(Zeroizing::new(unescape_assuan(data)))
}

fn unescape_assuan(data: &str) -> String {
    let bytes = data.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = data.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
