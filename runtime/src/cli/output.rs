//! Output mode flags and terminal helpers shared by all subcommands.
//!
//! `main` exports the global flags as `ZONEATLAS_*` environment variables
//! so any module can check them without threading a context through.

use std::io::IsTerminal;

pub fn is_json() -> bool {
    flag("ZONEATLAS_JSON")
}

pub fn is_quiet() -> bool {
    flag("ZONEATLAS_QUIET")
}

pub fn is_verbose() -> bool {
    flag("ZONEATLAS_VERBOSE")
}

fn flag(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| v == "1")
}

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  failed to serialize output: {e}"),
    }
}

/// Status symbols, colored when stderr is a terminal.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        let color = !flag("ZONEATLAS_NO_COLOR")
            && std::env::var_os("NO_COLOR").is_none()
            && std::io::stderr().is_terminal();
        Self { color }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "[OK]"
        }
    }

    pub fn fail_sym(&self) -> &'static str {
        if self.color {
            "\x1b[31m✗\x1b[0m"
        } else {
            "[!!]"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "[??]"
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[2m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
