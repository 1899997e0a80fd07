//! Language-server spawn table.
//!
//! Each language maps to a launch command: a `[lsp.servers.<language>]`
//! config entry when present, otherwise a well-known default resolved
//! against `PATH`. Resolution happens before any spawn, so a missing
//! binary never leaves a half-built connection behind.

use std::path::{Path, PathBuf};

use keel_config::LspConfig;

use crate::language::Language;
use crate::ProxyError;

/// A fully resolved language-server launch command.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Well-known default command per language.
fn default_spec(language: Language) -> (&'static str, &'static [&'static str]) {
    match language {
        Language::Python => ("pylsp", &[]),
        Language::TypeScript => ("typescript-language-server", &["--stdio"]),
        Language::Html => ("vscode-html-language-server", &["--stdio"]),
        Language::Css => ("vscode-css-language-server", &["--stdio"]),
        Language::Json => ("vscode-json-language-server", &["--stdio"]),
    }
}

/// Resolve the launch command for a language.
pub fn resolve(language: Language, config: &LspConfig) -> Result<ServerCommand, ProxyError> {
    let (command, args) = match config.servers.get(language.as_str()) {
        Some(spec) => (spec.command.clone(), spec.args.clone()),
        None => {
            let (command, args) = default_spec(language);
            (
                command.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            )
        }
    };

    let program = locate(&command).ok_or(ProxyError::ServerNotFound {
        language: language.as_str(),
        command: command.clone(),
    })?;

    Ok(ServerCommand { program, args })
}

/// Locate a program: explicit paths are checked directly, bare names are
/// searched on `PATH`.
fn locate(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}
