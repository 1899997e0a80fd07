//! The fixed set of languages the proxy can bridge.

use std::fmt;

/// Languages with a known server. Unknown endpoints are refused before the
/// WebSocket upgrade completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    TypeScript,
    Html,
    Css,
    Json,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::TypeScript,
        Language::Html,
        Language::Css,
        Language::Json,
    ];

    /// Name used in config keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::Html => "html",
            Language::Css => "css",
            Language::Json => "json",
        }
    }

    /// Map an endpoint path to a language.
    ///
    /// `/javascript` and `/typescript` share the TypeScript server.
    pub fn from_endpoint_path(path: &str) -> Option<Language> {
        match path {
            "/python" => Some(Language::Python),
            "/javascript" | "/typescript" => Some(Language::TypeScript),
            "/html" => Some(Language::Html),
            "/css" => Some(Language::Css),
            "/json" => Some(Language::Json),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
