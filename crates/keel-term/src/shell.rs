//! Shell detection and the platform shell catalog.
//!
//! Detects the user's default shell from environment variables, provides
//! appropriate command-line arguments for login sessions, and enumerates
//! the shells known to exist on the current platform.

use std::path::Path;

use serde::Serialize;

// =============================================================================
// DEFAULT SHELL
// =============================================================================

/// Detect the user's default shell.
///
/// - On Unix: reads the `SHELL` environment variable, falling back to `/bin/sh`.
/// - On Windows: reads the `COMSPEC` environment variable, falling back to
///   `powershell.exe`.
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }

    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "powershell.exe".to_string())
    }

    #[cfg(not(any(unix, windows)))]
    {
        "/bin/sh".to_string()
    }
}

/// Return the appropriate command-line arguments for the given shell binary.
///
/// Interactive login flags are added for shells that support them.
pub fn shell_args(shell: &str) -> Vec<String> {
    if shell.ends_with("zsh") || shell.ends_with("bash") {
        vec!["--login".to_string()]
    } else {
        vec![]
    }
}

// =============================================================================
// SHELL CATALOG
// =============================================================================

/// One entry in the shell catalog presented to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ShellInfo {
    pub name: String,
    pub path: String,
    pub icon: String,
}

impl ShellInfo {
    fn new(name: &str, path: &str, icon: &str) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            icon: icon.into(),
        }
    }
}

/// Enumerate shells available on this machine.
///
/// OS-builtin shells are always listed; optional shells only appear when
/// their conventional install path exists. Purely informational, no side
/// effects.
pub fn available_shells() -> Vec<ShellInfo> {
    #[cfg(windows)]
    {
        let mut shells = vec![
            ShellInfo::new("PowerShell", "powershell.exe", "powershell"),
            ShellInfo::new("Command Prompt", "cmd.exe", "cmd"),
            ShellInfo::new("WSL", "wsl.exe", "linux"),
        ];
        let git_bash = "C:\\Program Files\\Git\\bin\\bash.exe";
        if Path::new(git_bash).exists() {
            shells.push(ShellInfo::new("Git Bash", git_bash, "git"));
        }
        shells
    }

    #[cfg(not(windows))]
    {
        let mut shells = vec![ShellInfo::new("sh", "/bin/sh", "sh")];
        for (name, path, icon) in [
            ("Bash", "/bin/bash", "bash"),
            ("Zsh", "/bin/zsh", "zsh"),
            ("Fish", "/usr/bin/fish", "fish"),
        ] {
            if Path::new(path).exists() {
                shells.push(ShellInfo::new(name, path, icon));
            }
        }
        shells
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shell_returns_non_empty() {
        assert!(!default_shell().is_empty());
    }

    #[test]
    fn shell_args_for_bash_and_zsh() {
        assert_eq!(shell_args("/bin/bash"), vec!["--login".to_string()]);
        assert_eq!(shell_args("/bin/zsh"), vec!["--login".to_string()]);
    }

    #[test]
    fn shell_args_for_other_shells_is_empty() {
        assert!(shell_args("/usr/bin/fish").is_empty());
        assert!(shell_args("/bin/sh").is_empty());
        assert!(shell_args("powershell.exe").is_empty());
    }

    #[test]
    fn available_shells_lists_the_builtin() {
        let shells = available_shells();
        assert!(!shells.is_empty());
        #[cfg(unix)]
        assert!(shells.iter().any(|s| s.path == "/bin/sh"));
    }

    #[test]
    fn available_shells_only_lists_existing_optional_shells() {
        for shell in available_shells() {
            #[cfg(unix)]
            assert!(
                Path::new(&shell.path).exists(),
                "catalog listed missing shell {}",
                shell.path
            );
            let _ = shell;
        }
    }

    #[test]
    fn shell_info_serializes_with_expected_fields() {
        let info = ShellInfo::new("Bash", "/bin/bash", "bash");
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"name\":\"Bash\""));
        assert!(json.contains("\"path\":\"/bin/bash\""));
        assert!(json.contains("\"icon\":\"bash\""));
    }
}
