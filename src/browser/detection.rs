//! Locating a Chrome/Chromium binary
//!
//! The engine never installs a browser. An explicitly named binary
//! (`--chrome-path` or `CHROME_PATH`) is trusted and must be runnable;
//! otherwise the PATH is walked for the usual binary names before the
//! platform's install directories are tried. PATH wins over install
//! directories so the audit drives the same browser the user's shell
//! would start.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{AuditError, Result};

/// Binary names worth probing, most specific first.
const BINARY_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome-stable",
    "google-chrome",
    "chrome",
];

/// A usable browser binary and where it came from.
#[derive(Debug, Clone)]
pub struct ChromeBinary {
    pub path: PathBuf,
    /// `--chrome-path`, `CHROME_PATH`, `PATH`, or `install-dir`
    pub origin: &'static str,
}

impl ChromeBinary {
    /// Version reported by `--version`, when the binary answers.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.path).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_version_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Pull the dotted version number out of lines like
/// "Chromium 121.0.6167.85 Fedora Project" or "Google Chrome 122.0.6261.94".
fn parse_version_output(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .find(|token| {
            token.starts_with(|c: char| c.is_ascii_digit()) && token.split('.').count() >= 3
        })
        .map(str::to_string)
}

/// Locate the browser the run should use.
pub fn locate_chrome(explicit: Option<&str>) -> Result<ChromeBinary> {
    if let Some(raw) = explicit {
        return claimed(PathBuf::from(raw), "--chrome-path");
    }
    if let Some(raw) = env::var_os("CHROME_PATH") {
        return claimed(PathBuf::from(raw), "CHROME_PATH");
    }

    if let Some(path) = BINARY_NAMES.iter().find_map(|name| search_path(name)) {
        debug!("Found Chrome on PATH: {:?}", path);
        return Ok(ChromeBinary {
            path,
            origin: "PATH",
        });
    }

    if let Some(path) = install_dirs().into_iter().find(|p| is_runnable(p)) {
        debug!("Found Chrome in install directory: {:?}", path);
        return Ok(ChromeBinary {
            path,
            origin: "install-dir",
        });
    }

    Err(AuditError::ChromeNotFound)
}

/// An explicitly named binary either works or the run stops. Falling back
/// silently would audit with a different browser than the one asked for.
fn claimed(path: PathBuf, origin: &'static str) -> Result<ChromeBinary> {
    if !path.is_file() {
        return Err(AuditError::FileError {
            path,
            reason: format!("no browser binary at the path given via {}", origin),
        });
    }
    if !has_exec_bit(&path) {
        return Err(AuditError::ChromeNotExecutable { path });
    }
    Ok(ChromeBinary { path, origin })
}

/// Walk $PATH ourselves instead of shelling out to `which`.
fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_runnable(candidate))
}

/// Per-platform install locations, checked only after PATH comes up empty.
fn install_dirs() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if cfg!(target_os = "linux") {
        for dir in ["/usr/bin", "/usr/local/bin", "/snap/bin", "/opt/google/chrome"] {
            for name in BINARY_NAMES {
                candidates.push(Path::new(dir).join(name));
            }
        }
        candidates.push(PathBuf::from(
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        ));
    } else if cfg!(target_os = "macos") {
        for app in ["Google Chrome", "Chromium"] {
            candidates.push(PathBuf::from(format!(
                "/Applications/{app}.app/Contents/MacOS/{app}"
            )));
        }
    } else if cfg!(target_os = "windows") {
        for var in ["ProgramFiles", "ProgramFiles(x86)", "LocalAppData"] {
            if let Some(base) = env::var_os(var) {
                candidates
                    .push(PathBuf::from(base).join(r"Google\Chrome\Application\chrome.exe"));
            }
        }
    }

    candidates
}

fn is_runnable(path: &Path) -> bool {
    path.is_file() && has_exec_bit(path)
}

#[cfg(unix)]
fn has_exec_bit(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn has_exec_bit(_path: &Path) -> bool {
    true
}
