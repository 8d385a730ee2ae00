//! PATH-based executable lookup with fallback locations.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// System fallback paths to check if the executable is not found in PATH.
const FALLBACK_PATHS: &[&str] = &["/usr/local/bin", "/usr/bin", "/snap/bin"];

/// Per-user install locations, relative to home. Freshly provisioned tools
/// land here before the shell profile puts them on PATH.
const HOME_FALLBACKS: &[&str] = &[".local/bin", "bin", ".cargo/bin", ".sdkman/candidates/java/current/bin"];

/// Find an executable by name.
///
/// `search_path` is the `PATH` captured in the host facts; the process
/// environment is not consulted. If the lookup fails, common system and
/// per-user locations under `home` are checked.
///
/// # Example
///
/// ```rust
/// use workstation_provision::probe::find_executable;
/// use std::path::Path;
///
/// let found = find_executable("sh", Some("/bin:/usr/bin".as_ref()), Path::new("/nonexistent"));
/// assert!(found.is_some());
/// ```
pub fn find_executable(name: &str, search_path: Option<&OsStr>, home: &Path) -> Option<PathBuf> {
    // Primary: PATH lookup via which crate
    if let Some(paths) = search_path {
        if let Ok(path) = which::which_in(name, Some(paths), home) {
            return Some(path);
        }
    }

    // Fallback: common system locations not always in PATH
    for dir in FALLBACK_PATHS {
        let path = PathBuf::from(dir).join(name);
        if is_executable_file(&path) {
            return Some(path);
        }
    }

    for dir in HOME_FALLBACKS {
        let path = home.join(dir).join(name);
        if is_executable_file(&path) {
            return Some(path);
        }
    }

    None
}

fn is_executable_file(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_common_executable() {
        // sh should exist on any Linux system
        let result = find_executable("sh", Some(OsStr::new("/bin:/usr/bin")), Path::new("/"));
        assert!(result.is_some());
        assert!(result.unwrap().exists());
    }

    #[test]
    fn test_find_nonexistent_executable() {
        let result = find_executable(
            "definitely_not_a_real_executable_12345",
            Some(OsStr::new("/bin:/usr/bin")),
            Path::new("/nonexistent"),
        );
        assert!(result.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_home_fallback() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempfile::tempdir().unwrap();
        let bin = home.path().join(".local/bin");
        std::fs::create_dir_all(&bin).unwrap();
        let tool = bin.join("provision-test-tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = find_executable("provision-test-tool", None, home.path());
        assert_eq!(found, Some(tool));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_ignored() {
        let home = tempfile::tempdir().unwrap();
        let bin = home.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("notes"), "plain file").unwrap();

        assert!(find_executable("notes", None, home.path()).is_none());
    }
}
