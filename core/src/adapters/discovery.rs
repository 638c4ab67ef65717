//! Locating the external binaries the subprocess adapters run.

use std::path::{Path, PathBuf};

/// Well-known kubectl install locations checked after `$PATH`.
const KUBECTL_PATHS: &[&str] = &[
    "/opt/homebrew/bin/kubectl", // Apple Silicon
    "/usr/local/bin/kubectl",    // Intel Mac / Homebrew
    "/usr/bin/kubectl",          // System
    "/snap/bin/kubectl",         // Snap
];

/// Well-known helm install locations checked after `$PATH`.
const HELM_PATHS: &[&str] = &[
    "/opt/homebrew/bin/helm",
    "/usr/local/bin/helm",
    "/usr/bin/helm",
    "/snap/bin/helm",
];

/// Finds kubectl, preferring an explicit override, then `$PATH`, then well-known paths.
pub fn find_kubectl(override_path: Option<&Path>) -> Option<PathBuf> {
    find_binary("kubectl", override_path, KUBECTL_PATHS)
}

/// Finds helm the same way as kubectl.
pub fn find_helm(override_path: Option<&Path>) -> Option<PathBuf> {
    find_binary("helm", override_path, HELM_PATHS)
}

fn find_binary(name: &str, override_path: Option<&Path>, known: &[&str]) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return path.exists().then(|| path.to_path_buf());
    }

    find_in_path(name).or_else(|| find_executable(known))
}

/// Searches `$PATH` for an executable with the given name.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Finds an executable in the given paths.
fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    paths.iter().map(PathBuf::from).find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_executable() {
        // Test with a path that should exist on most systems
        let result = find_executable(&["/bin/sh", "/usr/bin/sh"]);
        assert!(result.is_some());

        // Test with a path that shouldn't exist
        let result = find_executable(&["/nonexistent/path"]);
        assert!(result.is_none());
    }

    #[test]
    fn test_override_must_exist() {
        assert_eq!(find_kubectl(Some(Path::new("/nonexistent/kubectl"))), None);
        assert_eq!(find_helm(Some(Path::new("/nonexistent/helm"))), None);
        assert_eq!(
            find_kubectl(Some(Path::new("/bin/sh"))),
            Some(PathBuf::from("/bin/sh"))
        );
    }

    #[test]
    fn test_find_in_path() {
        assert!(find_in_path("sh").is_some());
        assert!(find_in_path("definitely-not-a-real-binary-name").is_none());
    }
}
