//! Dependency manifest (`requirements.txt`)

use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "requirements.txt";

/// Packages the wrapper cannot run without
pub const ESSENTIAL_PACKAGES: &[&str] = &["flask>=2.0.0", "gunicorn>=20.0.0"];

pub const OBSERVABILITY_PACKAGE: &str = "weave";

/// Finds the user's manifest: an explicit path, else `requirements.txt` beside the source
pub fn locate_manifest(explicit: Option<&Path>, source_file: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    source_file
        .parent()
        .map(|dir| dir.join(MANIFEST_FILE))
        .filter(|p| p.is_file())
}

/// Normalized distribution name of one requirement line, if it names a package
///
/// Comparison ignores case, version specifiers, extras and `-` vs `_`.
pub fn package_name(line: &str) -> Option<String> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() || line.starts_with('-') {
        return None;
    }
    let end = line
        .find(|c: char| "<>=!~;[ @".contains(c))
        .unwrap_or(line.len());
    let name = line[..end].trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase().replace('_', "-"))
}

/// Builds the final manifest
///
/// A user manifest is kept verbatim and the essential packages it lacks are appended;
/// without one the essentials form the whole manifest.
pub fn merge(user_manifest: Option<&str>, observability: bool) -> String {
    let mut required: Vec<&str> = ESSENTIAL_PACKAGES.to_vec();
    if observability {
        required.push(OBSERVABILITY_PACKAGE);
    }

    let Some(user) = user_manifest else {
        let mut manifest = required.join("\n");
        manifest.push('\n');
        return manifest;
    };

    let present: Vec<String> = user.lines().filter_map(package_name).collect();
    let mut manifest = user.trim_end().to_string();
    for requirement in required {
        let name = package_name(requirement).unwrap_or_default();
        if !present.contains(&name) {
            if !manifest.is_empty() {
                manifest.push('\n');
            }
            manifest.push_str(requirement);
        }
    }
    manifest.push('\n');
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        assert_eq!(merge(None, false), "flask>=2.0.0\ngunicorn>=20.0.0\n");
        assert_eq!(merge(None, true), "flask>=2.0.0\ngunicorn>=20.0.0\nweave\n");
    }

    #[test]
    fn test_merge_keeps_user_pins() {
        let merged = merge(Some("Flask==3.0.0\nrequests>=2\n"), false);
        assert_eq!(merged, "Flask==3.0.0\nrequests>=2\ngunicorn>=20.0.0\n");
    }

    #[test]
    fn test_merge_empty_user_manifest() {
        assert_eq!(merge(Some(""), false), "flask>=2.0.0\ngunicorn>=20.0.0\n");
    }

    #[test]
    fn test_package_name_normalization() {
        assert_eq!(package_name("Some_Package[extra]>=1.0"), Some("some-package".to_string()));
        assert_eq!(package_name("weave ; python_version>'3.8'"), Some("weave".to_string()));
        assert_eq!(package_name("# comment"), None);
        assert_eq!(package_name("-r other.txt"), None);
        assert_eq!(package_name("pkg @ https://example.com/pkg.whl"), Some("pkg".to_string()));
    }

    #[test]
    fn test_weave_not_duplicated() {
        let merged = merge(Some("weave==0.50\nflask\ngunicorn\n"), true);
        assert_eq!(merged, "weave==0.50\nflask\ngunicorn\n");
    }
}
