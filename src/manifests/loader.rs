//! Manifest loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::{Dialect, ExtractError};

/// Raw text of one manifest file.
#[derive(Debug, Clone)]
pub struct RawManifest {
    /// Path used to read the file.
    pub path: PathBuf,
    /// Path reported in the inventory (relative to the scan root when possible).
    pub display_path: PathBuf,
    pub dialect: Dialect,
    pub text: String,
}

/// A scan root (directory or single manifest) and the prefix its manifests
/// are reported under.
#[derive(Debug, Clone)]
pub struct ScanRoot {
    path: PathBuf,
    label: Option<PathBuf>,
}

impl ScanRoot {
    /// Manifests are reported relative to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: None,
        }
    }

    /// Manifests are reported under the root's directory as given, so files
    /// from several roots of one run stay distinct.
    pub fn labeled(path: impl Into<PathBuf>) -> Self {
        let mut root = Self::new(path);
        let dir = root.dir();
        let label = (!dir.as_os_str().is_empty() && dir != Path::new(".")).then(|| dir.to_path_buf());
        root.label = label;
        root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory manifests are found under.
    pub fn dir(&self) -> &Path {
        if self.path.is_file() {
            self.path.parent().unwrap_or(&self.path)
        } else {
            &self.path
        }
    }

    /// Path as reported: relative to the root (behind the label, if any), or
    /// the path itself when outside it.
    pub fn display_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(self.dir()) {
            Ok(rel) if !rel.as_os_str().is_empty() => match &self.label {
                Some(label) => label.join(rel),
                None => rel.to_path_buf(),
            },
            _ => path.to_path_buf(),
        }
    }

    /// `file_name` in the manifest's directory or the nearest ancestor within
    /// the root, for lockfiles and workspace manifests.
    pub fn find_upwards(&self, manifest: &Path, file_name: &str) -> Option<PathBuf> {
        let root_dir = self.dir();
        let mut dir = manifest.parent().filter(|p| p.starts_with(root_dir));
        while let Some(current) = dir {
            let candidate = current.join(file_name);
            if candidate.is_file() {
                return Some(candidate);
            }
            if current == root_dir {
                break;
            }
            dir = current.parent().filter(|p| p.starts_with(root_dir));
        }
        None
    }
}

/// Read a manifest file.
pub fn load_manifest(path: &Path, dialect: Dialect, root: &ScanRoot) -> Result<RawManifest, ExtractError> {
    let text = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(RawManifest {
        path: path.to_path_buf(),
        display_path: root.display_path(path),
        dialect,
        text,
    })
}

impl RawManifest {
    /// First line at or after `from` (1-based) whose trimmed text satisfies `pred`.
    pub fn find_line(&self, from: usize, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.text
            .lines()
            .enumerate()
            .skip(from.saturating_sub(1))
            .find(|(_, line)| pred(line.trim()))
            .map(|(idx, _)| idx + 1)
    }
}

/// 1-based line of a byte offset.
pub fn line_at(content: &str, pos: usize) -> usize {
    let end = pos.min(content.len());
    content.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Load `key=value` properties from the dialect's properties file next to the
/// manifest, layered over the one at the scan root.
pub fn load_properties(manifest: &RawManifest, root: &ScanRoot) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    let Some(file_name) = manifest.dialect.properties_file() else {
        return props;
    };

    let root_dir = root.dir();
    let mut dirs = vec![root_dir.to_path_buf()];
    if let Some(parent) = manifest.path.parent()
        && parent != root_dir
    {
        dirs.push(parent.to_path_buf());
    }

    for dir in dirs {
        if let Ok(content) = std::fs::read_to_string(dir.join(file_name)) {
            props.extend(parse_properties(&content));
        }
    }

    props
}

/// Parse a Java-style properties file (`key=value`, `key: value`, `#`/`!` comments).
fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some(idx) = line.find(['=', ':']) else {
            continue;
        };
        let key = line[..idx].trim();
        let value = line[idx + 1..].trim();
        if !key.is_empty() {
            props.insert(key.to_string(), value.to_string());
        }
    }

    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_properties() {
        let props = parse_properties(
            "# versions\nkotlin_version=1.9.22\n! legacy\nokhttp: 4.12.0\n\norg.gradle.jvmargs = -Xmx2g\n",
        );
        assert_eq!(props.get("kotlin_version").unwrap(), "1.9.22");
        assert_eq!(props.get("okhttp").unwrap(), "4.12.0");
        assert_eq!(props.get("org.gradle.jvmargs").unwrap(), "-Xmx2g");
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_load_manifest_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_manifest(
            &tmp.path().join("build.gradle"),
            Dialect::Gradle,
            &ScanRoot::new(tmp.path()),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn test_display_path_relative_to_root() {
        let root = ScanRoot::new("/work/project");
        assert_eq!(
            root.display_path(Path::new("/work/project/app/build.gradle")),
            PathBuf::from("app/build.gradle")
        );
        assert_eq!(
            root.display_path(Path::new("/elsewhere/build.gradle")),
            PathBuf::from("/elsewhere/build.gradle")
        );
    }

    #[test]
    fn test_labeled_roots_stay_distinct() {
        let a = ScanRoot::labeled("services/a");
        let b = ScanRoot::labeled("services/b");
        assert_eq!(
            a.display_path(Path::new("services/a/build.gradle")),
            PathBuf::from("services/a/build.gradle")
        );
        assert_eq!(
            b.display_path(Path::new("services/b/build.gradle")),
            PathBuf::from("services/b/build.gradle")
        );

        // The current directory adds no prefix
        let here = ScanRoot::labeled(".");
        assert_eq!(
            here.display_path(Path::new("./app/build.gradle")),
            PathBuf::from("app/build.gradle")
        );
    }

    #[test]
    fn test_find_upwards_stops_at_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        fs::create_dir_all(root.join("packages/web")).unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();
        fs::write(tmp.path().join("Cargo.lock"), "").unwrap();

        let scan_root = ScanRoot::new(&root);
        let manifest = root.join("packages/web/package.json");
        assert_eq!(
            scan_root.find_upwards(&manifest, "package-lock.json"),
            Some(root.join("package-lock.json"))
        );
        // Outside the scan root
        assert_eq!(scan_root.find_upwards(&manifest, "Cargo.lock"), None);
    }

    #[test]
    fn test_module_properties_override_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::write(root.join("gradle.properties"), "a=root\nb=root\n").unwrap();
        fs::write(root.join("app/gradle.properties"), "b=app\n").unwrap();
        fs::write(root.join("app/build.gradle"), "").unwrap();

        let scan_root = ScanRoot::new(root);
        let manifest =
            load_manifest(&root.join("app/build.gradle"), Dialect::Gradle, &scan_root).unwrap();
        let props = load_properties(&manifest, &scan_root);

        assert_eq!(props.get("a").unwrap(), "root");
        assert_eq!(props.get("b").unwrap(), "app");
    }
}
