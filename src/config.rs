use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const MAX_FRAME_DEPTH: usize = 32;

const SETTINGS_FILE: &str = ".excapture/settings.json";

/// How much of the stack an exception event captures and which declaring
/// types are skipped on top of the built-in exclusions.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub frame_depth: usize,
    pub excluded_prefixes: Vec<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frame_depth: 1,
            excluded_prefixes: Vec::new(),
        }
    }
}

/// One settings layer as written on disk. Absent keys leave earlier layers alone.
#[derive(Debug, Deserialize, Default)]
struct SettingsLayer {
    #[serde(rename = "capture.frameDepth")]
    frame_depth: Option<usize>,
    #[serde(rename = "filter.excludedPrefixes")]
    excluded_prefixes: Option<Vec<String>>,
}

impl SettingsLayer {
    /// Missing files are silently skipped; unparsable ones are reported.
    fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(layer) => Some(layer),
            Err(e) => {
                tracing::warn!("Ignoring settings file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn apply_to(self, settings: &mut CaptureSettings) {
        match self.frame_depth {
            Some(depth) if (1..=MAX_FRAME_DEPTH).contains(&depth) => settings.frame_depth = depth,
            Some(depth) => tracing::warn!(
                "capture.frameDepth {} is outside 1..={}, keeping {}",
                depth, MAX_FRAME_DEPTH, settings.frame_depth
            ),
            None => {}
        }

        // Exclusions accumulate across layers.
        for prefix in self.excluded_prefixes.into_iter().flatten() {
            if prefix.is_empty() {
                tracing::warn!("Ignoring empty entry in filter.excludedPrefixes");
            } else if !settings.excluded_prefixes.contains(&prefix) {
                settings.excluded_prefixes.push(prefix);
            }
        }
    }
}

/// Capture settings for a process whose working tree is `project_root`:
/// built-in defaults, then `~/.excapture/settings.json`, then the project's
/// own `.excapture/settings.json`.
pub fn resolve(project_root: Option<&Path>) -> CaptureSettings {
    let layers: Vec<PathBuf> = [dirs::home_dir(), project_root.map(Path::to_path_buf)]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(SETTINGS_FILE))
        .collect();
    resolve_layers(&layers)
}

/// Apply the settings files in `paths` in order over the defaults.
fn resolve_layers<P: AsRef<Path>>(paths: &[P]) -> CaptureSettings {
    let mut settings = CaptureSettings::default();
    for layer in paths.iter().filter_map(|p| SettingsLayer::read(p.as_ref())) {
        layer.apply_to(&mut settings);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_no_files_exist() {
        let settings = resolve_layers::<&Path>(&[]);
        assert_eq!(settings.frame_depth, 1);
        assert!(settings.excluded_prefixes.is_empty());
    }

    #[test]
    fn test_global_overrides_defaults() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global.json");
        std::fs::write(&global, r#"{"capture.frameDepth": 4}"#).unwrap();

        let settings = resolve_layers(&[&global]);
        assert_eq!(settings.frame_depth, 4);
        assert!(settings.excluded_prefixes.is_empty()); // unchanged
    }

    #[test]
    fn test_project_overrides_global() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global.json");
        let project = dir.path().join("project.json");
        std::fs::write(&global, r#"{"capture.frameDepth": 4, "filter.excludedPrefixes": ["Lcom/acme/gen/"]}"#).unwrap();
        std::fs::write(&project, r#"{"capture.frameDepth": 2, "filter.excludedPrefixes": ["Lorg/hibernate/"]}"#).unwrap();

        let settings = resolve_layers(&[&global, &project]);
        assert_eq!(settings.frame_depth, 2); // project wins
        assert_eq!(
            settings.excluded_prefixes,
            vec!["Lcom/acme/gen/".to_string(), "Lorg/hibernate/".to_string()]
        );
    }

    #[test]
    fn test_invalid_json_ignored() {
        let dir = tempdir().unwrap();
        let bad_file = dir.path().join("bad.json");
        std::fs::write(&bad_file, "not json {{{").unwrap();

        let settings = resolve_layers(&[&bad_file]);
        assert_eq!(settings, CaptureSettings::default());
    }

    #[test]
    fn test_missing_file_ignored() {
        let settings = resolve_layers(&[Path::new("/nonexistent/settings.json")]);
        assert_eq!(settings, CaptureSettings::default());
    }

    #[test]
    fn test_out_of_range_depth_uses_default() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("settings.json");
        std::fs::write(&file, r#"{"capture.frameDepth": 0}"#).unwrap();
        let settings = resolve_layers(&[&file]);
        assert_eq!(settings.frame_depth, 1);

        std::fs::write(&file, r#"{"capture.frameDepth": 500}"#).unwrap();
        let settings = resolve_layers(&[&file]);
        assert_eq!(settings.frame_depth, 1);
    }

    #[test]
    fn test_out_of_range_depth_keeps_earlier_layer() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global.json");
        let project = dir.path().join("project.json");
        std::fs::write(&global, r#"{"capture.frameDepth": 4}"#).unwrap();
        std::fs::write(&project, r#"{"capture.frameDepth": 500}"#).unwrap();

        let settings = resolve_layers(&[&global, &project]);
        assert_eq!(settings.frame_depth, 4);
    }

    #[test]
    fn test_empty_and_duplicate_prefixes_dropped() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("settings.json");
        std::fs::write(
            &file,
            r#"{"filter.excludedPrefixes": ["", "Lcom/acme/gen/", "Lcom/acme/gen/"], "unknown.key": true}"#,
        )
        .unwrap();

        let settings = resolve_layers(&[&file]);
        assert_eq!(settings.excluded_prefixes, vec!["Lcom/acme/gen/".to_string()]);
    }
}
