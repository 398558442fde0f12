use crate::error::{BootstrapError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// SettingsWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsWarning {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Artifact locations, optionally overridden by `.bootstrap.yaml` in the root.
///
/// Only paths are configurable. The toolchain requirement, the probe order
/// and the verified package lists are fixed in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_sandbox_dir")]
    pub sandbox_dir: PathBuf,
    #[serde(default = "default_config_template")]
    pub config_template: PathBuf,
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

fn default_sandbox_dir() -> PathBuf {
    PathBuf::from(paths::SANDBOX_DIR)
}

fn default_config_template() -> PathBuf {
    PathBuf::from(paths::CONFIG_TEMPLATE)
}

fn default_config_file() -> PathBuf {
    PathBuf::from(paths::CONFIG_FILE)
}

fn default_manifest() -> PathBuf {
    PathBuf::from(paths::MANIFEST_FILE)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sandbox_dir: default_sandbox_dir(),
            config_template: default_config_template(),
            config_file: default_config_file(),
            manifest: default_manifest(),
        }
    }
}

impl Settings {
    /// Load `.bootstrap.yaml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::settings_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data).map_err(|e| BootstrapError::InvalidSettings {
            path,
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Vec<SettingsWarning> {
        let mut warnings = Vec::new();

        let entries = [
            ("sandbox_dir", &self.sandbox_dir),
            ("config_template", &self.config_template),
            ("config_file", &self.config_file),
            ("manifest", &self.manifest),
        ];

        for (key, value) in entries {
            if value.as_os_str().is_empty() {
                warnings.push(SettingsWarning {
                    message: format!("{key} is empty; it resolves to the project root"),
                });
            } else if value.is_absolute() {
                warnings.push(SettingsWarning {
                    message: format!(
                        "{key} is absolute ({}); artifacts will live outside the project root",
                        value.display()
                    ),
                });
            }
        }

        if self.config_template == self.config_file {
            warnings.push(SettingsWarning {
                message: format!(
                    "config_template and config_file are both {}; seeding will always be skipped",
                    self.config_file.display()
                ),
            });
        }

        for (key, value) in &entries[1..] {
            if *value == &self.sandbox_dir {
                warnings.push(SettingsWarning {
                    message: format!("sandbox_dir collides with {key} ({})", value.display()),
                });
            }
        }

        warnings
    }

    /// Resolve every artifact path against `root`.
    pub fn layout(&self, root: &Path) -> Layout {
        Layout {
            root: root.to_path_buf(),
            sandbox_dir: root.join(&self.sandbox_dir),
            sandbox_rel: self.sandbox_dir.clone(),
            config_template: root.join(&self.config_template),
            config_file: root.join(&self.config_file),
            manifest: root.join(&self.manifest),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Absolute artifact paths for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub root: PathBuf,
    pub sandbox_dir: PathBuf,
    /// Sandbox path as written in settings, used for user-facing hints.
    pub sandbox_rel: PathBuf,
    pub config_template: PathBuf,
    pub config_file: PathBuf,
    pub manifest: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.sandbox_dir, PathBuf::from("venv"));
        assert_eq!(settings.config_file, PathBuf::from(".env"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".bootstrap.yaml"), "sandbox_dir: .venv\n").unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.sandbox_dir, PathBuf::from(".venv"));
        assert_eq!(settings.manifest, PathBuf::from("requirements.txt"));
        assert!(settings.validate().is_empty());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".bootstrap.yaml"), "python: \"3.9\"\n").unwrap();
        let err = Settings::load(dir.path()).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidSettings { .. }));
    }

    #[test]
    fn validate_flags_collisions() {
        let settings = Settings {
            config_file: PathBuf::from(".env.example"),
            ..Settings::default()
        };
        let warnings = settings.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("always be skipped"));

        let settings = Settings {
            manifest: PathBuf::from("venv"),
            ..Settings::default()
        };
        assert!(settings.validate()[0].message.contains("manifest"));
    }

    #[test]
    fn layout_resolves_against_root() {
        let layout = Settings::default().layout(Path::new("/work"));
        assert_eq!(layout.sandbox_dir, PathBuf::from("/work/venv"));
        assert_eq!(layout.config_template, PathBuf::from("/work/.env.example"));
        assert_eq!(layout.sandbox_rel, PathBuf::from("venv"));
    }
}
