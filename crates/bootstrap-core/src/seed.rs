use serde::Serialize;
use std::path::Path;

use crate::error::{BootstrapError, Result};
use crate::io;

/// Keys the tutorial scripts read from the seeded config file.
pub const REQUIRED_CONFIG_KEYS: &[&str] = &[
    "GALILEO_API_KEY",
    "GALILEO_PROJECT",
    "GALILEO_LOG_STREAM_SANDBOX",
    "GALILEO_LOG_STREAM_DEV",
    "GALILEO_PROTECT_STAGE_NAME",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedOutcome {
    Created,
    Skipped,
}

/// Copy `template` to `target` unless `target` already exists.
///
/// Presence alone decides: an existing target is never read, compared or merged.
pub fn seed(template: &Path, target: &Path) -> Result<SeedOutcome> {
    if !template.is_file() {
        return Err(BootstrapError::TemplateMissing(template.to_path_buf()));
    }
    if io::copy_if_missing(template, target)? {
        tracing::info!(target = %target.display(), "config seeded from template");
        Ok(SeedOutcome::Created)
    } else {
        tracing::info!(target = %target.display(), "config exists, left as is");
        Ok(SeedOutcome::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = "GALILEO_API_KEY=your-api-key\nGALILEO_PROJECT=getting-started\n";

    #[test]
    fn creates_exact_copy() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join(".env.example");
        let target = dir.path().join(".env");
        std::fs::write(&template, TEMPLATE).unwrap();

        assert_eq!(seed(&template, &target).unwrap(), SeedOutcome::Created);
        assert_eq!(std::fs::read(&target).unwrap(), TEMPLATE.as_bytes());
    }

    #[test]
    fn existing_target_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join(".env.example");
        let target = dir.path().join(".env");
        std::fs::write(&template, TEMPLATE).unwrap();
        let edited: &[u8] = b"GALILEO_API_KEY=sk-real\n# my notes\n\x00\xff";
        std::fs::write(&target, edited).unwrap();

        assert_eq!(seed(&template, &target).unwrap(), SeedOutcome::Skipped);
        assert_eq!(std::fs::read(&target).unwrap(), edited);

        // Template changes do not propagate either.
        std::fs::write(&template, "NEW_KEY=1\n").unwrap();
        assert_eq!(seed(&template, &target).unwrap(), SeedOutcome::Skipped);
        assert_eq!(std::fs::read(&target).unwrap(), edited);
    }

    #[test]
    fn empty_existing_target_still_counts_as_present() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join(".env.example");
        let target = dir.path().join(".env");
        std::fs::write(&template, TEMPLATE).unwrap();
        std::fs::write(&target, "").unwrap();

        assert_eq!(seed(&template, &target).unwrap(), SeedOutcome::Skipped);
        assert!(std::fs::read(&target).unwrap().is_empty());
    }

    #[test]
    fn missing_template_is_fatal_even_if_target_exists() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join(".env.example");
        let target = dir.path().join(".env");
        std::fs::write(&target, "KEEP=1\n").unwrap();

        let err = seed(&template, &target).unwrap_err();
        assert_eq!(err.kind(), "TemplateMissing");
        assert!(err.to_string().contains(".env.example"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "KEEP=1\n");
    }
}
