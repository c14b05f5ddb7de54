use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Account handle as entered by the operator. A leading `@` is accepted
    /// and ignored for comparison purposes.
    pub handle: String,
    pub display_name: Option<String>,
    pub notes: Option<String>,
}

impl TargetConfig {
    /// The handle in canonical comparison form: lowercase, no leading `@`.
    #[must_use]
    pub fn canonical_handle(&self) -> String {
        self.handle
            .trim()
            .trim_start_matches('@')
            .to_lowercase()
    }
}

#[derive(Debug, Deserialize)]
pub struct TargetsFile {
    pub targets: Vec<TargetConfig>,
}

/// Load and validate the tracked-targets configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_targets(path: &Path) -> Result<TargetsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TargetsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let targets_file: TargetsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::TargetsFileParse)?;

    validate_targets(&targets_file)?;

    Ok(targets_file)
}

fn validate_targets(targets_file: &TargetsFile) -> Result<(), ConfigError> {
    let mut seen_handles = HashSet::new();

    for target in &targets_file.targets {
        let canonical = target.canonical_handle();

        if canonical.is_empty() {
            return Err(ConfigError::Validation(
                "target handle must be non-empty".to_string(),
            ));
        }

        if !canonical
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ConfigError::Validation(format!(
                "target handle '{}' contains unsupported characters",
                target.handle
            )));
        }

        if !seen_handles.insert(canonical.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate target handle: '{canonical}' (from '{}')",
                target.handle
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(handle: &str) -> TargetConfig {
        TargetConfig {
            handle: handle.to_string(),
            display_name: None,
            notes: None,
        }
    }

    #[test]
    fn canonical_handle_strips_at_and_lowercases() {
        assert_eq!(target("@BigAccount").canonical_handle(), "bigaccount");
    }

    #[test]
    fn canonical_handle_trims_whitespace() {
        assert_eq!(target("  handle  ").canonical_handle(), "handle");
    }

    #[test]
    fn validate_accepts_valid_targets() {
        let file = TargetsFile {
            targets: vec![target("@brand_one"), target("brand.two")],
        };
        assert!(validate_targets(&file).is_ok());
    }

    #[test]
    fn validate_rejects_empty_handle() {
        let file = TargetsFile {
            targets: vec![target("@")],
        };
        let err = validate_targets(&file).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn validate_rejects_unsupported_characters() {
        let file = TargetsFile {
            targets: vec![target("bad handle!")],
        };
        let err = validate_targets(&file).unwrap_err();
        assert!(err.to_string().contains("unsupported characters"));
    }

    #[test]
    fn validate_rejects_duplicate_handles_case_insensitively() {
        let file = TargetsFile {
            targets: vec![target("@Brand"), target("brand")],
        };
        let err = validate_targets(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate target handle"));
    }

    #[test]
    fn load_targets_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("targets.yaml");
        assert!(
            path.exists(),
            "targets.yaml missing at {path:?} — required for this test"
        );
        let result = load_targets(&path);
        assert!(result.is_ok(), "failed to load targets.yaml: {result:?}");
        let targets_file = result.unwrap();
        assert!(!targets_file.targets.is_empty());
    }
}
