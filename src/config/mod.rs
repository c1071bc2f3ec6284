//! Application Configuration
//!
//! Matching thresholds, pipeline gates, the camera mount transform and data
//! file locations, stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::{MatcherConfig, PipelineConfig, StaticTransform};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Catalog matching settings
    pub matcher: MatcherConfig,
    /// Per-frame processing settings
    pub pipeline: PipelineConfig,
    /// Static transform poses are reported through
    pub frames: StaticTransform,
    /// Data file locations
    pub paths: PathSettings,
}

/// Data file locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Catalog file, one name per line
    pub catalog: Option<PathBuf>,
    /// Correction rules (JSON); built-in rules when unset
    pub rules: Option<PathBuf>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid config: {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check matcher defaults
        assert!((config.matcher.accept_threshold - 0.77).abs() < 1e-12);
        assert!(config.matcher.skip_first_entry);
        assert!(config.matcher.exact_match_shortcut);

        // Check pipeline defaults
        assert_eq!(config.pipeline.min_box_area, 1500);
        assert!(!config.pipeline.zero_depth_is_invalid);
        assert!(config.pipeline.annotate);

        // Check frame defaults
        assert_eq!(config.frames.parent_frame, "camera_color_optical_frame");
        assert_eq!(config.frames.child_frame, "camera_link");
        assert_eq!(config.frames.euler, [0.0; 3]);

        assert!(config.paths.catalog.is_none());
        assert!(config.paths.rules.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.matcher.accept_threshold, parsed.matcher.accept_threshold);
        assert_eq!(config.pipeline.min_box_area, parsed.pipeline.min_box_area);
        assert_eq!(config.frames, parsed.frames);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [pipeline]
            min_box_area = 900

            [frames]
            euler = [0.0, 0.0, 1.5707963267948966]

            [paths]
            catalog = "/opt/catalog/commodity_list.txt"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.pipeline.min_box_area, 900);
        assert!(parsed.pipeline.annotate);
        assert_eq!(parsed.frames.parent_frame, "camera_color_optical_frame");
        assert_eq!(parsed.frames.euler[2], std::f64::consts::FRAC_PI_2);
        assert_eq!(parsed.paths.catalog, Some(PathBuf::from("/opt/catalog/commodity_list.txt")));
        assert!(parsed.matcher.skip_first_entry);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.matcher.skip_first_entry = false;
        config.frames.translation = [0.0, 0.015, 0.0];

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!(!loaded.matcher.skip_first_entry);
        assert_eq!(loaded.frames.translation, [0.0, 0.015, 0.0]);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
