//! Storage Layer
//!
//! Loads the item catalog and its correction rules, and locates the
//! platform configuration directory.

pub mod catalog;
pub mod rules;

pub use catalog::{load_catalog, Catalog};
pub use rules::{load_rules, save_rules, CorrectionRule, CorrectionTable};

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "catalog-localizer", "CatalogLocalizer")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the application data directory (default catalog and rule files)
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
