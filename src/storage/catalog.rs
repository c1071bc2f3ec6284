//! Catalog of recognizable item names

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::error::CatalogError;

/// Ordered, immutable list of known item names.
///
/// Position is part of an item's identity: label values on the mask are
/// derived from the index, so entries are never reordered or removed after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<String>,
}

impl Catalog {
    /// Build a catalog from names in order
    pub fn new<I, S>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { entries })
    }

    /// Parse catalog text, one name per line
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        Self::new(text.lines().map(|line| line.trim_end_matches('\r')))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries (never true once built)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Index of the first entry equal to `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e == name)
    }

    /// Iterate over `(index, name)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(String::as_str).enumerate()
    }
}

/// Load a catalog file (UTF-8, one name per line)
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {:?}", path))?;
    let catalog = Catalog::parse(&content)
        .with_context(|| format!("Invalid catalog: {:?}", path))?;
    info!("Loaded {} catalog entries from {:?}", catalog.len(), path);
    Ok(catalog)
}
