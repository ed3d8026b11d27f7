//! Company directory lookup.
//!
//! Maps ticker symbols to display names from a TOML table. This is the
//! symbol-resolution collaborator the ingestion pipeline consults before
//! upserting a filing; an unresolved symbol is a non-fatal skip.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Company {
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CompaniesFile {
    #[serde(default)]
    companies: HashMap<String, String>,
}

/// Symbol → company lookup, loaded once at pipeline construction.
#[derive(Debug, Clone, Default)]
pub struct CompanyDirectory {
    by_symbol: HashMap<String, Company>,
}

impl CompanyDirectory {
    /// Load a directory file of the form:
    ///
    /// ```toml
    /// [companies]
    /// AAPL = "Apple Inc."
    /// MSFT = "Microsoft Corporation"
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read companies file: {}", path.display()))?;
        let parsed: CompaniesFile =
            toml::from_str(&content).with_context(|| "Failed to parse companies file")?;

        let by_symbol = parsed
            .companies
            .into_iter()
            .map(|(symbol, name)| {
                let symbol = symbol.to_uppercase();
                (symbol.clone(), Company { symbol, name })
            })
            .collect();

        Ok(Self { by_symbol })
    }

    pub fn resolve(&self, symbol: &str) -> Option<&Company> {
        self.by_symbol.get(&symbol.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
