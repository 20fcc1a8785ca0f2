//! Custom provider store - persistent JSON storage for user-added SMTP servers

use crate::config::Config;
use crate::error::{Error, Result};
use crate::presets::ProviderPreset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Name the front ends use for the ad-hoc server choice
pub const RESERVED_NAME: &str = "custom";

/// One user-added provider as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProvider {
    pub server: String,
    pub port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

impl CustomProvider {
    /// Turn the stored entry into a preset named `name`
    pub fn to_preset(&self, name: &str) -> ProviderPreset {
        ProviderPreset {
            key: name.to_string(),
            name: name.to_string(),
            host: self.server.clone(),
            port: self.port,
            use_tls: self.use_tls,
            use_ssl: self.use_ssl,
            description: self.description.clone(),
        }
    }
}

/// Persistent map of provider name to settings
pub struct ProviderStore {
    path: PathBuf,
    data: BTreeMap<String, CustomProvider>,
}

impl ProviderStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.providers_file.clone(),
            data: BTreeMap::new(),
        }
    }

    /// Load providers from disk; a missing file is an empty store
    pub fn load(&mut self) -> Result<usize> {
        if !self.path.exists() {
            self.data = BTreeMap::new();
            return Ok(0);
        }

        let content = fs::read_to_string(&self.path)?;
        self.data = serde_json::from_str(&content)?;
        Ok(self.data.len())
    }

    /// Save providers to disk atomically
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Temp file in the same directory so the rename stays on one filesystem
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => std::path::Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(parent)?;

        let json = serde_json::to_string_pretty(&self.data)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        Ok(())
    }

    /// Add or replace a provider and persist
    pub fn add(&mut self, name: &str, provider: CustomProvider) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("provider name is required".to_string()));
        }
        if name.eq_ignore_ascii_case(RESERVED_NAME) {
            return Err(Error::Validation(format!(
                "\"{}\" is reserved for entering server details by hand",
                name
            )));
        }
        provider.to_preset(name).validate()?;

        self.data.insert(name.to_string(), provider);
        self.save()?;
        tracing::info!(provider = name, "Saved custom provider");
        Ok(())
    }

    /// Remove a provider; only touches the file when something was removed
    pub fn remove(&mut self, name: &str) -> Result<Option<CustomProvider>> {
        let removed = self.data.remove(name.trim());
        if removed.is_some() {
            self.save()?;
            tracing::info!(provider = name.trim(), "Removed custom provider");
        }
        Ok(removed)
    }

    pub fn get(&self, name: &str) -> Option<&CustomProvider> {
        self.data.get(name)
    }

    /// Stored providers as presets, ordered by name
    pub fn presets(&self) -> Vec<ProviderPreset> {
        self.data
            .iter()
            .map(|(name, provider)| provider.to_preset(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
