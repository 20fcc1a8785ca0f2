//! Provider and carrier registry
//!
//! Built once at startup from the built-in tables plus the user's custom
//! providers, then passed by reference to everything that needs a lookup.

use crate::carriers::{builtin_carriers, CarrierGateway};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::presets::{builtin_presets, ProviderPreset};
use crate::providers::ProviderStore;

/// Immutable lookup tables for SMTP presets and SMS gateways
#[derive(Debug, Clone)]
pub struct Registry {
    presets: Vec<ProviderPreset>,
    carriers: Vec<CarrierGateway>,
    custom_count: usize,
}

impl Registry {
    /// Built-in presets and carriers only
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
            carriers: builtin_carriers(),
            custom_count: 0,
        }
    }

    /// Built-ins with `custom` merged in; a custom entry matching a built-in
    /// key or name replaces it in place, anything else is appended
    pub fn with_custom(custom: Vec<ProviderPreset>) -> Self {
        let mut registry = Self::builtin();
        registry.custom_count = custom.len();

        for preset in custom {
            let existing = registry
                .presets
                .iter()
                .position(|p| p.matches(&preset.key) || p.matches(&preset.name));
            match existing {
                Some(i) => {
                    tracing::debug!(provider = %preset.name, "Custom provider overrides built-in");
                    registry.presets[i] = preset;
                }
                None => registry.presets.push(preset),
            }
        }

        registry
    }

    /// Built-ins merged with the custom providers file; an unreadable file
    /// is reported and skipped
    pub fn load(config: &Config) -> Self {
        let mut store = ProviderStore::new(config);
        match store.load() {
            Ok(count) => {
                tracing::debug!(count, path = %config.providers_file.display(), "Loaded custom providers");
                Self::with_custom(store.presets())
            }
            Err(e) => {
                tracing::warn!(
                    path = %config.providers_file.display(),
                    "Ignoring unreadable providers file: {}",
                    e
                );
                Self::builtin()
            }
        }
    }

    /// Look up a provider by key or display name
    pub fn preset(&self, key: &str) -> Result<&ProviderPreset> {
        self.presets
            .iter()
            .find(|p| p.matches(key))
            .ok_or_else(|| Error::UnknownProvider(key.trim().to_string()))
    }

    /// Look up a carrier by key or display name
    pub fn carrier(&self, key: &str) -> Result<&CarrierGateway> {
        self.carriers
            .iter()
            .find(|c| c.matches(key))
            .ok_or_else(|| Error::UnknownCarrier(key.trim().to_string()))
    }

    pub fn presets(&self) -> &[ProviderPreset] {
        &self.presets
    }

    pub fn carriers(&self) -> &[CarrierGateway] {
        &self.carriers
    }

    /// Number of entries that came from the custom providers file
    pub fn custom_count(&self) -> usize {
        self.custom_count
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::Security;
    use crate::providers::CustomProvider;
    use tempfile::TempDir;

    #[test]
    fn test_gmail_lookup() {
        let registry = Registry::builtin();
        let gmail = registry.preset("gmail").unwrap();
        assert_eq!(gmail.host, "smtp.gmail.com");
        assert_eq!(gmail.port, 587);
        assert!(gmail.use_tls);
    }

    #[test]
    fn test_lookup_by_name_case_insensitive() {
        let registry = Registry::builtin();
        assert_eq!(registry.preset("AMAZON SES").unwrap().key, "ses");
        assert_eq!(registry.carrier("t-mobile").unwrap().key, "tmobile");
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = Registry::builtin();
        assert!(matches!(registry.preset("aol"), Err(Error::UnknownProvider(k)) if k == "aol"));
        assert!(matches!(registry.carrier("nextel"), Err(Error::UnknownCarrier(k)) if k == "nextel"));
    }

    #[test]
    fn test_custom_appended() {
        let custom = CustomProvider {
            server: "relay.work.example".to_string(),
            port: 2525,
            use_tls: false,
            use_ssl: false,
            description: String::new(),
        }
        .to_preset("Work Relay");
        let registry = Registry::with_custom(vec![custom]);

        assert_eq!(registry.presets().len(), Registry::builtin().presets().len() + 1);
        assert_eq!(registry.presets().last().unwrap().name, "Work Relay");
        assert_eq!(registry.preset("work relay").unwrap().port, 2525);
        assert_eq!(registry.custom_count(), 1);
    }

    #[test]
    fn test_custom_overrides_builtin_in_place() {
        let override_gmail = CustomProvider {
            server: "smtp-relay.gmail.com".to_string(),
            port: 465,
            use_tls: false,
            use_ssl: true,
            description: String::new(),
        }
        .to_preset("Gmail");

        let builtin_len = Registry::builtin().presets().len();
        let registry = Registry::with_custom(vec![override_gmail]);

        assert_eq!(registry.presets().len(), builtin_len);
        assert_eq!(registry.presets()[0].host, "smtp-relay.gmail.com");
        assert_eq!(registry.preset("gmail").unwrap().security(), Security::Implicit);
    }

    #[test]
    fn test_load_merges_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::for_test(temp_dir.path());
        let mut store = ProviderStore::new(&config);
        store
            .add(
                "Fastmail",
                CustomProvider {
                    server: "smtp.fastmail.com".to_string(),
                    port: 465,
                    use_tls: false,
                    use_ssl: true,
                    description: "Fastmail".to_string(),
                },
            )
            .unwrap();

        let registry = Registry::load(&config);
        assert_eq!(registry.preset("fastmail").unwrap().host, "smtp.fastmail.com");
    }

    #[test]
    fn test_load_ignores_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::for_test(temp_dir.path());
        std::fs::write(&config.providers_file, "[1, 2").unwrap();

        let registry = Registry::load(&config);
        assert_eq!(registry.presets().len(), Registry::builtin().presets().len());
        assert_eq!(registry.custom_count(), 0);
    }
}
