//! SMTP provider presets

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Plain connection upgraded with STARTTLS
    StartTls,
    /// TLS from the first byte (usually port 465)
    Implicit,
    /// No encryption at all
    None,
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Security::StartTls => write!(f, "starttls"),
            Security::Implicit => write!(f, "ssl"),
            Security::None => write!(f, "none"),
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" | "tls" => Ok(Security::StartTls),
            "ssl" | "implicit" => Ok(Security::Implicit),
            "none" | "plain" => Ok(Security::None),
            other => Err(Error::InvalidPreset(format!("unknown security mode: {}", other))),
        }
    }
}

/// A named SMTP connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPreset {
    pub key: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub description: String,
}

impl ProviderPreset {
    /// Ad-hoc preset for a server that is not in the registry
    pub fn custom(host: &str, port: u16, security: Security) -> Self {
        Self {
            key: "custom".to_string(),
            name: "Custom".to_string(),
            host: host.trim().to_string(),
            port,
            use_tls: security == Security::StartTls,
            use_ssl: security == Security::Implicit,
            description: String::new(),
        }
    }

    /// Implicit TLS wins if both flags are set
    pub fn security(&self) -> Security {
        if self.use_ssl {
            Security::Implicit
        } else if self.use_tls {
            Security::StartTls
        } else {
            Security::None
        }
    }

    /// Host and port must be usable before a connection is attempted
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidPreset(format!("{}: empty SMTP host", self.name)));
        }
        if self.port == 0 {
            return Err(Error::InvalidPreset(format!("{}: SMTP port must be non-zero", self.name)));
        }
        Ok(())
    }

    /// True if `needle` is this preset's key or name (case-insensitive)
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        self.key.eq_ignore_ascii_case(needle) || self.name.eq_ignore_ascii_case(needle)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// (key, name, host, port, description); all built-ins use STARTTLS except ProtonMail Bridge
const BUILTIN_PRESETS: &[(&str, &str, &str, u16, &str)] = &[
    ("gmail", "Gmail", "smtp.gmail.com", 587, "Google Gmail - requires App Password"),
    ("outlook", "Outlook/Hotmail", "smtp.office365.com", 587, "Microsoft Outlook/Hotmail"),
    ("yahoo", "Yahoo", "smtp.mail.yahoo.com", 587, "Yahoo Mail - requires App Password"),
    ("icloud", "iCloud", "smtp.mail.me.com", 587, "Apple iCloud Mail"),
    ("zoho", "Zoho", "smtp.zoho.com", 587, "Zoho Mail"),
    ("protonmail", "ProtonMail Bridge", "127.0.0.1", 1025, "ProtonMail via Bridge (local)"),
    ("sendgrid", "SendGrid", "smtp.sendgrid.net", 587, "SendGrid SMTP Relay"),
    ("mailgun", "Mailgun", "smtp.mailgun.org", 587, "Mailgun SMTP"),
    (
        "ses",
        "Amazon SES",
        "email-smtp.us-east-1.amazonaws.com",
        587,
        "Amazon SES (update region as needed)",
    ),
];

/// The built-in provider table, in display order
pub fn builtin_presets() -> Vec<ProviderPreset> {
    BUILTIN_PRESETS
        .iter()
        .map(|(key, name, host, port, description)| ProviderPreset {
            key: key.to_string(),
            name: name.to_string(),
            host: host.to_string(),
            port: *port,
            // The bridge listens on loopback without TLS
            use_tls: *key != "protonmail",
            use_ssl: false,
            description: description.to_string(),
        })
        .collect()
}
