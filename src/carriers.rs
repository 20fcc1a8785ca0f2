//! Carrier email-to-SMS gateways

use serde::Serialize;

/// A carrier-operated domain that forwards `<number>@<domain>` mail as a text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarrierGateway {
    pub key: String,
    pub name: String,
    pub domain_suffix: String,
}

impl CarrierGateway {
    pub fn new(key: &str, name: &str, domain_suffix: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            domain_suffix: domain_suffix.to_string(),
        }
    }

    /// True if `needle` is this carrier's key or display name (case-insensitive)
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        self.key.eq_ignore_ascii_case(needle) || self.name.eq_ignore_ascii_case(needle)
    }
}

/// (key, display name, gateway domain) for the major US carriers
const BUILTIN_CARRIERS: &[(&str, &str, &str)] = &[
    ("att", "AT&T", "txt.att.net"),
    ("tmobile", "T-Mobile", "tmomail.net"),
    ("verizon", "Verizon", "vtext.com"),
    ("sprint", "Sprint", "messaging.sprintpcs.com"),
    ("uscellular", "US Cellular", "email.uscc.net"),
    ("metropcs", "Metro PCS", "mymetropcs.com"),
    ("boost", "Boost Mobile", "sms.myboostmobile.com"),
    ("cricket", "Cricket", "sms.cricketwireless.net"),
    ("virgin", "Virgin Mobile", "vmobl.com"),
    ("googlefi", "Google Fi", "msg.fi.google.com"),
    ("republic", "Republic Wireless", "text.republicwireless.com"),
    ("straighttalk", "Straight Talk", "vtext.com"),
    ("mint", "Mint Mobile", "tmomail.net"),
    ("xfinity", "Xfinity Mobile", "vtext.com"),
    ("visible", "Visible", "vtext.com"),
];

/// The built-in carrier table, in display order
pub fn builtin_carriers() -> Vec<CarrierGateway> {
    BUILTIN_CARRIERS
        .iter()
        .map(|(key, name, domain)| CarrierGateway::new(key, name, domain))
        .collect()
}
