//! Recipient address resolution
//!
//! Turns user input (plain email addresses, or phone numbers paired with a
//! carrier) into SMTP envelope recipients. No case normalization and no
//! deduplication happen here.

use crate::error::{Error, Result};
use crate::registry::Registry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// local-part, then a dotted domain of letters, digits and inner hyphens
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[^@\s]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$",
    )
    .expect("Invalid email regex")
});

/// A recipient as entered by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Email(String),
    Phone { number: String, carrier: String },
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Email(addr) => write!(f, "{}", addr),
            Recipient::Phone { number, carrier } => write!(f, "{} ({})", number, carrier),
        }
    }
}

/// Check that an address has a local part, an `@` and a dotted domain, and
/// that the mail client will accept it on the envelope
pub fn validate_email(address: &str) -> Result<String> {
    let address = address.trim();
    if EMAIL_PATTERN.is_match(address) && address.parse::<lettre::Address>().is_ok() {
        Ok(address.to_string())
    } else {
        Err(Error::InvalidAddress(address.to_string()))
    }
}

/// Build `<digits>@<carrier gateway>` from a formatted phone number
pub fn resolve_phone(number: &str, carrier: &str, registry: &Registry) -> Result<String> {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "phone number has no digits: {}",
            number.trim()
        )));
    }

    let gateway = registry.carrier(carrier)?;
    let address = format!("{}@{}", digits, gateway.domain_suffix);
    tracing::debug!(number = number.trim(), carrier = %gateway.name, %address, "Resolved SMS gateway");
    Ok(address)
}

/// Resolve any recipient to an envelope address
pub fn resolve(recipient: &Recipient, registry: &Registry) -> Result<String> {
    match recipient {
        Recipient::Email(addr) => validate_email(addr),
        Recipient::Phone { number, carrier } => resolve_phone(number, carrier, registry),
    }
}

/// Split free-form input on newlines and commas, dropping blanks
pub fn parse_recipient_list(text: &str) -> Vec<String> {
    text.split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `<number>[:<carrier>]`, using `default_carrier` when none is given
pub fn parse_phone_entry(entry: &str, default_carrier: Option<&str>) -> Result<Recipient> {
    let entry = entry.trim();
    let (number, carrier) = match entry.rsplit_once(':') {
        Some((number, carrier)) if !carrier.trim().is_empty() => (number, Some(carrier.trim())),
        Some((number, _)) => (number, default_carrier),
        None => (entry, default_carrier),
    };

    let carrier = carrier
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Validation(format!("no carrier given for {}", number.trim())))?;

    Ok(Recipient::Phone {
        number: number.trim().to_string(),
        carrier: carrier.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_formatted_number() {
        let registry = Registry::builtin();
        assert_eq!(
            resolve_phone("(555) 123-4567", "att", &registry).unwrap(),
            "5551234567@txt.att.net"
        );
    }

    #[test]
    fn test_resolve_by_carrier_name() {
        let registry = Registry::builtin();
        assert_eq!(
            resolve_phone("555.123.4567", "Verizon", &registry).unwrap(),
            "5551234567@vtext.com"
        );
    }

    #[test]
    fn test_resolve_keeps_all_digits() {
        let registry = Registry::builtin();
        assert_eq!(
            resolve_phone("+1 (617) 555-1234", "tmobile", &registry).unwrap(),
            "16175551234@tmomail.net"
        );
    }

    #[test]
    fn test_unknown_carrier() {
        let registry = Registry::builtin();
        let err = resolve_phone("5551234567", "nextel", &registry).unwrap_err();
        assert!(matches!(err, Error::UnknownCarrier(c) if c == "nextel"));
    }

    #[test]
    fn test_no_digits() {
        let registry = Registry::builtin();
        let err = resolve_phone("(---) ---", "att", &registry).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" bob@example.com ").unwrap(), "bob@example.com");
        assert_eq!(validate_email("Bob.Smith+tag@Mail.Example.co.uk").unwrap(), "Bob.Smith+tag@Mail.Example.co.uk");
        assert!(matches!(validate_email("bob.example.com"), Err(Error::InvalidAddress(_))));
        assert!(matches!(validate_email("bob@"), Err(Error::InvalidAddress(_))));
        assert!(matches!(validate_email("bob@localhost"), Err(Error::InvalidAddress(_))));
        assert!(matches!(validate_email("bob@@example.com"), Err(Error::InvalidAddress(_))));
        assert!(matches!(validate_email("bob smith@example.com"), Err(Error::InvalidAddress(_))));
        assert!(matches!(validate_email("bob@.example.com"), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_validate_email_rejects_special_characters() {
        for address in [
            "a<b@example.com",
            "a\"b@example.com",
            "a(b)@example.com",
            "a[b]@example.com",
            "a\\b@example.com",
            "a,b;c@example.com",
        ] {
            assert!(
                matches!(validate_email(address), Err(Error::InvalidAddress(_))),
                "{} should be rejected",
                address
            );
        }
    }

    #[test]
    fn test_resolve_dispatch() {
        let registry = Registry::builtin();
        assert_eq!(
            resolve(&Recipient::Email("a@example.com".into()), &registry).unwrap(),
            "a@example.com"
        );
        let phone = Recipient::Phone {
            number: "555-000-1111".into(),
            carrier: "cricket".into(),
        };
        assert_eq!(
            resolve(&phone, &registry).unwrap(),
            "5550001111@sms.cricketwireless.net"
        );
    }

    #[test]
    fn test_parse_recipient_list() {
        let input = "a@example.com, b@example.com\n\n  c@example.com ,\n";
        assert_eq!(
            parse_recipient_list(input),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
        assert!(parse_recipient_list(" \n , ").is_empty());
    }

    #[test]
    fn test_parse_recipient_list_keeps_duplicates() {
        assert_eq!(
            parse_recipient_list("a@example.com,a@example.com"),
            vec!["a@example.com", "a@example.com"]
        );
    }

    #[test]
    fn test_parse_phone_entry() {
        assert_eq!(
            parse_phone_entry("(555) 123-4567:verizon", Some("att")).unwrap(),
            Recipient::Phone {
                number: "(555) 123-4567".into(),
                carrier: "verizon".into()
            }
        );
        assert_eq!(
            parse_phone_entry("555-123-4567", Some("att")).unwrap(),
            Recipient::Phone {
                number: "555-123-4567".into(),
                carrier: "att".into()
            }
        );
        assert_eq!(
            parse_phone_entry("555-123-4567:", Some("att")).unwrap(),
            Recipient::Phone {
                number: "555-123-4567".into(),
                carrier: "att".into()
            }
        );
        assert!(matches!(
            parse_phone_entry("555-123-4567", None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_recipient_display() {
        let phone = Recipient::Phone {
            number: "555".into(),
            carrier: "att".into(),
        };
        assert_eq!(phone.to_string(), "555 (att)");
    }

    proptest! {
        #[test]
        fn prop_resolve_strips_non_digits(
            digits in "[0-9]{1,15}",
            separators in proptest::collection::vec("[ ()\\-.+]{0,2}", 15),
            carrier_index in 0usize..15,
        ) {
            let registry = Registry::builtin();
            let carrier = &registry.carriers()[carrier_index];

            // Interleave formatting characters between the digits
            let mut formatted = String::new();
            for (i, d) in digits.chars().enumerate() {
                formatted.push_str(&separators[i]);
                formatted.push(d);
            }

            let resolved = resolve_phone(&formatted, &carrier.key, &registry).unwrap();
            prop_assert_eq!(resolved, format!("{}@{}", digits, carrier.domain_suffix));
        }

        #[test]
        fn prop_email_without_at_is_invalid(local in "[a-z0-9.]{1,20}") {
            let registry = Registry::builtin();
            let result = resolve(&Recipient::Email(local), &registry);
            prop_assert!(matches!(result, Err(Error::InvalidAddress(_))));
        }
    }
}
