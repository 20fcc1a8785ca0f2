//! Message composition
//!
//! Validates user input and resolves every recipient before anything touches
//! the network. A list with any bad entry fails as a whole.

use crate::address::{resolve, validate_email, Recipient};
use crate::config::SMS_CHAR_LIMIT;
use crate::error::{Error, Result};
use crate::registry::Registry;
use lettre::address::Envelope;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Email,
    Sms,
}

/// One message ready to go out to its full recipient list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub kind: MessageKind,
}

impl OutboundMessage {
    /// Render to RFC 5322 bytes plus the SMTP envelope
    pub fn render(&self) -> Result<(Envelope, Vec<u8>)> {
        let from = parse_address(&self.sender)?;
        let mut builder = Message::builder().from(Mailbox::new(None, from));

        for recipient in &self.recipients {
            let mailbox = Mailbox::new(None, parse_address(recipient)?);
            // Gateway recipients should not see each other's numbers
            builder = match self.kind {
                MessageKind::Email => builder.to(mailbox),
                MessageKind::Sms => builder.bcc(mailbox),
            };
        }

        if !self.subject.is_empty() {
            builder = builder.subject(self.subject.clone());
        }

        let message = builder
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| Error::Message(e.to_string()))?;

        Ok((message.envelope().clone(), message.formatted()))
    }
}

fn parse_address(address: &str) -> Result<Address> {
    address
        .parse::<Address>()
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))
}

fn resolve_all(recipients: &[Recipient], registry: &Registry) -> Result<Vec<String>> {
    if recipients.is_empty() {
        return Err(Error::Validation("at least one recipient is required".to_string()));
    }
    recipients.iter().map(|r| resolve(r, registry)).collect()
}

fn check_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::Validation("message body is empty".to_string()));
    }
    Ok(())
}

/// Compose an email to any mix of email and phone recipients
pub fn compose_email(
    sender: &str,
    recipients: &[Recipient],
    subject: &str,
    body: &str,
    registry: &Registry,
) -> Result<OutboundMessage> {
    let sender = validate_email(sender)?;
    check_body(body)?;
    let recipients = resolve_all(recipients, registry)?;

    Ok(OutboundMessage {
        sender,
        recipients,
        subject: subject.trim().to_string(),
        body: body.to_string(),
        kind: MessageKind::Email,
    })
}

/// Compose a subject-less text message for carrier gateways
pub fn compose_sms(
    sender: &str,
    recipients: &[Recipient],
    body: &str,
    registry: &Registry,
) -> Result<OutboundMessage> {
    let sender = validate_email(sender)?;
    check_body(body)?;
    let recipients = resolve_all(recipients, registry)?;

    let chars = body.chars().count();
    if chars > SMS_CHAR_LIMIT {
        tracing::warn!(
            chars,
            limit = SMS_CHAR_LIMIT,
            "SMS body exceeds a single segment; carriers may split or truncate it"
        );
    }

    Ok(OutboundMessage {
        sender,
        recipients,
        subject: String::new(),
        body: body.to_string(),
        kind: MessageKind::Sms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone(number: &str, carrier: &str) -> Recipient {
        Recipient::Phone {
            number: number.to_string(),
            carrier: carrier.to_string(),
        }
    }

    #[test]
    fn test_compose_email() {
        let registry = Registry::builtin();
        let msg = compose_email(
            "me@example.com",
            &[
                Recipient::Email("a@example.com".into()),
                phone("(555) 123-4567", "att"),
            ],
            " Hello ",
            "Body text",
            &registry,
        )
        .unwrap();

        assert_eq!(msg.sender, "me@example.com");
        assert_eq!(msg.recipients, vec!["a@example.com", "5551234567@txt.att.net"]);
        assert_eq!(msg.subject, "Hello");
        assert_eq!(msg.kind, MessageKind::Email);
    }

    #[test]
    fn test_compose_sms_has_no_subject() {
        let registry = Registry::builtin();
        let msg = compose_sms("me@example.com", &[phone("555 123 4567", "verizon")], "hi", &registry).unwrap();
        assert_eq!(msg.recipients, vec!["5551234567@vtext.com"]);
        assert!(msg.subject.is_empty());
        assert_eq!(msg.kind, MessageKind::Sms);
    }

    #[test]
    fn test_partially_invalid_list_fails_whole() {
        let registry = Registry::builtin();
        let err = compose_email(
            "me@example.com",
            &[
                Recipient::Email("good@example.com".into()),
                Recipient::Email("not-an-address".into()),
            ],
            "s",
            "b",
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(a) if a == "not-an-address"));
    }

    #[test]
    fn test_every_composed_message_renders() {
        let registry = Registry::builtin();
        let err = compose_email(
            "me@example.com",
            &[
                Recipient::Email("good@example.com".into()),
                Recipient::Email("a<b@example.com".into()),
            ],
            "s",
            "b",
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(a) if a == "a<b@example.com"));

        let msg = compose_email(
            "me@example.com",
            &[Recipient::Email("good@example.com".into())],
            "s",
            "b",
            &registry,
        )
        .unwrap();
        assert!(msg.render().is_ok());
    }

    #[test]
    fn test_unknown_carrier_fails() {
        let registry = Registry::builtin();
        let err = compose_sms("me@example.com", &[phone("5551234567", "nextel")], "hi", &registry).unwrap_err();
        assert!(matches!(err, Error::UnknownCarrier(_)));
    }

    #[test]
    fn test_validation() {
        let registry = Registry::builtin();
        let one = [Recipient::Email("a@example.com".into())];
        assert!(matches!(
            compose_email("me", &one, "s", "b", &registry),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            compose_email("me@example.com", &[], "s", "b", &registry),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            compose_email("me@example.com", &one, "s", "   ", &registry),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_long_sms_is_still_composed() {
        let registry = Registry::builtin();
        let body = "x".repeat(SMS_CHAR_LIMIT + 40);
        let msg = compose_sms("me@example.com", &[phone("5551234567", "att")], &body, &registry).unwrap();
        assert_eq!(msg.body.len(), SMS_CHAR_LIMIT + 40);
    }

    #[test]
    fn test_render_email() {
        let registry = Registry::builtin();
        let msg = compose_email(
            "me@example.com",
            &[
                Recipient::Email("a@example.com".into()),
                Recipient::Email("b@example.com".into()),
            ],
            "Greetings",
            "Hello there",
            &registry,
        )
        .unwrap();

        let (envelope, bytes) = msg.render().unwrap();
        assert_eq!(envelope.to().len(), 2);
        assert_eq!(envelope.from().map(|a| a.to_string()), Some("me@example.com".to_string()));

        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Subject: Greetings"));
        assert!(text.contains("a@example.com"));
        assert!(text.contains("Hello there"));
    }

    #[test]
    fn test_render_sms_hides_recipients() {
        let registry = Registry::builtin();
        let msg = compose_sms(
            "me@example.com",
            &[phone("5551112222", "att"), phone("5553334444", "tmobile")],
            "ping",
            &registry,
        )
        .unwrap();

        let (envelope, bytes) = msg.render().unwrap();
        assert_eq!(envelope.to().len(), 2);

        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("5551112222@txt.att.net"));
        assert!(!text.contains("Subject:"));
    }
}
