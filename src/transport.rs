//! SMTP transport
//!
//! The seam between the send operation and the mail client. `SmtpTransport`
//! drives lettre's low-level connection one step at a time so each stage can
//! report its own failure kind.

use crate::compose::OutboundMessage;
use crate::error::{Error, Rejection, Result};
use crate::presets::{ProviderPreset, Security};
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::{Credentials as SmtpCredentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt, Rset};
use lettre::transport::smtp::extension::{ClientId, Extension, MailBodyParameter, MailParameter};
use std::fmt;
use std::time::Duration;

/// Login for the SMTP server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One SMTP session's worth of operations
pub trait MailTransport: Send {
    /// Connect to the preset's server and negotiate TLS
    fn open(&mut self, preset: &ProviderPreset) -> Result<()>;

    fn authenticate(&mut self, credentials: &Credentials) -> Result<()>;

    /// Transmit one message to every envelope recipient
    fn send(&mut self, message: &OutboundMessage) -> Result<()>;

    /// End the session; must be safe to call after any failure
    fn close(&mut self);
}

/// `MailTransport` backed by a real SMTP server
pub struct SmtpTransport {
    timeout: Duration,
    connection: Option<SmtpConnection>,
}

impl SmtpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            connection: None,
        }
    }

    fn connection(&mut self) -> Result<&mut SmtpConnection> {
        self.connection
            .as_mut()
            .ok_or_else(|| Error::ConnectionFailed("session is not open".to_string()))
    }
}

impl MailTransport for SmtpTransport {
    fn open(&mut self, preset: &ProviderPreset) -> Result<()> {
        let hello = ClientId::default();
        let security = preset.security();
        let tls = match security {
            Security::None => None,
            _ => Some(
                TlsParameters::new(preset.host.clone())
                    .map_err(|e| Error::ConnectionFailed(format!("TLS setup for {}: {}", preset.host, e)))?,
            ),
        };

        tracing::info!(server = %preset.address(), %security, "Opening SMTP session");

        let implicit = match security {
            Security::Implicit => tls.as_ref(),
            _ => None,
        };
        let mut connection = SmtpConnection::connect(
            (preset.host.as_str(), preset.port),
            Some(self.timeout),
            &hello,
            implicit,
            None,
        )
        .map_err(|e| Error::ConnectionFailed(format!("{}: {}", preset.address(), e)))?;

        if let (Security::StartTls, Some(params)) = (security, tls.as_ref()) {
            if !connection.can_starttls() {
                connection.abort();
                return Err(Error::ConnectionFailed(format!(
                    "{} does not offer STARTTLS",
                    preset.address()
                )));
            }
            if let Err(e) = connection.starttls(params, &hello) {
                connection.abort();
                return Err(Error::ConnectionFailed(format!("STARTTLS with {}: {}", preset.address(), e)));
            }
        }

        self.connection = Some(connection);
        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let smtp_credentials =
            SmtpCredentials::new(credentials.username.clone(), credentials.password.clone());
        self.connection()?
            .auth(&[Mechanism::Plain, Mechanism::Login], &smtp_credentials)
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;
        tracing::info!(user = %credentials.username, "Authenticated");
        Ok(())
    }

    /// Every recipient gets its own RCPT TO; if any is refused the
    /// transaction is reset and no DATA is sent
    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        let (envelope, bytes) = message.render()?;
        let connection = self.connection()?;
        let parameters = mail_parameters(connection, &envelope, &bytes)?;

        connection
            .command(Mail::new(envelope.from().cloned(), parameters))
            .map_err(|e| Error::SendFailed(format!("MAIL FROM: {}", e)))?;

        let mut rejected = Vec::new();
        for recipient in envelope.to() {
            if let Err(e) = connection.command(Rcpt::new(recipient.clone(), Vec::new())) {
                tracing::warn!(%recipient, "Recipient refused: {}", e);
                rejected.push(Rejection {
                    recipient: recipient.to_string(),
                    reply: e.to_string(),
                });
            }
        }

        if !rejected.is_empty() {
            if let Err(e) = connection.command(Rset) {
                tracing::debug!("RSET failed: {}", e);
            }
            return Err(Error::RecipientsRejected {
                attempted: envelope.to().len(),
                rejected,
            });
        }

        connection
            .command(Data)
            .map_err(|e| Error::SendFailed(format!("DATA: {}", e)))?;
        connection
            .message(&bytes)
            .map_err(|e| Error::SendFailed(e.to_string()))?;
        tracing::info!(recipients = message.recipients.len(), "Message accepted");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.quit() {
                tracing::debug!("QUIT failed, dropping connection: {}", e);
                connection.abort();
            }
            tracing::info!("SMTP session closed");
        }
    }
}

/// SMTPUTF8 and 8BITMIME when the envelope or body needs them
fn mail_parameters(connection: &SmtpConnection, envelope: &Envelope, bytes: &[u8]) -> Result<Vec<MailParameter>> {
    let server = connection.server_info();
    let mut parameters = Vec::new();

    let non_ascii_address = envelope
        .from()
        .into_iter()
        .chain(envelope.to())
        .any(|address| !address.user().is_ascii() || !address.domain().is_ascii());
    if non_ascii_address {
        if !server.supports_feature(Extension::SmtpUtfEight) {
            return Err(Error::SendFailed(
                "non-ASCII address but the server does not support SMTPUTF8".to_string(),
            ));
        }
        parameters.push(MailParameter::SmtpUtfEight);
    }

    if !bytes.is_ascii() {
        if !server.supports_feature(Extension::EightBitMime) {
            return Err(Error::SendFailed(
                "non-ASCII message but the server does not support 8BITMIME".to_string(),
            ));
        }
        parameters.push(MailParameter::Body(MailBodyParameter::EightBitMime));
    }

    Ok(parameters)
}

impl Drop for SmtpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
