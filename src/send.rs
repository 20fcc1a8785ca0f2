//! The send operation: one call, one SMTP session, one message

use crate::compose::OutboundMessage;
use crate::error::Result;
use crate::presets::ProviderPreset;
use crate::transport::{Credentials, MailTransport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::{Deref, DerefMut};

/// What a successful send delivered, and where
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub provider: String,
    pub recipients: Vec<String>,
    pub sent_at: DateTime<Utc>,
}

/// An open transport session; closes it when dropped
struct Session<'a, T: MailTransport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: MailTransport + ?Sized> Session<'a, T> {
    fn open(transport: &'a mut T, preset: &ProviderPreset) -> Result<Self> {
        transport.open(preset)?;
        Ok(Self { transport })
    }
}

impl<T: MailTransport + ?Sized> Deref for Session<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: MailTransport + ?Sized> DerefMut for Session<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: MailTransport + ?Sized> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

/// Open a session, authenticate, send `message` to its full recipient list
/// and close the session on every exit path. Nothing is retried.
pub fn send_message<T: MailTransport + ?Sized>(
    transport: &mut T,
    preset: &ProviderPreset,
    credentials: &Credentials,
    message: &OutboundMessage,
) -> Result<DeliveryReport> {
    preset.validate()?;

    let mut session = Session::open(transport, preset)?;
    session.authenticate(credentials)?;
    session.send(message)?;
    drop(session);

    Ok(DeliveryReport {
        provider: preset.name.clone(),
        recipients: message.recipients.clone(),
        sent_at: Utc::now(),
    })
}
