//! Mock transport for testing
//!
//! Records every session call in order and can be told to fail one stage.

use crate::compose::OutboundMessage;
use crate::error::{Error, Rejection, Result};
use crate::presets::ProviderPreset;
use crate::transport::{Credentials, MailTransport};
use std::sync::{Arc, Mutex};

/// A recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `host:port`
    Open(String),
    /// username
    Authenticate(String),
    /// envelope recipients
    Send(Vec<String>),
    Close,
}

/// Stage at which the mock should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    Authenticate,
    Send,
}

/// Transport that records calls instead of talking to a server
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_at: Option<Stage>,
    refused: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    /// Refuse these envelope recipients at send time, as a server would at RCPT TO
    pub fn refusing(recipients: &[&str]) -> Self {
        Self {
            refused: recipients.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Snapshot of the calls so far; clones share one log
    pub fn calls(&self) -> Vec<Call> {
        self.log().to_vec()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.log().iter().filter(|c| predicate(c)).count()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
        // Poisoning only means another test panicked mid-record
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: Call) {
        self.log().push(call);
    }
}

impl MailTransport for RecordingTransport {
    fn open(&mut self, preset: &ProviderPreset) -> Result<()> {
        self.record(Call::Open(preset.address()));
        match self.fail_at {
            Some(Stage::Open) => Err(Error::ConnectionFailed(format!("{} unreachable", preset.address()))),
            _ => Ok(()),
        }
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        self.record(Call::Authenticate(credentials.username.clone()));
        match self.fail_at {
            Some(Stage::Authenticate) => Err(Error::AuthenticationFailed(
                "535 5.7.8 Username and Password not accepted".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        self.record(Call::Send(message.recipients.clone()));

        let rejected: Vec<Rejection> = message
            .recipients
            .iter()
            .filter(|r| self.refused.contains(r))
            .map(|r| Rejection {
                recipient: r.clone(),
                reply: "permanent error (550): 5.1.1 no such user".to_string(),
            })
            .collect();
        if !rejected.is_empty() {
            return Err(Error::RecipientsRejected {
                attempted: message.recipients.len(),
                rejected,
            });
        }

        match self.fail_at {
            Some(Stage::Send) => Err(Error::SendFailed("550 5.1.1 Mailbox unavailable".to_string())),
            _ => Ok(()),
        }
    }

    fn close(&mut self) {
        self.record(Call::Close);
    }
}
