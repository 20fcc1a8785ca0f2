//! SMTP Messenger
//!
//! Sends email, and SMS through carrier email-to-SMS gateways, over a single
//! SMTP session per message. Shared by the CLI and the web UI.

pub mod address;
pub mod carriers;
pub mod compose;
pub mod config;
pub mod error;
pub mod interactive;
pub mod mocks;
pub mod presets;
pub mod providers;
pub mod registry;
pub mod send;
pub mod transport;
pub mod web;

pub use error::{Error, Result};
