//! SMTP Messenger - command line front end
//!
//! Send email and carrier-gateway SMS, manage custom providers, or start the web UI.

use clap::{Args, Parser, Subcommand};
use smtp_messenger::address::{parse_phone_entry, Recipient};
use smtp_messenger::compose::{compose_email, compose_sms, OutboundMessage};
use smtp_messenger::config::Config;
use smtp_messenger::interactive::{self, Prompter};
use smtp_messenger::presets::{ProviderPreset, Security};
use smtp_messenger::providers::{CustomProvider, ProviderStore};
use smtp_messenger::registry::Registry;
use smtp_messenger::send::{send_message, DeliveryReport};
use smtp_messenger::transport::{Credentials, MailTransport, SmtpTransport};
use smtp_messenger::web::{self, AppState, TransportFactory};
use smtp_messenger::{Error, Result};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SMTP Messenger - email and SMS over SMTP
#[derive(Parser)]
#[command(name = "smtp-messenger")]
#[command(about = "Send email and SMS (via carrier email-to-SMS gateways) over SMTP")]
struct Cli {
    /// Custom providers file (JSON)
    #[arg(long, global = true, env = "SMTP_MESSENGER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// SMTP server selection and login
#[derive(Args)]
struct SmtpArgs {
    /// Provider key or name (see `presets`)
    #[arg(short, long, default_value = "gmail")]
    provider: String,

    /// Custom SMTP server instead of a provider preset
    #[arg(long, conflicts_with = "provider")]
    host: Option<String>,

    /// Port for --host
    #[arg(long, default_value_t = 587)]
    port: u16,

    /// Implicit TLS for --host (usually port 465)
    #[arg(long, conflicts_with = "no_tls")]
    ssl: bool,

    /// Disable STARTTLS for --host
    #[arg(long)]
    no_tls: bool,

    /// Sender address, also used as the SMTP username
    #[arg(short, long, env = "SMTP_SENDER")]
    from: String,

    /// SMTP password (prompted for when absent)
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an email
    Email {
        #[command(flatten)]
        smtp: SmtpArgs,

        /// Recipient address (repeatable)
        #[arg(short, long = "to", required = true)]
        to: Vec<String>,

        /// Subject line
        #[arg(short, long, default_value = "")]
        subject: String,

        /// Message body
        #[arg(short, long)]
        message: String,
    },

    /// Send an SMS through carrier email-to-SMS gateways
    Sms {
        #[command(flatten)]
        smtp: SmtpArgs,

        /// Phone number, optionally `number:carrier` (repeatable)
        #[arg(long = "phone", required = true)]
        phones: Vec<String>,

        /// Carrier for numbers without one (see `carriers`)
        #[arg(short, long)]
        carrier: Option<String>,

        /// Message text (160 characters per SMS)
        #[arg(short, long)]
        message: String,
    },

    /// Prompt for everything and send one message
    Interactive,

    /// List supported carriers and their gateways
    Carriers,

    /// List SMTP provider presets, including saved custom ones
    Presets,

    /// Save a custom SMTP provider
    ProviderAdd {
        /// Provider name
        name: String,

        /// SMTP server
        #[arg(long)]
        server: String,

        #[arg(long, default_value_t = 587)]
        port: u16,

        /// Implicit TLS
        #[arg(long, conflicts_with = "no_tls")]
        ssl: bool,

        /// Disable STARTTLS
        #[arg(long)]
        no_tls: bool,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a saved custom SMTP provider
    ProviderRemove {
        /// Provider name
        name: String,
    },

    /// Run the web UI
    Serve {
        /// Listen address
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Quiet by default so command output stays readable; the server logs requests
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::default();
    if let Some(path) = cli.config {
        config = config.with_providers_file(path);
    }

    let result = match cli.command {
        Commands::Email {
            smtp,
            to,
            subject,
            message,
        } => cmd_email(&config, smtp, &to, &subject, &message),
        Commands::Sms {
            smtp,
            phones,
            carrier,
            message,
        } => cmd_sms(&config, smtp, &phones, carrier.as_deref(), &message),
        Commands::Interactive => cmd_interactive(&config),
        Commands::Carriers => cmd_carriers(&config),
        Commands::Presets => cmd_presets(&config),
        Commands::ProviderAdd {
            name,
            server,
            port,
            ssl,
            no_tls,
            description,
        } => cmd_provider_add(&config, &name, &server, port, ssl, no_tls, &description),
        Commands::ProviderRemove { name } => cmd_provider_remove(&config, &name),
        Commands::Serve { bind } => cmd_serve(config, bind),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Sending
// ============================================================================

fn security_flags(ssl: bool, no_tls: bool) -> Security {
    if ssl {
        Security::Implicit
    } else if no_tls {
        Security::None
    } else {
        Security::StartTls
    }
}

fn select_preset(registry: &Registry, smtp: &SmtpArgs) -> Result<ProviderPreset> {
    match &smtp.host {
        Some(host) => {
            let preset = ProviderPreset::custom(host, smtp.port, security_flags(smtp.ssl, smtp.no_tls));
            preset.validate()?;
            Ok(preset)
        }
        None => registry.preset(&smtp.provider).cloned(),
    }
}

fn credentials(smtp: SmtpArgs) -> Result<Credentials> {
    let password = match smtp.password {
        Some(p) => p,
        None => rpassword::prompt_password(format!("Password for {}: ", smtp.from))?,
    };
    Ok(Credentials::new(smtp.from, password))
}

fn new_transport(config: &Config) -> SmtpTransport {
    SmtpTransport::new(Duration::from_secs(config.smtp_timeout_secs))
}

/// Everything is validated before the password prompt and the connection
fn deliver(config: &Config, preset: &ProviderPreset, smtp: SmtpArgs, message: &OutboundMessage) -> Result<()> {
    let credentials = credentials(smtp)?;
    let mut transport = new_transport(config);

    println!(
        "Sending to {} recipient(s) via {} ({})...",
        message.recipients.len(),
        preset.name,
        preset.address()
    );
    let report = send_message(&mut transport, preset, &credentials, message)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &DeliveryReport) {
    println!(
        "Sent to {} recipient(s) via {}",
        report.recipients.len(),
        report.provider
    );
    for recipient in &report.recipients {
        println!("  {}", recipient);
    }
}

fn cmd_email(config: &Config, smtp: SmtpArgs, to: &[String], subject: &str, body: &str) -> Result<()> {
    let registry = Registry::load(config);
    let preset = select_preset(&registry, &smtp)?;
    let recipients: Vec<Recipient> = to.iter().map(|addr| Recipient::Email(addr.clone())).collect();
    let message = compose_email(&smtp.from, &recipients, subject, body, &registry)?;

    deliver(config, &preset, smtp, &message)
}

fn cmd_sms(config: &Config, smtp: SmtpArgs, phones: &[String], carrier: Option<&str>, body: &str) -> Result<()> {
    let registry = Registry::load(config);
    let preset = select_preset(&registry, &smtp)?;
    let recipients = phones
        .iter()
        .map(|entry| parse_phone_entry(entry, carrier))
        .collect::<Result<Vec<_>>>()?;
    let message = compose_sms(&smtp.from, &recipients, body, &registry)?;

    let chars = body.chars().count();
    if chars > config.sms_char_limit {
        println!(
            "Note: message is {} characters; carriers may split or truncate past {}",
            chars, config.sms_char_limit
        );
    }

    deliver(config, &preset, smtp, &message)
}

fn cmd_interactive(config: &Config) -> Result<()> {
    let registry = Registry::load(config);
    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let mut read_password = |prompt: &str| rpassword::prompt_password(prompt);
    let mut transport = new_transport(config);

    match interactive::run(&mut prompter, &registry, &mut read_password, &mut transport)? {
        Some(report) => print_report(&report),
        None => info!("Interactive send cancelled"),
    }
    Ok(())
}

// ============================================================================
// Listings and providers
// ============================================================================

fn cmd_carriers(config: &Config) -> Result<()> {
    let registry = Registry::load(config);
    println!("{:<14} {:<18} GATEWAY", "KEY", "CARRIER");
    for carrier in registry.carriers() {
        println!(
            "{:<14} {:<18} [phone]@{}",
            carrier.key, carrier.name, carrier.domain_suffix
        );
    }
    Ok(())
}

fn cmd_presets(config: &Config) -> Result<()> {
    let registry = Registry::load(config);
    println!("{:<20} {:<42} {:<9} DESCRIPTION", "KEY", "SERVER", "SECURITY");
    for preset in registry.presets() {
        println!(
            "{:<20} {:<42} {:<9} {}",
            preset.key,
            preset.address(),
            preset.security().to_string(),
            preset.description
        );
    }
    if registry.custom_count() > 0 {
        println!("\nCustom providers from {}", config.providers_file.display());
    }
    Ok(())
}

fn cmd_provider_add(
    config: &Config,
    name: &str,
    server: &str,
    port: u16,
    ssl: bool,
    no_tls: bool,
    description: &str,
) -> Result<()> {
    let security = security_flags(ssl, no_tls);
    let mut store = ProviderStore::new(config);
    store.load()?;
    let replaced = store.get(name.trim()).is_some();
    store.add(
        name,
        CustomProvider {
            server: server.trim().to_string(),
            port,
            use_tls: security == Security::StartTls,
            use_ssl: security == Security::Implicit,
            description: description.to_string(),
        },
    )?;

    let verb = if replaced { "Replaced" } else { "Saved" };
    println!("{} provider '{}' ({}:{}, {})", verb, name.trim(), server.trim(), port, security);
    Ok(())
}

fn cmd_provider_remove(config: &Config, name: &str) -> Result<()> {
    let mut store = ProviderStore::new(config);
    store.load()?;

    match store.remove(name)? {
        Some(_) => {
            println!("Removed provider '{}'", name.trim());
            Ok(())
        }
        None => Err(Error::UnknownProvider(name.trim().to_string())),
    }
}

// ============================================================================
// Web UI
// ============================================================================

fn cmd_serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.bind_address = bind;
    }

    let registry = Registry::load(&config);
    info!(
        presets = registry.presets().len(),
        custom = registry.custom_count(),
        "Loaded provider registry"
    );

    let timeout = Duration::from_secs(config.smtp_timeout_secs);
    let factory: TransportFactory =
        Arc::new(move || Box::new(SmtpTransport::new(timeout)) as Box<dyn MailTransport>);
    let state = Arc::new(AppState::new(config, registry, factory));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(web::serve(state))
}
