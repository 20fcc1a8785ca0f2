//! Web UI
//!
//! A single form page plus a few JSON endpoints. Sends run on the blocking
//! pool so one request holds one SMTP session until it finishes.

use crate::address::{parse_phone_entry, parse_recipient_list, Recipient};
use crate::carriers::CarrierGateway;
use crate::compose::{compose_email, compose_sms, OutboundMessage};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::presets::{ProviderPreset, Security};
use crate::providers::{CustomProvider, ProviderStore, RESERVED_NAME};
use crate::registry::Registry;
use crate::send::{send_message, DeliveryReport};
use crate::transport::{Credentials, MailTransport};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, RwLock};
use tokio::net::TcpListener;

/// Builds a fresh transport for each send
pub type TransportFactory = Arc<dyn Fn() -> Box<dyn MailTransport> + Send + Sync>;

/// Shared state behind every handler
pub struct AppState {
    config: Config,
    registry: RwLock<Arc<Registry>>,
    new_transport: TransportFactory,
    provider_edits: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config, registry: Registry, new_transport: TransportFactory) -> Self {
        Self {
            config,
            registry: RwLock::new(Arc::new(registry)),
            new_transport,
            provider_edits: Mutex::new(()),
        }
    }

    /// The registry as of now; later provider edits swap in a new value
    pub fn registry(&self) -> Arc<Registry> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Load, change and save the providers file under one lock, then
    /// publish a rebuilt registry
    fn edit_providers<T>(&self, edit: impl FnOnce(&mut ProviderStore) -> Result<T>) -> Result<T> {
        let _guard = self.provider_edits.lock().unwrap_or_else(|e| e.into_inner());

        let mut store = ProviderStore::new(&self.config);
        store.load()?;
        let outcome = edit(&mut store)?;

        let registry = Arc::new(Registry::load(&self.config));
        *self.registry.write().unwrap_or_else(|e| e.into_inner()) = registry;
        Ok(outcome)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/send/email", post(send_email_handler))
        .route("/send/sms", post(send_sms_handler))
        .route("/providers", post(add_provider_handler))
        .route("/providers/delete", post(delete_provider_handler))
        .route("/api/carriers", get(carriers_handler))
        .route("/api/presets", get(presets_handler))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let address = state.config.bind_address.clone();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(address = %listener.local_addr()?, "Web UI listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Web UI received shutdown signal");
        })
        .await?;

    tracing::info!("Web UI stopped");
    Ok(())
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EmailForm {
    provider: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    port: String,
    #[serde(default)]
    security: String,
    sender: String,
    password: String,
    recipients: String,
    #[serde(default)]
    subject: String,
    body: String,
}

#[derive(Debug, Deserialize)]
pub struct SmsForm {
    provider: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    port: String,
    #[serde(default)]
    security: String,
    sender: String,
    password: String,
    phones: String,
    carrier: String,
    body: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderForm {
    name: String,
    server: String,
    port: String,
    #[serde(default)]
    use_tls: Option<String>,
    #[serde(default)]
    use_ssl: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    name: String,
}

/// The selected preset, or an ad-hoc one when "custom" is chosen
fn select_preset(registry: &Registry, provider: &str, host: &str, port: &str, security: &str) -> Result<ProviderPreset> {
    if provider.eq_ignore_ascii_case(RESERVED_NAME) {
        let port = parse_port(port)?;
        let security = if security.trim().is_empty() {
            Security::StartTls
        } else {
            security.parse()?
        };
        let preset = ProviderPreset::custom(host, port, security);
        preset.validate()?;
        return Ok(preset);
    }
    registry.preset(provider).cloned()
}

fn parse_port(port: &str) -> Result<u16> {
    port.trim()
        .parse::<u16>()
        .map_err(|_| Error::InvalidPreset(format!("invalid port: {}", port.trim())))
}

fn require_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::Validation("sender password is required".to_string()));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_page(&state.registry(), None))
}

type Prepared = (ProviderPreset, Credentials, OutboundMessage);

fn prepare_email(registry: &Registry, form: &EmailForm) -> Result<Prepared> {
    let preset = select_preset(registry, &form.provider, &form.host, &form.port, &form.security)?;
    require_password(&form.password)?;
    let recipients: Vec<Recipient> = parse_recipient_list(&form.recipients)
        .into_iter()
        .map(Recipient::Email)
        .collect();
    let message = compose_email(&form.sender, &recipients, &form.subject, &form.body, registry)?;
    Ok((preset, Credentials::new(form.sender.trim(), form.password.clone()), message))
}

fn prepare_sms(registry: &Registry, form: &SmsForm) -> Result<Prepared> {
    let preset = select_preset(registry, &form.provider, &form.host, &form.port, &form.security)?;
    require_password(&form.password)?;
    let recipients = form
        .phones
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_phone_entry(line, Some(&form.carrier)))
        .collect::<Result<Vec<_>>>()?;
    let message = compose_sms(&form.sender, &recipients, &form.body, registry)?;
    Ok((preset, Credentials::new(form.sender.trim(), form.password.clone()), message))
}

async fn send_email_handler(State(state): State<Arc<AppState>>, Form(form): Form<EmailForm>) -> Response {
    let registry = state.registry();
    let prepared = prepare_email(&registry, &form);
    deliver(&state, &registry, prepared).await
}

async fn send_sms_handler(State(state): State<Arc<AppState>>, Form(form): Form<SmsForm>) -> Response {
    let registry = state.registry();
    let prepared = prepare_sms(&registry, &form);
    deliver(&state, &registry, prepared).await
}

/// Run the send off the async executor and render the outcome
async fn deliver(
    state: &AppState,
    registry: &Registry,
    prepared: Result<Prepared>,
) -> Response {
    let (preset, credentials, message) = match prepared {
        Ok(p) => p,
        Err(e) => return error_page(registry, &e),
    };

    let new_transport = state.new_transport.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut transport = new_transport();
        send_message(transport.as_mut(), &preset, &credentials, &message)
    })
    .await;

    match outcome {
        Ok(Ok(report)) => {
            tracing::info!(recipients = report.recipients.len(), provider = %report.provider, "Web send succeeded");
            (StatusCode::OK, Html(render_page(registry, Some(&Banner::sent(&report))))).into_response()
        }
        Ok(Err(e)) => {
            tracing::warn!("Web send failed: {}", e);
            error_page(registry, &e)
        }
        Err(e) => {
            tracing::error!("Send task panicked: {}", e);
            let banner = Banner::failed("Internal error while sending".to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, Html(render_page(registry, Some(&banner)))).into_response()
        }
    }
}

fn error_page(registry: &Registry, error: &Error) -> Response {
    let status = if error.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    };
    let banner = Banner::from_error(error);
    (status, Html(render_page(registry, Some(&banner)))).into_response()
}

fn save_provider(state: &AppState, form: &ProviderForm) -> Result<()> {
    let port = parse_port(&form.port)?;
    let provider = CustomProvider {
        server: form.server.trim().to_string(),
        port,
        use_tls: form.use_tls.is_some(),
        use_ssl: form.use_ssl.is_some(),
        description: form.description.trim().to_string(),
    };
    state.edit_providers(|store| store.add(&form.name, provider))
}

async fn add_provider_handler(State(state): State<Arc<AppState>>, Form(form): Form<ProviderForm>) -> Response {
    match save_provider(&state, &form) {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => error_page(&state.registry(), &e),
    }
}

async fn delete_provider_handler(State(state): State<Arc<AppState>>, Form(form): Form<DeleteForm>) -> Response {
    match state.edit_providers(|store| store.remove(&form.name)) {
        Ok(Some(_)) => Redirect::to("/").into_response(),
        Ok(None) => error_page(&state.registry(), &Error::UnknownProvider(form.name.trim().to_string())),
        Err(e) => error_page(&state.registry(), &e),
    }
}

async fn carriers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<CarrierGateway>> {
    Json(state.registry().carriers().to_vec())
}

async fn presets_handler(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderPreset>> {
    Json(state.registry().presets().to_vec())
}

// ============================================================================
// Rendering
// ============================================================================

/// Success or error banner shown above the forms
pub struct Banner {
    ok: bool,
    headline: String,
    details: Vec<String>,
}

impl Banner {
    fn sent(report: &DeliveryReport) -> Self {
        Self {
            ok: true,
            headline: format!(
                "Sent to {} recipient(s) via {}",
                report.recipients.len(),
                report.provider
            ),
            details: report.recipients.clone(),
        }
    }

    fn failed(headline: String) -> Self {
        Self {
            ok: false,
            headline,
            details: Vec::new(),
        }
    }

    /// Refused recipients are listed one per line with the server's reply
    fn from_error(error: &Error) -> Self {
        let mut banner = Self::failed(error.to_string());
        if let Error::RecipientsRejected { rejected, .. } = error {
            banner.details = rejected
                .iter()
                .map(|r| format!("{}: {}", r.recipient, r.reply))
                .collect();
        }
        banner
    }
}

const STYLE: &str = "body{font-family:sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem}\
fieldset{margin-bottom:1.5rem}label{display:block;margin-top:.5rem}\
input[type=text],input[type=email],input[type=password],textarea,select{width:100%;box-sizing:border-box}\
.banner{padding:.75rem;margin-bottom:1rem;border-radius:4px}.ok{background:#dfd}.err{background:#fdd}\
code{background:#eee;padding:0 .2rem}";

pub fn render_page(registry: &Registry, banner: Option<&Banner>) -> String {
    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Email &amp; SMS Messenger</title>\
         <style>{}</style></head><body><h1>Email &amp; SMS Messenger</h1>",
        STYLE
    );

    if let Some(banner) = banner {
        let class = if banner.ok { "ok" } else { "err" };
        let _ = write!(html, "<div class=\"banner {}\"><strong>{}</strong>", class, text(&banner.headline));
        if !banner.details.is_empty() {
            html.push_str("<ul>");
            for detail in &banner.details {
                let _ = write!(html, "<li>{}</li>", text(detail));
            }
            html.push_str("</ul>");
        }
        html.push_str("</div>");
    }

    let provider_options = provider_options(registry);
    let smtp_fields = smtp_fields(&provider_options);

    let _ = write!(
        html,
        "<fieldset><legend>Send Email</legend><form method=\"post\" action=\"/send/email\">{}\
         <label>Recipients (one per line or comma-separated)<textarea name=\"recipients\" rows=\"3\"></textarea></label>\
         <label>Subject<input type=\"text\" name=\"subject\"></label>\
         <label>Message<textarea name=\"body\" rows=\"8\"></textarea></label>\
         <button type=\"submit\">Send Emails</button></form></fieldset>",
        smtp_fields
    );

    let mut carrier_options = String::new();
    for carrier in registry.carriers() {
        let _ = write!(
            carrier_options,
            "<option value=\"{}\">{}</option>",
            attr(&carrier.key),
            text(&carrier.name)
        );
    }

    let _ = write!(
        html,
        "<fieldset><legend>Send SMS</legend><form method=\"post\" action=\"/send/sms\">{}\
         <label>Phone numbers (one per line; append <code>:carrier</code> to override)\
         <textarea name=\"phones\" rows=\"3\" placeholder=\"(555) 123-4567\"></textarea></label>\
         <label>Default carrier<select name=\"carrier\">{}</select></label>\
         <label>Message (160 characters per SMS)<textarea name=\"body\" rows=\"4\"></textarea></label>\
         <button type=\"submit\">Send SMS</button></form></fieldset>",
        smtp_fields, carrier_options
    );

    html.push_str("<fieldset><legend>Add SMTP Provider</legend><form method=\"post\" action=\"/providers\">\
         <label>Provider name<input type=\"text\" name=\"name\"></label>\
         <label>SMTP server<input type=\"text\" name=\"server\" placeholder=\"smtp.example.com\"></label>\
         <label>SMTP port<input type=\"text\" name=\"port\" value=\"587\"></label>\
         <label><input type=\"checkbox\" name=\"use_tls\" checked> Use STARTTLS</label>\
         <label><input type=\"checkbox\" name=\"use_ssl\"> Use SSL/TLS (implicit)</label>\
         <label>Description<input type=\"text\" name=\"description\"></label>\
         <button type=\"submit\">Save Provider</button></form></fieldset>");

    html.push_str("<h2>Providers</h2><ul>");
    for preset in registry.presets() {
        let _ = write!(
            html,
            "<li><strong>{}</strong> <code>{}</code> ({}) {}</li>",
            text(&preset.name),
            text(&preset.address()),
            preset.security(),
            text(&preset.description)
        );
    }
    html.push_str("</ul>");

    if registry.custom_count() > 0 {
        html.push_str("<form method=\"post\" action=\"/providers/delete\"><label>Delete saved provider \
             <input type=\"text\" name=\"name\"></label><button type=\"submit\">Delete</button></form>");
    }

    html.push_str("<h2>Carrier Email-to-SMS Gateways</h2><ul>");
    for carrier in registry.carriers() {
        let _ = write!(
            html,
            "<li><strong>{}</strong>: <code>[phone]@{}</code></li>",
            text(&carrier.name),
            text(&carrier.domain_suffix)
        );
    }
    html.push_str("</ul></body></html>");

    html
}

fn provider_options(registry: &Registry) -> String {
    let mut options = String::new();
    for preset in registry.presets() {
        let _ = write!(
            options,
            "<option value=\"{}\">{}</option>",
            attr(&preset.key),
            text(&preset.name)
        );
    }
    options.push_str("<option value=\"custom\">Custom</option>");
    options
}

fn smtp_fields(provider_options: &str) -> String {
    format!(
        "<label>Email provider<select name=\"provider\">{}</select></label>\
         <details><summary>Custom server</summary>\
         <label>SMTP server<input type=\"text\" name=\"host\"></label>\
         <label>SMTP port<input type=\"text\" name=\"port\" value=\"587\"></label>\
         <label>Security<select name=\"security\"><option value=\"starttls\">STARTTLS</option>\
         <option value=\"ssl\">SSL/TLS (implicit)</option><option value=\"none\">None</option></select></label>\
         </details>\
         <label>Your email<input type=\"email\" name=\"sender\"></label>\
         <label>App password<input type=\"password\" name=\"password\"></label>",
        provider_options
    )
}
