//! Interactive mode - walk the user through one send on the terminal

use crate::address::{parse_phone_entry, parse_recipient_list, Recipient};
use crate::compose::{compose_email, compose_sms, MessageKind, OutboundMessage};
use crate::error::{Error, Result};
use crate::presets::{ProviderPreset, Security};
use crate::providers::RESERVED_NAME;
use crate::registry::Registry;
use crate::send::{send_message, DeliveryReport};
use crate::transport::{Credentials, MailTransport};
use std::io::{self, BufRead, Write};

/// Line-oriented prompts over any reader/writer pair
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        Ok(())
    }

    /// Print `label: ` and read one trimmed line
    pub fn ask(&mut self, label: &str) -> Result<String> {
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::Validation("input ended before the message was complete".to_string()));
        }
        Ok(line.trim().to_string())
    }

    pub fn ask_default(&mut self, label: &str, default: &str) -> Result<String> {
        let answer = self.ask(&format!("{} [{}]", label, default))?;
        Ok(if answer.is_empty() { default.to_string() } else { answer })
    }

    /// Read lines until an empty one (or end of input)
    pub fn ask_lines(&mut self, label: &str) -> Result<Vec<String>> {
        writeln!(self.output, "{} (finish with an empty line):", label)?;
        self.output.flush()?;

        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                break;
            }
            lines.push(line.to_string());
        }
        Ok(lines)
    }

    pub fn confirm(&mut self, label: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} [y/N]", label))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

/// Everything needed for one send
#[derive(Debug)]
pub struct Draft {
    pub preset: ProviderPreset,
    pub credentials: Credentials,
    pub message: OutboundMessage,
}

fn choose_preset<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    registry: &Registry,
) -> Result<ProviderPreset> {
    prompter.say("Providers:")?;
    for (i, preset) in registry.presets().iter().enumerate() {
        prompter.say(&format!("  {:>2}. {:<20} {}", i + 1, preset.name, preset.address()))?;
    }
    prompter.say("      custom               enter server details")?;

    let choice = prompter.ask_default("Provider (number, key or name)", "gmail")?;
    if choice.eq_ignore_ascii_case(RESERVED_NAME) {
        let host = prompter.ask("SMTP server")?;
        let port = prompter
            .ask_default("SMTP port", "587")?
            .parse::<u16>()
            .map_err(|e| Error::InvalidPreset(format!("port: {}", e)))?;
        let security: Security = prompter.ask_default("Security (starttls/ssl/none)", "starttls")?.parse()?;
        return Ok(ProviderPreset::custom(&host, port, security));
    }

    if let Ok(n) = choice.parse::<usize>() {
        return registry
            .presets()
            .get(n.wrapping_sub(1))
            .cloned()
            .ok_or(Error::UnknownProvider(choice));
    }

    registry.preset(&choice).cloned()
}

/// Prompt for every field and compose the message; nothing is sent
pub fn collect<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    registry: &Registry,
    read_password: &mut dyn FnMut(&str) -> io::Result<String>,
) -> Result<Draft> {
    let kind = match prompter.ask_default("Send (e)mail or (s)ms", "e")?.to_ascii_lowercase().as_str() {
        "e" | "email" => MessageKind::Email,
        "s" | "sms" => MessageKind::Sms,
        other => return Err(Error::Validation(format!("unknown mode: {}", other))),
    };

    let preset = choose_preset(prompter, registry)?;
    let sender = prompter.ask("Your email")?;
    let password = read_password("App password: ")?;
    let credentials = Credentials::new(sender.clone(), password);

    let message = match kind {
        MessageKind::Email => {
            let recipients: Vec<Recipient> = parse_recipient_list(&prompter.ask("Recipients (comma-separated)")?)
                .into_iter()
                .map(Recipient::Email)
                .collect();
            let subject = prompter.ask("Subject")?;
            let body = prompter.ask_lines("Message")?.join("\n");
            compose_email(&sender, &recipients, &subject, &body, registry)?
        }
        MessageKind::Sms => {
            let keys: Vec<&str> = registry.carriers().iter().map(|c| c.key.as_str()).collect();
            prompter.say(&format!("Carriers: {}", keys.join(", ")))?;
            let default_carrier = prompter.ask_default("Default carrier", "att")?;
            let recipients = prompter
                .ask_lines("Phone numbers, one per line as number[:carrier]")?
                .iter()
                .map(|line| parse_phone_entry(line, Some(&default_carrier)))
                .collect::<Result<Vec<_>>>()?;
            let body = prompter.ask_lines("Message")?.join("\n");
            compose_sms(&sender, &recipients, &body, registry)?
        }
    };

    Ok(Draft {
        preset,
        credentials,
        message,
    })
}

/// Collect a draft, confirm it and send; `Ok(None)` when the user declines
pub fn run<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    registry: &Registry,
    read_password: &mut dyn FnMut(&str) -> io::Result<String>,
    transport: &mut dyn MailTransport,
) -> Result<Option<DeliveryReport>> {
    let draft = collect(prompter, registry, read_password)?;

    prompter.say(&format!(
        "\nSending via {} ({}) to:",
        draft.preset.name,
        draft.preset.address()
    ))?;
    for recipient in &draft.message.recipients {
        prompter.say(&format!("  {}", recipient))?;
    }
    if !prompter.confirm("Send now?")? {
        prompter.say("Cancelled")?;
        return Ok(None);
    }

    let report = send_message(transport, &draft.preset, &draft.credentials, &draft.message)?;
    Ok(Some(report))
}
