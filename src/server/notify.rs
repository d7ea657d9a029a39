use crate::info;
use anyhow::{Context, Result};
use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;

/// Delivers a message to an identity's registered contact channel.
///
/// Blocking by contract; async callers go through `spawn_blocking`.
pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Plain-text mail over an implicit-TLS SMTP relay.
pub struct SmtpNotifier {
    from: Mailbox,
    mailer: SmtpTransport,
}

impl SmtpNotifier {
    pub fn new(host: &str, user: &str, password: &str) -> Result<Self> {
        let from: Mailbox = user
            .parse()
            .with_context(|| format!("Invalid sender address: {}", user))?;
        let creds = Credentials::new(user.to_string(), password.to_string());
        let mailer = SmtpTransport::relay(host)
            .with_context(|| format!("Failed to configure SMTP relay {}", host))?
            .credentials(creds)
            .build();

        Ok(SmtpNotifier { from, mailer })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse::<Mailbox>()
                .with_context(|| format!("Invalid recipient: {}", to))?)
            .subject(subject)
            .singlepart(SinglePart::plain(body.to_string()))?;

        self.mailer
            .send(&email)
            .with_context(|| format!("Failed to send email to {}", to))?;
        Ok(())
    }
}

/// Prints messages instead of sending them. Used when SMTP is not configured.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!("[mail to {}] {}: {}", to, subject, body.replace('\n', " "));
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every message in memory; can be switched to fail on demand.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<bool>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_to(&self, to: &str) -> Option<SentMessage> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Notifier for RecordingNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            anyhow::bail!("Delivery to {} refused", to);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

/// Pulls the first run of six digits out of a message body.
#[cfg(any(test, feature = "test-util"))]
pub fn extract_code(body: &str) -> Option<String> {
    body.as_bytes()
        .windows(6)
        .find(|w| w.iter().all(u8::is_ascii_digit))
        .map(|w| String::from_utf8_lossy(w).into_owned())
}

#[test]
fn test_recording_notifier() -> Result<()> {
    let notifier = RecordingNotifier::default();
    notifier.send("a@x.com", "Hi", "Your OTP code is: 004217.")?;

    let last = notifier.last_to("a@x.com").expect("message recorded");
    assert_eq!(last.subject, "Hi");
    assert_eq!(extract_code(&last.body).as_deref(), Some("004217"));

    notifier.set_failing(true);
    assert!(notifier.send("a@x.com", "Hi", "again").is_err());
    assert_eq!(notifier.sent().len(), 1);
    Ok(())
}
