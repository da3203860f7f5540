//! Channel adapters for SMS and email. Adapters are pure I/O: they make one
//! provider call per send, and report the outcome instead of returning errors,
//! so that a pipeline can record a failed attempt and carry on.
mod resend;
mod twilio;

pub use resend::ResendSender;
pub use twilio::TwilioSender;

/// The result of a single send attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn delivered(provider_message_id: impl Into<String>) -> SendOutcome {
        SendOutcome {
            success: true,
            provider_message_id: Some(provider_message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> SendOutcome {
        SendOutcome {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }
}

impl From<anyhow::Result<String>> for SendOutcome {
    fn from(result: anyhow::Result<String>) -> Self {
        match result {
            Ok(id) => SendOutcome::delivered(id),
            // Alternate formatting renders the chain of causes.
            Err(err) => SendOutcome::failed(format!("{err:#}")),
        }
    }
}

pub trait SmsSender: std::fmt::Debug + Send + Sync + 'static {
    /// Sends `body` to the E.164 phone number `to`.
    fn send<'s>(
        &'s self,
        to: &'s str,
        body: &'s str,
    ) -> impl std::future::Future<Output = SendOutcome> + Send + 's;
}

pub trait EmailSender: std::fmt::Debug + Send + Sync + 'static {
    fn send<'s>(
        &'s self,
        to: &'s str,
        subject: &'s str,
        html: &'s str,
    ) -> impl std::future::Future<Output = SendOutcome> + Send + 's;
}

#[derive(Debug)]
pub enum SmsProvider {
    Disabled,
    Twilio(TwilioSender),
}

impl SmsSender for SmsProvider {
    async fn send<'s>(&'s self, to: &'s str, body: &'s str) -> SendOutcome {
        match self {
            SmsProvider::Disabled => {
                tracing::warn!(%to, "skipping sending sms (disabled)");
                SendOutcome::failed("sms provider is not configured")
            }
            SmsProvider::Twilio(twilio) => twilio.send(to, body).await,
        }
    }
}

#[derive(Debug)]
pub enum EmailProvider {
    Disabled,
    Resend(ResendSender),
}

impl EmailSender for EmailProvider {
    async fn send<'s>(&'s self, to: &'s str, subject: &'s str, html: &'s str) -> SendOutcome {
        match self {
            EmailProvider::Disabled => {
                tracing::warn!(%to, %subject, "skipping sending email (disabled)");
                SendOutcome::failed("email provider is not configured")
            }
            EmailProvider::Resend(resend) => resend.send(to, subject, html).await,
        }
    }
}

/// Normalizes a phone number on file to E.164. Ten digit numbers are taken
/// to be North American. Returns None if the number can't be normalized.
pub fn to_e164(phone: &str) -> Option<String> {
    let phone = phone.trim();
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();

    if phone.starts_with('+') {
        return (8..=15).contains(&digits.len()).then(|| format!("+{digits}"));
    }
    match digits.len() {
        10 => Some(format!("+1{digits}")),
        11 if digits.starts_with('1') => Some(format!("+{digits}")),
        _ => None,
    }
}

/// Returns the email address, trimmed, if it looks deliverable.
pub fn valid_email(email: &str) -> Option<&str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Some(email),
        _ => None,
    }
}
