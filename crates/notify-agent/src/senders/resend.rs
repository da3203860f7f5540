use super::SendOutcome;
use anyhow::Context;
use derivative::Derivative;

/// Sends emails using the resend API.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ResendSender {
    #[derivative(Debug = "ignore")]
    api_key: String,
    from_address: String,
    reply_to_address: Option<String>,
    api_base: url::Url,
    #[derivative(Debug = "ignore")]
    http_client: reqwest::Client,
}

#[derive(serde::Serialize)]
struct CreateEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct CreatedEmail {
    id: String,
}

impl ResendSender {
    pub fn new(
        api_key: String,
        from_address: String,
        reply_to_address: Option<String>,
        api_base: url::Url,
        http_client: reqwest::Client,
    ) -> ResendSender {
        ResendSender {
            api_key,
            from_address,
            reply_to_address,
            api_base,
            http_client,
        }
    }

    #[tracing::instrument(level = "debug", skip(self, html))]
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> SendOutcome {
        let outcome = SendOutcome::from(self.try_send(to, subject, html).await);
        if let Some(error) = &outcome.error {
            tracing::warn!(%to, %error, "failed to send email");
        } else {
            tracing::debug!(%to, email_id = ?outcome.provider_message_id, "sent email");
        }
        outcome
    }

    async fn try_send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<String> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("resend API url cannot be a base"))?
            .pop_if_empty()
            .push("emails");

        let request = CreateEmail {
            from: &self.from_address,
            to: [to],
            subject,
            html,
            reply_to: self.reply_to_address.as_deref(),
        };
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("calling resend API")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("resend API responded with {status}: {text}");
        }

        let CreatedEmail { id } = response
            .json()
            .await
            .context("parsing resend API response")?;
        Ok(id)
    }
}
