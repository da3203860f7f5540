use super::SendOutcome;
use anyhow::Context;
use derivative::Derivative;

/// Sends SMS messages using the Twilio Messages API.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TwilioSender {
    account_sid: String,
    #[derivative(Debug = "ignore")]
    auth_token: String,
    from_number: String,
    api_base: url::Url,
    #[derivative(Debug = "ignore")]
    http_client: reqwest::Client,
}

#[derive(serde::Deserialize)]
struct CreatedMessage {
    sid: String,
}

impl TwilioSender {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        api_base: url::Url,
        http_client: reqwest::Client,
    ) -> TwilioSender {
        TwilioSender {
            account_sid,
            auth_token,
            from_number,
            api_base,
            http_client,
        }
    }

    #[tracing::instrument(level = "debug", skip(self, body), fields(from = %self.from_number))]
    pub async fn send(&self, to: &str, body: &str) -> SendOutcome {
        let outcome = SendOutcome::from(self.try_send(to, body).await);
        if let Some(error) = &outcome.error {
            tracing::warn!(%to, %error, "failed to send sms");
        } else {
            tracing::debug!(%to, message_id = ?outcome.provider_message_id, "sent sms");
        }
        outcome
    }

    async fn try_send(&self, to: &str, body: &str) -> anyhow::Result<String> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("twilio API url cannot be a base"))?
            .pop_if_empty()
            .extend(["2010-04-01", "Accounts", &self.account_sid, "Messages.json"]);

        let response = self
            .http_client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", to),
                ("From", self.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .context("calling twilio API")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("twilio API responded with {status}: {text}");
        }

        let CreatedMessage { sid } = response
            .json()
            .await
            .context("parsing twilio API response")?;
        Ok(sid)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::serve_locally;
    use axum::http::{HeaderMap, StatusCode};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>;

    fn twilio_router(captured: Captured, respond_with: StatusCode) -> axum::Router {
        axum::Router::new().route(
            "/2010-04-01/Accounts/AC123/Messages.json",
            axum::routing::post(
                move |headers: HeaderMap,
                      axum::Form(form): axum::Form<HashMap<String, String>>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    captured.lock().unwrap().push((auth, form));

                    if respond_with.is_success() {
                        (respond_with, axum::Json(serde_json::json!({"sid": "SM0001"})))
                    } else {
                        (
                            respond_with,
                            axum::Json(serde_json::json!({
                                "code": 21211,
                                "message": "The 'To' number is not a valid phone number.",
                            })),
                        )
                    }
                },
            ),
        )
    }

    fn sender(api_base: url::Url) -> TwilioSender {
        TwilioSender::new(
            "AC123".to_string(),
            "secret".to_string(),
            "+15125550100".to_string(),
            api_base,
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn test_twilio_send_success() {
        let captured = Captured::default();
        let base = serve_locally(twilio_router(captured.clone(), StatusCode::CREATED)).await;

        let outcome = sender(base).send("+15125550142", "Hello & welcome").await;
        assert_eq!(SendOutcome::delivered("SM0001"), outcome);

        let captured = captured.lock().unwrap();
        assert_eq!(1, captured.len());
        let (auth, form) = &captured[0];
        // base64("AC123:secret")
        assert_eq!(Some("Basic QUMxMjM6c2VjcmV0"), auth.as_deref());
        assert_eq!("+15125550142", form["To"]);
        assert_eq!("+15125550100", form["From"]);
        assert_eq!("Hello & welcome", form["Body"]);
    }

    #[tokio::test]
    async fn test_twilio_error_response_is_a_failed_outcome() {
        let captured = Captured::default();
        let base = serve_locally(twilio_router(captured, StatusCode::BAD_REQUEST)).await;

        let outcome = sender(base).send("+1555", "Hello").await;
        assert!(!outcome.success);
        assert_eq!(None, outcome.provider_message_id);
        let error = outcome.error.unwrap();
        assert!(error.starts_with("twilio API responded with 400 Bad Request:"), "{error}");
        assert!(error.contains("not a valid phone number"), "{error}");
    }

    #[tokio::test]
    async fn test_twilio_unreachable() {
        // Nothing listens on the discard port.
        let base = url::Url::parse("http://127.0.0.1:9/").unwrap();
        let outcome = sender(base).send("+15125550142", "Hello").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("calling twilio API: "));
    }
}
