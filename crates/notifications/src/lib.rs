//! Rendering of customer registration notices and admin plate-alert digests.
//!
//! All templates are registered once, when the `Renderer` is constructed at
//! startup, and the `Renderer` is then shared by reference with every pipeline
//! run. Each kind of message has up to three templates: an SMS body, an email
//! subject, and an email body. Email bodies are wrapped in a common layout.
//!
//! SMS bodies and subjects are plain text, and use triple-stash expressions
//! so that handlebars does not HTML-escape them. Email bodies use the regular
//! escaping expressions for any customer-provided value.
use anyhow::Context;
use models::{Registration, Stage};

mod plate_alert_digest;
mod registration_rejected;
mod stage_update;

pub use plate_alert_digest::{DigestMessage, SMS_MAX_CHARS};

/// The kinds of messages that can be rendered. The name of each kind is
/// recorded as the template identifier in the notification log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    StageUpdate,
    RegistrationRejected,
    PlateAlertDigest,
}

impl MessageKind {
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::StageUpdate => "stage_update",
            MessageKind::RegistrationRejected => "registration_rejected",
            MessageKind::PlateAlertDigest => "plate_alert_digest",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) struct TemplateNames {
    pub sms: String,
    pub subject: String,
    pub body: String,
}

pub(crate) fn template_names(kind: MessageKind) -> TemplateNames {
    let name = kind.name();
    TemplateNames {
        sms: format!("{name}-sms"),
        subject: format!("{name}-subject"),
        body: format!("{name}-body"),
    }
}

const LAYOUT: &str = "layout";

const LAYOUT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
</head>
<body style="font-family: Arial, Helvetica, sans-serif; color: #1f2933; background: #f5f7fa; margin: 0; padding: 24px;">
<div style="max-width: 600px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 24px;">
{{{content}}}
<p style="color: #52606d; font-size: 14px; margin-top: 32px;">{{dealer_name}}</p>
{{#if unsubscribe_url}}
<p style="color: #9aa5b1; font-size: 12px;">Don't want these updates? <a href="{{{unsubscribe_url}}}" style="color: #9aa5b1;">Unsubscribe</a>.</p>
{{/if}}
</div>
</body>
</html>
"#;

/// A rendered notice for a registration stage change.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationNotice {
    pub kind: MessageKind,
    pub sms_body: String,
    pub email_subject: String,
    pub email_html: String,
}

#[derive(Debug)]
pub struct Renderer {
    registry: handlebars::Handlebars<'static>,
    site_base_url: url::Url,
    dealer_name: String,
}

impl Renderer {
    pub fn try_new(
        site_base_url: url::Url,
        dealer_name: impl Into<String>,
    ) -> anyhow::Result<Renderer> {
        if site_base_url.cannot_be_a_base() {
            anyhow::bail!("site base url '{site_base_url}' cannot be used as a base for links");
        }

        let mut registry = handlebars::Handlebars::new();
        registry
            .register_template_string(LAYOUT, LAYOUT_TEMPLATE)
            .context("registering layout template")?;
        stage_update::register_templates(&mut registry)?;
        registration_rejected::register_templates(&mut registry)?;
        plate_alert_digest::register_templates(&mut registry)?;

        Ok(Renderer {
            registry,
            site_base_url,
            dealer_name: dealer_name.into(),
        })
    }

    pub fn dealer_name(&self) -> &str {
        &self.dealer_name
    }

    /// Returns the public tracking link for an order. The access token is a
    /// capability: possession of the link is sufficient to view the status.
    pub fn tracking_url(&self, order_id: &str, access_token: &str) -> anyhow::Result<url::Url> {
        let mut url = self.site_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("site base url cannot be a base"))?
            .pop_if_empty()
            .extend(["track", order_id]);
        url.query_pairs_mut().append_pair("token", access_token);
        Ok(url)
    }

    /// Returns the link which turns off notifications for a registration.
    pub fn unsubscribe_url(
        &self,
        registration_id: uuid::Uuid,
        access_token: &str,
    ) -> anyhow::Result<url::Url> {
        let mut url = self.site_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("site base url cannot be a base"))?
            .pop_if_empty()
            .push("unsubscribe");
        url.query_pairs_mut()
            .append_pair("id", &registration_id.to_string())
            .append_pair("token", access_token);
        Ok(url)
    }

    /// Renders the notice sent to a customer when their registration moves
    /// to `new_stage`. A `Rejected` stage uses the rejection templates, and
    /// every other stage uses the stage update templates.
    pub fn render_registration_notice(
        &self,
        registration: &Registration,
        old_stage: Option<Stage>,
        new_stage: Stage,
    ) -> anyhow::Result<RegistrationNotice> {
        let kind = if new_stage.is_rejected() {
            MessageKind::RegistrationRejected
        } else {
            MessageKind::StageUpdate
        };
        let tracking_url = self.tracking_url(&registration.order_id, &registration.access_token)?;
        let unsubscribe_url =
            self.unsubscribe_url(registration.id, &registration.access_token)?;

        let context = stage_update::NoticeContext::new(
            &self.dealer_name,
            registration,
            old_stage,
            new_stage,
            tracking_url.to_string(),
            unsubscribe_url.to_string(),
        );

        let names = template_names(kind);
        let sms_body = self
            .registry
            .render(&names.sms, &context)
            .with_context(|| format!("rendering {kind} sms body"))?;
        let email_subject = self
            .registry
            .render(&names.subject, &context)
            .with_context(|| format!("rendering {kind} email subject"))?;
        let content = self
            .registry
            .render(&names.body, &context)
            .with_context(|| format!("rendering {kind} email body"))?;
        let email_html = self.render_layout(&email_subject, &content, Some(&context.unsubscribe_url))?;

        Ok(RegistrationNotice {
            kind,
            sms_body,
            email_subject,
            email_html,
        })
    }

    fn render_layout(
        &self,
        title: &str,
        content: &str,
        unsubscribe_url: Option<&str>,
    ) -> anyhow::Result<String> {
        let data = serde_json::json!({
            "title": title,
            "content": content,
            "dealer_name": self.dealer_name,
            "unsubscribe_url": unsubscribe_url,
        });
        self.registry
            .render(LAYOUT, &data)
            .context("rendering email layout")
    }
}

/// Returns the first word of a customer name, for greetings.
pub(crate) fn first_name(customer_name: &str) -> &str {
    customer_name.split_whitespace().next().unwrap_or("there")
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use chrono::TimeZone;
    use models::{NotificationPreference, Registration, Stage};

    pub fn renderer() -> super::Renderer {
        super::Renderer::try_new(
            url::Url::parse("https://dealer.test/").unwrap(),
            "Lone Star Motors",
        )
        .unwrap()
    }

    pub fn registration() -> Registration {
        Registration {
            id: uuid::Uuid::from_u128(0x5eed),
            order_id: "ORD-1042".to_string(),
            access_token: "tok_abc123".to_string(),
            vehicle_year: Some(2019),
            vehicle_make: Some("Toyota".to_string()),
            vehicle_model: Some("Camry".to_string()),
            vin: Some("4T1B11HK5KU123456".to_string()),
            customer_name: "Maria Lopez".to_string(),
            customer_phone: Some("(512) 555-0142".to_string()),
            customer_email: Some("maria@example.test".to_string()),
            notification_preference: NotificationPreference::Both,
            stage: Stage::StickerReady,
            rejection_notes: None,
            created_at: chrono::Utc.with_ymd_and_hms(2026, 9, 1, 15, 0, 0).unwrap(),
        }
    }
}
