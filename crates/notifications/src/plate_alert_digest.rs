use super::{template_names, MessageKind, Renderer};
use anyhow::Context;
use models::{AlertType, DetectedAlert, Severity};

/// Upper bound on the length of a digest SMS. Providers split longer bodies
/// into segments, and reject bodies over 1600 characters.
pub const SMS_MAX_CHARS: usize = 1500;

/// A single summary of many plate alerts, sent to the admin contacts.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestMessage {
    pub sms_body: String,
    pub email_subject: String,
    pub email_html: String,
    pub total: usize,
    pub urgent_count: usize,
}

#[derive(Debug, serde::Serialize)]
struct DigestContext<'a> {
    dealer_name: &'a str,
    total: usize,
    urgent_count: usize,
    has_urgent: bool,
    groups: Vec<GroupView<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct GroupView<'a> {
    heading: &'static str,
    alert_type: &'static str,
    count: usize,
    alerts: Vec<AlertView<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct AlertView<'a> {
    plate_number: &'a str,
    severity_label: &'static str,
    urgent: bool,
    detail: String,
    customer_name: Option<&'a str>,
    customer_phone: Option<&'a str>,
    vehicle_info: Option<&'a str>,
}

impl Renderer {
    /// Renders one digest covering all of `alerts`, grouped by alert type.
    /// Within a group, urgent alerts sort first and then by plate number.
    pub fn render_plate_alert_digest(
        &self,
        alerts: &[DetectedAlert],
    ) -> anyhow::Result<DigestMessage> {
        let context = digest_context(&self.dealer_name, alerts);
        let names = template_names(MessageKind::PlateAlertDigest);

        let email_subject = self
            .registry
            .render(&names.subject, &context)
            .context("rendering plate_alert_digest email subject")?;
        let content = self
            .registry
            .render(&names.body, &context)
            .context("rendering plate_alert_digest email body")?;
        let email_html = self.render_layout(&email_subject, &content, None)?;

        Ok(DigestMessage {
            sms_body: sms_body(&context, SMS_MAX_CHARS),
            email_subject,
            email_html,
            total: context.total,
            urgent_count: context.urgent_count,
        })
    }
}

fn digest_context<'a>(dealer_name: &'a str, alerts: &'a [DetectedAlert]) -> DigestContext<'a> {
    let mut groups = Vec::new();

    for alert_type in AlertType::all() {
        let mut members: Vec<&DetectedAlert> = alerts
            .iter()
            .filter(|a| a.alert_type == *alert_type)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by(|l, r| {
            r.severity
                .cmp(&l.severity)
                .then_with(|| l.plate_number.cmp(&r.plate_number))
        });

        groups.push(GroupView {
            heading: alert_type.heading(),
            alert_type: alert_type.name(),
            count: members.len(),
            alerts: members.into_iter().map(alert_view).collect(),
        });
    }

    let urgent_count = alerts
        .iter()
        .filter(|a| a.severity == Severity::Urgent)
        .count();

    DigestContext {
        dealer_name,
        total: alerts.len(),
        urgent_count,
        has_urgent: urgent_count > 0,
        groups,
    }
}

fn alert_view(alert: &DetectedAlert) -> AlertView<'_> {
    AlertView {
        plate_number: &alert.plate_number,
        severity_label: match alert.severity {
            Severity::Urgent => "URGENT",
            Severity::Warning => "WARNING",
        },
        urgent: alert.severity == Severity::Urgent,
        detail: detail(alert),
        customer_name: alert.customer_name.as_deref(),
        customer_phone: alert.customer_phone.as_deref(),
        vehicle_info: alert.vehicle_info.as_deref(),
    }
}

fn detail(alert: &DetectedAlert) -> String {
    match alert.alert_type {
        AlertType::OverdueRental => match alert.days_overdue {
            Some(1) => "1 day overdue".to_string(),
            Some(days) => format!("{days} days overdue"),
            None => "overdue".to_string(),
        },
        AlertType::ExpiringBuyerTag => match alert.days_until_expiry {
            Some(0) => "expires today".to_string(),
            Some(1) => "expires tomorrow".to_string(),
            Some(-1) => "expired yesterday".to_string(),
            Some(days) if days < 0 => format!("expired {} days ago", -days),
            Some(days) => format!("expires in {days} days"),
            None => "expiring".to_string(),
        },
        AlertType::Unaccounted => alert
            .reason
            .clone()
            .unwrap_or_else(|| "not accounted for".to_string()),
    }
}

/// Builds the plain-text digest. Alert lines which would push the body past
/// `max_chars` are replaced by a count of the omitted alerts.
fn sms_body(context: &DigestContext<'_>, max_chars: usize) -> String {
    // Room for the omission notice.
    const NOTICE_RESERVE: usize = 32;

    let mut body = format!(
        "{} plate alerts: {} urgent, {} total",
        context.dealer_name, context.urgent_count, context.total
    );
    let mut omitted = 0;

    for group in &context.groups {
        let heading = format!("\n{} ({}):", group.heading, group.count);
        let mut wrote_heading = false;

        for alert in &group.alerts {
            let mut line = format!("\n- {}", alert.plate_number);
            if alert.urgent {
                line.push_str(" [URGENT]");
            }
            line.push_str(": ");
            line.push_str(&alert.detail);
            if let Some(name) = alert.customer_name {
                line.push_str(&format!(" ({name})"));
            }

            let mut needed = char_len(&line);
            if !wrote_heading {
                needed += char_len(&heading);
            }
            if omitted > 0 || char_len(&body) + needed + NOTICE_RESERVE > max_chars {
                omitted += 1;
                continue;
            }
            if !wrote_heading {
                body.push_str(&heading);
                wrote_heading = true;
            }
            body.push_str(&line);
        }
    }

    if omitted > 0 {
        body.push_str(&format!("\n...and {omitted} more (see email)"));
    }
    body
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn register_templates(registry: &mut handlebars::Handlebars<'_>) -> anyhow::Result<()> {
    let names = template_names(MessageKind::PlateAlertDigest);

    registry
        .register_template_string(
            &names.subject,
            r#"Plate alerts: {{urgent_count}} urgent, {{total}} total"#,
        )
        .context("registering plate_alert_digest-subject template")?;

    registry
        .register_template_string(
            &names.body,
            r#"<h2 style="margin-top: 0;">Plate Alerts</h2>
{{#if has_urgent}}
<p style="font-size: 16px;"><strong style="color: #c62828;">{{urgent_count}} urgent</strong> of {{total}} open plate alerts need attention.</p>
{{else}}
<p style="font-size: 16px;">{{total}} open plate alerts need attention.</p>
{{/if}}
{{#each groups}}
<h3 style="margin-bottom: 8px;">{{heading}} ({{count}})</h3>
<table style="width: 100%; border-collapse: collapse; font-size: 14px;">
<tr style="text-align: left; border-bottom: 1px solid #cbd2d9;"><th>Plate</th><th>Severity</th><th>Details</th><th>Customer</th><th>Vehicle</th></tr>
{{#each alerts}}
<tr style="border-bottom: 1px solid #e4e7eb;"><td><strong>{{plate_number}}</strong></td><td><span style="color: #ffffff; border-radius: 4px; padding: 2px 6px; font-size: 12px; {{#if urgent}}background: #c62828;{{else}}background: #f0a202;{{/if}}">{{severity_label}}</span></td><td>{{detail}}</td><td>{{#if customer_name}}{{customer_name}}{{#if customer_phone}}<br>{{customer_phone}}{{/if}}{{/if}}</td><td>{{vehicle_info}}</td></tr>
{{/each}}
</table>
{{/each}}"#,
        )
        .context("registering plate_alert_digest-body template")?;

    Ok(())
}
