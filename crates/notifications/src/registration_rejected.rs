use super::{template_names, MessageKind};
use anyhow::Context;

pub fn register_templates(registry: &mut handlebars::Handlebars<'_>) -> anyhow::Result<()> {
    let names = template_names(MessageKind::RegistrationRejected);

    registry
        .register_template_string(
            &names.sms,
            r#"{{{dealer_name}}}: Hi {{{first_name}}}, the DMV returned the registration for your {{#if vehicle}}{{{vehicle}}}{{else}}vehicle{{/if}}.{{#if rejection_notes}} Reason: {{{rejection_notes}}}.{{/if}} Our team is correcting it and will resubmit. Track it here: {{{tracking_url}}}"#,
        )
        .context("registering registration_rejected-sms template")?;

    registry
        .register_template_string(
            &names.subject,
            r#"Action needed on your registration (Order {{{order_id}}})"#,
        )
        .context("registering registration_rejected-subject template")?;

    registry
        .register_template_string(
            &names.body,
            r#"<h2 style="margin-top: 0;">Your registration was returned by the DMV</h2>
<p>Hi {{first_name}},</p>
<p>The DMV returned the title and registration application for your {{#if vehicle}}{{vehicle}}{{else}}vehicle{{/if}} (order {{order_id}}).</p>
{{#if rejection_notes}}
<blockquote style="border-left: 4px solid #c62828; margin: 16px 0; padding: 8px 16px; background: #fdecea;">{{rejection_notes}}</blockquote>
{{/if}}
<p>{{stage.description}} We'll contact you if we need anything from you.</p>
<p><a href="{{{tracking_url}}}" style="display: inline-block; background: #0b69a3; color: #ffffff; padding: 10px 18px; border-radius: 4px; text-decoration: none;">Track your registration</a></p>"#,
        )
        .context("registering registration_rejected-body template")?;

    Ok(())
}
