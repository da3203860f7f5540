use super::{template_names, MessageKind};
use anyhow::Context;
use models::{Registration, Stage, FORWARD_STAGES};

/// Template data shared by the stage update and rejection templates.
#[derive(Debug, serde::Serialize)]
pub(crate) struct NoticeContext<'a> {
    pub dealer_name: &'a str,
    pub customer_name: &'a str,
    pub first_name: &'a str,
    pub order_id: &'a str,
    pub vehicle: Option<String>,
    pub vin: Option<&'a str>,
    pub stage: StageView,
    pub previous_stage: Option<StageView>,
    pub total_stages: u8,
    pub steps: Vec<StepView>,
    pub rejection_notes: Option<&'a str>,
    pub tracking_url: String,
    pub unsubscribe_url: String,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct StageView {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub ordinal: u8,
}

impl From<Stage> for StageView {
    fn from(stage: Stage) -> Self {
        let info = stage.info();
        StageView {
            key: stage.name(),
            label: info.label,
            description: info.description,
            ordinal: info.ordinal,
        }
    }
}

/// One entry of the progress list in the email body.
#[derive(Debug, serde::Serialize)]
pub(crate) struct StepView {
    pub label: &'static str,
    pub ordinal: u8,
    pub complete: bool,
    pub current: bool,
}

impl<'a> NoticeContext<'a> {
    pub fn new(
        dealer_name: &'a str,
        registration: &'a Registration,
        old_stage: Option<Stage>,
        new_stage: Stage,
        tracking_url: String,
        unsubscribe_url: String,
    ) -> NoticeContext<'a> {
        let current = new_stage.info().ordinal;
        let steps = Stage::all()
            .iter()
            .filter(|stage| !stage.is_rejected())
            .map(|stage| {
                let info = stage.info();
                StepView {
                    label: info.label,
                    ordinal: info.ordinal,
                    complete: info.ordinal < current,
                    current: info.ordinal == current,
                }
            })
            .collect();

        NoticeContext {
            dealer_name,
            customer_name: &registration.customer_name,
            first_name: super::first_name(&registration.customer_name),
            order_id: &registration.order_id,
            vehicle: registration.vehicle_description(),
            vin: registration.vin.as_deref(),
            stage: new_stage.into(),
            previous_stage: old_stage.map(Into::into),
            total_stages: FORWARD_STAGES,
            steps,
            rejection_notes: registration
                .rejection_notes
                .as_deref()
                .map(str::trim)
                .filter(|notes| !notes.is_empty()),
            tracking_url,
            unsubscribe_url,
        }
    }
}

pub fn register_templates(registry: &mut handlebars::Handlebars<'_>) -> anyhow::Result<()> {
    let names = template_names(MessageKind::StageUpdate);

    registry
        .register_template_string(
            &names.sms,
            r#"{{{dealer_name}}}: Hi {{{first_name}}}, your {{#if vehicle}}{{{vehicle}}} {{/if}}registration is now at step {{stage.ordinal}} of {{total_stages}}: {{{stage.label}}}. {{{stage.description}}} Track it here: {{{tracking_url}}}"#,
        )
        .context("registering stage_update-sms template")?;

    registry
        .register_template_string(
            &names.subject,
            r#"Registration update: {{{stage.label}}} (Order {{{order_id}}})"#,
        )
        .context("registering stage_update-subject template")?;

    registry
        .register_template_string(
            &names.body,
            r#"<h2 style="margin-top: 0;">Registration update: {{stage.label}}</h2>
<p>Hi {{first_name}},</p>
<p>The registration for your {{#if vehicle}}{{vehicle}}{{else}}vehicle{{/if}} (order {{order_id}}) is now at step {{stage.ordinal}} of {{total_stages}}: <strong>{{stage.label}}</strong>.</p>
<p>{{stage.description}}</p>
{{#if previous_stage}}
<p style="color: #52606d; font-size: 14px;">Previous step: {{previous_stage.label}}</p>
{{/if}}
<ol style="padding-left: 20px;">
{{#each steps}}
<li style="{{#if current}}font-weight: bold; color: #0b69a3;{{else}}{{#if complete}}color: #3f9142;{{else}}color: #9aa5b1;{{/if}}{{/if}}">{{label}}{{#if complete}} &#10003;{{/if}}</li>
{{/each}}
</ol>
<p><a href="{{{tracking_url}}}" style="display: inline-block; background: #0b69a3; color: #ffffff; padding: 10px 18px; border-radius: 4px; text-decoration: none;">Track your registration</a></p>
{{#if vin}}
<p style="color: #52606d; font-size: 12px;">VIN {{vin}}</p>
{{/if}}"#,
        )
        .context("registering stage_update-body template")?;

    Ok(())
}
