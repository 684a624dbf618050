use crate::config::{JobParams, TriggerConfig};
use crate::digest;
use crate::error::JobError;
use crate::model::{DeliveryOutcome, JobOutput, ReportWindow, WebhookPayload, WeeklyReport};
use crate::notify::{Notifier, WebhookNotifier};
use crate::store::StatsStore;
use anyhow::Context;
use chrono::{Local, NaiveDate};
use std::path::Path;
use tracing::{info, warn};

/// Reads the store once; the connection is closed when this returns.
fn collect(params: &JobParams, window: &ReportWindow) -> Result<WeeklyReport, JobError> {
    let store = StatsStore::open(&params.dsn)?;
    let report = store.weekly_report(&params.email, window)?;
    Ok(report)
}

/// Builds the payload without sending it.
pub fn prepare(params: &JobParams, today: NaiveDate) -> Result<WebhookPayload, JobError> {
    if params.email.trim().is_empty() {
        return Err(JobError::EmptyAccount);
    }
    let window = ReportWindow::preceding(today);
    let report = collect(params, &window)?;
    info!(
        email = %params.email,
        week = %window.label(),
        rows = report.rows.len(),
        repos = report.repo_count,
        "collected weekly stats"
    );

    let message = digest::compose(&report, &window, &params.link);
    Ok(WebhookPayload::new(&message, &params.channel))
}

/// Runs the weekly digest: query, format, deliver.
///
/// Store failures abort before anything is sent. Delivery failures are
/// reported as [`DeliveryOutcome::Failed`].
pub fn run(
    params: &JobParams,
    today: NaiveDate,
    notifier: &dyn Notifier,
) -> Result<DeliveryOutcome, JobError> {
    let payload = prepare(params, today)?;

    match notifier.deliver(&payload) {
        Ok(()) => {
            info!(channel = %params.channel, "digest posted");
            Ok(DeliveryOutcome::Posted)
        }
        Err(e) => {
            warn!(channel = %params.channel, error = %e, "digest delivery failed");
            Ok(DeliveryOutcome::Failed {
                reason: e.to_string(),
            })
        }
    }
}

pub fn exec(
    config_path: Option<&Path>,
    params_json: Option<&str>,
    overrides: TriggerConfig,
    today: Option<NaiveDate>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let trigger = TriggerConfig::load(config_path, params_json, overrides)
        .context("Failed to load trigger configuration")?
        .resolve()
        .context("Incomplete trigger configuration")?;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    if dry_run {
        let payload = prepare(&trigger.job, today).map_err(|e| report_error(&e))?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let webhook = trigger
        .webhook
        .context("Incomplete trigger configuration: missing required setting 'webhook'")?;
    let notifier = WebhookNotifier::new(webhook, trigger.timeout)
        .context("Failed to build webhook client")?;

    let outcome = run(&trigger.job, today, &notifier).map_err(|e| report_error(&e))?;
    print_output(&JobOutput::Message(outcome.message().to_string()))?;
    match outcome {
        DeliveryOutcome::Posted => Ok(()),
        DeliveryOutcome::Failed { reason } => Err(anyhow::anyhow!("failed to post: {reason}")),
    }
}

fn report_error(err: &JobError) -> anyhow::Error {
    if let Err(print_err) = print_output(&JobOutput::Error(err.to_string())) {
        return print_err;
    }
    anyhow::anyhow!("weekly digest aborted: {err}")
}

fn print_output(output: &JobOutput) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(output)?);
    Ok(())
}
