//! `operation start` and `operation wait`, with spinner output while waiting

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use rmctl_core::{
    ExistencePolicy, Method, OperationReference, OperationRequest, OperationState, Poller,
    ProgressEvent, ResourceClient, WaitOptions,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::print_json;
use crate::cli::{OperationCommands, WaitArgs};
use crate::connection::ConnectionManager;

pub async fn handle_operation_command(
    conn_mgr: &ConnectionManager,
    profile_name: Option<&str>,
    command: &OperationCommands,
) -> Result<()> {
    let client = conn_mgr.resource_client(profile_name, ExistencePolicy::Strict)?;

    match command {
        OperationCommands::Start {
            method,
            target,
            body,
            resource,
            wait,
            wait_args,
        } => {
            let body = body.as_deref().map(parse_body).transpose()?;
            let request = OperationRequest::new(*method, target.clone(), body);
            let location = resource.clone().or_else(|| default_location(*method, target));

            let mut poller: Poller<Value> = client
                .begin(&request, location)
                .await
                .with_context(|| format!("{} {} failed", method, target))?;

            match poller.reference().cloned() {
                None => {
                    let result = poller.wait_for_completion(&WaitOptions::new()).await?;
                    print_json(&result)
                }
                Some(reference) if !*wait => {
                    print_json(&json!({
                        "reference": reference,
                        "status": OperationState::InProgress.to_string(),
                    }))?;
                    eprintln!(
                        "To wait for completion, run: rmctl operation wait '{}'",
                        reference
                    );
                    Ok(())
                }
                Some(_) => {
                    let result = wait_with_progress(&client, &mut poller, wait_args).await?;
                    print_json(&result)
                }
            }
        }
        OperationCommands::Wait {
            reference,
            resource,
            wait_args,
        } => {
            let mut poller: Poller<Value> = Poller::resume(
                client.transport().clone(),
                client.polling(),
                OperationReference::new(reference.clone()),
                resource.clone(),
            );
            let result = wait_with_progress(&client, &mut poller, wait_args).await?;
            print_json(&result)
        }
    }
}

/// PUT and PATCH materialize the resource they target
fn default_location(method: Method, target: &str) -> Option<String> {
    matches!(method, Method::Put | Method::Patch).then(|| target.to_string())
}

/// Inline JSON, or `@path` to read it from a file
fn parse_body(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read body from {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Request body is not valid JSON")
}

/// Wait for `poller`, driving a spinner and cancelling on Ctrl-C
async fn wait_with_progress(
    client: &ResourceClient,
    poller: &mut Poller<Value>,
    args: &WaitArgs,
) -> Result<Value> {
    let cancel = CancellationToken::new();
    let mut options = match args.wait_timeout {
        Some(secs) => WaitOptions::new().with_timeout(Duration::from_secs(secs)),
        None => client.default_wait_options(),
    }
    .with_cancellation(cancel.clone());

    let spinner = (!args.no_progress).then(progress_spinner);
    if let Some(pb) = &spinner {
        let pb = pb.clone();
        options = options.on_progress(move |event| update_spinner(&pb, &event));
    }

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let result = poller.wait_for_completion(&options).await;
    ctrl_c.abort();

    if let Some(pb) = spinner
        && !pb.is_finished()
    {
        pb.finish_and_clear();
    }

    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_resumable() => {
            debug!(error = %e, "Wait interrupted");
            match poller.reference() {
                Some(reference) => bail!(
                    "{}\nThe operation may still be running. Resume with: rmctl operation wait '{}'",
                    e,
                    reference
                ),
                None => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn progress_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Waiting for operation");
    pb
}

fn update_spinner(pb: &ProgressBar, event: &ProgressEvent) {
    match event {
        ProgressEvent::Started { reference } => {
            pb.set_message(format!("Operation {} started", reference));
        }
        ProgressEvent::Polling { state, attempt, .. } => {
            pb.set_message(format!("{} (poll {})", format_state(*state), attempt));
        }
        ProgressEvent::Completed { .. } => {
            pb.finish_with_message(format_state(OperationState::Succeeded));
        }
        ProgressEvent::Failed { error, .. } => {
            pb.finish_with_message(format!("\u{2717} {}", error));
        }
    }
}

/// Format operation state for display with status icons
fn format_state(state: OperationState) -> String {
    match state {
        OperationState::Succeeded => format!("\u{2713} {}", state),
        OperationState::Failed => format!("\u{2717} {}", state),
        OperationState::Canceled => format!("\u{2298} {}", state),
        OperationState::InProgress => format!("\u{21bb} {}", state),
    }
}
