//! Update, watch and auto-update commands

use crate::commands::resolve_targets;
use crate::selector;
use anyhow::{anyhow, bail, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use dockhand_api::{ServiceKey, UpdateOptions};
use dockhand_core::{
    group_stages, Notification, PollEvent, PollOutcome, PollStatus, Severity, StackManager,
    SweepReport,
};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

/// Start update tasks for the given targets and watch them to completion.
pub async fn update(
    manager: &StackManager,
    targets: Vec<String>,
    options: UpdateOptions,
    yes: bool,
    detach: bool,
) -> Result<()> {
    let selection = if targets.is_empty() {
        selector::select_updates(manager).await?
    } else {
        resolve_targets(manager, &targets).await?
    };
    if selection.is_empty() {
        println!("Nothing to update.");
        return Ok(());
    }

    let total: usize = selection.values().map(Vec::len).sum();
    println!(
        "Updating {} service(s) in {} stack(s):",
        total,
        selection.len()
    );
    for (stack_name, services) in &selection {
        println!("  {}  {}", stack_name, services.join(", "));
    }

    if !yes && !confirm("Start the update tasks?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let report = manager.update_services(&selection, &options).await;
    tracing::debug!("Update report: {}", report.summary());
    for (stack_name, services) in &report.created {
        println!(
            "Started update for '{}' ({})",
            stack_name,
            services.join(", ")
        );
    }
    for stack_name in &report.already_running {
        println!("'{}' already has an update running, skipped", stack_name);
    }
    for stack_name in &report.gone {
        println!("'{}' is no longer known to the backend, skipped", stack_name);
    }
    for (stack_name, reason) in &report.failed {
        eprintln!("Could not start update for '{}': {}", stack_name, reason);
    }

    if detach {
        if !report.is_success() {
            bail!("{} update(s) could not be started", report.failed.len());
        }
        return Ok(());
    }

    let keys = report.started_keys();
    if keys.is_empty() {
        if !report.is_success() {
            bail!("No update tasks could be started");
        }
        return Ok(());
    }

    let outcomes = stream_progress(manager, keys).await;
    let failed = summarize(&outcomes);
    if failed > 0 || !report.is_success() {
        bail!(
            "{} update(s) did not finish cleanly",
            failed + report.failed.len()
        );
    }
    Ok(())
}

/// Attach to update tasks that are already running, e.g. ones another
/// dashboard client created, and print their progress.
pub async fn watch(manager: &StackManager, services: Vec<String>) -> Result<()> {
    let mut keys = Vec::with_capacity(services.len());
    for service in &services {
        keys.push(service.parse::<ServiceKey>().map_err(|err| anyhow!(err))?);
    }

    println!("Watching {} task(s), Ctrl-C detaches without stopping them", keys.len());
    let outcomes = stream_progress(manager, keys).await;
    let failed = summarize(&outcomes);
    if failed > 0 {
        bail!("Lost {} task(s) to polling errors", failed);
    }
    Ok(())
}

/// Run unattended sweeps over every stack with matured updates.
pub async fn auto_update(manager: &StackManager, once: bool) -> Result<()> {
    if once {
        println!("Sweeping for matured updates...");
        let report = manager.auto_updater().run_once().await?;
        print_sweep(&report);
        if !report.failed.is_empty() {
            bail!("{} stack(s) failed to update", report.failed.len());
        }
        return Ok(());
    }

    if !manager.config().auto_update.enabled {
        bail!(
            "Auto-update is disabled. Set 'auto_update.enabled = true' in the config, \
             or run a single sweep with 'dockhand auto --once'."
        );
    }

    let interval = manager.config().auto_update.interval();
    println!(
        "Sweeping every {}, Ctrl-C to stop",
        format_duration(interval)
    );
    let handle = Arc::new(manager.auto_updater()).spawn();
    tokio::signal::ctrl_c().await?;
    println!("Stopping after the current sweep...");
    handle.cancel();
    handle.join().await;
    Ok(())
}

/// Print poll events as they arrive until every watched task settles.
/// Ctrl-C stops watching; the backend tasks keep running.
async fn stream_progress(manager: &StackManager, keys: Vec<ServiceKey>) -> Vec<PollOutcome> {
    let mut handle = manager.watch(keys);
    let Some(mut events) = handle.events() else {
        return handle.join().await;
    };

    let mut feed = manager.notifications().subscribe();
    let mut last_stage: HashMap<ServiceKey, String> = HashMap::new();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => render_event(&mut last_stage, event),
                None => break,
            },
            notification = feed.recv() => {
                if let Some(notification) = notification {
                    render_notification(&notification);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted, detaching. The backend finishes the tasks on its own.");
                handle.cancel();
            }
        }
    }
    // Reconciliation posts its notification right before the event channel
    // closes, so a few may still be queued when the loop exits.
    while let Ok(notification) = feed.try_recv() {
        render_notification(&notification);
    }
    handle.join().await
}

fn render_notification(notification: &Notification) {
    match notification.severity {
        Severity::Error => eprintln!("! {}: {}", notification.title, notification.message),
        _ => println!("{}: {}", notification.title, notification.message),
    }
}

fn render_event(last_stage: &mut HashMap<ServiceKey, String>, event: PollEvent) {
    match event {
        PollEvent::Progress { key, messages } => {
            for message in messages {
                if last_stage.get(&key).map(String::as_str) != Some(message.stage.as_str()) {
                    println!("[{}] {}", key, message.stage);
                    last_stage.insert(key.clone(), message.stage.clone());
                }
                if let Some(text) = message.message {
                    println!("[{}]   {}", key, text);
                }
            }
        }
        PollEvent::Finished { key } => println!("[{}] update finished", key),
        PollEvent::Failed { key, error } => {
            eprintln!("[{}] lost progress updates: {}", key, error)
        }
    }
}

/// Print the final tally and a postmortem for failed tasks. Returns the
/// number of tasks that failed (cancelled ones count as neither).
fn summarize(outcomes: &[PollOutcome]) -> usize {
    let finished = outcomes.iter().filter(|o| o.is_finished()).count();
    println!();
    println!("{} of {} service(s) finished", finished, outcomes.len());

    let failed: Vec<_> = outcomes
        .iter()
        .filter(|outcome| matches!(outcome.status, PollStatus::Failed(_)))
        .collect();
    for outcome in &failed {
        eprintln!();
        eprintln!("Progress of {} before polling stopped:", outcome.key);
        for group in group_stages(outcome.history.messages()) {
            eprintln!("  {}", group.stage);
            for line in &group.lines {
                eprintln!("    {}", line);
            }
        }
    }
    failed.len()
}

fn print_sweep(report: &SweepReport) {
    println!("{}", report.summary());
    for update in &report.updated {
        println!(
            "  updated {}: {} ({}/{} finished)",
            update.stack_name,
            update.services.join(", "),
            update.finished,
            update.services.len()
        );
    }
    for stack_name in &report.skipped {
        println!("  skipped {}: update already running", stack_name);
    }
    for (stack_name, reason) in &report.failed {
        eprintln!("  failed  {}: {}", stack_name, reason);
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Confirmation needs a terminal. Pass --yes to skip the prompt.");
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()?)
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 86_400 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs >= 3_600 && secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
