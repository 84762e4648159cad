//! Latency monitor commands

use anyhow::{bail, Result};
use dockhand_api::{MonitorCreate, MonitorPatch, PageQuery, RollingAverageQuery};
use dockhand_core::StackManager;

const ID_WIDTH: usize = 6;
const NAME_WIDTH: usize = 24;
const STATE_WIDTH: usize = 8;

/// List registered website monitors.
pub async fn monitor_list(manager: &StackManager) -> Result<()> {
    let monitors = manager.backend().list_monitors().await?;
    if monitors.is_empty() {
        println!("No monitors registered.");
        println!();
        println!("Tip: 'dockhand monitor add <name> <url>' registers one");
        return Ok(());
    }

    println!(
        "{:<ID_WIDTH$} {:<NAME_WIDTH$} {:<STATE_WIDTH$} URL",
        "ID", "NAME", "STATE"
    );
    println!("{}", "-".repeat(ID_WIDTH + NAME_WIDTH + STATE_WIDTH + 30));
    for monitor in &monitors {
        let state = if monitor.is_active { "active" } else { "paused" };
        println!(
            "{:<ID_WIDTH$} {:<NAME_WIDTH$} {:<STATE_WIDTH$} {}",
            monitor.id, monitor.name, state, monitor.url
        );
    }
    Ok(())
}

/// Register a website for latency monitoring.
pub async fn monitor_add(manager: &StackManager, name: String, url: String) -> Result<()> {
    let monitor = manager
        .backend()
        .create_monitor(&MonitorCreate { name, url })
        .await?;
    println!("Registered monitor #{} for {}", monitor.id, monitor.url);
    Ok(())
}

/// Remove a monitor together with its stored history.
pub async fn monitor_remove(manager: &StackManager, id: i64) -> Result<()> {
    manager.backend().delete_monitor(id).await?;
    println!("Removed monitor #{}", id);
    Ok(())
}

/// Pause or resume checks for a monitor.
pub async fn monitor_set_active(manager: &StackManager, id: i64, active: bool) -> Result<()> {
    let patch = MonitorPatch {
        is_active: Some(active),
        ..Default::default()
    };
    let monitor = manager.backend().update_monitor(id, &patch).await?;
    if monitor.is_active {
        println!("Monitor #{} ({}) is now active", monitor.id, monitor.name);
    } else {
        println!("Monitor #{} ({}) is paused", monitor.id, monitor.name);
    }
    Ok(())
}

/// Print stored latency samples, newest page first as the backend returns
/// them.
pub async fn monitor_history(
    manager: &StackManager,
    id: i64,
    limit: usize,
    offset: usize,
) -> Result<()> {
    let page = PageQuery {
        offset: Some(offset),
        limit: Some(limit),
    };
    let records = manager.backend().monitor_history(id, &page).await?;
    if records.is_empty() {
        println!("No samples recorded for monitor #{}.", id);
        return Ok(());
    }

    println!("{:<22} LATENCY", "TIME");
    println!("{}", "-".repeat(36));
    for record in &records {
        println!(
            "{:<22} {:>8.1} ms",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.latency_ms
        );
    }

    let average: f64 =
        records.iter().map(|r| r.latency_ms).sum::<f64>() / records.len() as f64;
    println!();
    println!("{} sample(s), {:.1} ms average", records.len(), average);
    Ok(())
}

/// Print the most recent sample, or a rolling average over the last
/// `window` samples.
pub async fn monitor_latest(
    manager: &StackManager,
    id: i64,
    rolling: bool,
    window: Option<u32>,
) -> Result<()> {
    if window.is_some() && !rolling {
        bail!("--window only applies together with --rolling");
    }
    let query = RollingAverageQuery {
        enabled: rolling,
        window,
    };
    let record = manager.backend().latest_history(id, &query).await?;
    if rolling {
        println!(
            "{:.1} ms rolling average (as of {})",
            record.latency_ms,
            record.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    } else {
        println!(
            "{:.1} ms at {}",
            record.latency_ms,
            record.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Delete every stored sample of a monitor.
pub async fn monitor_clear(manager: &StackManager, id: i64) -> Result<()> {
    let response = manager.backend().clear_history(id).await?;
    println!(
        "Deleted {} sample(s) for monitor #{}",
        response.deleted, id
    );
    Ok(())
}
