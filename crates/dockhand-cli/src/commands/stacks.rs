//! Stack listing and inspection commands

use anyhow::Result;
use chrono::Utc;
use dockhand_api::{parse_interval, DockerService, DockerStack};
use dockhand_core::{order_services, FilterState, StackManager};
use std::time::Duration;

const NAME_WIDTH: usize = 30;
const STATUS_WIDTH: usize = 12;
const IMAGE_WIDTH: usize = 34;

/// List stacks and their services, optionally filtered.
pub async fn list(
    manager: &StackManager,
    updates_only: bool,
    matured_only: bool,
    search: Option<String>,
    no_cache: bool,
) -> Result<()> {
    let stacks = manager.list_stacks(no_cache).await?;

    let mut filters = FilterState::new();
    filters.updates_only = updates_only || matured_only;
    filters.matured_only = matured_only;
    if let Some(search) = search {
        filters.search = search;
    }

    // The maturity threshold lives in the backend settings; only fetch it
    // when the filter actually needs it.
    let mature_after = if matured_only {
        let settings = manager.backend().get_settings().await?;
        parse_interval(&settings.server.time_until_update_is_mature).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    };

    let stacks = filters.apply(&stacks, Utc::now(), mature_after);
    if stacks.is_empty() {
        println!("No matching services found.");
        println!();
        println!("Tip: 'dockhand list --no-cache' asks the backend for a fresh scan");
        return Ok(());
    }

    println!(
        "  {:<NAME_WIDTH$} {:<STATUS_WIDTH$} {:<IMAGE_WIDTH$} UPTIME",
        "SERVICE", "STATUS", "IMAGE"
    );
    println!("{}", "-".repeat(NAME_WIDTH + STATUS_WIDTH + IMAGE_WIDTH + 14));

    let mut services = 0;
    let mut with_updates = 0;
    for stack in &stacks {
        println!("{}", stack_heading(stack));
        for service in &stack.services {
            services += 1;
            if service.has_updates {
                with_updates += 1;
            }
            println!("{}", service_row(service));
        }
    }

    println!();
    println!(
        "{} service(s) in {} stack(s), {} with updates",
        services,
        stacks.len(),
        with_updates
    );
    Ok(())
}

fn stack_heading(stack: &DockerStack) -> String {
    let mut heading = format!("{} ({} running", stack.name, stack.running);
    if stack.exited > 0 {
        heading.push_str(&format!(", {} exited", stack.exited));
    }
    heading.push(')');
    if stack.has_updates {
        heading.push_str("  [updates available]");
    }
    heading
}

fn service_row(service: &DockerService) -> String {
    let marker = if service.has_updates { "*" } else { " " };
    let name = service
        .service_name
        .as_deref()
        .unwrap_or(service.name.as_str());
    format!(
        "{} {:<NAME_WIDTH$} {:<STATUS_WIDTH$} {:<IMAGE_WIDTH$} {}",
        marker,
        truncate(name, NAME_WIDTH),
        service.status.to_string(),
        truncate(&service.image.reference(), IMAGE_WIDTH),
        service.uptime
    )
}

/// Show one stack in detail.
pub async fn show(manager: &StackManager, name: &str) -> Result<()> {
    let stack = manager.get_stack(name).await?;

    println!("Stack: {}", stack.name);
    for file in &stack.config_files {
        println!("  compose file: {}", file);
    }
    println!(
        "  containers: {} running, {} exited, {} paused, {} restarting, {} created, {} dead",
        stack.running, stack.exited, stack.paused, stack.restarting, stack.created, stack.dead
    );
    println!();

    let mut services = stack.services.clone();
    order_services(&mut services);
    for service in &services {
        let display = service
            .service_name
            .as_deref()
            .unwrap_or(service.name.as_str());
        println!("{} ({})", display, service.name);
        println!("  status:  {} ({})", service.status, service.uptime);
        println!("  image:   {}", service.image.reference());
        if let Some(version) = &service.image.version {
            println!("  version: {}", version);
        }
        if service.has_updates {
            match (&service.image.latest_version, &service.image.latest_update) {
                (Some(version), Some(published)) => println!(
                    "  update:  {} (published {})",
                    version,
                    published.format("%Y-%m-%d")
                ),
                (Some(version), None) => println!("  update:  {}", version),
                (None, Some(published)) => {
                    println!("  update:  available (published {})", published.format("%Y-%m-%d"))
                }
                (None, None) => println!("  update:  available"),
            }
        }
        for port in &service.ports {
            println!("  port:    {}:{}", port.host_ip, port.host_port);
        }
        if let Some(url) = &service.homepage_url {
            println!("  link:    {}", url);
        }
        println!();
    }

    if stack.has_updates {
        println!("Tip: 'dockhand update {}' updates every service above with a pending update", stack.name);
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
