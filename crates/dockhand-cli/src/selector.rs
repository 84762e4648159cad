//! Interactive service selection for the update command

use anyhow::{bail, Result};
use dialoguer::{theme::ColorfulTheme, MultiSelect};
use dockhand_core::{order_services, StackManager};
use std::collections::BTreeMap;
use std::io::IsTerminal;

/// One selectable row in the update picker.
#[derive(Debug, Clone)]
struct Candidate {
    stack_name: String,
    service_name: String,
    label: String,
}

/// Let the user pick services with pending updates from a checklist.
///
/// Returns the chosen services grouped by stack. An empty map means the
/// user confirmed an empty selection, not an error.
pub async fn select_updates(manager: &StackManager) -> Result<BTreeMap<String, Vec<String>>> {
    if !std::io::stdin().is_terminal() {
        bail!("Interactive selection needs a terminal. Pass targets as arguments instead, e.g. 'dockhand update mystack/myservice'.");
    }

    let stacks = manager.list_stacks(false).await?;
    let mut candidates = Vec::new();
    for stack in &stacks {
        let mut services: Vec<_> = stack
            .services
            .iter()
            .filter(|service| service.has_updates)
            .cloned()
            .collect();
        order_services(&mut services);
        for service in services {
            let Some(service_name) = service.service_name.clone() else {
                continue;
            };
            candidates.push(Candidate {
                label: format!(
                    "{}/{} ({})",
                    stack.name,
                    service_name,
                    service.image.reference()
                ),
                stack_name: stack.name.clone(),
                service_name,
            });
        }
    }

    if candidates.is_empty() {
        bail!("No services with pending updates. Run 'dockhand list --updates' to check again later.");
    }

    let labels: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
    let chosen = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select services to update (space to toggle, enter to confirm)")
        .items(&labels)
        .interact()?;

    let mut selection: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for index in chosen {
        let candidate = &candidates[index];
        selection
            .entry(candidate.stack_name.clone())
            .or_default()
            .push(candidate.service_name.clone());
    }
    Ok(selection)
}
