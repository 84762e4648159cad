//! CLI command implementations

mod monitor;
mod settings;
mod stacks;
mod update;

use anyhow::{anyhow, Result};
use dockhand_api::ServiceKey;
use dockhand_core::StackManager;
use std::collections::{BTreeMap, HashSet};

pub use monitor::*;
pub use settings::*;
pub use stacks::*;
pub use update::*;

/// Resolve command-line targets into a per-stack selection.
///
/// `stack/service` picks exactly that service. A bare stack name expands
/// to every service of that stack with a pending update.
async fn resolve_targets(
    manager: &StackManager,
    targets: &[String],
) -> Result<BTreeMap<String, Vec<String>>> {
    let mut selection: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for target in targets {
        if let Ok(key) = target.parse::<ServiceKey>() {
            selection
                .entry(key.stack_name)
                .or_default()
                .push(key.service_name);
            continue;
        }

        let stack = manager.get_stack(target).await?;
        let services: Vec<String> = stack
            .services
            .iter()
            .filter(|service| service.has_updates)
            .filter_map(|service| service.service_name.clone())
            .collect();
        if services.is_empty() {
            return Err(anyhow!(
                "No services with pending updates in stack '{}'",
                stack.name
            ));
        }
        selection.entry(stack.name).or_default().extend(services);
    }

    // A stack named both bare and as stack/service would double up
    for services in selection.values_mut() {
        let mut seen = HashSet::new();
        services.retain(|service| seen.insert(service.clone()));
    }

    Ok(selection)
}
