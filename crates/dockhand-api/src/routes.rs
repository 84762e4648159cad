//! Relative API paths, joined against the configured base URL by the client

pub fn stacks() -> String {
    "api/stacks".to_string()
}

pub fn stack(stack_name: &str) -> String {
    format!("api/stacks/{}", stack_name)
}

pub fn service(stack_name: &str, service_name: &str) -> String {
    format!("api/stacks/{}/{}", stack_name, service_name)
}

/// GET with an `offset` query polls a task's progress messages.
pub fn service_task(stack_name: &str, service_name: &str) -> String {
    format!("api/stacks/{}/{}/task", stack_name, service_name)
}

pub fn batch_update() -> String {
    "api/stacks/batch_update".to_string()
}

pub fn settings() -> String {
    "api/settings".to_string()
}

pub fn monitors() -> String {
    "api/monitor".to_string()
}

pub fn monitor(id: i64) -> String {
    format!("api/monitor/{}", id)
}

pub fn monitor_history(id: i64) -> String {
    format!("api/history/{}", id)
}

pub fn monitor_history_latest(id: i64) -> String {
    format!("api/history/{}/latest", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_routes() {
        assert_eq!(stacks(), "api/stacks");
        assert_eq!(stack("web"), "api/stacks/web");
        assert_eq!(service("web", "app"), "api/stacks/web/app");
        assert_eq!(service_task("web", "app"), "api/stacks/web/app/task");
        assert_eq!(batch_update(), "api/stacks/batch_update");
    }

    #[test]
    fn test_monitor_routes() {
        assert_eq!(settings(), "api/settings");
        assert_eq!(monitors(), "api/monitor");
        assert_eq!(monitor(7), "api/monitor/7");
        assert_eq!(monitor_history(7), "api/history/7");
        assert_eq!(monitor_history_latest(7), "api/history/7/latest");
    }
}
