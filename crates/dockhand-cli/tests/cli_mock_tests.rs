//! Mock-based command tests.
//!
//! These tests call command functions directly with a `StackManager`
//! backed by a `MockBackend`, avoiding any real Docking Station backend.
//! Interactive prompts are never reached: the test process has no TTY, so
//! command paths that would prompt must bail out before doing work.

use dockhand_api::{stages, ApiError, ProgressMessage, ServiceKey, UpdateOptions};
use dockhand_cli::commands::{self, SettingsUpdate};
use dockhand_config::GlobalConfig;
use dockhand_core::test_support::{
    mock_history_record, mock_service, mock_stack, MockBackend, MockCall,
};
use dockhand_core::StackManager;
use std::sync::Arc;

fn fast_config() -> GlobalConfig {
    let mut config = GlobalConfig::default();
    config.updates.poll_interval_ms = 1;
    config
}

/// Manager over a mock backend serving one "web" stack with an updatable
/// "app" service and an up-to-date "db" service.
fn web_stack_manager() -> (Arc<MockBackend>, StackManager) {
    let backend = Arc::new(MockBackend::new());
    backend.put_stacks(vec![mock_stack(
        "web",
        vec![
            mock_service("web", "app", true),
            mock_service("web", "db", false),
        ],
    )]);
    let manager = StackManager::new(backend.clone(), fast_config());
    (backend, manager)
}

fn finish_script(backend: &MockBackend, key: &ServiceKey) {
    backend.script_poll(
        key,
        vec![Ok(vec![
            ProgressMessage::new(stages::STARTING),
            ProgressMessage::new(stages::FINISHED),
        ])],
    );
}

// ---- tests ----

#[tokio::test]
async fn test_list_renders_stacks() {
    let (backend, manager) = web_stack_manager();

    let result = commands::list(&manager, false, false, None, false).await;
    assert!(result.is_ok());
    assert!(backend.was_called(&MockCall::ListStacks { no_cache: false }));
}

#[tokio::test]
async fn test_list_no_cache_is_forwarded() {
    let (backend, manager) = web_stack_manager();

    let result = commands::list(&manager, false, false, None, true).await;
    assert!(result.is_ok());
    assert!(backend.was_called(&MockCall::ListStacks { no_cache: true }));
}

#[tokio::test]
async fn test_list_propagates_backend_failure() {
    let (backend, manager) = web_stack_manager();
    backend.fail_list(ApiError::Connection("connection refused".to_string()));

    let result = commands::list(&manager, false, false, None, false).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_show_unknown_stack_fails() {
    let (_backend, manager) = web_stack_manager();

    let result = commands::show(&manager, "ghost").await;
    assert!(result.is_err());
    assert!(
        result.unwrap_err().to_string().contains("not found"),
        "Expected 'not found' error",
    );
}

#[tokio::test]
async fn test_update_with_explicit_target() {
    let (backend, manager) = web_stack_manager();
    finish_script(&backend, &ServiceKey::new("web", "app"));

    let result = commands::update(
        &manager,
        vec!["web/app".to_string()],
        UpdateOptions::default(),
        true,
        false,
    )
    .await;
    assert!(result.is_ok(), "update failed: {:?}", result);

    assert_eq!(backend.batch_requests(), vec![vec!["web/app".to_string()]]);
    let polled = backend
        .get_calls()
        .iter()
        .any(|call| matches!(call, MockCall::PollTask { .. }));
    assert!(polled, "Expected the update to watch its task");
}

#[tokio::test]
async fn test_update_bare_stack_expands_to_updatable_services() {
    let (backend, manager) = web_stack_manager();
    finish_script(&backend, &ServiceKey::new("web", "app"));

    let result = commands::update(
        &manager,
        vec!["web".to_string()],
        UpdateOptions::default(),
        true,
        false,
    )
    .await;
    assert!(result.is_ok(), "update failed: {:?}", result);

    // db has no pending update, so only app is in the batch
    assert_eq!(backend.batch_requests(), vec![vec!["web/app".to_string()]]);
}

#[tokio::test]
async fn test_update_detach_skips_watching() {
    let (backend, manager) = web_stack_manager();

    let result = commands::update(
        &manager,
        vec!["web/app".to_string()],
        UpdateOptions::default(),
        true,
        true,
    )
    .await;
    assert!(result.is_ok());

    assert_eq!(backend.batch_requests().len(), 1);
    let polled = backend
        .get_calls()
        .iter()
        .any(|call| matches!(call, MockCall::PollTask { .. }));
    assert!(!polled, "Detached update must not poll");
}

#[tokio::test]
async fn test_update_refuses_without_confirmation_outside_tty() {
    let (backend, manager) = web_stack_manager();

    let result = commands::update(
        &manager,
        vec!["web/app".to_string()],
        UpdateOptions::default(),
        false,
        false,
    )
    .await;
    assert!(result.is_err());
    assert!(
        result.unwrap_err().to_string().contains("--yes"),
        "Expected a hint about --yes",
    );
    assert!(
        backend.batch_requests().is_empty(),
        "Nothing may be created before confirmation"
    );
}

#[tokio::test]
async fn test_update_unknown_stack_target_fails() {
    let (backend, manager) = web_stack_manager();

    let result = commands::update(
        &manager,
        vec!["ghost".to_string()],
        UpdateOptions::default(),
        true,
        false,
    )
    .await;
    assert!(result.is_err());
    assert!(backend.batch_requests().is_empty());
}

#[tokio::test]
async fn test_watch_rejects_malformed_key() {
    let (_backend, manager) = web_stack_manager();

    let result = commands::watch(&manager, vec!["nonsense".to_string()]).await;
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("expected 'stack/service'"),
        "Expected a parse error",
    );
}

#[tokio::test]
async fn test_watch_attaches_to_running_task() {
    let (backend, manager) = web_stack_manager();
    finish_script(&backend, &ServiceKey::new("web", "app"));

    // The task was created elsewhere; watching alone must work
    let result = commands::watch(&manager, vec!["web/app".to_string()]).await;
    assert!(result.is_ok(), "watch failed: {:?}", result);
    assert!(backend.batch_requests().is_empty());
}

#[tokio::test]
async fn test_auto_once_updates_matured_services() {
    let (backend, manager) = web_stack_manager();
    finish_script(&backend, &ServiceKey::new("web", "app"));

    let result = commands::auto_update(&manager, true).await;
    assert!(result.is_ok(), "sweep failed: {:?}", result);
    assert_eq!(backend.batch_requests(), vec![vec!["web/app".to_string()]]);
}

#[tokio::test]
async fn test_auto_loop_requires_enabled_config() {
    // Default config has auto_update.enabled = false
    let (backend, manager) = web_stack_manager();

    let result = commands::auto_update(&manager, false).await;
    assert!(result.is_err());
    assert!(
        result.unwrap_err().to_string().contains("disabled"),
        "Expected a hint that auto-update is disabled",
    );
    assert!(backend.batch_requests().is_empty());
}

#[tokio::test]
async fn test_monitor_lifecycle() {
    let (backend, manager) = web_stack_manager();

    let result = commands::monitor_add(
        &manager,
        "blog".to_string(),
        "https://blog.example".to_string(),
    )
    .await;
    assert!(result.is_ok());
    assert_eq!(backend.monitors.lock().unwrap().len(), 1);
    let id = backend.monitors.lock().unwrap()[0].id;

    assert!(commands::monitor_list(&manager).await.is_ok());

    assert!(commands::monitor_set_active(&manager, id, false)
        .await
        .is_ok());
    assert!(!backend.monitors.lock().unwrap()[0].is_active);

    backend.put_history(
        id,
        vec![
            mock_history_record(id, 12.0, "2024-03-02T10:00:00Z"),
            mock_history_record(id, 18.0, "2024-03-02T10:01:00Z"),
        ],
    );
    assert!(commands::monitor_history(&manager, id, 20, 0).await.is_ok());
    assert!(commands::monitor_latest(&manager, id, false, None)
        .await
        .is_ok());
    assert!(commands::monitor_latest(&manager, id, true, Some(2))
        .await
        .is_ok());

    assert!(commands::monitor_clear(&manager, id).await.is_ok());
    assert!(backend.history.lock().unwrap().get(&id).is_none());

    assert!(commands::monitor_remove(&manager, id).await.is_ok());
    assert!(backend.monitors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_monitor_latest_rejects_window_without_rolling() {
    let (_backend, manager) = web_stack_manager();

    let result = commands::monitor_latest(&manager, 1, false, Some(5)).await;
    assert!(result.is_err());
    assert!(
        result.unwrap_err().to_string().contains("--rolling"),
        "Expected a hint about --rolling",
    );
}

#[tokio::test]
async fn test_settings_set_patches_backend() {
    let (backend, manager) = web_stack_manager();

    let update = SettingsUpdate {
        max_concurrent: Some(8),
        dryrun: Some(true),
        ..Default::default()
    };
    let result = commands::settings_set(&manager, update).await;
    assert!(result.is_ok(), "settings set failed: {:?}", result);

    let settings = backend.settings.lock().unwrap().clone();
    assert_eq!(settings.auto_updater.max_concurrent, 8);
    assert!(settings.server.dryrun);
    // Untouched fields keep their values
    assert_eq!(settings.server.time_until_update_is_mature, "1w");
}

#[tokio::test]
async fn test_settings_set_requires_an_option() {
    let (backend, manager) = web_stack_manager();

    let result = commands::settings_set(&manager, SettingsUpdate::default()).await;
    assert!(result.is_err());
    assert!(!backend.was_called(&MockCall::PatchSettings));
}

#[tokio::test]
async fn test_settings_set_rejects_bad_interval() {
    let (backend, manager) = web_stack_manager();

    let update = SettingsUpdate {
        mature_after: Some("fortnight".to_string()),
        ..Default::default()
    };
    let result = commands::settings_set(&manager, update).await;
    assert!(result.is_err());
    assert!(
        result.unwrap_err().to_string().contains("Invalid interval"),
        "Expected an interval validation error",
    );
    assert!(!backend.was_called(&MockCall::PatchSettings));
}

#[tokio::test]
async fn test_settings_show_reads_backend() {
    let (backend, manager) = web_stack_manager();

    let result = commands::settings_show(&manager).await;
    assert!(result.is_ok());
    assert!(backend.was_called(&MockCall::GetSettings));
}
