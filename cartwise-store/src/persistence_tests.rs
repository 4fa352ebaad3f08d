//! Persistence round-trip and edge case tests.
//!
//! Tests file I/O helpers, the on-disk store surviving a restart, and the
//! fallback file standing in for an unusable database.

use std::path::PathBuf;
use tempfile::TempDir;

use crate::config::StoreConfig;
use crate::persistence::{ensure_dir, load_json, save_json};
use crate::queue::QUEUE_KEY;
use crate::store::Store;
use cartwise_core::{ItemPatch, NewItem, NewList, ProfileSettings, SettingsPatch, ThemeMode};

// ============================================================================
// JSON Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_save_and_load_json_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("settings.json");

    let settings = ProfileSettings {
        theme: ThemeMode::Dark,
        tax_rate: 0.2,
        ..ProfileSettings::default()
    };

    save_json(&file_path, &settings).await.unwrap();
    let loaded: ProfileSettings = load_json(&file_path).await.unwrap();

    assert_eq!(loaded, settings);
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested_path = temp_dir.path().join("deeply").join("nested").join("test.json");

    let data = serde_json::json!({"key": "value"});

    let result = save_json(&nested_path, &data).await;
    assert!(result.is_ok());
    assert!(nested_path.exists());
}

#[tokio::test]
async fn test_load_nonexistent_file() {
    let file_path = PathBuf::from("/nonexistent/path/config.json");

    let result: Result<StoreConfig, _> = load_json(&file_path).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_ensure_dir_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir_path = temp_dir.path().join("data");

    ensure_dir(&dir_path).await.unwrap();
    ensure_dir(&dir_path).await.unwrap();

    assert!(dir_path.is_dir());
}

#[tokio::test]
async fn test_load_minimal_settings_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("minimal.json");

    tokio::fs::write(&file_path, r#"{ "theme": "light" }"#)
        .await
        .unwrap();

    let loaded: ProfileSettings = load_json(&file_path).await.unwrap();
    assert_eq!(loaded.theme, ThemeMode::Light);
    assert_eq!(loaded.default_currency, "USD");
    assert!(loaded.haptics_enabled);
}

// ============================================================================
// Store Restart Tests
// ============================================================================

#[tokio::test]
async fn test_store_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::at(temp_dir.path());

    let list_id = {
        let store = Store::open(&config).await.unwrap();
        assert!(!store.is_degraded());
        let list = store
            .create_list(NewList::named("Hardware"))
            .await
            .into_record()
            .unwrap();
        let item = store
            .create_item(NewItem::new(&list.id, "Screws").with_price(4.5))
            .await
            .into_record()
            .unwrap();
        assert!(
            store
                .update_item(&item.id, ItemPatch::purchased(true))
                .await
                .is_persisted()
        );
        store
            .update_settings(SettingsPatch {
                theme: Some(ThemeMode::Dark),
                ..SettingsPatch::default()
            })
            .await
            .into_result()
            .unwrap();
        list.id
    };

    let store = Store::open(&config).await.unwrap();
    assert_eq!(store.list(&list_id).await.unwrap().name, "Hardware");
    let items = store.items_for_list(&list_id).await;
    assert_eq!(items.len(), 1);
    assert!(items[0].purchased);
    assert_eq!(store.settings().await.theme, ThemeMode::Dark);
    assert_eq!(store.product_stat("Screws").await.unwrap().used_count, 1);
}

#[tokio::test]
async fn test_unusable_database_runs_on_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::at(temp_dir.path());
    // A directory where the database file should be cannot be opened.
    std::fs::create_dir_all(config.database_path()).unwrap();

    let store = Store::open(&config).await.unwrap();
    assert!(store.is_degraded());

    let outcome = store.create_list(NewList::named("Camping")).await;
    assert!(outcome.is_queued());
    assert_eq!(store.lists().await.len(), 1);

    let raw = tokio::fs::read_to_string(config.fallback_path()).await.unwrap();
    assert!(raw.contains(QUEUE_KEY));
    assert!(raw.contains("cartwise.lists"));
}

#[tokio::test]
async fn test_queue_survives_reopen_on_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::at(temp_dir.path());
    std::fs::create_dir_all(config.database_path()).unwrap();

    {
        let store = Store::open(&config).await.unwrap();
        let _ = store.create_list(NewList::named("Trip")).await;
    }

    let store = Store::open(&config).await.unwrap();
    assert_eq!(store.offline_queue().await.len(), 1);
    assert_eq!(store.lists().await[0].name, "Trip");
}
