use std::ffi::OsString;
use std::fs;

use dashboard_core::bootstrap::Bootstrap;
use dashboard_core::model::{CategoryId, Widget, WidgetId};
use dashboard_core::storage::{FileStorage, Storage};
use dashboard_core::store::{LoadSource, RemoveMode, StoreOptions, WidgetStore};
use tempfile::tempdir;

const SEED: &str = r#"{
  "categories": [
    { "id": "1", "name": "CSPM Executive Dashboard", "widgets": [ { "id": "1", "name": "Security Overview", "content": "metrics", "status": true } ] },
    { "id": "2", "name": "CWPP Dashboard", "widgets": [] }
  ],
  "widgets": [
    { "id": "1", "name": "Security Overview", "content": "metrics", "categoryId": "1", "status": true }
  ]
}"#;

#[test]
fn file_backed_store_survives_reload() {
    let temp = tempdir().expect("tempdir");
    let seed_path = temp.path().join("widgets.json");
    fs::write(&seed_path, SEED).expect("write seed");
    let data_dir = temp.path().join("data");
    let bootstrap = Bootstrap::File(seed_path);

    let storage = FileStorage::open(&data_dir).expect("open storage");
    let mut store = WidgetStore::new(storage, StoreOptions::default());
    assert_eq!(store.load_initial_data(&bootstrap), LoadSource::Bootstrap);

    store
        .add_widget(
            &CategoryId::from("2"),
            Widget::new("99", "X", "Y", "2", true),
        )
        .expect("add widget");
    assert_eq!(
        store
            .category(&CategoryId::from("2"))
            .expect("category 2")
            .widget_ids
            .len(),
        1
    );

    store
        .remove_widget(&CategoryId::from("1"), &WidgetId::from("1"))
        .expect("remove widget");
    assert!(
        !store
            .category(&CategoryId::from("1"))
            .expect("category 1")
            .references(&WidgetId::from("1"))
    );
    let before = store.snapshot();

    let storage = FileStorage::open(&data_dir).expect("reopen storage");
    let mut reloaded = WidgetStore::new(storage, StoreOptions::default());
    assert_eq!(reloaded.load_initial_data(&bootstrap), LoadSource::Snapshot);
    assert_eq!(reloaded.snapshot(), before);
    assert!(reloaded.widget(&WidgetId::from("99")).is_some());
}

#[test]
fn delete_mode_forgets_widget_across_reload() {
    let temp = tempdir().expect("tempdir");
    let seed_path = temp.path().join("widgets.json");
    fs::write(&seed_path, SEED).expect("write seed");
    let bootstrap = Bootstrap::File(seed_path);
    let options = StoreOptions {
        remove_mode: RemoveMode::Delete,
        ..StoreOptions::default()
    };

    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = WidgetStore::new(storage, options.clone());
    store.load_initial_data(&bootstrap);
    store
        .remove_widget(&CategoryId::from("1"), &WidgetId::from("1"))
        .expect("remove widget");

    let storage = FileStorage::open(temp.path()).expect("reopen storage");
    let mut reloaded = WidgetStore::new(storage, options);
    reloaded.load_initial_data(&bootstrap);
    assert_eq!(reloaded.widgets().count(), 0);
}

#[test]
fn reducer_snapshot_on_disk_is_restored() {
    let temp = tempdir().expect("tempdir");
    let mut storage = FileStorage::open(temp.path()).expect("open storage");
    storage
        .set(
            "dashboardState",
            &format!(r#"{{"widgets":{SEED}}}"#),
        )
        .expect("write reducer state");

    let options = StoreOptions {
        key: "dashboardState".to_string(),
        ..StoreOptions::default()
    };
    let mut store = WidgetStore::new(storage, options);
    assert_eq!(store.load_initial_data(&Bootstrap::Builtin), LoadSource::Snapshot);
    assert_eq!(store.categories().len(), 2);
    assert_eq!(store.visible_widgets(&CategoryId::from("1")).len(), 1);
}

#[test]
fn cli_run_adds_widget_to_stored_layout() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("dashrc");
    let data_dir = temp.path().join("data");
    fs::write(&rc, "color = off\nremove.mode = unlink\n").expect("write rc");

    let args = |extra: &[&str]| -> Vec<OsString> {
        let mut out: Vec<OsString> = vec![
            "dash".into(),
            "--dashrc".into(),
            rc.clone().into(),
            "--data".into(),
            data_dir.clone().into(),
        ];
        out.extend(extra.iter().map(OsString::from));
        out
    };

    dashboard_core::run(args(&["add", "1", "5"])).expect("add via cli");
    dashboard_core::run(args(&["rc.new.visible=off", "new", "2", "Runtime Drift"]))
        .expect("new via cli");

    let storage = FileStorage::open(&data_dir).expect("open storage");
    let raw = storage
        .get("widgetStore")
        .expect("read storage")
        .expect("layout persisted");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("snapshot json");

    let first = value["categories"][0]["widgets"]
        .as_array()
        .expect("category widgets");
    assert!(first.iter().any(|w| w["id"] == "5" && w["status"] == true));

    let all = value["allWidgets"].as_array().expect("all widgets");
    let drift = all
        .iter()
        .find(|w| w["name"] == "Runtime Drift")
        .expect("new widget stored");
    assert_eq!(drift["categoryId"], "2");
    assert_eq!(drift["status"], false);
}
