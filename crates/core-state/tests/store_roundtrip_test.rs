/*!
 * Integration tests for the environment store
 *
 * A state written by another tool must survive load -> save unchanged,
 * including whether a satellite carries a `connections` map at all.
 */

use std::fs;

use satctl_core_state::{EnvironmentStore, Error, ACTIVE_ENVIRONMENT_MARKER};
use serde_json::{json, Value};
use tempfile::TempDir;

const SEPOLIA_SATELLITE: &str = "0x1111111111111111111111111111111111111111";
const OPTIMISM_SATELLITE: &str = "0x2222222222222222222222222222222222222222";

fn write_raw(store: &EnvironmentStore, name: &str, doc: &Value) {
    fs::create_dir_all(store.dir()).unwrap();
    fs::write(store.path_for(name), serde_json::to_string_pretty(doc).unwrap()).unwrap();
}

fn read_raw(store: &EnvironmentStore, name: &str) -> Value {
    serde_json::from_str(&fs::read_to_string(store.path_for(name)).unwrap()).unwrap()
}

#[test]
fn test_load_save_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let store = EnvironmentStore::new(temp_dir.path());
    let doc = json!({
        "satellites": {
            "11155111": {
                "contractAddress": SEPOLIA_SATELLITE,
                "connections": { "11155420": {} }
            },
            "11155420": { "contractAddress": OPTIMISM_SATELLITE },
            "393402133025997798000961": {
                "contractAddress": "0x05e1b5c6e8ad7c1e2b6d0bc1e6b5a28a3c4d9f0e1a2b3c4d5e6f708192a3b4c5",
                "connections": {}
            }
        }
    });
    write_raw(&store, "prod", &doc);

    let state = store.load("prod").unwrap();
    store.save("prod", &state).unwrap();
    assert_eq!(read_raw(&store, "prod"), doc);

    let reloaded = store.load("prod").unwrap();
    assert_eq!(reloaded, state);
    assert!(reloaded.has_edge("11155111", "11155420"));
    assert!(reloaded.satellite("11155420").unwrap().connections.is_none());
}

#[test]
fn test_update_persists_before_returning() {
    let temp_dir = TempDir::new().unwrap();
    let store = EnvironmentStore::new(temp_dir.path());
    store.create("dev").unwrap();

    store
        .update("dev", |state| -> Result<(), Error> {
            state.insert_satellite("11155111", SEPOLIA_SATELLITE);
            state.insert_satellite("11155420", OPTIMISM_SATELLITE);
            state.insert_edge("11155111", "11155420");
            Ok(())
        })
        .unwrap();

    // A second handle sees the change without any caching in between
    let other = EnvironmentStore::new(temp_dir.path());
    let doc = read_raw(&other, "dev");
    assert_eq!(
        doc["satellites"]["11155111"]["connections"],
        json!({ "11155420": {} })
    );
    assert!(doc["satellites"]["11155420"].get("connections").is_none());
}

#[test]
fn test_corrupt_file_is_never_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let store = EnvironmentStore::new(temp_dir.path());
    let broken = json!({ "satellites": { "1": { "address": SEPOLIA_SATELLITE } } });
    write_raw(&store, "dev", &broken);

    let result = store.update("dev", |_state| -> Result<(), Error> { Ok(()) });
    assert!(matches!(result, Err(ref e) if e.is_corrupt()));
    assert_eq!(read_raw(&store, "dev"), broken);
}

#[test]
fn test_marker_is_a_single_name() {
    let temp_dir = TempDir::new().unwrap();
    let store = EnvironmentStore::new(temp_dir.path());
    store.create("dev").unwrap();
    store.set_active(Some("dev")).unwrap();

    let marker = temp_dir.path().join(ACTIVE_ENVIRONMENT_MARKER);
    assert_eq!(fs::read_to_string(&marker).unwrap().trim(), "dev");

    store.set_active(None).unwrap();
    assert!(!marker.exists());
    assert_eq!(store.active().unwrap(), None);
}

#[test]
fn test_dangling_edge_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let store = EnvironmentStore::new(temp_dir.path());
    let doc = json!({
        "satellites": {
            "11155111": {
                "contractAddress": SEPOLIA_SATELLITE,
                "connections": { "11155420": {}, "999": {} }
            },
            "11155420": { "contractAddress": OPTIMISM_SATELLITE }
        }
    });
    write_raw(&store, "dev", &doc);

    match store.load("dev") {
        Err(Error::Corrupt { message, .. }) => {
            assert!(message.contains("11155111 -> 999"));
            assert!(!message.contains("11155420 has no satellite"));
        }
        other => panic!("unexpected result: {:?}", other.map(|s| s.edges())),
    }
    let result = store.update("dev", |_state| -> Result<(), Error> { Ok(()) });
    assert!(matches!(result, Err(ref e) if e.is_corrupt()));
    assert_eq!(read_raw(&store, "dev"), doc);
}
