/*!
 * Integration tests for the connection lifecycle
 *
 * Drives `ConnectionManager` against a recording transactor and a real
 * environment store in a scratch directory.
 */

use std::fs;
use std::str::FromStr;
use std::sync::Mutex;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use satctl::config::SatConfig;
use satctl::core::alias::alias;
use satctl::core::connections::ConnectionManager;
use satctl::error::SatError;
use satctl::registry::ChainRegistry;
use satctl_core_interface::{
    ChainTarget, ExternalError, MaintenanceAction, RegisterSatelliteCall, RemoveSatelliteCall,
    SatelliteTransactor, Selector,
};
use satctl_core_state::{EnvironmentStore, SatelliteRecord};
use tempfile::TempDir;

const SEPOLIA: &str = "11155111";
const OPTIMISM: &str = "11155420";
const STARKNET: &str = "393402133025997798000961";

const SEPOLIA_SATELLITE: &str = "0x1111111111111111111111111111111111111111";
const OPTIMISM_SATELLITE: &str = "0x2222222222222222222222222222222222222222";
const STARKNET_SATELLITE: &str = "0x05e1b5c6e8ad7c1e2b6d0bc1e6b5a28a3c4d9f0e1a2b3c4d5e6f708192a3b4c5";

const OPTIMISM_INBOX: &str = "0x5086d1eef304eb5284a0f6720f79403b4e9be294";
const STARKNET_CORE: &str = "0xe2bb56ee936fd6433dc0f6e7e3b8365c906aa057";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Recorded {
    Register(String, Address, RegisterSatelliteCall),
    Remove(String, Address, RemoveSatelliteCall),
}

#[derive(Default)]
struct RecordingTransactor {
    calls: Mutex<Vec<Recorded>>,
    /// Chain on which every call reverts
    failing_chain: Option<String>,
}

impl RecordingTransactor {
    fn failing_on(chain: &str) -> Self {
        Self {
            failing_chain: Some(chain.to_string()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, chain: &ChainTarget) -> satctl_core_interface::Result<()> {
        if self.failing_chain.as_deref() == Some(chain.chain_id.as_str()) {
            return Err(ExternalError::ToolFailed {
                tool: "hardhat".into(),
                status: "exit status: 1".into(),
                stderr: "execution reverted".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SatelliteTransactor for RecordingTransactor {
    async fn satellite_maintenance(
        &self,
        _chain: &ChainTarget,
        _satellite: Address,
        _actions: &[MaintenanceAction],
    ) -> satctl_core_interface::Result<Option<B256>> {
        unreachable!("connections never submit maintenance batches")
    }

    async fn register_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RegisterSatelliteCall,
    ) -> satctl_core_interface::Result<Option<B256>> {
        self.check(chain)?;
        self.calls
            .lock()
            .unwrap()
            .push(Recorded::Register(chain.chain_id.clone(), satellite, call.clone()));
        Ok(Some(B256::repeat_byte(0x01)))
    }

    async fn remove_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RemoveSatelliteCall,
    ) -> satctl_core_interface::Result<Option<B256>> {
        self.check(chain)?;
        self.calls
            .lock()
            .unwrap()
            .push(Recorded::Remove(chain.chain_id.clone(), satellite, call.clone()));
        Ok(None)
    }
}

fn registry() -> ChainRegistry {
    let config: SatConfig = toml::from_str(&format!(
        r#"
[chains.{SEPOLIA}]
network = "sepolia"

[[chains.{SEPOLIA}.connections]]
to = "{OPTIMISM}"
inbox = "{OPTIMISM_INBOX}"
send_function = "sendMessageToL2"
l2_alias = "0x1111000000000000000000000000000000001111"

[[chains.{SEPOLIA}.connections]]
to = "{STARKNET}"
inbox = "{STARKNET_CORE}"
send_function = "sendMessageToStarknet"

[chains.{OPTIMISM}]
network = "optimismSepolia"

[[chains.{OPTIMISM}.connections]]
to = "{SEPOLIA}"
inbox = "0x0000000000000000000000000000000000000000"
send_function = "sendMessageToL1"

[chains.{STARKNET}]
network = "starknetSepolia"
family = "starknet"
"#
    ))
    .unwrap();
    config.registry().unwrap()
}

struct Fleet {
    _dir: TempDir,
    store: EnvironmentStore,
    registry: ChainRegistry,
}

fn fleet() -> Fleet {
    let dir = TempDir::new().unwrap();
    let store = EnvironmentStore::new(dir.path());
    store.create("testnet").unwrap();
    let mut state = store.load("testnet").unwrap();
    for (chain, address) in [
        (SEPOLIA, SEPOLIA_SATELLITE),
        (OPTIMISM, OPTIMISM_SATELLITE),
        (STARKNET, STARKNET_SATELLITE),
    ] {
        state
            .satellites
            .insert(chain.to_string(), SatelliteRecord::new(address));
    }
    store.save("testnet", &state).unwrap();
    Fleet {
        _dir: dir,
        store,
        registry: registry(),
    }
}

fn addr(s: &str) -> Address {
    Address::from_str(s).unwrap()
}

#[tokio::test]
async fn test_register_calls_both_ends() {
    let fleet = fleet();
    let transactor = RecordingTransactor::default();
    let manager = ConnectionManager::new(&fleet.store, &fleet.registry, &transactor, 30);

    manager
        .register_connection("testnet", SEPOLIA, OPTIMISM)
        .await
        .unwrap();

    let shift = U256::from_str_radix("1111000000000000000000000000000000001111", 16).unwrap();
    assert_eq!(
        transactor.calls(),
        vec![
            Recorded::Register(
                SEPOLIA.to_string(),
                addr(SEPOLIA_SATELLITE),
                RegisterSatelliteCall {
                    remote_chain_id: OPTIMISM.to_string(),
                    remote_address: U256::from_be_slice(addr(OPTIMISM_SATELLITE).as_slice()),
                    inbox_address: addr(OPTIMISM_INBOX),
                    remote_sender_alias: Address::ZERO,
                    send_function_selector: Selector::from_signature(
                        "sendMessageToL2(uint256,address,bytes,bytes)"
                    ),
                },
            ),
            Recorded::Register(
                OPTIMISM.to_string(),
                addr(OPTIMISM_SATELLITE),
                RegisterSatelliteCall {
                    remote_chain_id: SEPOLIA.to_string(),
                    remote_address: U256::from_be_slice(addr(SEPOLIA_SATELLITE).as_slice()),
                    inbox_address: Address::ZERO,
                    remote_sender_alias: alias(addr(SEPOLIA_SATELLITE), shift),
                    send_function_selector: Selector::ZERO,
                },
            ),
        ]
    );

    let state = fleet.store.load("testnet").unwrap();
    assert!(state.has_edge(SEPOLIA, OPTIMISM));
    assert!(!state.has_edge(OPTIMISM, SEPOLIA));
}

#[tokio::test]
async fn test_duplicate_and_missing_edges() {
    let fleet = fleet();
    let transactor = RecordingTransactor::default();
    let manager = ConnectionManager::new(&fleet.store, &fleet.registry, &transactor, 30);

    assert!(matches!(
        manager.remove_connection("testnet", SEPOLIA, OPTIMISM).await,
        Err(SatError::NotFound(_))
    ));

    manager
        .register_connection("testnet", SEPOLIA, OPTIMISM)
        .await
        .unwrap();
    let before = transactor.calls().len();
    assert!(matches!(
        manager.register_connection("testnet", SEPOLIA, OPTIMISM).await,
        Err(SatError::InvariantViolation(_))
    ));
    assert_eq!(transactor.calls().len(), before);
}

#[tokio::test]
async fn test_connected_satellites_cannot_be_removed() {
    let fleet = fleet();
    let transactor = RecordingTransactor::default();
    let manager = ConnectionManager::new(&fleet.store, &fleet.registry, &transactor, 30);
    manager
        .register_connection("testnet", SEPOLIA, OPTIMISM)
        .await
        .unwrap();

    // Blocked on the sending side
    match manager.remove_satellite("testnet", SEPOLIA) {
        Err(SatError::InvariantViolation(blockers)) => {
            assert_eq!(blockers.len(), 1);
            assert!(blockers[0].contains("outgoing"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    // And on the receiving side
    match manager.remove_satellite("testnet", OPTIMISM) {
        Err(SatError::InvariantViolation(blockers)) => {
            assert_eq!(blockers.len(), 1);
            assert!(blockers[0].contains("incoming"));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    manager
        .remove_connection("testnet", SEPOLIA, OPTIMISM)
        .await
        .unwrap();
    manager.remove_satellite("testnet", OPTIMISM).unwrap();
    let state = fleet.store.load("testnet").unwrap();
    assert!(!state.contains(OPTIMISM));
    assert!(state.contains(SEPOLIA));
}

#[tokio::test]
async fn test_half_registration_leaves_store_untouched() {
    let fleet = fleet();
    let transactor = RecordingTransactor::failing_on(OPTIMISM);
    let manager = ConnectionManager::new(&fleet.store, &fleet.registry, &transactor, 30);
    let before = fs::read(fleet.store.path_for("testnet")).unwrap();

    let err = manager
        .register_connection("testnet", SEPOLIA, OPTIMISM)
        .await
        .unwrap_err();
    match &err {
        SatError::PartialConnection { from, to, completed, failed } => {
            assert_eq!((from.as_str(), to.as_str()), (SEPOLIA, OPTIMISM));
            assert!(completed.contains(SEPOLIA));
            assert!(failed.contains("execution reverted"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.needs_manual_recovery());
    assert_eq!(transactor.calls().len(), 1);
    assert_eq!(fs::read(fleet.store.path_for("testnet")).unwrap(), before);
}

#[tokio::test]
async fn test_half_removal_leaves_edge_recorded() {
    let fleet = fleet();
    let healthy = RecordingTransactor::default();
    ConnectionManager::new(&fleet.store, &fleet.registry, &healthy, 30)
        .register_connection("testnet", SEPOLIA, OPTIMISM)
        .await
        .unwrap();

    let transactor = RecordingTransactor::failing_on(OPTIMISM);
    let manager = ConnectionManager::new(&fleet.store, &fleet.registry, &transactor, 30);
    let before = fs::read(fleet.store.path_for("testnet")).unwrap();

    match manager.remove_connection("testnet", SEPOLIA, OPTIMISM).await {
        Err(SatError::PartialConnection { completed, .. }) => {
            assert_eq!(completed, format!("removeSatellite on {}", SEPOLIA));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(transactor.calls().len(), 1);
    assert!(fleet.store.load("testnet").unwrap().has_edge(SEPOLIA, OPTIMISM));
    assert_eq!(fs::read(fleet.store.path_for("testnet")).unwrap(), before);
}

#[tokio::test]
async fn test_failed_sender_call_is_not_partial() {
    let fleet = fleet();
    let transactor = RecordingTransactor::failing_on(SEPOLIA);
    let manager = ConnectionManager::new(&fleet.store, &fleet.registry, &transactor, 30);

    let err = manager
        .register_connection("testnet", SEPOLIA, OPTIMISM)
        .await
        .unwrap_err();
    assert!(matches!(err, SatError::ExternalToolFailure(_)));
    assert!(transactor.calls().is_empty());
}

#[tokio::test]
async fn test_starknet_is_receive_only() {
    let fleet = fleet();
    let transactor = RecordingTransactor::default();
    let manager = ConnectionManager::new(&fleet.store, &fleet.registry, &transactor, 30);

    manager
        .register_connection("testnet", SEPOLIA, STARKNET)
        .await
        .unwrap();
    let calls = transactor.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        Recorded::Register(chain, _, call) => {
            assert_eq!(chain, SEPOLIA);
            assert_eq!(
                call.remote_address,
                U256::from_str_radix(STARKNET_SATELLITE.trim_start_matches("0x"), 16).unwrap()
            );
        }
        other => panic!("unexpected call: {:?}", other),
    }

    assert!(matches!(
        manager.register_connection("testnet", STARKNET, SEPOLIA).await,
        Err(SatError::InvariantViolation(_))
    ));

    manager
        .remove_connection("testnet", SEPOLIA, STARKNET)
        .await
        .unwrap();
    assert_eq!(transactor.calls().len(), 2);
}
