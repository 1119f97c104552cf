//! Connection lifecycle
//!
//! A connection `from -> to` means the satellite on `from` may send messages
//! to the satellite on `to`. Establishing it takes a registration on the
//! sender and, unless the receiving chain is receive-only, a registration on
//! the receiver naming the aliased sender address. The edge is recorded only
//! after every call succeeded.

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use tracing::{error, info, warn};

use crate::core::alias::alias;
use crate::core::timeout::with_timeout;
use crate::error::{Result, SatError};
use crate::registry::ChainRegistry;
use satctl_core_interface::{
    ChainTarget, RegisterSatelliteCall, RemoveSatelliteCall, SatelliteTransactor, Selector,
};
use satctl_core_state::{DeploymentState, EnvironmentStore};

/// Signature of every sender module's outbound entry point
const SEND_FUNCTION_PARAMS: &str = "(uint256,address,bytes,bytes)";

/// One transaction of a connection change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatelliteCall<C> {
    pub chain: ChainTarget,
    pub satellite: Address,
    pub call: C,
}

/// Calls needed to register or remove one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCalls<C> {
    pub sender: SatelliteCall<C>,
    /// `None` when the receiving chain is receive-only
    pub receiver: Option<SatelliteCall<C>>,
}

/// Hex or decimal address of any width, as stored for the satellite
fn parse_wide_address(chain_id: &str, raw: &str) -> Result<U256> {
    let parsed = match raw.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16),
        None => U256::from_str_radix(raw, 10),
    };
    parsed.map_err(|e| {
        SatError::invariant(format!(
            "satellite on {} has an unreadable address {}: {}",
            chain_id, raw, e
        ))
    })
}

pub(crate) fn evm_address(chain_id: &str, raw: &str) -> Result<Address> {
    Address::from_str(raw).map_err(|e| {
        SatError::invariant(format!(
            "satellite on {} has an invalid EVM address {}: {}",
            chain_id, raw, e
        ))
    })
}

fn satellite_address<'s>(state: &'s DeploymentState, chain_id: &str) -> Result<&'s str> {
    state
        .satellite(chain_id)
        .map(|s| s.contract_address.as_str())
        .ok_or_else(|| SatError::NotFound(format!("satellite on chain {}", chain_id)))
}

/// Calls that register `from -> to`, after checking every precondition
pub fn plan_registration(
    state: &DeploymentState,
    registry: &ChainRegistry,
    from: &str,
    to: &str,
) -> Result<ConnectionCalls<RegisterSatelliteCall>> {
    if from == to {
        return Err(SatError::invariant(format!(
            "chain {} cannot connect to itself",
            from
        )));
    }
    let sender_raw = satellite_address(state, from)?;
    let receiver_raw = satellite_address(state, to)?;
    if state.has_edge(from, to) {
        return Err(SatError::invariant(format!(
            "connection {} -> {} already exists",
            from, to
        )));
    }

    let sender_chain = registry.chain(from)?;
    if sender_chain.family.is_receive_only() {
        return Err(SatError::invariant(format!(
            "chain {} is {} and can only receive",
            from, sender_chain.family
        )));
    }
    let settings = registry
        .connection(from, to)
        .ok_or_else(|| SatError::NoConnectionData {
            from: from.to_string(),
            to: to.to_string(),
        })?;
    let receiver_chain = registry.chain(to)?;

    let sender_address = evm_address(from, sender_raw)?;
    let sender = SatelliteCall {
        chain: registry.target(from)?,
        satellite: sender_address,
        call: RegisterSatelliteCall {
            remote_chain_id: to.to_string(),
            remote_address: parse_wide_address(to, receiver_raw)?,
            inbox_address: settings.inbox,
            remote_sender_alias: Address::ZERO,
            send_function_selector: Selector::from_signature(&format!(
                "{}{}",
                settings.send_function, SEND_FUNCTION_PARAMS
            )),
        },
    };

    let receiver = if receiver_chain.family.is_receive_only() {
        None
    } else {
        Some(SatelliteCall {
            chain: registry.target(to)?,
            satellite: evm_address(to, receiver_raw)?,
            call: RegisterSatelliteCall {
                remote_chain_id: from.to_string(),
                remote_address: U256::from_be_slice(sender_address.as_slice()),
                inbox_address: Address::ZERO,
                remote_sender_alias: alias(sender_address, settings.alias_shift()?),
                send_function_selector: Selector::ZERO,
            },
        })
    };

    Ok(ConnectionCalls { sender, receiver })
}

/// Calls that undo `from -> to`
pub fn plan_removal(
    state: &DeploymentState,
    registry: &ChainRegistry,
    from: &str,
    to: &str,
) -> Result<ConnectionCalls<RemoveSatelliteCall>> {
    let sender_raw = satellite_address(state, from)?;
    if !state.has_edge(from, to) {
        return Err(SatError::NotFound(format!("connection {} -> {}", from, to)));
    }
    let settings = registry
        .connection(from, to)
        .ok_or_else(|| SatError::NoConnectionData {
            from: from.to_string(),
            to: to.to_string(),
        })?;
    let sender_address = evm_address(from, sender_raw)?;

    let sender = SatelliteCall {
        chain: registry.target(from)?,
        satellite: sender_address,
        call: RemoveSatelliteCall {
            remote_chain_id: to.to_string(),
            counterpart_address: Address::ZERO,
        },
    };

    let receiver = if registry.chain(to)?.family.is_receive_only() {
        None
    } else {
        let receiver_raw = satellite_address(state, to)?;
        Some(SatelliteCall {
            chain: registry.target(to)?,
            satellite: evm_address(to, receiver_raw)?,
            call: RemoveSatelliteCall {
                remote_chain_id: from.to_string(),
                counterpart_address: alias(sender_address, settings.alias_shift()?),
            },
        })
    };

    Ok(ConnectionCalls { sender, receiver })
}

/// Every edge that keeps the satellite on `chain_id` from being removed
pub fn satellite_removal_blockers(state: &DeploymentState, chain_id: &str) -> Vec<String> {
    let outgoing = state
        .outgoing(chain_id)
        .into_iter()
        .map(|to| format!("outgoing connection {} -> {}", chain_id, to));
    let incoming = state
        .incoming(chain_id)
        .into_iter()
        .map(|from| format!("incoming connection {} -> {}", from, chain_id));
    outgoing.chain(incoming).collect()
}

/// Applies connection changes on-chain and in the store
pub struct ConnectionManager<'a> {
    store: &'a EnvironmentStore,
    registry: &'a ChainRegistry,
    transactor: &'a dyn SatelliteTransactor,
    timeout_secs: u64,
}

impl<'a> ConnectionManager<'a> {
    pub fn new(
        store: &'a EnvironmentStore,
        registry: &'a ChainRegistry,
        transactor: &'a dyn SatelliteTransactor,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            registry,
            transactor,
            timeout_secs,
        }
    }

    async fn register_on(&self, call: &SatelliteCall<RegisterSatelliteCall>) -> Result<()> {
        let operation = format!("registerSatellite on {}", call.chain.chain_id);
        let tx = with_timeout(
            &operation,
            self.timeout_secs,
            self.transactor
                .register_satellite(&call.chain, call.satellite, &call.call),
        )
        .await?;
        info!(
            chain = %call.chain.chain_id,
            remote = %call.call.remote_chain_id,
            tx_hash = ?tx,
            "registerSatellite confirmed"
        );
        Ok(())
    }

    async fn remove_on(&self, call: &SatelliteCall<RemoveSatelliteCall>) -> Result<()> {
        let operation = format!("removeSatellite on {}", call.chain.chain_id);
        let tx = with_timeout(
            &operation,
            self.timeout_secs,
            self.transactor
                .remove_satellite(&call.chain, call.satellite, &call.call),
        )
        .await?;
        info!(
            chain = %call.chain.chain_id,
            remote = %call.call.remote_chain_id,
            tx_hash = ?tx,
            "removeSatellite confirmed"
        );
        Ok(())
    }

    /// Register `from -> to` on both ends and record the edge
    pub async fn register_connection(&self, env: &str, from: &str, to: &str) -> Result<()> {
        let state = self.store.load(env)?;
        let calls = plan_registration(&state, self.registry, from, to)?;

        self.register_on(&calls.sender).await?;
        match &calls.receiver {
            Some(receiver) => {
                if let Err(e) = self.register_on(receiver).await {
                    error!(environment = env, from, to, "receiver registration failed after sender succeeded");
                    return Err(SatError::PartialConnection {
                        from: from.to_string(),
                        to: to.to_string(),
                        completed: format!("registerSatellite on {}", from),
                        failed: e.to_string(),
                    });
                }
            }
            None => info!(to, "receiving chain is receive-only; no receiver registration"),
        }

        self.store.update(env, |state| {
            if state.insert_edge(from, to) {
                Ok(())
            } else {
                Err(SatError::invariant(format!(
                    "connection {} -> {} appeared while registering",
                    from, to
                )))
            }
        })?;
        info!(environment = env, from, to, "connection registered");
        Ok(())
    }

    /// Deregister `from -> to` on both ends and delete the edge
    pub async fn remove_connection(&self, env: &str, from: &str, to: &str) -> Result<()> {
        let state = self.store.load(env)?;
        let calls = plan_removal(&state, self.registry, from, to)?;

        self.remove_on(&calls.sender).await?;
        if let Some(receiver) = &calls.receiver {
            if let Err(e) = self.remove_on(receiver).await {
                error!(environment = env, from, to, "receiver removal failed after sender succeeded");
                return Err(SatError::PartialConnection {
                    from: from.to_string(),
                    to: to.to_string(),
                    completed: format!("removeSatellite on {}", from),
                    failed: e.to_string(),
                });
            }
        }

        self.store.update(env, |state| {
            if state.remove_edge(from, to) {
                Ok(())
            } else {
                Err(SatError::NotFound(format!("connection {} -> {}", from, to)))
            }
        })?;
        info!(environment = env, from, to, "connection removed");
        Ok(())
    }

    /// Forget the satellite on `chain_id`; refused while any edge touches it
    pub fn remove_satellite(&self, env: &str, chain_id: &str) -> Result<()> {
        self.store.update(env, |state| {
            if !state.contains(chain_id) {
                return Err(SatError::NotFound(format!("satellite on chain {}", chain_id)));
            }
            let blockers = satellite_removal_blockers(state, chain_id);
            if !blockers.is_empty() {
                warn!(environment = env, chain = chain_id, blockers = blockers.len(), "satellite still connected");
                return Err(SatError::InvariantViolation(blockers));
            }
            state.remove_satellite(chain_id);
            Ok(())
        })?;
        info!(environment = env, chain = chain_id, "satellite removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ChainFamily, ChainFeatures, ChainSettings, ConnectionSettings};
    use std::collections::BTreeMap;

    const L1: &str = "0x1111111111111111111111111111111111111111";
    const L2: &str = "0x2222222222222222222222222222222222222222";
    const SN: &str = "0x04a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f";

    fn chain(network: &str, family: ChainFamily, connections: Vec<ConnectionSettings>) -> ChainSettings {
        ChainSettings {
            network: network.into(),
            family,
            rpc_url: None,
            explorer_chain_id: None,
            modules: vec![],
            features: ChainFeatures::default(),
            connections,
        }
    }

    fn link(to: &str, l2_alias: &str) -> ConnectionSettings {
        ConnectionSettings {
            to: to.into(),
            inbox: Address::repeat_byte(0xee),
            send_function: "sendToL2".into(),
            l2_alias: l2_alias.into(),
        }
    }

    fn registry() -> ChainRegistry {
        let mut chains = BTreeMap::new();
        chains.insert(
            "1".to_string(),
            chain(
                "mainnet",
                ChainFamily::Evm,
                vec![link("10", "0x1111000000000000000000000000000000001111"), link("23448594291968334", "0")],
            ),
        );
        chains.insert("10".to_string(), chain("optimism", ChainFamily::Evm, vec![]));
        chains.insert(
            "23448594291968334".to_string(),
            chain("starknet", ChainFamily::Starknet, vec![]),
        );
        ChainRegistry::new(chains, BTreeMap::new()).unwrap()
    }

    fn state() -> DeploymentState {
        let mut state = DeploymentState::new();
        state.insert_satellite("1", L1);
        state.insert_satellite("10", L2);
        state.insert_satellite("23448594291968334", SN);
        state
    }

    #[test]
    fn test_registration_calls() {
        let calls = plan_registration(&state(), &registry(), "1", "10").unwrap();

        let sender = &calls.sender.call;
        assert_eq!(calls.sender.chain.chain_id, "1");
        assert_eq!(sender.remote_chain_id, "10");
        assert_eq!(sender.remote_address, U256::from_str_radix(&L2[2..], 16).unwrap());
        assert_eq!(sender.inbox_address, Address::repeat_byte(0xee));
        assert_eq!(sender.remote_sender_alias, Address::ZERO);
        assert_eq!(
            sender.send_function_selector,
            Selector::from_signature("sendToL2(uint256,address,bytes,bytes)")
        );

        let receiver = calls.receiver.unwrap();
        assert_eq!(receiver.chain.chain_id, "10");
        assert_eq!(receiver.call.remote_chain_id, "1");
        assert_eq!(receiver.call.inbox_address, Address::ZERO);
        assert_eq!(receiver.call.send_function_selector, Selector::ZERO);
        assert_eq!(
            receiver.call.remote_sender_alias,
            Address::from_str("0x2222111111111111111111111111111111112222").unwrap()
        );
    }

    #[test]
    fn test_receive_only_target_has_no_receiver_call() {
        let calls = plan_registration(&state(), &registry(), "1", "23448594291968334").unwrap();
        assert!(calls.receiver.is_none());
        assert_eq!(
            calls.sender.call.remote_address,
            U256::from_str_radix(&SN[2..], 16).unwrap()
        );
    }

    #[test]
    fn test_registration_preconditions() {
        let registry = registry();
        let mut state = state();

        assert!(matches!(
            plan_registration(&state, &registry, "10", "1"),
            Err(SatError::NoConnectionData { .. })
        ));
        assert!(matches!(
            plan_registration(&state, &registry, "23448594291968334", "1"),
            Err(SatError::InvariantViolation(_))
        ));
        assert!(matches!(
            plan_registration(&state, &registry, "1", "1"),
            Err(SatError::InvariantViolation(_))
        ));

        state.remove_satellite("10");
        assert!(matches!(
            plan_registration(&state, &registry, "1", "10"),
            Err(SatError::NotFound(_))
        ));
    }

    #[test]
    fn test_removal_mirrors_registration() {
        let mut state = state();
        assert!(matches!(
            plan_removal(&state, &registry(), "1", "10"),
            Err(SatError::NotFound(_))
        ));

        state.insert_edge("1", "10");
        let calls = plan_removal(&state, &registry(), "1", "10").unwrap();
        assert_eq!(calls.sender.call.counterpart_address, Address::ZERO);
        assert_eq!(calls.sender.call.remote_chain_id, "10");
        let receiver = calls.receiver.unwrap();
        assert_eq!(receiver.call.remote_chain_id, "1");
        assert_eq!(
            receiver.call.counterpart_address,
            Address::from_str("0x2222111111111111111111111111111111112222").unwrap()
        );
    }

    #[test]
    fn test_blockers_cover_both_directions() {
        let mut state = state();
        state.insert_edge("1", "10");
        state.insert_edge("10", "1");

        assert_eq!(
            satellite_removal_blockers(&state, "1"),
            vec![
                "outgoing connection 1 -> 10".to_string(),
                "incoming connection 10 -> 1".to_string(),
            ]
        );
        assert!(satellite_removal_blockers(&state, "23448594291968334").is_empty());
    }
}
