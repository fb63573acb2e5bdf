//! Property tests: arbitrary lifecycle scripts against a reference model.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use apm_bridge_core::{ComponentKey, MethodCall, Reply};
use apm_bridge_runtime::Dispatcher;
use apm_bridge_testing::properties::{
    LifecycleStep, component_name, lifecycle_script, transaction_name, unknown_method,
};
use apm_bridge_testing::{EngineCall, EngineOp, RecordingEngine, calls};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// What the registry should hold after a script, with the handle ids the
/// recording engine is expected to mint.
#[derive(Debug, Default)]
struct Model {
    transactions: BTreeMap<String, u64>,
    components: BTreeMap<ComponentKey, u64>,
    last_handle: u64,
    stops: Vec<EngineCall>,
}

impl Model {
    fn remove_components_of(&mut self, transaction: &str) -> Vec<(ComponentKey, u64)> {
        let keys: Vec<ComponentKey> = self
            .components
            .keys()
            .filter(|key| key.transaction() == transaction)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.components.remove(&key).map(|handle| (key, handle)))
            .collect()
    }

    fn apply(&mut self, step: &LifecycleStep) {
        match step {
            LifecycleStep::StartTransaction(t) => {
                self.last_handle += 1;
                if self.transactions.insert(t.clone(), self.last_handle).is_some() {
                    // Replaced: its components are dropped without a stop
                    let _ = self.remove_components_of(t);
                }
            },
            LifecycleStep::StopTransaction(t) => {
                if let Some(handle) = self.transactions.remove(t) {
                    for (key, component) in self.remove_components_of(t) {
                        self.stops.push(EngineCall::StopComponent {
                            transaction: handle,
                            name: key.component().to_string(),
                            handle: component,
                        });
                    }
                    self.stops.push(EngineCall::StopTransaction { name: t.clone(), handle });
                }
            },
            LifecycleStep::StartComponent(t, c) => {
                if self.transactions.contains_key(t) {
                    self.last_handle += 1;
                    self.components.insert(ComponentKey::new(t.as_str(), c.as_str()), self.last_handle);
                }
            },
            LifecycleStep::StopComponent(t, c) => {
                let key = ComponentKey::new(t.as_str(), c.as_str());
                let Some(&transaction) = self.transactions.get(t) else {
                    return;
                };
                if let Some(handle) = self.components.remove(&key) {
                    self.stops.push(EngineCall::StopComponent {
                        transaction,
                        name: c.clone(),
                        handle,
                    });
                }
            },
        }
    }
}

fn stops(engine: &RecordingEngine) -> Vec<EngineCall> {
    engine
        .calls()
        .into_iter()
        .filter(|call| matches!(call.op(), EngineOp::StopTransaction | EngineOp::StopComponent))
        .collect()
}

proptest! {
    #[test]
    fn test_registry_matches_model(script in lifecycle_script(40)) {
        let engine = RecordingEngine::new();
        let dispatcher = Dispatcher::new(engine.clone());
        let mut model = Model::default();

        for step in &script {
            prop_assert_eq!(dispatcher.handle(&step.to_call()).unwrap(), Reply::Handled);
            model.apply(step);
        }

        let snapshot = dispatcher.registry().snapshot();
        // Every filed component belongs to a live transaction
        for key in &snapshot.components {
            prop_assert!(snapshot.transactions.iter().any(|t| t == key.transaction()));
        }
        prop_assert_eq!(snapshot.transactions, model.transactions.keys().cloned().collect::<Vec<_>>());
        prop_assert_eq!(snapshot.components, model.components.keys().cloned().collect::<Vec<_>>());
        prop_assert_eq!(stops(&engine), model.stops);
    }

    #[test]
    fn test_stop_before_start_never_reaches_the_engine(
        transaction in transaction_name(),
        component in component_name(),
    ) {
        let engine = RecordingEngine::new();
        let dispatcher = Dispatcher::new(engine.clone());

        prop_assert!(dispatcher.handle(&calls::stop_transaction(&transaction)).is_ok());
        prop_assert!(dispatcher.handle(&calls::start_component(&transaction, &component)).is_ok());
        prop_assert!(dispatcher.handle(&calls::stop_component(&transaction, &component)).is_ok());

        prop_assert!(engine.calls().is_empty());
        prop_assert!(dispatcher.registry().snapshot().is_empty());
    }

    #[test]
    fn test_every_start_after_the_first_supersedes(name in "[a-z]{1,8}", restarts in 1usize..5) {
        let engine = RecordingEngine::new();
        let dispatcher = Dispatcher::new(engine.clone());

        for _ in 0..=restarts {
            dispatcher.handle(&calls::start_transaction(&name)).unwrap();
        }
        dispatcher.handle(&calls::stop_transaction(&name)).unwrap();

        // Only the most recent handle is stopped
        let last = u64::try_from(restarts + 1).unwrap();
        prop_assert_eq!(
            engine.calls_to(EngineOp::StopTransaction),
            vec![EngineCall::StopTransaction { name, handle: last }]
        );
    }

    #[test]
    fn test_unknown_methods_change_nothing(
        method in unknown_method(),
        script in lifecycle_script(10),
    ) {
        let engine = RecordingEngine::new();
        let dispatcher = Dispatcher::new(engine.clone());
        for step in &script {
            dispatcher.handle(&step.to_call()).unwrap();
        }
        let before = dispatcher.registry().snapshot();
        let calls_before = engine.calls().len();

        prop_assert_eq!(
            dispatcher.handle(&MethodCall::new(method).arg("name", "t1")).unwrap(),
            Reply::NotImplemented
        );
        prop_assert_eq!(dispatcher.registry().snapshot(), before);
        prop_assert_eq!(engine.calls().len(), calls_before);
    }

    #[test]
    fn test_crash_native_raises_in_any_state(script in lifecycle_script(10)) {
        let dispatcher = Dispatcher::new(RecordingEngine::new());
        for step in &script {
            dispatcher.handle(&step.to_call()).unwrap();
        }

        let result = dispatcher.handle(&calls::crash_native());
        prop_assert!(result.is_err_and(|e| e.is_crash()));
    }

    #[test]
    fn test_component_keys_are_distinct_pairs(
        pairs in prop::collection::vec((transaction_name(), component_name()), 1..12),
    ) {
        let dispatcher = Dispatcher::new(RecordingEngine::new());
        for (transaction, _) in &pairs {
            dispatcher.handle(&calls::start_transaction(transaction)).unwrap();
        }
        for (transaction, component) in &pairs {
            dispatcher.handle(&calls::start_component(transaction, component)).unwrap();
        }

        let distinct: BTreeSet<(&String, &String)> = pairs.iter().map(|(t, c)| (t, c)).collect();
        prop_assert_eq!(dispatcher.registry().live_components(), distinct.len());
    }
}
