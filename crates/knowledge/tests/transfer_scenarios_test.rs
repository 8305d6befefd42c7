//! End-to-end transfer scenarios through the broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use evolab_core::{
    ActionTable, AgentId, DeepQKnowledge, KnowledgePayload, NetworkArchitecture, TabularKnowledge,
};
use evolab_knowledge::{
    KnowledgeMerger, KnowledgeRegistry, KnowledgeTransferBroker, MergeEngine, MergeResult,
    MergeStrategy, TransferOptions,
};
use serde_json::json;

fn table(entries: &[(&str, &[(&str, f64)])]) -> ActionTable {
    entries
        .iter()
        .map(|(state, actions)| {
            let actions = actions.iter().map(|(a, v)| (a.to_string(), *v)).collect();
            (state.to_string(), actions)
        })
        .collect()
}

fn tabular(q: ActionTable) -> KnowledgePayload {
    KnowledgePayload::Tabular(TabularKnowledge {
        q_table: Some(q),
        learning_rate: Some(0.1),
        discount_factor: Some(0.95),
    })
}

fn deep_q(output_dimension: usize) -> KnowledgePayload {
    KnowledgePayload::DeepQ(DeepQKnowledge {
        weights: Some(vec![vec![0.5; 8]]),
        architecture: Some(NetworkArchitecture {
            input_dimension: 4,
            output_dimension,
            hidden_layers: vec![2],
            activation: Some("relu".into()),
        }),
        learning_rate: Some(0.001),
        discount_factor: Some(0.99),
    })
}

/// Merger that counts how often it is asked to merge.
#[derive(Default)]
struct CountingMerger {
    calls: AtomicUsize,
}

impl KnowledgeMerger for CountingMerger {
    fn merge(
        &self,
        target: &KnowledgePayload,
        source: &KnowledgePayload,
        strategy: MergeStrategy,
        weight: f64,
    ) -> MergeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        MergeEngine::new().merge(target, source, strategy, weight)
    }
}

fn broker() -> KnowledgeTransferBroker {
    KnowledgeTransferBroker::new(Arc::new(KnowledgeRegistry::new()))
}

#[test]
fn test_identical_tables_with_max_strategy_are_unchanged() {
    let broker = broker();
    let q = table(&[
        ("s0", &[("left", 1.0), ("right", -0.5)]),
        ("s1", &[("left", 0.25), ("right", 2.0), ("stay", 0.0)]),
    ]);
    broker.register_knowledge("source", tabular(q.clone()), None);
    broker.register_knowledge("target", tabular(q.clone()), None);

    let options = TransferOptions::default().with_strategy(MergeStrategy::Max);
    let outcome = broker.transfer_knowledge(&"source".into(), &"target".into(), &options);
    assert!(outcome.success, "{}", outcome.message);

    let stats = outcome.stats.unwrap();
    assert_eq!(stats.updated_actions, 5);
    assert_eq!(stats.new_actions, 0);
    assert_eq!(stats.new_states, 0);
    assert_eq!(stats.average_change, 0.0);

    let record = broker.registry().get(&"target".into()).unwrap();
    assert_eq!(record.knowledge, tabular(q));
}

#[test]
fn test_below_threshold_leaves_target_byte_identical() {
    let broker = broker();
    broker.register_knowledge(
        "source",
        tabular(table(&[
            ("s1", &[("a", 1.0), ("b", 1.0), ("c", 1.0)]),
            ("s2", &[("a", 1.0)]),
        ])),
        None,
    );
    broker.register_knowledge(
        "target",
        tabular(table(&[("s1", &[("a", 0.0), ("b", 0.0)]), ("s3", &[("a", 0.0)])])),
        None,
    );
    let target_id = AgentId::from("target");
    let before = serde_json::to_string(&broker.registry().get(&target_id).unwrap()).unwrap();

    let outcome = broker.transfer_knowledge(&"source".into(), &target_id, &TransferOptions::default());
    assert!(!outcome.success);
    let score = outcome.compatibility.unwrap().score;
    assert!((score - 0.65).abs() < 1e-12);

    let after = serde_json::to_string(&broker.registry().get(&target_id).unwrap()).unwrap();
    assert_eq!(before, after);
    assert!(broker.registry().transfer_history(None).is_empty());
}

#[test]
fn test_deep_q_output_mismatch_never_reaches_merger() {
    let registry = Arc::new(KnowledgeRegistry::new());
    let broker = KnowledgeTransferBroker::with_merger(registry, CountingMerger::default());
    broker.register_knowledge("source", deep_q(2), None);
    broker.register_knowledge("target", deep_q(3), None);

    let outcome = broker.transfer_knowledge(&"source".into(), &"target".into(), &TransferOptions::default());
    assert!(!outcome.success);
    let compatibility = outcome.compatibility.unwrap();
    assert!(!compatibility.compatible);
    assert_eq!(compatibility.score, 0.1);

    // A zero threshold must not let a known-incompatible pair through either.
    let options = TransferOptions::default().with_threshold(0.0);
    assert!(!broker.transfer_knowledge(&"source".into(), &"target".into(), &options).success);

    assert_eq!(broker.merger().calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_matching_deep_q_transfer_merges_weights() {
    let registry = Arc::new(KnowledgeRegistry::new());
    let broker = KnowledgeTransferBroker::with_merger(registry, CountingMerger::default());
    broker.register_knowledge("source", deep_q(2), None);
    broker.register_knowledge("target", deep_q(2), None);

    let outcome = broker.transfer_knowledge(&"source".into(), &"target".into(), &TransferOptions::default());
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.stats.unwrap().updated_weights, 8);
    assert_eq!(broker.merger().calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_json_payloads_transfer() {
    let broker = broker();
    let registry = broker.registry();
    assert!(registry.register_json(
        "source",
        json!({
            "type": "policy-gradient",
            "policy": { "s0": { "left": 0.9, "right": 0.1 }, "s1": { "left": 0.5, "right": 0.5 } },
        }),
        None,
    ));
    assert!(registry.register_json(
        "target",
        json!({
            "type": "policy-gradient",
            "policy": { "s0": { "left": 0.1, "right": 0.9 }, "s1": { "left": 0.5, "right": 0.5 } },
        }),
        None,
    ));

    let options = TransferOptions::default().with_strategy(MergeStrategy::Average);
    let outcome = broker.transfer_knowledge(&"source".into(), &"target".into(), &options);
    assert!(outcome.success, "{}", outcome.message);

    let merged = serde_json::to_value(&registry.get(&"target".into()).unwrap().knowledge).unwrap();
    assert_eq!(merged["type"], "policy-gradient");
    assert_eq!(merged["policy"]["s0"]["left"], 0.5);
    assert_eq!(merged["policy"]["s0"]["right"], 0.5);
}

#[test]
fn test_concurrent_transfers_into_one_target_lose_nothing() {
    let broker = broker();
    broker.register_knowledge("target", tabular(table(&[("home", &[("stay", 0.0)])])), None);

    let sources: Vec<AgentId> = (0..16).map(|i| AgentId::new(format!("source-{i}"))).collect();
    for (i, id) in sources.iter().enumerate() {
        let state = format!("room-{i}");
        let q = table(&[("home", &[("stay", 1.0)]), (state.as_str(), &[("explore", i as f64)])]);
        broker.register_knowledge(id.clone(), tabular(q), None);
    }

    let options = TransferOptions::default().with_threshold(0.0);
    let target = AgentId::from("target");
    std::thread::scope(|scope| {
        for id in &sources {
            let (broker, target, options) = (&broker, &target, &options);
            scope.spawn(move || {
                let outcome = broker.transfer_knowledge(id, target, options);
                assert!(outcome.success, "{}", outcome.message);
            });
        }
    });

    let record = broker.registry().get(&target).unwrap();
    let KnowledgePayload::Tabular(knowledge) = &record.knowledge else {
        panic!("expected tabular payload");
    };
    let q = knowledge.q_table.as_ref().unwrap();
    assert_eq!(q.len(), 17);
    for i in 0..16 {
        assert_eq!(q[&format!("room-{i}")]["explore"], i as f64);
    }
    assert_eq!(broker.registry().transfer_history(None).len(), 16);
    assert_eq!(broker.registry().transfers_for(&target, None).len(), 16);
}
