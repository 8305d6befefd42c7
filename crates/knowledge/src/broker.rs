//! Knowledge transfer between registered agents.

use std::sync::Arc;

use chrono::Utc;
use evolab_core::{AgentId, KnowledgeAttributes, KnowledgePayload};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::compatibility::{CompatibilityResult, CompatibilityScorer};
use crate::error::Result;
use crate::merge::{KnowledgeMerger, MergeEngine, MergeStats};
use crate::options::TransferOptions;
use crate::registry::{KnowledgeRegistry, TransferRecord};

/// Result of a transfer attempt. Rejections are reported here, not as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    /// Whether the target now holds the merged payload
    pub success: bool,
    /// Summary for logs and callers
    pub message: String,
    /// Score, when both agents were found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityResult>,
    /// Merge stats, when a merge succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<MergeStats>,
    /// Log entry written for a successful transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<TransferRecord>,
}

impl TransferOutcome {
    fn rejected(message: String, compatibility: Option<CompatibilityResult>) -> Self {
        warn!("{message}");
        Self {
            success: false,
            message,
            compatibility,
            stats: None,
            record: None,
        }
    }
}

/// Scores and merges knowledge from one agent into another.
pub struct KnowledgeTransferBroker<M = MergeEngine> {
    registry: Arc<KnowledgeRegistry>,
    scorer: CompatibilityScorer,
    merger: M,
}

impl KnowledgeTransferBroker<MergeEngine> {
    /// Create a broker over a shared registry.
    pub fn new(registry: Arc<KnowledgeRegistry>) -> Self {
        Self::with_merger(registry, MergeEngine::new())
    }
}

impl Default for KnowledgeTransferBroker<MergeEngine> {
    fn default() -> Self {
        Self::new(Arc::new(KnowledgeRegistry::new()))
    }
}

impl<M: KnowledgeMerger> KnowledgeTransferBroker<M> {
    /// Create a broker with a custom merger.
    pub fn with_merger(registry: Arc<KnowledgeRegistry>, merger: M) -> Self {
        Self {
            registry,
            scorer: CompatibilityScorer::new(),
            merger,
        }
    }

    /// Underlying registry.
    pub fn registry(&self) -> &Arc<KnowledgeRegistry> {
        &self.registry
    }

    /// Merger in use.
    pub fn merger(&self) -> &M {
        &self.merger
    }

    /// See [`KnowledgeRegistry::register_knowledge`].
    pub fn register_knowledge(
        &self,
        agent_id: impl Into<AgentId>,
        knowledge: KnowledgePayload,
        attributes: Option<KnowledgeAttributes>,
    ) -> bool {
        self.registry.register_knowledge(agent_id, knowledge, attributes)
    }

    /// See [`KnowledgeRegistry::update_knowledge`].
    pub fn update_knowledge(
        &self,
        agent_id: impl Into<AgentId>,
        knowledge: KnowledgePayload,
        attributes: Option<KnowledgeAttributes>,
    ) -> Result<bool> {
        self.registry.update_knowledge(agent_id, knowledge, attributes)
    }

    /// Score two registered agents without merging.
    pub fn check_compatibility(&self, source: &AgentId, target: &AgentId) -> Result<CompatibilityResult> {
        let source = self.registry.require(source)?;
        let target = self.registry.require(target)?;
        Ok(self.scorer.score(&source.knowledge, &target.knowledge))
    }

    /// Merge the source agent's knowledge into the target agent's record.
    ///
    /// The target's record is only written when the pair scores at or above
    /// the threshold and the merge succeeds. Writes to the target are
    /// serialized with every other write to that agent.
    pub fn transfer_knowledge(
        &self,
        source_id: &AgentId,
        target_id: &AgentId,
        options: &TransferOptions,
    ) -> TransferOutcome {
        if let Err(e) = options.validate() {
            return TransferOutcome::rejected(e.to_string(), None);
        }
        if !self.registry.contains(target_id) {
            return Self::unregistered_target(target_id);
        }

        let outcome = {
            let lock = self.registry.target_lock(target_id);
            let _guard = lock.lock();
            self.transfer_locked(source_id, target_id, options)
        };
        self.registry.release_lock(target_id);
        outcome
    }

    fn unregistered_target(target_id: &AgentId) -> TransferOutcome {
        TransferOutcome::rejected(format!("Target agent {target_id} is not registered"), None)
    }

    /// Read, score, merge and write while holding the target lock.
    fn transfer_locked(
        &self,
        source_id: &AgentId,
        target_id: &AgentId,
        options: &TransferOptions,
    ) -> TransferOutcome {
        let Some(source) = self.registry.get(source_id) else {
            return TransferOutcome::rejected(format!("Source agent {source_id} is not registered"), None);
        };
        let Some(target) = self.registry.get(target_id) else {
            return Self::unregistered_target(target_id);
        };

        let compatibility = self.scorer.score(&source.knowledge, &target.knowledge);
        if !compatibility.compatible || compatibility.score < options.compatibility_threshold {
            return TransferOutcome::rejected(
                format!(
                    "Knowledge from {source_id} is not compatible with {target_id} (score {:.3}, threshold {:.3}): {}",
                    compatibility.score, options.compatibility_threshold, compatibility.reason
                ),
                Some(compatibility),
            );
        }

        let merged = self.merger.merge(
            &target.knowledge,
            &source.knowledge,
            options.merge_strategy,
            options.merge_weight,
        );
        let knowledge = match merged.knowledge {
            Some(knowledge) if merged.success => knowledge,
            _ => {
                let reason = merged.message.unwrap_or_else(|| "merge produced no knowledge".to_string());
                return TransferOutcome::rejected(
                    format!("Merge from {source_id} into {target_id} failed: {reason}"),
                    Some(compatibility),
                );
            }
        };

        let kind = knowledge.kind();
        if !self.registry.apply_transfer(target_id, source_id, knowledge) {
            return TransferOutcome::rejected(
                format!("Target agent {target_id} was removed during transfer"),
                Some(compatibility),
            );
        }

        let record = TransferRecord {
            timestamp: Utc::now(),
            source_agent_id: source_id.clone(),
            target_agent_id: target_id.clone(),
            representation_kind: kind,
            compatibility_score: compatibility.score,
            merge_strategy: options.merge_strategy,
            merge_weight: options.merge_weight,
            result_stats: merged.stats,
        };
        self.registry.record_transfer(record.clone());

        info!(
            source = %source_id,
            target = %target_id,
            kind = %record.representation_kind,
            score = compatibility.score,
            strategy = %options.merge_strategy,
            updated = merged.stats.updated_actions + merged.stats.updated_weights,
            "Transferred knowledge"
        );

        TransferOutcome {
            success: true,
            message: format!(
                "Transferred {} knowledge from {source_id} to {target_id}",
                record.representation_kind
            ),
            compatibility: Some(compatibility),
            stats: Some(merged.stats),
            record: Some(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MergeStrategy;
    use evolab_core::{ActionTable, GenericKnowledge, TabularKnowledge};

    fn tabular(entries: &[(&str, f64)]) -> KnowledgePayload {
        let q: ActionTable = entries
            .iter()
            .map(|(state, v)| (state.to_string(), [("go".to_string(), *v)].into_iter().collect()))
            .collect();
        KnowledgePayload::Tabular(TabularKnowledge {
            q_table: Some(q),
            learning_rate: Some(0.1),
            discount_factor: Some(0.9),
        })
    }

    #[test]
    fn test_transfer_requires_registered_agents() {
        let broker = KnowledgeTransferBroker::new(Arc::new(KnowledgeRegistry::new()));
        broker.register_knowledge("t", tabular(&[("s0", 1.0)]), None);

        let outcome = broker.transfer_knowledge(&"s".into(), &"t".into(), &TransferOptions::default());
        assert!(!outcome.success);
        assert!(outcome.message.contains("not registered"));
        assert!(outcome.compatibility.is_none());

        assert!(broker.check_compatibility(&"s".into(), &"t".into()).is_err());
    }

    #[test]
    fn test_successful_transfer_writes_target_and_log() {
        let broker = KnowledgeTransferBroker::new(Arc::new(KnowledgeRegistry::new()));
        broker.register_knowledge("s", tabular(&[("s0", 3.0)]), None);
        broker.register_knowledge("t", tabular(&[("s0", 1.0)]), None);

        let options = TransferOptions::default().with_weight(0.25);
        let outcome = broker.transfer_knowledge(&"s".into(), &"t".into(), &options);
        assert!(outcome.success, "{}", outcome.message);

        let record = broker.registry().get(&"t".into()).unwrap();
        let KnowledgePayload::Tabular(t) = &record.knowledge else {
            panic!("expected tabular payload");
        };
        assert_eq!(t.q_table.as_ref().unwrap()["s0"]["go"], 1.5);
        assert_eq!(record.metadata.last_transfer_from, Some(AgentId::from("s")));

        let history = broker.registry().transfer_history(None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].merge_strategy, MergeStrategy::Weighted);
        assert_eq!(history[0].result_stats.updated_actions, 1);
        assert_eq!(outcome.record.as_ref(), Some(&history[0]));
    }

    #[test]
    fn test_unknown_kinds_never_transfer_at_default_threshold() {
        let broker = KnowledgeTransferBroker::new(Arc::new(KnowledgeRegistry::new()));
        let generic = || {
            KnowledgePayload::Generic(GenericKnowledge {
                kind: "decision-tree".into(),
                fields: Default::default(),
            })
        };
        broker.register_knowledge("s", generic(), None);
        broker.register_knowledge("t", generic(), None);

        let outcome = broker.transfer_knowledge(&"s".into(), &"t".into(), &TransferOptions::default());
        assert!(!outcome.success);
        let compatibility = outcome.compatibility.unwrap();
        assert!(compatibility.compatible);
        assert_eq!(compatibility.score, 0.5);

        // Lowering the threshold reaches the merger, which has no routine for it.
        let options = TransferOptions::default().with_threshold(0.5);
        let outcome = broker.transfer_knowledge(&"s".into(), &"t".into(), &options);
        assert!(!outcome.success);
        assert!(outcome.message.contains("No merge routine"));
        assert!(broker.registry().transfer_history(None).is_empty());
    }

    #[test]
    fn test_non_finite_options_are_rejected_before_scoring() {
        let broker = KnowledgeTransferBroker::new(Arc::new(KnowledgeRegistry::new()));
        broker.register_knowledge("s", tabular(&[("s0", 3.0)]), None);
        broker.register_knowledge("t", tabular(&[("s0", 1.0)]), None);
        let before = broker.registry().get(&"t".into()).unwrap();

        for options in [
            TransferOptions::default().with_weight(f64::NAN),
            TransferOptions::default().with_weight(1.5),
            TransferOptions::default().with_threshold(f64::NAN),
        ] {
            let outcome = broker.transfer_knowledge(&"s".into(), &"t".into(), &options);
            assert!(!outcome.success);
            assert!(outcome.message.contains("invalid transfer options"), "{}", outcome.message);
            assert!(outcome.compatibility.is_none());
        }

        assert_eq!(broker.registry().get(&"t".into()).unwrap(), before);
        assert!(broker.registry().transfer_history(None).is_empty());
    }

    #[test]
    fn test_transfers_to_unknown_targets_leave_no_locks_behind() {
        let broker = KnowledgeTransferBroker::new(Arc::new(KnowledgeRegistry::new()));
        broker.register_knowledge("s", tabular(&[("s0", 1.0)]), None);
        broker.register_knowledge("t", tabular(&[("s0", 1.0)]), None);
        let baseline = broker.registry().tracked_locks();

        for i in 0..32 {
            let ghost = AgentId::new(format!("ghost-{i}"));
            let outcome = broker.transfer_knowledge(&"s".into(), &ghost, &TransferOptions::default());
            assert!(!outcome.success);
            assert!(outcome.message.contains("not registered"));
        }
        assert_eq!(broker.registry().tracked_locks(), baseline);

        broker.registry().remove(&"t".into());
        broker.registry().remove(&"s".into());
        assert_eq!(broker.registry().tracked_locks(), 0);
    }
}
