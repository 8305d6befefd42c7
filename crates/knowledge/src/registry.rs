//! In-memory knowledge registry.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use evolab_core::{
    AgentId, KnowledgeAttributes, KnowledgePayload, KnowledgeRecord, RepresentationKind, Time,
};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{KnowledgeError, Result};
use crate::merge::MergeStats;
use crate::options::MergeStrategy;

/// Immutable log entry for a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// When the merged payload was written
    pub timestamp: Time,
    /// Agent the knowledge came from
    pub source_agent_id: AgentId,
    /// Agent whose record was overwritten
    pub target_agent_id: AgentId,
    /// Kind of both payloads
    pub representation_kind: RepresentationKind,
    /// Score that admitted the transfer
    pub compatibility_score: f64,
    /// Strategy used
    pub merge_strategy: MergeStrategy,
    /// Weight used
    pub merge_weight: f64,
    /// What the merge changed
    pub result_stats: MergeStats,
}

/// Shared store of agent knowledge plus the transfer log.
///
/// Every method takes `&self`; the registry is meant to be shared behind an
/// `Arc`. Writes to one agent's record are serialized through a per-agent
/// lock (see [`KnowledgeRegistry::target_lock`]).
#[derive(Debug, Default)]
pub struct KnowledgeRegistry {
    records: RwLock<HashMap<AgentId, KnowledgeRecord>>,
    history: Mutex<VecDeque<TransferRecord>>,
    history_cap: Option<usize>,
    agent_locks: Mutex<HashMap<AgentId, Arc<Mutex<()>>>>,
}

impl KnowledgeRegistry {
    /// Create an empty registry with an unbounded transfer log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry keeping only the latest `cap` transfers.
    pub fn with_history_cap(cap: usize) -> Self {
        Self {
            history_cap: Some(cap),
            ..Self::default()
        }
    }

    /// Store or overwrite an agent's knowledge.
    ///
    /// Returns `false` without storing anything when the payload has no
    /// representation kind.
    pub fn register_knowledge(
        &self,
        agent_id: impl Into<AgentId>,
        knowledge: KnowledgePayload,
        attributes: Option<KnowledgeAttributes>,
    ) -> bool {
        let agent_id = agent_id.into();
        if !knowledge.has_kind() {
            warn!(agent = %agent_id, "Rejected knowledge without a representation kind");
            return false;
        }
        let knowledge = match knowledge.normalized() {
            Ok(knowledge) => knowledge,
            Err(e) => {
                warn!(agent = %agent_id, error = %e, "Rejected knowledge payload");
                return false;
            }
        };

        let lock = self.target_lock(&agent_id);
        let _guard = lock.lock();
        self.store(agent_id, knowledge, attributes);
        true
    }

    /// Parse and register an untyped JSON payload.
    pub fn register_json(
        &self,
        agent_id: impl Into<AgentId>,
        value: Value,
        attributes: Option<KnowledgeAttributes>,
    ) -> bool {
        let agent_id = agent_id.into();
        match KnowledgePayload::from_value(value) {
            Ok(knowledge) => self.register_knowledge(agent_id, knowledge, attributes),
            Err(e) => {
                warn!(agent = %agent_id, error = %e, "Rejected knowledge payload");
                false
            }
        }
    }

    /// Replace an agent's knowledge, keeping its kind.
    ///
    /// Unregistered agents are registered. Changing the kind of a registered
    /// agent is an error.
    pub fn update_knowledge(
        &self,
        agent_id: impl Into<AgentId>,
        knowledge: KnowledgePayload,
        attributes: Option<KnowledgeAttributes>,
    ) -> Result<bool> {
        let agent_id = agent_id.into();
        if !knowledge.has_kind() {
            warn!(agent = %agent_id, "Rejected knowledge without a representation kind");
            return Ok(false);
        }
        let knowledge = knowledge.normalized()?;

        let lock = self.target_lock(&agent_id);
        let _guard = lock.lock();

        let mut records = self.records.write();
        let Some(record) = records.get_mut(&agent_id) else {
            drop(records);
            self.store(agent_id, knowledge, attributes);
            return Ok(true);
        };

        let (expected, found) = (record.kind(), knowledge.kind());
        if expected != found {
            return Err(KnowledgeError::KindMismatch {
                agent: agent_id,
                expected,
                found,
            });
        }

        record.knowledge = knowledge;
        record.metadata.last_updated = Utc::now();
        if let Some(attributes) = attributes {
            record.metadata.attributes = attributes;
        }
        debug!(agent = %agent_id, kind = %found, "Updated knowledge");
        Ok(true)
    }

    /// Parse an untyped JSON payload and update with it.
    pub fn update_json(
        &self,
        agent_id: impl Into<AgentId>,
        value: Value,
        attributes: Option<KnowledgeAttributes>,
    ) -> Result<bool> {
        let knowledge = KnowledgePayload::from_value(value)?;
        self.update_knowledge(agent_id, knowledge, attributes)
    }

    /// Snapshot of an agent's record.
    pub fn get(&self, agent_id: &AgentId) -> Option<KnowledgeRecord> {
        self.read_records().get(agent_id).cloned()
    }

    /// Snapshot of an agent's record, failing if absent.
    pub fn require(&self, agent_id: &AgentId) -> Result<KnowledgeRecord> {
        self.get(agent_id)
            .ok_or_else(|| KnowledgeError::NotRegistered(agent_id.clone()))
    }

    /// Whether the agent has a record.
    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.read_records().contains_key(agent_id)
    }

    /// Registered agents, sorted.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<_> = self.read_records().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.read_records().len()
    }

    /// Whether no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.read_records().is_empty()
    }

    /// Drop an agent's record. The transfer log is kept.
    pub fn remove(&self, agent_id: &AgentId) -> Option<KnowledgeRecord> {
        let removed = {
            let lock = self.target_lock(agent_id);
            let _guard = lock.lock();
            self.records.write().remove(agent_id)
        };
        self.release_lock(agent_id);
        removed
    }

    /// Transfer log, oldest first. With a limit, only the latest `limit`
    /// entries are returned.
    pub fn transfer_history(&self, limit: Option<usize>) -> Vec<TransferRecord> {
        let history = self.history.lock();
        let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
        history.iter().skip(skip).cloned().collect()
    }

    /// Transfers where the agent was source or target, oldest first.
    pub fn transfers_for(&self, agent_id: &AgentId, limit: Option<usize>) -> Vec<TransferRecord> {
        let history = self.history.lock();
        let mut matching: Vec<_> = history
            .iter()
            .filter(|r| &r.source_agent_id == agent_id || &r.target_agent_id == agent_id)
            .cloned()
            .collect();
        if let Some(n) = limit {
            let skip = matching.len().saturating_sub(n);
            matching.drain(..skip);
        }
        matching
    }

    /// Lock serializing writes to one agent's record.
    pub(crate) fn target_lock(&self, agent_id: &AgentId) -> Arc<Mutex<()>> {
        let mut locks = self.agent_locks.lock();
        Arc::clone(locks.entry(agent_id.clone()).or_default())
    }

    /// Forget the agent's lock once it has no record and nobody else holds
    /// it. Call after dropping every guard on it.
    pub(crate) fn release_lock(&self, agent_id: &AgentId) {
        let mut locks = self.agent_locks.lock();
        let idle = locks
            .get(agent_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle && !self.contains(agent_id) {
            locks.remove(agent_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.agent_locks.lock().len()
    }

    /// Write a merged payload into the target's record. Caller holds the
    /// target lock. Returns `false` if the target disappeared.
    pub(crate) fn apply_transfer(
        &self,
        target: &AgentId,
        source: &AgentId,
        knowledge: KnowledgePayload,
    ) -> bool {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(target) else {
            return false;
        };
        record.knowledge = knowledge;
        record.metadata.last_updated = Utc::now();
        record.metadata.last_transfer_from = Some(source.clone());
        true
    }

    pub(crate) fn record_transfer(&self, record: TransferRecord) {
        let mut history = self.history.lock();
        history.push_back(record);
        if let Some(cap) = self.history_cap {
            while history.len() > cap {
                history.pop_front();
            }
        }
    }

    fn store(
        &self,
        agent_id: AgentId,
        knowledge: KnowledgePayload,
        attributes: Option<KnowledgeAttributes>,
    ) {
        debug!(agent = %agent_id, kind = %knowledge.kind(), "Registered knowledge");
        let record = KnowledgeRecord::new(agent_id.clone(), knowledge, attributes.unwrap_or_default());
        self.records
            .write()
            .insert(agent_id, record);
    }

    fn read_records(&self) -> RwLockReadGuard<'_, HashMap<AgentId, KnowledgeRecord>> {
        self.records.read()
    }
}
