//! Knowledge model - what an agent has learned, tagged by representation.

use std::collections::BTreeMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use crate::id::AgentId;
use crate::Time;

/// state -> action -> value (Q-values or action probabilities).
pub type ActionTable = BTreeMap<String, BTreeMap<String, f64>>;

/// Free-form caller metadata attached to a knowledge record.
pub type KnowledgeAttributes = BTreeMap<String, Value>;

/// The representation a knowledge payload is expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RepresentationKind {
    /// Tabular Q-learning values
    Tabular,
    /// Policy-gradient action probabilities
    PolicyGradient,
    /// Deep-Q network weights with a declared architecture
    DeepQ,
    /// Generic layered network weights
    NetworkWeights,
    /// Any other tag
    Other(String),
}

impl RepresentationKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tabular => "tabular",
            Self::PolicyGradient => "policy-gradient",
            Self::DeepQ => "deep-q",
            Self::NetworkWeights => "network-weights",
            Self::Other(name) => name,
        }
    }

    /// Whether scoring and merging have dedicated support for this kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for RepresentationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "tabular" => Self::Tabular,
            "policy-gradient" => Self::PolicyGradient,
            "deep-q" => Self::DeepQ,
            "network-weights" => Self::NetworkWeights,
            _ => Self::Other(s),
        }
    }
}

impl From<RepresentationKind> for String {
    fn from(kind: RepresentationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while reading an untyped payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Payload is not a JSON object
    #[error("knowledge payload must be a JSON object")]
    NotAnObject,

    /// No `type` tag
    #[error("knowledge payload lacks a representation-kind tag")]
    MissingKind,

    /// Tag is known but the body does not parse
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        /// Tag that was found
        kind: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

/// A tagged knowledge payload.
///
/// On the wire the payload is a JSON object whose `type` field names the
/// representation kind. Unrecognized tags are preserved as [`GenericKnowledge`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum KnowledgePayload {
    /// `tabular`
    Tabular(TabularKnowledge),
    /// `policy-gradient`
    PolicyGradient(PolicyKnowledge),
    /// `deep-q`
    DeepQ(DeepQKnowledge),
    /// `network-weights`
    NetworkWeights(NetworkWeightsKnowledge),
    /// Anything else
    Generic(GenericKnowledge),
}

/// Tabular Q-learning knowledge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularKnowledge {
    /// state -> action -> Q-value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_table: Option<ActionTable>,

    /// Learning rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,

    /// Discount factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_factor: Option<f64>,
}

/// Policy-gradient knowledge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyKnowledge {
    /// state -> action -> probability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<ActionTable>,

    /// Learning rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,

    /// Discount factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_factor: Option<f64>,
}

/// Deep-Q network knowledge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepQKnowledge {
    /// Flattened weight array per layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<Vec<f64>>>,

    /// Declared architecture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<NetworkArchitecture>,

    /// Learning rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,

    /// Discount factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_factor: Option<f64>,
}

/// Declared shape of a Deep-Q network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkArchitecture {
    /// Input dimensionality
    pub input_dimension: usize,

    /// Output dimensionality (number of actions)
    pub output_dimension: usize,

    /// Hidden layer sizes
    #[serde(default)]
    pub hidden_layers: Vec<usize>,

    /// Activation function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<String>,
}

/// Generic layered network weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkWeightsKnowledge {
    /// Layers in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<WeightLayer>>,

    /// Learning rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
}

/// One layer of a generic network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightLayer {
    /// Declared shape, e.g. `[4, 16]`
    pub shape: Vec<usize>,

    /// Flattened weights
    pub values: Vec<f64>,
}

/// Payload with a tag this crate does not model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericKnowledge {
    /// The tag as given
    pub kind: String,

    /// Remaining fields
    pub fields: Map<String, Value>,
}

impl KnowledgePayload {
    /// Parse an untyped JSON payload, dispatching on its `type` tag.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let Value::Object(mut fields) = value else {
            return Err(PayloadError::NotAnObject);
        };
        let kind = match fields.get("type") {
            Some(Value::String(s)) if !s.is_empty() => RepresentationKind::from(s.clone()),
            _ => return Err(PayloadError::MissingKind),
        };

        let malformed = |source| PayloadError::Malformed {
            kind: kind.to_string(),
            source,
        };
        let payload = match &kind {
            RepresentationKind::Tabular => {
                Self::Tabular(serde_json::from_value(Value::Object(fields)).map_err(malformed)?)
            }
            RepresentationKind::PolicyGradient => {
                Self::PolicyGradient(serde_json::from_value(Value::Object(fields)).map_err(malformed)?)
            }
            RepresentationKind::DeepQ => {
                Self::DeepQ(serde_json::from_value(Value::Object(fields)).map_err(malformed)?)
            }
            RepresentationKind::NetworkWeights => {
                Self::NetworkWeights(serde_json::from_value(Value::Object(fields)).map_err(malformed)?)
            }
            RepresentationKind::Other(name) => {
                fields.remove("type");
                Self::Generic(GenericKnowledge {
                    kind: name.clone(),
                    fields,
                })
            }
        };
        Ok(payload)
    }

    /// Representation kind of this payload.
    pub fn kind(&self) -> RepresentationKind {
        match self {
            Self::Tabular(_) => RepresentationKind::Tabular,
            Self::PolicyGradient(_) => RepresentationKind::PolicyGradient,
            Self::DeepQ(_) => RepresentationKind::DeepQ,
            Self::NetworkWeights(_) => RepresentationKind::NetworkWeights,
            Self::Generic(g) => RepresentationKind::from(g.kind.clone()),
        }
    }

    /// Re-parse a [`KnowledgePayload::Generic`] whose tag names a known kind
    /// into its typed variant. Other payloads are returned unchanged.
    pub fn normalized(self) -> Result<Self, PayloadError> {
        match self {
            Self::Generic(g) if RepresentationKind::from(g.kind.clone()).is_known() => {
                let mut fields = g.fields;
                fields.insert("type".to_string(), Value::String(g.kind));
                Self::from_value(Value::Object(fields))
            }
            other => Ok(other),
        }
    }

    /// Whether the payload carries a non-empty kind tag.
    pub fn has_kind(&self) -> bool {
        match self {
            Self::Generic(g) => !g.kind.is_empty(),
            _ => true,
        }
    }
}

impl TryFrom<Value> for KnowledgePayload {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum TaggedRef<'a> {
    Tabular(&'a TabularKnowledge),
    PolicyGradient(&'a PolicyKnowledge),
    DeepQ(&'a DeepQKnowledge),
    NetworkWeights(&'a NetworkWeightsKnowledge),
}

impl Serialize for KnowledgePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Tabular(k) => TaggedRef::Tabular(k).serialize(serializer),
            Self::PolicyGradient(k) => TaggedRef::PolicyGradient(k).serialize(serializer),
            Self::DeepQ(k) => TaggedRef::DeepQ(k).serialize(serializer),
            Self::NetworkWeights(k) => TaggedRef::NetworkWeights(k).serialize(serializer),
            Self::Generic(g) => {
                let mut map = serializer.serialize_map(Some(g.fields.len() + 1))?;
                map.serialize_entry("type", &g.kind)?;
                for (key, value) in &g.fields {
                    if key != "type" {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.end()
            }
        }
    }
}

/// What one agent currently knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Owning agent
    pub agent_id: AgentId,

    /// Current payload
    pub knowledge: KnowledgePayload,

    /// Bookkeeping
    pub metadata: RecordMetadata,
}

/// Record bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// First registration
    pub registered_at: Time,

    /// Last write
    pub last_updated: Time,

    /// Source agent of the most recent transfer into this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transfer_from: Option<AgentId>,

    /// Caller-supplied metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: KnowledgeAttributes,
}

impl KnowledgeRecord {
    /// Create a freshly registered record.
    pub fn new(agent_id: AgentId, knowledge: KnowledgePayload, attributes: KnowledgeAttributes) -> Self {
        let now = chrono::Utc::now();
        Self {
            agent_id,
            knowledge,
            metadata: RecordMetadata {
                registered_at: now,
                last_updated: now,
                last_transfer_from: None,
                attributes,
            },
        }
    }

    /// Representation kind of the stored payload.
    pub fn kind(&self) -> RepresentationKind {
        self.knowledge.kind()
    }
}
