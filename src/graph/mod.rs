//! Knowledge graph module: typed entities and relations, per-chunk merging,
//! and the SQLite-backed graph store.
//!
//! Entities are identified by their exact name. Relations are directed,
//! typed edges between entity names and are identified by the
//! `(source, target, type)` triple.

mod consolidate;
mod store;

pub use consolidate::consolidate;
pub use store::{EntityId, GraphStore, PersistSummary, StoredEdge, StoredGraph, StoredNode};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PapergraphError;

/// Closed vocabulary of entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityType {
    Person,
    Organization,
    Concept,
    Method,
    Field,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Person,
        EntityType::Organization,
        EntityType::Concept,
        EntityType::Method,
        EntityType::Field,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "Person",
            EntityType::Organization => "Organization",
            EntityType::Concept => "Concept",
            EntityType::Method => "Method",
            EntityType::Field => "Field",
        }
    }
}

impl FromStr for EntityType {
    type Err = PapergraphError;

    /// Case-insensitive match against the vocabulary.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PapergraphError::Parse(format!("unknown entity type: {:?}", s)))
    }
}

impl TryFrom<String> for EntityType {
    type Error = PapergraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vocabulary of relation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RelationType {
    Discusses,
    Uses,
    Contains,
    RelatedTo,
    Develops,
    Investigates,
    Finds,
    Introduces,
    Proposes,
    ComparesTo,
    PartOf,
    AppliesTo,
    AuthoredBy,
    AffiliatedWith,
}

impl RelationType {
    pub const ALL: [RelationType; 14] = [
        RelationType::Discusses,
        RelationType::Uses,
        RelationType::Contains,
        RelationType::RelatedTo,
        RelationType::Develops,
        RelationType::Investigates,
        RelationType::Finds,
        RelationType::Introduces,
        RelationType::Proposes,
        RelationType::ComparesTo,
        RelationType::PartOf,
        RelationType::AppliesTo,
        RelationType::AuthoredBy,
        RelationType::AffiliatedWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Discusses => "DISCUSSES",
            RelationType::Uses => "USES",
            RelationType::Contains => "CONTAINS",
            RelationType::RelatedTo => "RELATED_TO",
            RelationType::Develops => "DEVELOPS",
            RelationType::Investigates => "INVESTIGATES",
            RelationType::Finds => "FINDS",
            RelationType::Introduces => "INTRODUCES",
            RelationType::Proposes => "PROPOSES",
            RelationType::ComparesTo => "COMPARES_TO",
            RelationType::PartOf => "PART_OF",
            RelationType::AppliesTo => "APPLIES_TO",
            RelationType::AuthoredBy => "AUTHORED_BY",
            RelationType::AffiliatedWith => "AFFILIATED_WITH",
        }
    }
}

impl FromStr for RelationType {
    type Err = PapergraphError;

    /// Accepts `RELATED_TO`, `related to`, `Related-To` and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        RelationType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| PapergraphError::Parse(format!("unknown relation type: {:?}", s)))
    }
}

impl TryFrom<String> for RelationType {
    type Error = PapergraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RelationType> for String {
    fn from(value: RelationType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
        }
    }
}

/// A typed, directed edge between two entity names (source --type--> target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
}

impl Relation {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type,
        }
    }
}

/// Entities and relations extracted from a single chunk, before merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialGraph {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// De-duplicated, referentially consistent graph for one document.
///
/// Only [`consolidate`] builds one, so every relation endpoint is
/// guaranteed to name an entity in the same graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalGraph {
    entities: Vec<Entity>,
    relations: Vec<Relation>,
}

impl CanonicalGraph {
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Entity>, Vec<Relation>) {
        (self.entities, self.relations)
    }
}
