//! SQLite-backed graph store.
//!
//! Maps entity names to surrogate node ids and relations to id-keyed
//! edges. A store that failed to open stays usable: every operation
//! returns [`PapergraphError::StoreUnavailable`] instead of touching disk.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::Db;
use crate::error::{PapergraphError, Result};

use super::{CanonicalGraph, EntityType, RelationType};

/// Storage-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for EntityId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for EntityId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(EntityId)
    }
}

impl ToSql for EntityType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EntityType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: PapergraphError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for RelationType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RelationType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: PapergraphError| FromSqlError::Other(Box::new(e)))
    }
}

/// A persisted node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredNode {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

/// A persisted edge between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEdge {
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
}

/// Full contents of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoredGraph {
    pub nodes: Vec<StoredNode>,
    pub edges: Vec<StoredEdge>,
}

/// Counts from persisting one canonical graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub nodes_created: usize,
    pub nodes_existing: usize,
    pub edges_created: usize,
    pub edges_existing: usize,
}

/// Graph store adapter over the `nodes`/`edges` tables.
#[derive(Debug, Clone)]
pub struct GraphStore {
    db: Option<Db>,
    unavailable_reason: Option<String>,
}

impl GraphStore {
    /// Open the store at `db_path`.
    ///
    /// Never fails: if the database cannot be opened the returned store is
    /// unavailable and reports why on every call.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Self {
        let db_path = db_path.as_ref();
        match Db::open(db_path) {
            Ok(db) => {
                log::info!("Graph store opened at {}", db_path.display());
                Self {
                    db: Some(db),
                    unavailable_reason: None,
                }
            }
            Err(e) => {
                log::warn!(
                    "Graph store at {} unavailable, persistence disabled: {}",
                    db_path.display(),
                    e
                );
                Self::unavailable(e.to_string())
            }
        }
    }

    /// A store with no backing database.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            db: None,
            unavailable_reason: Some(reason.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.db.is_some()
    }

    fn db(&self) -> Result<&Db> {
        self.db.as_ref().ok_or_else(|| {
            PapergraphError::StoreUnavailable(
                self.unavailable_reason
                    .clone()
                    .unwrap_or_else(|| "no connection".to_string()),
            )
        })
    }

    /// Return the id of the node named `name`, creating it if absent.
    ///
    /// The type of an existing node is left unchanged.
    pub async fn upsert_entity(&self, name: &str, entity_type: EntityType) -> Result<EntityId> {
        if name.is_empty() {
            return Err(PapergraphError::InvalidInput("entity name must not be empty".to_string()));
        }
        let name = name.to_string();
        self.db()?
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let (id, _) = upsert_node(&tx, &name, entity_type)?;
                tx.commit()?;
                Ok(id)
            })
            .await
    }

    /// Insert the edge unless an identical one exists. Returns whether a row was added.
    pub async fn upsert_relation(
        &self,
        source_id: EntityId,
        target_id: EntityId,
        relation_type: RelationType,
    ) -> Result<bool> {
        self.db()?
            .with_connection(move |conn| insert_edge(conn, source_id, target_id, relation_type))
            .await
    }

    /// Read every node and edge, ordered by id.
    pub async fn fetch_all(&self) -> Result<StoredGraph> {
        self.db()?
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT id, name, type FROM nodes ORDER BY id")?;
                let nodes = stmt
                    .query_map([], |row| {
                        Ok(StoredNode {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            entity_type: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

                let mut stmt =
                    conn.prepare("SELECT source_id, target_id, type FROM edges ORDER BY id")?;
                let edges = stmt
                    .query_map([], |row| {
                        Ok(StoredEdge {
                            source_id: row.get(0)?,
                            target_id: row.get(1)?,
                            relation_type: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

                Ok(StoredGraph { nodes, edges })
            })
            .await
    }

    /// Delete all edges and nodes.
    pub async fn clear(&self) -> Result<()> {
        self.db()?
            .with_connection(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM edges", [])?;
                tx.execute("DELETE FROM nodes", [])?;
                tx.commit()?;
                log::info!("Graph store cleared");
                Ok(())
            })
            .await
    }

    /// Upsert every entity and relation of `graph` in one transaction.
    pub async fn persist(&self, graph: &CanonicalGraph) -> Result<PersistSummary> {
        let (entities, relations) = graph.clone().into_parts();
        self.db()?
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let mut summary = PersistSummary::default();
                let mut ids: HashMap<String, EntityId> = HashMap::with_capacity(entities.len());

                for entity in &entities {
                    let (id, created) = upsert_node(&tx, &entity.name, entity.entity_type)?;
                    if created {
                        summary.nodes_created += 1;
                    } else {
                        summary.nodes_existing += 1;
                    }
                    ids.insert(entity.name.clone(), id);
                }

                for relation in &relations {
                    let (Some(&source_id), Some(&target_id)) =
                        (ids.get(&relation.source), ids.get(&relation.target))
                    else {
                        // CanonicalGraph guarantees endpoints exist
                        return Err(PapergraphError::InvalidInput(format!(
                            "relation {} -> {} references an unknown entity",
                            relation.source, relation.target
                        )));
                    };
                    if insert_edge(&tx, source_id, target_id, relation.relation_type)? {
                        summary.edges_created += 1;
                    } else {
                        summary.edges_existing += 1;
                    }
                }

                tx.commit()?;
                Ok(summary)
            })
            .await
    }

    /// Release the underlying connection.
    pub fn close(self) -> Result<()> {
        match self.db {
            Some(db) => db.close(),
            None => Ok(()),
        }
    }
}

/// Check-then-insert for a node; caller holds the transaction.
fn upsert_node(conn: &Connection, name: &str, entity_type: EntityType) -> Result<(EntityId, bool)> {
    let existing: Option<EntityId> = conn
        .query_row("SELECT id FROM nodes WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok((id, false));
    }

    conn.execute(
        "INSERT INTO nodes (name, type) VALUES (?1, ?2)",
        params![name, entity_type],
    )?;
    Ok((EntityId(conn.last_insert_rowid()), true))
}

fn insert_edge(
    conn: &Connection,
    source_id: EntityId,
    target_id: EntityId,
    relation_type: RelationType,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO edges (source_id, target_id, type) VALUES (?1, ?2, ?3)",
        params![source_id, target_id, relation_type],
    )?;
    Ok(inserted > 0)
}
