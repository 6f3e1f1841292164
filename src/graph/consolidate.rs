//! Merge per-chunk partial graphs into one canonical graph.

use std::collections::HashMap;

use super::{CanonicalGraph, Entity, EntityType, PartialGraph, Relation, RelationType};

/// Merge partial graphs, given in chunk order, into a canonical graph.
///
/// - Entities are keyed by exact name; a later chunk's type overrides an
///   earlier one.
/// - Relation endpoints with no declared entity become `Concept` entities.
/// - Relations are keyed by `(source, target, type)`; the last one seen is kept.
///
/// Output order is first-appearance order, so equal input yields equal output.
pub fn consolidate(partials: &[PartialGraph]) -> CanonicalGraph {
    let mut entities: Vec<Entity> = Vec::new();
    let mut entity_index: HashMap<String, usize> = HashMap::new();

    for entity in partials.iter().flat_map(|p| p.entities.iter()) {
        match entity_index.get(&entity.name) {
            Some(&idx) => {
                if entities[idx].entity_type != entity.entity_type {
                    log::debug!(
                        "Entity {:?} retyped {} -> {}",
                        entity.name,
                        entities[idx].entity_type,
                        entity.entity_type
                    );
                }
                entities[idx].entity_type = entity.entity_type;
            }
            None => {
                entity_index.insert(entity.name.clone(), entities.len());
                entities.push(entity.clone());
            }
        }
    }

    let mut relations: Vec<Relation> = Vec::new();
    let mut relation_index: HashMap<(String, String, RelationType), usize> = HashMap::new();
    let mut synthesized = 0usize;

    for relation in partials.iter().flat_map(|p| p.relations.iter()) {
        for endpoint in [&relation.source, &relation.target] {
            if !entity_index.contains_key(endpoint) {
                entity_index.insert(endpoint.clone(), entities.len());
                entities.push(Entity::new(endpoint.clone(), EntityType::Concept));
                synthesized += 1;
            }
        }

        let key = (
            relation.source.clone(),
            relation.target.clone(),
            relation.relation_type,
        );
        match relation_index.get(&key) {
            Some(&idx) => relations[idx] = relation.clone(),
            None => {
                relation_index.insert(key, relations.len());
                relations.push(relation.clone());
            }
        }
    }

    if synthesized > 0 {
        log::debug!("Synthesized {} Concept entities for relation endpoints", synthesized);
    }

    CanonicalGraph {
        entities,
        relations,
    }
}
