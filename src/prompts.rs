//! Fixed instruction templates for extraction and narrative calls.

use serde_json::{json, Value};

use crate::graph::{EntityType, RelationType};

pub const EXTRACTION_SYSTEM: &str = "You are an expert at extracting entities and relations from scientific texts.
Extract all relevant entities and their types, and the relationships between them and their types.
Entity types must be chosen from: {entity_types}.
Relation types must be chosen from: {relation_types}.
Every relation's source and target must be the exact name of an extracted entity.
Format your output as a JSON object with 'entities' and 'relations' keys.";

pub const KEY_TOPICS_SYSTEM: &str = "You are a research assistant. Read the research paper provided by the user and write a markdown summary of its key topics and methodologies.
Use a '## Key Topics' section and a '## Methodologies' section, each a bulleted list with one short explanatory sentence per item.
Only report what the paper states.";

pub const HYPOTHESES_SYSTEM: &str = "You are a creative scientific collaborator. Read the research paper provided by the user and propose novel, testable hypotheses and research ideas that build on it.
Write markdown: a numbered list where each item has a bold one-line hypothesis, a short rationale grounded in the paper, and a sketch of how it could be tested.";

pub const FUTURE_WORK_SYSTEM: &str = "You are a research advisor. Read the research paper provided by the user and suggest concrete directions for future work.
Cover limitations acknowledged or implied by the paper, open questions, and natural extensions.
Write markdown with a short heading per direction followed by one paragraph.";

/// System prompt for chunk extraction, with the type vocabularies filled in.
pub fn extraction_system() -> String {
    let entity_types: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
    let relation_types: Vec<&str> = RelationType::ALL.iter().map(|t| t.as_str()).collect();
    EXTRACTION_SYSTEM
        .replace("{entity_types}", &entity_types.join(", "))
        .replace("{relation_types}", &relation_types.join(", "))
}

pub fn extraction_user(chunk: &str) -> String {
    format!("Extract entities and relations from the following text:\n\n{}", chunk)
}

/// JSON schema of the structured extraction answer.
pub fn extraction_schema() -> Value {
    let entity_types: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
    let relation_types: Vec<&str> = RelationType::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "description": "List of extracted entities",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Name of the entity"},
                        "type": {"type": "string", "enum": entity_types}
                    },
                    "required": ["name", "type"]
                }
            },
            "relations": {
                "type": "array",
                "description": "List of extracted relations",
                "items": {
                    "type": "object",
                    "properties": {
                        "source": {"type": "string", "description": "Name of the source entity"},
                        "target": {"type": "string", "description": "Name of the target entity"},
                        "type": {"type": "string", "enum": relation_types}
                    },
                    "required": ["source", "target", "type"]
                }
            }
        },
        "required": ["entities", "relations"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_system_lists_vocabularies() {
        let prompt = extraction_system();
        assert!(prompt.contains("Person, Organization, Concept, Method, Field"));
        assert!(prompt.contains("AFFILIATED_WITH"));
        assert!(!prompt.contains("{entity_types}"));
    }

    #[test]
    fn test_extraction_schema_enums() {
        let schema = extraction_schema();
        let entity_enum = &schema["properties"]["entities"]["items"]["properties"]["type"]["enum"];
        assert_eq!(entity_enum.as_array().unwrap().len(), 5);
        let relation_enum = &schema["properties"]["relations"]["items"]["properties"]["type"]["enum"];
        assert_eq!(relation_enum.as_array().unwrap().len(), 14);
    }
}
