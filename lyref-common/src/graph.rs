//! Reference graph assembled from a finished batch
//!
//! Songs and the entities they reference become nodes; each extracted
//! reference becomes a `reference` edge from the song to the entity.
//! Entities are deduplicated by exact name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::batch::BatchResult;
use crate::schema::ReferenceType;

/// Graph node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ReferenceType,
    pub id: String,
}

/// Edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Source work mentions the target entity
    Reference,
    /// Source entity created the target work
    Creation,
}

/// Directed graph edge
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Edge {
    pub name: EdgeKind,
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub id: String,
    pub description: String,
    /// Where the supporting evidence was collected from
    pub info_source: String,
}

/// Deduplicated entity/edge store
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Namespace {
    pub name_to_id: HashMap<String, String>,
    pub id_to_name: HashMap<String, String>,
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a namespace from one batch
    pub fn from_batch(batch: &BatchResult) -> Self {
        let mut namespace = Self::new();
        namespace.ingest(batch);
        namespace
    }

    /// Return the id for `name`, creating the entity if it is new
    ///
    /// The first type seen for a name is kept.
    pub fn intern(&mut self, name: &str, kind: ReferenceType) -> String {
        if let Some(id) = self.name_to_id.get(name) {
            return id.clone();
        }

        let id = Uuid::new_v4().to_string();
        self.name_to_id.insert(name.to_string(), id.clone());
        self.id_to_name.insert(id.clone(), name.to_string());
        self.entities.push(Entity {
            name: name.to_string(),
            kind,
            id: id.clone(),
        });
        id
    }

    /// Add one edge between existing entities
    pub fn connect(
        &mut self,
        name: EdgeKind,
        source_entity_id: &str,
        target_entity_id: &str,
        description: &str,
        info_source: &str,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.edges.push(Edge {
            name,
            source_entity_id: source_entity_id.to_string(),
            target_entity_id: target_entity_id.to_string(),
            id: id.clone(),
            description: description.to_string(),
            info_source: info_source.to_string(),
        });
        id
    }

    /// Fold a batch into the graph
    ///
    /// Songs are visited in corpus order. Each song is interned as an
    /// `artwork`; each of its references adds a `reference` edge
    /// song → entity sourced from the song's lyrics page.
    pub fn ingest(&mut self, batch: &BatchResult) {
        for (song_name, entry) in batch.iter() {
            let song_id = self.intern(song_name, ReferenceType::Artwork);
            for reference in &entry.extracted {
                let target_id = self.intern(&reference.entity, reference.kind);
                self.connect(
                    EdgeKind::Reference,
                    &song_id,
                    &target_id,
                    &reference.description,
                    &entry.source,
                );
            }
        }

        debug!(
            entities = self.entities.len(),
            edges = self.edges.len(),
            "Reference graph updated"
        );
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        let id = self.name_to_id.get(name)?;
        self.entities.iter().find(|e| &e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Annotation, ExtractedReference, Song};

    fn batch() -> BatchResult {
        let songs = vec![
            Song {
                name: "Thinkin Bout You".to_string(),
                content: vec![Annotation {
                    lyrics: "l".to_string(),
                    annotation: "a".to_string(),
                    source: "s".to_string(),
                }],
                lyrics_source: "src-1".to_string(),
            },
            Song {
                name: "Pink Matter".to_string(),
                content: vec![],
                lyrics_source: "src-2".to_string(),
            },
        ];
        let mut result = BatchResult::for_songs(&songs);
        result.append(
            "Thinkin Bout You",
            vec![
                ExtractedReference {
                    entity: "The Wizard of Oz".to_string(),
                    kind: ReferenceType::Artwork,
                    description: "tornado".to_string(),
                },
                ExtractedReference {
                    entity: "OutKast".to_string(),
                    kind: ReferenceType::Group,
                    description: "ice cold".to_string(),
                },
            ],
        );
        result.append(
            "Pink Matter",
            vec![ExtractedReference {
                entity: "OutKast".to_string(),
                kind: ReferenceType::Person,
                description: "André 3000 feature".to_string(),
            }],
        );
        result
    }

    #[test]
    fn test_ingest_builds_song_and_reference_nodes() {
        let namespace = Namespace::from_batch(&batch());
        // 2 songs + Wizard of Oz + OutKast
        assert_eq!(namespace.entities.len(), 4);
        assert_eq!(namespace.edges.len(), 3);
        assert_eq!(namespace.name_to_id.len(), namespace.id_to_name.len());
    }

    #[test]
    fn test_entities_deduplicated_by_name_first_type_wins() {
        let namespace = Namespace::from_batch(&batch());
        let outkast = namespace.entity("OutKast").unwrap();
        // Songs are visited in corpus order, so "Thinkin Bout You" interns it first
        assert_eq!(outkast.kind, ReferenceType::Group);
        let incoming = namespace
            .edges
            .iter()
            .filter(|e| e.target_entity_id == outkast.id)
            .count();
        assert_eq!(incoming, 2);
    }

    #[test]
    fn test_edges_carry_song_source() {
        let namespace = Namespace::from_batch(&batch());
        let song_id = &namespace.entity("Pink Matter").unwrap().id;
        let edge = namespace
            .edges
            .iter()
            .find(|e| &e.source_entity_id == song_id)
            .unwrap();
        assert_eq!(edge.name, EdgeKind::Reference);
        assert_eq!(edge.info_source, "src-2");
        assert_eq!(edge.description, "André 3000 feature");
    }
}
