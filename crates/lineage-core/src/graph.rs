//! # Lineage Graph
//!
//! The compiled vertex/edge graph.
//!
//! All data structures use `BTreeMap` / `BTreeSet` for deterministic
//! ordering. No `HashMap` allowed.
//!
//! The graph is rebuilt from records on every compile and is never mutated
//! after validation. Duplicate IDs do not abort insertion: the first vertex
//! is kept and every colliding record is remembered in the registry, so the
//! validator can name all of them.

use crate::photo::PhotoSlots;
use crate::{Category, Edge, EdgeLabel, FieldMap, Gender, LineageDate, VertexId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// VERTICES
// =============================================================================

/// Data shared by every vertex kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VertexBase {
    pub id: VertexId,
    /// Repository-relative source path.
    pub path: String,
    pub fields: FieldMap,
    pub photos: PhotoSlots,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitdate: Option<LineageDate>,
}

impl VertexBase {
    #[must_use]
    pub fn new(id: VertexId, path: impl Into<String>, fields: FieldMap, photos: PhotoSlots) -> Self {
        Self {
            id,
            path: path.into(),
            fields,
            photos,
            commitdate: None,
        }
    }
}

/// A graph vertex. Serialized with an explicit `kind` discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Vertex {
    Animal {
        #[serde(flatten)]
        base: VertexBase,
        #[serde(skip_serializing_if = "Option::is_none")]
        birthday: Option<LineageDate>,
        #[serde(skip_serializing_if = "Option::is_none")]
        death: Option<LineageDate>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gender: Option<Gender>,
    },
    Location {
        #[serde(flatten)]
        base: VertexBase,
        wild: bool,
    },
    Media {
        #[serde(flatten)]
        base: VertexBase,
        /// Animals tagged in the item.
        subjects: Vec<VertexId>,
    },
    Link {
        #[serde(flatten)]
        base: VertexBase,
    },
}

impl Vertex {
    #[must_use]
    pub fn base(&self) -> &VertexBase {
        match self {
            Vertex::Animal { base, .. }
            | Vertex::Location { base, .. }
            | Vertex::Media { base, .. }
            | Vertex::Link { base } => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut VertexBase {
        match self {
            Vertex::Animal { base, .. }
            | Vertex::Location { base, .. }
            | Vertex::Media { base, .. }
            | Vertex::Link { base } => base,
        }
    }

    #[must_use]
    pub fn id(&self) -> &VertexId {
        &self.base().id
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Vertex::Animal { .. } => Category::Animal,
            Vertex::Location { wild: true, .. } => Category::WildLocation,
            Vertex::Location { wild: false, .. } => Category::ManagedLocation,
            Vertex::Media { .. } => Category::Media,
            Vertex::Link { .. } => Category::Link,
        }
    }

    /// Human-readable name: `en.name`, then `name`, then any `*.name`,
    /// falling back to the ID.
    #[must_use]
    pub fn display_name(&self) -> String {
        let fields = &self.base().fields;
        fields
            .text("en.name")
            .or_else(|| fields.text("name"))
            .or_else(|| {
                fields
                    .iter()
                    .find(|(key, _)| key.ends_with(".name"))
                    .map(|(_, value)| value.as_text())
            })
            .unwrap_or_else(|| self.id().to_string())
    }

    #[must_use]
    pub fn birthday(&self) -> Option<LineageDate> {
        match self {
            Vertex::Animal { birthday, .. } => *birthday,
            _ => None,
        }
    }

    #[must_use]
    pub fn death(&self) -> Option<LineageDate> {
        match self {
            Vertex::Animal { death, .. } => *death,
            _ => None,
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// One record that claimed an ID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Claim {
    pub name: String,
    pub path: String,
}

// =============================================================================
// GRAPH
// =============================================================================

/// The compiled graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Vertex storage, one per ID (first claim wins).
    vertices: BTreeMap<VertexId, Vertex>,

    /// Edge set.
    edges: BTreeSet<Edge>,

    /// Every record that claimed each (category, id), in load order.
    registry: BTreeMap<(Category, String), Vec<Claim>>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vertex and register its claim on its ID.
    ///
    /// Returns false when the ID was already taken; the existing vertex is
    /// kept and the collision is recorded.
    pub fn insert_vertex(&mut self, vertex: Vertex) -> bool {
        let claim = Claim {
            name: vertex.display_name(),
            path: vertex.base().path.clone(),
        };
        self.registry
            .entry((vertex.category(), vertex.id().to_string()))
            .or_default()
            .push(claim);

        if self.vertices.contains_key(vertex.id()) {
            return false;
        }
        self.vertices.insert(vertex.id().clone(), vertex);
        true
    }

    /// Insert an edge. Returns false if it was already present.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    #[must_use]
    pub fn vertex(&self, id: &VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn vertex_mut(&mut self, id: &VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    /// All vertices in ID order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn vertices_mut(&mut self) -> impl Iterator<Item = &mut Vertex> {
        self.vertices.values_mut()
    }

    /// All edges in deterministic order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Edges carrying `label`.
    pub fn edges_labeled(&self, label: EdgeLabel) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.label == label)
    }

    /// Family edges pointing at `child`.
    pub fn parents<'a>(&'a self, child: &'a VertexId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges_labeled(EdgeLabel::Family)
            .filter(move |edge| &edge.into == child)
    }

    /// Family edges leaving `parent`.
    pub fn children<'a>(&'a self, parent: &'a VertexId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges_labeled(EdgeLabel::Family)
            .filter(move |edge| &edge.out == parent)
    }

    /// Litter mates of `animal`.
    pub fn litter_mates<'a>(
        &'a self,
        animal: &'a VertexId,
    ) -> impl Iterator<Item = &'a VertexId> + 'a {
        self.edges_labeled(EdgeLabel::Litter)
            .filter(move |edge| &edge.out == animal)
            .map(|edge| &edge.into)
    }

    /// Placement edges of `animal`.
    pub fn placements<'a>(
        &'a self,
        animal: &'a VertexId,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges_labeled(EdgeLabel::Placement)
            .filter(move |edge| &edge.out == animal)
    }

    /// IDs claimed by more than one record, with every claim.
    pub fn duplicates(&self) -> impl Iterator<Item = (&(Category, String), &Vec<Claim>)> {
        self.registry.iter().filter(|(_, claims)| claims.len() > 1)
    }

    /// Number of vertices per category.
    #[must_use]
    pub fn count_by_category(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for vertex in self.vertices.values() {
            *counts.entry(vertex.category()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldValue;

    fn animal(id: i64, name: &str) -> Vertex {
        let mut fields = FieldMap::new();
        fields.insert("en.name", FieldValue::Text(name.to_string()));
        Vertex::Animal {
            base: VertexBase::new(
                VertexId::animal(id),
                format!("pandas/{}.txt", id),
                fields,
                PhotoSlots::new(),
            ),
            birthday: None,
            death: None,
            gender: None,
        }
    }

    fn zoo(id: i64) -> Vertex {
        Vertex::Location {
            base: VertexBase::new(
                VertexId::managed_location(id),
                format!("zoos/{}.txt", id),
                FieldMap::new(),
                PhotoSlots::new(),
            ),
            wild: false,
        }
    }

    #[test]
    fn insert_and_lookup_vertex() {
        let mut graph = Graph::new();
        assert!(graph.insert_vertex(animal(1, "A")));
        assert!(graph.contains(&VertexId::animal(1)));
        assert_eq!(
            graph.vertex(&VertexId::animal(1)).map(Vertex::display_name),
            Some("A".to_string())
        );
    }

    #[test]
    fn animal_and_location_ids_do_not_collide() {
        let mut graph = Graph::new();
        assert!(graph.insert_vertex(animal(7, "A")));
        assert!(graph.insert_vertex(zoo(7)));
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.duplicates().count(), 0);
    }

    #[test]
    fn duplicate_keeps_first_and_records_both() {
        let mut graph = Graph::new();
        assert!(graph.insert_vertex(animal(5, "First")));
        assert!(!graph.insert_vertex(animal(5, "Second")));
        assert_eq!(
            graph.vertex(&VertexId::animal(5)).map(Vertex::display_name),
            Some("First".to_string())
        );
        let duplicates: Vec<_> = graph.duplicates().collect();
        assert_eq!(duplicates.len(), 1);
        let names: Vec<_> = duplicates[0].1.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn relationship_queries() {
        let mut graph = Graph::new();
        for (id, name) in [(1, "Mom"), (2, "Kid"), (3, "Sib")] {
            graph.insert_vertex(animal(id, name));
        }
        graph.insert_vertex(zoo(9));
        let (mom, kid, sib) = (VertexId::animal(1), VertexId::animal(2), VertexId::animal(3));
        graph.insert_edge(Edge::family(mom.clone(), kid.clone(), None));
        graph.insert_edge(Edge::litter(kid.clone(), sib.clone()));
        graph.insert_edge(Edge::litter(sib.clone(), kid.clone()));
        graph.insert_edge(Edge::placement(kid.clone(), VertexId::managed_location(9), "zoo"));

        assert_eq!(graph.parents(&kid).count(), 1);
        assert_eq!(graph.children(&mom).count(), 1);
        assert_eq!(graph.litter_mates(&kid).collect::<Vec<_>>(), vec![&sib]);
        assert_eq!(graph.placements(&kid).count(), 1);
        assert!(!graph.insert_edge(Edge::family(mom, kid, None)));
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn vertex_serializes_with_kind() {
        let json = serde_json::to_value(zoo(3)).expect("json");
        assert_eq!(json["kind"], "location");
        assert_eq!(json["id"], "-3");
        assert_eq!(json["wild"], false);
    }

    #[test]
    fn category_counts() {
        let mut graph = Graph::new();
        graph.insert_vertex(animal(1, "A"));
        graph.insert_vertex(animal(2, "B"));
        graph.insert_vertex(zoo(1));
        let counts = graph.count_by_category();
        assert_eq!(counts.get(&Category::Animal), Some(&2));
        assert_eq!(counts.get(&Category::ManagedLocation), Some(&1));
    }
}
