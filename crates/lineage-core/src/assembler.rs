//! # Graph Assembler
//!
//! Builds the lineage graph from a `RecordStore`.
//!
//! Categories load in a fixed order (managed locations, wild locations,
//! animals, media, links) so that every reference points at something that
//! is already loaded:
//! - Placement edges are checked as each animal loads
//! - Family and litter edges are resolved once all animals are loaded
//! - Media subjects are checked as each media item loads
//!
//! The first malformed record or dangling reference aborts the compile.

use crate::accumulator::CompileState;
use crate::codec::{Normalizer, Record, is_location_event, split_location_event};
use crate::config::{LayoutConfig, LineageConfig};
use crate::graph::{Graph, Vertex, VertexBase};
use crate::primitives::{PLACEMENT_FIELDS, RECORD_EXTENSION};
use crate::provenance::{EntityKey, Provenance};
use crate::store::RecordStore;
use crate::validator::Validator;
use crate::{Category, Edge, FieldMap, Gender, LineageDate, LineageError, VertexId};
use tracing::{debug, info};

/// The result of a compile: the graph plus the run's accumulated state.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub graph: Graph,
    pub state: CompileState,
}

/// A `children` or `litter` reference waiting for all animals to load.
#[derive(Debug, Clone)]
struct PendingRelation {
    from: VertexId,
    path: String,
    field: &'static str,
    items: Vec<String>,
}

/// Drives the codec over a record store and assembles the graph.
#[derive(Debug, Clone)]
pub struct Assembler {
    config: LineageConfig,
    normalizer: Normalizer,
}

impl Assembler {
    #[must_use]
    pub fn new(config: &LineageConfig) -> Self {
        Self {
            config: config.clone(),
            normalizer: Normalizer::new(&config.validation),
        }
    }

    /// Assemble and then validate. Only a fully valid graph is returned.
    pub fn compile<S: RecordStore>(
        &self,
        store: &S,
        provenance: Option<&Provenance>,
    ) -> Result<Compilation, LineageError> {
        let compilation = self.assemble(store, provenance)?;
        Validator::new(&self.config.validation).validate(&compilation.graph)?;
        Ok(compilation)
    }

    /// Load every category and build the graph, without whole-dataset
    /// validation.
    pub fn assemble<S: RecordStore>(
        &self,
        store: &S,
        provenance: Option<&Provenance>,
    ) -> Result<Compilation, LineageError> {
        let mut graph = Graph::new();
        let mut state = CompileState::new();
        let mut pending: Vec<PendingRelation> = Vec::new();

        for category in Category::LOAD_ORDER {
            let sources = store.records(category)?;
            for source in &sources {
                let record = Record::parse(&source.text, &source.path)?;
                let fields =
                    self.normalizer
                        .normalize(&record, category, &source.path, &mut state)?;
                let id = self.vertex_id(category, &fields, &source.path)?;
                debug!(path = %source.path, id = %id, "record loaded");

                let mut base = VertexBase::new(
                    id.clone(),
                    source.path.as_str(),
                    fields,
                    record.photos,
                );
                self.fill_commit_dates(&mut base, provenance);
                state.count_record(category);
                state.record_photos(&base.photos);

                let vertex = match category {
                    Category::ManagedLocation => Vertex::Location { base, wild: false },
                    Category::WildLocation => Vertex::Location { base, wild: true },
                    Category::Animal => {
                        self.link_placements(&graph, &base)?;
                        check_birth_event(&base)?;
                        pending.extend(pending_relations(&base));
                        animal_vertex(base, &mut state)
                    }
                    Category::Media => {
                        let subjects = media_subjects(&graph, &base)?;
                        Vertex::Media { base, subjects }
                    }
                    Category::Link => Vertex::Link { base },
                };

                if category == Category::Animal {
                    for edge in self.placement_edges(&vertex) {
                        graph.insert_edge(edge);
                    }
                }
                graph.insert_vertex(vertex);
            }

            if category == Category::Animal {
                resolve_relations(&mut graph, &pending)?;
            }
            info!(category = %category, records = sources.len(), "category loaded");
        }

        info!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            photos = state.photo_count,
            "graph assembled"
        );
        Ok(Compilation { graph, state })
    }

    /// Derive the vertex ID and cross-check it against the file name.
    fn vertex_id(
        &self,
        category: Category,
        fields: &FieldMap,
        path: &str,
    ) -> Result<VertexId, LineageError> {
        match category {
            Category::ManagedLocation | Category::Animal => {
                let raw = required_id(fields, path)?;
                let n = raw
                    .parse::<i64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        LineageError::format(path, "_id", raw.as_str(), "expected a positive integer")
                    })?;
                check_file_prefix(path, &n.to_string())?;
                Ok(if category == Category::Animal {
                    VertexId::animal(n)
                } else {
                    VertexId::managed_location(n)
                })
            }
            Category::WildLocation => {
                let raw = required_id(fields, path)?;
                let bare = raw.strip_prefix("wild.").unwrap_or(&raw);
                check_file_prefix(path, bare)?;
                Ok(VertexId::wild(bare))
            }
            Category::Media => Ok(VertexId::Media(format!(
                "media.{}",
                path_id(path, &self.config.layout, category)
            ))),
            Category::Link => Ok(VertexId::Link(format!(
                "link.{}",
                path_id(path, &self.config.layout, category)
            ))),
        }
    }

    /// Fill the record and photo commit dates that the files leave out.
    fn fill_commit_dates(&self, base: &mut VertexBase, provenance: Option<&Provenance>) {
        base.commitdate = base
            .fields
            .text("commitdate")
            .and_then(|d| LineageDate::parse(&d));
        let Some(provenance) = provenance else {
            return;
        };
        if base.commitdate.is_none() {
            base.commitdate = EntityKey::from_path(&base.path, &self.config.layout)
                .and_then(|key| provenance.entity_first_seen.get(&key).copied());
        }
        for (_, slot) in base.photos.iter_mut() {
            if slot.commitdate.is_none() {
                slot.commitdate = provenance
                    .uri_first_seen
                    .get(&slot.uri)
                    .map(LineageDate::to_string);
            }
        }
    }

    /// Check every placement field against the loaded locations.
    fn link_placements(&self, graph: &Graph, base: &VertexBase) -> Result<(), LineageError> {
        for (field, location) in placement_targets(base)? {
            if !graph.contains(&location) {
                return Err(LineageError::reference(
                    base.path.as_str(),
                    field,
                    location.to_string(),
                    "location was never loaded",
                ));
            }
        }

        // Animals live under `<pandas>/<country>/<zoo id>_<name>/`.
        if let (Some(zoo), Some(folder)) = (base.fields.text("zoo"), zoo_folder_id(&base.path)) {
            if VertexId::location_reference(&zoo) != Some(VertexId::managed_location(folder)) {
                return Err(LineageError::reference(
                    base.path.as_str(),
                    "zoo",
                    zoo,
                    format!("does not match containing folder id {}", folder),
                ));
            }
        }
        Ok(())
    }

    fn placement_edges(&self, vertex: &Vertex) -> Vec<Edge> {
        let base = vertex.base();
        placement_targets(base)
            .map(|targets| {
                targets
                    .into_iter()
                    .map(|(field, location)| Edge::placement(base.id.clone(), location, field))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn required_id(fields: &FieldMap, path: &str) -> Result<String, LineageError> {
    fields
        .text("_id")
        .ok_or_else(|| LineageError::format(path, "_id", "", "missing id"))
}

fn file_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(&format!(".{}", RECORD_EXTENSION))
        .unwrap_or(file)
}

/// The ID prefix of a file name (`0012_bao.txt` -> `0012`) must equal `id`.
/// Numeric prefixes compare by value.
fn check_file_prefix(path: &str, id: &str) -> Result<(), LineageError> {
    let prefix = file_stem(path).split('_').next().unwrap_or_default();
    let matches = match (prefix.parse::<i64>(), id.parse::<i64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => prefix == id,
    };
    if matches {
        Ok(())
    } else {
        Err(LineageError::reference(
            path,
            "_id",
            id,
            format!("file name declares id {:?}", prefix),
        ))
    }
}

/// Path below the category directory, without extension.
fn path_id(path: &str, layout: &LayoutConfig, category: Category) -> String {
    let dir = format!("{}/", layout.dir(category));
    let relative = path.strip_prefix(dir.as_str()).unwrap_or(path);
    relative
        .strip_suffix(&format!(".{}", RECORD_EXTENSION))
        .unwrap_or(relative)
        .to_string()
}

/// Numeric prefix of the folder containing an animal record, if the store
/// is partitioned by zoo.
fn zoo_folder_id(path: &str) -> Option<i64> {
    let mut components = path.rsplit('/');
    components.next()?;
    let folder = components.next()?;
    folder.split('_').next()?.parse::<i64>().ok().filter(|n| *n > 0)
}

/// `(field, location)` for every placement field of an animal.
fn placement_targets(base: &VertexBase) -> Result<Vec<(String, VertexId)>, LineageError> {
    let mut targets = Vec::new();
    for field in PLACEMENT_FIELDS {
        let Some(value) = base.fields.text(field) else {
            continue;
        };
        let location = if field == "wild" {
            Some(VertexId::wild(value.trim()))
        } else {
            VertexId::location_reference(&value)
        };
        let location = location.ok_or_else(|| {
            LineageError::reference(
                base.path.as_str(),
                field,
                value.as_str(),
                "not a location id",
            )
        })?;
        targets.push((field.to_string(), location));
    }
    for (field, value) in base.fields.iter() {
        if !is_location_event(field) {
            continue;
        }
        let text = value.as_text();
        let (reference, _) = split_location_event(&text);
        let location = VertexId::location_reference(reference).ok_or_else(|| {
            LineageError::reference(
                base.path.as_str(),
                field.as_str(),
                text.as_str(),
                "not a location id",
            )
        })?;
        targets.push((field.clone(), location));
    }
    Ok(targets)
}

/// The first location event must not precede birth, and when it is at the
/// birthplace it must be the birth itself.
fn check_birth_event(base: &VertexBase) -> Result<(), LineageError> {
    let Some(birthday) = base
        .fields
        .text("birthday")
        .and_then(|d| LineageDate::parse(&d))
    else {
        return Ok(());
    };
    let Some(first) = base.fields.text("location.1") else {
        return Ok(());
    };
    let (reference, Some(date)) = split_location_event(&first) else {
        return Ok(());
    };
    let Some(moved) = LineageDate::parse(date) else {
        return Ok(());
    };

    if moved < birthday {
        return Err(LineageError::DateConsistency {
            subject: base.path.clone(),
            detail: format!("location.1 date {} precedes birthday {}", moved, birthday),
        });
    }
    let at_birthplace = base
        .fields
        .text("birthplace")
        .and_then(|b| VertexId::location_reference(&b))
        .is_some_and(|b| Some(b) == VertexId::location_reference(reference));
    if at_birthplace && moved != birthday {
        return Err(LineageError::DateConsistency {
            subject: base.path.clone(),
            detail: format!(
                "location.1 at the birthplace is dated {} but birthday is {}",
                moved, birthday
            ),
        });
    }
    Ok(())
}

fn pending_relations(base: &VertexBase) -> Vec<PendingRelation> {
    ["children", "litter"]
        .into_iter()
        .filter_map(|field| {
            let items = base.fields.list(field);
            if items.is_empty() {
                None
            } else {
                Some(PendingRelation {
                    from: base.id.clone(),
                    path: base.path.clone(),
                    field,
                    items,
                })
            }
        })
        .collect()
}

fn animal_vertex(base: VertexBase, state: &mut CompileState) -> Vertex {
    let birthday = base
        .fields
        .text("birthday")
        .and_then(|d| LineageDate::parse(&d));
    let death = base.fields.text("death").and_then(|d| LineageDate::parse(&d));
    let gender = base.fields.text("gender").and_then(|g| Gender::from_token(&g));
    if let Some(date) = birthday {
        state.observe_birth(date);
    }
    if let Some(date) = death {
        state.observe_death(date);
    }
    Vertex::Animal {
        base,
        birthday,
        death,
        gender,
    }
}

/// Parse `30` or `30(50%)` into an animal ID and optional confidence.
fn parse_relation_item(
    item: &str,
    path: &str,
    field: &str,
) -> Result<(VertexId, Option<u8>), LineageError> {
    let (id_part, confidence) = match item.split_once('(') {
        Some((id_part, rest)) => {
            let percent = rest
                .trim()
                .trim_end_matches(')')
                .trim()
                .trim_end_matches('%')
                .trim();
            let value = percent
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= 100)
                .ok_or_else(|| {
                    LineageError::format(path, field, item, "confidence must be 0-100%")
                })?;
            (id_part.trim(), Some(value))
        }
        None => (item.trim(), None),
    };
    let id = id_part
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| LineageError::reference(path, field, item, "not an animal id"))?;
    Ok((VertexId::animal(id), confidence))
}

/// Turn `children` / `litter` references into edges, now that every animal
/// is loaded.
fn resolve_relations(graph: &mut Graph, pending: &[PendingRelation]) -> Result<(), LineageError> {
    for relation in pending {
        for item in &relation.items {
            let (target, confidence) =
                parse_relation_item(item, &relation.path, relation.field)?;
            if !graph.contains(&target) {
                return Err(LineageError::reference(
                    relation.path.as_str(),
                    relation.field,
                    item.as_str(),
                    "animal was never loaded",
                ));
            }
            if relation.field == "children" {
                graph.insert_edge(Edge::family(relation.from.clone(), target, confidence));
            } else {
                graph.insert_edge(Edge::litter(relation.from.clone(), target.clone()));
                graph.insert_edge(Edge::litter(target, relation.from.clone()));
            }
        }
    }
    Ok(())
}

/// Resolve `panda.tags` of a media item to loaded animals.
fn media_subjects(graph: &Graph, base: &VertexBase) -> Result<Vec<VertexId>, LineageError> {
    let mut subjects = Vec::new();
    for tag in base.fields.list("panda.tags") {
        let subject = tag
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .map(VertexId::animal)
            .filter(|id| graph.contains(id))
            .ok_or_else(|| {
                LineageError::reference(
                    base.path.as_str(),
                    "panda.tags",
                    tag.as_str(),
                    "animal was never loaded",
                )
            })?;
        subjects.push(subject);
    }
    Ok(subjects)
}

// =============================================================================
// TESTS
// =============================================================================
