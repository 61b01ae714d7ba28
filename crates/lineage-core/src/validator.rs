//! # Consistency Validator
//!
//! Whole-dataset checks that run after every category has loaded.
//!
//! Each check collects every violation it finds; the validator then fails
//! with all of them at once, so one run surfaces every problem.
//!
//! Checks:
//! - Duplicate IDs within a category
//! - Litter mates born within the tolerance window
//! - No animal dies before it is born
//! - Parents born before their children, children not born after a
//!   parent's death
//! - The family subgraph is a forest of at most two parents per animal with
//!   no cycles

use crate::config::ValidationConfig;
use crate::graph::Graph;
use crate::primitives::MAX_PARENTS;
use crate::{EdgeLabel, LineageError, ValidationFailure, VertexId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Runs the whole-dataset checks.
#[derive(Debug, Clone)]
pub struct Validator {
    litter_tolerance_days: i64,
}

/// DFS visit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl Validator {
    #[must_use]
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            litter_tolerance_days: config.litter_tolerance_days,
        }
    }

    /// Run every check.
    ///
    /// # Errors
    /// `LineageError::Validation` holding one error per violation.
    pub fn validate(&self, graph: &Graph) -> Result<(), LineageError> {
        let mut errors = Vec::new();
        errors.extend(Self::check_duplicate_ids(graph));
        errors.extend(self.check_litter_dates(graph));
        errors.extend(Self::check_life_span(graph));
        errors.extend(Self::check_ancestry_chronology(graph));
        errors.extend(Self::check_tree_shape(graph));

        if errors.is_empty() {
            info!(vertices = graph.vertex_count(), "validation passed");
            return Ok(());
        }
        for error in &errors {
            warn!(%error, "validation violation");
        }
        Err(LineageError::Validation(ValidationFailure { errors }))
    }

    /// Every ID claimed by more than one record of the same category.
    pub fn check_duplicate_ids(graph: &Graph) -> Vec<LineageError> {
        graph
            .duplicates()
            .map(|((category, id), claims)| LineageError::DuplicateId {
                category: *category,
                id: id.clone(),
                names: claims.iter().map(|c| c.name.clone()).collect(),
            })
            .collect()
    }

    /// Litter mates must be born within the tolerance, or both have no
    /// known birthday. Each unordered pair is checked once.
    pub fn check_litter_dates(&self, graph: &Graph) -> Vec<LineageError> {
        let mut errors = Vec::new();
        for edge in graph.edges_labeled(EdgeLabel::Litter) {
            if edge.out >= edge.into {
                continue;
            }
            let a = graph.vertex(&edge.out).and_then(|v| v.birthday());
            let b = graph.vertex(&edge.into).and_then(|v| v.birthday());
            let detail = match (a, b) {
                (None, None) => continue,
                (Some(a), Some(b)) => {
                    let apart = a.days_apart(&b);
                    if apart <= self.litter_tolerance_days {
                        continue;
                    }
                    format!(
                        "litter mate {} born {} days apart ({} vs {}), tolerance is {}",
                        edge.into, apart, a, b, self.litter_tolerance_days
                    )
                }
                _ => format!("litter mate {} has a birthday only on one side", edge.into),
            };
            errors.push(LineageError::DateConsistency {
                subject: edge.out.to_string(),
                detail,
            });
        }
        errors
    }

    /// An animal's death date is not before its own birthday.
    pub fn check_life_span(graph: &Graph) -> Vec<LineageError> {
        graph
            .vertices()
            .filter_map(|vertex| {
                let (born, died) = (vertex.birthday()?, vertex.death()?);
                (died < born).then(|| LineageError::DateConsistency {
                    subject: vertex.id().to_string(),
                    detail: format!("died {} before being born {}", died, born),
                })
            })
            .collect()
    }

    /// Parents are born before their children; a child is not born after
    /// a parent's death.
    pub fn check_ancestry_chronology(graph: &Graph) -> Vec<LineageError> {
        let mut errors = Vec::new();
        for edge in graph.edges_labeled(EdgeLabel::Family) {
            let (Some(parent), Some(child)) = (graph.vertex(&edge.out), graph.vertex(&edge.into))
            else {
                continue;
            };
            let Some(born) = child.birthday() else {
                continue;
            };
            if let Some(parent_born) = parent.birthday() {
                if parent_born >= born {
                    errors.push(LineageError::DateConsistency {
                        subject: edge.into.to_string(),
                        detail: format!(
                            "born {} but parent {} was born {}",
                            born, edge.out, parent_born
                        ),
                    });
                }
            }
            if let Some(parent_died) = parent.death() {
                if born > parent_died {
                    errors.push(LineageError::DateConsistency {
                        subject: edge.into.to_string(),
                        detail: format!(
                            "born {} after parent {} died {}",
                            born, edge.out, parent_died
                        ),
                    });
                }
            }
        }
        errors
    }

    /// No animal has more than two parents and no animal is its own
    /// ancestor.
    pub fn check_tree_shape(graph: &Graph) -> Vec<LineageError> {
        let mut errors = Vec::new();
        let mut children: BTreeMap<&VertexId, Vec<&VertexId>> = BTreeMap::new();
        let mut parents: BTreeMap<&VertexId, BTreeSet<&VertexId>> = BTreeMap::new();
        for edge in graph.edges_labeled(EdgeLabel::Family) {
            children.entry(&edge.out).or_default().push(&edge.into);
            parents.entry(&edge.into).or_default().insert(&edge.out);
        }

        for (child, set) in &parents {
            if set.len() > MAX_PARENTS {
                let names: Vec<String> = set.iter().map(|p| p.to_string()).collect();
                errors.push(LineageError::Lineage {
                    subject: child.to_string(),
                    detail: format!(
                        "has {} parents ({}), at most {} allowed",
                        set.len(),
                        names.join(", "),
                        MAX_PARENTS
                    ),
                });
            }
        }

        // Iterative three-colour DFS over family edges.
        let mut marks: BTreeMap<&VertexId, Mark> = BTreeMap::new();
        for &root in children.keys() {
            if marks.contains_key(root) {
                continue;
            }
            let mut stack: Vec<(&VertexId, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::InProgress);
            while let Some((node, next)) = stack.pop() {
                let successors = children.get(node).map(Vec::as_slice).unwrap_or_default();
                let Some(&successor) = successors.get(next) else {
                    marks.insert(node, Mark::Done);
                    continue;
                };
                stack.push((node, next + 1));
                match marks.get(successor) {
                    Some(Mark::InProgress) => errors.push(LineageError::Lineage {
                        subject: successor.to_string(),
                        detail: format!("is its own ancestor (via {})", node),
                    }),
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(successor, Mark::InProgress);
                        stack.push((successor, 0));
                    }
                }
            }
        }
        errors
    }
}

// =============================================================================
// TESTS
// =============================================================================
