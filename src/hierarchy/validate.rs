//! Hierarchy validation and health checking.
//!
//! Verifies the structural invariants a filled hierarchy must satisfy:
//! - every child id points at an existing node;
//! - every non-root node has exactly one parent and is reachable from a root;
//! - tiers increase by one along parent/child edges and roots sit at tier 1;
//! - the leading particle of a node is one of its folded particles;
//! - the hit partition holds: no hit id appears in two nodes of one
//!   hierarchy.
//!
//! Violations indicate a broken attribution oracle or a construction bug,
//! never a degenerate-but-valid input, so the checks live outside the build
//! path and are cheap enough to run in tests and debugging sessions.

use std::collections::HashMap;
use std::fmt;

use super::mc::McHierarchy;
use super::reco::RecoHierarchy;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, not a problem.
    Info,
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A broken invariant.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single issue found during validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Node id involved, if any.
    pub node_id: Option<usize>,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            node_id: None,
        }
    }

    /// Attach a node id.
    pub fn with_node(mut self, id: usize) -> Self {
        self.node_id = Some(id);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(id) = self.node_id {
            write!(f, " (node {id})")?;
        }
        Ok(())
    }
}

/// Report from a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Whether no issue at `Severity::Error` was found.
    pub fn is_healthy(&self) -> bool {
        self.issues.iter().all(|i| i.severity < Severity::Error)
    }

    /// Issues at a given severity.
    pub fn at_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }
}

/// Lightweight per-node shape shared by both hierarchy sides.
struct NodeShape<'h> {
    children: &'h [usize],
    hits: &'h [usize],
    tier: Option<usize>,
}

fn check_structure(roots: &[usize], shapes: &[NodeShape<'_>], report: &mut ValidationReport) {
    let n = shapes.len();
    let mut parent_count = vec![0usize; n];

    for (id, shape) in shapes.iter().enumerate() {
        for &child in shape.children {
            if child >= n {
                report.add(
                    ValidationIssue::new(
                        Severity::Error,
                        format!("child id {child} out of range ({n} nodes)"),
                    )
                    .with_node(id),
                );
            } else {
                parent_count[child] += 1;
            }
        }
    }

    for &root in roots {
        if root >= n {
            report.add(ValidationIssue::new(
                Severity::Error,
                format!("root id {root} out of range ({n} nodes)"),
            ));
            continue;
        }
        if parent_count[root] > 0 {
            report.add(
                ValidationIssue::new(Severity::Error, "root node also appears as a child")
                    .with_node(root),
            );
        }
        if let Some(tier) = shapes[root].tier {
            if tier != 1 {
                report.add(
                    ValidationIssue::new(Severity::Error, format!("root node has tier {tier}"))
                        .with_node(root),
                );
            }
        }
    }

    for (id, &count) in parent_count.iter().enumerate() {
        if count > 1 {
            report.add(
                ValidationIssue::new(Severity::Error, format!("node has {count} parents"))
                    .with_node(id),
            );
        }
        if count == 0 && !roots.contains(&id) {
            report.add(
                ValidationIssue::new(Severity::Error, "node unreachable from any root")
                    .with_node(id),
            );
        }
    }

    // Tier steps along edges.
    for shape in shapes {
        let Some(tier) = shape.tier else { continue };
        for &child in shape.children {
            if let Some(child_tier) = shapes.get(child).and_then(|s| s.tier) {
                if child_tier != tier + 1 {
                    report.add(
                        ValidationIssue::new(
                            Severity::Error,
                            format!("child tier {child_tier} does not follow parent tier {tier}"),
                        )
                        .with_node(child),
                    );
                }
            }
        }
    }

    // Hit partition: every hit in at most one node.
    let mut hit_owner: HashMap<usize, usize> = HashMap::new();
    for (id, shape) in shapes.iter().enumerate() {
        if shape.hits.is_empty() {
            report.add(ValidationIssue::new(Severity::Info, "node has no hits").with_node(id));
        }
        for &hit in shape.hits {
            match hit_owner.get(&hit) {
                Some(&owner) if owner != id => {
                    report.add(
                        ValidationIssue::new(
                            Severity::Error,
                            format!("hit {hit} already attributed to node {owner}"),
                        )
                        .with_node(id),
                    );
                }
                Some(_) => {}
                None => {
                    hit_owner.insert(hit, id);
                }
            }
        }
    }
}

/// Validate a filled truth hierarchy.
pub fn validate_mc_hierarchy(hierarchy: &McHierarchy<'_>) -> ValidationReport {
    let mut report = ValidationReport::new();
    let shapes: Vec<NodeShape<'_>> = hierarchy
        .nodes()
        .map(|n| NodeShape {
            children: n.children(),
            hits: n.hits(),
            tier: Some(n.tier()),
        })
        .collect();
    check_structure(hierarchy.roots(), &shapes, &mut report);

    for node in hierarchy.nodes() {
        if !node.particles().contains(&node.leading_particle()) {
            report.add(
                ValidationIssue::new(Severity::Error, "leading particle not folded into node")
                    .with_node(node.id()),
            );
        }
    }
    report
}

/// Validate a filled reconstructed hierarchy.
pub fn validate_reco_hierarchy(hierarchy: &RecoHierarchy<'_>) -> ValidationReport {
    let mut report = ValidationReport::new();
    let shapes: Vec<NodeShape<'_>> = hierarchy
        .nodes()
        .map(|n| NodeShape {
            children: n.children(),
            hits: n.hits(),
            tier: None,
        })
        .collect();
    check_structure(hierarchy.roots(), &shapes, &mut report);

    for node in hierarchy.nodes() {
        if node.pfos().is_empty() {
            report.add(
                ValidationIssue::new(Severity::Error, "node folds no pfos").with_node(node.id()),
            );
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{pdg, Event, Origin, View};
    use crate::fold::FoldingParameters;

    #[test]
    fn test_filled_hierarchy_is_healthy() {
        let mut event = Event::new();
        let nu = event.add_mc_particle(pdg::NU_MU, 2.0, Origin::BeamNeutrino, None).unwrap();
        let mu = event.add_mc_particle(pdg::MUON, 1.0, Origin::BeamNeutrino, Some(nu)).unwrap();
        let pi = event.add_mc_particle(pdg::PI_PLUS, 0.4, Origin::BeamNeutrino, Some(mu)).unwrap();
        let mut hits = Vec::new();
        for i in 0..6 {
            hits.push(event.add_hit(View::ALL[i % 3], 1.0));
        }
        event.attach_mc_hits(mu, &hits[..4]).unwrap();
        event.attach_mc_hits(pi, &hits[4..]).unwrap();

        let mut hierarchy = McHierarchy::new(&event);
        hierarchy.fill(&[nu, mu, pi], &hits, &FoldingParameters::none());

        let report = validate_mc_hierarchy(&hierarchy);
        assert!(report.is_healthy(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.at_severity(Severity::Error).count(), 0);
    }

    #[test]
    fn test_empty_hierarchy_is_healthy() {
        let event = Event::new();
        let mut hierarchy = McHierarchy::new(&event);
        hierarchy.fill(&[], &[], &FoldingParameters::none());
        assert!(validate_mc_hierarchy(&hierarchy).is_healthy());
    }

    #[test]
    fn test_double_attribution_is_reported() {
        // The same hit attached to two sibling particles breaks the
        // partition invariant; construction does not police the oracle, the
        // validator does.
        let mut event = Event::new();
        let a = event.add_mc_particle(pdg::MUON, 1.0, Origin::CosmicRay, None).unwrap();
        let b = event.add_mc_particle(pdg::PROTON, 0.5, Origin::CosmicRay, None).unwrap();
        let h = event.add_hit(View::U, 1.0);
        event.attach_mc_hits(a, &[h]).unwrap();
        event.attach_mc_hits(b, &[h]).unwrap();

        let mut hierarchy = McHierarchy::new(&event);
        hierarchy.fill(&[a, b], &[h], &FoldingParameters::none());

        let report = validate_mc_hierarchy(&hierarchy);
        assert!(!report.is_healthy());
        assert!(report
            .at_severity(Severity::Error)
            .any(|i| i.message.contains("already attributed")));
    }

    #[test]
    fn test_reco_validation() {
        let mut event = Event::new();
        let track = event.add_pfo(pdg::MUON, None).unwrap();
        let h = event.add_hit(View::W, 2.0);
        event.attach_pfo_hits(track, &[h]).unwrap();

        let mut hierarchy = RecoHierarchy::new(&event);
        hierarchy.fill(&[track], &[h], &FoldingParameters::none());
        assert!(validate_reco_hierarchy(&hierarchy).is_healthy());
    }
}
