//! Folding configuration and the branch-interpretation primitives.
//!
//! Folding merges a subtree of particles into a single hierarchy node. Which
//! subtrees merge is controlled by [`FoldingParameters`]:
//!
//! ```text
//! Mode                    │ Effect
//! ────────────────────────┼────────────────────────────────────────────
//! none (default)          │ one node per particle, tree mirrors input
//! fold_to_tier(t)         │ nodes at tier >= t absorb all descendants
//! fold_to_leading_showers │ an e±/photon branch root absorbs its subtree
//! fold_dynamic            │ trajectory-continuous children merge into
//!                         │ their parent's node
//! ```
//!
//! Modes combine: the shower rule is checked first for shower branch roots,
//! then the tier rule, then dynamic continuity. When tier folding runs with
//! shower folding active, flattening cuts at descendant shower boundaries and
//! those showers become child leaf nodes.
//!
//! The decision procedures here are generic over [`ParticleRelations`] so the
//! same logic drives both the simulated and the reconstructed hierarchy.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::{is_shower, Event, Vector3};

/// Default cosine tolerance for trajectory continuity (about 5 degrees).
pub const DEFAULT_COS_ANGLE_TOLERANCE: f64 = 0.9962;

/// Parameters steering how particle branches fold into hierarchy nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldingParameters {
    /// Whether to fold shower descendants into the leading shower particle.
    pub fold_to_leading_showers: bool,
    /// Whether to fold based on hierarchy tier.
    pub fold_to_tier: bool,
    /// Whether to fold trajectory-continuous children into their parent.
    pub fold_dynamic: bool,
    /// Cosine of the maximum angle at which trajectories count as continuous.
    pub cos_angle_tolerance: f64,
    /// If folding to a tier, the tier whose nodes absorb their descendants.
    pub tier: usize,
}

impl Default for FoldingParameters {
    fn default() -> Self {
        Self {
            fold_to_leading_showers: false,
            fold_to_tier: false,
            fold_dynamic: false,
            cos_angle_tolerance: DEFAULT_COS_ANGLE_TOLERANCE,
            tier: 1,
        }
    }
}

impl FoldingParameters {
    /// No folding: the hierarchy mirrors the input parent/child relation.
    pub fn none() -> Self {
        Self::default()
    }

    /// Fold all descendants into nodes at the given tier (tier 1 folds each
    /// primary's entire branch into a single node).
    pub fn to_tier(tier: usize) -> Result<Self> {
        if tier < 1 {
            return Err(Error::InvalidParameter {
                name: "tier",
                message: "must be at least 1",
            });
        }
        Ok(Self {
            fold_to_tier: true,
            tier,
            ..Self::default()
        })
    }

    /// Fold electromagnetic-shower subtrees into their leading shower particle.
    pub fn to_leading_showers() -> Self {
        Self {
            fold_to_leading_showers: true,
            ..Self::default()
        }
    }

    /// Fold trajectory-continuous children into their parent's node.
    pub fn dynamic(cos_angle_tolerance: f64) -> Result<Self> {
        if !cos_angle_tolerance.is_finite() || !(-1.0..=1.0).contains(&cos_angle_tolerance) {
            return Err(Error::InvalidParameter {
                name: "cos_angle_tolerance",
                message: "must be a finite cosine in [-1, 1]",
            });
        }
        Ok(Self {
            fold_dynamic: true,
            cos_angle_tolerance,
            ..Self::default()
        })
    }

    /// Additionally enable leading-shower folding.
    pub fn with_leading_showers(mut self) -> Self {
        self.fold_to_leading_showers = true;
        self
    }

    /// Additionally enable tier folding at the given tier.
    pub fn with_tier(mut self, tier: usize) -> Result<Self> {
        if tier < 1 {
            return Err(Error::InvalidParameter {
                name: "tier",
                message: "must be at least 1",
            });
        }
        self.fold_to_tier = true;
        self.tier = tier;
        Ok(self)
    }
}

/// Read access to one side's particle type, parent/child relation and
/// trajectory directions.
///
/// Implemented for both the simulation and the reconstruction side of an
/// [`Event`], so the folding decision procedures are written once.
pub trait ParticleRelations {
    /// PDG (or characterisation) code of a particle.
    fn pdg(&self, particle: usize) -> i32;
    /// Direct children of a particle.
    fn children(&self, particle: usize) -> &[usize];
    /// Trajectory direction at the particle's start point.
    fn entry_direction(&self, particle: usize) -> Vector3;
    /// Trajectory direction at the particle's end point.
    fn exit_direction(&self, particle: usize) -> Vector3;
}

/// The simulation-side relation of an [`Event`].
pub struct McRelations<'a>(pub &'a Event);

impl ParticleRelations for McRelations<'_> {
    fn pdg(&self, particle: usize) -> i32 {
        self.0.mc_particle(particle).map(|p| p.pdg).unwrap_or(0)
    }

    fn children(&self, particle: usize) -> &[usize] {
        self.0
            .mc_particle(particle)
            .map(|p| p.children.as_slice())
            .unwrap_or(&[])
    }

    fn entry_direction(&self, particle: usize) -> Vector3 {
        self.0
            .mc_particle(particle)
            .map(|p| p.entry_direction)
            .unwrap_or(Vector3::ZERO)
    }

    fn exit_direction(&self, particle: usize) -> Vector3 {
        self.0
            .mc_particle(particle)
            .map(|p| p.exit_direction)
            .unwrap_or(Vector3::ZERO)
    }
}

/// The reconstruction-side relation of an [`Event`].
pub struct PfoRelations<'a>(pub &'a Event);

impl ParticleRelations for PfoRelations<'_> {
    fn pdg(&self, particle: usize) -> i32 {
        self.0.pfo(particle).map(|p| p.pdg).unwrap_or(0)
    }

    fn children(&self, particle: usize) -> &[usize] {
        self.0
            .pfo(particle)
            .map(|p| p.children.as_slice())
            .unwrap_or(&[])
    }

    fn entry_direction(&self, particle: usize) -> Vector3 {
        self.0.pfo(particle).map(|p| p.entry_direction).unwrap_or(Vector3::ZERO)
    }

    fn exit_direction(&self, particle: usize) -> Vector3 {
        self.0.pfo(particle).map(|p| p.exit_direction).unwrap_or(Vector3::ZERO)
    }
}

/// Collect a branch root and its in-scope descendants for flattening.
///
/// With `cut_at_showers`, descendant shower particles are not flattened:
/// they are returned separately as roots of new child branches. The root
/// itself is never cut, so a shower root still absorbs its own subtree.
///
/// Traversal is breadth-first in child order, so the folded list is
/// deterministic for a given input.
pub(crate) fn collect_subtree<R, F>(
    relations: &R,
    root: usize,
    in_scope: &F,
    cut_at_showers: bool,
) -> (Vec<usize>, Vec<usize>)
where
    R: ParticleRelations,
    F: Fn(usize) -> bool,
{
    let mut folded = vec![root];
    let mut shower_children = Vec::new();
    let mut queue = std::collections::VecDeque::from([root]);
    while let Some(particle) = queue.pop_front() {
        for &child in relations.children(particle) {
            if !in_scope(child) {
                continue;
            }
            if cut_at_showers && is_shower(relations.pdg(child)) {
                shower_children.push(child);
            } else {
                folded.push(child);
                queue.push_back(child);
            }
        }
    }
    (folded, shower_children)
}

/// Walk the chain of trajectory continuations below a branch root.
///
/// Returns the particles that fold into the root's node (the root itself plus
/// each continuation, in chain order) and the particles that start new child
/// branches.
///
/// At each step the best continuation is the in-scope, non-shower child whose
/// entry direction has the largest cosine against the current particle's exit
/// direction, subject to the tolerance; among equal cosines the first child
/// (lowest id) wins. Shower children keep their identity and always become
/// child branches. Children with degenerate directions are never
/// continuations.
pub(crate) fn collect_continuations<R, F>(
    relations: &R,
    root: usize,
    cos_angle_tolerance: f64,
    in_scope: &F,
) -> (Vec<usize>, Vec<usize>)
where
    R: ParticleRelations,
    F: Fn(usize) -> bool,
{
    let mut leading = vec![root];
    let mut child_roots = Vec::new();
    let mut current = root;
    loop {
        let exit = relations.exit_direction(current);
        let mut best: Option<(usize, f64)> = None;
        let mut others = Vec::new();
        for &child in relations.children(current) {
            if !in_scope(child) {
                continue;
            }
            let continuation = if is_shower(relations.pdg(child)) {
                None
            } else {
                relations
                    .entry_direction(child)
                    .cos_angle(&exit)
                    .filter(|&cos| cos >= cos_angle_tolerance)
            };
            match (continuation, best) {
                (Some(cos), None) => best = Some((child, cos)),
                (Some(cos), Some((prev, prev_cos))) if cos > prev_cos => {
                    others.push(prev);
                    best = Some((child, cos));
                }
                (Some(_), Some(_)) | (None, _) => others.push(child),
            }
        }
        child_roots.extend(others);
        match best {
            Some((next, _)) => {
                leading.push(next);
                current = next;
            }
            None => break,
        }
    }
    (leading, child_roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{pdg, Origin};

    fn straight(event: &mut Event, particle: usize) {
        let z = Vector3::new(0.0, 0.0, 1.0);
        event.set_mc_directions(particle, z, z).unwrap();
    }

    #[test]
    fn test_folding_parameter_validation() {
        assert!(FoldingParameters::to_tier(0).is_err());
        assert!(FoldingParameters::to_tier(2).is_ok());
        assert!(FoldingParameters::dynamic(1.5).is_err());
        assert!(FoldingParameters::dynamic(f64::NAN).is_err());
        let params = FoldingParameters::dynamic(0.995).unwrap();
        assert!(params.fold_dynamic);
        assert_eq!(params.cos_angle_tolerance, 0.995);
    }

    #[test]
    fn test_combined_parameters() {
        let params = FoldingParameters::to_tier(1).unwrap().with_leading_showers();
        assert!(params.fold_to_tier && params.fold_to_leading_showers);
        let params = FoldingParameters::to_leading_showers().with_tier(3).unwrap();
        assert!(params.fold_to_tier && params.fold_to_leading_showers);
        assert_eq!(params.tier, 3);
    }

    #[test]
    fn test_subtree_collection_cuts_at_showers() {
        let mut event = Event::new();
        let mu = event.add_mc_particle(pdg::MUON, 1.0, Origin::CosmicRay, None).unwrap();
        let pi = event.add_mc_particle(pdg::PI_PLUS, 0.4, Origin::CosmicRay, Some(mu)).unwrap();
        let gamma = event.add_mc_particle(pdg::PHOTON, 0.2, Origin::CosmicRay, Some(pi)).unwrap();
        let e = event.add_mc_particle(pdg::ELECTRON, 0.1, Origin::CosmicRay, Some(gamma)).unwrap();

        let relations = McRelations(&event);
        let (folded, showers) = collect_subtree(&relations, mu, &|_| true, true);
        assert_eq!(folded, vec![mu, pi]);
        assert_eq!(showers, vec![gamma]);

        // Without the cut the whole branch flattens.
        let (folded, showers) = collect_subtree(&relations, mu, &|_| true, false);
        assert_eq!(folded, vec![mu, pi, gamma, e]);
        assert!(showers.is_empty());

        // A shower root absorbs its own subtree even when cutting.
        let (folded, showers) = collect_subtree(&relations, gamma, &|_| true, true);
        assert_eq!(folded, vec![gamma]);
        assert_eq!(showers, vec![e]);
    }

    #[test]
    fn test_continuation_chain() {
        let mut event = Event::new();
        let a = event.add_mc_particle(pdg::MUON, 1.0, Origin::CosmicRay, None).unwrap();
        let b = event.add_mc_particle(pdg::MUON, 0.8, Origin::CosmicRay, Some(a)).unwrap();
        let c = event.add_mc_particle(pdg::MUON, 0.6, Origin::CosmicRay, Some(b)).unwrap();
        for p in [a, b, c] {
            straight(&mut event, p);
        }
        // A sideways branch off the middle segment.
        let kink = event.add_mc_particle(pdg::PI_PLUS, 0.3, Origin::CosmicRay, Some(b)).unwrap();
        let x = Vector3::new(1.0, 0.0, 0.0);
        event.set_mc_directions(kink, x, x).unwrap();

        let relations = McRelations(&event);
        let (leading, children) =
            collect_continuations(&relations, a, DEFAULT_COS_ANGLE_TOLERANCE, &|_| true);
        assert_eq!(leading, vec![a, b, c]);
        assert_eq!(children, vec![kink]);
    }

    #[test]
    fn test_continuation_tie_break_is_deterministic() {
        // Two children continue the parent trajectory equally well; the
        // lower-id child must win and the other becomes a child branch.
        let mut event = Event::new();
        let parent = event.add_mc_particle(pdg::MUON, 1.0, Origin::CosmicRay, None).unwrap();
        let first = event.add_mc_particle(pdg::MUON, 0.5, Origin::CosmicRay, Some(parent)).unwrap();
        let second = event.add_mc_particle(pdg::MUON, 0.5, Origin::CosmicRay, Some(parent)).unwrap();
        for p in [parent, first, second] {
            straight(&mut event, p);
        }

        let relations = McRelations(&event);
        let (leading, children) =
            collect_continuations(&relations, parent, DEFAULT_COS_ANGLE_TOLERANCE, &|_| true);
        assert_eq!(leading, vec![parent, first]);
        assert_eq!(children, vec![second]);
    }

    #[test]
    fn test_continuation_prefers_smallest_deviation() {
        let mut event = Event::new();
        let parent = event.add_mc_particle(pdg::MUON, 1.0, Origin::CosmicRay, None).unwrap();
        let slightly_off = event.add_mc_particle(pdg::MUON, 0.5, Origin::CosmicRay, Some(parent)).unwrap();
        let dead_on = event.add_mc_particle(pdg::MUON, 0.5, Origin::CosmicRay, Some(parent)).unwrap();
        straight(&mut event, parent);
        let near = Vector3::new(0.02, 0.0, 1.0);
        event.set_mc_directions(slightly_off, near, near).unwrap();
        let z = Vector3::new(0.0, 0.0, 1.0);
        event.set_mc_directions(dead_on, z, z).unwrap();

        let relations = McRelations(&event);
        let (leading, children) =
            collect_continuations(&relations, parent, DEFAULT_COS_ANGLE_TOLERANCE, &|_| true);
        assert_eq!(leading, vec![parent, dead_on]);
        assert_eq!(children, vec![slightly_off]);
    }

    #[test]
    fn test_showers_and_degenerate_directions_never_continue() {
        let mut event = Event::new();
        let parent = event.add_mc_particle(pdg::MUON, 1.0, Origin::CosmicRay, None).unwrap();
        straight(&mut event, parent);
        // A forward shower and a child with unset (zero) directions.
        let gamma = event.add_mc_particle(pdg::PHOTON, 0.5, Origin::CosmicRay, Some(parent)).unwrap();
        let z = Vector3::new(0.0, 0.0, 1.0);
        event.set_mc_directions(gamma, z, z).unwrap();
        let unset = event.add_mc_particle(pdg::PI_PLUS, 0.2, Origin::CosmicRay, Some(parent)).unwrap();

        let relations = McRelations(&event);
        let (leading, children) =
            collect_continuations(&relations, parent, DEFAULT_COS_ANGLE_TOLERANCE, &|_| true);
        assert_eq!(leading, vec![parent]);
        assert_eq!(children, vec![gamma, unset]);
    }
}
