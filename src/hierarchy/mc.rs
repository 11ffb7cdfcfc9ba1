//! Simulated (truth) particle hierarchy.
//!
//! [`McHierarchy`] owns an arena of [`McNode`] records built from a flat MC
//! particle selection under a folding rule. Roots are the folded primaries: a
//! neutrino's direct children if a parentless neutrino is present, otherwise
//! every parentless (or neutrino-parented) particle in the selection.
//!
//! Construction tolerates the degenerate inputs upstream selection produces:
//! particles whose parent lies outside the selection are orphans and are
//! silently dropped (with a debug diagnostic), neutron branches are removed
//! entirely when the criteria say so, and empty inputs yield an empty but
//! valid hierarchy.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::event::{is_charged_lepton, is_neutrino, is_neutron, is_shower, Event, Origin, View};
use crate::fold::{collect_continuations, collect_subtree, FoldingParameters, McRelations, ParticleRelations};

/// Criteria deciding whether an MC node is worth matching against at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructabilityCriteria {
    /// Minimum total number of hits.
    pub min_hits: usize,
    /// Minimum number of hits for a view to count as good.
    pub min_hits_for_good_view: usize,
    /// Minimum number of good views.
    pub min_good_views: usize,
    /// Whether neutron branches are removed from construction entirely.
    pub remove_neutrons: bool,
}

impl Default for ReconstructabilityCriteria {
    fn default() -> Self {
        Self {
            min_hits: 30,
            min_hits_for_good_view: 10,
            min_good_views: 2,
            remove_neutrons: true,
        }
    }
}

/// One folded node of the truth hierarchy.
#[derive(Debug, Clone)]
pub struct McNode {
    id: usize,
    particles: Vec<usize>,
    hits: Vec<usize>,
    children: Vec<usize>,
    leading: usize,
    pdg: i32,
    tier: usize,
    is_leading_lepton: bool,
}

impl McNode {
    /// Unique id of this node within its hierarchy.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The MC particles folded into this node; the first is the leading one.
    pub fn particles(&self) -> &[usize] {
        &self.particles
    }

    /// Hit ids attributed to this node's particles.
    pub fn hits(&self) -> &[usize] {
        &self.hits
    }

    /// Child node ids.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// The leading MC particle of this node.
    pub fn leading_particle(&self) -> usize {
        self.leading
    }

    /// PDG code of the leading particle.
    pub fn particle_id(&self) -> i32 {
        self.pdg
    }

    /// Hierarchy tier, roots are tier 1.
    pub fn tier(&self) -> usize {
        self.tier
    }

    /// Whether this node was tagged as the event's leading lepton.
    pub fn is_leading_lepton(&self) -> bool {
        self.is_leading_lepton
    }
}

/// The folded truth hierarchy of one event.
#[derive(Debug)]
pub struct McHierarchy<'a> {
    event: &'a Event,
    criteria: ReconstructabilityCriteria,
    nodes: Vec<McNode>,
    roots: Vec<usize>,
    neutrino: Option<usize>,
}

impl<'a> McHierarchy<'a> {
    /// Create an empty hierarchy over an event with default criteria.
    pub fn new(event: &'a Event) -> Self {
        Self::with_criteria(event, ReconstructabilityCriteria::default())
    }

    /// Create an empty hierarchy with explicit reconstructability criteria.
    pub fn with_criteria(event: &'a Event, criteria: ReconstructabilityCriteria) -> Self {
        Self {
            event,
            criteria,
            nodes: Vec::new(),
            roots: Vec::new(),
            neutrino: None,
        }
    }

    /// Build the folded hierarchy from a particle selection and a hit pool.
    ///
    /// Node hit sets are the attributed hits of the folded particles,
    /// restricted to `hits`; hits attributed to unselected particles are
    /// dropped. Calling `fill` again clears the hierarchy and rebuilds it.
    pub fn fill(&mut self, particles: &[usize], hits: &[usize], params: &FoldingParameters) {
        self.nodes.clear();
        self.roots.clear();
        self.neutrino = None;

        let event = self.event;
        let mut selected = HashSet::new();
        let mut ordered = Vec::new();
        for &particle in particles {
            if event.mc_particle(particle).is_none() {
                warn!("skipping unknown mc particle index {particle}");
                continue;
            }
            if selected.insert(particle) {
                ordered.push(particle);
            }
        }
        let hit_pool: HashSet<usize> =
            hits.iter().copied().filter(|&h| event.hit(h).is_some()).collect();

        let mut primaries = Vec::new();
        for &particle in &ordered {
            let Some(record) = event.mc_particle(particle) else {
                continue;
            };
            if is_neutrino(record.pdg) {
                if record.parent.is_none() && self.neutrino.is_none() {
                    self.neutrino = Some(particle);
                }
                continue;
            }
            match record.parent {
                None => primaries.push(particle),
                Some(parent) => {
                    let parent_is_neutrino = event
                        .mc_particle(parent)
                        .map(|p| is_neutrino(p.pdg))
                        .unwrap_or(false);
                    if parent_is_neutrino {
                        primaries.push(particle);
                    } else if !selected.contains(&parent) {
                        debug!("excluding orphan mc particle {particle}");
                    }
                }
            }
        }

        let remove_neutrons = self.criteria.remove_neutrons;
        let in_scope = move |q: usize| {
            selected.contains(&q)
                && !(remove_neutrons
                    && event.mc_particle(q).map(|p| is_neutron(p.pdg)).unwrap_or(false))
        };

        for &primary in &primaries {
            if !in_scope(primary) {
                debug!("excluding neutron branch rooted at mc particle {primary}");
                continue;
            }
            let root = self.build_node(primary, 1, params, &in_scope, &hit_pool);
            self.roots.push(root);
        }

        self.tag_leading_lepton();
    }

    /// Recursively build the node for a branch root, per the folding rules.
    fn build_node<F>(
        &mut self,
        root: usize,
        tier: usize,
        params: &FoldingParameters,
        in_scope: &F,
        hit_pool: &HashSet<usize>,
    ) -> usize
    where
        F: Fn(usize) -> bool,
    {
        let event = self.event;
        let relations = McRelations(event);

        // Rule order: shower, tier, dynamic, per-child default. A continuation
        // chain folds until a branching point; each spawned child branch
        // re-enters here, so the shower/tier rules gate it before continuity
        // folding resumes.
        let (folded, child_roots) = if params.fold_to_leading_showers && is_shower(relations.pdg(root)) {
            let (folded, _) = collect_subtree(&relations, root, in_scope, false);
            (folded, Vec::new())
        } else if params.fold_to_tier && tier >= params.tier {
            collect_subtree(&relations, root, in_scope, params.fold_to_leading_showers)
        } else if params.fold_dynamic {
            collect_continuations(&relations, root, params.cos_angle_tolerance, in_scope)
        } else {
            let children = relations.children(root).iter().copied().filter(|&c| in_scope(c)).collect();
            (vec![root], children)
        };

        let mut node_hits = Vec::new();
        for &particle in &folded {
            node_hits.extend(event.hits_of_mc(particle).iter().copied().filter(|h| hit_pool.contains(h)));
        }

        let leading = folded[0];
        let id = self.nodes.len();
        self.nodes.push(McNode {
            id,
            particles: folded,
            hits: node_hits,
            children: Vec::new(),
            leading,
            pdg: relations.pdg(leading),
            tier,
            is_leading_lepton: false,
        });

        for child in child_roots {
            let child_id = self.build_node(child, tier + 1, params, in_scope, hit_pool);
            self.nodes[id].children.push(child_id);
        }
        id
    }

    /// Derivation pass run once after the tree is complete: tag the
    /// highest-energy charged-lepton root of a neutrino hierarchy. Energy
    /// ties keep the lowest node id.
    fn tag_leading_lepton(&mut self) {
        if self.neutrino.is_none() {
            return;
        }
        let mut best: Option<(usize, f64)> = None;
        for &root in &self.roots {
            let node = &self.nodes[root];
            if !is_charged_lepton(node.pdg) {
                continue;
            }
            let energy = self
                .event
                .mc_particle(node.leading)
                .map(|p| p.energy)
                .unwrap_or(0.0);
            if best.map(|(_, e)| energy > e).unwrap_or(true) {
                best = Some((root, energy));
            }
        }
        if let Some((root, _)) = best {
            self.nodes[root].is_leading_lepton = true;
        }
    }

    /// The event this hierarchy was built over.
    pub fn event(&self) -> &Event {
        self.event
    }

    /// The reconstructability criteria in force.
    pub fn criteria(&self) -> &ReconstructabilityCriteria {
        &self.criteria
    }

    /// The recorded parent neutrino, if this is a neutrino hierarchy.
    pub fn neutrino(&self) -> Option<usize> {
        self.neutrino
    }

    /// Whether a parent neutrino was recorded.
    pub fn is_neutrino_hierarchy(&self) -> bool {
        self.neutrino.is_some()
    }

    /// Whether this is a test-beam (or cosmic-only) hierarchy.
    ///
    /// By convention this is simply the absence of a recorded neutrino, so a
    /// pure cosmic-ray hierarchy also answers true; per-node provenance is
    /// available through [`McHierarchy::is_cosmic_ray`] and
    /// [`McHierarchy::is_test_beam_particle`].
    pub fn is_test_beam_hierarchy(&self) -> bool {
        self.neutrino.is_none()
    }

    /// Root node ids.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Get a node by id.
    pub fn node(&self, id: usize) -> Option<&McNode> {
        self.nodes.get(id)
    }

    /// Iterate over all nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &McNode> {
        self.nodes.iter()
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the hierarchy has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in breadth-first order from the roots.
    pub fn flattened(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<usize> = self.roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(self.nodes[id].children.iter().copied());
        }
        order
    }

    /// Whether a node meets the reconstructability criteria.
    pub fn is_reconstructable(&self, node: usize) -> bool {
        self.nodes
            .get(node)
            .map(|n| self.hits_reconstructable(&n.hits))
            .unwrap_or(false)
    }

    /// Whether a hit collection meets the minimum-hit and good-view criteria.
    pub fn hits_reconstructable(&self, hits: &[usize]) -> bool {
        if hits.len() < self.criteria.min_hits {
            return false;
        }
        let mut per_view = [0usize; 3];
        for &hit in hits {
            if let Some(record) = self.event.hit(hit) {
                let slot = match record.view {
                    View::U => 0,
                    View::V => 1,
                    View::W => 2,
                };
                per_view[slot] += 1;
            }
        }
        let good_views = per_view
            .iter()
            .filter(|&&count| count >= self.criteria.min_hits_for_good_view)
            .count();
        good_views >= self.criteria.min_good_views
    }

    /// Provenance of a node, from its leading particle.
    fn node_origin(&self, node: usize) -> Option<Origin> {
        let node = self.nodes.get(node)?;
        self.event.mc_particle(node.leading).map(|p| p.origin)
    }

    /// Whether a node derives from a beam-neutrino interaction.
    pub fn is_neutrino_induced(&self, node: usize) -> bool {
        self.node_origin(node) == Some(Origin::BeamNeutrino)
    }

    /// Whether a node derives from a cosmic ray.
    pub fn is_cosmic_ray(&self, node: usize) -> bool {
        self.node_origin(node) == Some(Origin::CosmicRay)
    }

    /// Whether a node derives from a test-beam particle.
    pub fn is_test_beam_particle(&self, node: usize) -> bool {
        self.node_origin(node) == Some(Origin::TestBeam)
    }

    /// Render one node and its subtree, each line starting with `prefix`.
    pub fn node_string(&self, node: usize, prefix: &str) -> String {
        let Some(record) = self.nodes.get(node) else {
            return String::new();
        };
        let mut out = format!(
            "{prefix}node {}: pdg {} tier {} ({} particles, {} hits)",
            record.id,
            record.pdg,
            record.tier,
            record.particles.len(),
            record.hits.len()
        );
        if record.is_leading_lepton {
            out.push_str(" [leading lepton]");
        }
        out.push('\n');
        let child_prefix = format!("{prefix}  ");
        for &child in &record.children {
            out.push_str(&self.node_string(child, &child_prefix));
        }
        out
    }
}

impl fmt::Display for McHierarchy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.neutrino.and_then(|nu| self.event.mc_particle(nu)) {
            Some(nu) => writeln!(f, "MC hierarchy (neutrino pdg {}): {} nodes", nu.pdg, self.nodes.len())?,
            None => writeln!(f, "MC hierarchy (no neutrino): {} nodes", self.nodes.len())?,
        }
        for &root in &self.roots {
            write!(f, "{}", self.node_string(root, "  "))?;
        }
        Ok(())
    }
}
