//! Reconstructed particle hierarchy.
//!
//! [`RecoHierarchy`] mirrors the truth side over particle-flow objects. There
//! are no reconstructability criteria and no neutron removal here: PFO type
//! codes are a track/shower characterisation, not a physics hypothesis, so
//! the shower folding rule keys off the electron code and tiers are only
//! tracked implicitly during construction.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use log::{debug, warn};

use crate::event::{is_neutrino, is_shower, Event};
use crate::fold::{collect_continuations, collect_subtree, FoldingParameters, ParticleRelations, PfoRelations};

/// One folded node of the reconstructed hierarchy.
#[derive(Debug, Clone)]
pub struct RecoNode {
    id: usize,
    pfos: Vec<usize>,
    hits: Vec<usize>,
    children: Vec<usize>,
    pdg: i32,
}

impl RecoNode {
    /// Unique id of this node within its hierarchy.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The PFOs folded into this node; the first is the leading one.
    pub fn pfos(&self) -> &[usize] {
        &self.pfos
    }

    /// Hit ids attributed to this node's PFOs.
    pub fn hits(&self) -> &[usize] {
        &self.hits
    }

    /// Child node ids.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Characterisation code of the leading PFO (track = muon code, shower =
    /// electron code).
    pub fn particle_id(&self) -> i32 {
        self.pdg
    }
}

/// The folded reconstructed hierarchy of one event.
#[derive(Debug)]
pub struct RecoHierarchy<'a> {
    event: &'a Event,
    nodes: Vec<RecoNode>,
    roots: Vec<usize>,
    neutrino: Option<usize>,
}

impl<'a> RecoHierarchy<'a> {
    /// Create an empty hierarchy over an event.
    pub fn new(event: &'a Event) -> Self {
        Self {
            event,
            nodes: Vec::new(),
            roots: Vec::new(),
            neutrino: None,
        }
    }

    /// Build the folded hierarchy from a PFO selection and a hit pool.
    ///
    /// Same contract as the truth side: orphans are dropped with a debug
    /// diagnostic, empty inputs give an empty hierarchy, and a repeated call
    /// clears and rebuilds.
    pub fn fill(&mut self, pfos: &[usize], hits: &[usize], params: &FoldingParameters) {
        self.nodes.clear();
        self.roots.clear();
        self.neutrino = None;

        let event = self.event;
        let mut selected = HashSet::new();
        let mut ordered = Vec::new();
        for &pfo in pfos {
            if event.pfo(pfo).is_none() {
                warn!("skipping unknown pfo index {pfo}");
                continue;
            }
            if selected.insert(pfo) {
                ordered.push(pfo);
            }
        }
        let hit_pool: HashSet<usize> =
            hits.iter().copied().filter(|&h| event.hit(h).is_some()).collect();

        let mut primaries = Vec::new();
        for &pfo in &ordered {
            let Some(record) = event.pfo(pfo) else {
                continue;
            };
            if is_neutrino(record.pdg) {
                if record.parent.is_none() && self.neutrino.is_none() {
                    self.neutrino = Some(pfo);
                }
                continue;
            }
            match record.parent {
                None => primaries.push(pfo),
                Some(parent) => {
                    let parent_is_neutrino =
                        event.pfo(parent).map(|p| is_neutrino(p.pdg)).unwrap_or(false);
                    if parent_is_neutrino {
                        primaries.push(pfo);
                    } else if !selected.contains(&parent) {
                        debug!("excluding orphan pfo {pfo}");
                    }
                }
            }
        }

        let in_scope = move |q: usize| selected.contains(&q);
        for &primary in &primaries {
            let root = self.build_node(primary, 1, params, &in_scope, &hit_pool);
            self.roots.push(root);
        }
    }

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
        let relations = PfoRelations(event);

        // Same rule order as the truth side: shower, tier, dynamic, default.
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
        for &pfo in &folded {
            node_hits.extend(event.hits_of_pfo(pfo).iter().copied().filter(|h| hit_pool.contains(h)));
        }

        let leading = folded[0];
        let id = self.nodes.len();
        self.nodes.push(RecoNode {
            id,
            pfos: folded,
            hits: node_hits,
            children: Vec::new(),
            pdg: relations.pdg(leading),
        });

        for child in child_roots {
            let child_id = self.build_node(child, tier + 1, params, in_scope, hit_pool);
            self.nodes[id].children.push(child_id);
        }
        id
    }

    /// The event this hierarchy was built over.
    pub fn event(&self) -> &Event {
        self.event
    }

    /// The recorded reconstructed neutrino, if any.
    pub fn neutrino(&self) -> Option<usize> {
        self.neutrino
    }

    /// Root node ids.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Get a node by id.
    pub fn node(&self, id: usize) -> Option<&RecoNode> {
        self.nodes.get(id)
    }

    /// Iterate over all nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &RecoNode> {
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

    /// Render one node and its subtree, each line starting with `prefix`.
    pub fn node_string(&self, node: usize, prefix: &str) -> String {
        let Some(record) = self.nodes.get(node) else {
            return String::new();
        };
        let mut out = format!(
            "{prefix}node {}: pdg {} ({} pfos, {} hits)\n",
            record.id,
            record.pdg,
            record.pfos.len(),
            record.hits.len()
        );
        let child_prefix = format!("{prefix}  ");
        for &child in &record.children {
            out.push_str(&self.node_string(child, &child_prefix));
        }
        out
    }
}

impl fmt::Display for RecoHierarchy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.neutrino.and_then(|nu| self.event.pfo(nu)) {
            Some(nu) => writeln!(f, "Reco hierarchy (neutrino pdg {}): {} nodes", nu.pdg, self.nodes.len())?,
            None => writeln!(f, "Reco hierarchy (no neutrino): {} nodes", self.nodes.len())?,
        }
        for &root in &self.roots {
            write!(f, "{}", self.node_string(root, "  "))?;
        }
        Ok(())
    }
}
