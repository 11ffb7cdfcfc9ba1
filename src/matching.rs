//! Truth/reco matching from shared-hit statistics.
//!
//! Matching compares the two folded hierarchies of one event. For every
//! reconstructable truth node the reco nodes sharing at least one hit become
//! its candidates, ranked by shared-hit count, and the candidate list is
//! classified against [`QualityCuts`]:
//!
//! ```text
//! Candidates            │ Passing cuts │ Class
//! ──────────────────────┼──────────────┼──────────────────
//! none                  │      -       │ unmatched MC
//! one or more           │ exactly one  │ good
//! one or more           │ two or more  │ above threshold
//! one or more           │ none         │ sub threshold
//! ```
//!
//! A reco node may appear under several truth nodes: no global exclusivity is
//! enforced, deliberately, so hit-sharing ambiguity stays visible for offline
//! diagnostics. Reco nodes that never show up as any candidate are reported
//! as unmatched reco.
//!
//! Purity is the fraction of a reco node's hits that belong to the compared
//! truth node; completeness is the fraction of the truth node's hits the reco
//! node captured. Both can be ADC(charge)-weighted and restricted to a single
//! readout view.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::View;
use crate::hierarchy::{McHierarchy, RecoHierarchy};

/// Thresholds a match must meet to count as a quality match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityCuts {
    /// Minimum purity.
    pub min_purity: f64,
    /// Minimum completeness.
    pub min_completeness: f64,
}

impl Default for QualityCuts {
    fn default() -> Self {
        Self {
            min_purity: 0.65,
            min_completeness: 0.65,
        }
    }
}

impl QualityCuts {
    /// Create quality cuts, validating that both thresholds are in [0, 1].
    pub fn new(min_purity: f64, min_completeness: f64) -> Result<Self> {
        for (name, value) in [("min_purity", min_purity), ("min_completeness", min_completeness)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidParameter {
                    name,
                    message: "must be a finite fraction in [0, 1]",
                });
            }
        }
        Ok(Self {
            min_purity,
            min_completeness,
        })
    }
}

/// The reco candidates of one truth node, ranked by shared-hit count.
#[derive(Debug, Clone)]
pub struct McMatches {
    mc: usize,
    reco_nodes: Vec<usize>,
    shared_hits: Vec<usize>,
}

impl McMatches {
    fn new(mc: usize) -> Self {
        Self {
            mc,
            reco_nodes: Vec::new(),
            shared_hits: Vec::new(),
        }
    }

    fn add(&mut self, reco: usize, shared: usize) {
        self.reco_nodes.push(reco);
        self.shared_hits.push(shared);
    }

    /// The truth node these candidates belong to.
    pub fn mc_node(&self) -> usize {
        self.mc
    }

    /// Candidate reco node ids, descending shared-hit count (stable on ties).
    pub fn reco_matches(&self) -> &[usize] {
        &self.reco_nodes
    }

    /// Number of candidates, passing or not.
    pub fn n_reco_matches(&self) -> usize {
        self.reco_nodes.len()
    }

    /// Shared-hit count for a candidate; zero for a pairing that was never
    /// computed.
    pub fn shared_hits(&self, reco: usize) -> usize {
        self.reco_nodes
            .iter()
            .position(|&r| r == reco)
            .map(|i| self.shared_hits[i])
            .unwrap_or(0)
    }
}

/// The classified match results of one event.
#[derive(Debug)]
pub struct MatchInfo<'a> {
    mc: &'a McHierarchy<'a>,
    reco: &'a RecoHierarchy<'a>,
    quality_cuts: QualityCuts,
    matches: Vec<McMatches>,
    good: Vec<usize>,
    above_threshold: Vec<usize>,
    sub_threshold: Vec<usize>,
    unmatched_mc: Vec<usize>,
    unmatched_reco: Vec<usize>,
}

impl<'a> MatchInfo<'a> {
    /// Match the nodes of the two hierarchies.
    ///
    /// Both sides are walked breadth-first, so candidate order and
    /// classification are deterministic for a given pair of hierarchies.
    /// Only truth nodes passing the hierarchy's reconstructability criteria
    /// take part.
    pub fn match_hierarchies(
        mc: &'a McHierarchy<'a>,
        reco: &'a RecoHierarchy<'a>,
        quality_cuts: QualityCuts,
    ) -> Self {
        let mut info = Self {
            mc,
            reco,
            quality_cuts,
            matches: Vec::new(),
            good: Vec::new(),
            above_threshold: Vec::new(),
            sub_threshold: Vec::new(),
            unmatched_mc: Vec::new(),
            unmatched_reco: Vec::new(),
        };

        let reco_order = reco.flattened();
        let reco_sets: Vec<(usize, HashSet<usize>)> = reco_order
            .iter()
            .filter_map(|&r| {
                reco.node(r)
                    .map(|n| (r, n.hits().iter().copied().collect()))
            })
            .collect();

        let mut claimed: HashSet<usize> = HashSet::new();
        for m in mc.flattened() {
            if !mc.is_reconstructable(m) {
                continue;
            }
            let Some(mc_node) = mc.node(m) else { continue };
            let mc_hits: HashSet<usize> = mc_node.hits().iter().copied().collect();

            let mut candidates: Vec<(usize, usize)> = Vec::new();
            for (r, hits) in &reco_sets {
                let shared = hits.intersection(&mc_hits).count();
                if shared > 0 {
                    candidates.push((*r, shared));
                }
            }
            // Stable sort keeps breadth-first order among equal counts.
            candidates.sort_by_key(|&(_, shared)| Reverse(shared));

            let mut matches = McMatches::new(m);
            for &(r, shared) in &candidates {
                matches.add(r, shared);
                claimed.insert(r);
            }

            let index = info.matches.len();
            info.matches.push(matches);
            if candidates.is_empty() {
                info.unmatched_mc.push(m);
                continue;
            }
            let passing = candidates.iter().filter(|&&(r, _)| info.is_quality(m, r)).count();
            match passing {
                0 => info.sub_threshold.push(index),
                1 => info.good.push(index),
                _ => info.above_threshold.push(index),
            }
        }

        info.unmatched_reco = reco_order.into_iter().filter(|r| !claimed.contains(r)).collect();
        info
    }

    /// All candidate lists, including truth nodes with no candidate at all.
    pub fn matches(&self) -> &[McMatches] {
        &self.matches
    }

    /// The candidate list of a specific truth node, if it took part.
    pub fn match_for(&self, mc_node: usize) -> Option<&McMatches> {
        self.matches.iter().find(|m| m.mc == mc_node)
    }

    /// Matches with exactly one candidate passing the quality cuts.
    pub fn good_matches(&self) -> impl Iterator<Item = &McMatches> {
        self.good.iter().map(move |&i| &self.matches[i])
    }

    /// Matches with several candidates passing the quality cuts.
    pub fn above_threshold_matches(&self) -> impl Iterator<Item = &McMatches> {
        self.above_threshold.iter().map(move |&i| &self.matches[i])
    }

    /// Matches whose candidates all fail the quality cuts.
    pub fn sub_threshold_matches(&self) -> impl Iterator<Item = &McMatches> {
        self.sub_threshold.iter().map(move |&i| &self.matches[i])
    }

    /// Truth node ids with no reco candidate at all.
    pub fn unmatched_mc(&self) -> &[usize] {
        &self.unmatched_mc
    }

    /// Reco node ids never claimed as a candidate by any truth node.
    pub fn unmatched_reco(&self) -> &[usize] {
        &self.unmatched_reco
    }

    /// The quality cuts in force.
    pub fn quality_cuts(&self) -> &QualityCuts {
        &self.quality_cuts
    }

    /// The truth-side parent neutrino, if present.
    pub fn mc_neutrino(&self) -> Option<usize> {
        self.mc.neutrino()
    }

    /// The reco-side parent neutrino, if present.
    pub fn reco_neutrino(&self) -> Option<usize> {
        self.reco.neutrino()
    }

    /// Number of truth nodes that took part in the match.
    pub fn n_mc_nodes(&self) -> usize {
        self.matches.len()
    }

    /// Participating truth nodes that derive from the beam neutrino.
    pub fn n_neutrino_mc_nodes(&self) -> usize {
        self.matches.iter().filter(|m| self.mc.is_neutrino_induced(m.mc)).count()
    }

    /// Participating truth nodes that derive from cosmic rays.
    pub fn n_cosmic_ray_mc_nodes(&self) -> usize {
        self.matches.iter().filter(|m| self.mc.is_cosmic_ray(m.mc)).count()
    }

    /// Participating truth nodes that derive from test-beam particles.
    pub fn n_test_beam_mc_nodes(&self) -> usize {
        self.matches.iter().filter(|m| self.mc.is_test_beam_particle(m.mc)).count()
    }

    /// Hit ids shared between a truth node and a reco node.
    fn shared_hit_ids(&self, mc_node: usize, reco_node: usize) -> Vec<usize> {
        let (Some(mc), Some(reco)) = (self.mc.node(mc_node), self.reco.node(reco_node)) else {
            return Vec::new();
        };
        let reco_hits: HashSet<usize> = reco.hits().iter().copied().collect();
        mc.hits().iter().copied().filter(|h| reco_hits.contains(h)).collect()
    }

    /// Sum the weight of hits, optionally ADC-weighted and view-restricted.
    fn hit_weight(&self, hits: &[usize], view: Option<View>, adc_weighted: bool) -> f64 {
        hits.iter()
            .filter_map(|&h| self.mc.event().hit(h))
            .filter(|hit| view.map_or(true, |v| hit.view == v))
            .map(|hit| if adc_weighted { hit.adc as f64 } else { 1.0 })
            .sum()
    }

    fn ratio(
        &self,
        mc_node: usize,
        reco_node: usize,
        denominator_hits: &[usize],
        view: Option<View>,
        adc_weighted: bool,
    ) -> Option<f64> {
        let denominator = self.hit_weight(denominator_hits, view, adc_weighted);
        if denominator <= 0.0 {
            return None;
        }
        let shared = self.shared_hit_ids(mc_node, reco_node);
        Some(self.hit_weight(&shared, view, adc_weighted) / denominator)
    }

    /// Purity of a pairing: shared weight over the reco node's weight.
    ///
    /// `None` when the reco node has no (weighted) hits to compare.
    pub fn purity(&self, mc_node: usize, reco_node: usize, adc_weighted: bool) -> Option<f64> {
        self.purity_in_view(mc_node, reco_node, None, adc_weighted)
    }

    /// Purity restricted to one readout view (or all views for `None`).
    pub fn purity_in_view(
        &self,
        mc_node: usize,
        reco_node: usize,
        view: Option<View>,
        adc_weighted: bool,
    ) -> Option<f64> {
        let reco_hits = self.reco.node(reco_node)?.hits().to_vec();
        self.ratio(mc_node, reco_node, &reco_hits, view, adc_weighted)
    }

    /// Completeness of a pairing: shared weight over the truth node's weight.
    ///
    /// `None` when the truth node has no (weighted) hits to compare.
    pub fn completeness(&self, mc_node: usize, reco_node: usize, adc_weighted: bool) -> Option<f64> {
        self.completeness_in_view(mc_node, reco_node, None, adc_weighted)
    }

    /// Completeness restricted to one readout view (or all views for `None`).
    pub fn completeness_in_view(
        &self,
        mc_node: usize,
        reco_node: usize,
        view: Option<View>,
        adc_weighted: bool,
    ) -> Option<f64> {
        let mc_hits = self.mc.node(mc_node)?.hits().to_vec();
        self.ratio(mc_node, reco_node, &mc_hits, view, adc_weighted)
    }

    /// Whether a pairing passes the quality cuts on hit-count purity and
    /// completeness.
    pub fn is_quality(&self, mc_node: usize, reco_node: usize) -> bool {
        let purity = self.purity(mc_node, reco_node, false).unwrap_or(0.0);
        let completeness = self.completeness(mc_node, reco_node, false).unwrap_or(0.0);
        purity >= self.quality_cuts.min_purity && completeness >= self.quality_cuts.min_completeness
    }

    /// Human-readable dump of every match with its statistics. Debug output,
    /// not a stable format.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let class_of = |index: usize| {
            if self.good.contains(&index) {
                "good"
            } else if self.above_threshold.contains(&index) {
                "above threshold"
            } else if self.sub_threshold.contains(&index) {
                "sub threshold"
            } else {
                "unmatched"
            }
        };
        for (index, matches) in self.matches.iter().enumerate() {
            let pdg = self.mc.node(matches.mc).map(|n| n.particle_id()).unwrap_or(0);
            out.push_str(&format!(
                "mc node {} (pdg {}): {} candidates [{}]\n",
                matches.mc,
                pdg,
                matches.n_reco_matches(),
                class_of(index)
            ));
            for &reco in matches.reco_matches() {
                let purity = self.purity(matches.mc, reco, false).unwrap_or(0.0);
                let completeness = self.completeness(matches.mc, reco, false).unwrap_or(0.0);
                out.push_str(&format!(
                    "  reco node {}: {} shared hits, purity {:.3}, completeness {:.3}\n",
                    reco,
                    matches.shared_hits(reco),
                    purity,
                    completeness
                ));
            }
        }
        out.push_str(&format!(
            "{} mc nodes ({} neutrino, {} cosmic, {} test beam), {} unmatched reco\n",
            self.n_mc_nodes(),
            self.n_neutrino_mc_nodes(),
            self.n_cosmic_ray_mc_nodes(),
            self.n_test_beam_mc_nodes(),
            self.unmatched_reco.len()
        ));
        out
    }
}

impl fmt::Display for MatchInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
