//! # cascade
//!
//! Particle cascade hierarchies for liquid-argon event interpretation:
//! fold truth and reconstructed interaction trees to a chosen granularity,
//! then match the two sides by shared hits.
//!
//! The crate is a pure library over borrowed event data. An [`Event`] owns
//! the flat particle, reconstructed-object and hit arenas; hierarchies and
//! match results index into it and never copy it.
//!
//! Folding modes (combinable):
//!
//! | Mode              | Effect                                                 |
//! |-------------------|--------------------------------------------------------|
//! | none              | one node per particle                                   |
//! | leading showers   | each shower absorbs its whole downstream cascade        |
//! | to tier           | subtrees at the given tier collapse into single nodes   |
//! | dynamic           | near-collinear parent/child chains merge into one node  |
//!
//! Match classes, judged against [`QualityCuts`]:
//!
//! | Class           | Meaning                                          |
//! |-----------------|--------------------------------------------------|
//! | good            | exactly one candidate passes the cuts            |
//! | above threshold | more than one candidate passes                   |
//! | sub threshold   | candidates exist but none passes                 |
//! | unmatched       | no reco node shares a hit with the truth node    |

/// Error types used across `cascade`.
pub mod error;
pub mod event;
pub mod fold;
pub mod hierarchy;
pub mod matching;

#[cfg(test)]
mod matching_tests;

pub use error::{Error, Result};
pub use event::{pdg, Event, Hit, McParticle, Origin, Pfo, Vector3, View};
pub use fold::{FoldingParameters, DEFAULT_COS_ANGLE_TOLERANCE};
pub use hierarchy::{
    validate_mc_hierarchy, validate_reco_hierarchy, McHierarchy, McNode, RecoHierarchy, RecoNode,
    ReconstructabilityCriteria, Severity, ValidationIssue, ValidationReport,
};
pub use matching::{MatchInfo, McMatches, QualityCuts};

/// Build the truth hierarchy of an event in one call.
pub fn fill_mc_hierarchy<'a>(
    event: &'a Event,
    criteria: ReconstructabilityCriteria,
    params: &FoldingParameters,
) -> McHierarchy<'a> {
    let particles: Vec<usize> = event.mc_particle_ids().collect();
    let hits: Vec<usize> = event.hit_ids().collect();
    let mut hierarchy = McHierarchy::with_criteria(event, criteria);
    hierarchy.fill(&particles, &hits, params);
    hierarchy
}

/// Build the reconstructed hierarchy of an event in one call.
pub fn fill_reco_hierarchy<'a>(event: &'a Event, params: &FoldingParameters) -> RecoHierarchy<'a> {
    let pfos: Vec<usize> = event.pfo_ids().collect();
    let hits: Vec<usize> = event.hit_ids().collect();
    let mut hierarchy = RecoHierarchy::new(event);
    hierarchy.fill(&pfos, &hits, params);
    hierarchy
}

/// Match two hierarchies built over the same event.
pub fn match_hierarchies<'a>(
    mc: &'a McHierarchy<'a>,
    reco: &'a RecoHierarchy<'a>,
    quality_cuts: QualityCuts,
) -> MatchInfo<'a> {
    MatchInfo::match_hierarchies(mc, reco, quality_cuts)
}
