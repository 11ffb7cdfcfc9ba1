//! Folded particle hierarchies.
//!
//! Both sides of an event get the same tree shape built the same way:
//!
//! ```text
//! Side  │ Input particles      │ Extras
//! ──────┼──────────────────────┼────────────────────────────────────────
//! MC    │ simulated particles  │ tiers, reconstructability criteria,
//!       │                      │ neutron removal, leading-lepton tag
//! Reco  │ particle-flow objects│ track/shower characterisation codes
//! ```
//!
//! A hierarchy exclusively owns its nodes in an arena (`Vec` of records
//! addressed by `usize` ids); children and roots are indices into that arena,
//! so there are no back-references to dangle. Hierarchies borrow the
//! [`crate::event::Event`] they were built over and are read-only once
//! filled.
//!
//! [`validate`] offers health checks for the structural invariants
//! (single-parent reachability, tier steps, hit partition).

pub mod mc;
pub mod reco;
pub mod validate;

pub use mc::{McHierarchy, McNode, ReconstructabilityCriteria};
pub use reco::{RecoHierarchy, RecoNode};
pub use validate::{
    validate_mc_hierarchy, validate_reco_hierarchy, Severity, ValidationIssue, ValidationReport,
};
