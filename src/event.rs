//! Event snapshot: the raw inputs hierarchy construction works from.
//!
//! An [`Event`] is an arena that owns three record kinds, each addressed by a
//! stable `usize` id:
//!
//! ```text
//! Record       │ Side         │ Carries
//! ─────────────┼──────────────┼───────────────────────────────────────
//! McParticle   │ simulation   │ pdg, energy, origin, parent link,
//!              │              │ entry/exit trajectory directions
//! Pfo          │ reconstruction │ track/shower pdg, parent link,
//!              │              │ entry/exit trajectory directions
//! Hit          │ shared       │ readout view, ADC charge
//! ```
//!
//! Hits are attributed to particles through per-side maps (`attach_mc_hits`,
//! `attach_pfo_hits`). The same physical hit id can be attributed once on the
//! simulation side and once on the reconstruction side; shared-hit counting
//! during matching is the intersection of those attributions.
//!
//! The arena is append-only. Child lists are derived automatically from
//! parent links at insertion time, so the parent/child relation is always
//! consistent by construction.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// PDG particle codes used by the folding and filtering rules.
pub mod pdg {
    /// Electron.
    pub const ELECTRON: i32 = 11;
    /// Electron neutrino.
    pub const NU_E: i32 = 12;
    /// Muon.
    pub const MUON: i32 = 13;
    /// Muon neutrino.
    pub const NU_MU: i32 = 14;
    /// Tau.
    pub const TAU: i32 = 15;
    /// Tau neutrino.
    pub const NU_TAU: i32 = 16;
    /// Photon.
    pub const PHOTON: i32 = 22;
    /// Charged pion.
    pub const PI_PLUS: i32 = 211;
    /// Neutron.
    pub const NEUTRON: i32 = 2112;
    /// Proton.
    pub const PROTON: i32 = 2212;
}

/// Whether a PDG code is a neutrino flavour.
pub fn is_neutrino(code: i32) -> bool {
    matches!(code.abs(), pdg::NU_E | pdg::NU_MU | pdg::NU_TAU)
}

/// Whether a PDG code induces an electromagnetic shower (electron or photon).
pub fn is_shower(code: i32) -> bool {
    matches!(code.abs(), pdg::ELECTRON | pdg::PHOTON)
}

/// Whether a PDG code is a neutron.
pub fn is_neutron(code: i32) -> bool {
    code == pdg::NEUTRON
}

/// Whether a PDG code is a charged lepton.
pub fn is_charged_lepton(code: i32) -> bool {
    matches!(code.abs(), pdg::ELECTRON | pdg::MUON | pdg::TAU)
}

/// One of the fixed 2D projective readout planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    /// U plane.
    U,
    /// V plane.
    V,
    /// W plane.
    W,
}

impl View {
    /// All views, in a fixed order.
    pub const ALL: [View; 3] = [View::U, View::V, View::W];
}

/// A 3-vector for trajectory directions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
}

impl Vector3 {
    /// The zero vector. Directions default to this, which no direction is
    /// ever considered continuous with.
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Cosine of the opening angle to another vector.
    ///
    /// Returns `None` when either vector is degenerate (zero length or
    /// non-finite components), so numeric failures stay local to the caller
    /// instead of propagating.
    pub fn cos_angle(&self, other: &Vector3) -> Option<f64> {
        let denom = self.norm() * other.norm();
        if !denom.is_finite() || denom <= f64::EPSILON {
            return None;
        }
        let cos = self.dot(other) / denom;
        if cos.is_finite() {
            Some(cos.clamp(-1.0, 1.0))
        } else {
            None
        }
    }
}

/// A single recorded hit in one readout view.
#[derive(Debug, Clone)]
pub struct Hit {
    /// The view this hit was recorded in.
    pub view: View,
    /// Deposited charge (ADC).
    pub adc: f32,
}

/// Provenance of a simulated particle's interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Produced by a beam neutrino interaction.
    BeamNeutrino,
    /// Cosmic-ray induced.
    CosmicRay,
    /// Test-beam particle.
    TestBeam,
}

/// A simulated (truth) particle record.
#[derive(Debug, Clone)]
pub struct McParticle {
    /// PDG code.
    pub pdg: i32,
    /// Total energy, used to rank leading-lepton candidates.
    pub energy: f64,
    /// Interaction provenance.
    pub origin: Origin,
    /// Parent particle id, if any.
    pub parent: Option<usize>,
    /// Child particle ids, maintained by the owning [`Event`].
    pub children: Vec<usize>,
    /// Trajectory direction at the particle's start point.
    pub entry_direction: Vector3,
    /// Trajectory direction at the particle's end point.
    pub exit_direction: Vector3,
}

/// A reconstructed particle-flow object.
///
/// The pdg code here is the track/shower characterisation, not a physics
/// hypothesis: tracks carry the muon code, showers the electron code, and a
/// reconstructed neutrino carries a neutrino code.
#[derive(Debug, Clone)]
pub struct Pfo {
    /// Characterisation PDG code.
    pub pdg: i32,
    /// Parent PFO id, if any.
    pub parent: Option<usize>,
    /// Child PFO ids, maintained by the owning [`Event`].
    pub children: Vec<usize>,
    /// Fitted trajectory direction at the start point.
    pub entry_direction: Vector3,
    /// Fitted trajectory direction at the end point.
    pub exit_direction: Vector3,
}

/// An immutable-once-built snapshot of one reconstructed event.
#[derive(Debug, Default)]
pub struct Event {
    mc_particles: Vec<McParticle>,
    pfos: Vec<Pfo>,
    hits: Vec<Hit>,
    /// Hit ids attributed to each MC particle, parallel to `mc_particles`.
    mc_hits: Vec<Vec<usize>>,
    /// Hit ids attributed to each PFO, parallel to `pfos`.
    pfo_hits: Vec<Vec<usize>>,
}

impl Event {
    /// Create an empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a simulated particle and return its id.
    ///
    /// The parent's child list is updated automatically. Directions default
    /// to zero; set them with [`Event::set_mc_directions`] if dynamic folding
    /// is in use.
    pub fn add_mc_particle(
        &mut self,
        pdg: i32,
        energy: f64,
        origin: Origin,
        parent: Option<usize>,
    ) -> Result<usize> {
        if let Some(parent) = parent {
            if parent >= self.mc_particles.len() {
                return Err(Error::UnknownParticle { index: parent });
            }
        }
        let id = self.mc_particles.len();
        self.mc_particles.push(McParticle {
            pdg,
            energy,
            origin,
            parent,
            children: Vec::new(),
            entry_direction: Vector3::ZERO,
            exit_direction: Vector3::ZERO,
        });
        self.mc_hits.push(Vec::new());
        if let Some(parent) = parent {
            self.mc_particles[parent].children.push(id);
        }
        Ok(id)
    }

    /// Add a reconstructed PFO and return its id.
    pub fn add_pfo(&mut self, pdg: i32, parent: Option<usize>) -> Result<usize> {
        if let Some(parent) = parent {
            if parent >= self.pfos.len() {
                return Err(Error::UnknownParticle { index: parent });
            }
        }
        let id = self.pfos.len();
        self.pfos.push(Pfo {
            pdg,
            parent,
            children: Vec::new(),
            entry_direction: Vector3::ZERO,
            exit_direction: Vector3::ZERO,
        });
        self.pfo_hits.push(Vec::new());
        if let Some(parent) = parent {
            self.pfos[parent].children.push(id);
        }
        Ok(id)
    }

    /// Add a hit and return its id.
    pub fn add_hit(&mut self, view: View, adc: f32) -> usize {
        let id = self.hits.len();
        self.hits.push(Hit { view, adc });
        id
    }

    /// Set the trajectory directions of an MC particle.
    pub fn set_mc_directions(&mut self, particle: usize, entry: Vector3, exit: Vector3) -> Result<()> {
        let record = self
            .mc_particles
            .get_mut(particle)
            .ok_or(Error::UnknownParticle { index: particle })?;
        record.entry_direction = entry;
        record.exit_direction = exit;
        Ok(())
    }

    /// Set the fitted trajectory directions of a PFO.
    pub fn set_pfo_directions(&mut self, pfo: usize, entry: Vector3, exit: Vector3) -> Result<()> {
        let record = self.pfos.get_mut(pfo).ok_or(Error::UnknownParticle { index: pfo })?;
        record.entry_direction = entry;
        record.exit_direction = exit;
        Ok(())
    }

    /// Attribute hits to an MC particle.
    pub fn attach_mc_hits(&mut self, particle: usize, hits: &[usize]) -> Result<()> {
        if particle >= self.mc_particles.len() {
            return Err(Error::UnknownParticle { index: particle });
        }
        for &hit in hits {
            if hit >= self.hits.len() {
                return Err(Error::UnknownHit { index: hit });
            }
        }
        self.mc_hits[particle].extend_from_slice(hits);
        Ok(())
    }

    /// Attribute hits to a PFO.
    pub fn attach_pfo_hits(&mut self, pfo: usize, hits: &[usize]) -> Result<()> {
        if pfo >= self.pfos.len() {
            return Err(Error::UnknownParticle { index: pfo });
        }
        for &hit in hits {
            if hit >= self.hits.len() {
                return Err(Error::UnknownHit { index: hit });
            }
        }
        self.pfo_hits[pfo].extend_from_slice(hits);
        Ok(())
    }

    /// Get an MC particle by id.
    pub fn mc_particle(&self, id: usize) -> Option<&McParticle> {
        self.mc_particles.get(id)
    }

    /// Get a PFO by id.
    pub fn pfo(&self, id: usize) -> Option<&Pfo> {
        self.pfos.get(id)
    }

    /// Get a hit by id.
    pub fn hit(&self, id: usize) -> Option<&Hit> {
        self.hits.get(id)
    }

    /// Number of MC particles.
    pub fn n_mc_particles(&self) -> usize {
        self.mc_particles.len()
    }

    /// Number of PFOs.
    pub fn n_pfos(&self) -> usize {
        self.pfos.len()
    }

    /// Number of hits.
    pub fn n_hits(&self) -> usize {
        self.hits.len()
    }

    /// All MC particle ids.
    pub fn mc_particle_ids(&self) -> impl Iterator<Item = usize> {
        0..self.mc_particles.len()
    }

    /// All PFO ids.
    pub fn pfo_ids(&self) -> impl Iterator<Item = usize> {
        0..self.pfos.len()
    }

    /// All hit ids.
    pub fn hit_ids(&self) -> impl Iterator<Item = usize> {
        0..self.hits.len()
    }

    /// Hit ids attributed to an MC particle.
    pub fn hits_of_mc(&self, particle: usize) -> &[usize] {
        self.mc_hits.get(particle).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hit ids attributed to a PFO.
    pub fn hits_of_pfo(&self, pfo: usize) -> &[usize] {
        self.pfo_hits.get(pfo).map(Vec::as_slice).unwrap_or(&[])
    }
}
