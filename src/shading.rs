// src/shading.rs
// Collaborator seams consumed by the density estimators: BSDF and phase
// function evaluation, plus the surface interaction the renderer hands in.
// RELEVANT FILES:src/map/estimate.rs,src/math/frame.rs

use glam::Vec3;

use crate::math::Frame;

/// Linear RGB radiometric quantity. Supports accumulation, scalar scaling
/// and component-wise products, which is all the estimators need.
pub type Spectrum = Vec3;

/// Which quantity a BSDF evaluation transports. Photon gathering evaluates
/// the adjoint (importance) form to stay consistent with particle tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Radiance,
    Importance,
}

/// A single BSDF evaluation request, directions in the local shading frame.
#[derive(Debug, Clone, Copy)]
pub struct BsdfQueryRecord {
    /// Incident direction (unit, local frame)
    pub wi: Vec3,
    /// Outgoing direction (unit, local frame)
    pub wo: Vec3,
    pub mode: TransportMode,
}

impl BsdfQueryRecord {
    pub fn new(wi: Vec3, wo: Vec3, mode: TransportMode) -> Self {
        Self { wi, wo, mode }
    }
}

/// A phase function evaluation request, directions in world space.
#[derive(Debug, Clone, Copy)]
pub struct PhaseQueryRecord {
    /// Direction the photon arrived from (unit)
    pub wi: Vec3,
    /// Outgoing direction toward the viewer (unit)
    pub wo: Vec3,
}

impl PhaseQueryRecord {
    pub fn new(wi: Vec3, wo: Vec3) -> Self {
        Self { wi, wo }
    }
}

/// Surface reflectance evaluated by the host renderer.
pub trait Bsdf {
    fn f(&self, rec: &BsdfQueryRecord) -> Spectrum;
}

/// Volume scattering distribution evaluated by the host renderer.
pub trait PhaseFunction {
    fn f(&self, rec: &PhaseQueryRecord) -> Spectrum;
}

/// The slice of a surface intersection the radiance estimators consume.
pub struct SurfaceInteraction<'a> {
    /// Intersection point
    pub p: Vec3,
    /// Shading frame; `sh_frame.n` is the shading normal
    pub sh_frame: Frame,
    /// Outgoing direction toward the viewer, in the local shading frame
    pub wi: Vec3,
    /// Material at the intersection
    pub bsdf: &'a dyn Bsdf,
}

impl<'a> SurfaceInteraction<'a> {
    pub fn new(p: Vec3, sh_frame: Frame, wi: Vec3, bsdf: &'a dyn Bsdf) -> Self {
        Self {
            p,
            sh_frame,
            wi,
            bsdf,
        }
    }

    /// Transform a world-space direction into the shading frame.
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        self.sh_frame.to_local(v)
    }
}
