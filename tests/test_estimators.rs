// tests/test_estimators.rs
// Density estimator values: constant and Simpson kernels, front-face
// rejection, the raw gather filters and symmetry correction, and the
// volume estimator normalization.
// RELEVANT FILES:src/map/estimate.rs,src/shading.rs

use std::f32::consts::PI;

use fluxmap::{
    Bsdf, BsdfQueryRecord, Frame, PhaseFunction, PhaseQueryRecord, PhotonMap, Spectrum,
    SurfaceInteraction, TransportMode,
};
use glam::Vec3;

struct ConstantBsdf(Spectrum);

impl Bsdf for ConstantBsdf {
    fn f(&self, _rec: &BsdfQueryRecord) -> Spectrum {
        self.0
    }
}

/// Asserts the transport mode and direction plumbing of the raw gather.
struct ImportanceProbe;

impl Bsdf for ImportanceProbe {
    fn f(&self, rec: &BsdfQueryRecord) -> Spectrum {
        assert_eq!(rec.mode, TransportMode::Importance);
        // The photon arrived straight down onto the surface, so its
        // reversed direction is the local +z
        assert!(rec.wi.z > 0.99);
        Spectrum::ONE
    }
}

struct ConstantPhase(Spectrum);

impl PhaseFunction for ConstantPhase {
    fn f(&self, _rec: &PhaseQueryRecord) -> Spectrum {
        self.0
    }
}

fn assert_close(got: Spectrum, want: Spectrum, eps: f32) {
    assert!(
        (got - want).abs().max_element() <= eps,
        "got {got:?}, want {want:?}"
    );
}

/// One photon that arrived traveling straight down, deposited at `pos`.
fn downward_photon(map: &mut PhotonMap, pos: Vec3, power: Vec3, depth: u16) {
    assert!(map.store(pos, Vec3::Z, Vec3::NEG_Z, power, depth));
}

fn upward_interaction(bsdf: &dyn Bsdf) -> SurfaceInteraction<'_> {
    SurfaceInteraction::new(Vec3::ZERO, Frame::from_normal(Vec3::Z), Vec3::Z, bsdf)
}

#[test]
fn unfiltered_irradiance_single_photon() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.balance();

    // One photon of unit power over the unit disc
    let result = map.estimate_irradiance(Vec3::ZERO, Vec3::Z, 1.0, 10);
    assert_close(result, Vec3::splat(1.0 / PI), 1e-5);
}

#[test]
fn irradiance_respects_scale() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.balance();
    map.set_scale(2.0);

    let result = map.estimate_irradiance(Vec3::ZERO, Vec3::Z, 1.0, 10);
    assert_close(result, Vec3::splat(2.0 / PI), 1e-5);
}

#[test]
fn irradiance_rejects_back_side_photons() {
    let mut map = PhotonMap::new(10);
    // Photon arrived traveling upward: same side as the normal, rejected
    assert!(map.store(Vec3::ZERO, Vec3::Z, Vec3::Z, Vec3::ONE, 0));
    map.balance();

    let result = map.estimate_irradiance(Vec3::ZERO, Vec3::Z, 1.0, 10);
    assert_eq!(result, Spectrum::ZERO);

    let filtered = map.estimate_irradiance_filtered(Vec3::ZERO, Vec3::Z, 1.0, 10);
    assert_eq!(filtered, Spectrum::ZERO);
}

#[test]
fn filtered_irradiance_peaks_at_query_point() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.balance();

    // Simpson weight is 1 at zero distance, normalization 3 over the disc
    let result = map.estimate_irradiance_filtered(Vec3::ZERO, Vec3::Z, 1.0, 10);
    assert_close(result, Vec3::splat(3.0 / PI), 1e-5);
}

#[test]
fn filtered_irradiance_weights_by_distance() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::new(0.5, 0.0, 0.0), Vec3::ONE, 0);
    map.balance();

    // d^2/r^2 = 0.25, so the kernel weight is 0.75^2
    let weight = 0.75f32 * 0.75;
    let result = map.estimate_irradiance_filtered(Vec3::ZERO, Vec3::Z, 1.0, 10);
    assert_close(result, Vec3::splat(weight * 3.0 / PI), 1e-5);
}

#[test]
fn estimators_return_zero_without_photons_in_range() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::new(100.0, 0.0, 0.0), Vec3::ONE, 0);
    map.balance();

    assert_eq!(
        map.estimate_irradiance(Vec3::ZERO, Vec3::Z, 1.0, 10),
        Spectrum::ZERO
    );
    // Degenerate zero search radius is not an error
    assert_eq!(
        map.estimate_irradiance(Vec3::ZERO, Vec3::Z, 0.0, 10),
        Spectrum::ZERO
    );
}

#[test]
fn radiance_filtered_convolves_with_bsdf() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.balance();

    let bsdf = ConstantBsdf(Spectrum::splat(0.5));
    let its = upward_interaction(&bsdf);

    let result = map.estimate_radiance_filtered(&its, 1.0, 10);
    assert_close(result, Vec3::splat(0.5 * 3.0 / PI), 1e-5);
}

#[test]
fn raw_gather_accumulates_and_counts() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.balance();

    let bsdf = ImportanceProbe;
    let its = upward_interaction(&bsdf);

    let mut result = Spectrum::ZERO;
    let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 4);

    assert_eq!(count, 1);
    // Head-on deposition: the symmetry correction is cos/dot = 1
    assert_close(result, Vec3::ONE, 1e-4);
}

#[test]
fn raw_gather_applies_scale() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.balance();
    map.set_scale(0.5);

    let bsdf = ConstantBsdf(Spectrum::ONE);
    let its = upward_interaction(&bsdf);

    let mut result = Spectrum::ZERO;
    let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 4);
    assert_eq!(count, 1);
    assert_close(result, Vec3::splat(0.5), 1e-4);
}

#[test]
fn raw_gather_filters_deep_photons() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 5);
    map.balance();

    let bsdf = ConstantBsdf(Spectrum::ONE);
    let its = upward_interaction(&bsdf);

    let mut result = Spectrum::ZERO;
    let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 3);
    assert_eq!(count, 0);
    assert_eq!(result, Spectrum::ZERO);
}

#[test]
fn raw_gather_filters_disagreeing_normals() {
    let mut map = PhotonMap::new(10);
    // Deposited on a surface perpendicular to the shading surface
    assert!(map.store(Vec3::ZERO, Vec3::X, Vec3::NEG_Z, Vec3::ONE, 0));
    map.balance();

    let bsdf = ConstantBsdf(Spectrum::ONE);
    let its = upward_interaction(&bsdf);

    let mut result = Spectrum::ZERO;
    let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 4);
    assert_eq!(count, 0);
}

#[test]
fn raw_gather_filters_grazing_arrivals() {
    let mut map = PhotonMap::new(10);
    // Photon direction almost parallel to its deposition surface
    let dir = Vec3::new(-1.0, 0.0, -0.001).normalize();
    assert!(map.store(Vec3::ZERO, Vec3::Z, dir, Vec3::ONE, 0));
    map.balance();

    let bsdf = ConstantBsdf(Spectrum::ONE);
    let its = upward_interaction(&bsdf);

    let mut result = Spectrum::ZERO;
    let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 4);
    assert_eq!(count, 0);
}

#[test]
fn volume_radiance_normalizes_over_sphere() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.balance();

    let phase = ConstantPhase(Spectrum::splat(0.25));
    let radius = 2.0f32;
    let result = map.estimate_volume_radiance(Vec3::ZERO, Vec3::Z, &phase, radius, 10);

    let volume = (4.0 / 3.0) * PI * radius * radius * radius;
    assert_close(result, Vec3::splat(0.25 / volume), 1e-6);
}

#[test]
#[should_panic]
fn estimating_before_balance_panics() {
    let mut map = PhotonMap::new(10);
    downward_photon(&mut map, Vec3::ZERO, Vec3::ONE, 0);
    map.estimate_irradiance(Vec3::ZERO, Vec3::Z, 1.0, 10);
}
