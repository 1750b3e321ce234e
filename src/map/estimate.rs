// src/map/estimate.rs
// Kernel density estimators layered on the kNN search: irradiance with and
// without Simpson filtering, surface radiance, raw photon-gather radiance
// and volume radiance.
// RELEVANT FILES:src/map/knn.rs,src/shading.rs,src/math/frame.rs

use std::f32::consts::{FRAC_1_PI, PI};

use glam::Vec3;

use super::{left_child, right_child, PhotonMap, SearchResult, MAX_TREE_DEPTH};
use crate::math::Frame;
use crate::shading::{
    BsdfQueryRecord, PhaseFunction, PhaseQueryRecord, Spectrum, SurfaceInteraction,
    TransportMode,
};

impl PhotonMap {
    /// Irradiance at `p` on a surface with normal `n`, using a constant
    /// kernel over the projected search disc.
    pub fn estimate_irradiance(
        &self,
        p: Vec3,
        n: Vec3,
        search_radius: f32,
        max_photons: usize,
    ) -> Spectrum {
        assert!(self.balanced, "photon map must be balanced before estimation");

        let mut result = Spectrum::ZERO;
        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let result_count = self.nn_search(p, &mut dist_squared, max_photons, &mut results);
        if result_count == 0 {
            return Spectrum::ZERO;
        }

        for r in &results[..result_count] {
            let photon = self.photon(r.index as usize);

            // Don't use samples from the opposite side of a thin surface
            if photon.direction().dot(n) < 0.0 {
                result += photon.power();
            }
        }

        // The surface is assumed locally flat, so the estimate is divided
        // by the area of a disc covering the projected search region
        result * (self.scale * FRAC_1_PI / dist_squared)
    }

    /// Irradiance at `p`, weighting each photon with the Simpson kernel
    /// `(1 - d^2/r^2)^2`. The kernel falls off smoothly to zero at the
    /// search radius, which suppresses the ring artifacts of the constant
    /// kernel.
    pub fn estimate_irradiance_filtered(
        &self,
        p: Vec3,
        n: Vec3,
        search_radius: f32,
        max_photons: usize,
    ) -> Spectrum {
        assert!(self.balanced, "photon map must be balanced before estimation");

        let mut result = Spectrum::ZERO;
        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let result_count = self.nn_search(p, &mut dist_squared, max_photons, &mut results);
        if result_count == 0 {
            return Spectrum::ZERO;
        }

        for r in &results[..result_count] {
            let photon = self.photon(r.index as usize);

            if photon.direction().dot(n) < 0.0 {
                let sqr_term = 1.0 - r.dist_squared / dist_squared;
                result += photon.power() * (sqr_term * sqr_term);
            }
        }

        // Kernel normalization of 3 over the projected disc
        result * (self.scale * 3.0 * FRAC_1_PI / dist_squared)
    }

    /// Reflected radiance toward `its.wi`, convolving each gathered photon
    /// with the BSDF under the Simpson kernel.
    pub fn estimate_radiance_filtered(
        &self,
        its: &SurfaceInteraction<'_>,
        search_radius: f32,
        max_photons: usize,
    ) -> Spectrum {
        assert!(self.balanced, "photon map must be balanced before estimation");

        let mut result = Spectrum::ZERO;
        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let result_count = self.nn_search(its.p, &mut dist_squared, max_photons, &mut results);
        if result_count == 0 {
            return Spectrum::ZERO;
        }

        for r in &results[..result_count] {
            let photon = self.photon(r.index as usize);
            let wo = its.to_local(-photon.direction());

            let sqr_term = 1.0 - r.dist_squared / dist_squared;
            let weight = sqr_term * sqr_term;

            let rec = BsdfQueryRecord::new(its.wi, wo, TransportMode::Radiance);
            result += photon.power() * its.bsdf.f(&rec) * weight;
        }

        result * (self.scale * 3.0 * FRAC_1_PI / dist_squared)
    }

    /// Unnormalized photon gather for final gathering: accumulates every
    /// photon inside the search sphere into `result` with an adjoint BSDF
    /// evaluation and the shading-normal symmetry correction, and returns
    /// how many contributed. The disc-area division is left to the caller,
    /// which integrates this estimate over a gather step.
    ///
    /// Photons deeper than `max_depth`, photons whose deposition normal
    /// disagrees with the shading normal, and photons arriving almost
    /// parallel to their deposition surface are skipped; the two dot-product
    /// thresholds also bound the symmetry-correction ratio.
    pub fn estimate_radiance_raw(
        &self,
        its: &SurfaceInteraction<'_>,
        search_radius: f32,
        result: &mut Spectrum,
        max_depth: u16,
    ) -> usize {
        assert!(self.balanced, "photon map must be balanced before estimation");

        *result = Spectrum::ZERO;
        if self.photon_count == 0 {
            return 0;
        }

        let p = its.p;
        let dist_squared = search_radius * search_radius;
        let mut stack = [0usize; MAX_TREE_DEPTH];
        let mut index = 1usize;
        let mut stack_pos = 1usize;
        let mut result_count = 0usize;

        while index > 0 {
            let node = index;
            let photon = &self.photons[node];

            if self.is_inner_node(node) {
                let axis = photon.split_axis();
                let dist_to_plane = p[axis] - photon.pos[axis];
                let search_both = dist_to_plane * dist_to_plane <= dist_squared;

                if dist_to_plane > 0.0 {
                    if self.has_right_child(node) {
                        if search_both {
                            stack[stack_pos] = left_child(node);
                            stack_pos += 1;
                        }
                        index = right_child(node);
                    } else if search_both {
                        index = left_child(node);
                    } else {
                        stack_pos -= 1;
                        index = stack[stack_pos];
                    }
                } else {
                    if search_both && self.has_right_child(node) {
                        stack[stack_pos] = right_child(node);
                        stack_pos += 1;
                    }
                    index = left_child(node);
                }
            } else {
                stack_pos -= 1;
                index = stack[stack_pos];
            }

            let photon_dist_squared = photon.dist_squared(p);

            if photon_dist_squared < dist_squared {
                let photon_normal = photon.normal();
                let wi_world = -photon.direction();
                if photon.depth() > max_depth
                    || photon_normal.dot(its.sh_frame.n) < 0.1
                    || photon_normal.dot(wi_world) < 1e-2
                {
                    continue;
                }

                let wi_local = its.to_local(wi_world);

                // Importance transport: the photon supplies the incident
                // direction, the viewer the outgoing one
                let rec = BsdfQueryRecord::new(wi_local, its.wi, TransportMode::Importance);

                // Account for non-symmetry due to shading normals
                let correction =
                    Frame::cos_theta(wi_local).abs() / photon_normal.dot(wi_world);
                *result += photon.power() * its.bsdf.f(&rec) * correction;

                result_count += 1;
            }
        }

        *result *= self.scale;
        result_count
    }

    /// In-scattered radiance at `p` inside a participating medium, toward
    /// the viewer direction `wo`, normalized over the search sphere volume.
    pub fn estimate_volume_radiance(
        &self,
        p: Vec3,
        wo: Vec3,
        phase: &dyn PhaseFunction,
        search_radius: f32,
        max_photons: usize,
    ) -> Spectrum {
        assert!(self.balanced, "photon map must be balanced before estimation");

        let mut result = Spectrum::ZERO;
        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let result_count = self.nn_search(p, &mut dist_squared, max_photons, &mut results);
        if result_count == 0 {
            return Spectrum::ZERO;
        }

        for r in &results[..result_count] {
            let photon = self.photon(r.index as usize);
            let rec = PhaseQueryRecord::new(photon.direction(), wo);
            result += photon.power() * phase.f(&rec);
        }

        let vol_factor = (4.0 / 3.0) * PI * dist_squared * dist_squared.sqrt();
        result * (self.scale / vol_factor)
    }
}
