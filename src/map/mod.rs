// src/map/mod.rs
// Left-balanced kd-tree photon map: storage, implicit-heap indexing and
// byte-level persistence. Balancing, search and estimation live in the
// sibling modules.
// RELEVANT FILES:src/map/balance.rs,src/map/knn.rs,src/map/estimate.rs

mod balance;
mod estimate;
mod knn;

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use bytemuck::Zeroable;
use glam::Vec3;

use crate::error::{PhotonMapError, Result};
use crate::io::stream::{ReadLe, WriteLe};
use crate::math::Aabb;
use crate::photon::{Photon, PHOTON_RECORD_SIZE};

pub use knn::SearchResult;

/// Upper bound on the kd-tree depth, and therefore on the traversal stack.
/// A left-balanced tree needs one stack slot per level, so 64 covers any
/// photon count addressable on this platform.
pub const MAX_TREE_DEPTH: usize = 64;

#[inline]
pub(crate) const fn left_child(index: usize) -> usize {
    2 * index
}

#[inline]
pub(crate) const fn right_child(index: usize) -> usize {
    2 * index + 1
}

/// A photon map: a flat array of photons that is populated once, balanced
/// once into implicit heap order, and then queried concurrently.
///
/// Photons occupy indices `1 ..= photon_count()`; slot 0 is reserved so the
/// implicit-heap child arithmetic stays exact. The tree has no node objects;
/// children are found by integer arithmetic on indices into the one array.
pub struct PhotonMap {
    photons: Vec<Photon>,
    photon_count: usize,
    max_photons: usize,
    aabb: Aabb,
    scale: f32,
    balanced: bool,
    last_inner_node: usize,
    last_r_child_node: usize,
}

impl PhotonMap {
    /// Create an empty map with a fixed capacity. The photon array is
    /// allocated once, up front, and never grows.
    pub fn new(max_photons: usize) -> Self {
        Self {
            // Entry 0 stays unused so heap addressing can start at 1
            photons: vec![Photon::zeroed(); max_photons + 1],
            photon_count: 0,
            max_photons,
            aabb: Aabb::empty(),
            scale: 1.0,
            balanced: false,
            last_inner_node: 0,
            last_r_child_node: 0,
        }
    }

    pub fn photon_count(&self) -> usize {
        self.photon_count
    }

    pub fn max_photons(&self) -> usize {
        self.max_photons
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn is_balanced(&self) -> bool {
        self.balanced
    }

    /// Global power multiplier applied at estimation time. Progressive
    /// photon mappers update this between passes to renormalize.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    /// Borrow a stored photon by its 1-based index.
    pub fn photon(&self, index: usize) -> &Photon {
        debug_assert!(index >= 1 && index <= self.photon_count);
        &self.photons[index]
    }

    /// Whether the node at `index` has any children.
    #[inline]
    pub fn is_inner_node(&self, index: usize) -> bool {
        index <= self.last_inner_node
    }

    /// Whether the node at `index` has a right child.
    #[inline]
    pub fn has_right_child(&self, index: usize) -> bool {
        index <= self.last_r_child_node
    }

    /// Append a photon. Returns `false` once the capacity is exhausted,
    /// leaving the map unchanged; callers treat this as a soft stop.
    pub fn store(
        &mut self,
        pos: Vec3,
        normal: Vec3,
        dir: Vec3,
        power: Vec3,
        depth: u16,
    ) -> bool {
        self.store_photon(Photon::new(pos, normal, dir, power, depth))
    }

    /// Append an already-constructed photon record.
    pub fn store_photon(&mut self, photon: Photon) -> bool {
        assert!(!self.balanced, "cannot store photons into a balanced map");

        if self.photon_count >= self.max_photons {
            return false;
        }

        // Track the volume covered by all stored photons
        self.aabb.expand_point(photon.position());
        self.photon_count += 1;
        self.photons[self.photon_count] = photon;

        true
    }

    /// Write the complete map state. The layout is fixed and little-endian;
    /// `deserialize` reconstructs a bit-identical instance, unused capacity
    /// included.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        log::debug!(
            "Serializing a photon map ({:.2} KiB)",
            (self.photon_count * PHOTON_RECORD_SIZE) as f32 / 1024.0
        );

        for c in [self.aabb.min, self.aabb.max] {
            w.write_f32_le(c.x)?;
            w.write_f32_le(c.y)?;
            w.write_f32_le(c.z)?;
        }
        w.write_bool(self.balanced)?;
        w.write_u64_le(self.max_photons as u64)?;
        w.write_u64_le(self.last_inner_node as u64)?;
        w.write_u64_le(self.last_r_child_node as u64)?;
        w.write_f32_le(self.scale)?;
        w.write_u64_le(self.photon_count as u64)?;
        for photon in &self.photons[1..=self.max_photons] {
            photon.write_to(w)?;
        }
        Ok(())
    }

    /// Reconstruct a map previously written with [`serialize`](Self::serialize).
    pub fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let min = Vec3::new(r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?);
        let max = Vec3::new(r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?);
        let balanced = match r.read_u8()? {
            0 => false,
            1 => true,
            b => {
                return Err(PhotonMapError::corrupt(format!(
                    "invalid balanced flag {b}"
                )))
            }
        };
        let max_photons = r.read_u64_le()? as usize;
        let last_inner_node = r.read_u64_le()? as usize;
        let last_r_child_node = r.read_u64_le()? as usize;
        let scale = r.read_f32_le()?;
        let photon_count = r.read_u64_le()? as usize;
        if photon_count > max_photons {
            return Err(PhotonMapError::corrupt(format!(
                "photon count {photon_count} exceeds capacity {max_photons}"
            )));
        }

        let mut photons = vec![Photon::zeroed(); max_photons + 1];
        for photon in photons.iter_mut().skip(1) {
            *photon = Photon::read_from(r)?;
        }

        Ok(Self {
            photons,
            photon_count,
            max_photons,
            aabb: Aabb::new(min, max),
            scale,
            balanced,
            last_inner_node,
            last_r_child_node,
        })
    }

    /// Dump the photon positions as a Wavefront OBJ point cloud. Diagnostic.
    pub fn dump_obj<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::io::obj_write::dump_obj(self, path)
    }
}

impl fmt::Display for PhotonMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PhotonMap[")?;
        writeln!(f, "  aabb = {:?} .. {:?},", self.aabb.min, self.aabb.max)?;
        writeln!(f, "  photon_count = {},", self.photon_count)?;
        writeln!(f, "  max_photons = {},", self.max_photons)?;
        writeln!(f, "  balanced = {},", self.balanced)?;
        writeln!(f, "  scale = {}", self.scale)?;
        write!(f, "]")
    }
}
