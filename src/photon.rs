// src/photon.rs
// Compact oriented radiometric sample stored by the photon map.
// The record is a fixed 28-byte #[repr(C)] layout so a map of millions of
// photons stays cache- and serialization-friendly.
// RELEVANT FILES:src/map/mod.rs,src/map/balance.rs,src/io/stream.rs

use std::f32::consts::{PI, TAU};
use std::io::{Read, Write};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use once_cell::sync::Lazy;

use crate::io::stream::{ReadLe, WriteLe};

/// Shared-exponent decode table for the packed RGBE power representation.
/// `table[e]` is the scale applied to the three 8-bit mantissas.
static EXP_TABLE: Lazy<[f32; 256]> = Lazy::new(|| {
    let mut table = [0.0f32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = 2.0f32.powi(i as i32 - (128 + 8));
    }
    table
});

/// Powers below this threshold encode to exact zero.
const POWER_EPSILON: f32 = 1e-32;

/// An oriented radiometric sample.
///
/// Position is kept at full precision since it drives the kd-tree. The
/// surface normal and incident direction are quantized to two 16-bit
/// spherical angles each, and the power uses a Ward-style RGBE encoding
/// (three 8-bit mantissas sharing one exponent byte).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Photon {
    /// World-space deposition position
    pub pos: [f32; 3],
    normal_theta: u16,
    normal_phi: u16,
    dir_theta: u16,
    dir_phi: u16,
    power: [u8; 4],
    depth: u16,
    axis: u8,
    flags: u8,
}

const _: () = {
    assert!(std::mem::size_of::<Photon>() == 28);
    assert!(std::mem::align_of::<Photon>() == 4);
};

/// Serialized size of one photon record in bytes
pub const PHOTON_RECORD_SIZE: usize = 28;

impl Photon {
    pub fn new(pos: Vec3, normal: Vec3, dir: Vec3, power: Vec3, depth: u16) -> Self {
        let (normal_theta, normal_phi) = encode_angles(normal);
        let (dir_theta, dir_phi) = encode_angles(dir);
        Self {
            pos: pos.to_array(),
            normal_theta,
            normal_phi,
            dir_theta,
            dir_phi,
            power: encode_rgbe(power),
            depth,
            axis: 0,
            flags: 0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.pos)
    }

    /// Surface normal at the deposition point (unit length, quantized)
    pub fn normal(&self) -> Vec3 {
        decode_angles(self.normal_theta, self.normal_phi)
    }

    /// Incident direction the photon arrived from (unit length, quantized)
    pub fn direction(&self) -> Vec3 {
        decode_angles(self.dir_theta, self.dir_phi)
    }

    pub fn power(&self) -> Vec3 {
        let scale = EXP_TABLE[self.power[3] as usize];
        Vec3::new(
            self.power[0] as f32,
            self.power[1] as f32,
            self.power[2] as f32,
        ) * scale
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Split axis recorded by the balancer; meaningful only for inner nodes
    /// of a balanced map.
    pub fn split_axis(&self) -> usize {
        self.axis as usize
    }

    pub(crate) fn set_split_axis(&mut self, axis: usize) {
        debug_assert!(axis < 3);
        self.axis = axis as u8;
    }

    /// Squared distance from this photon to `p`
    pub fn dist_squared(&self, p: Vec3) -> f32 {
        (self.position() - p).length_squared()
    }

    pub(crate) fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for &c in &self.pos {
            w.write_f32_le(c)?;
        }
        w.write_u16_le(self.normal_theta)?;
        w.write_u16_le(self.normal_phi)?;
        w.write_u16_le(self.dir_theta)?;
        w.write_u16_le(self.dir_phi)?;
        w.write_all(&self.power)?;
        w.write_u16_le(self.depth)?;
        w.write_u8(self.axis)?;
        w.write_u8(self.flags)
    }

    pub(crate) fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let mut photon = Self::zeroed();
        for c in photon.pos.iter_mut() {
            *c = r.read_f32_le()?;
        }
        photon.normal_theta = r.read_u16_le()?;
        photon.normal_phi = r.read_u16_le()?;
        photon.dir_theta = r.read_u16_le()?;
        photon.dir_phi = r.read_u16_le()?;
        r.read_exact(&mut photon.power)?;
        photon.depth = r.read_u16_le()?;
        photon.axis = r.read_u8()?;
        photon.flags = r.read_u8()?;
        Ok(photon)
    }
}

/// Quantize a unit direction to (theta, phi) angles spanning the full u16 range.
fn encode_angles(v: Vec3) -> (u16, u16) {
    let theta = v.z.clamp(-1.0, 1.0).acos();
    let mut phi = v.y.atan2(v.x);
    if phi < 0.0 {
        phi += TAU;
    }
    let theta_q = (theta * (65535.0 / PI)) as u16;
    let phi_q = (phi * (65535.0 / TAU)) as u16;
    (theta_q, phi_q)
}

fn decode_angles(theta_q: u16, phi_q: u16) -> Vec3 {
    let theta = theta_q as f32 * (PI / 65535.0);
    let phi = phi_q as f32 * (TAU / 65535.0);
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}

/// Exact frexp for positive normal floats: `x = mantissa * 2^exp`,
/// mantissa in [0.5, 1).
fn frexp(x: f32) -> (f32, i32) {
    let bits = x.to_bits();
    let exp = ((bits >> 23) & 0xff) as i32 - 126;
    let mantissa = f32::from_bits((bits & 0x807f_ffff) | 0x3f00_0000);
    (mantissa, exp)
}

fn encode_rgbe(power: Vec3) -> [u8; 4] {
    let max = power.x.max(power.y).max(power.z);
    if max < POWER_EPSILON {
        return [0; 4];
    }
    // max >= 1e-32 is always a normal float, so the bit-level frexp is exact
    let (mantissa, exp) = frexp(max);
    let scale = mantissa * 256.0 / max;
    [
        (power.x * scale) as u8,
        (power.y * scale) as u8,
        (power.z * scale) as u8,
        (exp + 128).clamp(0, 255) as u8,
    ]
}
