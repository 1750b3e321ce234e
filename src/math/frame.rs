//! Orthonormal shading frame for local/world direction transforms.

use glam::Vec3;

/// Right-handed orthonormal basis around a shading normal `n`.
///
/// Directions expressed in this frame have `z` aligned with the normal,
/// so `cos_theta` of a local direction is simply its `z` component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub s: Vec3,
    pub t: Vec3,
    pub n: Vec3,
}

impl Frame {
    /// Build a frame around a unit normal.
    pub fn from_normal(n: Vec3) -> Self {
        let (s, t) = n.any_orthonormal_pair();
        Self { s, t, n }
    }

    pub fn new(s: Vec3, t: Vec3, n: Vec3) -> Self {
        Self { s, t, n }
    }

    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }

    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    /// Cosine of the angle between a local direction and the frame normal.
    pub fn cos_theta(v: Vec3) -> f32 {
        v.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_world_round_trip() {
        let frame = Frame::from_normal(Vec3::new(0.0, 1.0, 0.0));
        let v = Vec3::new(0.3, -0.4, 0.5).normalize();
        let back = frame.to_world(frame.to_local(v));
        assert!((back - v).length() < 1e-6);
    }

    #[test]
    fn normal_maps_to_positive_z() {
        let n = Vec3::new(1.0, 2.0, -0.5).normalize();
        let frame = Frame::from_normal(n);
        let local = frame.to_local(n);
        assert!((Frame::cos_theta(local) - 1.0).abs() < 1e-6);
        assert!(local.x.abs() < 1e-6 && local.y.abs() < 1e-6);
    }
}
