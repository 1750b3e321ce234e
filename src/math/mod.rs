// src/math/mod.rs
// Small math support module: axis-aligned bounding boxes and shading frames.
// RELEVANT FILES:src/math/aabb.rs,src/math/frame.rs,src/map/balance.rs

pub mod aabb;
pub mod frame;

pub use aabb::Aabb;
pub use frame::Frame;
