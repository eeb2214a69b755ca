//! Shared helpers for integration tests.

#![allow(dead_code)]

pub use unbsp::lumps::fixtures::{FaceStyle, LumpBuilder, WORLD, box_planes, tetrahedron_planes};
