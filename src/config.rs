//! Decompiler settings.
//!
//! One plain struct holds every toggle the pipeline reads. It is passed by reference into the
//! reconstructor; nothing is read from global state.

use serde::{Deserialize, Serialize};

/// Default tolerance for collinearity, plane intersection and containment tests.
pub const DEFAULT_EPSILON: f64 = unbsp_map::unbsp_geometry::EPSILON;

/// Default tolerance when comparing a triangle's normal with its source plane.
pub const DEFAULT_ORIENTATION_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompileConfig {
    /// Collinearity, intersection determinant, containment and vertex dedup tolerance.
    pub epsilon: f64,
    /// A side is consistent when `dot(triangle normal, plane normal) >= 1 - tolerance`.
    pub orientation_tolerance: f64,
    /// Replace null-replacement candidates with the no-draw texture.
    pub replace_with_null: bool,
    /// Count clip-family sides separately in the report.
    pub count_clip_sides: bool,
    /// Derive three-point planes from the face's own vertices.
    pub use_face_vertices: bool,
    /// Run plane-consistency correction on every brush.
    pub correct_planes: bool,
    /// Compute full side polygons from the half-space intersection.
    pub calculate_vertices: bool,
    /// Attach every brush to entity 0 instead of its owner.
    pub brushes_to_world: bool,
    /// Write surface flags as 0.
    pub strip_face_flags: bool,
    /// Mark brushes with detail contents as detail.
    pub detect_detail: bool,
    /// Decompile entities on the rayon thread pool.
    pub parallel: bool,
}

impl Default for DecompileConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            orientation_tolerance: DEFAULT_ORIENTATION_TOLERANCE,
            replace_with_null: false,
            count_clip_sides: true,
            use_face_vertices: true,
            correct_planes: true,
            calculate_vertices: false,
            brushes_to_world: false,
            strip_face_flags: false,
            detect_detail: true,
            parallel: true,
        }
    }
}

impl DecompileConfig {
    /// Parse a JSON settings file. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DecompileConfig::default();
        assert_eq!(config.epsilon, DEFAULT_EPSILON);
        assert!(config.use_face_vertices);
        assert!(config.correct_planes);
        assert!(!config.brushes_to_world);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DecompileConfig::from_json_str(r#"{ "brushes_to_world": true, "epsilon": 0.01 }"#).unwrap();
        assert!(config.brushes_to_world);
        assert_eq!(config.epsilon, 0.01);
        assert_eq!(config.orientation_tolerance, DEFAULT_ORIENTATION_TOLERANCE);
        assert!(config.parallel);
    }
}
