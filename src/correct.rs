//! Plane-consistency correction.
//!
//! A side is trusted when the triangle taken from its face agrees with its plane. Brushes with a
//! mix of trusted and untrusted sides get their bad triangles re-wound. Brushes with no trusted
//! side are rebuilt from scratch by intersecting their half-spaces.

use bevy::math::DVec3;
use tracing::debug;
use unbsp_map::types::Plane;
use unbsp_map::unbsp_geometry::{
    compute_brush_geometry, enumerate_vertices, face_triangle, sort_face_vertices_by_winding, triangle_normal,
    vertices_on_plane,
};
use unbsp_map::{CorrectionState, ReconstructedBrush, ReconstructedSide};

use crate::config::DecompileConfig;
use crate::error::{DecompileError, Location};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideClass {
    /// The three-point form agrees with the plane.
    Good,
    /// No three-point form, or it faces the wrong way.
    Bad,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneConsistencyCorrector {
    pub epsilon: f64,
    pub orientation_tolerance: f64,
}

impl Default for PlaneConsistencyCorrector {
    fn default() -> Self {
        Self::from_config(&DecompileConfig::default())
    }
}

impl PlaneConsistencyCorrector {
    pub fn new(epsilon: f64, orientation_tolerance: f64) -> Self {
        Self {
            epsilon,
            orientation_tolerance,
        }
    }

    pub fn from_config(config: &DecompileConfig) -> Self {
        Self::new(config.epsilon, config.orientation_tolerance)
    }

    pub fn classify_side(&self, side: &ReconstructedSide) -> SideClass {
        let Some(points) = &side.points else {
            return SideClass::Bad;
        };
        let derived = triangle_normal(points).normalize_or_zero();
        let expected = side.plane.normal.normalize_or_zero();
        if derived.dot(expected) >= 1.0 - self.orientation_tolerance {
            SideClass::Good
        } else {
            SideClass::Bad
        }
    }

    pub fn classify(&self, brush: &mut ReconstructedBrush) -> Vec<SideClass> {
        let classes = brush.sides.iter().map(|side| self.classify_side(side)).collect();
        brush.state = CorrectionState::Classified;
        classes
    }

    /// Classify the brush and repair it in place. On `Err` the brush is in the `Failed` state and
    /// should be dropped.
    pub fn correct(&self, brush: &mut ReconstructedBrush) -> Result<CorrectionState, DecompileError> {
        let classes = self.classify(brush);
        let good = classes.iter().filter(|class| **class == SideClass::Good).count();

        let state = if good == classes.len() {
            CorrectionState::Accepted
        } else if good > 0 {
            self.simple_correct(brush, &classes);
            CorrectionState::SimpleCorrected
        } else {
            match self.advanced_correct(brush) {
                Ok(()) => CorrectionState::AdvancedCorrected,
                Err(err) => {
                    brush.state = CorrectionState::Failed;
                    return Err(err);
                }
            }
        };
        brush.state = state;
        debug!("Brush {} corrected: {state:?}", brush.id);
        Ok(state)
    }

    /// Re-wind bad triangles that face away from their plane. Plane-only sides are left alone.
    fn simple_correct(&self, brush: &mut ReconstructedBrush, classes: &[SideClass]) {
        for (side, class) in brush.sides.iter_mut().zip(classes) {
            if *class == SideClass::Good {
                continue;
            }
            let Some(points) = &side.points else {
                continue;
            };
            if triangle_normal(points).dot(side.plane.normal) < 0.0 {
                side.flip_winding();
            }
        }
    }

    /// Rebuild every side's triangle from the brush's half-space intersection. Sides whose plane
    /// does not bound a face are removed.
    fn advanced_correct(&self, brush: &mut ReconstructedBrush) -> Result<(), DecompileError> {
        let planes = brush.planes();
        if let Some(triangles) = self.rebuild(&planes) {
            self.apply_rebuild(brush, triangles, false);
            return Ok(());
        }

        // All planes stored inverted: the outward brush is the one bounded by their negations.
        let inverted: Vec<Plane> = planes.iter().map(Plane::flipped).collect();
        if let Some(triangles) = self.rebuild(&inverted) {
            debug!("Brush {} rebuilt from inverted planes", brush.id);
            self.apply_rebuild(brush, triangles, true);
            return Ok(());
        }

        Err(DecompileError::DegenerateGeometry {
            at: Location::brush(brush.entity, brush.id),
        })
    }

    fn apply_rebuild(&self, brush: &mut ReconstructedBrush, triangles: Vec<Option<[DVec3; 3]>>, inverted: bool) {
        let sides = std::mem::take(&mut brush.sides);
        brush.sides = sides
            .into_iter()
            .zip(triangles)
            .filter_map(|(mut side, triangle)| {
                if inverted {
                    side.plane = side.plane.flipped();
                }
                side.points = Some(triangle?);
                Some(side)
            })
            .collect();
    }

    /// One outward triangle per plane, `None` for planes that bound no face. Returns `None` if
    /// no plane bounds a face.
    fn rebuild(&self, planes: &[Plane]) -> Option<Vec<Option<[DVec3; 3]>>> {
        let vertices = enumerate_vertices(planes, self.epsilon);
        let triangles: Vec<Option<[DVec3; 3]>> = planes
            .iter()
            .map(|plane| {
                let mut on_plane = vertices_on_plane(&vertices, plane, self.epsilon);
                sort_face_vertices_by_winding(&vertices, &mut on_plane, plane.normal);
                let polygon: Vec<DVec3> = on_plane.iter().map(|&i| vertices[i]).collect();
                let mut triangle = face_triangle(&polygon, self.epsilon)?;
                if triangle_normal(&triangle).dot(plane.normal) < 0.0 {
                    triangle.swap(1, 2);
                }
                Some(triangle)
            })
            .collect();

        triangles.iter().any(Option::is_some).then_some(triangles)
    }

    /// Fill in each side's full polygon. Plane-only sides take their three-point form from it.
    /// Returns a warning per side that bounds no face.
    pub fn compute_vertices(&self, brush: &mut ReconstructedBrush) -> Vec<DecompileError> {
        let planes = brush.planes();
        let (vertices, polygons) = compute_brush_geometry(&planes, self.epsilon);
        let mut warnings = Vec::new();

        for (index, (side, polygon)) in brush.sides.iter_mut().zip(polygons).enumerate() {
            if polygon.len() < 3 {
                warnings.push(DecompileError::DegenerateSide {
                    at: Location::side(brush.entity, brush.id, index),
                    reason: "side has no vertices on the brush",
                });
                continue;
            }
            side.polygon = polygon.iter().map(|&i| vertices[i]).collect();
            if side.points.is_none() {
                side.points = face_triangle(&side.polygon, self.epsilon);
            }
        }
        warnings
    }
}
