//! Decoded lump records and the [`LumpSource`] capability the decompiler reads them through.
//!
//! Records are plain data with the compiled (`f32`/`i32`) field types. Decoding a particular
//! engine's binary layout is left to whoever fills a [`BspLumps`]; the CLI reads one from JSON.

use std::ops::Range;

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};
use unbsp_map::Entities;
use unbsp_map::types::Plane;

use crate::error::LumpError;

/// Face flag: surface exists only for the compiler (hint, skip, origin). Discarded.
pub const SURF_COMPILER_ONLY: u32 = 1 << 8;
/// Face flag: a non-clip, non-trigger surface that may be swapped for the null texture.
pub const SURF_NULL_CANDIDATE: u32 = 1 << 9;
/// Brush contents: detail brush.
pub const CONTENTS_DETAIL: u32 = 1 << 9;
/// Brush contents: water volume.
pub const CONTENTS_WATER: u32 = 1 << 20;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePlane {
    pub normal: [f32; 3],
    pub distance: f32,
}

impl SourcePlane {
    pub fn to_plane(self) -> Plane {
        Plane::new(DVec3::from(self.normal.map(f64::from)), f64::from(self.distance))
    }
}

pub type Vertex = [f32; 3];

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub plane: i32,
    pub first_vertex: i32,
    pub num_vertices: i32,
    pub texture: i32,
    pub material: i32,
    pub texinfo: i32,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBrush {
    pub first_side: i32,
    pub num_sides: i32,
    #[serde(default)]
    pub contents: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSide {
    pub plane: i32,
    pub face: i32,
    /// Bevel planes are added by the compiler for collision and have no editor counterpart.
    #[serde(default)]
    pub bevel: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub first_mark_brush: i32,
    pub num_mark_brushes: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub first_leaf: i32,
    pub num_leaves: i32,
}

/// Compiled texture projection. The axes carry the inverse scale and the shifts carry the
/// owning entity's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TexInfo {
    pub s_axis: [f32; 3],
    pub s_shift: f32,
    pub t_axis: [f32; 3],
    pub t_shift: f32,
}

// ---------------------------------------------------------------------------
// LumpSource
// ---------------------------------------------------------------------------

/// Read access to decoded lumps. Every lookup returns `None` when the index is out of range.
pub trait LumpSource: Sync {
    fn entities(&self) -> Result<Entities, LumpError>;
    fn plane(&self, index: usize) -> Option<Plane>;
    fn vertex(&self, index: usize) -> Option<DVec3>;
    fn face(&self, index: usize) -> Option<Face>;
    fn brush(&self, index: usize) -> Option<SourceBrush>;
    fn brush_side(&self, index: usize) -> Option<SourceSide>;
    fn leaf(&self, index: usize) -> Option<Leaf>;
    fn model(&self, index: usize) -> Option<Model>;
    /// Brush index stored at a mark-brush slot.
    fn mark_brush(&self, index: usize) -> Option<usize>;
    fn tex_info(&self, index: usize) -> Option<TexInfo>;
    fn texture(&self, index: usize) -> Option<&str>;
    fn material(&self, index: usize) -> Option<&str>;
    fn brush_count(&self) -> usize;
    fn brush_side_count(&self) -> usize;
    fn vertex_count(&self) -> usize;
    fn leaf_count(&self) -> usize;
    fn mark_brush_count(&self) -> usize;
}

/// `first..first + count`, or `None` if either is negative or the range runs past `len`.
pub fn index_range(first: i32, count: i32, len: usize) -> Option<Range<usize>> {
    let first = usize::try_from(first).ok()?;
    let count = usize::try_from(count).ok()?;
    let end = first.checked_add(count)?;
    (end <= len).then_some(first..end)
}

/// Lookup with a signed index as stored in the lumps.
pub(crate) fn signed<T>(index: i32, lookup: impl FnOnce(usize) -> Option<T>) -> Option<T> {
    usize::try_from(index).ok().and_then(lookup)
}

/// An in-memory lump set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BspLumps {
    /// Entity lump text.
    pub entities: String,
    pub planes: Vec<SourcePlane>,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    pub brushes: Vec<SourceBrush>,
    pub brush_sides: Vec<SourceSide>,
    pub leaves: Vec<Leaf>,
    pub models: Vec<Model>,
    pub mark_brushes: Vec<u32>,
    pub tex_infos: Vec<TexInfo>,
    pub textures: Vec<String>,
    pub materials: Vec<String>,
}

impl BspLumps {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl LumpSource for BspLumps {
    fn entities(&self) -> Result<Entities, LumpError> {
        if self.entities.trim().is_empty() {
            return Err(LumpError::MissingEntities);
        }
        Ok(Entities::parse(&self.entities)?)
    }

    fn plane(&self, index: usize) -> Option<Plane> {
        self.planes.get(index).map(|plane| plane.to_plane())
    }

    fn vertex(&self, index: usize) -> Option<DVec3> {
        self.vertices
            .get(index)
            .map(|vertex| DVec3::from(vertex.map(f64::from)))
    }

    fn face(&self, index: usize) -> Option<Face> {
        self.faces.get(index).copied()
    }

    fn brush(&self, index: usize) -> Option<SourceBrush> {
        self.brushes.get(index).copied()
    }

    fn brush_side(&self, index: usize) -> Option<SourceSide> {
        self.brush_sides.get(index).copied()
    }

    fn leaf(&self, index: usize) -> Option<Leaf> {
        self.leaves.get(index).copied()
    }

    fn model(&self, index: usize) -> Option<Model> {
        self.models.get(index).copied()
    }

    fn mark_brush(&self, index: usize) -> Option<usize> {
        self.mark_brushes
            .get(index)
            .and_then(|&brush| usize::try_from(brush).ok())
    }

    fn tex_info(&self, index: usize) -> Option<TexInfo> {
        self.tex_infos.get(index).copied()
    }

    fn texture(&self, index: usize) -> Option<&str> {
        self.textures.get(index).map(String::as_str)
    }

    fn material(&self, index: usize) -> Option<&str> {
        self.materials.get(index).map(String::as_str)
    }

    fn brush_count(&self) -> usize {
        self.brushes.len()
    }

    fn brush_side_count(&self) -> usize {
        self.brush_sides.len()
    }

    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    fn mark_brush_count(&self) -> usize {
        self.mark_brushes.len()
    }
}

/// Builders for small hand-made lump sets, shared by unit and integration tests.
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use super::*;
    use unbsp_map::unbsp_geometry::{EPSILON, compute_brush_geometry};

    /// How a face's vertices are stored relative to its plane.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum FaceStyle {
        /// Compiled winding, consistent with the plane.
        Exact,
        /// Reversed winding.
        Reversed,
        /// No vertices at all.
        NoVertices,
    }

    pub const WORLD: &str = "{\n\"classname\" \"worldspawn\"\n}\n";

    pub fn box_planes(min: DVec3, max: DVec3) -> Vec<Plane> {
        vec![
            Plane::new(DVec3::X, max.x),
            Plane::new(DVec3::NEG_X, -min.x),
            Plane::new(DVec3::Y, max.y),
            Plane::new(DVec3::NEG_Y, -min.y),
            Plane::new(DVec3::Z, max.z),
            Plane::new(DVec3::NEG_Z, -min.z),
        ]
    }

    /// Outward planes of the tetrahedron with the given corners.
    pub fn tetrahedron_planes(corners: [DVec3; 4]) -> Vec<Plane> {
        let centroid = corners.iter().sum::<DVec3>() / 4.0;
        [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]]
            .into_iter()
            .map(|[a, b, c]| {
                let normal = (corners[b] - corners[a]).cross(corners[c] - corners[a]).normalize();
                let plane = Plane::new(normal, normal.dot(corners[a]));
                if plane.signed_distance(centroid) > 0.0 { plane.flipped() } else { plane }
            })
            .collect()
    }

    fn to_f32(v: DVec3) -> [f32; 3] {
        [v.x as f32, v.y as f32, v.z as f32]
    }

    pub struct LumpBuilder {
        pub lumps: BspLumps,
    }

    impl LumpBuilder {
        pub fn new(entities: &str) -> Self {
            let mut lumps = BspLumps {
                entities: entities.to_string(),
                ..Default::default()
            };
            lumps.textures.push("wall".to_string());
            lumps.materials.push("wld_concrete".to_string());
            lumps.tex_infos.push(TexInfo {
                s_axis: [1.0, 0.0, 0.0],
                s_shift: 0.0,
                t_axis: [0.0, -1.0, 0.0],
                t_shift: 0.0,
            });
            Self { lumps }
        }

        /// Add a brush bounded by `planes`, one face per plane. Returns the brush index.
        pub fn add_brush(&mut self, planes: &[Plane], style: FaceStyle, contents: u32) -> usize {
            let (vertices, polygons) = compute_brush_geometry(planes, EPSILON);
            let first_side = self.lumps.brush_sides.len() as i32;
            for (plane, polygon) in planes.iter().zip(polygons) {
                let plane_index = self.lumps.planes.len() as i32;
                self.lumps.planes.push(SourcePlane {
                    normal: to_f32(plane.normal),
                    distance: plane.distance as f32,
                });

                let first_vertex = self.lumps.vertices.len() as i32;
                let mut points: Vec<DVec3> = polygon.iter().map(|&i| vertices[i]).collect();
                match style {
                    FaceStyle::Exact => {}
                    FaceStyle::Reversed => points.reverse(),
                    FaceStyle::NoVertices => points.clear(),
                }
                self.lumps.vertices.extend(points.iter().map(|&p| to_f32(p)));

                let face_index = self.lumps.faces.len() as i32;
                self.lumps.faces.push(Face {
                    plane: plane_index,
                    first_vertex,
                    num_vertices: points.len() as i32,
                    texture: 0,
                    material: 0,
                    texinfo: 0,
                    flags: 0,
                });
                self.lumps.brush_sides.push(SourceSide {
                    plane: plane_index,
                    face: face_index,
                    bevel: false,
                });
            }
            self.lumps.brushes.push(SourceBrush {
                first_side,
                num_sides: planes.len() as i32,
                contents,
            });
            self.lumps.brushes.len() - 1
        }

        /// Add a leaf listing `brushes` (duplicates allowed). Returns the leaf index.
        pub fn add_leaf(&mut self, brushes: &[usize]) -> usize {
            let first_mark_brush = self.lumps.mark_brushes.len() as i32;
            self.lumps
                .mark_brushes
                .extend(brushes.iter().map(|&b| b as u32));
            self.lumps.leaves.push(Leaf {
                first_mark_brush,
                num_mark_brushes: brushes.len() as i32,
            });
            self.lumps.leaves.len() - 1
        }

        /// Add a model spanning `count` leaves from `first_leaf`. Returns the model index.
        pub fn add_model(&mut self, first_leaf: usize, count: usize) -> usize {
            self.lumps.models.push(Model {
                first_leaf: first_leaf as i32,
                num_leaves: count as i32,
            });
            self.lumps.models.len() - 1
        }

        pub fn build(self) -> BspLumps {
            self.lumps
        }
    }
}
