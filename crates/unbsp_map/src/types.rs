use bevy::math::DVec3;

pub use unbsp_geometry::Plane;

/// Material used when a face references one that does not exist.
pub const DEFAULT_MATERIAL: &str = "wld_lightmap";
/// No-draw texture substituted for null-replacement candidates.
pub const NULL_TEXTURE: &str = "special/null";
/// Texture name substituted for an out-of-range texture index.
pub const MISSING_TEXTURE: &str = "**missingtexture**";
pub const TRIGGER_TEXTURE: &str = "special/trigger";
pub const CLIP_TEXTURES: [&str; 3] = ["special/clip", "special/playerclip", "special/enemyclip"];

/// Light-map scale and rotation are consumed by the light compiler and never stored.
pub const DEFAULT_LIGHT_SCALE: f64 = 16.0;
pub const DEFAULT_LIGHT_ROTATION: f64 = 0.0;

pub fn is_clip_texture(name: &str) -> bool {
    CLIP_TEXTURES.iter().any(|clip| clip.eq_ignore_ascii_case(name))
}

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// One editor-space texture axis: unit direction, shift in texels and world units per texel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureAxis {
    pub axis: DVec3,
    pub shift: f64,
    pub scale: f64,
}

impl Default for TextureAxis {
    fn default() -> Self {
        Self {
            axis: DVec3::X,
            shift: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReconstructedSide {
    pub plane: Plane,
    /// Three-point form, if one could be derived. Plane-only sides are `None`.
    pub points: Option<[DVec3; 3]>,
    /// Full clockwise polygon, filled in by vertex computation.
    pub polygon: Vec<DVec3>,
    pub texture: String,
    pub material: String,
    pub u_axis: TextureAxis,
    pub v_axis: TextureAxis,
    /// Folded into the axes by the compiler; always 0 here.
    pub rotation: f64,
    pub flags: u32,
    pub light_scale: f64,
    pub light_rotation: f64,
    /// Id of the owning brush.
    pub brush: usize,
}

impl ReconstructedSide {
    /// A plane-only side with default texturing.
    pub fn from_plane(plane: Plane, brush: usize) -> Self {
        Self {
            plane,
            points: None,
            polygon: Vec::new(),
            texture: String::new(),
            material: DEFAULT_MATERIAL.to_string(),
            u_axis: TextureAxis::default(),
            v_axis: TextureAxis {
                axis: DVec3::NEG_Y,
                ..TextureAxis::default()
            },
            rotation: 0.0,
            flags: 0,
            light_scale: DEFAULT_LIGHT_SCALE,
            light_rotation: DEFAULT_LIGHT_ROTATION,
            brush,
        }
    }

    /// The points an output format should write: the stored triangle, or one generated from
    /// the plane for plane-only sides.
    pub fn output_points(&self) -> [DVec3; 3] {
        self.points.unwrap_or_else(|| self.plane.three_points())
    }

    /// Reverse the winding of the three-point form.
    pub fn flip_winding(&mut self) {
        if let Some(points) = &mut self.points {
            points.swap(1, 2);
        }
    }
}

// ---------------------------------------------------------------------------
// Brushes
// ---------------------------------------------------------------------------

/// Where a brush is in plane-consistency correction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CorrectionState {
    #[default]
    Unprocessed,
    Classified,
    /// Every side already agreed with its plane.
    Accepted,
    /// Some sides were re-wound to match their planes.
    SimpleCorrected,
    /// No side was trustworthy; rebuilt from the half-space intersection.
    AdvancedCorrected,
    /// No bounding plane survived; the brush is dropped.
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconstructedBrush {
    pub sides: Vec<ReconstructedSide>,
    pub detail: bool,
    pub water: bool,
    /// Index of the owning entity.
    pub entity: usize,
    /// Index of the source brush this was decompiled from.
    pub id: usize,
    pub state: CorrectionState,
}

impl ReconstructedBrush {
    pub fn new(entity: usize, id: usize) -> Self {
        Self {
            entity,
            id,
            ..Default::default()
        }
    }

    pub fn planes(&self) -> Vec<Plane> {
        self.sides.iter().map(|side| side.plane).collect()
    }
}
