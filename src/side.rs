//! Per-side reconstruction: plane, three-point form, texture projection and material.

use bevy::math::DVec3;
use tracing::debug;
use unbsp_map::{ReconstructedSide, TextureAxis};
use unbsp_map::types::{DEFAULT_MATERIAL, MISSING_TEXTURE, NULL_TEXTURE, Plane, TRIGGER_TEXTURE, is_clip_texture};
use unbsp_map::unbsp_geometry::{face_triangle, texture_axes_from_plane};

use crate::config::DecompileConfig;
use crate::error::{DecompileError, IndexKind, Location, Resolved};
use crate::lumps::{Face, LumpSource, SURF_COMPILER_ONLY, SURF_NULL_CANDIDATE, SourceSide, TexInfo, index_range, signed};
use crate::report::DecompileReport;

/// What a side needs to know about the brush and entity it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideContext {
    pub entity: usize,
    pub brush: usize,
    /// Origin of the owning entity; compiled texture shifts include it.
    pub origin: DVec3,
}

impl SideContext {
    fn at(&self, side: usize) -> Location {
        Location::side(self.entity, self.brush, side)
    }
}

pub struct SideGeometryResolver<'a, L: LumpSource + ?Sized> {
    lumps: &'a L,
    config: &'a DecompileConfig,
}

impl<'a, L: LumpSource + ?Sized> SideGeometryResolver<'a, L> {
    pub fn new(lumps: &'a L, config: &'a DecompileConfig) -> Self {
        Self { lumps, config }
    }

    /// Reconstruct brush side `side_index`. Returns `None` if the side is discarded (compiler
    /// only, bevel) or cannot be read at all.
    pub fn resolve(&self, side_index: usize, ctx: &SideContext, report: &mut DecompileReport) -> Option<ReconstructedSide> {
        let at = ctx.at(side_index);
        let source = match self.lumps.brush_side(side_index) {
            Some(source) => Resolved::Found(source),
            None => Resolved::Failed(DecompileError::corrupt(at, IndexKind::BrushSide, side_index)),
        }
        .record(report)?;
        if source.bevel {
            debug!("{at}: bevel side discarded");
            report.discarded_sides += 1;
            return None;
        }

        let face = match signed(source.face, |i| self.lumps.face(i)) {
            Some(face) => Some(face),
            None => {
                report.warn(DecompileError::corrupt(at, IndexKind::Face, source.face));
                None
            }
        };
        let flags = face.map_or(0, |face| face.flags);
        if flags & SURF_COMPILER_ONLY != 0 {
            debug!("{at}: compiler-only face discarded");
            report.discarded_sides += 1;
            return None;
        }

        let plane = resolve_plane(self.lumps, &source, face.as_ref(), at).record(report)?;
        let mut side = ReconstructedSide::from_plane(plane, ctx.brush);
        side.flags = flags;

        let Some(face) = face else {
            side.texture = MISSING_TEXTURE.to_string();
            self.apply_texture_axes(&mut side, None, ctx.origin, at, report);
            return Some(side);
        };

        side.texture = match signed(face.texture, |i| self.lumps.texture(i)) {
            Some(texture) => texture.to_string(),
            None => {
                report.warn(DecompileError::corrupt(at, IndexKind::Texture, face.texture));
                MISSING_TEXTURE.to_string()
            }
        };
        self.gate_texture(&mut side, report);

        if self.config.use_face_vertices {
            side.points = self.face_points(&face, at, report);
        }

        let tex_info = match signed(face.texinfo, |i| self.lumps.tex_info(i)) {
            Some(tex_info) => Some(tex_info),
            None => {
                report.warn(DecompileError::corrupt(at, IndexKind::TexInfo, face.texinfo));
                None
            }
        };
        self.apply_texture_axes(&mut side, tex_info, ctx.origin, at, report);

        if let Some(material) = resolve_material(self.lumps, &face, at).record(report) {
            side.material = material;
        }

        if self.config.strip_face_flags {
            side.flags = 0;
        }
        Some(side)
    }

    /// Clip statistics and null-texture replacement.
    fn gate_texture(&self, side: &mut ReconstructedSide, report: &mut DecompileReport) {
        let clip = is_clip_texture(&side.texture);
        if clip {
            if self.config.count_clip_sides {
                report.clip_sides += 1;
            }
        } else {
            report.real_faces += 1;
        }

        if self.config.replace_with_null
            && side.flags & SURF_NULL_CANDIDATE != 0
            && !clip
            && !side.texture.eq_ignore_ascii_case(TRIGGER_TEXTURE)
        {
            side.texture = NULL_TEXTURE.to_string();
            side.flags = 0;
        }
    }

    /// First valid triangle of the face's own winding, if it has one.
    fn face_points(&self, face: &Face, at: Location, report: &mut DecompileReport) -> Option<[DVec3; 3]> {
        let Some(range) = index_range(face.first_vertex, face.num_vertices, self.lumps.vertex_count()) else {
            report.warn(DecompileError::corrupt(at, IndexKind::Vertex, face.first_vertex));
            return None;
        };
        let Some(points) = range.map(|index| self.lumps.vertex(index)).collect::<Option<Vec<DVec3>>>() else {
            report.warn(DecompileError::corrupt(at, IndexKind::Vertex, face.first_vertex));
            return None;
        };
        if points.is_empty() {
            return None;
        }

        let triangle = face_triangle(&points, self.config.epsilon);
        if triangle.is_none() {
            report.warn(DecompileError::DegenerateSide {
                at,
                reason: "face vertices are collinear or repeated",
            });
        }
        triangle
    }

    fn apply_texture_axes(
        &self,
        side: &mut ReconstructedSide,
        tex_info: Option<TexInfo>,
        origin: DVec3,
        at: Location,
        report: &mut DecompileReport,
    ) {
        let inverted = tex_info.and_then(|info| {
            let s = invert_texture_axis(vec3(info.s_axis), f64::from(info.s_shift), origin);
            let t = invert_texture_axis(vec3(info.t_axis), f64::from(info.t_shift), origin);
            if s.is_none() || t.is_none() {
                report.warn(DecompileError::DegenerateSide {
                    at,
                    reason: "texture axis has zero length, using base axes",
                });
            }
            s.zip(t)
        });

        let (u, v) = inverted.unwrap_or_else(|| {
            let (u, v) = texture_axes_from_plane(side.plane.normal);
            (
                TextureAxis { axis: u, ..TextureAxis::default() },
                TextureAxis { axis: v, ..TextureAxis::default() },
            )
        });
        side.u_axis = u;
        side.v_axis = v;
    }
}

fn vec3(v: [f32; 3]) -> DVec3 {
    DVec3::from(v.map(f64::from))
}

/// The side's own plane, then its face's plane, then the default `+X` plane.
fn resolve_plane<L: LumpSource + ?Sized>(lumps: &L, side: &SourceSide, face: Option<&Face>, at: Location) -> Resolved<Plane> {
    if let Some(plane) = signed(side.plane, |i| lumps.plane(i)) {
        return Resolved::Found(plane);
    }
    if let Some(plane) = face.and_then(|face| signed(face.plane, |i| lumps.plane(i))) {
        debug!("{at}: plane {} out of range, using the face's plane", side.plane);
        return Resolved::Found(plane);
    }
    Resolved::Substituted(
        Plane::default(),
        DecompileError::MissingPlane {
            at,
            plane: side.plane.into(),
        },
    )
}

fn resolve_material<L: LumpSource + ?Sized>(lumps: &L, face: &Face, at: Location) -> Resolved<String> {
    match signed(face.material, |i| lumps.material(i)) {
        Some(material) => Resolved::Found(material.to_string()),
        None => Resolved::Substituted(
            DEFAULT_MATERIAL.to_string(),
            DecompileError::MissingMaterial {
                at,
                material: face.material.into(),
            },
        ),
    }
}

/// Undo the compiler's folding of scale and entity origin into one texinfo axis.
///
/// The compiled axis is `direction / scale` and its shift is `shift + (direction · origin) / scale`.
/// Returns `None` for a zero-length axis.
pub fn invert_texture_axis(axis: DVec3, shift: f64, origin: DVec3) -> Option<TextureAxis> {
    let length = axis.length();
    if !length.is_finite() || length <= f64::EPSILON {
        return None;
    }
    let scale = 1.0 / length;
    let direction = axis / length;
    let origin_shift = direction.dot(origin) / scale;
    Some(TextureAxis {
        axis: direction,
        shift: shift - origin_shift,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lumps::BspLumps;
    use crate::lumps::fixtures::{FaceStyle, LumpBuilder, WORLD, box_planes};

    fn ctx() -> SideContext {
        SideContext {
            entity: 0,
            brush: 0,
            origin: DVec3::ZERO,
        }
    }

    fn box_lumps(style: FaceStyle) -> BspLumps {
        let mut builder = LumpBuilder::new(WORLD);
        builder.add_brush(&box_planes(DVec3::splat(-16.0), DVec3::splat(16.0)), style, 0);
        builder.build()
    }

    #[test]
    fn inverts_scaled_axis_with_origin() {
        let axis = invert_texture_axis(DVec3::new(2.0, 0.0, 0.0), 10.0, DVec3::new(5.0, 0.0, 0.0)).unwrap();
        assert_eq!(axis.axis, DVec3::X);
        assert!((axis.scale - 0.5).abs() < 1e-12);
        assert!(axis.shift.abs() < 1e-12);
    }

    #[test]
    fn zero_axis_is_rejected() {
        assert!(invert_texture_axis(DVec3::ZERO, 3.0, DVec3::ZERO).is_none());
    }

    #[test]
    fn exact_face_gives_consistent_triangle() {
        let lumps = box_lumps(FaceStyle::Exact);
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        let normal = Plane::from_points(&side.points.unwrap()).unwrap().normal;
        assert!(normal.dot(side.plane.normal) > 0.999);
        assert_eq!(side.texture, "wall");
        assert_eq!(side.material, "wld_concrete");
        assert_eq!(side.light_scale, 16.0);
        assert_eq!(report.real_faces, 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn face_without_vertices_is_plane_only() {
        let lumps = box_lumps(FaceStyle::NoVertices);
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(2, &ctx(), &mut report).unwrap();
        assert_eq!(side.plane, Plane::new(DVec3::Y, 16.0));
        assert_eq!(side.points, None);
        assert!(report.warnings.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn compiler_only_faces_are_discarded() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.faces[0].flags = SURF_COMPILER_ONLY;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        assert!(resolver.resolve(0, &ctx(), &mut report).is_none());
        assert_eq!(report.discarded_sides, 1);
    }

    #[test]
    fn null_candidates_are_replaced_when_enabled() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.faces[0].flags = SURF_NULL_CANDIDATE;
        let config = DecompileConfig {
            replace_with_null: true,
            ..Default::default()
        };
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        assert_eq!(side.texture, NULL_TEXTURE);
        assert_eq!(side.flags, 0);
    }

    #[test]
    fn clip_sides_are_counted_apart() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.textures[0] = "special/PlayerClip".to_string();
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        assert_eq!(side.texture, "special/PlayerClip");
        assert_eq!(report.clip_sides, 1);
        assert_eq!(report.real_faces, 0);
    }

    #[test]
    fn plane_falls_back_to_face_then_default() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.brush_sides[0].plane = 999;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        assert_eq!(side.plane, Plane::new(DVec3::X, 16.0));
        assert!(report.warnings.is_empty());

        lumps.faces[0].plane = -1;
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        assert_eq!(side.plane, Plane::default());
        assert!(matches!(
            report.warnings.as_slice(),
            [DecompileError::MissingPlane { plane: 999, .. }]
        ));
    }

    #[test]
    fn missing_material_and_texinfo_use_defaults() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.faces[4].material = 7;
        lumps.faces[4].texinfo = 7;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(4, &ctx(), &mut report).unwrap();
        assert_eq!(side.material, DEFAULT_MATERIAL);
        assert_eq!(side.u_axis.axis, DVec3::X);
        assert_eq!(side.v_axis.axis, DVec3::NEG_Y);
        assert_eq!(report.warning_count(), 2);
    }

    #[test]
    fn collinear_vertices_warn_and_leave_plane_only() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        let first = lumps.faces[0].first_vertex as usize;
        lumps.vertices[first + 2] = lumps.vertices[first + 1];
        lumps.vertices[first + 3] = lumps.vertices[first];
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        assert_eq!(side.points, None);
        assert!(matches!(report.warnings.as_slice(), [DecompileError::DegenerateSide { .. }]));
    }

    #[test]
    fn strip_face_flags_zeroes_flags() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.faces[0].flags = 0x40;
        let config = DecompileConfig {
            strip_face_flags: true,
            ..Default::default()
        };
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        assert_eq!(resolver.resolve(0, &ctx(), &mut report).unwrap().flags, 0);
    }

    #[test]
    fn bevel_sides_are_discarded() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.brush_sides[3].bevel = true;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        assert!(resolver.resolve(3, &ctx(), &mut report).is_none());
        assert_eq!(report.discarded_sides, 1);
        assert_eq!(report.real_faces, 0);
    }

    #[test]
    fn unreadable_side_is_an_error() {
        let lumps = box_lumps(FaceStyle::Exact);
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        assert!(resolver.resolve(60, &ctx(), &mut report).is_none());
        assert!(matches!(
            report.errors.as_slice(),
            [DecompileError::CorruptIndex { kind: IndexKind::BrushSide, index: 60, .. }]
        ));
    }

    #[test]
    fn missing_face_keeps_plane_with_placeholder_texture() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.brush_sides[4].face = 500;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(4, &ctx(), &mut report).unwrap();
        assert_eq!(side.plane, Plane::new(DVec3::Z, 16.0));
        assert_eq!(side.texture, MISSING_TEXTURE);
        assert_eq!(side.material, DEFAULT_MATERIAL);
        assert_eq!(side.points, None);
        let (u, v) = texture_axes_from_plane(DVec3::Z);
        assert_eq!((side.u_axis.axis, side.v_axis.axis), (u, v));
        assert_eq!(side.u_axis.shift, 0.0);
        assert!(matches!(
            report.warnings.as_slice(),
            [DecompileError::CorruptIndex { kind: IndexKind::Face, index: 500, .. }]
        ));
    }

    #[test]
    fn out_of_range_texture_uses_placeholder() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.faces[1].texture = 3;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(1, &ctx(), &mut report).unwrap();
        assert_eq!(side.texture, MISSING_TEXTURE);
        assert!(side.points.is_some());
        assert!(matches!(
            report.warnings.as_slice(),
            [DecompileError::CorruptIndex { kind: IndexKind::Texture, index: 3, .. }]
        ));
    }

    #[test]
    fn zero_length_texinfo_axis_uses_base_axes() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.tex_infos[0].s_axis = [0.0; 3];
        lumps.tex_infos[0].s_shift = 12.0;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        // +X wall: base axes are Y and -Z.
        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        assert_eq!(side.u_axis.axis, DVec3::Y);
        assert_eq!(side.v_axis.axis, DVec3::NEG_Z);
        assert_eq!(side.u_axis.shift, 0.0);
        assert_eq!(side.u_axis.scale, 1.0);
        assert!(matches!(report.warnings.as_slice(), [DecompileError::DegenerateSide { .. }]));
    }

    #[test]
    fn huge_vertex_count_is_one_warning() {
        let mut lumps = box_lumps(FaceStyle::Exact);
        lumps.faces[0].num_vertices = i32::MAX;
        let config = DecompileConfig::default();
        let resolver = SideGeometryResolver::new(&lumps, &config);
        let mut report = DecompileReport::default();

        let side = resolver.resolve(0, &ctx(), &mut report).unwrap();
        assert_eq!(side.points, None);
        assert_eq!(side.plane, Plane::new(DVec3::X, 16.0));
        assert!(matches!(
            report.warnings.as_slice(),
            [DecompileError::CorruptIndex { kind: IndexKind::Vertex, .. }]
        ));
    }
}
