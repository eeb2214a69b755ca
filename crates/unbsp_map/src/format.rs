use std::io::{self, Write};

use bevy::math::DVec3;

use crate::entity::{Entities, Entity};
use crate::types::{ReconstructedBrush, ReconstructedSide, TextureAxis};

/// Consumer of decompiled entities, e.g. a map-file serializer.
pub trait OutputSink {
    type Error;

    fn write_entities(&mut self, entities: &Entities) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum MapWriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Writes entities and their brushes as version 510 `.map` text.
///
/// Side layout:
/// `( p0 ) ( p1 ) ( p2 ) TEXTURE [ u shift ] [ v shift ] rot uscale vscale flags MATERIAL [ lscale lrot ]`
pub struct MapWriter<W: Write> {
    writer: W,
}

impl<W: Write> MapWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_entity(&mut self, index: usize, entity: &Entity) -> io::Result<()> {
        writeln!(self.writer, "{{ // entity {index}")?;
        for (key, value) in entity.attributes() {
            writeln!(self.writer, "\"{key}\" \"{value}\"")?;
        }
        for brush in &entity.brushes {
            self.write_brush(brush)?;
        }
        writeln!(self.writer, "}}")
    }

    fn write_brush(&mut self, brush: &ReconstructedBrush) -> io::Result<()> {
        writeln!(self.writer, "{{ // brush {}", brush.id)?;
        for side in &brush.sides {
            writeln!(self.writer, "{}", side_line(side))?;
        }
        writeln!(self.writer, "}}")
    }
}

impl<W: Write> OutputSink for MapWriter<W> {
    type Error = MapWriteError;

    fn write_entities(&mut self, entities: &Entities) -> Result<(), Self::Error> {
        for (index, entity) in entities.iter().enumerate() {
            self.write_entity(index, entity)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn side_line(side: &ReconstructedSide) -> String {
    let [p0, p1, p2] = side.output_points();
    format!(
        "( {} ) ( {} ) ( {} ) {} {} {} {} {} {} {} {} [ {} {} ]",
        point(p0),
        point(p1),
        point(p2),
        side.texture,
        axis(&side.u_axis),
        axis(&side.v_axis),
        format_number(side.rotation),
        format_number(side.u_axis.scale),
        format_number(side.v_axis.scale),
        side.flags,
        side.material,
        format_number(side.light_scale),
        format_number(side.light_rotation),
    )
}

fn point(p: DVec3) -> String {
    format!("{} {} {}", format_number(p.x), format_number(p.y), format_number(p.z))
}

fn axis(axis: &TextureAxis) -> String {
    format!("[ {} {} ]", point(axis.axis), format_number(axis.shift))
}

/// Round to six decimals and drop trailing zeros, so `63.99999997` prints as `64`.
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    // Avoid printing "-0".
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let text = format!("{rounded:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
