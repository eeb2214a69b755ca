use std::fmt;

use serde::Serialize;
use unbsp_map::EntityParseError;
use unbsp_map::types::DEFAULT_MATERIAL;

use crate::report::DecompileReport;

/// Which lump a failed lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexKind {
    Model,
    Leaf,
    MarkBrush,
    Brush,
    BrushSide,
    Face,
    Vertex,
    Texture,
    TexInfo,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Model => "model",
            Self::Leaf => "leaf",
            Self::MarkBrush => "mark-brush",
            Self::Brush => "brush",
            Self::BrushSide => "brush side",
            Self::Face => "face",
            Self::Vertex => "vertex",
            Self::Texture => "texture",
            Self::TexInfo => "texinfo",
        };
        f.write_str(name)
    }
}

/// Entity / brush / side identifiers attached to every diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub entity: usize,
    pub brush: Option<usize>,
    pub side: Option<usize>,
}

impl Location {
    pub fn entity(entity: usize) -> Self {
        Self {
            entity,
            brush: None,
            side: None,
        }
    }

    pub fn brush(entity: usize, brush: usize) -> Self {
        Self {
            entity,
            brush: Some(brush),
            side: None,
        }
    }

    pub fn side(entity: usize, brush: usize, side: usize) -> Self {
        Self {
            entity,
            brush: Some(brush),
            side: Some(side),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {}", self.entity)?;
        if let Some(brush) = self.brush {
            write!(f, " brush {brush}")?;
        }
        if let Some(side) = self.side {
            write!(f, " side {side}")?;
        }
        Ok(())
    }
}

/// Everything that can go wrong while decompiling one unit of geometry.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum DecompileError {
    #[error("{at}: plane {plane} does not exist, using default plane")]
    MissingPlane { at: Location, plane: i64 },
    #[error("{at}: material {material} does not exist, using {}", DEFAULT_MATERIAL)]
    MissingMaterial { at: Location, material: i64 },
    #[error("{at}: {reason}")]
    DegenerateSide { at: Location, reason: &'static str },
    #[error("{at}: plane correction left no bounding planes")]
    DegenerateGeometry { at: Location },
    #[error("{at}: {kind} index {index} is out of range")]
    CorruptIndex { at: Location, kind: IndexKind, index: i64 },
}

impl DecompileError {
    pub fn corrupt(at: Location, kind: IndexKind, index: impl TryInto<i64>) -> Self {
        Self::CorruptIndex {
            at,
            kind,
            index: index.try_into().unwrap_or(i64::MAX),
        }
    }

    pub fn location(&self) -> Location {
        match self {
            Self::MissingPlane { at, .. }
            | Self::MissingMaterial { at, .. }
            | Self::DegenerateSide { at, .. }
            | Self::DegenerateGeometry { at }
            | Self::CorruptIndex { at, .. } => *at,
        }
    }
}

/// The only failure that stops a run: the lump data itself is unusable.
#[derive(Debug, thiserror::Error)]
pub enum LumpError {
    #[error("entity lump is missing")]
    MissingEntities,
    #[error("entity lump could not be parsed: {0}")]
    Entities(#[from] EntityParseError),
}

/// Outcome of a lookup with a fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// The referenced record (or an equivalent secondary reference) was found.
    Found(T),
    /// A documented default stands in; the error is kept as a warning.
    Substituted(T, DecompileError),
    /// Nothing usable; the unit is skipped.
    Failed(DecompileError),
}

impl<T> Resolved<T> {
    /// Unwrap into the value, recording the warning or error on `report`.
    pub fn record(self, report: &mut DecompileReport) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Substituted(value, warning) => {
                report.warn(warning);
                Some(value)
            }
            Self::Failed(error) => {
                report.error(error);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_identifiers() {
        let err = DecompileError::MissingPlane {
            at: Location::side(2, 40, 3),
            plane: 9001,
        };
        assert_eq!(
            err.to_string(),
            "entity 2 brush 40 side 3: plane 9001 does not exist, using default plane"
        );

        let err = DecompileError::corrupt(Location::entity(7), IndexKind::Model, 12usize);
        assert_eq!(err.to_string(), "entity 7: model index 12 is out of range");
        assert_eq!(err.location(), Location::entity(7));
    }

    #[test]
    fn substituted_values_are_kept_and_warned() {
        let mut report = DecompileReport::default();
        let warning = DecompileError::MissingMaterial {
            at: Location::side(0, 0, 0),
            material: -1,
        };
        let value = Resolved::Substituted("wld_lightmap", warning.clone()).record(&mut report);
        assert_eq!(value, Some("wld_lightmap"));
        assert_eq!(report.warnings, vec![warning]);
        assert!(report.errors.is_empty());

        let failed: Option<u8> =
            Resolved::Failed(DecompileError::DegenerateGeometry { at: Location::brush(0, 1) }).record(&mut report);
        assert_eq!(failed, None);
        assert_eq!(report.error_count(), 1);
    }
}
