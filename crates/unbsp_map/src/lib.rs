pub mod entity;
pub mod format;
pub mod types;

// Re-export core types for consumer convenience
pub use entity::{Entities, Entity, EntityParseError, parse_vector};
pub use format::{MapWriteError, MapWriter, OutputSink};
pub use types::{CorrectionState, ReconstructedBrush, ReconstructedSide, TextureAxis};

// Re-export geometry crate
pub use unbsp_geometry;
