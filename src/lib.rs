//! Brush decompiler for compiled BSP levels.
//!
//! Reads decoded lumps through [`LumpSource`], rebuilds every brush-based entity's brushes with
//! consistent three-point planes and editor-space texture axes, and hands back the entity list
//! ready for a map writer.

pub mod config;
pub mod correct;
pub mod error;
pub mod lumps;
pub mod reconstruct;
pub mod report;
pub mod side;

pub use config::DecompileConfig;
pub use correct::{PlaneConsistencyCorrector, SideClass};
pub use error::{DecompileError, IndexKind, Location, LumpError, Resolved};
pub use lumps::{BspLumps, LumpSource};
pub use reconstruct::BrushReconstructor;
pub use report::{DecompileReport, NullReporter, ProgressReporter, TracingReporter};
pub use side::{SideContext, SideGeometryResolver, invert_texture_axis};

pub use unbsp_map;
use unbsp_map::Entities;

/// Result of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct Decompiled {
    /// Every entity from the entity lump, brush-based ones with their brushes attached.
    pub entities: Entities,
    pub report: DecompileReport,
}

/// Decompile all entities. Only unusable entity data stops the run; everything else ends up
/// in the report.
pub fn decompile<L: LumpSource + ?Sized>(
    lumps: &L,
    config: &DecompileConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Decompiled, LumpError> {
    let mut entities = lumps.entities()?;
    let report = BrushReconstructor::new(lumps, config, reporter).run(&mut entities);
    report.log_summary();
    Ok(Decompiled { entities, report })
}
