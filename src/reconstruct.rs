//! Entity → model → leaf → mark-brush → brush traversal.

use std::ops::Range;

use bevy::math::DVec3;
use rayon::prelude::*;
use tracing::debug;
use unbsp_map::{CorrectionState, Entities, Entity, ReconstructedBrush};

use crate::config::DecompileConfig;
use crate::correct::PlaneConsistencyCorrector;
use crate::error::{DecompileError, IndexKind, Location};
use crate::lumps::{CONTENTS_DETAIL, CONTENTS_WATER, LumpSource, Model, index_range};
use crate::report::{DecompileReport, Progress, ProgressReporter};
use crate::side::{SideContext, SideGeometryResolver};

/// Brushes decompiled for one entity, before they are attached anywhere.
#[derive(Debug, Default)]
struct EntityBrushes {
    brushes: Vec<ReconstructedBrush>,
    /// The entity's model was traversed; its `model` attribute can go.
    traversed: bool,
    report: DecompileReport,
}

pub struct BrushReconstructor<'a, L: LumpSource + ?Sized> {
    lumps: &'a L,
    config: &'a DecompileConfig,
    reporter: &'a dyn ProgressReporter,
    corrector: PlaneConsistencyCorrector,
}

impl<'a, L: LumpSource + ?Sized> BrushReconstructor<'a, L> {
    pub fn new(lumps: &'a L, config: &'a DecompileConfig, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            lumps,
            config,
            reporter,
            corrector: PlaneConsistencyCorrector::from_config(config),
        }
    }

    /// Decompile every brush-based entity and attach the brushes to their owners (or to entity 0
    /// when merging to world).
    pub fn run(&self, entities: &mut Entities) -> DecompileReport {
        let progress = Progress::new(self.lumps.brush_count() + entities.len(), self.reporter);

        let shared: &Entities = entities;
        let results: Vec<EntityBrushes> = if self.config.parallel {
            (0..shared.len())
                .into_par_iter()
                .map(|index| self.entity_brushes(index, shared.get(index), &progress))
                .collect()
        } else {
            (0..shared.len())
                .map(|index| self.entity_brushes(index, shared.get(index), &progress))
                .collect()
        };

        let mut report = DecompileReport::default();
        for (index, result) in results.into_iter().enumerate() {
            report.merge(result.report);
            if result.traversed {
                if let Some(entity) = entities.get_mut(index) {
                    entity.remove_attribute("model");
                }
            }

            let target = if self.config.brushes_to_world { 0 } else { index };
            let Some(owner) = entities.get_mut(target) else {
                continue;
            };
            for mut brush in result.brushes {
                if self.config.brushes_to_world {
                    brush.water = false;
                }
                brush.entity = target;
                owner.brushes.push(brush);
            }
        }
        report
    }

    fn entity_brushes(&self, index: usize, entity: Option<&Entity>, progress: &Progress<'_>) -> EntityBrushes {
        let mut result = EntityBrushes::default();
        if let Some(entity) = entity {
            self.traverse_entity(index, entity, progress, &mut result);
        }
        result.report.entities_processed += 1;
        progress.advance();
        result
    }

    fn traverse_entity(&self, index: usize, entity: &Entity, progress: &Progress<'_>, result: &mut EntityBrushes) {
        let model_number = entity.model_number();
        let Ok(model_index) = usize::try_from(model_number) else {
            return;
        };
        let at = Location::entity(index);
        let Some(model) = self.lumps.model(model_index) else {
            result.report.error(DecompileError::corrupt(at, IndexKind::Model, model_index));
            return;
        };
        result.traversed = true;

        let origin = entity.origin();
        let water = entity.classname().eq_ignore_ascii_case("func_water");
        let mut used = vec![false; self.lumps.brush_count()];

        for brush_index in self.model_brushes(model, at) {
            let brush_index = match brush_index {
                Ok(brush_index) => brush_index,
                Err(err) => {
                    result.report.error(err);
                    continue;
                }
            };
            let Some(seen) = used.get_mut(brush_index) else {
                result.report.error(DecompileError::corrupt(at, IndexKind::Brush, brush_index));
                continue;
            };
            if std::mem::replace(seen, true) {
                continue;
            }

            if let Some(brush) = self.build_brush(brush_index, index, origin, water, &mut result.report) {
                result.brushes.push(brush);
            }
            progress.advance();
        }
    }

    /// Brush indices referenced by every leaf of `model`, in leaf order and with repeats. A leaf
    /// or mark-brush range that runs past its lump yields one error for the whole unit.
    fn model_brushes(&self, model: Model, at: Location) -> impl Iterator<Item = Result<usize, DecompileError>> + '_ {
        let leaves = index_range(model.first_leaf, model.num_leaves, self.lumps.leaf_count())
            .ok_or_else(|| DecompileError::corrupt(at, IndexKind::Leaf, model.first_leaf));

        split_range(leaves).flat_map(move |leaf| self.leaf_brushes(leaf, at))
    }

    fn leaf_brushes(
        &self,
        leaf: Result<usize, DecompileError>,
        at: Location,
    ) -> impl Iterator<Item = Result<usize, DecompileError>> + '_ {
        let slots = leaf.and_then(|leaf_index| {
            let leaf = self
                .lumps
                .leaf(leaf_index)
                .ok_or_else(|| DecompileError::corrupt(at, IndexKind::Leaf, leaf_index))?;
            index_range(leaf.first_mark_brush, leaf.num_mark_brushes, self.lumps.mark_brush_count())
                .ok_or_else(|| DecompileError::corrupt(at, IndexKind::MarkBrush, leaf.first_mark_brush))
        });

        split_range(slots).map(move |slot| {
            let slot = slot?;
            self.lumps
                .mark_brush(slot)
                .ok_or_else(|| DecompileError::corrupt(at, IndexKind::MarkBrush, slot))
        })
    }

    fn build_brush(
        &self,
        brush_index: usize,
        entity: usize,
        origin: DVec3,
        water_entity: bool,
        report: &mut DecompileReport,
    ) -> Option<ReconstructedBrush> {
        let at = Location::brush(entity, brush_index);
        let Some(source) = self.lumps.brush(brush_index) else {
            report.error(DecompileError::corrupt(at, IndexKind::Brush, brush_index));
            return None;
        };
        let Some(sides) = index_range(source.first_side, source.num_sides, self.lumps.brush_side_count()) else {
            report.error(DecompileError::corrupt(at, IndexKind::BrushSide, source.first_side));
            return None;
        };

        let mut brush = ReconstructedBrush::new(entity, brush_index);
        brush.detail = self.config.detect_detail && source.contents & CONTENTS_DETAIL != 0;
        brush.water = water_entity || source.contents & CONTENTS_WATER != 0;

        let ctx = SideContext {
            entity,
            brush: brush_index,
            origin,
        };
        let resolver = SideGeometryResolver::new(self.lumps, self.config);
        brush.sides = sides
            .filter_map(|side| resolver.resolve(side, &ctx, report))
            .collect();

        if brush.sides.is_empty() {
            debug!("{at}: every side was discarded, dropping brush");
            report.empty_brushes += 1;
            return None;
        }

        if self.config.correct_planes {
            match self.corrector.correct(&mut brush) {
                Ok(state) => report.record_state(state),
                Err(err) => {
                    report.record_state(CorrectionState::Failed);
                    report.error(err);
                    return None;
                }
            }
        }
        if self.config.calculate_vertices {
            for warning in self.corrector.compute_vertices(&mut brush) {
                report.warn(warning);
            }
        }

        report.brushes_emitted += 1;
        Some(brush)
    }
}

/// Either every index in the range, or the single error explaining why there is none.
fn split_range(range: Result<Range<usize>, DecompileError>) -> impl Iterator<Item = Result<usize, DecompileError>> {
    let (error, indices) = match range {
        Ok(range) => (None, range),
        Err(err) => (Some(err), 0..0),
    };
    error.map(Err).into_iter().chain(indices.map(Ok))
}
