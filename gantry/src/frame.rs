// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use peniko::Color;

use crate::backend::BackendFeatures;
use crate::failure::SynthesizedFailure;
use crate::key::{DrawConfigKey, RasterMode};
use crate::resource::{RenderPaint, RenderPath, SurfaceId};
use crate::{Error, Result};

/// Parameters of one frame, fixed when it begins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameConfig {
    /// Color the target is cleared to, if `do_clear` is set.
    pub clear_color: Color,
    /// Whether to clear before drawing. Without a clear, draws land on the
    /// previous frame's contents.
    pub do_clear: bool,
    /// Composite with atomics instead of raster ordering, even where the
    /// backend supports ordering.
    pub disable_raster_ordering: bool,
    /// Force a compile stage to fail, to exercise the fallback path.
    pub synthesized_failure: SynthesizedFailure,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::TRANSPARENT,
            do_clear: true,
            disable_raster_ordering: false,
            synthesized_failure: SynthesizedFailure::None,
        }
    }
}

/// Where a surface is in its frame lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameState {
    #[default]
    Idle,
    /// A [`Frame`] is live. Dropping it without ending it returns the surface
    /// to `Idle`.
    Begun,
    /// Held only while `end_frame` submits and reads back. `end_frame` returns
    /// with the surface `Idle`, so callers never observe this state.
    Ended,
}

/// Keeps a surface's frame marked live until the [`Frame`] holding it is
/// dropped, whether or not it was ended.
#[derive(Debug)]
pub(crate) struct FrameToken(Arc<AtomicBool>);

impl FrameToken {
    pub(crate) fn acquire(live: &Arc<AtomicBool>) -> Self {
        live.store(true, Ordering::Release);
        Self(Arc::clone(live))
    }
}

impl Drop for FrameToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One recorded draw.
///
/// The paint is captured as it was when the draw was recorded.
#[derive(Clone, Debug)]
pub struct DrawRecord {
    path: RenderPath,
    paint: RenderPaint,
    key: DrawConfigKey,
}

impl DrawRecord {
    pub fn path(&self) -> &RenderPath {
        &self.path
    }

    pub fn paint(&self) -> &RenderPaint {
        &self.paint
    }

    pub fn key(&self) -> DrawConfigKey {
        self.key
    }
}

/// A frame in progress, returned by [`Surface::begin_frame`](crate::Surface::begin_frame)
/// and consumed by [`Surface::end_frame`](crate::Surface::end_frame).
#[derive(Debug)]
pub struct Frame {
    pub(crate) surface: SurfaceId,
    pub(crate) epoch: u64,
    config: FrameConfig,
    raster_mode: RasterMode,
    features: BackendFeatures,
    records: Vec<DrawRecord>,
    _token: FrameToken,
}

impl Frame {
    pub(crate) fn new(
        surface: SurfaceId,
        epoch: u64,
        config: FrameConfig,
        raster_mode: RasterMode,
        features: BackendFeatures,
        token: FrameToken,
    ) -> Self {
        Self {
            surface,
            epoch,
            config,
            raster_mode,
            features,
            records: Vec::new(),
            _token: token,
        }
    }

    /// Record a fill of `path` with `paint`.
    ///
    /// Pipelines are not compiled here; that happens when the frame ends.
    pub fn draw_path(&mut self, path: &RenderPath, paint: &RenderPaint) -> Result<()> {
        if path.surface() != self.surface || paint.surface() != self.surface {
            log::error!("draw_path called with a path or paint from another surface");
            return Err(Error::ForeignResource);
        }
        self.records.push(DrawRecord {
            path: path.clone(),
            paint: paint.clone(),
            key: DrawConfigKey::for_draw(path, paint, self.raster_mode, self.features),
        });
        Ok(())
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn raster_mode(&self) -> RasterMode {
        self.raster_mode
    }

    /// Draws recorded so far, in call order.
    pub fn records(&self) -> &[DrawRecord] {
        &self.records
    }

    pub(crate) fn into_records(self) -> Vec<DrawRecord> {
        self.records
    }
}

/// How the draws of a completed frame were rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Draws rendered with their own specialized pipeline.
    pub specific_draws: usize,
    /// Draws rendered with the uber pipeline.
    pub uber_draws: usize,
    /// Draws skipped because no pipeline could render them.
    pub dropped_draws: usize,
}

impl FrameReport {
    pub fn total_draws(&self) -> usize {
        self.specific_draws + self.uber_draws + self.dropped_draws
    }
}
