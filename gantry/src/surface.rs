// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::{Backend, BackendKind, Capabilities};
use crate::failure::FailureInjector;
use crate::frame::{Frame, FrameConfig, FrameReport, FrameState, FrameToken};
use crate::key::RasterMode;
use crate::pipeline::{PipelineCache, Resolution};
use crate::recording::{DrawCommand, Recording};
use crate::resource::{Factory, SurfaceId};
use crate::{Error, Result};

/// Options which are set at surface creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub backend: BackendKind,
    pub width: u32,
    pub height: u32,
    /// Always composite with atomics, as if every frame disabled raster ordering.
    pub force_atomic: bool,
    /// Compile the uber pipeline when the surface is created rather than at
    /// the first fallback.
    pub eager_uber: bool,
}

impl SurfaceOptions {
    pub fn new(backend: BackendKind, width: u32, height: u32) -> Self {
        Self {
            backend,
            width,
            height,
            force_atomic: false,
            eager_uber: false,
        }
    }
}

/// A render target on one backend instance.
///
/// The surface owns the backend, its pipeline cache, and the factory for
/// resources drawn to it. At most one [`Frame`] is open at a time.
pub struct Surface {
    id: SurfaceId,
    backend: Box<dyn Backend>,
    factory: Factory,
    pipelines: PipelineCache,
    state: FrameState,
    /// Set while the frame handed out by `begin_frame` is alive.
    frame_live: Arc<AtomicBool>,
    /// Incremented by every `begin_frame`, so stale frames can be detected.
    epoch: u64,
    force_atomic: bool,
}

static_assertions::assert_impl_all!(Surface: Send);

fn check_dimensions(caps: &Capabilities, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > caps.max_dimension || height > caps.max_dimension {
        log::error!("invalid surface dimensions {width}x{height}");
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

impl Surface {
    /// Creates a new surface and its backend.
    pub fn new(options: SurfaceOptions) -> Result<Self> {
        let caps = options.backend.capabilities();
        check_dimensions(&caps, options.width, options.height)?;
        let id = SurfaceId::next();
        let mut backend = options.backend.create(options.width, options.height);
        let mut pipelines = PipelineCache::new();
        if options.eager_uber
            && !pipelines.precompile_uber(backend.as_mut(), FailureInjector::default())
        {
            log::warn!("uber pipeline failed to compile on {}", options.backend);
        }
        log::info!(
            "created {} surface {}x{}",
            options.backend,
            options.width,
            options.height
        );
        Ok(Self {
            id,
            factory: Factory::new(id, caps.max_path_elements),
            backend,
            pipelines,
            state: FrameState::Idle,
            frame_live: Arc::new(AtomicBool::new(false)),
            epoch: 0,
            force_atomic: options.force_atomic,
        })
    }

    /// Resize the render target. Contents are unspecified until the next
    /// cleared frame.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.reclaim_abandoned_frame();
        if self.state != FrameState::Idle {
            log::error!("resize called while a frame is in progress");
            return Err(Error::ResizeDuringFrame);
        }
        check_dimensions(self.backend.capabilities(), width, height)?;
        if self.backend.size() != (width, height) {
            log::info!("resizing {} surface to {width}x{height}", self.backend.kind());
        }
        self.backend.resize(width, height);
        Ok(())
    }

    /// The factory for paths and paints drawn to this surface.
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Open a frame. Fails if one is already open.
    pub fn begin_frame(&mut self, config: FrameConfig) -> Result<Frame> {
        self.reclaim_abandoned_frame();
        if self.state != FrameState::Idle {
            log::error!("begin_frame called while a frame is in progress");
            return Err(Error::FrameAlreadyBegun);
        }
        self.epoch += 1;
        self.state = FrameState::Begun;
        let caps = self.backend.capabilities();
        let wants_atomic =
            config.disable_raster_ordering || self.force_atomic || !caps.features.raster_ordering;
        let raster_mode = if wants_atomic && caps.features.fragment_atomics {
            RasterMode::Atomic
        } else {
            RasterMode::Ordered
        };
        Ok(Frame::new(
            self.id,
            self.epoch,
            config,
            raster_mode,
            caps.features,
            FrameToken::acquire(&self.frame_live),
        ))
    }

    /// Return to `Idle` if the open frame was dropped without being ended.
    fn reclaim_abandoned_frame(&mut self) {
        if self.state == FrameState::Begun && !self.frame_live.load(Ordering::Acquire) {
            log::warn!("frame {} was dropped without end_frame", self.epoch);
            self.state = FrameState::Idle;
        }
    }

    /// Submit `frame`, wait for it to complete, and optionally read the target
    /// back into `pixels` as unpremultiplied RGBA8 rows, top to bottom.
    ///
    /// Pipelines are resolved here. A draw whose pipelines all failed is
    /// dropped and counted in the returned report; the frame still completes.
    pub fn end_frame(
        &mut self,
        frame: Frame,
        pixels: Option<&mut Vec<u8>>,
    ) -> Result<FrameReport> {
        let current = frame.surface == self.id && frame.epoch == self.epoch;
        if self.state != FrameState::Begun || !current {
            log::error!("end_frame called with a frame that is not in progress on this surface");
            return Err(Error::FrameMismatch);
        }
        self.state = FrameState::Ended;
        let raster_mode = frame.raster_mode();
        let config = *frame.config();
        let records = frame.into_records();
        let injector = FailureInjector::new(config.synthesized_failure);

        let mut recording = Recording::default();
        if config.do_clear {
            recording.clear(config.clear_color);
        }
        let mut report = FrameReport::default();
        for record in records {
            let resolution = self.pipelines.resolve(self.backend.as_mut(), record.key(), injector);
            let pipeline = match resolution {
                Resolution::Specific(handle) => {
                    report.specific_draws += 1;
                    handle
                }
                Resolution::Uber(handle) => {
                    report.uber_draws += 1;
                    handle
                }
                Resolution::Dropped => {
                    report.dropped_draws += 1;
                    continue;
                }
            };
            recording.draw(DrawCommand {
                pipeline,
                path: record.path().clone(),
                paint: record.paint().clone(),
                raster_mode,
            });
        }
        self.backend.run_recording(&recording);
        let readback = match pixels {
            Some(out) => self.backend.read_pixels(out),
            None => Ok(()),
        };
        self.state = FrameState::Idle;
        log::debug!("frame {} complete: {report:?}", self.epoch);
        readback.map(|()| report)
    }

    pub fn frame_state(&self) -> FrameState {
        match self.state {
            FrameState::Begun if !self.frame_live.load(Ordering::Acquire) => FrameState::Idle,
            state => state,
        }
    }

    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.backend.capabilities()
    }

    pub fn size(&self) -> (u32, u32) {
        self.backend.size()
    }
}
