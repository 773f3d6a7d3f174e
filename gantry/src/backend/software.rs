// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A backend that executes pipelines on the CPU, configured by a
//! [`Capabilities`] profile.

use std::sync::atomic::{AtomicU32, Ordering};

use gantry_shaders::{CompiledShader, Stage};
use rayon::prelude::*;
use smallvec::SmallVec;

use super::{
    Backend, BackendKind, Capabilities, CompileError, PipelineDescriptor, PipelineHandle,
    ShaderHandle,
};
use crate::key::RasterMode;
use crate::raster::{blend, unpremultiply, Coverage};
use crate::recording::{Command, DrawCommand, Recording};
use crate::resource::{premultiply, BlendMode, FillRule};
use crate::{Error, Result};

/// A linked pipeline. `None` fields are taken from each draw.
#[derive(Debug)]
struct SoftPipeline {
    blend_mode: Option<BlendMode>,
    fill_rule: Option<FillRule>,
}

/// A draw with everything it needs to be composited.
struct ResolvedDraw {
    coverage: Coverage,
    color: [u8; 4],
    blend_mode: BlendMode,
}

impl ResolvedDraw {
    fn is_opaque(&self) -> bool {
        self.color[3] == u8::MAX && self.blend_mode == BlendMode::SrcOver
    }
}

/// Draws between two clears, composited together.
type Batch<'a> = SmallVec<[&'a DrawCommand; 16]>;

pub(crate) struct SoftwareBackend {
    kind: BackendKind,
    caps: Capabilities,
    width: u32,
    height: u32,
    /// Premultiplied RGBA8.
    target: Vec<[u8; 4]>,
    shaders: Vec<CompiledShader>,
    pipelines: Vec<SoftPipeline>,
}

impl SoftwareBackend {
    pub(crate) fn new(kind: BackendKind, caps: Capabilities, width: u32, height: u32) -> Self {
        Self {
            kind,
            caps,
            width,
            height,
            target: vec![[0; 4]; width as usize * height as usize],
            shaders: Vec::new(),
            pipelines: Vec::new(),
        }
    }

    fn resolve(&self, draw: &DrawCommand) -> Option<ResolvedDraw> {
        let Some(pipeline) = self.pipelines.get(draw.pipeline.0 as usize) else {
            log::error!("draw references unknown pipeline {:?}", draw.pipeline);
            return None;
        };
        let fill_rule = pipeline.fill_rule.unwrap_or(draw.path.fill_rule());
        let coverage = Coverage::new(&draw.path, fill_rule, self.width, self.height);
        if coverage.is_empty() {
            return None;
        }
        Some(ResolvedDraw {
            coverage,
            color: premultiply(draw.paint.color()),
            blend_mode: pipeline.blend_mode.unwrap_or(draw.paint.blend_mode()),
        })
    }

    fn flush(&mut self, batch: &mut Batch<'_>) {
        if batch.is_empty() {
            return;
        }
        // A batch is homogeneous; frames never mix raster modes.
        let raster_mode = batch[0].raster_mode;
        let draws: Vec<ResolvedDraw> = batch.iter().filter_map(|d| self.resolve(d)).collect();
        batch.clear();
        match raster_mode {
            RasterMode::Ordered => self.composite_ordered(&draws),
            RasterMode::Atomic => self.composite_atomic(&draws),
        }
    }

    fn composite_ordered(&mut self, draws: &[ResolvedDraw]) {
        let width = self.width as usize;
        for draw in draws {
            for (x, y) in draw.coverage.pixels() {
                let pixel = &mut self.target[y as usize * width + x as usize];
                *pixel = blend(draw.blend_mode, draw.color, *pixel);
            }
        }
    }

    /// Order-independent compositing.
    ///
    /// Every opaque source-over draw records its index in a per-pixel occluder
    /// with `fetch_max`, in parallel across draws. Each pixel then starts from the
    /// topmost occluding draw and blends only the draws above it, so the result
    /// matches ordered compositing.
    fn composite_atomic(&mut self, draws: &[ResolvedDraw]) {
        let width = self.width as usize;
        let occluders: Vec<AtomicU32> =
            (0..self.target.len()).map(|_| AtomicU32::new(0)).collect();
        draws
            .par_iter()
            .enumerate()
            .filter(|(_, draw)| draw.is_opaque())
            .for_each(|(ix, draw)| {
                for (x, y) in draw.coverage.pixels() {
                    occluders[y as usize * width + x as usize]
                        .fetch_max(ix as u32 + 1, Ordering::Relaxed);
                }
            });
        self.target
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                let live: SmallVec<[(usize, &ResolvedDraw); 16]> = draws
                    .iter()
                    .enumerate()
                    .filter(|(_, draw)| draw.coverage.spans_row(y))
                    .collect();
                if live.is_empty() {
                    return;
                }
                for (x, pixel) in row.iter_mut().enumerate() {
                    let top = occluders[y as usize * width + x].load(Ordering::Relaxed) as usize;
                    if top > 0 {
                        *pixel = draws[top - 1].color;
                    }
                    for (ix, draw) in &live {
                        if *ix + 1 > top && draw.coverage.contains(x as u32, y) {
                            *pixel = blend(draw.blend_mode, draw.color, *pixel);
                        }
                    }
                }
            });
    }
}

impl Backend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn compile_shader(&mut self, label: &str, source: &str) -> Result<ShaderHandle, CompileError> {
        let shader = gantry_shaders::compile(label, source)?;
        let handle = ShaderHandle(self.shaders.len() as u32);
        self.shaders.push(shader);
        Ok(handle)
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDescriptor<'_>,
    ) -> Result<PipelineHandle, CompileError> {
        let shader = self
            .shaders
            .get(desc.shader.0 as usize)
            .ok_or(CompileError::UnknownShader(desc.shader))?;
        for (entry, stage) in [
            (desc.vertex_entry, Stage::Vertex),
            (desc.fragment_entry, Stage::Fragment),
        ] {
            if !shader.has_entry_point(entry, stage) {
                return Err(CompileError::EntryPointMissing {
                    label: desc.label.to_owned(),
                    entry: entry.to_owned(),
                    stage,
                });
            }
        }
        let unsupported = |feature| CompileError::Unsupported {
            label: desc.label.to_owned(),
            feature,
        };
        let features = self.caps.features;
        if desc.raster_mode != Some(RasterMode::Ordered) {
            if !features.fragment_atomics {
                return Err(unsupported("fragment atomics"));
            }
            if !shader.has_storage_binding() {
                return Err(CompileError::MissingStorageBinding {
                    label: desc.label.to_owned(),
                });
            }
        }
        if desc.raster_mode == Some(RasterMode::Ordered) && !features.raster_ordering {
            return Err(unsupported("raster ordering"));
        }
        if desc.blend_mode.is_some_and(BlendMode::is_advanced) && !features.advanced_blend {
            return Err(unsupported("advanced blend modes"));
        }
        let handle = PipelineHandle(self.pipelines.len() as u32);
        self.pipelines.push(SoftPipeline {
            blend_mode: desc.blend_mode,
            fill_rule: desc.fill_rule,
        });
        log::debug!("linked pipeline '{}' as {handle:?}", desc.label);
        Ok(handle)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.target.clear();
        self.target.resize(width as usize * height as usize, [0; 4]);
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn run_recording(&mut self, recording: &Recording) {
        let mut batch = Batch::new();
        for command in &recording.commands {
            match command {
                Command::Clear(color) => {
                    self.flush(&mut batch);
                    self.target.fill(premultiply(*color));
                }
                Command::Draw(draw) => batch.push(draw),
            }
        }
        self.flush(&mut batch);
    }

    fn read_pixels(&self, out: &mut Vec<u8>) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(&self.target);
        out.clear();
        out.try_reserve_exact(bytes.len())
            .map_err(|_| Error::ResourceExhausted("readback buffer"))?;
        for pixel in bytes.chunks_exact(4) {
            out.extend_from_slice(&unpremultiply([pixel[0], pixel[1], pixel[2], pixel[3]]));
        }
        Ok(())
    }
}
