// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazily compiled pipelines, keyed by draw configuration, with the uber
//! pipeline as a shared fallback.

use std::collections::HashMap;

use gantry_shaders::{ShaderVariant, VERTEX_ENTRY};

use crate::backend::{Backend, CompileError, PipelineDescriptor, PipelineHandle};
use crate::failure::{FailureInjector, PipelineKind};
use crate::key::{DrawConfigKey, RasterMode};
use crate::resource::{BlendMode, FillRule};

/// Where a pipeline is in its one-way lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStatus {
    NotRequested,
    Compiling,
    Ready(PipelineHandle),
    Failed,
}

#[derive(Clone, Debug)]
pub struct PipelineEntry {
    status: PipelineStatus,
    error: Option<CompileError>,
}

impl PipelineEntry {
    fn new() -> Self {
        Self {
            status: PipelineStatus::NotRequested,
            error: None,
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// The pipeline handle, present only when the entry is ready.
    pub fn handle(&self) -> Option<PipelineHandle> {
        match self.status {
            PipelineStatus::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    /// Why compilation failed, if it did.
    pub fn error(&self) -> Option<&CompileError> {
        self.error.as_ref()
    }
}

/// How a draw will be rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Specific(PipelineHandle),
    Uber(PipelineHandle),
    Dropped,
}

/// Counters over the lifetime of a [`PipelineCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineCacheStats {
    /// Lookups of a key that was already compiled, successfully or not.
    pub hits: u64,
    /// Lookups that triggered compilation.
    pub misses: u64,
    pub shader_compiles: u64,
    pub shader_failures: u64,
    pub pipeline_creations: u64,
    pub pipeline_failures: u64,
    /// Draws rendered with the uber pipeline because their own failed.
    pub uber_fallbacks: u64,
    pub dropped_draws: u64,
}

/// Maps each [`DrawConfigKey`] to its pipeline for one backend instance.
///
/// Every key, and the uber pipeline, is compiled at most once. `Ready` and
/// `Failed` are final.
#[derive(Debug)]
pub struct PipelineCache {
    entries: HashMap<DrawConfigKey, PipelineEntry>,
    uber: PipelineEntry,
    stats: PipelineCacheStats,
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            uber: PipelineEntry::new(),
            stats: PipelineCacheStats::default(),
        }
    }

    pub fn entry(&self, key: DrawConfigKey) -> Option<&PipelineEntry> {
        self.entries.get(&key)
    }

    pub fn uber(&self) -> &PipelineEntry {
        &self.uber
    }

    pub fn stats(&self) -> PipelineCacheStats {
        self.stats
    }

    /// The number of keys that have been requested.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the pipeline for `key`, compiling it on first use.
    ///
    /// Falls back to the uber pipeline if the specific pipeline failed, and
    /// drops the draw if the uber pipeline failed too or cannot render `key`.
    pub fn resolve(
        &mut self,
        backend: &mut dyn Backend,
        key: DrawConfigKey,
        injector: FailureInjector,
    ) -> Resolution {
        let entry = self.entries.entry(key).or_insert_with(PipelineEntry::new);
        if entry.status == PipelineStatus::NotRequested {
            self.stats.misses += 1;
            let variant = key.variant();
            let desc = Descriptor {
                raster_mode: Some(key.raster_mode),
                blend_mode: Some(key.blend_mode),
                fill_rule: Some(key.fill_rule),
            };
            transition(
                entry,
                &mut self.stats,
                backend,
                PipelineKind::Specific,
                &variant,
                desc,
                injector,
            );
        } else {
            self.stats.hits += 1;
        }
        if let PipelineStatus::Ready(handle) = entry.status {
            return Resolution::Specific(handle);
        }

        if !backend.uber_supports(key) {
            log::warn!("dropping draw: the uber pipeline cannot render {key:?}");
            self.stats.dropped_draws += 1;
            return Resolution::Dropped;
        }
        match self.ensure_uber(backend, injector) {
            Some(handle) => {
                self.stats.uber_fallbacks += 1;
                Resolution::Uber(handle)
            }
            None => {
                log::warn!("dropping draw: no pipeline available for {key:?}");
                self.stats.dropped_draws += 1;
                Resolution::Dropped
            }
        }
    }

    /// Compile the uber pipeline now rather than at the first fallback.
    ///
    /// Returns whether it is ready.
    pub fn precompile_uber(
        &mut self,
        backend: &mut dyn Backend,
        injector: FailureInjector,
    ) -> bool {
        self.ensure_uber(backend, injector).is_some()
    }

    fn ensure_uber(
        &mut self,
        backend: &mut dyn Backend,
        injector: FailureInjector,
    ) -> Option<PipelineHandle> {
        if self.uber.status == PipelineStatus::NotRequested {
            transition(
                &mut self.uber,
                &mut self.stats,
                backend,
                PipelineKind::Uber,
                &ShaderVariant::uber(),
                Descriptor::default(),
                injector,
            );
        }
        self.uber.handle()
    }
}

/// The fixed state of a pipeline; `None` means read per draw.
#[derive(Clone, Copy, Default)]
struct Descriptor {
    raster_mode: Option<RasterMode>,
    blend_mode: Option<BlendMode>,
    fill_rule: Option<FillRule>,
}

/// Move `entry` from `NotRequested` through `Compiling` to `Ready` or `Failed`.
fn transition(
    entry: &mut PipelineEntry,
    stats: &mut PipelineCacheStats,
    backend: &mut dyn Backend,
    kind: PipelineKind,
    variant: &ShaderVariant,
    desc: Descriptor,
    injector: FailureInjector,
) {
    debug_assert_eq!(entry.status, PipelineStatus::NotRequested);
    entry.status = PipelineStatus::Compiling;
    let label = variant.name();
    log::debug!("compiling {kind:?} pipeline '{label}' on {}", backend.kind());
    match build(stats, backend, kind, variant, &label, desc, injector) {
        Ok(handle) => entry.status = PipelineStatus::Ready(handle),
        Err(err) => {
            match kind {
                PipelineKind::Specific => {
                    log::warn!("pipeline '{label}' failed, using the uber pipeline: {err}");
                }
                PipelineKind::Uber => log::warn!("uber pipeline '{label}' failed: {err}"),
            }
            entry.status = PipelineStatus::Failed;
            entry.error = Some(err);
        }
    }
}

fn build(
    stats: &mut PipelineCacheStats,
    backend: &mut dyn Backend,
    kind: PipelineKind,
    variant: &ShaderVariant,
    label: &str,
    desc: Descriptor,
    injector: FailureInjector,
) -> Result<PipelineHandle, CompileError> {
    let source = injector.shader_source(kind, variant.source()?);
    stats.shader_compiles += 1;
    let shader = backend
        .compile_shader(label, &source)
        .inspect_err(|_| stats.shader_failures += 1)?;
    stats.pipeline_creations += 1;
    backend
        .create_pipeline(&PipelineDescriptor {
            label,
            shader,
            vertex_entry: VERTEX_ENTRY,
            fragment_entry: injector.fragment_entry(kind),
            raster_mode: desc.raster_mode,
            blend_mode: desc.blend_mode,
            fill_rule: desc.fill_rule,
        })
        .inspect_err(|_| stats.pipeline_failures += 1)
}
