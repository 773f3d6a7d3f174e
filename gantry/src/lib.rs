// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gantry is a frame-lifecycle and pipeline-compilation layer for 2d path rendering.
//!
//! A single drawing program (clear, then fill paths with paints) runs unchanged
//! across several graphics API profiles and across two compositing strategies:
//! raster-ordered blending and atomic, order-independent blending.
//!
//! Pipelines are compiled lazily, one per [`DrawConfigKey`], and memoized for the
//! lifetime of the [`Surface`]. When a pipeline fails to compile, the draw falls
//! back to a generic "uber" pipeline; if that fails too, the draw is dropped and
//! the rest of the frame, including its clear, completes normally. Compilation
//! failures can be synthesized deterministically through
//! [`FrameConfig::synthesized_failure`] to exercise that path.
//!
//! ```ignore
//! use gantry::{BackendKind, FrameConfig, Surface, SurfaceOptions, argb};
//! use gantry::kurbo::Rect;
//!
//! let mut surface = Surface::new(SurfaceOptions::new(BackendKind::Vulkan, 32, 32))?;
//! let path = surface.factory().make_path(Rect::new(0., 0., 32., 32.))?;
//! let mut paint = surface.factory().make_paint();
//! paint.set_color(argb(0xff00ffff));
//!
//! let mut frame = surface.begin_frame(FrameConfig {
//!     clear_color: argb(0xffff0000),
//!     ..Default::default()
//! })?;
//! frame.draw_path(&path, &paint)?;
//! let mut pixels = Vec::new();
//! surface.end_frame(frame, Some(&mut pixels))?;
//! assert_eq!(&pixels[..4], &[0x00, 0xff, 0xff, 0xff]);
//! ```

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    reason = "Deferred"
)]

mod backend;
mod failure;
mod frame;
mod key;
mod pipeline;
mod raster;
mod recording;
mod resource;
mod surface;

pub mod low_level {
    //! Building blocks for alternative backends and for inspecting compiled state.
    //!
    //! These APIs are less stable than the [`Surface`][crate::Surface] API.

    pub use crate::backend::{
        Backend, Capabilities, CompileError, PipelineDescriptor, PipelineHandle, ShaderHandle,
    };
    pub use crate::failure::{CompileStage, FailureInjector, PipelineKind};
    pub use crate::pipeline::{PipelineCache, PipelineEntry, PipelineStatus, Resolution};
    pub use crate::recording::{Command, DrawCommand, Recording};
}

/// Styling and composition primitives.
pub use peniko;
/// 2D geometry, with a focus on curves.
pub use peniko::kurbo;

pub use backend::{BackendFeatures, BackendKind, BACKEND_ENV_VAR};
pub use failure::SynthesizedFailure;
pub use frame::{DrawRecord, Frame, FrameConfig, FrameReport, FrameState};
pub use key::{DrawConfigKey, DrawKind, RasterMode};
pub use pipeline::PipelineCacheStats;
pub use resource::{argb, BlendMode, Factory, FillRule, RenderPaint, RenderPath};
pub use surface::{Surface, SurfaceOptions};

use thiserror::Error;

/// Errors that can occur in Gantry.
///
/// Pipeline compilation failures never appear here: they are absorbed by the
/// uber-pipeline fallback and reported through [`FrameReport`] and
/// [`PipelineCacheStats`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// [`Surface::begin_frame`] was called while another frame was open.
    #[error("begin_frame called while a frame is already in progress")]
    FrameAlreadyBegun,
    /// [`Surface::end_frame`] was given a frame this surface did not issue for
    /// the frame currently in progress.
    #[error("frame was not begun on this surface, or has already ended")]
    FrameMismatch,
    /// The surface cannot be resized while a frame is open.
    #[error("cannot resize a surface while a frame is in progress")]
    ResizeDuringFrame,
    /// A path or paint made by another surface's factory was drawn.
    #[error("resource was created by the factory of a different surface")]
    ForeignResource,
    /// An allocation for the named resource could not be satisfied.
    #[error("resource exhausted while allocating {0}")]
    ResourceExhausted(&'static str),
    /// Width or height was zero or exceeded the backend limit.
    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    /// A backend name could not be parsed.
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
