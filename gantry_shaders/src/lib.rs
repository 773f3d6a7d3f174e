// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Gantry draw shader, its variant preprocessor, and shader validation.
//!
//! Every pipeline Gantry creates is built from a single WGSL template,
//! [`DRAW_SHADER`]. A [`ShaderVariant`] selects a set of `#ifdef` defines,
//! and [`compile`] parses and validates the preprocessed source with `naga`.

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
#![allow(
    missing_debug_implementations,
    clippy::missing_assert_message,
    reason = "Deferred"
)]

mod preprocess;

use std::collections::BTreeSet;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use thiserror::Error;

pub use preprocess::preprocess;

/// WGSL source of the draw shader template.
pub const DRAW_SHADER: &str = include_str!("../shader/draw.wgsl");

/// Vertex entry point name in every variant.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment entry point name in every variant.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Names of the defines understood by [`DRAW_SHADER`].
pub mod defines {
    /// Generic variant: blend mode and fill rule are read from uniforms.
    pub const UBER: &str = "uber";
    /// Order-independent variant that records opaque coverage atomically.
    pub const ATOMIC: &str = "atomic";
    /// Axis-aligned rectangle, coverage is always full inside the bounds.
    pub const RECT: &str = "rect";
    pub const EVEN_ODD: &str = "even_odd";
    pub const BLEND_MULTIPLY: &str = "blend_multiply";
    pub const BLEND_SCREEN: &str = "blend_screen";
    pub const BLEND_DARKEN: &str = "blend_darken";
    pub const BLEND_LIGHTEN: &str = "blend_lighten";
}

/// Errors produced while building or validating a shader variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    #[error("preprocessor error at line {line}: {message}")]
    Preprocess { line: usize, message: String },
    #[error("failed to parse shader '{label}':\n{message}")]
    Parse { label: String, message: String },
    #[error("shader '{label}' failed validation: {message}")]
    Validation { label: String, message: String },
}

/// A named selection of defines applied to [`DRAW_SHADER`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderVariant {
    defines: BTreeSet<&'static str>,
}

impl ShaderVariant {
    pub fn new() -> Self {
        Self {
            defines: BTreeSet::new(),
        }
    }

    /// The generic variant, able to render every blend mode and fill rule in
    /// both raster-ordering modes.
    pub fn uber() -> Self {
        Self::new().with(defines::UBER).with(defines::ATOMIC)
    }

    #[must_use]
    pub fn with(mut self, define: &'static str) -> Self {
        self.defines.insert(define);
        self
    }

    pub fn is_uber(&self) -> bool {
        self.defines.contains(defines::UBER)
    }

    pub fn defines(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.defines.iter().copied()
    }

    /// A stable name built from the sorted define set, e.g. `draw.atomic.rect`.
    pub fn name(&self) -> String {
        let mut name = String::from("draw");
        for define in &self.defines {
            name.push('.');
            name.push_str(define);
        }
        name
    }

    /// Preprocess the template for this variant.
    pub fn source(&self) -> Result<String, ShaderError> {
        preprocess(DRAW_SHADER, &self.name(), &self.defines)
    }
}

impl Default for ShaderVariant {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

/// A parsed and validated shader module.
pub struct CompiledShader {
    module: naga::Module,
}

impl CompiledShader {
    pub fn has_entry_point(&self, name: &str, stage: Stage) -> bool {
        let stage = match stage {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        };
        self.module
            .entry_points
            .iter()
            .any(|entry| entry.name == name && entry.stage == stage)
    }

    /// Whether the module declares a read-write storage binding, which atomic
    /// variants use for order-independent coverage.
    pub fn has_storage_binding(&self) -> bool {
        self.module
            .global_variables
            .iter()
            .any(|(_, var)| matches!(var.space, naga::AddressSpace::Storage { .. }))
    }
}

/// Parse and validate WGSL `source`.
pub fn compile(label: &str, source: &str) -> Result<CompiledShader, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        label: label.to_owned(),
        message: e.emit_to_string(source),
    })?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            label: label.to_owned(),
            message: e.into_inner().to_string(),
        })?;
    log::debug!("compiled shader '{label}'");
    Ok(CompiledShader { module })
}
