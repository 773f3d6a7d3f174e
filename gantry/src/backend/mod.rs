// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The capability set a graphics API backend provides, and the registered
//! backend profiles.

mod software;

use std::fmt;
use std::str::FromStr;

use gantry_shaders::{ShaderError, Stage};
use thiserror::Error;

use crate::key::{DrawConfigKey, RasterMode};
use crate::recording::Recording;
use crate::resource::{BlendMode, FillRule};

pub(crate) use software::SoftwareBackend;

/// Environment variable naming the backend used by [`BackendKind::from_env`].
pub const BACKEND_ENV_VAR: &str = "GANTRY_BACKEND";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u32);

/// Why a shader or pipeline could not be built.
///
/// These never escape the pipeline cache; a failed pipeline is replaced by the
/// uber pipeline, or the draw is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompileError {
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("pipeline '{label}': shader has no {stage:?} entry point named '{entry}'")]
    EntryPointMissing {
        label: String,
        entry: String,
        stage: Stage,
    },
    #[error("pipeline '{label}' is atomic but its shader declares no storage binding")]
    MissingStorageBinding { label: String },
    #[error("pipeline '{label}' needs {feature}, which the backend does not support")]
    Unsupported {
        label: String,
        feature: &'static str,
    },
    #[error("unknown shader handle {0:?}")]
    UnknownShader(ShaderHandle),
}

/// Parameters for linking a compiled shader into a pipeline.
///
/// `None` fields are dynamic: the pipeline reads them per draw, as the uber
/// pipeline does.
#[derive(Clone, Debug)]
pub struct PipelineDescriptor<'a> {
    pub label: &'a str,
    pub shader: ShaderHandle,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub raster_mode: Option<RasterMode>,
    pub blend_mode: Option<BlendMode>,
    pub fill_rule: Option<FillRule>,
}

/// Feature flags that are part of every [`DrawConfigKey`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BackendFeatures {
    /// Fragments can be blended in primitive order without a barrier.
    pub raster_ordering: bool,
    /// Fragment shaders may write storage buffers atomically.
    pub fragment_atomics: bool,
    /// Blend modes other than source-over are available.
    pub advanced_blend: bool,
}

/// What a backend profile can do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub features: BackendFeatures,
    /// Whether the uber pipeline can render advanced blend modes.
    pub uber_advanced_blend: bool,
    /// Maximum number of elements in one path.
    pub max_path_elements: usize,
    /// Maximum surface width and height.
    pub max_dimension: u32,
}

/// A graphics API backend.
///
/// Backends compile shaders, link pipelines, and execute recordings. They
/// never decide what happens when compilation fails; that is up to the
/// pipeline cache.
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> &Capabilities;

    fn compile_shader(&mut self, label: &str, source: &str) -> Result<ShaderHandle, CompileError>;

    fn create_pipeline(
        &mut self,
        desc: &PipelineDescriptor<'_>,
    ) -> Result<PipelineHandle, CompileError>;

    /// Whether the uber pipeline can render draws with this key.
    fn uber_supports(&self, key: DrawConfigKey) -> bool {
        !key.blend_mode.is_advanced() || self.capabilities().uber_advanced_blend
    }

    /// Reallocate the render target. Contents are unspecified afterwards.
    fn resize(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Execute `recording` and wait for it to complete.
    fn run_recording(&mut self, recording: &Recording);

    /// Copy the render target into `out` as unpremultiplied RGBA8 rows, top to bottom.
    fn read_pixels(&self, out: &mut Vec<u8>) -> crate::Result<()>;
}

/// The graphics APIs Gantry has profiles for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Vulkan,
    Metal,
    D3D12,
    D3D11,
    OpenGl,
    Egl,
}

struct BackendEntry {
    kind: BackendKind,
    name: &'static str,
    aliases: &'static [&'static str],
    capabilities: fn() -> Capabilities,
    create: fn(BackendKind, Capabilities, u32, u32) -> Box<dyn Backend>,
}

fn software(kind: BackendKind, caps: Capabilities, width: u32, height: u32) -> Box<dyn Backend> {
    Box::new(SoftwareBackend::new(kind, caps, width, height))
}

const DESKTOP_MAX_DIMENSION: u32 = 16384;

fn full_capabilities() -> Capabilities {
    Capabilities {
        features: BackendFeatures {
            raster_ordering: true,
            fragment_atomics: true,
            advanced_blend: true,
        },
        uber_advanced_blend: true,
        max_path_elements: 1 << 20,
        max_dimension: DESKTOP_MAX_DIMENSION,
    }
}

fn opengl_capabilities() -> Capabilities {
    Capabilities {
        features: BackendFeatures {
            raster_ordering: false,
            fragment_atomics: true,
            advanced_blend: true,
        },
        uber_advanced_blend: false,
        max_path_elements: 1 << 20,
        max_dimension: DESKTOP_MAX_DIMENSION,
    }
}

fn egl_capabilities() -> Capabilities {
    Capabilities {
        features: BackendFeatures {
            raster_ordering: false,
            fragment_atomics: true,
            advanced_blend: false,
        },
        uber_advanced_blend: false,
        max_path_elements: 1 << 16,
        max_dimension: 4096,
    }
}

static BACKENDS: [BackendEntry; 6] = [
    BackendEntry {
        kind: BackendKind::Vulkan,
        name: "Vulkan",
        aliases: &["vulkan", "vk"],
        capabilities: full_capabilities,
        create: software,
    },
    BackendEntry {
        kind: BackendKind::Metal,
        name: "Metal",
        aliases: &["metal", "mtl"],
        capabilities: full_capabilities,
        create: software,
    },
    BackendEntry {
        kind: BackendKind::D3D12,
        name: "D3D12",
        aliases: &["d3d12", "dx12"],
        capabilities: full_capabilities,
        create: software,
    },
    BackendEntry {
        kind: BackendKind::D3D11,
        name: "D3D11",
        aliases: &["d3d11", "dx11"],
        capabilities: full_capabilities,
        create: software,
    },
    BackendEntry {
        kind: BackendKind::OpenGl,
        name: "OpenGL",
        aliases: &["opengl", "gl"],
        capabilities: opengl_capabilities,
        create: software,
    },
    BackendEntry {
        kind: BackendKind::Egl,
        name: "EGL",
        aliases: &["egl", "gles"],
        capabilities: egl_capabilities,
        create: software,
    },
];

impl BackendKind {
    pub const ALL: [Self; 6] = [
        Self::Vulkan,
        Self::Metal,
        Self::D3D12,
        Self::D3D11,
        Self::OpenGl,
        Self::Egl,
    ];

    fn entry(self) -> &'static BackendEntry {
        // Every kind has exactly one entry, in declaration order.
        &BACKENDS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn capabilities(self) -> Capabilities {
        (self.entry().capabilities)()
    }

    /// Read the backend from the `GANTRY_BACKEND` environment variable.
    ///
    /// Returns `Ok(None)` if it is unset.
    pub fn from_env() -> crate::Result<Option<Self>> {
        Self::from_env_value(std::env::var(BACKEND_ENV_VAR))
    }

    fn from_env_value(value: Result<String, std::env::VarError>) -> crate::Result<Option<Self>> {
        match value {
            Ok(value) => value.parse().map(Some),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(value)) => {
                Err(crate::Error::UnknownBackend(value.to_string_lossy().into_owned()))
            }
        }
    }

    pub(crate) fn create(self, width: u32, height: u32) -> Box<dyn Backend> {
        let entry = self.entry();
        log::info!("creating {} backend ({width}x{height})", entry.name);
        (entry.create)(self, (entry.capabilities)(), width, height)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        BACKENDS
            .iter()
            .find(|entry| entry.aliases.contains(&lower.as_str()))
            .map(|entry| entry.kind)
            .ok_or_else(|| crate::Error::UnknownBackend(s.to_owned()))
    }
}
