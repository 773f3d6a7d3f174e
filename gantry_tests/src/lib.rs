// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gantry tests.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    missing_docs,
    clippy::missing_assert_message,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::allow_attributes_without_reason
)]

use std::env;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{anyhow, Result};
use gantry::kurbo::Rect;
use gantry::peniko::Color;
use gantry::{
    argb, BackendKind, Factory, Frame, FrameConfig, FrameReport, Surface, SurfaceOptions,
    SynthesizedFailure, BACKEND_ENV_VAR,
};

/// Every failure injection mode.
pub const ALL_FAILURES: [SynthesizedFailure; 4] = [
    SynthesizedFailure::None,
    SynthesizedFailure::ShaderCompilation,
    SynthesizedFailure::UbershaderLoad,
    SynthesizedFailure::PipelineCreation,
];

/// Makes surfaces for one backend profile.
#[derive(Clone, Copy, Debug)]
pub struct TestingSurfaceFactory {
    pub name: &'static str,
    pub backend: BackendKind,
    pub force_atomic: bool,
}

impl TestingSurfaceFactory {
    const fn new(name: &'static str, backend: BackendKind, force_atomic: bool) -> Self {
        Self {
            name,
            backend,
            force_atomic,
        }
    }

    pub fn make(&self, width: u32, height: u32) -> Result<Surface> {
        let options = SurfaceOptions {
            force_atomic: self.force_atomic,
            ..SurfaceOptions::new(self.backend, width, height)
        };
        Ok(Surface::new(options)?)
    }
}

/// One factory per backend profile, plus atomic-only variants of the
/// profiles that support raster ordering natively.
pub const TESTING_SURFACE_FACTORIES: [TestingSurfaceFactory; 9] = [
    TestingSurfaceFactory::new("Vulkan", BackendKind::Vulkan, false),
    TestingSurfaceFactory::new("Metal", BackendKind::Metal, false),
    TestingSurfaceFactory::new("D3D12", BackendKind::D3D12, false),
    TestingSurfaceFactory::new("D3D12 atomic", BackendKind::D3D12, true),
    TestingSurfaceFactory::new("D3D11", BackendKind::D3D11, false),
    TestingSurfaceFactory::new("D3D11 atomic", BackendKind::D3D11, true),
    TestingSurfaceFactory::new("OpenGL", BackendKind::OpenGl, false),
    TestingSurfaceFactory::new("OpenGL atomic", BackendKind::OpenGl, true),
    TestingSurfaceFactory::new("EGL", BackendKind::Egl, false),
];

/// The factories to test against: all of them, or only the ones for the
/// backend named by the `GANTRY_BACKEND` environment variable.
pub fn testing_surface_factories() -> Vec<&'static TestingSurfaceFactory> {
    let selected = match BackendKind::from_env() {
        Ok(selected) => selected,
        Err(e) => panic!("invalid {BACKEND_ENV_VAR}: {e}"),
    };
    TESTING_SURFACE_FACTORIES
        .iter()
        .filter(|target| match selected {
            Some(backend) => target.backend == backend,
            None => true,
        })
        .collect()
}

pub struct TestParams {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
    pub do_clear: bool,
    pub disable_raster_ordering: bool,
    pub synthesized_failure: SynthesizedFailure,
}

impl TestParams {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            clear_color: Color::TRANSPARENT,
            do_clear: true,
            disable_raster_ordering: false,
            synthesized_failure: SynthesizedFailure::None,
        }
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            clear_color: self.clear_color,
            do_clear: self.do_clear,
            disable_raster_ordering: self.disable_raster_ordering,
            synthesized_failure: self.synthesized_failure,
        }
    }
}

/// The result of rendering one frame.
pub struct Rendered {
    pub width: u32,
    pub height: u32,
    /// Unpremultiplied RGBA8.
    pub pixels: Vec<u8>,
    pub report: FrameReport,
}

impl Rendered {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let ix = (y * self.width + x) as usize * 4;
        let mut out = [0; 4];
        out.copy_from_slice(&self.pixels[ix..ix + 4]);
        out
    }

    /// Whether every pixel is `color`.
    pub fn is_solid(&self, color: Color) -> bool {
        let expected = rgba(color);
        self.pixels.chunks_exact(4).all(|pixel| pixel == expected)
    }
}

/// The bytes Gantry reads back for an opaque `color`.
pub fn rgba(color: Color) -> [u8; 4] {
    [color.r, color.g, color.b, color.a]
}

/// A `width` by `height` buffer filled with `color`.
pub fn solid_pixels(color: Color, width: u32, height: u32) -> Vec<u8> {
    rgba(color).repeat(width as usize * height as usize)
}

/// Record a rectangle filled with an opaque `0xAARRGGBB` color.
pub fn fill_rect(factory: &Factory, frame: &mut Frame, rect: Rect, color: u32) -> Result<()> {
    let path = factory.make_path(rect)?;
    let mut paint = factory.make_paint();
    paint.set_color(argb(color));
    frame.draw_path(&path, &paint)?;
    Ok(())
}

/// Render one frame on `surface`, recording draws with `draw`.
///
/// Writes the result to `debug_outputs/` if `GANTRY_DEBUG_TEST` names the test.
pub fn render_then_debug(
    surface: &mut Surface,
    params: &TestParams,
    draw: impl FnOnce(&Factory, &mut Frame) -> Result<()>,
) -> Result<Rendered> {
    let mut frame = surface.begin_frame(params.frame_config())?;
    draw(surface.factory(), &mut frame)?;
    let mut pixels = Vec::new();
    let report = surface.end_frame(frame, Some(&mut pixels))?;
    let (width, height) = surface.size();
    let rendered = Rendered {
        width,
        height,
        pixels,
        report,
    };
    let name = format!("{}_{}", params.name, surface.backend_kind()).replace(' ', "_");
    let out_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("debug_outputs")
        .join(name)
        .with_extension("png");
    if env_var_relates_to("GANTRY_DEBUG_TEST", &params.name) {
        write_png_to_file(&out_path, &rendered)?;
        println!("Wrote debug result ({width}x{height}) to {out_path:?}");
    } else {
        match std::fs::remove_file(&out_path) {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::NotFound => (),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(rendered)
}

pub fn write_png_to_file(out_path: &Path, rendered: &Rendered) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let (width, height) = (rendered.width, rendered.height);
    let image = image::RgbaImage::from_raw(width, height, rendered.pixels.clone())
        .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;
    image.save(out_path)?;
    Ok(())
}

/// Determine whether the value of the environment variable `env_var`
/// includes a specific test.
fn env_var_relates_to(env_var: &'static str, name: &str) -> bool {
    if let Ok(val) = env::var(env_var) {
        if val.eq_ignore_ascii_case("all") {
            return true;
        }
        return val
            .split(',')
            .any(|test| test.trim().eq_ignore_ascii_case(name));
    }
    false
}
