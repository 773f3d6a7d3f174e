// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use gantry_shaders::{defines, ShaderVariant};

use crate::backend::BackendFeatures;
use crate::resource::{BlendMode, FillRule, RenderPaint, RenderPath};

/// The shape class of a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawKind {
    /// An axis-aligned rectangle. Coverage is full inside its pixel bounds.
    Rect,
    /// A general path, covered by winding number and fill rule.
    Path,
}

/// How draws in a frame are composited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RasterMode {
    /// Fragments are blended in submission order.
    #[default]
    Ordered,
    /// Opaque coverage is resolved with atomics, independent of submission order.
    Atomic,
}

/// Everything that selects a specialized pipeline.
///
/// Two draws with equal keys always share a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawConfigKey {
    pub draw_kind: DrawKind,
    pub fill_rule: FillRule,
    pub blend_mode: BlendMode,
    pub raster_mode: RasterMode,
    pub features: BackendFeatures,
}

impl DrawConfigKey {
    pub(crate) fn for_draw(
        path: &RenderPath,
        paint: &RenderPaint,
        raster_mode: RasterMode,
        features: BackendFeatures,
    ) -> Self {
        let draw_kind = if path.as_rect().is_some() {
            DrawKind::Rect
        } else {
            DrawKind::Path
        };
        Self {
            draw_kind,
            fill_rule: path.fill_rule(),
            blend_mode: paint.blend_mode(),
            raster_mode,
            features,
        }
    }

    /// The shader variant specialized for this key.
    pub fn variant(&self) -> ShaderVariant {
        let mut variant = ShaderVariant::new();
        match self.draw_kind {
            DrawKind::Rect => variant = variant.with(defines::RECT),
            DrawKind::Path => {
                if self.fill_rule == FillRule::EvenOdd {
                    variant = variant.with(defines::EVEN_ODD);
                }
            }
        }
        let blend = match self.blend_mode {
            BlendMode::SrcOver => None,
            BlendMode::Multiply => Some(defines::BLEND_MULTIPLY),
            BlendMode::Screen => Some(defines::BLEND_SCREEN),
            BlendMode::Darken => Some(defines::BLEND_DARKEN),
            BlendMode::Lighten => Some(defines::BLEND_LIGHTEN),
        };
        if let Some(blend) = blend {
            variant = variant.with(blend);
        }
        if self.raster_mode == RasterMode::Atomic {
            variant = variant.with(defines::ATOMIC);
        }
        variant
    }
}
