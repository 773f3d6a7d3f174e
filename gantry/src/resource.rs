// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paths and paints, and the factory that makes them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use peniko::kurbo::{BezPath, PathEl, Rect, Shape};
use peniko::{Color, Fill};

use crate::{Error, Result};

/// Tolerance used when flattening curved shapes into path elements.
pub(crate) const PATH_TOLERANCE: f64 = 0.1;

/// Build a [`Color`] from a packed `0xAARRGGBB` value.
pub fn argb(value: u32) -> Color {
    Color::rgba8(
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
        (value >> 24) as u8,
    )
}

/// Premultiply a color into RGBA8.
pub(crate) fn premultiply(color: Color) -> [u8; 4] {
    let a = u32::from(color.a);
    [
        crate::raster::mul_div255(u32::from(color.r), a),
        crate::raster::mul_div255(u32::from(color.g), a),
        crate::raster::mul_div255(u32::from(color.b), a),
        color.a,
    ]
}

/// Identifies the surface (and so the backend instance) a resource belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SurfaceId(u64);

impl SurfaceId {
    pub(crate) fn next() -> Self {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl From<Fill> for FillRule {
    fn from(fill: Fill) -> Self {
        match fill {
            Fill::NonZero => Self::NonZero,
            Fill::EvenOdd => Self::EvenOdd,
        }
    }
}

impl FillRule {
    pub(crate) fn is_inside(self, winding: i32) -> bool {
        match self {
            Self::NonZero => winding != 0,
            Self::EvenOdd => winding % 2 != 0,
        }
    }
}

/// Separable blend modes over premultiplied color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    SrcOver,
    Multiply,
    Screen,
    Darken,
    Lighten,
}

impl BlendMode {
    /// Modes other than `SrcOver` read the destination in the shader and need
    /// advanced blend support from the backend.
    pub fn is_advanced(self) -> bool {
        self != Self::SrcOver
    }
}

#[derive(Debug)]
struct PathData {
    surface: SurfaceId,
    path: BezPath,
    rect: Option<Rect>,
    bounds: Rect,
    fill_rule: FillRule,
}

/// An immutable, reference-counted path.
#[derive(Clone, Debug)]
pub struct RenderPath {
    inner: Arc<PathData>,
}

impl RenderPath {
    pub(crate) fn surface(&self) -> SurfaceId {
        self.inner.surface
    }

    pub fn bounds(&self) -> Rect {
        self.inner.bounds
    }

    pub fn fill_rule(&self) -> FillRule {
        self.inner.fill_rule
    }

    /// The rectangle this path was made from, if it was made from one.
    pub fn as_rect(&self) -> Option<Rect> {
        self.inner.rect
    }

    pub fn path(&self) -> &BezPath {
        &self.inner.path
    }
}

#[derive(Clone, Debug, PartialEq)]
struct PaintData {
    surface: SurfaceId,
    color: Color,
    blend_mode: BlendMode,
}

/// A reference-counted, copy-on-write paint.
///
/// Draws capture the paint as it was when [`Frame::draw_path`](crate::Frame::draw_path)
/// was called; mutating the paint afterwards only affects later draws.
#[derive(Clone, Debug)]
pub struct RenderPaint {
    inner: Arc<PaintData>,
}

impl RenderPaint {
    pub(crate) fn surface(&self) -> SurfaceId {
        self.inner.surface
    }

    pub fn color(&self) -> Color {
        self.inner.color
    }

    pub fn set_color(&mut self, color: Color) {
        Arc::make_mut(&mut self.inner).color = color;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.inner.blend_mode
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        Arc::make_mut(&mut self.inner).blend_mode = blend_mode;
    }
}

/// Creates paths and paints bound to one surface.
#[derive(Debug)]
pub struct Factory {
    surface: SurfaceId,
    max_path_elements: usize,
}

impl Factory {
    pub(crate) fn new(surface: SurfaceId, max_path_elements: usize) -> Self {
        Self {
            surface,
            max_path_elements,
        }
    }

    /// Make a rectangular path filled with the non-zero rule.
    pub fn make_path(&self, rect: Rect) -> Result<RenderPath> {
        self.make_path_from_shape(&rect.abs(), Fill::NonZero)
    }

    /// Make a path from any shape.
    ///
    /// Fails with [`Error::ResourceExhausted`] if path storage cannot be reserved
    /// or the shape has more elements than the backend accepts.
    pub fn make_path_from_shape(&self, shape: &impl Shape, fill: Fill) -> Result<RenderPath> {
        let elements = shape.path_elements(PATH_TOLERANCE);
        let mut storage: Vec<PathEl> = Vec::new();
        let (lower, _) = elements.size_hint();
        if lower > self.max_path_elements {
            return Err(Error::ResourceExhausted("path elements"));
        }
        storage
            .try_reserve(lower)
            .map_err(|_| Error::ResourceExhausted("path storage"))?;
        for element in elements {
            if storage.len() == self.max_path_elements {
                return Err(Error::ResourceExhausted("path elements"));
            }
            storage
                .try_reserve(1)
                .map_err(|_| Error::ResourceExhausted("path storage"))?;
            storage.push(element);
        }
        Ok(RenderPath {
            inner: Arc::new(PathData {
                surface: self.surface,
                path: BezPath::from_vec(storage),
                rect: shape.as_rect().map(|rect| rect.abs()),
                bounds: shape.bounding_box(),
                fill_rule: fill.into(),
            }),
        })
    }

    /// Make an opaque black paint using `SrcOver`.
    pub fn make_paint(&self) -> RenderPaint {
        RenderPaint {
            inner: Arc::new(PaintData {
                surface: self.surface,
                color: Color::BLACK,
                blend_mode: BlendMode::SrcOver,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peniko::kurbo::Circle;

    #[test]
    fn argb_unpacks_channels() {
        let cyan = argb(0xff00ffff);
        assert_eq!((cyan.r, cyan.g, cyan.b, cyan.a), (0x00, 0xff, 0xff, 0xff));
        let red = argb(0x80ff0000);
        assert_eq!((red.r, red.g, red.b, red.a), (0xff, 0x00, 0x00, 0x80));
        assert_eq!(premultiply(red), [0x80, 0x00, 0x00, 0x80]);
    }

    #[test]
    fn paint_mutation_is_copy_on_write() {
        let factory = Factory::new(SurfaceId::next(), 64);
        let mut paint = factory.make_paint();
        paint.set_color(argb(0xff00ffff));
        let recorded = paint.clone();
        paint.set_color(argb(0xffff0000));
        paint.set_blend_mode(BlendMode::Multiply);
        assert_eq!(recorded.color(), argb(0xff00ffff));
        assert_eq!(recorded.blend_mode(), BlendMode::SrcOver);
        assert_eq!(paint.color(), argb(0xffff0000));
        assert_eq!(paint.blend_mode(), BlendMode::Multiply);
    }

    #[test]
    fn rect_paths_remember_their_rect() {
        let factory = Factory::new(SurfaceId::next(), 64);
        let path = factory.make_path(Rect::new(32., 32., 0., 0.)).unwrap();
        assert_eq!(path.as_rect(), Some(Rect::new(0., 0., 32., 32.)));
        assert_eq!(path.bounds(), Rect::new(0., 0., 32., 32.));
        assert_eq!(path.fill_rule(), FillRule::NonZero);
        let shape = factory
            .make_path_from_shape(&Rect::new(32., 32., 0., 0.), Fill::NonZero)
            .unwrap();
        assert_eq!(shape.as_rect(), path.as_rect());
        assert_eq!(shape.bounds(), path.bounds());

        let circle = factory
            .make_path_from_shape(&Circle::new((8., 8.), 4.), Fill::EvenOdd)
            .unwrap();
        assert_eq!(circle.as_rect(), None);
        assert_eq!(circle.fill_rule(), FillRule::EvenOdd);
    }

    #[test]
    fn element_limit_is_resource_exhaustion() {
        let factory = Factory::new(SurfaceId::next(), 4);
        let err = factory
            .make_path_from_shape(&Circle::new((8., 8.), 4.), Fill::NonZero)
            .unwrap_err();
        assert_eq!(err, Error::ResourceExhausted("path elements"));
        // A rectangle is five elements (move, three lines, close).
        assert!(factory.make_path(Rect::new(0., 0., 1., 1.)).is_err());
        let factory = Factory::new(SurfaceId::next(), 5);
        assert!(factory.make_path(Rect::new(0., 0., 1., 1.)).is_ok());
    }

    #[test]
    fn fill_rules() {
        assert!(FillRule::NonZero.is_inside(2));
        assert!(!FillRule::EvenOdd.is_inside(2));
        assert!(FillRule::EvenOdd.is_inside(-1));
        assert!(!FillRule::NonZero.is_inside(0));
    }
}
