// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel-center coverage and premultiplied 8-bit compositing.

use peniko::kurbo::{Point, Rect, Shape};

use crate::resource::{BlendMode, FillRule, RenderPath};

/// `a * b / 255`, rounded.
#[inline]
pub(crate) fn mul_div255(a: u32, b: u32) -> u8 {
    let t = a * b + 128;
    ((t + (t >> 8)) >> 8) as u8
}

/// The coverage of one draw: a pixel bounding box and, for non-rectangular
/// paths, a per-pixel inside mask.
///
/// A pixel is covered when its center is inside the path.
#[derive(Clone, Debug)]
pub(crate) struct Coverage {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    mask: Option<Vec<bool>>,
}

/// The half-open pixel range whose centers lie in `[lo, hi)`, clamped to `0..limit`.
fn pixel_span(lo: f64, hi: f64, limit: u32) -> (u32, u32) {
    let clamp = |v: f64| (v - 0.5).ceil().clamp(0.0, f64::from(limit)) as u32;
    let (start, end) = (clamp(lo), clamp(hi));
    (start, end.max(start))
}

impl Coverage {
    pub(crate) fn new(path: &RenderPath, fill_rule: FillRule, width: u32, height: u32) -> Self {
        if let Some(rect) = path.as_rect() {
            return Self::rect(rect, width, height);
        }
        let mut coverage = Self::rect(path.bounds(), width, height);
        let mut mask = Vec::with_capacity(coverage.area());
        for y in coverage.y0..coverage.y1 {
            for x in coverage.x0..coverage.x1 {
                let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                mask.push(fill_rule.is_inside(path.path().winding(center)));
            }
        }
        coverage.mask = Some(mask);
        coverage
    }

    fn rect(rect: Rect, width: u32, height: u32) -> Self {
        let (x0, x1) = pixel_span(rect.x0, rect.x1, width);
        let (y0, y1) = pixel_span(rect.y0, rect.y1, height);
        Self {
            x0,
            y0,
            x1,
            y1,
            mask: None,
        }
    }

    fn area(&self) -> usize {
        ((self.x1 - self.x0) * (self.y1 - self.y0)) as usize
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub(crate) fn contains(&self, x: u32, y: u32) -> bool {
        if x < self.x0 || x >= self.x1 || y < self.y0 || y >= self.y1 {
            return false;
        }
        match &self.mask {
            None => true,
            Some(mask) => {
                let ix = (y - self.y0) * (self.x1 - self.x0) + (x - self.x0);
                mask[ix as usize]
            }
        }
    }

    /// Every covered pixel as `(x, y)`.
    pub(crate) fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y0..self.y1)
            .flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
            .filter(|&(x, y)| self.contains(x, y))
    }

    /// Whether row `y` can contain covered pixels.
    pub(crate) fn spans_row(&self, y: u32) -> bool {
        y >= self.y0 && y < self.y1
    }
}

/// Composite premultiplied `src` onto premultiplied `dst`.
pub(crate) fn blend(mode: BlendMode, src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let sa = u32::from(src[3]);
    let da = u32::from(dst[3]);
    let alpha = sa + u32::from(mul_div255(da, 255 - sa));
    let mut out = [0_u8; 4];
    for i in 0..3 {
        let s = u32::from(src[i]);
        let d = u32::from(dst[i]);
        let c = match mode {
            BlendMode::SrcOver => s + u32::from(mul_div255(d, 255 - sa)),
            BlendMode::Multiply => {
                u32::from(mul_div255(s, 255 - da))
                    + u32::from(mul_div255(d, 255 - sa))
                    + u32::from(mul_div255(s, d))
            }
            BlendMode::Screen => s + d - u32::from(mul_div255(s, d)),
            BlendMode::Darken => {
                let (a, b) = (mul_div255(s, da), mul_div255(d, sa));
                (s + d).saturating_sub(u32::from(a.max(b)))
            }
            BlendMode::Lighten => {
                let (a, b) = (mul_div255(s, da), mul_div255(d, sa));
                (s + d).saturating_sub(u32::from(a.min(b)))
            }
        };
        out[i] = c.min(alpha) as u8;
    }
    out[3] = alpha.min(255) as u8;
    out
}

/// Convert one premultiplied pixel to straight alpha.
pub(crate) fn unpremultiply(pixel: [u8; 4]) -> [u8; 4] {
    let a = u32::from(pixel[3]);
    if a == 0 {
        return [0; 4];
    }
    let channel = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    [channel(pixel[0]), channel(pixel[1]), channel(pixel[2]), pixel[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Factory, SurfaceId};
    use peniko::kurbo::{BezPath, Circle};
    use peniko::Fill;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const CYAN: [u8; 4] = [0, 255, 255, 255];

    #[test]
    fn div255_is_exact_at_the_ends() {
        for v in 0..=255 {
            assert_eq!(mul_div255(v, 255), v as u8);
            assert_eq!(mul_div255(v, 0), 0);
        }
        assert_eq!(mul_div255(128, 128), 64);
    }

    #[test]
    fn opaque_src_over_replaces() {
        assert_eq!(blend(BlendMode::SrcOver, CYAN, RED), CYAN);
        let half_cyan = [0, 128, 128, 128];
        assert_eq!(blend(BlendMode::SrcOver, half_cyan, RED), [127, 128, 128, 255]);
    }

    #[test]
    fn separable_modes() {
        let grey = [128, 128, 128, 255];
        assert_eq!(blend(BlendMode::Multiply, grey, RED), [128, 0, 0, 255]);
        assert_eq!(blend(BlendMode::Screen, grey, RED), [255, 128, 128, 255]);
        assert_eq!(blend(BlendMode::Darken, grey, RED), [128, 0, 0, 255]);
        assert_eq!(blend(BlendMode::Lighten, grey, RED), [255, 128, 128, 255]);
        // Blending onto transparent is plain source.
        for mode in [BlendMode::Multiply, BlendMode::Screen, BlendMode::Darken] {
            assert_eq!(blend(mode, grey, [0; 4]), grey);
        }
    }

    #[test]
    fn unpremultiply_round_trips_opaque() {
        assert_eq!(unpremultiply(CYAN), CYAN);
        assert_eq!(unpremultiply([0, 0, 0, 0]), [0; 4]);
        assert_eq!(unpremultiply([64, 0, 0, 128]), [128, 0, 0, 128]);
    }

    #[test]
    fn rect_coverage_uses_pixel_centers() {
        let factory = Factory::new(SurfaceId::next(), 64);
        let full = factory.make_path(Rect::new(0., 0., 32., 32.)).unwrap();
        let coverage = Coverage::new(&full, FillRule::NonZero, 32, 32);
        assert_eq!(coverage.pixels().count(), 32 * 32);

        let partial = factory.make_path(Rect::new(0.4, 0.6, 2.5, 2.4)).unwrap();
        let coverage = Coverage::new(&partial, FillRule::NonZero, 32, 32);
        let pixels: Vec<_> = coverage.pixels().collect();
        assert_eq!(pixels, vec![(0, 1), (1, 1)]);

        let outside = factory.make_path(Rect::new(40., 40., 50., 50.)).unwrap();
        assert!(Coverage::new(&outside, FillRule::NonZero, 32, 32).is_empty());
    }

    #[test]
    fn fill_rule_decides_overlaps() {
        let factory = Factory::new(SurfaceId::next(), 64);
        let mut path = BezPath::new();
        // Two nested squares wound the same way.
        for (lo, hi) in [(0., 8.), (2., 6.)] {
            path.move_to((lo, lo));
            path.line_to((hi, lo));
            path.line_to((hi, hi));
            path.line_to((lo, hi));
            path.close_path();
        }
        let nested = factory.make_path_from_shape(&path, Fill::EvenOdd).unwrap();
        let even_odd = Coverage::new(&nested, FillRule::EvenOdd, 8, 8);
        let non_zero = Coverage::new(&nested, FillRule::NonZero, 8, 8);
        assert!(even_odd.contains(0, 0) && non_zero.contains(0, 0));
        assert!(!even_odd.contains(4, 4));
        assert!(non_zero.contains(4, 4));

        let circle = factory
            .make_path_from_shape(&Circle::new((4., 4.), 3.), Fill::NonZero)
            .unwrap();
        let coverage = Coverage::new(&circle, FillRule::NonZero, 8, 8);
        assert!(coverage.contains(4, 4));
        assert!(!coverage.contains(0, 0));
    }
}
