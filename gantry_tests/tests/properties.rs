// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resize, memoization and ordering properties, on every backend profile.

#![allow(
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use gantry::kurbo::Rect;
use gantry::{argb, Surface, SynthesizedFailure};
use gantry_tests::{
    fill_rect, render_then_debug, testing_surface_factories, Rendered, TestParams,
    TestingSurfaceFactory, ALL_FAILURES,
};

const CLEAR: u32 = 0xff000000;
const GREEN: u32 = 0xff00ff00;
const BLUE: u32 = 0xff0000ff;

fn two_rects(surface: &mut Surface, params: &TestParams) -> Rendered {
    render_then_debug(surface, params, |factory, frame| {
        fill_rect(factory, frame, Rect::new(2., 2., 20., 20.), GREEN)?;
        fill_rect(factory, frame, Rect::new(10., 10., 30., 30.), BLUE)
    })
    .unwrap()
}

/// Every combination of profile, injected failure and raster-ordering mode.
fn each_configuration(mut f: impl FnMut(&TestingSurfaceFactory, SynthesizedFailure, bool)) {
    for target in testing_surface_factories() {
        for failure in ALL_FAILURES {
            for disable_raster_ordering in [false, true] {
                f(target, failure, disable_raster_ordering);
            }
        }
    }
}

#[test]
fn resize_is_idempotent() {
    each_configuration(|target, failure, disable_raster_ordering| {
        let mut surface = target.make(16, 16).unwrap();
        let params = TestParams {
            clear_color: argb(CLEAR),
            synthesized_failure: failure,
            disable_raster_ordering,
            ..TestParams::new("resize_is_idempotent", 32, 24)
        };
        surface.resize(32, 24).unwrap();
        let first = two_rects(&mut surface, &params);
        surface.resize(32, 24).unwrap();
        let second = two_rects(&mut surface, &params);
        assert_eq!((first.width, first.height), (32, 24));
        assert_eq!(first.pixels.len(), 32 * 24 * 4);
        assert_eq!(first.pixels, second.pixels, "{} {failure:?}", target.name);
    });
}

#[test]
fn pipelines_are_created_once() {
    each_configuration(|target, failure, disable_raster_ordering| {
        let mut surface = target.make(32, 32).unwrap();
        let params = TestParams {
            clear_color: argb(CLEAR),
            synthesized_failure: failure,
            disable_raster_ordering,
            ..TestParams::new("pipelines_are_created_once", 32, 32)
        };
        let first = two_rects(&mut surface, &params);
        let after_first = surface.pipeline_cache().stats();
        let second = two_rects(&mut surface, &params);
        let after_second = surface.pipeline_cache().stats();
        assert_eq!(first.pixels, second.pixels, "{} {failure:?}", target.name);
        assert_eq!(first.report, second.report);
        assert_eq!(after_first.pipeline_creations, after_second.pipeline_creations);
        assert_eq!(after_first.shader_compiles, after_second.shader_compiles);
        assert_eq!(after_second.misses, 1);
        assert_eq!(after_second.hits, 3);
    });
}

#[test]
fn first_outcome_predicts_later_frames() {
    each_configuration(|target, failure, disable_raster_ordering| {
        let mut surface = target.make(32, 32).unwrap();
        let failing = TestParams {
            clear_color: argb(CLEAR),
            synthesized_failure: failure,
            disable_raster_ordering,
            ..TestParams::new("first_outcome_predicts_later_frames", 32, 32)
        };
        let first = two_rects(&mut surface, &failing);
        // The injection no longer applies, but every key is already settled.
        let healthy = TestParams {
            synthesized_failure: SynthesizedFailure::None,
            ..failing
        };
        let second = two_rects(&mut surface, &healthy);
        assert_eq!(first.pixels, second.pixels, "{} {failure:?}", target.name);
        assert_eq!(first.report, second.report);
    });
}

#[test]
fn later_draws_win_in_both_raster_modes() {
    for target in testing_surface_factories() {
        for failure in ALL_FAILURES {
            let mut results = Vec::new();
            for disable_raster_ordering in [false, true] {
                let mut surface = target.make(32, 32).unwrap();
                let params = TestParams {
                    clear_color: argb(CLEAR),
                    synthesized_failure: failure,
                    disable_raster_ordering,
                    ..TestParams::new("later_draws_win", 32, 32)
                };
                let rendered = two_rects(&mut surface, &params);
                assert_eq!(rendered.pixel(0, 31), [0x00, 0x00, 0x00, 0xff]);
                if rendered.report.dropped_draws == 0 {
                    let name = target.name;
                    assert_eq!(rendered.pixel(15, 15), [0x00, 0x00, 0xff, 0xff], "{name}");
                    assert_eq!(rendered.pixel(5, 5), [0x00, 0xff, 0x00, 0xff], "{name}");
                    assert_eq!(rendered.pixel(25, 25), [0x00, 0x00, 0xff, 0xff], "{name}");
                } else {
                    assert!(rendered.is_solid(argb(CLEAR)), "{} {failure:?}", target.name);
                }
                results.push(rendered.pixels);
            }
            assert_eq!(results[0], results[1], "{} {failure:?}", target.name);
        }
    }
}
