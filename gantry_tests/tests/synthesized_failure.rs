// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendering under every injected compile failure, on every backend profile.

#![allow(
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use gantry::kurbo::Rect;
use gantry::{argb, SynthesizedFailure};
use gantry_tests::{
    fill_rect, render_then_debug, solid_pixels, testing_surface_factories, Rendered, TestParams,
    TestingSurfaceFactory, ALL_FAILURES,
};

const CLEAR: u32 = 0xffff0000;
const DRAW: u32 = 0xff00ffff;
const SIZE: u32 = 32;

fn full_rect(
    target: &TestingSurfaceFactory,
    failure: SynthesizedFailure,
    disable_raster_ordering: bool,
) -> Rendered {
    let mut surface = target.make(SIZE, SIZE).unwrap();
    let params = TestParams {
        clear_color: argb(CLEAR),
        disable_raster_ordering,
        synthesized_failure: failure,
        ..TestParams::new("synthesized_failure", SIZE, SIZE)
    };
    render_then_debug(&mut surface, &params, |factory, frame| {
        fill_rect(factory, frame, Rect::new(0., 0., 32., 32.), DRAW)
    })
    .unwrap_or_else(|e| panic!("{} with {failure:?}: {e}", target.name))
}

#[test]
fn cyan_over_red() {
    for target in testing_surface_factories() {
        for disable_raster_ordering in [false, true] {
            let rendered = full_rect(target, SynthesizedFailure::None, disable_raster_ordering);
            assert_eq!(rendered.pixels.len(), 32 * 32 * 4);
            assert_eq!(rendered.pixel(0, 0), [0x00, 0xff, 0xff, 0xff]);
            assert_eq!(
                rendered.pixels,
                solid_pixels(argb(DRAW), SIZE, SIZE),
                "{}",
                target.name
            );
            assert_eq!(rendered.report.specific_draws, 1);
        }
    }
}

#[test]
fn no_corruption() {
    for target in testing_surface_factories() {
        for failure in ALL_FAILURES {
            for disable_raster_ordering in [false, true] {
                let rendered = full_rect(target, failure, disable_raster_ordering);
                let drawn = rendered.is_solid(argb(DRAW));
                let cleared = rendered.is_solid(argb(CLEAR));
                assert!(
                    drawn != cleared,
                    "{} with {failure:?} rendered neither the draw nor the clear",
                    target.name
                );
                assert_eq!(rendered.report.total_draws(), 1);
            }
        }
    }
}

#[test]
fn each_failure_degrades_as_expected() {
    for target in testing_surface_factories() {
        for failure in ALL_FAILURES {
            let rendered = full_rect(target, failure, false);
            let report = rendered.report;
            match failure {
                SynthesizedFailure::None | SynthesizedFailure::UbershaderLoad => {
                    assert_eq!(report.specific_draws, 1, "{}", target.name);
                    assert!(rendered.is_solid(argb(DRAW)));
                }
                SynthesizedFailure::ShaderCompilation => {
                    assert_eq!(report.uber_draws, 1, "{}", target.name);
                    assert!(rendered.is_solid(argb(DRAW)));
                }
                SynthesizedFailure::PipelineCreation => {
                    assert_eq!(report.dropped_draws, 1, "{}", target.name);
                    assert!(rendered.is_solid(argb(CLEAR)));
                }
            }
        }
    }
}

#[test]
fn shader_failure_falls_back_without_error() {
    for target in testing_surface_factories() {
        for disable_raster_ordering in [false, true] {
            let mut surface = target.make(SIZE, SIZE).unwrap();
            let params = TestParams {
                clear_color: argb(CLEAR),
                disable_raster_ordering,
                synthesized_failure: SynthesizedFailure::ShaderCompilation,
                ..TestParams::new("shader_failure_falls_back", SIZE, SIZE)
            };
            let rendered = render_then_debug(&mut surface, &params, |factory, frame| {
                fill_rect(factory, frame, Rect::new(0., 0., 32., 32.), DRAW)
            })
            .unwrap();
            assert!(rendered.is_solid(argb(DRAW)), "{}", target.name);
            let stats = surface.pipeline_cache().stats();
            assert_eq!(stats.shader_failures, 1);
            assert_eq!(stats.uber_fallbacks, 1);
            assert_eq!(stats.dropped_draws, 0);
        }
    }
}
