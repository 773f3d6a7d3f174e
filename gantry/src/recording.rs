// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use peniko::Color;

use crate::backend::PipelineHandle;
use crate::key::RasterMode;
use crate::resource::{RenderPaint, RenderPath};

/// List of [`Command`]s for a backend to execute in order.
#[derive(Default)]
pub struct Recording {
    pub commands: Vec<Command>,
}

/// One path draw with a resolved pipeline.
#[derive(Clone)]
pub struct DrawCommand {
    pub pipeline: PipelineHandle,
    pub path: RenderPath,
    pub paint: RenderPaint,
    pub raster_mode: RasterMode,
}

#[derive(Clone)]
pub enum Command {
    /// Fill the whole target with a color.
    Clear(Color),
    Draw(DrawCommand),
}

impl Recording {
    /// Appends a [`Command`] to the back of the [`Recording`].
    pub fn push(&mut self, cmd: Command) {
        self.commands.push(cmd);
    }

    pub fn clear(&mut self, color: Color) {
        self.push(Command::Clear(color));
    }

    pub fn draw(&mut self, draw: DrawCommand) {
        self.push(Command::Draw(draw));
    }
}
