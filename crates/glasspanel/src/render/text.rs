//! One-line-per-frame text readout.

use std::io::Write;

use super::{RenderState, Renderer};
use crate::error::Result;

/// Writes each frame as a single readout line.
#[derive(Debug)]
pub struct TextRenderer<W> {
    out: W,
    header_written: bool,
}

impl<W: Write> TextRenderer<W> {
    /// Create a renderer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    /// Consume the renderer and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn mount(&mut self) -> Result<()> {
        if !self.header_written {
            writeln!(
                self.out,
                "{:>6} {:>7} {:>10} {:>10}  {:<5} {:<5} {:<5}",
                "RPM", "CHT", "FUEL L", "FUEL R", "rpm", "cht", "fuel"
            )?;
            self.header_written = true;
        }
        Ok(())
    }

    fn apply(&mut self, state: &RenderState) -> Result<()> {
        writeln!(
            self.out,
            "{:>6} {:>7} {:>10} {:>10}  {:<5} {:<5} {:<5}",
            state.rpm.text,
            state.cht.text,
            state.fuel_left.text,
            state.fuel_right.text,
            state.rpm_status,
            state.cht_status,
            state.fuel_status,
        )?;
        Ok(())
    }
}
