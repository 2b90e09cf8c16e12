//! Presentation of dashboard frames.
//!
//! The dashboard computes a [`RenderState`] per frame; a [`Renderer`] turns
//! it into visible output. Two renderers are provided: a retained HTML/SVG
//! document ([`HtmlRenderer`]) and a one-line text readout
//! ([`TextRenderer`]).

mod html;
mod text;

use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;

use crate::error::Result;

pub use html::{HtmlRenderer, STYLESHEET_ID};
pub use text::TextRenderer;

/// Radius of the outer (rpm) arc of the radial gauge.
pub const RPM_ARC_RADIUS: f64 = 54.0;

/// Radius of the inner (cht) arc of the radial gauge.
pub const CHT_ARC_RADIUS: f64 = 40.0;

/// Circumference of an arc of radius `r`.
#[must_use]
pub fn arc_circumference(r: f64) -> f64 {
    2.0 * PI * r
}

/// Format `value` with `places` decimals, rounding ties away from zero
/// (`0.25` becomes `"0.3"`, `12.25` becomes `"12.3"`).
#[must_use]
pub fn format_fixed(value: f64, places: usize) -> String {
    let exp = i32::try_from(places).unwrap_or(i32::MAX);
    let scale = 10f64.powi(exp);
    let rounded = ((value.abs() * scale + 0.5).floor() / scale).copysign(value);
    format!("{rounded:.places$}")
}

/// Status of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Within normal range.
    #[default]
    Ok,
    /// Approaching a limit.
    Warn,
    /// At or past a limit.
    Alarm,
}

impl Status {
    /// CSS class used by the status tiles.
    #[must_use]
    pub fn class(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Alarm => "alarm",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.class())
    }
}

/// One smoothed channel, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readout {
    /// Smoothed value in channel units.
    pub value: f64,
    /// Fraction of the configured maximum, clamped to `[0, 1]`.
    pub pct: f64,
    /// Formatted value.
    pub text: String,
}

impl Readout {
    /// Width of a linear bar, e.g. `"42.5%"`.
    #[must_use]
    pub fn bar_width(&self) -> String {
        format!("{}%", format_fixed(self.pct * 100.0, 1))
    }
}

/// Everything a renderer needs to paint one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderState {
    /// Engine speed.
    pub rpm: Readout,
    /// Cylinder head temperature.
    pub cht: Readout,
    /// Left tank quantity.
    pub fuel_left: Readout,
    /// Right tank quantity.
    pub fuel_right: Readout,
    /// `stroke-dashoffset` of the rpm arc.
    pub rpm_arc_offset: f64,
    /// `stroke-dashoffset` of the cht arc.
    pub cht_arc_offset: f64,
    /// Engine speed status.
    pub rpm_status: Status,
    /// Cylinder head temperature status.
    pub cht_status: Status,
    /// Fuel status, from the average of both tanks.
    pub fuel_status: Status,
    /// Whether this is the first frame after mounting.
    pub initial: bool,
}

/// Turns render states into output.
pub trait Renderer {
    /// Build static output once. Calling it again must not duplicate
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the output surface cannot be prepared.
    fn mount(&mut self) -> Result<()>;

    /// Paint one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    fn apply(&mut self, state: &RenderState) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{RenderState, Renderer};
    use crate::error::{Error, Result};

    /// Renderer that keeps every frame it is given.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingRenderer {
        pub mounts: usize,
        pub frames: Vec<RenderState>,
        pub fail: bool,
    }

    impl Renderer for RecordingRenderer {
        fn mount(&mut self) -> Result<()> {
            self.mounts += 1;
            Ok(())
        }

        fn apply(&mut self, state: &RenderState) -> Result<()> {
            if self.fail {
                return Err(Error::render("surface lost"));
            }
            self.frames.push(state.clone());
            Ok(())
        }
    }
}
