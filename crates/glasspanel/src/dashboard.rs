//! The Engine/Fuel glass dashboard.
//!
//! The dashboard is the target of two instruments, `Engine(rpm, cht)` and
//! `Fuel(left, right)`. Callbacks only store raw values and request a render;
//! the render itself happens at most once per frame, where values are
//! exponentially smoothed, scaled against configured maxima, and classified
//! against threshold pairs.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::error::Result;
use crate::registry::InstrumentTarget;
use crate::render::{
    arc_circumference, format_fixed, Readout, RenderState, Renderer, Status, CHT_ARC_RADIUS, RPM_ARC_RADIUS,
};

/// Name of the engine instrument.
pub const ENGINE: &str = "Engine";

/// Name of the fuel instrument.
pub const FUEL: &str = "Fuel";

/// A `[warn, alarm]` threshold pair, as fractions of the channel maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds(pub f64, pub f64);

impl Thresholds {
    /// First bound.
    #[must_use]
    pub fn warn(self) -> f64 {
        self.0
    }

    /// Second bound.
    #[must_use]
    pub fn alarm(self) -> f64 {
        self.1
    }
}

/// Classify a percentage against ascending thresholds.
///
/// At or above the alarm bound is an alarm, at or above the warn bound is a
/// warning.
#[must_use]
pub fn classify(pct: f64, thresholds: Thresholds) -> Status {
    if pct >= thresholds.alarm() {
        Status::Alarm
    } else if pct >= thresholds.warn() {
        Status::Warn
    } else {
        Status::Ok
    }
}

/// Classify a percentage where low values are dangerous.
///
/// Thresholds are descending: above the warn bound is fine, above the alarm
/// bound is a warning, anything else is an alarm.
#[must_use]
pub fn classify_inverted(pct: f64, thresholds: Thresholds) -> Status {
    if pct > thresholds.warn() {
        Status::Ok
    } else if pct > thresholds.alarm() {
        Status::Warn
    } else {
        Status::Alarm
    }
}

/// One step of an exponential moving average.
#[must_use]
pub fn smooth(current: f64, raw: f64, factor: f64) -> f64 {
    current + (raw - current) * factor
}

fn fraction(value: f64, max: f64) -> f64 {
    (value / max).clamp(0.0, 1.0)
}

// Half-up rounding, so 0.5 rounds to 1 and -0.5 rounds to 0
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Dashboard scaling, smoothing and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardOptions {
    /// Full-scale engine speed.
    pub max_rpm: f64,
    /// Full-scale cylinder head temperature in °F.
    pub max_cht: f64,
    /// Capacity of one tank in gallons.
    pub max_fuel: f64,
    /// Weight of the newest raw value in the moving average.
    pub smooth_factor: f64,
    /// Ascending `[warn, alarm]` for rpm.
    pub rpm_thresholds: Thresholds,
    /// Ascending `[warn, alarm]` for cht.
    pub cht_thresholds: Thresholds,
    /// Descending `[warn, alarm]` for the average fuel level.
    pub fuel_thresholds: Thresholds,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            max_rpm: 2700.0,
            max_cht: 500.0,
            max_fuel: 21.5,
            smooth_factor: 0.18,
            rpm_thresholds: Thresholds(0.85, 0.95),
            cht_thresholds: Thresholds(0.75, 0.90),
            fuel_thresholds: Thresholds(0.35, 0.20),
        }
    }
}

/// Raw and smoothed value of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Channel {
    /// Last value received.
    pub raw: f64,
    /// Value after smoothing on the last render.
    pub smoothed: f64,
}

impl Channel {
    fn step(&mut self, factor: f64) -> f64 {
        self.smoothed = smooth(self.smoothed, self.raw, factor);
        self.smoothed
    }
}

/// Mutable dashboard state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    /// Engine speed.
    pub rpm: Channel,
    /// Cylinder head temperature.
    pub cht: Channel,
    /// Left tank.
    pub left: Channel,
    /// Right tank.
    pub right: Channel,
    /// Set once the renderer is mounted.
    pub initialized: bool,
}

/// The glass dashboard, generic over its renderer.
#[derive(Debug)]
pub struct Dashboard<R> {
    options: DashboardOptions,
    state: DashboardState,
    renderer: R,
    render_pending: bool,
    frames: u64,
}

impl<R: Renderer> Dashboard<R> {
    /// Create an unmounted dashboard.
    #[must_use]
    pub fn new(options: DashboardOptions, renderer: R) -> Self {
        Self {
            options,
            state: DashboardState::default(),
            renderer,
            render_pending: false,
            frames: 0,
        }
    }

    /// Mount the renderer and paint the first frame unsmoothed.
    ///
    /// Mounting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer cannot mount.
    pub fn mount(&mut self) -> Result<()> {
        if self.state.initialized {
            return Ok(());
        }
        debug!("mounting dashboard");
        self.renderer.mount()?;
        self.state.initialized = true;
        self.render(true);
        Ok(())
    }

    /// Engine instrument callback.
    pub fn engine(&mut self, rpm: f64, cht: f64) {
        self.state.rpm.raw = rpm;
        self.state.cht.raw = cht;
        self.request_render();
    }

    /// Fuel instrument callback.
    pub fn fuel(&mut self, left: f64, right: f64) {
        self.state.left.raw = left;
        self.state.right.raw = right;
        self.request_render();
    }

    /// Frame tick: render if something changed since the last frame.
    /// Returns whether a frame was rendered.
    pub fn on_frame(&mut self) -> bool {
        if !self.render_pending {
            return false;
        }
        self.render_pending = false;
        self.render(false);
        true
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Options in use.
    #[must_use]
    pub fn options(&self) -> &DashboardOptions {
        &self.options
    }

    /// The renderer.
    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Whether a render is waiting for the next frame.
    #[must_use]
    pub fn is_render_pending(&self) -> bool {
        self.render_pending
    }

    /// Number of frames handed to the renderer.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    fn request_render(&mut self) {
        if !self.state.initialized {
            return;
        }
        self.render_pending = true;
    }

    fn render(&mut self, initial: bool) {
        let frame = self.next_frame(initial);
        self.frames += 1;
        trace!(frame = self.frames, rpm = frame.rpm.value, "render");
        if let Err(e) = self.renderer.apply(&frame) {
            error!(error = %e, "dashboard render failed");
        }
    }

    /// Advance smoothing by one step and compute the resulting frame.
    fn next_frame(&mut self, initial: bool) -> RenderState {
        let o = &self.options;
        let s = &mut self.state;
        let f = if initial { 1.0 } else { o.smooth_factor };

        let rpm = s.rpm.step(f);
        let cht = s.cht.step(f);
        let left = s.left.step(f);
        let right = s.right.step(f);

        let rpm_pct = fraction(rpm, o.max_rpm);
        let cht_pct = fraction(cht, o.max_cht);
        let left_pct = fraction(left, o.max_fuel);
        let right_pct = fraction(right, o.max_fuel);
        let fuel_avg = (left_pct + right_pct) / 2.0;

        RenderState {
            rpm: Readout {
                value: rpm,
                pct: rpm_pct,
                text: format!("{:.0}", round_half_up(rpm)),
            },
            cht: Readout {
                value: cht,
                pct: cht_pct,
                text: format!("{:.0}°F", round_half_up(cht)),
            },
            fuel_left: Readout {
                value: left,
                pct: left_pct,
                text: format!("{} gal", format_fixed(left, 1)),
            },
            fuel_right: Readout {
                value: right,
                pct: right_pct,
                text: format!("{} gal", format_fixed(right, 1)),
            },
            rpm_arc_offset: arc_circumference(RPM_ARC_RADIUS) * (1.0 - rpm_pct),
            cht_arc_offset: arc_circumference(CHT_ARC_RADIUS) * (1.0 - cht_pct),
            rpm_status: classify(rpm_pct, o.rpm_thresholds),
            cht_status: classify(cht_pct, o.cht_thresholds),
            fuel_status: classify_inverted(fuel_avg, o.fuel_thresholds),
            initial,
        }
    }
}

impl<R: Renderer> InstrumentTarget for Dashboard<R> {
    fn handles(&self, instrument: &str) -> bool {
        instrument == ENGINE || instrument == FUEL
    }

    fn update(&mut self, instrument: &str, values: &[f64]) -> anyhow::Result<()> {
        let [a, b] = values else {
            bail!("{instrument} expects 2 values, got {}", values.len());
        };
        match instrument {
            ENGINE => self.engine(*a, *b),
            FUEL => self.fuel(*a, *b),
            other => bail!("dashboard has no instrument named {other}"),
        }
        Ok(())
    }
}
