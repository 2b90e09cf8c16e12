//! `glasspanel` - An engine and fuel glass dashboard for simulator property feeds
//!
//! This library provides an instrument registry that binds named groups of
//! simulator property paths to update handlers, and a dashboard that smooths,
//! classifies and renders engine and fuel readings once per frame.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod panel;
pub mod property;
pub mod registry;
pub mod render;
pub mod replay;
pub mod scheduler;
pub mod transport;

pub use config::Config;
pub use dashboard::{Dashboard, DashboardOptions, Thresholds};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use panel::Panel;
pub use property::{PropertyPath, PropertyValue};
pub use registry::{Descriptor, Handler, InstrumentId, InstrumentOptions, InstrumentTarget, Registry};
pub use render::{HtmlRenderer, RenderState, Renderer, Status, TextRenderer};
pub use scheduler::{FrameScheduler, Scheduler, Wake};
pub use transport::{PropertyTransport, ReplayTransport};
