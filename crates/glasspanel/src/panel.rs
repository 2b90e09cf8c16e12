//! The assembled panel: registry, scheduler and dashboard driven together.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::Result;
use crate::property::{PropertyPath, PropertyValue};
use crate::registry::{InstrumentId, Registry};
use crate::render::Renderer;
use crate::scheduler::FrameScheduler;
use crate::transport::PropertyTransport;

/// A dashboard wired to its instruments.
///
/// The caller owns the event loop: it forwards connection events with
/// [`open`](Self::open) and [`property_changed`](Self::property_changed),
/// moves time forward with [`advance`](Self::advance) and ticks frames with
/// [`frame`](Self::frame).
#[derive(Debug)]
pub struct Panel<P, R> {
    registry: Registry<P>,
    scheduler: FrameScheduler<InstrumentId>,
    dashboard: Rc<RefCell<Dashboard<R>>>,
}

impl<P, R> Panel<P, R>
where
    P: PropertyTransport,
    R: Renderer + 'static,
{
    /// Build the dashboard, register the configured instruments against it
    /// and mount it.
    ///
    /// # Errors
    ///
    /// Returns an error if an instrument cannot be registered or the renderer
    /// cannot mount.
    pub fn new(config: &Config, transport: P, renderer: R) -> Result<Self> {
        let dashboard = Rc::new(RefCell::new(Dashboard::new(
            config.dashboard.clone(),
            renderer,
        )));

        let mut registry = Registry::new(transport);
        let ids = registry
            .define(
                &dashboard,
                &config.descriptor(),
                &config.instrument_options(),
            )
            .map_err(|e| {
                if e.is_registration_error() {
                    error!(error = %e, "instrument configuration rejected");
                }
                e
            })?;
        dashboard.borrow_mut().mount()?;
        info!(instruments = ids.len(), "panel ready");

        Ok(Self {
            registry,
            scheduler: FrameScheduler::new(),
            dashboard,
        })
    }

    /// Forward the transport's connection-open event.
    pub fn open(&mut self) {
        debug!("connection opened");
        self.registry.connection_opened(&mut self.scheduler);
    }

    /// Forward a property change.
    pub fn property_changed(&mut self, path: &PropertyPath, value: PropertyValue) {
        self.registry
            .property_changed(path, value, &mut self.scheduler);
    }

    /// Move time forward and run the dispatches that became due.
    /// Returns how many ran.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        let due = self.scheduler.advance(elapsed);
        let count = due.len();
        for id in due {
            self.registry.fire(id);
        }
        count
    }

    /// Tick one frame: run frame-aligned dispatches, then let the dashboard
    /// render. Returns whether a frame was rendered.
    pub fn frame(&mut self) -> bool {
        for id in self.scheduler.take_frame() {
            self.registry.fire(id);
        }
        self.dashboard.borrow_mut().on_frame()
    }

    /// Whether no dispatch or render is waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle() && !self.dashboard.borrow().is_render_pending()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// The instrument registry.
    #[must_use]
    pub fn registry(&self) -> &Registry<P> {
        &self.registry
    }

    /// The dashboard.
    #[must_use]
    pub fn dashboard(&self) -> Ref<'_, Dashboard<R>> {
        self.dashboard.borrow()
    }
}
