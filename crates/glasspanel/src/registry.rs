//! Instrument registry.
//!
//! An instrument is a named, ordered group of property paths whose values are
//! delivered together to one handler, as positional arguments in declaration
//! order. The registry subscribes each path on the transport, caches the
//! latest value per path, and decides when to call the handler according to
//! the instrument's [`DispatchPolicy`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::property::{PropertyPath, PropertyRecord, PropertyValue};
use crate::scheduler::{Scheduler, TaskId, Wake};
use crate::transport::PropertyTransport;

/// Callback bound to an instrument. Receives the numeric values in alias
/// order.
pub type Handler = Box<dyn FnMut(&[f64]) -> anyhow::Result<()>>;

/// Index of an instrument within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(usize);

/// When accumulated updates are delivered to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Call the handler synchronously on every update.
    #[default]
    Immediate,
    /// Call the handler once updates have been quiet for the given period.
    Debounced(Duration),
    /// Call the handler at most once per frame.
    FrameAligned,
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Debounced(wait) => write!(f, "debounced({}ms)", wait.as_millis()),
            Self::FrameAligned => write!(f, "frame-aligned"),
        }
    }
}

/// Named dispatch modes accepted in options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Frame-aligned dispatch.
    Raf,
}

/// Per-instrument options, as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentOptions {
    /// `raf` selects frame-aligned dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<DispatchMode>,
    /// Quiet period in milliseconds for debounced dispatch.
    #[serde(alias = "debounce", skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

impl InstrumentOptions {
    /// Options selecting frame-aligned dispatch.
    #[must_use]
    pub fn raf() -> Self {
        Self {
            mode: Some(DispatchMode::Raf),
            debounce_ms: None,
        }
    }

    /// Options selecting debounced dispatch.
    #[must_use]
    pub fn debounce(ms: u64) -> Self {
        Self {
            mode: None,
            debounce_ms: Some(ms),
        }
    }

    /// Resolve the dispatch policy. Frame-aligned wins over debounce.
    #[must_use]
    pub fn policy(&self) -> DispatchPolicy {
        match (self.mode, self.debounce_ms) {
            (Some(DispatchMode::Raf), _) => DispatchPolicy::FrameAligned,
            (None, Some(ms)) => DispatchPolicy::Debounced(Duration::from_millis(ms)),
            (None, None) => DispatchPolicy::Immediate,
        }
    }
}

/// A registered instrument.
pub struct Instrument {
    name: String,
    handler: Option<Handler>,
    props: Vec<PropertyRecord>,
    policy: DispatchPolicy,
    pending: Option<TaskId>,
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .field("props", &self.props)
            .field("policy", &self.policy)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Instrument {
    /// Instrument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch policy.
    #[must_use]
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Property records in declaration order.
    #[must_use]
    pub fn records(&self) -> &[PropertyRecord] {
        &self.props
    }

    /// Aliases in declaration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.props.iter().map(|p| p.alias.as_str())
    }

    /// Current numeric values in declaration order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.props.iter().map(|p| p.num).collect()
    }

    /// Whether a handler is bound.
    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Whether a scheduled dispatch is waiting to fire.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// An object that receives updates for several instruments.
///
/// Used with [`Registry::define`]: the target states up front which
/// instrument names it handles and receives each update tagged with the
/// instrument name.
pub trait InstrumentTarget {
    /// Whether this target has a handler for `instrument`.
    fn handles(&self, instrument: &str) -> bool;

    /// Receive the values of `instrument` in declaration order.
    ///
    /// # Errors
    ///
    /// Errors are logged by the registry and otherwise ignored.
    fn update(&mut self, instrument: &str, values: &[f64]) -> anyhow::Result<()>;
}

/// An ordered set of instrument declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    instruments: Vec<(String, Vec<(String, String)>)>,
}

impl Descriptor {
    /// Create an empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument with its `(alias, path)` pairs.
    #[must_use]
    pub fn instrument<A, P>(
        mut self,
        name: impl Into<String>,
        props: impl IntoIterator<Item = (A, P)>,
    ) -> Self
    where
        A: Into<String>,
        P: Into<String>,
    {
        let props = props
            .into_iter()
            .map(|(alias, path)| (alias.into(), path.into()))
            .collect();
        self.instruments.push((name.into(), props));
        self
    }

    /// Iterate over declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(String, String)])> {
        self.instruments
            .iter()
            .map(|(name, props)| (name.as_str(), props.as_slice()))
    }

    /// Number of declared instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// Registry of instruments bound to one property transport.
pub struct Registry<P> {
    transport: P,
    instruments: Vec<Instrument>,
    open: bool,
    queued: Vec<(PropertyPath, PropertyValue)>,
}

impl<P: fmt::Debug> fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("transport", &self.transport)
            .field("instruments", &self.instruments)
            .field("open", &self.open)
            .field("queued", &self.queued.len())
            .finish()
    }
}

impl<P: PropertyTransport> Registry<P> {
    /// Create a registry on a transport whose connection is not open yet.
    #[must_use]
    pub fn new(transport: P) -> Self {
        Self {
            transport,
            instruments: Vec::new(),
            open: false,
            queued: Vec::new(),
        }
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &P {
        &self.transport
    }

    /// Whether the connection-open event has been seen.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of registered instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether no instrument is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Number of paths with an update waiting for the connection to open.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Look up an instrument id by name.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<InstrumentId> {
        self.instruments
            .iter()
            .position(|i| i.name == name)
            .map(InstrumentId)
    }

    /// Look up an instrument by name.
    #[must_use]
    pub fn instrument(&self, name: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.name == name)
    }

    /// Register one instrument.
    ///
    /// Paths may be relative; they are prefixed with `/`. If the connection
    /// is already open the paths are subscribed now, otherwise on
    /// [`connection_opened`](Self::connection_opened).
    ///
    /// A `None` handler is allowed: the instrument caches values but stays
    /// inert until [`bind`](Self::bind) is called.
    ///
    /// # Errors
    ///
    /// Returns a registration error if the name is blank, already
    /// registered, the path map is empty, an alias repeats, or a path is
    /// empty.
    pub fn register<A, S>(
        &mut self,
        name: &str,
        path_map: impl IntoIterator<Item = (A, S)>,
        handler: Option<Handler>,
        options: &InstrumentOptions,
    ) -> Result<InstrumentId>
    where
        A: Into<String>,
        S: AsRef<str>,
    {
        if name.trim().is_empty() {
            return Err(Error::InvalidInstrumentName {
                name: name.to_string(),
            });
        }
        if self.id(name).is_some() {
            return Err(Error::DuplicateInstrument {
                name: name.to_string(),
            });
        }

        let props = path_map
            .into_iter()
            .map(|(alias, path)| Ok(PropertyRecord::new(alias, PropertyPath::new(path)?)))
            .collect::<Result<Vec<_>>>()?;
        if props.is_empty() {
            return Err(Error::EmptyPropertyMap {
                instrument: name.to_string(),
            });
        }
        if let Some(dup) = props
            .iter()
            .enumerate()
            .find(|(i, rec)| props[..*i].iter().any(|r| r.alias == rec.alias))
            .map(|(_, rec)| rec.alias.clone())
        {
            return Err(Error::DuplicateAlias {
                instrument: name.to_string(),
                alias: dup,
            });
        }

        if handler.is_none() {
            warn!(
                instrument = name,
                "no handler bound; updates will be ignored until one is added"
            );
        }

        let policy = options.policy();
        debug!(instrument = name, %policy, props = props.len(), "registered instrument");

        let id = InstrumentId(self.instruments.len());
        self.instruments.push(Instrument {
            name: name.to_string(),
            handler,
            props,
            policy,
            pending: None,
        });

        if self.open {
            self.subscribe_pending();
        }
        Ok(id)
    }

    /// Register every instrument of `descriptor` against `target`.
    ///
    /// Instruments the target does not handle are registered without a
    /// handler.
    ///
    /// # Errors
    ///
    /// Stops at the first registration error.
    pub fn define<T>(
        &mut self,
        target: &Rc<RefCell<T>>,
        descriptor: &Descriptor,
        options: &BTreeMap<String, InstrumentOptions>,
    ) -> Result<Vec<InstrumentId>>
    where
        T: InstrumentTarget + 'static,
    {
        let mut ids = Vec::with_capacity(descriptor.len());
        for (name, props) in descriptor.iter() {
            let handler = target
                .borrow()
                .handles(name)
                .then(|| target_handler(target, name));
            let opts = options.get(name).cloned().unwrap_or_default();
            let pairs = props.iter().map(|(a, p)| (a.as_str(), p.as_str()));
            ids.push(self.register(name, pairs, handler, &opts)?);
        }
        Ok(ids)
    }

    /// Bind a handler to an instrument that was registered without one, or
    /// replace the existing handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownInstrument`] if no instrument has this name.
    pub fn bind(&mut self, name: &str, handler: Handler) -> Result<()> {
        let inst = self
            .instruments
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::UnknownInstrument {
                name: name.to_string(),
            })?;
        inst.handler = Some(handler);
        debug!(instrument = name, "handler bound");
        Ok(())
    }

    /// Handle the transport's connection-open event.
    ///
    /// Subscribes every record not yet subscribed, then applies the latest
    /// update each path received while the connection was closed, in the
    /// order the paths first changed.
    pub fn connection_opened(&mut self, scheduler: &mut dyn Scheduler<InstrumentId>) {
        self.open = true;
        self.subscribe_pending();

        let queued = std::mem::take(&mut self.queued);
        if !queued.is_empty() {
            debug!(updates = queued.len(), "applying updates queued before open");
        }
        for (path, value) in queued {
            self.property_changed(&path, value, scheduler);
        }
    }

    /// Handle a value-changed notification for `path`.
    pub fn property_changed(
        &mut self,
        path: &PropertyPath,
        value: PropertyValue,
        scheduler: &mut dyn Scheduler<InstrumentId>,
    ) {
        if !self.open {
            self.queue(path, value);
            return;
        }

        let mut owners = Vec::new();
        for (idx, inst) in self.instruments.iter_mut().enumerate() {
            let mut hit = false;
            for rec in inst.props.iter_mut().filter(|r| r.path == *path) {
                rec.update(value.clone());
                hit = true;
            }
            if hit {
                owners.push(InstrumentId(idx));
            }
        }

        if owners.is_empty() {
            trace!(%path, "update for unregistered path ignored");
        }
        for id in owners {
            self.schedule_dispatch(id, scheduler);
        }
    }

    /// Run a scheduled dispatch. Called by the driver when a task handed to
    /// the scheduler becomes due.
    pub fn fire(&mut self, id: InstrumentId) {
        if let Some(inst) = self.instruments.get_mut(id.0) {
            inst.pending = None;
        }
        self.dispatch(id);
    }

    // One entry per registered path, holding its latest value
    fn queue(&mut self, path: &PropertyPath, value: PropertyValue) {
        if let Some(slot) = self.queued.iter_mut().find(|(p, _)| p == path) {
            slot.1 = value;
            return;
        }
        let known = self
            .instruments
            .iter()
            .any(|i| i.props.iter().any(|r| r.path == *path));
        if known {
            trace!(%path, "connection not open; queueing update");
            self.queued.push((path.clone(), value));
        } else {
            trace!(%path, "connection not open; dropping update for unregistered path");
        }
    }

    fn subscribe_pending(&mut self) {
        for inst in &mut self.instruments {
            for rec in inst.props.iter_mut().filter(|r| !r.is_subscribed()) {
                match self.transport.subscribe(&rec.path) {
                    Ok(sub) => {
                        debug!(instrument = %inst.name, path = %rec.path, "subscribed");
                        rec.subscription = Some(sub);
                    }
                    Err(e) => {
                        error!(instrument = %inst.name, path = %rec.path, error = %e, "subscription failed");
                    }
                }
            }
        }
    }

    fn schedule_dispatch(&mut self, id: InstrumentId, scheduler: &mut dyn Scheduler<InstrumentId>) {
        let Some(inst) = self.instruments.get_mut(id.0) else {
            return;
        };
        if inst.handler.is_none() {
            return;
        }

        match inst.policy {
            DispatchPolicy::FrameAligned => {
                if inst.pending.is_none() {
                    inst.pending = Some(scheduler.schedule_once(Wake::NextFrame, id));
                }
            }
            DispatchPolicy::Debounced(wait) => {
                if let Some(task) = inst.pending.take() {
                    scheduler.cancel(task);
                }
                inst.pending = Some(scheduler.schedule_once(Wake::After(wait), id));
            }
            DispatchPolicy::Immediate => self.dispatch(id),
        }
    }

    fn dispatch(&mut self, id: InstrumentId) {
        let Some(inst) = self.instruments.get_mut(id.0) else {
            return;
        };
        let args: Vec<f64> = inst.props.iter().map(|p| p.num).collect();
        let Some(handler) = inst.handler.as_mut() else {
            return;
        };

        trace!(instrument = %inst.name, ?args, "dispatch");
        if let Err(e) = handler(&args) {
            error!(instrument = %inst.name, error = %e, "error invoking instrument handler");
        }
    }
}

fn target_handler<T>(target: &Rc<RefCell<T>>, name: &str) -> Handler
where
    T: InstrumentTarget + 'static,
{
    let target = Rc::clone(target);
    let name = name.to_string();
    Box::new(move |args| {
        let mut target = target
            .try_borrow_mut()
            .map_err(|e| anyhow::anyhow!("target for {name} is busy: {e}"))?;
        target.update(&name, args)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::FrameScheduler;
    use crate::transport::ReplayTransport;

    type Calls = Rc<RefCell<Vec<Vec<f64>>>>;

    fn recorder() -> (Calls, Handler) {
        let calls: Calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let handler: Handler = Box::new(move |args| {
            sink.borrow_mut().push(args.to_vec());
            Ok(())
        });
        (calls, handler)
    }

    fn path(p: &str) -> PropertyPath {
        PropertyPath::new(p).unwrap()
    }

    fn open_registry() -> (Registry<ReplayTransport>, FrameScheduler<InstrumentId>) {
        let mut registry = Registry::new(ReplayTransport::new());
        let mut sched = FrameScheduler::new();
        registry.connection_opened(&mut sched);
        (registry, sched)
    }

    const ENGINE: [(&str, &str); 2] = [
        ("rpm", "/engines/engine/rpm"),
        ("cht", "/engines/engine/cht-degf"),
    ];

    #[test]
    fn test_duplicate_registration_fails() {
        let (mut registry, _) = open_registry();
        registry
            .register("Engine", ENGINE, None, &InstrumentOptions::default())
            .unwrap();

        let err = registry
            .register("Engine", ENGINE, None, &InstrumentOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateInstrument { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_blank_name_fails() {
        let (mut registry, _) = open_registry();
        let err = registry
            .register(" ", ENGINE, None, &InstrumentOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInstrumentName { .. }));
    }

    #[test]
    fn test_empty_path_map_fails() {
        let (mut registry, _) = open_registry();
        let empty: [(&str, &str); 0] = [];
        let err = registry
            .register("Engine", empty, None, &InstrumentOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyPropertyMap { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_alias_fails() {
        let (mut registry, _) = open_registry();
        let err = registry
            .register(
                "Engine",
                [("rpm", "/a"), ("rpm", "/b")],
                None,
                &InstrumentOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias { ref alias, .. } if alias == "rpm"));
        assert!(err.is_registration_error());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_path_fails() {
        let (mut registry, _) = open_registry();
        let err = registry
            .register("Engine", [("rpm", "")], None, &InstrumentOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPropertyPath { .. }));
    }

    #[test]
    fn test_relative_paths_normalized() {
        let (mut registry, _) = open_registry();
        registry
            .register(
                "Fuel",
                [("left", "consumables/fuel/tank/level-gal")],
                None,
                &InstrumentOptions::default(),
            )
            .unwrap();

        let inst = registry.instrument("Fuel").unwrap();
        assert_eq!(
            inst.records()[0].path.as_str(),
            "/consumables/fuel/tank/level-gal"
        );
    }

    #[test]
    fn test_subscriptions_deferred_until_open() {
        let mut registry = Registry::new(ReplayTransport::new());
        let mut sched = FrameScheduler::new();
        registry
            .register("Engine", ENGINE, None, &InstrumentOptions::default())
            .unwrap();
        assert!(registry.transport().subscriptions().is_empty());

        registry.connection_opened(&mut sched);
        assert_eq!(registry.transport().subscriptions().len(), 2);

        // A repeated open event does not subscribe again
        registry.connection_opened(&mut sched);
        assert_eq!(registry.transport().subscriptions().len(), 2);
    }

    #[test]
    fn test_register_after_open_subscribes_immediately() {
        let (mut registry, _) = open_registry();
        registry
            .register("Engine", ENGINE, None, &InstrumentOptions::default())
            .unwrap();

        assert_eq!(registry.transport().subscriptions().len(), 2);
        assert!(registry
            .instrument("Engine")
            .unwrap()
            .records()
            .iter()
            .all(PropertyRecord::is_subscribed));
    }

    #[test]
    fn test_argument_order_matches_declaration() {
        let (mut registry, mut sched) = open_registry();
        let (calls, handler) = recorder();
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::default())
            .unwrap();

        // cht arrives before rpm
        registry.property_changed(&path("/engines/engine/cht-degf"), 380.0.into(), &mut sched);
        registry.property_changed(&path("/engines/engine/rpm"), 2300.0.into(), &mut sched);

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec![0.0, 380.0]);
        assert_eq!(calls[1], vec![2300.0, 380.0]);
    }

    #[test]
    fn test_update_before_open_applied_once() {
        let mut registry = Registry::new(ReplayTransport::new());
        let mut sched = FrameScheduler::new();
        let (calls, handler) = recorder();
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::default())
            .unwrap();

        registry.property_changed(&path("/engines/engine/rpm"), 2400.0.into(), &mut sched);
        assert!(calls.borrow().is_empty());
        assert_eq!(registry.queued(), 1);

        registry.connection_opened(&mut sched);
        assert_eq!(calls.borrow().as_slice(), &[vec![2400.0, 0.0]]);
        assert_eq!(registry.queued(), 0);

        registry.connection_opened(&mut sched);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_queue_keeps_latest_value_per_path() {
        let mut registry = Registry::new(ReplayTransport::new());
        let mut sched = FrameScheduler::new();
        let (calls, handler) = recorder();
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::default())
            .unwrap();

        for rpm in 0..1000 {
            registry.property_changed(&path("/engines/engine/rpm"), f64::from(rpm).into(), &mut sched);
        }
        registry.property_changed(&path("/not/registered"), 1.0.into(), &mut sched);
        assert_eq!(registry.queued(), 1);

        registry.property_changed(&path("/engines/engine/cht-degf"), 350.0.into(), &mut sched);
        assert_eq!(registry.queued(), 2);

        registry.connection_opened(&mut sched);
        assert_eq!(
            calls.borrow().as_slice(),
            &[vec![999.0, 0.0], vec![999.0, 350.0]]
        );
    }

    #[test]
    fn test_debounce_fires_once_with_last_values() {
        let (mut registry, mut sched) = open_registry();
        let (calls, handler) = recorder();
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::debounce(100))
            .unwrap();
        let rpm = path("/engines/engine/rpm");

        for (i, value) in [2000.0, 2100.0, 2200.0, 2300.0, 2400.0].into_iter().enumerate() {
            registry.property_changed(&rpm, value.into(), &mut sched);
            if i < 4 {
                for id in sched.advance(Duration::from_millis(20)) {
                    registry.fire(id);
                }
            }
        }
        assert!(calls.borrow().is_empty());
        assert!(registry.instrument("Engine").unwrap().is_pending());

        for id in sched.advance(Duration::from_millis(100)) {
            registry.fire(id);
        }
        assert_eq!(calls.borrow().as_slice(), &[vec![2400.0, 0.0]]);
        assert!(!registry.instrument("Engine").unwrap().is_pending());
        assert!(sched.is_idle());
    }

    #[test]
    fn test_frame_aligned_coalesces_updates() {
        let (mut registry, mut sched) = open_registry();
        let (calls, handler) = recorder();
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::raf())
            .unwrap();

        registry.property_changed(&path("/engines/engine/rpm"), 1000.0.into(), &mut sched);
        registry.property_changed(&path("/engines/engine/rpm"), 1100.0.into(), &mut sched);
        registry.property_changed(&path("/engines/engine/cht-degf"), 300.0.into(), &mut sched);
        assert!(calls.borrow().is_empty());
        assert_eq!(sched.pending(), 1);

        for id in sched.take_frame() {
            registry.fire(id);
        }
        assert_eq!(calls.borrow().as_slice(), &[vec![1100.0, 300.0]]);

        registry.property_changed(&path("/engines/engine/rpm"), 1200.0.into(), &mut sched);
        for id in sched.take_frame() {
            registry.fire(id);
        }
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_missing_handler_is_inert_until_bound() {
        let (mut registry, mut sched) = open_registry();
        registry
            .register("Engine", ENGINE, None, &InstrumentOptions::default())
            .unwrap();
        registry.property_changed(&path("/engines/engine/rpm"), 2500.0.into(), &mut sched);

        let inst = registry.instrument("Engine").unwrap();
        assert!(!inst.has_handler());
        assert_eq!(inst.values(), vec![2500.0, 0.0]);

        let (calls, handler) = recorder();
        registry.bind("Engine", handler).unwrap();
        registry.property_changed(&path("/engines/engine/cht-degf"), 350.0.into(), &mut sched);
        assert_eq!(calls.borrow().as_slice(), &[vec![2500.0, 350.0]]);
    }

    #[test]
    fn test_bind_unknown_instrument() {
        let (mut registry, _) = open_registry();
        let (_, handler) = recorder();
        let err = registry.bind("Radio", handler).unwrap_err();
        assert!(matches!(err, Error::UnknownInstrument { .. }));
    }

    #[test]
    fn test_handler_error_does_not_stop_updates() {
        crate::logging::init_test_logging();
        let (mut registry, mut sched) = open_registry();
        let count = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&count);
        let handler: Handler = Box::new(move |_| {
            *seen.borrow_mut() += 1;
            anyhow::bail!("gauge exploded")
        });
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::default())
            .unwrap();

        registry.property_changed(&path("/engines/engine/rpm"), 1.0.into(), &mut sched);
        registry.property_changed(&path("/engines/engine/rpm"), 2.0.into(), &mut sched);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_non_numeric_value_dispatches_zero() {
        let (mut registry, mut sched) = open_registry();
        let (calls, handler) = recorder();
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::default())
            .unwrap();

        registry.property_changed(&path("/engines/engine/rpm"), "n/a".into(), &mut sched);
        assert_eq!(calls.borrow().as_slice(), &[vec![0.0, 0.0]]);
    }

    #[test]
    fn test_unknown_path_ignored() {
        let (mut registry, mut sched) = open_registry();
        let (calls, handler) = recorder();
        registry
            .register("Engine", ENGINE, Some(handler), &InstrumentOptions::default())
            .unwrap();

        registry.property_changed(&path("/sim/time/elapsed-sec"), 12.0.into(), &mut sched);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_options_policy() {
        assert_eq!(InstrumentOptions::default().policy(), DispatchPolicy::Immediate);
        assert_eq!(InstrumentOptions::raf().policy(), DispatchPolicy::FrameAligned);
        assert_eq!(
            InstrumentOptions::debounce(50).policy(),
            DispatchPolicy::Debounced(Duration::from_millis(50))
        );

        let both = InstrumentOptions {
            mode: Some(DispatchMode::Raf),
            debounce_ms: Some(50),
        };
        assert_eq!(both.policy(), DispatchPolicy::FrameAligned);
    }

    #[test]
    fn test_options_deserialize_debounce_alias() {
        let opts: InstrumentOptions = serde_json::from_str(r#"{"debounce": 75}"#).unwrap();
        assert_eq!(opts.debounce_ms, Some(75));
        let opts: InstrumentOptions = serde_json::from_str(r#"{"mode": "raf"}"#).unwrap();
        assert_eq!(opts.policy(), DispatchPolicy::FrameAligned);
    }

    #[derive(Default)]
    struct EngineOnly {
        seen: Vec<(String, Vec<f64>)>,
    }

    impl InstrumentTarget for EngineOnly {
        fn handles(&self, instrument: &str) -> bool {
            instrument == "Engine"
        }

        fn update(&mut self, instrument: &str, values: &[f64]) -> anyhow::Result<()> {
            self.seen.push((instrument.to_string(), values.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_define_binds_handled_instruments() {
        let (mut registry, mut sched) = open_registry();
        let target = Rc::new(RefCell::new(EngineOnly::default()));
        let descriptor = Descriptor::new().instrument("Engine", ENGINE).instrument(
            "Fuel",
            [
                ("left", "/consumables/fuel/tank/level-gal"),
                ("right", "/consumables/fuel/tank[1]/level-gal"),
            ],
        );
        let mut options = BTreeMap::new();
        options.insert("Fuel".to_string(), InstrumentOptions::debounce(10));

        let ids = registry.define(&target, &descriptor, &options).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(registry.instrument("Engine").unwrap().has_handler());
        assert!(!registry.instrument("Fuel").unwrap().has_handler());
        assert_eq!(
            registry.instrument("Fuel").unwrap().policy(),
            DispatchPolicy::Debounced(Duration::from_millis(10))
        );

        registry.property_changed(&path("/engines/engine/rpm"), 2000.0.into(), &mut sched);
        registry.property_changed(
            &path("/consumables/fuel/tank/level-gal"),
            12.0.into(),
            &mut sched,
        );
        assert_eq!(
            target.borrow().seen,
            vec![("Engine".to_string(), vec![2000.0, 0.0])]
        );
        assert!(sched.is_idle());
    }

    #[test]
    fn test_define_duplicate_in_descriptor_fails() {
        let (mut registry, _) = open_registry();
        let target = Rc::new(RefCell::new(EngineOnly::default()));
        let descriptor = Descriptor::new()
            .instrument("Engine", ENGINE)
            .instrument("Engine", ENGINE);

        let err = registry
            .define(&target, &descriptor, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateInstrument { .. }));
    }
}
