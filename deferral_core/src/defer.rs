// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The runtime: page-wide scheduling state bound to a host.
//!
//! [`Defer`] ties the pure pieces of this crate to a [`Host`]:
//!
//! - the [`Scheduler`] decides when tasks run; `Defer` feeds it the host's
//!   load and gesture events and hands released tasks to the host timer,
//! - the [`reveal`](crate::reveal) engine and a [`Watcher`] implement `dom`
//!   and `reveal`,
//! - [`create_node`] implements `css` and `js`,
//! - a [`Reinjection`] pass per `all` call is pumped from load/error events.
//!
//! `Defer` is a cheap, clonable handle to shared state. Handlers registered
//! with the host hold weak references, so dropping every handle turns
//! pending runtime work (resource attachment, reveals, reinjection) into
//! no-ops. Plain tasks passed to [`schedule`](Defer::schedule) still run.
//!
//! No interior borrow is held while caller code runs, so tasks, resolvers and
//! load callbacks may call back into the runtime.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::config::DeferConfig;
use crate::error::HostError;
use crate::host::{Document, Host, Lifecycle, Settle, Task, Timer, TimerId, Visibility};
use crate::marks::NodeMarks;
use crate::node::{Created, NodeSpec, create_node};
use crate::reinject::{Gate, PendingScript, PreloadHint, Reinjection, Step};
use crate::reveal::{self, Outcome, Resolver};
use crate::scheduler::{Admission, LazyMode, QueuedTask, ReadinessState, Scheduler};
use crate::time::{Delay, HostTime};
use crate::trace::{
    DispatchOrigin, HostErrorEvent, Operation, PhaseEvent, PreloadEvent, ReinjectEvent,
    RevealEvent, ScriptSettledEvent, TaskDispatchEvent, TaskQueuedEvent, TraceSink, Tracer,
};
use crate::watch::{Capability, ObserverOptions, Watch, Watcher};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Arguments of [`Defer::dom`].
pub struct DomOptions<N> {
    /// Elements to watch. Defaults to [`DeferConfig::reveal_selector`].
    pub selector: Option<String>,
    /// Delay before the query runs. Defaults to
    /// [`DeferConfig::default_delay`].
    pub delay: Option<Delay>,
    /// Class names added to each revealed element.
    pub unveiled_class: Option<String>,
    /// Gate consulted before each reveal.
    pub resolver: Option<Resolver<N>>,
    /// Intersection observer parameters.
    pub observer: ObserverOptions,
}

impl<N> DomOptions<N> {
    /// Options with every argument left unspecified.
    #[must_use]
    pub fn new() -> Self {
        Self {
            selector: None,
            delay: None,
            unveiled_class: None,
            resolver: None,
            observer: ObserverOptions::default(),
        }
    }

    /// Sets the selector.
    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Sets the delay.
    #[must_use]
    pub fn delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the unveiled class names.
    #[must_use]
    pub fn unveiled_class(mut self, classes: impl Into<String>) -> Self {
        self.unveiled_class = Some(classes.into());
        self
    }

    /// Sets the resolver.
    #[must_use]
    pub fn resolver(mut self, resolver: impl Fn(&N) -> bool + 'static) -> Self {
        self.resolver = Some(Rc::new(resolver));
        self
    }

    /// Sets the observer options.
    #[must_use]
    pub fn observer(mut self, options: ObserverOptions) -> Self {
        self.observer = options;
        self
    }
}

impl<N> Default for DomOptions<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for DomOptions<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomOptions")
            .field("selector", &self.selector)
            .field("delay", &self.delay)
            .field("unveiled_class", &self.unveiled_class)
            .field("resolver", &self.resolver.is_some())
            .field("observer", &self.observer)
            .finish()
    }
}

/// Arguments of [`Defer::css`] and [`Defer::js`].
#[derive(Default)]
pub struct ResourceOptions {
    /// Identifier or attributes of the element.
    pub spec: NodeSpec,
    /// Delay before the element is created. Defaults to
    /// [`DeferConfig::default_delay`].
    pub delay: Option<Delay>,
    /// Called when the resource loads (not when it fails).
    pub on_load: Option<Task>,
    /// Lane override; `None` follows the process-wide lazy default.
    pub lazy: Option<bool>,
}

impl ResourceOptions {
    /// Options with every argument left unspecified.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identifier or attributes.
    #[must_use]
    pub fn spec(mut self, spec: impl Into<NodeSpec>) -> Self {
        self.spec = spec.into();
        self
    }

    /// Sets the delay.
    #[must_use]
    pub fn delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the load callback.
    #[must_use]
    pub fn on_load(mut self, on_load: impl FnOnce() + 'static) -> Self {
        self.on_load = Some(Box::new(on_load));
        self
    }

    /// Sets the lane override.
    #[must_use]
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = Some(lazy);
        self
    }
}

impl fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("spec", &self.spec)
            .field("delay", &self.delay)
            .field("on_load", &self.on_load.is_some())
            .field("lazy", &self.lazy)
            .finish()
    }
}

/// Arguments of [`Defer::all`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReinjectOptions {
    /// Scripts to reinject. Defaults to
    /// [`DeferConfig::reinject_selector`].
    pub selector: Option<String>,
    /// Delay before discovery. Defaults to [`DeferConfig::default_delay`].
    pub delay: Option<Delay>,
    /// Lane override; `None` follows the process-wide lazy default.
    pub lazy: Option<bool>,
}

impl ReinjectOptions {
    /// Options with every argument left unspecified.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the selector.
    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Sets the delay.
    #[must_use]
    pub fn delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the lane override.
    #[must_use]
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = Some(lazy);
        self
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resource {
    Stylesheet,
    Script,
}

impl Resource {
    fn operation(self) -> Operation {
        match self {
            Self::Stylesheet => Operation::Stylesheet,
            Self::Script => Operation::Script,
        }
    }
}

type Pass<N> = Rc<RefCell<Reinjection<N>>>;

struct Inner<H: Host> {
    host: H,
    config: DeferConfig,
    capability: Capability,
    scheduler: RefCell<Scheduler<Task>>,
    /// Nodes handed to a watcher by `dom`.
    registered: RefCell<H::Marks>,
    /// Nodes that have been revealed.
    revealed: RefCell<H::Marks>,
    deadline: Cell<Option<TimerId>>,
    tracer: RefCell<Tracer>,
}

/// Handle to the page-wide runtime.
pub struct Defer<H: Host> {
    inner: Rc<Inner<H>>,
}

impl<H: Host> Clone for Defer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host> fmt::Debug for Defer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defer")
            .field("phase", &self.phase())
            .field("lazy", &self.lazy())
            .field("pending", &self.pending())
            .field("capability", &self.inner.capability)
            .finish_non_exhaustive()
    }
}

impl<H: Host> Defer<H> {
    /// Binds a runtime to `host`.
    ///
    /// Detects the visibility capability and subscribes to the
    /// load-equivalent event. If the host reports the page as already
    /// loaded, the runtime starts in [`ReadinessState::Ready`].
    pub fn new(host: H, config: DeferConfig) -> Self {
        let capability = Capability::detect(&host);
        let registered = RefCell::new(host.new_marks());
        let revealed = RefCell::new(host.new_marks());
        let this = Self {
            inner: Rc::new(Inner {
                host,
                config,
                capability,
                scheduler: RefCell::new(Scheduler::new(config.lazy)),
                registered,
                revealed,
                deadline: Cell::new(None),
                tracer: RefCell::new(Tracer::none()),
            }),
        };
        if this.inner.host.is_loaded() {
            this.page_loaded();
        } else {
            let weak = this.weak();
            this.inner.host.on_page_load(Box::new(move || {
                if let Some(this) = Self::upgrade(&weak) {
                    this.page_loaded();
                }
            }));
        }
        this
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DeferConfig {
        &self.inner.config
    }

    /// Returns the visibility capability detected at construction.
    #[must_use]
    pub fn capability(&self) -> Capability {
        self.inner.capability
    }

    /// Returns the current readiness phase.
    #[must_use]
    pub fn phase(&self) -> ReadinessState {
        self.inner.scheduler.borrow().state()
    }

    /// Returns the process-wide lazy default.
    #[must_use]
    pub fn lazy(&self) -> LazyMode {
        self.inner.scheduler.borrow().lazy_mode()
    }

    /// Changes the process-wide lazy default.
    ///
    /// A deadline takes effect if it is in force when the page becomes
    /// ready.
    pub fn set_lazy(&self, mode: LazyMode) {
        self.inner.scheduler.borrow_mut().set_lazy_mode(mode);
    }

    /// Returns the number of buffered `(fast, lazy)` tasks.
    #[must_use]
    pub fn pending(&self) -> (usize, usize) {
        self.inner.scheduler.borrow().pending()
    }

    /// Installs a trace sink, replacing any previous one.
    ///
    /// Without the `trace` feature the sink is dropped. Called from inside a
    /// sink callback, the new sink replaces the one running.
    pub fn set_trace_sink(&self, sink: Box<dyn TraceSink>) {
        *self.inner.tracer.borrow_mut() = Tracer::new(sink);
    }

    /// Removes and returns the installed trace sink.
    pub fn take_trace_sink(&self) -> Option<Box<dyn TraceSink>> {
        self.inner.tracer.borrow_mut().take()
    }

    /// Schedules `task` to run `delay` after the page permits it.
    ///
    /// While the page is booting, the task waits in the fast queue (flushed
    /// on load) or, if `lazy` is `Some(true)` or `None` with an active lazy
    /// default, in the lazy queue (flushed on the first user gesture). Once
    /// the page is ready it goes straight to the host timer.
    pub fn schedule(&self, task: impl FnOnce() + 'static, delay: Delay, lazy: Option<bool>) {
        let admission = self
            .inner
            .scheduler
            .borrow_mut()
            .schedule(Box::new(task), delay, lazy);
        match admission {
            Admission::Dispatch(queued) => self.dispatch(queued, DispatchOrigin::Direct),
            Admission::Queued(lane) => {
                self.trace(|t, at| t.task_queued(&TaskQueuedEvent { at, lane, delay }));
            }
        }
    }

    /// Watches elements and reveals each one when it becomes visible.
    ///
    /// At the scheduled time every match not already watched by an earlier
    /// call is registered with the host's intersection observer, or revealed
    /// on the spot if the host has none.
    pub fn dom(&self, options: DomOptions<H::Node>) {
        let delay = options.delay.unwrap_or(self.inner.config.default_delay);
        self.schedule_op(Operation::Observe, delay, None, move |this| {
            this.observe(options)
        });
    }

    /// Attaches a stylesheet link to the head.
    ///
    /// If the options carry an identifier and an element with that id
    /// exists, nothing is attached.
    pub fn css(&self, url: impl Into<String>, options: ResourceOptions) {
        self.resource(Resource::Stylesheet, url.into(), options);
    }

    /// Attaches an external script to the head.
    ///
    /// If the options carry an identifier and an element with that id
    /// exists, nothing is attached.
    pub fn js(&self, url: impl Into<String>, options: ResourceOptions) {
        self.resource(Resource::Script, url.into(), options);
    }

    /// Reinjects deferred scripts in document order.
    ///
    /// Preload hints for every external script are attached first. Then each
    /// script is replaced by an executable copy; a blocking one holds back
    /// the rest until it loads or fails.
    pub fn all(&self, options: ReinjectOptions) {
        let delay = options.delay.unwrap_or(self.inner.config.default_delay);
        let selector = options.selector;
        self.schedule_op(Operation::Reinject, delay, options.lazy, move |this| {
            let selector = selector
                .as_deref()
                .unwrap_or(this.inner.config.reinject_selector);
            this.reinject(selector)
        });
    }

    /// Reveals `node` now, once.
    ///
    /// Descendant `source`/`img` elements are revealed first. A node revealed
    /// before, by this call or by `dom`, is left alone.
    pub fn reveal(
        &self,
        node: &H::Node,
        unveiled_class: Option<&str>,
    ) -> Result<Outcome, HostError> {
        self.reveal_node(node, unveiled_class, None)
    }

    // -- lifecycle ---------------------------------------------------------

    fn page_loaded(&self) {
        let flush = self.inner.scheduler.borrow_mut().page_loaded();
        let Some(flush) = flush else {
            return;
        };
        self.trace(|t, at| {
            t.phase(&PhaseEvent {
                at,
                from: ReadinessState::Booting,
                to: ReadinessState::Ready,
                forced: false,
            });
        });
        for queued in flush.dispatch {
            self.dispatch(queued, DispatchOrigin::FastFlush);
        }
        if flush.await_gesture {
            let weak = self.weak();
            self.inner.host.listen_gestures(Rc::new(move || {
                if let Some(this) = Self::upgrade(&weak) {
                    this.interacted(false);
                }
            }));
            if let Some(deadline) = flush.deadline {
                let weak = self.weak();
                let id = self.inner.host.set_timeout(
                    Box::new(move || {
                        if let Some(this) = Self::upgrade(&weak) {
                            this.interacted(true);
                        }
                    }),
                    deadline,
                );
                self.inner.deadline.set(Some(id));
            }
        }
    }

    fn interacted(&self, forced: bool) {
        let released = self.inner.scheduler.borrow_mut().interacted();
        let Some(released) = released else {
            return;
        };
        self.inner.host.unlisten_gestures();
        if let Some(id) = self.inner.deadline.take()
            && !forced
        {
            self.inner.host.clear_timeout(id);
        }
        self.trace(|t, at| {
            t.phase(&PhaseEvent {
                at,
                from: ReadinessState::Ready,
                to: ReadinessState::Interacting,
                forced,
            });
        });
        for queued in released {
            self.dispatch(queued, DispatchOrigin::LazyFlush);
        }
    }

    fn dispatch(&self, queued: QueuedTask<Task>, origin: DispatchOrigin) {
        let QueuedTask { task, delay } = queued;
        self.trace(|t, at| {
            t.task_dispatched(&TaskDispatchEvent { at, delay, origin });
        });
        self.inner.host.set_timeout(task, delay);
    }

    /// Schedules runtime work that may fail with a host error.
    fn schedule_op(
        &self,
        operation: Operation,
        delay: Delay,
        lazy: Option<bool>,
        body: impl FnOnce(&Self) -> Result<(), HostError> + 'static,
    ) {
        let weak = self.weak();
        self.schedule(
            move || {
                if let Some(this) = Self::upgrade(&weak)
                    && let Err(error) = body(&this)
                {
                    this.report(operation, error);
                }
            },
            delay,
            lazy,
        );
    }

    // -- dom / reveal ------------------------------------------------------

    fn observe(&self, options: DomOptions<H::Node>) -> Result<(), HostError> {
        let inner = &self.inner;
        let selector = options
            .selector
            .as_deref()
            .unwrap_or(inner.config.reveal_selector);
        let matches = inner.host.query_all(selector, None)?;
        let fresh: Vec<H::Node> = {
            let mut registered = inner.registered.borrow_mut();
            matches
                .into_iter()
                .filter(|node| registered.mark(node))
                .collect()
        };
        if fresh.is_empty() {
            return Ok(());
        }

        let weak = self.weak();
        let class = options.unveiled_class;
        let resolver = options.resolver;
        let on_visible: Rc<dyn Fn(H::Node)> = Rc::new(move |node| {
            let Some(this) = Self::upgrade(&weak) else {
                return;
            };
            match this.reveal_node(&node, class.as_deref(), resolver.as_ref()) {
                // No longer watched; a later `dom` may pick it up again.
                Ok(Outcome::Declined) => this.inner.registered.borrow_mut().unmark(&node),
                Ok(_) => {}
                Err(error) => this.report(Operation::Reveal, error),
            }
        });
        let observer = &options.observer;
        let watcher = match Watcher::select(inner.capability, on_visible, |on_visible| {
            inner.host.intersection_observer(observer, on_visible)
        }) {
            Ok(watcher) => watcher,
            Err((error, fallback)) => {
                self.report(Operation::Observe, error);
                fallback
            }
        };
        for node in fresh {
            watcher.watch(node);
        }
        Ok(())
    }

    fn reveal_node(
        &self,
        node: &H::Node,
        unveiled_class: Option<&str>,
        resolver: Option<&Resolver<H::Node>>,
    ) -> Result<Outcome, HostError> {
        let inner = &self.inner;
        let outcome = reveal::reveal(
            &inner.host,
            &inner.revealed,
            &inner.config.reveal,
            node,
            unveiled_class,
            resolver,
        )?;
        self.trace(|t, at| t.reveal(&RevealEvent { at, outcome }));
        Ok(outcome)
    }

    // -- css / js ----------------------------------------------------------

    fn resource(&self, kind: Resource, url: String, options: ResourceOptions) {
        let ResourceOptions {
            spec,
            delay,
            on_load,
            lazy,
        } = options;
        let delay = delay.unwrap_or(self.inner.config.default_delay);
        self.schedule_op(kind.operation(), delay, lazy, move |this| {
            this.attach_resource(kind, &url, &spec, on_load)
        });
    }

    fn attach_resource(
        &self,
        kind: Resource,
        url: &str,
        spec: &NodeSpec,
        on_load: Option<Task>,
    ) -> Result<(), HostError> {
        let host = &self.inner.host;
        let tag = match kind {
            Resource::Stylesheet => "link",
            Resource::Script => "script",
        };
        let Created { node, fresh } = create_node(host, tag, spec, on_load)?;
        if !fresh {
            return Ok(());
        }
        match kind {
            Resource::Stylesheet => {
                host.set_attribute(&node, "rel", "stylesheet")?;
                host.set_attribute(&node, "href", url)?;
            }
            Resource::Script => host.set_attribute(&node, "src", url)?,
        }
        host.append_to_head(&node)
    }

    // -- reinjection -------------------------------------------------------

    fn reinject(&self, selector: &str) -> Result<(), HostError> {
        let host = &self.inner.host;
        let scripts = host
            .query_all(selector, None)?
            .into_iter()
            .map(|node| {
                let attributes = host.attributes(&node);
                let text = host.text(&node);
                PendingScript::new(node, attributes, text)
            })
            .collect();
        let plan = Reinjection::new(scripts);

        for hint in plan.preload_hints() {
            if let Err(error) = self.attach_hint(hint) {
                self.report(Operation::Reinject, error);
            }
        }

        self.pump(&Rc::new(RefCell::new(plan)));
        Ok(())
    }

    fn attach_hint(&self, hint: &PreloadHint) -> Result<(), HostError> {
        let host = &self.inner.host;
        let link = host.create_element("link")?;
        for (name, value) in &hint.attributes {
            self.copy_attribute(&link, name, value);
        }
        host.append_to_head(&link)?;
        self.trace(|t, at| {
            t.preload(&PreloadEvent {
                at,
                href: hint.href().into(),
            });
        });
        Ok(())
    }

    /// Sets one copied attribute. A name the host rejects is reported and
    /// skipped; it never stops the element from being built.
    fn copy_attribute(&self, node: &H::Node, name: &str, value: &str) {
        if let Err(error) = self.inner.host.set_attribute(node, name, value) {
            self.report(Operation::Reinject, error);
        }
    }

    /// Attaches replacements until the pass finishes or blocks.
    ///
    /// A step that cannot be attached is reported and, if blocking, settled
    /// as failed, so the scripts after it still run.
    fn pump(&self, pass: &Pass<H::Node>) {
        loop {
            let step = pass.borrow_mut().next_step();
            let Some(step) = step else {
                return;
            };
            let (seq, gate) = (step.seq, step.gate);
            if let Err(error) = self.attach_step(pass, step) {
                self.report(Operation::Reinject, error);
                if gate == Gate::Blocking && pass.borrow_mut().settle(seq) {
                    self.trace(|t, at| {
                        t.script_settled(&ScriptSettledEvent {
                            at,
                            seq,
                            settle: Settle::Failed,
                        });
                    });
                }
            }
        }
    }

    fn attach_step(&self, pass: &Pass<H::Node>, step: Step<H::Node>) -> Result<(), HostError> {
        let host = &self.inner.host;
        let script = &step.script;
        let replacement = host.create_element("script")?;
        for (name, value) in script.replacement_attributes() {
            self.copy_attribute(&replacement, &name, &value);
        }
        if !script.text.is_empty() {
            host.set_text(&replacement, &script.text);
        }
        if step.gate == Gate::Blocking {
            // Bound before attaching so the settle cannot be missed.
            let weak = self.weak();
            let pass = Rc::clone(pass);
            let seq = step.seq;
            host.on_settle(
                &replacement,
                Box::new(move |settle| {
                    if let Some(this) = Self::upgrade(&weak) {
                        this.resume(&pass, seq, settle);
                    }
                }),
            );
        }
        self.trace(|t, at| {
            t.reinject(&ReinjectEvent {
                at,
                seq: step.seq,
                gate: step.gate,
                src: script.src().map(Into::into),
            });
        });
        host.replace(&script.node, &replacement)
    }

    fn resume(&self, pass: &Pass<H::Node>, seq: usize, settle: Settle) {
        if !pass.borrow_mut().settle(seq) {
            return;
        }
        self.trace(|t, at| t.script_settled(&ScriptSettledEvent { at, seq, settle }));
        self.pump(pass);
    }

    // -- plumbing ----------------------------------------------------------

    pub(crate) fn report(&self, operation: Operation, error: HostError) {
        self.trace(|t, at| {
            t.host_error(&HostErrorEvent {
                at,
                operation,
                error,
            });
        });
    }

    /// Runs `emit` only if a sink is installed, so the clock is not read for
    /// nothing.
    ///
    /// The sink is moved out of the cell while it runs, so it may call back
    /// into the runtime. Events raised meanwhile are dropped.
    fn trace(&self, emit: impl FnOnce(&mut Tracer, HostTime)) {
        if !self.inner.tracer.borrow().is_enabled() {
            return;
        }
        let at = self.inner.host.now();
        let mut tracer = self.inner.tracer.take();
        emit(&mut tracer, at);
        let mut slot = self.inner.tracer.borrow_mut();
        if !slot.is_enabled() {
            *slot = tracer;
        }
    }

    fn weak(&self) -> Weak<Inner<H>> {
        Rc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<Inner<H>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// A handle that does not keep the runtime alive.
    pub(crate) fn downgrade(&self) -> WeakDefer<H> {
        WeakDefer(self.weak())
    }
}

/// Weak counterpart of [`Defer`], for closures the runtime itself stores.
pub(crate) struct WeakDefer<H: Host>(Weak<Inner<H>>);

impl<H: Host> WeakDefer<H> {
    pub(crate) fn upgrade(&self) -> Option<Defer<H>> {
        Defer::upgrade(&self.0)
    }
}
