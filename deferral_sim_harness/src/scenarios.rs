// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end runs of the runtime against the simulated page.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use deferral_core::config::DeferConfig;
use deferral_core::defer::{Defer, DomOptions, ReinjectOptions, ResourceOptions};
use deferral_core::error::HostError;
use deferral_core::helpers::{
    Debounce, LOADED_CLASS, MEDIA_CLASS, ROOT_READY_CLASS, Throttle, lazy_media,
};
use deferral_core::host::{Document, Settle};
use deferral_core::node::NodeSpec;
use deferral_core::reveal::{Outcome, RevealReport};
use deferral_core::scheduler::{LazyMode, ReadinessState};
use deferral_core::time::{Delay, HostTime};
use deferral_core::trace::{HostErrorEvent, Operation, PhaseEvent, TraceSink};

use crate::{NodeId, PageEvent, Route, SimHost};

fn runtime(host: &SimHost) -> Defer<SimHost> {
    Defer::new(host.clone(), DeferConfig::web())
}

fn log() -> Rc<RefCell<Vec<&'static str>>> {
    Rc::new(RefCell::new(Vec::new()))
}

fn push(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> impl FnOnce() + 'static {
    let log = Rc::clone(log);
    move || log.borrow_mut().push(label)
}

/// Script attach/settle events, ignoring preload links.
fn script_events(host: &SimHost) -> Vec<String> {
    host.journal()
        .into_iter()
        .filter_map(|e| match e {
            PageEvent::Attached { tag, url } if tag == "script" => {
                Some(alloc::format!("attach {}", url.unwrap_or_default()))
            }
            PageEvent::Settled { tag, url, settle } if tag == "script" => Some(match settle {
                Settle::Loaded => alloc::format!("load {url}"),
                Settle::Failed => alloc::format!("error {url}"),
            }),
            PageEvent::Executed { text } => Some(alloc::format!("run {text}")),
            _ => None,
        })
        .collect()
}

fn deferred_script(host: &SimHost, src: &str, extra: &[(&str, &str)]) -> NodeId {
    let mut attrs = vec![("type", "deferjs"), ("src", src)];
    attrs.extend_from_slice(extra);
    host.element(host.body(), "script", &attrs)
}

#[derive(Default)]
struct Recorded {
    phases: Vec<PhaseEvent>,
    errors: Vec<HostErrorEvent>,
}

struct RecordingSink(Rc<RefCell<Recorded>>);

impl TraceSink for RecordingSink {
    fn on_phase(&mut self, e: &PhaseEvent) {
        self.0.borrow_mut().phases.push(*e);
    }

    fn on_host_error(&mut self, e: &HostErrorEvent) {
        self.0.borrow_mut().errors.push(e.clone());
    }
}

fn record(defer: &Defer<SimHost>) -> Rc<RefCell<Recorded>> {
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    defer.set_trace_sink(Box::new(RecordingSink(Rc::clone(&recorded))));
    recorded
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[test]
fn fast_queue_runs_in_scheduling_order_after_load() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let order = log();
    defer.schedule(push(&order, "first"), Delay::ZERO, None);
    defer.schedule(push(&order, "second"), Delay::ZERO, None);
    defer.schedule(push(&order, "third"), Delay::ZERO, None);

    host.run_until_idle();
    assert!(order.borrow().is_empty(), "nothing runs while booting");
    assert_eq!(defer.pending(), (3, 0));

    host.fire_load();
    assert_eq!(defer.phase(), ReadinessState::Ready);
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn queued_delays_are_passed_through() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let order = log();
    defer.schedule(push(&order, "slow"), Delay(50), None);
    defer.schedule(push(&order, "quick"), Delay(5), None);

    host.advance(100);
    host.fire_load();
    host.advance(5);
    assert_eq!(*order.borrow(), vec!["quick"]);
    host.advance(45);
    assert_eq!(*order.borrow(), vec!["quick", "slow"]);
}

#[test]
fn already_loaded_page_starts_ready() {
    let host = SimHost::new().already_loaded();
    let defer = runtime(&host);
    assert_eq!(defer.phase(), ReadinessState::Ready);

    let order = log();
    defer.schedule(push(&order, "lazy"), Delay::ZERO, Some(true));
    assert_eq!(defer.pending(), (0, 0), "ready pages never queue");
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["lazy"]);
}

#[test]
fn lazy_queue_waits_for_gesture() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let order = log();
    defer.schedule(push(&order, "fast"), Delay::ZERO, None);
    defer.schedule(push(&order, "lazy"), Delay::ZERO, Some(true));

    host.fire_load();
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["fast"]);
    assert!(host.listening_for_gestures(), "listeners attached for lazy work");

    assert!(host.gesture());
    assert_eq!(defer.phase(), ReadinessState::Interacting);
    assert!(!host.listening_for_gestures(), "listeners detached");
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["fast", "lazy"]);
}

#[test]
fn no_gesture_listeners_without_lazy_work() {
    let host = SimHost::new();
    let defer = runtime(&host);
    defer.schedule(|| {}, Delay::ZERO, None);
    host.fire_load();
    assert!(!host.listening_for_gestures());
    assert_eq!(defer.phase(), ReadinessState::Ready);
}

#[test]
fn lazy_deadline_flushes_without_gesture() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let recorded = record(&defer);
    defer.set_lazy(LazyMode::Deadline(Delay(300)));
    let order = log();
    defer.schedule(push(&order, "lazy"), Delay::ZERO, None);

    host.advance(40);
    host.fire_load();
    host.advance(299);
    assert!(order.borrow().is_empty(), "deadline not reached");
    assert_eq!(defer.phase(), ReadinessState::Ready);

    host.advance(1);
    assert_eq!(defer.phase(), ReadinessState::Interacting);
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["lazy"]);
    assert!(!host.listening_for_gestures());

    let phases = &recorded.borrow().phases;
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[1].at, HostTime(340));
    assert!(phases[1].forced, "deadline forced the transition");
}

#[test]
fn gesture_before_deadline_cancels_it() {
    let host = SimHost::new();
    let defer = Defer::new(
        host.clone(),
        DeferConfig::web().with_lazy(LazyMode::Deadline(Delay(300))),
    );
    let order = log();
    defer.schedule(push(&order, "lazy"), Delay::ZERO, None);
    host.fire_load();
    assert_eq!(host.pending_timers(), 1, "deadline armed");

    host.advance(100);
    host.gesture();
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["lazy"]);
    assert_eq!(host.pending_timers(), 0, "deadline cleared");
}

#[test]
fn second_load_and_early_gesture_are_ignored() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let recorded = record(&defer);
    let order = log();
    defer.schedule(push(&order, "lazy"), Delay::ZERO, Some(true));
    assert!(!host.gesture(), "no listener while booting");
    host.fire_load();
    host.fire_load();
    host.gesture();
    host.gesture();
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["lazy"]);
    assert_eq!(recorded.borrow().phases.len(), 2);
}

/// Calls back into the runtime from every phase event.
struct SchedulingSink {
    defer: Defer<SimHost>,
    order: Rc<RefCell<Vec<&'static str>>>,
}

impl TraceSink for SchedulingSink {
    fn on_phase(&mut self, _: &PhaseEvent) {
        self.order.borrow_mut().push("phase");
        self.defer
            .schedule(push(&self.order, "from sink"), Delay::ZERO, Some(false));
    }
}

#[test]
fn trace_sink_may_call_back_into_the_runtime() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let order = log();
    defer.set_trace_sink(Box::new(SchedulingSink {
        defer: defer.clone(),
        order: Rc::clone(&order),
    }));

    host.fire_load();
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["phase", "from sink"]);
    assert!(defer.take_trace_sink().is_some(), "sink survives the call");
}

/// Hands tracing over to another sink on the first phase event.
struct HandoverSink {
    defer: Defer<SimHost>,
    next: Rc<RefCell<Recorded>>,
}

impl TraceSink for HandoverSink {
    fn on_phase(&mut self, _: &PhaseEvent) {
        self.defer
            .set_trace_sink(Box::new(RecordingSink(Rc::clone(&self.next))));
    }
}

#[test]
fn sink_installed_from_a_callback_replaces_the_running_one() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let next = Rc::new(RefCell::new(Recorded::default()));
    defer.set_trace_sink(Box::new(HandoverSink {
        defer: defer.clone(),
        next: Rc::clone(&next),
    }));
    defer.schedule(|| {}, Delay::ZERO, Some(true));

    host.fire_load();
    assert!(next.borrow().phases.is_empty(), "handover event is not replayed");
    host.gesture();
    let phases = &next.borrow().phases;
    assert_eq!(phases.len(), 1);
    assert_eq!(phases[0].to, ReadinessState::Interacting);
}

#[test]
fn tasks_scheduled_during_flush_bypass_queues() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let order = log();
    let inner = defer.clone();
    let nested = push(&order, "nested");
    defer.schedule(
        move || inner.schedule(nested, Delay::ZERO, Some(true)),
        Delay::ZERO,
        None,
    );
    host.fire_load();
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["nested"]);
    assert_eq!(defer.pending(), (0, 0));
}

// ---------------------------------------------------------------------------
// Reveal
// ---------------------------------------------------------------------------

#[test]
fn reveal_promotes_placeholders_once() {
    let host = SimHost::new().already_loaded();
    let defer = runtime(&host);
    let video = host.element(
        host.body(),
        "video",
        &[("data-src", "clip.mp4"), ("data-foo", "bar")],
    );
    let source = host.element(video, "source", &[("data-src", "clip.webm")]);

    let outcome = defer.reveal(&video, Some("shown fade")).unwrap();
    assert_eq!(
        outcome,
        Outcome::Revealed(RevealReport {
            promoted: 2,
            descendants: 1,
            tagged: true,
            reloaded: true,
        })
    );
    assert_eq!(host.attr(video, "foo").as_deref(), Some("bar"));
    assert_eq!(host.attr(video, "src").as_deref(), Some("clip.mp4"));
    assert_eq!(host.attr(source, "src").as_deref(), Some("clip.webm"));
    assert_eq!(host.classes(video), vec!["shown", "fade"]);
    assert!(host.classes(source).is_empty(), "descendants get no class");

    assert_eq!(
        defer.reveal(&video, Some("again")).unwrap(),
        Outcome::AlreadyRevealed
    );
    assert_eq!(host.classes(video), vec!["shown", "fade"]);
    assert_eq!(host.reloads(video), 1);
    assert_eq!(
        defer.reveal(&source, None).unwrap(),
        Outcome::AlreadyRevealed,
        "descendants are marked too"
    );
}

#[test]
fn overlapping_dom_calls_reveal_each_node_once() {
    let host = SimHost::new().with_intersection();
    let defer = runtime(&host);
    let a = host.element(host.body(), "img", &[("data-src", "a.jpg")]);
    let b = host.element(host.body(), "img", &[("data-src", "b.jpg")]);

    defer.dom(DomOptions::new().unveiled_class("in"));
    defer.dom(DomOptions::new().selector("img").unveiled_class("in"));
    host.fire_load();
    host.run_until_idle();

    let observers = host.observers();
    assert_eq!(observers.len(), 1, "second call found nothing new");
    assert_eq!(observers[0].watching, vec![a, b]);

    host.scroll_into_view(b);
    assert_eq!(host.attr(b, "src").as_deref(), Some("b.jpg"));
    assert_eq!(host.attr(a, "src"), None, "a is still off-screen");

    host.scroll_into_view(b);
    host.scroll_into_view(a);
    assert_eq!(host.classes(a), vec!["in"]);
    assert_eq!(host.classes(b), vec!["in"]);
}

#[test]
fn without_intersection_dom_reveals_everything_in_one_task() {
    let host = SimHost::new();
    let defer = runtime(&host);
    let nodes: Vec<NodeId> = (0..5)
        .map(|_| host.element(host.body(), "img", &[("data-src", "x.jpg")]))
        .collect();
    defer.dom(DomOptions::new().delay(Delay(20)));
    host.fire_load();

    host.advance(19);
    assert!(nodes.iter().all(|&n| host.attr(n, "src").is_none()));
    assert_eq!(host.pending_timers(), 1, "only the dom task is pending");
    host.advance(1);
    assert!(
        nodes
            .iter()
            .all(|&n| host.attr(n, "src").as_deref() == Some("x.jpg"))
    );
    assert!(host.observers().is_empty());
}

#[test]
fn failing_observer_falls_back_to_immediate_reveal() {
    let host = SimHost::new().with_failing_observers().already_loaded();
    let defer = runtime(&host);
    let recorded = record(&defer);
    let img = host.element(host.body(), "img", &[("data-src", "x.jpg")]);
    defer.dom(DomOptions::new());
    host.run_until_idle();
    assert_eq!(host.attr(img, "src").as_deref(), Some("x.jpg"));
    assert_eq!(recorded.borrow().errors[0].operation, Operation::Observe);
}

#[test]
#[should_panic(expected = "resolver failed")]
fn failing_resolver_propagates_instead_of_declining() {
    let host = SimHost::new().already_loaded();
    host.element(host.body(), "img", &[("data-src", "a.png")]);
    let defer = runtime(&host);
    defer.dom(DomOptions::new().resolver(|_: &NodeId| -> bool { panic!("resolver failed") }));
    host.run_until_idle();
}

#[test]
fn resolver_false_leaves_node_and_descendants_untouched() {
    let host = SimHost::new().already_loaded();
    let defer = runtime(&host);
    let picture = host.element(host.body(), "picture", &[("data-src", "p")]);
    let img = host.element(picture, "img", &[("data-src", "i.jpg")]);
    let other = host.element(host.body(), "picture", &[("data-src", "o")]);

    let asked = Rc::new(Cell::new(0));
    let count = Rc::clone(&asked);
    defer.dom(
        DomOptions::new()
            .selector("picture[data-src]")
            .unveiled_class("in")
            .resolver(move |&n| {
                count.set(count.get() + 1);
                n != picture
            }),
    );
    host.run_until_idle();
    assert_eq!(asked.get(), 2, "resolver is asked once per watched node");
    assert_eq!(host.attr(picture, "src"), None);
    assert_eq!(host.attr(img, "src"), None, "descendants stay untouched");
    assert!(host.classes(picture).is_empty());
    assert_eq!(host.attr(other, "src").as_deref(), Some("o"));

    // Declined nodes are not marked revealed: a direct reveal still works.
    assert!(matches!(
        defer.reveal(&picture, None).unwrap(),
        Outcome::Revealed(_)
    ));
    assert_eq!(host.attr(img, "src").as_deref(), Some("i.jpg"));
}

#[test]
fn declined_node_is_watched_again_by_a_later_dom_call() {
    let host = SimHost::new().with_intersection().already_loaded();
    let defer = runtime(&host);
    let img = host.element(host.body(), "img", &[("data-src", "a.jpg")]);

    defer.dom(DomOptions::new().resolver(|_: &NodeId| false));
    host.run_until_idle();
    host.scroll_into_view(img);
    assert_eq!(host.attr(img, "src"), None, "first watcher declined");
    assert!(host.observers()[0].watching.is_empty());

    defer.dom(DomOptions::new().unveiled_class("late"));
    host.run_until_idle();
    assert_eq!(host.attr(img, "src").as_deref(), Some("a.jpg"));
    assert_eq!(host.classes(img), vec!["late"]);
}

#[test]
fn bad_selector_is_reported_not_raised() {
    let host = SimHost::new().already_loaded();
    let defer = runtime(&host);
    let recorded = record(&defer);
    defer.dom(DomOptions::new().selector("img:not(.x)"));
    host.run_until_idle();
    let errors = &recorded.borrow().errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].error,
        HostError::InvalidSelector("img:not(.x)".to_string())
    );
}

#[test]
fn lazy_media_uses_presets() {
    let host = SimHost::new().with_intersection().already_loaded();
    let defer = runtime(&host);
    let img = host.element(host.body(), "img", &[("data-src", "a.jpg")]);
    let styled = host.element(host.body(), "div", &[("data-style", "color: red")]);
    let frame = host.element(host.body(), "iframe", &[("data-src", "embed.html")]);
    let plain = host.element(host.body(), "div", &[("data-src", "ignored")]);

    lazy_media(&defer);
    host.advance(10);
    let observers = host.observers();
    assert_eq!(observers.len(), 2);
    assert_eq!(observers[0].root_margin.as_deref(), Some("50%"));
    assert_eq!(observers[0].watching, vec![img, styled]);
    assert_eq!(observers[1].root_margin.as_deref(), Some("100%"));
    assert_eq!(observers[1].watching, vec![frame]);

    for node in [img, styled, frame, plain] {
        host.scroll_into_view(node);
    }
    assert_eq!(host.attr(styled, "style").as_deref(), Some("color: red"));
    assert_eq!(host.classes(frame), vec![MEDIA_CLASS]);
    assert_eq!(host.attr(plain, "src"), None, "not a media preset target");
}

#[test]
fn lazy_media_marks_images_once_loaded() {
    let host = SimHost::new().with_intersection().already_loaded();
    host.route("a.jpg", Route::ok(30));
    host.route("broken.jpg", Route::fail(5));
    let defer = runtime(&host);
    let img = host.element(host.body(), "img", &[("data-src", "a.jpg")]);
    let broken = host.element(host.body(), "img", &[("data-src", "broken.jpg")]);

    lazy_media(&defer);
    host.advance(10);
    host.scroll_into_view(img);
    host.scroll_into_view(broken);
    assert_eq!(host.classes(img), vec![MEDIA_CLASS], "still loading");

    host.advance(30);
    assert_eq!(host.classes(img), vec![MEDIA_CLASS, LOADED_CLASS]);
    assert_eq!(host.classes(broken), vec![MEDIA_CLASS], "failed loads stay unmarked");
}

#[test]
fn lazy_media_marks_image_already_showing_its_source() {
    let host = SimHost::new().with_intersection().already_loaded();
    let defer = runtime(&host);
    let img = host.element(host.body(), "img", &[("src", "a.jpg"), ("data-src", "a.jpg")]);

    lazy_media(&defer);
    host.advance(10);
    host.scroll_into_view(img);
    let classes = host.classes(img);
    assert!(classes.iter().any(|c| c == LOADED_CLASS), "{classes:?}");
    assert!(classes.iter().any(|c| c == MEDIA_CLASS), "{classes:?}");
}

#[test]
fn lazy_media_flags_the_root_element() {
    let host = SimHost::new();
    host.set_attribute(&host.root(), "class", "no-deferjs theme").unwrap();
    let defer = runtime(&host);

    lazy_media(&defer);
    assert_eq!(host.classes(host.root()), vec!["theme", ROOT_READY_CLASS]);
}

// ---------------------------------------------------------------------------
// css / js
// ---------------------------------------------------------------------------

#[test]
fn css_with_same_id_attaches_one_link() {
    let host = SimHost::new();
    let defer = runtime(&host);
    defer.css("theme.css", ResourceOptions::new().spec("x"));
    defer.css("theme.css", ResourceOptions::new().spec("x"));
    host.fire_load();
    host.run_until_idle();
    assert_eq!(host.count("link"), 1);
    assert_eq!(host.count("link#x[rel=stylesheet][href=\"theme.css\"]"), 1);
}

#[test]
fn resource_on_load_fires_on_load_only() {
    let host = SimHost::new().already_loaded();
    host.route("broken.js", Route::fail(5));
    let defer = runtime(&host);
    let order = log();
    defer.js(
        "app.js",
        ResourceOptions::new()
            .spec(NodeSpec::attributes([("id", "app"), ("defer", "")]))
            .on_load(push(&order, "app")),
    );
    defer.js(
        "broken.js",
        ResourceOptions::new().on_load(push(&order, "broken")),
    );
    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["app"]);
    assert_eq!(host.count("script#app[src=\"app.js\"][defer]"), 1);
    assert_eq!(host.count("script"), 2);
}

#[test]
fn lazy_resource_waits_for_gesture() {
    let host = SimHost::new();
    let defer = runtime(&host);
    defer.css("print.css", ResourceOptions::new().lazy(true));
    host.fire_load();
    host.run_until_idle();
    assert_eq!(host.count("link"), 0);
    host.gesture();
    host.run_until_idle();
    assert_eq!(host.count("link"), 1);
}

// ---------------------------------------------------------------------------
// Reinjection
// ---------------------------------------------------------------------------

#[test]
fn blocking_scripts_run_strictly_in_order() {
    let host = SimHost::new().already_loaded();
    host.route("a.js", Route::ok(30));
    host.route("b.js", Route::ok(10));
    host.route("c.js", Route::ok(20));
    for src in ["a.js", "b.js", "c.js"] {
        deferred_script(&host, src, &[]);
    }
    let defer = runtime(&host);
    defer.all(ReinjectOptions::new());
    host.run_until_idle();
    assert_eq!(
        script_events(&host),
        vec![
            "attach a.js",
            "load a.js",
            "attach b.js",
            "load b.js",
            "attach c.js",
            "load c.js",
        ]
    );
}

#[test]
fn async_script_never_gates() {
    let host = SimHost::new().already_loaded();
    host.route("a.js", Route::ok(10));
    host.route("slow.js", Route::ok(500));
    host.route("b.js", Route::ok(10));
    deferred_script(&host, "a.js", &[]);
    deferred_script(&host, "slow.js", &[("async", "")]);
    deferred_script(&host, "b.js", &[]);
    let defer = runtime(&host);
    defer.all(ReinjectOptions::new());
    host.run_until_idle();
    assert_eq!(
        script_events(&host),
        vec![
            "attach a.js",
            "load a.js",
            "attach slow.js",
            "attach b.js",
            "load b.js",
            "load slow.js",
        ]
    );
}

#[test]
fn error_event_advances_the_pipeline() {
    let host = SimHost::new().already_loaded();
    host.route("missing.js", Route::fail(10));
    deferred_script(&host, "missing.js", &[]);
    deferred_script(&host, "next.js", &[]);
    let defer = runtime(&host);
    defer.all(ReinjectOptions::new());
    host.run_until_idle();
    assert_eq!(
        script_events(&host),
        vec![
            "attach missing.js",
            "error missing.js",
            "attach next.js",
            "load next.js",
        ]
    );
}

#[test]
fn rejected_attribute_is_skipped_not_fatal() {
    let host = SimHost::new().already_loaded();
    let a = deferred_script(&host, "a.js", &[("x/y", "1"), ("data-app", "main")]);
    deferred_script(&host, "b.js", &[]);
    let defer = runtime(&host);
    let recorded = record(&defer);
    defer.all(ReinjectOptions::new());
    host.run_until_idle();
    assert_eq!(
        script_events(&host),
        vec!["attach a.js", "load a.js", "attach b.js", "load b.js"]
    );
    assert!(!host.is_connected(a), "original replaced");
    let errors = recorded.borrow().errors.clone();
    assert!(!errors.is_empty(), "rejected name is reported");
    assert!(
        errors.iter().all(|e| e.operation == Operation::Reinject
            && e.error == HostError::InvalidAttribute("x/y".to_string())),
        "only the bad attribute fails: {errors:?}"
    );
}

#[test]
fn failed_replacement_settles_as_error_and_continues() {
    let host = SimHost::new().already_loaded();
    host.route("first.js", Route::ok(20));
    deferred_script(&host, "first.js", &[]);
    let stranded = deferred_script(&host, "stranded.js", &[]);
    deferred_script(&host, "next.js", &[]);
    host.detach(host.head());
    let defer = runtime(&host);
    let recorded = record(&defer);
    defer.all(ReinjectOptions::new());

    host.advance(0);
    assert_eq!(script_events(&host), vec!["attach first.js"]);
    // Neither the original's parent nor the head can take its replacement.
    host.detach(stranded);
    host.run_until_idle();
    assert_eq!(
        script_events(&host),
        vec![
            "attach first.js",
            "load first.js",
            "attach next.js",
            "load next.js",
        ]
    );
    let missing_head = recorded
        .borrow()
        .errors
        .iter()
        .filter(|e| e.error == HostError::MissingHead)
        .count();
    // One per preload hint, plus the stranded replacement.
    assert_eq!(missing_head, 4);
}

#[test]
fn preload_hints_precede_the_first_replacement() {
    let host = SimHost::new().already_loaded();
    deferred_script(
        &host,
        "a.js",
        &[("crossorigin", "anonymous"), ("integrity", "sha384-x")],
    );
    host.inline_script(host.body(), &[("type", "deferjs")], "inline()");
    deferred_script(&host, "b.js", &[]);
    let defer = runtime(&host);
    defer.all(ReinjectOptions::new());
    host.advance(0);

    let journal = host.journal();
    let first_script = journal
        .iter()
        .position(|e| matches!(e, PageEvent::Attached { tag, .. } if tag == "script"))
        .unwrap();
    let hints: Vec<_> = journal[..first_script]
        .iter()
        .filter_map(|e| match e {
            PageEvent::Attached { tag, url } if tag == "link" => url.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(hints, vec!["a.js", "b.js"]);
    assert_eq!(
        host.count("link[rel=preload][as=script][crossorigin=anonymous][integrity=sha384-x]"),
        1
    );
}

#[test]
fn replacements_keep_position_text_and_attributes() {
    let host = SimHost::new().already_loaded();
    let first = host.inline_script(
        host.body(),
        &[("type", "deferjs"), ("id", "boot"), ("data-x", "1")],
        "boot()",
    );
    let marker = host.element(host.body(), "p", &[]);
    let module = host.inline_script(host.body(), &[("type", "module")], "mod()");
    let defer = runtime(&host);
    defer.all(ReinjectOptions::new().selector("script"));
    host.run_until_idle();

    assert!(!host.is_connected(first), "originals are replaced");
    assert!(!host.is_connected(module));
    let children = host.children(host.body());
    assert_eq!(children[1], marker, "replacement took the original's slot");
    assert_eq!(host.attr(children[0], "type"), None, "marker type dropped");
    assert_eq!(host.attr(children[0], "id").as_deref(), Some("boot"));
    assert_eq!(host.attr(children[0], "data-x").as_deref(), Some("1"));
    assert_eq!(host.attr(children[2], "type").as_deref(), Some("module"));
    assert_eq!(script_events(&host), vec!["attach ", "run boot()", "attach ", "run mod()"]);
}

#[test]
fn detached_script_is_reinjected_into_head() {
    let host = SimHost::new().already_loaded();
    host.route("a.js", Route::ok(20));
    deferred_script(&host, "a.js", &[]);
    let late = deferred_script(&host, "b.js", &[]);
    let defer = runtime(&host);
    defer.all(ReinjectOptions::new());

    host.advance(0);
    assert_eq!(script_events(&host), vec!["attach a.js"]);
    // Removed from the page while a.js is still loading.
    host.detach(late);
    host.run_until_idle();
    assert_eq!(host.count("head script[src=\"b.js\"]"), 1);
    assert_eq!(host.count("body script[src=\"b.js\"]"), 0);
    assert_eq!(
        script_events(&host),
        vec!["attach a.js", "load a.js", "attach b.js", "load b.js"]
    );
}

#[test]
fn lazy_reinjection_waits_for_gesture() {
    let host = SimHost::new();
    deferred_script(&host, "a.js", &[]);
    let defer = runtime(&host);
    defer.all(ReinjectOptions::new().lazy(true));
    host.fire_load();
    host.run_until_idle();
    assert!(script_events(&host).is_empty());
    host.gesture();
    host.run_until_idle();
    assert_eq!(script_events(&host), vec!["attach a.js", "load a.js"]);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[test]
fn debounce_runs_once_after_quiet_period() {
    let host = SimHost::new().already_loaded();
    let defer = runtime(&host);
    let runs = Rc::new(Cell::new(0));
    let count = Rc::clone(&runs);
    let debounced = Debounce::new(&defer, Delay(100), move || count.set(count.get() + 1));

    for _ in 0..5 {
        debounced.call();
        host.advance(50);
    }
    assert_eq!(runs.get(), 0, "calls kept arriving");
    host.advance(50);
    assert_eq!(runs.get(), 1);
    assert!(!debounced.is_pending());
}

#[test]
fn throttle_runs_at_most_once_per_window() {
    let host = SimHost::new().already_loaded();
    let defer = runtime(&host);
    let runs = Rc::new(Cell::new(0));
    let count = Rc::clone(&runs);
    let throttled = Throttle::new(&defer, Delay(100), move || count.set(count.get() + 1));

    for _ in 0..10 {
        throttled.call();
        host.advance(25);
    }
    assert_eq!(runs.get(), 2, "250 ms of calls span two full windows");
    throttled.cancel();
    host.run_until_idle();
    assert_eq!(runs.get(), 2);
}
