//! Integration Tests for Streams and Signals
//!
//! These tests verify that pipes, derived events, signals and the fan-in
//! builders work together correctly through the public API.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

use rill_core::ops;
use rill_core::stream::Watcher;
use rill_core::{
    combine, join, Cell, Event, Fault, ManualScheduler, Pipe, Predicate, Shape, Signal,
};

fn collect<T: Clone + Send + Sync + 'static>(event: &Event<T>) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    event.watch(move |v: &T| seen_clone.lock().push(v.clone()));
    seen
}

fn fire_all<T: Clone + Send + Sync + 'static>(pipe: &Pipe<T>, values: &[T]) {
    for value in values {
        pipe.fire(value.clone());
    }
}

/// Test that a watcher sees exactly the values fired after it registered.
#[test]
fn watcher_observes_fires_in_order() {
    let pipe = Pipe::new();
    let early = collect(&pipe.event());

    pipe.fire(1);
    let late = collect(&pipe.event());
    pipe.fire(2);
    pipe.fire(3);

    assert_eq!(*early.lock(), vec![1, 2, 3]);
    assert_eq!(*late.lock(), vec![2, 3]);
}

/// Test that re-watching a callback resumes delivery without replay.
#[test]
fn rewatch_resumes_without_replay() {
    let pipe = Pipe::new();
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    let watcher: Watcher<i32> = Arc::new(move |_| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });

    pipe.watch_shared(watcher.clone());
    pipe.fire(1);
    pipe.unwatch(&watcher);
    pipe.fire(2);
    pipe.watch_shared(watcher.clone());
    pipe.fire(3);

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// Test that a watcher unwatched earlier in the same pass is skipped.
#[test]
fn unwatch_during_pass_skips_pending_watcher() {
    let pipe: Pipe<i32> = Pipe::new();
    let count = Arc::new(AtomicI32::new(0));

    let count_clone = count.clone();
    let victim: Watcher<i32> = Arc::new(move |_| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });

    let remover_pipe = pipe.clone();
    let remover_victim = victim.clone();
    pipe.watch(move |_| remover_pipe.unwatch(&remover_victim));
    pipe.watch_shared(victim);

    pipe.fire(1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

/// Test map over a stream.
#[test]
fn map_transforms_values() {
    let pipe = Pipe::new();
    let out = collect(&pipe.event().map(|x: &i32| x + 1));

    fire_all(&pipe, &[1, 2]);
    assert_eq!(*out.lock(), vec![2, 3]);
}

#[derive(Clone, Serialize)]
struct Hero {
    name: &'static str,
    alignment: &'static str,
}

/// Test the three predicate forms of filter.
#[test]
fn filter_forms() {
    let numbers = Pipe::new();
    let evens = collect(&numbers.event().filter(|x: &i32| x % 2 == 0));
    fire_all(&numbers, &[1, 2, 3, 4]);
    assert_eq!(*evens.lock(), vec![2, 4]);

    let maybe = Pipe::new();
    let truthy = collect(&maybe.event().filter_truthy());
    fire_all(&maybe, &[3, 0]);
    assert_eq!(*truthy.lock(), vec![3]);

    let heroes: Pipe<Hero> = Pipe::new();
    let good_shape = Shape::new(json!({ "alignment": "good" })).unwrap();
    let good = collect(&heroes.event().filter(Predicate::matches(good_shape)));
    heroes.fire(Hero { name: "Bruce", alignment: "good" });
    heroes.fire(Hero { name: "Jenny", alignment: "evil" });

    let names: Vec<_> = good.lock().iter().map(|h| h.name).collect();
    assert_eq!(names, vec!["Bruce"]);
}

/// Test unseeded reduce against seeded fold.
#[test]
fn reduce_and_fold() {
    let pipe = Pipe::new();
    let reduced = collect(&pipe.event().reduce(|a: &i32, b: &i32| a + b));
    let folded = collect(&pipe.event().fold(1000, |a: &i32, b: &i32| a + b));

    fire_all(&pipe, &[500, 30, 7]);

    assert_eq!(*reduced.lock(), vec![530, 537]);
    assert_eq!(*folded.lock(), vec![1500, 1530, 1537]);
}

/// Test that unique drops repeats while the source still sees everything.
#[test]
fn unique_drops_repeats() {
    let pipe = Pipe::new();
    let raw = collect(&pipe.event());
    let distinct = collect(&pipe.event().unique());

    fire_all(&pipe, &[1, 1, 2]);

    assert_eq!(*raw.lock(), vec![1, 1, 2]);
    assert_eq!(*distinct.lock(), vec![1, 2]);
}

/// Test that flat_map stops forwarding from a source it switched away from.
#[test]
fn flat_map_switches_sources() {
    let selector: Pipe<bool> = Pipe::new();
    let a: Pipe<&'static str> = Pipe::new();
    let b: Pipe<&'static str> = Pipe::new();

    let (a_event, b_event) = (a.event(), b.event());
    let switched = selector.event().flat_map(move |use_a: &bool| {
        if *use_a {
            a_event.clone()
        } else {
            b_event.clone()
        }
    });
    let out = collect(&switched);

    selector.fire(true);
    a.fire("a1");
    selector.fire(false);
    a.fire("a2");
    b.fire("b1");

    assert_eq!(*out.lock(), vec!["a1", "b1"]);
}

/// Test combine over a mapping of cells.
#[test]
fn combine_reports_partial_aggregate() {
    let a = Cell::new(json!(1));
    let b = Cell::empty();

    let mut sources = IndexMap::new();
    sources.insert("a", a.signal());
    sources.insert("b", b.signal());
    let combined = combine(&sources);

    let first = combined.get().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first["a"], json!(1));

    b.set(json!("x"));
    let second = combined.get().unwrap();
    assert_eq!(second["a"], json!(1));
    assert_eq!(second["b"], json!("x"));
}

/// Test join waiting for all sources and then tracking every update.
#[test]
fn join_waits_then_tracks() {
    let a = Cell::new(json!(1));
    let b = Cell::empty();

    let mut sources = IndexMap::new();
    sources.insert("a", a.signal());
    sources.insert("b", b.signal());
    let joined = join(&sources);
    assert!(joined.is_empty());

    b.set(json!("x"));
    assert_eq!(joined.get().unwrap()["b"], json!("x"));

    a.set(json!(2));
    assert_eq!(joined.get().unwrap()["a"], json!(2));
}

/// Test that sync flushes the whole queue on one gate fire.
#[test]
fn sync_flushes_on_gate() {
    let data = Pipe::new();
    let gate: Pipe<()> = Pipe::new();
    let synced = data.event().sync(&gate.event());

    let batches = Arc::new(Mutex::new(Vec::new()));
    let current = Arc::new(Mutex::new(Vec::new()));
    let current_clone = current.clone();
    synced.watch(move |v: &i32| current_clone.lock().push(*v));

    fire_all(&data, &[1, 2, 3]);
    gate.fire(());
    batches.lock().push(std::mem::take(&mut *current.lock()));
    gate.fire(());
    batches.lock().push(std::mem::take(&mut *current.lock()));

    assert_eq!(*batches.lock(), vec![vec![1, 2, 3], vec![]]);
}

/// Test reference counting on derived nodes.
#[test]
fn derived_nodes_release_when_unobserved() {
    let pipe: Pipe<i32> = Pipe::new();

    let mapped = pipe.event().map(|x| x * 2);
    let subscription = mapped.watch(|_| {});
    assert_eq!(pipe.count_watchers(), 1);

    subscription.unsubscribe();
    assert!(mapped.is_released());
    assert_eq!(pipe.count_watchers(), 0);

    let held = pipe.event().map(|x| x + 1).retain();
    held.watch(|_| {}).unsubscribe();
    assert!(!held.is_released());
    assert_eq!(pipe.count_watchers(), 1);

    held.free();
    assert!(held.is_released());
    assert_eq!(pipe.count_watchers(), 0);
}

/// Test that faults travel on the catch channel only.
#[test]
fn faults_reach_catchers_only() {
    let pipe: Pipe<i32> = Pipe::new();
    let values = collect(&pipe.event());
    let faults = Arc::new(Mutex::new(Vec::new()));
    let faults_clone = faults.clone();
    pipe.catch(move |fault: &Fault| faults_clone.lock().push(fault.message().to_string()));

    pipe.dispatch(Ok(1));
    pipe.dispatch(Err(Fault::new("disk full")));

    assert_eq!(*values.lock(), vec![1]);
    assert_eq!(*faults.lock(), vec!["disk full".to_string()]);
}

/// Test debounce on a virtual clock.
#[test]
fn debounce_emits_last_of_burst() {
    let clock = ManualScheduler::new();
    let pipe = Pipe::new();
    let out = collect(&pipe.event().debounce(Duration::from_millis(100), Arc::new(clock.clone())));

    fire_all(&pipe, &["h", "he", "hel"]);
    clock.advance(Duration::from_millis(99));
    assert!(out.lock().is_empty());

    clock.advance(Duration::from_millis(1));
    assert_eq!(*out.lock(), vec!["hel"]);
}

/// Test that a signal built on an event caches and replays.
#[test]
fn signal_tracks_event() {
    let pipe = Pipe::new();
    let signal = Signal::from_event(Some(42), pipe.event());

    let replayed = Arc::new(AtomicI32::new(0));
    let replayed_clone = replayed.clone();
    signal.bind(move |v| replayed_clone.store(*v, Ordering::SeqCst));
    assert_eq!(replayed.load(Ordering::SeqCst), 42);

    pipe.fire(7);
    assert_eq!(signal.get(), Some(7));
    assert_eq!(replayed.load(Ordering::SeqCst), 7);
}

/// Test derived signals computing eagerly, while reduce only seeds from the
/// current value.
#[test]
fn derived_signals_are_eager() {
    let pipe = Pipe::new();
    let signal = Signal::from_event(Some(1000), pipe.event());

    let plus_one = signal.map(|x: &i32| x + 1);
    let total = signal.reduce(|a: &i32, b: &i32| a + b);
    assert_eq!(plus_one.get(), Some(1001));
    assert_eq!(total.get(), None);

    fire_all(&pipe, &[500, 30, 7]);
    assert_eq!(plus_one.get(), Some(8));
    assert_eq!(total.get(), Some(1537));
}

/// Test flatten following the current inner signal.
#[test]
fn flatten_follows_current_inner() {
    let left = Cell::new("left-1");
    let right = Cell::new("right-1");
    let current = Cell::new(left.signal());
    let flat = current.signal().flatten();

    assert_eq!(flat.get(), Some("left-1"));

    current.set(right.signal());
    left.set("left-2");
    assert_eq!(flat.get(), Some("right-1"));

    right.set("right-2");
    assert_eq!(flat.get(), Some("right-2"));
}

/// Test that the static and method call forms agree.
#[test]
fn static_and_method_forms_agree() {
    let cell = Cell::new(4);
    let by_method = cell.map(|x: &i32| x * x);
    let by_function = ops::map(&cell.signal(), |x: &i32| x * x);

    cell.set(5);
    assert_eq!(by_method.get(), by_function.get());
    assert_eq!(by_function.get(), Some(25));
}

/// Test that reduce gives the same result in both call forms on a signal.
#[test]
fn reduce_forms_agree_on_signals() {
    let cell = Cell::new(1000);
    let by_method = cell.reduce(|a: &i32, b: &i32| a + b);
    let by_function = ops::reduce(&cell.signal(), |a: &i32, b: &i32| a + b);
    assert_eq!(by_method.get(), None);
    assert_eq!(by_function.get(), None);

    cell.set(500);
    assert_eq!(by_method.get(), Some(1500));
    assert_eq!(by_function.get(), Some(1500));
}
