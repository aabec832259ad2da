//! Core, non-public machinery: the resolution guard and the singleton cell.

use crate::error::Result;
use crate::value::Value;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// Default bound on nested container resolutions per thread.
///
/// Each nested resolution costs several stack frames, so the bound has to
/// panic well before a 2 MiB thread stack runs out.
pub const DEFAULT_MAX_DEPTH: usize = 64;

thread_local! {
  // The ids currently being resolved on this thread, outermost first.
  static RESOLUTION_PATH: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// An RAII guard tracking the chain of component ids being resolved.
///
/// Unbroken reference cycles between non-singleton components would otherwise
/// recurse until the stack overflows. The guard turns that into a panic once
/// the chain grows past the container's depth limit.
pub(crate) struct ResolutionGuard {
  _private: (),
}

impl ResolutionGuard {
  pub(crate) fn enter(id: &str, max_depth: usize) -> Self {
    RESOLUTION_PATH.with(|path| {
      let mut path = path.borrow_mut();
      if path.len() >= max_depth {
        let tail = render(&path[path.len().saturating_sub(8)..]);
        drop(path);
        panic!(
          "Resolution depth limit exceeded ({}) while resolving component '{}': ... -> {}",
          max_depth, id, tail
        );
      }
      path.push(id.to_owned());
    });
    Self { _private: () }
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLUTION_PATH.with(|path| {
      path.borrow_mut().pop();
    });
  }
}

fn render(ids: &[String]) -> String {
  ids.join(" -> ")
}

fn current_path() -> String {
  RESOLUTION_PATH.with(|path| render(&path.borrow()))
}

thread_local! {
  // The (registry, id) pairs whose declared type is being inferred on this thread.
  static INFERRING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Guards declared-type inference against reference cycles.
///
/// `enter` returns `None` when `id` of the same registry is already being
/// inferred further up the stack, in which case its type is indeterminate.
/// Equal ids in different registries are distinct components.
pub(crate) struct InferenceGuard {
  _private: (),
}

impl InferenceGuard {
  pub(crate) fn enter(registry: usize, id: &str) -> Option<Self> {
    INFERRING.with(|entries| {
      let mut entries = entries.borrow_mut();
      if entries.iter().any(|(r, i)| *r == registry && i == id) {
        return None;
      }
      entries.push((registry, id.to_owned()));
      Some(Self { _private: () })
    })
  }
}

impl Drop for InferenceGuard {
  fn drop(&mut self) {
    INFERRING.with(|entries| {
      entries.borrow_mut().pop();
    });
  }
}

/// Which thread builds which singleton cell, and which cell each blocked
/// thread waits for.
///
/// Only consulted when a thread is about to block on a cell another thread is
/// building. Lock order: a cell's `state`, then this graph.
#[derive(Default)]
struct WaitGraph {
  builders: HashMap<usize, ThreadId>,
  waiting: HashMap<ThreadId, usize>,
}

impl WaitGraph {
  /// Whether `me` blocking on `cell` would wait, through the chain of
  /// builders and what they wait for, on itself.
  fn closes_cycle(&self, me: ThreadId, cell: usize) -> bool {
    let mut current = cell;
    for _ in 0..=self.waiting.len() {
      let Some(builder) = self.builders.get(&current) else {
        return false;
      };
      if *builder == me {
        return true;
      }
      match self.waiting.get(builder) {
        Some(next) => current = *next,
        None => return false,
      }
    }
    false
  }
}

static WAIT_GRAPH: Lazy<Mutex<WaitGraph>> = Lazy::new(|| Mutex::new(WaitGraph::default()));

enum BuildState {
  Idle,
  Constructing { builder: ThreadId },
  Injecting { builder: ThreadId, early: Value },
}

/// The cache behind a singleton component.
///
/// Construction happens in two phases. `construct` builds the bare object;
/// `inject` then applies property/setter injection to it in place. While the
/// second phase runs, re-entrant requests from the building thread receive the
/// bare object, which is what lets two singletons refer to each other through
/// setters. Re-entering during the first phase is a constructor cycle and
/// panics.
///
/// Each cell has its own lock. Other threads block until the building thread
/// finishes, unless blocking would close a wait cycle between threads: then a
/// cell in its second phase hands out its bare object, and one in its first
/// phase panics.
pub(crate) struct SingletonCell {
  value: OnceCell<Value>,
  state: Mutex<BuildState>,
  finished: Condvar,
}

impl SingletonCell {
  pub(crate) fn new() -> Self {
    Self {
      value: OnceCell::new(),
      state: Mutex::new(BuildState::Idle),
      finished: Condvar::new(),
    }
  }

  pub(crate) fn get(&self) -> Option<&Value> {
    self.value.get()
  }

  fn key(&self) -> usize {
    self as *const Self as usize
  }

  pub(crate) fn get_or_build(
    &self,
    construct: impl FnOnce() -> Result<Value>,
    inject: impl FnOnce(Value) -> Result<Value>,
  ) -> Result<Value> {
    if let Some(value) = self.value.get() {
      return Ok(value.clone());
    }

    let me = thread::current().id();
    let mut state = self.state.lock();
    loop {
      if let Some(value) = self.value.get() {
        return Ok(value.clone());
      }
      match &*state {
        BuildState::Idle => break,
        BuildState::Constructing { builder } if *builder == me => panic!(
          "Circular dependency detected while constructing a singleton (resolution path: {})",
          current_path()
        ),
        BuildState::Injecting { builder, early } if *builder == me => return Ok(early.clone()),
        _ => {}
      }

      let mut graph = WAIT_GRAPH.lock();
      if graph.closes_cycle(me, self.key()) {
        drop(graph);
        match &*state {
          BuildState::Injecting { early, .. } => {
            trace!("Handing a partially injected singleton across threads");
            return Ok(early.clone());
          }
          _ => panic!(
            "Circular dependency detected between threads while constructing a singleton (resolution path: {})",
            current_path()
          ),
        }
      }
      graph.waiting.insert(me, self.key());
      drop(graph);
      self.finished.wait(&mut state);
      WAIT_GRAPH.lock().waiting.remove(&me);
    }

    *state = BuildState::Constructing { builder: me };
    WAIT_GRAPH.lock().builders.insert(self.key(), me);
    drop(state);

    let _finish = FinishOnDrop(self);
    let object = construct()?;
    *self.state.lock() = BuildState::Injecting {
      builder: me,
      early: object.clone(),
    };
    let object = inject(object)?;

    // Only the building thread sets the cell; everyone else is blocked or
    // holds the early object.
    let _ = self.value.set(object.clone());
    debug!(ty = %object.type_of(), "Constructed singleton");
    Ok(object)
  }
}

/// Returns the cell to `Idle` and wakes waiters, whether the build succeeded,
/// failed or panicked.
struct FinishOnDrop<'a>(&'a SingletonCell);

impl Drop for FinishOnDrop<'_> {
  fn drop(&mut self) {
    let mut state = self.0.state.lock();
    *state = BuildState::Idle;
    WAIT_GRAPH.lock().builders.remove(&self.0.key());
    drop(state);
    self.0.finished.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wait_graph_detects_a_cycle_through_another_thread() {
    let me = thread::current().id();
    let other = thread::spawn(|| thread::current().id()).join().unwrap();
    let mut graph = WaitGraph::default();
    graph.builders.insert(1, other);
    graph.builders.insert(2, me);

    assert!(!graph.closes_cycle(me, 1));

    graph.waiting.insert(other, 2);
    assert!(graph.closes_cycle(me, 1));
    assert!(!graph.closes_cycle(me, 3));
  }

  #[test]
  fn inference_is_keyed_by_registry() {
    let first = InferenceGuard::enter(1, "x");
    assert!(first.is_some());
    assert!(InferenceGuard::enter(1, "x").is_none());

    let other = InferenceGuard::enter(2, "x");
    assert!(other.is_some());
  }
}
