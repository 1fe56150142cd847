//! Macro-data-flow execution engine.
//!
//! This crate executes directed acyclic graphs (DAGs) of user functions on a
//! fixed pool of worker threads. Nodes are connected by edges carrying typed
//! [`Token`]s; a node fires exactly when every one of its input tokens has
//! arrived, and its outputs are routed to the input slots of its successors.
//! The output of the designated exit node resolves the future returned by
//! [`Executor::run`].
//!
//! The engine:
//! - Validates graph structure up front (complete wiring, no self-loops, no
//!   cycles, full reachability from the entry node) and freezes the topology.
//! - Clones a fresh live graph per run, so any number of concurrent runs can
//!   share one validated template without sharing mutable state.
//! - Guards node readiness with an atomic arrival counter plus a one-shot
//!   firing latch, with Release/Acquire ordering so a firing node observes
//!   every predecessor's output.
//!
//! Key modules:
//! - `graph`: the [`Graph`] builder, wiring operations, and the structural
//!   validator.
//! - `function`: the [`Function`] trait wrapping user callables, plus the
//!   [`FnFunction`] closure adapter.
//! - `token`: the type-erased, reference-counted [`Token`] value envelope.
//! - `runtime`: the per-run firing state machine ([`GraphHandler`]).
//! - `executor`: the worker pool that drains the shared job queue.
//!
//! Quick start:
//! 1. Build a graph: [`Graph::new`], then [`Graph::add`] user functions and
//!    wire them with [`Graph::send_to`] / [`Graph::add_output`].
//! 2. Designate endpoints with [`Graph::mark_as_input`] and
//!    [`Graph::mark_as_output`].
//! 3. Create an [`Executor`] and call [`Executor::run`] with positional input
//!    tokens; [`RunFuture::wait`] yields the exit node's output tokens.
//!
//! ```
//! use mdf::{Executor, ExecutorConfig, FnFunction, Graph, Token};
//!
//! let mut graph = Graph::new();
//! let inc = |inputs: &[Token]| Ok(vec![Token::new(inputs[0].get::<i64>() + 1)]);
//! let a = graph.add(FnFunction::new(1, 1, inc)).unwrap();
//! let b = graph.add(FnFunction::new(1, 1, inc)).unwrap();
//! graph.send_to(&a, &b).unwrap();
//! graph.mark_as_input(&a).unwrap();
//! graph.mark_as_output(&b).unwrap();
//!
//! let executor = Executor::new(ExecutorConfig::default());
//! let result = executor
//!     .run(&mut graph, vec![Token::new(3_i64)])
//!     .unwrap()
//!     .wait()
//!     .unwrap();
//! assert_eq!(*result[0].get::<i64>(), 5);
//! ```

/// Error kinds: structural graph errors and per-run execution errors.
pub mod error;
/// The fixed-size worker pool draining the shared job queue.
///
/// Unavailable under the `loom` feature; the model-checked surface is the
/// `runtime` firing protocol, which the executor merely drives from worker
/// threads.
#[cfg(not(feature = "loom"))]
pub mod executor;
/// The [`Function`] trait consumed by the engine and adapters for closures.
pub mod function;
/// Graph construction: builder operations, instruction handles, validation.
pub mod graph;
mod node;
/// Per-run live graph state and the token-delivery / firing protocol.
pub mod runtime;
mod sync;
/// The type-erased token envelope transferred along graph edges.
pub mod token;
/// Node identifiers and small shared structures.
pub mod types;

pub use crate::error::{GraphError, RunError};
#[cfg(not(feature = "loom"))]
pub use crate::executor::{Executor, ExecutorConfig, RunFuture};
pub use crate::function::{FnFunction, Function, FunctionError, Placeholder};
pub use crate::graph::{Graph, Instruction};
pub use crate::runtime::{Firing, GraphHandler};
pub use crate::token::{Token, TokenVec};
pub use crate::types::NodeId;
