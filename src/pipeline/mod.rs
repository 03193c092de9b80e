//! The analysis pipeline.
//!
//! - `dispatch`: fills template slots against the backend, one prompt or a
//!   bounded, order-preserving batch
//! - `analyzer`: the four per-file analyses
//! - `aggregate`: directory walk, persistence and the digest pass
//! - `output`: document layout and rendering

mod aggregate;
mod analyzer;
mod dispatch;
mod output;

pub use aggregate::Aggregator;
pub use dispatch::Dispatcher;
