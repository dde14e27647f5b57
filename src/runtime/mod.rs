//! Concurrency engine.
//!
//! A dispatcher feeds a bounded queue; a fixed pool of workers drains it:
//! - `WorkQueue`: bounded FIFO with acknowledgement tracking
//! - `WorkerPool`: workers that probe one target at a time
//! - `Dispatcher`: parses endpoints, enqueues jobs and shutdown signals
//! - `Progress`: logs how far through the endpoint list the run is
//!
//! The queue capacity equals the worker count, which caps the number of
//! connections in flight.

mod dispatcher;
mod progress;
mod queue;
mod worker;

pub use dispatcher::Dispatcher;
pub use progress::Progress;
