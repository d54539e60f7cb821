//! vista-dispatch: capability dispatcher with timeout/retry policy and the
//! in-memory task tracker for asynchronous work.

pub mod dispatcher;
pub mod tracker;

pub use dispatcher::{AdapterSet, Dispatcher};
pub use tracker::TaskTracker;
