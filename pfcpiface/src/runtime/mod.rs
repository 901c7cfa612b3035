//! Runtime integration layer.
//!
//! Owns the lifetime of background work (notification workers, registration
//! retry loops, the HTTP listener) so shutdown can cancel and drain it in one
//! place instead of leaking detached tasks.

pub(crate) mod background_tasks;
pub use background_tasks::BackgroundTasks;
