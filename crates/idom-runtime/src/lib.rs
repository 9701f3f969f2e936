//! Runtime services for driving an [`idom_core::Layout`].
//!
//! Layouts are single-threaded: elements, hooks and handlers live in `Rc`s and
//! async effects are spawned with `spawn_local`. [`run_local`] provides the
//! current-thread runtime and `LocalSet` they need, [`Dispatcher`] connects a
//! layout to a transport, and [`DispatcherThread`] runs the whole thing on a
//! dedicated thread for callers that are not single-threaded themselves.

mod dispatcher;
mod thread;

use std::future::Future;
use std::io;

use thiserror::Error;

use idom_core::LayoutError;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use thread::DispatcherThread;

/// Runs `future` to completion on a fresh current-thread runtime inside a
/// `LocalSet`.
pub fn run_local<F: Future>(future: F) -> io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    Ok(tokio::task::LocalSet::new().block_on(&runtime, future))
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to start the local runtime")]
    Runtime(#[from] io::Error),
    #[error("transport rejected an update")]
    Transport(#[source] anyhow::Error),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("dispatcher thread panicked")]
    ThreadPanicked,
    #[error("dispatcher thread has stopped")]
    Stopped,
}
