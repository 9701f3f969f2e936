use std::io;
use std::thread::{self, JoinHandle};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::executor::block_on;
use futures::StreamExt;

use idom_core::{ElementRef, Layout, LayoutEvent, LayoutUpdate};

use crate::{run_local, DispatchError, Dispatcher, DispatcherConfig};

/// A [`Dispatcher`] running on its own thread, driven through channels.
///
/// The root element is built on the dispatcher thread, since elements are not
/// `Send`. Dropping the handle (or calling [`shutdown`](Self::shutdown)) ends the
/// event stream, which closes the layout and stops the thread.
pub struct DispatcherThread {
    events: Option<UnboundedSender<LayoutEvent>>,
    updates: UnboundedReceiver<LayoutUpdate>,
    thread: Option<JoinHandle<Result<(), DispatchError>>>,
}

impl DispatcherThread {
    pub fn spawn<F>(root: F) -> io::Result<Self>
    where
        F: FnOnce() -> ElementRef + Send + 'static,
    {
        Self::spawn_with_config(root, DispatcherConfig::default())
    }

    pub fn spawn_with_config<F>(root: F, config: DispatcherConfig) -> io::Result<Self>
    where
        F: FnOnce() -> ElementRef + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded();
        let (update_tx, update_rx) = mpsc::unbounded();
        let thread = thread::Builder::new()
            .name("idom-dispatcher".into())
            .spawn(move || {
                run_local(async move {
                    let layout = Layout::new(root());
                    Dispatcher::with_config(layout, config)
                        .run(update_tx, event_rx)
                        .await
                })?
            })?;
        Ok(Self {
            events: Some(event_tx),
            updates: update_rx,
            thread: Some(thread),
        })
    }

    pub fn send_event(&self, event: LayoutEvent) -> Result<(), DispatchError> {
        let events = self.events.as_ref().ok_or(DispatchError::Stopped)?;
        events
            .unbounded_send(event)
            .map_err(|_| DispatchError::Stopped)
    }

    /// The next update, or `None` once the dispatcher has stopped.
    pub async fn next_update(&mut self) -> Option<LayoutUpdate> {
        self.updates.next().await
    }

    pub fn blocking_next_update(&mut self) -> Option<LayoutUpdate> {
        block_on(self.updates.next())
    }

    /// Ends the event stream and waits for the dispatcher to finish.
    pub fn shutdown(mut self) -> Result<(), DispatchError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), DispatchError> {
        self.events.take();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| DispatchError::ThreadPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("dispatcher thread failed: {err}");
        }
    }
}
