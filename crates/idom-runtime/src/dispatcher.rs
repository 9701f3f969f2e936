use futures::future::{self, Either};
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};

use idom_core::{Layout, LayoutError, LayoutEvent, LayoutUpdate};

use crate::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Forward the partial update of a failed render pass instead of dropping it.
    pub send_partial_updates: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            send_partial_updates: true,
        }
    }
}

/// Pumps a layout: renders go out through a sink while events come in from a
/// stream, concurrently.
pub struct Dispatcher {
    layout: Layout,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(layout: Layout) -> Self {
        Self::with_config(layout, DispatcherConfig::default())
    }

    pub fn with_config(layout: Layout, config: DispatcherConfig) -> Self {
        Self { layout, config }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Runs until the event stream ends (or a send fails), then closes the layout.
    ///
    /// Failed renders and failed handlers are logged and do not stop the loop.
    pub async fn run<S, R>(self, send: S, recv: R) -> Result<(), DispatchError>
    where
        S: Sink<LayoutUpdate> + Unpin,
        S::Error: std::error::Error + Send + Sync + 'static,
        R: Stream<Item = LayoutEvent> + Unpin,
    {
        let render_loop = render_loop(&self.layout, &self.config, send).boxed_local();
        let event_loop = event_loop(&self.layout, recv).boxed_local();
        let result = match future::select(render_loop, event_loop).await {
            Either::Left((result, pending)) => {
                drop(pending);
                result
            }
            Either::Right((result, pending)) => {
                drop(pending);
                result
            }
        };
        let closed = self.layout.close();
        result?;
        closed.map_err(DispatchError::from)
    }
}

async fn render_loop<S>(
    layout: &Layout,
    config: &DispatcherConfig,
    mut send: S,
) -> Result<(), DispatchError>
where
    S: Sink<LayoutUpdate> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    loop {
        let update = match layout.render().await {
            Ok(update) => update,
            Err(LayoutError::Render { source, update }) => {
                log::error!("{source}: {:#}", source.cause());
                if !config.send_partial_updates || update.is_empty() {
                    continue;
                }
                update
            }
            Err(LayoutError::Closed) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        send.send(update)
            .await
            .map_err(|err| DispatchError::Transport(err.into()))?;
    }
}

async fn event_loop<R>(layout: &Layout, mut recv: R) -> Result<(), DispatchError>
where
    R: Stream<Item = LayoutEvent> + Unpin,
{
    while let Some(event) = recv.next().await {
        if let Err(err) = layout.trigger(event).await {
            match &err {
                LayoutError::Handler { source, .. } => log::error!("{err}: {source:#}"),
                _ => log::error!("{err}"),
            }
        }
    }
    log::debug!("event stream ended");
    Ok(())
}
