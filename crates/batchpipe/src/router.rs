//! Topic routing on top of the single-item pipe.
//!
//! Producers send [`Event`]s; the [`Router`] hands each event's value to every
//! handler registered for its topic, in registration order.

use crate::handler::{Handler, HandlerBoxed, HandlerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::debug;

/// A value tagged with the topic it is routed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<V> {
    pub topic: String,
    pub value: V,
}

impl<V> Event<V> {
    pub fn new(topic: impl Into<String>, value: V) -> Self {
        Self {
            topic: topic.into(),
            value,
        }
    }
}

/// Dispatches events to per-topic handlers.
///
/// ```
/// use batchpipe::{sync_handler, Event, Pipe, PipeConfig, Router};
/// use batchpipe_queue::MemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), batchpipe::PipeError> {
/// let router = Router::new()
///     .on("loss", sync_handler(|v: f64| println!("loss = {v}")))
///     .on("accuracy", sync_handler(|v: f64| println!("accuracy = {v}")));
///
/// let backend = MemoryBackend::default();
/// let pipe = Pipe::open(&backend, router, PipeConfig::default()).await?;
/// pipe.sender().send(Event::new("loss", 0.25))?;
/// pipe.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Router<V> {
    routes: Vec<(String, Box<dyn HandlerBoxed<V>>)>,
}

impl<V: Clone + Send + 'static> Router<V> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers `handler` for `topic`. A topic may have several handlers.
    pub fn on<H>(mut self, topic: impl Into<String>, handler: H) -> Self
    where
        H: Handler<V>,
    {
        self.routes.push((topic.into(), Box::new(handler)));
        self
    }

    /// Registered topics, in registration order, with repeats.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(topic, _)| topic.as_str())
    }
}

impl<V: Clone + Send + 'static> Default for Router<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Router<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("topics", &self.routes.iter().map(|(t, _)| t).collect::<Vec<_>>())
            .finish()
    }
}

impl<V: Clone + Send + 'static> Handler<Event<V>> for Router<V> {
    fn handle(&mut self, event: Event<V>) -> impl Future<Output = HandlerResult> + Send + '_ {
        async move {
            let mut matched = false;
            for (topic, handler) in &mut self.routes {
                if *topic != event.topic {
                    continue;
                }
                matched = true;
                handler.handle_boxed(event.value.clone()).await?;
            }
            if !matched {
                debug!(topic = %event.topic, "no handler registered for topic");
            }
            Ok(())
        }
    }
}
