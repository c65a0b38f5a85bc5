use std::future::Future;
use std::sync::Arc;

use quill_proto::{HostMessage, OversizedMessage};
use tokio::sync::{mpsc, oneshot, watch};

use crate::connection::AnalysisEngine;

/// Default bound for a connection's request queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Errors surfaced by engine-connection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine reported a failure applying a message or running a query.
    #[error("engine error: {message}")]
    Engine { message: String },

    /// The connection's consumer task is gone; no further operations run.
    #[error("engine connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Oversized(#[from] OversizedMessage),
}

impl EngineError {
    pub fn engine(message: impl Into<String>) -> Self {
        EngineError::Engine {
            message: message.into(),
        }
    }
}

struct EngineRequest {
    message: HostMessage,
    reply: Option<oneshot::Sender<Result<(), EngineError>>>,
}

/// Per-connection request queue.
///
/// Mutation/switch messages execute strictly in submission order on a single
/// consumer task. The queue depth is published through a `watch` channel:
/// it is incremented on enqueue and decremented only after the engine has
/// finished applying the message, so a depth of zero means "empty and the
/// consumer is not mid-operation".
#[derive(Clone)]
pub struct RequestSerializer {
    tx: mpsc::Sender<EngineRequest>,
    depth: Arc<watch::Sender<usize>>,
}

impl RequestSerializer {
    /// Starts the consumer task draining into `engine`.
    pub fn spawn(name: impl Into<String>, engine: Arc<dyn AnalysisEngine>, capacity: usize) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let depth = Arc::new(watch::channel(0usize).0);
        tokio::spawn(consume(name, engine, rx, depth.clone()));
        Self { tx, depth }
    }

    async fn enqueue(
        &self,
        message: HostMessage,
        reply: Option<oneshot::Sender<Result<(), EngineError>>>,
    ) -> Result<(), EngineError> {
        message.validate()?;
        self.depth.send_modify(|d| *d += 1);
        if self.tx.send(EngineRequest { message, reply }).await.is_err() {
            self.depth.send_modify(|d| *d -= 1);
            return Err(EngineError::ConnectionClosed);
        }
        Ok(())
    }

    /// Enqueues `message` without waiting for the engine to apply it.
    pub async fn notify(&self, message: HostMessage) -> Result<(), EngineError> {
        self.enqueue(message, None).await
    }

    /// Enqueues `message` and waits until the engine has applied it.
    ///
    /// A failed operation reports through the reply; it never poisons the
    /// queue for the operations behind it.
    pub async fn request(&self, message: HostMessage) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(message, Some(reply_tx)).await?;
        reply_rx.await.map_err(|_| EngineError::ConnectionClosed)?
    }

    /// Whether the queue is empty and the consumer is between operations.
    pub fn is_idle(&self) -> bool {
        *self.depth.subscribe().borrow() == 0
    }

    /// Waits until the queue reads idle, then executes `query` exactly once
    /// and returns its result.
    ///
    /// The query observes the effects of every message submitted strictly
    /// before this call. A message enqueued while the query itself is
    /// awaiting does not trigger a retry — the result is still returned.
    /// This is an accepted race: callers that need a settled snapshot
    /// revalidate by calling again.
    pub async fn run_when_idle<T, F, Fut>(&self, query: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut depth = self.depth.subscribe();
        loop {
            if *depth.borrow_and_update() == 0 {
                break;
            }
            if depth.changed().await.is_err() {
                // Consumer gone; nothing can be in flight anymore.
                break;
            }
        }
        query().await
    }
}

async fn consume(
    name: String,
    engine: Arc<dyn AnalysisEngine>,
    mut rx: mpsc::Receiver<EngineRequest>,
    depth: Arc<watch::Sender<usize>>,
) {
    while let Some(request) = rx.recv().await {
        let result = engine.apply(request.message).await;
        if let Err(err) = &result {
            tracing::warn!(target: "quill.engine", connection = %name, error = %err, "engine rejected message");
        }
        // Publish idleness before handing the result back so a caller that
        // chains `request(..)` then `run_when_idle(..)` observes the drain.
        depth.send_modify(|d| *d -= 1);
        if let Some(reply) = request.reply {
            let _ = reply.send(result);
        }
    }
    tracing::debug!(target: "quill.engine", connection = %name, "request queue drained and closed");
}
