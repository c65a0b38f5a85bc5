use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use quill_proto::{EngineQuery, EngineSignal, HostMessage, QueryReply};
use tokio::sync::mpsc;

use crate::serializer::{EngineError, RequestSerializer};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The analysis engine as an opaque capability.
///
/// `apply` reflects a mutation/switch message into the engine's own internal
/// file tree; `query` runs an analysis call against whichever project the
/// engine currently has active. The algorithms behind both are out of scope
/// here — this crate only serializes access to them.
pub trait AnalysisEngine: Send + Sync {
    fn apply(&self, message: HostMessage) -> BoxFuture<Result<(), EngineError>>;

    fn query(&self, query: EngineQuery) -> BoxFuture<Result<QueryReply, EngineError>>;
}

/// Handler invoked for every inbound engine signal.
pub type SignalHandler = Arc<dyn Fn(EngineSignal) -> BoxFuture<()> + Send + Sync>;

/// Explicit inbound-message dispatcher.
///
/// Handlers are registered up front (file-needed detection being the primary
/// one) and every signal fans out to all of them, in registration order.
#[derive(Default)]
pub struct SignalDispatcher {
    handlers: RwLock<Vec<SignalHandler>>,
}

impl SignalDispatcher {
    pub fn register(&self, handler: SignalHandler) {
        let mut handlers = self.handlers.write().expect("dispatcher lock poisoned");
        handlers.push(handler);
    }

    fn snapshot(&self) -> Vec<SignalHandler> {
        let handlers = self.handlers.read().expect("dispatcher lock poisoned");
        handlers.clone()
    }

    pub async fn dispatch(&self, signal: EngineSignal) {
        for handler in self.snapshot() {
            handler(signal.clone()).await;
        }
    }
}

struct ConnectionInner {
    name: String,
    engine: Arc<dyn AnalysisEngine>,
    serializer: RequestSerializer,
    dispatcher: Arc<SignalDispatcher>,
}

/// A channel to one instance of the analysis engine.
///
/// All mutation/switch traffic goes through the connection's
/// [`RequestSerializer`]; inbound signals go through its [`SignalDispatcher`].
/// Two connections (e.g. independent analysis modes) are fully independent
/// queues with no ordering relationship to each other.
#[derive(Clone)]
pub struct EngineConnection {
    inner: Arc<ConnectionInner>,
}

impl EngineConnection {
    /// Starts the consumer task and the inbound dispatch loop.
    ///
    /// `signals` is the engine's outbound signal stream; the transport that
    /// feeds it is a collaborator, not part of this crate.
    pub fn spawn(
        name: impl Into<String>,
        engine: Arc<dyn AnalysisEngine>,
        signals: mpsc::Receiver<EngineSignal>,
        queue_capacity: usize,
    ) -> Self {
        let name = name.into();
        let serializer = RequestSerializer::spawn(name.clone(), engine.clone(), queue_capacity);
        let dispatcher = Arc::new(SignalDispatcher::default());

        let dispatch = dispatcher.clone();
        let dispatch_name = name.clone();
        tokio::spawn(async move {
            let mut signals = signals;
            while let Some(signal) = signals.recv().await {
                tracing::trace!(target: "quill.engine", connection = %dispatch_name, ?signal, "inbound signal");
                dispatch.dispatch(signal).await;
            }
        });

        Self {
            inner: Arc::new(ConnectionInner {
                name,
                engine,
                serializer,
                dispatcher,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Registers an inbound signal handler.
    pub fn on_signal(&self, handler: SignalHandler) {
        self.inner.dispatcher.register(handler);
    }

    /// Fire-and-forget enqueue of a mutation/switch message.
    pub async fn notify(&self, message: HostMessage) -> Result<(), EngineError> {
        self.inner.serializer.notify(message).await
    }

    /// Enqueues a mutation/switch message and waits for the engine to apply it.
    pub async fn request(&self, message: HostMessage) -> Result<(), EngineError> {
        self.inner.serializer.request(message).await
    }

    pub fn is_idle(&self) -> bool {
        self.inner.serializer.is_idle()
    }

    /// Runs an analysis query once the connection's queue has drained, so it
    /// observes every mutation submitted strictly before it.
    pub async fn query_when_idle(&self, query: EngineQuery) -> Result<QueryReply, EngineError> {
        let engine = self.inner.engine.clone();
        self.inner
            .serializer
            .run_when_idle(move || engine.query(query))
            .await
    }
}

/// The live set of engine connections.
///
/// Propagating to an empty pool is a no-op, not an error — the engine may
/// simply not have started yet.
#[derive(Default)]
pub struct EnginePool {
    connections: RwLock<Vec<EngineConnection>>,
}

impl EnginePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection: EngineConnection) {
        let mut connections = self.connections.write().expect("pool lock poisoned");
        connections.push(connection);
    }

    /// Snapshot of the live connections.
    pub fn connections(&self) -> Vec<EngineConnection> {
        let connections = self.connections.read().expect("pool lock poisoned");
        connections.clone()
    }

    pub fn get(&self, name: &str) -> Option<EngineConnection> {
        let connections = self.connections.read().expect("pool lock poisoned");
        connections.iter().find(|c| c.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        let connections = self.connections.read().expect("pool lock poisoned");
        connections.is_empty()
    }
}
