use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_engine::{
    AnalysisEngine, BoxFuture, EngineConnection, EngineError, EnginePool, RequestSerializer,
    DEFAULT_QUEUE_CAPACITY,
};
use quill_proto::{EngineQuery, EngineSignal, HostMessage, QueryReply, MAX_FILE_TEXT_BYTES};
use tokio::sync::mpsc;

/// Records applied messages in order, with a small delay so queue ordering is
/// actually exercised rather than trivially serialized by the test itself.
#[derive(Default)]
struct RecordingEngine {
    applied: Arc<Mutex<Vec<HostMessage>>>,
}

impl RecordingEngine {
    fn applied_paths(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                HostMessage::WriteFile { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

impl AnalysisEngine for RecordingEngine {
    fn apply(&self, message: HostMessage) -> BoxFuture<Result<(), EngineError>> {
        let applied = self.applied.clone();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            if let HostMessage::WriteFile { path, .. } = &message {
                if path == "/boom.ts" {
                    return Err(EngineError::engine("synthetic failure"));
                }
            }
            applied.lock().unwrap().push(message);
            Ok(())
        })
    }

    fn query(&self, _query: EngineQuery) -> BoxFuture<Result<QueryReply, EngineError>> {
        let applied = self.applied.clone();
        Box::pin(async move {
            let count = applied.lock().unwrap().len();
            Ok(QueryReply::QuickInfo(Some(format!("{count} applied"))))
        })
    }
}

fn write(path: &str) -> HostMessage {
    HostMessage::WriteFile {
        project_id: "p1".into(),
        path: path.into(),
        content: String::new(),
        version: 0,
    }
}

fn connection(engine: Arc<RecordingEngine>) -> EngineConnection {
    let (_signals_tx, signals_rx) = mpsc::channel(8);
    EngineConnection::spawn("test", engine, signals_rx, DEFAULT_QUEUE_CAPACITY)
}

#[tokio::test]
async fn operations_apply_in_submission_order() {
    let engine = Arc::new(RecordingEngine::default());
    let conn = connection(engine.clone());

    conn.notify(write("/a.ts")).await.unwrap();
    conn.notify(write("/b.ts")).await.unwrap();
    conn.request(write("/c.ts")).await.unwrap();

    assert_eq!(engine.applied_paths(), ["/a.ts", "/b.ts", "/c.ts"]);
    assert!(conn.is_idle());
}

#[tokio::test]
async fn query_waits_for_every_prior_mutation() {
    let engine = Arc::new(RecordingEngine::default());
    let conn = connection(engine.clone());

    for path in ["/a.ts", "/b.ts", "/c.ts"] {
        conn.notify(write(path)).await.unwrap();
    }

    let reply = conn
        .query_when_idle(EngineQuery::QuickInfo {
            path: "/a.ts".into(),
            offset: 0,
        })
        .await
        .unwrap();
    // The query never observes pre-A state: all three mutations are in.
    assert_eq!(reply, QueryReply::QuickInfo(Some("3 applied".into())));
}

#[tokio::test]
async fn failed_operation_reports_without_poisoning_the_queue() {
    let engine = Arc::new(RecordingEngine::default());
    let conn = connection(engine.clone());

    let err = conn.request(write("/boom.ts")).await.unwrap_err();
    assert_eq!(err, EngineError::engine("synthetic failure"));

    conn.request(write("/after.ts")).await.unwrap();
    assert_eq!(engine.applied_paths(), ["/after.ts"]);
}

#[tokio::test]
async fn oversized_messages_are_rejected_before_enqueue() {
    let engine = Arc::new(RecordingEngine::default());
    let conn = connection(engine.clone());

    let message = HostMessage::WriteFile {
        project_id: "p1".into(),
        path: "/big.ts".into(),
        content: "x".repeat(MAX_FILE_TEXT_BYTES + 1),
        version: 0,
    };
    assert!(matches!(
        conn.request(message).await,
        Err(EngineError::Oversized(_))
    ));
    assert!(engine.applied_paths().is_empty());
    assert!(conn.is_idle());
}

#[tokio::test]
async fn signals_fan_out_to_registered_handlers() {
    let engine = Arc::new(RecordingEngine::default());
    let (signals_tx, signals_rx) = mpsc::channel(8);
    let conn = EngineConnection::spawn("test", engine, signals_rx, DEFAULT_QUEUE_CAPACITY);

    let seen: Arc<Mutex<Vec<EngineSignal>>> = Arc::default();
    let sink = seen.clone();
    conn.on_signal(Arc::new(move |signal| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(signal);
        })
    }));

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let done = Arc::new(Mutex::new(Some(done_tx)));
    conn.on_signal(Arc::new(move |_signal| {
        let done = done.clone();
        Box::pin(async move {
            if let Some(tx) = done.lock().unwrap().take() {
                let _ = tx.send(());
            }
        })
    }));

    signals_tx
        .send(EngineSignal::NeedsFile {
            project_id: "p1".into(),
            path: "/lazy.ts".into(),
        })
        .await
        .unwrap();
    done_rx.await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        [EngineSignal::NeedsFile {
            project_id: "p1".into(),
            path: "/lazy.ts".into(),
        }]
    );
}

#[tokio::test]
async fn serializer_works_standalone_without_a_connection() {
    let engine = Arc::new(RecordingEngine::default());
    let serializer = RequestSerializer::spawn("bare", engine.clone(), DEFAULT_QUEUE_CAPACITY);

    serializer.notify(write("/a.ts")).await.unwrap();
    serializer.request(write("/b.ts")).await.unwrap();
    assert!(serializer.is_idle());

    let count = serializer
        .run_when_idle(|| async { engine.applied_paths().len() })
        .await;
    assert_eq!(count, 2);
}

#[tokio::test]
async fn pool_snapshots_connections_by_name() {
    let pool = EnginePool::new();
    assert!(pool.is_empty());

    let engine = Arc::new(RecordingEngine::default());
    pool.add(connection(engine));
    assert!(!pool.is_empty());
    assert_eq!(pool.connections().len(), 1);
    assert!(pool.get("test").is_some());
    assert!(pool.get("other").is_none());
}

#[tokio::test]
async fn run_when_idle_returns_immediately_on_an_idle_connection() {
    let engine = Arc::new(RecordingEngine::default());
    let conn = connection(engine);
    assert!(conn.is_idle());
    let reply = conn
        .query_when_idle(EngineQuery::Diagnostics { path: "/a.ts".into() })
        .await
        .unwrap();
    assert_eq!(reply, QueryReply::QuickInfo(Some("0 applied".into())));
}
