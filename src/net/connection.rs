//! One live connection
//!
//! Three tasks per connection:
//! - reader: WebSocket → bounded inbound queue, drops frames when full
//! - processor: applies messages strictly in arrival order
//! - writer: outbound queue → WebSocket
//!
//! They share a cancellation token. Once it fires nothing else is delivered
//! to the peer and the session state is dropped.

use async_tungstenite::tungstenite::{Error as WsError, Message};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use image::RgbImage;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::analysis::{ExerciseAnalyzer, LandmarkSet};
use crate::assets::OUTBOUND_QUEUE_DEPTH;
use crate::config::SessionConfig;
use crate::net::protocol::{ClientMessage, ServerMessage};
use crate::pose::decode::decode_frame;
use crate::pose::overlay::{annotate, encode_data_uri};
use crate::pose::PoseEstimator;
use crate::session::{Lifecycle, SessionCoordinator, SessionError, SessionHealth, SessionId, SessionSummary};

/// What every session of a server shares
pub struct SessionContext {
    pub estimator: Arc<dyn PoseEstimator>,
    pub config: SessionConfig,
}

impl SessionContext {
    pub fn new(estimator: Arc<dyn PoseEstimator>, config: SessionConfig) -> Arc<Self> {
        Arc::new(Self { estimator, config })
    }
}

/// Item queued between reader and processor
#[derive(Debug)]
pub enum Inbound {
    Message(ClientMessage),
    /// Unparseable message, reported in order with the others
    Rejected(SessionError),
}

impl Inbound {
    fn is_frame(&self) -> bool {
        matches!(self, Inbound::Message(msg) if msg.is_frame())
    }
}

/// Serve a connection until the peer leaves, a fatal error occurs or
/// `cancel` fires.
pub async fn serve_connection<W>(
    id: SessionId,
    ws: W,
    ctx: Arc<SessionContext>,
    cancel: CancellationToken,
) -> SessionSummary
where
    W: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    let health = Arc::new(SessionHealth::new());
    let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(ctx.config.queue_depth.max(1));
    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE_DEPTH);
    let (sink, stream) = ws.split();

    let reader = tokio::spawn(read_loop(id, stream, inbound_tx, Arc::clone(&health), cancel.clone()));
    let writer = tokio::spawn(write_loop(id, sink, outbound_rx, cancel.clone()));

    let summary = run_session(id, inbound_rx, outbound_tx, ctx, Arc::clone(&health), cancel.clone()).await;

    // let the writer flush a final error before tearing the reader down
    let _ = writer.await;
    cancel.cancel();
    let _ = reader.await;

    info!("Session {}: closed, {}", id, summary);
    info!("Session {}: {}", id, health.summary());
    summary
}

async fn read_loop<S>(
    id: SessionId,
    mut stream: S,
    inbound: mpsc::Sender<Inbound>,
    health: Arc<SessionHealth>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        let item = match next {
            Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                Ok(msg) => Inbound::Message(msg),
                Err(err) => Inbound::Rejected(err),
            },
            Some(Ok(Message::Binary(_))) => Inbound::Rejected(SessionError::Malformed("binary messages are not supported".into())),
            Some(Ok(Message::Close(_))) | None => {
                info!("Session {}: peer disconnected", id);
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("Session {}: receive error: {}", id, e);
                break;
            }
        };

        if item.is_frame() {
            // late frames are worthless, keep only what fits
            match inbound.try_send(item) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    health.record_frame_drop();
                    debug!("Session {}: inbound queue full, frame dropped", id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        } else {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = inbound.send(item) => sent,
            };
            if sent.is_err() {
                break;
            }
        }
    }

    cancel.cancel();
}

async fn write_loop<K>(id: SessionId, mut sink: K, mut outbound: mpsc::Receiver<ServerMessage>, cancel: CancellationToken)
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = outbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Session {}: could not serialize reply: {}", id, e);
                continue;
            }
        };

        if let Err(e) = sink.send(Message::text(json)).await {
            warn!("Session {}: send error: {}", id, e);
            break;
        }
    }

    let _ = sink.close().await;
}

/// Sequential message processing for one session.
///
/// Owns the session state; returns its summary once the inbound queue is
/// closed, a fatal error was reported or `cancel` fired.
pub async fn run_session(
    id: SessionId,
    mut inbound: mpsc::Receiver<Inbound>,
    outbound: mpsc::Sender<ServerMessage>,
    ctx: Arc<SessionContext>,
    health: Arc<SessionHealth>,
    cancel: CancellationToken,
) -> SessionSummary {
    let mut task = SessionTask {
        session: SessionCoordinator::new(id, ExerciseAnalyzer::new(ctx.config.min_visibility)),
        lifecycle: Lifecycle::new(),
        ctx,
        health,
        outbound,
        cancel: cancel.clone(),
    };

    let available = tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        available = task.ctx.estimator.is_available() => available,
    };

    if !available {
        let err = SessionError::EstimatorUnavailable(format!("{} is not running", task.ctx.estimator.name()));
        warn!("Session {}: {}", id, err);
        task.send(ServerMessage::error(&err)).await;
        return task.finish();
    }

    task.lifecycle.activate();
    info!("Session {}: active ({})", id, task.session.exercise());

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = inbound.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            reply = task.handle(item) => reply,
        };

        let fatal = matches!(&reply, Err(err) if err.is_fatal());
        let msg = match reply {
            Ok(msg) => msg,
            Err(err) => {
                warn!("Session {}: {}", id, err);
                ServerMessage::error(&err)
            }
        };

        if !task.send(msg).await || fatal {
            break;
        }
    }

    task.finish()
}

struct SessionTask {
    session: SessionCoordinator,
    lifecycle: Lifecycle,
    ctx: Arc<SessionContext>,
    health: Arc<SessionHealth>,
    outbound: mpsc::Sender<ServerMessage>,
    cancel: CancellationToken,
}

impl SessionTask {
    async fn handle(&mut self, item: Inbound) -> Result<ServerMessage, SessionError> {
        let msg = match item {
            Inbound::Message(msg) => msg,
            Inbound::Rejected(err) => {
                self.health.record_malformed();
                return Err(err);
            }
        };

        match msg {
            ClientMessage::Frame { image } => self.on_image(image).await,
            ClientMessage::Landmarks { landmarks } => {
                let started = Instant::now();
                let result = self.session.on_frame(Some(&landmarks));
                self.record(started, result.is_no_pose());
                Ok(ServerMessage::analysis(result))
            }
            ClientMessage::ChangeExercise { exercise } => match self.session.on_change_exercise(&exercise) {
                Ok(exercise) => Ok(ServerMessage::ExerciseChanged { exercise }),
                Err(err) => {
                    self.health.record_malformed();
                    Err(err)
                }
            },
            ClientMessage::Reset => {
                self.session.on_reset();
                Ok(ServerMessage::ResetComplete)
            }
        }
    }

    async fn on_image(&mut self, payload: String) -> Result<ServerMessage, SessionError> {
        let started = Instant::now();

        let image = tokio::task::spawn_blocking(move || decode_frame(&payload))
            .await
            .map_err(|e| SessionError::Decode(format!("decoder task failed: {}", e)))
            .and_then(|decoded| decoded);
        let image = match image {
            Ok(image) => image,
            Err(err) => {
                self.health.record_decode_failure();
                return Err(err);
            }
        };

        let landmarks = self.ctx.estimator.estimate(&image).await?;
        let result = self.session.on_frame(landmarks.as_ref());

        let echoed = if self.ctx.config.echo_frames {
            self.echo(image, landmarks).await
        } else {
            None
        };

        self.record(started, result.is_no_pose());
        Ok(ServerMessage::Analysis { result, image: echoed })
    }

    /// Skeleton overlay + JPEG encode off the async threads
    async fn echo(&self, mut image: RgbImage, landmarks: Option<LandmarkSet>) -> Option<String> {
        let quality = self.ctx.config.jpeg_quality;
        let min_visibility = self.ctx.config.min_visibility;

        let encoded = tokio::task::spawn_blocking(move || {
            if let Some(landmarks) = &landmarks {
                annotate(&mut image, landmarks, min_visibility);
            }
            encode_data_uri(&image, quality)
        })
        .await;

        match encoded {
            Ok(Ok(uri)) => Some(uri),
            Ok(Err(err)) => {
                warn!("Session {}: {}", self.session.id(), err);
                None
            }
            Err(e) => {
                warn!("Session {}: encoder task failed: {}", self.session.id(), e);
                None
            }
        }
    }

    fn record(&self, started: Instant, no_pose: bool) {
        let elapsed = started.elapsed();
        let budget = self.ctx.config.frame_budget;
        if self.health.record_frame(elapsed, no_pose, budget) {
            warn!(
                "Session {}: frame took {:?}, over the {:?} budget",
                self.session.id(),
                elapsed,
                budget
            );
        }
    }

    /// Queue a reply unless the session is already going away
    async fn send(&mut self, msg: ServerMessage) -> bool {
        if self.cancel.is_cancelled() || !self.lifecycle.state().accepts_output() {
            return false;
        }
        self.outbound.send(msg).await.is_ok()
    }

    fn finish(mut self) -> SessionSummary {
        self.lifecycle.close();
        self.session.on_disconnect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::tests::{pushup_pose, squat_pose};
    use crate::analysis::{ExerciseKind, Stage};
    use crate::pose::EstimatorError;
    use crate::pose::decode::tests::png_data_uri;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of estimator outcomes, one per frame
    struct ScriptedEstimator {
        available: bool,
        script: Mutex<VecDeque<Result<Option<LandmarkSet>, EstimatorError>>>,
    }

    impl ScriptedEstimator {
        fn new(script: Vec<Result<Option<LandmarkSet>, EstimatorError>>) -> Arc<Self> {
            Arc::new(Self {
                available: true,
                script: Mutex::new(script.into()),
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                available: false,
                script: Mutex::new(VecDeque::new()),
            })
        }
    }

    #[async_trait]
    impl PoseEstimator for ScriptedEstimator {
        async fn estimate(&self, _image: &RgbImage) -> Result<Option<LandmarkSet>, EstimatorError> {
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn name(&self) -> &'static str {
            "ScriptedEstimator"
        }
    }

    fn landmarks(set: LandmarkSet) -> Inbound {
        Inbound::Message(ClientMessage::Landmarks { landmarks: set })
    }

    fn control(msg: ClientMessage) -> Inbound {
        Inbound::Message(msg)
    }

    fn change(exercise: &str) -> Inbound {
        control(ClientMessage::ChangeExercise {
            exercise: exercise.into(),
        })
    }

    fn frame() -> Inbound {
        Inbound::Message(ClientMessage::Frame {
            image: png_data_uri(8, 8),
        })
    }

    /// Feed `items`, close the queue and collect everything the session sent
    async fn drive(
        estimator: Arc<dyn PoseEstimator>,
        config: SessionConfig,
        items: Vec<Inbound>,
    ) -> (Vec<ServerMessage>, SessionSummary) {
        let (in_tx, in_rx) = mpsc::channel(items.len().max(1));
        let (out_tx, mut out_rx) = mpsc::channel(64);
        for item in items {
            in_tx.send(item).await.unwrap();
        }
        drop(in_tx);

        let ctx = SessionContext::new(estimator, config);
        let summary = run_session(7, in_rx, out_tx, ctx, Arc::new(SessionHealth::new()), CancellationToken::new()).await;

        let mut sent = Vec::new();
        while let Some(msg) = out_rx.recv().await {
            sent.push(msg);
        }
        (sent, summary)
    }

    fn analyses(sent: &[ServerMessage]) -> Vec<&crate::analysis::AnalysisResult> {
        sent.iter()
            .filter_map(|msg| match msg {
                ServerMessage::Analysis { result, .. } => Some(result),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pushup_session() {
        let mut items = vec![change("pushup")];
        items.extend([170.0, 170.0, 85.0, 170.0, 170.0].map(|angle| landmarks(pushup_pose(angle))));

        let (sent, summary) = drive(ScriptedEstimator::new(vec![]), SessionConfig::default(), items).await;

        assert_eq!(
            sent[0],
            ServerMessage::ExerciseChanged {
                exercise: ExerciseKind::Pushup
            }
        );
        let results = analyses(&sent);
        assert_eq!(results.len(), 5);
        assert_eq!(results.last().unwrap().rep_count, 1);
        assert_eq!(results[2].stage, Stage::Down);
        assert_eq!(results[2].form_score, 100);
        assert!(results.iter().all(|r| r.feedback.is_empty()));

        assert_eq!(summary.rep_count, 1);
        assert_eq!(summary.exercise, ExerciseKind::Pushup);
    }

    #[tokio::test]
    async fn test_frames_go_through_estimator() {
        let script = [170.0, 80.0, 165.0].map(|angle| Ok(Some(squat_pose(angle)))).to_vec();
        let (sent, _) = drive(
            ScriptedEstimator::new(script),
            SessionConfig::default(),
            vec![frame(), frame(), frame(), frame()],
        )
        .await;

        let results = analyses(&sent);
        assert_eq!(results.len(), 4);
        assert_eq!(results[2].rep_count, 1);
        // script exhausted: the estimator saw nobody
        assert!(results[3].is_no_pose());
        assert_eq!(results[3].rep_count, 1);
    }

    #[tokio::test]
    async fn test_unavailable_estimator_closes_session() {
        let (sent, summary) = drive(ScriptedEstimator::unavailable(), SessionConfig::default(), vec![frame(), change("plank")]).await;

        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], ServerMessage::Error { message } if message.contains("unavailable")));
        assert_eq!(summary.frames, 0);
    }

    #[tokio::test]
    async fn test_estimator_lost_mid_session() {
        let script = vec![
            Ok(Some(squat_pose(170.0))),
            Err(EstimatorError::Unavailable("sidecar exited".into())),
            Ok(Some(squat_pose(80.0))),
        ];
        let (sent, _) = drive(ScriptedEstimator::new(script), SessionConfig::default(), vec![frame(), frame(), frame()]).await;

        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], ServerMessage::Analysis { .. }));
        assert!(matches!(&sent[1], ServerMessage::Error { message } if message.contains("sidecar exited")));
    }

    #[tokio::test]
    async fn test_transient_errors_keep_session() {
        let script = vec![Err(EstimatorError::Failed("model hiccup".into())), Ok(Some(squat_pose(80.0)))];
        let items = vec![
            Inbound::Rejected(SessionError::Malformed("not json".into())),
            control(ClientMessage::Frame {
                image: "data:image/jpeg;base64,!!!".into(),
            }),
            frame(),
            frame(),
            change("lunge"),
            control(ClientMessage::Reset),
        ];
        let (sent, summary) = drive(ScriptedEstimator::new(script), SessionConfig::default(), items).await;

        assert_eq!(sent.len(), 6);
        assert!(matches!(&sent[0], ServerMessage::Error { message } if message.contains("malformed")));
        assert!(matches!(&sent[1], ServerMessage::Error { message } if message.contains("decode")));
        assert!(matches!(&sent[2], ServerMessage::Error { message } if message.contains("model hiccup")));
        match &sent[3] {
            ServerMessage::Analysis { result, .. } => assert_eq!(result.stage, Stage::Down),
            other => panic!("expected analysis, got {:?}", other),
        }
        assert!(matches!(&sent[4], ServerMessage::Error { message } if message.contains("lunge")));
        assert_eq!(sent[5], ServerMessage::ResetComplete);

        // lunge was rejected, squat kept
        assert_eq!(summary.exercise, ExerciseKind::Squat);
    }

    #[tokio::test]
    async fn test_echo_frames() {
        let config = SessionConfig {
            echo_frames: true,
            ..Default::default()
        };
        let script = vec![Ok(Some(squat_pose(170.0))), Ok(None)];
        let (sent, _) = drive(ScriptedEstimator::new(script), config, vec![frame(), frame(), landmarks(squat_pose(80.0))]).await;

        let images: Vec<Option<&String>> = sent
            .iter()
            .map(|msg| match msg {
                ServerMessage::Analysis { image, .. } => image.as_ref(),
                _ => None,
            })
            .collect();
        assert!(images[0].unwrap().starts_with("data:image/jpeg;base64,"));
        // no pose still echoes the plain frame
        assert!(images[1].is_some());
        // nothing to echo for client-side landmarks
        assert!(images[2].is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_frames_but_keeps_control() {
        let text = |value: serde_json::Value| -> Result<Message, WsError> { Ok(Message::text(value.to_string())) };
        let pose = serde_json::json!({"type": "landmarks", "landmarks": squat_pose(170.0)});
        let incoming = futures_util::stream::iter(vec![
            text(pose.clone()),
            text(pose.clone()),
            text(pose.clone()),
            text(serde_json::json!({"type": "reset"})),
            text(serde_json::json!({"type": "change_exercise", "exercise": "pushup"})),
        ]);

        // nobody drains the queue until the burst is over
        let (in_tx, mut in_rx) = mpsc::channel(1);
        let health = Arc::new(SessionHealth::new());
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(3, incoming, in_tx, Arc::clone(&health), cancel.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(health.frame_drops(), 2);
        assert!(!reader.is_finished());

        let mut delivered = Vec::new();
        while let Some(item) = in_rx.recv().await {
            delivered.push(item);
        }
        reader.await.unwrap();

        assert_eq!(delivered.len(), 3);
        assert!(matches!(&delivered[0], Inbound::Message(ClientMessage::Landmarks { .. })));
        assert!(matches!(&delivered[1], Inbound::Message(ClientMessage::Reset)));
        assert!(matches!(
            &delivered[2],
            Inbound::Message(ClientMessage::ChangeExercise { exercise }) if exercise == "pushup"
        ));
        assert_eq!(health.frame_drops(), 2);
        // end of stream counts as a disconnect
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_session_sends_nothing() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        in_tx.send(landmarks(squat_pose(80.0))).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let ctx = SessionContext::new(ScriptedEstimator::new(vec![]), SessionConfig::default());
        let summary = run_session(1, in_rx, out_tx, ctx, Arc::new(SessionHealth::new()), cancel).await;

        assert!(out_rx.recv().await.is_none());
        assert_eq!(summary.frames, 0);
    }
}
