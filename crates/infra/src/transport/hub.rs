//! Realtime hub connection with automatic reconnect.
//!
//! The hub delivers the plan's broadcasts as invocations. [`HubTransport`]
//! negotiates, connects, performs the handshake and then runs a reader task
//! that forwards every invocation as a [`TransportEvent::Message`]. When the
//! socket drops it walks the configured reconnect delays, reporting
//! `Reconnecting`, `Reconnected` and finally `Closed` on the event channel.
//! The reader task is cancelled and joined by [`HubTransport::stop`].

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use plansync_core::TransportEvent;
use plansync_domain::{ConnectionInfo, PlanSyncError, Result, SessionConfig};
use reqwest::Method;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::protocol::{
    handshake_request, negotiate_url, parse_record, ping_record, split_records, websocket_url,
    HubRecord, NegotiateResponse,
};
use crate::errors::InfraError;
use crate::http::HttpClient;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;
type SocketStream = SplitStream<Socket>;

/// Negotiate may redirect once to another endpoint.
const MAX_NEGOTIATE_REDIRECTS: usize = 1;

/// Configuration for the hub transport.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Wait before each reconnect attempt; exhausting the list closes the
    /// transport.
    pub reconnect_delays: Vec<Duration>,
    /// Bound on connecting plus the handshake reply.
    pub connect_timeout: Duration,
    /// Interval for client pings so the hub keeps the connection.
    pub keep_alive: Duration,
    pub event_capacity: usize,
    pub join_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from_session(&SessionConfig::new(""))
    }
}

impl HubConfig {
    pub fn from_session(session: &SessionConfig) -> Self {
        Self {
            reconnect_delays: session
                .reconnect_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            connect_timeout: Duration::from_secs(15),
            keep_alive: Duration::from_secs(15),
            event_capacity: 256,
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// A live connection produced by negotiate + connect + handshake.
struct Connection {
    connection_id: String,
    sink: SocketSink,
    stream: SocketStream,
    /// Records that arrived in the same frame as the handshake reply.
    backlog: Vec<String>,
}

/// Why the reader stopped pumping a connection.
#[derive(Debug, PartialEq, Eq)]
enum Disconnect {
    Cancelled,
    ReceiverGone,
    Lost { reason: String, allow_reconnect: bool },
}

/// Client side of the realtime hub.
pub struct HubTransport {
    http: HttpClient,
    info: ConnectionInfo,
    config: HubConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl HubTransport {
    pub fn new(http: HttpClient, info: ConnectionInfo, config: HubConfig) -> Self {
        Self { http, info, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Connect and spawn the reader task.
    ///
    /// Returns the connection id (to register with the store) and the
    /// channel the session runtime consumes.
    ///
    /// # Errors
    /// `PlanSyncError::Transport` if negotiate, connect or the handshake
    /// fails, or the transport is already running.
    #[instrument(skip(self), fields(hub = %self.info.url))]
    pub async fn start(&mut self) -> Result<(String, mpsc::Receiver<TransportEvent>)> {
        if self.is_running() {
            return Err(PlanSyncError::Transport("hub transport already running".into()));
        }

        let connection = connect(&self.http, &self.info, self.config.connect_timeout).await?;
        let connection_id = connection.connection_id.clone();
        info!(%connection_id, "hub connected");

        self.cancellation = CancellationToken::new();
        let (events, receiver) = mpsc::channel(self.config.event_capacity.max(1));
        let http = self.http.clone();
        let info = self.info.clone();
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(async move {
            run(connection, http, info, config, events, cancel).await;
        }));

        Ok((connection_id, receiver))
    }

    /// Cancel the reader task and wait for it to finish.
    ///
    /// # Errors
    /// `PlanSyncError::Internal` when the task panicked or did not finish
    /// within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "hub reader panicked");
                    return Err(PlanSyncError::Internal("hub reader panicked".into()));
                }
                Err(_) => {
                    warn!("hub reader did not stop within timeout");
                    return Err(PlanSyncError::Internal("hub reader stop timed out".into()));
                }
            }
        }

        info!("hub transport stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

async fn run(
    mut connection: Connection,
    http: HttpClient,
    info: ConnectionInfo,
    config: HubConfig,
    events: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let outcome = pump(&mut connection, &events, &cancel, config.keep_alive).await;
        let _ = connection.sink.close().await;

        let reason = match outcome {
            Disconnect::Cancelled => {
                let _ = events.try_send(TransportEvent::Closed { reason: None });
                debug!("hub reader cancelled");
                return;
            }
            Disconnect::ReceiverGone => {
                debug!("transport events no longer consumed");
                return;
            }
            Disconnect::Lost { reason, allow_reconnect: false } => {
                error!(%reason, "hub closed the connection without reconnect");
                let _ = events.send(TransportEvent::Closed { reason: Some(reason) }).await;
                return;
            }
            Disconnect::Lost { reason, allow_reconnect: true } => reason,
        };

        warn!(%reason, "hub connection lost");
        if events.send(TransportEvent::Reconnecting { reason: reason.clone() }).await.is_err() {
            return;
        }

        match reconnect(&http, &info, &config, &cancel).await {
            Some(Ok(next)) => {
                info!(connection_id = %next.connection_id, "hub reconnected");
                let reconnected =
                    TransportEvent::Reconnected { connection_id: next.connection_id.clone() };
                if events.send(reconnected).await.is_err() {
                    return;
                }
                connection = next;
            }
            Some(Err(last_error)) => {
                error!(error = %last_error, "hub reconnect attempts exhausted");
                let closed = TransportEvent::Closed {
                    reason: Some(format!("Connection lost: {reason}")),
                };
                let _ = events.send(closed).await;
                return;
            }
            None => {
                let _ = events.try_send(TransportEvent::Closed { reason: None });
                return;
            }
        }
    }
}

/// Walk the reconnect delays. `None` when cancelled while waiting.
async fn reconnect(
    http: &HttpClient,
    info: &ConnectionInfo,
    config: &HubConfig,
    cancel: &CancellationToken,
) -> Option<Result<Connection>> {
    let mut last_error = PlanSyncError::Transport("no reconnect attempts configured".into());

    for (attempt, delay) in config.reconnect_delays.iter().enumerate() {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(*delay) => {}
        }

        debug!(attempt = attempt + 1, delay_ms = delay.as_millis(), "hub reconnect attempt");
        let attempt_result = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            result = connect(http, info, config.connect_timeout) => result,
        };
        match attempt_result {
            Ok(connection) => return Some(Ok(connection)),
            Err(err) => {
                warn!(attempt = attempt + 1, error = %err, "hub reconnect attempt failed");
                last_error = err;
            }
        }
    }

    Some(Err(last_error))
}

/// Forward records from one connection until it ends.
async fn pump(
    connection: &mut Connection,
    events: &mpsc::Sender<TransportEvent>,
    cancel: &CancellationToken,
    keep_alive: Duration,
) -> Disconnect {
    let backlog = std::mem::take(&mut connection.backlog);
    for record in &backlog {
        if let Some(disconnect) = handle_record(record, &mut connection.sink, events).await {
            return disconnect;
        }
    }

    let mut ping = tokio::time::interval(keep_alive.max(Duration::from_millis(10)));
    ping.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Disconnect::Cancelled,
            _ = ping.tick() => {
                if let Err(err) = connection.sink.send(Message::Text(ping_record().into())).await {
                    return lost(format!("keep-alive failed: {err}"));
                }
            }
            frame = connection.stream.next() => {
                let message = match frame {
                    None => return lost("connection closed".to_string()),
                    Some(Err(err)) => return lost(err.to_string()),
                    Some(Ok(message)) => message,
                };
                match message {
                    Message::Text(text) => {
                        for record in split_records(text.as_str()) {
                            if let Some(disconnect) =
                                handle_record(record, &mut connection.sink, events).await
                            {
                                return disconnect;
                            }
                        }
                    }
                    Message::Ping(data) => {
                        let _ = connection.sink.send(Message::Pong(data)).await;
                    }
                    Message::Close(frame) => {
                        let reason = frame
                            .map(|frame| frame.reason.to_string())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| "connection closed".to_string());
                        return lost(reason);
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn handle_record(
    record: &str,
    sink: &mut SocketSink,
    events: &mpsc::Sender<TransportEvent>,
) -> Option<Disconnect> {
    match parse_record(record) {
        Ok(HubRecord::Invocation { target, arguments }) => {
            let payload = arguments.into_iter().next().unwrap_or(Value::Null);
            debug!(%target, "hub invocation");
            if events.send(TransportEvent::Message { target, payload }).await.is_err() {
                return Some(Disconnect::ReceiverGone);
            }
        }
        Ok(HubRecord::Ping) => {
            if let Err(err) = sink.send(Message::Text(ping_record().into())).await {
                return Some(lost(format!("ping reply failed: {err}")));
            }
        }
        Ok(HubRecord::Close { error, allow_reconnect }) => {
            return Some(Disconnect::Lost {
                reason: error.unwrap_or_else(|| "hub closed the connection".to_string()),
                allow_reconnect,
            });
        }
        Ok(HubRecord::Handshake { .. }) => debug!("unexpected handshake reply ignored"),
        Ok(HubRecord::Other(kind)) => debug!(kind, "hub record ignored"),
        Err(err) => warn!(error = %err, "dropping unreadable hub record"),
    }
    None
}

fn lost(reason: String) -> Disconnect {
    Disconnect::Lost { reason, allow_reconnect: true }
}

/// Negotiate, open the socket and complete the handshake.
async fn connect(
    http: &HttpClient,
    info: &ConnectionInfo,
    connect_timeout: Duration,
) -> Result<Connection> {
    match tokio::time::timeout(connect_timeout, connect_inner(http, info)).await {
        Ok(result) => result,
        Err(_) => Err(PlanSyncError::Transport(format!(
            "hub connect timed out after {}s",
            connect_timeout.as_secs()
        ))),
    }
}

async fn connect_inner(http: &HttpClient, info: &ConnectionInfo) -> Result<Connection> {
    let (hub_url, access_token, negotiated) = negotiate(http, info).await?;
    let connection_id = negotiated
        .connection_id
        .clone()
        .ok_or_else(|| PlanSyncError::Transport("negotiate returned no connection id".into()))?;
    let token = negotiated.connection_token.unwrap_or_else(|| connection_id.clone());

    let url = websocket_url(&hub_url, &token, &access_token)?;
    let (socket, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|err| PlanSyncError::from(InfraError::from(err)))?;
    let (mut sink, mut stream) = socket.split();

    sink.send(Message::Text(handshake_request().into()))
        .await
        .map_err(|err| PlanSyncError::from(InfraError::from(err)))?;

    let backlog = loop {
        let frame = stream
            .next()
            .await
            .ok_or_else(|| PlanSyncError::Transport("hub closed during handshake".into()))?
            .map_err(|err| PlanSyncError::from(InfraError::from(err)))?;
        match frame {
            Message::Text(text) => {
                let mut records = split_records(text.as_str());
                let reply = records
                    .next()
                    .ok_or_else(|| PlanSyncError::Transport("empty handshake reply".into()))?;
                if let HubRecord::Handshake { error: Some(error) } = parse_record(reply)? {
                    return Err(PlanSyncError::Transport(format!("hub handshake refused: {error}")));
                }
                break records.map(str::to_string).collect::<Vec<_>>();
            }
            Message::Close(_) => {
                return Err(PlanSyncError::Transport("hub closed during handshake".into()));
            }
            _ => {}
        }
    };

    Ok(Connection { connection_id, sink, stream, backlog })
}

/// `POST <hub>/negotiate`, following at most one redirect.
async fn negotiate(
    http: &HttpClient,
    info: &ConnectionInfo,
) -> Result<(String, String, NegotiateResponse)> {
    let mut hub_url = info.url.clone();
    let mut access_token = info.access_token.clone();

    for _ in 0..=MAX_NEGOTIATE_REDIRECTS {
        let url = negotiate_url(&hub_url)?;
        let request =
            http.request(Method::POST, url.as_str()).bearer_auth(&access_token).body(Vec::new());
        let response = http
            .send_once(request)
            .await
            .map_err(|err| PlanSyncError::Transport(format!("negotiate failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlanSyncError::Transport(format!("negotiate returned HTTP {status}")));
        }
        let negotiated: NegotiateResponse = response
            .json()
            .await
            .map_err(|err| PlanSyncError::Transport(format!("unreadable negotiate reply: {err}")))?;

        if let Some(error) = &negotiated.error {
            return Err(PlanSyncError::Transport(format!("negotiate refused: {error}")));
        }
        if negotiated.connection_id.is_some() {
            return Ok((hub_url, access_token, negotiated));
        }
        match (negotiated.url, negotiated.access_token) {
            (Some(next_url), Some(next_token)) => {
                debug!(url = %next_url, "negotiate redirected");
                hub_url = next_url;
                access_token = next_token;
            }
            _ => break,
        }
    }

    Err(PlanSyncError::Transport("negotiate returned no connection id".into()))
}
