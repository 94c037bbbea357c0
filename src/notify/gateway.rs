// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification gateway: socket lifecycle and push delivery.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::protocol::{user_channel, ClientMessage, ServerMessage};
use super::registry::{
    ConnectionHandle, ConnectionId, ConnectionInfo, ConnectionRegistry, PushError,
};
use crate::auth::AuthenticatedUser;
use crate::session::{SessionId, SessionManager};
use crate::users::UserId;

/// Default liveness window for a socket.
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(10);

/// Default per-connection outbound buffer, in frames.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// WebSocket close code (policy violation) for expiry, ended sessions and
/// replaced connections.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub refresh_window: Duration,
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            refresh_window: DEFAULT_REFRESH_WINDOW,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("channel {0} is not available to this connection")]
    ChannelForbidden(String),

    #[error("session has ended")]
    SessionEnded,
}

impl GatewayError {
    /// Whether the connection must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::SessionEnded)
    }
}

/// Server-side state of one authenticated socket.
pub struct Connection {
    info: ConnectionInfo,
    session_id: SessionId,
    outbound: mpsc::Receiver<String>,
    expires_at: DateTime<Utc>,
    deadline: Instant,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.info.id()
    }

    pub fn user_id(&self) -> UserId {
        self.info.user_id()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[cfg(test)]
    pub(crate) async fn recv_outbound(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_recv_outbound(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }
}

struct GatewayInner {
    registry: ConnectionRegistry,
    sessions: SessionManager,
    config: GatewayConfig,
}

/// Owns the connection registry and delivers notifications to it.
#[derive(Clone)]
pub struct NotificationGateway {
    inner: Arc<GatewayInner>,
}

impl NotificationGateway {
    pub fn new(sessions: SessionManager, config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                registry: ConnectionRegistry::new(),
                sessions,
                config,
            }),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn connection_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Users connected with presence tracking.
    pub fn presence(&self) -> Vec<UserId> {
        self.inner.registry.presence()
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Serialise `event` and push it to the user's live connection.
    ///
    /// Never fails: an absent connection or a failed push is logged and the
    /// event is dropped.
    pub fn notify<E: Serialize>(&self, user_id: UserId, event: &E) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, error = %e, "Failed to serialise notification");
                return;
            }
        };

        match self.inner.registry.push(user_id, payload) {
            None => debug!(user_id, "No live connection, notification dropped"),
            Some(Ok(connection_id)) => {
                debug!(user_id, connection_id = %connection_id, "Notification pushed")
            }
            Some(Err(PushError::Full)) => {
                warn!(user_id, "Outbound buffer full, notification dropped")
            }
            Some(Err(PushError::Closed)) => {
                debug!(user_id, "Connection closing, notification dropped")
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register a connection for an authenticated user, replacing any
    /// existing one.
    pub fn connect(&self, user: &AuthenticatedUser) -> Connection {
        let (sender, outbound) = mpsc::channel(self.inner.config.outbound_buffer.max(1));
        let span = info_span!("socket", connection_id = tracing::field::Empty, user_id = user.user_id);
        let handle = ConnectionHandle::new(user.user_id, sender, span);
        let meta = handle.info().clone();
        meta.span()
            .record("connection_id", tracing::field::display(meta.id()));

        let (expires_at, deadline) = self.next_expiry();

        // The registry keeps the only sender; the replaced entry is dropped
        // here, which closes the earlier connection's outbound channel.
        meta.span().in_scope(|| {
            if let Some(previous) = self.inner.registry.register(handle) {
                info!(replaced = %previous.id(), "Connection replaced an earlier one");
            }
            info!("Connection registered");
        });

        Connection {
            info: meta,
            session_id: user.session_id.clone(),
            outbound,
            expires_at,
            deadline,
        }
    }

    /// Remove the connection's registry entry unless a newer connection for
    /// the same user has taken it.
    pub fn disconnect(&self, connection: &Connection) {
        let removed = self
            .inner
            .registry
            .deregister(connection.user_id(), connection.id());
        connection.info.span().in_scope(|| {
            if removed {
                info!("Connection deregistered");
            } else {
                debug!("Connection already superseded");
            }
        });
    }

    fn next_expiry(&self) -> (DateTime<Utc>, Instant) {
        let window = self.inner.config.refresh_window;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(10));
        (expires_at, Instant::now() + window)
    }

    /// Parse and handle one text frame.
    pub async fn handle_text(
        &self,
        connection: &mut Connection,
        text: &str,
    ) -> Result<ServerMessage, GatewayError> {
        let message = serde_json::from_str::<ClientMessage>(text)
            .map_err(|e| GatewayError::InvalidMessage(e.to_string()))?;
        self.handle_client_message(connection, message).await
    }

    pub async fn handle_client_message(
        &self,
        connection: &mut Connection,
        message: ClientMessage,
    ) -> Result<ServerMessage, GatewayError> {
        match message {
            ClientMessage::Subscribe { channel } => {
                if channel != user_channel(connection.user_id()) {
                    return Err(GatewayError::ChannelForbidden(channel));
                }
                connection.info.set_presence(true);
                Ok(ServerMessage::Subscribed {
                    channel,
                    presence: self.presence(),
                })
            }
            ClientMessage::Refresh => {
                let live = self
                    .inner
                    .sessions
                    .load(&connection.session_id)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Session lookup failed during refresh");
                        GatewayError::SessionEnded
                    })?;
                if live.is_none() {
                    return Err(GatewayError::SessionEnded);
                }

                let (expires_at, deadline) = self.next_expiry();
                connection.expires_at = expires_at;
                connection.deadline = deadline;
                Ok(ServerMessage::Refreshed { expires_at })
            }
            ClientMessage::Ping => Ok(ServerMessage::Pong),
        }
    }

    // =========================================================================
    // Socket
    // =========================================================================

    /// Run an upgraded socket until it closes, errors or lapses.
    pub async fn serve(self, socket: WebSocket, user: AuthenticatedUser) {
        let (sink, stream) = socket.split();
        self.run(sink, stream, user).await
    }

    /// Drive one connection over any frame sink and stream, deregistering
    /// when the loop ends.
    pub(crate) async fn run<S, R, E>(self, mut sink: S, mut stream: R, user: AuthenticatedUser)
    where
        S: Sink<Message> + Unpin,
        S::Error: fmt::Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let mut connection = self.connect(&user);
        let span = connection.info.span().clone();

        async {
            self.run_socket(&mut sink, &mut stream, &mut connection).await;
            self.disconnect(&connection);
        }
        .instrument(span)
        .await
    }

    async fn run_socket<S, R, E>(&self, sink: &mut S, stream: &mut R, connection: &mut Connection)
    where
        S: Sink<Message> + Unpin,
        S::Error: fmt::Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let hello = ServerMessage::Connected {
            connection_id: connection.id(),
            user_id: connection.user_id(),
            expires_at: connection.expires_at,
        };
        if send_json(sink, &hello).await.is_err() {
            return;
        }

        loop {
            let deadline = connection.deadline;

            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let (reply, fatal) = match self.handle_text(connection, text.as_str()).await {
                            Ok(reply) => (reply, false),
                            Err(e) => {
                                debug!(error = %e, "Client message rejected");
                                let fatal = e.is_fatal();
                                (ServerMessage::Error { message: e.to_string() }, fatal)
                            }
                        };
                        if send_json(sink, &reply).await.is_err() {
                            break;
                        }
                        if fatal {
                            close(sink, "session ended").await;
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                },
                outbound = connection.outbound.recv() => match outbound {
                    Some(payload) => {
                        if sink.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        info!("Connection replaced, closing");
                        close(sink, "replaced").await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    info!("Connection expired without refresh");
                    close(sink, "expired").await;
                    break;
                }
            }
        }
    }
}

async fn send_json<S>(sink: &mut S, message: &ServerMessage) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(message) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            error!(error = %e, "Failed to serialise server message");
            Ok(())
        }
    }
}

async fn close<S>(sink: &mut S, reason: &'static str)
where
    S: Sink<Message> + Unpin,
{
    let frame = CloseFrame {
        code: CLOSE_POLICY_VIOLATION,
        reason: reason.into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{TransactionEvent, TransactionSummary};
    use crate::session::{InMemorySessionStore, SessionConfig, SessionData};
    use crate::wallet::Direction;

    fn setup() -> (NotificationGateway, SessionManager) {
        let sessions = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            b"0123456789abcdef0123456789abcdef",
            SessionConfig::default(),
        );
        let gateway = NotificationGateway::new(sessions.clone(), GatewayConfig::default());
        (gateway, sessions)
    }

    async fn user(sessions: &SessionManager, user_id: UserId) -> AuthenticatedUser {
        let session = sessions.start(SessionData::default()).await.unwrap();
        AuthenticatedUser {
            session_id: session.id().clone(),
            user_id,
            paymail: format!("u{user_id}@example.com"),
            access_key_id: "ak".into(),
            access_key: "key".into(),
            session_expires_at: session.expires_at(),
        }
    }

    fn summary() -> TransactionSummary {
        TransactionSummary {
            id: "tx-1".into(),
            sender: "a@example.com".into(),
            receiver: "b@example.com".into(),
            direction: Direction::Outgoing,
            status: crate::notify::TransactionStatus::Unconfirmed,
            total_value: 10,
            fee: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn notify_delivers_exactly_one_message() {
        let (gateway, sessions) = setup();
        let mut conn = gateway.connect(&user(&sessions, 1).await);
        let event = TransactionEvent::Success(summary());

        gateway.notify(1, &event);

        let received = conn.outbound.try_recv().unwrap();
        assert_eq!(received, serde_json::to_string(&event).unwrap());
        assert!(conn.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn notify_without_connection_is_silent() {
        let (gateway, sessions) = setup();
        let mut other = gateway.connect(&user(&sessions, 2).await);

        gateway.notify(1, &TransactionEvent::Error("x".into()));

        assert!(other.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn nothing_delivered_after_disconnect() {
        let (gateway, sessions) = setup();
        let mut conn = gateway.connect(&user(&sessions, 1).await);
        gateway.disconnect(&conn);
        assert_eq!(gateway.connection_count(), 0);

        gateway.notify(1, &TransactionEvent::Error("late".into()));
        assert!(conn.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn newer_connection_survives_stale_disconnect() {
        let (gateway, sessions) = setup();
        let alice = user(&sessions, 1).await;
        let mut first = gateway.connect(&alice);
        let mut second = gateway.connect(&alice);

        gateway.disconnect(&first);
        gateway.notify(1, &TransactionEvent::Error("e".into()));

        assert!(first.outbound.try_recv().is_err());
        assert!(second.outbound.try_recv().is_ok());
        assert_eq!(gateway.connection_count(), 1);
    }

    #[tokio::test]
    async fn subscribe_to_own_channel_tracks_presence() {
        let (gateway, sessions) = setup();
        let mut conn = gateway.connect(&user(&sessions, 7).await);
        assert!(gateway.presence().is_empty());

        let reply = gateway
            .handle_text(&mut conn, r##"{"type":"subscribe","channel":"#7"}"##)
            .await
            .unwrap();
        assert_eq!(
            reply,
            ServerMessage::Subscribed {
                channel: "#7".into(),
                presence: vec![7]
            }
        );
    }

    #[tokio::test]
    async fn subscribe_to_foreign_channel_is_refused() {
        let (gateway, sessions) = setup();
        let mut conn = gateway.connect(&user(&sessions, 7).await);

        let err = gateway
            .handle_text(&mut conn, r##"{"type":"subscribe","channel":"#8"}"##)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ChannelForbidden(_)));
        assert!(!err.is_fatal());
        assert!(gateway.presence().is_empty());
    }

    #[tokio::test]
    async fn refresh_extends_expiry_while_session_lives() {
        let (gateway, sessions) = setup();
        let alice = user(&sessions, 1).await;
        let mut conn = gateway.connect(&alice);
        let before = conn.expires_at();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let reply = gateway
            .handle_client_message(&mut conn, ClientMessage::Refresh)
            .await
            .unwrap();

        assert!(matches!(reply, ServerMessage::Refreshed { .. }));
        assert!(conn.expires_at() > before);

        sessions.destroy(&alice.session_id).await.unwrap();
        let err = gateway
            .handle_client_message(&mut conn, ClientMessage::Refresh)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn malformed_frame_is_not_fatal() {
        let (gateway, sessions) = setup();
        let mut conn = gateway.connect(&user(&sessions, 1).await);

        let err = gateway.handle_text(&mut conn, "not json").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidMessage(_)));
        assert!(!err.is_fatal());

        assert_eq!(
            gateway.handle_text(&mut conn, r#"{"type":"ping"}"#).await.unwrap(),
            ServerMessage::Pong
        );
    }

    #[tokio::test]
    async fn replacement_closes_earlier_outbound() {
        let (gateway, sessions) = setup();
        let alice = user(&sessions, 1).await;
        let mut first = gateway.connect(&alice);
        let _second = gateway.connect(&alice);

        let closed = tokio::time::timeout(Duration::from_millis(200), first.recv_outbound()).await;
        assert!(matches!(closed, Ok(None)));
    }

    // =========================================================================
    // Socket loop
    // =========================================================================

    struct Socket {
        to_server: futures::channel::mpsc::UnboundedSender<Result<Message, axum::Error>>,
        from_server: futures::channel::mpsc::UnboundedReceiver<Message>,
        task: tokio::task::JoinHandle<()>,
    }

    impl Socket {
        async fn recv(&mut self) -> Message {
            tokio::time::timeout(Duration::from_secs(30), self.from_server.next())
                .await
                .expect("frame within timeout")
                .expect("socket open")
        }

        async fn recv_json(&mut self) -> serde_json::Value {
            match self.recv().await {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("expected a text frame, got {other:?}"),
            }
        }

        fn send_text(&self, text: &str) {
            self.to_server
                .unbounded_send(Ok(Message::Text(text.into())))
                .unwrap();
        }
    }

    fn open(gateway: &NotificationGateway, user: AuthenticatedUser) -> Socket {
        let (sink, from_server) = futures::channel::mpsc::unbounded::<Message>();
        let (to_server, stream) =
            futures::channel::mpsc::unbounded::<Result<Message, axum::Error>>();
        let task = tokio::spawn(gateway.clone().run(sink, stream, user));
        Socket {
            to_server,
            from_server,
            task,
        }
    }

    fn close_code(message: Message) -> u16 {
        match message {
            Message::Close(Some(frame)) => frame.code,
            other => panic!("expected a close frame, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silent_socket_is_closed_after_window() {
        let (gateway, sessions) = setup();
        let mut socket = open(&gateway, user(&sessions, 1).await);

        assert_eq!(socket.recv_json().await["type"], "connected");
        assert_eq!(gateway.connection_count(), 1);

        assert_eq!(close_code(socket.recv().await), 1008);
        socket.task.await.unwrap();
        assert_eq!(gateway.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_keeps_socket_open_past_window() {
        let (gateway, sessions) = setup();
        let mut socket = open(&gateway, user(&sessions, 1).await);
        socket.recv_json().await;

        tokio::time::advance(Duration::from_secs(8)).await;
        socket.send_text(r#"{"type":"refresh"}"#);
        assert_eq!(socket.recv_json().await["type"], "refreshed");

        tokio::time::advance(Duration::from_secs(8)).await;
        socket.send_text(r#"{"type":"ping"}"#);
        assert_eq!(socket.recv_json().await["type"], "pong");

        assert_eq!(close_code(socket.recv().await), 1008);
    }

    #[tokio::test]
    async fn pushed_events_are_sent_as_text_frames() {
        let (gateway, sessions) = setup();
        let mut socket = open(&gateway, user(&sessions, 1).await);
        socket.recv_json().await;

        gateway.notify(1, &TransactionEvent::Error("boom".into()));

        let frame = socket.recv_json().await;
        assert_eq!(frame["eventType"], "create_transaction");
        assert_eq!(frame["status"], "error");
        assert_eq!(frame["error"], "boom");
    }

    #[tokio::test]
    async fn refresh_after_session_ends_closes_socket() {
        let (gateway, sessions) = setup();
        let alice = user(&sessions, 1).await;
        let session_id = alice.session_id.clone();
        let mut socket = open(&gateway, alice);
        socket.recv_json().await;

        sessions.destroy(&session_id).await.unwrap();
        socket.send_text(r#"{"type":"refresh"}"#);

        assert_eq!(socket.recv_json().await["type"], "error");
        assert_eq!(close_code(socket.recv().await), 1008);
        socket.task.await.unwrap();
        assert_eq!(gateway.connection_count(), 0);
    }

    #[tokio::test]
    async fn replaced_socket_is_closed() {
        let (gateway, sessions) = setup();
        let alice = user(&sessions, 1).await;
        let mut first = open(&gateway, alice.clone());
        first.recv_json().await;
        let mut second = open(&gateway, alice);
        second.recv_json().await;

        assert_eq!(close_code(first.recv().await), 1008);
        first.task.await.unwrap();
        assert_eq!(gateway.connection_count(), 1);

        gateway.notify(1, &TransactionEvent::Error("e".into()));
        assert_eq!(second.recv_json().await["error"], "e");
    }

    #[tokio::test]
    async fn client_hangup_deregisters() {
        let (gateway, sessions) = setup();
        let mut socket = open(&gateway, user(&sessions, 1).await);
        socket.recv_json().await;

        drop(socket.to_server);
        socket.task.await.unwrap();
        assert_eq!(gateway.connection_count(), 0);
    }
}
