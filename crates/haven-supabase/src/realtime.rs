// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime channels over the Supabase Phoenix websocket.
//!
//! Each channel owns its own socket and a background task that keeps the
//! socket alive with heartbeats, forwards matching inserts, and passes on
//! refreshed access tokens. Closing a channel sends `phx_leave`, closes the
//! socket, and joins the task.

use std::time::Duration;

use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use haven_core::HavenError;
use haven_core::types::{ChannelHandle, ChannelId, ChannelSpec, InsertEvent};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{self, Frame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for the socket handshake and the join reply.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `close` waits for a channel task to say goodbye.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ref of the join message; every later message counts up from here.
const JOIN_REF: &str = "1";

struct OpenChannel {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Opens and closes realtime channels for one project.
pub struct RealtimeClient {
    socket_url: Url,
    heartbeat: Duration,
    buffer: usize,
    channels: DashMap<ChannelId, OpenChannel>,
    access_token: watch::Sender<Option<String>>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("heartbeat", &self.heartbeat)
            .field("buffer", &self.buffer)
            .field("open_channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

/// Websocket URL for a project URL: `http(s)` becomes `ws(s)` and the
/// realtime path, anon key, and protocol version are appended.
pub fn socket_url(base: &Url, anon_key: &str) -> Result<Url, HavenError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(HavenError::Config(format!(
                "unsupported backend url scheme `{other}`"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| HavenError::Config(format!("cannot derive websocket url from `{base}`")))?;
    url.path_segments_mut()
        .map_err(|()| HavenError::Config(format!("backend url `{base}` cannot carry a path")))?
        .pop_if_empty()
        .extend(["realtime", "v1", "websocket"]);
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", protocol::PROTOCOL_VSN);
    Ok(url)
}

impl RealtimeClient {
    /// Creates a client that connects to `socket_url`.
    ///
    /// # Arguments
    /// * `heartbeat` - Interval between Phoenix heartbeats
    /// * `buffer` - Capacity of each channel's event queue
    pub fn new(socket_url: Url, heartbeat: Duration, buffer: usize) -> Self {
        Self {
            socket_url,
            heartbeat,
            buffer: buffer.max(1),
            channels: DashMap::new(),
            access_token: watch::Sender::new(None),
        }
    }

    /// Number of channels whose task is still running.
    pub fn open_channels(&self) -> usize {
        self.prune_finished();
        self.channels.len()
    }

    /// Sends `token` to every open channel, and to channels opened later
    /// without one of their own.
    pub fn set_access_token(&self, token: &str) {
        let changed = self.access_token.send_if_modified(|current| {
            if current.as_deref() == Some(token) {
                return false;
            }
            *current = Some(token.to_string());
            true
        });
        if changed {
            debug!(channels = self.channels.len(), "realtime access token updated");
        }
    }

    /// Drops channels whose task ended on its own (server close, socket error,
    /// or receiver gone).
    fn prune_finished(&self) {
        self.channels.retain(|id, channel| {
            let running = !channel.task.is_finished();
            if !running {
                debug!(channel = %id, "pruning ended realtime channel");
            }
            running
        });
    }

    /// Connects, joins the channel, and starts forwarding matching inserts.
    pub async fn open(
        &self,
        spec: ChannelSpec,
        access_token: Option<&str>,
    ) -> Result<ChannelHandle, HavenError> {
        let (socket, _response) = tokio::time::timeout(JOIN_TIMEOUT, connect_async(self.socket_url.as_str()))
            .await
            .map_err(|_| HavenError::Timeout {
                duration: JOIN_TIMEOUT,
            })?
            .map_err(|e| HavenError::Realtime {
                message: format!("websocket connect failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let (mut write, mut read) = socket.split();

        let mut token_updates = self.access_token.subscribe();
        let fallback = token_updates.borrow_and_update().clone();
        let join = Frame::join(&spec, JOIN_REF, access_token.or(fallback.as_deref()));
        send_frame(&mut write, &join).await?;
        tokio::time::timeout(JOIN_TIMEOUT, await_join_reply(&mut read))
            .await
            .map_err(|_| HavenError::Timeout {
                duration: JOIN_TIMEOUT,
            })??;

        let id = ChannelId(format!("{}-{}", spec.name, uuid::Uuid::new_v4()));
        let (tx, rx) = mpsc::channel(self.buffer);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_channel(ChannelTask {
            id: id.clone(),
            topic: join.topic,
            spec,
            heartbeat: self.heartbeat,
            write,
            read,
            events: tx,
            token_updates,
            cancel: cancel.clone(),
        }));
        self.prune_finished();
        self.channels.insert(id.clone(), OpenChannel { cancel, task });

        info!(channel = %id, "realtime channel joined");
        Ok(ChannelHandle { id, events: rx })
    }

    /// Leaves and closes a channel. Unknown ids are ignored.
    pub async fn close(&self, id: &ChannelId) {
        let Some((_, channel)) = self.channels.remove(id) else {
            debug!(channel = %id, "close of unknown channel ignored");
            return;
        };
        channel.cancel.cancel();
        let abort = channel.task.abort_handle();
        match tokio::time::timeout(CLOSE_TIMEOUT, channel.task).await {
            Ok(Ok(())) => debug!(channel = %id, "realtime channel closed"),
            Ok(Err(e)) => warn!(channel = %id, error = %e, "realtime channel task failed"),
            Err(_) => {
                warn!(channel = %id, "realtime channel did not close in time, aborting");
                abort.abort();
            }
        }
    }

    /// Closes every open channel.
    pub async fn close_all(&self) {
        let ids: Vec<ChannelId> = self.channels.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.close(&id).await;
        }
    }
}

async fn send_frame(
    write: &mut SplitSink<Socket, Message>,
    frame: &Frame,
) -> Result<(), HavenError> {
    let text = frame.encode()?;
    write
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| HavenError::Realtime {
            message: format!("websocket send failed: {e}"),
            source: Some(Box::new(e)),
        })
}

async fn await_join_reply(read: &mut SplitStream<Socket>) -> Result<(), HavenError> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame = Frame::parse(&text)?;
                if !frame.is_reply_to(JOIN_REF) {
                    continue;
                }
                return match frame.reply_status() {
                    Some("ok") => Ok(()),
                    _ => Err(HavenError::realtime(format!(
                        "channel join rejected: {}",
                        frame.reply_reason()
                    ))),
                };
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(HavenError::realtime("socket closed before join reply"));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(HavenError::Realtime {
                    message: format!("websocket read failed: {e}"),
                    source: Some(Box::new(e)),
                });
            }
        }
    }
}

struct ChannelTask {
    id: ChannelId,
    topic: String,
    spec: ChannelSpec,
    heartbeat: Duration,
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
    events: mpsc::Sender<InsertEvent>,
    token_updates: watch::Receiver<Option<String>>,
    cancel: CancellationToken,
}

async fn run_channel(mut task: ChannelTask) {
    let start = tokio::time::Instant::now() + task.heartbeat;
    let mut heartbeat = tokio::time::interval_at(start, task.heartbeat);
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = task.cancel.cancelled() => {
                let leave = Frame::leave(&task.topic, &next_ref.to_string(), JOIN_REF);
                if let Err(e) = send_frame(&mut task.write, &leave).await {
                    debug!(channel = %task.id, error = %e, "phx_leave not delivered");
                }
                let _ = task.write.close().await;
                break;
            }
            updated = task.token_updates.changed() => {
                if updated.is_err() {
                    debug!(channel = %task.id, "realtime client dropped, closing channel");
                    let _ = task.write.close().await;
                    break;
                }
                let token = task.token_updates.borrow_and_update().clone();
                let Some(token) = token else {
                    continue;
                };
                let frame = Frame::access_token(&task.topic, &next_ref.to_string(), JOIN_REF, &token);
                next_ref += 1;
                if let Err(e) = send_frame(&mut task.write, &frame).await {
                    warn!(channel = %task.id, error = %e, "access token not delivered, dropping channel");
                    break;
                }
                debug!(channel = %task.id, "access token pushed");
            }
            _ = heartbeat.tick() => {
                let frame = Frame::heartbeat(&next_ref.to_string());
                next_ref += 1;
                if let Err(e) = send_frame(&mut task.write, &frame).await {
                    warn!(channel = %task.id, error = %e, "heartbeat failed, dropping channel");
                    break;
                }
            }
            incoming = task.read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let frame = match Frame::parse(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!(channel = %task.id, error = %e, "skipping frame");
                            continue;
                        }
                    };
                    let Some(event) = frame.insert_event() else {
                        continue;
                    };
                    if !task.spec.accepts(&event.table, &event.record) {
                        debug!(channel = %task.id, table = %event.table, "insert outside channel filters");
                        continue;
                    }
                    if task.events.send(event).await.is_err() {
                        debug!(channel = %task.id, "event receiver dropped");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!(channel = %task.id, "realtime socket closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(channel = %task.id, error = %e, "realtime socket failed");
                    break;
                }
            }
        }
    }
}
