//! The proxy bridge: stdio-side framing in, HTTP round trips out.
//!
//! A [`ProxyBridge`] owns everything a relay touches: the [`ReadBuffer`], the
//! [`ProxyClient`] (and with it the session token) and the output stream.
//! Messages are handled strictly one at a time. The next framed message is
//! only dequeued once the reply for the previous one has been written.
//!
//! Two ingress paths share one relay path:
//!
//! - [`ProxyBridge::run`] reads the input stream and relays each framed message;
//!   failures are reported on the event channel and the loop keeps going.
//! - [`ProxyBridge::send_direct`] (or [`BridgeHandle::send`] while `run` owns
//!   the bridge) relays a message that did not come from the input stream and
//!   returns the outcome to the caller.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::error::{BridgeError, Result};
use crate::events::{BridgeEvent, EVENT_CHANNEL_CAPACITY};
use crate::framing::{ReadBuffer, serialize_message};
use crate::message::JsonRpcMessage;
use crate::proxy::ProxyClient;
use crate::state::{RelayState, RelayStateMachine};

const READ_CHUNK_SIZE: usize = 8 * 1024;
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// A direct send queued through a [`BridgeHandle`].
struct DirectSend {
    message: JsonRpcMessage,
    done: oneshot::Sender<Result<()>>,
}

pub struct ProxyBridge<W> {
    client: ProxyClient,
    output: W,
    reader: ReadBuffer,
    events: broadcast::Sender<BridgeEvent>,
    state: RelayStateMachine,
    commands: mpsc::Receiver<DirectSend>,
    command_tx: mpsc::Sender<DirectSend>,
}

impl<W> ProxyBridge<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(config: ProxyConfig, output: W) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        Ok(Self {
            client: ProxyClient::new(config)?,
            output,
            reader: ReadBuffer::new(),
            events,
            state: RelayStateMachine::new(),
            commands,
            command_tx,
        })
    }

    pub fn configure(&mut self, proxy_url: &str, server_key: &str, request_timeout: Duration) {
        self.client.configure(proxy_url, server_key, request_timeout);
    }

    pub fn config(&self) -> &ProxyConfig {
        self.client.config()
    }

    /// Receive every relayed message, failure and the final close.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> RelayState {
        self.state.current()
    }

    pub fn watch_state(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    /// A cloneable sender for direct sends, serviced by [`ProxyBridge::run`].
    ///
    /// Sends queue until the read loop picks them up, which happens between
    /// two relayed messages, never during a round trip.
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            tx: self.command_tx.clone(),
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        self.client.session().get()
    }

    pub fn clear_session(&mut self) {
        self.client.clear_session();
    }

    /// Append raw input bytes to the frame buffer without relaying them.
    pub fn append_input(&mut self, chunk: &[u8]) {
        self.reader.append(chunk);
    }

    /// Relay a framed message. Failures are written back as `-32603` errors
    /// (except for notifications) and published; nothing is returned.
    pub async fn relay_to_stream(&mut self, message: JsonRpcMessage) {
        if let Err(error) = self.relay(&message).await {
            debug!(error = %error, id = ?message.id(), "Relay finished with failure");
        }
    }

    /// Relay a message that did not come from the input stream.
    ///
    /// Returns once the reply or synthesized error is written and flushed.
    /// A failure is still written back and published before it is returned.
    pub async fn send_direct(&mut self, message: JsonRpcMessage) -> Result<()> {
        self.relay(&message).await
    }

    /// Read `input` until EOF, a read error or `shutdown`, relaying each
    /// framed message and servicing queued direct sends. Always ends in
    /// [`ProxyBridge::close`].
    pub async fn run<R>(&mut self, mut input: R, shutdown: CancellationToken) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        info!(proxy_url = %self.client.config().proxy_url, "Bridge read loop started");

        let result = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping read loop");
                    break Ok(());
                }

                Some(command) = self.commands.recv() => {
                    self.execute(command).await;
                }

                read = input.read(&mut chunk) => {
                    match read {
                        Ok(0) => {
                            info!("Input stream closed");
                            break Ok(());
                        }
                        Ok(n) => {
                            self.reader.append(&chunk[..n]);
                            self.drain(&shutdown).await;
                        }
                        Err(e) => {
                            let error = BridgeError::Io(e);
                            warn!(error = %error, "Failed to read input stream");
                            self.publish(BridgeEvent::failed(&error, None));
                            break Err(error);
                        }
                    }
                }
            }
        };

        self.close();
        result
    }

    /// Dequeue and relay every complete buffered message, running queued
    /// direct sends after each one.
    pub async fn drain(&mut self, shutdown: &CancellationToken) {
        while !shutdown.is_cancelled() {
            match self.reader.read_message() {
                Ok(Some(message)) => self.relay_to_stream(message).await,
                Ok(None) => break,
                Err(error) => {
                    warn!(error = %error, "Skipping malformed frame");
                    self.publish(BridgeEvent::failed(&error, None));
                }
            }

            while let Ok(command) = self.commands.try_recv() {
                self.execute(command).await;
            }
        }
    }

    /// Clear the session and the frame buffer, reject queued direct sends and
    /// publish [`BridgeEvent::Closed`]. Later relays fail with `BridgeClosed`.
    pub fn close(&mut self) {
        if !self.state.close() {
            return;
        }
        self.client.clear_session();
        self.reader.clear();

        self.commands.close();
        while let Ok(DirectSend { done, .. }) = self.commands.try_recv() {
            let _ = done.send(Err(BridgeError::BridgeClosed));
        }

        info!("Bridge closed");
        self.publish(BridgeEvent::Closed);
    }

    pub fn into_output(self) -> W {
        self.output
    }

    async fn execute(&mut self, command: DirectSend) {
        let DirectSend { message, done } = command;
        let result = self.send_direct(message).await;
        let _ = done.send(result);
    }

    async fn relay(&mut self, message: &JsonRpcMessage) -> Result<()> {
        self.state
            .begin_forwarding()
            .map_err(|_| BridgeError::BridgeClosed)?;

        debug!(method = ?message.method(), id = ?message.id(), "Relaying message");
        let outcome = self.client.forward(message).await;
        advance(self.state.begin_writing());

        let result = match outcome {
            Ok(reply) => match self.write_messages(&reply.messages).await {
                Ok(()) => {
                    self.publish(BridgeEvent::Relayed(message.clone()));
                    Ok(())
                }
                Err(error) => {
                    warn!(error = %error, "Failed to write reply");
                    self.publish(BridgeEvent::failed(&error, message.id().cloned()));
                    Err(error)
                }
            },
            Err(error) => self.report_failure(message, error).await,
        };

        advance(self.state.finish());
        result
    }

    /// Write the synthesized error for `message` (unless it is a
    /// notification) and publish the failure. A write failure takes
    /// precedence over the remote failure in the returned error.
    async fn report_failure(&mut self, message: &JsonRpcMessage, error: BridgeError) -> Result<()> {
        let id = message.id().cloned();
        warn!(error = %error, id = ?id, method = ?message.method(), "Round trip failed");

        let written = match message.proxy_error(&error) {
            Some(reply) => self.write_messages(std::slice::from_ref(&reply)).await,
            None => Ok(()),
        };
        self.publish(BridgeEvent::failed(&error, id.clone()));

        if let Err(write_error) = written {
            warn!(error = %write_error, "Failed to write synthesized error");
            self.publish(BridgeEvent::failed(&write_error, id));
            return Err(write_error);
        }
        Err(error)
    }

    async fn write_messages(&mut self, messages: &[JsonRpcMessage]) -> Result<()> {
        for message in messages {
            let line = serialize_message(message)?;
            self.output
                .write_all(&line)
                .await
                .map_err(BridgeError::Write)?;
        }
        self.output.flush().await.map_err(BridgeError::Write)
    }

    fn publish(&self, event: BridgeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn advance(transition: std::result::Result<(), &'static str>) {
    if let Err(reason) = transition {
        warn!(reason, "Unexpected relay state transition");
    }
}

/// Queues direct sends to a bridge whose [`ProxyBridge::run`] loop is active.
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    tx: mpsc::Sender<DirectSend>,
}

impl BridgeHandle {
    /// Resolve with the outcome of [`ProxyBridge::send_direct`], or
    /// [`BridgeError::BridgeClosed`] once the bridge has shut down.
    pub async fn send(&self, message: JsonRpcMessage) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(DirectSend { message, done })
            .await
            .map_err(|_| BridgeError::BridgeClosed)?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
