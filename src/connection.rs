use crate::error::{Result, TesiraError};
use crate::protocol::{Command, Response};
use crate::tree::AttributeInterfaceTree;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Non-blocking handle onto the outbound command queue
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandSender {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Create a sender together with the receiving end the transport drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue a command line. Never waits for a response.
    pub fn send(&self, command: &Command) -> Result<()> {
        let line = command.encode();
        tracing::debug!("Sending: {}", line);
        self.tx.send(line).map_err(|_| TesiraError::ConnectionClosed)
    }
}

/// Events produced by the codec/transport layer
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The device is ready to accept commands
    Connected,
    /// A parsed response or feedback message
    Response(Response),
    /// The link dropped; subscriptions are gone device-side
    Disconnected,
}

/// Background tasks bridging a device tree to a transport
///
/// The writer forwards queued command lines into the transport sink. The
/// reader feeds transport events into the tree and periodically drops
/// requests that were never answered.
pub struct Connection {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Spawn the reader and writer tasks on the current tokio runtime
    pub fn spawn<S, W>(
        tree: Arc<AttributeInterfaceTree>,
        mut outbound: mpsc::UnboundedReceiver<String>,
        mut sink: W,
        mut events: S,
        request_timeout: Duration,
    ) -> Self
    where
        S: Stream<Item = TransportEvent> + Send + Unpin + 'static,
        W: Sink<String> + Send + Unpin + 'static,
        W::Error: fmt::Display,
    {
        let writer = tokio::spawn(async move {
            while let Some(line) = outbound.recv().await {
                if let Err(e) = sink.send(line).await {
                    tracing::error!("Failed to send command: {}", e);
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            let mut prune = tokio::time::interval(request_timeout);
            prune.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(TransportEvent::Connected) => {
                            tracing::info!("Device {} ready", tree.device_key());
                            tree.on_device_connected();
                        }
                        Some(TransportEvent::Response(response)) => {
                            tree.dispatch(&response);
                        }
                        Some(TransportEvent::Disconnected) => {
                            tracing::info!("Device {} disconnected", tree.device_key());
                            tree.on_device_disconnected();
                        }
                        None => {
                            tracing::info!("Transport for {} closed", tree.device_key());
                            tree.on_device_disconnected();
                            break;
                        }
                    },
                    _ = prune.tick() => {
                        tree.router().prune_expired(request_timeout);
                    }
                }
            }
        });

        Self { reader, writer }
    }

    /// Wait until the transport's event stream ends
    pub async fn closed(&mut self) {
        if let Err(e) = (&mut self.reader).await {
            tracing::error!("Reader task failed: {}", e);
        }
    }

    /// Stop both tasks immediately
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouteKey;
    use crate::types::{BlockKind, IndexPath};
    use futures_util::{sink, stream};
    use tokio::time::timeout;

    async fn next_line(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for a command")
            .expect("writer closed")
    }

    #[tokio::test]
    async fn bridges_events_and_commands() {
        let (sender, outbound) = CommandSender::channel();
        let tree = Arc::new(AttributeInterfaceTree::new("dsp", sender));
        let block = tree.add_block(BlockKind::AecInput, "AEC1").unwrap();

        let (wire_tx, mut wire_rx) = mpsc::unbounded_channel::<String>();
        let wire = Box::pin(sink::unfold(wire_tx, |tx, line: String| async move {
            tx.send(line).map_err(|_| TesiraError::ConnectionClosed)?;
            Ok::<_, TesiraError>(tx)
        }));

        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let events = Box::pin(stream::unfold(event_rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        }));

        let mut connection =
            Connection::spawn(tree.clone(), outbound, wire, events, Duration::from_secs(10));

        event_tx.send(TransportEvent::Connected).unwrap();
        assert_eq!(next_line(&mut wire_rx).await, "AEC1 get numChannels");

        let key = RouteKey::new("AEC1", "numChannels", IndexPath::root());
        event_tx
            .send(TransportEvent::Response(Response::reply(&key, 1_i64)))
            .unwrap();
        assert_eq!(next_line(&mut wire_rx).await, "AEC1 get gain 1");
        assert_eq!(next_line(&mut wire_rx).await, "AEC1 subscribe gain 1");

        drop(event_tx);
        connection.closed().await;
        assert!(!tree.is_ready());
        assert!(!block.node().is_initialized());
    }
}
