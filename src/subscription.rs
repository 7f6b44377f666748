use crate::error::{Result, TesiraError};
use crate::types::{IndexPath, NodeId};
use crate::value::ControlValue;
use tokio::sync::broadcast;

/// A deduplicated property change on some node
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub node: NodeId,
    pub instance_tag: String,
    pub index_path: IndexPath,
    pub property: &'static str,
    /// Raw device value that produced the change
    pub value: ControlValue,
}

/// Receiver for property changes across a whole device
pub struct ChangeReceiver {
    rx: broadcast::Receiver<PropertyChange>,
}

impl ChangeReceiver {
    /// Create a new change receiver
    pub(crate) fn new(rx: broadcast::Receiver<PropertyChange>) -> Self {
        Self { rx }
    }

    /// Receive the next change
    ///
    /// Fails with `ConnectionClosed` once the device tree has been dropped.
    pub async fn recv(&mut self) -> Result<PropertyChange> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => TesiraError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => {
                TesiraError::ChannelError(format!("Lagged by {} changes", n))
            }
        })
    }

    /// Try to receive a change without blocking
    ///
    /// Returns `None` if no change is queued.
    pub fn try_recv(&mut self) -> Result<Option<PropertyChange>> {
        match self.rx.try_recv() {
            Ok(change) => Ok(Some(change)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(TesiraError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(TesiraError::ChannelError(format!("Lagged by {} changes", n)))
            }
        }
    }
}
