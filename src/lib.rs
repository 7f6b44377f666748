//! Rust library for controlling Biamp Tesira DSPs through their attribute interface
//!
//! This library mirrors the control surface of a Tesira device as a tree of
//! strongly-typed nodes. It supports:
//!
//! - AEC input, level, standard mixer and VoIP blocks
//! - Get/set/increment/decrement/toggle of block attributes
//! - Subscriptions with deduplicated per-property change notifications
//! - Correlation of asynchronous replies and feedback to the right node
//! - Device-reported channel and line counts driving the child graph
//! - A diagnostic console command surface
//!
//! The text codec and socket transport are external: they hand parsed
//! [`Response`]s in and take encoded command lines out.
//!
//! # Quick Start
//!
//! ```no_run
//! use biamp_tesira::{
//!     AttributeInterfaceTree, BlockKind, ChannelType, CommandSender, Connection, Interface,
//!     TransportEvent,
//! };
//! use futures_util::{sink, stream};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sender, outbound) = CommandSender::channel();
//!     let tree = Arc::new(AttributeInterfaceTree::new("dsp-1", sender));
//!     tree.add_block(BlockKind::AecInput, "AEC1")?;
//!
//!     // Plug in the real codec here
//!     let wire = sink::drain::<String>();
//!     let events = stream::iter(vec![TransportEvent::Connected]);
//!     let mut connection = Connection::spawn(
//!         tree.clone(),
//!         outbound,
//!         wire,
//!         events,
//!         Duration::from_secs(10),
//!     );
//!
//!     // Watch every property change on the device
//!     let mut changes = tree.subscribe_changes();
//!
//!     if let Interface::AecInputChannel(channel) =
//!         tree.get_interface("AEC1", ChannelType::Input, &[3])?
//!     {
//!         channel.gain().observe(|db| println!("Gain is now {} dB", db));
//!         channel.set_gain(-12.0)?;
//!     }
//!
//!     while let Ok(change) = changes.recv().await {
//!         println!("{}.{} = {:?}", change.instance_tag, change.property, change.value);
//!         break;
//!     }
//!
//!     connection.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Value**: typed response values and enum token tables
//! - **Protocol**: command encoding and inbound responses
//! - **Router**: request/subscription correlation per device
//! - **Node**: shared get/subscribe/dispose behavior and typed properties
//! - **Blocks**: concrete block, channel, line and call appearance types
//! - **Tree**: per-device root, interface resolution and ready gating
//! - **Connection**: async bridge to an external transport

mod blocks;
mod children;
mod config;
mod connection;
mod console;
mod device;
mod error;
mod node;
mod property;
mod protocol;
mod router;
mod subscription;
mod tree;
mod types;
mod value;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Public exports
pub use blocks::aec::{AecInputBlock, AecInputChannel};
pub use blocks::level::{LevelBlock, LevelChannel};
pub use blocks::mixer::{Crosspoint, MixerBlock, MixerInput, MixerOutput};
pub use blocks::voip::{CallAppearance, VoipBlock, VoipLine};
pub use children::ChildCollection;
pub use config::{BlockConfig, DeviceConfig};
pub use connection::{CommandSender, Connection, TransportEvent};
pub use console::ConsoleCommand;
pub use device::DeviceLink;
pub use error::{Result, TesiraError};
pub use node::{AttributeNode, Lifecycle};
pub use property::{Observer, Property};
pub use protocol::{Command, CommandKind, Response};
pub use router::{DispatchOutcome, Owner, ResponseCallback, ResponseRouter, RouteKey};
pub use subscription::{ChangeReceiver, PropertyChange};
pub use tree::{AttributeInterfaceTree, Block, Interface};
pub use types::{
    BlockKind, CallState, ChannelType, IndexPath, NodeId, CALL_APPEARANCES_PER_LINE,
    CALL_STATE_TOKENS,
};
pub use value::{ControlValue, TokenTable};

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
