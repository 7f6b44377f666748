use crate::blocks::aec::{AecInputBlock, AecInputChannel};
use crate::blocks::level::{LevelBlock, LevelChannel};
use crate::blocks::mixer::{Crosspoint, MixerBlock, MixerInput, MixerOutput};
use crate::blocks::voip::{CallAppearance, VoipBlock, VoipLine};
use crate::config::{DeviceConfig, DEFAULT_CHANGE_BUFFER};
use crate::connection::CommandSender;
use crate::device::DeviceLink;
use crate::error::{Result, TesiraError};
use crate::lock;
use crate::node::{AttributeNode, Lifecycle};
use crate::protocol::Response;
use crate::router::{DispatchOutcome, ResponseRouter};
use crate::subscription::ChangeReceiver;
use crate::types::{BlockKind, ChannelType, IndexPath};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// A configured top-level block
#[derive(Clone)]
pub enum Block {
    AecInput(Arc<AecInputBlock>),
    Level(Arc<LevelBlock>),
    Mixer(Arc<MixerBlock>),
    Voip(Arc<VoipBlock>),
}

impl Block {
    fn create(link: Arc<DeviceLink>, kind: BlockKind, instance_tag: &str) -> Self {
        match kind {
            BlockKind::AecInput => Block::AecInput(AecInputBlock::new(link, instance_tag)),
            BlockKind::Level => Block::Level(LevelBlock::new(link, instance_tag)),
            BlockKind::Mixer => Block::Mixer(MixerBlock::new(link, instance_tag)),
            BlockKind::Voip => Block::Voip(VoipBlock::new(link, instance_tag)),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Block::AecInput(_) => BlockKind::AecInput,
            Block::Level(_) => BlockKind::Level,
            Block::Mixer(_) => BlockKind::Mixer,
            Block::Voip(_) => BlockKind::Voip,
        }
    }

    pub fn node(&self) -> &AttributeNode {
        match self {
            Block::AecInput(block) => block.node(),
            Block::Level(block) => block.node(),
            Block::Mixer(block) => block.node(),
            Block::Voip(block) => block.node(),
        }
    }

    pub fn instance_tag(&self) -> &str {
        self.node().instance_tag()
    }

    fn lifecycle(&self) -> &dyn Lifecycle {
        match self {
            Block::AecInput(block) => &**block,
            Block::Level(block) => &**block,
            Block::Mixer(block) => &**block,
            Block::Voip(block) => &**block,
        }
    }
}

/// A node resolved through [`AttributeInterfaceTree::get_interface`]
#[derive(Clone)]
pub enum Interface {
    Block(Block),
    AecInputChannel(Arc<AecInputChannel>),
    LevelChannel(Arc<LevelChannel>),
    MixerInput(Arc<MixerInput>),
    MixerOutput(Arc<MixerOutput>),
    Crosspoint(Arc<Crosspoint>),
    VoipLine(Arc<VoipLine>),
    CallAppearance(Arc<CallAppearance>),
}

impl Interface {
    pub fn node(&self) -> &AttributeNode {
        match self {
            Interface::Block(block) => block.node(),
            Interface::AecInputChannel(channel) => channel.node(),
            Interface::LevelChannel(channel) => channel.node(),
            Interface::MixerInput(channel) => channel.node(),
            Interface::MixerOutput(channel) => channel.node(),
            Interface::Crosspoint(crosspoint) => crosspoint.node(),
            Interface::VoipLine(line) => line.node(),
            Interface::CallAppearance(appearance) => appearance.node(),
        }
    }

    /// Short human-readable name of the interface type
    pub fn type_name(&self) -> &'static str {
        match self {
            Interface::Block(Block::AecInput(_)) => "AEC input block",
            Interface::Block(Block::Level(_)) => "level block",
            Interface::Block(Block::Mixer(_)) => "mixer block",
            Interface::Block(Block::Voip(_)) => "VoIP block",
            Interface::AecInputChannel(_) => "AEC input channel",
            Interface::LevelChannel(_) => "level channel",
            Interface::MixerInput(_) => "mixer input",
            Interface::MixerOutput(_) => "mixer output",
            Interface::Crosspoint(_) => "crosspoint",
            Interface::VoipLine(_) => "VoIP line",
            Interface::CallAppearance(_) => "call appearance",
        }
    }
}

/// Per-device root of the attribute interface graph
///
/// Owns the configured blocks and the device's response router, and gates all
/// outgoing traffic until the transport reports the device ready.
///
/// # Example
///
/// ```no_run
/// use biamp_tesira::{AttributeInterfaceTree, BlockKind, ChannelType, CommandSender, Interface};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (sender, _outbound) = CommandSender::channel();
/// let tree = AttributeInterfaceTree::new("dsp-1", sender);
/// tree.add_block(BlockKind::AecInput, "AEC1")?;
///
/// tree.on_device_connected();
/// if let Interface::AecInputChannel(channel) =
///     tree.get_interface("AEC1", ChannelType::Input, &[3])?
/// {
///     channel.set_gain(12.0)?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct AttributeInterfaceTree {
    link: Arc<DeviceLink>,
    blocks: Mutex<BTreeMap<String, Block>>,
}

impl AttributeInterfaceTree {
    pub fn new(device_key: impl Into<String>, sender: CommandSender) -> Self {
        Self::with_change_buffer(device_key, sender, DEFAULT_CHANGE_BUFFER)
    }

    pub fn with_change_buffer(
        device_key: impl Into<String>,
        sender: CommandSender,
        change_buffer: usize,
    ) -> Self {
        Self {
            link: DeviceLink::new(device_key, sender, change_buffer),
            blocks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Build a tree with every block the configuration declares
    pub fn from_config(config: &DeviceConfig, sender: CommandSender) -> Result<Self> {
        config.validate()?;
        let tree = Self::with_change_buffer(config.key.clone(), sender, config.change_buffer);
        for block in &config.blocks {
            tree.add_block(block.kind, &block.instance_tag)?;
        }
        Ok(tree)
    }

    pub fn device_key(&self) -> &str {
        self.link.key()
    }

    pub fn router(&self) -> &ResponseRouter {
        self.link.router()
    }

    pub fn is_ready(&self) -> bool {
        self.link.is_ready()
    }

    /// Add a top-level block. It initializes immediately if the device is ready.
    pub fn add_block(&self, kind: BlockKind, instance_tag: &str) -> Result<Block> {
        if instance_tag.trim().is_empty() {
            return Err(TesiraError::InvalidConfig("Empty instance tag".to_string()));
        }

        let block = {
            let mut blocks = lock(&self.blocks);
            if blocks.contains_key(instance_tag) {
                return Err(TesiraError::InvalidConfig(format!(
                    "Duplicate instance tag '{}'",
                    instance_tag
                )));
            }
            let block = Block::create(self.link.clone(), kind, instance_tag);
            blocks.insert(instance_tag.to_string(), block.clone());
            block
        };

        tracing::debug!("Added {:?} block {}", kind, instance_tag);
        block.lifecycle().initialize();
        Ok(block)
    }

    pub fn block(&self, instance_tag: &str) -> Option<Block> {
        lock(&self.blocks).get(instance_tag).cloned()
    }

    /// All blocks ordered by instance tag
    pub fn blocks(&self) -> Vec<Block> {
        lock(&self.blocks).values().cloned().collect()
    }

    /// Dispose a block and remove it from the tree
    pub fn remove_block(&self, instance_tag: &str) -> Option<Block> {
        let block = self.block(instance_tag)?;
        block.lifecycle().dispose();
        lock(&self.blocks).remove(instance_tag)
    }

    /// Resolve a node by block, channel axis and index path
    ///
    /// Intermediate children are created on demand. Fails with
    /// `InvalidIndexPath` if the path does not fit the channel type or the
    /// block has no such axis.
    pub fn get_interface(
        &self,
        instance_tag: &str,
        channel_type: ChannelType,
        path: &[u32],
    ) -> Result<Interface> {
        let invalid = || TesiraError::InvalidIndexPath {
            channel_type,
            path: IndexPath::from(path),
        };

        if path.len() != channel_type.arity() || path.contains(&0) {
            return Err(invalid());
        }
        let block = self
            .block(instance_tag)
            .ok_or_else(|| TesiraError::UnknownBlock(instance_tag.to_string()))?;

        let interface = match (&block, channel_type, path) {
            (_, ChannelType::None, []) => Interface::Block(block.clone()),
            (Block::AecInput(aec), ChannelType::Input, &[channel]) => {
                Interface::AecInputChannel(aec.channel(channel)?)
            }
            (Block::Level(level), ChannelType::Input, &[channel]) => {
                Interface::LevelChannel(level.channel(channel)?)
            }
            (Block::Mixer(mixer), ChannelType::Input, &[input]) => {
                Interface::MixerInput(mixer.input(input)?)
            }
            (Block::Mixer(mixer), ChannelType::Output, &[output]) => {
                Interface::MixerOutput(mixer.output(output)?)
            }
            (Block::Mixer(mixer), ChannelType::Crosspoint, &[input, output]) => {
                Interface::Crosspoint(mixer.crosspoint(input, output)?)
            }
            (Block::Voip(voip), ChannelType::Line, &[line]) => {
                Interface::VoipLine(voip.line(line)?)
            }
            (Block::Voip(voip), ChannelType::CallAppearance, &[line, appearance]) => {
                Interface::CallAppearance(voip.call_appearance(line, appearance)?)
            }
            _ => return Err(invalid()),
        };
        Ok(interface)
    }

    /// Mark the device ready and run the get/subscribe sequence on every node
    ///
    /// A repeated ready signal means the transport reconnected without
    /// reporting the drop, so device-side subscriptions are gone and every
    /// node starts over.
    pub fn on_device_connected(&self) {
        if self.link.is_ready() {
            tracing::info!("{} ready again, reissuing subscriptions", self.device_key());
            self.link.router().clear();
            for block in self.blocks() {
                block.lifecycle().suspend();
            }
        }
        self.link.set_ready(true);
        for block in self.blocks() {
            block.lifecycle().initialize();
        }
    }

    /// Forget every device-side registration after the link dropped
    ///
    /// Nothing is sent; subscriptions are reissued by the next
    /// [`on_device_connected`](Self::on_device_connected).
    pub fn on_device_disconnected(&self) {
        self.link.set_ready(false);
        self.link.router().clear();
        for block in self.blocks() {
            block.lifecycle().suspend();
        }
    }

    /// Route a parsed response to the node that asked for it
    pub fn dispatch(&self, response: &Response) -> DispatchOutcome {
        self.link.router().dispatch(response)
    }

    /// Receive every deduplicated property change on this device
    pub fn subscribe_changes(&self) -> ChangeReceiver {
        self.link.subscribe_changes()
    }

    /// Dispose every block, unsubscribing everything device-side
    pub fn dispose(&self) {
        let blocks = std::mem::take(&mut *lock(&self.blocks));
        for block in blocks.values() {
            block.lifecycle().dispose();
        }
    }
}
