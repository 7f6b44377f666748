use crate::blocks::decode_count;
use crate::children::ChildCollection;
use crate::device::DeviceLink;
use crate::error::Result;
use crate::node::{AttributeNode, Lifecycle};
use crate::property::Property;
use crate::protocol::CommandKind;
use crate::types::IndexPath;
use crate::value::ControlValue;
use std::sync::{Arc, Weak};

const NUM_CHANNELS: &str = "numChannels";
const GAIN: &str = "gain";
const MUTE: &str = "mute";
const PHANTOM_POWER: &str = "phantomPower";

/// AEC input block
///
/// The device reports how many channels the block has; channels are created
/// as the count grows and are never removed while the block lives.
pub struct AecInputBlock {
    node: AttributeNode,
    channel_count: Arc<Property<u32>>,
    channels: ChildCollection<AecInputChannel>,
}

impl AecInputBlock {
    pub(crate) fn new(link: Arc<DeviceLink>, instance_tag: &str) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let node = AttributeNode::new(link, instance_tag, IndexPath::root());
            let channel_count = Arc::new(Property::new(NUM_CHANNELS));
            node.bind(NUM_CHANNELS, false, &channel_count, decode_count);

            let this = this.clone();
            channel_count.observe(move |count: &u32| {
                if let Some(block) = this.upgrade() {
                    block.channels_reported(*count);
                }
            });

            Self {
                node,
                channel_count,
                channels: ChildCollection::new(),
            }
        })
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    pub fn channel_count(&self) -> &Property<u32> {
        &self.channel_count
    }

    /// Channel `index`, created on first access
    pub fn channel(&self, index: u32) -> Result<Arc<AecInputChannel>> {
        self.channels
            .get_or_create(index, |index| self.create_channel(index))
    }

    pub fn channels(&self) -> Vec<Arc<AecInputChannel>> {
        self.channels.all_ordered()
    }

    fn create_channel(&self, index: u32) -> Arc<AecInputChannel> {
        Arc::new(AecInputChannel::new(
            self.node.link().clone(),
            self.node.instance_tag(),
            index,
        ))
    }

    fn channels_reported(&self, count: u32) {
        tracing::debug!("{} reports {} channel(s)", self.node.instance_tag(), count);
        self.channels.grow_to(count, |index| self.create_channel(index));
    }
}

impl Lifecycle for AecInputBlock {
    fn initialize(&self) {
        self.node.initialize();
        self.channels.initialize_all();
    }

    fn suspend(&self) {
        self.node.suspend();
        self.channels.suspend_all();
    }

    fn dispose(&self) {
        self.channels.dispose_all();
        self.node.dispose();
    }
}

/// One input channel of an AEC block
pub struct AecInputChannel {
    node: AttributeNode,
    gain: Arc<Property<f64>>,
    mute: Arc<Property<bool>>,
    phantom_power: Arc<Property<bool>>,
}

impl AecInputChannel {
    fn new(link: Arc<DeviceLink>, instance_tag: &str, index: u32) -> Self {
        let node = AttributeNode::new(link, instance_tag, IndexPath::from([index]));
        let gain = Arc::new(Property::new(GAIN));
        let mute = Arc::new(Property::new(MUTE));
        let phantom_power = Arc::new(Property::new(PHANTOM_POWER));
        node.bind(GAIN, true, &gain, ControlValue::as_float);
        node.bind(MUTE, true, &mute, ControlValue::as_bool);
        node.bind(PHANTOM_POWER, false, &phantom_power, ControlValue::as_bool);

        Self {
            node,
            gain,
            mute,
            phantom_power,
        }
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    /// Input gain in dB
    pub fn gain(&self) -> &Property<f64> {
        &self.gain
    }

    pub fn mute(&self) -> &Property<bool> {
        &self.mute
    }

    pub fn phantom_power(&self) -> &Property<bool> {
        &self.phantom_power
    }

    pub fn set_gain(&self, db: f64) -> Result<()> {
        self.node.send(CommandKind::Set, GAIN, Some(db.into()))
    }

    pub fn increment_gain(&self, step_db: f64) -> Result<()> {
        self.node.send(CommandKind::Increment, GAIN, Some(step_db.into()))
    }

    pub fn decrement_gain(&self, step_db: f64) -> Result<()> {
        self.node.send(CommandKind::Decrement, GAIN, Some(step_db.into()))
    }

    pub fn set_mute(&self, mute: bool) -> Result<()> {
        self.node.send(CommandKind::Set, MUTE, Some(mute.into()))
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.node.send(CommandKind::Toggle, MUTE, None)
    }

    pub fn set_phantom_power(&self, enabled: bool) -> Result<()> {
        self.node
            .send(CommandKind::Set, PHANTOM_POWER, Some(enabled.into()))
    }
}

impl Lifecycle for AecInputChannel {
    fn initialize(&self) {
        self.node.initialize();
    }

    fn suspend(&self) {
        self.node.suspend();
    }

    fn dispose(&self) {
        self.node.dispose();
    }
}
