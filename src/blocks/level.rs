use crate::blocks::{decode_count, decode_string};
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
const LEVEL: &str = "level";
const MUTE: &str = "mute";
const MIN_LEVEL: &str = "minLevel";
const MAX_LEVEL: &str = "maxLevel";
const LABEL: &str = "label";

/// Level control block
pub struct LevelBlock {
    node: AttributeNode,
    channel_count: Arc<Property<u32>>,
    channels: ChildCollection<LevelChannel>,
}

impl LevelBlock {
    pub(crate) fn new(link: Arc<DeviceLink>, instance_tag: &str) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let node = AttributeNode::new(link, instance_tag, IndexPath::root());
            let channel_count = Arc::new(Property::new(NUM_CHANNELS));
            node.bind(NUM_CHANNELS, false, &channel_count, decode_count);

            let this = this.clone();
            channel_count.observe(move |count: &u32| {
                if let Some(block) = this.upgrade() {
                    block
                        .channels
                        .grow_to(*count, |index| block.create_channel(index));
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

    pub fn channel(&self, index: u32) -> Result<Arc<LevelChannel>> {
        self.channels
            .get_or_create(index, |index| self.create_channel(index))
    }

    pub fn channels(&self) -> Vec<Arc<LevelChannel>> {
        self.channels.all_ordered()
    }

    fn create_channel(&self, index: u32) -> Arc<LevelChannel> {
        Arc::new(LevelChannel::new(
            self.node.link().clone(),
            self.node.instance_tag(),
            index,
        ))
    }
}

impl Lifecycle for LevelBlock {
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

/// One channel of a level block
pub struct LevelChannel {
    node: AttributeNode,
    level: Arc<Property<f64>>,
    mute: Arc<Property<bool>>,
    min_level: Arc<Property<f64>>,
    max_level: Arc<Property<f64>>,
    label: Arc<Property<String>>,
}

impl LevelChannel {
    fn new(link: Arc<DeviceLink>, instance_tag: &str, index: u32) -> Self {
        let node = AttributeNode::new(link, instance_tag, IndexPath::from([index]));
        let level = Arc::new(Property::new(LEVEL));
        let mute = Arc::new(Property::new(MUTE));
        let min_level = Arc::new(Property::new(MIN_LEVEL));
        let max_level = Arc::new(Property::new(MAX_LEVEL));
        let label = Arc::new(Property::new(LABEL));
        node.bind(LEVEL, true, &level, ControlValue::as_float);
        node.bind(MUTE, true, &mute, ControlValue::as_bool);
        node.bind(MIN_LEVEL, false, &min_level, ControlValue::as_float);
        node.bind(MAX_LEVEL, false, &max_level, ControlValue::as_float);
        node.bind(LABEL, false, &label, decode_string);

        Self {
            node,
            level,
            mute,
            min_level,
            max_level,
            label,
        }
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    /// Level in dB
    pub fn level(&self) -> &Property<f64> {
        &self.level
    }

    pub fn mute(&self) -> &Property<bool> {
        &self.mute
    }

    pub fn min_level(&self) -> &Property<f64> {
        &self.min_level
    }

    pub fn max_level(&self) -> &Property<f64> {
        &self.max_level
    }

    pub fn label(&self) -> &Property<String> {
        &self.label
    }

    pub fn set_level(&self, db: f64) -> Result<()> {
        self.node.send(CommandKind::Set, LEVEL, Some(db.into()))
    }

    pub fn increment_level(&self, step_db: f64) -> Result<()> {
        self.node
            .send(CommandKind::Increment, LEVEL, Some(step_db.into()))
    }

    pub fn decrement_level(&self, step_db: f64) -> Result<()> {
        self.node
            .send(CommandKind::Decrement, LEVEL, Some(step_db.into()))
    }

    pub fn set_mute(&self, mute: bool) -> Result<()> {
        self.node.send(CommandKind::Set, MUTE, Some(mute.into()))
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.node.send(CommandKind::Toggle, MUTE, None)
    }
}

impl Lifecycle for LevelChannel {
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
