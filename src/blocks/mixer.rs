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

const NUM_INPUTS: &str = "numInputs";
const NUM_OUTPUTS: &str = "numOutputs";
const INPUT_LEVEL: &str = "inputLevel";
const INPUT_MUTE: &str = "inputMute";
const OUTPUT_LEVEL: &str = "outputLevel";
const OUTPUT_MUTE: &str = "outputMute";
const CROSSPOINT_STATE: &str = "crosspointLevelState";
const CROSSPOINT_LEVEL: &str = "crosspointLevel";

/// Standard mixer block
///
/// Inputs and outputs are separate channel axes sharing the same index space.
/// Crosspoints hang off their input channel and are only created on request.
pub struct MixerBlock {
    node: AttributeNode,
    input_count: Arc<Property<u32>>,
    output_count: Arc<Property<u32>>,
    inputs: ChildCollection<MixerInput>,
    outputs: ChildCollection<MixerOutput>,
}

impl MixerBlock {
    pub(crate) fn new(link: Arc<DeviceLink>, instance_tag: &str) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let node = AttributeNode::new(link, instance_tag, IndexPath::root());
            let input_count = Arc::new(Property::new(NUM_INPUTS));
            let output_count = Arc::new(Property::new(NUM_OUTPUTS));
            node.bind(NUM_INPUTS, false, &input_count, decode_count);
            node.bind(NUM_OUTPUTS, false, &output_count, decode_count);

            let inputs_of = this.clone();
            input_count.observe(move |count: &u32| {
                if let Some(mixer) = inputs_of.upgrade() {
                    mixer.inputs.grow_to(*count, |index| mixer.create_input(index));
                }
            });
            let outputs_of = this.clone();
            output_count.observe(move |count: &u32| {
                if let Some(mixer) = outputs_of.upgrade() {
                    mixer
                        .outputs
                        .grow_to(*count, |index| mixer.create_output(index));
                }
            });

            Self {
                node,
                input_count,
                output_count,
                inputs: ChildCollection::new(),
                outputs: ChildCollection::new(),
            }
        })
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    pub fn input_count(&self) -> &Property<u32> {
        &self.input_count
    }

    pub fn output_count(&self) -> &Property<u32> {
        &self.output_count
    }

    pub fn input(&self, index: u32) -> Result<Arc<MixerInput>> {
        self.inputs
            .get_or_create(index, |index| self.create_input(index))
    }

    pub fn output(&self, index: u32) -> Result<Arc<MixerOutput>> {
        self.outputs
            .get_or_create(index, |index| self.create_output(index))
    }

    /// Crosspoint routing `input` to `output`
    pub fn crosspoint(&self, input: u32, output: u32) -> Result<Arc<Crosspoint>> {
        self.input(input)?.crosspoint(output)
    }

    pub fn inputs(&self) -> Vec<Arc<MixerInput>> {
        self.inputs.all_ordered()
    }

    pub fn outputs(&self) -> Vec<Arc<MixerOutput>> {
        self.outputs.all_ordered()
    }

    fn create_input(&self, index: u32) -> Arc<MixerInput> {
        Arc::new(MixerInput::new(
            self.node.link().clone(),
            self.node.instance_tag(),
            index,
        ))
    }

    fn create_output(&self, index: u32) -> Arc<MixerOutput> {
        Arc::new(MixerOutput::new(
            self.node.link().clone(),
            self.node.instance_tag(),
            index,
        ))
    }
}

impl Lifecycle for MixerBlock {
    fn initialize(&self) {
        self.node.initialize();
        self.inputs.initialize_all();
        self.outputs.initialize_all();
    }

    fn suspend(&self) {
        self.node.suspend();
        self.inputs.suspend_all();
        self.outputs.suspend_all();
    }

    fn dispose(&self) {
        self.inputs.dispose_all();
        self.outputs.dispose_all();
        self.node.dispose();
    }
}

/// Mixer input channel, owner of the crosspoints fed by this input
pub struct MixerInput {
    node: AttributeNode,
    level: Arc<Property<f64>>,
    mute: Arc<Property<bool>>,
    crosspoints: ChildCollection<Crosspoint>,
}

impl MixerInput {
    fn new(link: Arc<DeviceLink>, instance_tag: &str, index: u32) -> Self {
        let node = AttributeNode::new(link, instance_tag, IndexPath::from([index]));
        let level = Arc::new(Property::new(INPUT_LEVEL));
        let mute = Arc::new(Property::new(INPUT_MUTE));
        node.bind(INPUT_LEVEL, true, &level, ControlValue::as_float);
        node.bind(INPUT_MUTE, true, &mute, ControlValue::as_bool);

        Self {
            node,
            level,
            mute,
            crosspoints: ChildCollection::new(),
        }
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    pub fn level(&self) -> &Property<f64> {
        &self.level
    }

    pub fn mute(&self) -> &Property<bool> {
        &self.mute
    }

    pub fn crosspoint(&self, output: u32) -> Result<Arc<Crosspoint>> {
        self.crosspoints.get_or_create(output, |output| {
            Arc::new(Crosspoint::new(
                self.node.link().clone(),
                self.node.instance_tag(),
                self.node.index_path().child(output),
            ))
        })
    }

    pub fn crosspoints(&self) -> Vec<Arc<Crosspoint>> {
        self.crosspoints.all_ordered()
    }

    pub fn set_level(&self, db: f64) -> Result<()> {
        self.node.send(CommandKind::Set, INPUT_LEVEL, Some(db.into()))
    }

    pub fn increment_level(&self, step_db: f64) -> Result<()> {
        self.node
            .send(CommandKind::Increment, INPUT_LEVEL, Some(step_db.into()))
    }

    pub fn decrement_level(&self, step_db: f64) -> Result<()> {
        self.node
            .send(CommandKind::Decrement, INPUT_LEVEL, Some(step_db.into()))
    }

    pub fn set_mute(&self, mute: bool) -> Result<()> {
        self.node.send(CommandKind::Set, INPUT_MUTE, Some(mute.into()))
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.node.send(CommandKind::Toggle, INPUT_MUTE, None)
    }
}

impl Lifecycle for MixerInput {
    fn initialize(&self) {
        self.node.initialize();
        self.crosspoints.initialize_all();
    }

    fn suspend(&self) {
        self.node.suspend();
        self.crosspoints.suspend_all();
    }

    fn dispose(&self) {
        self.crosspoints.dispose_all();
        self.node.dispose();
    }
}

/// Mixer output channel
pub struct MixerOutput {
    node: AttributeNode,
    level: Arc<Property<f64>>,
    mute: Arc<Property<bool>>,
}

impl MixerOutput {
    fn new(link: Arc<DeviceLink>, instance_tag: &str, index: u32) -> Self {
        let node = AttributeNode::new(link, instance_tag, IndexPath::from([index]));
        let level = Arc::new(Property::new(OUTPUT_LEVEL));
        let mute = Arc::new(Property::new(OUTPUT_MUTE));
        node.bind(OUTPUT_LEVEL, true, &level, ControlValue::as_float);
        node.bind(OUTPUT_MUTE, true, &mute, ControlValue::as_bool);

        Self { node, level, mute }
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    pub fn level(&self) -> &Property<f64> {
        &self.level
    }

    pub fn mute(&self) -> &Property<bool> {
        &self.mute
    }

    pub fn set_level(&self, db: f64) -> Result<()> {
        self.node.send(CommandKind::Set, OUTPUT_LEVEL, Some(db.into()))
    }

    pub fn increment_level(&self, step_db: f64) -> Result<()> {
        self.node
            .send(CommandKind::Increment, OUTPUT_LEVEL, Some(step_db.into()))
    }

    pub fn decrement_level(&self, step_db: f64) -> Result<()> {
        self.node
            .send(CommandKind::Decrement, OUTPUT_LEVEL, Some(step_db.into()))
    }

    pub fn set_mute(&self, mute: bool) -> Result<()> {
        self.node.send(CommandKind::Set, OUTPUT_MUTE, Some(mute.into()))
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.node.send(CommandKind::Toggle, OUTPUT_MUTE, None)
    }
}

impl Lifecycle for MixerOutput {
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

/// Mixer crosspoint, addressed as `[input, output]`
pub struct Crosspoint {
    node: AttributeNode,
    enabled: Arc<Property<bool>>,
    level: Arc<Property<f64>>,
}

impl Crosspoint {
    fn new(link: Arc<DeviceLink>, instance_tag: &str, index_path: IndexPath) -> Self {
        let node = AttributeNode::new(link, instance_tag, index_path);
        let enabled = Arc::new(Property::new(CROSSPOINT_STATE));
        let level = Arc::new(Property::new(CROSSPOINT_LEVEL));
        node.bind(CROSSPOINT_STATE, true, &enabled, ControlValue::as_bool);
        node.bind(CROSSPOINT_LEVEL, false, &level, ControlValue::as_float);

        Self {
            node,
            enabled,
            level,
        }
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    /// Whether the input is routed to the output
    pub fn enabled(&self) -> &Property<bool> {
        &self.enabled
    }

    pub fn level(&self) -> &Property<f64> {
        &self.level
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.node
            .send(CommandKind::Set, CROSSPOINT_STATE, Some(enabled.into()))
    }

    pub fn toggle(&self) -> Result<()> {
        self.node.send(CommandKind::Toggle, CROSSPOINT_STATE, None)
    }

    pub fn set_level(&self, db: f64) -> Result<()> {
        self.node
            .send(CommandKind::Set, CROSSPOINT_LEVEL, Some(db.into()))
    }
}

impl Lifecycle for Crosspoint {
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
