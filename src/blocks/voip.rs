use crate::blocks::decode_count;
use crate::children::ChildCollection;
use crate::device::DeviceLink;
use crate::error::{Result, TesiraError};
use crate::node::{AttributeNode, Lifecycle};
use crate::property::Property;
use crate::protocol::CommandKind;
use crate::types::{CallState, IndexPath, CALL_APPEARANCES_PER_LINE, CALL_STATE_TOKENS};
use crate::value::ControlValue;
use std::sync::{Arc, Weak};

const LINE_COUNT: &str = "lineCount";
const AUTO_ANSWER: &str = "autoAnswer";
const DND_ENABLE: &str = "dndEnable";
const CALL_STATE: &str = "callState";
const CALL_STATE_INFO: &str = "callStateInfo";

/// VoIP control/status block
///
/// Unlike the channel blocks, the line count is subscribed and any change
/// rebuilds every line from scratch.
pub struct VoipBlock {
    node: AttributeNode,
    line_count: Arc<Property<u32>>,
    lines: ChildCollection<VoipLine>,
}

impl VoipBlock {
    pub(crate) fn new(link: Arc<DeviceLink>, instance_tag: &str) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let node = AttributeNode::new(link, instance_tag, IndexPath::root());
            let line_count = Arc::new(Property::new(LINE_COUNT));
            node.bind(LINE_COUNT, true, &line_count, decode_count);

            let this = this.clone();
            line_count.observe(move |count: &u32| {
                if let Some(block) = this.upgrade() {
                    block.lines_reported(*count);
                }
            });

            Self {
                node,
                line_count,
                lines: ChildCollection::new(),
            }
        })
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    pub fn line_count(&self) -> &Property<u32> {
        &self.line_count
    }

    pub fn line(&self, index: u32) -> Result<Arc<VoipLine>> {
        self.lines.get_or_create(index, |index| self.create_line(index))
    }

    pub fn lines(&self) -> Vec<Arc<VoipLine>> {
        self.lines.all_ordered()
    }

    pub fn call_appearance(&self, line: u32, appearance: u32) -> Result<Arc<CallAppearance>> {
        self.line(line)?.call_appearance(appearance)
    }

    fn create_line(&self, index: u32) -> Arc<VoipLine> {
        Arc::new(VoipLine::new(
            self.node.link().clone(),
            self.node.instance_tag(),
            index,
        ))
    }

    fn lines_reported(&self, count: u32) {
        tracing::debug!(
            "{} reports {} line(s), rebuilding",
            self.node.instance_tag(),
            count
        );
        self.lines.reset_to(count, |index| self.create_line(index));
    }
}

impl Lifecycle for VoipBlock {
    fn initialize(&self) {
        self.node.initialize();
        self.lines.initialize_all();
    }

    fn suspend(&self) {
        self.node.suspend();
        self.lines.suspend_all();
    }

    fn dispose(&self) {
        self.lines.dispose_all();
        self.node.dispose();
    }
}

/// One VoIP line and its call appearances
pub struct VoipLine {
    node: AttributeNode,
    auto_answer: Arc<Property<bool>>,
    dnd: Arc<Property<bool>>,
    call_appearances: ChildCollection<CallAppearance>,
}

impl VoipLine {
    fn new(link: Arc<DeviceLink>, instance_tag: &str, index: u32) -> Self {
        let node = AttributeNode::new(link, instance_tag, IndexPath::from([index]));
        let auto_answer = Arc::new(Property::new(AUTO_ANSWER));
        let dnd = Arc::new(Property::new(DND_ENABLE));
        node.bind(AUTO_ANSWER, true, &auto_answer, ControlValue::as_bool);
        node.bind(DND_ENABLE, true, &dnd, ControlValue::as_bool);

        Self {
            node,
            auto_answer,
            dnd,
            call_appearances: ChildCollection::new(),
        }
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    pub fn auto_answer(&self) -> &Property<bool> {
        &self.auto_answer
    }

    /// Do-not-disturb
    pub fn dnd(&self) -> &Property<bool> {
        &self.dnd
    }

    pub fn call_appearance(&self, index: u32) -> Result<Arc<CallAppearance>> {
        self.call_appearances
            .get_or_create(index, |index| self.create_call_appearance(index))
    }

    pub fn call_appearances(&self) -> Vec<Arc<CallAppearance>> {
        self.call_appearances.all_ordered()
    }

    pub fn set_auto_answer(&self, enabled: bool) -> Result<()> {
        self.node
            .send(CommandKind::Set, AUTO_ANSWER, Some(enabled.into()))
    }

    pub fn toggle_auto_answer(&self) -> Result<()> {
        self.node.send(CommandKind::Toggle, AUTO_ANSWER, None)
    }

    pub fn set_dnd(&self, enabled: bool) -> Result<()> {
        self.node.send(CommandKind::Set, DND_ENABLE, Some(enabled.into()))
    }

    pub fn toggle_dnd(&self) -> Result<()> {
        self.node.send(CommandKind::Toggle, DND_ENABLE, None)
    }

    fn create_call_appearance(&self, index: u32) -> Arc<CallAppearance> {
        Arc::new(CallAppearance::new(
            self.node.link().clone(),
            self.node.instance_tag(),
            self.node.index_path().child(index),
        ))
    }
}

impl Lifecycle for VoipLine {
    fn initialize(&self) {
        if !self.node.is_alive() {
            return;
        }
        self.node.initialize();
        self.call_appearances.initialize_all();
        self.call_appearances.grow_to(CALL_APPEARANCES_PER_LINE, |index| {
            self.create_call_appearance(index)
        });
    }

    fn suspend(&self) {
        self.node.suspend();
        self.call_appearances.suspend_all();
    }

    fn dispose(&self) {
        self.call_appearances.dispose_all();
        self.node.dispose();
    }
}

/// One call appearance `[line, ca]` of a VoIP line
pub struct CallAppearance {
    node: AttributeNode,
    call_state: Arc<Property<CallState>>,
    caller_id: Arc<Property<String>>,
}

impl CallAppearance {
    fn new(link: Arc<DeviceLink>, instance_tag: &str, index_path: IndexPath) -> Self {
        let node = AttributeNode::new(link, instance_tag, index_path);
        let call_state = Arc::new(Property::new("callState"));
        let caller_id = Arc::new(Property::new("callerId"));
        node.bind(CALL_STATE, true, &call_state, decode_call_state);
        node.bind(CALL_STATE, true, &caller_id, decode_caller_id);

        Self {
            node,
            call_state,
            caller_id,
        }
    }

    pub fn node(&self) -> &AttributeNode {
        &self.node
    }

    pub fn call_state(&self) -> &Property<CallState> {
        &self.call_state
    }

    pub fn caller_id(&self) -> &Property<String> {
        &self.caller_id
    }

    pub fn dial(&self, number: &str) -> Result<()> {
        if number.trim().is_empty() {
            return Err(TesiraError::InvalidCommand("Empty dial string".to_string()));
        }
        self.node.invoke("dial", Some(number.into()))
    }

    pub fn answer(&self) -> Result<()> {
        self.node.invoke("answer", None)
    }

    pub fn end(&self) -> Result<()> {
        self.node.invoke("end", None)
    }

    pub fn redial(&self) -> Result<()> {
        self.node.invoke("redial", None)
    }

    pub fn hold(&self) -> Result<()> {
        self.node.invoke("hold", None)
    }

    pub fn resume(&self) -> Result<()> {
        self.node.invoke("resume", None)
    }

    /// Send one DTMF digit (`0-9`, `*` or `#`)
    pub fn dtmf(&self, digit: char) -> Result<()> {
        if !(digit.is_ascii_digit() || digit == '*' || digit == '#') {
            return Err(TesiraError::InvalidCommand(format!(
                "Invalid DTMF digit '{}'",
                digit
            )));
        }
        self.node.invoke("dtmf", Some(digit.to_string().into()))
    }
}

impl Lifecycle for CallAppearance {
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

fn decode_call_state(value: &ControlValue) -> Result<CallState> {
    value
        .field(CALL_STATE_INFO)?
        .field("state")?
        .as_enum(&CALL_STATE_TOKENS)
}

fn decode_caller_id(value: &ControlValue) -> Result<String> {
    match value.field(CALL_STATE_INFO)?.get("cid") {
        Some(cid) => Ok(cid.as_str()?.to_string()),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call_state_value(state: &str, cid: Option<&str>) -> ControlValue {
        let mut info = json!({ "state": state });
        if let Some(cid) = cid {
            info["cid"] = json!(cid);
        }
        ControlValue::try_from(json!({ "callStateInfo": info })).unwrap()
    }

    #[test]
    fn decodes_call_state_and_caller_id() {
        let value = call_state_value("VOIP_CALL_STATE_RINGING", Some("5551234"));
        assert_eq!(decode_call_state(&value).unwrap(), CallState::Ringing);
        assert_eq!(decode_caller_id(&value).unwrap(), "5551234");

        let idle = call_state_value("voip_call_state_idle", None);
        assert_eq!(decode_call_state(&idle).unwrap(), CallState::Idle);
        assert_eq!(decode_caller_id(&idle).unwrap(), "");
    }

    #[test]
    fn unknown_call_state_is_rejected() {
        let value = call_state_value("VOIP_CALL_STATE_LAUNCHED", None);
        assert!(matches!(
            decode_call_state(&value),
            Err(TesiraError::UnknownToken(_))
        ));
    }
}
