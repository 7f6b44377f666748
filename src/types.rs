use crate::value::TokenTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one attribute node, unique for the lifetime of the process
pub type NodeId = Uuid;

/// Number of call appearances the device exposes on every VoIP line
pub const CALL_APPEARANCES_PER_LINE: u32 = 6;

/// Ordered 1-based indices scoping an attribute within a block
///
/// Block index comes before channel index before sub-index, matching the
/// order the device expects them on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexPath(Vec<u32>);

impl IndexPath {
    /// The empty path, addressing a block itself
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create a path from the given indices
    pub fn new(indices: impl Into<Vec<u32>>) -> Self {
        Self(indices.into())
    }

    /// Extend this path with one more trailing index
    pub fn child(&self, index: u32) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u32>> for IndexPath {
    fn from(indices: Vec<u32>) -> Self {
        Self(indices)
    }
}

impl From<&[u32]> for IndexPath {
    fn from(indices: &[u32]) -> Self {
        Self(indices.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for IndexPath {
    fn from(indices: [u32; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (position, index) in self.0.iter().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", index)?;
        }
        write!(f, "]")
    }
}

/// Logical channel axis used when resolving an interface
///
/// The same numeric index means different things depending on the axis, e.g.
/// mixer input 2 and mixer output 2 are distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// The block itself
    None,
    Input,
    Output,
    /// Mixer crosspoint, addressed as `[input, output]`
    Crosspoint,
    /// VoIP line
    Line,
    /// VoIP call appearance, addressed as `[line, call appearance]`
    CallAppearance,
}

impl ChannelType {
    /// Number of indices a path for this channel type must carry
    pub fn arity(self) -> usize {
        match self {
            ChannelType::None => 0,
            ChannelType::Input | ChannelType::Output | ChannelType::Line => 1,
            ChannelType::Crosspoint | ChannelType::CallAppearance => 2,
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelType::None => "block",
            ChannelType::Input => "input",
            ChannelType::Output => "output",
            ChannelType::Crosspoint => "crosspoint",
            ChannelType::Line => "line",
            ChannelType::CallAppearance => "call appearance",
        };
        f.write_str(name)
    }
}

/// Kinds of top-level blocks a device configuration may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    AecInput,
    Level,
    Mixer,
    Voip,
}

/// State of a VoIP call appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Init,
    Fault,
    Idle,
    DialTone,
    Silent,
    Dialing,
    Ringback,
    Ringing,
    Busy,
    Reject,
    InvalidNumber,
    Active,
    ActiveMuted,
    OnHold,
    WaitingRing,
    ConfActive,
    ConfHold,
}

impl CallState {
    /// Whether a call is currently established on the appearance
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            CallState::Active | CallState::ActiveMuted | CallState::ConfActive
        )
    }
}

/// Device tokens for [`CallState`] as reported by current firmware
pub const CALL_STATE_TOKENS: TokenTable<CallState> = TokenTable::new(&[
    ("VOIP_CALL_STATE_INIT", CallState::Init),
    ("VOIP_CALL_STATE_FAULT", CallState::Fault),
    ("VOIP_CALL_STATE_IDLE", CallState::Idle),
    ("VOIP_CALL_STATE_DIAL_TONE", CallState::DialTone),
    ("VOIP_CALL_STATE_SILENT", CallState::Silent),
    ("VOIP_CALL_STATE_DIALING", CallState::Dialing),
    ("VOIP_CALL_STATE_RINGBACK", CallState::Ringback),
    ("VOIP_CALL_STATE_RINGING", CallState::Ringing),
    ("VOIP_CALL_STATE_BUSY", CallState::Busy),
    ("VOIP_CALL_STATE_REJECT", CallState::Reject),
    ("VOIP_CALL_STATE_INVALID_NUMBER", CallState::InvalidNumber),
    ("VOIP_CALL_STATE_ACTIVE", CallState::Active),
    ("VOIP_CALL_STATE_ACTIVE_MUTED", CallState::ActiveMuted),
    ("VOIP_CALL_STATE_ON_HOLD", CallState::OnHold),
    ("VOIP_CALL_STATE_WAITING_RING", CallState::WaitingRing),
    ("VOIP_CALL_STATE_CONF_ACTIVE", CallState::ConfActive),
    ("VOIP_CALL_STATE_CONF_HOLD", CallState::ConfHold),
]);
