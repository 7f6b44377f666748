use crate::error::{Result, TesiraError};
use crate::router::RouteKey;
use crate::types::IndexPath;
use crate::value::ControlValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The adjustment and lifecycle verbs the device understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Get,
    Set,
    Increment,
    Decrement,
    Toggle,
    Subscribe,
    Unsubscribe,
    /// Service call such as `dial` or `hold`; the service name replaces the keyword
    Invoke,
}

impl CommandKind {
    /// Wire keyword, `None` for service invocations
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            CommandKind::Get => Some("get"),
            CommandKind::Set => Some("set"),
            CommandKind::Increment => Some("increment"),
            CommandKind::Decrement => Some("decrement"),
            CommandKind::Toggle => Some("toggle"),
            CommandKind::Subscribe => Some("subscribe"),
            CommandKind::Unsubscribe => Some("unsubscribe"),
            CommandKind::Invoke => None,
        }
    }
}

/// Outgoing command addressed to one attribute or service of a block
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub instance_tag: String,
    pub kind: CommandKind,
    /// Attribute name, or the service name for [`CommandKind::Invoke`]
    pub attribute: String,
    pub value: Option<ControlValue>,
    pub index_path: IndexPath,
}

impl Command {
    /// Create a new command for an attribute
    pub fn new(
        instance_tag: impl Into<String>,
        kind: CommandKind,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            instance_tag: instance_tag.into(),
            kind,
            attribute: attribute.into(),
            value: None,
            index_path: IndexPath::root(),
        }
    }

    /// Create a service invocation
    pub fn invoke(instance_tag: impl Into<String>, service: impl Into<String>) -> Self {
        Self::new(instance_tag, CommandKind::Invoke, service)
    }

    /// Set the literal value (or the single service argument)
    pub fn with_value(mut self, value: impl Into<ControlValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the trailing index path
    pub fn with_index_path(mut self, index_path: IndexPath) -> Self {
        self.index_path = index_path;
        self
    }

    /// Router key replies to this command are correlated under
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(
            self.instance_tag.clone(),
            self.attribute.clone(),
            self.index_path.clone(),
        )
    }

    /// Render the command line handed to the transport
    pub fn encode(&self) -> String {
        let mut parts = vec![quote_if_spaced(&self.instance_tag)];
        if let Some(keyword) = self.kind.keyword() {
            parts.push(keyword.to_string());
        }
        parts.push(self.attribute.clone());
        if let Some(value) = &self.value {
            parts.push(literal(value));
        }
        parts.extend(self.index_path.as_slice().iter().map(u32::to_string));
        parts.join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn quote_if_spaced(tag: &str) -> String {
    if tag.chars().any(char::is_whitespace) {
        quote(tag)
    } else {
        tag.to_string()
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn literal(value: &ControlValue) -> String {
    match value {
        ControlValue::Bool(value) => value.to_string(),
        ControlValue::Int(value) => value.to_string(),
        ControlValue::Float(value) => value.to_string(),
        ControlValue::String(value) => quote(value),
        ControlValue::Array(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(" "))
        }
        ControlValue::Map(_) => serde_json::Value::from(value.clone()).to_string(),
    }
}

/// Parsed response as delivered by the codec layer
///
/// `publish` distinguishes device-initiated feedback from replies to a
/// command. `value` is absent for plain acknowledgements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub instance_tag: String,
    pub attribute: String,
    #[serde(default)]
    pub index_path: IndexPath,
    #[serde(default)]
    pub publish: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ControlValue>,
}

impl Response {
    /// Reply to a command carrying a value
    pub fn reply(key: &RouteKey, value: impl Into<ControlValue>) -> Self {
        Self::from_key(key, false, Some(value.into()))
    }

    /// Subscription feedback pushed by the device
    pub fn publish(key: &RouteKey, value: impl Into<ControlValue>) -> Self {
        Self::from_key(key, true, Some(value.into()))
    }

    /// Reply without a value
    pub fn ack(key: &RouteKey) -> Self {
        Self::from_key(key, false, None)
    }

    fn from_key(key: &RouteKey, publish: bool, value: Option<ControlValue>) -> Self {
        Self {
            instance_tag: key.instance_tag.clone(),
            attribute: key.attribute.clone(),
            index_path: key.index_path.clone(),
            publish,
            value,
        }
    }

    /// Parse a response from its JSON form
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Extract a response from an already parsed tree
    pub fn from_tree(tree: &ControlValue) -> Result<Self> {
        let index_path: IndexPath = match tree.get("indexPath") {
            Some(indices) => indices
                .as_array()?
                .iter()
                .map(|index| {
                    let index = index.as_int()?;
                    u32::try_from(index).map_err(|_| {
                        TesiraError::InvalidResponse(format!("Index {} out of range", index))
                    })
                })
                .collect::<Result<Vec<u32>>>()?
                .into(),
            None => IndexPath::root(),
        };

        Ok(Self {
            instance_tag: tree.field("instanceTag")?.as_str()?.to_string(),
            attribute: tree.field("attribute")?.as_str()?.to_string(),
            index_path,
            publish: tree
                .get("publish")
                .map(ControlValue::as_bool)
                .transpose()?
                .unwrap_or(false),
            value: tree.get("value").cloned(),
        })
    }

    /// Router key this response is addressed to
    pub fn key(&self) -> RouteKey {
        RouteKey::new(
            self.instance_tag.clone(),
            self.attribute.clone(),
            self.index_path.clone(),
        )
    }
}
