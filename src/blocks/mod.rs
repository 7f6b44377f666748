//! Concrete attribute interfaces for the supported Tesira block families
//!
//! Each type composes one [`AttributeNode`](crate::node::AttributeNode) with
//! its typed properties and, for containers, a
//! [`ChildCollection`](crate::children::ChildCollection) of child nodes.

pub mod aec;
pub mod level;
pub mod mixer;
pub mod voip;

use crate::error::{Result, TesiraError};
use crate::value::ControlValue;

/// Decode a device-reported child count
pub(crate) fn decode_count(value: &ControlValue) -> Result<u32> {
    let count = value.as_int()?;
    u32::try_from(count)
        .map_err(|_| TesiraError::InvalidResponse(format!("Invalid count {}", count)))
}

pub(crate) fn decode_string(value: &ControlValue) -> Result<String> {
    value.as_str().map(str::to_string)
}
