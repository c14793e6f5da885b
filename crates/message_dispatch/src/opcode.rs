//! Opcode identifiers for routed messages.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU16;

/// Numeric identifier of a message type.
///
/// The raw value `0` is reserved for "unregistered" and cannot be represented,
/// so a handler can never be registered or dispatched under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(NonZeroU16);

impl Opcode {
    /// The reserved raw value meaning "no opcode".
    pub const RESERVED: u16 = 0;

    /// Returns `None` for the reserved value.
    pub const fn new(raw: u16) -> Option<Self> {
        match NonZeroU16::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Const constructor for opcode tables. Fails compilation when used in a
    /// const item with the reserved value.
    pub const fn from_const(raw: u16) -> Self {
        match NonZeroU16::new(raw) {
            Some(value) => Self(value),
            None => panic!("opcode 0 is reserved"),
        }
    }

    pub const fn get(self) -> u16 {
        self.0.get()
    }
}

impl TryFrom<u16> for Opcode {
    type Error = RegistryError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(RegistryError::ReservedOpcode)
    }
}

impl From<Opcode> for u16 {
    fn from(opcode: Opcode) -> Self {
        opcode.get()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
