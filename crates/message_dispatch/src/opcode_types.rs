//! Resolution of payload types to opcodes.

use crate::error::RegistryError;
use crate::message::{Message, MessageType};
use crate::opcode::Opcode;
use std::collections::HashMap;

/// Maps a payload type to its opcode.
///
/// `None` stands for the reserved opcode 0: the type is not registered in
/// this namespace.
pub trait OpcodeResolver: Send + Sync {
    fn opcode_of(&self, message_type: &MessageType) -> Option<Opcode>;
}

impl<F> OpcodeResolver for F
where
    F: Fn(&MessageType) -> Option<Opcode> + Send + Sync,
{
    fn opcode_of(&self, message_type: &MessageType) -> Option<Opcode> {
        self(message_type)
    }
}

/// Bidirectional opcode/type table. Each opcode binds exactly one type and
/// each type exactly one opcode.
#[derive(Debug, Default)]
pub struct OpcodeTypeRegistry {
    by_type: HashMap<MessageType, Opcode>,
    by_opcode: HashMap<Opcode, MessageType>,
}

impl OpcodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Message>(&mut self, opcode: Opcode) -> Result<(), RegistryError> {
        self.register_type(MessageType::of::<M>(), opcode)
    }

    pub fn register_type(
        &mut self,
        message_type: MessageType,
        opcode: Opcode,
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.by_opcode.get(&opcode) {
            return Err(RegistryError::DuplicateOpcode {
                opcode: opcode.get(),
                existing: existing.name(),
            });
        }
        if let Some(existing) = self.by_type.get(&message_type) {
            return Err(RegistryError::DuplicateType {
                message_type: message_type.name(),
                existing: existing.get(),
            });
        }

        self.by_type.insert(message_type, opcode);
        self.by_opcode.insert(opcode, message_type);
        Ok(())
    }

    pub fn message_type_of(&self, opcode: Opcode) -> Option<MessageType> {
        self.by_opcode.get(&opcode).copied()
    }

    pub fn len(&self) -> usize {
        self.by_opcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_opcode.is_empty()
    }
}

impl OpcodeResolver for OpcodeTypeRegistry {
    fn opcode_of(&self, message_type: &MessageType) -> Option<Opcode> {
        self.by_type.get(message_type).copied()
    }
}
