//! Message payloads and the envelope handed to the dispatcher.

use crate::opcode::Opcode;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A decoded message payload.
///
/// Implemented for every `'static` type that is `Send + Sync + Debug`, so
/// plain structs can be dispatched without boilerplate.
pub trait Message: Any + Send + Sync + fmt::Debug + 'static {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl<T> Message for T
where
    T: Any + Send + Sync + fmt::Debug,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Message {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn message_type(&self) -> MessageType {
        MessageType {
            id: self.as_any().type_id(),
            name: self.type_name(),
        }
    }
}

/// Identity of a concrete payload type. Equality and hashing use the
/// `TypeId` only; the name is carried for log output.
#[derive(Clone, Copy)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    pub fn of<M: Message>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageType").field(&self.name).finish()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An inbound message as delivered by the transport: its opcode and the
/// already decoded payload.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub opcode: Opcode,
    pub message: Arc<dyn Message>,
}

impl MessageInfo {
    /// Wraps an owned payload.
    ///
    /// Do not pass an `Arc` here: `Arc<M>` is itself a `Message`, so it
    /// would become the payload and typed handlers would reject it. Use
    /// [`from_shared`](Self::from_shared) for payloads that are already
    /// shared.
    pub fn new<M: Message>(opcode: Opcode, message: M) -> Self {
        Self {
            opcode,
            message: Arc::new(message),
        }
    }

    /// Uses an already shared payload as is.
    pub fn from_shared(opcode: Opcode, message: Arc<dyn Message>) -> Self {
        Self { opcode, message }
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    /// Full type name of the payload, not of the `Arc` holding it.
    pub fn type_name(&self) -> &'static str {
        self.message().type_name()
    }
}
