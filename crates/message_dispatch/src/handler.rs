//! Handler trait and the closure-backed typed adapter.

use crate::error::HandlerError;
use crate::message::{Message, MessageType};
use crate::session::SessionRef;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

/// A unit of logic bound to one payload type.
///
/// Implementors report which payload type they consume so the loader can
/// resolve their opcode, and receive every dispatched message of that type.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn message_type(&self) -> MessageType;

    async fn handle(
        &self,
        session: &SessionRef,
        rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError>;

    fn handler_name(&self) -> &str {
        self.message_type().name()
    }
}

/// Adapts a synchronous closure over a concrete payload type `M`.
pub struct TypedMessageHandler<M, F>
where
    M: Message,
    F: Fn(&SessionRef, u32, &M) -> Result<(), HandlerError> + Send + Sync,
{
    handler: F,
    name: String,
    _phantom: PhantomData<fn(&M)>,
}

impl<M, F> TypedMessageHandler<M, F>
where
    M: Message,
    F: Fn(&SessionRef, u32, &M) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            handler,
            name: name.into(),
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<M, F> MessageHandler for TypedMessageHandler<M, F>
where
    M: Message,
    F: Fn(&SessionRef, u32, &M) -> Result<(), HandlerError> + Send + Sync,
{
    fn message_type(&self) -> MessageType {
        MessageType::of::<M>()
    }

    async fn handle(
        &self,
        session: &SessionRef,
        rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        let payload = message
            .downcast_ref::<M>()
            .ok_or_else(|| HandlerError::PayloadMismatch {
                expected: std::any::type_name::<M>(),
                actual: message.type_name(),
            })?;
        (self.handler)(session, rpc_id, payload)
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// Builds a shared handler from a closure.
pub fn handler_fn<M, F>(name: impl Into<String>, handler: F) -> Arc<dyn MessageHandler>
where
    M: Message,
    F: Fn(&SessionRef, u32, &M) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(TypedMessageHandler::<M, F>::new(name, handler))
}
