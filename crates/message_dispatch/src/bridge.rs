//! Best-effort registration into an independent legacy dispatcher.
//!
//! The legacy layer keeps its own opcode namespace. Handlers loaded by the
//! primary dispatcher are offered to it wrapped in a [`MessageProxy`]; when
//! the legacy collaborators are missing or the type is unknown there, the
//! step is skipped.

use crate::error::HandlerError;
use crate::handler::MessageHandler;
use crate::message::{Message, MessageType};
use crate::opcode::Opcode;
use crate::opcode_types::OpcodeResolver;
use crate::session::SessionRef;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Accepts handler registrations in the legacy namespace.
pub trait LegacyRegistry: Send {
    fn register_handler(&mut self, opcode: Opcode, handler: Arc<dyn MessageHandler>);
}

/// Forwards legacy dispatches to a handler owned by the primary dispatcher.
pub struct MessageProxy {
    message_type: MessageType,
    name: String,
    target: Arc<dyn MessageHandler>,
}

impl MessageProxy {
    pub fn new(target: Arc<dyn MessageHandler>) -> Self {
        Self {
            message_type: target.message_type(),
            name: format!("proxy({})", target.handler_name()),
            target,
        }
    }

    pub fn target(&self) -> &Arc<dyn MessageHandler> {
        &self.target
    }
}

#[async_trait]
impl MessageHandler for MessageProxy {
    fn message_type(&self) -> MessageType {
        self.message_type
    }

    async fn handle(
        &self,
        session: &SessionRef,
        rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        self.target.handle(session, rpc_id, message).await
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// The legacy registry together with the resolver for its namespace. Only
/// constructible when both are present.
pub struct LegacyBridge<'a> {
    registry: &'a mut dyn LegacyRegistry,
    resolver: &'a dyn OpcodeResolver,
}

impl<'a> LegacyBridge<'a> {
    pub fn new(registry: &'a mut dyn LegacyRegistry, resolver: &'a dyn OpcodeResolver) -> Self {
        Self { registry, resolver }
    }

    /// Returns `None` unless both collaborators are available.
    pub fn from_parts(
        registry: Option<&'a mut dyn LegacyRegistry>,
        resolver: Option<&'a dyn OpcodeResolver>,
    ) -> Option<Self> {
        match (registry, resolver) {
            (Some(registry), Some(resolver)) => Some(Self::new(registry, resolver)),
            _ => None,
        }
    }

    /// Registers a proxy for `handler` when its payload type has an opcode in
    /// the legacy namespace. Returns that opcode.
    pub fn attach(&mut self, handler: &Arc<dyn MessageHandler>) -> Option<Opcode> {
        let message_type = handler.message_type();
        let Some(opcode) = self.resolver.opcode_of(&message_type) else {
            debug!(
                "Legacy namespace has no opcode for {}, skipping bridge",
                message_type
            );
            return None;
        };

        self.registry
            .register_handler(opcode, Arc::new(MessageProxy::new(handler.clone())));
        debug!(
            "🔗 Bridged {} to legacy opcode {}",
            handler.handler_name(),
            opcode
        );
        Some(opcode)
    }
}
