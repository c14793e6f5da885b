//! Demo message set and handlers used by the host's scripted run.

use anyhow::Context;
use async_trait::async_trait;
use message_dispatch::{
    handler_catalog, HandlerCatalog, HandlerError, Message, MessageHandler,
    MessageInfo, MessageType, OpcodeTypeRegistry, RegistryError, SessionRef,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub mod opcodes {
    use message_dispatch::Opcode;

    pub const PING_REQUEST: Opcode = Opcode::from_const(1001);
    pub const PING_RESPONSE: Opcode = Opcode::from_const(1002);
    pub const CHAT: Opcode = Opcode::from_const(1101);
    pub const MAINTENANCE_NOTICE: Opcode = Opcode::from_const(1900);

    /// Legacy namespace
    pub const LEGACY_PING_REQUEST: Opcode = Opcode::from_const(11);
    pub const LEGACY_HEARTBEAT: Opcode = Opcode::from_const(12);
}

#[derive(Debug, Clone, Default)]
pub struct PingRequest {
    pub seq: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PingResponse {
    pub seq: u32,
    pub server_time: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ChatMessage {
    pub from: String,
    pub text: String,
}

/// Only known to the legacy namespace.
#[derive(Debug, Clone, Default)]
pub struct Heartbeat;

/// Has an opcode but no handler.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceNotice {
    pub minutes: u32,
}

fn payload<'a, M: Message>(message: &'a dyn Message) -> Result<&'a M, HandlerError> {
    message
        .downcast_ref::<M>()
        .ok_or_else(|| HandlerError::PayloadMismatch {
            expected: std::any::type_name::<M>(),
            actual: message.type_name(),
        })
}

fn current_timestamp() -> anyhow::Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?;
    Ok(elapsed.as_secs())
}

/// Answers every ping with a pong carrying the same sequence number.
#[derive(Default)]
pub struct PingHandler;

#[async_trait]
impl MessageHandler for PingHandler {
    fn message_type(&self) -> MessageType {
        MessageType::of::<PingRequest>()
    }

    async fn handle(
        &self,
        session: &SessionRef,
        rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        let ping = payload::<PingRequest>(message)?;
        let response = PingResponse {
            seq: ping.seq,
            server_time: current_timestamp()?,
        };
        session.reply(rpc_id, Arc::new(response)).await?;
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "PingHandler"
    }
}

/// Rejects chat lines containing banned words. Runs before the chat log, but
/// a rejection does not stop it.
#[derive(Default)]
pub struct ChatFilterHandler;

const BANNED_WORDS: &[&str] = &["cheat", "exploit"];

#[async_trait]
impl MessageHandler for ChatFilterHandler {
    fn message_type(&self) -> MessageType {
        MessageType::of::<ChatMessage>()
    }

    async fn handle(
        &self,
        _session: &SessionRef,
        _rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        let chat = payload::<ChatMessage>(message)?;
        let lowered = chat.text.to_lowercase();
        if let Some(word) = BANNED_WORDS.iter().find(|w| lowered.contains(*w)) {
            return Err(HandlerError::Execution(format!(
                "chat from {} contains banned word '{}'",
                chat.from, word
            )));
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "ChatFilterHandler"
    }
}

#[derive(Default)]
pub struct ChatLogHandler {
    lines: AtomicU64,
}

#[async_trait]
impl MessageHandler for ChatLogHandler {
    fn message_type(&self) -> MessageType {
        MessageType::of::<ChatMessage>()
    }

    async fn handle(
        &self,
        session: &SessionRef,
        _rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        let chat = payload::<ChatMessage>(message)?;
        let line = self.lines.fetch_add(1, Ordering::Relaxed) + 1;
        info!("💬 [{}] #{} {}: {}", session.id(), line, chat.from, chat.text);
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "ChatLogHandler"
    }
}

#[derive(Default)]
pub struct HeartbeatHandler;

#[async_trait]
impl MessageHandler for HeartbeatHandler {
    fn message_type(&self) -> MessageType {
        MessageType::of::<Heartbeat>()
    }

    async fn handle(
        &self,
        session: &SessionRef,
        _rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        payload::<Heartbeat>(message)?;
        if !session.is_connected() {
            return Err(HandlerError::Execution(format!(
                "heartbeat from disconnected session {}",
                session.id()
            )));
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "HeartbeatHandler"
    }
}

/// Handlers for the primary namespace followed by the legacy-only ones.
pub fn demo_catalog() -> HandlerCatalog {
    let mut catalog = handler_catalog![PingHandler, ChatFilterHandler, ChatLogHandler];
    catalog.extend(handler_catalog![HeartbeatHandler]);
    catalog
}

pub fn primary_opcodes() -> Result<OpcodeTypeRegistry, RegistryError> {
    let mut registry = OpcodeTypeRegistry::new();
    registry.register::<PingRequest>(opcodes::PING_REQUEST)?;
    registry.register::<PingResponse>(opcodes::PING_RESPONSE)?;
    registry.register::<ChatMessage>(opcodes::CHAT)?;
    registry.register::<MaintenanceNotice>(opcodes::MAINTENANCE_NOTICE)?;
    Ok(registry)
}

pub fn legacy_opcodes() -> Result<OpcodeTypeRegistry, RegistryError> {
    let mut registry = OpcodeTypeRegistry::new();
    registry.register::<PingRequest>(opcodes::LEGACY_PING_REQUEST)?;
    registry.register::<Heartbeat>(opcodes::LEGACY_HEARTBEAT)?;
    Ok(registry)
}

/// Scripted inbound traffic for one cycle of the demo run.
pub fn demo_traffic(cycle: u32) -> Vec<MessageInfo> {
    vec![
        MessageInfo::new(opcodes::PING_REQUEST, PingRequest { seq: cycle }),
        MessageInfo::new(
            opcodes::CHAT,
            ChatMessage {
                from: "ranger".to_string(),
                text: format!("hello from cycle {cycle}"),
            },
        ),
        MessageInfo::new(
            opcodes::CHAT,
            ChatMessage {
                from: "rogue".to_string(),
                text: "anyone know an exploit?".to_string(),
            },
        ),
        MessageInfo::new(opcodes::MAINTENANCE_NOTICE, MaintenanceNotice { minutes: 5 }),
    ]
}

/// Traffic arriving through the legacy layer.
pub fn legacy_traffic() -> Vec<MessageInfo> {
    vec![
        MessageInfo::new(opcodes::LEGACY_HEARTBEAT, Heartbeat),
        MessageInfo::new(opcodes::LEGACY_PING_REQUEST, PingRequest { seq: 99 }),
    ]
}
