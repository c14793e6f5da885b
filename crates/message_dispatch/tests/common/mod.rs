//! Shared fixtures for the dispatcher integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use message_dispatch::{
    HandlerError, Message, MessageHandler, MessageType, Opcode, OpcodeTypeRegistry, SessionRef,
};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

pub const PING: Opcode = Opcode::from_const(1001);
pub const CHAT: Opcode = Opcode::from_const(1002);
pub const UNHANDLED: Opcode = Opcode::from_const(2002);
pub const FAN_OUT: Opcode = Opcode::from_const(3003);

#[derive(Debug, Clone, Default)]
pub struct PingMsg {
    pub seq: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ChatMsg {
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct OrphanMsg;

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

/// Collects every event emitted while its guard is installed.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = Registry::default().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }

    pub fn errors(&self) -> Vec<CapturedEvent> {
        self.at(Level::ERROR)
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
        });
    }
}

/// Records the order in which handlers ran.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// A handler that appends its name and the received rpc id to a shared log
/// and optionally fails.
pub struct ProbeHandler<M> {
    pub name: String,
    pub log: CallLog,
    pub fail: bool,
    _message: std::marker::PhantomData<fn(&M)>,
}

impl<M: Message> ProbeHandler<M> {
    pub fn ok(name: &str, log: &CallLog) -> Arc<dyn MessageHandler> {
        Arc::new(Self::new(name, log, false))
    }

    pub fn failing(name: &str, log: &CallLog) -> Arc<dyn MessageHandler> {
        Arc::new(Self::new(name, log, true))
    }

    pub fn new(name: &str, log: &CallLog, fail: bool) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail,
            _message: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<M: Message> MessageHandler for ProbeHandler<M> {
    fn message_type(&self) -> MessageType {
        MessageType::of::<M>()
    }

    async fn handle(
        &self,
        _session: &SessionRef,
        rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        if !message.is::<M>() {
            return Err(HandlerError::PayloadMismatch {
                expected: std::any::type_name::<M>(),
                actual: message.type_name(),
            });
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("{}#{}", self.name, rpc_id));
        if self.fail {
            return Err(HandlerError::Execution(format!("{} failed", self.name)));
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

pub fn primary_opcodes() -> OpcodeTypeRegistry {
    let mut opcodes = OpcodeTypeRegistry::new();
    opcodes.register::<PingMsg>(PING).unwrap();
    opcodes.register::<ChatMsg>(CHAT).unwrap();
    opcodes
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}
