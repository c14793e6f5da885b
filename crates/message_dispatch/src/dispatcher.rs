//! The message dispatcher component: load/reload of the handler table and
//! the per-message dispatch loop.

use crate::bridge::{LegacyBridge, LegacyRegistry};
use crate::catalog::HandlerSource;
use crate::config::DispatcherConfig;
use crate::error::{HandlerError, InstantiateError};
use crate::handler::MessageHandler;
use crate::message::{Message, MessageInfo};
use crate::opcode::Opcode;
use crate::opcode_types::OpcodeResolver;
use crate::registry::HandlerRegistry;
use crate::session::SessionRef;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Summary of one `load()` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub candidates: usize,
    pub skipped_untagged: usize,
    pub instantiation_failures: usize,
    pub registered: usize,
    pub unresolved: usize,
    pub bridged: usize,
}

/// Result of dispatching one message. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub invoked: usize,
    pub failed: usize,
}

impl DispatchOutcome {
    pub fn was_handled(&self) -> bool {
        self.invoked > 0
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub messages_dispatched: u64,
    pub unhandled_messages: u64,
    pub handler_invocations: u64,
    pub handler_failures: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    messages_dispatched: AtomicU64,
    unhandled_messages: AtomicU64,
    handler_invocations: AtomicU64,
    handler_failures: AtomicU64,
}

impl StatCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled_messages.load(Ordering::Relaxed),
            handler_invocations: self.handler_invocations.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// Routes inbound messages to the handlers registered for their opcode.
///
/// Mutating operations (`load`, `clear`, `register`) take `&mut self` while
/// `handle` takes `&self`, so a rebuild can never overlap a dispatch on the
/// same instance. Hosts that share one dispatcher between tasks put it
/// behind their own lock.
///
/// Nothing here returns an error to the caller. Unknown opcodes, failing
/// handlers and broken handler factories are logged and skipped.
#[derive(Debug, Default)]
pub struct MessageDispatcher {
    registry: HandlerRegistry,
    config: DispatcherConfig,
    stats: StatCounters,
    disposed: bool,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Creates a dispatcher and performs the initial load.
    pub fn awake(
        config: DispatcherConfig,
        source: &dyn HandlerSource,
        resolver: &dyn OpcodeResolver,
        bridge: Option<LegacyBridge<'_>>,
    ) -> Self {
        let mut dispatcher = Self::with_config(config);
        dispatcher.load(source, resolver, bridge);
        dispatcher
    }

    /// Rebuilds the handler table from scratch.
    ///
    /// Previous registrations, including ones added through
    /// [`register`](Self::register), are discarded first.
    pub fn load(
        &mut self,
        source: &dyn HandlerSource,
        resolver: &dyn OpcodeResolver,
        mut bridge: Option<LegacyBridge<'_>>,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        if self.disposed {
            warn!("⚠️ Ignoring load on a disposed message dispatcher");
            return report;
        }

        self.registry.clear();

        for descriptor in source.discover() {
            report.candidates += 1;

            if !descriptor.is_message_handler() {
                report.skipped_untagged += 1;
                continue;
            }

            let created = std::panic::catch_unwind(AssertUnwindSafe(|| descriptor.instantiate()))
                .unwrap_or_else(|panic| {
                    Err(InstantiateError::failed(
                        descriptor.name(),
                        panic_message(panic),
                    ))
                });
            let handler = match created {
                Ok(handler) => handler,
                Err(e) => {
                    report.instantiation_failures += 1;
                    error!(
                        "❌ Message handler {} could not be created: {}",
                        descriptor.name(),
                        e
                    );
                    continue;
                }
            };

            let message_type = handler.message_type();
            match resolver.opcode_of(&message_type) {
                Some(opcode) => {
                    self.registry.register(opcode, handler.clone());
                    report.registered += 1;
                    debug!(
                        "📝 Registered {} for opcode {} ({})",
                        handler.handler_name(),
                        opcode,
                        message_type
                    );
                }
                None => {
                    report.unresolved += 1;
                    warn!(
                        "⚠️ No opcode for message type {}, handler {} not registered",
                        message_type,
                        handler.handler_name()
                    );
                }
            }

            if let Some(bridge) = bridge.as_mut() {
                if bridge.attach(&handler).is_some() {
                    report.bridged += 1;
                }
            }
        }

        info!(
            "📦 Loaded {} message handlers for {} opcodes ({} candidates, {} bridged)",
            report.registered,
            self.registry.len(),
            report.candidates,
            report.bridged
        );
        report
    }

    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Appends a handler outside of the catalog scan. It survives until the
    /// next `load()` or `clear()`.
    pub fn register(&mut self, opcode: Opcode, handler: Arc<dyn MessageHandler>) {
        debug!(
            "📝 Registered {} for opcode {}",
            handler.handler_name(),
            opcode
        );
        self.registry.register(opcode, handler);
    }

    pub fn handlers(&self, opcode: Opcode) -> Option<&[Arc<dyn MessageHandler>]> {
        self.registry.lookup(opcode)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatches one message to every handler registered for its opcode,
    /// in registration order.
    pub async fn handle(
        &self,
        session: &SessionRef,
        rpc_id: u32,
        info: &MessageInfo,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let message = info.message();

        let Some(handlers) = self.registry.lookup(info.opcode) else {
            StatCounters::bump(&self.stats.unhandled_messages);
            error!(
                "❌ Message {} (opcode {}) has no handler",
                message.type_name(),
                info.opcode
            );
            return outcome;
        };

        StatCounters::bump(&self.stats.messages_dispatched);
        debug!(
            "📤 Dispatching {} (opcode {}, rpc {}) to {} handlers",
            message.type_name(),
            info.opcode,
            rpc_id,
            handlers.len()
        );

        for handler in handlers {
            outcome.invoked += 1;
            StatCounters::bump(&self.stats.handler_invocations);

            if let Err(e) = self.invoke(handler.as_ref(), session, rpc_id, message).await {
                outcome.failed += 1;
                StatCounters::bump(&self.stats.handler_failures);
                error!(
                    session = %session.id(),
                    rpc_id,
                    "❌ Handler {} failed on {} (opcode {}): {:?}",
                    handler.handler_name(),
                    message.type_name(),
                    info.opcode,
                    e
                );
            }
        }

        outcome
    }

    async fn invoke(
        &self,
        handler: &dyn MessageHandler,
        session: &SessionRef,
        rpc_id: u32,
        message: &dyn Message,
    ) -> Result<(), HandlerError> {
        let guarded = contain_panics(|| handler.handle(session, rpc_id, message));

        match self.config.handler_timeout() {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .unwrap_or(Err(HandlerError::TimedOut(limit))),
            None => guarded.await,
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        self.stats.snapshot()
    }

    /// Releases every handler. Later loads are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.registry.clear();
        self.disposed = true;
        debug!("Message dispatcher disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl LegacyRegistry for MessageDispatcher {
    fn register_handler(&mut self, opcode: Opcode, handler: Arc<dyn MessageHandler>) {
        self.register(opcode, handler);
    }
}

/// Runs `start` and the future it returns under one unwind boundary, so a
/// panic while building the future is contained as well as one while polling.
async fn contain_panics<F, Fut>(start: F) -> Result<(), HandlerError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    AssertUnwindSafe(async move { start().await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic))))
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HandlerCatalog, HandlerDescriptor};
    use crate::handler::handler_fn;
    use crate::message::MessageType;
    use crate::opcode_types::OpcodeTypeRegistry;
    use crate::session::LoopbackSession;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug)]
    struct PingMsg;

    #[derive(Debug)]
    struct ChatMsg;

    #[derive(Debug)]
    struct UnknownMsg;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    fn recording(name: &'static str, log: &CallLog) -> Arc<dyn MessageHandler> {
        let log = log.clone();
        handler_fn(name, move |_session, _rpc_id, _msg: &PingMsg| {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    fn failing(name: &'static str, log: &CallLog) -> Arc<dyn MessageHandler> {
        let log = log.clone();
        handler_fn(name, move |_session, _rpc_id, _msg: &PingMsg| {
            log.lock().unwrap().push(name);
            Err(HandlerError::Execution("boom".to_string()))
        })
    }

    fn opcodes() -> OpcodeTypeRegistry {
        let mut opcodes = OpcodeTypeRegistry::new();
        opcodes.register::<PingMsg>(Opcode::from_const(1001)).unwrap();
        opcodes.register::<ChatMsg>(Opcode::from_const(1002)).unwrap();
        opcodes
    }

    fn session() -> SessionRef {
        LoopbackSession::shared()
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_siblings() {
        let log: CallLog = Arc::default();
        let opcode = Opcode::from_const(3003);
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(opcode, failing("a", &log));
        dispatcher.register(opcode, recording("b", &log));

        let outcome = dispatcher
            .handle(&session(), 1, &MessageInfo::new(opcode, PingMsg))
            .await;

        assert_eq!(outcome, DispatchOutcome { invoked: 2, failed: 1 });
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(dispatcher.stats().handler_failures, 1);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let log: CallLog = Arc::default();
        let opcode = Opcode::from_const(3003);
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(
            opcode,
            handler_fn("panics", |_session, _rpc_id, _msg: &PingMsg| {
                panic!("handler exploded")
            }),
        );
        dispatcher.register(opcode, recording("after", &log));

        let outcome = dispatcher
            .handle(&session(), 1, &MessageInfo::new(opcode, PingMsg))
            .await;

        assert_eq!(outcome, DispatchOutcome { invoked: 2, failed: 1 });
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_panic_while_creating_handler_future_is_contained() {
        let result = contain_panics(|| -> std::future::Ready<Result<(), HandlerError>> {
            panic!("failed before the first poll")
        })
        .await;

        match result {
            Err(HandlerError::Panicked(message)) => {
                assert_eq!(message, "failed before the first poll")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unhandled_opcode_is_a_no_op() {
        let dispatcher = MessageDispatcher::new();
        let outcome = dispatcher
            .handle(
                &session(),
                9,
                &MessageInfo::new(Opcode::from_const(2002), UnknownMsg),
            )
            .await;

        assert!(!outcome.was_handled());
        let stats = dispatcher.stats();
        assert_eq!(stats.unhandled_messages, 1);
        assert_eq!(stats.messages_dispatched, 0);
    }

    #[test]
    fn test_load_replaces_previous_registrations() {
        let log: CallLog = Arc::default();
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(Opcode::from_const(42), recording("manual", &log));

        let catalog = HandlerCatalog::new().with(HandlerDescriptor::new("ping", {
            let log = log.clone();
            move || Ok(recording_handler(&log))
        }));
        let report = dispatcher.load(&catalog, &opcodes(), None);

        assert_eq!(report.registered, 1);
        assert!(dispatcher.handlers(Opcode::from_const(42)).is_none());
        assert_eq!(
            dispatcher.handlers(Opcode::from_const(1001)).map(<[_]>::len),
            Some(1)
        );

        let report = dispatcher.load(&catalog, &opcodes(), None);
        assert_eq!(report.registered, 1);
        assert_eq!(dispatcher.registry().handler_count(), 1);
    }

    fn recording_handler(log: &CallLog) -> PingRecorder {
        PingRecorder { log: log.clone() }
    }

    struct PingRecorder {
        log: CallLog,
    }

    #[async_trait::async_trait]
    impl MessageHandler for PingRecorder {
        fn message_type(&self) -> MessageType {
            MessageType::of::<PingMsg>()
        }

        async fn handle(
            &self,
            _session: &SessionRef,
            _rpc_id: u32,
            _message: &dyn Message,
        ) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push("recorder");
            Ok(())
        }
    }

    #[test]
    fn test_load_report_counts_each_outcome() {
        let catalog = HandlerCatalog::new()
            .with(HandlerDescriptor::new("ping", || {
                Ok(PingRecorder { log: Arc::default() })
            }))
            .with(
                HandlerDescriptor::new("not-a-handler", || {
                    Ok(PingRecorder { log: Arc::default() })
                })
                .untagged(),
            )
            .with(HandlerDescriptor::new("broken", || -> Result<PingRecorder, _> {
                Err(InstantiateError::failed("broken", "no database"))
            }))
            .with(HandlerDescriptor::new("unknown", || {
                Ok(TypedUnknown)
            }));

        let mut dispatcher = MessageDispatcher::new();
        let report = dispatcher.load(&catalog, &opcodes(), None);

        assert_eq!(
            report,
            LoadReport {
                candidates: 4,
                skipped_untagged: 1,
                instantiation_failures: 1,
                registered: 1,
                unresolved: 1,
                bridged: 0,
            }
        );
    }

    struct TypedUnknown;

    #[async_trait::async_trait]
    impl MessageHandler for TypedUnknown {
        fn message_type(&self) -> MessageType {
            MessageType::of::<UnknownMsg>()
        }

        async fn handle(
            &self,
            _session: &SessionRef,
            _rpc_id: u32,
            _message: &dyn Message,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct PanickyDefault;

    impl Default for PanickyDefault {
        fn default() -> Self {
            panic!("constructor exploded")
        }
    }

    #[async_trait::async_trait]
    impl MessageHandler for PanickyDefault {
        fn message_type(&self) -> MessageType {
            MessageType::of::<PingMsg>()
        }

        async fn handle(
            &self,
            _session: &SessionRef,
            _rpc_id: u32,
            _message: &dyn Message,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_panicking_factory_counts_as_instantiation_failure() {
        let catalog = HandlerCatalog::new()
            .with(HandlerDescriptor::new("first", || {
                Ok(PingRecorder { log: Arc::default() })
            }))
            .with(HandlerDescriptor::of::<PanickyDefault>())
            .with(HandlerDescriptor::new("last", || {
                Ok(PingRecorder { log: Arc::default() })
            }));

        let mut dispatcher = MessageDispatcher::new();
        let report = dispatcher.load(&catalog, &opcodes(), None);

        assert_eq!(report.candidates, 3);
        assert_eq!(report.instantiation_failures, 1);
        assert_eq!(report.registered, 2);
        assert_eq!(
            dispatcher.handlers(Opcode::from_const(1001)).map(<[_]>::len),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_timeout_marks_hung_handler_failed() {
        let log: CallLog = Arc::default();
        let opcode = Opcode::from_const(1001);
        let mut dispatcher = MessageDispatcher::with_config(DispatcherConfig {
            handler_timeout_ms: Some(20),
            ..Default::default()
        });
        dispatcher.register(opcode, Arc::new(Sleeper));
        dispatcher.register(opcode, recording("next", &log));

        let outcome = dispatcher
            .handle(&session(), 1, &MessageInfo::new(opcode, PingMsg))
            .await;

        assert_eq!(outcome, DispatchOutcome { invoked: 2, failed: 1 });
        assert_eq!(*log.lock().unwrap(), vec!["next"]);
    }

    struct Sleeper;

    #[async_trait::async_trait]
    impl MessageHandler for Sleeper {
        fn message_type(&self) -> MessageType {
            MessageType::of::<PingMsg>()
        }

        async fn handle(
            &self,
            _session: &SessionRef,
            _rpc_id: u32,
            _message: &dyn Message,
        ) -> Result<(), HandlerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[test]
    fn test_dispose_is_idempotent_and_blocks_reload() {
        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(
            Opcode::from_const(1001),
            Arc::new(PingRecorder { log: Arc::default() }),
        );

        dispatcher.dispose();
        dispatcher.dispose();
        assert!(dispatcher.is_disposed());
        assert!(dispatcher.registry().is_empty());

        let catalog = HandlerCatalog::new().with(HandlerDescriptor::new("ping", || {
            Ok(PingRecorder { log: Arc::default() })
        }));
        let report = dispatcher.load(&catalog, &opcodes(), None);
        assert_eq!(report, LoadReport::default());
        assert!(dispatcher.registry().is_empty());
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(5u8)), "non-string panic payload");
    }
}
