//! Opcode-keyed message dispatch.
//!
//! Incoming session messages carry a numeric [`Opcode`] and a decoded
//! payload. The [`MessageDispatcher`] keeps an opcode to handler-list table,
//! rebuilt on every load from a [`HandlerSource`], and routes each message to
//! every handler registered for its opcode. A failing handler is logged and
//! skipped; it never stops its siblings and never reaches the caller.
//!
//! ```ignore
//! let mut opcodes = OpcodeTypeRegistry::new();
//! opcodes.register::<PingRequest>(Opcode::from_const(1001))?;
//!
//! let catalog = handler_catalog![PingHandler];
//! let dispatcher = MessageDispatcher::awake(DispatcherConfig::default(), &catalog, &opcodes, None);
//!
//! dispatcher
//!     .handle(&session, rpc_id, &MessageInfo::new(Opcode::from_const(1001), PingRequest::default()))
//!     .await;
//! ```

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod opcode;
pub mod opcode_types;
pub mod registry;
pub mod session;

pub use bridge::{LegacyBridge, LegacyRegistry, MessageProxy};
pub use catalog::{HandlerCatalog, HandlerDescriptor, HandlerFactory, HandlerSource};
pub use config::DispatcherConfig;
pub use dispatcher::{DispatchOutcome, DispatcherStats, LoadReport, MessageDispatcher};
pub use error::{HandlerError, InstantiateError, RegistryError, SessionError};
pub use handler::{handler_fn, MessageHandler, TypedMessageHandler};
pub use message::{Message, MessageInfo, MessageType};
pub use opcode::Opcode;
pub use opcode_types::{OpcodeResolver, OpcodeTypeRegistry};
pub use registry::HandlerRegistry;
pub use session::{LoopbackSession, Reply, Session, SessionId, SessionRef};
