//! Reference host for the message dispatcher.
//!
//! Wires a [`MessageDispatcher`] to the demo handler catalog, mirrors the
//! handlers into a second dispatcher acting as the legacy layer, and replays
//! scripted session traffic across a number of reload cycles.

pub mod cli;
pub mod config;
pub mod demo;
pub mod logging;

use crate::config::AppConfig;
use anyhow::Result;
use message_dispatch::{
    DispatchOutcome, LegacyBridge, LoopbackSession, MessageDispatcher, MessageInfo,
    OpcodeTypeRegistry, SessionRef,
};
use tracing::info;

/// Totals for one host run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u32,
    pub messages: u64,
    pub unhandled: u64,
    pub handler_failures: u64,
    pub legacy_messages: u64,
    pub replies: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: DispatchOutcome) {
        self.messages += 1;
        if !outcome.was_handled() {
            self.unhandled += 1;
        }
        self.handler_failures += outcome.failed as u64;
    }
}

fn load_handlers(
    config: &AppConfig,
    dispatcher: &mut MessageDispatcher,
    legacy: &mut MessageDispatcher,
    primary: &OpcodeTypeRegistry,
    legacy_opcodes: &OpcodeTypeRegistry,
) {
    let catalog = demo::demo_catalog();
    // The legacy layer only holds proxies for our handlers, so it is rebuilt
    // alongside the primary table.
    legacy.clear();
    let bridge = if config.demo.bridge_legacy {
        Some(LegacyBridge::new(legacy, legacy_opcodes))
    } else {
        None
    };
    dispatcher.load(&catalog, primary, bridge);
}

async fn replay(
    dispatcher: &MessageDispatcher,
    session: &SessionRef,
    traffic: &[MessageInfo],
    next_rpc_id: &mut u32,
    summary: &mut RunSummary,
) {
    for info in traffic {
        *next_rpc_id += 1;
        let outcome = dispatcher.handle(session, *next_rpc_id, info).await;
        summary.record(outcome);
    }
}

/// Runs the scripted demo: initial load, then `reload_cycles` reloads, with
/// the demo traffic replayed after each load.
pub async fn run(config: &AppConfig) -> Result<RunSummary> {
    let primary = demo::primary_opcodes()?;
    let legacy_opcodes = demo::legacy_opcodes()?;

    let mut dispatcher = MessageDispatcher::with_config(config.dispatcher.clone());
    let mut legacy = MessageDispatcher::with_config(config.dispatcher.clone());

    if let Some(limit) = dispatcher.config().handler_timeout() {
        info!("⏱️ Handler timeout set to {:?}", limit);
    }

    let session = LoopbackSession::shared();
    let session_ref: SessionRef = session.clone();
    let mut summary = RunSummary::default();
    let mut next_rpc_id = 0;

    for cycle in 0..=config.demo.reload_cycles {
        if cycle > 0 {
            info!("🔄 Reloading message handlers (cycle {})", cycle);
        }
        load_handlers(
            config,
            &mut dispatcher,
            &mut legacy,
            &primary,
            &legacy_opcodes,
        );

        replay(
            &dispatcher,
            &session_ref,
            &demo::demo_traffic(cycle),
            &mut next_rpc_id,
            &mut summary,
        )
        .await;

        let mut legacy_summary = RunSummary::default();
        replay(
            &legacy,
            &session_ref,
            &demo::legacy_traffic(),
            &mut next_rpc_id,
            &mut legacy_summary,
        )
        .await;
        summary.legacy_messages += legacy_summary.messages;
        summary.unhandled += legacy_summary.unhandled;
        summary.handler_failures += legacy_summary.handler_failures;

        summary.cycles += 1;
    }

    summary.replies = session.replies().await.len();
    dispatcher.dispose();
    legacy.dispose();

    info!(
        "✅ Dispatched {} messages ({} legacy) over {} cycles: {} unhandled, {} handler failures, {} replies",
        summary.messages + summary.legacy_messages,
        summary.legacy_messages,
        summary.cycles,
        summary.unhandled,
        summary.handler_failures,
        summary.replies
    );
    Ok(summary)
}
