//! Opcode to handler-list mapping.

use crate::handler::MessageHandler;
use crate::opcode::Opcode;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handlers keyed by opcode, in registration order.
///
/// Lists are only ever created by an append, so every stored list is
/// non-empty. Registering the same handler twice yields two entries.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Opcode, Vec<Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn register(&mut self, opcode: Opcode, handler: Arc<dyn MessageHandler>) {
        self.handlers.entry(opcode).or_default().push(handler);
    }

    pub fn lookup(&self, opcode: Opcode) -> Option<&[Arc<dyn MessageHandler>]> {
        self.handlers.get(&opcode).map(Vec::as_slice)
    }

    /// Number of distinct opcodes with at least one handler.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn opcodes(&self) -> impl Iterator<Item = Opcode> + '_ {
        self.handlers.keys().copied()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (opcode, handlers) in &self.handlers {
            let names: Vec<&str> = handlers.iter().map(|h| h.handler_name()).collect();
            map.entry(opcode, &names);
        }
        map.finish()
    }
}
