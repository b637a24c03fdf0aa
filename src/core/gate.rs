//! # AND / OR gates.
//!
//! A gate joins N source topics into one output topic. The factory loop owns
//! every [`GateState`] and decides when to flush.
//!
//! Sources registered in the same factory are linked to the gate inside the
//! loop: each routed event is collected right where it is delivered, so the
//! per-source lists keep publish order. Any other source gets a
//! [`GateCollector`] subscriber that reports `(gate, source, event)` back to
//! the loop through its queue.
//!
//! ## Architecture
//! ```text
//! local source A ── Route ──► registry loop ── GateState::collect(A, ev)
//! local source B ── Route ──► registry loop ── GateState::collect(B, ev)
//! standalone C ──► GateCollector ──► Command::Collect ──► GateState::collect(C, ev)
//!                                                              │ Some(joined)
//!                                                              ▼
//!                                              deliver on gate output topic
//! ```
//!
//! ## Rules
//! - **AND** flushes once every source has at least one event since the last flush.
//! - **OR** flushes on every event.
//! - A flush hands out the whole accumulator and starts a fresh one.
//! - Reports for a closed gate are dropped silently.

use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::registry::Command;
use crate::events::{Event, Joined};
use crate::subscribers::Subscribe;

/// Join condition of a gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GateMode {
    And,
    Or,
}

impl GateMode {
    fn separator(self) -> &'static str {
        match self {
            GateMode::And => " & ",
            GateMode::Or => " | ",
        }
    }
}

/// Generates the output topic name, e.g. `gate-3: orders & fills`.
pub(crate) fn gate_name(seq: u64, mode: GateMode, sources: &[Arc<str>]) -> String {
    let joined: Vec<&str> = sources.iter().map(|s| &**s).collect();
    format!("gate-{seq}: {}", joined.join(mode.separator()))
}

/// Per-gate accumulator, owned by the registry loop.
#[derive(Debug)]
pub(crate) struct GateState {
    mode: GateMode,
    arity: usize,
    acc: Joined,
}

impl GateState {
    pub(crate) fn new(mode: GateMode, arity: usize) -> Self {
        Self {
            mode,
            arity,
            acc: Joined::new(),
        }
    }

    /// Records one event; returns the flushed snapshot when the gate fires.
    pub(crate) fn collect(&mut self, source: &str, event: Event) -> Option<Joined> {
        self.acc.entry(source.to_string()).or_default().push(event);
        let ready = match self.mode {
            GateMode::And => self.acc.len() >= self.arity,
            GateMode::Or => true,
        };
        ready.then(|| mem::take(&mut self.acc))
    }
}

/// Subscriber attached to a gate source that lives outside the factory.
pub(crate) struct GateCollector {
    gate: Arc<str>,
    source: Arc<str>,
    label: String,
    closed: CancellationToken,
    registry: WeakUnboundedSender<Command>,
}

impl GateCollector {
    pub(crate) fn arc(
        gate: Arc<str>,
        source: Arc<str>,
        closed: CancellationToken,
        registry: WeakUnboundedSender<Command>,
    ) -> Arc<Self> {
        let label = format!("{gate}<-{source}");
        Arc::new(Self {
            gate,
            source,
            label,
            closed,
            registry,
        })
    }
}

#[async_trait]
impl Subscribe for GateCollector {
    async fn on_event(&self, event: &Event) {
        if self.closed.is_cancelled() {
            return;
        }
        if let Some(tx) = self.registry.upgrade() {
            let _ = tx.send(Command::Collect {
                gate: Arc::clone(&self.gate),
                source: Arc::clone(&self.source),
                event: event.clone(),
            });
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}
