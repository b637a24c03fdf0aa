//! # Factory registry loop.
//!
//! The registry is the single owner of every map a factory needs: topic
//! slots (subscribers, gate links and held events) and gate accumulators. It
//! runs as one task draining one command queue, so concurrent callers never
//! observe a half-applied mutation and no lock is involved.
//!
//! ## Architecture
//! ```text
//! Factory / RegisteredTopic / GateCollector / clocks / requeue timers
//!         │  (mpsc::UnboundedSender<Command>)
//!         ▼
//! Registry::run()
//!     ├─► Register ───────────────► insert slot, reply
//!     ├─► RegisterGate ───────────► insert slot + GateState, link local sources, reply
//!     ├─► Subscribe ──────────────► push subscriber, flush held events
//!     ├─► Route(name, event, n) ──► slot found?  ─► dispatch
//!     │                             └─ missing   ─► sleep(backoff(n)) → Route(n + 1)
//!     ├─► Deliver (clock tick) ───► dispatch if the slot still exists
//!     ├─► Collect(gate, src, ev) ─► GateState::collect → dispatch joined
//!     ├─► Unregister ─────────────► remove slot and its gate links, cancel its token
//!     ├─► List ───────────────────► sorted names
//!     └─► Shutdown ───────────────► cancel every token, clear, exit
//!
//! dispatch(name, event):
//!     fan_out to subscribers
//!     for gate in slot.gates: GateState::collect ─► Some(joined) ─► dispatch(gate, joined)
//! ```
//!
//! ## Rules
//! - Only `run()` reads or writes the maps.
//! - Delivery is `fan_out`: the loop never awaits a subscriber.
//! - Gates fed by topics of the same factory collect inside the loop, in
//!   command order. Standalone sources report through `Command::Collect`.
//! - A slot with no subscriber and no gate link holds published events until
//!   a consumer attaches, up to `Config::max_held` (ticks are not held).
//! - Events for unknown names are requeued with backoff and dropped with a
//!   warning once `Config::max_requeues` is spent.
//! - Requeue timers and clocks hold weak senders; they never keep the loop alive.

use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::{self, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::gate::{GateMode, GateState, gate_name};
use crate::error::Error;
use crate::events::{Event, Tick};
use crate::subscribers::{SubscriberRef, fan_out};
use crate::topics::{SlotAddr, instant_after};

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// What a registered name stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Topic,
    Ticker(Duration),
    Gate,
}

/// Reply to a successful registration.
pub(crate) struct Registration {
    pub(crate) name: Arc<str>,
    pub(crate) addr: SlotAddr,
    pub(crate) closed: CancellationToken,
}

/// One input of a gate. `slot` is set when the source lives in the same
/// registry; such sources are linked in the loop instead of subscribed.
#[derive(Clone, Debug)]
pub(crate) struct GateSource {
    pub(crate) name: Arc<str>,
    pub(crate) slot: Option<u64>,
}

type Reply<T> = oneshot::Sender<Result<T, Error>>;

pub(crate) enum Command {
    Register {
        name: Arc<str>,
        kind: Kind,
        subscribers: Vec<SubscriberRef>,
        reply: Reply<Registration>,
    },
    RegisterGate {
        mode: GateMode,
        sources: Vec<GateSource>,
        subscribers: Vec<SubscriberRef>,
        reply: Reply<Registration>,
    },
    Subscribe {
        name: Arc<str>,
        id: u64,
        subscriber: SubscriberRef,
        done: oneshot::Sender<()>,
    },
    Unregister {
        name: Arc<str>,
        id: u64,
    },
    Route {
        name: Arc<str>,
        event: Event,
        attempt: u32,
    },
    Deliver {
        name: Arc<str>,
        id: u64,
        event: Event,
    },
    Collect {
        gate: Arc<str>,
        source: Arc<str>,
        event: Event,
    },
    List {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct Slot {
    id: u64,
    kind: Kind,
    closed: CancellationToken,
    subscribers: Vec<SubscriberRef>,
    gates: Vec<Arc<str>>,
    held: VecDeque<Event>,
}

impl Slot {
    fn attach(&mut self, name: &Arc<str>, subscriber: SubscriberRef) {
        self.subscribers.push(subscriber);
        while let Some(ev) = self.held.pop_front() {
            fan_out(name, &self.subscribers, &ev);
        }
    }

    fn hold(&mut self, name: &Arc<str>, event: Event, cap: usize) {
        if matches!(self.kind, Kind::Ticker(_)) {
            return;
        }
        self.held.push_back(event);
        while self.held.len() > cap {
            if let Some(dropped) = self.held.pop_front() {
                warn!(topic = %name, cap, payload = dropped.type_name(), "held event dropped");
            }
        }
    }
}

pub(crate) struct Registry {
    cfg: Config,
    serial: u64,
    me: WeakUnboundedSender<Command>,
    slots: HashMap<Arc<str>, Slot>,
    gates: HashMap<Arc<str>, GateState>,
    next_id: u64,
    next_gate: u64,
}

impl Registry {
    /// Spawns the loop and returns the queue that feeds it, along with the
    /// registry serial stamped on every [`SlotAddr`] it hands out.
    pub(crate) fn spawn(cfg: Config) -> (mpsc::UnboundedSender<Command>, u64) {
        let (tx, rx) = mpsc::unbounded_channel();
        let serial = NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed);
        let registry = Registry {
            cfg,
            serial,
            me: tx.downgrade(),
            slots: HashMap::new(),
            gates: HashMap::new(),
            next_id: 0,
            next_gate: 0,
        };
        tokio::spawn(registry.run(rx));
        (tx, serial)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!(registry = self.serial, "factory loop started");
        while let Some(cmd) = rx.recv().await {
            if self.handle(cmd).is_break() {
                break;
            }
        }
        self.shutdown();
        debug!(registry = self.serial, "factory loop exited");
    }

    fn handle(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Register {
                name,
                kind,
                subscribers,
                reply,
            } => {
                let _ = reply.send(self.register(name, kind, subscribers));
            }
            Command::RegisterGate {
                mode,
                sources,
                subscribers,
                reply,
            } => {
                let _ = reply.send(self.register_gate(mode, &sources, subscribers));
            }
            Command::Subscribe {
                name,
                id,
                subscriber,
                done,
            } => match self.slots.get_mut(&name) {
                Some(slot) if slot.id == id => {
                    debug!(topic = %name, subscriber = subscriber.name(), "subscriber added");
                    slot.attach(&name, subscriber);
                    let _ = done.send(());
                }
                _ => debug!(topic = %name, "subscribe for unregistered topic dropped"),
            },
            Command::Unregister { name, id } => self.unregister(&name, id),
            Command::Route {
                name,
                event,
                attempt,
            } => {
                if self.slots.contains_key(&name) {
                    self.dispatch(name, event);
                } else {
                    self.requeue(name, event, attempt);
                }
            }
            Command::Deliver { name, id, event } => {
                if self.slots.get(&name).is_some_and(|s| s.id == id) {
                    self.dispatch(name, event);
                }
            }
            Command::Collect {
                gate,
                source,
                event,
            } => self.collect(gate, &source, event),
            Command::List { reply } => {
                let mut names: Vec<String> = self.slots.keys().map(|k| k.to_string()).collect();
                names.sort_unstable();
                let _ = reply.send(names);
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn register(
        &mut self,
        name: Arc<str>,
        kind: Kind,
        subscribers: Vec<SubscriberRef>,
    ) -> Result<Registration, Error> {
        if self.slots.contains_key(&name) {
            return Err(Error::DuplicateTopic {
                topic: name.to_string(),
            });
        }

        self.next_id += 1;
        let id = self.next_id;
        let closed = CancellationToken::new();
        if let Kind::Ticker(interval) = kind {
            self.spawn_clock(Arc::clone(&name), id, interval, closed.clone());
        }

        debug!(topic = %name, ?kind, subscribers = subscribers.len(), "topic registered");
        self.slots.insert(
            Arc::clone(&name),
            Slot {
                id,
                kind,
                closed: closed.clone(),
                subscribers,
                gates: Vec::new(),
                held: VecDeque::new(),
            },
        );
        let addr = SlotAddr {
            registry: self.serial,
            id,
        };
        Ok(Registration { name, addr, closed })
    }

    /// Registers the gate output and links every local source in one step.
    ///
    /// Events a local source was holding for its first consumer go to the
    /// gate, as they would to a first subscriber.
    fn register_gate(
        &mut self,
        mode: GateMode,
        sources: &[GateSource],
        subscribers: Vec<SubscriberRef>,
    ) -> Result<Registration, Error> {
        for source in sources {
            if let Some(id) = source.slot {
                if !self.slots.get(&source.name).is_some_and(|s| s.id == id) {
                    return Err(Error::missing(format!(
                        "gate source {:?} is closed",
                        &*source.name
                    )));
                }
            }
        }

        self.next_gate += 1;
        let names: Vec<Arc<str>> = sources.iter().map(|s| Arc::clone(&s.name)).collect();
        let name: Arc<str> = Arc::from(gate_name(self.next_gate, mode, &names));
        let registration = self.register(Arc::clone(&name), Kind::Gate, subscribers)?;
        self.gates
            .insert(Arc::clone(&name), GateState::new(mode, sources.len()));

        let mut backlog = Vec::new();
        for source in sources.iter().filter(|s| s.slot.is_some()) {
            if let Some(slot) = self.slots.get_mut(&source.name) {
                slot.gates.push(Arc::clone(&name));
                backlog.extend(slot.held.drain(..).map(|ev| (Arc::clone(&source.name), ev)));
            }
        }
        for (source, ev) in backlog {
            self.dispatch(source, ev);
        }
        Ok(registration)
    }

    fn unregister(&mut self, name: &Arc<str>, id: u64) {
        if !self.slots.get(name).is_some_and(|s| s.id == id) {
            return;
        }
        if let Some(slot) = self.slots.remove(name) {
            slot.closed.cancel();
            if self.gates.remove(name).is_some() {
                for other in self.slots.values_mut() {
                    other.gates.retain(|g| g != name);
                }
            }
            debug!(topic = %name, dropped = slot.held.len(), "topic unregistered");
        }
    }

    /// Delivers `event` on `name` and feeds every gate linked to it. Gate
    /// flushes are delivered the same way, breadth first.
    fn dispatch(&mut self, name: Arc<str>, event: Event) {
        let mut pending = VecDeque::from([(name, event)]);
        while let Some((name, event)) = pending.pop_front() {
            let Some(slot) = self.slots.get_mut(&name) else {
                continue;
            };
            if !slot.subscribers.is_empty() {
                fan_out(&name, &slot.subscribers, &event);
            } else if slot.gates.is_empty() {
                slot.hold(&name, event, self.cfg.max_held);
                continue;
            }
            for gate in &slot.gates {
                let flushed = self
                    .gates
                    .get_mut(gate)
                    .and_then(|state| state.collect(&name, event.clone()));
                if let Some(joined) = flushed {
                    pending.push_back((Arc::clone(gate), Event::new(joined)));
                }
            }
        }
    }

    fn collect(&mut self, gate: Arc<str>, source: &str, event: Event) {
        let Some(state) = self.gates.get_mut(&gate) else {
            debug!(gate = %gate, source, "report for closed gate ignored");
            return;
        };
        if let Some(joined) = state.collect(source, event) {
            self.dispatch(gate, Event::new(joined));
        }
    }

    fn requeue(&self, name: Arc<str>, event: Event, attempt: u32) {
        let Some(delay) = self.cfg.requeue_delay(attempt) else {
            warn!(
                topic = %name,
                attempts = attempt,
                payload = event.type_name(),
                "undeliverable event dropped"
            );
            return;
        };

        debug!(topic = %name, attempt, ?delay, "topic not registered; requeue scheduled");
        let me = self.me.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            if let Some(tx) = me.upgrade() {
                let _ = tx.send(Command::Route {
                    name,
                    event,
                    attempt: attempt + 1,
                });
            }
        });
    }

    fn spawn_clock(&self, name: Arc<str>, id: u64, interval: Duration, closed: CancellationToken) {
        let me = self.me.clone();
        tokio::spawn(async move {
            let mut ticks = time::interval_at(instant_after(interval), interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut seq: u64 = 0;
            loop {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    _ = ticks.tick() => {
                        seq += 1;
                        let event = Event::new(Tick {
                            topic: Arc::clone(&name),
                            at: SystemTime::now(),
                            seq,
                        });
                        let Some(tx) = me.upgrade() else { break };
                        let deliver = Command::Deliver { name: Arc::clone(&name), id, event };
                        if tx.send(deliver).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn shutdown(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        for (name, slot) in self.slots.drain() {
            slot.closed.cancel();
            debug!(topic = %name, "topic unregistered on shutdown");
        }
        self.gates.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::testing::channel;

    fn registry(cfg: Config) -> Registry {
        let (tx, _rx) = mpsc::unbounded_channel();
        Registry {
            cfg,
            serial: 0,
            me: tx.downgrade(),
            slots: HashMap::new(),
            gates: HashMap::new(),
            next_id: 0,
            next_gate: 0,
        }
    }

    fn local(reg: &Registry, name: &str) -> GateSource {
        GateSource {
            name: Arc::from(name),
            slot: reg.slots.get(name).map(|s| s.id),
        }
    }

    fn route(reg: &mut Registry, name: &str, value: u32) {
        let _ = reg.handle(Command::Route {
            name: Arc::from(name),
            event: Event::new(value),
            attempt: 0,
        });
    }

    #[tokio::test]
    async fn gate_with_a_vanished_source_is_not_registered() {
        let mut reg = registry(Config::default());
        reg.register(Arc::from("t1"), Kind::Topic, Vec::new()).unwrap();
        let sources = vec![
            local(&reg, "t1"),
            GateSource {
                name: Arc::from("ghost"),
                slot: Some(99),
            },
        ];

        let err = reg
            .register_gate(GateMode::And, &sources, Vec::new())
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "topic_missing");
        assert_eq!(reg.slots.len(), 1);
        assert!(reg.gates.is_empty());
        assert!(reg.slots["t1"].gates.is_empty());
    }

    #[tokio::test]
    async fn local_sources_feed_the_gate_in_command_order() {
        let mut reg = registry(Config::default());
        reg.register(Arc::from("t1"), Kind::Topic, Vec::new()).unwrap();
        reg.register(Arc::from("t2"), Kind::Topic, Vec::new()).unwrap();
        let (sub, mut rx) = channel("sink");
        let sources = vec![local(&reg, "t1"), local(&reg, "t2")];
        reg.register_gate(GateMode::And, &sources, vec![sub]).unwrap();

        for i in 0..100 {
            route(&mut reg, "t1", i);
        }
        route(&mut reg, "t2", 100);

        let ev = rx.recv().await.unwrap();
        let joined = ev.as_joined().unwrap();
        let t1: Vec<u32> = joined["t1"].iter().map(|e| *e.downcast_ref::<u32>().unwrap()).collect();
        assert_eq!(t1, (0..100).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn held_events_flow_into_a_new_gate() {
        let mut reg = registry(Config::default());
        reg.register(Arc::from("t1"), Kind::Topic, Vec::new()).unwrap();
        reg.register(Arc::from("t2"), Kind::Topic, Vec::new()).unwrap();
        route(&mut reg, "t1", 1);
        assert_eq!(reg.slots["t1"].held.len(), 1);

        let (sub, mut rx) = channel("sink");
        let sources = vec![local(&reg, "t1"), local(&reg, "t2")];
        reg.register_gate(GateMode::And, &sources, vec![sub]).unwrap();
        assert!(reg.slots["t1"].held.is_empty());

        route(&mut reg, "t2", 2);
        let ev = rx.recv().await.unwrap();
        let joined = ev.as_joined().unwrap();
        assert_eq!(joined["t1"][0].downcast_ref::<u32>(), Some(&1));
        assert_eq!(joined["t2"][0].downcast_ref::<u32>(), Some(&2));
    }

    #[tokio::test]
    async fn closing_a_gate_unlinks_its_sources() {
        let mut reg = registry(Config::default());
        reg.register(Arc::from("t1"), Kind::Topic, Vec::new()).unwrap();
        let sources = vec![local(&reg, "t1")];
        let gate = reg.register_gate(GateMode::Or, &sources, Vec::new()).unwrap();
        assert_eq!(reg.slots["t1"].gates.len(), 1);

        let _ = reg.handle(Command::Unregister {
            name: Arc::clone(&gate.name),
            id: gate.addr.id,
        });
        assert!(gate.closed.is_cancelled());
        assert!(reg.slots["t1"].gates.is_empty());

        route(&mut reg, "t1", 7);
        assert_eq!(reg.slots["t1"].held.len(), 1);
    }

    #[tokio::test]
    async fn held_events_are_capped() {
        let mut reg = registry(Config {
            max_held: 2,
            ..Config::default()
        });
        reg.register(Arc::from("quiet"), Kind::Topic, Vec::new()).unwrap();
        for i in 0..5 {
            route(&mut reg, "quiet", i);
        }

        let held: Vec<u32> = reg.slots["quiet"]
            .held
            .iter()
            .map(|e| *e.downcast_ref::<u32>().unwrap())
            .collect();
        assert_eq!(held, [3, 4]);
    }
}
