//! # Clock-driven topics.
//!
//! A [`TimerTopic`] publishes on its own when its clock elapses. Publishing
//! to it does not deliver anything: it resets the clock.
//!
//! Two flavours:
//! - [`TimerTopic::ticker`] emits a [`Tick`] every `interval` of silence;
//! - [`TimerTopic::deadline`] shadows a source topic and emits a
//!   [`TimedOut`] whenever the source stays quiet for `after`.
//!
//! ## Architecture
//! ```text
//!                ┌── Command::Subscribe ──► subscribers.push (first one arms the clock)
//! run() select! ─┼── Command::Publish ────► deadline = now + interval
//!                ├── sleep elapsed ───────► fan_out(Tick | TimedOut), re-arm
//!                └── closed.cancelled() ──► exit
//!
//! deadline(source): source ── event ──► reset subscriber ──► Command::Publish
//! ```
//!
//! ## Rules
//! - The clock starts with the first subscriber; resets before that are ignored.
//! - After firing the clock re-arms, so a silent source keeps producing
//!   `TimedOut` once per window.
//! - Intervals are clamped to `[1ms, 30 years]`; deadlines past the end of
//!   the clock saturate instead of overflowing.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;
use crate::events::{Event, Tick, TimedOut};
use crate::subscribers::{SubscriberFn, SubscriberRef, fan_out};
use crate::topics::mailbox::{Command, Mailbox};
use crate::topics::{Publisher, Subscribed, Topic, TopicRef};

const MIN_INTERVAL: Duration = Duration::from_millis(1);
const MAX_INTERVAL: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Raises tiny intervals to 1ms and caps huge ones at roughly 30 years.
pub(crate) fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

/// `now + after`, saturating at a far-future instant.
pub(crate) fn instant_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or_else(|| now + MAX_INTERVAL)
}

#[derive(Clone)]
enum Mode {
    Ticker,
    Deadline { source: Arc<str> },
}

/// Topic published by a resettable clock.
pub struct TimerTopic {
    mailbox: Mailbox<Command>,
    interval: Duration,
}

impl TimerTopic {
    /// Creates a topic that emits a [`Tick`] every `interval`.
    pub fn ticker(name: impl Into<Arc<str>>, interval: Duration) -> Arc<Self> {
        Self::spawn(name.into(), interval, Mode::Ticker)
    }

    /// Creates a topic that emits [`TimedOut`] whenever `source` publishes
    /// nothing for `after`.
    ///
    /// # Errors
    /// - [`Error::MissingTopic`] if `source` is already closed.
    /// - [`Error::ClosedTopic`] if `source` closes while being wired.
    pub fn deadline(
        name: impl Into<Arc<str>>,
        source: &TopicRef,
        after: Duration,
    ) -> Result<Arc<Self>, Error> {
        if source.is_closed() {
            return Err(Error::missing(format!(
                "timeout source {:?} is closed",
                source.name()
            )));
        }
        let timer = Self::spawn(
            name.into(),
            after,
            Mode::Deadline {
                source: Arc::from(source.name()),
            },
        );

        let reset = timer.mailbox.clone();
        let forward: SubscriberRef =
            SubscriberFn::arc(format!("{}:reset", timer.name()), move |ev: Event| {
                let reset = reset.clone();
                async move {
                    reset.try_send(Command::Publish(ev));
                }
            });
        if let Err(e) = source.subscribe(forward) {
            timer.mailbox.close();
            return Err(e);
        }
        Ok(timer)
    }

    /// The clock period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn spawn(name: Arc<str>, interval: Duration, mode: Mode) -> Arc<Self> {
        let interval = clamp_interval(interval);
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        tokio::spawn(run(Arc::clone(&name), interval, mode, rx, closed.clone()));
        Arc::new(Self {
            mailbox: Mailbox::new(name, tx, closed),
            interval,
        })
    }
}

impl Topic for TimerTopic {
    fn name(&self) -> &str {
        self.mailbox.name()
    }

    /// Every publish resets the clock; the payload is discarded.
    fn publisher(&self) -> Publisher {
        self.mailbox.publisher()
    }

    fn subscribe(&self, subscriber: SubscriberRef) -> Result<Subscribed, Error> {
        self.mailbox.subscribe(subscriber)
    }

    fn close(&self) -> Result<(), Error> {
        self.mailbox.close();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }
}

async fn run(
    name: Arc<str>,
    interval: Duration,
    mode: Mode,
    mut rx: mpsc::UnboundedReceiver<Command>,
    closed: CancellationToken,
) {
    let mut subscribers: Vec<SubscriberRef> = Vec::new();
    let mut seq: u64 = 0;
    let clock = time::sleep(interval);
    tokio::pin!(clock);
    debug!(topic = %name, ?interval, "timer loop started");

    loop {
        tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            cmd = rx.recv() => match cmd {
                Some(Command::Subscribe { subscriber, done }) => {
                    if subscribers.is_empty() {
                        clock.as_mut().reset(instant_after(interval));
                    }
                    debug!(topic = %name, subscriber = subscriber.name(), "subscriber added");
                    subscribers.push(subscriber);
                    let _ = done.send(());
                }
                Some(Command::Publish(_)) => {
                    if !subscribers.is_empty() {
                        clock.as_mut().reset(instant_after(interval));
                    }
                }
                None => break,
            },
            _ = &mut clock, if !subscribers.is_empty() => {
                seq += 1;
                let at = SystemTime::now();
                let ev = match &mode {
                    Mode::Ticker => Event::new(Tick { topic: Arc::clone(&name), at, seq }),
                    Mode::Deadline { source } => Event::new(TimedOut {
                        topic: Arc::clone(source),
                        after: interval,
                        at,
                    }),
                };
                fan_out(&name, &subscribers, &ev);
                clock.as_mut().reset(instant_after(interval));
            }
        }
    }

    debug!(topic = %name, fired = seq, "timer loop exited");
}

#[cfg(test)]
mod tests {
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::subscribers::testing::channel;
    use crate::topics::ActorTopic;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn ticker_emits_numbered_ticks() {
        let ticker = TimerTopic::ticker("heartbeat", Duration::from_millis(10));
        let (sub, mut rx) = channel("watch");
        ticker.subscribe(sub).unwrap().await.unwrap();

        for expected in 1..=3_u64 {
            let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            let tick = ev.downcast_ref::<Tick>().expect("tick payload");
            assert_eq!(tick.seq, expected);
            assert_eq!(&*tick.topic, "heartbeat");
        }
        ticker.close().unwrap();
    }

    #[tokio::test]
    async fn publishing_resets_the_clock() {
        let ticker = TimerTopic::ticker("reset", Duration::from_millis(60));
        let (sub, mut rx) = channel("watch");
        ticker.subscribe(sub).unwrap().await.unwrap();

        let publisher = ticker.publisher();
        for _ in 0..4 {
            sleep(Duration::from_millis(20)).await;
            publisher.publish(()).unwrap();
        }
        assert!(rx.try_recv().is_err(), "clock should have been reset");

        let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(ev.is::<Tick>());
        ticker.close().unwrap();
    }

    #[tokio::test]
    async fn deadline_fires_for_silent_source() {
        let source: TopicRef = ActorTopic::spawn("orders");
        let timer = TimerTopic::deadline("orders:timeout", &source, Duration::from_millis(20)).unwrap();
        let (sub, mut rx) = channel("watch");
        timer.subscribe(sub).unwrap().await.unwrap();

        let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        let fired = ev.downcast_ref::<TimedOut>().expect("timeout payload");
        assert_eq!(&*fired.topic, "orders");
        assert_eq!(fired.after, Duration::from_millis(20));
        timer.close().unwrap();
    }

    #[tokio::test]
    async fn deadline_rejects_closed_source() {
        let source: TopicRef = ActorTopic::spawn("gone");
        source.close().unwrap();
        let err = TimerTopic::deadline("gone:timeout", &source, Duration::from_millis(5))
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "topic_missing");
    }

    #[tokio::test]
    async fn huge_intervals_saturate_instead_of_panicking() {
        let ticker = TimerTopic::ticker("forever", Duration::MAX);
        assert!(ticker.interval() < Duration::MAX);
        let (sub, mut rx) = channel("watch");
        ticker.subscribe(sub).unwrap().await.unwrap();

        ticker.publisher().publish(()).unwrap();
        sleep(Duration::from_millis(20)).await;
        assert!(!ticker.is_closed());
        assert!(ticker.publisher().publish(()).is_ok());
        assert!(rx.try_recv().is_err());
        ticker.close().unwrap();
    }

    #[test]
    fn instants_saturate() {
        let far = instant_after(Duration::MAX);
        assert!(far > Instant::now() + Duration::from_secs(86_400));
        assert_eq!(clamp_interval(Duration::ZERO), MIN_INTERVAL);
    }

    #[tokio::test]
    async fn closed_timer_rejects_resets() {
        let ticker = TimerTopic::ticker("stop", Duration::from_millis(5));
        ticker.close().unwrap();
        assert_eq!(ticker.publisher().publish(()), Err(Error::closed("stop")));
    }
}
