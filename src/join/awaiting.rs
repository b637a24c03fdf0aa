//! # Bounded waits across several topics.
//!
//! [`await_all`] and [`await_any`] subscribe a forwarder to each topic, then
//! race the incoming events against a deadline. The outcome is returned as
//! data: a timeout is reported in [`Awaited::error`] together with the names
//! that stayed silent. The `must_*` variants turn that timeout into an `Err`.
//!
//! ```text
//! topic A ─► forwarder ─┐
//! topic B ─► forwarder ─┼─► mpsc ─► select! { recv → record, sleep_until(deadline) → Timeout }
//! topic C ─► forwarder ─┘
//! ```
//!
//! Forwarders stay attached after the call returns (topics have no
//! unsubscribe); they go quiet once the wait is over.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::events::Event;
use crate::subscribers::{SubscriberFn, SubscriberRef};
use crate::topics::{TopicRef, ensure_usable, instant_after};

/// Result of an await: the most recent event per topic, plus the timeout if
/// the condition was not met in time.
#[derive(Debug, Clone, Default)]
pub struct Awaited {
    /// Most recent event per topic name.
    pub events: BTreeMap<String, Event>,
    /// `Some(Error::Timeout { .. })` if the deadline won.
    pub error: Option<Error>,
}

impl Awaited {
    /// Names of the topics that did not publish before the deadline.
    pub fn missing(&self) -> &[String] {
        match &self.error {
            Some(err) => err.missing_topics(),
            None => &[],
        }
    }

    /// Returns `true` if the condition was met before the deadline.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into the collected events, or the timeout.
    pub fn into_result(self) -> Result<BTreeMap<String, Event>, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.events),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Until {
    All,
    Any,
}

/// Waits until every topic has published at least once, or `timeout` elapses.
///
/// # Errors
/// [`Error::MissingTopic`] for an empty list or a closed topic, before
/// anything subscribes. A timeout is **not** an `Err`: see [`Awaited::error`].
pub async fn await_all(topics: &[TopicRef], timeout: Duration) -> Result<Awaited, Error> {
    wait(topics, timeout, Until::All).await
}

/// Waits until any topic publishes, or `timeout` elapses.
pub async fn await_any(topics: &[TopicRef], timeout: Duration) -> Result<Awaited, Error> {
    wait(topics, timeout, Until::Any).await
}

/// Like [`await_all`], but a timeout is returned as `Err(Error::Timeout)`.
pub async fn must_await_all(
    topics: &[TopicRef],
    timeout: Duration,
) -> Result<BTreeMap<String, Event>, Error> {
    await_all(topics, timeout).await?.into_result()
}

/// Like [`await_any`], but a timeout is returned as `Err(Error::Timeout)`.
pub async fn must_await_any(
    topics: &[TopicRef],
    timeout: Duration,
) -> Result<BTreeMap<String, Event>, Error> {
    await_any(topics, timeout).await?.into_result()
}

async fn wait(topics: &[TopicRef], after: Duration, until: Until) -> Result<Awaited, Error> {
    ensure_usable(topics, "await")?;
    let deadline = instant_after(after);
    let done = CancellationToken::new();
    let _stop = done.clone().drop_guard();

    let (tx, mut rx) = mpsc::unbounded_channel::<(Arc<str>, Event)>();
    let mut expected: Vec<String> = Vec::with_capacity(topics.len());
    for topic in topics {
        let name: Arc<str> = Arc::from(topic.name());
        expected.push(name.to_string());
        let _accepted = topic.subscribe(forwarder(name, tx.clone(), done.clone()))?;
    }
    drop(tx);
    expected.sort_unstable();
    expected.dedup();

    let mut events = BTreeMap::new();
    let sleep = time::sleep_until(deadline);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some((name, ev)) => {
                    events.insert(name.to_string(), ev);
                    if until == Until::Any || events.len() == expected.len() {
                        return Ok(Awaited { events, error: None });
                    }
                }
                None => break,
            },
            _ = &mut sleep => break,
        }
    }

    let missing = expected
        .into_iter()
        .filter(|name| !events.contains_key(name))
        .collect();
    Ok(Awaited {
        events,
        error: Some(Error::Timeout { after, missing }),
    })
}

fn forwarder(
    name: Arc<str>,
    tx: mpsc::UnboundedSender<(Arc<str>, Event)>,
    done: CancellationToken,
) -> SubscriberRef {
    SubscriberFn::arc(format!("await:{name}"), move |ev: Event| {
        let name = Arc::clone(&name);
        let tx = tx.clone();
        let done = done.clone();
        async move {
            if !done.is_cancelled() {
                let _ = tx.send((name, ev));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::topics::ActorTopic;

    fn topics(names: &[&'static str]) -> Vec<TopicRef> {
        names
            .iter()
            .map(|n| -> TopicRef { ActorTopic::spawn(*n) })
            .collect()
    }

    #[tokio::test]
    async fn all_returns_once_every_topic_published() {
        let ts = topics(&["t1", "t2"]);
        ts[0].publisher().publish("first").unwrap();
        ts[1].publisher().publish("second").unwrap();

        let got = await_all(&ts, Duration::from_secs(1)).await.unwrap();
        assert!(got.is_complete());
        assert_eq!(got.events["t1"].downcast_ref::<&str>(), Some(&"first"));
        assert_eq!(got.events["t2"].downcast_ref::<&str>(), Some(&"second"));
    }

    #[tokio::test]
    async fn all_timeout_reports_missing_topics() {
        let ts = topics(&["t1", "t2"]);
        ts[0].publisher().publish("only me").unwrap();

        let got = await_all(&ts, Duration::from_millis(50)).await.unwrap();
        assert_eq!(got.missing(), ["t2".to_string()]);
        assert!(got.error.as_ref().is_some_and(Error::is_timeout));
        assert_eq!(got.events.len(), 1);
        assert!(got.events.contains_key("t1"));
    }

    #[tokio::test]
    async fn any_returns_on_first_event() {
        let ts = topics(&["t1", "t2"]);
        let publisher = ts[1].publisher();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            let _ = publisher.publish(7_u32);
        });

        let got = must_await_any(&ts, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["t2"].downcast_ref::<u32>(), Some(&7));
    }

    #[tokio::test]
    async fn must_variant_fails_on_timeout() {
        let ts = topics(&["silent"]);
        let err = must_await_all(&ts, Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(
            err,
            Error::Timeout {
                after: Duration::from_millis(20),
                missing: vec!["silent".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn invalid_input_fails_before_subscribing() {
        let err = await_any(&[], Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.as_label(), "topic_missing");

        let ts = topics(&["open", "closed"]);
        ts[1].close().unwrap();
        let err = await_all(&ts, Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.as_label(), "topic_missing");
    }

    #[tokio::test]
    async fn latest_event_wins_per_topic() {
        let ts = topics(&["busy", "slow"]);
        ts[0].publisher().publish(1_u8).unwrap();
        ts[0].publisher().publish(2_u8).unwrap();
        let publisher = ts[1].publisher();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            let _ = publisher.publish(3_u8);
        });

        let got = must_await_all(&ts, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got["busy"].downcast_ref::<u8>(), Some(&2));
        assert_eq!(got["slow"].downcast_ref::<u8>(), Some(&3));
    }

    #[tokio::test]
    async fn unbounded_timeout_waits_for_events() {
        let ts = topics(&["t1", "t2"]);
        ts[0].publisher().publish("a").unwrap();
        ts[1].publisher().publish("b").unwrap();

        let got = timeout(Duration::from_secs(1), await_all(&ts, Duration::MAX))
            .await
            .unwrap()
            .unwrap();
        assert!(got.is_complete());

        let first = &ts[..1];
        let (any, published) = tokio::join!(
            timeout(Duration::from_secs(1), must_await_any(first, Duration::MAX)),
            async { first[0].publisher().publish("again") },
        );
        published.unwrap();
        assert!(any.unwrap().unwrap().contains_key("t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn long_deadlines_run_on_the_tokio_clock() {
        let ts = topics(&["idle"]);
        let got = await_all(&ts, Duration::from_secs(3600)).await.unwrap();
        assert_eq!(got.missing(), ["idle".to_string()]);
        assert_eq!(
            got.error,
            Some(Error::Timeout {
                after: Duration::from_secs(3600),
                missing: vec!["idle".to_string()],
            })
        );
    }
}
