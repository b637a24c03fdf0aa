//! # Publish deadlines.
//!
//! - [`when_timeout`] derives a topic that publishes a [`TimedOut`] whenever
//!   the source stays silent for a window.
//! - [`must_publish_within`] arms a [`Watchdog`] on such a derived topic;
//!   [`Watchdog::wait`] fails the first time the deadline passes.
//! - [`published_within`] answers "did anything arrive in time?" as a bool.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::error;

use crate::error::Error;
use crate::events::{Event, TimedOut};
use crate::join::await_all;
use crate::subscribers::SubscriberFn;
use crate::topics::{TimerTopic, Topic, TopicRef};

/// Derives a topic named `name` that emits [`TimedOut`] each time `topic`
/// publishes nothing for `after`.
///
/// Every event on `topic` resets the window. The clock starts with the first
/// subscriber of the derived topic.
///
/// # Errors
/// [`Error::MissingTopic`] if `topic` is closed.
pub fn when_timeout(
    topic: &TopicRef,
    after: Duration,
    name: impl Into<String>,
) -> Result<TopicRef, Error> {
    let timer: TopicRef = TimerTopic::deadline(name.into(), topic, after)?;
    Ok(timer)
}

/// Arms a watchdog that trips if `topic` goes quiet for `after`.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use topicvisor::{ActorTopic, TopicRef, must_publish_within};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let topic: TopicRef = ActorTopic::spawn("heartbeat");
///     let mut watchdog = must_publish_within(&topic, Duration::from_millis(10)).unwrap();
///
///     let err = watchdog.wait().await.unwrap_err();
///     assert!(err.is_timeout());
///     assert_eq!(err.missing_topics(), ["heartbeat".to_string()]);
/// }
/// ```
pub fn must_publish_within(topic: &TopicRef, after: Duration) -> Result<Watchdog, Error> {
    let timer = when_timeout(topic, after, format!("{}:watchdog", topic.name()))?;
    let (tx, rx) = mpsc::unbounded_channel();
    let trip = SubscriberFn::arc(format!("{}:trip", timer.name()), move |ev: Event| {
        let tx = tx.clone();
        async move {
            if let Some(timed_out) = ev.downcast_ref::<TimedOut>() {
                let _ = tx.send(timed_out.clone());
            }
        }
    });
    let _accepted = timer.subscribe(trip)?;

    Ok(Watchdog {
        topic: topic.name().to_string(),
        after,
        timer,
        tripped: rx,
    })
}

/// Returns whether `topic` published at least once within `after`.
///
/// # Errors
/// [`Error::MissingTopic`] if `topic` is closed.
pub async fn published_within(topic: &TopicRef, after: Duration) -> Result<bool, Error> {
    let awaited = await_all(std::slice::from_ref(topic), after).await?;
    Ok(awaited.is_complete())
}

/// Deadline guard returned by [`must_publish_within`].
///
/// Dropping it disarms the deadline.
pub struct Watchdog {
    topic: String,
    after: Duration,
    timer: TopicRef,
    tripped: mpsc::UnboundedReceiver<TimedOut>,
}

impl Watchdog {
    /// Waits for the first missed deadline.
    ///
    /// Resolves to [`Error::Timeout`] when the watched topic stayed silent for
    /// the whole window, or to `Ok(())` once the watchdog is disarmed.
    pub async fn wait(&mut self) -> Result<(), Error> {
        match self.tripped.recv().await {
            Some(_) => {
                error!(topic = %self.topic, after_ms = self.after.as_millis() as u64, "publish deadline missed");
                Err(Error::Timeout {
                    after: self.after,
                    missing: vec![self.topic.clone()],
                })
            }
            None => Ok(()),
        }
    }

    /// Stops the deadline clock.
    pub fn disarm(&self) {
        let _ = self.timer.close();
    }

    /// Returns `true` once disarmed.
    pub fn is_disarmed(&self) -> bool {
        self.timer.is_closed()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::subscribers::testing::channel;
    use crate::topics::ActorTopic;

    #[tokio::test]
    async fn derived_topic_reports_silence() {
        let source: TopicRef = ActorTopic::spawn("orders");
        let derived = when_timeout(&source, Duration::from_millis(20), "orders:late").unwrap();
        assert_eq!(derived.name(), "orders:late");

        let (sub, mut rx) = channel("watch");
        derived.subscribe(sub).unwrap().await.unwrap();
        let ev = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(&*ev.downcast_ref::<TimedOut>().unwrap().topic, "orders");
    }

    #[tokio::test]
    async fn source_events_keep_the_derived_topic_quiet() {
        let source: TopicRef = ActorTopic::spawn("busy");
        let derived = when_timeout(&source, Duration::from_millis(60), "busy:late").unwrap();
        let (sub, mut rx) = channel("watch");
        derived.subscribe(sub).unwrap().await.unwrap();

        let publisher = source.publisher();
        for i in 0..5_u8 {
            publisher.publish(i).unwrap();
            sleep(Duration::from_millis(15)).await;
        }
        assert!(rx.try_recv().is_err());
        derived.close().unwrap();
    }

    #[tokio::test]
    async fn watchdog_trips_on_silence() {
        let topic: TopicRef = ActorTopic::spawn("silent");
        let mut watchdog = must_publish_within(&topic, Duration::from_millis(20)).unwrap();
        let err = timeout(Duration::from_secs(1), watchdog.wait())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.missing_topics(), ["silent".to_string()]);
    }

    #[tokio::test]
    async fn disarmed_watchdog_resolves_ok() {
        let topic: TopicRef = ActorTopic::spawn("calm");
        let mut watchdog = must_publish_within(&topic, Duration::from_millis(200)).unwrap();
        watchdog.disarm();
        assert!(watchdog.is_disarmed());
        let res = timeout(Duration::from_secs(1), watchdog.wait()).await.unwrap();
        assert_eq!(res, Ok(()));
    }

    #[tokio::test]
    async fn published_within_reports_a_bool() {
        let topic: TopicRef = ActorTopic::spawn("maybe");
        assert!(!published_within(&topic, Duration::from_millis(20)).await.unwrap());

        let publisher = topic.publisher();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            let _ = publisher.publish("now");
        });
        assert!(published_within(&topic, Duration::from_millis(500)).await.unwrap());
    }
}
