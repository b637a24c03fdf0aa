//! Error types used by topics, the factory and the join helpers.
//!
//! A single enum, [`Error`], covers every failure a caller can observe:
//!
//! - [`Error::ClosedTopic`] - publish/subscribe attempted after `close()`.
//! - [`Error::Timeout`] - an await or watchdog deadline elapsed.
//! - [`Error::MissingTopic`] - a join/gate/await was given nothing (or a dead topic) to observe.
//! - [`Error::DuplicateTopic`] - a name is already registered in a factory.
//! - [`Error::ReceiveOnly`] - publishing to a clock-driven factory topic.
//! - [`Error::FactoryClosed`] - the factory loop has already shut down.
//!
//! Events addressed to a name the factory does not know are **not** errors:
//! they are requeued with backoff (see [`Config`](crate::Config)).
//!
//! Like the rest of the crate, the enum provides `as_label` / `as_message`
//! helpers for logs and metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by topics and the factory.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The topic was closed; the publish or subscribe did not happen.
    #[error("topic {topic:?} is closed")]
    ClosedTopic {
        /// Name of the closed topic.
        topic: String,
    },

    /// A deadline elapsed before the awaited topics published.
    #[error("timed out after {after:?}; not yet published: {missing:?}")]
    Timeout {
        /// The deadline that was exceeded.
        after: Duration,
        /// Names of the topics that did not publish in time.
        missing: Vec<String>,
    },

    /// A gate or await was constructed without a usable topic.
    #[error("missing topic: {detail}")]
    MissingTopic {
        /// What was missing.
        detail: String,
    },

    /// The name is already taken within the factory registry.
    #[error("topic {topic:?} is already registered")]
    DuplicateTopic {
        /// The conflicting name.
        topic: String,
    },

    /// The topic is driven by a clock and cannot be published to.
    #[error("topic {topic:?} is receive-only")]
    ReceiveOnly {
        /// Name of the clock-driven topic.
        topic: String,
    },

    /// The factory has been closed.
    #[error("factory is closed")]
    FactoryClosed,
}

impl Error {
    pub(crate) fn closed(topic: impl Into<String>) -> Self {
        Error::ClosedTopic {
            topic: topic.into(),
        }
    }

    pub(crate) fn missing(detail: impl Into<String>) -> Self {
        Error::MissingTopic {
            detail: detail.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use topicvisor::Error;
    ///
    /// let err = Error::ClosedTopic { topic: "orders".into() };
    /// assert_eq!(err.as_label(), "topic_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::ClosedTopic { .. } => "topic_closed",
            Error::Timeout { .. } => "timeout",
            Error::MissingTopic { .. } => "topic_missing",
            Error::DuplicateTopic { .. } => "topic_duplicate",
            Error::ReceiveOnly { .. } => "topic_receive_only",
            Error::FactoryClosed => "factory_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            Error::ClosedTopic { topic } => format!("closed: {topic}"),
            Error::Timeout { after, missing } => {
                format!("timeout after {after:?}; missing={missing:?}")
            }
            Error::MissingTopic { detail } => format!("missing: {detail}"),
            Error::DuplicateTopic { topic } => format!("duplicate: {topic}"),
            Error::ReceiveOnly { topic } => format!("receive-only: {topic}"),
            Error::FactoryClosed => "factory closed".to_string(),
        }
    }

    /// Returns `true` for [`Error::Timeout`].
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use topicvisor::Error;
    ///
    /// let err = Error::Timeout { after: Duration::from_millis(50), missing: vec!["b".into()] };
    /// assert!(err.is_timeout());
    /// ```
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Names of the topics that did not publish, for [`Error::Timeout`].
    pub fn missing_topics(&self) -> &[String] {
        match self {
            Error::Timeout { missing, .. } => missing,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(Error::closed("a").as_label(), "topic_closed");
        assert_eq!(Error::missing("none").as_label(), "topic_missing");
        assert_eq!(Error::FactoryClosed.as_label(), "factory_closed");
    }

    #[test]
    fn timeout_exposes_missing_topics() {
        let err = Error::Timeout {
            after: Duration::from_millis(50),
            missing: vec!["t2".to_string()],
        };
        assert!(err.is_timeout());
        assert_eq!(err.missing_topics(), ["t2".to_string()]);
        assert!(err.to_string().contains("t2"));
        assert!(Error::closed("t1").missing_topics().is_empty());
    }
}
