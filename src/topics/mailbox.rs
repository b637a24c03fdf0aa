//! Command queue shared by a topic handle and its owning loop.
//!
//! A [`Mailbox`] pairs the sending half of an actor's queue with the topic's
//! closed flag. Handles never touch loop state directly; they only push
//! commands through here.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::events::Event;
use crate::subscribers::SubscriberRef;
use crate::topics::{Publisher, Subscribed};

/// Commands understood by standalone topic loops.
pub(crate) enum Command {
    Subscribe {
        subscriber: SubscriberRef,
        done: oneshot::Sender<()>,
    },
    Publish(Event),
}

pub(crate) struct Mailbox<C> {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<C>,
    closed: CancellationToken,
}

impl<C> Clone for Mailbox<C> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<C: Send + 'static> Mailbox<C> {
    pub(crate) fn new(
        name: Arc<str>,
        tx: mpsc::UnboundedSender<C>,
        closed: CancellationToken,
    ) -> Self {
        Self { name, tx, closed }
    }

    #[inline]
    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Enqueues `cmd`; logs and returns `ClosedTopic` if the topic is gone.
    pub(crate) fn send(&self, op: &'static str, cmd: C) -> Result<(), Error> {
        if self.try_send(cmd) {
            return Ok(());
        }
        warn!(topic = %self.name, op, "rejected: topic is closed");
        Err(Error::closed(&*self.name))
    }

    /// Enqueues `cmd` without logging. Returns `false` if the topic is gone.
    pub(crate) fn try_send(&self, cmd: C) -> bool {
        !self.closed.is_cancelled() && self.tx.send(cmd).is_ok()
    }

    /// Enqueues `cmd` regardless of the closed flag (teardown notices).
    pub(crate) fn post(&self, cmd: C) -> bool {
        self.tx.send(cmd).is_ok()
    }

    /// Sets the closed flag. Returns `true` for the call that actually closed it.
    pub(crate) fn close(&self) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.closed.cancel();
        debug!(topic = %self.name, "topic closed");
        true
    }
}

impl Mailbox<Command> {
    pub(crate) fn publisher(&self) -> Publisher {
        let mailbox = self.clone();
        Publisher::new(Arc::clone(&self.name), move |ev| {
            mailbox.send("publish", Command::Publish(ev))
        })
    }

    pub(crate) fn subscribe(&self, subscriber: SubscriberRef) -> Result<Subscribed, Error> {
        let (done, accepted) = oneshot::channel();
        self.send("subscribe", Command::Subscribe { subscriber, done })?;
        Ok(Subscribed::new(Arc::clone(&self.name), accepted))
    }
}
