//! Handles to factory-registered topics.
//!
//! A [`RegisteredTopic`] owns no state: it addresses its slot in the registry
//! loop by name and [`SlotAddr`], and carries the slot's closed token.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::core::registry::{Command, Kind, Registration};
use crate::error::Error;
use crate::subscribers::SubscriberRef;
use crate::topics::mailbox::Mailbox;
use crate::topics::{Publisher, SlotAddr, Subscribed, Topic};

pub(crate) struct RegisteredTopic {
    mailbox: Mailbox<Command>,
    addr: SlotAddr,
    kind: Kind,
}

impl RegisteredTopic {
    pub(crate) fn new(
        registration: Registration,
        kind: Kind,
        registry: mpsc::UnboundedSender<Command>,
    ) -> Arc<Self> {
        let Registration { name, addr, closed } = registration;
        Arc::new(Self {
            mailbox: Mailbox::new(name, registry, closed),
            addr,
            kind,
        })
    }
}

impl Topic for RegisteredTopic {
    fn name(&self) -> &str {
        self.mailbox.name()
    }

    /// Tickers are receive-only: their publisher always fails.
    fn publisher(&self) -> Publisher {
        let mailbox = self.mailbox.clone();
        let name = Arc::clone(self.mailbox.name());
        match self.kind {
            Kind::Ticker(_) => Publisher::new(name, move |_| {
                if mailbox.is_closed() {
                    Err(Error::closed(&**mailbox.name()))
                } else {
                    Err(Error::ReceiveOnly {
                        topic: mailbox.name().to_string(),
                    })
                }
            }),
            Kind::Topic | Kind::Gate => Publisher::new(name, move |event| {
                let name = Arc::clone(mailbox.name());
                mailbox.send(
                    "publish",
                    Command::Route {
                        name,
                        event,
                        attempt: 0,
                    },
                )
            }),
        }
    }

    fn subscribe(&self, subscriber: SubscriberRef) -> Result<Subscribed, Error> {
        let (done, accepted) = oneshot::channel();
        let name = Arc::clone(self.mailbox.name());
        self.mailbox.send(
            "subscribe",
            Command::Subscribe {
                name: Arc::clone(&name),
                id: self.addr.id,
                subscriber,
                done,
            },
        )?;
        Ok(Subscribed::new(name, accepted))
    }

    fn close(&self) -> Result<(), Error> {
        if self.mailbox.close() {
            self.mailbox.post(Command::Unregister {
                name: Arc::clone(self.mailbox.name()),
                id: self.addr.id,
            });
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    fn slot(&self) -> Option<SlotAddr> {
        Some(self.addr)
    }
}
