//! The single-writer loop that owns engine state.
//!
//! The `Runtime` is the only place [`State`] is mutated. It:
//! 1. Receives messages from the ingress channel in arrival order
//! 2. Applies each command to completion before reading the next
//! 3. Emits the command's facts on the event bus
//! 4. Sends the result back to the caller, if one is waiting
//!
//! Nothing in `process` awaits, so no other command can observe a
//! half-applied one.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, debug_span, info, warn};

use crate::bus::EventBus;
use crate::command::{Command, CommandReply};
use crate::correlation::CorrelationId;
use crate::error::Result;
use crate::state::{Applied, State};

/// One item on the ingress channel.
#[derive(Debug)]
pub(crate) enum Message {
    Command(Envelope),
    /// Stop after everything enqueued before this marker has been applied.
    Shutdown,
}

/// A command plus where to send its result.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub cid: CorrelationId,
    pub command: Command,
    /// `None` for fire-and-forget sends.
    pub reply: Option<oneshot::Sender<Result<CommandReply>>>,
}

pub(crate) struct Runtime {
    state: State,
    receiver: mpsc::Receiver<Message>,
    bus: EventBus,
}

impl Runtime {
    pub(crate) fn new(state: State, receiver: mpsc::Receiver<Message>, bus: EventBus) -> Self {
        Self {
            state,
            receiver,
            bus,
        }
    }

    /// Run until a shutdown marker arrives or every sender is dropped.
    ///
    /// Returns the final state. Messages still queued behind the shutdown
    /// marker are dropped, which their callers observe as `Stopped`.
    pub(crate) async fn run(mut self) -> State {
        info!("agora runtime starting");

        let mut processed: u64 = 0;
        while let Some(message) = self.receiver.recv().await {
            match message {
                Message::Command(envelope) => {
                    self.process(envelope);
                    processed += 1;
                }
                Message::Shutdown => {
                    debug!("shutdown marker received");
                    break;
                }
            }
        }
        self.receiver.close();

        info!(
            processed,
            users = self.state.user_count(),
            subreddits = self.state.subreddit_count(),
            posts = self.state.post_count(),
            "agora runtime stopped"
        );
        self.state
    }

    fn process(&mut self, envelope: Envelope) {
        let Envelope {
            cid,
            command,
            reply,
        } = envelope;
        let span = debug_span!("command", cid = %cid, command = command.name());
        let _enter = span.enter();

        let result = match self.state.apply(command) {
            Ok(Applied { reply, events }) => {
                debug!(changed = reply.changed(), events = events.len(), "command applied");
                if let CommandReply::Report(text) = &reply {
                    debug!(report = %text, "report rendered");
                }
                for event in events {
                    self.bus.emit_with_correlation(event, cid);
                }
                Ok(reply)
            }
            Err(error) => {
                debug!(error = %error, kind = ?error.kind(), "command rejected");
                Err(error)
            }
        };

        if let Some(sender) = reply {
            if sender.send(result).is_err() {
                warn!("caller dropped before the reply was sent");
            }
        }
    }
}
