use tokio::sync::oneshot;

use crate::{Error, MessageId, Result, SessionId};

/// Terminal value of one correlation attempt, delivered through the
/// rendezvous channel: the matching frame's payload text, or the error
/// that ended the listening loop.
pub(super) type Outcome = Result<String>;

struct PendingExecution {
    // ---
    msg_id: MessageId,
    session: SessionId,
    tx: oneshot::Sender<Outcome>,
}

/// Tracks the single outstanding request on a connection.
///
/// The engine correlates at most one request at a time, so this is a slot
/// rather than a map: registering while occupied is rejected, and a reply
/// completes the slot only when *both* identifiers match exactly. Partial
/// matches leave the slot untouched, which is what prevents cross-talk
/// from unrelated frames still in flight on a shared connection.
pub(super) struct Outstanding {
    // ---
    slot: Option<PendingExecution>,
}

impl Outstanding {
    // ---

    /// Create an empty tracker.
    pub fn new() -> Self {
        // ---
        Self { slot: None }
    }

    /// Register a new outstanding request.
    ///
    /// Returns a receiver that resolves when a matching reply arrives or
    /// the listening loop fails.
    ///
    /// # Errors
    ///
    /// Returns `Error::RequestInFlight` if a request is already registered.
    pub fn register(
        &mut self,
        msg_id: MessageId,
        session: SessionId,
    ) -> Result<oneshot::Receiver<Outcome>> {
        // ---
        if self.slot.is_some() {
            return Err(Error::RequestInFlight);
        }

        let (tx, rx) = oneshot::channel();
        self.slot = Some(PendingExecution {
            msg_id,
            session,
            tx,
        });
        Ok(rx)
    }

    /// Complete the outstanding request if `msg_id` and `session` both
    /// match it exactly.
    ///
    /// Returns true if the payload was delivered. A partial match (either
    /// identifier alone) returns false and leaves the request outstanding.
    pub fn complete(&mut self, msg_id: &str, session: &str, text: String) -> bool {
        // ---
        let is_match = self
            .slot
            .as_ref()
            .map(|pending| pending.msg_id.as_str() == msg_id && pending.session.as_str() == session)
            .unwrap_or(false);

        if !is_match {
            return false;
        }

        if let Some(pending) = self.slot.take() {
            // Ignore send failure; the caller may have abandoned the wait.
            let _ = pending.tx.send(Ok(text));
        }
        true
    }

    /// Fail the outstanding request with a terminal error.
    ///
    /// Used by the listening loop when the connection closes or an inbound
    /// frame cannot be decoded. Returns true if a waiter was notified.
    pub fn fail(&mut self, err: Error) -> bool {
        // ---
        if let Some(pending) = self.slot.take() {
            let _ = pending.tx.send(Err(err));
            true
        } else {
            false
        }
    }

    /// Drop the outstanding request without delivering an outcome.
    ///
    /// Used for timeout and send-failure cleanup. A reply arriving later
    /// no longer matches anything and is discarded.
    pub fn abandon(&mut self) {
        // ---
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_register_and_complete() {
        // ---
        let mut outstanding = Outstanding::new();
        let msg_id = MessageId::generate();
        let session = SessionId::generate();

        let rx = outstanding
            .register(msg_id.clone(), session.clone())
            .expect("register failed");

        assert!(outstanding.complete(msg_id.as_str(), session.as_str(), "output".into()));

        let outcome = rx.blocking_recv().expect("sender dropped");
        assert_eq!(outcome.expect("expected success"), "output");

        // Slot is free again after completion.
        assert!(outstanding
            .register(MessageId::generate(), SessionId::generate())
            .is_ok());
    }

    #[test]
    fn test_partial_match_never_completes() {
        // ---
        let mut outstanding = Outstanding::new();
        let msg_id = MessageId::generate();
        let session = SessionId::generate();

        let mut rx = outstanding
            .register(msg_id.clone(), session.clone())
            .expect("register failed");

        // msg_id matches, session does not.
        assert!(!outstanding.complete(msg_id.as_str(), "other-session", "nope".into()));
        // session matches, msg_id does not.
        assert!(!outstanding.complete("other-msg", session.as_str(), "nope".into()));
        // Neither matches.
        assert!(!outstanding.complete("other-msg", "other-session", "nope".into()));

        assert!(rx.try_recv().is_err());

        // The real reply still lands.
        assert!(outstanding.complete(msg_id.as_str(), session.as_str(), "yes".into()));
        assert_eq!(rx.blocking_recv().unwrap().unwrap(), "yes");
    }

    #[test]
    fn test_second_register_rejected() {
        // ---
        let mut outstanding = Outstanding::new();
        let _rx = outstanding
            .register(MessageId::generate(), SessionId::generate())
            .expect("register failed");

        let err = outstanding
            .register(MessageId::generate(), SessionId::generate())
            .unwrap_err();
        assert!(matches!(err, Error::RequestInFlight));
    }

    #[test]
    fn test_fail_delivers_error() {
        // ---
        let mut outstanding = Outstanding::new();
        let rx = outstanding
            .register(MessageId::generate(), SessionId::generate())
            .expect("register failed");

        assert!(outstanding.fail(Error::ConnectionClosed));

        let outcome = rx.blocking_recv().expect("sender dropped");
        assert!(matches!(outcome, Err(Error::ConnectionClosed)));

        // Nothing left to fail.
        assert!(!outstanding.fail(Error::ConnectionClosed));
    }

    #[test]
    fn test_abandon_then_late_reply_is_discarded() {
        // ---
        let mut outstanding = Outstanding::new();
        let msg_id = MessageId::generate();
        let session = SessionId::generate();

        let _rx = outstanding
            .register(msg_id.clone(), session.clone())
            .expect("register failed");

        outstanding.abandon();

        assert!(!outstanding.complete(msg_id.as_str(), session.as_str(), "late".into()));
    }
}
