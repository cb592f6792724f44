//! Trailing-edge debounce for remote pushes.
//!
//! At most one push is pending at a time. Scheduling a new one cancels the
//! old one; the timer task that was waiting for the old one finds its ticket
//! stale and sends nothing. Only the last state inside a quiet window is
//! ever pushed.

use crate::game::state::GameState;

/// Identifies one scheduled push. A ticket is live until the push is taken,
/// cancelled, or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushTicket(u64);

/// A snapshot waiting for its quiet interval to elapse.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPush {
    pub uid: String,
    pub state: GameState,
    pub due_at_ms: u64,
    ticket: PushTicket,
}

#[derive(Debug, Default)]
pub struct PushScheduler {
    pending: Option<PendingPush>,
    next_ticket: u64,
}

impl PushScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is pending with a push of `state` for `uid`, due
    /// `after_ms` from `now_ms`.
    pub fn schedule(&mut self, after_ms: u64, now_ms: u64, uid: &str, state: GameState) -> PushTicket {
        self.next_ticket += 1;
        let ticket = PushTicket(self.next_ticket);
        self.pending = Some(PendingPush {
            uid: uid.to_string(),
            state,
            due_at_ms: now_ms.saturating_add(after_ms),
            ticket,
        });
        ticket
    }

    /// Drop the pending push, if any. Returns whether one was dropped.
    pub fn cancel_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Hand over the pending push if `ticket` still names it.
    pub fn take(&mut self, ticket: PushTicket) -> Option<PendingPush> {
        match &self.pending {
            Some(p) if p.ticket == ticket => self.pending.take(),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingPush> {
        self.pending.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_xp(xp: u64) -> GameState {
        let mut s = GameState::default();
        s.add_xp(xp);
        s
    }

    #[test]
    fn newer_schedule_invalidates_older_ticket() {
        let mut sched = PushScheduler::new();
        let first = sched.schedule(1_500, 0, "u1", state_with_xp(1));
        let second = sched.schedule(1_500, 200, "u1", state_with_xp(2));

        assert!(sched.take(first).is_none());
        let push = sched.take(second).unwrap();
        assert_eq!(push.state.total_xp, 2);
        assert_eq!(push.due_at_ms, 1_700);
        assert!(sched.pending().is_none());
    }

    #[test]
    fn ticket_can_only_be_taken_once() {
        let mut sched = PushScheduler::new();
        let ticket = sched.schedule(10, 0, "u1", state_with_xp(5));
        assert!(sched.take(ticket).is_some());
        assert!(sched.take(ticket).is_none());
    }

    #[test]
    fn cancel_drops_pending_push() {
        let mut sched = PushScheduler::new();
        let ticket = sched.schedule(10, 0, "u1", state_with_xp(5));
        assert!(sched.cancel_pending());
        assert!(!sched.cancel_pending());
        assert!(sched.take(ticket).is_none());
    }
}
