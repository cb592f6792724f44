//! First-resolved-wins combinator.
//!
//! Used for the remote load: the remote read races a timer, whichever
//! finishes first decides the outcome and the other future is dropped on
//! the spot, so a late remote answer can never be applied.

use futures::future::{self, Either};
use futures::pin_mut;
use std::future::Future;

use crate::game::clock::Clock;

/// Which side of a race finished first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Winner<A, B> {
    First(A),
    Second(B),
}

/// Drive both futures and return the output of whichever completes first.
/// The loser is dropped before this returns. If both are ready on the
/// same poll, `first` wins.
pub async fn first_resolved<A, B>(first: A, second: B) -> Winner<A::Output, B::Output>
where
    A: Future,
    B: Future,
{
    pin_mut!(first);
    pin_mut!(second);
    match future::select(first, second).await {
        Either::Left((out, loser)) => {
            drop(loser);
            Winner::First(out)
        }
        Either::Right((out, loser)) => {
            drop(loser);
            Winner::Second(out)
        }
    }
}

/// Run `op` against a `timeout_ms` timer from `clock`. `None` means the
/// timer won.
pub async fn with_timeout<F, C>(op: F, clock: &C, timeout_ms: u64) -> Option<F::Output>
where
    F: Future,
    C: Clock + ?Sized,
{
    match first_resolved(op, clock.sleep(timeout_ms)).await {
        Winner::First(out) => Some(out),
        Winner::Second(()) => None,
    }
}
