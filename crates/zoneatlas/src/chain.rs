//! Ordered fallback chains.
//!
//! Both resolvers describe their fallbacks as a plain ordered list of step
//! descriptors. [`first_success`] walks the list and stops at the first step
//! that produces a value, reporting which step won and how many were tried.
//! [`first_success_async`] does the same for steps that await I/O, threading
//! an owned state value through every step.

use std::future::Future;

/// Result of driving a chain to its first success.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainHit<S, T> {
    /// The step that produced the value.
    pub step: S,
    /// The produced value.
    pub value: T,
    /// Number of steps evaluated, including the winning one.
    pub tried: usize,
}

/// Evaluate `steps` in order and return the first one for which `attempt`
/// yields `Some`.
pub fn first_success<S, T, I, F>(steps: I, mut attempt: F) -> Option<ChainHit<S, T>>
where
    I: IntoIterator<Item = S>,
    F: FnMut(&S) -> Option<T>,
{
    let mut tried = 0;
    for step in steps {
        tried += 1;
        if let Some(value) = attempt(&step) {
            return Some(ChainHit { step, value, tried });
        }
    }
    None
}

/// Async form of [`first_success`].
///
/// Each step receives `state` by value and hands it back with its result,
/// so what a failed step records (attempt logs, escalation flags) is seen by
/// the next one. The final state is returned whether or not a step won.
pub async fn first_success_async<S, T, C, I, F, Fut>(
    steps: I,
    mut state: C,
    mut attempt: F,
) -> (Option<ChainHit<S, T>>, C)
where
    S: Clone,
    I: IntoIterator<Item = S>,
    F: FnMut(S, C) -> Fut,
    Fut: Future<Output = (Option<T>, C)>,
{
    let mut tried = 0;
    for step in steps {
        tried += 1;
        let (value, next) = attempt(step.clone(), state).await;
        state = next;
        if let Some(value) = value {
            return (Some(ChainHit { step, value, tried }), state);
        }
    }
    (None, state)
}
