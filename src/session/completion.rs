// SPDX-License-Identifier: MPL-2.0

//! One-shot completions for queued work
//!
//! Every asynchronous coordinator operation hands back a [`Completion`], a
//! future that resolves exactly once. The work side holds the matching
//! [`Resolver`], which is consumed when it resolves. Dropping a resolver
//! without resolving (queue teardown, abandoned capture) resolves the
//! completion with `None`, so a caller never waits forever.

use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::storage::{AssetHandle, Location};

/// Future side of a one-shot result
#[must_use = "a completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion<T> {
    state: State<T>,
}

#[derive(Debug)]
enum State<T> {
    Ready(Option<T>),
    Pending(oneshot::Receiver<T>),
    Done,
}

impl<T> Completion<T> {
    /// A connected completion/resolver pair
    pub fn pair() -> (Resolver<T>, Completion<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Resolver { tx },
            Completion {
                state: State::Pending(rx),
            },
        )
    }

    /// A completion that is already resolved
    pub fn ready(value: Option<T>) -> Self {
        Self {
            state: State::Ready(value),
        }
    }

    /// Non-blocking check; returns `Some` once resolved
    pub fn try_take(&mut self) -> Option<Option<T>> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Ready(value) => Some(value),
            State::Pending(mut rx) => match rx.try_recv() {
                Ok(Some(value)) => Some(Some(value)),
                Ok(None) => {
                    self.state = State::Pending(rx);
                    None
                }
                Err(oneshot::Canceled) => Some(None),
            },
            State::Done => None,
        }
    }
}

// The resolved value is moved out, never pinned
impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match &mut this.state {
            State::Ready(value) => {
                let value = value.take();
                this.state = State::Done;
                Poll::Ready(value)
            }
            State::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(result) => {
                    this.state = State::Done;
                    Poll::Ready(result.ok())
                }
                Poll::Pending => Poll::Pending,
            },
            State::Done => panic!("Completion polled after it resolved"),
        }
    }
}

/// Work side of a one-shot result
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    /// Resolve with `value`, or with nothing
    pub fn resolve(self, value: Option<T>) {
        if let Some(value) = value {
            // The caller may have dropped its completion; that is fine
            let _ = self.tx.send(value);
        }
    }
}

/// What an in-flight capture will produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Photo,
    Video,
}

/// An in-flight photo or recording request
///
/// Carries the location to attach and the resolver for the caller's
/// completion. Consumed by [`resolve`](PendingCapture::resolve), so it
/// fires at most once; if it is dropped the caller sees no asset.
#[derive(Debug)]
pub struct PendingCapture {
    pub kind: CaptureKind,
    pub location: Option<Location>,
    resolver: Resolver<AssetHandle>,
}

impl PendingCapture {
    pub fn new(
        kind: CaptureKind,
        location: Option<Location>,
        resolver: Resolver<AssetHandle>,
    ) -> Self {
        Self {
            kind,
            location,
            resolver,
        }
    }

    pub fn resolve(self, asset: Option<AssetHandle>) {
        self.resolver.resolve(asset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_with_value() {
        let (resolver, completion) = Completion::pair();
        resolver.resolve(Some(7));
        assert_eq!(pollster::block_on(completion), Some(7));
    }

    #[test]
    fn test_dropped_resolver_yields_none() {
        let (resolver, completion) = Completion::<u32>::pair();
        drop(resolver);
        assert_eq!(pollster::block_on(completion), None);
    }

    #[test]
    fn test_try_take_before_and_after() {
        let (resolver, mut completion) = Completion::pair();
        assert!(completion.try_take().is_none());
        resolver.resolve(Some("done"));
        assert_eq!(completion.try_take(), Some(Some("done")));
    }

    #[test]
    fn test_ready_completion() {
        assert_eq!(pollster::block_on(Completion::ready(Some(1))), Some(1));
        assert_eq!(pollster::block_on(Completion::<u8>::ready(None)), None);
    }
}
