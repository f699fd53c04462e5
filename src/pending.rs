//! Pending replies
//!
//! Every key-object operation returns a [`Pending`]. The command is built
//! when the operation is called: against a transaction or batch it is queued
//! right then, in call order, and the `Pending` resolves once the
//! transaction or batch executes. Against a direct executor the command is
//! sent when the `Pending` is first polled.

use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

#[must_use = "a Pending does nothing for direct keys unless awaited"]
pub struct Pending<T> {
    inner: BoxFuture<'static, Result<T>>,
}

impl<T: Send + 'static> Pending<T> {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Pending { inner: fut.boxed() }
    }

    pub fn ready(value: T) -> Self {
        Self::new(futures::future::ready(Ok(value)))
    }

    pub fn failed(err: crate::Error) -> Self {
        Self::new(futures::future::ready(Err(err)))
    }

    /// Post-processes the reply.
    pub fn map<U, F>(self, f: F) -> Pending<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let inner = self.inner;
        Pending::new(async move { f(inner.await?) })
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pending")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_ready_and_map() {
        let p = Pending::ready(20).map(|n| Ok(n + 1));
        assert_eq!(p.await.unwrap(), 21);
    }

    #[tokio::test]
    async fn test_failed_skips_map() {
        let p: Pending<i32> = Pending::failed(Error::Discarded);
        let mapped = p.map(|_| -> Result<i32> { panic!("map must not run") });
        assert_eq!(mapped.await.unwrap_err(), Error::Discarded);
    }
}
