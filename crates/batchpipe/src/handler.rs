//! Handler normalization.
//!
//! The consumer loop only knows one calling convention: an async method that
//! is awaited to completion before the next call. [`sync_handler`] and
//! [`async_handler`] lift plain and async closures into that convention.
//! A synchronous closure runs inline, on the consumer task, when the loop
//! dispatches to it.
//!
//! Closures may return `()` or `Result<(), E>` for any `E: Into<BoxError>`.
//! Errors are not translated or caught; they end the consumer loop and surface
//! from [`BatchPipe::close`](crate::BatchPipe::close).

use crate::error::BoxError;
use std::future::Future;
use std::pin::Pin;

/// What a handler invocation resolves to.
pub type HandlerResult = Result<(), BoxError>;

/// An async receiver of values, invoked strictly one call at a time.
///
/// # Note on Object Safety
///
/// `handle` returns `impl Future`, which is not object-safe. For dynamic
/// dispatch use [`HandlerBoxed`], which every `Handler` implements.
pub trait Handler<T>: Send + 'static {
    /// Processes `value`. The returned future is awaited before the next call.
    fn handle(&mut self, value: T) -> impl Future<Output = HandlerResult> + Send + '_;
}

/// Object-safe version of [`Handler`] for dynamic dispatch.
pub trait HandlerBoxed<T>: Send + 'static {
    /// Processes `value` (boxed future for object safety).
    fn handle_boxed(
        &mut self,
        value: T,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send + '_>>;
}

/// Blanket implementation: any `Handler` can be used as `HandlerBoxed`.
impl<T, H> HandlerBoxed<T> for H
where
    T: Send + 'static,
    H: Handler<T>,
{
    fn handle_boxed(
        &mut self,
        value: T,
    ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send + '_>> {
        Box::pin(self.handle(value))
    }
}

impl<T: Send + 'static> Handler<T> for Box<dyn HandlerBoxed<T>> {
    fn handle(&mut self, value: T) -> impl Future<Output = HandlerResult> + Send + '_ {
        self.as_mut().handle_boxed(value)
    }
}

/// Values a handler closure may return.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoHandlerResult for Result<(), E> {
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

/// A synchronous closure lifted into a [`Handler`]. See [`sync_handler`].
#[derive(Clone)]
pub struct SyncFn<F>(F);

/// An async closure lifted into a [`Handler`]. See [`async_handler`].
#[derive(Clone)]
pub struct AsyncFn<F>(F);

/// Wraps a synchronous callback.
///
/// ```
/// use batchpipe::sync_handler;
///
/// let handler = sync_handler(|batch: Vec<u32>| println!("got {} items", batch.len()));
/// # drop(handler);
/// ```
pub fn sync_handler<T, F, R>(f: F) -> SyncFn<F>
where
    F: FnMut(T) -> R + Send + 'static,
    R: IntoHandlerResult,
{
    SyncFn(f)
}

/// Wraps an async callback.
///
/// ```
/// use batchpipe::async_handler;
///
/// let handler = async_handler(|item: String| async move {
///     tokio::task::yield_now().await;
///     println!("{item}");
/// });
/// # drop(handler);
/// ```
pub fn async_handler<T, F, Fut>(f: F) -> AsyncFn<F>
where
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    AsyncFn(f)
}

impl<T, F, R> Handler<T> for SyncFn<F>
where
    T: Send + 'static,
    F: FnMut(T) -> R + Send + 'static,
    R: IntoHandlerResult,
{
    fn handle(&mut self, value: T) -> impl Future<Output = HandlerResult> + Send + '_ {
        std::future::ready((self.0)(value).into_handler_result())
    }
}

impl<T, F, Fut> Handler<T> for AsyncFn<F>
where
    T: Send + 'static,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    fn handle(&mut self, value: T) -> impl Future<Output = HandlerResult> + Send + '_ {
        let fut = (self.0)(value);
        async move { fut.await.into_handler_result() }
    }
}
