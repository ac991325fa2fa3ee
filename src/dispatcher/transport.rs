use crate::domain::{LogRecord, Severity};
use std::future::Future;
use std::pin::Pin;

/// A delivery sink for log records.
///
/// The dispatcher polls [`Transport::level`] on every dispatch; `None` means
/// the transport is disabled and receives nothing.
///
/// This trait is dyn-compatible by using boxed futures instead of `impl Future`.
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    fn level(&self) -> Option<Severity>;

    /// Fire-and-forget delivery. Must not block on I/O.
    fn emit(&self, record: &LogRecord);

    /// Waits for in-flight deliveries. Called once at shutdown.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}
