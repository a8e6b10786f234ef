//! Reporting of subscriber failures.

use std::fmt;
use tracing::warn;

/// Which notification tier a callback was invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Direct,
    Cascade,
    Wildcard,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Direct => "direct",
            Tier::Cascade => "cascade",
            Tier::Wildcard => "wildcard",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscriber callback returned an error during notification.
///
/// The failure is isolated: the write that triggered it still succeeds and
/// the remaining callbacks still run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    /// Path the callback was registered on (empty for the wildcard tier).
    pub path: String,
    /// Path of the `set` call that triggered the notification.
    pub written_path: String,
    pub tier: Tier,
    pub message: String,
}

impl fmt::Display for SubscriberFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} subscriber on '{}' failed while handling set('{}'): {}",
            self.tier, self.path, self.written_path, self.message
        )
    }
}

/// Destination for subscriber failures, supplied when the store is built.
pub trait DiagnosticSink {
    fn report(&self, failure: &SubscriberFailure);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&SubscriberFailure),
{
    fn report(&self, failure: &SubscriberFailure) {
        self(failure);
    }
}

/// Default sink: logs each failure as a `tracing` warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, failure: &SubscriberFailure) {
        warn!(
            tier = %failure.tier,
            path = %failure.path,
            written_path = %failure.written_path,
            "Subscriber failed: {}",
            failure.message
        );
    }
}
