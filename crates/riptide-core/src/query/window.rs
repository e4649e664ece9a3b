//! Window specifications for joins and aggregations.

use std::time::Duration;

/// A time-bounded grouping policy over an unbounded stream.
///
/// Every render site matches exhaustively over the three variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    /// Fixed-size, non-overlapping windows.
    Tumbling {
        /// Window size.
        size: Duration,
    },
    /// Fixed-size windows advancing by a smaller interval.
    Hopping {
        /// Window size.
        size: Duration,
        /// Advance interval.
        advance: Duration,
    },
    /// Dynamic windows keyed by an inactivity gap.
    Session {
        /// Inactivity gap closing the window.
        gap: Duration,
    },
}

impl WindowSpec {
    /// A tumbling window of `size`.
    #[must_use]
    pub fn tumbling(size: Duration) -> Self {
        WindowSpec::Tumbling { size }
    }

    /// A hopping window of `size` advancing by `advance`.
    #[must_use]
    pub fn hopping(size: Duration, advance: Duration) -> Self {
        WindowSpec::Hopping { size, advance }
    }

    /// A session window closing after `gap` of inactivity.
    #[must_use]
    pub fn session(gap: Duration) -> Self {
        WindowSpec::Session { gap }
    }
}
