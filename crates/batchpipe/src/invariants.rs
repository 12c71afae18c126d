//! Debug assertion macros for pipe invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is zero
//! overhead in release builds.

// =============================================================================
// INV-DRAIN-01: Drain Ceiling
// =============================================================================

/// Assert that one drain never returned more than the effective `max_len`.
///
/// **Invariant**: `|get_many(max_len)| <= max_len`
///
/// Used in: `BatchConsumer::drain()`
macro_rules! debug_assert_drain_within_limit {
    ($drained:expr, $max_len:expr) => {
        debug_assert!(
            $drained <= $max_len,
            "INV-DRAIN-01 violated: drained {} items with max_len {}",
            $drained,
            $max_len
        )
    };
}

// =============================================================================
// INV-STOP-01: Final Drain Before Stop
// =============================================================================

/// Assert that the loop only clears residual items after a short drain.
///
/// **Invariant**: `stopped → last_drain < max_len`
///
/// Used in: `BatchConsumer::run()` before the residual clear
macro_rules! debug_assert_final_drain {
    ($last_drained:expr, $max_len:expr) => {
        debug_assert!(
            $last_drained < $max_len,
            "INV-STOP-01 violated: stopping after a full drain of {} items; backlog would be discarded",
            $last_drained
        )
    };
}

// =============================================================================
// INV-SEND-01: Data Before Signal
// =============================================================================

/// Assert that a signal token is only written after its batch was accepted.
///
/// **Invariant**: `put(signal) → put_many(values) succeeded`
///
/// Used in: `BatchSender::send()`
macro_rules! debug_assert_data_before_signal {
    ($data_accepted:expr) => {
        debug_assert!(
            $data_accepted,
            "INV-SEND-01 violated: signal written before data was accepted"
        )
    };
}

pub(crate) use debug_assert_data_before_signal;
pub(crate) use debug_assert_drain_within_limit;
pub(crate) use debug_assert_final_drain;
