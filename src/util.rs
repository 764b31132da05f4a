//! Small cross-cutting helpers shared by the rest of the crate.

/// Macro that wraps any body, executing it only when both the crate is built
/// with debug assertions on *and* the engine's `debug` option is set. Mirrors
/// the environment-variable-gated `debug!` convention used elsewhere in this
/// codebase's lineage, but routes through the `log` crate so a host that has
/// installed a logger observes the same events structurally instead of raw
/// stdout.
///
/// ```
/// use avr_sim_core::debug_trace;
/// let debug_enabled = false;
/// debug_trace!(debug_enabled, "value = {}", 42);
/// ```
#[macro_export]
macro_rules! debug_trace {
    ($enabled:expr, $($arg:tt)*) => {
        #[cfg(debug_assertions)]
        {
            if $enabled {
                log::debug!($($arg)*);
            }
        }
    };
}
