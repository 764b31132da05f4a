//! Engine configuration, mirroring the host control surface's
//! `create(astBytes, options)` options object. Plain-data struct in the same
//! spirit as the teacher's `HardwareSpec`/`ProgramSpec`: no behavior, just a
//! typed bag of knobs with a sensible [Default].

/// Options accepted by [crate::Engine::create].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineOptions {
    /// Upper bound on iterations for any single loop (independent per loop
    /// instance, not a global counter).
    pub max_loop_iterations: u32,
    /// Reserved for host-side verbosity; does not currently change engine
    /// behavior but is threaded through so options round-trip.
    pub verbose: bool,
    /// Gates the `debug_trace!` instrumentation sprinkled through phase
    /// transitions.
    pub debug: bool,
    /// `true` (the default) runs external reads against the deterministic
    /// mock source and never suspends. `false` uses the request/response
    /// suspension protocol (§4.9).
    pub sync_mode: bool,
    /// Reserved delay (in milliseconds) a stepping host may wait between
    /// statements; the core does not sleep itself, but exposes the value to
    /// callers who want consistent single-step pacing.
    pub step_delay_ms: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_loop_iterations: 3,
            verbose: false,
            debug: false,
            sync_mode: true,
            step_delay_ms: 0,
        }
    }
}

impl EngineOptions {
    pub fn with_max_loop_iterations(mut self, n: u32) -> Self {
        self.max_loop_iterations = n;
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: bool) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_step_delay_ms(mut self, step_delay_ms: u32) -> Self {
        self.step_delay_ms = step_delay_ms;
        self
    }
}
