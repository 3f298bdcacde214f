use std::time::Instant;
use tracing::debug;

/// Scoped timer that reports how long a section took when it drops.
pub struct DebugTimer {
    module: &'static str,
    name: &'static str,
    start: Instant,
}

impl DebugTimer {
    pub fn new(module: &'static str, name: &'static str) -> Self {
        Self { module, name, start: Instant::now() }
    }
}

impl Drop for DebugTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis();
        debug!(module = self.module, section = self.name, elapsed_ms, "section timing");
    }
}
