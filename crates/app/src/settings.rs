//! Runtime-adjustable concurrency settings.

use serde::Serialize;

use pipervox_queue::clamp_capacity;

/// User-facing thread settings mirrored by the `/settings` endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Settings {
    #[serde(rename = "maxThreads")]
    pub max_threads: usize,
    #[serde(rename = "autoDetectThreads")]
    pub auto_detect: bool,
}

/// CPU count reported to clients and used for auto-detection.
pub fn detected_cpu_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Auto-detected concurrency cap: twice the host's parallelism, kept
/// inside the queue's admissible range.
pub fn auto_thread_count(cpu_cores: usize) -> usize {
    clamp_capacity(cpu_cores * 2)
}
