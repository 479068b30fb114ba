//! Tunables for the selector, channels, and the worker pool.
//!
//! Builder-style option structs, in the spirit of the teacher's
//! `SocketOptions` (`with_*` methods returning `Self`), trimmed to the
//! handful of knobs the core actually exposes.

/// Per-channel tunables.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    read_aggressiveness: u32,
    write_aggressiveness: u32,
    default_buffer_size: usize,
}

impl ChannelConfig {
    /// Default read/write aggressiveness (2) and a 64 KiB read buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_aggressiveness: 2,
            write_aggressiveness: 2,
            default_buffer_size: 64 * 1024,
        }
    }

    /// Set how many back-to-back `read` syscalls are attempted per
    /// readiness notification. Must be >= 1.
    #[must_use]
    pub const fn with_read_aggressiveness(mut self, n: u32) -> Self {
        assert!(n >= 1, "read_aggressiveness must be >= 1");
        self.read_aggressiveness = n;
        self
    }

    /// Set how many back-to-back `write` syscalls a single aggressive-write
    /// iteration performs before checking for remaining bytes. Must be >= 1.
    #[must_use]
    pub const fn with_write_aggressiveness(mut self, n: u32) -> Self {
        assert!(n >= 1, "write_aggressiveness must be >= 1");
        self.write_aggressiveness = n;
        self
    }

    /// Set the default size of buffers acquired for `Channel::read`.
    #[must_use]
    pub const fn with_default_buffer_size(mut self, size: usize) -> Self {
        self.default_buffer_size = size;
        self
    }

    #[must_use]
    pub const fn read_aggressiveness(&self) -> u32 {
        self.read_aggressiveness
    }

    #[must_use]
    pub const fn write_aggressiveness(&self) -> u32 {
        self.write_aggressiveness
    }

    #[must_use]
    pub const fn default_buffer_size(&self) -> usize {
        self.default_buffer_size
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Selector/worker-pool tunables.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    worker_threads: usize,
}

impl SelectorConfig {
    /// Defaults `worker_threads` to `num_cpus::get()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_threads: num_cpus::get().max(1),
        }
    }

    /// Set the number of worker-pool threads. Must be >= 1.
    #[must_use]
    pub fn with_worker_threads(mut self, n: usize) -> Self {
        assert!(n >= 1, "worker_threads must be >= 1");
        self.worker_threads = n;
        self
    }

    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_config_defaults() {
        let cfg = ChannelConfig::default();
        assert_eq!(cfg.read_aggressiveness(), 2);
        assert_eq!(cfg.write_aggressiveness(), 2);
        assert_eq!(cfg.default_buffer_size(), 64 * 1024);
    }

    #[test]
    fn channel_config_builder() {
        let cfg = ChannelConfig::new()
            .with_read_aggressiveness(4)
            .with_write_aggressiveness(1)
            .with_default_buffer_size(4096);
        assert_eq!(cfg.read_aggressiveness(), 4);
        assert_eq!(cfg.write_aggressiveness(), 1);
        assert_eq!(cfg.default_buffer_size(), 4096);
    }

    #[test]
    fn selector_config_default_is_at_least_one_thread() {
        assert!(SelectorConfig::default().worker_threads() >= 1);
    }
}
