/// Sizing and feature knobs for a [`crate::Ring`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Ring capacity as a power of two (default: 16, i.e. 64K slots).
    pub ring_bits: u8,
    /// Whether to track send/receive counters (adds a handful of atomic ops
    /// per batch; off by default).
    pub enable_metrics: bool,
}

impl Config {
    /// # Panics
    ///
    /// Panics if `ring_bits` is 0 or greater than 20 — the latter already
    /// means a million-slot ring, well past anywhere sizing this knob
    /// higher makes sense.
    pub const fn new(ring_bits: u8, enable_metrics: bool) -> Self {
        assert!(
            ring_bits > 0 && ring_bits <= 20,
            "ring_bits must be between 1 and 20 (max 1M slots)"
        );

        Self {
            ring_bits,
            enable_metrics,
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        1 << self.ring_bits
    }

    #[inline]
    pub const fn mask(&self) -> usize {
        self.capacity() - 1
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ring_bits: 16,
            enable_metrics: false,
        }
    }
}

/// 4K slots — small enough to stay resident in L1 on most cores.
pub const LOW_LATENCY_CONFIG: Config = Config::new(12, false);

/// 256K slots, for bursty producers that outrun the consumer for a while.
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(18, false);
