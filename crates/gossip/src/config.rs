//! Gossip engine configuration.

use std::time::Duration;

/// Configuration for the [`Gossip`](crate::Gossip) engine.
///
/// # Example
///
/// ```
/// use quorumcast_gossip::GossipConfig;
/// use std::time::Duration;
///
/// let config = GossipConfig::default()
///     .with_heartbeat_interval(Duration::from_millis(500))
///     .with_fanout(8);
/// ```
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Interval between heartbeat rounds (digest broadcast + cache shift).
    ///
    /// Default: 1 second
    pub heartbeat_interval: Duration,

    /// Number of peers each heartbeat advertises to.
    ///
    /// Default: 6
    pub fanout: usize,

    /// How long a delivered message id stays in the seen set.
    ///
    /// Default: 2 minutes
    pub seen_ttl: Duration,

    /// Maximum number of seen-set entries before LRU eviction.
    ///
    /// Default: 4096
    pub seen_capacity: usize,

    /// Number of cache generations retained.
    ///
    /// Default: 5
    pub cache_generations: usize,

    /// Maximum messages per cache generation; bounds the digest advertised
    /// per heartbeat.
    ///
    /// Default: 300
    pub generation_capacity: usize,

    /// Poll interval of the startup liveness gate.
    ///
    /// Default: 10 milliseconds
    pub liveness_poll_interval: Duration,

    /// Per-peer ping timeout during the liveness gate.
    ///
    /// Default: 1 second
    pub liveness_ping_timeout: Duration,

    /// Timeout for collecting anti-entropy pull replies.
    ///
    /// Default: 1 second
    pub pull_timeout: Duration,

    /// Seed for the peer-sampling RNG; `None` seeds from entropy.
    /// Fixing the seed makes fan-out reproducible in tests.
    ///
    /// Default: `None`
    pub sample_seed: Option<u64>,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            fanout: 6,
            seen_ttl: Duration::from_secs(120),
            seen_capacity: 4096,
            cache_generations: 5,
            generation_capacity: 300,
            liveness_poll_interval: Duration::from_millis(10),
            liveness_ping_timeout: Duration::from_secs(1),
            pull_timeout: Duration::from_secs(1),
            sample_seed: None,
        }
    }
}

impl GossipConfig {
    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat fan-out degree.
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Set the seen-set TTL.
    pub fn with_seen_ttl(mut self, ttl: Duration) -> Self {
        self.seen_ttl = ttl;
        self
    }

    /// Set the seen-set capacity.
    pub fn with_seen_capacity(mut self, capacity: usize) -> Self {
        self.seen_capacity = capacity;
        self
    }

    /// Set the retained generation count and per-generation capacity.
    pub fn with_cache_bounds(mut self, generations: usize, per_generation: usize) -> Self {
        self.cache_generations = generations;
        self.generation_capacity = per_generation;
        self
    }

    /// Set the anti-entropy pull timeout.
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Set the peer-sampling seed.
    pub fn with_sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }

    /// Create config for fast local testing: tight timers, seeded sampling.
    pub fn for_testing() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(50),
            seen_ttl: Duration::from_secs(5),
            liveness_poll_interval: Duration::from_millis(5),
            liveness_ping_timeout: Duration::from_millis(250),
            pull_timeout: Duration::from_millis(250),
            sample_seed: Some(42),
            ..Self::default()
        }
    }
}
