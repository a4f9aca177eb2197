//! Configuration value objects for the routing core.
//!
//! Reference: SPEC_FULL.md Section 2 ("Configuration").

/// Construction parameters for a [`Router`](crate::domain::router::Router).
///
/// This is in-process configuration only (constructor arguments) -- there
/// is no file or environment loading anywhere in this crate, mirroring the
/// teacher's `KademliaConfig` shape but trimmed to exactly what the routing
/// core needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Bit length `L` of every id handled by this router.
    pub bit_length: u32,
    /// Live bucket capacity `k`.
    pub bucket_size: usize,
    /// Replacement-cache capacity `c`.
    pub cache_size: usize,
    /// Near-set capacity `n`.
    pub near_set_size: usize,
    /// Branching factor `b` of the bucket tree (spec.md Section 4.5; `1` in
    /// the simplest formulation, the only value this core implements).
    pub branch_factor: u32,
}

impl RouterConfig {
    pub fn new(
        bit_length: u32,
        bucket_size: usize,
        cache_size: usize,
        near_set_size: usize,
    ) -> Self {
        Self {
            bit_length,
            bucket_size,
            cache_size,
            near_set_size,
            branch_factor: 1,
        }
    }

    /// Small capacities convenient for deterministic unit tests, matching
    /// the concrete scenarios of spec.md Section 8 (`k = c = n = 2`, 4-bit
    /// ids).
    pub fn for_testing() -> Self {
        Self::new(4, 2, 2, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_testing_matches_spec_scenarios() {
        let config = RouterConfig::for_testing();
        assert_eq!(config.bit_length, 4);
        assert_eq!(config.bucket_size, 2);
        assert_eq!(config.cache_size, 2);
        assert_eq!(config.near_set_size, 2);
        assert_eq!(config.branch_factor, 1);
    }
}
