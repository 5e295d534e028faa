//! Engine configuration

use paygate_cache::CacheTtls;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL the hosted form is reachable at, used to build
    /// `PaymentURL` in init responses.
    pub public_base_url: String,
    /// Global floor for a single payment, minor units
    pub global_min_amount: i64,
    /// Global cap for a single payment, minor units
    pub global_max_amount: i64,
    /// Applied when the caller omits `PaymentExpiry`
    pub default_expiry_minutes: i64,
    /// Lower bound for caller-supplied `PaymentExpiry`
    pub min_expiry_minutes: i64,
    /// Upper bound for caller-supplied `PaymentExpiry` (30 days)
    pub max_expiry_minutes: i64,
    /// Rows claimed per expiry-sweep pass
    pub sweep_batch: i64,
    pub ttls: CacheTtls,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8080".to_string(),
            global_min_amount: 100,
            global_max_amount: 100_000_000,
            default_expiry_minutes: 30,
            min_expiry_minutes: 5,
            max_expiry_minutes: 43_200,
            sweep_batch: 500,
            ttls: CacheTtls::default(),
        }
    }
}
