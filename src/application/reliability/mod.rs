pub mod circuit_breaker;
pub mod clock;
pub mod retry_policy;
