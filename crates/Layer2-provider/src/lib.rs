//! # cmdgen-provider
//!
//! Backend invocation layer for cmdgen.
//! The backend is an external text-generation CLI, invoked once per request.
//!
//! ## Features
//! - Process backend with per-call timeout (child killed on timeout or drop)
//! - Circuit breaker persisted across processes (CLOSED / OPEN / HALF_OPEN)
//! - Invocation slot pool bounding concurrent backend processes
//! - Sliding-window rate limiter persisted across processes
//! - Gateway combining the above behind one `invoke` call

pub mod backend;
pub mod breaker;
pub mod error;
pub mod gateway;
pub mod pool;
pub mod rate_limit;
mod shared;

// Core traits and types
pub use backend::{Backend, BackendOutput, ProcessBackend};
pub use gateway::Gateway;

// Coordination
pub use breaker::{Admission, BreakerState, BreakerStatus, CircuitBreaker, BREAKER_RECORD};
pub use pool::{InvocationPool, PoolSlot};
pub use rate_limit::{RateLimiter, RateWindow, RATE_LIMIT_RECORD};
pub use shared::{lock_record_async, update_json_async};

// Error
pub use error::BackendError;
