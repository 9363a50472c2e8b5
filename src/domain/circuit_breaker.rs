// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-agent circuit breaker state machine.
//!
//! `(state, failure_count, last_failure)` lives in one struct guarded by one
//! lock at the call site (see [`crate::application::hardening`]), so that the
//! open-to-half-open transition and the "let exactly one caller through"
//! decision happen atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub state: BreakerState,
    pub failure_count: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            last_success: None,
        }
    }
}

/// What a caller should do before attempting the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    Reject,
}

impl CircuitBreaker {
    /// Gate a call. Transitions `open -> half-open` in place when `timeout`
    /// has elapsed, so the next caller (and only the next caller) is
    /// admitted.
    pub fn admit(&mut self, timeout: chrono::Duration, now: DateTime<Utc>) -> Admission {
        if self.state != BreakerState::Open {
            return Admission::Proceed;
        }

        let elapsed_ok = match self.last_failure {
            Some(last) => now - last >= timeout,
            None => true,
        };

        if elapsed_ok {
            self.state = BreakerState::HalfOpen;
            self.failure_count = 0;
            Admission::Proceed
        } else {
            Admission::Reject
        }
    }

    /// Record a success.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        if self.state == BreakerState::HalfOpen {
            self.state = BreakerState::Closed;
        }
        self.last_success = Some(now);
    }

    /// Record a failure. Returns `true` if this call just tripped the
    /// breaker open (caller should emit `circuitBreakerOpened`).
    pub fn record_failure(&mut self, threshold: u32, now: DateTime<Utc>) -> bool {
        self.failure_count += 1;
        self.last_failure = Some(now);

        if self.state == BreakerState::HalfOpen {
            self.state = BreakerState::Open;
            return true;
        }

        if self.failure_count >= threshold && self.state != BreakerState::Open {
            self.state = BreakerState::Open;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn opens_after_threshold_failures() {
        let mut breaker = CircuitBreaker::default();
        assert!(!breaker.record_failure(3, t(0)));
        assert!(!breaker.record_failure(3, t(1)));
        assert!(breaker.record_failure(3, t(2)));
        assert_eq!(breaker.state, BreakerState::Open);
    }

    #[test]
    fn rejects_while_open_then_half_opens_after_timeout() {
        let mut breaker = CircuitBreaker::default();
        breaker.record_failure(1, t(0));
        assert_eq!(breaker.state, BreakerState::Open);

        let timeout = chrono::Duration::seconds(60);
        assert_eq!(breaker.admit(timeout, t(10)), Admission::Reject);
        assert_eq!(breaker.admit(timeout, t(61)), Admission::Proceed);
        assert_eq!(breaker.state, BreakerState::HalfOpen);
        assert_eq!(breaker.failure_count, 0);
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let mut breaker = CircuitBreaker::default();
        breaker.state = BreakerState::HalfOpen;
        breaker.record_success(t(0));
        assert_eq!(breaker.state, BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let mut breaker = CircuitBreaker::default();
        breaker.state = BreakerState::HalfOpen;
        assert!(breaker.record_failure(5, t(0)));
        assert_eq!(breaker.state, BreakerState::Open);
    }
}
