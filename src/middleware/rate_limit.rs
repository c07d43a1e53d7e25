//! Sliding-window POST throttle keyed by client address

use super::{ChainState, Gate};
use crate::config::RateLimitConfig;
use crate::models::{Decision, GateRequest, RejectionKind};
use chrono::{DateTime, Local};
use hyper::Method;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Recent request timestamps per client address.
///
/// Created once at server start and shared by every request. One lock
/// guards the whole map, so the read-evict-append sequence of a client is
/// never interleaved with another request's.
#[derive(Debug, Default)]
pub struct RateLimitStore {
    clients: Mutex<HashMap<String, VecDeque<DateTime<Local>>>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation leaves the map consistent, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<DateTime<Local>>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evict expired timestamps for `client`, then record `now` if fewer than
    /// `max_requests` remain. Returns whether the request was admitted.
    pub fn check_and_record(
        &self,
        client: &str,
        now: DateTime<Local>,
        max_requests: usize,
        window: chrono::Duration,
    ) -> bool {
        let mut clients = self.lock();
        let timestamps = clients.entry(client.to_string()).or_default();

        evict_expired(timestamps, now, window);

        if timestamps.len() >= max_requests {
            return false;
        }

        // Keep the sequence non-decreasing even if arrivals are stamped out of order
        let stamp = match timestamps.back() {
            Some(last) if *last > now => *last,
            _ => now,
        };
        timestamps.push_back(stamp);
        true
    }

    /// Drop clients whose every timestamp has left the window.
    /// Returns the number of clients removed.
    pub fn sweep(&self, now: DateTime<Local>, window: chrono::Duration) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, timestamps| {
            evict_expired(timestamps, now, window);
            !timestamps.is_empty()
        });
        before - clients.len()
    }

    /// Number of client addresses currently held in memory
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Timestamps currently stored for a client, oldest first
    pub fn history(&self, client: &str) -> Vec<DateTime<Local>> {
        self.lock()
            .get(client)
            .map(|timestamps| timestamps.iter().copied().collect())
            .unwrap_or_default()
    }
}

fn evict_expired(timestamps: &mut VecDeque<DateTime<Local>>, now: DateTime<Local>, window: chrono::Duration) {
    let Some(cutoff) = now.checked_sub_signed(window) else {
        return;
    };
    while timestamps.front().is_some_and(|oldest| *oldest < cutoff) {
        timestamps.pop_front();
    }
}

/// Throttles POST requests per client within a sliding window
pub struct RateLimiter {
    store: Arc<RateLimitStore>,
    max_messages: usize,
    window: Duration,
    window_delta: chrono::Duration,
    message: String,
}

impl RateLimiter {
    pub fn new(store: Arc<RateLimitStore>, max_messages: usize, window: Duration) -> Self {
        let window_delta =
            chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let message = format!(
            "Too many messages from your IP address. Limit is {} messages per {} seconds.",
            max_messages,
            window.as_secs()
        );
        Self {
            store,
            max_messages,
            window,
            window_delta,
            message,
        }
    }

    pub fn from_config(store: Arc<RateLimitStore>, config: &RateLimitConfig) -> Self {
        Self::new(store, config.max_messages, Duration::from_secs(config.window_seconds))
    }

    pub fn store(&self) -> &Arc<RateLimitStore> {
        &self.store
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Sweep idle clients as of `now`
    pub fn sweep(&self, now: DateTime<Local>) -> usize {
        self.store.sweep(now, self.window_delta)
    }
}

impl Gate for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn stage(&self) -> ChainState {
        ChainState::RateChecked
    }

    fn evaluate(&self, request: &GateRequest) -> Decision {
        if request.method != Method::POST {
            return Decision::Pass;
        }

        let Some(client) = request.client_identity() else {
            warn!("Could not determine client address for POST {}, allowing request", request.path);
            return Decision::Pass;
        };

        if self
            .store
            .check_and_record(client, request.arrival, self.max_messages, self.window_delta)
        {
            debug!("POST from {} admitted by rate limiter", client);
            Decision::Pass
        } else {
            warn!("Client {} exceeded rate limit", client);
            Decision::reject(RejectionKind::ForbiddenRateLimit, self.message.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rejection;
    use chrono::TimeZone;

    fn base() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 19, 0, 0).unwrap()
    }

    fn post(client: &str, offset_secs: i64) -> GateRequest {
        GateRequest::new(Method::POST, "/api/messages/", base() + chrono::Duration::seconds(offset_secs))
            .with_remote_addr(client)
    }

    fn limiter(max: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(Arc::new(RateLimitStore::new()), max, Duration::from_secs(window_secs))
    }

    #[test]
    fn test_five_per_minute_scenario() {
        let limiter = limiter(5, 60);

        for t in 0..5 {
            assert!(limiter.evaluate(&post("1.2.3.4", t)).is_pass(), "request at t={}", t);
        }

        assert_eq!(
            limiter.evaluate(&post("1.2.3.4", 5)),
            Decision::Reject(Rejection::new(
                RejectionKind::ForbiddenRateLimit,
                "Too many messages from your IP address. Limit is 5 messages per 60 seconds."
            ))
        );

        // The t=0 request has expired by t=61
        assert!(limiter.evaluate(&post("1.2.3.4", 61)).is_pass());
    }

    #[test]
    fn test_rejected_requests_are_not_recorded() {
        let limiter = limiter(2, 60);
        assert!(limiter.evaluate(&post("1.2.3.4", 0)).is_pass());
        assert!(limiter.evaluate(&post("1.2.3.4", 1)).is_pass());
        for t in 2..10 {
            assert!(!limiter.evaluate(&post("1.2.3.4", t)).is_pass());
        }
        assert_eq!(limiter.store().history("1.2.3.4").len(), 2);
    }

    #[test]
    fn test_window_fully_drains() {
        let limiter = limiter(3, 60);
        for t in 0..3 {
            assert!(limiter.evaluate(&post("1.2.3.4", t)).is_pass());
        }
        assert!(!limiter.evaluate(&post("1.2.3.4", 30)).is_pass());

        assert!(limiter.evaluate(&post("1.2.3.4", 200)).is_pass());
        assert_eq!(limiter.store().history("1.2.3.4").len(), 1);
    }

    #[test]
    fn test_entry_exactly_window_old_still_counts() {
        let limiter = limiter(1, 60);
        assert!(limiter.evaluate(&post("1.2.3.4", 0)).is_pass());
        assert!(!limiter.evaluate(&post("1.2.3.4", 60)).is_pass());
        assert!(limiter.evaluate(&post("1.2.3.4", 61)).is_pass());
    }

    #[test]
    fn test_non_post_methods_pass_untouched() {
        let limiter = limiter(1, 60);
        for method in [Method::GET, Method::PUT, Method::PATCH, Method::DELETE, Method::HEAD] {
            for t in 0..20 {
                let mut req = post("1.2.3.4", t);
                req.method = method.clone();
                assert!(limiter.evaluate(&req).is_pass());
            }
        }
        assert_eq!(limiter.store().tracked_clients(), 0);
    }

    #[test]
    fn test_clients_are_isolated() {
        let limiter = limiter(1, 60);
        assert!(limiter.evaluate(&post("1.2.3.4", 0)).is_pass());
        assert!(limiter.evaluate(&post("5.6.7.8", 0)).is_pass());
        assert!(!limiter.evaluate(&post("1.2.3.4", 1)).is_pass());
    }

    #[test]
    fn test_forwarded_for_identity() {
        let limiter = limiter(1, 60);
        let first = post("10.0.0.1", 0).with_forwarded_for("1.2.3.4, 10.0.0.1");
        let second = post("10.0.0.1", 1).with_forwarded_for(" 1.2.3.4 ");
        let other = post("10.0.0.1", 2).with_forwarded_for("5.6.7.8");

        assert!(limiter.evaluate(&first).is_pass());
        assert!(!limiter.evaluate(&second).is_pass());
        assert!(limiter.evaluate(&other).is_pass());
    }

    #[test]
    fn test_unresolvable_client_fails_open() {
        let limiter = limiter(1, 60);
        for t in 0..5 {
            let req = GateRequest::new(Method::POST, "/api/messages/", base() + chrono::Duration::seconds(t));
            assert!(limiter.evaluate(&req).is_pass());
        }
        assert_eq!(limiter.store().tracked_clients(), 0);
    }

    #[test]
    fn test_out_of_order_arrivals_stay_monotonic() {
        let store = RateLimitStore::new();
        let window = chrono::Duration::seconds(60);
        assert!(store.check_and_record("c", base() + chrono::Duration::seconds(10), 5, window));
        assert!(store.check_and_record("c", base() + chrono::Duration::seconds(9), 5, window));

        let history = store.history("c");
        assert!(history.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_sweep_removes_only_idle_clients() {
        let limiter = limiter(5, 60);
        assert!(limiter.evaluate(&post("idle", 0)).is_pass());
        assert!(limiter.evaluate(&post("active", 100)).is_pass());
        assert_eq!(limiter.store().tracked_clients(), 2);

        let removed = limiter.sweep(base() + chrono::Duration::seconds(120));
        assert_eq!(removed, 1);
        assert_eq!(limiter.store().tracked_clients(), 1);
        assert_eq!(limiter.store().history("active").len(), 1);
        assert!(limiter.store().history("idle").is_empty());
    }

    #[test]
    fn test_concurrent_posts_from_one_client() {
        let limiter = Arc::new(limiter(5, 60));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.evaluate(&post("1.2.3.4", 0)).is_pass())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|passed| *passed)
            .count();
        assert_eq!(admitted, 5);
    }
}
