//! Sliding-window rate limiter.
//!
//! Each `(client identity, endpoint)` pair keeps the instants of its accepted
//! requests inside the trailing window. State is process-local and
//! best-effort: separate processes enforce their limits independently.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tracing::debug;

/// Entries untouched for this long are purged.
pub const ENTRY_TTL: Duration = Duration::from_secs(10 * 60);

/// Minimum spacing between opportunistic purges.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// A request budget: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub const fn per_minutes(max_requests: u32, minutes: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(minutes * 60))
    }
}

/// Outcome of a single `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
    /// `now + window`. An upper bound on when budget frees up, not the exact
    /// instant the oldest request ages out.
    pub reset_at: Instant,
}

/// A rejected request, with what a 429 response needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub endpoint: String,
    pub limit: u32,
    pub retry_after_secs: u64,
    /// Unix time (seconds) matching `reset_at`.
    pub reset_epoch_secs: u64,
}

impl fmt::Display for RateLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rate limit exceeded for {}; retry after {}s",
            self.endpoint, self.retry_after_secs
        )
    }
}

#[derive(Debug)]
struct WindowEntry {
    timestamps: VecDeque<Instant>,
    last_access: Instant,
}

/// Sliding-window limiter owned by the application state.
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<String, WindowEntry>,
    last_purge: Mutex<Instant>,
    entry_ttl: Duration,
    purge_interval: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_gc(ENTRY_TTL, PURGE_INTERVAL)
    }

    /// Limiter with custom garbage-collection timings.
    pub fn with_gc(entry_ttl: Duration, purge_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            last_purge: Mutex::new(Instant::now()),
            entry_ttl,
            purge_interval,
        }
    }

    /// Record a request attempt now.
    pub fn check(&self, identity: &str, endpoint: &str, limit: RateLimit) -> RateLimitDecision {
        self.check_at(identity, endpoint, limit, Instant::now())
    }

    /// Record a request attempt at `now`.
    ///
    /// Rejected attempts are not recorded, so hammering a limited endpoint
    /// does not push the window further out.
    pub fn check_at(
        &self,
        identity: &str,
        endpoint: &str,
        limit: RateLimit,
        now: Instant,
    ) -> RateLimitDecision {
        // Purge first: retain() locks every shard, so no entry guard may be live.
        self.maybe_purge(now);

        let key = format!("{identity}:{endpoint}");
        let mut entry = self.entries.entry(key).or_insert_with(|| WindowEntry {
            timestamps: VecDeque::new(),
            last_access: now,
        });

        if let Some(cutoff) = now.checked_sub(limit.window) {
            while entry.timestamps.front().is_some_and(|&t| t <= cutoff) {
                entry.timestamps.pop_front();
            }
        }

        let retained = u32::try_from(entry.timestamps.len()).unwrap_or(u32::MAX);
        let limited = retained >= limit.max_requests;
        if !limited {
            entry.timestamps.push_back(now);
        }
        entry.last_access = now;

        let used = if limited { retained } else { retained.saturating_add(1) };
        RateLimitDecision {
            limited,
            limit: limit.max_requests,
            remaining: limit.max_requests.saturating_sub(used),
            reset_at: now.checked_add(limit.window).unwrap_or(now),
        }
    }

    /// `check`, turning a limited decision into an error.
    pub fn enforce(
        &self,
        identity: &str,
        endpoint: &str,
        limit: RateLimit,
    ) -> Result<RateLimitDecision, RateLimited> {
        self.enforce_at(identity, endpoint, limit, Instant::now())
    }

    pub fn enforce_at(
        &self,
        identity: &str,
        endpoint: &str,
        limit: RateLimit,
        now: Instant,
    ) -> Result<RateLimitDecision, RateLimited> {
        let decision = self.check_at(identity, endpoint, limit, now);
        if !decision.limited {
            return Ok(decision);
        }
        let wait = decision.reset_at.saturating_duration_since(now);
        let retry_after_secs = ceil_secs(wait).max(1);
        let reset_epoch_secs = SystemTime::now()
            .checked_add(wait)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Err(RateLimited {
            endpoint: endpoint.to_string(),
            limit: decision.limit,
            retry_after_secs,
            reset_epoch_secs,
        })
    }

    /// Remove entries idle for longer than the TTL. Returns the number removed.
    pub fn purge_stale(&self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.entry_ttl;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.last_access) < ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_purge(&self, now: Instant) {
        // Another request already purging is good enough.
        let Ok(mut last) = self.last_purge.try_lock() else {
            return;
        };
        if now.saturating_duration_since(*last) < self.purge_interval {
            return;
        }
        *last = now;
        drop(last);
        let removed = self.purge_stale(now);
        if removed > 0 {
            debug!(removed, remaining = self.len(), "purged idle rate-limit entries");
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Logical endpoints guarded by the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Register,
    Login,
    ForgotPassword,
    /// Per-address budget on reset emails; enforced silently.
    ForgotPasswordEmail,
    ResetPassword,
    VerifyEmail,
    ResendVerification,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Register => "register",
            Endpoint::Login => "login",
            Endpoint::ForgotPassword => "forgot-password",
            Endpoint::ForgotPasswordEmail => "forgot-password-email",
            Endpoint::ResetPassword => "reset-password",
            Endpoint::VerifyEmail => "verify-email",
            Endpoint::ResendVerification => "resend-verification",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Budget per logical endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub register: RateLimit,
    pub login: RateLimit,
    pub forgot_password: RateLimit,
    pub forgot_password_email: RateLimit,
    pub reset_password: RateLimit,
    pub verify_email: RateLimit,
    pub resend_verification: RateLimit,
}

impl RateLimitPolicy {
    /// Default budgets, with `per_ip` forgot-password requests per hour.
    pub fn with_forgot_password_per_ip(per_ip: u32) -> Self {
        Self {
            register: RateLimit::per_minutes(5, 60),
            login: RateLimit::per_minutes(10, 15),
            forgot_password: RateLimit::per_minutes(per_ip, 60),
            forgot_password_email: RateLimit::per_minutes(3, 60),
            reset_password: RateLimit::per_minutes(10, 15),
            verify_email: RateLimit::per_minutes(10, 15),
            resend_verification: RateLimit::per_minutes(3, 60),
        }
    }

    pub fn limit_for(&self, endpoint: Endpoint) -> RateLimit {
        match endpoint {
            Endpoint::Register => self.register,
            Endpoint::Login => self.login,
            Endpoint::ForgotPassword => self.forgot_password,
            Endpoint::ForgotPasswordEmail => self.forgot_password_email,
            Endpoint::ResetPassword => self.reset_password,
            Endpoint::VerifyEmail => self.verify_email,
            Endpoint::ResendVerification => self.resend_verification,
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::with_forgot_password_per_ip(3)
    }
}
