use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl PlanTier {
    /// Unset or unrecognized tiers resolve to `Free`.
    pub fn parse(raw: Option<&str>) -> PlanTier {
        match raw.map(str::trim) {
            Some("starter") => PlanTier::Starter,
            Some("pro") => PlanTier::Pro,
            Some("enterprise") => PlanTier::Enterprise,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }

    /// Completed generations allowed per calendar month.
    pub fn monthly_generations(&self) -> i64 {
        match self {
            PlanTier::Free => 10,
            PlanTier::Starter => 20,
            PlanTier::Pro => 50,
            PlanTier::Enterprise => 999_999,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub per_minute: i64,
    pub per_day: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaWindow {
    Minute,
    Day,
}

impl QuotaWindow {
    pub fn duration(&self) -> Duration {
        match self {
            QuotaWindow::Minute => Duration::seconds(60),
            QuotaWindow::Day => Duration::hours(24),
        }
    }

    /// Start of the rolling window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaWindow::Minute => f.write_str("per minute"),
            QuotaWindow::Day => f.write_str("per day"),
        }
    }
}

/// Plan tier -> per-minute / per-day call limits.
#[derive(Debug, Clone)]
pub struct RateLimitTable {
    tiers: HashMap<PlanTier, RateLimits>,
}

impl RateLimitTable {
    pub fn new(free: RateLimits) -> Self {
        let mut tiers = HashMap::new();
        tiers.insert(PlanTier::Free, free);
        Self { tiers }
    }

    pub fn with_tier(mut self, tier: PlanTier, limits: RateLimits) -> Self {
        self.tiers.insert(tier, limits);
        self
    }

    /// Tiers without an entry fall back to the free limits.
    pub fn limits_for(&self, tier: PlanTier) -> RateLimits {
        self.tiers
            .get(&tier)
            .or_else(|| self.tiers.get(&PlanTier::Free))
            .copied()
            .unwrap_or(RateLimits {
                per_minute: 10,
                per_day: 200,
            })
    }
}

impl Default for RateLimitTable {
    fn default() -> Self {
        RateLimitTable::new(RateLimits {
            per_minute: 10,
            per_day: 200,
        })
        .with_tier(
            PlanTier::Starter,
            RateLimits {
                per_minute: 30,
                per_day: 1000,
            },
        )
        .with_tier(
            PlanTier::Pro,
            RateLimits {
                per_minute: 60,
                per_day: 3000,
            },
        )
        .with_tier(
            PlanTier::Enterprise,
            RateLimits {
                per_minute: 300,
                per_day: 20000,
            },
        )
    }
}

/// Calls already recorded inside each rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounts {
    pub last_minute: i64,
    pub last_day: i64,
}

/// Decide whether one more call fits. The minute window is checked first.
pub fn check(limits: RateLimits, counts: WindowCounts) -> Result<(), QuotaWindow> {
    if counts.last_minute >= limits.per_minute {
        return Err(QuotaWindow::Minute);
    }
    if counts.last_day >= limits.per_day {
        return Err(QuotaWindow::Day);
    }
    Ok(())
}

/// Midnight UTC on the first day of `now`'s month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
