use chrono::{DateTime, Months, Utc};

use crate::config::RetentionConfig;

/// Outcome of evaluating one object against the retention rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retain,
    /// Older than the hard expiry, deleted regardless of downloads.
    HardExpiry,
    /// Old enough and not downloaded recently.
    Idle,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Retain => "retain",
            Verdict::HardExpiry => "hard_expiry",
            Verdict::Idle => "idle",
        }
    }
}

/// Calendar-month thresholds for the two rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub hard_expiry: Months,
    pub idle: Months,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            hard_expiry: Months::new(6),
            idle: Months::new(1),
        }
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            hard_expiry: Months::new(config.hard_expiry_months),
            idle: Months::new(config.idle_months),
        }
    }
}

/// `now` minus `months`, saturating at the earliest representable instant.
fn cutoff(now: DateTime<Utc>, months: Months) -> DateTime<Utc> {
    now.checked_sub_months(months)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl RetentionPolicy {
    /// Whether the idle rule could apply, i.e. the download index needs consulting.
    pub fn past_idle_age(&self, uploaded_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        uploaded_at <= self.idle_cutoff(now)
    }

    /// Anything created before this instant has sat through a whole idle window.
    pub fn idle_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        cutoff(now, self.idle)
    }

    pub fn evaluate(
        &self,
        uploaded_at: DateTime<Utc>,
        last_download: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Verdict {
        if uploaded_at <= cutoff(now, self.hard_expiry) {
            return Verdict::HardExpiry;
        }

        let idle_cutoff = self.idle_cutoff(now);
        let idle = uploaded_at <= idle_cutoff
            && last_download.map_or(true, |downloaded| downloaded <= idle_cutoff);
        if idle {
            Verdict::Idle
        } else {
            Verdict::Retain
        }
    }
}
