use crate::config::SlaConfig;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Ticket priority
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    /// Parse a priority name, case-insensitively
    pub fn parse(value: &str) -> Result<Self> {
        value
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("Unknown priority: {:?}", value)))
    }
}

/// Versioned table of maximum open hours per priority.
///
/// The same instance drives synthetic label generation at training time and
/// breach projection at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaPolicy {
    version: u32,
    critical_hours: f64,
    high_hours: f64,
    medium_hours: f64,
    low_hours: f64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            version: 1,
            critical_hours: 4.0,
            high_hours: 8.0,
            medium_hours: 24.0,
            low_hours: 48.0,
        }
    }
}

impl SlaPolicy {
    pub fn from_config(config: &SlaConfig) -> Result<Self> {
        let policy = Self {
            version: config.policy_version,
            critical_hours: config.critical_hours,
            high_hours: config.high_hours,
            medium_hours: config.medium_hours,
            low_hours: config.low_hours,
        };

        for priority in Priority::ALL {
            let hours = policy.max_open_hours(priority);
            if !hours.is_finite() || hours <= 0.0 {
                return Err(AppError::Configuration(format!(
                    "SLA hours for {} must be positive, got {}",
                    priority, hours
                )));
            }
        }

        Ok(policy)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn max_open_hours(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical_hours,
            Priority::High => self.high_hours,
            Priority::Medium => self.medium_hours,
            Priority::Low => self.low_hours,
        }
    }

    /// When the ticket will breach, or `None` if it already has
    pub fn project_breach_time(
        &self,
        priority: Priority,
        open_time_hours: f64,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        project_breach_time(self, priority, open_time_hours, now)
    }
}

/// `now + (sla − open_time_hours)` hours, or `None` once the SLA is reached
pub fn project_breach_time(
    policy: &SlaPolicy,
    priority: Priority,
    open_time_hours: f64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let sla_hours = policy.max_open_hours(priority);
    if !open_time_hours.is_finite() || open_time_hours >= sla_hours {
        return None;
    }

    let remaining_ms = ((sla_hours - open_time_hours) * 3_600_000.0).round() as i64;
    Some(now + Duration::milliseconds(remaining_ms))
}

/// Breach risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Strict thresholds: > 0.8 Critical, > 0.6 High, > 0.3 Medium
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            RiskTier::Critical
        } else if score > 0.6 {
            RiskTier::High
        } else if score > 0.3 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!(Priority::parse("critical").unwrap(), Priority::Critical);
        assert_eq!(Priority::parse(" High ").unwrap(), Priority::High);
        assert_eq!(Priority::Medium.to_string(), "Medium");
        assert!(matches!(
            Priority::parse("urgent"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_default_policy_table() {
        let policy = SlaPolicy::default();
        assert_eq!(policy.max_open_hours(Priority::Critical), 4.0);
        assert_eq!(policy.max_open_hours(Priority::High), 8.0);
        assert_eq!(policy.max_open_hours(Priority::Medium), 24.0);
        assert_eq!(policy.max_open_hours(Priority::Low), 48.0);
        assert_eq!(SlaPolicy::from_config(&SlaConfig::default()).unwrap(), policy);
    }

    #[test]
    fn test_policy_rejects_non_positive_hours() {
        let config = SlaConfig {
            high_hours: 0.0,
            ..SlaConfig::default()
        };
        assert!(SlaPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_breach_projection() {
        let policy = SlaPolicy::default();

        assert_eq!(
            project_breach_time(&policy, Priority::Low, 1.0, now()),
            Some(now() + Duration::hours(47))
        );
        assert_eq!(
            project_breach_time(&policy, Priority::High, 6.5, now()),
            Some(now() + Duration::minutes(90))
        );
        assert_eq!(project_breach_time(&policy, Priority::Critical, 5.0, now()), None);
        assert_eq!(project_breach_time(&policy, Priority::Critical, 4.0, now()), None);
    }

    #[test]
    fn test_tier_boundaries_are_strict() {
        assert_eq!(RiskTier::from_score(0.81), RiskTier::Critical);
        assert_eq!(RiskTier::from_score(0.8), RiskTier::High);
        assert_eq!(RiskTier::from_score(0.6), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(0.61), RiskTier::High);
        assert_eq!(RiskTier::from_score(0.3), RiskTier::Low);
        assert_eq!(RiskTier::from_score(0.0), RiskTier::Low);
        assert_eq!(RiskTier::from_score(1.0), RiskTier::Critical);
    }
}
