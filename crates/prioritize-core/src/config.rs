//! Process-wide event settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::event::SourceType;

/// When matched listeners are notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStrategy {
    /// Deliver synchronously inside the producing call.
    Immediate,
    /// Store the event and deliver it on the next sweep.
    Delayed,
}

impl fmt::Display for EventStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("IMMEDIATE"),
            Self::Delayed => f.write_str("DELAYED"),
        }
    }
}

impl FromStr for EventStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IMMEDIATE" => Ok(Self::Immediate),
            "DELAYED" => Ok(Self::Delayed),
            other => Err(DomainError::Validation(format!(
                "unknown event strategy: {other}"
            ))),
        }
    }
}

/// Event engine configuration, read from the environment.
#[derive(Envconfig, Debug, Clone)]
pub struct EventSettings {
    /// Delivery timing.
    #[envconfig(from = "EVENT_DEFAULT_STRATEGY", default = "IMMEDIATE")]
    pub strategy: EventStrategy,

    /// Period of the expiry sweep in milliseconds. Zero disables the sweeper.
    #[envconfig(from = "EVENT_SWEEP_INTERVAL_MS", default = "10000")]
    pub sweep_interval_ms: u64,

    /// Lifetime producers give to ordinary property-change events.
    #[envconfig(from = "EVENT_DEFAULT_TIMEOUT", default = "120000")]
    pub event_default_lifetime_ms: i64,

    /// Lifetime subscribers give to listeners unless they ask for another.
    #[envconfig(from = "LISTENER_DEFAULT_TIMEOUT", default = "120000")]
    pub listener_default_lifetime_ms: i64,

    /// Upper bound for a single consumer call. Zero means unbounded.
    #[envconfig(from = "EVENT_DELIVERY_TIMEOUT_MS", default = "0")]
    pub delivery_timeout_ms: u64,

    /// Gate for resource producers.
    #[envconfig(from = "FIRE_RESOURCE_EVENTS", default = "true")]
    pub fire_resource_events: bool,

    /// Gate for document producers.
    #[envconfig(from = "FIRE_DOCUMENT_EVENTS", default = "true")]
    pub fire_document_events: bool,

    /// Gate for department producers.
    #[envconfig(from = "FIRE_DEPARTMENT_EVENTS", default = "true")]
    pub fire_department_events: bool,

    /// Gate for user producers.
    #[envconfig(from = "FIRE_USER_EVENTS", default = "true")]
    pub fire_user_events: bool,

    /// Gate for action board producers.
    #[envconfig(from = "FIRE_ACTIONBOARD_EVENTS", default = "true")]
    pub fire_action_board_events: bool,

    /// Gate for task producers.
    #[envconfig(from = "FIRE_TASK_EVENTS", default = "true")]
    pub fire_task_events: bool,
}

impl EventSettings {
    /// Whether producers of `source_type` are allowed to raise events.
    #[must_use]
    pub fn fires_for(&self, source_type: SourceType) -> bool {
        match source_type {
            SourceType::ActionBoard => self.fire_action_board_events,
            SourceType::Department => self.fire_department_events,
            SourceType::Document => self.fire_document_events,
            SourceType::Resource => self.fire_resource_events,
            SourceType::Task => self.fire_task_events,
            SourceType::User => self.fire_user_events,
        }
    }

    /// Sweep period, or `None` when the sweeper is disabled.
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }

    /// Consumer timeout, or `None` when unbounded.
    #[must_use]
    pub fn delivery_timeout(&self) -> Option<Duration> {
        (self.delivery_timeout_ms > 0).then(|| Duration::from_millis(self.delivery_timeout_ms))
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            strategy: EventStrategy::Immediate,
            sweep_interval_ms: 10_000,
            event_default_lifetime_ms: 120_000,
            listener_default_lifetime_ms: 120_000,
            delivery_timeout_ms: 0,
            fire_resource_events: true,
            fire_document_events: true,
            fire_department_events: true,
            fire_user_events: true,
            fire_action_board_events: true,
            fire_task_events: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_init_from_empty_environment_matches_default() {
        let settings = EventSettings::init_from_hashmap(&HashMap::new()).unwrap();
        let defaults = EventSettings::default();

        assert_eq!(settings.strategy, defaults.strategy);
        assert_eq!(settings.sweep_interval_ms, defaults.sweep_interval_ms);
        assert_eq!(settings.event_default_lifetime_ms, defaults.event_default_lifetime_ms);
        assert_eq!(
            settings.listener_default_lifetime_ms,
            defaults.listener_default_lifetime_ms
        );
        assert_eq!(settings.delivery_timeout(), None);
        assert!(SourceType::ALL.into_iter().all(|t| settings.fires_for(t)));
    }

    #[test]
    fn test_init_reads_strategy_case_insensitively_and_gates() {
        let env = HashMap::from([
            ("EVENT_DEFAULT_STRATEGY".to_owned(), "delayed".to_owned()),
            ("FIRE_ACTIONBOARD_EVENTS".to_owned(), "false".to_owned()),
            ("EVENT_SWEEP_INTERVAL_MS".to_owned(), "0".to_owned()),
        ]);

        let settings = EventSettings::init_from_hashmap(&env).unwrap();

        assert_eq!(settings.strategy, EventStrategy::Delayed);
        assert!(!settings.fires_for(SourceType::ActionBoard));
        assert!(settings.fires_for(SourceType::Document));
        assert_eq!(settings.sweep_interval(), None);
    }

    #[test]
    fn test_unknown_strategy_fails_to_load() {
        let env = HashMap::from([("EVENT_DEFAULT_STRATEGY".to_owned(), "EVENTUALLY".to_owned())]);

        assert!(EventSettings::init_from_hashmap(&env).is_err());
    }
}
