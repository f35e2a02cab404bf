use serde::Deserialize;
use serde_with::serde_as;
use std::time;
use url::Url;

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OperatorSettings {
    pub name: String,
    pub url: Url,
    pub priority: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub timeout: time::Duration,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            name: "operator_1".to_string(),
            url: Url::parse("http://127.0.0.1:9000/send").expect("should be valid url"),
            priority: 1,
            timeout: default_operator_timeout(),
        }
    }
}

fn default_operator_timeout() -> time::Duration {
    time::Duration::from_secs(5)
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherSettings {
    /// Upstream operators, tried in ascending priority order.
    pub operators: Vec<OperatorSettings>,
    /// Transport attempts per operator before failing over.
    pub max_attempts: u32,
    /// Base of the exponential backoff between transport attempts.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub backoff_base: time::Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let operator = |name: &str, port: u16, priority: u32| OperatorSettings {
            name: name.to_string(),
            url: Url::parse(&format!("http://127.0.0.1:{port}/send"))
                .expect("should be valid url"),
            priority,
            timeout: default_operator_timeout(),
        };
        Self {
            operators: vec![
                operator("operator_1", 9000, 1),
                operator("operator_2", 9001, 2),
                operator("operator_3", 9002, 3),
            ],
            max_attempts: 3,
            backoff_base: time::Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSettings {
    pub enabled: bool,
    pub express_workers: u32,
    pub regular_workers: u32,
    /// Size of the queue connection pool shared by the worker pools.
    pub queue_pool_size: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            express_workers: 4,
            regular_workers: 4,
            queue_pool_size: 2,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SettlerSettings {
    /// Exactly one process per deployment should run with the settler enabled.
    pub enabled: bool,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub tick: time::Duration,
    /// Maximum number of settlement records drained per tick.
    pub batch_size: usize,
}

impl Default for SettlerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tick: time::Duration::from_secs(2),
            batch_size: 10_000,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SweeperSettings {
    /// Claimed tasks older than this are assumed to belong to a dead worker
    /// and are returned to the queue.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub visibility_timeout: time::Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub interval: time::Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            visibility_timeout: time::Duration::from_secs(600),
            interval: time::Duration::from_secs(60),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub url: String,
    /// How long an api_key -> account snapshot stays cached. The snapshot is
    /// never trusted for balance decisions, so a long TTL is safe.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub auth_ttl: time::Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            auth_ttl: time::Duration::from_secs(12 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BufferSettings {
    pub url: String,
    pub key: String,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            key: "sms_results".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_operators_are_priority_ordered() {
        let settings = DispatcherSettings::default();
        assert_eq!(settings.operators.len(), 3);
        let priorities: Vec<_> = settings.operators.iter().map(|op| op.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
        assert_eq!(settings.max_attempts, 3);
    }

    #[test]
    fn durations_deserialize_from_seconds() {
        let settings: SettlerSettings =
            serde_json::from_value(serde_json::json!({"tick": 5, "batch_size": 100})).unwrap();
        assert_eq!(settings.tick, time::Duration::from_secs(5));
        assert_eq!(settings.batch_size, 100);
        assert!(settings.enabled);
    }
}
