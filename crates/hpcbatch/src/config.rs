use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::internal::common::error::BatchError;
use crate::internal::common::time::parse_seconds;
use crate::internal::ledger::{CoreAllocation, HostSelection};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SchedulingAlgorithm {
    #[default]
    #[serde(rename = "fcfs")]
    Fcfs,
    #[serde(rename = "easy_bf")]
    EasyBackfill,
    #[serde(rename = "conservative_bf")]
    ConservativeBackfill,
}

impl FromStr for SchedulingAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fcfs" => Ok(SchedulingAlgorithm::Fcfs),
            "easy_bf" => Ok(SchedulingAlgorithm::EasyBackfill),
            "conservative_bf" => Ok(SchedulingAlgorithm::ConservativeBackfill),
            _ => Err(format!("Unknown scheduling algorithm '{s}'")),
        }
    }
}

/// Order in which ready actions of a running job get started.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionSelection {
    #[default]
    MaximumFlops,
    MaximumMinimumCores,
    MinimumTopLevel,
}

impl FromStr for ActionSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maximum_flops" => Ok(ActionSelection::MaximumFlops),
            "maximum_minimum_cores" => Ok(ActionSelection::MaximumMinimumCores),
            "minimum_top_level" => Ok(ActionSelection::MinimumTopLevel),
            _ => Err(format!("Unknown action selection '{s}'")),
        }
    }
}

/// How many cores a started action takes from its node.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionCoreAllocation {
    /// As many as are free, up to the action maximum
    #[default]
    Aggressive,
    /// The action minimum
    Minimum,
}

impl FromStr for ActionCoreAllocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aggressive" => Ok(ActionCoreAllocation::Aggressive),
            "minimum" => Ok(ActionCoreAllocation::Minimum),
            _ => Err(format!("Unknown action core allocation '{s}'")),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[derive(Builder, Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[builder(pattern = "owned")]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    #[builder(default)]
    pub scheduling_algorithm: SchedulingAlgorithm,
    #[builder(default)]
    pub host_selection: HostSelection,
    /// Overrides the default of the scheduling algorithm
    #[builder(default, setter(strip_option))]
    pub core_allocation: Option<CoreAllocation>,
    /// Dispatch latency charged before the first action of a job starts
    #[builder(default)]
    #[serde(with = "duration_secs")]
    pub submission_overhead: Duration,
    #[builder(default)]
    pub action_selection: ActionSelection,
    #[builder(default)]
    pub action_core_allocation: ActionCoreAllocation,
}

impl BatchConfig {
    /// fcfs shares nodes between jobs, backfilling policies give whole nodes.
    pub fn effective_core_allocation(&self) -> CoreAllocation {
        self.core_allocation
            .unwrap_or(match self.scheduling_algorithm {
                SchedulingAlgorithm::Fcfs => CoreAllocation::Requested,
                SchedulingAlgorithm::EasyBackfill | SchedulingAlgorithm::ConservativeBackfill => {
                    CoreAllocation::WholeNode
                }
            })
    }

    /// Builds the configuration from string properties.
    pub fn from_properties<I, K, V>(properties: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        fn parse<T: FromStr<Err = String>>(value: &str) -> crate::Result<T> {
            value.parse().map_err(BatchError::ConfigurationError)
        }

        let mut config = BatchConfig::default();
        for (key, value) in properties {
            let value = value.as_ref();
            match key.as_ref() {
                "scheduling_algorithm" if value == "conservative_bf_core_level" => {
                    config.scheduling_algorithm = SchedulingAlgorithm::ConservativeBackfill;
                    config.core_allocation.get_or_insert(CoreAllocation::Requested);
                }
                "scheduling_algorithm" => config.scheduling_algorithm = parse(value)?,
                "host_selection" => config.host_selection = parse(value)?,
                "core_allocation" => config.core_allocation = Some(parse(value)?),
                "submission_overhead" => {
                    config.submission_overhead = parse_seconds(value).ok_or_else(|| {
                        BatchError::ConfigurationError(format!(
                            "Invalid submission overhead '{value}'"
                        ))
                    })?;
                }
                "action_selection" => config.action_selection = parse(value)?,
                "action_core_allocation" => config.action_core_allocation = parse(value)?,
                key => {
                    return Err(BatchError::ConfigurationError(format!(
                        "Unknown property '{key}'"
                    )));
                }
            }
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| BatchError::ConfigurationError(e.to_string()))
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionSelection, BatchConfig, BatchConfigBuilder, SchedulingAlgorithm};
    use crate::internal::common::error::BatchError;
    use crate::internal::ledger::{CoreAllocation, HostSelection};
    use std::time::Duration;

    #[test]
    fn test_from_properties() {
        let config = BatchConfig::from_properties([
            ("scheduling_algorithm", "easy_bf"),
            ("host_selection", "BESTFIT"),
            ("submission_overhead", "1.5"),
            ("action_selection", "minimum_top_level"),
        ])
        .unwrap();
        assert_eq!(config.scheduling_algorithm, SchedulingAlgorithm::EasyBackfill);
        assert_eq!(config.host_selection, HostSelection::BestFit);
        assert_eq!(config.submission_overhead, Duration::from_millis(1500));
        assert_eq!(config.action_selection, ActionSelection::MinimumTopLevel);
        assert_eq!(config.effective_core_allocation(), CoreAllocation::WholeNode);
    }

    #[test]
    fn test_core_level_alias() {
        let config =
            BatchConfig::from_properties([("scheduling_algorithm", "conservative_bf_core_level")])
                .unwrap();
        assert_eq!(
            config.scheduling_algorithm,
            SchedulingAlgorithm::ConservativeBackfill
        );
        assert_eq!(config.effective_core_allocation(), CoreAllocation::Requested);
    }

    #[test]
    fn test_invalid_properties() {
        for props in [
            [("scheduling_algorithm", "sjf")],
            [("host_selection", "WORSTFIT")],
            [("submission_overhead", "-1")],
            [("batch_queue", "x")],
        ] {
            assert!(matches!(
                BatchConfig::from_properties(props),
                Err(BatchError::ConfigurationError(_))
            ));
        }
    }

    #[test]
    fn test_json() {
        let config = BatchConfigBuilder::default()
            .scheduling_algorithm(SchedulingAlgorithm::ConservativeBackfill)
            .submission_overhead(Duration::from_secs(1))
            .build()
            .unwrap();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"conservative_bf\""));
        assert_eq!(BatchConfig::from_json(&json).unwrap(), config);

        let config = BatchConfig::from_json(r#"{"host_selection": "ROUNDROBIN"}"#).unwrap();
        assert_eq!(config.host_selection, HostSelection::RoundRobin);
        assert_eq!(config.effective_core_allocation(), CoreAllocation::Requested);
        assert!(BatchConfig::from_json(r#"{"queue": 1}"#).is_err());
    }
}
