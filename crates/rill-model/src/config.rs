//! Replica configuration and event filtering.
//!
//! A changefeed's `ReplicaConfig` travels inside its
//! [`ChangeFeedInfo`](crate::ChangeFeedInfo) as JSON. Older writers may
//! omit whole sections, so every field carries a serde default and
//! decoding is followed by a normalisation pass
//! ([`ChangeFeedInfo::verify_and_fix`](crate::ChangeFeedInfo::verify_and_fix)).

use serde::{Deserialize, Serialize};

use crate::event::DdlJobType;
use crate::ModelError;

/// Table filter plus the set of DDL job types a changefeed ignores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Table matching rules, `schema.table` with `*` wildcards.
    #[serde(default = "FilterConfig::default_rules")]
    pub rules: Vec<String>,

    /// DDL job types dropped before they reach the owner loop.
    #[serde(default)]
    pub ignore_ddl_types: Vec<DdlJobType>,
}

impl FilterConfig {
    fn default_rules() -> Vec<String> {
        vec!["*.*".to_string()]
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            rules: Self::default_rules(),
            ignore_ddl_types: Vec::new(),
        }
    }
}

/// Per-changefeed replication configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Whether table matching is case sensitive.
    #[serde(default)]
    pub case_sensitive: bool,

    /// Table and DDL filtering.
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Compiled DDL filter for a changefeed.
///
/// Built once from the changefeed's [`ReplicaConfig`]; consulted by
/// the DDL puller for every decoded job. Table-level routing happens
/// at the processor side, so compilation only validates the rule
/// syntax here.
#[derive(Debug, Clone)]
pub struct DdlFilter {
    ignore: Vec<DdlJobType>,
}

impl DdlFilter {
    /// Compiles the filter from a replica config.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidFilterRule`] for a rule that is not
    /// of the form `schema.table` (either side may be `*`).
    pub fn new(config: &ReplicaConfig) -> Result<Self, ModelError> {
        for rule in &config.filter.rules {
            let Some((schema, table)) = rule.split_once('.') else {
                return Err(ModelError::InvalidFilterRule {
                    rule: rule.clone(),
                    reason: "expected schema.table".into(),
                });
            };
            if schema.is_empty() || table.is_empty() {
                return Err(ModelError::InvalidFilterRule {
                    rule: rule.clone(),
                    reason: "empty schema or table".into(),
                });
            }
        }
        Ok(Self {
            ignore: config.filter.ignore_ddl_types.clone(),
        })
    }

    /// Whether a DDL job of this type should be dropped.
    #[must_use]
    pub fn should_discard(&self, job_type: DdlJobType) -> bool {
        self.ignore.contains(&job_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_discards_nothing() {
        let filter = DdlFilter::new(&ReplicaConfig::default()).unwrap();
        assert!(!filter.should_discard(DdlJobType::DropTable));
        assert!(!filter.should_discard(DdlJobType::AddIndex));
    }

    #[test]
    fn ignore_list_is_honoured() {
        let config = ReplicaConfig {
            filter: FilterConfig {
                rules: vec!["*.*".into()],
                ignore_ddl_types: vec![DdlJobType::AddIndex, DdlJobType::DropIndex],
            },
            ..ReplicaConfig::default()
        };
        let filter = DdlFilter::new(&config).unwrap();
        assert!(filter.should_discard(DdlJobType::AddIndex));
        assert!(!filter.should_discard(DdlJobType::CreateTable));
    }

    #[test]
    fn bad_rule_is_rejected() {
        let config = ReplicaConfig {
            filter: FilterConfig {
                rules: vec!["orders".into()],
                ignore_ddl_types: Vec::new(),
            },
            ..ReplicaConfig::default()
        };
        assert!(matches!(
            DdlFilter::new(&config),
            Err(ModelError::InvalidFilterRule { .. })
        ));
    }

    #[test]
    fn empty_rule_side_is_rejected() {
        let config = ReplicaConfig {
            filter: FilterConfig {
                rules: vec!["shop.".into()],
                ignore_ddl_types: Vec::new(),
            },
            ..ReplicaConfig::default()
        };
        assert!(matches!(
            DdlFilter::new(&config),
            Err(ModelError::InvalidFilterRule { .. })
        ));
    }
}
