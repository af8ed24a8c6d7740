//! Validated per-body-part configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::bucket::{BucketCode, BucketOrder};
use crate::error::ValidationError;
use crate::red_flag::RedFlagRule;
use crate::request::Demographics;

/// Prompt-facing description of one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub typical_profile: String,
}

/// Read-only configuration of one body part.
///
/// Only obtainable through [`BodyPartConfigBuilder::build`], which enforces
/// that every weight vector is aligned to the bucket order and every rule is
/// well formed.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyPartConfig {
    code: String,
    display_name: String,
    version: String,
    bucket_order: BucketOrder,
    bucket_info: BTreeMap<BucketCode, BucketInfo>,
    weight_table: BTreeMap<String, Vec<f64>>,
    red_flag_rules: Vec<RedFlagRule>,
    arbitration_template: Option<String>,
}

impl BodyPartConfig {
    pub fn builder(code: impl Into<String>, bucket_order: BucketOrder) -> BodyPartConfigBuilder {
        BodyPartConfigBuilder::new(code, bucket_order)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn bucket_order(&self) -> &BucketOrder {
        &self.bucket_order
    }

    pub fn bucket_info(&self, bucket: &str) -> Option<&BucketInfo> {
        self.bucket_info
            .iter()
            .find(|(code, _)| code.as_str() == bucket)
            .map(|(_, info)| info)
    }

    pub fn weight_table(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.weight_table
    }

    pub fn weights_for(&self, code: &str) -> Option<&[f64]> {
        self.weight_table.get(code).map(Vec::as_slice)
    }

    pub fn red_flag_rules(&self) -> &[RedFlagRule] {
        &self.red_flag_rules
    }

    pub fn arbitration_template(&self) -> Option<&str> {
        self.arbitration_template.as_deref()
    }

    /// Codes a caller may submit: weight-table keys plus every code a
    /// red-flag rule requires, minus the demographic codes.
    pub fn vocabulary(&self) -> BTreeSet<&str> {
        self.weight_table
            .keys()
            .map(String::as_str)
            .chain(
                self.red_flag_rules
                    .iter()
                    .flat_map(|r| r.required.iter().map(String::as_str)),
            )
            .filter(|code| !Demographics::is_derived_code(code))
            .collect()
    }

    pub fn is_known_code(&self, code: &str) -> bool {
        if Demographics::is_derived_code(code) {
            return false;
        }
        self.weight_table.contains_key(code)
            || self.red_flag_rules.iter().any(|r| r.required.contains(code))
    }
}

/// Builder for [`BodyPartConfig`].
#[derive(Debug, Clone)]
pub struct BodyPartConfigBuilder {
    code: String,
    display_name: Option<String>,
    version: String,
    bucket_order: BucketOrder,
    bucket_info: BTreeMap<BucketCode, BucketInfo>,
    weight_table: BTreeMap<String, Vec<f64>>,
    red_flag_rules: Vec<RedFlagRule>,
    arbitration_template: Option<String>,
}

impl BodyPartConfigBuilder {
    pub fn new(code: impl Into<String>, bucket_order: BucketOrder) -> Self {
        Self {
            code: code.into(),
            display_name: None,
            version: "1.0".to_string(),
            bucket_order,
            bucket_info: BTreeMap::new(),
            weight_table: BTreeMap::new(),
            red_flag_rules: Vec::new(),
            arbitration_template: None,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn bucket_info(mut self, bucket: impl Into<BucketCode>, info: BucketInfo) -> Self {
        self.bucket_info.insert(bucket.into(), info);
        self
    }

    pub fn weight(mut self, code: impl Into<String>, weights: Vec<f64>) -> Self {
        self.weight_table.insert(code.into(), weights);
        self
    }

    pub fn weights<I, S>(mut self, table: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        self.weight_table
            .extend(table.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn red_flag_rule(mut self, rule: RedFlagRule) -> Self {
        self.red_flag_rules.push(rule);
        self
    }

    pub fn arbitration_template(mut self, template: impl Into<String>) -> Self {
        self.arbitration_template = Some(template.into());
        self
    }

    pub fn build(self) -> Result<BodyPartConfig, ValidationError> {
        let n = self.bucket_order.len();
        for (code, weights) in &self.weight_table {
            if weights.len() != n {
                return Err(ValidationError::WeightLengthMismatch {
                    code: code.clone(),
                    expected: n,
                    actual: weights.len(),
                });
            }
            if let Some((index, &value)) = weights
                .iter()
                .enumerate()
                .find(|(_, w)| !w.is_finite() || **w < 0.0)
            {
                return Err(ValidationError::InvalidWeight {
                    code: code.clone(),
                    index,
                    value,
                });
            }
        }

        let mut rule_codes = HashSet::new();
        for rule in &self.red_flag_rules {
            if rule.required.is_empty() {
                return Err(ValidationError::EmptyRedFlagRule(rule.code.clone()));
            }
            if !rule_codes.insert(rule.code.as_str()) {
                return Err(ValidationError::DuplicateRedFlagRule(rule.code.clone()));
            }
        }

        for bucket in self.bucket_info.keys() {
            if !self.bucket_order.contains(bucket.as_str()) {
                return Err(ValidationError::UnknownBucket(bucket.to_string()));
            }
        }

        Ok(BodyPartConfig {
            display_name: self.display_name.unwrap_or_else(|| self.code.clone()),
            code: self.code,
            version: self.version,
            bucket_order: self.bucket_order,
            bucket_info: self.bucket_info,
            weight_table: self.weight_table,
            red_flag_rules: self.red_flag_rules,
            arbitration_template: self
                .arbitration_template
                .filter(|t| !t.trim().is_empty()),
        })
    }
}
