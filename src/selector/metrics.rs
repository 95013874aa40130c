//! Split-quality metrics and their weighted configuration.
//!
//! A candidate predicate is scored by a weighted linear sum of metrics. The
//! metric list is ordered and externally configured; weights are supplied as a
//! parallel list whose length must match.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::mapping::EntitySet;

/// A per-predicate split metric. All metrics return values in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Share of the universe carrying at least one edge with the predicate.
    Popularity,
    /// Share of the predicate's edges that fall into its `k` largest groups.
    BigGroups,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Popularity => "popularity",
            Metric::BigGroups => "big_groups",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "popularity" => Ok(Metric::Popularity),
            "big_groups" => Ok(Metric::BigGroups),
            other => Err(ConfigError::UnknownMetric {
                name: other.to_string(),
            }),
        }
    }
}

/// Ordered `(metric, weight)` pairs plus metric parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricConfig {
    entries: Vec<(Metric, f64)>,
    big_groups_k: usize,
}

impl MetricConfig {
    /// Default `k` for [`Metric::BigGroups`].
    pub const DEFAULT_BIG_GROUPS_K: usize = 3;

    /// Pair up metric names with weights.
    ///
    /// Fails when the lists differ in length, a name is unknown, or a weight
    /// is negative or non-finite.
    pub fn from_lists(
        metrics: &[String],
        weights: &[f64],
        big_groups_k: usize,
    ) -> ConfigResult<Self> {
        if metrics.len() != weights.len() {
            return Err(ConfigError::WeightMismatch {
                metrics: metrics.len(),
                weights: weights.len(),
            });
        }
        let entries = metrics
            .iter()
            .map(|name| name.parse::<Metric>())
            .zip(weights.iter().copied())
            .map(|(metric, weight)| metric.map(|m| (m, weight)))
            .collect::<ConfigResult<Vec<_>>>()?;
        Self::new(entries, big_groups_k)
    }

    pub fn new(entries: Vec<(Metric, f64)>, big_groups_k: usize) -> ConfigResult<Self> {
        if entries.is_empty() {
            return Err(ConfigError::NoMetrics);
        }
        if let Some((metric, weight)) = entries
            .iter()
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(ConfigError::InvalidWeight {
                metric: metric.to_string(),
                weight: *weight,
            });
        }
        if big_groups_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "selector.big_groups_k".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self {
            entries,
            big_groups_k,
        })
    }

    /// Popularity only, weight 1.
    pub fn popularity_only() -> Self {
        Self {
            entries: vec![(Metric::Popularity, 1.0)],
            big_groups_k: Self::DEFAULT_BIG_GROUPS_K,
        }
    }

    pub fn entries(&self) -> &[(Metric, f64)] {
        &self.entries
    }

    pub fn big_groups_k(&self) -> usize {
        self.big_groups_k
    }

    /// Evaluate one metric over a predicate's object groups.
    pub fn evaluate(&self, metric: Metric, groups: &[&EntitySet], universe: usize) -> f64 {
        match metric {
            Metric::Popularity => popularity(groups, universe),
            Metric::BigGroups => big_groups(groups, self.big_groups_k),
        }
    }
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            entries: vec![(Metric::Popularity, 0.5), (Metric::BigGroups, 0.5)],
            big_groups_k: Self::DEFAULT_BIG_GROUPS_K,
        }
    }
}

/// `|union of groups| / |universe|`.
pub fn popularity(groups: &[&EntitySet], universe: usize) -> f64 {
    if universe == 0 {
        return 0.0;
    }
    let covered: EntitySet = groups.iter().flat_map(|g| g.iter().cloned()).collect();
    covered.len() as f64 / universe as f64
}

/// `(sum of the k largest group sizes) / (sum of all group sizes)`.
pub fn big_groups(groups: &[&EntitySet], k: usize) -> f64 {
    let mut sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    let total: usize = sizes.iter().sum();
    if total == 0 {
        return 0.0;
    }
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    let top: usize = sizes.iter().take(k).sum();
    top as f64 / total as f64
}
