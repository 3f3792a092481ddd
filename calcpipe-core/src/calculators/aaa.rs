//! AAA rating calculator.
//!
//! Scores each numeric metric of a ticker table on a 0-10 scale relative to
//! the other rows, grades it, then folds the metric scores into valuation,
//! profitability, growth, performance and overall ratings.

use std::path::Path;

use polars::prelude::DataFrame;

use super::grading::{f64_values, fill_numeric_nulls, invert, numeric_columns, push_score, scale_column};
use crate::components::{
    ArgsError, CalculationError, CalculationResult, Calculator, ComponentArgs, DataBackup,
    DataSaver, DataSource, HealthCheck,
};
use crate::pipeline::{run_units, ComputeError};

/// Ratio metrics where a lower raw value is better.
pub const VALUATION_METRICS: [&str; 5] = ["fwd_p_e", "peg", "p_s", "p_b", "p_fcf"];

/// Rating categories and the metrics summed into each.
pub const CATEGORIES: [(&str, &[&str]); 4] = [
    ("valuation", &VALUATION_METRICS),
    (
        "profitability",
        &["profit_m", "oper_m", "gross_m", "roe", "roa"],
    ),
    (
        "growth",
        &["eps_this_y", "eps_next_y", "eps_next_5y", "sales_q_q", "eps_q_q"],
    ),
    (
        "performance",
        &[
            "perf_month",
            "perf_quart",
            "perf_half",
            "perf_year",
            "perf_ytd",
            "volatility_m",
        ],
    ),
];

pub const DEFAULT_SOURCE_PREFIX: &str = "AAA - ";
pub const DEFAULT_DESTINATION_PREFIX: &str = "AAA_";

#[derive(Debug, Clone)]
pub struct AaaCalculator {
    source_prefix: String,
    destination_prefix: String,
}

impl Default for AaaCalculator {
    fn default() -> Self {
        Self {
            source_prefix: DEFAULT_SOURCE_PREFIX.to_string(),
            destination_prefix: DEFAULT_DESTINATION_PREFIX.to_string(),
        }
    }
}

impl AaaCalculator {
    pub fn from_args(args: &ComponentArgs) -> Result<Self, ArgsError> {
        let defaults = Self::default();
        Ok(Self {
            source_prefix: args
                .str_param("source_prefix")?
                .map_or(defaults.source_prefix, str::to_string),
            destination_prefix: args
                .str_param("destination_prefix")?
                .map_or(defaults.destination_prefix, str::to_string),
        })
    }

    /// `"AAA - technology.csv"` -> `"AAA_technology"` with default prefixes.
    pub fn destination(&self, identifier: &str) -> String {
        let stem = Path::new(identifier)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(identifier);
        let name = stem.strip_prefix(&self.source_prefix).unwrap_or(stem);
        format!("{}{name}", self.destination_prefix)
    }
}

/// Score, grade and rate one ticker table.
pub fn rate(input: DataFrame) -> Result<DataFrame, ComputeError> {
    if input.height() == 0 {
        return Err(ComputeError::EmptyInput);
    }
    let mut df = fill_numeric_nulls(input)?;

    let metrics: Vec<String> = numeric_columns(&df)
        .into_iter()
        .filter(|name| !name.starts_with('_'))
        .collect();

    let missing: Vec<String> = CATEGORIES
        .iter()
        .flat_map(|(_, members)| members.iter())
        .filter(|m| !metrics.iter().any(|name| name.to_lowercase() == **m))
        .map(|m| m.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ComputeError::MissingColumns(missing));
    }

    for metric in &metrics {
        let label = metric.to_lowercase();
        let mut scores = scale_column(&f64_values(&df, metric)?);
        if VALUATION_METRICS.contains(&label.as_str()) {
            invert(&mut scores);
        }
        push_score(&mut df, &label, scores)?;
    }

    let mut overall = vec![0.0; df.height()];
    for (category, members) in CATEGORIES {
        let mut sum = vec![0.0; df.height()];
        for member in members {
            let scores = f64_values(&df, &format!("score - {member}"))?;
            for (total, score) in sum.iter_mut().zip(scores) {
                *total += score;
            }
        }

        let mut scores = scale_column(&sum);
        if category == "valuation" {
            invert(&mut scores);
        }
        for (total, score) in overall.iter_mut().zip(&scores) {
            *total += score;
        }
        push_score(&mut df, category, scores)?;
    }

    push_score(&mut df, "overall", scale_column(&overall))?;
    Ok(df)
}

impl HealthCheck for AaaCalculator {
    fn health_check(&self) -> bool {
        true
    }
}

impl Calculator for AaaCalculator {
    fn name(&self) -> &str {
        "aaa"
    }

    fn run_complete_calculation(
        &self,
        source: &dyn DataSource,
        saver: &dyn DataSaver,
        backup: &dyn DataBackup,
        identifiers: Option<&[String]>,
    ) -> Result<Vec<CalculationResult>, CalculationError> {
        run_units(
            self.name(),
            source,
            saver,
            backup,
            identifiers,
            |id| self.destination(id),
            rate,
        )
    }
}
