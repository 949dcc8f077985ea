//! Label encoding of categorical columns

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column name -> fitted encoder, ordered by column name
pub type EncoderSet = BTreeMap<String, CategoricalEncoder>;

/// Bijection between the values a column held at fit time and dense codes `0..k`.
///
/// Codes follow the lexicographic order of the values, so the same set of
/// observed values always produces the same codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    classes: Vec<String>,
}

impl CategoricalEncoder {
    /// Fit on the non-null values of a string column.
    pub fn fit(series: &Series) -> Result<Self> {
        let ca = series
            .str()
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        let mut classes: Vec<String> = ca.into_iter().flatten().map(String::from).collect();
        classes.sort_unstable();
        classes.dedup();

        Ok(Self { classes })
    }

    /// Build an encoder from an explicit class list (sorted and deduplicated).
    pub fn from_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Code for a single value, `None` when it was not observed at fit time.
    pub fn code(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .ok()
    }

    /// Value for a code, `None` when out of range.
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    /// Replace every value of `series` with its code as `f64`.
    ///
    /// The series must be free of nulls (imputation runs first).
    pub fn transform(&self, series: &Series) -> Result<Series> {
        let column = series.name().to_string();
        let ca = series
            .str()
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        let codes = ca
            .into_iter()
            .map(|value| {
                let value = value.ok_or_else(|| {
                    PipelineError::DataError(format!(
                        "column '{}' still has missing values at encoding time",
                        column
                    ))
                })?;
                self.code(value)
                    .map(|c| c as f64)
                    .ok_or_else(|| PipelineError::UnseenCategory {
                        column: column.clone(),
                        value: value.to_string(),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Series::new(series.name().clone(), codes))
    }
}
