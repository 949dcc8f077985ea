//! Table preprocessing
//!
//! Turns a raw table into a fully numeric one:
//! - drop requested columns (unknown names are skipped)
//! - impute numeric columns with their mean, text columns with their mode
//! - label encode text columns
//!
//! Encoders are fit during training and reused unchanged at prediction time.

mod encoder;
mod imputer;

pub use encoder::{CategoricalEncoder, EncoderSet};
pub use imputer::{impute_mean, impute_mode, ColumnKind};

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::debug;

/// Remove the named columns; names absent from the table are ignored.
pub fn drop_columns(df: &DataFrame, names: &[String]) -> DataFrame {
    let present: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| {
            let found = df.get_column_index(name).is_some();
            if !found {
                debug!(column = %name, "Column to drop not present, skipping");
            }
            found
        })
        .collect();

    if present.is_empty() {
        return df.clone();
    }
    df.drop_many(present)
}

/// Preprocessor holding the encoder set fit during training
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    encoders: EncoderSet,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a preprocessor from a persisted encoder set.
    pub fn from_encoders(encoders: EncoderSet) -> Self {
        Self { encoders }
    }

    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    pub fn into_encoders(self) -> EncoderSet {
        self.encoders
    }

    /// Drop, impute and encode, fitting a fresh encoder for every text column.
    ///
    /// The previous encoder set is replaced, not merged.
    pub fn fit_transform(&mut self, df: &DataFrame, columns_to_drop: Option<&[String]>) -> Result<DataFrame> {
        let mut result = Self::drop_and_impute(df, columns_to_drop)?;
        let mut encoders = EncoderSet::new();

        for (name, kind) in Self::column_kinds(&result)? {
            if kind != ColumnKind::Categorical {
                continue;
            }
            let series = result.column(&name)?.as_materialized_series().clone();
            let encoder = CategoricalEncoder::fit(&series)?;
            let encoded = encoder.transform(&series)?;
            debug!(column = %name, classes = encoder.n_classes(), "Fitted label encoder");

            result.with_column(encoded)?;
            encoders.insert(name, encoder);
        }

        self.encoders = encoders;
        Ok(result)
    }

    /// Drop, impute and encode with the encoders fit during training.
    ///
    /// A column with a fitted encoder is read as text whatever its inferred
    /// type, so `1` in a CSV maps through the encoder like `"1"` did.
    pub fn transform(&self, df: &DataFrame, columns_to_drop: Option<&[String]>) -> Result<DataFrame> {
        let mut dropped = Self::drop(df, columns_to_drop);
        for name in self.encoders.keys() {
            if dropped.get_column_index(name).is_none() {
                continue;
            }
            let column = dropped.column(name)?;
            if column.dtype() == &DataType::String {
                continue;
            }
            debug!(column = %name, dtype = %column.dtype(), "Reading encoded column as text");
            let as_text = column.cast(&DataType::String)?;
            dropped.with_column(as_text)?;
        }
        let mut result = Self::impute(dropped)?;

        for (name, kind) in Self::column_kinds(&result)? {
            if kind != ColumnKind::Categorical {
                continue;
            }
            let encoder = self.encoders.get(&name).ok_or_else(|| {
                PipelineError::SchemaMismatch(format!(
                    "column '{}' is categorical but no encoder was fit for it during training",
                    name
                ))
            })?;
            let encoded = encoder.transform(result.column(&name)?.as_materialized_series())?;
            result.with_column(encoded)?;
        }

        Ok(result)
    }

    fn drop_and_impute(df: &DataFrame, columns_to_drop: Option<&[String]>) -> Result<DataFrame> {
        Self::impute(Self::drop(df, columns_to_drop))
    }

    fn drop(df: &DataFrame, columns_to_drop: Option<&[String]>) -> DataFrame {
        match columns_to_drop {
            Some(names) => drop_columns(df, names),
            None => df.clone(),
        }
    }

    fn impute(mut result: DataFrame) -> Result<DataFrame> {
        for (name, kind) in Self::column_kinds(&result)? {
            let series = result.column(&name)?.as_materialized_series();
            let filled = match kind {
                ColumnKind::Numeric => impute_mean(series)?,
                ColumnKind::Categorical => impute_mode(series)?,
            };
            result.with_column(filled)?;
        }

        Ok(result)
    }

    fn column_kinds(df: &DataFrame) -> Result<Vec<(String, ColumnKind)>> {
        df.get_columns()
            .iter()
            .map(|col| {
                let name = col.name().to_string();
                let kind = ColumnKind::of(&name, col.dtype())?;
                Ok((name, kind))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df! {
            "age" => [Some(20.0), None, Some(40.0), Some(30.0)],
            "city" => [Some("paris"), Some("rome"), None, Some("paris")],
            "id" => [1i64, 2, 3, 4],
        }
        .unwrap()
    }

    #[test]
    fn test_drop_unknown_column_is_noop() {
        let df = sample();
        let dropped = drop_columns(&df, &["nope".to_string()]);
        assert!(dropped.equals_missing(&df));
    }

    #[test]
    fn test_drop_columns_is_idempotent() {
        let df = sample();
        let names = vec!["id".to_string(), "id".to_string(), "nope".to_string()];
        let once = drop_columns(&df, &names);
        let twice = drop_columns(&once, &names);
        let names: Vec<&str> = once.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["age", "city"]);
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_fit_transform_is_numeric() {
        let mut pre = Preprocessor::new();
        let out = pre.fit_transform(&sample(), Some(&["id".to_string()])).unwrap();

        assert_eq!(out.width(), 2);
        for col in out.get_columns() {
            assert_eq!(col.dtype(), &DataType::Float64);
            assert_eq!(col.null_count(), 0);
        }

        let age = out.column("age").unwrap().f64().unwrap();
        assert_eq!(age.get(1), Some(30.0));

        // paris=0, rome=1; missing city imputed with mode "paris"
        let city: Vec<f64> = out.column("city").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(city, vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(pre.encoders().len(), 1);
    }

    #[test]
    fn test_transform_reuses_encoders() {
        let mut pre = Preprocessor::new();
        pre.fit_transform(&sample(), None).unwrap();

        let new = df! { "age" => [50.0], "city" => ["rome"], "id" => [9i64] }.unwrap();
        let out = pre.transform(&new, None).unwrap();
        assert_eq!(out.column("city").unwrap().f64().unwrap().get(0), Some(1.0));
    }

    #[test]
    fn test_transform_rejects_unseen_category() {
        let mut pre = Preprocessor::new();
        pre.fit_transform(&sample(), None).unwrap();

        let new = df! { "age" => [50.0], "city" => ["oslo"], "id" => [9i64] }.unwrap();
        assert!(matches!(
            pre.transform(&new, None),
            Err(PipelineError::UnseenCategory { .. })
        ));
    }

    #[test]
    fn test_transform_without_encoder_is_schema_mismatch() {
        let mut pre = Preprocessor::new();
        pre.fit_transform(&sample(), None).unwrap();

        let new = df! { "age" => [50.0], "city" => ["rome"], "color" => ["red"] }.unwrap();
        assert!(matches!(
            pre.transform(&new, None),
            Err(PipelineError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_transform_reads_encoded_integers_as_text() {
        let train = df! { "code" => ["1", "2", "x"], "y" => [10.0, 20.0, 30.0] }.unwrap();
        let mut pre = Preprocessor::new();
        pre.fit_transform(&train, None).unwrap();

        let new = df! { "code" => [1i64, 2] }.unwrap();
        let out = pre.transform(&new, None).unwrap();
        let codes: Vec<f64> = out.column("code").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(codes, vec![0.0, 1.0]);

        let unseen = df! { "code" => [3i64] }.unwrap();
        assert!(matches!(
            pre.transform(&unseen, None),
            Err(PipelineError::UnseenCategory { .. })
        ));
    }

    #[test]
    fn test_refit_replaces_encoder_set() {
        let mut pre = Preprocessor::new();
        pre.fit_transform(&sample(), None).unwrap();

        let other = df! { "size" => ["s", "m"], "y" => [0i64, 1] }.unwrap();
        pre.fit_transform(&other, None).unwrap();
        let fitted: Vec<String> = pre.encoders().keys().cloned().collect();
        assert_eq!(fitted, vec!["size".to_string()]);
    }
}
