//! Score scaling and letter grades shared by rating calculators.

use polars::prelude::*;

use crate::pipeline::ComputeError;

/// Lower bound of each grade, best first. Anything below the last bound is an F.
pub const GRADE_THRESHOLDS: [(f64, &str); 12] = [
    (9.23, "A+"),
    (8.46, "A"),
    (7.69, "A-"),
    (6.92, "B+"),
    (6.15, "B"),
    (5.38, "B-"),
    (4.61, "C+"),
    (3.85, "C"),
    (3.08, "C-"),
    (2.31, "D+"),
    (1.54, "D"),
    (0.77, "D-"),
];

/// Map `value` from `[min, max]` onto `[0, 10]`. A degenerate range scores 5.
pub fn scale_to_10(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 5.0;
    }
    (value - min) / (max - min) * 10.0
}

/// Scale every value against the column's own min and max.
///
/// Non-finite values (`inf`, `NaN`) count as 0, the same as filled nulls.
pub fn scale_column(values: &[f64]) -> Vec<f64> {
    let values: Vec<f64> = values
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    values.iter().map(|&v| scale_to_10(v, min, max)).collect()
}

/// `10 - x`, so that lower raw values rank higher.
pub fn invert(scores: &mut [f64]) {
    for score in scores.iter_mut() {
        *score = 10.0 - *score;
    }
}

pub fn convert_to_grade(score: f64) -> &'static str {
    GRADE_THRESHOLDS
        .iter()
        .find(|(bound, _)| score >= *bound)
        .map_or("F", |(_, grade)| grade)
}

pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Names of numeric columns, in frame order.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric(c.dtype()))
        .map(|c| c.name().to_string())
        .collect()
}

/// Replace nulls in numeric columns with zero.
pub fn fill_numeric_nulls(df: DataFrame) -> Result<DataFrame, ComputeError> {
    let exprs: Vec<Expr> = numeric_columns(&df)
        .into_iter()
        .map(|name| col(name).fill_null(lit(0)))
        .collect();
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Column values as `f64`, nulls read as zero.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, ComputeError> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.iter().map(|v| v.unwrap_or(0.0)).collect())
}

/// Append `score - {label}` and its letter grade `AAA - {label}`.
pub fn push_score(df: &mut DataFrame, label: &str, scores: Vec<f64>) -> Result<(), ComputeError> {
    let grades: Vec<&str> = scores.iter().map(|&s| convert_to_grade(s)).collect();
    df.with_column(Column::new(format!("score - {label}").into(), scores))?;
    df.with_column(Column::new(format!("AAA - {label}").into(), grades))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_endpoints() {
        assert_eq!(scale_to_10(1.0, 1.0, 3.0), 0.0);
        assert_eq!(scale_to_10(2.0, 1.0, 3.0), 5.0);
        assert_eq!(scale_to_10(3.0, 1.0, 3.0), 10.0);
        assert_eq!(scale_to_10(7.0, 7.0, 7.0), 5.0);
    }

    #[test]
    fn scale_column_uses_own_range() {
        assert_eq!(scale_column(&[0.0, 5.0, 10.0]), vec![0.0, 5.0, 10.0]);
        assert_eq!(scale_column(&[4.0, 4.0]), vec![5.0, 5.0]);
        assert!(scale_column(&[]).is_empty());
    }

    #[test]
    fn non_finite_values_scale_as_zero() {
        assert_eq!(
            scale_column(&[0.0, f64::INFINITY, 10.0]),
            vec![0.0, 0.0, 10.0]
        );
        assert_eq!(scale_column(&[f64::NAN, 2.0]), vec![0.0, 10.0]);
        assert_eq!(scale_column(&[f64::NEG_INFINITY]), vec![5.0]);
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(convert_to_grade(10.0), "A+");
        assert_eq!(convert_to_grade(9.23), "A+");
        assert_eq!(convert_to_grade(9.22), "A");
        assert_eq!(convert_to_grade(5.0), "C+");
        assert_eq!(convert_to_grade(0.77), "D-");
        assert_eq!(convert_to_grade(0.76), "F");
        assert_eq!(convert_to_grade(-1.0), "F");
    }

    #[test]
    fn invert_flips_scale() {
        let mut scores = vec![0.0, 2.5, 10.0];
        invert(&mut scores);
        assert_eq!(scores, vec![10.0, 7.5, 0.0]);
    }

    #[test]
    fn fills_only_numeric_nulls() {
        let df = df!(
            "ticker" => &[Some("A"), None],
            "roe" => &[Some(1.0f64), None],
        )
        .unwrap();

        let filled = fill_numeric_nulls(df).unwrap();
        assert_eq!(filled.column("roe").unwrap().null_count(), 0);
        assert_eq!(filled.column("ticker").unwrap().null_count(), 1);
        assert_eq!(f64_values(&filled, "roe").unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn push_score_adds_score_and_grade() {
        let mut df = df!("roe" => &[1.0f64, 2.0]).unwrap();
        push_score(&mut df, "roe", vec![10.0, 0.0]).unwrap();

        let grades = df.column("AAA - roe").unwrap().str().unwrap();
        assert_eq!(grades.get(0), Some("A+"));
        assert_eq!(grades.get(1), Some("F"));
        assert!(df.column("score - roe").is_ok());
    }
}
