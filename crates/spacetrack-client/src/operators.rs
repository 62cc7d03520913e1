//! Predicate values and Space-Track query operators.
//!
//! Values are rendered into URL path segments by a [`ValueFormatter`]. The
//! default [`SpaceTrackFormatter`] produces Space-Track's operator syntax:
//!
//! | Value | Rendered |
//! |-------|----------|
//! | `greater_than(5)` | `>5` |
//! | `less_than(5)` | `<5` |
//! | `not_equal("DEBRIS")` | `<>DEBRIS` |
//! | `inclusive_range(1, 10)` | `1--10` |
//! | `like("ISS")` | `~~ISS` |
//! | `startswith("STARLINK")` | `^STARLINK` |
//! | `vec![1, 2, 3]` | `1,2,3` |
//! | `PredicateValue::Null` | `null-val` |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::fmt;

/// A value bound to a query predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<PredicateValue>),
    GreaterThan(Box<PredicateValue>),
    LessThan(Box<PredicateValue>),
    NotEqual(Box<PredicateValue>),
    Range(Box<PredicateValue>, Box<PredicateValue>),
    Like(Box<PredicateValue>),
    StartsWith(Box<PredicateValue>),
}

/// `>value`
pub fn greater_than(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::GreaterThan(Box::new(value.into()))
}

/// `<value`
pub fn less_than(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::LessThan(Box::new(value.into()))
}

/// `<>value`
pub fn not_equal(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::NotEqual(Box::new(value.into()))
}

/// `left--right`, inclusive on both ends.
pub fn inclusive_range(
    left: impl Into<PredicateValue>,
    right: impl Into<PredicateValue>,
) -> PredicateValue {
    PredicateValue::Range(Box::new(left.into()), Box::new(right.into()))
}

/// `~~value`
pub fn like(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::Like(Box::new(value.into()))
}

/// `^value`
pub fn startswith(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::StartsWith(Box::new(value.into()))
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PredicateValue {
                fn from(value: $ty) -> Self {
                    PredicateValue::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for PredicateValue {
    fn from(value: f64) -> Self {
        PredicateValue::Float(value)
    }
}

impl From<f32> for PredicateValue {
    fn from(value: f32) -> Self {
        PredicateValue::Float(f64::from(value))
    }
}

impl From<bool> for PredicateValue {
    fn from(value: bool) -> Self {
        PredicateValue::Bool(value)
    }
}

impl From<&str> for PredicateValue {
    fn from(value: &str) -> Self {
        PredicateValue::Str(value.to_string())
    }
}

impl From<String> for PredicateValue {
    fn from(value: String) -> Self {
        PredicateValue::Str(value)
    }
}

impl From<NaiveDate> for PredicateValue {
    fn from(value: NaiveDate) -> Self {
        PredicateValue::Date(value)
    }
}

impl From<NaiveDateTime> for PredicateValue {
    fn from(value: NaiveDateTime) -> Self {
        PredicateValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for PredicateValue {
    fn from(value: DateTime<Utc>) -> Self {
        PredicateValue::DateTime(value.naive_utc())
    }
}

impl<T: Into<PredicateValue>> From<Option<T>> for PredicateValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PredicateValue::Null, Into::into)
    }
}

impl<T: Into<PredicateValue>> From<Vec<T>> for PredicateValue {
    fn from(values: Vec<T>) -> Self {
        PredicateValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Renders predicate values into URL path segments.
pub trait ValueFormatter: Send + Sync + fmt::Debug {
    fn format(&self, value: &PredicateValue) -> String;
}

/// Space-Track's value syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaceTrackFormatter;

impl ValueFormatter for SpaceTrackFormatter {
    fn format(&self, value: &PredicateValue) -> String {
        match value {
            PredicateValue::Null => "null-val".to_string(),
            PredicateValue::Bool(b) => b.to_string(),
            PredicateValue::Int(i) => i.to_string(),
            PredicateValue::Float(f) => f.to_string(),
            PredicateValue::Str(s) => s.clone(),
            PredicateValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            PredicateValue::DateTime(dt) => {
                if dt.nanosecond() == 0 {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
                }
            }
            PredicateValue::List(items) => items
                .iter()
                .map(|item| self.format(item))
                .collect::<Vec<_>>()
                .join(","),
            PredicateValue::GreaterThan(v) => format!(">{}", self.format(v)),
            PredicateValue::LessThan(v) => format!("<{}", self.format(v)),
            PredicateValue::NotEqual(v) => format!("<>{}", self.format(v)),
            PredicateValue::Range(l, r) => format!("{}--{}", self.format(l), self.format(r)),
            PredicateValue::Like(v) => format!("~~{}", self.format(v)),
            PredicateValue::StartsWith(v) => format!("^{}", self.format(v)),
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&SpaceTrackFormatter.format(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(value: impl Into<PredicateValue>) -> String {
        SpaceTrackFormatter.format(&value.into())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render(25544), "25544");
        assert_eq!(render(true), "true");
        assert_eq!(render(false), "false");
        assert_eq!(render("ISS (ZARYA)"), "ISS (ZARYA)");
        assert_eq!(render(Option::<i32>::None), "null-val");
        assert_eq!(render(Some(5)), "5");
    }

    #[test]
    fn test_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(render(date), "2024-03-01");

        let dt = date.and_hms_opt(12, 30, 5).unwrap();
        assert_eq!(render(dt), "2024-03-01 12:30:05");

        let dt_micro = date.and_hms_micro_opt(12, 30, 5, 250).unwrap();
        assert_eq!(render(dt_micro), "2024-03-01 12:30:05.000250");
    }

    #[test]
    fn test_operators() {
        assert_eq!(greater_than(5).to_string(), ">5");
        assert_eq!(less_than(2.5).to_string(), "<2.5");
        assert_eq!(not_equal("DEBRIS").to_string(), "<>DEBRIS");
        assert_eq!(like("ISS").to_string(), "~~ISS");
        assert_eq!(startswith("STARLINK").to_string(), "^STARLINK");

        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            inclusive_range(from, to).to_string(),
            "2024-01-01--2024-01-31"
        );
    }

    #[test]
    fn test_list_renders_nested_values() {
        assert_eq!(render(vec![25544, 20580]), "25544,20580");
        let mixed = PredicateValue::List(vec![greater_than(1), PredicateValue::Null]);
        assert_eq!(render(mixed), ">1,null-val");
    }
}
