//! Flattens a [`ReportPage`] into typed [`ReportRow`]s.

use crate::page::ReportPage;
use crate::table::{ReportRow, Value};
use crate::{Error, Result};

/// The rows pulled out of a single page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub rows: Vec<ReportRow>,
    /// Header or value entries that had no counterpart and were dropped. Non-zero means the
    /// service returned rows that didn't line up with the column headers.
    pub dropped_values: usize,
}

/// Converts every row of `page`. Dimension values stay strings, metric values are typed by
/// [`parse_metric`]. Rows whose header and value counts disagree are zipped to the shorter
/// of the two, with the leftovers counted in [`Extracted::dropped_values`].
pub fn extract_rows(page: &ReportPage) -> Result<Extracted> {
    let dimension_headers = page.dimension_headers();
    let metric_headers = page.metric_headers();

    let mut extracted = Extracted {
        rows: Vec::with_capacity(page.rows().len()),
        dropped_values: 0,
    };

    for raw in page.rows() {
        let mut row = ReportRow::with_capacity(dimension_headers.len() + metric_headers.len());

        extracted.dropped_values += dimension_headers.len().abs_diff(raw.dimensions.len());
        for (header, value) in dimension_headers.iter().zip(raw.dimensions.iter()) {
            row.insert(header.clone(), Value::String(value.clone()));
        }

        for date_range in raw.metrics.iter() {
            extracted.dropped_values += metric_headers.len().abs_diff(date_range.values.len());

            for (header, value) in metric_headers.iter().zip(date_range.values.iter()) {
                row.insert(header.name.clone(), parse_metric(&header.name, value)?);
            }
        }

        extracted.rows.push(row);
    }

    if extracted.dropped_values > 0 {
        warn!(
            message = "report rows didn't match their headers, extra values were dropped",
            dropped_values = extracted.dropped_values,
        );
    }

    Ok(extracted)
}

/// Types a raw metric value. Anything with a `.` or `,` becomes a float, everything else an
/// integer.
///
/// `,` is only ever a thousands separator (`"1,234"` is `1234.0`, `"1,234.5"` is `1234.5`).
/// Values whose commas don't group the integer part in threes, like `"12,5"`, are rejected
/// rather than guessed at.
pub fn parse_metric(metric: &str, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();

    let invalid = || Error::InvalidMetricValue {
        metric: metric.into(),
        value: raw.into(),
    };

    if trimmed.contains(',') {
        return strip_thousands(trimmed)
            .and_then(|plain| plain.parse::<f64>().ok())
            .map(Value::Float)
            .ok_or_else(invalid);
    }

    if trimmed.contains('.') {
        trimmed.parse::<f64>().map(Value::Float).map_err(|_| invalid())
    } else {
        trimmed.parse::<i64>().map(Value::Integer).map_err(|_| invalid())
    }
}

/// Removes thousands separators, returning `None` if they aren't well placed.
fn strip_thousands(value: &str) -> Option<String> {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    if fraction.contains(',') {
        return None;
    }

    let mut groups = integer.split(',');
    let leading = groups.next()?;
    if leading.is_empty() || leading.len() > 3 || !leading.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    if !groups.all(|group| group.len() == 3 && group.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    Some(value.replace(',', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: serde_json::Value) -> ReportPage {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!(parse_metric("ga:sessions", "1234").unwrap(), Value::Integer(1234));
        assert_eq!(parse_metric("ga:sessions", "-7").unwrap(), Value::Integer(-7));
        assert_eq!(parse_metric("ga:bounceRate", "12.5").unwrap(), Value::Float(12.5));
        assert_eq!(parse_metric("ga:bounceRate", "0.0").unwrap(), Value::Float(0.0));
        assert_eq!(parse_metric("ga:revenue", "1,234.5").unwrap(), Value::Float(1234.5));

        let err = parse_metric("ga:sessions", "n/a").unwrap_err();
        assert!(matches!(err, Error::InvalidMetricValue { .. }));
    }

    #[test]
    fn test_parse_metric_thousands_separators() {
        assert_eq!(parse_metric("ga:sessions", "1,234").unwrap(), Value::Float(1234.0));
        assert_eq!(parse_metric("ga:sessions", "1,234,567").unwrap(), Value::Float(1234567.0));
        assert_eq!(parse_metric("ga:sessions", "-12,345").unwrap(), Value::Float(-12345.0));
        assert_eq!(parse_metric("ga:revenue", "987,654.25").unwrap(), Value::Float(987654.25));

        for bad in ["12,5", "1,23", "1234,567", ",123", "1,", "1,234.5,6", "1,,234"] {
            let err = parse_metric("ga:bounceRate", bad).unwrap_err();
            assert!(matches!(err, Error::InvalidMetricValue { .. }), "{bad} parsed");
        }
    }

    #[test]
    fn test_extract_types_columns() {
        let page = page(serde_json::json!({
            "columnHeader": {
                "dimensions": ["ga:date", "ga:source"],
                "metricHeader": {"metricHeaderEntries": [
                    {"name": "ga:sessions", "type": "INTEGER"},
                    {"name": "ga:avgSessionDuration", "type": "TIME"}
                ]}
            },
            "data": {
                "rows": [
                    {"dimensions": ["20240101", "google"], "metrics": [{"values": ["1234", "12.5"]}]},
                    {"dimensions": ["20240101", "bing"], "metrics": [{"values": ["7", "0"]}]}
                ],
                "rowCount": 2
            }
        }));

        let Extracted {
            rows,
            dropped_values,
        } = extract_rows(&page).unwrap();

        assert_eq!(dropped_values, 0);
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(
            first.columns().collect::<Vec<_>>(),
            ["ga:date", "ga:source", "ga:sessions", "ga:avgSessionDuration"]
        );
        assert_eq!(first.get("ga:date"), Some(&Value::from("20240101")));
        assert_eq!(first.get("ga:sessions"), Some(&Value::Integer(1234)));
        assert_eq!(first.get("ga:avgSessionDuration"), Some(&Value::Float(12.5)));
        assert_eq!(rows[1].get("ga:avgSessionDuration"), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_mismatched_rows_are_truncated() {
        let page = page(serde_json::json!({
            "columnHeader": {
                "dimensions": ["ga:date"],
                "metricHeader": {"metricHeaderEntries": [
                    {"name": "ga:users"},
                    {"name": "ga:sessions"}
                ]}
            },
            "data": {
                "rows": [
                    {"dimensions": ["20240101", "extra"], "metrics": [{"values": ["5"]}]}
                ],
                "rowCount": 1
            }
        }));

        let extracted = extract_rows(&page).unwrap();

        assert_eq!(extracted.dropped_values, 2);
        let row = &extracted.rows[0];
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("ga:users"), Some(&Value::Integer(5)));
        assert_eq!(row.get("ga:sessions"), None);
    }

    #[test]
    fn test_empty_page() {
        let extracted = extract_rows(&ReportPage::default()).unwrap();
        assert!(extracted.rows.is_empty());
        assert_eq!(extracted.dropped_values, 0);
    }
}
