//! Prometheus `query_range` response documents.

use crate::error::{FetchError, FetchResult};
use blockrate_core::{RawSeries, SeriesPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level `query_range` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRangeResponse {
    /// `success` or `error`.
    #[serde(default = "default_status")]
    pub status: String,
    /// Result payload, present on success.
    #[serde(default)]
    pub data: Option<QueryRangeData>,
    /// Error class, present on failure.
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    /// Error message, present on failure.
    #[serde(default)]
    pub error: Option<String>,
}

/// `data` member of a range query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRangeData {
    /// Usually `matrix` for range queries.
    #[serde(default, rename = "resultType")]
    pub result_type: Option<String>,
    /// One entry per matching series.
    pub result: Vec<RangeSeries>,
}

/// A single series of a range query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSeries {
    /// Label set of the series.
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    /// `[unix seconds, value]` pairs, oldest first.
    #[serde(default)]
    pub values: Vec<(f64, ScalarValue)>,
}

/// Sample value; Prometheus encodes these as strings, some proxies as plain numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Numeric encoding.
    Number(f64),
    /// String encoding.
    Text(String),
}

impl ScalarValue {
    /// Numeric value as sent; `NaN` when the text is not a number.
    #[must_use]
    pub fn raw(&self) -> f64 {
        match self {
            ScalarValue::Number(value) => *value,
            ScalarValue::Text(text) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        }
    }

    /// Parses the value into a finite number.
    pub fn as_f64(&self) -> FetchResult<f64> {
        let value = match self {
            ScalarValue::Number(value) => *value,
            ScalarValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| FetchError::malformed(format!("non-numeric value {text:?}")))?,
        };
        if !value.is_finite() {
            return Err(FetchError::malformed(format!("non-finite value {value}")));
        }
        Ok(value)
    }
}

fn default_status() -> String {
    "success".to_string()
}

impl QueryRangeResponse {
    /// Parses a response body.
    pub fn from_json(content: &str) -> FetchResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Converts the first series of the response into a [`RawSeries`].
    ///
    /// An empty result set is not an error; it yields an empty series. Only the point that
    /// [`RawSeries::accepted_height`] reads is validated; the newest point is carried as sent.
    pub fn into_series(self) -> FetchResult<RawSeries> {
        if self.status != "success" {
            return Err(FetchError::Upstream {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: self.error.unwrap_or_else(|| self.status.clone()),
            });
        }

        let data = self
            .data
            .ok_or_else(|| FetchError::decode("missing data member"))?;

        let Some(series) = data.result.into_iter().next() else {
            return Ok(RawSeries::empty());
        };

        let accepted = series.values.len().checked_sub(2);
        let mut points = Vec::with_capacity(series.values.len());
        for (index, (unix_seconds, value)) in series.values.iter().enumerate() {
            let value = if Some(index) == accepted {
                let value = value.as_f64()?;
                if value < 0.0 {
                    return Err(FetchError::malformed(format!(
                        "negative block height {value}"
                    )));
                }
                value
            } else {
                value.raw()
            };
            points.push(SeriesPoint::new(*unix_seconds, value));
        }
        Ok(RawSeries::new(points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_numeric_values() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [{
                    "metric": {},
                    "values": [[1600000000, "100"], [1600000060, 160.7], [1600000120, "220"]]
                }]
            }
        }"#;
        let series = QueryRangeResponse::from_json(body)
            .and_then(QueryRangeResponse::into_series)
            .expect("series");
        assert_eq!(series.len(), 3);
        assert_eq!(series.points()[1].value, 160.7);
        assert_eq!(series.accepted_height(), Some(160));
    }

    #[test]
    fn empty_result_is_empty_series() {
        let body = r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#;
        let series = QueryRangeResponse::from_json(body)
            .and_then(QueryRangeResponse::into_series)
            .expect("series");
        assert!(series.is_empty());
    }

    #[test]
    fn upstream_error_is_reported() {
        let body = r#"{"status":"error","errorType":"bad_data","error":"parse error at char 4"}"#;
        let err = QueryRangeResponse::from_json(body)
            .and_then(QueryRangeResponse::into_series)
            .expect_err("error status");
        assert_eq!(
            err,
            FetchError::Upstream {
                error_type: "bad_data".to_string(),
                message: "parse error at char 4".to_string(),
            }
        );
    }

    #[test]
    fn rejects_unusable_accepted_value() {
        for value in [r#""NaN""#, r#""+Inf""#, r#""abc""#, r#""-5""#] {
            let body = format!(
                r#"{{"status":"success","data":{{"result":[{{"values":[[1,"1"],[2,{value}],[3,"7"]]}}]}}}}"#
            );
            let err = QueryRangeResponse::from_json(&body)
                .and_then(QueryRangeResponse::into_series)
                .expect_err("malformed value");
            assert_eq!(err.kind(), "malformed", "value {value}");
        }
    }

    #[test]
    fn unusable_newest_value_is_ignored() {
        for value in [r#""NaN""#, r#""+Inf""#, r#""abc""#, r#""-5""#] {
            let body = format!(
                r#"{{"status":"success","data":{{"result":[{{"values":[[1,"100"],[2,"160"],[3,{value}]]}}]}}}}"#
            );
            let series = QueryRangeResponse::from_json(&body)
                .and_then(QueryRangeResponse::into_series)
                .expect("series");
            assert_eq!(series.len(), 3, "value {value}");
            assert_eq!(series.accepted_height(), Some(160), "value {value}");
        }
    }

    #[test]
    fn single_point_is_not_validated() {
        let body = r#"{"status":"success","data":{"result":[{"values":[[1,"NaN"]]}]}}"#;
        let series = QueryRangeResponse::from_json(body)
            .and_then(QueryRangeResponse::into_series)
            .expect("series");
        assert_eq!(series.accepted_height(), None);
    }

    #[test]
    fn missing_data_is_decode_error() {
        let err = QueryRangeResponse::from_json(r#"{"status":"success"}"#)
            .and_then(QueryRangeResponse::into_series)
            .expect_err("missing data");
        assert_eq!(err.kind(), "decode");

        let err = QueryRangeResponse::from_json("<html>").expect_err("not json");
        assert_eq!(err.kind(), "decode");
    }
}
