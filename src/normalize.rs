//! Conversion of untrusted backend JSON into the canonical records in
//! [`crate::models`].
//!
//! Every function here is total: missing, null or mistyped fields fall back
//! to the documented defaults instead of failing. Keys are accepted in both
//! the backend's snake_case and the camelCase used by older clients.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{ServiceInfo, TestPhase, TestRunSummary, TestStatus};

pub const DEFAULT_RUN_NAME: &str = "Unnamed Test";
pub const DEFAULT_UNIT_ID: &str = "No Device ID";
pub const DEFAULT_UNIT_SERIAL: &str = "No Serial";
pub const DEFAULT_PHASE_NAME: &str = "Unnamed Phase";

/// Normalize one run record. `now` stands in for missing or unparseable
/// timestamps.
pub fn normalize_run(raw: &Value, now: DateTime<Utc>) -> TestRunSummary {
    TestRunSummary {
        id: id_field(raw, &["id"]).unwrap_or(0),
        name: string_field(raw, &["name"]).unwrap_or_else(|| DEFAULT_RUN_NAME.to_string()),
        unit_id: string_field(raw, &["uut_id", "uutId", "unitId"])
            .unwrap_or_else(|| DEFAULT_UNIT_ID.to_string()),
        unit_serial: string_field(raw, &["uut_serial", "uutSerial", "unitSerial"])
            .unwrap_or_else(|| DEFAULT_UNIT_SERIAL.to_string()),
        status: status_field(raw),
        created_at: timestamp_field(raw, &["created_at", "createdAt"], now),
        updated_at: timestamp_field(raw, &["updated_at", "updatedAt"], now),
        metadata: object_field(raw, &["meta_data", "metadata"]),
    }
}

/// Normalize a run list, most recent first. A non-array payload yields an
/// empty list.
pub fn normalize_runs(raw: &Value, now: DateTime<Utc>) -> Vec<TestRunSummary> {
    let mut runs: Vec<TestRunSummary> = match raw.as_array() {
        Some(items) => items.iter().map(|item| normalize_run(item, now)).collect(),
        None => Vec::new(),
    };
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    runs
}

/// Normalize one phase record. `run_id` is used when the record does not name
/// its parent run.
pub fn normalize_phase(raw: &Value, run_id: i64, now: DateTime<Utc>) -> TestPhase {
    TestPhase {
        id: id_field(raw, &["id"]).unwrap_or(0),
        name: string_field(raw, &["name"]).unwrap_or_else(|| DEFAULT_PHASE_NAME.to_string()),
        description: string_field(raw, &["description"]).unwrap_or_default(),
        status: status_field(raw),
        duration_seconds: field(raw, &["duration", "durationSeconds", "duration_seconds"])
            .and_then(Value::as_f64)
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(0.0),
        measurements: object_field(raw, &["measurements"]),
        test_run_id: id_field(raw, &["test_run_id", "testRunId"]).unwrap_or(run_id),
        created_at: timestamp_field(raw, &["created_at", "createdAt"], now),
        updated_at: timestamp_field(raw, &["updated_at", "updatedAt"], now),
    }
}

/// Phases keep the order the backend returned them in.
pub fn normalize_phases(raw: &Value, run_id: i64, now: DateTime<Utc>) -> Vec<TestPhase> {
    match raw.as_array() {
        Some(items) => items
            .iter()
            .map(|item| normalize_phase(item, run_id, now))
            .collect(),
        None => Vec::new(),
    }
}

pub fn normalize_service_info(raw: &Value) -> ServiceInfo {
    ServiceInfo {
        message: string_field(raw, &["message"]).unwrap_or_default(),
    }
}

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = raw.as_object()?;
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    match field(raw, keys)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_field(raw: &Value, keys: &[&str]) -> Option<i64> {
    match field(raw, keys)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn status_field(raw: &Value) -> TestStatus {
    field(raw, &["status"])
        .and_then(Value::as_str)
        .map(TestStatus::parse)
        .unwrap_or_default()
}

fn timestamp_field(raw: &Value, keys: &[&str], now: DateTime<Utc>) -> DateTime<Utc> {
    field(raw, keys)
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or(now)
}

fn object_field(raw: &Value, keys: &[&str]) -> Map<String, Value> {
    field(raw, keys)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_minimal_run_gets_defaults() {
        let run = normalize_run(&json!({"id": 7, "status": "Passed"}), now());

        assert_eq!(run.id, 7);
        assert_eq!(run.name, "Unnamed Test");
        assert_eq!(run.unit_id, "No Device ID");
        assert_eq!(run.unit_serial, "No Serial");
        assert_eq!(run.status, TestStatus::Passed);
        assert!(run.metadata.is_empty());
        assert_eq!(run.created_at, now());
        assert_eq!(run.updated_at, now());
    }

    #[test]
    fn test_empty_object_and_non_objects_are_total() {
        for raw in [json!({}), json!(null), json!("run"), json!([1, 2]), json!(3)] {
            let run = normalize_run(&raw, now());
            assert_eq!(run.id, 0);
            assert_eq!(run.name, DEFAULT_RUN_NAME);
            assert_eq!(run.status, TestStatus::Unknown);
        }
    }

    #[test]
    fn test_null_fields_fall_back() {
        let raw = json!({
            "id": 3,
            "name": null,
            "uut_id": null,
            "status": null,
            "meta_data": null,
            "created_at": null
        });
        let run = normalize_run(&raw, now());
        assert_eq!(run.name, DEFAULT_RUN_NAME);
        assert_eq!(run.unit_id, DEFAULT_UNIT_ID);
        assert_eq!(run.status, TestStatus::Unknown);
        assert!(run.metadata.is_empty());
        assert_eq!(run.created_at, now());
    }

    #[test]
    fn test_backend_snake_case_record() {
        let raw = json!({
            "id": 12,
            "name": "Motor torque",
            "uut_id": "MTR-01",
            "uut_serial": "SN-12345",
            "status": "FAILED",
            "meta_data": {"operator": "jd"},
            "results": {"ignored": true},
            "created_at": "2024-05-01T10:24:00.123456",
            "updated_at": "2024-05-01T10:30:00Z"
        });
        let run = normalize_run(&raw, now());

        assert_eq!(run.name, "Motor torque");
        assert_eq!(run.unit_id, "MTR-01");
        assert_eq!(run.unit_serial, "SN-12345");
        assert_eq!(run.status, TestStatus::Failed);
        assert_eq!(run.metadata.get("operator"), Some(&json!("jd")));
        assert_eq!(
            run.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 24, 0).unwrap()
                + Duration::microseconds(123456)
        );
        assert_eq!(
            run.updated_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_camel_case_record() {
        let raw = json!({
            "id": "21",
            "uutId": "DEV-9",
            "uutSerial": 4411,
            "metadata": {"line": "A"},
            "createdAt": "2024-05-02T08:00:00+02:00"
        });
        let run = normalize_run(&raw, now());
        assert_eq!(run.id, 21);
        assert_eq!(run.unit_id, "DEV-9");
        assert_eq!(run.unit_serial, "4411");
        assert_eq!(run.metadata.get("line"), Some(&json!("A")));
        assert_eq!(
            run.created_at,
            Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unparseable_timestamp_uses_now() {
        let run = normalize_run(&json!({"created_at": "yesterday-ish"}), now());
        assert_eq!(run.created_at, now());
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let raw = json!({"id": 1, "status": "running", "name": "x"});
        assert_eq!(normalize_run(&raw, now()), normalize_run(&raw, now()));
    }

    #[test]
    fn test_run_list_sorted_most_recent_first() {
        let t = now();
        let stamp = |d: DateTime<Utc>| d.to_rfc3339();
        let raw = json!([
            {"id": 1, "created_at": stamp(t - Duration::hours(2))},
            {"id": 2, "created_at": stamp(t)},
            {"id": 3, "created_at": stamp(t - Duration::hours(1))},
        ]);

        let ids: Vec<i64> = normalize_runs(&raw, t).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_run_list_from_non_array_is_empty() {
        assert!(normalize_runs(&json!({"detail": "oops"}), now()).is_empty());
    }

    #[test]
    fn test_phase_defaults() {
        let phase = normalize_phase(&json!({"id": 4}), 9, now());
        assert_eq!(phase.name, DEFAULT_PHASE_NAME);
        assert_eq!(phase.description, "");
        assert_eq!(phase.status, TestStatus::Unknown);
        assert_eq!(phase.duration_seconds, 0.0);
        assert!(phase.measurements.is_empty());
        assert_eq!(phase.test_run_id, 9);
    }

    #[test]
    fn test_phase_fields() {
        let raw = json!({
            "id": 5,
            "name": "Calibration",
            "description": "Sensor calibration",
            "status": "passed",
            "duration": 15.5,
            "measurements": {"temperature": 25.2},
            "test_run_id": 3
        });
        let phase = normalize_phase(&raw, 9, now());
        assert_eq!(phase.name, "Calibration");
        assert_eq!(phase.status, TestStatus::Passed);
        assert_eq!(phase.duration_seconds, 15.5);
        assert_eq!(phase.measurements.get("temperature"), Some(&json!(25.2)));
        assert_eq!(phase.test_run_id, 3);
    }

    #[test]
    fn test_negative_duration_clamped() {
        let phase = normalize_phase(&json!({"duration": -3.0}), 1, now());
        assert_eq!(phase.duration_seconds, 0.0);
    }

    #[test]
    fn test_phases_keep_backend_order() {
        let raw = json!([{"id": 3}, {"id": 1}, {"id": 2}]);
        let ids: Vec<i64> = normalize_phases(&raw, 1, now()).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_service_info() {
        let info = normalize_service_info(&json!({"message": "Welcome"}));
        assert_eq!(info.message, "Welcome");
        assert_eq!(normalize_service_info(&json!([])).message, "");
    }
}
