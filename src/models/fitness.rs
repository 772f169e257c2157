//! Fitness record model for storage and API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day's fitness entry, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FitnessRecord {
    /// Record identifier (also used as document ID)
    pub id: Uuid,
    /// Owner. Always the authenticated user at write time.
    pub user_id: Uuid,
    /// Calendar date of the entry
    pub date: NaiveDate,
    pub steps: i64,
    /// Kilocalories burned
    pub calories: i64,
    /// Distance in kilometers
    pub distance: f64,
    /// Insertion time, breaks ties between entries on the same date
    #[serde(serialize_with = "sortable_timestamp::serialize")]
    pub created_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 with nanoseconds, so stores that order the stored
/// string lexicographically still order by time.
mod sortable_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}

/// Unvalidated fields of a new record as submitted by a client.
///
/// There is intentionally no owner field here.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordDraft {
    pub date: String,
    pub steps: i64,
    pub calories: i64,
    pub distance: f64,
}

/// Sort records the way every listing returns them: date descending,
/// then newest insertion first.
pub fn sort_newest_first(records: &mut [FitnessRecord]) {
    records.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(date: &str, created_secs: i64) -> FitnessRecord {
        FitnessRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            steps: 0,
            calories: 0,
            distance: 0.0,
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_sort_newest_first() {
        let mut records = vec![
            record("2024-01-01", 10),
            record("2024-03-01", 5),
            record("2024-01-01", 20),
            record("2023-12-31", 30),
        ];
        sort_newest_first(&mut records);

        let order: Vec<(String, i64)> = records
            .iter()
            .map(|r| (r.date.to_string(), r.created_at.timestamp()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2024-03-01".to_string(), 5),
                ("2024-01-01".to_string(), 20),
                ("2024-01-01".to_string(), 10),
                ("2023-12-31".to_string(), 30),
            ]
        );
    }

    #[test]
    fn test_created_at_string_order_matches_time_order() {
        let earlier = record("2024-01-01", 10);
        let mut later = record("2024-01-01", 10);
        later.created_at = earlier.created_at + Duration::microseconds(123);

        let stamp = |r: &FitnessRecord| {
            serde_json::to_value(r).unwrap()["created_at"]
                .as_str()
                .unwrap()
                .to_string()
        };
        let (a, b) = (stamp(&earlier), stamp(&later));
        assert_eq!(a.len(), b.len());
        assert!(a < b, "{a} should sort before {b}");
        assert_eq!(a, "1970-01-01T00:00:10.000000000Z");

        let json = serde_json::to_string(&later).unwrap();
        let back: FitnessRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, later);
    }
}
