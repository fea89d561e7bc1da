use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::tracking::kind::ActivityKind;

/// The document written for every session. `duration_seconds` fields are informational, the
/// timestamps are the source of truth when a session is read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntity {
    pub session_id: String,
    #[serde(with = "local_time_opt_ser", default)]
    pub start_time: Option<DateTime<Local>>,
    #[serde(with = "local_time_opt_ser", default)]
    pub end_time: Option<DateTime<Local>>,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub events: Vec<IntervalEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalEntity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(with = "local_time_ser")]
    pub start: DateTime<Local>,
    #[serde(with = "local_time_ser")]
    pub end: DateTime<Local>,
    #[serde(default)]
    pub duration_seconds: f64,
}

/// ISO-8601 timestamps. Written with an offset, read either with an offset or as a naive
/// local time, which is what documents from older releases contain.
mod local_time_ser {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, false))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(D::Error::custom)
    }

    pub fn parse(s: &str) -> Result<DateTime<Local>, String> {
        if let Ok(v) = DateTime::parse_from_rfc3339(s) {
            return Ok(v.with_timezone(&Local));
        }
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| format!("Invalid timestamp {s}: {e}"))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| format!("Timestamp {s} doesn't exist in the local time zone"))
    }
}

mod local_time_opt_ser {
    use chrono::{DateTime, Local};
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &Option<DateTime<Local>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(time) => super::local_time_ser::serialize(time, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Local>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| super::local_time_ser::parse(&s).map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Local, TimeZone};

    use crate::tracking::kind::ActivityKind;

    use super::SessionEntity;

    #[test]
    fn test_reads_naive_timestamps() -> Result<()> {
        let document = r#"{
            "session_id": "BrainDock Monday 02.30 PM",
            "start_time": "2025-03-17T14:30:00.250000",
            "end_time": "2025-03-17T14:40:00",
            "duration_seconds": 599.75,
            "events": [
                {"type": "present", "start": "2025-03-17T14:30:00.250000", "end": "2025-03-17T14:35:00", "duration_seconds": 299.75},
                {"type": "phone_suspected", "start": "2025-03-17T14:35:00", "end": "2025-03-17T14:40:00", "duration_seconds": 300.0}
            ]
        }"#;
        let entity: SessionEntity = serde_json::from_str(document)?;
        assert_eq!(
            entity.end_time,
            Some(Local.with_ymd_and_hms(2025, 3, 17, 14, 40, 0).unwrap())
        );
        assert_eq!(entity.events[1].kind, ActivityKind::GadgetSuspected);
        Ok(())
    }

    #[test]
    fn test_unstarted_session_document() -> Result<()> {
        let entity: SessionEntity = serde_json::from_str(
            r#"{"session_id": "empty", "start_time": null, "end_time": null}"#,
        )?;
        assert!(entity.start_time.is_none());
        assert!(entity.events.is_empty());

        let written = serde_json::to_value(&entity)?;
        assert!(written["start_time"].is_null());
        assert_eq!(written["events"], serde_json::json!([]));
        Ok(())
    }

    #[test]
    fn test_written_field_names() -> Result<()> {
        let start = Local.with_ymd_and_hms(2025, 3, 17, 14, 30, 0).unwrap();
        let entity = SessionEntity {
            session_id: "id".into(),
            start_time: Some(start),
            end_time: Some(start + chrono::Duration::seconds(10)),
            duration_seconds: 10.,
            events: vec![super::IntervalEntity {
                kind: ActivityKind::Away,
                start,
                end: start + chrono::Duration::seconds(10),
                duration_seconds: 10.,
            }],
        };
        let written = serde_json::to_value(&entity)?;
        assert_eq!(written["events"][0]["type"], "away");
        assert_eq!(written["events"][0]["duration_seconds"], 10.);
        assert!(written["start_time"]
            .as_str()
            .is_some_and(|v| v.starts_with("2025-03-17T14:30:00")));
        Ok(())
    }
}
