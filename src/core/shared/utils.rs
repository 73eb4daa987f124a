use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use uuid::Uuid;

use crate::core::shared::error::{CrmError, CrmResult};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(database_url: &str, max_size: u32) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .context("Failed to build database connection pool")
}

/// Run embedded database migrations
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get().context("Failed to get connection for migrations")?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migration error: {e}"))?;
    Ok(())
}

/// Parses a path or body identifier, naming the field on failure.
pub fn parse_id(raw: &str, field: &str) -> CrmResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| CrmError::validation(format!("Invalid {field} format")))
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_datetime(raw: &str, field: &str) -> CrmResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CrmError::validation(format!("Invalid {field}: expected a date")))
}

/// Empty strings clear an optional date, like an explicit null.
pub fn parse_optional_datetime(
    raw: Option<&str>,
    field: &str,
) -> CrmResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_datetime(value, field).map(Some),
    }
}

/// Required free-text field: present and not blank after trimming.
pub fn require_text(value: Option<String>, field: &str) -> CrmResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CrmError::validation(format!("{field} is required")))
}

/// Optional free-text field: blank collapses to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Parses one of an enum's wire names. Blank input yields `None`.
pub fn parse_choice<E: FromStr>(raw: Option<String>, field: &str) -> CrmResult<Option<E>> {
    match optional_text(raw) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| CrmError::validation(format!("Invalid {field}: {value}"))),
    }
}

/// For PATCH-style bodies: an absent field stays `None`, an explicit
/// `null` becomes `Some(None)`. Use with `#[serde(default)]`.
pub fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_id_names_the_field() {
        let err = parse_id("not-a-uuid", "contact id").unwrap_err();
        assert!(matches!(err, CrmError::Validation(ref m) if m.contains("contact id")));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "contact id").unwrap(), id);
    }

    #[test]
    fn test_parse_datetime_accepts_date_and_rfc3339() {
        let d = parse_datetime("2026-03-01", "closeDate").unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2026, 3, 1, 0));

        let t = parse_datetime("2026-03-01T10:30:00+05:30", "appointmentTime").unwrap();
        assert_eq!((t.hour(), t.minute()), (5, 0));

        assert!(parse_datetime("tomorrow", "dueDate").is_err());
        assert_eq!(parse_optional_datetime(Some(""), "dueDate").unwrap(), None);
    }

    #[test]
    fn test_text_helpers() {
        assert!(require_text(Some("   ".into()), "name").is_err());
        assert!(require_text(None, "name").is_err());
        assert_eq!(require_text(Some(" Jane ".into()), "name").unwrap(), "Jane");
        assert_eq!(optional_text(Some(" ".into())), None);
        assert_eq!(normalize_email(" Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn test_parse_choice() {
        use crate::core::shared::enums::{LeadSource, UnitType};

        let source: Option<LeadSource> = parse_choice(Some("walk-in".into()), "leadSource").unwrap();
        assert_eq!(source, Some(LeadSource::WalkIn));
        let unit: Option<UnitType> = parse_choice(Some("".into()), "unitType").unwrap();
        assert_eq!(unit, None);
        let bad = parse_choice::<UnitType>(Some("Castle".into()), "unitType").unwrap_err();
        assert!(matches!(bad, CrmError::Validation(ref m) if m.contains("unitType")));
    }

    #[test]
    fn test_deserialize_some_distinguishes_null_from_absent() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "deserialize_some")]
            notes: Option<Option<String>>,
        }

        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.notes, None);
        let cleared: Patch = serde_json::from_str(r#"{"notes":null}"#).unwrap();
        assert_eq!(cleared.notes, Some(None));
        let set: Patch = serde_json::from_str(r#"{"notes":"hi"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("hi".into())));
    }
}
