//! Database enum types for the CRM schema.
//!
//! Every pipeline/classification field is a Rust enum stored as a SMALLINT
//! code in PostgreSQL and exchanged on the wire by its display name
//! (`"Visit Scheduled"`, `"No Show"`, `"1BHK"`). Defaults are resolved when a
//! record is built, so no consumer ever sees an absent stage or source.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::SmallInt;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

macro_rules! crm_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident {
            $($variant:ident = $code:literal => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
        #[diesel(sql_type = SmallInt)]
        #[repr(i16)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant = $code,
            )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl ToSql<SmallInt, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                let v = *self as i16;
                out.write_all(&v.to_be_bytes())?;
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<SmallInt, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = i16::from_sql(bytes)?;
                match value {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(format!("Unknown {}: {}", stringify!($name), value).into()),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($wire) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

// ============================================================================
// ACCESS
// ============================================================================

crm_enum! {
    /// Account role. Admins bypass record ownership.
    Role, default = User {
        User = 0 => "user",
        Admin = 1 => "admin",
    }
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

// ============================================================================
// CONTACTS
// ============================================================================

crm_enum! {
    LeadStage, default = New {
        New = 0 => "New",
        Contacted = 1 => "Contacted",
        VisitScheduled = 2 => "Visit Scheduled",
        Negotiation = 3 => "Negotiation",
        Won = 4 => "Won",
        Lost = 5 => "Lost",
    }
}

crm_enum! {
    /// Property type the lead is interested in.
    UnitType, default = Other {
        OneBhk = 0 => "1BHK",
        TwoBhk = 1 => "2BHK",
        ThreeBhk = 2 => "3BHK",
        Villa = 3 => "Villa",
        Plot = 4 => "Plot",
        Commercial = 5 => "Commercial",
        Other = 6 => "Other",
    }
}

crm_enum! {
    /// Channel a contact came in through.
    LeadSource, default = Other {
        Website = 0 => "Website",
        Referral = 1 => "Referral",
        Advertisement = 2 => "Advertisement",
        SocialMedia = 3 => "Social Media",
        WalkIn = 4 => "Walk-in",
        PhoneInquiry = 5 => "Phone Inquiry",
        Other = 6 => "Other",
    }
}

// ============================================================================
// DEALS
// ============================================================================

crm_enum! {
    /// Pipeline position of a deal.
    DealStage, default = Lead {
        Lead = 0 => "Lead",
        Prospecting = 1 => "Prospecting",
        Proposal = 2 => "Proposal",
        Negotiation = 3 => "Negotiation",
        Won = 4 => "Won",
        Lost = 5 => "Lost",
    }
}

/// Exactly one outcome holds for every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DealOutcome {
    Won,
    Lost,
    Open,
}

impl DealStage {
    pub fn outcome(&self) -> DealOutcome {
        match self {
            Self::Won => DealOutcome::Won,
            Self::Lost => DealOutcome::Lost,
            Self::Lead | Self::Prospecting | Self::Proposal | Self::Negotiation => {
                DealOutcome::Open
            }
        }
    }
}

// ============================================================================
// APPOINTMENTS
// ============================================================================

crm_enum! {
    AppointmentStatus, default = Scheduled {
        Scheduled = 0 => "Scheduled",
        Completed = 1 => "Completed",
        Cancelled = 2 => "Cancelled",
        NoShow = 3 => "No Show",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults_match_declared_null_objects() {
        assert_eq!(LeadSource::default(), LeadSource::Other);
        assert_eq!(UnitType::default(), UnitType::Other);
        assert_eq!(LeadStage::default(), LeadStage::New);
        assert_eq!(DealStage::default(), DealStage::Lead);
        assert_eq!(AppointmentStatus::default(), AppointmentStatus::Scheduled);
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_wire_names_use_display_labels() {
        assert_eq!(
            serde_json::to_value(LeadStage::VisitScheduled).unwrap(),
            serde_json::json!("Visit Scheduled")
        );
        assert_eq!(
            serde_json::to_value(AppointmentStatus::NoShow).unwrap(),
            serde_json::json!("No Show")
        );
        let source: LeadSource = serde_json::from_value(serde_json::json!("Walk-in")).unwrap();
        assert_eq!(source, LeadSource::WalkIn);
        let unit: UnitType = serde_json::from_value(serde_json::json!("3BHK")).unwrap();
        assert_eq!(unit, UnitType::ThreeBhk);
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!(Role::from_str("ADMIN").unwrap(), Role::Admin);
        assert_eq!(LeadSource::from_str(" social media ").unwrap(), LeadSource::SocialMedia);
        assert!(DealStage::from_str("closed").is_err());
    }

    #[test]
    fn test_stage_outcome_is_exhaustive_and_exclusive() {
        for stage in DealStage::ALL {
            let outcome = stage.outcome();
            let expected = match stage {
                DealStage::Won => DealOutcome::Won,
                DealStage::Lost => DealOutcome::Lost,
                _ => DealOutcome::Open,
            };
            assert_eq!(outcome, expected, "stage {stage}");
        }
    }
}
