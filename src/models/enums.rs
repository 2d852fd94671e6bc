//! Closed value sets used across the request, pipeline, and persistence
//! layers. Inputs are validated into these at the HTTP boundary; only the
//! repositories convert back to strings.

use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate an enum with serde renames plus the
/// as_str / Display / FromStr trio used by the repositories.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(
    /// Severity bucket for an orthodontic case, as used by the rule table.
    CaseTier {
        Express => "express",
        Mild => "mild",
        Moderate => "moderate",
        Complex => "complex",
    }
);

str_enum!(
    /// Insurance requests collapse express and mild into a single tier
    /// since both map to the same limited-treatment code.
    InsuranceTier {
        ExpressMild => "express_mild",
        Moderate => "moderate",
        Complex => "complex",
    }
);

impl InsuranceTier {
    /// The tier used for rule lookup. `express_mild` is stored as
    /// `express` in the rule table.
    pub fn rule_tier(&self) -> CaseTier {
        match self {
            Self::ExpressMild => CaseTier::Express,
            Self::Moderate => CaseTier::Moderate,
            Self::Complex => CaseTier::Complex,
        }
    }
}

str_enum!(
    AgeGroup {
        Adolescent => "adolescent",
        Adult => "adult",
    }
);

impl AgeGroup {
    /// Age threshold for CDT logic: under 18 is adolescent, 18 and over
    /// is adult.
    pub fn from_age(age: i64) -> Self {
        if age < 18 {
            Self::Adolescent
        } else {
            Self::Adult
        }
    }
}

str_enum!(
    TreatmentType {
        ClearAligners => "clear aligners",
        TraditionalBraces => "traditional braces",
        LingualBraces => "lingual braces",
        Retainers => "retainers",
    }
);

str_enum!(
    /// Arches being treated. Also used as the treatment request's
    /// `area_treated` field, which carries the same values.
    Arches {
        Upper => "upper",
        Lower => "lower",
        Both => "both",
    }
);

str_enum!(
    CaseDifficulty {
        Simple => "simple",
        Moderate => "moderate",
        Complex => "complex",
    }
);

str_enum!(
    MonitoringApproach {
        Remote => "remote",
        Mixed => "mixed",
        InClinic => "in-clinic",
    }
);

str_enum!(
    Attachments {
        None => "none",
        Some => "some",
        Extensive => "extensive",
    }
);

str_enum!(
    Audience {
        Patient => "patient",
        Internal => "internal",
    }
);

str_enum!(
    Tone {
        Concise => "concise",
        Casual => "casual",
        Reassuring => "reassuring",
        Clinical => "clinical",
    }
);

str_enum!(
    DocumentKind {
        TreatmentSummary => "treatment_summary",
        InsuranceSummary => "insurance_summary",
        ProgressNotes => "progress_notes",
    }
);

str_enum!(
    GenerationStatus {
        Success => "success",
        Error => "error",
    }
);

str_enum!(
    CodeCategory {
        Orthodontic => "orthodontic",
        Diagnostic => "diagnostic",
        Retention => "retention",
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn case_tier_round_trip() {
        for (variant, s) in [
            (CaseTier::Express, "express"),
            (CaseTier::Mild, "mild"),
            (CaseTier::Moderate, "moderate"),
            (CaseTier::Complex, "complex"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(CaseTier::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn document_kind_round_trip() {
        for (variant, s) in [
            (DocumentKind::TreatmentSummary, "treatment_summary"),
            (DocumentKind::InsuranceSummary, "insurance_summary"),
            (DocumentKind::ProgressNotes, "progress_notes"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(DocumentKind::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_uses_wire_strings() {
        assert_eq!(
            serde_json::to_string(&TreatmentType::ClearAligners).unwrap(),
            "\"clear aligners\""
        );
        assert_eq!(
            serde_json::from_str::<MonitoringApproach>("\"in-clinic\"").unwrap(),
            MonitoringApproach::InClinic
        );
        assert_eq!(
            serde_json::from_str::<InsuranceTier>("\"express_mild\"").unwrap(),
            InsuranceTier::ExpressMild
        );
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(CaseTier::from_str("extreme").is_err());
        assert!(AgeGroup::from_str("").is_err());
        assert!(serde_json::from_str::<Tone>("\"sarcastic\"").is_err());
    }

    #[test]
    fn age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(0), AgeGroup::Adolescent);
        assert_eq!(AgeGroup::from_age(17), AgeGroup::Adolescent);
        assert_eq!(AgeGroup::from_age(18), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(120), AgeGroup::Adult);
    }

    #[test]
    fn insurance_tier_collapses_to_rule_tier() {
        assert_eq!(InsuranceTier::ExpressMild.rule_tier(), CaseTier::Express);
        assert_eq!(InsuranceTier::Moderate.rule_tier(), CaseTier::Moderate);
        assert_eq!(InsuranceTier::Complex.rule_tier(), CaseTier::Complex);
    }
}
