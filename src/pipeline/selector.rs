//! Deterministic CDT code selection. A pure function over the rule and
//! code tables: the same case attributes against the same snapshot always
//! yield the same selection.

use rusqlite::Connection;
use thiserror::Error;

use crate::db::repository::cdt::{find_active_rule, get_code};
use crate::db::DatabaseError;
use crate::models::{
    AgeGroup, CaseTier, CodeCategory, DiagnosticAssets, InsuranceTier,
};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("age_group could not be determined: provide patient_age or age_group")]
    InsufficientInput,

    #[error("No CDT rule found for tier={tier}, age_group={age_group}")]
    RuleNotFound { tier: String, age_group: String },

    #[error("CDT code {0} is missing or inactive")]
    CodeInactive(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One suggested add-on code.
#[derive(Debug, Clone, PartialEq)]
pub struct AddOn {
    pub code: String,
    pub description: String,
    pub category: CodeCategory,
}

/// Outcome of a selection: the primary code plus any asset-driven
/// add-ons and a human-readable note on the basis of selection.
#[derive(Debug, Clone)]
pub struct CodeSelection {
    pub primary_code: String,
    pub primary_description: String,
    pub primary_category: CodeCategory,
    pub add_ons: Vec<AddOn>,
    pub notes: String,
}

/// Asset-to-code mapping for the treatment flow, in emission order.
const TREATMENT_ASSET_CODES: [(&str, fn(&DiagnosticAssets) -> bool); 4] = [
    ("D0350", |a| a.intraoral_photos),
    ("D0330", |a| a.panoramic_xray),
    ("D0210", |a| a.fmx),
    ("D0470", |a| a.diagnostic_casts),
];

/// Asset-to-code mapping for the insurance flow. Diagnostic casts are out
/// of scope for insurance documentation.
const INSURANCE_ASSET_CODES: [(&str, fn(&DiagnosticAssets) -> bool); 3] = [
    ("D0350", |a| a.intraoral_photos),
    ("D0330", |a| a.panoramic_xray),
    ("D0210", |a| a.fmx),
];

/// Select codes for the treatment summary flow.
///
/// `age_group` wins over `patient_age` when both are given; with neither,
/// selection fails rather than guessing.
pub fn select_treatment_codes(
    conn: &Connection,
    tier: CaseTier,
    patient_age: Option<i64>,
    age_group: Option<AgeGroup>,
    diagnostic_assets: Option<&DiagnosticAssets>,
) -> Result<CodeSelection, SelectionError> {
    let group = age_group
        .or(patient_age.map(AgeGroup::from_age))
        .ok_or(SelectionError::InsufficientInput)?;

    let (primary, description, category) = resolve_primary(conn, tier, group)?;

    let mut add_ons = Vec::new();
    if let Some(assets) = diagnostic_assets {
        for (code, flagged) in TREATMENT_ASSET_CODES {
            if flagged(assets) {
                if let Some(add_on) = lookup_add_on(conn, code)? {
                    add_ons.push(add_on);
                }
            }
        }
    }

    Ok(CodeSelection {
        primary_code: primary,
        primary_description: description,
        primary_category: category,
        add_ons,
        notes: format!("Selected based on tier={tier}, age_group={group}"),
    })
}

/// Select codes for the insurance summary flow.
///
/// Only explicitly flagged assets generate codes; retainers are bundled
/// into the primary treatment and never emit D8680.
pub fn select_insurance_codes(
    conn: &Connection,
    tier: InsuranceTier,
    age_group: AgeGroup,
    diagnostic_assets: &DiagnosticAssets,
    retainers_included: bool,
) -> Result<CodeSelection, SelectionError> {
    let (primary, description, category) = resolve_primary(conn, tier.rule_tier(), age_group)?;

    let mut add_ons = Vec::new();
    for (code, flagged) in INSURANCE_ASSET_CODES {
        if flagged(diagnostic_assets) {
            if let Some(add_on) = lookup_add_on(conn, code)? {
                add_ons.push(add_on);
            }
        }
    }

    let mut notes = format!("Selected based on tier={tier}, age_group={age_group}");
    if retainers_included {
        notes.push_str("; retainers bundled in treatment (not billed separately)");
    }

    Ok(CodeSelection {
        primary_code: primary,
        primary_description: description,
        primary_category: category,
        add_ons,
        notes,
    })
}

fn resolve_primary(
    conn: &Connection,
    tier: CaseTier,
    age_group: AgeGroup,
) -> Result<(String, String, CodeCategory), SelectionError> {
    let rule = find_active_rule(conn, tier, age_group)?.ok_or_else(|| {
        SelectionError::RuleNotFound {
            tier: tier.to_string(),
            age_group: age_group.to_string(),
        }
    })?;

    let code = get_code(conn, &rule.code)?
        .filter(|c| c.is_active)
        .ok_or_else(|| SelectionError::CodeInactive(rule.code.clone()))?;

    Ok((code.code, code.description, code.category))
}

fn lookup_add_on(conn: &Connection, code: &str) -> Result<Option<AddOn>, SelectionError> {
    match get_code(conn, code)? {
        Some(c) if c.is_active => Ok(Some(AddOn {
            code: c.code,
            description: c.description,
            category: c.category,
        })),
        _ => {
            tracing::warn!(code, "Flagged diagnostic asset has no active CDT code");
            Ok(None)
        }
    }
}
