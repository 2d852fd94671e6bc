//! Canonical CDT code and rule data. Seeding is idempotent: rows that
//! already exist are left untouched so administrative edits survive
//! restarts.

use rusqlite::Connection;

use crate::db::repository::cdt::{find_active_rule, get_code, insert_code, insert_rule};
use crate::db::DatabaseError;
use crate::models::{AgeGroup, CaseTier, CodeCategory};

struct CodeSeed {
    code: &'static str,
    description: &'static str,
    category: CodeCategory,
    is_primary: bool,
    notes: &'static str,
}

const CODE_SEEDS: &[CodeSeed] = &[
    CodeSeed {
        code: "D8010",
        description: "Limited orthodontic treatment",
        category: CodeCategory::Orthodontic,
        is_primary: true,
        notes: "Use for minor alignment / short duration (Express/Mild tier)",
    },
    CodeSeed {
        code: "D8080",
        description: "Comprehensive orthodontic treatment - adolescent dentition",
        category: CodeCategory::Orthodontic,
        is_primary: true,
        notes: "Default comprehensive tier for adolescents (Moderate/Complex)",
    },
    CodeSeed {
        code: "D8090",
        description: "Comprehensive orthodontic treatment - adult dentition",
        category: CodeCategory::Orthodontic,
        is_primary: true,
        notes: "Default comprehensive tier for adults (Moderate/Complex)",
    },
    CodeSeed {
        code: "D0330",
        description: "Panoramic radiograph",
        category: CodeCategory::Diagnostic,
        is_primary: false,
        notes: "Common add-on for insurance documentation",
    },
    CodeSeed {
        code: "D0210",
        description: "Intraoral complete series of radiographic images (FMX)",
        category: CodeCategory::Diagnostic,
        is_primary: false,
        notes: "Full mouth x-ray series",
    },
    CodeSeed {
        code: "D0350",
        description: "Oral/facial photographic images",
        category: CodeCategory::Diagnostic,
        is_primary: false,
        notes: "Clinical photography",
    },
    CodeSeed {
        code: "D0470",
        description: "Diagnostic casts",
        category: CodeCategory::Diagnostic,
        is_primary: false,
        notes: "If applicable",
    },
    CodeSeed {
        code: "D8680",
        description: "Orthodontic retention (completion of active treatment)",
        category: CodeCategory::Retention,
        is_primary: false,
        notes: "If billed separately",
    },
];

const RULE_SEEDS: &[(CaseTier, AgeGroup, &str, i64)] = &[
    (CaseTier::Express, AgeGroup::Adolescent, "D8010", 100),
    (CaseTier::Express, AgeGroup::Adult, "D8010", 100),
    (CaseTier::Mild, AgeGroup::Adolescent, "D8010", 100),
    (CaseTier::Mild, AgeGroup::Adult, "D8010", 100),
    (CaseTier::Moderate, AgeGroup::Adolescent, "D8080", 90),
    (CaseTier::Moderate, AgeGroup::Adult, "D8090", 90),
    (CaseTier::Complex, AgeGroup::Adolescent, "D8080", 80),
    (CaseTier::Complex, AgeGroup::Adult, "D8090", 80),
];

/// Populate CDT codes and selection rules from the client documentation.
pub fn seed_cdt_data(conn: &Connection) -> Result<(), DatabaseError> {
    tracing::info!("Starting CDT data seeding check");

    for seed in CODE_SEEDS {
        if get_code(conn, seed.code)?.is_none() {
            insert_code(
                conn,
                seed.code,
                seed.description,
                seed.category,
                seed.is_primary,
                Some(seed.notes),
            )?;
            tracing::info!(code = seed.code, "Added CDT code");
        }
    }

    for (tier, age_group, code, priority) in RULE_SEEDS.iter().copied() {
        if find_active_rule(conn, tier, age_group)?.is_none() {
            insert_rule(conn, tier, age_group, code, priority)?;
            tracing::info!(%tier, %age_group, code, "Added CDT rule");
        }
    }

    tracing::info!("CDT data seeding check complete");
    Ok(())
}
