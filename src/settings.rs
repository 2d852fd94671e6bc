//! Process-wide settings resolved once at startup from environment
//! variables. The record is immutable after construction; components hold
//! it behind `Arc<Settings>` and never reload it.

pub const APP_NAME: &str = "Orthodoc Document Generation Gateway";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Flat settings record. All fields have defaults so a bare development
/// environment starts without any configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub database_url: String,
    pub bind_addr: String,
    pub secret_key: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_public_key: String,
    pub enable_auth_bypass: bool,
    pub cors_origins: Vec<String>,
    pub store_full_audit_data: bool,
    pub redact_phi_fields: bool,
    pub phi_fields_to_redact: Vec<String>,
    pub treatment_summary_seed: i64,
    pub insurance_summary_seed: i64,
    pub progress_notes_seed: i64,
    pub llm_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: "gpt-4o".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            database_url: "orthodoc_audit.db".into(),
            bind_addr: "127.0.0.1:8000".into(),
            secret_key: "CHANGE_ME_IN_PRODUCTION".into(),
            jwt_issuer: String::new(),
            jwt_audience: String::new(),
            jwt_public_key: String::new(),
            enable_auth_bypass: true,
            cors_origins: vec!["*".into()],
            store_full_audit_data: true,
            redact_phi_fields: false,
            phi_fields_to_redact: vec!["patient_name".into(), "practice_name".into()],
            treatment_summary_seed: 42,
            insurance_summary_seed: 42,
            progress_notes_seed: 42,
            llm_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary lookup function. Used by
    /// `from_env` and by tests that must not mutate the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            openai_api_key: string_var(&lookup, "OPENAI_API_KEY", defaults.openai_api_key),
            openai_model: string_var(&lookup, "OPENAI_MODEL", defaults.openai_model),
            openai_base_url: string_var(&lookup, "OPENAI_BASE_URL", defaults.openai_base_url),
            database_url: string_var(&lookup, "DATABASE_URL", defaults.database_url),
            bind_addr: string_var(&lookup, "BIND_ADDR", defaults.bind_addr),
            secret_key: string_var(&lookup, "SECRET_KEY", defaults.secret_key),
            jwt_issuer: string_var(&lookup, "JWT_ISSUER", defaults.jwt_issuer),
            jwt_audience: string_var(&lookup, "JWT_AUDIENCE", defaults.jwt_audience),
            jwt_public_key: string_var(&lookup, "JWT_PUBLIC_KEY", defaults.jwt_public_key),
            enable_auth_bypass: bool_var(&lookup, "ENABLE_AUTH_BYPASS", defaults.enable_auth_bypass),
            cors_origins: list_var(&lookup, "CORS_ORIGINS", defaults.cors_origins),
            store_full_audit_data: bool_var(
                &lookup,
                "STORE_FULL_AUDIT_DATA",
                defaults.store_full_audit_data,
            ),
            redact_phi_fields: bool_var(&lookup, "REDACT_PHI_FIELDS", defaults.redact_phi_fields),
            phi_fields_to_redact: list_var(
                &lookup,
                "PHI_FIELDS_TO_REDACT",
                defaults.phi_fields_to_redact,
            ),
            treatment_summary_seed: int_var(
                &lookup,
                "TREATMENT_SUMMARY_SEED",
                defaults.treatment_summary_seed,
            ),
            insurance_summary_seed: int_var(
                &lookup,
                "INSURANCE_SUMMARY_SEED",
                defaults.insurance_summary_seed,
            ),
            progress_notes_seed: int_var(
                &lookup,
                "PROGRESS_NOTES_SEED",
                defaults.progress_notes_seed,
            ),
            llm_timeout_secs: int_var(&lookup, "LLM_TIMEOUT_SECS", defaults.llm_timeout_secs as i64)
                .max(1) as u64,
        }
    }

    /// Filesystem path of the SQLite database. Accepts a bare path or a
    /// `sqlite://` / `sqlite:` prefixed URL.
    pub fn database_path(&self) -> &str {
        self.database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))
            .unwrap_or(&self.database_url)
    }

    /// Whether CORS should allow any origin.
    pub fn cors_allow_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn string_var<F>(lookup: &F, key: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v,
        _ => default,
    }
}

fn bool_var<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        None => default,
    }
}

fn int_var<F>(lookup: &F, key: &str, default: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

fn list_var<F>(lookup: &F, key: &str, default: Vec<String>) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default,
    }
}
