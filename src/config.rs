//! Runtime settings resolved from the CLI (flags with env fallbacks).

use secrecy::SecretString;

/// Everything the server wiring needs beyond the DSN and port.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Secret signing access tokens.
    pub access_secret: SecretString,
    /// Distinct secret signing password-reset tokens.
    pub reset_secret: SecretString,
    /// Access-token lifetime; the deployment historically runs long-lived
    /// sessions.
    pub access_ttl_minutes: i64,
    /// Reset-token lifetime, deliberately short.
    pub reset_ttl_minutes: i64,
    /// Opaque email-verification tokens expire after this many hours.
    pub verification_expire_hours: i64,
    /// Public base URL embedded in verification and reset links.
    pub base_url: String,
    /// Recipient of the daily report.
    pub report_to: String,
    /// Local hour (0-23) the daily report fires.
    pub report_hour: u32,
}

impl AppConfig {
    pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 3000;
    pub const DEFAULT_RESET_TTL_MINUTES: i64 = 60;
    pub const VERIFICATION_EXPIRE_HOURS: i64 = 2;
    pub const DEFAULT_REPORT_HOUR: u32 = 10;
}
