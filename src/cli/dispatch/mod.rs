use crate::cli::actions::Action;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let access_secret: SecretString = matches
        .get_one::<String>("access-secret")
        .map(|s| s.clone().into())
        .context("missing required argument: --access-secret")?;

    let reset_secret: SecretString = matches
        .get_one::<String>("reset-secret")
        .map(|s| s.clone().into())
        .context("missing required argument: --reset-secret")?;

    let config = AppConfig {
        access_secret,
        reset_secret,
        access_ttl_minutes: matches
            .get_one::<i64>("access-ttl-minutes")
            .copied()
            .unwrap_or(AppConfig::DEFAULT_ACCESS_TTL_MINUTES),
        reset_ttl_minutes: matches
            .get_one::<i64>("reset-ttl-minutes")
            .copied()
            .unwrap_or(AppConfig::DEFAULT_RESET_TTL_MINUTES),
        verification_expire_hours: AppConfig::VERIFICATION_EXPIRE_HOURS,
        base_url: matches
            .get_one::<String>("base-url")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "http://localhost:8080".to_string()),
        report_to: matches
            .get_one::<String>("report-to")
            .map(|s| s.to_string())
            .unwrap_or_default(),
        report_hour: matches
            .get_one::<u32>("report-hour")
            .copied()
            .unwrap_or(AppConfig::DEFAULT_REPORT_HOUR),
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one("dsn").map(|s: &String| s.to_string()),
        config: Box::new(config),
    })
}
