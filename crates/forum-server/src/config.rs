use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub cors_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub allow_admin_registration: bool,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn check_secret(secret: &str) -> anyhow::Result<()> {
    if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret) {
        bail!("FORUM_JWT_SECRET is unset or still a placeholder; set it in your .env file");
    }
    Ok(())
}

fn parse_flag(name: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be true or false, got {:?}", name, other),
    }
}

/// Comma separated origins, blanks skipped.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("FORUM_JWT_SECRET").unwrap_or_default();
        check_secret(&jwt_secret)?;

        let port: u16 = var_or("FORUM_PORT", "8000")
            .parse()
            .context("FORUM_PORT must be a port number")?;
        let token_ttl_days: i64 = var_or("FORUM_TOKEN_TTL_DAYS", "30")
            .parse()
            .context("FORUM_TOKEN_TTL_DAYS must be a whole number of days")?;
        if token_ttl_days < 1 {
            bail!("FORUM_TOKEN_TTL_DAYS must be at least 1");
        }
        let allow_admin_registration = parse_flag(
            "FORUM_ALLOW_ADMIN_REGISTRATION",
            &var_or("FORUM_ALLOW_ADMIN_REGISTRATION", "false"),
        )?;

        Ok(Self {
            host: var_or("FORUM_HOST", "0.0.0.0"),
            port,
            db_path: var_or("FORUM_DB_PATH", "forum.db").into(),
            jwt_secret,
            token_ttl_days,
            cors_origins: parse_origins(&var_or("FORUM_CORS_ORIGINS", "http://localhost:5173")),
            upload_dir: var_or("FORUM_UPLOAD_DIR", "./uploads").into(),
            allow_admin_registration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_split_and_skip_blanks() {
        assert_eq!(
            parse_origins(" http://a.test, ,http://b.test ,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        assert!(check_secret("").is_err());
        assert!(check_secret("dev-secret-change-me").is_err());
        assert!(check_secret("change-me-to-a-random-string").is_err());
        assert!(check_secret("c0ffee-and-a-long-random-tail").is_ok());
    }

    #[test]
    fn admin_registration_flag_defaults_off() {
        assert!(!parse_flag("F", "").unwrap());
        assert!(!parse_flag("F", "false").unwrap());
        assert!(parse_flag("F", " TRUE ").unwrap());
        assert!(parse_flag("F", "1").unwrap());
        assert!(parse_flag("F", "maybe").is_err());
    }
}
