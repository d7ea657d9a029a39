use crate::server::otp::{DEFAULT_OTP_MAX_ATTEMPTS, DEFAULT_OTP_TTL_SECS, OtpPolicy};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub otp_ttl_secs: i64,
    /// `0` turns the cap off.
    pub otp_max_attempts: u32,
    pub otp_reaper_interval_secs: u64,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("JOBPORTAL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let uploads_dir = lookup("JOBPORTAL_UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let otp_ttl_secs: i64 = parse_or(&lookup, "OTP_TTL_SECS", DEFAULT_OTP_TTL_SECS)?;
        if otp_ttl_secs <= 0 {
            anyhow::bail!("OTP_TTL_SECS must be positive, got {}", otp_ttl_secs);
        }

        let smtp = match (lookup("SMTP_HOST"), lookup("SMTP_USER"), lookup("SMTP_PASSWORD")) {
            (Some(host), Some(user), Some(password)) => Some(SmtpConfig {
                host,
                user,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8000)?,
            data_dir,
            uploads_dir,
            otp_ttl_secs,
            otp_max_attempts: parse_or(&lookup, "OTP_MAX_ATTEMPTS", DEFAULT_OTP_MAX_ATTEMPTS)?,
            otp_reaper_interval_secs: parse_or(&lookup, "OTP_REAPER_INTERVAL_SECS", 60)?,
            smtp,
        })
    }

    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            ttl: chrono::Duration::seconds(self.otp_ttl_secs),
            max_attempts: (self.otp_max_attempts > 0).then_some(self.otp_max_attempts),
        }
    }

    pub fn employees_path(&self) -> PathBuf {
        self.data_dir.join("employees.json")
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.data_dir.join("profiles.json")
    }
}

pub fn default_data_dir() -> PathBuf {
    let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home_dir.join("jobportal_service").join("data")
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
