use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,

    // Background jobs
    pub sweep_interval_secs: u64,
    pub reminder_interval_secs: u64,
    pub missed_grace_minutes: i64,

    // Mail relay (HTTP API)
    pub mail_api_url: String,
    pub mail_api_token: String,
    pub mail_from: String,

    // Drug-information database
    pub fda_api_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());
        let session_ttl_hours = env_i64("SESSION_TTL_HOURS", 24 * 30);

        let sweep_interval_secs = env_i64("SWEEP_INTERVAL_SECS", 300) as u64;
        let reminder_interval_secs = env_i64("REMINDER_INTERVAL_SECS", 180) as u64;
        let missed_grace_minutes = env_i64("MISSED_GRACE_MINUTES", 15);

        let mail_api_url =
            env::var("MAIL_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8025".to_string());
        let mail_api_token = env::var("MAIL_API_TOKEN").unwrap_or_default();
        let mail_from =
            env::var("MAIL_FROM").unwrap_or_else(|_| "HealthSync <noreply@healthsync.local>".to_string());

        let fda_api_url =
            env::var("FDA_API_URL").unwrap_or_else(|_| "https://api.fda.gov".to_string());

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            sweep_interval_secs,
            reminder_interval_secs,
            missed_grace_minutes,
            mail_api_url,
            mail_api_token,
            mail_from,
            fda_api_url,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(default)
}
