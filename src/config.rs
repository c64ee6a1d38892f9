use std::env;

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub verify_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:3000");
        let client_id = env::var("STRAVA_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("STRAVA_CLIENT_ID is required"))?;
        let client_secret = env::var("STRAVA_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("STRAVA_CLIENT_SECRET is required"))?;
        let callback_url =
            env::var("CALLBACK_URL").map_err(|_| anyhow::anyhow!("CALLBACK_URL is required"))?;
        let api_base_url = env_or("STRAVA_API_BASE", "https://www.strava.com/api/v3");
        // A zero timeout would fail every outbound call or expire the
        // handshake immediately.
        let request_timeout_secs =
            require_nonzero("REQUEST_TIMEOUT_SECS", env_or_parse("REQUEST_TIMEOUT_SECS", 10)?)?;
        let verify_timeout_secs =
            require_nonzero("VERIFY_TIMEOUT_SECS", env_or_parse("VERIFY_TIMEOUT_SECS", 30)?)?;

        Ok(Self {
            bind_addr,
            client_id,
            client_secret,
            callback_url,
            api_base_url,
            request_timeout_secs,
            verify_timeout_secs,
        })
    }
}

fn require_nonzero(key: &str, value: u64) -> anyhow::Result<u64> {
    if value == 0 {
        return Err(anyhow::anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => Ok(value.parse()?),
        Err(_) => Ok(default),
    }
}
