use std::env;

/// Top-level server configuration, loaded from the environment.
/// A `.env` file is read at startup via `dotenv`.
#[derive(Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub dispatch: DispatchSettings,
    pub email: EmailSettings,
    pub push: Option<PushSettings>,
}

/// Tuning knobs for the periodic notification dispatch pass.
#[derive(Clone, Debug)]
pub struct DispatchSettings {
    /// Seconds between automatic dispatch passes.
    pub interval_seconds: u64,
    /// After this many failed attempts a notification settles on Failed.
    pub max_retries: i32,
    /// Pause between processed notifications within one pass.
    pub item_delay_ms: u64,
    /// A claim older than this is considered abandoned and reclaimable.
    pub lease_seconds: i64,
}

#[derive(Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    /// Recipients per parallel send group.
    pub batch_size: usize,
    pub fallback: Option<FallbackApiSettings>,
}

/// Third-party HTTP email API used when the SMTP path errors out.
/// Credential provisioning is strictly a deployment concern.
#[derive(Clone)]
pub struct FallbackApiSettings {
    pub url: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

#[derive(Clone)]
pub struct PushSettings {
    pub gateway_url: String,
    pub icon_url: Option<String>,
    pub click_url: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let smtp_host = env::var("SMTP_HOST").map_err(|_| "SMTP_HOST must be set".to_string())?;
        let from_address =
            env::var("SMTP_FROM").map_err(|_| "SMTP_FROM must be set".to_string())?;

        let fallback = match env::var("EMAIL_API_SERVICE_ID") {
            Ok(service_id) => Some(FallbackApiSettings {
                url: env_or("EMAIL_API_URL", "https://api.emailjs.com/api/v1.0/email/send"),
                service_id,
                template_id: env::var("EMAIL_API_TEMPLATE_ID")
                    .map_err(|_| "EMAIL_API_TEMPLATE_ID must be set".to_string())?,
                public_key: env::var("EMAIL_API_PUBLIC_KEY")
                    .map_err(|_| "EMAIL_API_PUBLIC_KEY must be set".to_string())?,
            }),
            Err(_) => None,
        };

        let push = env::var("PUSH_GATEWAY_URL").ok().map(|gateway_url| PushSettings {
            gateway_url,
            icon_url: env::var("PUSH_ICON_URL").ok(),
            click_url: env::var("PUSH_CLICK_URL").ok(),
        });

        Ok(ServerConfig {
            listen_addr: env_or("LISTEN_ADDR", "0.0.0.0:8080"),
            database_url,
            dispatch: DispatchSettings {
                interval_seconds: env_parse("DISPATCH_INTERVAL_SECONDS", 300)?,
                max_retries: env_parse("DISPATCH_MAX_RETRIES", 3)?,
                item_delay_ms: env_parse("DISPATCH_ITEM_DELAY_MS", 500)?,
                lease_seconds: env_parse("DISPATCH_LEASE_SECONDS", 600)?,
            },
            email: EmailSettings {
                smtp_host,
                smtp_port: env_parse("SMTP_PORT", 587)?,
                smtp_user: env::var("SMTP_USER").ok(),
                smtp_password: env::var("SMTP_PASSWORD").ok(),
                from_address,
                batch_size: env_parse("EMAIL_BATCH_SIZE", 50)?,
                fallback,
            },
            push,
        })
    }
}
