use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub server_port: u16,
    pub min_appointment_minutes: i64,
    pub max_appointment_minutes: i64,
    pub allow_past_bookings: bool,
    pub notification_webhook_url: Option<String>,
    pub notification_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            server_port: 3000,
            min_appointment_minutes: 5,
            max_appointment_minutes: 240,
            allow_past_bookings: false,
            notification_webhook_url: None,
            notification_channel_capacity: 256,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            min_appointment_minutes: parse_or("MIN_APPOINTMENT_MINUTES", defaults.min_appointment_minutes),
            max_appointment_minutes: parse_or("MAX_APPOINTMENT_MINUTES", defaults.max_appointment_minutes),
            allow_past_bookings: parse_or("ALLOW_PAST_BOOKINGS", defaults.allow_past_bookings),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            notification_channel_capacity: parse_or(
                "NOTIFICATION_CHANNEL_CAPACITY",
                defaults.notification_channel_capacity,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty() && self.is_supabase_configured()
    }

    /// Schedules are read from Supabase only when both the URL and the key are present.
    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
