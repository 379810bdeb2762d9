use std::env;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_APPOINTMENT_DURATION_MINUTES: u32 = 30;
const DEFAULT_SLOT_GRANULARITY_MINUTES: u32 = 30;
const DEFAULT_MAX_ADVANCE_BOOKING_DAYS: u32 = 90;
const DEFAULT_MAX_WRITE_RETRIES: u32 = 3;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 300;
const DEFAULT_SERVER_PORT: u16 = 3000;

/// Where appointments and availability rules are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(StorageBackend::Memory),
            "supabase" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Fixed slot geometry shared by slot generation and booking validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    pub duration_minutes: u32,
    pub granularity_minutes: u32,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            duration_minutes: DEFAULT_APPOINTMENT_DURATION_MINUTES,
            granularity_minutes: DEFAULT_SLOT_GRANULARITY_MINUTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub storage_backend: StorageBackend,
    pub appointment_duration_minutes: u32,
    pub slot_granularity_minutes: u32,
    pub max_advance_booking_days: u32,
    pub max_write_retries: u32,
    pub lifecycle_sweep_enabled: bool,
    pub lifecycle_sweep_interval_seconds: u64,
    pub pending_expiry_enabled: bool,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: String::new(),
            storage_backend: StorageBackend::Memory,
            appointment_duration_minutes: DEFAULT_APPOINTMENT_DURATION_MINUTES,
            slot_granularity_minutes: DEFAULT_SLOT_GRANULARITY_MINUTES,
            max_advance_booking_days: DEFAULT_MAX_ADVANCE_BOOKING_DAYS,
            max_write_retries: DEFAULT_MAX_WRITE_RETRIES,
            lifecycle_sweep_enabled: false,
            lifecycle_sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            pending_expiry_enabled: true,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
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
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            storage_backend: parse_var("STORAGE_BACKEND", StorageBackend::Memory),
            appointment_duration_minutes: positive_or_default(
                "APPOINTMENT_DURATION_MINUTES",
                parse_var("APPOINTMENT_DURATION_MINUTES", DEFAULT_APPOINTMENT_DURATION_MINUTES),
                DEFAULT_APPOINTMENT_DURATION_MINUTES,
            ),
            slot_granularity_minutes: positive_or_default(
                "SLOT_GRANULARITY_MINUTES",
                parse_var("SLOT_GRANULARITY_MINUTES", DEFAULT_SLOT_GRANULARITY_MINUTES),
                DEFAULT_SLOT_GRANULARITY_MINUTES,
            ),
            max_advance_booking_days: parse_var("MAX_ADVANCE_BOOKING_DAYS", DEFAULT_MAX_ADVANCE_BOOKING_DAYS),
            max_write_retries: positive_or_default(
                "MAX_WRITE_RETRIES",
                parse_var("MAX_WRITE_RETRIES", DEFAULT_MAX_WRITE_RETRIES),
                DEFAULT_MAX_WRITE_RETRIES,
            ),
            lifecycle_sweep_enabled: parse_var("LIFECYCLE_SWEEP_ENABLED", false),
            lifecycle_sweep_interval_seconds: parse_var(
                "LIFECYCLE_SWEEP_INTERVAL_SECONDS",
                DEFAULT_SWEEP_INTERVAL_SECONDS,
            ),
            pending_expiry_enabled: parse_var("PENDING_EXPIRY_ENABLED", true),
            server_port: parse_var("SERVER_PORT", DEFAULT_SERVER_PORT),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn scheduling_policy(&self) -> SlotPolicy {
        SlotPolicy {
            duration_minutes: self.appointment_duration_minutes,
            granularity_minutes: self.slot_granularity_minutes,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn positive_or_default(name: &str, value: u32, default: u32) -> u32 {
    if value == 0 {
        warn!("{} must be positive, using default {}", name, default);
        default
    } else {
        value
    }
}
