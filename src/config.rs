use serde::{Deserialize, Serialize};
use std::env;

use crate::entities::PlanType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub payme: PaymeConfig,
    pub click: ClickConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymeConfig {
    pub merchant_id: String,
    /// Cashbox key; Payme authenticates as `Paycom:<key>` over Basic auth.
    pub secret_key: String,
    #[serde(default = "default_payme_checkout_url")]
    pub checkout_url: String,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClickConfig {
    pub service_id: String,
    pub merchant_id: String,
    pub secret_key: String,
    #[serde(default = "default_click_checkout_url")]
    pub checkout_url: String,
    #[serde(default)]
    pub return_url: Option<String>,
}

fn default_payme_checkout_url() -> String {
    "https://checkout.paycom.uz".to_string()
}

fn default_click_checkout_url() -> String {
    "https://my.click.uz/services/pay".to_string()
}

/// Canonical price (soum) and validity of one plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanPrice {
    pub price: i64,
    pub days: i64,
}

/// Single source of truth for plan pricing, shared by checkout, check and commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingConfig {
    pub month: PlanPrice,
    pub quarter: PlanPrice,
    pub year: PlanPrice,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            month: PlanPrice {
                price: 10_000,
                days: 30,
            },
            quarter: PlanPrice {
                price: 27_000,
                days: 90,
            },
            year: PlanPrice {
                price: 100_000,
                days: 365,
            },
        }
    }
}

impl PricingConfig {
    pub fn plan(&self, plan: &PlanType) -> PlanPrice {
        match plan {
            PlanType::Month => self.month,
            PlanType::Quarter => self.quarter,
            PlanType::Year => self.year,
        }
    }

    pub fn price(&self, plan: &PlanType) -> i64 {
        self.plan(plan).price
    }

    pub fn validity_days(&self, plan: &PlanType) -> i64 {
        self.plan(plan).days
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Translation endpoint; when unset catalog names are stored untranslated.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec!["uz".to_string(), "ru".to_string(), "en".to_string()]
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            languages: default_languages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Seconds between polls of the deferred job queue.
    pub job_poll_interval_secs: u64,
    /// Seconds between sweeps of lapsed subscriptions.
    pub expiry_sweep_interval_secs: u64,
    pub job_batch_size: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            job_poll_interval_secs: 15,
            expiry_sweep_interval_secs: 3600,
            job_batch_size: 50,
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Without a config file everything comes from the environment.
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("failed to parse {config_path}: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and config.toml was not found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                    },
                    payme: PaymeConfig {
                        merchant_id: get_env("PAYME_MERCHANT_ID").unwrap_or_default(),
                        secret_key: get_env("PAYME_SECRET_KEY").unwrap_or_default(),
                        checkout_url: default_payme_checkout_url(),
                        return_url: None,
                    },
                    click: ClickConfig {
                        service_id: get_env("CLICK_SERVICE_ID").unwrap_or_default(),
                        merchant_id: get_env("CLICK_MERCHANT_ID").unwrap_or_default(),
                        secret_key: get_env("CLICK_SECRET_KEY").unwrap_or_default(),
                        checkout_url: default_click_checkout_url(),
                        return_url: None,
                    },
                    pricing: PricingConfig::default(),
                    translation: TranslationConfig::default(),
                    tasks: TasksConfig::default(),
                }
            }
            Err(e) => return Err(format!("failed to read {config_path}: {e}").into()),
        };

        // Environment overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Some(v) = get_env("SERVER_PORT").and_then(|v| v.parse().ok()) {
            config.server.port = v;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("PAYME_MERCHANT_ID") {
            config.payme.merchant_id = v;
        }
        if let Ok(v) = env::var("PAYME_SECRET_KEY") {
            config.payme.secret_key = v;
        }
        if let Ok(v) = env::var("PAYME_RETURN_URL") {
            config.payme.return_url = Some(v);
        }
        if let Ok(v) = env::var("CLICK_SERVICE_ID") {
            config.click.service_id = v;
        }
        if let Ok(v) = env::var("CLICK_MERCHANT_ID") {
            config.click.merchant_id = v;
        }
        if let Ok(v) = env::var("CLICK_SECRET_KEY") {
            config.click.secret_key = v;
        }
        if let Ok(v) = env::var("CLICK_RETURN_URL") {
            config.click.return_url = Some(v);
        }
        if let Ok(v) = env::var("TRANSLATION_ENDPOINT") {
            config.translation.endpoint = Some(v);
        }
        if let Ok(v) = env::var("TRANSLATION_API_KEY") {
            config.translation.api_key = Some(v);
        }

        Ok(config)
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pricing_table() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.price(&PlanType::Month), 10_000);
        assert_eq!(pricing.validity_days(&PlanType::Month), 30);
        assert_eq!(pricing.validity_days(&PlanType::Quarter), 90);
        assert_eq!(pricing.validity_days(&PlanType::Year), 365);
    }

    const BASE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [database]
        url = "postgres://localhost/fitsub"
        max_connections = 5

        [jwt]
        secret = "s3cret"
        access_token_expires_in = 60
        refresh_token_expires_in = 600

        [payme]
        merchant_id = "m-1"
        secret_key = "k-1"

        [click]
        service_id = "1"
        merchant_id = "2"
        secret_key = "k-2"
    "#;

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str(BASE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.payme.checkout_url, "https://checkout.paycom.uz");
        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.tasks.job_poll_interval_secs, 15);
        assert_eq!(config.translation.endpoint, None);
        assert_eq!(config.translation.languages, vec!["uz", "ru", "en"]);
    }

    #[test]
    fn test_partial_pricing_table_is_rejected() {
        let raw = format!("{BASE}\n[pricing.month]\nprice = 15000\ndays = 31\n");
        assert!(toml::from_str::<Config>(&raw).is_err());
    }
}
