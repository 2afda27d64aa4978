//! Process configuration from environment variables.

use anyhow::Context;
use rust_decimal::Decimal;
use storefront_core::CountryCode;
use storefront_shipping::TierTable;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub stripe_webhook_secret: String,
    pub outbox_shared_secret: String,
    pub admin_shared_secret: String,
    pub klarna_base_url: String,
    pub klarna_username: String,
    pub klarna_password: String,
    pub vies_base_url: String,
    pub validate_vat_ids: bool,
    pub home_country: CountryCode,
    pub home_vat_rate: Decimal,
    /// JSON array of `{max_grams, amount, code}` rows. Parsed on demand so
    /// the tier cache can pick up changes on reload.
    pub shipping_tiers: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let home_country: CountryCode = optional("HOME_COUNTRY", "SE")
            .parse()
            .map_err(|e| anyhow::anyhow!("HOME_COUNTRY: {e}"))?;
        let home_vat_rate: Decimal = optional("HOME_VAT_RATE", "0.25")
            .parse()
            .context("HOME_VAT_RATE must be a decimal fraction")?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: optional("BIND_ADDR", "0.0.0.0:8080"),
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            outbox_shared_secret: required("OUTBOX_SHARED_SECRET")?,
            admin_shared_secret: required("ADMIN_SHARED_SECRET")?,
            klarna_base_url: optional("KLARNA_BASE_URL", "https://api.klarna.com"),
            klarna_username: required("KLARNA_USERNAME")?,
            klarna_password: required("KLARNA_PASSWORD")?,
            vies_base_url: optional(
                "VIES_BASE_URL",
                "https://ec.europa.eu/taxation_customs/vies/rest-api",
            ),
            validate_vat_ids: optional("VALIDATE_VAT_IDS", "true") == "true",
            home_country,
            home_vat_rate,
            shipping_tiers: required("SHIPPING_TIERS")?,
        })
    }

    /// Parses the configured tier table. Malformed rows inside the array are
    /// discarded by `TierTable::new`; malformed JSON is a hard error.
    pub fn load_tier_table(&self) -> anyhow::Result<TierTable> {
        TierTable::from_json(&self.shipping_tiers).context("SHIPPING_TIERS is not a usable tier table")
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
