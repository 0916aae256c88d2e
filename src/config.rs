use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{FixedOffset, NaiveDateTime, Utc};
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use tracing::warn;

use crate::csv_store::CsvWorkbook;
use crate::notify::{AligoCredentials, AligoGateway, DisabledGateway, Notifier, SmsGateway};
use crate::state::StateStore;

/// Settings shared by every command; each flag can also come from the environment.
#[derive(Debug, Clone, Args)]
pub struct PortalArgs {
    /// Directory holding one `<worksheet>.csv` per worksheet
    #[arg(long, env = "PORTAL_WORKBOOK_DIR", default_value = "workbook", global = true)]
    pub workbook_dir: PathBuf,

    /// Postgres URL for durable worker state
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    pub database_url: Option<String>,

    /// Offset of local school time from the UTC source timestamps
    #[arg(
        long,
        env = "PORTAL_UTC_OFFSET_HOURS",
        default_value_t = 9,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(-12..=14),
        global = true
    )]
    pub utc_offset_hours: i32,

    /// Prefix placed in front of every SMS
    #[arg(long, env = "PORTAL_SMS_BRAND", default_value = "[숙제알림]", global = true)]
    pub sms_brand: String,

    #[arg(long, env = "PORTAL_SMS_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub sms_timeout_secs: u64,

    #[arg(long, env = "ALIGO_API_KEY", hide_env_values = true, global = true)]
    pub aligo_api_key: Option<String>,

    #[arg(long, env = "ALIGO_USER_ID", global = true)]
    pub aligo_user_id: Option<String>,

    #[arg(long, env = "SENDER_PHONE_NUMBER", global = true)]
    pub sender_phone: Option<String>,

    /// Receives the daily digest summary
    #[arg(long, env = "OPERATOR_PHONE", global = true)]
    pub operator_phone: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "PORTAL_LOG_JSON", global = true)]
    pub log_json: bool,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PortalArgs {
    pub fn local_offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .with_context(|| format!("invalid utc offset {}h", self.utc_offset_hours))
    }

    /// Credentials only when all three are set; a placeholder key counts as unset.
    pub fn aligo_credentials(&self) -> Option<AligoCredentials> {
        let api_key = present(&self.aligo_api_key).filter(|key| !key.contains("여기에"))?;
        Some(AligoCredentials {
            api_key,
            user_id: present(&self.aligo_user_id)?,
            sender: present(&self.sender_phone)?,
        })
    }

    pub fn operator_phone(&self) -> Option<String> {
        present(&self.operator_phone)
    }

    pub fn notifier(&self) -> Notifier {
        let gateway: Box<dyn SmsGateway> = match self.aligo_credentials() {
            Some(credentials) => Box::new(AligoGateway::new(
                credentials,
                Duration::from_secs(self.sms_timeout_secs.max(1)),
            )),
            None => {
                warn!("aligo credentials not configured, sms delivery disabled");
                Box::new(DisabledGateway)
            }
        };
        Notifier::new(gateway, self.sms_brand.clone())
    }

    pub fn open_workbook(&self) -> anyhow::Result<CsvWorkbook> {
        CsvWorkbook::open(&self.workbook_dir)
            .with_context(|| format!("failed to open workbook {}", self.workbook_dir.display()))
    }

    pub async fn state_store(&self) -> anyhow::Result<StateStore> {
        match present(&self.database_url) {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&url)
                    .await
                    .context("failed to connect to Postgres")?;
                Ok(StateStore::Postgres(pool))
            }
            None => {
                warn!("DATABASE_URL not set, worker state will not survive a restart");
                Ok(StateStore::memory())
            }
        }
    }
}

/// Current wall-clock time at the school.
pub fn local_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        portal: PortalArgs,
    }

    fn parse(args: &[&str]) -> PortalArgs {
        let mut argv = vec!["portal"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().portal
    }

    #[test]
    fn credentials_require_all_three_values() {
        let partial = parse(&["--aligo-api-key", "k", "--aligo-user-id", "u", "--sender-phone", " "]);
        assert!(partial.aligo_credentials().is_none());

        let full = parse(&["--aligo-api-key", "k", "--aligo-user-id", "u", "--sender-phone", "0101"]);
        let credentials = full.aligo_credentials().unwrap();
        assert_eq!(credentials.sender, "0101");

        let placeholder = parse(&[
            "--aligo-api-key",
            "여기에_API_키",
            "--aligo-user-id",
            "u",
            "--sender-phone",
            "0101",
        ]);
        assert!(placeholder.aligo_credentials().is_none());
    }

    #[test]
    fn offsets_are_range_checked() {
        let args = parse(&["--utc-offset-hours", "-5"]);
        assert_eq!(args.local_offset().unwrap().local_minus_utc(), -5 * 3600);
        assert!(Harness::try_parse_from(["portal", "--utc-offset-hours", "20"]).is_err());
    }
}
