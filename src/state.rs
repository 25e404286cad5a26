use std::env;

use crate::{hub::Hub, prelude::*, sv};

#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  pub database_url: String,
  pub phoenix_host: String,
  pub phoenix_token: String,
  /// Webhook route is only mounted when this is set
  pub phoenix_webhook_secret: Option<String>,
  pub phoenix_webhook_url: Option<String>,
  pub seconds_per_sat: i64,
  pub max_message_len: usize,
  pub min_amount: i64,
  pub max_amount: i64,
  pub max_page_limit: u64,
  pub invoice_expiry: Duration,
  pub reconcile_interval: Duration,
  pub expiry_interval: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      port: 3000,
      database_url: String::from("sqlite:zapin.db?mode=rwc"),
      phoenix_host: String::from("http://127.0.0.1:9740"),
      phoenix_token: String::new(),
      phoenix_webhook_secret: None,
      phoenix_webhook_url: None,

      seconds_per_sat: 10,
      max_message_len: 500,
      min_amount: 1,
      max_amount: 1_000_000,
      max_page_limit: 100,

      invoice_expiry: Duration::from_secs(3600),
      reconcile_interval: Duration::from_secs(30),
      expiry_interval: Duration::from_secs(5),
    }
  }
}

fn var(key: &str) -> Option<String> {
  env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
  T::Err: std::fmt::Display,
{
  match var(key) {
    Some(raw) => raw
      .trim()
      .parse()
      .map_err(|err| anyhow::anyhow!("Invalid {key} `{raw}`: {err}")),
    None => Ok(default),
  }
}

fn duration(key: &str, default: Duration) -> anyhow::Result<Duration> {
  match var(key) {
    Some(raw) => humantime::parse_duration(raw.trim())
      .with_context(|| format!("Invalid {key} `{raw}`")),
    None => Ok(default),
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();

    let config = Self {
      port: parse("PORT", default.port)?,
      database_url: var("DATABASE_URL").unwrap_or(default.database_url),
      phoenix_host: var("PHOENIX_HOST")
        .unwrap_or(default.phoenix_host)
        .trim_end_matches('/')
        .to_string(),
      phoenix_token: var("PHOENIX_TOKEN").context("PHOENIX_TOKEN not set")?,
      phoenix_webhook_secret: var("PHOENIX_WEBHOOK_SECRET"),
      phoenix_webhook_url: var("PHOENIX_WEBHOOK_URL"),
      seconds_per_sat: parse("SECONDS_PER_SAT", default.seconds_per_sat)?,
      max_message_len: parse("MAX_MESSAGE_LEN", default.max_message_len)?,
      min_amount: parse("MIN_AMOUNT", default.min_amount)?,
      max_amount: parse("MAX_AMOUNT", default.max_amount)?,
      max_page_limit: parse("MAX_PAGE_LIMIT", default.max_page_limit)?,
      invoice_expiry: duration("INVOICE_EXPIRY", default.invoice_expiry)?,
      reconcile_interval: duration(
        "RECONCILE_INTERVAL",
        default.reconcile_interval,
      )?,
      expiry_interval: duration("EXPIRY_INTERVAL", default.expiry_interval)?,
    };

    if config.seconds_per_sat <= 0 {
      anyhow::bail!("SECONDS_PER_SAT must be positive");
    }
    if config.min_amount < 1 || config.min_amount > config.max_amount {
      anyhow::bail!("MIN_AMOUNT must be in 1..=MAX_AMOUNT");
    }

    Ok(config)
  }
}

pub struct Services<'a> {
  pub invoice: sv::Invoice<'a>,
  pub payment: sv::Payment<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub phoenixd: sv::Phoenixd,
  pub hub: Hub,
  pub config: Config,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    migration::Migrator::up(&db, None)
      .await
      .context("Failed to run migrations")?;

    Ok(Self::with_db(db, config))
  }

  pub fn with_db(db: DatabaseConnection, config: Config) -> Self {
    let phoenixd =
      sv::Phoenixd::new(config.phoenix_host.clone(), config.phoenix_token.clone());

    Self { db, phoenixd, hub: Hub::new(), config }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      invoice: sv::Invoice::new(&self.db),
      payment: sv::Payment::new(&self.db),
    }
  }

  /// Asks the provider about `payment_hash` and settles the matching pin.
  ///
  /// Returns the freshly paid invoice, or `None` when the payment is not
  /// complete yet or was already settled.
  pub async fn process_payment(
    &self,
    payment_hash: &str,
  ) -> Result<Option<crate::entity::invoice::Model>> {
    let incoming = self.phoenixd.incoming_payment(payment_hash).await?;

    if !incoming.is_paid {
      debug!("Payment {payment_hash} is not completed yet");
      return Ok(None);
    }

    let invoice = match self
      .sv()
      .payment
      .settle(payment_hash, self.config.seconds_per_sat)
      .await?
    {
      sv::Settled::Fresh(invoice) => invoice,
      sv::Settled::Already(_) => {
        debug!("Payment {payment_hash} already settled");
        return Ok(None);
      }
    };

    info!(
      "Invoice #{} paid ({} sats), visible until {}",
      invoice.id, invoice.amount, invoice.deactivate_at
    );

    self.announce_paid(&invoice);
    Ok(Some(invoice))
  }

  fn announce_paid(&self, invoice: &crate::entity::invoice::Model) {
    use crate::hub::Event;

    let now = Utc::now().timestamp();

    self.hub.emit(&invoice.websocket_id, Event::paid(invoice));
    self.hub.emit_all(Event::new_message(&sv::Pin::new(invoice, now)));
  }

  pub fn broadcast_users(&self) {
    let count = self.hub.len();
    info!("Total users connected: {count}");
    self.hub.emit_all(crate::hub::Event::users_connected(count));
  }
}
