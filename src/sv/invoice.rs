use sea_orm::{
  PaginatorTrait, Select,
  sea_query::{Expr, LikeExpr},
};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{InvoiceStatus, invoice},
  prelude::*,
  state::Config,
  sv::phoenixd::InvoiceResponse,
  utils::TimeLeft,
};

/// Unix time at which a pin paid with `amount` sats stops being shown.
pub fn deactivate_at(now: i64, amount: i64, seconds_per_sat: i64) -> i64 {
  now.saturating_add(amount.saturating_mul(seconds_per_sat))
}

/// Body of `POST /new-invoice`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewPin {
  pub message: String,
  pub amount: i64,
  pub websocket_id: String,
  pub lat_long: Option<String>,
}

impl NewPin {
  pub fn validate(&self, config: &Config) -> Result<()> {
    if self.message.trim().is_empty()
      || self.amount == 0
      || self.websocket_id.trim().is_empty()
    {
      return Err(Error::InvalidArgs("Missing parameters".into()));
    }

    if self.message.chars().count() > config.max_message_len {
      return Err(Error::InvalidArgs(format!(
        "Max message length is {} characters.",
        config.max_message_len
      )));
    }

    if self.amount < config.min_amount {
      return Err(Error::InvalidArgs(format!(
        "Amount must be at least {}",
        config.min_amount
      )));
    }

    if self.amount > config.max_amount {
      return Err(Error::InvalidArgs(format!(
        "Max amount is {}.",
        config.max_amount
      )));
    }

    if let Some(lat_long) = &self.lat_long
      && parse_lat_long(lat_long).is_none()
    {
      return Err(Error::InvalidArgs("Invalid coordinates".into()));
    }

    Ok(())
  }
}

/// Parses `"lat,lng"` into a coordinate pair within world bounds.
pub fn parse_lat_long(raw: &str) -> Option<(f64, f64)> {
  let (lat, lng) = raw.split_once(',')?;
  let lat: f64 = lat.trim().parse().ok()?;
  let lng: f64 = lng.trim().parse().ok()?;

  ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng))
    .then_some((lat, lng))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Sort {
  /// Latest deactivation first
  #[default]
  Expiry,
  DateAsc,
  DateDesc,
  SatsAsc,
  SatsDesc,
}

/// Query string of the pin listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PinQuery {
  pub page: Option<u64>,
  pub limit: Option<u64>,
  pub search: Option<String>,
  pub min_sats: Option<i64>,
  /// Unix seconds, compared against `updated_at`
  pub since: Option<i64>,
  pub until: Option<i64>,
  pub sort: Sort,
}

impl PinQuery {
  pub const DEFAULT_LIMIT: u64 = 10;

  /// `(offset, limit)` with `page` starting at 1
  pub fn window(&self, max_limit: u64) -> (u64, u64) {
    let page = self.page.unwrap_or(1).max(1);
    let limit =
      self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, max_limit.max(1));

    ((page - 1).saturating_mul(limit), limit)
  }
}

/// Public view of a paid pin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pin {
  pub id: i32,
  pub message: String,
  pub amount: i64,
  pub lat_long: Option<String>,
  pub deactivate_at: i64,
  pub updated_at: DateTime,
  pub time_left: String,
}

impl Pin {
  pub fn new(invoice: &invoice::Model, now: i64) -> Self {
    Self {
      id: invoice.id,
      message: invoice.message.clone(),
      amount: invoice.amount,
      lat_long: invoice.lat_long.clone(),
      deactivate_at: invoice.deactivate_at,
      updated_at: invoice.updated_at,
      time_left: TimeLeft::until(invoice.deactivate_at, now).to_string(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
  pub total_active: u64,
  pub total_expired: u64,
}

fn from_unix(secs: i64) -> Option<DateTime> {
  chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

fn paid() -> Select<invoice::Entity> {
  invoice::Entity::find()
    .filter(invoice::Column::Status.eq(InvoiceStatus::Paid))
}

/// `%term%` with LIKE wildcards in `term` matched literally
fn like_pattern(term: &str) -> String {
  let mut pattern = String::with_capacity(term.len() + 2);
  pattern.push('%');
  for c in term.chars() {
    if matches!(c, '\\' | '%' | '_') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

fn listing(query: &PinQuery) -> Select<invoice::Entity> {
  let mut select = paid().filter(invoice::Column::Message.ne(""));

  if let Some(search) =
    query.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
  {
    select = select.filter(
      Expr::col(invoice::Column::Message)
        .like(LikeExpr::new(like_pattern(search)).escape('\\')),
    );
  }

  if let Some(min_sats) = query.min_sats {
    select = select.filter(invoice::Column::Amount.gte(min_sats));
  }

  if let Some(since) = query.since.and_then(from_unix) {
    select = select.filter(invoice::Column::UpdatedAt.gte(since));
  }

  if let Some(until) = query.until.and_then(from_unix) {
    select = select.filter(invoice::Column::UpdatedAt.lte(until));
  }

  let select = match query.sort {
    Sort::Expiry => select.order_by_desc(invoice::Column::DeactivateAt),
    Sort::DateAsc => select.order_by_asc(invoice::Column::UpdatedAt),
    Sort::DateDesc => select.order_by_desc(invoice::Column::UpdatedAt),
    Sort::SatsAsc => select.order_by_asc(invoice::Column::Amount),
    Sort::SatsDesc => select.order_by_desc(invoice::Column::Amount),
  };

  select.order_by_desc(invoice::Column::Id)
}

pub struct Invoice<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Invoice<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    pin: &NewPin,
    provider: &InvoiceResponse,
    seconds_per_sat: i64,
  ) -> Result<invoice::Model> {
    let now = Utc::now();
    let raw = json::to_string(provider)
      .map_err(|e| Error::Internal(format!("Failed to serialize invoice: {e}")))?;

    let invoice = invoice::ActiveModel {
      websocket_id: Set(pin.websocket_id.clone()),
      message: Set(pin.message.clone()),
      invoice_bolt11: Set(provider.serialized.clone()),
      payment_hash: Set(provider.payment_hash.clone()),
      invoice: Set(raw),
      amount: Set(pin.amount),
      status: Set(InvoiceStatus::WaitingPayment),
      lat_long: Set(pin.lat_long.clone()),
      deactivate_at: Set(deactivate_at(
        now.timestamp(),
        pin.amount,
        seconds_per_sat,
      )),
      created_at: Set(now.naive_utc()),
      updated_at: Set(now.naive_utc()),
      ..Default::default()
    };

    Ok(invoice.insert(self.db).await?)
  }

  pub async fn by_payment_hash(
    &self,
    payment_hash: &str,
  ) -> Result<Option<invoice::Model>> {
    Ok(
      invoice::Entity::find()
        .filter(invoice::Column::PaymentHash.eq(payment_hash))
        .one(self.db)
        .await?,
    )
  }

  /// Paid pins still on the map
  pub async fn active(
    &self,
    query: &PinQuery,
    max_limit: u64,
    now: i64,
  ) -> Result<Vec<invoice::Model>> {
    let (offset, limit) = query.window(max_limit);

    Ok(
      listing(query)
        .filter(invoice::Column::DeactivateAt.gt(now))
        .offset(offset)
        .limit(limit)
        .all(self.db)
        .await?,
    )
  }

  /// Paid pins whose time ran out
  pub async fn deactivated(
    &self,
    query: &PinQuery,
    max_limit: u64,
    now: i64,
  ) -> Result<Vec<invoice::Model>> {
    let (offset, limit) = query.window(max_limit);

    Ok(
      listing(query)
        .filter(invoice::Column::DeactivateAt.lte(now))
        .offset(offset)
        .limit(limit)
        .all(self.db)
        .await?,
    )
  }

  pub async fn count(&self, now: i64) -> Result<Counts> {
    let total_active = paid()
      .filter(invoice::Column::DeactivateAt.gt(now))
      .count(self.db)
      .await?;
    let total_expired = paid()
      .filter(invoice::Column::DeactivateAt.lte(now))
      .count(self.db)
      .await?;

    Ok(Counts { total_active, total_expired })
  }

  /// Unpaid invoices created after `since`, oldest first
  pub async fn waiting_since(
    &self,
    since: DateTime,
  ) -> Result<Vec<invoice::Model>> {
    Ok(
      invoice::Entity::find()
        .filter(invoice::Column::Status.eq(InvoiceStatus::WaitingPayment))
        .filter(invoice::Column::CreatedAt.gt(since))
        .order_by_asc(invoice::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  /// Paid pins with `from < deactivate_at <= to`
  pub async fn expired_between(
    &self,
    from: i64,
    to: i64,
  ) -> Result<Vec<invoice::Model>> {
    Ok(
      paid()
        .filter(invoice::Column::DeactivateAt.gt(from))
        .filter(invoice::Column::DeactivateAt.lte(to))
        .order_by_asc(invoice::Column::DeactivateAt)
        .all(self.db)
        .await?,
    )
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  pub(crate) fn provider(hash: &str) -> InvoiceResponse {
    InvoiceResponse {
      amount_sat: 0,
      payment_hash: hash.to_string(),
      serialized: format!("lnbc{hash}"),
    }
  }

  pub(crate) fn pin(message: &str, amount: i64) -> NewPin {
    NewPin {
      message: message.to_string(),
      amount,
      websocket_id: "sock-1".to_string(),
      lat_long: Some("38.72,-9.14".to_string()),
    }
  }

  /// Inserts a paid pin with explicit timestamps
  pub(crate) async fn paid_pin(
    db: &DatabaseConnection,
    hash: &str,
    message: &str,
    amount: i64,
    deactivate_at: i64,
    updated_at: i64,
  ) -> invoice::Model {
    let updated_at = from_unix(updated_at).unwrap();

    invoice::ActiveModel {
      websocket_id: Set("sock-1".into()),
      message: Set(message.into()),
      invoice_bolt11: Set(format!("lnbc{hash}")),
      payment_hash: Set(hash.into()),
      invoice: Set("{}".into()),
      amount: Set(amount),
      status: Set(InvoiceStatus::Paid),
      lat_long: Set(None),
      deactivate_at: Set(deactivate_at),
      created_at: Set(updated_at),
      updated_at: Set(updated_at),
      ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
  }

  #[test]
  fn test_deactivate_at() {
    assert_eq!(deactivate_at(1_000, 360, 10), 4_600);
    assert_eq!(deactivate_at(i64::MAX - 1, 10, 10), i64::MAX);
  }

  #[test]
  fn test_validate() {
    let config = Config::default();

    assert!(pin("gm", 360).validate(&config).is_ok());
    assert!(
      NewPin { lat_long: None, ..pin("gm", 1) }.validate(&config).is_ok()
    );

    let missing = [
      pin("   ", 360),
      pin("gm", 0),
      NewPin { websocket_id: String::new(), ..pin("gm", 360) },
    ];
    for bad in missing {
      assert!(matches!(
        bad.validate(&config),
        Err(Error::InvalidArgs(msg)) if msg == "Missing parameters"
      ));
    }

    assert!(pin(&"x".repeat(501), 360).validate(&config).is_err());
    assert!(pin(&"x".repeat(500), 360).validate(&config).is_ok());
    assert!(pin("gm", -5).validate(&config).is_err());
    assert!(pin("gm", 1_000_001).validate(&config).is_err());

    let far = NewPin { lat_long: Some("91,0".into()), ..pin("gm", 1) };
    assert!(far.validate(&config).is_err());
  }

  #[test]
  fn test_parse_lat_long() {
    assert_eq!(parse_lat_long("38.72, -9.14"), Some((38.72, -9.14)));
    assert_eq!(parse_lat_long("0,181"), None);
    assert_eq!(parse_lat_long("north"), None);
  }

  #[test]
  fn test_window() {
    let query = PinQuery::default();
    assert_eq!(query.window(100), (0, 10));

    let query = PinQuery { page: Some(3), limit: Some(20), ..Default::default() };
    assert_eq!(query.window(100), (40, 20));

    let query = PinQuery { page: Some(0), limit: Some(500), ..Default::default() };
    assert_eq!(query.window(100), (0, 100));
  }

  #[tokio::test]
  async fn test_create_invoice() {
    let db = test_db::setup().await;
    let before = Utc::now().timestamp();

    let invoice = Invoice::new(&db)
      .create(&pin("hello map", 360), &provider("h1"), 10)
      .await
      .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::WaitingPayment);
    assert_eq!(invoice.invoice_bolt11, "lnbch1");
    assert_eq!(invoice.payment_hash, "h1");
    assert!(invoice.deactivate_at >= before + 3600);

    let found = Invoice::new(&db).by_payment_hash("h1").await.unwrap();
    assert_eq!(found.map(|i| i.id), Some(invoice.id));
  }

  #[tokio::test]
  async fn test_active_excludes_unpaid_and_expired() {
    let db = test_db::setup().await;
    let sv = Invoice::new(&db);
    let now = 10_000;

    sv.create(&pin("waiting", 10), &provider("w"), 10).await.unwrap();
    paid_pin(&db, "a", "live", 10, now + 100, now).await;
    paid_pin(&db, "b", "gone", 10, now - 1, now - 200).await;
    paid_pin(&db, "c", "edge", 10, now, now - 100).await;

    let active = sv.active(&PinQuery::default(), 100, now).await.unwrap();
    assert_eq!(
      active.iter().map(|i| i.message.as_str()).collect::<Vec<_>>(),
      ["live"]
    );

    let gone = sv.deactivated(&PinQuery::default(), 100, now).await.unwrap();
    assert_eq!(
      gone.iter().map(|i| i.message.as_str()).collect::<Vec<_>>(),
      ["edge", "gone"]
    );

    let counts = sv.count(now).await.unwrap();
    assert_eq!(counts, Counts { total_active: 1, total_expired: 2 });
  }

  #[tokio::test]
  async fn test_listing_filters_and_sorts() {
    let db = test_db::setup().await;
    let sv = Invoice::new(&db);
    let now = 10_000;

    paid_pin(&db, "a", "Hello Lisbon", 100, now + 300, now - 30).await;
    paid_pin(&db, "b", "hello Tokyo", 2_000, now + 200, now - 20).await;
    paid_pin(&db, "c", "gm", 50, now + 100, now - 10).await;

    let messages = |pins: Vec<invoice::Model>| {
      pins.into_iter().map(|i| i.message).collect::<Vec<_>>()
    };

    let query =
      PinQuery { search: Some("HELLO".into()), ..Default::default() };
    assert_eq!(
      messages(sv.active(&query, 100, now).await.unwrap()),
      ["Hello Lisbon", "hello Tokyo"]
    );

    let query = PinQuery { min_sats: Some(100), sort: Sort::SatsDesc, ..Default::default() };
    assert_eq!(
      messages(sv.active(&query, 100, now).await.unwrap()),
      ["hello Tokyo", "Hello Lisbon"]
    );

    let query = PinQuery { sort: Sort::DateDesc, ..Default::default() };
    assert_eq!(
      messages(sv.active(&query, 100, now).await.unwrap()),
      ["gm", "hello Tokyo", "Hello Lisbon"]
    );

    let query = PinQuery { since: Some(now - 20), ..Default::default() };
    assert_eq!(
      messages(sv.active(&query, 100, now).await.unwrap()),
      ["hello Tokyo", "gm"]
    );

    let query =
      PinQuery { page: Some(2), limit: Some(2), ..Default::default() };
    assert_eq!(messages(sv.active(&query, 100, now).await.unwrap()), ["gm"]);
  }

  #[test]
  fn test_like_pattern() {
    assert_eq!(like_pattern("gm"), "%gm%");
    assert_eq!(like_pattern("100%"), "%100\\%%");
    assert_eq!(like_pattern(r"a_b\c"), r"%a\_b\\c%");
  }

  #[tokio::test]
  async fn test_search_matches_wildcards_literally() {
    let db = test_db::setup().await;
    let sv = Invoice::new(&db);
    let now = 10_000;

    paid_pin(&db, "a", "gm", 10, now + 300, now).await;
    paid_pin(&db, "b", "100% bitcoin", 10, now + 200, now).await;

    let search = |term: &str| PinQuery {
      search: Some(term.into()),
      ..Default::default()
    };
    let messages = |pins: Vec<invoice::Model>| {
      pins.into_iter().map(|i| i.message).collect::<Vec<_>>()
    };

    assert_eq!(
      messages(sv.active(&search("%"), 100, now).await.unwrap()),
      ["100% bitcoin"]
    );
    assert_eq!(
      messages(sv.active(&search("100%"), 100, now).await.unwrap()),
      ["100% bitcoin"]
    );
    assert!(sv.active(&search("_"), 100, now).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_expired_between() {
    let db = test_db::setup().await;
    let sv = Invoice::new(&db);

    paid_pin(&db, "a", "first", 1, 100, 0).await;
    paid_pin(&db, "b", "second", 1, 105, 0).await;
    paid_pin(&db, "c", "later", 1, 200, 0).await;

    let expired = sv.expired_between(100, 150).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].message, "second");
  }

  #[tokio::test]
  async fn test_waiting_since() {
    let db = test_db::setup().await;
    let sv = Invoice::new(&db);

    let created =
      sv.create(&pin("waiting", 10), &provider("w"), 10).await.unwrap();
    paid_pin(&db, "p", "paid", 10, i64::MAX, 0).await;

    let an_hour_ago = Utc::now().naive_utc() - TimeDelta::hours(1);
    let waiting = sv.waiting_since(an_hour_ago).await.unwrap();
    assert_eq!(waiting.iter().map(|i| i.id).collect::<Vec<_>>(), [created.id]);

    let waiting =
      sv.waiting_since(Utc::now().naive_utc() + TimeDelta::hours(1)).await;
    assert!(waiting.unwrap().is_empty());
  }

  #[test]
  fn test_pin_view_hides_session() {
    let now = Utc::now().naive_utc();
    let model = invoice::Model {
      id: 7,
      websocket_id: "secret-socket".into(),
      message: "gm".into(),
      invoice_bolt11: "lnbc".into(),
      payment_hash: "h".into(),
      invoice: "{}".into(),
      amount: 6,
      status: InvoiceStatus::Paid,
      lat_long: Some("1,2".into()),
      deactivate_at: 160,
      created_at: now,
      updated_at: now,
    };

    let pin = Pin::new(&model, 100);
    assert_eq!(pin.time_left, "1m 0s");

    let value = json::to_value(&pin).unwrap();
    assert!(value.get("websocket_id").is_none());
    assert_eq!(value["amount"], 6);
  }
}
