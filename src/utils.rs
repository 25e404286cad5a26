use std::fmt;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Countdown to a pin's deactivation time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeLeft {
  pub days: i64,
  pub hours: i64,
  pub minutes: i64,
  pub seconds: i64,
}

impl TimeLeft {
  /// Zeroed once `deactivate_at` has passed.
  pub fn until(deactivate_at: i64, now: i64) -> Self {
    let left = deactivate_at - now;
    if left <= 0 {
      return Self::default();
    }

    Self {
      days: left / DAY,
      hours: left % DAY / HOUR,
      minutes: left % HOUR / MINUTE,
      seconds: left % MINUTE,
    }
  }
}

impl fmt::Display for TimeLeft {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.days > 0 {
      write!(f, "{}d ", self.days)?;
    }
    if self.days > 0 || self.hours > 0 {
      write!(f, "{}h ", self.hours)?;
    }
    if self.days > 0 || self.hours > 0 || self.minutes > 0 {
      write!(f, "{}m ", self.minutes)?;
    }
    write!(f, "{}s", self.seconds)
  }
}

/// Human phrase for how long a pin stays up, e.g. `"1 hour, 5 minutes"`.
pub fn describe_duration(total_secs: i64) -> String {
  let total = total_secs.max(0);

  let units = [
    (total / YEAR, "year"),
    (total % YEAR / MONTH, "month"),
    (total % MONTH / WEEK, "week"),
    (total % WEEK / DAY, "day"),
    (total % DAY / HOUR, "hour"),
    (total % HOUR / MINUTE, "minute"),
    (total % MINUTE, "second"),
  ];

  let parts: Vec<String> = units
    .iter()
    .filter(|(value, _)| *value > 0)
    .take(2)
    .map(|(value, label)| {
      let plural = if *value > 1 { "s" } else { "" };
      format!("{value} {label}{plural}")
    })
    .collect();

  if parts.is_empty() {
    "less than a minute".to_string()
  } else {
    parts.join(", ")
  }
}
