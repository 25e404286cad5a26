pub use std::{sync::Arc, time::Duration};

pub use anyhow::Context;
pub use chrono::{NaiveDateTime as DateTime, TimeDelta, Utc};
pub use dashmap::DashMap;
pub use migration::MigratorTrait;
pub use sea_orm::{
  ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection,
  EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
pub use tokio::time;
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Result};
