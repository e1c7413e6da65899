use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use sea_orm::{sea_query::OnConflict, ConnectionTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::{self, DbPool},
    entities::system_config,
    errors::ServiceError,
};

pub const MAX_ORDERS_PER_DAY: &str = "max_orders_per_day";
pub const OPENING_TIME: &str = "opening_time";
pub const CLOSING_TIME: &str = "closing_time";
pub const MAINTENANCE_MODE: &str = "maintenance_mode";
pub const MAINTENANCE_MESSAGE: &str = "maintenance_message";
pub const BUSINESS_NAME: &str = "business_name";
pub const CONTACT_NUMBER: &str = "contact_number";
pub const EMAIL: &str = "email";
pub const ADDRESS: &str = "address";

const TIME_FORMAT: &str = "%H:%M:%S";
const MAX_KEY_LEN: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CapacityConfig {
    /// Orders accepted per scheduled day; `0` disables the limit
    #[validate(range(min = 0, max = 100000))]
    pub max_orders_per_day: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OperatingHours {
    #[schema(value_type = String, example = "08:00:00")]
    pub opening_time: NaiveTime,
    #[schema(value_type = String, example = "17:00:00")]
    pub closing_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct MaintenanceConfig {
    pub maintenance_mode: bool,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub maintenance_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ContactConfig {
    #[validate(length(min = 1, max = 100))]
    pub business_name: String,
    #[serde(default)]
    #[validate(length(max = 30))]
    pub contact_number: String,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub address: String,
}

/// Checks a raw value for one of the keys with a known shape.
fn validate_entry(key: &str, value: &str) -> Result<(), ServiceError> {
    if key.trim().is_empty() || key.len() > MAX_KEY_LEN {
        return Err(ServiceError::ValidationError(format!(
            "config key must be 1 to {} characters",
            MAX_KEY_LEN
        )));
    }
    let ok = match key {
        MAX_ORDERS_PER_DAY => value.trim().parse::<u32>().is_ok(),
        OPENING_TIME | CLOSING_TIME => NaiveTime::parse_from_str(value, TIME_FORMAT).is_ok(),
        MAINTENANCE_MODE => value.parse::<bool>().is_ok(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "invalid value {:?} for {}",
            value, key
        )))
    }
}

fn validate_hours(opening: NaiveTime, closing: NaiveTime) -> Result<(), ServiceError> {
    if opening < closing {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(
            "opening_time must be earlier than closing_time".into(),
        ))
    }
}

/// Reads the whole key/value table.
pub async fn load_all<C>(conn: &C) -> Result<BTreeMap<String, String>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = system_config::Entity::find()
        .order_by_asc(system_config::Column::ConfigKey)
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.config_key, row.config_value))
        .collect())
}

/// Inserts or overwrites each entry.
pub async fn upsert<C>(conn: &C, entries: &BTreeMap<String, String>) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    for (key, value) in entries {
        let row = system_config::ActiveModel {
            config_key: Set(key.clone()),
            config_value: Set(value.clone()),
            updated_at: Set(now),
        };
        system_config::Entity::insert(row)
            .on_conflict(
                OnConflict::column(system_config::Column::ConfigKey)
                    .update_columns([
                        system_config::Column::ConfigValue,
                        system_config::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

/// Daily order cap, `None` when unset or zero.
pub async fn max_orders_per_day<C>(conn: &C) -> Result<Option<u64>, ServiceError>
where
    C: ConnectionTrait,
{
    let row = system_config::Entity::find_by_id(MAX_ORDERS_PER_DAY.to_string())
        .one(conn)
        .await?;
    Ok(row
        .and_then(|r| r.config_value.trim().parse::<u64>().ok())
        .filter(|cap| *cap > 0))
}

/// Key/value operational settings with typed views over the known groups.
#[derive(Clone)]
pub struct SystemConfigService {
    db_pool: Arc<DbPool>,
}

impl SystemConfigService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn get_config(&self) -> Result<BTreeMap<String, String>, ServiceError> {
        load_all(&*self.db_pool).await
    }

    /// Upserts arbitrary keys, validating the ones with a known format.
    #[instrument(skip(self, entries), fields(keys = entries.len()))]
    pub async fn update_config(
        &self,
        entries: BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, ServiceError> {
        if entries.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one config entry is required".into(),
            ));
        }
        for (key, value) in &entries {
            validate_entry(key, value)?;
        }

        let txn = db::begin(&self.db_pool, "update_config").await?;
        let mut merged = load_all(&txn).await?;
        merged.extend(entries.clone());
        if let (Some(open), Some(close)) = (merged.get(OPENING_TIME), merged.get(CLOSING_TIME)) {
            if entries.contains_key(OPENING_TIME) || entries.contains_key(CLOSING_TIME) {
                let open = NaiveTime::parse_from_str(open, TIME_FORMAT)
                    .map_err(|e| ServiceError::ValidationError(format!("opening_time: {}", e)))?;
                let close = NaiveTime::parse_from_str(close, TIME_FORMAT)
                    .map_err(|e| ServiceError::ValidationError(format!("closing_time: {}", e)))?;
                validate_hours(open, close)?;
            }
        }
        upsert(&txn, &entries).await?;
        db::commit(txn, "update_config").await?;

        info!(keys = ?entries.keys().collect::<Vec<_>>(), "System config updated");
        Ok(merged)
    }

    pub async fn capacity(&self) -> Result<CapacityConfig, ServiceError> {
        let cap = max_orders_per_day(&*self.db_pool).await?;
        Ok(CapacityConfig {
            max_orders_per_day: cap.map(|c| c as i32).unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_capacity(
        &self,
        request: CapacityConfig,
    ) -> Result<CapacityConfig, ServiceError> {
        request.validate()?;
        let entries = BTreeMap::from([(
            MAX_ORDERS_PER_DAY.to_string(),
            request.max_orders_per_day.to_string(),
        )]);
        upsert(&*self.db_pool, &entries).await?;
        info!(max_orders_per_day = request.max_orders_per_day, "Daily capacity updated");
        Ok(request)
    }

    pub async fn operating_hours(&self) -> Result<OperatingHours, ServiceError> {
        let all = load_all(&*self.db_pool).await?;
        let parse = |key: &str| {
            all.get(key)
                .and_then(|v| NaiveTime::parse_from_str(v, TIME_FORMAT).ok())
                .ok_or_else(|| ServiceError::NotFound(format!("config key {} not set", key)))
        };
        Ok(OperatingHours {
            opening_time: parse(OPENING_TIME)?,
            closing_time: parse(CLOSING_TIME)?,
        })
    }

    #[instrument(skip(self))]
    pub async fn update_operating_hours(
        &self,
        request: OperatingHours,
    ) -> Result<OperatingHours, ServiceError> {
        validate_hours(request.opening_time, request.closing_time)?;
        let entries = BTreeMap::from([
            (
                OPENING_TIME.to_string(),
                request.opening_time.format(TIME_FORMAT).to_string(),
            ),
            (
                CLOSING_TIME.to_string(),
                request.closing_time.format(TIME_FORMAT).to_string(),
            ),
        ]);
        upsert(&*self.db_pool, &entries).await?;
        info!("Operating hours updated");
        Ok(request)
    }

    pub async fn maintenance(&self) -> Result<MaintenanceConfig, ServiceError> {
        let all = load_all(&*self.db_pool).await?;
        Ok(MaintenanceConfig {
            maintenance_mode: all
                .get(MAINTENANCE_MODE)
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            maintenance_message: all.get(MAINTENANCE_MESSAGE).cloned().unwrap_or_default(),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_maintenance(
        &self,
        request: MaintenanceConfig,
    ) -> Result<MaintenanceConfig, ServiceError> {
        request.validate()?;
        let entries = BTreeMap::from([
            (
                MAINTENANCE_MODE.to_string(),
                request.maintenance_mode.to_string(),
            ),
            (
                MAINTENANCE_MESSAGE.to_string(),
                request.maintenance_message.clone(),
            ),
        ]);
        upsert(&*self.db_pool, &entries).await?;
        info!(maintenance_mode = request.maintenance_mode, "Maintenance notice updated");
        Ok(request)
    }

    pub async fn contact(&self) -> Result<ContactConfig, ServiceError> {
        let all = load_all(&*self.db_pool).await?;
        let get = |key: &str| all.get(key).cloned().unwrap_or_default();
        Ok(ContactConfig {
            business_name: get(BUSINESS_NAME),
            contact_number: get(CONTACT_NUMBER),
            email: all.get(EMAIL).filter(|e| !e.is_empty()).cloned(),
            address: get(ADDRESS),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_contact(
        &self,
        request: ContactConfig,
    ) -> Result<ContactConfig, ServiceError> {
        request.validate()?;
        let entries = BTreeMap::from([
            (BUSINESS_NAME.to_string(), request.business_name.clone()),
            (CONTACT_NUMBER.to_string(), request.contact_number.clone()),
            (EMAIL.to_string(), request.email.clone().unwrap_or_default()),
            (ADDRESS.to_string(), request.address.clone()),
        ]);
        upsert(&*self.db_pool, &entries).await?;
        info!("Contact details updated");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn known_keys_are_format_checked() {
        assert!(validate_entry(MAX_ORDERS_PER_DAY, "40").is_ok());
        assert_matches!(
            validate_entry(MAX_ORDERS_PER_DAY, "-1"),
            Err(ServiceError::ValidationError(_))
        );
        assert!(validate_entry(OPENING_TIME, "07:30:00").is_ok());
        assert!(validate_entry(CLOSING_TIME, "7pm").is_err());
        assert!(validate_entry(MAINTENANCE_MODE, "true").is_ok());
        assert!(validate_entry(MAINTENANCE_MODE, "yes").is_err());
        assert!(validate_entry("promo_banner", "anything goes").is_ok());
        assert!(validate_entry("", "x").is_err());
    }

    #[test]
    fn hours_must_be_ordered() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        assert!(validate_hours(eight, five).is_ok());
        assert!(validate_hours(five, eight).is_err());
        assert!(validate_hours(eight, eight).is_err());
    }
}
