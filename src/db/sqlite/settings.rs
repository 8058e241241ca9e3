//! Server settings singleton

use super::models::Settings;
use crate::error::{AppError, Result};
use rusqlite::{params, Connection};

/// Get settings
pub fn get_settings(conn: &Connection) -> Result<Settings> {
    let settings = conn.query_row(
        "SELECT host, port, api_rate_limit, search_rate_limit, write_rate_limit,
                platform_fee_percent, default_radius_m, max_radius_m, validity_days,
                expiry_sweep_hour, expiry_sweep_minute, updated_at
         FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(Settings {
                host: row.get(0)?,
                port: row.get::<_, i64>(1)? as u16,
                api_rate_limit: row.get::<_, i64>(2)? as u32,
                search_rate_limit: row.get::<_, i64>(3)? as u32,
                write_rate_limit: row.get::<_, i64>(4)? as u32,
                platform_fee_percent: row.get(5)?,
                default_radius_m: row.get(6)?,
                max_radius_m: row.get(7)?,
                validity_days: row.get(8)?,
                expiry_sweep_hour: row.get::<_, i64>(9)? as u32,
                expiry_sweep_minute: row.get::<_, i64>(10)? as u32,
                updated_at: row.get(11)?,
            })
        },
    )?;
    Ok(settings)
}

/// Update settings (only the provided fields change)
#[allow(clippy::too_many_arguments)]
pub fn update_settings(
    conn: &Connection,
    host: Option<String>,
    port: Option<u16>,
    platform_fee_percent: Option<f64>,
    default_radius_m: Option<f64>,
    max_radius_m: Option<f64>,
    validity_days: Option<i64>,
) -> Result<Settings> {
    // A bad value persisted here would fail every later booking or search.
    if let Some(fee) = platform_fee_percent {
        if !(0.0..=100.0).contains(&fee) {
            return Err(AppError::Validation(format!(
                "platform_fee_percent out of range: {}",
                fee
            )));
        }
    }
    if let Some(radius) = default_radius_m {
        if radius <= 0.0 {
            return Err(AppError::Validation(format!(
                "default_radius_m must be positive: {}",
                radius
            )));
        }
    }
    if let Some(radius) = max_radius_m {
        if radius <= 0.0 {
            return Err(AppError::Validation(format!(
                "max_radius_m must be positive: {}",
                radius
            )));
        }
    }
    if let Some(days) = validity_days {
        if days < 1 {
            return Err(AppError::Validation(format!(
                "validity_days must be at least 1: {}",
                days
            )));
        }
    }

    conn.execute(
        "UPDATE settings SET
            host = COALESCE(?1, host),
            port = COALESCE(?2, port),
            platform_fee_percent = COALESCE(?3, platform_fee_percent),
            default_radius_m = COALESCE(?4, default_radius_m),
            max_radius_m = COALESCE(?5, max_radius_m),
            validity_days = COALESCE(?6, validity_days),
            updated_at = datetime('now')
         WHERE id = 1",
        params![
            host,
            port.map(|p| p as i64),
            platform_fee_percent,
            default_radius_m,
            max_radius_m,
            validity_days
        ],
    )?;

    get_settings(conn)
}
