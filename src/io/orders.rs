//! Orders file format (§6.1): `ventas<YYYY><MM>`, one record per line,
//! `##d##h##m:posX,posY,c-<clientId>,<m3>m3,<hours>h`.

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::model::{order::Order, position::Position};

use super::parse_lines;

/// The raw, format-faithful parse of one order line - kept separate from
/// the domain `Order` so the line <-> record round-trip (§8) doesn't have
/// to fight `Order`'s derived fields (`due_time`, `remaining_m3`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub x: i32,
    pub y: i32,
    pub client_id: String,
    pub m3: i32,
    pub limit_hours: i64,
}

fn strip_suffix<'a>(s: &'a str, suffix: &str) -> Result<&'a str, String> {
    s.strip_suffix(suffix)
        .ok_or_else(|| format!("expected `{suffix}` suffix in `{s}`"))
}

fn strip_prefix<'a>(s: &'a str, prefix: &str) -> Result<&'a str, String> {
    s.strip_prefix(prefix)
        .ok_or_else(|| format!("expected `{prefix}` prefix in `{s}`"))
}

/// Parses the `##d##h##m` timestamp prefix into (day, hour, minute).
fn parse_offset(s: &str) -> Result<(u32, u32, u32), String> {
    let (day_str, rest) = s.split_once('d').ok_or_else(|| format!("missing `d` in `{s}`"))?;
    let (hour_str, rest) = rest.split_once('h').ok_or_else(|| format!("missing `h` in `{s}`"))?;
    let minute_str = strip_suffix(rest, "m")?;
    let day = day_str.parse().map_err(|_| format!("bad day `{day_str}`"))?;
    let hour = hour_str.parse().map_err(|_| format!("bad hour `{hour_str}`"))?;
    let minute = minute_str.parse().map_err(|_| format!("bad minute `{minute_str}`"))?;
    Ok((day, hour, minute))
}

pub fn parse_line(line: &str) -> Result<OrderRecord, String> {
    let (offset, rest) = line.split_once(':').ok_or_else(|| format!("missing `:` in `{line}`"))?;
    let (day, hour, minute) = parse_offset(offset)?;

    let fields: Vec<&str> = rest.split(',').collect();
    let [x_str, y_str, client_str, m3_str, hours_str] = fields.as_slice() else {
        return Err(format!("expected 5 comma-separated fields, got {}", fields.len()));
    };

    let x = x_str.parse().map_err(|_| format!("bad x `{x_str}`"))?;
    let y = y_str.parse().map_err(|_| format!("bad y `{y_str}`"))?;
    let client_id = strip_prefix(client_str, "c-")?.to_string();
    let m3 = strip_suffix(m3_str, "m3")?
        .parse()
        .map_err(|_| format!("bad m3 `{m3_str}`"))?;
    let limit_hours = strip_suffix(hours_str, "h")?
        .parse()
        .map_err(|_| format!("bad limit hours `{hours_str}`"))?;

    Ok(OrderRecord { day, hour, minute, x, y, client_id, m3, limit_hours })
}

/// Reconstructs the original line for a record (§8 round-trip property).
pub fn format_line(record: &OrderRecord) -> String {
    format!(
        "{}d{}h{}m:{},{},c-{},{}m3,{}h",
        record.day, record.hour, record.minute, record.x, record.y, record.client_id, record.m3, record.limit_hours
    )
}

/// The record's arrival time, anchored to the file's `YYYY`/`MM` base.
pub fn arrival_time(record: &OrderRecord, year: i32, month: u32) -> Option<NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    Some(base + Duration::days((record.day as i64).saturating_sub(1)) + Duration::hours(record.hour as i64) + Duration::minutes(record.minute as i64))
}

/// Converts a parsed record into a domain `Order`. `sequence` disambiguates
/// multiple orders from the same client within one file into distinct ids.
pub fn to_order(record: &OrderRecord, year: i32, month: u32, sequence: u64) -> Option<Order> {
    let arrival = arrival_time(record, year, month)?;
    Some(Order::new(
        format!("c-{}-{sequence}", record.client_id).as_str().into(),
        Position::new(record.x, record.y),
        arrival,
        record.limit_hours,
        record.m3,
    ))
}

/// Parses a whole `ventas<YYYY><MM>` file into domain orders, skipping
/// malformed lines with a diagnostic (§6.1).
pub fn parse_orders_file(path: impl AsRef<Path>, year: i32, month: u32) -> std::io::Result<Vec<Order>> {
    let records = parse_lines(path.as_ref(), parse_line)?;
    Ok(records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| to_order(record, year, month, i as u64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_order_line() {
        let record = parse_line("11d13h31m:45,43,c-167,9m3,36h").unwrap();
        assert_eq!(record, OrderRecord { day: 11, hour: 13, minute: 31, x: 45, y: 43, client_id: "167".into(), m3: 9, limit_hours: 36 });
    }

    #[test]
    fn line_round_trips_through_record() {
        let line = "11d13h31m:45,43,c-167,9m3,36h";
        let record = parse_line(line).unwrap();
        assert_eq!(format_line(&record), line);
    }

    #[test]
    fn arrival_time_is_anchored_to_the_file_month() {
        let record = parse_line("11d13h31m:45,43,c-167,9m3,36h").unwrap();
        let arrival = arrival_time(&record, 2026, 3).unwrap();
        assert_eq!(arrival, NaiveDate::from_ymd_opt(2026, 3, 11).unwrap().and_hms_opt(13, 31, 0).unwrap());
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(parse_line("not-a-valid-line").is_err());
        assert!(parse_line("11d13h31m:45,43,c-167,9m3").is_err());
        assert!(parse_line("11d13h31m:45,43,167,9m3,36h").is_err());
    }

    #[test]
    fn loads_a_multi_line_orders_fixture_skipping_the_bad_line() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ventas202603");
        let orders = parse_orders_file(path, 2026, 3).unwrap();
        assert_eq!(orders.len(), 3);
    }
}
