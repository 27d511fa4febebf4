//! Blockages file format (§6.1): `<YYYY><MM>.bloqueos`, one record per
//! line, `##d##h##m-##d##h##m:x1,y1,x2,y2,...,xn,yn`.

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::model::{blockage::Blockage, position::Position};

use super::parse_lines;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockageRecord {
    pub start: (u32, u32, u32),
    pub end: (u32, u32, u32),
    pub points: Vec<(i32, i32)>,
}

fn parse_offset(s: &str) -> Result<(u32, u32, u32), String> {
    let (day_str, rest) = s.split_once('d').ok_or_else(|| format!("missing `d` in `{s}`"))?;
    let (hour_str, rest) = rest.split_once('h').ok_or_else(|| format!("missing `h` in `{s}`"))?;
    let minute_str = rest.strip_suffix('m').ok_or_else(|| format!("missing `m` in `{s}`"))?;
    let day = day_str.parse().map_err(|_| format!("bad day `{day_str}`"))?;
    let hour = hour_str.parse().map_err(|_| format!("bad hour `{hour_str}`"))?;
    let minute = minute_str.parse().map_err(|_| format!("bad minute `{minute_str}`"))?;
    Ok((day, hour, minute))
}

pub fn parse_line(line: &str) -> Result<BlockageRecord, String> {
    let (window, rest) = line.split_once(':').ok_or_else(|| format!("missing `:` in `{line}`"))?;
    let (start_str, end_str) = window.split_once('-').ok_or_else(|| format!("missing `-` in `{window}`"))?;
    let start = parse_offset(start_str)?;
    let end = parse_offset(end_str)?;

    let coords: Result<Vec<i32>, String> = rest
        .split(',')
        .map(|c| c.parse::<i32>().map_err(|_| format!("bad coordinate `{c}`")))
        .collect();
    let coords = coords?;
    if coords.len() < 4 || coords.len() % 2 != 0 {
        return Err(format!("polyline needs >= 2 points, got {} coordinates", coords.len()));
    }
    let points: Vec<(i32, i32)> = coords.chunks(2).map(|c| (c[0], c[1])).collect();

    Ok(BlockageRecord { start, end, points })
}

fn anchor(offset: (u32, u32, u32), year: i32, month: u32) -> Option<NaiveDateTime> {
    let (day, hour, minute) = offset;
    let base = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    Some(base + Duration::days((day as i64).saturating_sub(1)) + Duration::hours(hour as i64) + Duration::minutes(minute as i64))
}

pub fn to_blockage(record: &BlockageRecord, year: i32, month: u32, sequence: u64) -> Option<Blockage> {
    let start = anchor(record.start, year, month)?;
    let end = anchor(record.end, year, month)?;
    let polyline = record.points.iter().map(|&(x, y)| Position::new(x, y)).collect();
    Some(Blockage::new(format!("B{sequence:04}").as_str().into(), start, end, polyline))
}

pub fn parse_blockages_file(path: impl AsRef<Path>, year: i32, month: u32) -> std::io::Result<Vec<Blockage>> {
    let records = parse_lines(path.as_ref(), parse_line)?;
    Ok(records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| to_blockage(record, year, month, i as u64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_two_point_polyline() {
        let record = parse_line("00d00h00m-01d00h00m:10,5,10,15").unwrap();
        assert_eq!(record.start, (0, 0, 0));
        assert_eq!(record.end, (1, 0, 0));
        assert_eq!(record.points, vec![(10, 5), (10, 15)]);
    }

    #[test]
    fn odd_coordinate_count_is_rejected() {
        assert!(parse_line("00d00h00m-01d00h00m:10,5,10").is_err());
    }

    #[test]
    fn single_point_polyline_is_rejected() {
        assert!(parse_line("00d00h00m-01d00h00m:10,5").is_err());
    }

    #[test]
    fn converts_into_a_domain_blockage_anchored_to_the_file_month() {
        let record = parse_line("00d00h00m-01d00h00m:10,5,10,15").unwrap();
        let blockage = to_blockage(&record, 2026, 3, 0).unwrap();
        assert_eq!(blockage.start, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(blockage.polyline, vec![Position::new(10, 5), Position::new(10, 15)]);
    }

    #[test]
    fn loads_a_multi_line_blockages_fixture_skipping_the_bad_line() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/202603.bloqueos");
        let blockages = parse_blockages_file(path, 2026, 3).unwrap();
        assert_eq!(blockages.len(), 2);
        assert_eq!(blockages[1].polyline.len(), 3);
    }
}
