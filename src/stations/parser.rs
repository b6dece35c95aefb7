//! Parses the whitespace-delimited text body returned by `stn_inf.php`.
//!
//! Data lines look like
//!
//! ```text
//!   90  128.56473000   38.25085000   1   17.53   18.73    1.95   10.00    0.86  47090 속초  Sokcho  11D20401 5182033035  11500
//! ```
//!
//! Header and footer lines start with `#` and are ignored.

use crate::stations::error::StationError;
use crate::types::station::{Heights, Location, Station};

/// Leading numeric fields: STN_ID LON LAT STN_SP HT HT_PA HT_TA HT_WD HT_RN STN_CD.
const FIXED_FIELDS: usize = 10;
/// Trailing code fields: FCT_ID LAW_ID BASIN.
const TAIL_FIELDS: usize = 3;
/// Fixed + tail + at least the Korean name.
const MIN_FIELDS: usize = FIXED_FIELDS + TAIL_FIELDS + 1;

/// Parses every data line of a station response.
///
/// # Errors
///
/// Returns [`StationError::EmptyResponse`] if the text holds no data lines and
/// [`StationError::Parse`] (with the 1-based line number) for the first
/// malformed line.
pub fn parse_station_text(text: &str) -> Result<Vec<Station>, StationError> {
    let mut stations = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        stations.push(parse_station_line(trimmed, idx + 1)?);
    }

    if stations.is_empty() {
        return Err(StationError::EmptyResponse);
    }
    Ok(stations)
}

fn parse_station_line(line: &str, line_no: usize) -> Result<Station, StationError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < MIN_FIELDS {
        return Err(StationError::Parse {
            line: line_no,
            message: format!(
                "expected at least {} fields, found {}",
                MIN_FIELDS,
                parts.len()
            ),
        });
    }

    let tail = &parts[parts.len() - TAIL_FIELDS..];
    let names = &parts[FIXED_FIELDS..parts.len() - TAIL_FIELDS];
    // The Korean name never contains spaces; everything after it is the English name.
    let name_ko = names[0].to_string();
    let name_en = names[1..].join(" ");

    let number = |i: usize, column: &str| -> Result<f64, StationError> {
        parts[i].parse::<f64>().map_err(|_| StationError::Parse {
            line: line_no,
            message: format!("{} is not a number: '{}'", column, parts[i]),
        })
    };

    let id = parts[0].parse::<u32>().map_err(|_| StationError::Parse {
        line: line_no,
        message: format!("STN_ID is not a station number: '{}'", parts[0]),
    })?;

    Ok(Station {
        id,
        location: Location::new(number(1, "LON")?, number(2, "LAT")?),
        station_type: parts[3].to_string(),
        heights: Heights {
            ground: number(4, "HT")?,
            barometer: number(5, "HT_PA")?,
            thermometer: number(6, "HT_TA")?,
            anemometer: number(7, "HT_WD")?,
            rain_gauge: number(8, "HT_RN")?,
        },
        code: parts[9].to_string(),
        name_ko,
        name_en,
        forecast_zone: tail[0].to_string(),
        legal_dong: tail[1].to_string(),
        basin: tail[2].to_string(),
    })
}
