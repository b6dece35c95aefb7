//! Defines the data structures representing KMA surface weather stations as
//! reported by the API Hub `stn_inf.php` endpoint, plus the enriched record
//! that pairs a station with its reverse-geocoded address.

use crate::types::address::Address;
use serde::{Deserialize, Serialize};

// --- Data Structures ---

/// A single KMA surface (SFC) observation station.
///
/// Each field corresponds to one column of the `stn_inf.php?inf=SFC` text
/// response. Field order in that response is
/// `STN_ID LON LAT STN_SP HT HT_PA HT_TA HT_WD HT_RN STN_CD STN_KO STN_EN FCT_ID LAW_ID BASIN`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// The KMA station number (STN_ID), e.g. `108` for Seoul.
    pub id: u32,
    /// Geographical position of the station (WGS84).
    pub location: Location,
    /// Station type code (STN_SP).
    pub station_type: String,
    /// Instrument heights.
    pub heights: Heights,
    /// Station code (STN_CD).
    pub code: String,
    /// Korean station name (STN_KO), e.g. "서울".
    pub name_ko: String,
    /// English station name (STN_EN). May contain spaces or be empty.
    pub name_en: String,
    /// Forecast zone identifier (FCT_ID).
    pub forecast_zone: String,
    /// Legal-dong (법정동) administrative code (LAW_ID).
    pub legal_dong: String,
    /// River basin code (BASIN).
    pub basin: String,
}

/// Represents the geographical location of a station.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Location {
    /// Longitude in decimal degrees (east positive).
    pub longitude: f64,
    /// Latitude in decimal degrees (north positive).
    pub latitude: f64,
}

/// Heights in metres reported for a station and its instruments.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Heights {
    /// Ground height above sea level (HT).
    pub ground: f64,
    /// Barometer height (HT_PA).
    pub barometer: f64,
    /// Thermometer height above ground (HT_TA).
    pub thermometer: f64,
    /// Anemometer height above ground (HT_WD).
    pub anemometer: f64,
    /// Rain gauge height above ground (HT_RN).
    pub rain_gauge: f64,
}

/// A station together with the address its coordinates resolve to.
///
/// An empty [`Address`] means geocoding did not produce a result for this
/// station (see [`crate::GeocodeFailurePolicy::LeaveBlank`]).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EnrichedStation {
    pub station: Station,
    pub address: Address,
}

impl EnrichedStation {
    pub fn new(station: Station, address: Address) -> Self {
        Self { station, address }
    }

    /// Wraps a station with an empty address.
    pub fn without_address(station: Station) -> Self {
        Self {
            station,
            address: Address::default(),
        }
    }
}

impl Location {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}
