//! Address types returned by SGIS geocoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Administrative address resolved from a coordinate pair.
///
/// All parts are plain strings; a part SGIS did not return is left empty.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Province or metropolitan city (시/도), e.g. "서울특별시".
    pub sido: String,
    /// City, county or district (시/군/구). Empty for cities with no districts.
    pub sigungu: String,
    /// Town, township or neighbourhood (읍/면/동).
    pub eupmyeondong: String,
    /// The full address as formatted by SGIS.
    pub full_address: String,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.sido.is_empty()
            && self.sigungu.is_empty()
            && self.eupmyeondong.is_empty()
            && self.full_address.is_empty()
    }
}

/// The `addr_type` parameter of the SGIS reverse-geocoding endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressType {
    /// Lot-number (지번) address.
    Jibun,
    /// Road-name (도로명) address.
    #[default]
    Road,
    /// Administrative-dong (행정동) address.
    Administrative,
}

impl AddressType {
    pub fn code(&self) -> u8 {
        match self {
            AddressType::Jibun => 10,
            AddressType::Road => 20,
            AddressType::Administrative => 21,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Jibun => write!(f, "jibun"),
            AddressType::Road => write!(f, "road"),
            AddressType::Administrative => write!(f, "administrative"),
        }
    }
}

/// Accepts either the name (`road`) or the SGIS code (`20`).
impl FromStr for AddressType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "10" | "jibun" => Ok(AddressType::Jibun),
            "20" | "road" => Ok(AddressType::Road),
            "21" | "administrative" | "adm" => Ok(AddressType::Administrative),
            other => Err(format!(
                "unknown address type '{}', expected jibun (10), road (20) or administrative (21)",
                other
            )),
        }
    }
}
