//! Serde models of the SGIS OpenAPI JSON responses.

use crate::types::address::Address;
use serde::{Deserialize, Deserializer, Serialize};

/// Every SGIS response wraps its payload in the same envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "errCd", default, deserialize_with = "lenient_i64")]
    pub err_cd: i64,
    #[serde(rename = "errMsg", default)]
    pub err_msg: String,
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResult {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    /// Expiry as epoch milliseconds, sent as a string.
    #[serde(rename = "accessTimeout", default, deserialize_with = "lenient_opt_i64")]
    pub access_timeout: Option<i64>,
}

/// One element of the reverse-geocoding `result` array.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ReverseGeocodeEntry {
    pub sido_nm: Option<String>,
    pub sgg_nm: Option<String>,
    pub emdong_nm: Option<String>,
    pub full_addr: Option<String>,
}

impl From<ReverseGeocodeEntry> for Address {
    fn from(entry: ReverseGeocodeEntry) -> Self {
        Address {
            sido: entry.sido_nm.unwrap_or_default(),
            sigungu: entry.sgg_nm.unwrap_or_default(),
            eupmyeondong: entry.emdong_nm.unwrap_or_default(),
            full_address: entry.full_addr.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct GeocodeResultSet {
    pub resultdata: Vec<GeocodeResult>,
}

/// A forward-geocoding match. Coordinates are in the UTM-K (EPSG:5179)
/// system SGIS uses for this endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GeocodeResult {
    pub x: Option<String>,
    pub y: Option<String>,
    pub addr_type: Option<String>,
    pub sido_nm: Option<String>,
    pub sgg_nm: Option<String>,
    pub adm_nm: Option<String>,
    pub road_nm: Option<String>,
    pub bd_main_num: Option<String>,
    pub bd_sub_num: Option<String>,
}

// SGIS sends numeric codes sometimes as numbers and sometimes as strings.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_i64(deserializer)?.unwrap_or_default())
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_envelope() {
        let json = r#"{"id":"API_0101","result":{"accessTimeout":"1490166689318","accessToken":"a1b2"},"errMsg":"Success","errCd":0,"trId":"x"}"#;
        let env: Envelope<AuthResult> = serde_json::from_str(json).unwrap();
        assert_eq!(env.err_cd, 0);
        let result = env.result.unwrap();
        assert_eq!(result.access_token.as_deref(), Some("a1b2"));
        assert_eq!(result.access_timeout, Some(1_490_166_689_318));
    }

    #[test]
    fn parses_error_envelope_with_string_code() {
        let json = r#"{"errMsg":"인증 정보가 존재하지 않습니다","errCd":"-401"}"#;
        let env: Envelope<Vec<ReverseGeocodeEntry>> = serde_json::from_str(json).unwrap();
        assert_eq!(env.err_cd, -401);
        assert!(env.result.is_none());
    }

    #[test]
    fn reverse_entry_maps_to_address_with_blanks() {
        let json = r#"{"result":[{"sido_nm":"강원특별자치도","sgg_nm":"속초시","full_addr":"강원특별자치도 속초시 조양동"}],"errCd":0,"errMsg":"Success"}"#;
        let env: Envelope<Vec<ReverseGeocodeEntry>> = serde_json::from_str(json).unwrap();
        let address: Address = env.result.unwrap().into_iter().next().unwrap().into();
        assert_eq!(address.sido, "강원특별자치도");
        assert_eq!(address.sigungu, "속초시");
        assert_eq!(address.eupmyeondong, "");
        assert_eq!(address.full_address, "강원특별자치도 속초시 조양동");
    }

    #[test]
    fn parses_geocode_result_set() {
        let json = r#"{"result":{"totalcount":"1","pagenum":"0","resultdata":[{"x":"953935.5","y":"1952030.0","addr_type":"3","sido_nm":"서울특별시","sgg_nm":"종로구","adm_nm":"서울특별시 종로구 사직동"}]},"errCd":0}"#;
        let env: Envelope<GeocodeResultSet> = serde_json::from_str(json).unwrap();
        let hits = env.result.unwrap().resultdata;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].x.as_deref(), Some("953935.5"));
        assert_eq!(hits[0].sgg_nm.as_deref(), Some("종로구"));
        assert!(hits[0].road_nm.is_none());
    }
}
