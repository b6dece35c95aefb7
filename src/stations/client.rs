use crate::config::KmaConfig;
use crate::stations::error::StationError;
use crate::stations::parser::parse_station_text;
use crate::types::station::Station;
use crate::utils::redact_url;
use log::{debug, info, warn};
use reqwest::{Client, Url};

const STATION_INFO_PATH: &str = "/api/typ01/url/stn_inf.php";
/// Station information for surface (ASOS) stations.
const STATION_KIND: &str = "SFC";
/// `stn=0` selects every station.
const ALL_STATIONS: &str = "0";
/// The API Hub serves Korean text in EUC-KR unless the response says otherwise.
const FALLBACK_CHARSET: &str = "euc-kr";

/// Downloads the KMA surface station list.
pub struct StationClient {
    http: Client,
    config: KmaConfig,
}

impl StationClient {
    pub fn new(http: Client, config: KmaConfig) -> Self {
        Self { http, config }
    }

    /// Builds the request URL for the station list valid at `tm` (`YYYYMMDDHHMM`, KST).
    pub fn request_url(&self, tm: &str) -> Result<Url, StationError> {
        let endpoint = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            STATION_INFO_PATH
        );
        Url::parse_with_params(
            &endpoint,
            &[
                ("inf", STATION_KIND),
                ("stn", ALL_STATIONS),
                ("tm", tm),
                ("help", "0"),
                ("authKey", self.config.auth_key.as_str()),
            ],
        )
        .map_err(|e| StationError::InvalidUrl(endpoint.clone(), e.to_string()))
    }

    /// Fetches and parses all stations valid at `tm`.
    ///
    /// Transport failures and non-success statuses are retried up to
    /// `max_attempts` times, waiting `retry_delay` between attempts. Parse
    /// failures are returned immediately.
    pub async fn fetch(&self, tm: &str) -> Result<Vec<Station>, StationError> {
        let url = self.request_url(tm)?;
        let text = self.fetch_text_with_retry(&url).await?;
        let stations = parse_station_text(&text)?;
        info!("Parsed {} stations valid at {}", stations.len(), tm);
        Ok(stations)
    }

    async fn fetch_text_with_retry(&self, url: &Url) -> Result<String, StationError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_text(url).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < attempts => {
                    warn!(
                        "Station request failed (attempt {}/{}): {}",
                        attempt, attempts, e
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(if attempts == 1 {
                        e
                    } else {
                        StationError::RetriesExhausted {
                            url: redact_url(url),
                            attempts,
                            source: Box::new(e),
                        }
                    });
                }
            }
        }
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, StationError> {
        let shown = redact_url(url);
        debug!("Requesting station list from {}", shown);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| StationError::NetworkRequest(shown.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    StationError::HttpStatus {
                        url: shown,
                        status,
                        source: e,
                    }
                } else {
                    StationError::NetworkRequest(shown, e)
                });
            }
        };

        response
            .text_with_charset(FALLBACK_CHARSET)
            .await
            .map_err(|e| StationError::ResponseBody(shown, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(base_url: &str) -> StationClient {
        let config = KmaConfig::builder()
            .auth_key("test-key")
            .base_url(base_url)
            .max_attempts(1)
            .retry_delay(Duration::from_millis(1))
            .build();
        StationClient::new(Client::new(), config)
    }

    #[test]
    fn request_url_carries_all_query_parameters() {
        let url = client("https://apihub.kma.go.kr/")
            .request_url("202501010900")
            .unwrap();
        assert_eq!(url.path(), "/api/typ01/url/stn_inf.php");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("inf".to_string(), "SFC".to_string()),
                ("stn".to_string(), "0".to_string()),
                ("tm".to_string(), "202501010900".to_string()),
                ("help".to_string(), "0".to_string()),
                ("authKey".to_string(), "test-key".to_string()),
            ]
        );
    }

    #[test]
    fn request_url_keeps_base_path_prefix() {
        let url = client("http://127.0.0.1:9000/kma")
            .request_url("202501010900")
            .unwrap();
        assert_eq!(url.path(), "/kma/api/typ01/url/stn_inf.php");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let err = client("not a url").request_url("202501010900").unwrap_err();
        assert!(matches!(err, StationError::InvalidUrl(_, _)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let err = client("http://127.0.0.1:9")
            .fetch("202501010900")
            .await
            .unwrap_err();
        assert!(matches!(err, StationError::NetworkRequest(_, _)));
        assert!(!err.to_string().contains("test-key"));
    }
}
