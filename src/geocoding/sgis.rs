//! Client for the SGIS (Statistics Korea) geocoding OpenAPI.
//!
//! SGIS requires a short-lived access token obtained from a consumer key and
//! secret. [`SgisClient`] fetches the token lazily, renews it once it reaches the
//! timeout SGIS reported, and re-authenticates once if a request is rejected
//! with the invalid-token code.

use crate::config::SgisConfig;
use crate::geocoding::error::GeocodeError;
use crate::geocoding::response::{
    AuthResult, Envelope, GeocodeResult, GeocodeResultSet, ReverseGeocodeEntry,
};
use crate::types::address::{Address, AddressType};
use crate::types::station::Location;
use crate::utils::redact_url;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

const AUTH_PATH: &str = "/OpenAPI3/auth/authentication.json";
const REVERSE_GEOCODE_PATH: &str = "/OpenAPI3/addr/rgeocodewgs84.json";
const GEOCODE_PATH: &str = "/OpenAPI3/addr/geocode.json";

const CODE_SUCCESS: i64 = 0;
const CODE_NO_RESULT: i64 = -100;
pub(crate) const CODE_INVALID_TOKEN: i64 = -401;

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    /// Epoch milliseconds after which SGIS no longer accepts the token.
    expires_at_ms: Option<i64>,
}

impl AccessToken {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|expiry| now_ms >= expiry)
    }
}

pub struct SgisClient {
    http: Client,
    config: SgisConfig,
    token: Mutex<Option<AccessToken>>,
}

impl SgisClient {
    pub fn new(http: Client, config: SgisConfig) -> Self {
        Self {
            http,
            config,
            token: Mutex::new(None),
        }
    }

    /// Requests a fresh access token and stores it for subsequent calls.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Authentication`] when SGIS rejects the consumer
    /// credentials and [`GeocodeError::MissingToken`] when the response has no token.
    pub async fn authenticate(&self) -> Result<(), GeocodeError> {
        let token = self.request_token().await?;
        *self.token.lock().await = Some(token);
        Ok(())
    }

    /// Resolves a WGS84 coordinate pair into an administrative address.
    ///
    /// The first match SGIS returns is used.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::NoResult`] if SGIS has no address for the
    /// location, [`GeocodeError::Api`] for other SGIS error codes, and the
    /// transport variants for network and decoding failures.
    pub async fn reverse_geocode(
        &self,
        location: Location,
        address_type: AddressType,
    ) -> Result<Address, GeocodeError> {
        let params = [
            ("x_coor", location.longitude.to_string()),
            ("y_coor", location.latitude.to_string()),
            ("addr_type", address_type.code().to_string()),
        ];
        let no_result = || GeocodeError::NoResult {
            longitude: location.longitude,
            latitude: location.latitude,
        };

        let entries: Option<Vec<ReverseGeocodeEntry>> =
            match self.call(REVERSE_GEOCODE_PATH, &params).await {
                Err(GeocodeError::Api { code, .. }) if code == CODE_NO_RESULT => {
                    return Err(no_result())
                }
                other => other?,
            };

        entries
            .and_then(|entries| entries.into_iter().next())
            .map(Address::from)
            .ok_or_else(no_result)
    }

    /// Looks up coordinates for a free-form address.
    ///
    /// `page` is zero-based; `count` is the page size. An address SGIS cannot
    /// match yields an empty vector.
    pub async fn geocode(
        &self,
        address: &str,
        page: u32,
        count: u32,
    ) -> Result<Vec<GeocodeResult>, GeocodeError> {
        let params = [
            ("address", address.to_string()),
            ("pagenum", page.to_string()),
            ("resultcount", count.to_string()),
        ];
        match self.call::<GeocodeResultSet>(GEOCODE_PATH, &params).await {
            Ok(set) => Ok(set.map(|s| s.resultdata).unwrap_or_default()),
            Err(GeocodeError::Api { code, .. }) if code == CODE_NO_RESULT => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Calls an authenticated endpoint, re-authenticating once if the token is rejected.
    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, GeocodeError> {
        let mut renewed = false;
        loop {
            let token = self.current_token(renewed).await?;
            let mut query: Vec<(&str, &str)> = vec![("accessToken", token.value.as_str())];
            query.extend(params.iter().map(|(k, v)| (*k, v.as_str())));

            let url = self.endpoint(path, &query)?;
            let envelope: Envelope<T> = self.get_json(&url).await?;
            match envelope.err_cd {
                CODE_SUCCESS => return Ok(envelope.result),
                CODE_INVALID_TOKEN if !renewed => {
                    warn!("SGIS rejected the access token, re-authenticating");
                    renewed = true;
                }
                code => {
                    return Err(GeocodeError::Api {
                        code,
                        message: envelope.err_msg,
                    })
                }
            }
        }
    }

    /// Returns the cached token, requesting a new one when there is none,
    /// it has expired, or `force_renew` is set.
    async fn current_token(&self, force_renew: bool) -> Result<AccessToken, GeocodeError> {
        let mut guard = self.token.lock().await;
        let now_ms = Utc::now().timestamp_millis();
        match guard.as_ref() {
            Some(token) if !force_renew && !token.is_expired(now_ms) => Ok(token.clone()),
            _ => {
                let token = self.request_token().await?;
                *guard = Some(token.clone());
                Ok(token)
            }
        }
    }

    async fn request_token(&self) -> Result<AccessToken, GeocodeError> {
        let url = self.endpoint(
            AUTH_PATH,
            &[
                ("consumer_key", self.config.consumer_key.as_str()),
                ("consumer_secret", self.config.consumer_secret.as_str()),
            ],
        )?;
        let envelope: Envelope<AuthResult> = self.get_json(&url).await?;
        if envelope.err_cd != CODE_SUCCESS {
            return Err(GeocodeError::Authentication {
                code: envelope.err_cd,
                message: envelope.err_msg,
            });
        }
        let result = envelope.result.ok_or(GeocodeError::MissingToken)?;
        let value = result
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(GeocodeError::MissingToken)?;
        info!("Obtained SGIS access token");
        Ok(AccessToken {
            value,
            expires_at_ms: result.access_timeout,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, GeocodeError> {
        let endpoint = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        Url::parse_with_params(&endpoint, query)
            .map_err(|e| GeocodeError::InvalidUrl(endpoint.clone(), e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, GeocodeError> {
        let shown = redact_url(url);
        debug!("GET {}", shown);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| GeocodeError::NetworkRequest(shown.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    GeocodeError::HttpStatus {
                        url: shown,
                        status,
                        source: e,
                    }
                } else {
                    GeocodeError::NetworkRequest(shown, e)
                });
            }
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| GeocodeError::NetworkRequest(shown.clone(), e))?;
        serde_json::from_slice(&body).map_err(|source| GeocodeError::JsonParse {
            url: shown,
            source,
        })
    }
}
