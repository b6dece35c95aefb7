//! Uploads files to Azure Data Lake Storage through the Blob service REST API.
//!
//! Two kinds of connection string are understood:
//!
//! * account key: `DefaultEndpointsProtocol=https;AccountName=...;AccountKey=...;EndpointSuffix=core.windows.net`,
//!   requests are signed with Shared Key;
//! * SAS: `BlobEndpoint=https://...;SharedAccessSignature=sv=...`, the token is
//!   appended to every request URL.

use crate::storage::error::StorageError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::{debug, info};
use reqwest::{Client, Url};
use sha2::Sha256;
use std::path::Path;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2021-08-06";
const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const BLOCK_BLOB: &str = "BlockBlob";

#[derive(Clone)]
enum Credentials {
    SharedKey { account: String, key: Vec<u8> },
    Sas(String),
}

/// Blob service client able to PUT whole files as block blobs.
pub struct BlobUploader {
    http: Client,
    endpoint: Url,
    credentials: Credentials,
}

impl BlobUploader {
    /// Parses an Azure storage connection string.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionString`] if the string names neither an
    /// account key nor a SAS token, or lacks the account / endpoint they need,
    /// and [`StorageError::AccountKey`] if the account key is not base64.
    pub fn from_connection_string(http: Client, connection_string: &str) -> Result<Self, StorageError> {
        let mut account = None;
        let mut account_key = None;
        let mut protocol = DEFAULT_PROTOCOL.to_string();
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX.to_string();
        let mut blob_endpoint = None;
        let mut sas = None;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (account keys, SAS tokens) may themselves contain '='.
            let (key, value) = part.split_once('=').ok_or_else(|| {
                StorageError::ConnectionString("expected ';'-separated key=value pairs".to_string())
            })?;
            match key {
                "AccountName" => account = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = value.to_string(),
                "EndpointSuffix" => suffix = value.to_string(),
                "BlobEndpoint" => blob_endpoint = Some(value.to_string()),
                "SharedAccessSignature" => sas = Some(value.to_string()),
                _ => debug!("Ignoring connection string setting '{}'", key),
            }
        }

        let endpoint = match (&blob_endpoint, &account) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(account)) => format!("{}://{}.blob.{}", protocol, account, suffix),
            (None, None) => {
                return Err(StorageError::ConnectionString(
                    "either AccountName or BlobEndpoint is required".to_string(),
                ))
            }
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| StorageError::ConnectionString(format!("bad blob endpoint: {}", e)))?;

        let credentials = match (sas, account, account_key) {
            (Some(sas), _, _) => Credentials::Sas(sas.trim_start_matches('?').to_string()),
            (None, Some(account), Some(key)) => Credentials::SharedKey {
                account,
                key: STANDARD.decode(key.trim()).map_err(StorageError::AccountKey)?,
            },
            (None, None, Some(_)) => {
                return Err(StorageError::ConnectionString(
                    "AccountKey requires AccountName".to_string(),
                ))
            }
            (None, _, None) => {
                return Err(StorageError::ConnectionString(
                    "either AccountKey or SharedAccessSignature is required".to_string(),
                ))
            }
        };

        Ok(Self {
            http,
            endpoint,
            credentials,
        })
    }

    /// URL of `blob` inside `container`, including the SAS token if one is used.
    pub fn blob_url(&self, container: &str, blob: &str) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::BlobUrl(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(container)
            .extend(blob.split('/').filter(|s| !s.is_empty()));
        if let Credentials::Sas(token) = &self.credentials {
            url.set_query(Some(token.as_str()));
        }
        Ok(url)
    }

    /// Uploads a local file, overwriting any existing blob.
    ///
    /// A `blob_path` ending in `/` is treated as a directory and the local file
    /// name is appended. Returns the blob name that was written.
    pub async fn upload_file(
        &self,
        container: &str,
        blob_path: &str,
        local_path: &Path,
    ) -> Result<String, StorageError> {
        let blob = resolve_blob_name(blob_path, local_path);
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::Io(local_path.to_path_buf(), e))?;
        let content_type = content_type_for(local_path);
        self.put_block_blob(container, &blob, body, content_type).await?;
        info!(
            "Uploaded '{}' to '{}/{}'",
            local_path.display(),
            container,
            blob
        );
        Ok(blob)
    }

    async fn put_block_blob(
        &self,
        container: &str,
        blob: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.blob_url(container, blob)?;
        let date = http_date(Utc::now());
        let mut request = self
            .http
            .put(url.clone())
            .header("x-ms-blob-type", BLOCK_BLOB)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header(reqwest::header::CONTENT_TYPE, content_type);

        if let Credentials::SharedKey { account, key } = &self.credentials {
            let headers = [
                ("x-ms-blob-type", BLOCK_BLOB),
                ("x-ms-date", date.as_str()),
                ("x-ms-version", API_VERSION),
            ];
            let resource = format!("/{}{}", account, url.path());
            let to_sign = shared_key_string_to_sign(
                "PUT",
                body.len(),
                content_type,
                &headers,
                &resource,
            );
            let signature = sign(key, &to_sign)?;
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("SharedKey {}:{}", account, signature),
            );
        }

        // The URL may carry a SAS token; report only scheme, host and path.
        let shown = format!("{}{}", url.origin().ascii_serialization(), url.path());
        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::NetworkRequest(shown.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadStatus {
                url: shown,
                status,
                body,
            });
        }
        Ok(())
    }
}

/// Applies the directory convention of [`BlobUploader::upload_file`].
pub fn resolve_blob_name(blob_path: &str, local_path: &Path) -> String {
    let file_name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let trimmed = blob_path.trim_start_matches('/');
    if trimmed.is_empty() {
        file_name
    } else if trimmed.ends_with('/') {
        format!("{}{}", trimmed, file_name)
    } else {
        trimmed.to_string()
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => "text/csv",
        Some(ext) if ext.eq_ignore_ascii_case("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// RFC 1123 date in GMT as required by `x-ms-date`.
fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Builds the Shared Key string-to-sign for a Blob service request
/// (service version 2015-02-21 and later).
fn shared_key_string_to_sign(
    method: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    canonical_resource: &str,
) -> String {
    let content_length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    [
        method,
        "", // Content-Encoding
        "", // Content-Language
        content_length.as_str(),
        "", // Content-MD5
        content_type,
        "", // Date
        "", // If-Modified-Since
        "", // If-Match
        "", // If-None-Match
        "", // If-Unmodified-Since
        "", // Range
    ]
    .join("\n")
        + "\n"
        + &canonical_headers
        + canonical_resource
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String, StorageError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| StorageError::Signing(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    const KEY_CS: &str = "DefaultEndpointsProtocol=https;AccountName=kmadata;AccountKey=c2VjcmV0LWtleQ==;EndpointSuffix=core.windows.net";
    const SAS_CS: &str =
        "BlobEndpoint=https://kmadata.blob.core.windows.net/;SharedAccessSignature=sv=2022-11-02&ss=b&sig=abc%3D";

    #[test]
    fn parses_account_key_connection_string() {
        let uploader = BlobUploader::from_connection_string(Client::new(), KEY_CS).unwrap();
        assert_eq!(uploader.endpoint.as_str(), "https://kmadata.blob.core.windows.net/");
        match &uploader.credentials {
            Credentials::SharedKey { account, key } => {
                assert_eq!(account, "kmadata");
                assert_eq!(key, b"secret-key");
            }
            Credentials::Sas(_) => panic!("expected shared key credentials"),
        }
    }

    #[test]
    fn sas_token_is_appended_to_blob_url() {
        let uploader = BlobUploader::from_connection_string(Client::new(), SAS_CS).unwrap();
        let url = uploader
            .blob_url("datalake", "silver/enriched_weather_stations_202501010900.csv")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://kmadata.blob.core.windows.net/datalake/silver/enriched_weather_stations_202501010900.csv?sv=2022-11-02&ss=b&sig=abc%3D"
        );
    }

    #[test]
    fn rejects_incomplete_connection_strings() {
        for cs in [
            "AccountKey=c2VjcmV0",
            "AccountName=kmadata",
            "AccountName=kmadata;AccountKey=***not base64***",
            "garbage",
        ] {
            assert!(
                BlobUploader::from_connection_string(Client::new(), cs).is_err(),
                "accepted '{}'",
                cs
            );
        }
    }

    #[test]
    fn directory_blob_paths_take_the_file_name() {
        let local = PathBuf::from("/tmp/out/enriched_weather_stations_202501010900.csv");
        assert_eq!(
            resolve_blob_name("silver/", &local),
            "silver/enriched_weather_stations_202501010900.csv"
        );
        assert_eq!(
            resolve_blob_name("/silver/stations.csv", &local),
            "silver/stations.csv"
        );
        assert_eq!(
            resolve_blob_name("", &local),
            "enriched_weather_stations_202501010900.csv"
        );
    }

    #[test]
    fn http_date_is_rfc1123() {
        let date = Utc.with_ymd_and_hms(2025, 1, 6, 9, 3, 7).unwrap();
        assert_eq!(http_date(date), "Mon, 06 Jan 2025 09:03:07 GMT");
    }

    #[test]
    fn string_to_sign_follows_shared_key_layout() {
        let to_sign = shared_key_string_to_sign(
            "PUT",
            11,
            "text/csv",
            &[
                ("x-ms-version", API_VERSION),
                ("x-ms-date", "Mon, 06 Jan 2025 09:03:07 GMT"),
                ("X-MS-Blob-Type", "BlockBlob"),
            ],
            "/kmadata/datalake/silver/a.csv",
        );
        let expected = "PUT\n\n\n11\n\ntext/csv\n\n\n\n\n\n\n\
x-ms-blob-type:BlockBlob\n\
x-ms-date:Mon, 06 Jan 2025 09:03:07 GMT\n\
x-ms-version:2021-08-06\n\
/kmadata/datalake/silver/a.csv";
        assert_eq!(to_sign, expected);
    }

    #[test]
    fn empty_body_leaves_content_length_blank() {
        let to_sign = shared_key_string_to_sign("PUT", 0, "", &[], "/a/b");
        assert!(to_sign.starts_with("PUT\n\n\n\n"));
    }

    #[test]
    fn shared_key_signature_matches_known_vector() {
        let to_sign = shared_key_string_to_sign(
            "PUT",
            11,
            "text/csv",
            &[
                ("x-ms-blob-type", BLOCK_BLOB),
                ("x-ms-date", "Mon, 06 Jan 2025 09:03:07 GMT"),
                ("x-ms-version", API_VERSION),
            ],
            "/kmadata/datalake/silver/a.csv",
        );
        let key = STANDARD.decode("c2VjcmV0LWtleQ==").unwrap();
        assert_eq!(
            sign(&key, &to_sign).unwrap(),
            "ZaYvI7UlEaOQ8IYSRhLQQ9ZRmXGA+a974/gaCmyQuHA="
        );
    }

    #[test]
    fn signature_depends_on_key_and_content() {
        let a = sign(b"key-one", "payload").unwrap();
        let b = sign(b"key-one", "payload").unwrap();
        let c = sign(b"key-two", "payload").unwrap();
        let d = sign(b"key-one", "payload2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(STANDARD.decode(&a).unwrap().len(), 32);
    }
}
