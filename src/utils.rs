use chrono::{DateTime, TimeDelta, Utc};
use log::info;
use reqwest::Url;
use std::io;
use std::path::Path;

/// Query parameters whose values never appear in logs or error messages.
const SECRET_PARAMS: &[&str] = &["authKey", "consumer_key", "consumer_secret", "accessToken"];

const KST_OFFSET_HOURS: i64 = 9;

/// Formats `now` as the `YYYYMMDDHHMM` timestamp the KMA API expects, in KST.
pub fn kst_timestamp(now: DateTime<Utc>) -> String {
    (now.naive_utc() + TimeDelta::hours(KST_OFFSET_HOURS))
        .format("%Y%m%d%H%M")
        .to_string()
}

/// Returns `url` as a string with secret query values replaced by `***`.
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if SECRET_PARAMS.contains(&k.as_ref()) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    if pairs.is_empty() {
        return redacted.to_string();
    }
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

pub async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating output directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kst_timestamp_is_nine_hours_ahead() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 18, 5, 0).unwrap();
        assert_eq!(kst_timestamp(now), "202504010305");
    }

    #[test]
    fn redact_url_hides_secrets() {
        let url = Url::parse(
            "https://apihub.kma.go.kr/api/typ01/url/stn_inf.php?inf=SFC&stn=0&authKey=abc123",
        )
        .unwrap();
        let redacted = redact_url(&url);
        assert!(redacted.contains("inf=SFC"));
        assert!(redacted.contains("authKey=***"));
        assert!(!redacted.contains("abc123"));
    }

    #[tokio::test]
    async fn ensure_dir_exists_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_dir_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
        // second call is a no-op
        ensure_dir_exists(&nested).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_dir_exists_rejects_files() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert!(ensure_dir_exists(tmp.path()).await.is_err());
    }
}
