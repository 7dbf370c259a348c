/// S3-compatible object store client
///
/// Speaks plain HTTP with AWS Signature Version 4: header-signed PUT
/// and DELETE for uploads and removal, query-signed GET URLs handed to
/// browsers for downloads. Path-style addressing keeps it compatible
/// with MinIO.
///
/// Signing is split into pure functions of the request parts and a
/// timestamp, so signatures are reproducible in tests without a store.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::env;

use super::{ObjectStore, StorageError};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Object-store connection configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint URL, e.g. `http://localhost:9000`
    pub endpoint: String,

    /// Bucket holding attachment objects
    pub bucket: String,

    /// Signing region (MinIO accepts any; AWS needs the real one)
    pub region: String,

    /// Access key id
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Lifetime of presigned download URLs, in seconds
    pub presign_expiry_seconds: u64,
}

impl S3Config {
    /// Loads the store settings from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            endpoint: env::var("S3_ENDPOINT")
                .map_err(|_| anyhow::anyhow!("S3_ENDPOINT environment variable is required"))?,
            bucket: env::var("S3_BUCKET")
                .map_err(|_| anyhow::anyhow!("S3_BUCKET environment variable is required"))?,
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .map_err(|_| anyhow::anyhow!("S3_ACCESS_KEY environment variable is required"))?,
            secret_key: env::var("S3_SECRET_KEY")
                .map_err(|_| anyhow::anyhow!("S3_SECRET_KEY environment variable is required"))?,
            presign_expiry_seconds: env::var("S3_PRESIGN_EXPIRY_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(900),
        })
    }
}

/// Percent-encodes per RFC 3986 as SigV4 requires
///
/// Unreserved characters pass through; `/` passes through only when
/// encoding a path.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derives the SigV4 signing key for a given day and region
fn signing_key(secret_key: &str, datestamp: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), datestamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// S3-compatible implementation of [`ObjectStore`]
pub struct S3ObjectStore {
    http: reqwest::Client,
    config: S3Config,
}

impl S3ObjectStore {
    pub fn new(config: S3Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Host portion of the endpoint, as signed in the `host` header
    fn host(&self) -> &str {
        self.config
            .endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
    }

    /// Path-style canonical URI: `/{bucket}/{key}`
    fn canonical_path(&self, key: &str) -> String {
        format!(
            "/{}/{}",
            uri_encode(&self.config.bucket, true),
            uri_encode(key, false)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}{}",
            self.config.endpoint.trim_end_matches('/'),
            self.canonical_path(key)
        )
    }

    fn credential_scope(&self, datestamp: &str) -> String {
        format!("{}/{}/{}/aws4_request", datestamp, self.config.region, SERVICE)
    }

    /// Computes the SigV4 signature over a canonical request
    fn sign(&self, canonical_request: &str, amz_date: &str, datestamp: &str) -> String {
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            self.credential_scope(datestamp),
            sha256_hex(canonical_request.as_bytes())
        );

        let key = signing_key(&self.config.secret_key, datestamp, &self.config.region);
        hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()))
    }

    /// Authorization header for a header-signed request
    fn authorization_header(
        &self,
        method: &str,
        key: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> (String, String) {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();

        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            self.host(),
            payload_hash,
            amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method,
            self.canonical_path(key),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let signature = self.sign(&canonical_request, &amz_date, &datestamp);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.config.access_key,
            self.credential_scope(&datestamp),
            signed_headers,
            signature
        );

        (authorization, amz_date)
    }

    /// Builds a query-signed GET URL valid from `now` for the
    /// configured expiry
    pub fn presigned_get_url_at(&self, key: &str, now: DateTime<Utc>) -> String {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();
        let credential = format!("{}/{}", self.config.access_key, self.credential_scope(&datestamp));

        // Canonical query string: keys sorted, everything encoded.
        let params = [
            ("X-Amz-Algorithm", ALGORITHM.to_string()),
            ("X-Amz-Credential", credential),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", self.config.presign_expiry_seconds.to_string()),
            ("X-Amz-SignedHeaders", "host".to_string()),
        ];
        let canonical_query = params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k, true), uri_encode(v, true)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\n{}",
            self.canonical_path(key),
            canonical_query,
            self.host(),
            UNSIGNED_PAYLOAD
        );

        let signature = self.sign(&canonical_request, &amz_date, &datestamp);

        format!(
            "{}?{}&X-Amz-Signature={}",
            self.object_url(key),
            canonical_query,
            signature
        )
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let payload_hash = sha256_hex(&data);
        let (authorization, amz_date) =
            self.authorization_header("PUT", key, &payload_hash, Utc::now());

        let response = self
            .http
            .put(self.object_url(key))
            .header("Authorization", authorization)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, message });
        }

        Ok(())
    }

    async fn presigned_get_url(&self, key: &str) -> Result<String, StorageError> {
        Ok(self.presigned_get_url_at(key, Utc::now()))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let payload_hash = sha256_hex(b"");
        let (authorization, amz_date) =
            self.authorization_header("DELETE", key, &payload_hash, Utc::now());

        let response = self
            .http
            .delete(self.object_url(key))
            .header("Authorization", authorization)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .send()
            .await?;

        // Deleting an already-absent object is not an error for us.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, message });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_store() -> S3ObjectStore {
        S3ObjectStore::new(S3Config {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "teamline-attachments".to_string(),
            region: "us-east-1".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            presign_expiry_seconds: 900,
        })
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_uri_encode_unreserved_passthrough() {
        assert_eq!(uri_encode("abc-XYZ_0.9~", true), "abc-XYZ_0.9~");
    }

    #[test]
    fn test_uri_encode_special_characters() {
        assert_eq!(uri_encode("a b", true), "a%20b");
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
        assert_eq!(uri_encode("a/b", false), "a/b");
        assert_eq!(uri_encode("key=value", true), "key%3Dvalue");
    }

    #[test]
    fn test_host_strips_scheme() {
        assert_eq!(test_store().host(), "localhost:9000");
    }

    #[test]
    fn test_canonical_path_is_path_style() {
        let store = test_store();
        assert_eq!(
            store.canonical_path("uploads/report.pdf"),
            "/teamline-attachments/uploads/report.pdf"
        );
        assert_eq!(
            store.canonical_path("with space.txt"),
            "/teamline-attachments/with%20space.txt"
        );
    }

    #[test]
    fn test_presigned_url_shape() {
        let url = test_store().presigned_get_url_at("uploads/report.pdf", fixed_now());

        assert!(url.starts_with("http://localhost:9000/teamline-attachments/uploads/report.pdf?"));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Date=20250601T120000Z"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("X-Amz-SignedHeaders=host"));
        // Credential scope is percent-encoded into the query.
        assert!(url.contains("X-Amz-Credential=minioadmin%2F20250601%2Fus-east-1%2Fs3%2Faws4_request"));

        let signature = url.rsplit("X-Amz-Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_presigned_url_deterministic_for_fixed_time() {
        let store = test_store();
        let first = store.presigned_get_url_at("k.txt", fixed_now());
        let second = store.presigned_get_url_at("k.txt", fixed_now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_presigned_url_signature_depends_on_key() {
        let store = test_store();
        let a = store.presigned_get_url_at("a.txt", fixed_now());
        let b = store.presigned_get_url_at("b.txt", fixed_now());
        let sig = |url: &str| url.rsplit("X-Amz-Signature=").next().unwrap().to_string();
        assert_ne!(sig(&a), sig(&b));
    }

    #[test]
    fn test_signing_key_changes_with_date() {
        let a = signing_key("secret", "20250601", "us-east-1");
        let b = signing_key("secret", "20250602", "us-east-1");
        assert_ne!(a, b);
    }
}
