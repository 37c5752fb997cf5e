//! License-driven feature enablement.
//!
//! [`LicenseSub`] reads a JSON license file and reports which of a product's
//! features are enabled. It shares nothing with the server and may be called
//! at any point after process start.

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;

/// Feature name to enablement.
pub type FeatureTable = BTreeMap<String, bool>;

/// Read attempts made before giving up on the license file.
pub const DEFAULT_READ_ATTEMPTS: u32 = 5;

/// Pause between read attempts; the file may be mid-write.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

const WAF_FEATURES: &[&str] = &[
    "loadBalancing",
    "sslCertUpload",
    "advancedLogging",
    "manualRuleConfig",
    "ruleException",
];

/// Errors raised while reading licenses.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The file could not be read after every attempt.
    #[error("failed to read license file {path} after {attempts} attempts: {source}")]
    Read {
        /// License file path.
        path: PathBuf,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: io::Error,
    },
    /// The file was not a valid license document.
    #[error("invalid license document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// License document as written by the license server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfo {
    /// Serialized type tag.
    #[serde(default)]
    pub java_class: String,
    /// Individual licenses.
    #[serde(default)]
    pub list: Vec<License>,
}

/// A single license entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// Unique identifier of the licensed appliance.
    #[serde(rename = "UID", default)]
    pub uid: String,
    /// License type, such as `Subscription`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Expiry as seconds since the epoch.
    #[serde(default)]
    pub end: i64,
    /// Start as seconds since the epoch.
    #[serde(default)]
    pub start: i64,
    /// Seat count, `-1` when unlimited.
    #[serde(default = "unlimited_seats")]
    pub seats: i64,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,
    /// License key.
    #[serde(default)]
    pub key: String,
    /// Key format version.
    #[serde(default)]
    pub key_version: i64,
    /// Feature name this license enables.
    pub name: String,
    /// Serialized type tag.
    #[serde(default)]
    pub java_class: String,
    /// Whether the license is currently valid.
    #[serde(default)]
    pub valid: bool,
}

const fn unlimited_seats() -> i64 { -1 }

/// Every known feature of `product`, disabled.
///
/// Unknown products have no features.
#[must_use]
pub fn defaults(product: &str) -> FeatureTable {
    let names: &[&str] = match product {
        "WAF" => WAF_FEATURES,
        _ => &[],
    };
    names.iter().map(|name| ((*name).to_owned(), false)).collect()
}

/// Reads license files for one product.
#[derive(Debug, Clone)]
pub struct LicenseSub {
    license_file: PathBuf,
    product: String,
    attempts: u32,
    retry_delay: Duration,
}

impl LicenseSub {
    /// Create a reader for `product` backed by `license_file`.
    #[must_use]
    pub fn new(license_file: impl Into<PathBuf>, product: impl Into<String>) -> Self {
        let sub = Self {
            license_file: license_file.into(),
            product: product.into(),
            attempts: DEFAULT_READ_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        };
        info!("starting license reader: product={}", sub.product);
        sub
    }

    /// Override how often and how patiently the file is read.
    #[must_use]
    pub fn with_retry(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Product this reader reports on.
    #[must_use]
    pub fn product(&self) -> &str { &self.product }

    /// License file path.
    #[must_use]
    pub fn license_file(&self) -> &Path { &self.license_file }

    /// The product's features, all disabled. Use as a fallback on error.
    #[must_use]
    pub fn defaults(&self) -> FeatureTable { defaults(&self.product) }

    /// Read the license file and report each feature's enablement.
    ///
    /// Features without a license stay disabled. Licenses naming unknown
    /// features are logged and ignored.
    ///
    /// No table accompanies an error; use [`features`](Self::features) to
    /// get the all-disabled [`defaults`](Self::defaults) instead.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Read`] if the file cannot be read within the
    /// configured attempts, or [`LicenseError::Parse`] if it is not valid
    /// license JSON.
    pub async fn get_licenses(&self) -> Result<FeatureTable, LicenseError> {
        let bytes = self.read_with_retry().await?;
        let info: LicenseInfo = serde_json::from_slice(&bytes)?;
        Ok(self.enabled_features(&info.list))
    }

    /// Like [`get_licenses`](Self::get_licenses), but logs a failure and
    /// reports every feature disabled.
    pub async fn features(&self) -> FeatureTable {
        match self.get_licenses().await {
            Ok(features) => features,
            Err(e) => {
                warn!("falling back to default features: product={}, error={e}", self.product);
                self.defaults()
            }
        }
    }

    async fn read_with_retry(&self) -> Result<Vec<u8>, LicenseError> {
        let mut attempt = 1;
        loop {
            match tokio::fs::read(&self.license_file).await {
                Ok(bytes) => return Ok(bytes),
                Err(source) if attempt >= self.attempts => {
                    return Err(LicenseError::Read {
                        path: self.license_file.clone(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(_) => {
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    fn enabled_features(&self, licenses: &[License]) -> FeatureTable {
        let mut features = self.defaults();
        for license in licenses {
            match features.get_mut(&license.name) {
                Some(enabled) => *enabled = license.valid,
                None => warn!("saw an unknown license name: name={}", license.name),
            }
        }
        features
    }
}
