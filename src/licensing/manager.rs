use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{machine::machine_id, sha256_hex};

pub const LICENSE_FILE_NAME: &str = "license.json";
pub const LICENSE_TYPE_PROMO: &str = "promo_code";

/// License document as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseData {
    #[serde(default)]
    pub licensed: bool,
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
    /// Keeps the offset it was written with, so reading it back in another time zone
    /// serializes to the same text.
    #[serde(default)]
    pub activated_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl LicenseData {
    pub fn calculate_checksum(&self) -> Result<String> {
        document_checksum(serde_json::to_value(self)?)
    }
}

/// SHA-256 over the key-sorted json of every field except the checksum.
///
/// Verification runs on the document as read, so field values are hashed exactly as
/// they were written.
pub fn document_checksum(mut document: Value) -> Result<String> {
    if let Value::Object(map) = &mut document {
        map.remove("checksum");
    }
    // serde_json maps are ordered by key
    Ok(sha256_hex(serde_json::to_string(&document)?))
}

/// What `license status` shows.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseInfo {
    pub licensed: bool,
    pub license_type: Option<String>,
    pub activated_at: Option<DateTime<Local>>,
}

/// Owns the license file. Created once at startup and passed to whoever needs to check it.
pub struct LicenseManager {
    path: PathBuf,
    machine_id: String,
    promo_code_hashes: Vec<String>,
    data: LicenseData,
}

impl LicenseManager {
    /// Loads the license bound to this machine.
    pub fn load(app_dir: &Path, promo_code_hashes: Vec<String>) -> Self {
        Self::with_machine_id(app_dir.join(LICENSE_FILE_NAME), machine_id(), promo_code_hashes)
    }

    pub fn with_machine_id(path: PathBuf, machine_id: String, promo_code_hashes: Vec<String>) -> Self {
        let data = read_license(&path, &machine_id);
        Self {
            path,
            machine_id,
            promo_code_hashes: promo_code_hashes
                .into_iter()
                .map(|v| v.trim().to_lowercase())
                .collect(),
            data,
        }
    }

    pub fn is_licensed(&self) -> bool {
        self.data.licensed
    }

    pub fn info(&self) -> LicenseInfo {
        LicenseInfo {
            licensed: self.data.licensed,
            license_type: self.data.license_type.clone(),
            activated_at: self.data.activated_at.map(|v| v.with_timezone(&Local)),
        }
    }

    /// Activates the license when the digest of `code` is among the accepted ones.
    pub fn activate_with_promo(&mut self, code: &str) -> Result<()> {
        let code = code.trim();
        if code.is_empty() {
            bail!("Promo code is empty");
        }
        let digest = sha256_hex(code.to_uppercase());
        if !self.promo_code_hashes.contains(&digest) {
            bail!("Promo code {code} is not valid");
        }

        self.data = LicenseData {
            licensed: true,
            license_type: Some(LICENSE_TYPE_PROMO.into()),
            promo_code: Some(code.to_uppercase()),
            activated_at: Some(Local::now().into()),
            machine_id: Some(self.machine_id.clone()),
            checksum: None,
        };
        self.save()?;
        info!("License activated via promo code");
        Ok(())
    }

    /// Resets to the unlicensed state.
    pub fn revoke(&mut self) -> Result<()> {
        self.data = LicenseData::default();
        self.save()?;
        info!("License revoked");
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.data.checksum = Some(self.data.calculate_checksum()?);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write license {}", self.path.display()))?;
        debug!("Saved license data to {}", self.path.display());
        Ok(())
    }
}

/// Reads and verifies the license. Anything suspicious yields the unlicensed default.
fn read_license(path: &Path, machine_id: &str) -> LicenseData {
    let contents = match std::fs::read_to_string(path) {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LicenseData::default(),
        Err(e) => {
            warn!("Failed to read license {}: {e:?}", path.display());
            return LicenseData::default();
        }
    };
    let parsed = serde_json::from_str::<Value>(&contents).and_then(|document| {
        let data = LicenseData::deserialize(&document)?;
        Ok((document, data))
    });
    let (document, data) = match parsed {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse license {}: {e:?}", path.display());
            return LicenseData::default();
        }
    };
    match verify(document, &data, machine_id) {
        Ok(()) => {
            debug!("Loaded license data: licensed={}", data.licensed);
            data
        }
        Err(reason) => {
            warn!("{reason}, treating as unlicensed");
            LicenseData::default()
        }
    }
}

fn verify(document: Value, data: &LicenseData, machine_id: &str) -> Result<(), &'static str> {
    let Some(stored) = data.checksum.as_deref().filter(|v| !v.is_empty()) else {
        return if data.licensed {
            Err("License file missing checksum")
        } else {
            Ok(())
        };
    };
    match document_checksum(document) {
        Ok(calculated) if calculated == stored => (),
        _ => return Err("License checksum mismatch"),
    }
    match data.machine_id.as_deref() {
        Some(stored) if stored != machine_id => Err("License was activated on another machine"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Local};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use crate::licensing::sha256_hex;

    use super::{
        document_checksum, LicenseData, LicenseManager, LICENSE_FILE_NAME, LICENSE_TYPE_PROMO,
    };

    const MACHINE: &str = "0123456789abcdef0123456789abcdef";

    fn manager(dir: &std::path::Path, machine: &str) -> LicenseManager {
        LicenseManager::with_machine_id(
            dir.join(LICENSE_FILE_NAME),
            machine.into(),
            vec![sha256_hex("FOCUS2025")],
        )
    }

    #[test]
    fn test_missing_file_is_unlicensed() -> Result<()> {
        let dir = tempdir()?;
        let manager = manager(dir.path(), MACHINE);
        assert!(!manager.is_licensed());
        assert_eq!(manager.info().license_type, None);
        Ok(())
    }

    #[test]
    fn test_activate_and_reload() -> Result<()> {
        let dir = tempdir()?;
        let mut first = manager(dir.path(), MACHINE);
        first.activate_with_promo(" focus2025 ")?;
        assert!(first.is_licensed());

        let reloaded = manager(dir.path(), MACHINE);
        assert!(reloaded.is_licensed());
        let info = reloaded.info();
        assert_eq!(info.license_type.as_deref(), Some(LICENSE_TYPE_PROMO));
        assert!(info.activated_at.is_some());
        Ok(())
    }

    #[test]
    fn test_invalid_promo_code() -> Result<()> {
        let dir = tempdir()?;
        let mut manager = manager(dir.path(), MACHINE);
        assert!(manager.activate_with_promo("WRONG").is_err());
        assert!(manager.activate_with_promo("   ").is_err());
        assert!(!manager.is_licensed());
        assert!(!dir.path().join(LICENSE_FILE_NAME).exists());
        Ok(())
    }

    #[test]
    fn test_tampered_license_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        manager(dir.path(), MACHINE).activate_with_promo("FOCUS2025")?;

        let path = dir.path().join(LICENSE_FILE_NAME);
        let mut document: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        document["license_type"] = "lifetime".into();
        std::fs::write(&path, serde_json::to_string(&document)?)?;

        assert!(!manager(dir.path(), MACHINE).is_licensed());
        Ok(())
    }

    #[test]
    fn test_missing_checksum_on_licensed_file() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join(LICENSE_FILE_NAME),
            r#"{"licensed": true, "license_type": "promo_code"}"#,
        )?;
        assert!(!manager(dir.path(), MACHINE).is_licensed());
        Ok(())
    }

    #[test]
    fn test_license_from_another_machine() -> Result<()> {
        let dir = tempdir()?;
        manager(dir.path(), MACHINE).activate_with_promo("FOCUS2025")?;
        assert!(!manager(dir.path(), "ffffffffffffffffffffffffffffffff").is_licensed());
        Ok(())
    }

    #[test]
    fn test_revoke() -> Result<()> {
        let dir = tempdir()?;
        let mut manager_a = manager(dir.path(), MACHINE);
        manager_a.activate_with_promo("FOCUS2025")?;
        manager_a.revoke()?;
        assert!(!manager_a.is_licensed());
        assert!(!manager(dir.path(), MACHINE).is_licensed());
        Ok(())
    }

    fn write_signed(dir: &std::path::Path, mut document: Value) -> Result<()> {
        document["checksum"] = document_checksum(document.clone())?.into();
        std::fs::write(
            dir.join(LICENSE_FILE_NAME),
            serde_json::to_string_pretty(&document)?,
        )?;
        Ok(())
    }

    #[test]
    fn test_license_written_in_another_time_zone() -> Result<()> {
        for activated_at in [
            "2026-10-19T01:05:14.273427013Z",
            "2026-10-19T10:05:14.273427013+09:00",
            "2026-10-18T21:05:14-04:00",
        ] {
            let dir = tempdir()?;
            write_signed(
                dir.path(),
                json!({
                    "licensed": true,
                    "license_type": LICENSE_TYPE_PROMO,
                    "promo_code": "FOCUS2025",
                    "activated_at": activated_at,
                    "machine_id": MACHINE,
                }),
            )?;

            let manager = manager(dir.path(), MACHINE);
            assert!(manager.is_licensed(), "{activated_at} was rejected");
            let expected = DateTime::parse_from_rfc3339(activated_at)?;
            assert_eq!(manager.info().activated_at, Some(expected.with_timezone(&Local)));
        }
        Ok(())
    }

    #[test]
    fn test_activation_time_keeps_its_offset() -> Result<()> {
        let dir = tempdir()?;
        let mut data = LicenseData {
            licensed: true,
            license_type: Some(LICENSE_TYPE_PROMO.into()),
            promo_code: Some("FOCUS2025".into()),
            activated_at: Some(DateTime::parse_from_rfc3339("2026-10-19T10:05:14+09:00")?),
            machine_id: Some(MACHINE.into()),
            checksum: None,
        };
        data.checksum = Some(data.calculate_checksum()?);
        std::fs::write(
            dir.path().join(LICENSE_FILE_NAME),
            serde_json::to_string(&data)?,
        )?;

        let contents = std::fs::read_to_string(dir.path().join(LICENSE_FILE_NAME))?;
        assert!(contents.contains("+09:00"));
        assert!(manager(dir.path(), MACHINE).is_licensed());
        Ok(())
    }

    #[test]
    fn test_garbage_file_is_unlicensed() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(LICENSE_FILE_NAME), "not json")?;
        assert!(!manager(dir.path(), MACHINE).is_licensed());
        Ok(())
    }
}
