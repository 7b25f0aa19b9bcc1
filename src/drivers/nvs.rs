// CrashGuard - NVS Stores
//
// Preferences and the emergency profile live as JSON strings in one NVS
// namespace, written by the companion provisioning tool. A missing key reads
// as defaults (preferences) or "no profile".

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use crate::config::*;
use crate::store::{ConfigStore, EmergencyProfile, ProfileRecord, ProfileStore};

pub type SharedNvs = Arc<Mutex<EspNvs<NvsDefault>>>;

pub fn open(partition: EspDefaultNvsPartition) -> anyhow::Result<SharedNvs> {
    let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)
        .with_context(|| format!("opening NVS namespace {NVS_NAMESPACE}"))?;
    Ok(Arc::new(Mutex::new(nvs)))
}

fn read_json(nvs: &SharedNvs, key: &str) -> anyhow::Result<Option<String>> {
    let nvs = nvs.lock().map_err(|_| anyhow!("NVS mutex poisoned"))?;
    let mut buf = vec![0u8; NVS_MAX_VALUE_LEN];
    let value = nvs.get_str(key, &mut buf).with_context(|| format!("reading NVS key {key}"))?;
    Ok(value.map(str::to_string))
}

pub struct NvsConfigStore(SharedNvs);

impl NvsConfigStore {
    pub fn new(nvs: SharedNvs) -> Self {
        Self(nvs)
    }

    /// First boot: persist defaults so the provisioning tool has a template.
    pub fn seed_defaults(&self) -> anyhow::Result<()> {
        if read_json(&self.0, NVS_KEY_PREFERENCES)?.is_some() {
            return Ok(());
        }
        let json = Configuration::default().to_json()?;
        let mut nvs = self.0.lock().map_err(|_| anyhow!("NVS mutex poisoned"))?;
        nvs.set_str(NVS_KEY_PREFERENCES, &json)?;
        log::info!("Seeded default preferences");
        Ok(())
    }
}

impl ConfigStore for NvsConfigStore {
    fn load(&self) -> anyhow::Result<Configuration> {
        match read_json(&self.0, NVS_KEY_PREFERENCES)? {
            Some(json) => Ok(Configuration::from_json(&json)?),
            None => Ok(Configuration::default()),
        }
    }
}

pub struct NvsProfileStore(SharedNvs);

impl NvsProfileStore {
    pub fn new(nvs: SharedNvs) -> Self {
        Self(nvs)
    }
}

impl ProfileStore for NvsProfileStore {
    fn load(&self) -> anyhow::Result<Option<EmergencyProfile>> {
        match read_json(&self.0, NVS_KEY_PROFILE)? {
            Some(json) => Ok(Some(ProfileRecord::from_json(&json)?.into())),
            None => Ok(None),
        }
    }
}
