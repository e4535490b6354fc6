use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::Address;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

/// A RedVsBlue contract known to live on one chain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub recorded_at: String,
    pub contract_address: String,
    pub network_url: String,
}

impl DeploymentRecord {
    pub fn new(contract: Address, network_url: impl Into<String>) -> Self {
        Self {
            recorded_at: Utc::now().to_rfc3339(),
            contract_address: format!("{contract:#x}"),
            network_url: network_url.into(),
        }
    }

    pub fn address(&self) -> Result<Address> {
        Address::from_str(&self.contract_address).map_err(|e| {
            eyre!("Invalid contract address '{}': {e}", self.contract_address)
        })
    }

    fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.recorded_at)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }
}

/// Per-chain list of recorded contract addresses:
/// `<root>/<chain_id>/deployments.json`.
#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn open(root: impl AsRef<Path>, chain_id: u64) -> Result<Self> {
        let path = ensure_store(root.as_ref(), chain_id)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    /// Newest record by `recorded_at`; records with unreadable timestamps
    /// sort first.
    pub fn latest(&self) -> Result<Option<DeploymentRecord>> {
        let records = self.load()?;
        Ok(records.into_iter().max_by_key(|record| record.recorded_at()))
    }

    /// Appends `record` unless its address is already known. Returns whether
    /// anything was written.
    pub fn record(&self, record: DeploymentRecord) -> Result<bool> {
        let mut records = self.load()?;
        let known = records.iter().any(|existing| {
            existing
                .contract_address
                .eq_ignore_ascii_case(&record.contract_address)
        });
        if known {
            return Ok(false);
        }
        records.push(record);
        write_records(&self.path, &records)?;
        Ok(true)
    }
}

fn ensure_store(root: &Path, chain_id: u64) -> Result<PathBuf> {
    let chain_dir = root.join(chain_id.to_string());
    if !chain_dir.exists() {
        fs::create_dir_all(&chain_dir).wrap_err_with(|| {
            format!("Failed to create deployments directory {}", chain_dir.display())
        })?;
    }

    let file_path = chain_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"[]").wrap_err_with(|| {
            format!(
                "Failed to initialize deployment record file for chain {chain_id} at {:?}",
                file_path
            )
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}
