use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use ethers::signers::{
    LocalWallet,
    Signer,
};
use rpassword::prompt_password;
use std::path::{
    Path,
    PathBuf,
};

pub fn resolve_keystore_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn keystore_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Prompts for the keystore password and returns a signer bound to `chain_id`.
pub fn unlock_keystore(path: &Path, chain_id: u64) -> Result<LocalWallet> {
    if !path.is_file() {
        return Err(eyre!("Keystore not found at {}", path.display()));
    }
    let name = keystore_name(path);
    let prompt = format!("Enter password for keystore '{name}': ");
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;

    let secret = decrypt_key(path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for keystore '{name}'"))?;

    let wallet = LocalWallet::from_bytes(&secret)
        .map_err(|e| eyre!("Keystore '{name}' contained unsupported key material: {e}"))?;
    Ok(wallet.with_chain_id(chain_id))
}
