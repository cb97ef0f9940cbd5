//! Identity provisioning
//!
//! Each role gets its key material from the command line or, when none is
//! given, from a freshly generated mnemonic. With `--save` both identities
//! are written as keystores (empty passphrase).

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use rollup_rs::{Identity, Role};
use tracing::info;

use crate::error::PocResult;

/// The two parties of a run
#[derive(Debug, Clone)]
pub struct Identities {
    pub requestor: Identity,
    pub provider: Identity,
}

/// Load `role` from `secret` (mnemonic or private key) or generate one
pub fn provision(role: Role, secret: Option<&str>) -> PocResult<Identity> {
    let identity = match secret {
        Some(secret) => Identity::from_secret(role, secret)?,
        None => Identity::generate(role)?,
    };
    info!(
        role = %role,
        address = %identity.address(),
        source = identity.secret().expose().kind(),
        "Identity ready"
    );
    Ok(identity)
}

pub fn provision_all(requestor: Option<&str>, provider: Option<&str>) -> PocResult<Identities> {
    Ok(Identities {
        requestor: provision(Role::Requestor, requestor)?,
        provider: provision(Role::Provider, provider)?,
    })
}

/// Write `requestor.key.json` and `provider.key.json` into `dir`
pub fn save_keystores(identities: &Identities, dir: &Path) -> PocResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create keystore directory {}", dir.display()))?;

    let paths = vec![
        identities.requestor.save_keystore(dir)?,
        identities.provider.save_keystore(dir)?,
    ];
    Ok(paths)
}
