use crate::pip::PipUpgrade;
use crate::upgrade::upgrade_pip;
use crate::{Pip, RunLog};
use anyhow::{bail, Result};

pub fn execute(pip: &Pip) -> Result<()> {
    match upgrade_pip(pip, &RunLog::disabled())? {
        PipUpgrade::Failed(error) => bail!("Failed to upgrade pip: {error}"),
        PipUpgrade::AlreadyLatest | PipUpgrade::Upgraded => Ok(()),
    }
}
