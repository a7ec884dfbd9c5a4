use crate::upgrade::list_outdated;
use crate::{Pip, RunLog};
use anyhow::Result;

pub fn execute(pip: &Pip) -> Result<()> {
    list_outdated(pip, &RunLog::disabled())?;
    Ok(())
}
