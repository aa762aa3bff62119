use anyhow::{Context, Result};
use std::path::PathBuf;

use divelink::driver::SuuntoDriver;
use divelink::DriverConfig;

use crate::util::print_collection;

pub fn exec(file: PathBuf, clock_offset: i64, json: bool) -> Result<()> {
    let cfg = DriverConfig::default().with_clock_offset(clock_offset);
    let coll = SuuntoDriver::replay_image(&file, &cfg, None)
        .with_context(|| format!("replay {}", file.display()))?;
    print_collection(&coll, json)
}
