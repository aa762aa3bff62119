use anyhow::{Context, Result};
use std::path::PathBuf;

use divelink::divelog;
use divelink::{Dive, DiveCollection};

use crate::util::print_collection;

pub fn exec(file: PathBuf, verify: bool, json: bool) -> Result<()> {
    let buf = std::fs::read(&file).with_context(|| format!("read {}", file.display()))?;
    let decoded = if verify {
        divelog::decode_verified(&buf)
    } else {
        divelog::decode(&buf)
    }
    .with_context(|| format!("decode {}", file.display()))?;

    let mut coll = DiveCollection::new("shearwater");
    coll.serial = Some(format!("{:08X}", decoded.info.serial));
    coll.firmware = Some(decoded.info.firmware.to_string());
    coll.dives = decoded.dives.iter().map(Dive::from).collect();

    if !json {
        println!(
            "log version {} (raw {}), product {:#04x}",
            decoded.info.version.0, decoded.info.raw_version, decoded.info.product
        );
    }
    print_collection(&coll, json)
}
