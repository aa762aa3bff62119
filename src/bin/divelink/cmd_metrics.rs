use anyhow::Result;

use divelink::metrics;

pub fn exec() -> Result<()> {
    let m = metrics::snapshot();
    println!("{}", serde_json::to_string_pretty(&m)?);
    Ok(())
}
