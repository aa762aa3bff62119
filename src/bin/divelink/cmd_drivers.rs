use anyhow::Result;

use divelink::drivers;

pub fn exec(json: bool) -> Result<()> {
    let list = drivers();
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    for d in &list {
        println!("{:<12} {}", d.name, d.description);
        println!("{:<12} keys: {}", "", d.config_keys.join(", "));
    }
    Ok(())
}
