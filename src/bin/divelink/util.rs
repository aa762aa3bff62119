use anyhow::Result;

use divelink::metrics;
use divelink::util::format_unix;
use divelink::{DiveCollection, LastKnownDive};

pub fn last_known(number: Option<u32>, start: Option<i64>) -> Option<LastKnownDive> {
    number.map(|number| LastKnownDive { number, start })
}

/// Flags that make the next download skip what was just imported.
pub fn print_resume_hint(coll: &DiveCollection) {
    if let Some(newest) = coll.newest() {
        match newest.start {
            Some(start) => println!(
                "next time: --last-number {} --last-start {}",
                newest.number, start
            ),
            None => println!("next time: --last-number {}", newest.number),
        }
    }
}

/// Human table, or one JSON object `{ "collection": ..., "newest": ..., "metrics": ... }`.
pub fn print_collection(coll: &DiveCollection, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "collection": coll,
            "newest": coll.newest(),
            "metrics": metrics::snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "driver: {}  model: {}  serial: {}",
        coll.driver,
        coll.model.as_deref().unwrap_or("-"),
        coll.serial.as_deref().unwrap_or("-")
    );
    if let Some(fw) = &coll.firmware {
        println!("firmware: {}", fw);
    }
    println!(
        "{:>6}  {:<19}  {:>8}  {:>7}  {:>6}  {:>7}",
        "#", "start", "duration", "max m", "min C", "samples"
    );
    for d in &coll.dives {
        let temp = d
            .min_temperature_c
            .map(|t| format!("{:.1}", t))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>6}  {:<19}  {:>5}:{:02}  {:>7.1}  {:>6}  {:>7}",
            d.number,
            format_unix(d.start),
            d.duration_secs / 60,
            d.duration_secs % 60,
            d.max_depth_m,
            temp,
            d.samples.len()
        );
    }
    println!("{} dives", coll.len());
    Ok(())
}
