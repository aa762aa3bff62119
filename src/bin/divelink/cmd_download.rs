use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use divelink::{driver_by_name, DriverConfig, LogStatus, StatusSink};

use crate::cli::DownloadArgs;
use crate::util::{last_known, print_collection, print_resume_hint};

pub fn exec(args: DownloadArgs) -> Result<()> {
    let mut driver = driver_by_name(&args.driver)
        .ok_or_else(|| anyhow!("unknown driver '{}' (see `divelink drivers`)", args.driver))?;

    // env first, flags override
    let mut cfg = DriverConfig::from_env();
    if let Some(p) = &args.port {
        cfg = cfg.with_port(p.display().to_string());
    }
    if let Some(m) = args.model {
        cfg = cfg.with_model(m);
    }
    if args.all {
        cfg = cfg.with_download_all(true);
    }
    if let Some(off) = args.clock_offset {
        cfg = cfg.with_clock_offset(off);
    }
    if let Some(d) = args.dump {
        cfg = cfg.with_dump_path(d);
    }

    driver
        .initialize(&cfg)
        .with_context(|| format!("initialize {}", driver.name()))?;

    let status: Arc<dyn StatusSink> = Arc::new(LogStatus::new().with_byte_trace(args.trace_bytes));
    let last = last_known(args.last_number, args.last_start);
    let coll = driver
        .transfer(status, last.as_ref())
        .with_context(|| format!("download from {}", cfg.port.as_deref().unwrap_or("?")))?;

    print_collection(&coll, args.json)?;
    if !args.json {
        print_resume_hint(&coll);
    }
    Ok(())
}
