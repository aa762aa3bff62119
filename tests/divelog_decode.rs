mod common;

use anyhow::Result;

use divelink::consts::{LOG_BLOCK_LEN, LOG_DATA_END, LOG_DATA_END_LEGACY, LOG_IMAGE_SIZE, LOG_ROW_LEN};
use divelink::divelog::{self, DiveLogVersion, DiveMode, GasMix};
use divelink::error::DecodeError;
use divelink::Dive;

use common::LogImageBuilder;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn erased_image_has_no_dives() -> Result<()> {
    let img = LogImageBuilder::new(5, LOG_DATA_END).seal();
    let decoded = divelog::decode(&img)?;
    assert_eq!(decoded.info.version, DiveLogVersion(5));
    assert_eq!(decoded.info.serial, 0x1A2B_3C4D);
    assert_eq!(decoded.info.firmware, 85);
    assert!(decoded.dives.is_empty());
    Ok(())
}

#[test]
fn size_and_trailer_are_checked_first() {
    assert_eq!(
        divelog::decode(&[0u8; 1024]).unwrap_err(),
        DecodeError::BufferSize {
            expected: LOG_IMAGE_SIZE,
            actual: 1024,
        }
    );

    let mut img = LogImageBuilder::new(5, LOG_DATA_END).seal();
    let t = LOG_IMAGE_SIZE - 0x20;
    img[t + 1] = 0x00;
    assert!(matches!(divelog::decode(&img), Err(DecodeError::UnsupportedLogVersion(_))));

    for raw in [0u8, 2, 6, 9] {
        let img = LogImageBuilder::new(raw, LOG_DATA_END).seal();
        assert!(
            matches!(divelog::decode(&img), Err(DecodeError::UnsupportedLogVersion(_))),
            "raw version {} accepted",
            raw
        );
    }
}

#[test]
fn shared_raw_code_resolves_through_the_marker() -> Result<()> {
    let plain = LogImageBuilder::new(5, LOG_DATA_END).seal();
    assert_eq!(divelog::detect(&plain)?.version, DiveLogVersion(5));

    let marked = LogImageBuilder::new(5, LOG_DATA_END)
        .with_subversion_marker()
        .seal();
    let info = divelog::detect(&marked)?;
    assert_eq!(info.version, DiveLogVersion(6));
    assert_eq!(info.raw_version, 5);

    let legacy = LogImageBuilder::new(3, LOG_DATA_END_LEGACY).seal();
    let v = divelog::detect(&legacy)?.version;
    assert_eq!(v, DiveLogVersion(3));
    assert_eq!(v.data_end(), LOG_DATA_END_LEGACY);
    assert!(!v.has_split_settings());
    Ok(())
}

#[test]
fn single_dive_records_every_ten_seconds() -> Result<()> {
    let mut b = LogImageBuilder::new(5, LOG_DATA_END);
    b.dive(0, 7, 1_700_000_000, 3);
    let img = b.seal();

    let decoded = divelog::decode(&img)?;
    assert_eq!(decoded.dives.len(), 1);
    let d = &decoded.dives[0];
    assert_eq!(d.offset, 0);
    assert_eq!(d.header.number, 7);
    assert_eq!(d.header.start_time, 1_700_000_000);
    assert_eq!(d.header.settings.mode, DiveMode::OpenCircuit);
    assert_eq!(
        d.header.gases,
        vec![GasMix { o2: 21, he: 0 }, GasMix { o2: 50, he: 0 }]
    );
    assert_eq!(d.header.gf_low, 30);
    assert_eq!(d.header.gf_high, 70);
    assert!(d.header.water_density.is_some());

    let times: Vec<u32> = d.records.iter().map(|r| r.time_secs).collect();
    assert_eq!(times, vec![0, 10, 20]);
    assert!(close(d.records[0].depth_m, 1.0));
    assert!(close(d.records[2].depth_m, 3.0));
    assert!(close(d.records[1].temperature_c, 18.0));
    assert!(d.records[0].tank_pressure_bar.is_some());

    assert_eq!(d.footer.number, 7);
    assert!(close(d.footer.max_depth_m, 3.0));
    assert_eq!(d.footer.duration_secs, 30);
    assert!(close(d.footer.min_temperature_c, 12.5));
    Ok(())
}

#[test]
fn decoding_is_idempotent() -> Result<()> {
    let mut b = LogImageBuilder::new(5, LOG_DATA_END).with_subversion_marker();
    let next = b.dive(0x400, 1, 1_600_000_000, 4);
    b.dive(next, 2, 1_600_010_000, 2);
    let img = b.seal();

    let first = divelog::decode(&img)?;
    let second = divelog::decode(&img)?;
    assert_eq!(first, second);
    assert_eq!(first.dives.len(), 2);
    Ok(())
}

#[test]
fn dive_wrapping_the_data_region_is_contiguous() -> Result<()> {
    let mut b = LogImageBuilder::new(5, LOG_DATA_END);
    let open_at = 0x1EF40;
    // opening fills up to 0x1EFC0; two rows before the wrap, four after
    let after = b.dive(open_at, 42, 1_650_000_000, 6);
    assert_eq!(after, 4 * LOG_ROW_LEN + LOG_BLOCK_LEN);
    let img = b.seal();

    let decoded = divelog::decode(&img)?;
    assert_eq!(decoded.dives.len(), 1, "wrapped dive split or duplicated");
    let d = &decoded.dives[0];
    assert_eq!(d.offset, open_at);
    assert_eq!(d.records.len(), 6);
    let depths: Vec<f64> = d.records.iter().map(|r| r.depth_m).collect();
    for (i, depth) in depths.iter().enumerate() {
        assert!(close(*depth, 1.0 + i as f64), "row {} depth {}", i, depth);
    }
    assert_eq!(d.records.last().map(|r| r.time_secs), Some(50));
    Ok(())
}

#[test]
fn mismatched_closing_block_drops_the_dive() -> Result<()> {
    let mut b = LogImageBuilder::new(4, LOG_DATA_END_LEGACY);
    let next = b.dive(0, 10, 1_500_000_000, 2);
    b.opening(next, 11, 1_500_005_000, 0);
    b.sample(next + LOG_BLOCK_LEN, 50, 200);
    b.closing(next + LOG_BLOCK_LEN + LOG_ROW_LEN, 99, 1_500_005_100, 50, 10);
    let img = b.seal();

    let decoded = divelog::decode(&img)?;
    let numbers: Vec<u16> = decoded.dives.iter().map(|d| d.header.number).collect();
    assert_eq!(numbers, vec![10]);
    Ok(())
}

#[test]
fn zero_rows_inside_a_dive_are_skipped() -> Result<()> {
    let mut b = LogImageBuilder::new(5, LOG_DATA_END);
    b.opening(0, 3, 1_700_000_000, 0);
    b.sample(LOG_BLOCK_LEN, 10, 150);
    b.zero_row(LOG_BLOCK_LEN + LOG_ROW_LEN);
    b.sample(LOG_BLOCK_LEN + 2 * LOG_ROW_LEN, 20, 150);
    b.closing(LOG_BLOCK_LEN + 3 * LOG_ROW_LEN, 3, 1_700_000_020, 20, 20);
    let decoded = divelog::decode(&b.seal())?;

    let times: Vec<u32> = decoded.dives[0].records.iter().map(|r| r.time_secs).collect();
    assert_eq!(times, vec![0, 10]);
    Ok(())
}

#[test]
fn imperial_dives_are_converted() -> Result<()> {
    let mut b = LogImageBuilder::new(4, LOG_DATA_END_LEGACY);
    b.opening(0, 1, 1_700_000_000, 0x80 | 0x40);
    // 33.0 ft, 68.0 F
    b.sample(LOG_BLOCK_LEN, 330, 680);
    b.closing(LOG_BLOCK_LEN + LOG_ROW_LEN, 1, 1_700_000_010, 330, 10);
    let decoded = divelog::decode(&b.seal())?;

    let d = &decoded.dives[0];
    assert!(d.header.settings.imperial);
    assert!(d.header.settings.salt_water);
    assert!(d.header.water_density.is_none(), "no extended fields before v5");
    assert!(close(d.records[0].depth_m, 33.0 * 0.3048));
    assert!(close(d.records[0].temperature_c, 20.0));
    assert!(close(d.footer.max_depth_m, 33.0 * 0.3048));
    assert!(d.records[0].tank_pressure_bar.is_none());
    Ok(())
}

#[test]
fn checksum_is_an_explicit_step() -> Result<()> {
    let mut b = LogImageBuilder::new(5, LOG_DATA_END);
    b.dive(0, 1, 1_700_000_000, 2);
    let mut img = b.seal();
    assert_eq!(divelog::decode_verified(&img)?.dives.len(), 1);

    img[0x1000] ^= 0x01;
    assert!(matches!(
        divelog::decode_verified(&img),
        Err(DecodeError::ChecksumMismatch { .. })
    ));
    // plain decode does not care
    assert_eq!(divelog::decode(&img)?.dives.len(), 1);
    Ok(())
}

#[test]
fn decoded_dives_convert_to_the_common_model() -> Result<()> {
    let mut b = LogImageBuilder::new(5, LOG_DATA_END);
    b.dive(0, 5, 1_700_000_000, 3);
    let decoded = divelog::decode(&b.seal())?;

    let dive = Dive::from(&decoded.dives[0]);
    assert_eq!(dive.number, 5);
    assert_eq!(dive.start, 1_700_000_000);
    assert_eq!(dive.samples.len(), 3);
    assert_eq!(dive.duration_secs, 30);
    assert_eq!(dive.samples[1].ppo2, Some(0.21));
    Ok(())
}
