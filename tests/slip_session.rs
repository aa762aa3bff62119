mod common;

use anyhow::Result;

use divelink::consts::{SW_DEVICE_ADDR, SW_HOST_ADDR};
use divelink::error::DeviceError;
use divelink::link::{
    LinkEnvelope, NegativeCode, Request, RequestResponseSession, Response, ResponseKind,
};
use divelink::slip::{self, SlipError, END, ESC};

use common::{device_frame, Reply, ScriptedStream, SlipDevice};

#[test]
fn slip_roundtrip_random_frames() -> Result<()> {
    let mut rng = oorandom::Rand64::new(1055);
    for _ in 0..300 {
        let len = 1 + rng.rand_range(0..64) as usize;
        // bias toward the reserved bytes
        let frame: Vec<u8> = (0..len)
            .map(|_| match rng.rand_range(0..4) {
                0 => END,
                1 => ESC,
                _ => rng.rand_u64() as u8,
            })
            .collect();
        let wire = slip::encode(&frame);
        assert_eq!(wire.iter().filter(|&&b| b == END).count(), 1);
        let d = slip::decode_frame(&wire)?.expect("complete frame");
        assert_eq!(d.frame, frame);
        assert_eq!(d.consumed, wire.len());
    }
    Ok(())
}

#[test]
fn slip_partial_input_is_not_a_frame() {
    let wire = slip::encode(&[0x10, END, 0x20]);
    for cut in 0..wire.len() {
        match slip::decode_frame(&wire[..cut]) {
            Ok(None) => {}
            Err(e) => assert!(e.is_partial(), "cut {}: {}", cut, e),
            Ok(Some(d)) => panic!("cut {} produced {:?}", cut, d),
        }
    }
    assert_eq!(
        slip::decode_frame(&[0x01, ESC]),
        Err(SlipError::TruncatedEscape(1))
    );
    assert_eq!(
        slip::decode_frame(&[0x01, ESC, 0x05, END]),
        Err(SlipError::InvalidEscape(2, 0x05))
    );
}

#[test]
fn slip_leading_delimiters_are_skipped_and_rest_stays_buffered() -> Result<()> {
    let mut buf = vec![END, END];
    buf.extend(slip::encode(&[1, 2]));
    buf.extend(slip::encode(&[3]));
    let d = slip::decode_frame(&buf)?.expect("first frame");
    assert_eq!(d.frame, vec![1, 2]);
    assert_eq!(slip::decode(&buf[d.consumed..])?, Some(vec![3]));
    Ok(())
}

#[test]
fn envelope_length_byte_is_checked() -> Result<()> {
    let env = LinkEnvelope::new(SW_HOST_ADDR, SW_DEVICE_ADDR, 0, vec![0x22, 0x80, 0x10]);
    let mut bytes = env.encode()?;
    assert_eq!(bytes[..4], [SW_HOST_ADDR, SW_DEVICE_ADDR, 4, 0]);
    assert_eq!(LinkEnvelope::decode(&bytes)?, env);

    bytes[2] = 9;
    assert!(matches!(LinkEnvelope::decode(&bytes), Err(DeviceError::MalformedFrame(_))));
    assert!(LinkEnvelope::new(0, 0, 0, vec![0; 255]).encode().is_err());
    Ok(())
}

#[test]
fn exchange_reassembles_frames_split_across_reads() -> Result<()> {
    let dev = SlipDevice::new(Box::new(|req: &[u8]| {
        assert_eq!(req, &[0x22, 0x80, 0x10]);
        // serial with reserved bytes inside, to force escapes
        vec![Reply::Message(vec![0x62, 0x80, 0x10, b'A', END, ESC, b'Z'])]
    }))
    .with_chunk(1);
    let log = dev.log.clone();

    let mut s = RequestResponseSession::new(dev);
    let resp = s.request(&Request::ReadIdentifier { id: 0x8010 }, &[ResponseKind::Identifier])?;
    assert_eq!(
        resp,
        Response::Identifier {
            id: 0x8010,
            data: vec![b'A', END, ESC, b'Z'],
        }
    );
    assert_eq!(log.lock().unwrap().requests.len(), 1);
    Ok(())
}

#[test]
fn negative_response_is_surfaced_or_returned() -> Result<()> {
    let handler = || -> common::MessageHandler {
        Box::new(|_: &[u8]| vec![Reply::Message(vec![0x7F, 0x35, 0x70])])
    };
    let req = Request::RequestUpload {
        address: 0xDD00_0000,
        size: 0x100,
    };

    let mut s = RequestResponseSession::new(SlipDevice::new(handler()));
    let err = s.request(&req, &[ResponseKind::UploadAccepted]).unwrap_err();
    assert!(matches!(err, DeviceError::UnsupportedDeviceResponse(_)), "{err}");

    let mut s = RequestResponseSession::new(SlipDevice::new(handler()));
    let resp = s.request(&req, &[ResponseKind::UploadAccepted, ResponseKind::Negative])?;
    assert_eq!(
        resp,
        Response::Negative {
            service: 0x35,
            code: NegativeCode(0x70),
        }
    );
    Ok(())
}

#[test]
fn malformed_frame_is_retried() -> Result<()> {
    let mut first = true;
    let dev = SlipDevice::new(Box::new(move |_: &[u8]| {
        if std::mem::take(&mut first) {
            // envelope length byte says 9, carries 1
            vec![Reply::Raw(slip::encode(&[SW_DEVICE_ADDR, SW_HOST_ADDR, 9, 0, 0x77]))]
        } else {
            vec![Reply::Message(vec![0x77])]
        }
    }));
    let log = dev.log.clone();

    let mut s = RequestResponseSession::new(dev);
    assert_eq!(
        s.request(&Request::TransferExit, &[ResponseKind::TransferExit])?,
        Response::TransferExit
    );
    assert_eq!(log.lock().unwrap().requests.len(), 2);
    Ok(())
}

#[test]
fn silence_ends_in_timeout() {
    let stream = ScriptedStream::new(&[]);
    let out = stream.output.clone();
    let mut s = RequestResponseSession::new(stream)
        .with_attempts(2)
        .with_idle_retries(3);

    let err = s
        .request(&Request::TransferExit, &[ResponseKind::TransferExit])
        .unwrap_err();
    assert!(matches!(err, DeviceError::CommunicationTimeout { .. }), "{err}");

    let wire = out.lock().unwrap().clone();
    assert_eq!(wire.iter().filter(|&&b| b == END).count(), 2, "one write per attempt");
}

#[test]
fn unexpected_response_kind_is_rejected() {
    let stream = ScriptedStream::new(&device_frame(&[0x77])).with_chunk(3);
    let mut s = RequestResponseSession::new(stream);
    let err = s
        .request(&Request::TransferData { counter: 1 }, &[ResponseKind::TransferData])
        .unwrap_err();
    assert!(matches!(err, DeviceError::UnsupportedDeviceResponse(_)), "{err}");
}
