#![allow(dead_code)]

//! Shared test doubles: simulated devices behind `ByteStream`, a connector that
//! hands them out, and builders for memory/log images.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use divelink::consts::{
    ACK, LOG_BLOCK_LEN, LOG_IMAGE_SIZE, LOG_ROW_LEN, LOG_SUBVERSION_MARKER, LOG_SUBVERSION_OFFSET,
    LOG_TRAILER_LEN, NAK, SUUNTO_DIVE_END, SUUNTO_HEADER_SIZE, SUUNTO_MEMORY_SIZE,
    SUUNTO_OFF_DIVE_COUNT, SUUNTO_OFF_END_POINTER, SUUNTO_OFF_MODEL, SUUNTO_OFF_SERIAL,
    SW_DEVICE_ADDR, SW_HOST_ADDR, SW_LINK_DATA,
};
use divelink::divelog::compute_checksum;
use divelink::error::{DeviceError, Result};
use divelink::frame::{pack, reorder_bits, unpack};
use divelink::link::LinkEnvelope;
use divelink::slip;
use divelink::stream::{ByteStream, Connection, Connector, PortSettings};

pub fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("divelink-{}-{}-{}", prefix, pid, t))
}

/// What a simulated device saw.
#[derive(Debug, Default)]
pub struct DeviceLog {
    /// Decoded request payloads (packet devices) or envelope data (SLIP devices).
    pub requests: Vec<Vec<u8>>,
    pub host_acks: usize,
    pub closed: bool,
    pub settings: Option<PortSettings>,
}

pub type Shared = Arc<Mutex<DeviceLog>>;

// ---------- scripted stream ----------

/// Replays fixed input, records output. `read` hands out at most `chunk` bytes.
pub struct ScriptedStream {
    pub input: VecDeque<u8>,
    pub output: Arc<Mutex<Vec<u8>>>,
    pub chunk: usize,
    pub log: Shared,
}

impl ScriptedStream {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Arc::new(Mutex::new(Vec::new())),
            chunk: usize::MAX,
            log: Shared::default(),
        }
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }
}

impl ByteStream for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.input.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.input.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.output.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

// ---------- checksummed packet device ----------

pub type PacketHandler = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// Device side of the checksummed packet protocol. Every valid request is
/// acknowledged and answered with the packets the handler returns.
pub struct PacketDevice {
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
    handler: PacketHandler,
    with_inner: bool,
    reorder: bool,
    acks_due: usize,
    /// Requests (counted from the first) that get no ACK and no reply.
    pub mute_first: usize,
    /// Flip a byte in the next reply packet.
    pub corrupt_next_reply: bool,
    pub log: Shared,
}

impl PacketDevice {
    pub fn new(handler: PacketHandler) -> Self {
        Self {
            inbox: Vec::new(),
            outbox: VecDeque::new(),
            handler,
            with_inner: false,
            reorder: false,
            acks_due: 0,
            mute_first: 0,
            corrupt_next_reply: false,
            log: Shared::default(),
        }
    }

    pub fn with_inner(mut self, on: bool) -> Self {
        self.with_inner = on;
        self
    }

    pub fn with_reorder(mut self, on: bool) -> Self {
        self.reorder = on;
        self
    }

    pub fn muted(mut self, n: usize) -> Self {
        self.mute_first = n;
        self
    }

    fn emit(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.outbox
                .push_back(if self.reorder { reorder_bits(b) } else { b });
        }
    }

    fn on_packet(&mut self) {
        let pkt = std::mem::take(&mut self.inbox);
        let payload = match unpack(&pkt, self.with_inner) {
            Ok(p) => p,
            Err(_) => {
                self.emit(&[NAK]);
                return;
            }
        };
        if self.mute_first > 0 {
            self.mute_first -= 1;
            return;
        }
        self.log.lock().unwrap().requests.push(payload.clone());
        self.emit(&[ACK]);
        for reply in (self.handler)(&payload) {
            let mut wire = pack(&reply, self.with_inner).unwrap().to_bytes();
            if self.corrupt_next_reply {
                self.corrupt_next_reply = false;
                let last = wire.len() - 1;
                wire[last] ^= 0x5A;
            }
            self.emit(&wire);
            self.acks_due += 1;
        }
    }
}

impl ByteStream for PacketDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.outbox.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.outbox.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        for &raw in buf {
            let b = if self.reorder { reorder_bits(raw) } else { raw };
            if self.acks_due > 0 && self.inbox.is_empty() {
                if b == ACK {
                    self.acks_due -= 1;
                    self.log.lock().unwrap().host_acks += 1;
                    continue;
                }
                // host gave up on the reply and starts a new request
                self.acks_due = 0;
                self.outbox.clear();
            }
            self.inbox.push(b);
            if self.inbox.len() == 1 + self.inbox[0] as usize {
                self.on_packet();
            }
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Suunto-style memory: `[0x05, hi, lo, len]` -> `[hi, lo, len, data...]`.
pub fn memory_handler(memory: Vec<u8>) -> PacketHandler {
    Box::new(move |req: &[u8]| {
        assert_eq!(req.len(), 4, "read command is 4 bytes");
        assert_eq!(req[0], 0x05);
        let addr = ((req[1] as usize) << 8) | req[2] as usize;
        let len = req[3] as usize;
        let mut reply = vec![req[1], req[2], req[3]];
        reply.extend_from_slice(&memory[addr..addr + len]);
        vec![reply]
    })
}

/// Memo Mouse logbook reply split into packets of at most `per_packet` bytes.
pub fn logbook_handler(logbook: Vec<u8>, per_packet: usize) -> PacketHandler {
    Box::new(move |req: &[u8]| {
        assert_eq!(req, &[0x47]);
        let mut all = (logbook.len() as u16).to_be_bytes().to_vec();
        all.extend_from_slice(&logbook);
        all.chunks(per_packet).map(|c| c.to_vec()).collect()
    })
}

// ---------- SLIP device ----------

pub enum Reply {
    /// Message wrapped in a device->host data envelope.
    Message(Vec<u8>),
    /// Bytes put on the wire as they are.
    Raw(Vec<u8>),
}

pub type MessageHandler = Box<dyn FnMut(&[u8]) -> Vec<Reply> + Send>;

pub struct SlipDevice {
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
    handler: MessageHandler,
    /// Bytes per read, to exercise partial frames.
    pub chunk: usize,
    pub log: Shared,
}

impl SlipDevice {
    pub fn new(handler: MessageHandler) -> Self {
        Self {
            inbox: Vec::new(),
            outbox: VecDeque::new(),
            handler,
            chunk: 7,
            log: Shared::default(),
        }
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }
}

pub fn device_frame(message: &[u8]) -> Vec<u8> {
    let env = LinkEnvelope::new(SW_DEVICE_ADDR, SW_HOST_ADDR, SW_LINK_DATA, message.to_vec());
    slip::encode(&env.encode().unwrap())
}

impl ByteStream for SlipDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.outbox.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.outbox.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inbox.extend_from_slice(buf);
        while let Some(d) = slip::decode_frame(&self.inbox).unwrap() {
            self.inbox.drain(..d.consumed);
            let env = LinkEnvelope::decode(&d.frame).unwrap();
            assert_eq!((env.source, env.target), (SW_HOST_ADDR, SW_DEVICE_ADDR));
            self.log.lock().unwrap().requests.push(env.data.clone());
            for r in (self.handler)(&env.data) {
                let wire = match r {
                    Reply::Message(m) => device_frame(&m),
                    Reply::Raw(w) => w,
                };
                self.outbox.extend(wire);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Shearwater-like device serving `image` through upload/transfer.
pub fn shearwater_handler(
    serial: &str,
    firmware: &str,
    hardware: u16,
    image: Vec<u8>,
    block: usize,
) -> MessageHandler {
    let serial = serial.as_bytes().to_vec();
    let firmware = firmware.as_bytes().to_vec();
    let mut pos = 0usize;
    Box::new(move |req: &[u8]| {
        let msg = match req[0] {
            0x22 => {
                let id = u16::from_be_bytes([req[1], req[2]]);
                let mut m = vec![0x62, req[1], req[2]];
                match id {
                    0x8010 => m.extend_from_slice(&serial),
                    0x8011 => m.extend_from_slice(&firmware),
                    0x8050 => m.extend_from_slice(&hardware.to_be_bytes()),
                    _ => return vec![Reply::Message(vec![0x7F, 0x22, 0x31])],
                }
                m
            }
            0x35 => {
                pos = 0;
                let mut m = vec![0x75, 0x20];
                m.extend_from_slice(&(block as u16).to_be_bytes());
                m
            }
            0x36 => {
                let end = (pos + block).min(image.len());
                let mut m = vec![0x76, req[1]];
                m.extend_from_slice(&image[pos..end]);
                pos = end;
                m
            }
            0x37 => vec![0x77],
            other => vec![0x7F, other, 0x11],
        };
        vec![Reply::Message(msg)]
    })
}

// ---------- connector ----------

/// Hands out one prepared stream; the device log records settings and closing.
pub struct MockConnector {
    stream: Option<Box<dyn ByteStream>>,
    log: Shared,
}

impl MockConnector {
    pub fn new(stream: Box<dyn ByteStream>, log: Shared) -> Self {
        Self {
            stream: Some(stream),
            log,
        }
    }

    /// A connector whose port does not exist.
    pub fn missing() -> Self {
        Self {
            stream: None,
            log: Shared::default(),
        }
    }
}

impl Connector for MockConnector {
    fn connect(&mut self, port: &str, settings: &PortSettings) -> Result<Connection> {
        self.log.lock().unwrap().settings = Some(settings.clone());
        let s = self
            .stream
            .take()
            .ok_or_else(|| DeviceError::PortNotFound(port.to_string()))?;
        Ok(Connection::new(port, s))
    }
}

// ---------- Suunto memory image ----------

/// Memory with `dives` written back to back from `ring_start`, each followed
/// by the end marker. Free ring space holds end markers.
pub fn suunto_memory(model: u8, serial: u32, dives: &[Vec<u8>], ring_start: u32) -> Vec<u8> {
    let size = SUUNTO_MEMORY_SIZE as usize;
    let hdr = SUUNTO_HEADER_SIZE as usize;
    let mut mem = vec![0u8; size];
    for b in &mut mem[hdr..] {
        *b = SUUNTO_DIVE_END;
    }

    let mut pos = ring_start as usize;
    let mut put = |mem: &mut Vec<u8>, b: u8| {
        mem[pos] = b;
        pos += 1;
        if pos == size {
            pos = hdr;
        }
    };
    for d in dives {
        for &b in d {
            put(&mut mem, b);
        }
        put(&mut mem, SUUNTO_DIVE_END);
    }
    let end_pointer = pos as u16;

    mem[SUUNTO_OFF_MODEL as usize] = model;
    let s = SUUNTO_OFF_SERIAL as usize;
    mem[s..s + 4].copy_from_slice(&serial.to_be_bytes());
    let p = SUUNTO_OFF_END_POINTER as usize;
    mem[p..p + 2].copy_from_slice(&end_pointer.to_be_bytes());
    let c = SUUNTO_OFF_DIVE_COUNT as usize;
    mem[c..c + 2].copy_from_slice(&(dives.len() as u16).to_be_bytes());
    mem
}

/// `[interval][yy][mm][dd][hh][mi][temp][o2]` + depth deltas.
pub fn suunto_dive(interval: u8, date: [u8; 5], temp: i8, deltas: &[i8]) -> Vec<u8> {
    let mut d = vec![interval];
    d.extend_from_slice(&date);
    d.push(temp as u8);
    d.push(21);
    d.extend(deltas.iter().map(|&x| x as u8));
    d
}

// ---------- dive log image ----------

pub struct LogImageBuilder {
    pub buf: Vec<u8>,
    data_end: usize,
}

impl LogImageBuilder {
    /// Erased image with a trailer for `raw_version`.
    pub fn new(raw_version: u8, data_end: usize) -> Self {
        let mut buf = vec![0xFFu8; LOG_IMAGE_SIZE];
        let t = LOG_IMAGE_SIZE - LOG_TRAILER_LEN;
        buf[t..].fill(0);
        buf[t] = 0xFF;
        buf[t + 1] = 0xFD;
        buf[t + 2] = raw_version;
        buf[t + 3] = 0x42;
        buf[t + 4..t + 8].copy_from_slice(&0x1A2B_3C4Du32.to_be_bytes());
        buf[t + 8..t + 10].copy_from_slice(&85u16.to_be_bytes());
        Self { buf, data_end }
    }

    pub fn with_subversion_marker(mut self) -> Self {
        self.buf[LOG_SUBVERSION_OFFSET..LOG_SUBVERSION_OFFSET + 2]
            .copy_from_slice(&LOG_SUBVERSION_MARKER);
        self
    }

    fn put(&mut self, off: usize, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let at = (off + i) % self.data_end;
            self.buf[at] = b;
        }
    }

    pub fn opening(&mut self, off: usize, number: u16, start: u32, settings: u8) {
        let mut b = vec![0u8; LOG_BLOCK_LEN];
        b[0] = 0xFF;
        b[1] = 0xFF;
        b[2..4].copy_from_slice(&number.to_be_bytes());
        b[4..8].copy_from_slice(&start.to_be_bytes());
        b[8] = settings;
        b[9] = 30;
        b[10] = 70;
        b[0x0C..0x0E].copy_from_slice(&1013u16.to_be_bytes());
        b[0x0E..0x10].copy_from_slice(&390u16.to_be_bytes());
        b[0x10] = 21;
        b[0x11] = 50;
        b[0x20] = 1;
        b[0x40] = 2;
        b[0x60] = 3;
        self.put(off, &b);
    }

    /// Sample row; depth in 1/10 units, temperature in 1/10 degrees.
    pub fn sample(&mut self, off: usize, depth_dm: u16, temp_dc: i16) {
        let mut r = vec![0u8; LOG_ROW_LEN];
        r[0..2].copy_from_slice(&depth_dm.to_be_bytes());
        r[6..8].copy_from_slice(&temp_dc.to_be_bytes());
        r[8] = 21;
        r[9] = 21;
        self.put(off, &r);
    }

    pub fn zero_row(&mut self, off: usize) {
        self.put(off, &[0u8; LOG_ROW_LEN]);
    }

    pub fn closing(&mut self, off: usize, number: u16, end: u32, max_depth_dm: u16, duration: u32) {
        let mut b = vec![0u8; LOG_BLOCK_LEN];
        b[0] = 0xFF;
        b[1] = 0xFE;
        b[2..4].copy_from_slice(&number.to_be_bytes());
        b[4..8].copy_from_slice(&end.to_be_bytes());
        b[8..10].copy_from_slice(&max_depth_dm.to_be_bytes());
        b[0x0A..0x0E].copy_from_slice(&duration.to_be_bytes());
        b[0x0E..0x10].copy_from_slice(&125i16.to_be_bytes());
        b[0x20] = 1;
        b[0x40] = 2;
        b[0x60] = 3;
        self.put(off, &b);
    }

    /// Opening + `samples` rows + closing; returns the offset after the closing block.
    pub fn dive(&mut self, off: usize, number: u16, start: u32, samples: usize) -> usize {
        self.opening(off, number, start, 0);
        let mut at = off + LOG_BLOCK_LEN;
        for i in 0..samples {
            self.sample(at, 10 + 10 * i as u16, 180);
            at += LOG_ROW_LEN;
        }
        self.closing(at, number, start + samples as u32 * 10, 10 * samples as u16, samples as u32 * 10);
        (at + LOG_BLOCK_LEN) % self.data_end
    }

    /// Store the checksum and return the image.
    pub fn seal(mut self) -> Vec<u8> {
        let sum = compute_checksum(&self.buf);
        let t = LOG_IMAGE_SIZE - LOG_TRAILER_LEN;
        self.buf[t + 12] = sum;
        self.buf
    }
}
