//! APB4 bus transaction driver.
//!
//! Turns byte/word-level read and write calls into protocol-legal two-phase
//! APB4 handshakes, one aligned word beat at a time, with optional
//! randomized idle cycles before each transaction to stress the responder's
//! wait-state handling.

use crate::apb::{ApbMaster, ApbPort, ApbSlave};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_RNG_SEED: u64 = 0xdead_beef_cafe_f00d;

/// Single-master, non-pipelined APB4 driver. At most one transaction is in
/// flight at any cycle; the driver waits indefinitely for `pready`.
pub struct ApbDriver<P> {
    port: P,

    enable_delays: bool,
    resp_pending: u32,
    rng: StdRng,
}

impl<P: ApbPort> ApbDriver<P> {
    /// Driver with the default delay seed; runs are reproducible unless the
    /// seed is varied via `with_seed`.
    pub fn new(port: P) -> ApbDriver<P> {
        ApbDriver::with_seed(port, DEFAULT_RNG_SEED)
    }

    pub fn with_seed(port: P, seed: u64) -> ApbDriver<P> {
        ApbDriver {
            port,

            enable_delays: true,
            resp_pending: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Toggle randomized idle-cycle insertion before each transaction.
    /// Affects cycle counts only, never data.
    pub fn enable_delays(&mut self, enable: bool) {
        self.enable_delays = enable;
    }

    /// Transactions currently awaiting a response; always 0 or 1.
    pub fn resp_pending(&self) -> u32 {
        self.resp_pending
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    /// Write a byte range of arbitrary length and alignment, split into
    /// aligned word beats.
    pub fn write(&mut self, addr: u32, data: &[u8]) {
        self.write_block_masked(addr, data, 0xf);
    }

    /// Read a byte range of arbitrary length and alignment.
    pub fn read(&mut self, addr: u32, data: &mut [u8]) {
        let mut addr = addr;
        let mut pos = 0;
        while pos < data.len() {
            let offset = (addr & 3) as usize;
            let size = usize::min(4 - offset, data.len() - pos);

            let word = self.apb_read(addr & !3);
            for x in 0..size {
                data[pos + x] = (word >> (8 * (offset + x))) as u8;
            }

            addr += size as u32;
            pos += size;
        }
    }

    pub fn write8(&mut self, addr: u32, data: u8) {
        self.write(addr, &[data]);
    }

    pub fn read8(&mut self, addr: u32) -> u8 {
        let mut data = [0];
        self.read(addr, &mut data);
        data[0]
    }

    pub fn write32(&mut self, addr: u32, data: u32) {
        if addr & 3 != 0 {
            panic!("write32 requires a 4 byte aligned address (got 0x{:08x}).", addr);
        }
        self.write(addr, &data.to_le_bytes());
    }

    /// Word write with partial byte lanes; `mask` bit N enables lane N.
    pub fn write32_masked(&mut self, addr: u32, data: u32, mask: u8) {
        if addr & 3 != 0 {
            panic!(
                "write32_masked requires a 4 byte aligned address (got 0x{:08x}).",
                addr
            );
        }
        self.write_block_masked(addr, &data.to_le_bytes(), mask);
    }

    pub fn read32(&mut self, addr: u32) -> u32 {
        if addr & 3 != 0 {
            panic!("read32 requires a 4 byte aligned address (got 0x{:08x}).", addr);
        }
        let mut data = [0; 4];
        self.read(addr, &mut data);
        u32::from_le_bytes(data)
    }

    fn write_block_masked(&mut self, addr: u32, data: &[u8], initial_mask: u8) {
        if initial_mask != 0xf && data.len() != 4 {
            panic!("Partial-lane block writes must cover exactly one word.");
        }

        let mut addr = addr;
        let mut data = data;
        while !data.is_empty() {
            let offset = (addr & 3) as usize;
            let size = usize::min(4 - offset, data.len());

            let mut word = 0u32;
            let mut strb = 0u8;
            for (x, &byte) in data[..size].iter().enumerate() {
                word |= (byte as u32) << ((offset + x) * 8);
                strb |= ((initial_mask >> x) & 1) << (offset + x);
            }

            self.apb_write(addr & !3, word, strb);

            addr += size as u32;
            data = &data[size..];
        }
    }

    /// One aligned word write: optional idle cycles, setup phase, access
    /// phase held until the responder is ready.
    fn apb_write(&mut self, addr: u32, data: u32, strb: u8) {
        log::debug!(
            "apb write: addr=0x{:08x} data=0x{:08x} strb=0x{:x}",
            addr,
            data,
            strb
        );

        while self.delay_cycle() {
            self.port.clk(&ApbMaster::idle());
        }

        let mut m = ApbMaster {
            psel: true,
            penable: false,
            pwrite: true,
            paddr: addr,
            pwdata: data,
            pstrb: strb,
            pprot: 0,
        };
        self.resp_pending += 1;
        self.port.clk(&m);

        m.penable = true;
        let mut s = self.port.clk(&m);
        while !s.pready {
            s = self.port.clk(&m);
        }

        self.check_no_error(&s, addr);
        self.resp_pending -= 1;
    }

    /// One aligned word read, same phasing as `apb_write`.
    fn apb_read(&mut self, addr: u32) -> u32 {
        while self.delay_cycle() {
            self.port.clk(&ApbMaster::idle());
        }

        let mut m = ApbMaster {
            psel: true,
            penable: false,
            pwrite: false,
            paddr: addr,
            pwdata: 0,
            pstrb: 0,
            pprot: 0,
        };
        self.resp_pending += 1;
        self.port.clk(&m);

        m.penable = true;
        let mut s = self.port.clk(&m);
        while !s.pready {
            s = self.port.clk(&m);
        }

        self.check_no_error(&s, addr);
        self.resp_pending -= 1;

        log::debug!("apb read: addr=0x{:08x} data=0x{:08x}", addr, s.prdata);
        s.prdata
    }

    // A responder that reports an error fails the test outright.
    fn check_no_error(&self, s: &ApbSlave, addr: u32) {
        if s.pslverr {
            panic!("APB transaction at 0x{:08x} returned a slave error.", addr);
        }
    }

    fn delay_cycle(&mut self) -> bool {
        self.enable_delays && self.rng.gen::<bool>()
    }
}
