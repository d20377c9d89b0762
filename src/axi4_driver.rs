//! AXI4 bus transaction driver.
//!
//! Same byte/word-level API as the APB driver, issued as single-beat
//! 32-bit INCR bursts with independent valid/ready handshakes per channel.

use crate::axi4::{Axi4Master, Axi4Port, AXI4_BURST_INCR, AXI4_RESP_OKAY};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_RNG_SEED: u64 = 0xfade_babe_abad_1dea;

/// Single-master, non-pipelined AXI4 driver: one outstanding transaction
/// at a time, id 0, fixed 32-bit beat size.
pub struct Axi4Driver<P> {
    port: P,

    enable_delays: bool,
    resp_pending: u32,
    rng: StdRng,
}

impl<P: Axi4Port> Axi4Driver<P> {
    pub fn new(port: P) -> Axi4Driver<P> {
        Axi4Driver::with_seed(port, DEFAULT_RNG_SEED)
    }

    pub fn with_seed(port: P, seed: u64) -> Axi4Driver<P> {
        Axi4Driver {
            port,

            enable_delays: true,
            resp_pending: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Toggle randomized idle-cycle insertion before each transaction.
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

            let word = self.axi_read(addr & !3);
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

            self.axi_write(addr & !3, word, strb);

            addr += size as u32;
            data = &data[size..];
        }
    }

    /// One aligned word write: drive AW and W until each is accepted, then
    /// hold BREADY until the write response arrives.
    fn axi_write(&mut self, addr: u32, data: u32, strb: u8) {
        log::debug!(
            "axi write: addr=0x{:08x} data=0x{:08x} strb=0x{:x}",
            addr,
            data,
            strb
        );

        while self.delay_cycle() {
            self.port.clk(&Axi4Master::idle());
        }

        self.resp_pending += 1;

        let mut aw_done = false;
        let mut w_done = false;
        let resp;
        loop {
            let mut m = Axi4Master::idle();
            m.bready = true;
            if !aw_done {
                m.awvalid = true;
                m.awaddr = addr;
                m.awlen = 0;
                m.awburst = AXI4_BURST_INCR;
            }
            if !w_done {
                m.wvalid = true;
                m.wdata = data;
                m.wstrb = strb;
                m.wlast = true;
            }

            let s = self.port.clk(&m);
            if m.awvalid && s.awready {
                aw_done = true;
            }
            if m.wvalid && s.wready {
                w_done = true;
            }
            if s.bvalid {
                resp = s.bresp;
                break;
            }
        }

        if resp != AXI4_RESP_OKAY {
            panic!(
                "AXI write to 0x{:08x} returned response 0x{:x} instead of OKAY.",
                addr, resp
            );
        }
        self.resp_pending -= 1;
    }

    /// One aligned word read: drive AR until accepted, then hold RREADY
    /// until the single data beat arrives.
    fn axi_read(&mut self, addr: u32) -> u32 {
        while self.delay_cycle() {
            self.port.clk(&Axi4Master::idle());
        }

        self.resp_pending += 1;

        let mut ar_done = false;
        let data;
        loop {
            let mut m = Axi4Master::idle();
            m.rready = true;
            if !ar_done {
                m.arvalid = true;
                m.araddr = addr;
                m.arlen = 0;
                m.arburst = AXI4_BURST_INCR;
            }

            let s = self.port.clk(&m);
            if m.arvalid && s.arready {
                ar_done = true;
            }
            if s.rvalid {
                if s.rresp != AXI4_RESP_OKAY {
                    panic!(
                        "AXI read at 0x{:08x} returned response 0x{:x} instead of OKAY.",
                        addr, s.rresp
                    );
                }
                if !s.rlast {
                    panic!("AXI read at 0x{:08x} returned a beat without RLAST on a single-beat burst.", addr);
                }
                data = s.rdata;
                break;
            }
        }

        self.resp_pending -= 1;

        log::debug!("axi read: addr=0x{:08x} data=0x{:08x}", addr, data);
        data
    }

    fn delay_cycle(&mut self) -> bool {
        self.enable_delays && self.rng.gen::<bool>()
    }
}
