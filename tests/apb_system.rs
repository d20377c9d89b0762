//! End-to-end checks: APB driver transactions land in the behavioral SDRAM
//! at the composed row/bank/column addresses.
//!
//! The RTL controller is not part of this crate, so a minimal behavioral
//! bridge stands in for it: each APB word access is expanded into the
//! ACTIVE / READ-WRITE / PRECHARGE command sequence a controller would
//! issue, against a CAS 2, burst length 2 mode configuration.

use sdram_tb::apb::{ApbMaster, ApbPort, ApbSlave};
use sdram_tb::apb_driver::ApbDriver;
use sdram_tb::mem::Memory;
use sdram_tb::sdram::{
    Command, Sdram, SdramIoMaster, SdramIoSlave, BANK_ADDR_MASK, COL_ADDR_MASK,
    NUM_BANK_ADDR_BITS, NUM_COL_ADDR_BITS, PRECHARGE_ALL_BIT, ROW_ADDR_MASK,
};

const MEM_SIZE: usize = 2 << 20;

/// Mode word: burst length 2, sequential, CAS latency 2, write bursts on.
const MODE_WORD: u16 = 0x21;

/// Inverse of the model's address composition, for aligned byte addresses.
fn decompose(addr: u32) -> (u16, u8, u16) {
    let col = (addr >> 1) & COL_ADDR_MASK;
    let bank = (addr >> (1 + NUM_COL_ADDR_BITS)) & BANK_ADDR_MASK;
    let row = (addr >> (1 + NUM_COL_ADDR_BITS + NUM_BANK_ADDR_BITS)) & ROW_ADDR_MASK;
    (row as u16, bank as u8, col as u16)
}

struct ApbSdramBridge {
    sdram: Sdram,
    m: SdramIoMaster,
    s: SdramIoSlave,
    initialized: bool,
}

impl ApbSdramBridge {
    fn new() -> ApbSdramBridge {
        ApbSdramBridge {
            sdram: Sdram::new(Memory::new(MEM_SIZE), None).unwrap(),
            m: SdramIoMaster::new(),
            s: SdramIoSlave::default(),
            initialized: false,
        }
    }

    fn step(&mut self) {
        self.sdram.clk(&self.m, &mut self.s).unwrap();
    }

    fn init(&mut self) {
        self.m.set_command(Command::Precharge);
        self.m.addr = 1 << PRECHARGE_ALL_BIT;
        self.step();

        self.m.set_command(Command::LoadMode);
        self.m.addr = MODE_WORD;
        self.step();

        self.m.set_command(Command::Nop);
        self.m.addr = 0;
        self.step();
    }

    fn write_word(&mut self, addr: u32, data: u32, strb: u8) {
        let (row, bank, col) = decompose(addr);

        self.m.ba = bank;
        self.m.set_command(Command::Active);
        self.m.addr = row;
        self.step();

        // Two 16-bit beats; strobes invert into per-lane DQM masking.
        self.m.set_command(Command::Write);
        self.m.addr = col;
        self.m.data_out = data as u16;
        self.m.dqm = !strb & 0x3;
        self.m.data_out_en = true;
        self.step();

        self.m.set_command(Command::Nop);
        self.m.data_out = (data >> 16) as u16;
        self.m.dqm = !(strb >> 2) & 0x3;
        self.step();

        self.m.data_out_en = false;
        self.m.dqm = 0;
        self.close_row();
    }

    fn read_word(&mut self, addr: u32) -> u32 {
        let (row, bank, col) = decompose(addr);

        self.m.ba = bank;
        self.m.set_command(Command::Active);
        self.m.addr = row;
        self.step();

        self.m.set_command(Command::Read);
        self.m.addr = col;
        self.step();
        // CAS 2: the first word is on the bus at the end of the READ cycle.
        let lo = self.s.data_in;

        self.m.set_command(Command::Nop);
        self.step();
        let hi = self.s.data_in;

        self.close_row();

        lo as u32 | (hi as u32) << 16
    }

    fn close_row(&mut self) {
        self.m.set_command(Command::Precharge);
        self.m.addr = 1 << PRECHARGE_ALL_BIT;
        self.step();

        self.m.set_command(Command::Nop);
        self.m.addr = 0;
        self.step();
    }
}

impl ApbPort for ApbSdramBridge {
    fn clk(&mut self, m: &ApbMaster) -> ApbSlave {
        let mut s = ApbSlave::default();
        if !m.psel || !m.penable {
            return s;
        }

        if !self.initialized {
            self.init();
            self.initialized = true;
        }

        s.pready = true;
        if m.pwrite {
            self.write_word(m.paddr & !3, m.pwdata, m.pstrb);
        } else {
            s.prdata = self.read_word(m.paddr & !3);
        }
        s
    }
}

#[test]
fn word_round_trip_through_the_model() {
    let mut driver = ApbDriver::new(ApbSdramBridge::new());

    driver.write32(0x100, 0xdeadbeef);
    assert_eq!(driver.read32(0x100), 0xdeadbeef);
    assert_eq!(driver.resp_pending(), 0);

    // The linear byte address equals the model's composed address, so the
    // bytes must sit at 0x100 in the backing store.
    let sdram = &driver.port().sdram;
    assert_eq!(sdram.read_byte(0x100), 0xef);
    assert_eq!(sdram.read_byte(0x101), 0xbe);
    assert_eq!(sdram.read_byte(0x102), 0xad);
    assert_eq!(sdram.read_byte(0x103), 0xde);
}

#[test]
fn byte_range_crossing_a_word_boundary() {
    let mut driver = ApbDriver::new(ApbSdramBridge::new());

    driver.write(0x103, &[0x11, 0x22, 0x33]);

    let mut data = [0; 3];
    driver.read(0x103, &mut data);
    assert_eq!(data, [0x11, 0x22, 0x33]);

    let sdram = &driver.port().sdram;
    assert_eq!(sdram.read_byte(0x102), 0);
    assert_eq!(sdram.read_byte(0x103), 0x11);
    assert_eq!(sdram.read_byte(0x104), 0x22);
    assert_eq!(sdram.read_byte(0x105), 0x33);
    assert_eq!(sdram.read_byte(0x106), 0);
}

#[test]
fn masked_word_write_preserves_other_lanes() {
    let mut driver = ApbDriver::new(ApbSdramBridge::new());

    driver.write32(0x40, 0xffffffff);
    driver.write32_masked(0x40, 0x12345678, 0b0001);
    assert_eq!(driver.read32(0x40), 0xffffff78);
}

#[test]
fn accesses_spread_across_banks() {
    let mut driver = ApbDriver::new(ApbSdramBridge::new());

    // Bank select bits sit just above the column bits, so these all hit
    // the same column of different banks.
    let bank_stride = 1 << (1 + NUM_COL_ADDR_BITS);
    for bank in 0..4u32 {
        driver.write32(bank * bank_stride + 0x20, 0x1000_0000 + bank);
    }
    for bank in 0..4u32 {
        assert_eq!(
            driver.read32(bank * bank_stride + 0x20),
            0x1000_0000 + bank
        );
    }
}

#[test]
fn delay_injection_is_transparent() {
    let mut stressed = ApbDriver::new(ApbSdramBridge::new());
    let mut plain = ApbDriver::new(ApbSdramBridge::new());
    plain.enable_delays(false);

    for driver in [&mut stressed, &mut plain] {
        driver.write8(0x11, 0x42);
        driver.write32(0x80, 0xcafef00d);
        driver.write(0x85, &[1, 2, 3, 4, 5, 6, 7]);
    }

    assert_eq!(stressed.read8(0x11), plain.read8(0x11));
    assert_eq!(stressed.read32(0x80), plain.read32(0x80));
    let mut a = [0; 7];
    let mut b = [0; 7];
    stressed.read(0x85, &mut a);
    plain.read(0x85, &mut b);
    assert_eq!(a, b);
    assert_eq!(a, [1, 2, 3, 4, 5, 6, 7]);
}
