//! Behavioral model of a 4-bank x16 SDR SDRAM device.
//!
//! The model decodes one command per clock from the control pins, keeps
//! per-bank open-row state and the mode register, and services reads through
//! a CAS-latency pipeline. It checks protocol legality only; timing
//! enforcement is the controller under test's job.

use crate::mem::Memory;

use std::{fs, io};

pub const NUM_ELEMENT_BITS: u32 = 16;
pub const NUM_COL_ADDR_BITS: u32 = 9;
pub const COL_ADDR_MASK: u32 = (1 << NUM_COL_ADDR_BITS) - 1;
pub const NUM_ROW_ADDR_BITS: u32 = 13;
pub const ROW_ADDR_MASK: u32 = (1 << NUM_ROW_ADDR_BITS) - 1;
pub const NUM_BANK_ADDR_BITS: u32 = 2;
pub const NUM_BANKS: u32 = 1 << NUM_BANK_ADDR_BITS;
pub const BANK_ADDR_MASK: u32 = NUM_BANKS - 1;

/// Precharge address bit that selects all banks instead of `ba`.
pub const PRECHARGE_ALL_BIT: u32 = 10;

/// Slots in the read-return pipeline, indexed by `cas_latency - 2`.
const RESP_PIPELINE_DEPTH: usize = 3;

/// Command opcode, jointly encoded on the four control pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Inhibit,
    Nop,
    Active,
    Read,
    Write,
    BurstTerminate,
    Precharge,
    Refresh,
    LoadMode,
}

impl Command {
    /// Decode from the control pins. Chip select gates everything; the
    /// remaining three strobes are matched exhaustively, so every pin
    /// combination maps to a command.
    pub fn decode(cs_n: bool, ras_n: bool, cas_n: bool, we_n: bool) -> Command {
        if cs_n {
            return Command::Inhibit;
        }

        match (ras_n, cas_n, we_n) {
            (true, true, true) => Command::Nop,
            (false, true, true) => Command::Active,
            (true, false, true) => Command::Read,
            (true, false, false) => Command::Write,
            (true, true, false) => Command::BurstTerminate,
            (false, true, false) => Command::Precharge,
            (false, false, true) => Command::Refresh,
            (false, false, false) => Command::LoadMode,
        }
    }

    /// Pin levels for this command as `(cs_n, ras_n, cas_n, we_n)`.
    pub fn encode(self) -> (bool, bool, bool, bool) {
        match self {
            Command::Inhibit => (true, true, true, true),
            Command::Nop => (false, true, true, true),
            Command::Active => (false, false, true, true),
            Command::Read => (false, true, false, true),
            Command::Write => (false, true, false, false),
            Command::BurstTerminate => (false, true, true, false),
            Command::Precharge => (false, false, true, false),
            Command::Refresh => (false, false, false, true),
            Command::LoadMode => (false, false, false, false),
        }
    }
}

/// Pins driven towards the device by the controller under test.
///
/// The data bus is tri-state on real silicon; here it is split into an
/// explicit `(data_out_en, data_out)` pair, collapsed back to one wire only
/// at the bridge's simulated pin boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdramIoMaster {
    pub cs_n: bool,
    pub ras_n: bool,
    pub cas_n: bool,
    pub we_n: bool,
    pub dqm: u8,
    pub ba: u8,
    pub addr: u16,
    pub data_out: u16,
    pub data_out_en: bool,
}

impl SdramIoMaster {
    /// Deselected bus: no command, data bus not driven.
    pub fn new() -> SdramIoMaster {
        SdramIoMaster {
            cs_n: true,
            ras_n: true,
            cas_n: true,
            we_n: true,
            dqm: 0,
            ba: 0,
            addr: 0,
            data_out: 0,
            data_out_en: false,
        }
    }

    pub fn set_command(&mut self, command: Command) {
        let (cs_n, ras_n, cas_n, we_n) = command.encode();
        self.cs_n = cs_n;
        self.ras_n = ras_n;
        self.cas_n = cas_n;
        self.we_n = we_n;
    }
}

impl Default for SdramIoMaster {
    fn default() -> SdramIoMaster {
        SdramIoMaster::new()
    }
}

/// Pins driven by the device towards the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SdramIoSlave {
    pub data_in: u16,
}

/// Mode register contents, written by LOAD MODE and read by every
/// READ/WRITE thereafter. Power-on state matches a zero mode word with the
/// minimum legal CAS latency.
#[derive(Debug, Clone, Copy)]
struct ModeRegister {
    write_burst_en: bool,
    burst_length: u32,
    cas_latency: u32,
}

impl Default for ModeRegister {
    fn default() -> ModeRegister {
        ModeRegister {
            write_burst_en: true,
            burst_length: 1,
            cas_latency: 2,
        }
    }
}

/// Internal linear byte address for a decoded access:
/// `row : bank : col : 1 padding bit`, MSB to LSB.
pub fn compose_addr(row: u32, bank: u32, col: u32) -> u32 {
    (col & COL_ADDR_MASK) << 1
        | (bank & BANK_ADDR_MASK) << (NUM_COL_ADDR_BITS + 1)
        | (row & ROW_ADDR_MASK) << (NUM_COL_ADDR_BITS + NUM_BANK_ADDR_BITS + 1)
}

struct Trace {
    w: vcd::Writer<io::BufWriter<fs::File>>,

    clk_id: vcd::IdCode,
    command_id: vcd::IdCode,
    dqm_id: vcd::IdCode,
    ba_id: vcd::IdCode,
    addr_id: vcd::IdCode,
    dq_id: vcd::IdCode,

    time_stamp: u64,
}

fn bit_vector(value: u32, width: u32) -> Box<[vcd::Value]> {
    (0..width)
        .map(|i| {
            if (value >> (width - 1 - i)) & 1 != 0 {
                vcd::Value::V1
            } else {
                vcd::Value::V0
            }
        })
        .collect()
}

pub struct Sdram {
    mem: Memory,

    mode: ModeRegister,
    active_row: [Option<u32>; NUM_BANKS as usize],

    resp_pipeline: [u16; RESP_PIPELINE_DEPTH],
    burst_addr: u32,
    burst_read: u32,
    burst_write: u32,

    trace: Option<Trace>,
}

impl Sdram {
    pub fn new(mem: Memory, trace_file_name_prefix: Option<&str>) -> io::Result<Sdram> {
        Ok(Sdram {
            mem,

            mode: ModeRegister::default(),
            active_row: [None; NUM_BANKS as usize],

            resp_pipeline: [0; RESP_PIPELINE_DEPTH],
            burst_addr: 0,
            burst_read: 0,
            burst_write: 0,

            trace: if let Some(prefix) = trace_file_name_prefix {
                fs::create_dir_all("vcd")?;
                let path = format!("vcd/{}.vcd", prefix);
                log::info!("Writing trace to {}", path);
                let file = fs::File::create(path)?;
                let mut w = vcd::Writer::new(io::BufWriter::new(file));

                w.timescale(1, vcd::TimescaleUnit::NS)?;

                w.add_module("sdram")?;

                let clk_id = w.add_wire(1, "clk")?;
                let command_id = w.add_var(vcd::VarType::String, 8, "command", None)?;
                let dqm_id = w.add_wire(2, "dqm")?;
                let ba_id = w.add_wire(NUM_BANK_ADDR_BITS, "ba")?;
                let addr_id = w.add_wire(NUM_ROW_ADDR_BITS, "addr")?;
                let dq_id = w.add_wire(NUM_ELEMENT_BITS, "dq")?;

                w.upscope()?;
                w.enddefinitions()?;

                let time_stamp = 0;
                w.timestamp(time_stamp)?;

                Some(Trace {
                    w,

                    clk_id,
                    command_id,
                    dqm_id,
                    ba_id,
                    addr_id,
                    dq_id,

                    time_stamp,
                })
            } else {
                None
            },
        })
    }

    /// Backing store contents, for external memory-content checkers.
    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    /// Mutable backing store, for preloading test patterns.
    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /// Out-of-band byte read, bypassing the pin protocol.
    pub fn read_byte(&self, addr: u32) -> u8 {
        self.mem.read(addr)
    }

    /// Out-of-band byte write, bypassing the pin protocol.
    pub fn write_byte(&mut self, addr: u32, data: u8) {
        self.mem.write(addr, data);
    }

    /// Evaluate one clock cycle: decode the command on the pins, mutate
    /// bank/mode/burst state, and drive the read-return bus.
    pub fn clk(&mut self, io_m: &SdramIoMaster, io_s: &mut SdramIoSlave) -> io::Result<()> {
        let command = Command::decode(io_m.cs_n, io_m.ras_n, io_m.cas_n, io_m.we_n);

        if let Some(trace) = &mut self.trace {
            trace.w.change_scalar(trace.clk_id, false)?;

            trace
                .w
                .change_string(trace.command_id, &format!("{:?}", command))?;
            trace
                .w
                .change_vector(trace.dqm_id, &bit_vector(io_m.dqm as u32, 2))?;
            trace
                .w
                .change_vector(trace.ba_id, &bit_vector(io_m.ba as u32, NUM_BANK_ADDR_BITS))?;
            trace.w.change_vector(
                trace.addr_id,
                &bit_vector(io_m.addr as u32, NUM_ROW_ADDR_BITS),
            )?;
            let dq = if io_m.data_out_en {
                io_m.data_out
            } else {
                io_s.data_in
            };
            trace
                .w
                .change_vector(trace.dq_id, &bit_vector(dq as u32, NUM_ELEMENT_BITS))?;

            trace.time_stamp += 1;
            trace.w.timestamp(trace.time_stamp)?;
            trace.w.change_scalar(trace.clk_id, true)?;
            trace.time_stamp += 1;
            trace.w.timestamp(trace.time_stamp)?;
        }

        match command {
            Command::Inhibit | Command::Nop => (),
            Command::LoadMode => self.load_mode(io_m.addr),
            Command::Refresh => {
                for (bank, row) in self.active_row.iter().enumerate() {
                    if row.is_some() {
                        panic!("AUTO REFRESH issued while bank {} has an open row.", bank);
                    }
                }
            }
            Command::Active => {
                let bank = (io_m.ba as u32 & BANK_ADDR_MASK) as usize;
                let row = io_m.addr as u32 & ROW_ADDR_MASK;
                if self.active_row[bank].is_some() {
                    panic!(
                        "ACTIVE issued to bank {} which already has an open row.",
                        bank
                    );
                }
                self.active_row[bank] = Some(row);
            }
            Command::Read => {
                let bank = (io_m.ba as u32 & BANK_ADDR_MASK) as usize;
                let col = io_m.addr as u32 & COL_ADDR_MASK;
                let row = match self.active_row[bank] {
                    Some(row) => row,
                    None => panic!(
                        "READ issued to bank {} which does not have an open row.",
                        bank
                    ),
                };
                if io_m.dqm != 0 {
                    panic!("READ issued with DQM asserted.");
                }

                self.burst_addr = compose_addr(row, bank as u32, col);
                let slot = (self.mode.cas_latency - 2) as usize;
                self.resp_pipeline[slot] = self.read16(self.burst_addr);
                self.burst_addr = self.burst_addr.wrapping_add(2);
                self.burst_read = self.mode.burst_length - 1;
            }
            Command::Write => {
                let bank = (io_m.ba as u32 & BANK_ADDR_MASK) as usize;
                let col = io_m.addr as u32 & COL_ADDR_MASK;
                let row = match self.active_row[bank] {
                    Some(row) => row,
                    None => panic!(
                        "WRITE issued to bank {} which does not have an open row.",
                        bank
                    ),
                };
                if !io_m.data_out_en {
                    panic!("WRITE issued without the controller driving the data bus.");
                }

                self.burst_addr = compose_addr(row, bank as u32, col);
                self.write16(self.burst_addr, io_m.data_out, io_m.dqm);
                self.burst_addr = self.burst_addr.wrapping_add(2);
                self.burst_write = if self.mode.write_burst_en {
                    self.mode.burst_length - 1
                } else {
                    0
                };
            }
            Command::Precharge => {
                if (io_m.addr as u32 >> PRECHARGE_ALL_BIT) & 1 != 0 {
                    for row in self.active_row.iter_mut() {
                        *row = None;
                    }
                } else {
                    let bank = (io_m.ba as u32 & BANK_ADDR_MASK) as usize;
                    self.active_row[bank] = None;
                }
            }
            Command::BurstTerminate => {
                self.burst_read = 0;
                self.burst_write = 0;
            }
        }

        // Burst continuation on idle cycles.
        if self.burst_write > 0 && command == Command::Nop {
            if !io_m.data_out_en {
                panic!("Write burst continued without the controller driving the data bus.");
            }
            self.write16(self.burst_addr, io_m.data_out, io_m.dqm);
            self.burst_addr = self.burst_addr.wrapping_add(2);
            self.burst_write -= 1;
        } else if self.burst_read > 0 && command == Command::Nop {
            let slot = (self.mode.cas_latency - 2) as usize;
            self.resp_pipeline[slot] = self.read16(self.burst_addr);
            self.burst_addr = self.burst_addr.wrapping_add(2);
            self.burst_read -= 1;
        }

        // Present the pipeline head, then shift one slot towards it.
        io_s.data_in = self.resp_pipeline[0];
        for i in 1..RESP_PIPELINE_DEPTH {
            self.resp_pipeline[i - 1] = self.resp_pipeline[i];
        }
        self.resp_pipeline[RESP_PIPELINE_DEPTH - 1] = 0;

        Ok(())
    }

    fn load_mode(&mut self, mode_word: u16) {
        let mode_word = mode_word as u32;

        // Interleaved bursts are a legacy feature no supported controller
        // configuration uses.
        if (mode_word >> 3) & 1 != 0 {
            panic!("LOAD MODE selected an interleaved burst type, which is not supported.");
        }

        self.mode.write_burst_en = (mode_word >> 9) & 1 == 0;
        self.mode.burst_length = match mode_word & 0x7 {
            1 => 2,
            2 => 4,
            3 => 8,
            _ => 1,
        };

        let cas_latency = (mode_word >> 4) & 0x7;
        if !(2..=3).contains(&cas_latency) {
            panic!(
                "LOAD MODE selected CAS latency {}, which is not supported (must be 2 or 3).",
                cas_latency
            );
        }
        self.mode.cas_latency = cas_latency;

        log::info!(
            "mode register: burst_length={}, cas_latency={}, write_burst_en={}",
            self.mode.burst_length,
            self.mode.cas_latency,
            self.mode.write_burst_en
        );
    }

    fn read16(&self, addr: u32) -> u16 {
        let lo = self.mem.read(addr) as u16;
        let hi = self.mem.read(addr.wrapping_add(1)) as u16;
        hi << 8 | lo
    }

    // DQM masking: a set mask bit suppresses that byte lane.
    fn write16(&mut self, addr: u32, data: u16, dqm: u8) {
        if dqm & 0x1 == 0 {
            self.mem.write(addr, data as u8);
        }
        if dqm & 0x2 == 0 {
            self.mem.write(addr.wrapping_add(1), (data >> 8) as u8);
        }
    }
}
