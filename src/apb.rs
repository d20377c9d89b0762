//! APB4 bus signal records.
//!
//! Field names and widths follow the APB4 wire contract so a bridge can
//! flatten these records onto an RTL instance pin-for-pin.

/// Master-driven signals, one record per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApbMaster {
    pub psel: bool,
    pub penable: bool,
    pub pwrite: bool,
    pub paddr: u32,
    pub pwdata: u32,
    pub pstrb: u8,
    pub pprot: u8,
}

impl ApbMaster {
    /// Bus idle: nothing selected, all fields at reset values.
    pub fn idle() -> ApbMaster {
        ApbMaster::default()
    }
}

/// Slave-driven signals, one record per cycle.
///
/// `pslverr` is only ever asserted by a responder; the behavioral memory
/// model has no error path of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApbSlave {
    pub pready: bool,
    pub prdata: u32,
    pub pslverr: bool,
}

/// One-cycle step seam between a driver and whatever responds to it (the
/// bridged DUT in the real testbench, a behavioral stand-in under test).
///
/// The responder observes the master record for the cycle being evaluated
/// and returns the slave record it drives in that same cycle.
pub trait ApbPort {
    fn clk(&mut self, master: &ApbMaster) -> ApbSlave;
}
