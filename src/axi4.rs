//! AXI4 bus signal records, all five channels.
//!
//! The field set matches the signals the RTL wrapper flattens, so these
//! records are the wire contract with an AXI4 DUT.

pub const AXI4_RESP_OKAY: u8 = 0;

pub const AXI4_BURST_FIXED: u8 = 0;
pub const AXI4_BURST_INCR: u8 = 1;

/// Master-driven signals, one record per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Axi4Master {
    // AW channel
    pub awvalid: bool,
    pub awaddr: u32,
    pub awid: u8,
    pub awlen: u8,
    pub awburst: u8,

    // W channel
    pub wvalid: bool,
    pub wdata: u32,
    pub wstrb: u8,
    pub wlast: bool,

    // B channel
    pub bready: bool,

    // AR channel
    pub arvalid: bool,
    pub araddr: u32,
    pub arid: u8,
    pub arlen: u8,
    pub arburst: u8,

    // R channel
    pub rready: bool,
}

impl Axi4Master {
    /// Bus idle: no channel valid.
    pub fn idle() -> Axi4Master {
        Axi4Master::default()
    }
}

/// Slave-driven signals, one record per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Axi4Slave {
    pub awready: bool,
    pub wready: bool,

    pub bvalid: bool,
    pub bresp: u8,
    pub bid: u8,

    pub arready: bool,

    pub rvalid: bool,
    pub rdata: u32,
    pub rresp: u8,
    pub rid: u8,
    pub rlast: bool,
}

/// One-cycle step seam between a driver and an AXI4 responder.
pub trait Axi4Port {
    fn clk(&mut self, master: &Axi4Master) -> Axi4Slave;
}
