//! Cycle-based verification components for an SDRAM memory controller.
//!
//! The crate provides the two stateful halves of the testbench: a
//! behavioral model of the SDRAM device behind the controller under test,
//! and APB4/AXI4 bus transaction drivers that stimulate the controller's
//! host port. Signal wiring to the RTL instance, the random access
//! sequencer and the top-level harness live outside this crate.

pub mod apb;
pub mod apb_driver;
pub mod axi4;
pub mod axi4_driver;
pub mod mem;
pub mod sdram;
