//! CPU emulation for the IMAS machine.
//!
//! This module implements the complete architecture:
//! - 4096 sixteen-bit memory words shared by instructions and data
//! - 7 registers: PC, MAR, IR, IBR, MBR, AC (accumulator), MQ
//! - 16-instruction set with single-address format
//! - an address-triggered register-snapshot monitor

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod monitor;

pub use memory::{Memory, WriteMode, MEMORY_SIZE, ADDR_MASK};
pub use registers::Registers;
pub use decode::{Instruction, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, HaltReason, Step};
pub use monitor::{BreakpointMonitor, Snapshot};
