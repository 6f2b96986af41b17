//! # IMAS Emulator
//!
//! An emulator of the IMAS teaching machine: an IAS-style von Neumann
//! computer with a single accumulator, a 4096-word memory shared by
//! instructions and data, and a 16-instruction opcode set.
//!
//! The emulator exists to observe instruction-level machine state: it runs
//! a memory image cycle by cycle and can emit a full register snapshot
//! whenever a configured address is fetched from.

pub mod cpu;
pub mod image;
pub mod io;

// Re-export commonly used types
pub use cpu::{
    Cpu, CpuState, CpuError, HaltReason, Memory, Registers, Instruction,
    BreakpointMonitor, Snapshot, WriteMode, MEMORY_SIZE,
};
pub use image::{MemoryImage, ImageError, parse_image, load_image, parse_breakpoints};
pub use io::{IoChannel, IoError, ConsoleIo, ScriptedIo};
