//! CPU execution engine for the IMAS.
//!
//! Implements the fetch-decode-execute cycle, the sixteen instruction
//! behaviors, and the per-cycle breakpoint check.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::memory::{ADDR_MASK, WriteMode};
use crate::cpu::monitor::{BreakpointMonitor, Snapshot};
use crate::io::{IoChannel, IoError};
use log::{debug, warn};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has stopped, either by HALT or by a fault.
    Halted(HaltReason),
}

/// Why the CPU stopped.
///
/// Every reason is a state transition, not a process abort: `run` returns
/// normally in all three cases and the caller decides what the outcome
/// means (the bundled binary exits nonzero for the fault reasons).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// The program executed HALT.
    Normal,
    /// A DIV instruction met a zero divisor.
    DivideByZero,
    /// A word failed to decode. Unreachable for a 4-bit opcode field with
    /// all 16 values defined; kept for defective decode paths.
    InvalidOpcode,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::Normal => write!(f, "normal halt"),
            HaltReason::DivideByZero => write!(f, "division by zero"),
            HaltReason::InvalidOpcode => write!(f, "invalid opcode"),
        }
    }
}

/// The outcome of one completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// The address the instruction was fetched from (PC before the fetch).
    /// This is the address the breakpoint monitor is keyed on.
    pub pc: u16,
    /// The decoded instruction, or `None` when the defensive decode fault
    /// tripped.
    pub instr: Option<Instruction>,
}

/// The IMAS CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for diagnostics).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Execute a single fetch-decode-execute cycle.
    ///
    /// Returns the pre-fetch PC (the breakpoint key for this cycle) and the
    /// instruction that ran. Architectural faults halt the CPU and still
    /// return `Ok`; `Err` is reserved for host-level failures such as a
    /// broken I/O channel or stepping a halted CPU.
    pub fn step(&mut self, io: &mut dyn IoChannel) -> Result<Step, CpuError> {
        if let CpuState::Halted(_) = self.state {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.regs.pc;
        self.regs.mar = pc;
        self.read_mar();
        self.regs.advance_pc();

        // Decode
        let word = self.regs.mbr as u16;
        self.regs.ir = word >> 12;
        self.regs.ibr = word & ADDR_MASK;

        let step = match decode::decode(word) {
            Ok(instr) => {
                debug!("{:03X}: {}", pc, instr);
                self.execute(instr, io)?;
                self.last_instr = Some(instr);
                Step { pc, instr: Some(instr) }
            }
            Err(e) => {
                warn!("{:03X}: {}, halting", pc, e);
                self.state = CpuState::Halted(HaltReason::InvalidOpcode);
                Step { pc, instr: None }
            }
        };

        self.cycles += 1;
        Ok(step)
    }

    /// Run until halt, checking the breakpoint monitor after every cycle.
    ///
    /// The check is keyed on the address fetched that cycle and happens
    /// unconditionally, so the halting cycle can still emit a snapshot.
    /// Returns why the CPU stopped.
    pub fn run(
        &mut self,
        io: &mut dyn IoChannel,
        monitor: &BreakpointMonitor,
        mut on_snapshot: impl FnMut(Snapshot),
    ) -> Result<HaltReason, CpuError> {
        loop {
            let step = self.step(io)?;
            if monitor.should_snapshot(step.pc) {
                on_snapshot(Snapshot::capture(&self.regs, step.pc));
            }
            if let CpuState::Halted(reason) = self.state {
                return Ok(reason);
            }
        }
    }

    /// Run for at most `max_cycles` instructions.
    ///
    /// Returns the number of instructions executed; the CPU may still be
    /// `Running` if the budget ran out first.
    pub fn run_limited(
        &mut self,
        max_cycles: u64,
        io: &mut dyn IoChannel,
        monitor: &BreakpointMonitor,
        mut on_snapshot: impl FnMut(Snapshot),
    ) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            let step = self.step(io)?;
            if monitor.should_snapshot(step.pc) {
                on_snapshot(Snapshot::capture(&self.regs, step.pc));
            }
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction, io: &mut dyn IoChannel) -> Result<(), CpuError> {
        match instr {
            // ==================== Control ====================

            Instruction::Halt => {
                self.state = CpuState::Halted(HaltReason::Normal);
            }

            Instruction::Jmp { addr } => {
                let target = addr & ADDR_MASK;
                self.regs.mar = target;
                self.regs.jump(target);
            }

            Instruction::Jz { addr } => {
                if self.regs.ac == 0 {
                    let target = addr & ADDR_MASK;
                    self.regs.mar = target;
                    self.regs.jump(target);
                }
            }

            Instruction::Jnz { addr } => {
                if self.regs.ac != 0 {
                    let target = addr & ADDR_MASK;
                    self.regs.mar = target;
                    self.regs.jump(target);
                }
            }

            Instruction::Jpos { addr } => {
                // Zero counts as non-negative
                if self.regs.ac >= 0 {
                    let target = addr & ADDR_MASK;
                    self.regs.mar = target;
                    self.regs.jump(target);
                }
            }

            // ==================== Memory Transfer ====================

            Instruction::Load { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.read_mar();
                self.regs.ac = self.regs.mbr;
            }

            Instruction::LoadMq => {
                self.regs.ac = self.regs.mq;
            }

            Instruction::LoadMqM { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.read_mar();
                self.regs.mq = self.regs.mbr;
            }

            Instruction::Stor { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.regs.mbr =
                    self.mem.write(self.regs.mar, self.regs.ac, WriteMode::Replace) as i16;
            }

            Instruction::Sta { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.regs.mbr =
                    self.mem.write(self.regs.mar, self.regs.ac, WriteMode::PatchAddress) as i16;
            }

            // ==================== Arithmetic ====================

            Instruction::Add { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.read_mar();
                self.regs.ac = self.regs.ac.wrapping_add(self.regs.mbr);
            }

            Instruction::Sub { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.read_mar();
                self.regs.ac = self.regs.ac.wrapping_sub(self.regs.mbr);
            }

            Instruction::Mul { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.read_mar();
                // Signed 32-bit product: high half to AC, low half to MQ
                let product = (self.regs.mq as i32).wrapping_mul(self.regs.mbr as i32);
                self.regs.ac = (product >> 16) as i16;
                self.regs.mq = product as i16;
            }

            Instruction::Div { addr } => {
                self.regs.mar = addr & ADDR_MASK;
                self.read_mar();
                let divisor = self.regs.mbr;

                if divisor == 0 {
                    // AC and MQ keep their pre-instruction values
                    warn!("division by zero, halting");
                    self.state = CpuState::Halted(HaltReason::DivideByZero);
                } else {
                    // Truncating toward zero; wrapping so i16::MIN / -1
                    // wraps instead of trapping
                    let quotient = self.regs.ac.wrapping_div(divisor);
                    let remainder = self.regs.ac.wrapping_rem(divisor);
                    self.regs.mq = quotient;
                    self.regs.ac = remainder;
                }
            }

            // ==================== I/O ====================

            Instruction::In => {
                self.regs.ac = io.read_int()?;
            }

            Instruction::Out => {
                io.write_int(self.regs.ac)?;
            }
        }

        Ok(())
    }

    /// Read the word addressed by MAR into MBR.
    fn read_mar(&mut self) {
        self.regs.mbr = self.mem.read(self.regs.mar) as i16;
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Why the CPU halted, if it has.
    pub fn halt_reason(&self) -> Option<HaltReason> {
        match self.state {
            CpuState::Running => None,
            CpuState::Halted(reason) => Some(reason),
        }
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        matches!(self.state, CpuState::Halted(_))
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur while driving the CPU.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("I/O channel error: {0}")]
    Io(#[from] IoError),
}
