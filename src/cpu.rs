use thiserror::Error;

/// Failure signaled by the CPU while executing an instruction or
/// servicing an interrupt. One fault ends the run; there is no retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionFault {
    #[error("illegal opcode {0:#04x}")]
    IllegalOpcode(u8),
    #[error("illegal interrupt vector {0:#04x}")]
    IllegalInterrupt(u8),
}

/// One decoded instruction, as reported by the CPU's disassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub mnemonic: String,
    pub operands: String,
    /// Instruction length in bytes.
    pub length: u8,
}

/// Contract for the CPU core driven by the machine. The core owns its
/// own register state and performs memory and port traffic through the
/// `Io` handle it was constructed with; the machine only steps it,
/// raises interrupts, and reads registers back for diagnostics.
pub trait Cpu {
    fn pc(&self) -> u16;
    fn set_pc(&mut self, addr: u16);

    fn sp(&self) -> u16;
    fn set_sp(&mut self, addr: u16);

    /// Execute exactly one instruction, including any bus or port side
    /// effects it performs.
    fn execute(&mut self) -> Result<(), ExecutionFault>;

    /// Service a maskable interrupt with the given vector.
    fn interrupt(&mut self, vector: u8) -> Result<(), ExecutionFault>;

    fn is_halted(&self) -> bool;

    fn disassemble(&self, addr: u16) -> Disassembly;

    // Primary register pairs, for diagnostics only.
    fn af(&self) -> u16;
    fn bc(&self) -> u16;
    fn de(&self) -> u16;
    fn hl(&self) -> u16;
}
