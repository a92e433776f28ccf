use std::{cell::RefCell, rc::Rc};

use thiserror::Error;

use crate::{
    bus::{Bus, WINDOW_SIZE},
    console::{Console, LineSource, StdinLineSource, DEFAULT_WIDTH},
    cpu::{Cpu, ExecutionFault},
    device::{DeviceType, RamDevice, RomDevice},
    utils::hexdump,
};

/// Opcode the bootstrap fills memory with; executing it halts the CPU.
pub const HALT_FILL: u8 = 0x76;

/// Initial stack pointer. The same address is pushed at bootstrap, so
/// an unmatched RET lands in the halt fill instead of underflowing.
pub const STACK_INIT: u16 = 0x0400;

/// The single modeled interrupt source.
pub const IRQ_VECTOR: u8 = 0;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("execution fault: {instruction} ({source})")]
    Fault {
        /// Program counter at the start of the faulting cycle.
        address: u16,
        /// Formatted disassembly at that address.
        instruction: String,
        source: ExecutionFault,
    },
}

/// Memory and port surface handed to the CPU core at construction.
/// Memory traffic goes to the bus, port traffic to the console — every
/// port, since the console is the only peripheral on the channel.
#[derive(Clone)]
pub struct Io {
    pub bus: Rc<RefCell<Bus>>,
    pub console: Rc<RefCell<Console>>,
}

impl Io {
    pub fn new(bus: Rc<RefCell<Bus>>, console: Rc<RefCell<Console>>) -> Self {
        Self { bus, console }
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        self.bus.borrow().read_byte(address)
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        self.bus.borrow_mut().write_byte(address, value);
    }

    pub fn read_word(&self, address: u16) -> u16 {
        self.bus.borrow().read_word(address)
    }

    pub fn write_word(&mut self, address: u16, value: u16) {
        self.bus.borrow_mut().write_word(address, value);
    }

    pub fn port_in(&self, port: u8) -> u8 {
        self.console.borrow_mut().read(port)
    }

    pub fn port_out(&mut self, port: u8, value: u8) {
        self.console.borrow_mut().write(port, value);
    }
}

/// The machine proper: bus, console, and CPU, driven one instruction or
/// one interrupt per cycle until the CPU halts or faults.
pub struct Machine<C> {
    pub bus: Rc<RefCell<Bus>>,
    pub console: Rc<RefCell<Console>>,
    pub cpu: C,
    irq_pending: bool,
}

impl<C: Cpu> Machine<C> {
    pub fn new(bus: Bus, console: Console, make_cpu: impl FnOnce(Io) -> C) -> Self {
        let bus = Rc::new(RefCell::new(bus));
        let console = Rc::new(RefCell::new(console));
        let cpu = make_cpu(Io::new(bus.clone(), console.clone()));

        Self {
            bus,
            console,
            cpu,
            irq_pending: false,
        }
    }

    /// Arm the safety net before anything is loaded: every writable
    /// byte becomes a halt instruction, and the stack starts with one
    /// frame pointing back into the fill. Control transferred anywhere
    /// unprogrammed, by a jump or an unmatched RET, halts the CPU
    /// instead of chewing through garbage.
    pub fn bootstrap(&mut self) {
        tracing::info!("bootstrap: halt fill {:#04X}, sp {:#06X}", HALT_FILL, STACK_INIT);

        let fill = vec![HALT_FILL; self.bus.borrow().mem_size()];
        self.bus.borrow_mut().write_block(0x0000, &fill);

        self.cpu.set_sp(STACK_INIT);
        self.push_word(STACK_INIT);
    }

    fn push_word(&mut self, value: u16) {
        let sp = self.cpu.sp().wrapping_sub(2);
        self.bus.borrow_mut().write_word(sp, value);
        self.cpu.set_sp(sp);
    }

    /// Load a program image into memory through normal bus writes.
    pub fn load(&mut self, start_addr: u16, data: &[u8]) {
        self.bus.borrow_mut().write_block(start_addr, data);
    }

    /// Flag an interrupt for the next cycle. Called by whatever stands
    /// in for an external timer or peripheral line.
    pub fn raise_irq(&mut self) {
        self.irq_pending = true;
    }

    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// One cycle: service the pending interrupt if there is one,
    /// otherwise execute one instruction. On a fault the program
    /// counter is rolled back to where the cycle started so the
    /// diagnostic names the instruction that failed, not wherever the
    /// CPU left its state.
    pub fn cycle(&mut self) -> Result<(), MachineError> {
        let pc = self.cpu.pc();
        let result = if self.irq_pending {
            self.irq_pending = false;
            self.cpu.interrupt(IRQ_VECTOR)
        } else {
            self.cpu.execute()
        };
        result.map_err(|fault| self.fault_diagnostic(pc, fault))
    }

    /// Run until the CPU halts. Exactly one fault ends the run.
    pub fn run(&mut self) -> Result<(), MachineError> {
        while !self.cpu.is_halted() {
            self.cycle()?;
        }
        Ok(())
    }

    fn fault_diagnostic(&mut self, pc: u16, fault: ExecutionFault) -> MachineError {
        self.cpu.set_pc(pc);
        let instruction = self.instruction_at(pc);
        tracing::warn!("execution fault at {:04x}: {}", pc, fault);
        MachineError::Fault {
            address: pc,
            instruction,
            source: fault,
        }
    }

    /// `<address> <mnemonic> <operands>` for the instruction at `addr`.
    pub fn instruction_at(&self, addr: u16) -> String {
        let da = self.cpu.disassemble(addr);
        format!("{:04x} {:<5} {}", addr, da.mnemonic, da.operands)
    }

    pub fn current_instruction(&self) -> String {
        self.instruction_at(self.cpu.pc())
    }

    /// Fixed-width dump of the primary register pairs.
    pub fn quick_regs(&self) -> String {
        format!(
            "af:{:04x} bc:{:04x} de:{:04x} hl:{:04x}",
            self.cpu.af(),
            self.cpu.bc(),
            self.cpu.de(),
            self.cpu.hl()
        )
    }

    /// Execute exactly one instruction, returning the instruction text
    /// before and after the step, for interactive tracing.
    pub fn step(&mut self) -> Result<(String, String), MachineError> {
        let pc = self.cpu.pc();
        let executed = self.current_instruction();
        self.cpu
            .execute()
            .map_err(|fault| self.fault_diagnostic(pc, fault))?;
        Ok((executed, self.current_instruction()))
    }

    pub fn memory_dump(&self, start: u16, end: u16) -> String {
        let bus = self.bus.borrow();
        let bytes: Vec<u8> = (start..=end).map(|addr| bus.read_byte(addr)).collect();
        hexdump(&bytes, start)
    }
}

#[derive(Default)]
pub struct MachineBuilder {
    windows: Vec<(usize, DeviceType)>,
    display_width: Option<usize>,
    line_source: Option<Box<dyn LineSource>>,
}

impl MachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ram_window(mut self, index: usize) -> Self {
        self.windows
            .push((index, DeviceType::Ram(RamDevice::new(WINDOW_SIZE))));
        self
    }

    pub fn rom_window(mut self, index: usize, data: &[u8]) -> Self {
        self.windows
            .push((index, DeviceType::Rom(RomDevice::new(data, WINDOW_SIZE))));
        self
    }

    pub fn device(mut self, index: usize, device: DeviceType) -> Self {
        self.windows.push((index, device));
        self
    }

    pub fn display_width(mut self, width: usize) -> Self {
        self.display_width = Some(width);
        self
    }

    pub fn line_source(mut self, source: Box<dyn LineSource>) -> Self {
        self.line_source = Some(source);
        self
    }

    pub fn build<C: Cpu>(self, make_cpu: impl FnOnce(Io) -> C) -> Machine<C> {
        let mut bus = Bus::new();
        for (index, device) in self.windows {
            tracing::info!("window {:02}: {}", index, device);
            bus.install(index, device);
        }

        let console = Console::new(
            self.display_width.unwrap_or(DEFAULT_WIDTH),
            self.line_source.unwrap_or_else(|| Box::new(StdinLineSource)),
        );

        Machine::new(bus, console, make_cpu)
    }
}
