pub mod bus;
pub mod console;
pub mod cpu;
pub mod device;
pub mod machine;
pub mod utils;

pub use bus::{Bus, WINDOW_COUNT, WINDOW_MASK, WINDOW_SIZE};
pub use console::{Console, LineSource, StdinLineSource, DEFAULT_WIDTH, PLACEHOLDER};
pub use cpu::{Cpu, Disassembly, ExecutionFault};
pub use device::{DeviceType, RamDevice, RomDevice, SENTINEL};
pub use machine::{Io, Machine, MachineBuilder, MachineError, HALT_FILL, IRQ_VECTOR, STACK_INIT};
pub use utils::hexdump;

/// The minimal memory map: 2KB of RAM at 0x0000, 2KB of ROM at 0x0800,
/// everything above unmapped.
pub fn minimal_machine<C: Cpu>(rom: &[u8], make_cpu: impl FnOnce(Io) -> C) -> Machine<C> {
    MachineBuilder::new()
        .ram_window(0)
        .rom_window(1, rom)
        .build(make_cpu)
}
