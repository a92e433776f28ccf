#![allow(dead_code)]

use std::collections::VecDeque;

use minz::{Cpu, Disassembly, ExecutionFault, Io, LineSource};
use tracing_subscriber::fmt;

#[ctor::ctor]
fn init() {
    let fmt_subscriber = fmt::Subscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(fmt_subscriber)
        .expect("Unable to set global tracing subscriber");
}

/// Operator input replayed from a fixed script; exhausted scripts
/// answer empty lines.
pub fn scripted_lines(lines: &[&str]) -> Box<dyn LineSource> {
    let mut lines: VecDeque<String> = lines.iter().map(|s| s.to_string()).collect();
    Box::new(move || lines.pop_front().unwrap_or_default())
}

/// Just enough of a Z80-shaped core to exercise the machine contract:
/// NOP, HALT, LD A,n, JP nn, RET, IN A,(n), OUT (n),A. Anything else
/// faults as an illegal opcode, with the program counter already
/// advanced past the fetch.
pub struct TestZ80 {
    pub io: Io,
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub halted: bool,
}

impl TestZ80 {
    pub fn new(io: Io) -> Self {
        Self {
            io,
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            halted: false,
        }
    }

    fn fetch(&mut self) -> u8 {
        let byte = self.io.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn push_word(&mut self, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        self.io.write_word(self.sp, value);
    }

    fn pop_word(&mut self) -> u16 {
        let value = self.io.read_word(self.sp);
        self.sp = self.sp.wrapping_add(2);
        value
    }
}

impl Cpu for TestZ80 {
    fn pc(&self) -> u16 {
        self.pc
    }

    fn set_pc(&mut self, addr: u16) {
        self.pc = addr;
    }

    fn sp(&self) -> u16 {
        self.sp
    }

    fn set_sp(&mut self, addr: u16) {
        self.sp = addr;
    }

    fn execute(&mut self) -> Result<(), ExecutionFault> {
        let opcode = self.fetch();
        match opcode {
            0x00 => {}
            0x3E => self.a = self.fetch(),
            0x76 => self.halted = true,
            0xC3 => {
                let low = self.fetch() as u16;
                let high = self.fetch() as u16;
                self.pc = (high << 8) | low;
            }
            0xC9 => self.pc = self.pop_word(),
            0xD3 => {
                let port = self.fetch();
                self.io.port_out(port, self.a);
            }
            0xDB => {
                let port = self.fetch();
                self.a = self.io.port_in(port);
            }
            _ => return Err(ExecutionFault::IllegalOpcode(opcode)),
        }
        Ok(())
    }

    fn interrupt(&mut self, vector: u8) -> Result<(), ExecutionFault> {
        if vector > 7 {
            return Err(ExecutionFault::IllegalInterrupt(vector));
        }
        self.halted = false;
        let return_addr = self.pc;
        self.push_word(return_addr);
        self.pc = (vector as u16) * 8;
        Ok(())
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn disassemble(&self, addr: u16) -> Disassembly {
        let opcode = self.io.read_byte(addr);
        let arg = |n: u16| self.io.read_byte(addr.wrapping_add(n));
        let (mnemonic, operands, length) = match opcode {
            0x00 => ("nop", String::new(), 1),
            0x3E => ("ld", format!("a,{:02x}h", arg(1)), 2),
            0x76 => ("halt", String::new(), 1),
            0xC3 => ("jp", format!("{:04x}h", self.io.read_word(addr.wrapping_add(1))), 3),
            0xC9 => ("ret", String::new(), 1),
            0xD3 => ("out", format!("({:02x}h),a", arg(1)), 2),
            0xDB => ("in", format!("a,({:02x}h)", arg(1)), 2),
            _ => ("?", format!("{:02x}h", opcode), 1),
        };
        Disassembly {
            mnemonic: mnemonic.to_string(),
            operands,
            length,
        }
    }

    fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }
}
