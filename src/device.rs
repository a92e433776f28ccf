use std::{
    fmt::{self, Debug},
    fs::File,
    io::Read,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

/// Byte answered by reads that reach no mapped storage.
pub const SENTINEL: u8 = 0xFF;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub enum DeviceType {
    Empty,
    Ram(RamDevice),
    Rom(RomDevice),
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Empty => write!(f, "Empty"),
            DeviceType::Ram(dev) => write!(f, "RAM size={:#06X}", dev.size()),
            DeviceType::Rom(dev) => write!(
                f,
                "ROM path={:?} size={:#06X}",
                dev.rom_path,
                dev.size()
            ),
        }
    }
}

impl DeviceType {
    pub fn read(&self, offset: u16) -> u8 {
        match self {
            DeviceType::Empty => SENTINEL,
            DeviceType::Ram(dev) => dev.read(offset),
            DeviceType::Rom(dev) => dev.read(offset),
        }
    }

    pub fn write(&mut self, offset: u16, value: u8) {
        match self {
            DeviceType::Empty => {}
            DeviceType::Ram(dev) => dev.write(offset, value),
            DeviceType::Rom(dev) => dev.write(offset, value),
        }
    }

    /// Bulk preload of device contents, done once at setup time. Unlike
    /// `write`, this also reaches ROM, which is how firmware images get
    /// in before write protection matters.
    pub fn load(&mut self, origin: u16, bytes: &[u8]) {
        match self {
            DeviceType::Empty => {
                tracing::trace!("ignoring load of {} byte(s) into empty window", bytes.len());
            }
            DeviceType::Ram(dev) => dev.load(origin, bytes),
            DeviceType::Rom(dev) => dev.load(origin, bytes),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            DeviceType::Empty => 0,
            DeviceType::Ram(dev) => dev.size(),
            DeviceType::Rom(dev) => dev.size(),
        }
    }
}

pub trait Device: Debug {
    fn read(&self, offset: u16) -> u8;
    fn write(&mut self, offset: u16, value: u8);
    fn load(&mut self, origin: u16, bytes: &[u8]);
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct RomDevice {
    pub rom_path: Option<PathBuf>,
    pub data: Vec<u8>,
}

impl RomDevice {
    pub fn new(rom: &[u8], size: usize) -> Self {
        let mut data = vec![SENTINEL; size];
        let len = rom.len().min(size);
        data[..len].copy_from_slice(&rom[..len]);

        RomDevice {
            rom_path: None,
            data,
        }
    }

    pub fn from_file(rom_path: PathBuf, size: usize) -> anyhow::Result<Self> {
        let mut file = File::open(&rom_path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        let mut rom = Self::new(&buffer, size);
        rom.rom_path = Some(rom_path);

        Ok(rom)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Device for RomDevice {
    fn read(&self, offset: u16) -> u8 {
        if (offset as usize) >= self.data.len() {
            return SENTINEL;
        }
        self.data[offset as usize]
    }

    fn write(&mut self, offset: u16, _value: u8) {
        tracing::trace!("ignoring write to ROM offset {:#06X}", offset);
    }

    fn load(&mut self, origin: u16, bytes: &[u8]) {
        let origin = origin as usize;
        if origin >= self.data.len() {
            return;
        }
        let end = (origin + bytes.len()).min(self.data.len());
        self.data[origin..end].copy_from_slice(&bytes[..end - origin]);
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct RamDevice {
    pub data: Vec<u8>,
}

impl RamDevice {
    pub fn new(size: usize) -> Self {
        RamDevice {
            data: vec![SENTINEL; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Device for RamDevice {
    fn read(&self, offset: u16) -> u8 {
        if (offset as usize) >= self.data.len() {
            tracing::warn!(
                "read from out of bounds RAM offset {:#06X}, returning {:#04X}",
                offset,
                SENTINEL
            );
            return SENTINEL;
        }
        self.data[offset as usize]
    }

    fn write(&mut self, offset: u16, value: u8) {
        if (offset as usize) >= self.data.len() {
            return;
        }
        self.data[offset as usize] = value;
    }

    fn load(&mut self, origin: u16, bytes: &[u8]) {
        let origin = origin as usize;
        if origin >= self.data.len() {
            return;
        }
        let end = (origin + bytes.len()).min(self.data.len());
        self.data[origin..end].copy_from_slice(&bytes[..end - origin]);
    }
}
