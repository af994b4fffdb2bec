use crate::audio::FmStub;
use crate::ps2::{Mouse, Ps2Port};
use crate::vera::Vera;

mod io;
pub mod types;

use self::types::{EmuControl, IoDevice, MemRegion, Via};

pub const RAM_BANK_SIZE: usize = 0x2000;
pub const ROM_BANK_SIZE: usize = 0x4000;
pub const NUM_ROM_BANKS: usize = 32;
pub const NUM_MAX_RAM_BANKS: usize = 256;

const BANKED_RAM_BASE: u16 = 0xA000;
const ROM_BASE: u16 = 0xC000;
const LOW_RAM_END: usize = 0xA000;
const RESET_VECTOR: u16 = 0xFFFC;

/// The address-decoded memory bus: direct RAM, banked RAM and ROM windows,
/// and the $9F00 I/O page routing to VERA, the VIAs, the audio stubs, the
/// mouse window and the emulator-control registers.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Bus {
    ram: Vec<u8>,
    rom: Vec<u8>,
    ram_bank: u8,
    rom_bank: u8,
    num_ram_banks: u16,
    region_map: [MemRegion; 256],
    io_map: [IoDevice; 256],
    pub vera: Vera,
    via1: Via,
    via2: Via,
    fm: FmStub,
    pub emu: EmuControl,
    pub ps2: [Ps2Port; 2],
    pub mouse: Mouse,
    /// Snapshot of the CPU cycle counter for the emulator-control
    /// registers; refreshed by the embedding around each instruction.
    cpu_cycles: u32,
}

impl Bus {
    pub fn new(num_ram_banks: usize) -> Self {
        let banks = num_ram_banks.clamp(1, NUM_MAX_RAM_BANKS);
        Self {
            ram: vec![0; LOW_RAM_END + banks * RAM_BANK_SIZE],
            rom: vec![0; NUM_ROM_BANKS * ROM_BANK_SIZE],
            ram_bank: 0,
            rom_bank: 0,
            num_ram_banks: banks as u16,
            region_map: build_region_map(),
            io_map: build_io_map(),
            vera: Vera::new(),
            via1: Via::new(),
            via2: Via::new(),
            fm: FmStub::new(),
            emu: EmuControl::new(),
            ps2: [Ps2Port::new(), Ps2Port::new()],
            mouse: Mouse::new(),
            cpu_cycles: 0,
        }
    }

    #[inline]
    pub fn read(&mut self, addr: u16) -> u8 {
        match self.region_map[(addr >> 8) as usize] {
            MemRegion::Null => 0,
            MemRegion::Direct => self.ram[addr as usize],
            MemRegion::Io => self.io_read(addr, false),
            MemRegion::RamBank => self.ram[self.banked_ram_index(addr, self.ram_bank)],
            MemRegion::RomBank => self.rom[self.rom_index(addr, self.rom_bank)],
        }
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        match self.region_map[(addr >> 8) as usize] {
            MemRegion::Null => {}
            MemRegion::Direct => self.ram[addr as usize] = value,
            MemRegion::Io => self.io_write(addr, value),
            MemRegion::RamBank => {
                let index = self.banked_ram_index(addr, self.ram_bank);
                self.ram[index] = value;
            }
            MemRegion::RomBank => {} // writes to ROM are ignored
        }
    }

    /// Tooling read with an explicit bank and no side effects: the video
    /// data ports return their latch without advancing, nothing probes the
    /// audio stubs.
    pub fn debug_read(&mut self, addr: u16, bank: u8) -> u8 {
        match self.region_map[(addr >> 8) as usize] {
            MemRegion::Null => 0,
            MemRegion::Direct => self.ram[addr as usize],
            MemRegion::Io => self.io_read(addr, true),
            MemRegion::RamBank => self.ram[self.banked_ram_index(addr, bank)],
            MemRegion::RomBank => {
                let bank = (bank as usize) % NUM_ROM_BANKS;
                self.rom[bank * ROM_BANK_SIZE + (addr - ROM_BASE) as usize]
            }
        }
    }

    #[inline]
    fn banked_ram_index(&self, addr: u16, bank: u8) -> usize {
        let bank = (bank as usize) % self.num_ram_banks as usize;
        LOW_RAM_END + bank * RAM_BANK_SIZE + (addr - BANKED_RAM_BASE) as usize
    }

    #[inline]
    fn rom_index(&self, addr: u16, bank: u8) -> usize {
        (bank as usize % NUM_ROM_BANKS) * ROM_BANK_SIZE + (addr - ROM_BASE) as usize
    }

    #[inline]
    pub fn read_u16(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    #[inline]
    pub fn write_u16(&mut self, addr: u16, value: u16) {
        self.write(addr, (value & 0x00FF) as u8);
        self.write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Copy a slice into memory starting at the given address.
    pub fn load(&mut self, start: u16, data: &[u8]) {
        let mut addr = start;
        for byte in data {
            self.write(addr, *byte);
            addr = addr.wrapping_add(1);
        }
    }

    /// Install a ROM image starting at bank 0. Oversized images are
    /// truncated to the 32-bank window.
    pub fn load_rom(&mut self, data: &[u8]) {
        let len = data.len().min(self.rom.len());
        self.rom[..len].copy_from_slice(&data[..len]);
    }

    /// Patch a byte in a specific ROM bank; the offset is relative to the
    /// $C000 window.
    pub fn write_rom(&mut self, bank: u8, offset: u16, value: u8) {
        let index = (bank as usize % NUM_ROM_BANKS) * ROM_BANK_SIZE
            + (offset as usize & (ROM_BANK_SIZE - 1));
        self.rom[index] = value;
    }

    /// Point the reset vector (in ROM bank 0) at the given address.
    pub fn set_reset_vector(&mut self, target: u16) {
        self.write_rom(0, RESET_VECTOR - ROM_BASE, (target & 0xFF) as u8);
        self.write_rom(0, RESET_VECTOR - ROM_BASE + 1, (target >> 8) as u8);
    }

    pub fn set_ram_bank(&mut self, bank: u8) {
        self.ram_bank = bank & (NUM_MAX_RAM_BANKS - 1) as u8;
    }

    pub fn ram_bank(&self) -> u8 {
        self.ram_bank
    }

    /// RAM bank reduced modulo the configured bank count, as seen by the
    /// banked window.
    pub fn effective_ram_bank(&self) -> u8 {
        (self.ram_bank as u16 % self.num_ram_banks) as u8
    }

    pub fn set_rom_bank(&mut self, bank: u8) {
        self.rom_bank = bank & (NUM_ROM_BANKS - 1) as u8;
    }

    pub fn rom_bank(&self) -> u8 {
        self.rom_bank
    }

    pub fn num_ram_banks(&self) -> usize {
        self.num_ram_banks as usize
    }

    pub fn set_cpu_cycles(&mut self, cycles: u32) {
        self.cpu_cycles = cycles;
    }

    /// Combined interrupt level from the video coprocessor.
    pub fn irq_pending(&self) -> bool {
        self.vera.irq_out()
    }

    pub fn mouse_move(&mut self, dx: i16, dy: i16) {
        let (mouse, port) = (&mut self.mouse, &mut self.ps2[1]);
        mouse.moved(port, dx, dy);
    }

    pub fn mouse_button_down(&mut self, num: u8) {
        let (mouse, port) = (&mut self.mouse, &mut self.ps2[1]);
        mouse.button_down(port, num);
    }

    pub fn mouse_button_up(&mut self, num: u8) {
        let (mouse, port) = (&mut self.mouse, &mut self.ps2[1]);
        mouse.button_up(port, num);
    }

    /// Raw snapshot of system memory: the low RAM block, optionally
    /// followed by the whole banked block.
    pub fn save_memory<W: std::io::Write>(
        &self,
        writer: &mut W,
        dump_ram: bool,
        dump_bank: bool,
    ) -> std::io::Result<()> {
        if dump_ram {
            writer.write_all(&self.ram[..LOW_RAM_END])?;
        }
        if dump_bank {
            writer.write_all(&self.ram[LOW_RAM_END..])?;
        }
        Ok(())
    }
}

fn build_region_map() -> [MemRegion; 256] {
    let mut map = [MemRegion::Null; 256];
    let ranges: [(usize, usize, MemRegion); 4] = [
        (0x00, 0x9E, MemRegion::Direct),
        (0x9F, 0x9F, MemRegion::Io),
        (0xA0, 0xBF, MemRegion::RamBank),
        (0xC0, 0xFF, MemRegion::RomBank),
    ];
    for (start, end, kind) in ranges {
        for entry in map.iter_mut().take(end + 1).skip(start) {
            *entry = kind;
        }
    }
    map
}

fn build_io_map() -> [IoDevice; 256] {
    let mut map = [IoDevice::Null; 256];
    let ranges: [(usize, usize, IoDevice); 10] = [
        (0x00, 0x1F, IoDevice::Sound),
        (0x20, 0x3F, IoDevice::Video),
        (0x40, 0x5F, IoDevice::Lcd),
        (0x60, 0x6F, IoDevice::Via1),
        (0x70, 0x7F, IoDevice::Via2),
        (0x80, 0x9F, IoDevice::Rtc),
        (0xA0, 0xAF, IoDevice::Mouse),
        (0xB0, 0xBF, IoDevice::Emu),
        (0xC0, 0xDF, IoDevice::Null),
        (0xE0, 0xFF, IoDevice::Sound),
    ];
    for (start, end, kind) in ranges {
        for entry in map.iter_mut().take(end + 1).skip(start) {
            *entry = kind;
        }
    }
    map
}

#[cfg(test)]
mod tests;
