use crate::bus::Bus;

pub const FLAG_CARRY: u8 = 0b0000_0001;
pub const FLAG_ZERO: u8 = 0b0000_0010;
pub const FLAG_INTERRUPT_DISABLE: u8 = 0b0000_0100;
pub const FLAG_DECIMAL: u8 = 0b0000_1000;
pub const FLAG_BREAK: u8 = 0b0001_0000;
pub const FLAG_CONSTANT: u8 = 0b0010_0000;
pub const FLAG_OVERFLOW: u8 = 0b0100_0000;
pub const FLAG_NEGATIVE: u8 = 0b1000_0000;

const VECTOR_NMI: u16 = 0xFFFA;
const VECTOR_RESET: u16 = 0xFFFC;
const VECTOR_IRQ_BRK: u16 = 0xFFFE;

const STACK_BASE: u16 = 0x0100;
const INTERRUPT_CYCLES: u32 = 7;

/// 65C02 CPU core.
/// Covers the full documented instruction matrix including the Rockwell
/// bit ops (BBR/BBS, RMB/SMB), (zp) addressing, JMP (abs,X) and WAI.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    waiting: bool,
    nmi_pending: bool,
    /// Monotonic (wrapping) cycle counter, exposed byte-wise through the
    /// emulator-control registers.
    pub cycles: u32,
    pub instructions: u32,
    clock_goal: u32,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: FLAG_CONSTANT,
            waiting: false,
            nmi_pending: false,
            cycles: 0,
            instructions: 0,
            clock_goal: 0,
        }
    }

    /// Load PC from the reset vector and restore the power-on register
    /// state. The constant status bit is forced on; other flags keep
    /// whatever they held, like the hardware.
    pub fn reset(&mut self, bus: &mut Bus) {
        self.pc = bus.read_u16(VECTOR_RESET);
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.status |= FLAG_CONSTANT;
        self.waiting = false;
        self.nmi_pending = false;
    }

    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Hardware IRQ entry: push PC and status with break cleared, set the
    /// interrupt-disable flag, vector through $FFFE. Wakes a WAI.
    pub fn irq(&mut self, bus: &mut Bus) {
        let pc = self.pc;
        self.push_byte(bus, (pc >> 8) as u8);
        self.push_byte(bus, pc as u8);
        self.push_byte(bus, self.status & !FLAG_BREAK);
        self.set_flag(FLAG_INTERRUPT_DISABLE, true);
        self.pc = bus.read_u16(VECTOR_IRQ_BRK);
        self.waiting = false;
        self.cycles = self.cycles.wrapping_add(INTERRUPT_CYCLES);
    }

    /// NMI entry: like IRQ but the status byte is pushed unmodified and the
    /// vector is $FFFA.
    pub fn nmi(&mut self, bus: &mut Bus) {
        let pc = self.pc;
        self.push_byte(bus, (pc >> 8) as u8);
        self.push_byte(bus, pc as u8);
        self.push_byte(bus, self.status);
        self.set_flag(FLAG_INTERRUPT_DISABLE, true);
        self.pc = bus.read_u16(VECTOR_NMI);
        self.waiting = false;
        self.cycles = self.cycles.wrapping_add(INTERRUPT_CYCLES);
    }

    /// Repeat `step` until `budget` more cycles have elapsed. With the WAI
    /// latch set the whole budget is charged to the counter immediately.
    pub fn exec(&mut self, bus: &mut Bus, budget: u32) {
        if self.waiting && !(bus.irq_pending() && !self.get_flag(FLAG_INTERRUPT_DISABLE)) {
            self.cycles = self.cycles.wrapping_add(budget);
            self.clock_goal = self.cycles;
            return;
        }

        self.clock_goal = self.clock_goal.wrapping_add(budget);
        while (self.clock_goal.wrapping_sub(self.cycles) as i32) > 0 {
            if self.waiting && !(bus.irq_pending() && !self.get_flag(FLAG_INTERRUPT_DISABLE)) {
                self.cycles = self.clock_goal;
                break;
            }
            self.step_inner(bus);
        }
    }

    /// Execute one instruction (or service a pending interrupt) and return
    /// the cycles consumed.
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        let cycles = self.step_inner(bus);
        self.clock_goal = self.cycles;
        cycles
    }

    fn step_inner(&mut self, bus: &mut Bus) -> u32 {
        let start = self.cycles;

        if self.nmi_pending {
            self.nmi_pending = false;
            self.nmi(bus);
            return self.cycles.wrapping_sub(start);
        }

        if bus.irq_pending() && !self.get_flag(FLAG_INTERRUPT_DISABLE) {
            self.irq(bus);
            return self.cycles.wrapping_sub(start);
        }

        if self.waiting {
            self.cycles = self.cycles.wrapping_add(1);
            return 1;
        }

        let opcode = self.fetch_byte(bus);
        let base = Self::opcode_base_cycles(opcode);
        let cycles = self.dispatch(bus, opcode, base) as u32;
        self.cycles = self.cycles.wrapping_add(cycles);
        self.instructions = self.instructions.wrapping_add(1);
        cycles
    }

    /// 65C02 base cycle table. Page-crossing and branch penalties are added
    /// by the dispatch arms; slots not in the documented matrix fall through
    /// to 2-cycle NOPs.
    fn opcode_base_cycles(opcode: u8) -> u8 {
        match opcode {
            // implied, accumulator, immediate, branch not-taken, push/pull
            0x0A | 0x1A | 0x2A | 0x3A | 0x4A | 0x6A | 0x09 | 0x29 | 0x49 | 0x69 | 0xA0 | 0xA2
            | 0xA9 | 0xC0 | 0xC9 | 0xE0 | 0xE9 | 0x10 | 0x30 | 0x50 | 0x70 | 0x80 | 0x90 | 0xB0
            | 0xD0 | 0xF0 | 0x18 | 0x38 | 0x58 | 0x78 | 0xB8 | 0xD8 | 0xF8 | 0xCA | 0x88 | 0xE8
            | 0xC8 | 0xAA | 0xA8 | 0x8A | 0x98 | 0xBA | 0x9A | 0x48 | 0x08 | 0xDA | 0x5A | 0x68
            | 0x28 | 0xFA | 0x7A | 0xEA => 2,

            // zero-page reads/writes, BIT imm/zp/zp,X, JMP abs, WAI,
            // BBR/BBS base (penalty added at address time)
            0x05 | 0x25 | 0x45 | 0x65 | 0xA5 | 0xC5 | 0xE5 | 0xA4 | 0xA6 | 0xC4 | 0xE4 | 0x24
            | 0x89 | 0x34 | 0x85 | 0x86 | 0x84 | 0x64 | 0x4C | 0xCB => 3,

            // zp-indexed and absolute reads/writes, absolute-indexed reads
            0x15 | 0x35 | 0x55 | 0x75 | 0xB5 | 0xD5 | 0xF5 | 0xB4 | 0xB6 | 0x0D | 0x2D | 0x4D
            | 0x6D | 0xAD | 0xCD | 0xED | 0xAC | 0xAE | 0xCC | 0xEC | 0x2C | 0x3C | 0x1D | 0x3D
            | 0x5D | 0x7D | 0xBD | 0xDD | 0xFD | 0x19 | 0x39 | 0x59 | 0x79 | 0xB9 | 0xD9 | 0xF9
            | 0xBC | 0xBE | 0x95 | 0x94 | 0x96 | 0x8D | 0x8E | 0x8C | 0x74 | 0x9C => 4,

            // zp RMW, RMB/SMB, TRB/TSB zp, (zp) ops, (zp),Y reads,
            // absolute-indexed stores, JMP (abs)
            0x06 | 0x26 | 0x46 | 0x66 | 0xC6 | 0xE6 | 0x07 | 0x17 | 0x27 | 0x37 | 0x47 | 0x57
            | 0x67 | 0x77 | 0x87 | 0x97 | 0xA7 | 0xB7 | 0xC7 | 0xD7 | 0xE7 | 0xF7 | 0x14 | 0x04
            | 0x12 | 0x32 | 0x52 | 0x72 | 0xB2 | 0xD2 | 0xF2 | 0x92 | 0x11 | 0x31 | 0x51 | 0x71
            | 0xB1 | 0xD1 | 0xF1 | 0x9D | 0x99 | 0x9E | 0x6C => 5,

            // absolute and zp-indexed RMW, TRB/TSB abs, (zp,X) ops,
            // STA (zp),Y, JSR/RTS/RTI, JMP (abs,X)
            0x0E | 0x2E | 0x4E | 0x6E | 0xCE | 0xEE | 0x16 | 0x36 | 0x56 | 0x76 | 0xD6 | 0xF6
            | 0x1C | 0x0C | 0x01 | 0x21 | 0x41 | 0x61 | 0xA1 | 0xC1 | 0xE1 | 0x81 | 0x91 | 0x20
            | 0x60 | 0x40 | 0x7C => 6,

            // absolute-indexed RMW, BRK
            0x1E | 0x3E | 0x5E | 0x7E | 0xDE | 0xFE | 0x00 => 7,

            // the remaining 65C02 matrix holes are single-byte NOPs
            _ => 2,
        }
    }

    fn dispatch(&mut self, bus: &mut Bus, opcode: u8, base: u8) -> u8 {
        match opcode {
            // Load A
            0xA9 => {
                let value = self.fetch_byte(bus);
                self.lda(value, base)
            }
            0xA5 => {
                let addr = self.addr_zeropage(bus);
                self.lda(bus.read(addr), base)
            }
            0xB5 => {
                let addr = self.addr_zeropage_x(bus);
                self.lda(bus.read(addr), base)
            }
            0xAD => {
                let addr = self.addr_absolute(bus);
                self.lda(bus.read(addr), base)
            }
            0xBD => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                self.lda(bus.read(addr), base + crossed as u8)
            }
            0xB9 => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                self.lda(bus.read(addr), base + crossed as u8)
            }
            0xA1 => {
                let addr = self.addr_indexed_indirect_x(bus);
                self.lda(bus.read(addr), base)
            }
            0xB1 => {
                let (addr, crossed) = self.addr_indirect_y(bus);
                self.lda(bus.read(addr), base + crossed as u8)
            }
            0xB2 => {
                let addr = self.addr_indirect_zp(bus);
                self.lda(bus.read(addr), base)
            }

            // Load X
            0xA2 => {
                let value = self.fetch_byte(bus);
                self.ldx(value, base)
            }
            0xA6 => {
                let addr = self.addr_zeropage(bus);
                self.ldx(bus.read(addr), base)
            }
            0xB6 => {
                let addr = self.addr_zeropage_y(bus);
                self.ldx(bus.read(addr), base)
            }
            0xAE => {
                let addr = self.addr_absolute(bus);
                self.ldx(bus.read(addr), base)
            }
            0xBE => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                self.ldx(bus.read(addr), base + crossed as u8)
            }

            // Load Y
            0xA0 => {
                let value = self.fetch_byte(bus);
                self.ldy(value, base)
            }
            0xA4 => {
                let addr = self.addr_zeropage(bus);
                self.ldy(bus.read(addr), base)
            }
            0xB4 => {
                let addr = self.addr_zeropage_x(bus);
                self.ldy(bus.read(addr), base)
            }
            0xAC => {
                let addr = self.addr_absolute(bus);
                self.ldy(bus.read(addr), base)
            }
            0xBC => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                self.ldy(bus.read(addr), base + crossed as u8)
            }

            // Store A
            0x85 => {
                let addr = self.addr_zeropage(bus);
                bus.write(addr, self.a);
                base
            }
            0x95 => {
                let addr = self.addr_zeropage_x(bus);
                bus.write(addr, self.a);
                base
            }
            0x8D => {
                let addr = self.addr_absolute(bus);
                bus.write(addr, self.a);
                base
            }
            0x9D => {
                let (addr, _) = self.addr_absolute_x(bus);
                bus.write(addr, self.a);
                base
            }
            0x99 => {
                let (addr, _) = self.addr_absolute_y(bus);
                bus.write(addr, self.a);
                base
            }
            0x81 => {
                let addr = self.addr_indexed_indirect_x(bus);
                bus.write(addr, self.a);
                base
            }
            0x91 => {
                let (addr, _) = self.addr_indirect_y(bus);
                bus.write(addr, self.a);
                base
            }
            0x92 => {
                let addr = self.addr_indirect_zp(bus);
                bus.write(addr, self.a);
                base
            }

            // Store X / Y
            0x86 => {
                let addr = self.addr_zeropage(bus);
                bus.write(addr, self.x);
                base
            }
            0x96 => {
                let addr = self.addr_zeropage_y(bus);
                bus.write(addr, self.x);
                base
            }
            0x8E => {
                let addr = self.addr_absolute(bus);
                bus.write(addr, self.x);
                base
            }
            0x84 => {
                let addr = self.addr_zeropage(bus);
                bus.write(addr, self.y);
                base
            }
            0x94 => {
                let addr = self.addr_zeropage_x(bus);
                bus.write(addr, self.y);
                base
            }
            0x8C => {
                let addr = self.addr_absolute(bus);
                bus.write(addr, self.y);
                base
            }

            // Store zero
            0x64 => {
                let addr = self.addr_zeropage(bus);
                bus.write(addr, 0);
                base
            }
            0x74 => {
                let addr = self.addr_zeropage_x(bus);
                bus.write(addr, 0);
                base
            }
            0x9C => {
                let addr = self.addr_absolute(bus);
                bus.write(addr, 0);
                base
            }
            0x9E => {
                let (addr, _) = self.addr_absolute_x(bus);
                bus.write(addr, 0);
                base
            }

            // Arithmetic
            0x69 => {
                let value = self.fetch_byte(bus);
                self.adc(value, base)
            }
            0x65 => {
                let addr = self.addr_zeropage(bus);
                let value = bus.read(addr);
                self.adc(value, base)
            }
            0x75 => {
                let addr = self.addr_zeropage_x(bus);
                let value = bus.read(addr);
                self.adc(value, base)
            }
            0x6D => {
                let addr = self.addr_absolute(bus);
                let value = bus.read(addr);
                self.adc(value, base)
            }
            0x7D => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                let value = bus.read(addr);
                self.adc(value, base + crossed as u8)
            }
            0x79 => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                let value = bus.read(addr);
                self.adc(value, base + crossed as u8)
            }
            0x61 => {
                let addr = self.addr_indexed_indirect_x(bus);
                let value = bus.read(addr);
                self.adc(value, base)
            }
            0x71 => {
                let (addr, crossed) = self.addr_indirect_y(bus);
                let value = bus.read(addr);
                self.adc(value, base + crossed as u8)
            }
            0x72 => {
                let addr = self.addr_indirect_zp(bus);
                let value = bus.read(addr);
                self.adc(value, base)
            }

            0xE9 => {
                let value = self.fetch_byte(bus);
                self.sbc(value, base)
            }
            0xE5 => {
                let addr = self.addr_zeropage(bus);
                let value = bus.read(addr);
                self.sbc(value, base)
            }
            0xF5 => {
                let addr = self.addr_zeropage_x(bus);
                let value = bus.read(addr);
                self.sbc(value, base)
            }
            0xED => {
                let addr = self.addr_absolute(bus);
                let value = bus.read(addr);
                self.sbc(value, base)
            }
            0xFD => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                let value = bus.read(addr);
                self.sbc(value, base + crossed as u8)
            }
            0xF9 => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                let value = bus.read(addr);
                self.sbc(value, base + crossed as u8)
            }
            0xE1 => {
                let addr = self.addr_indexed_indirect_x(bus);
                let value = bus.read(addr);
                self.sbc(value, base)
            }
            0xF1 => {
                let (addr, crossed) = self.addr_indirect_y(bus);
                let value = bus.read(addr);
                self.sbc(value, base + crossed as u8)
            }
            0xF2 => {
                let addr = self.addr_indirect_zp(bus);
                let value = bus.read(addr);
                self.sbc(value, base)
            }

            // Logical
            0x29 => {
                let value = self.fetch_byte(bus);
                self.and(value, base)
            }
            0x25 => {
                let addr = self.addr_zeropage(bus);
                let value = bus.read(addr);
                self.and(value, base)
            }
            0x35 => {
                let addr = self.addr_zeropage_x(bus);
                let value = bus.read(addr);
                self.and(value, base)
            }
            0x2D => {
                let addr = self.addr_absolute(bus);
                let value = bus.read(addr);
                self.and(value, base)
            }
            0x3D => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                let value = bus.read(addr);
                self.and(value, base + crossed as u8)
            }
            0x39 => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                let value = bus.read(addr);
                self.and(value, base + crossed as u8)
            }
            0x21 => {
                let addr = self.addr_indexed_indirect_x(bus);
                let value = bus.read(addr);
                self.and(value, base)
            }
            0x31 => {
                let (addr, crossed) = self.addr_indirect_y(bus);
                let value = bus.read(addr);
                self.and(value, base + crossed as u8)
            }
            0x32 => {
                let addr = self.addr_indirect_zp(bus);
                let value = bus.read(addr);
                self.and(value, base)
            }

            0x09 => {
                let value = self.fetch_byte(bus);
                self.ora(value, base)
            }
            0x05 => {
                let addr = self.addr_zeropage(bus);
                let value = bus.read(addr);
                self.ora(value, base)
            }
            0x15 => {
                let addr = self.addr_zeropage_x(bus);
                let value = bus.read(addr);
                self.ora(value, base)
            }
            0x0D => {
                let addr = self.addr_absolute(bus);
                let value = bus.read(addr);
                self.ora(value, base)
            }
            0x1D => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                let value = bus.read(addr);
                self.ora(value, base + crossed as u8)
            }
            0x19 => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                let value = bus.read(addr);
                self.ora(value, base + crossed as u8)
            }
            0x01 => {
                let addr = self.addr_indexed_indirect_x(bus);
                let value = bus.read(addr);
                self.ora(value, base)
            }
            0x11 => {
                let (addr, crossed) = self.addr_indirect_y(bus);
                let value = bus.read(addr);
                self.ora(value, base + crossed as u8)
            }
            0x12 => {
                let addr = self.addr_indirect_zp(bus);
                let value = bus.read(addr);
                self.ora(value, base)
            }

            0x49 => {
                let value = self.fetch_byte(bus);
                self.eor(value, base)
            }
            0x45 => {
                let addr = self.addr_zeropage(bus);
                let value = bus.read(addr);
                self.eor(value, base)
            }
            0x55 => {
                let addr = self.addr_zeropage_x(bus);
                let value = bus.read(addr);
                self.eor(value, base)
            }
            0x4D => {
                let addr = self.addr_absolute(bus);
                let value = bus.read(addr);
                self.eor(value, base)
            }
            0x5D => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                let value = bus.read(addr);
                self.eor(value, base + crossed as u8)
            }
            0x59 => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                let value = bus.read(addr);
                self.eor(value, base + crossed as u8)
            }
            0x41 => {
                let addr = self.addr_indexed_indirect_x(bus);
                let value = bus.read(addr);
                self.eor(value, base)
            }
            0x51 => {
                let (addr, crossed) = self.addr_indirect_y(bus);
                let value = bus.read(addr);
                self.eor(value, base + crossed as u8)
            }
            0x52 => {
                let addr = self.addr_indirect_zp(bus);
                let value = bus.read(addr);
                self.eor(value, base)
            }

            // BIT
            0x24 => {
                let addr = self.addr_zeropage(bus);
                self.bit(bus.read(addr), base)
            }
            0x34 => {
                let addr = self.addr_zeropage_x(bus);
                self.bit(bus.read(addr), base)
            }
            0x2C => {
                let addr = self.addr_absolute(bus);
                self.bit(bus.read(addr), base)
            }
            0x3C => {
                let (addr, _) = self.addr_absolute_x(bus);
                self.bit(bus.read(addr), base)
            }
            0x89 => {
                let value = self.fetch_byte(bus);
                self.bit_immediate(value, base)
            }

            // Test and set/reset bits
            0x04 => {
                let addr = self.addr_zeropage(bus);
                self.tsb(bus, addr, base)
            }
            0x0C => {
                let addr = self.addr_absolute(bus);
                self.tsb(bus, addr, base)
            }
            0x14 => {
                let addr = self.addr_zeropage(bus);
                self.trb(bus, addr, base)
            }
            0x1C => {
                let addr = self.addr_absolute(bus);
                self.trb(bus, addr, base)
            }

            // Shift / rotate
            0x0A => self.asl_acc(base),
            0x06 => {
                let addr = self.addr_zeropage(bus);
                self.asl_mem(bus, addr, base)
            }
            0x16 => {
                let addr = self.addr_zeropage_x(bus);
                self.asl_mem(bus, addr, base)
            }
            0x0E => {
                let addr = self.addr_absolute(bus);
                self.asl_mem(bus, addr, base)
            }
            0x1E => {
                let (addr, _) = self.addr_absolute_x(bus);
                self.asl_mem(bus, addr, base)
            }

            0x4A => self.lsr_acc(base),
            0x46 => {
                let addr = self.addr_zeropage(bus);
                self.lsr_mem(bus, addr, base)
            }
            0x56 => {
                let addr = self.addr_zeropage_x(bus);
                self.lsr_mem(bus, addr, base)
            }
            0x4E => {
                let addr = self.addr_absolute(bus);
                self.lsr_mem(bus, addr, base)
            }
            0x5E => {
                let (addr, _) = self.addr_absolute_x(bus);
                self.lsr_mem(bus, addr, base)
            }

            0x2A => self.rol_acc(base),
            0x26 => {
                let addr = self.addr_zeropage(bus);
                self.rol_mem(bus, addr, base)
            }
            0x36 => {
                let addr = self.addr_zeropage_x(bus);
                self.rol_mem(bus, addr, base)
            }
            0x2E => {
                let addr = self.addr_absolute(bus);
                self.rol_mem(bus, addr, base)
            }
            0x3E => {
                let (addr, _) = self.addr_absolute_x(bus);
                self.rol_mem(bus, addr, base)
            }

            0x6A => self.ror_acc(base),
            0x66 => {
                let addr = self.addr_zeropage(bus);
                self.ror_mem(bus, addr, base)
            }
            0x76 => {
                let addr = self.addr_zeropage_x(bus);
                self.ror_mem(bus, addr, base)
            }
            0x6E => {
                let addr = self.addr_absolute(bus);
                self.ror_mem(bus, addr, base)
            }
            0x7E => {
                let (addr, _) = self.addr_absolute_x(bus);
                self.ror_mem(bus, addr, base)
            }

            // Increment / decrement
            0x1A => {
                self.a = self.a.wrapping_add(1);
                self.update_zero_and_negative(self.a);
                base
            }
            0x3A => {
                self.a = self.a.wrapping_sub(1);
                self.update_zero_and_negative(self.a);
                base
            }
            0xE6 => {
                let addr = self.addr_zeropage(bus);
                self.inc_mem(bus, addr, base)
            }
            0xF6 => {
                let addr = self.addr_zeropage_x(bus);
                self.inc_mem(bus, addr, base)
            }
            0xEE => {
                let addr = self.addr_absolute(bus);
                self.inc_mem(bus, addr, base)
            }
            0xFE => {
                let (addr, _) = self.addr_absolute_x(bus);
                self.inc_mem(bus, addr, base)
            }
            0xC6 => {
                let addr = self.addr_zeropage(bus);
                self.dec_mem(bus, addr, base)
            }
            0xD6 => {
                let addr = self.addr_zeropage_x(bus);
                self.dec_mem(bus, addr, base)
            }
            0xCE => {
                let addr = self.addr_absolute(bus);
                self.dec_mem(bus, addr, base)
            }
            0xDE => {
                let (addr, _) = self.addr_absolute_x(bus);
                self.dec_mem(bus, addr, base)
            }
            0xE8 => {
                self.x = self.x.wrapping_add(1);
                self.update_zero_and_negative(self.x);
                base
            }
            0xC8 => {
                self.y = self.y.wrapping_add(1);
                self.update_zero_and_negative(self.y);
                base
            }
            0xCA => {
                self.x = self.x.wrapping_sub(1);
                self.update_zero_and_negative(self.x);
                base
            }
            0x88 => {
                self.y = self.y.wrapping_sub(1);
                self.update_zero_and_negative(self.y);
                base
            }

            // Comparisons
            0xC9 => {
                let value = self.fetch_byte(bus);
                self.cmp(value, self.a, base)
            }
            0xC5 => {
                let addr = self.addr_zeropage(bus);
                self.cmp(bus.read(addr), self.a, base)
            }
            0xD5 => {
                let addr = self.addr_zeropage_x(bus);
                self.cmp(bus.read(addr), self.a, base)
            }
            0xCD => {
                let addr = self.addr_absolute(bus);
                self.cmp(bus.read(addr), self.a, base)
            }
            0xDD => {
                let (addr, crossed) = self.addr_absolute_x(bus);
                let value = bus.read(addr);
                self.cmp(value, self.a, base + crossed as u8)
            }
            0xD9 => {
                let (addr, crossed) = self.addr_absolute_y(bus);
                let value = bus.read(addr);
                self.cmp(value, self.a, base + crossed as u8)
            }
            0xC1 => {
                let addr = self.addr_indexed_indirect_x(bus);
                self.cmp(bus.read(addr), self.a, base)
            }
            0xD1 => {
                let (addr, crossed) = self.addr_indirect_y(bus);
                let value = bus.read(addr);
                self.cmp(value, self.a, base + crossed as u8)
            }
            0xD2 => {
                let addr = self.addr_indirect_zp(bus);
                self.cmp(bus.read(addr), self.a, base)
            }
            0xE0 => {
                let value = self.fetch_byte(bus);
                self.cmp(value, self.x, base)
            }
            0xE4 => {
                let addr = self.addr_zeropage(bus);
                self.cmp(bus.read(addr), self.x, base)
            }
            0xEC => {
                let addr = self.addr_absolute(bus);
                self.cmp(bus.read(addr), self.x, base)
            }
            0xC0 => {
                let value = self.fetch_byte(bus);
                self.cmp(value, self.y, base)
            }
            0xC4 => {
                let addr = self.addr_zeropage(bus);
                self.cmp(bus.read(addr), self.y, base)
            }
            0xCC => {
                let addr = self.addr_absolute(bus);
                self.cmp(bus.read(addr), self.y, base)
            }

            // Branches
            0x90 => self.branch(bus, !self.get_flag(FLAG_CARRY), base),
            0xB0 => self.branch(bus, self.get_flag(FLAG_CARRY), base),
            0xF0 => self.branch(bus, self.get_flag(FLAG_ZERO), base),
            0xD0 => self.branch(bus, !self.get_flag(FLAG_ZERO), base),
            0x30 => self.branch(bus, self.get_flag(FLAG_NEGATIVE), base),
            0x10 => self.branch(bus, !self.get_flag(FLAG_NEGATIVE), base),
            0x50 => self.branch(bus, !self.get_flag(FLAG_OVERFLOW), base),
            0x70 => self.branch(bus, self.get_flag(FLAG_OVERFLOW), base),
            0x80 => self.branch(bus, true, base),

            // Rockwell bit branches and bit set/reset
            0x0F => self.bbr(bus, 0, base),
            0x1F => self.bbr(bus, 1, base),
            0x2F => self.bbr(bus, 2, base),
            0x3F => self.bbr(bus, 3, base),
            0x4F => self.bbr(bus, 4, base),
            0x5F => self.bbr(bus, 5, base),
            0x6F => self.bbr(bus, 6, base),
            0x7F => self.bbr(bus, 7, base),
            0x8F => self.bbs(bus, 0, base),
            0x9F => self.bbs(bus, 1, base),
            0xAF => self.bbs(bus, 2, base),
            0xBF => self.bbs(bus, 3, base),
            0xCF => self.bbs(bus, 4, base),
            0xDF => self.bbs(bus, 5, base),
            0xEF => self.bbs(bus, 6, base),
            0xFF => self.bbs(bus, 7, base),
            0x07 => self.rmb(bus, 0, base),
            0x17 => self.rmb(bus, 1, base),
            0x27 => self.rmb(bus, 2, base),
            0x37 => self.rmb(bus, 3, base),
            0x47 => self.rmb(bus, 4, base),
            0x57 => self.rmb(bus, 5, base),
            0x67 => self.rmb(bus, 6, base),
            0x77 => self.rmb(bus, 7, base),
            0x87 => self.smb(bus, 0, base),
            0x97 => self.smb(bus, 1, base),
            0xA7 => self.smb(bus, 2, base),
            0xB7 => self.smb(bus, 3, base),
            0xC7 => self.smb(bus, 4, base),
            0xD7 => self.smb(bus, 5, base),
            0xE7 => self.smb(bus, 6, base),
            0xF7 => self.smb(bus, 7, base),

            // Flags
            0x18 => {
                self.set_flag(FLAG_CARRY, false);
                base
            }
            0x38 => {
                self.set_flag(FLAG_CARRY, true);
                base
            }
            0x58 => {
                self.set_flag(FLAG_INTERRUPT_DISABLE, false);
                base
            }
            0x78 => {
                self.set_flag(FLAG_INTERRUPT_DISABLE, true);
                base
            }
            0xB8 => {
                self.set_flag(FLAG_OVERFLOW, false);
                base
            }
            0xD8 => {
                self.set_flag(FLAG_DECIMAL, false);
                base
            }
            0xF8 => {
                self.set_flag(FLAG_DECIMAL, true);
                base
            }

            // Transfers
            0xAA => {
                self.x = self.a;
                self.update_zero_and_negative(self.x);
                base
            }
            0xA8 => {
                self.y = self.a;
                self.update_zero_and_negative(self.y);
                base
            }
            0x8A => {
                self.a = self.x;
                self.update_zero_and_negative(self.a);
                base
            }
            0x98 => {
                self.a = self.y;
                self.update_zero_and_negative(self.a);
                base
            }
            0xBA => {
                self.x = self.sp;
                self.update_zero_and_negative(self.x);
                base
            }
            0x9A => {
                self.sp = self.x;
                base
            }

            // Stack
            0x48 => {
                self.push_byte(bus, self.a);
                base
            }
            0xDA => {
                self.push_byte(bus, self.x);
                base
            }
            0x5A => {
                self.push_byte(bus, self.y);
                base
            }
            0x08 => {
                self.push_byte(bus, self.status | FLAG_BREAK);
                base
            }
            0x68 => {
                self.a = self.pop_byte(bus);
                self.update_zero_and_negative(self.a);
                base
            }
            0xFA => {
                self.x = self.pop_byte(bus);
                self.update_zero_and_negative(self.x);
                base
            }
            0x7A => {
                self.y = self.pop_byte(bus);
                self.update_zero_and_negative(self.y);
                base
            }
            0x28 => {
                self.status = self.pop_byte(bus) | FLAG_CONSTANT;
                base
            }

            // Control flow
            0x4C => {
                self.pc = self.fetch_word(bus);
                base
            }
            0x6C => self.jmp_indirect(bus, base),
            0x7C => self.jmp_indirect_indexed(bus, base),
            0x20 => self.jsr(bus, base),
            0x60 => self.rts(bus, base),
            0x40 => self.rti(bus, base),
            0x00 => self.brk(bus, base),
            0xCB => {
                self.waiting = true;
                base
            }
            0xEA => base,

            // Matrix holes: single-byte 2-cycle no-ops
            _ => base,
        }
    }

    fn lda(&mut self, value: u8, cycles: u8) -> u8 {
        self.a = value;
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn ldx(&mut self, value: u8, cycles: u8) -> u8 {
        self.x = value;
        self.update_zero_and_negative(self.x);
        cycles
    }

    fn ldy(&mut self, value: u8, cycles: u8) -> u8 {
        self.y = value;
        self.update_zero_and_negative(self.y);
        cycles
    }

    fn adc(&mut self, value: u8, cycles: u8) -> u8 {
        let carry = if self.get_flag(FLAG_CARRY) { 1u16 } else { 0 };
        let binary_sum = self.a as u16 + value as u16 + carry;
        let binary_result = binary_sum as u8;

        self.set_flag(
            FLAG_OVERFLOW,
            (!(self.a ^ value) & (self.a ^ binary_result) & 0x80) != 0,
        );
        if self.get_flag(FLAG_DECIMAL) {
            let mut bcd_sum = binary_sum;
            if (self.a & 0x0F) as u16 + (value & 0x0F) as u16 + carry > 9 {
                bcd_sum = bcd_sum.wrapping_add(0x06);
            }
            self.set_flag(FLAG_CARRY, bcd_sum > 0x99);
            if bcd_sum > 0x99 {
                bcd_sum = bcd_sum.wrapping_add(0x60);
            }
            self.a = bcd_sum as u8;
        } else {
            self.set_flag(FLAG_CARRY, binary_sum > 0xFF);
            self.a = binary_result;
        }
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn sbc(&mut self, value: u8, cycles: u8) -> u8 {
        let carry = if self.get_flag(FLAG_CARRY) { 1u16 } else { 0 };
        let subtrahend = value as u16 + (1 - carry);
        let minuend = self.a as u16;
        let binary_result = minuend.wrapping_sub(subtrahend) as u8;

        self.set_flag(
            FLAG_OVERFLOW,
            ((self.a ^ binary_result) & (self.a ^ value) & 0x80) != 0,
        );
        self.set_flag(FLAG_CARRY, minuend >= subtrahend);
        if self.get_flag(FLAG_DECIMAL) {
            let borrow = (1 - carry) as i16;
            let mut low = (self.a & 0x0F) as i16 - (value & 0x0F) as i16 - borrow;
            let mut high = (self.a >> 4) as i16 - (value >> 4) as i16;
            if low < 0 {
                low -= 6;
                high -= 1;
            }
            if high < 0 {
                high -= 6;
            }
            self.a = (((high << 4) & 0xF0) | (low & 0x0F)) as u8;
        } else {
            self.a = binary_result;
        }
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn and(&mut self, value: u8, cycles: u8) -> u8 {
        self.a &= value;
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn ora(&mut self, value: u8, cycles: u8) -> u8 {
        self.a |= value;
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn eor(&mut self, value: u8, cycles: u8) -> u8 {
        self.a ^= value;
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn cmp(&mut self, value: u8, register: u8, cycles: u8) -> u8 {
        let result = register.wrapping_sub(value);
        self.set_flag(FLAG_CARRY, register >= value);
        self.update_zero_and_negative(result);
        cycles
    }

    /// Memory BIT copies operand bits 7 and 6 into N and V.
    fn bit(&mut self, value: u8, cycles: u8) -> u8 {
        self.set_flag(FLAG_ZERO, (self.a & value) == 0);
        self.set_flag(FLAG_NEGATIVE, value & 0x80 != 0);
        self.set_flag(FLAG_OVERFLOW, value & 0x40 != 0);
        cycles
    }

    /// The immediate form only tests: Z from the mask, N and V untouched.
    fn bit_immediate(&mut self, value: u8, cycles: u8) -> u8 {
        self.set_flag(FLAG_ZERO, (self.a & value) == 0);
        cycles
    }

    fn tsb(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr);
        self.set_flag(FLAG_ZERO, (self.a & value) == 0);
        bus.write(addr, value | self.a);
        cycles
    }

    fn trb(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr);
        self.set_flag(FLAG_ZERO, (self.a & value) == 0);
        bus.write(addr, value & !self.a);
        cycles
    }

    fn asl_acc(&mut self, cycles: u8) -> u8 {
        let carry = (self.a & 0x80) != 0;
        self.a <<= 1;
        self.set_flag(FLAG_CARRY, carry);
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn asl_mem(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr);
        let carry = (value & 0x80) != 0;
        let result = value << 1;
        bus.write(addr, result);
        self.set_flag(FLAG_CARRY, carry);
        self.update_zero_and_negative(result);
        cycles
    }

    fn lsr_acc(&mut self, cycles: u8) -> u8 {
        let carry = (self.a & 0x01) != 0;
        self.a >>= 1;
        self.set_flag(FLAG_CARRY, carry);
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn lsr_mem(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr);
        let carry = (value & 0x01) != 0;
        let result = value >> 1;
        bus.write(addr, result);
        self.set_flag(FLAG_CARRY, carry);
        self.update_zero_and_negative(result);
        cycles
    }

    fn rol_acc(&mut self, cycles: u8) -> u8 {
        let carry_in = if self.get_flag(FLAG_CARRY) { 1 } else { 0 };
        let carry_out = (self.a & 0x80) != 0;
        self.a = (self.a << 1) | carry_in;
        self.set_flag(FLAG_CARRY, carry_out);
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn rol_mem(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr);
        let carry_in = if self.get_flag(FLAG_CARRY) { 1 } else { 0 };
        let carry_out = (value & 0x80) != 0;
        let result = (value << 1) | carry_in;
        bus.write(addr, result);
        self.set_flag(FLAG_CARRY, carry_out);
        self.update_zero_and_negative(result);
        cycles
    }

    fn ror_acc(&mut self, cycles: u8) -> u8 {
        let carry_in = if self.get_flag(FLAG_CARRY) { 1u8 } else { 0 };
        let carry_out = (self.a & 0x01) != 0;
        self.a = (self.a >> 1) | (carry_in << 7);
        self.set_flag(FLAG_CARRY, carry_out);
        self.update_zero_and_negative(self.a);
        cycles
    }

    fn ror_mem(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr);
        let carry_in = if self.get_flag(FLAG_CARRY) { 1u8 } else { 0 };
        let carry_out = (value & 0x01) != 0;
        let result = (value >> 1) | (carry_in << 7);
        bus.write(addr, result);
        self.set_flag(FLAG_CARRY, carry_out);
        self.update_zero_and_negative(result);
        cycles
    }

    fn inc_mem(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr).wrapping_add(1);
        bus.write(addr, value);
        self.update_zero_and_negative(value);
        cycles
    }

    fn dec_mem(&mut self, bus: &mut Bus, addr: u16, cycles: u8) -> u8 {
        let value = bus.read(addr).wrapping_sub(1);
        bus.write(addr, value);
        self.update_zero_and_negative(value);
        cycles
    }

    fn rmb(&mut self, bus: &mut Bus, bit: u8, cycles: u8) -> u8 {
        let addr = self.fetch_byte(bus) as u16;
        let value = bus.read(addr) & !(1 << bit);
        bus.write(addr, value);
        cycles
    }

    fn smb(&mut self, bus: &mut Bus, bit: u8, cycles: u8) -> u8 {
        let addr = self.fetch_byte(bus) as u16;
        let value = bus.read(addr) | (1 << bit);
        bus.write(addr, value);
        cycles
    }

    fn bbr(&mut self, bus: &mut Bus, bit: u8, cycles: u8) -> u8 {
        self.branch_on_bit(bus, bit, false, cycles)
    }

    fn bbs(&mut self, bus: &mut Bus, bit: u8, cycles: u8) -> u8 {
        self.branch_on_bit(bus, bit, true, cycles)
    }

    fn branch_on_bit(&mut self, bus: &mut Bus, bit: u8, branch_if_set: bool, cycles: u8) -> u8 {
        let zp_addr = self.fetch_byte(bus) as u16;
        let value = bus.read(zp_addr);
        let offset = self.fetch_byte(bus) as i8;
        let target = self.pc.wrapping_add(offset as u16);
        // The target address is formed (and its crossing penalty charged)
        // whether or not the branch is taken.
        let cycles = cycles + Self::page_crossed(self.pc, target) as u8;
        let bit_set = (value & (1 << bit)) != 0;
        if bit_set == branch_if_set {
            self.pc = target;
        }
        cycles
    }

    fn branch(&mut self, bus: &mut Bus, condition: bool, cycles: u8) -> u8 {
        let offset = self.fetch_byte(bus) as i8;
        if condition {
            let target = self.pc.wrapping_add(offset as u16);
            let penalty = Self::page_crossed(self.pc, target) as u8;
            self.pc = target;
            cycles + 1 + penalty
        } else {
            cycles
        }
    }

    fn jmp_indirect(&mut self, bus: &mut Bus, cycles: u8) -> u8 {
        let ptr = self.fetch_word(bus);
        // 65C02: the pointer high byte fetch carries across pages.
        self.pc = bus.read_u16(ptr);
        cycles
    }

    fn jmp_indirect_indexed(&mut self, bus: &mut Bus, cycles: u8) -> u8 {
        let base = self.fetch_word(bus);
        let ptr = base.wrapping_add(self.x as u16);
        self.pc = bus.read_u16(ptr);
        cycles
    }

    fn jsr(&mut self, bus: &mut Bus, cycles: u8) -> u8 {
        let addr = self.fetch_word(bus);
        let return_addr = self.pc.wrapping_sub(1);
        self.push_byte(bus, (return_addr >> 8) as u8);
        self.push_byte(bus, return_addr as u8);
        self.pc = addr;
        cycles
    }

    fn rts(&mut self, bus: &mut Bus, cycles: u8) -> u8 {
        let lo = self.pop_byte(bus) as u16;
        let hi = self.pop_byte(bus) as u16;
        self.pc = ((hi << 8) | lo).wrapping_add(1);
        cycles
    }

    fn rti(&mut self, bus: &mut Bus, cycles: u8) -> u8 {
        self.status = self.pop_byte(bus) | FLAG_CONSTANT;
        let lo = self.pop_byte(bus) as u16;
        let hi = self.pop_byte(bus) as u16;
        self.pc = (hi << 8) | lo;
        cycles
    }

    /// BRK pushes the address of the byte after its padding byte, pushes
    /// status with break set, sets interrupt-disable, clears decimal (a
    /// 65C02 change) and vectors through $FFFE.
    fn brk(&mut self, bus: &mut Bus, cycles: u8) -> u8 {
        let pushed = self.pc.wrapping_add(1);
        self.push_byte(bus, (pushed >> 8) as u8);
        self.push_byte(bus, pushed as u8);
        self.push_byte(bus, self.status | FLAG_BREAK);
        self.set_flag(FLAG_INTERRUPT_DISABLE, true);
        self.set_flag(FLAG_DECIMAL, false);
        self.pc = bus.read_u16(VECTOR_IRQ_BRK);
        cycles
    }

    fn addr_zeropage(&mut self, bus: &mut Bus) -> u16 {
        self.fetch_byte(bus) as u16
    }

    fn addr_zeropage_x(&mut self, bus: &mut Bus) -> u16 {
        self.fetch_byte(bus).wrapping_add(self.x) as u16
    }

    fn addr_zeropage_y(&mut self, bus: &mut Bus) -> u16 {
        self.fetch_byte(bus).wrapping_add(self.y) as u16
    }

    fn addr_absolute(&mut self, bus: &mut Bus) -> u16 {
        self.fetch_word(bus)
    }

    fn addr_absolute_x(&mut self, bus: &mut Bus) -> (u16, bool) {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(self.x as u16);
        (addr, Self::page_crossed(base, addr))
    }

    fn addr_absolute_y(&mut self, bus: &mut Bus) -> (u16, bool) {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(self.y as u16);
        (addr, Self::page_crossed(base, addr))
    }

    fn addr_indexed_indirect_x(&mut self, bus: &mut Bus) -> u16 {
        let ptr = self.fetch_byte(bus).wrapping_add(self.x);
        let lo = bus.read(ptr as u16) as u16;
        let hi = bus.read(ptr.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    fn addr_indirect_y(&mut self, bus: &mut Bus) -> (u16, bool) {
        let ptr = self.fetch_byte(bus);
        let lo = bus.read(ptr as u16) as u16;
        let hi = bus.read(ptr.wrapping_add(1) as u16) as u16;
        let base = (hi << 8) | lo;
        let addr = base.wrapping_add(self.y as u16);
        (addr, Self::page_crossed(base, addr))
    }

    fn addr_indirect_zp(&mut self, bus: &mut Bus) -> u16 {
        let ptr = self.fetch_byte(bus) as u16;
        bus.read_u16(ptr)
    }

    fn fetch_byte(&mut self, bus: &mut Bus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch_byte(bus) as u16;
        let hi = self.fetch_byte(bus) as u16;
        (hi << 8) | lo
    }

    fn push_byte(&mut self, bus: &mut Bus, value: u8) {
        bus.write(STACK_BASE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop_byte(&mut self, bus: &mut Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(STACK_BASE | self.sp as u16)
    }

    fn update_zero_and_negative(&mut self, value: u8) {
        self.set_flag(FLAG_ZERO, value == 0);
        self.set_flag(FLAG_NEGATIVE, value & 0x80 != 0);
    }

    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    pub fn get_flag(&self, flag: u8) -> bool {
        self.status & flag != 0
    }

    pub fn flag(&self, flag: u8) -> bool {
        self.get_flag(flag)
    }

    fn page_crossed(a: u16, b: u16) -> bool {
        (a & 0xFF00) != (b & 0xFF00)
    }
}
