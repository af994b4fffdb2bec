// Audio chips as opaque register banks. Synthesis and output are host
// concerns; the core only models the register surfaces and the one piece
// of audio state the interrupt controller can observe (the PCM FIFO level).

const PCM_FIFO_SIZE: usize = 4096;
const PCM_FIFO_LOW_MARK: usize = PCM_FIFO_SIZE / 4;

/// FM synthesizer stub: an address latch at offset 0 and a data port at
/// offset 1. Reads return 0.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct FmStub {
    address: u8,
    regs: [u8; 256],
}

impl FmStub {
    pub fn new() -> Self {
        Self {
            address: 0,
            regs: [0; 256],
        }
    }

    pub fn reset(&mut self) {
        self.address = 0;
        self.regs = [0; 256];
    }

    pub fn write(&mut self, offset: u16, value: u8) {
        match offset {
            0 => self.address = value,
            1 => self.regs[self.address as usize] = value,
            _ => {}
        }
    }

    pub fn register(&self, index: u8) -> u8 {
        self.regs[index as usize]
    }
}

impl Default for FmStub {
    fn default() -> Self {
        Self::new()
    }
}

/// Square-wave generator stub: 64 bytes aliased into the top of video RAM.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct PsgStub {
    regs: [u8; 64],
}

impl PsgStub {
    pub fn new() -> Self {
        Self { regs: [0; 64] }
    }

    pub fn reset(&mut self) {
        self.regs = [0; 64];
    }

    pub fn write_reg(&mut self, reg: u8, value: u8) {
        self.regs[(reg & 0x3F) as usize] = value;
    }

    pub fn read_reg(&self, reg: u8) -> u8 {
        self.regs[(reg & 0x3F) as usize]
    }
}

impl Default for PsgStub {
    fn default() -> Self {
        Self::new()
    }
}

/// PCM channel stub: control, rate and a write-only FIFO. Nothing drains
/// the FIFO (audio output is out of scope) but its fill level feeds the
/// FIFO-low interrupt status bit.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Pcm {
    ctrl: u8,
    rate: u8,
    fifo: Vec<u8>,
}

impl Pcm {
    pub fn new() -> Self {
        Self {
            ctrl: 0,
            rate: 0,
            fifo: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ctrl = 0;
        self.rate = 0;
        self.fifo.clear();
    }

    pub fn write_ctrl(&mut self, value: u8) {
        // Bit 7 resets the FIFO.
        if value & 0x80 != 0 {
            self.fifo.clear();
        }
        self.ctrl = value & 0x3F;
    }

    pub fn read_ctrl(&self) -> u8 {
        let full = if self.fifo.len() >= PCM_FIFO_SIZE {
            0x80
        } else {
            0
        };
        self.ctrl | full
    }

    pub fn write_rate(&mut self, value: u8) {
        self.rate = value;
    }

    pub fn read_rate(&self) -> u8 {
        self.rate
    }

    pub fn write_fifo(&mut self, value: u8) {
        if self.fifo.len() < PCM_FIFO_SIZE {
            self.fifo.push(value);
        }
    }

    pub fn is_fifo_almost_empty(&self) -> bool {
        self.fifo.len() < PCM_FIFO_LOW_MARK
    }
}

impl Default for Pcm {
    fn default() -> Self {
        Self::new()
    }
}
