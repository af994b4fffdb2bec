/// A byte buffer that is invisible to bincode serialization. Encodes as
/// zero bytes; decodes as empty. Used for derived state (shadows, caches,
/// scratch lines) that must survive struct derivation but not save-state
/// files; `rebuild_after_load` re-creates the contents.
#[derive(Clone, Default)]
pub struct TransientBuf<T>(pub Vec<T>);

impl<T> bincode::Encode for TransientBuf<T> {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        _encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        Ok(()) // write nothing
    }
}

impl<T, Context> bincode::Decode<Context> for TransientBuf<T> {
    fn decode<D: bincode::de::Decoder>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self(Vec::new()))
    }
}

impl<'de, T, Context> bincode::BorrowDecode<'de, Context> for TransientBuf<T> {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self(Vec::new()))
    }
}

impl<T> core::ops::Deref for TransientBuf<T> {
    type Target = Vec<T>;
    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> core::ops::DerefMut for TransientBuf<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

/// High-byte region decode of the 16-bit bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum MemRegion {
    Null,
    Direct,
    Io,
    RamBank,
    RomBank,
}

/// Low-byte sub-decode of the $9Fxx I/O page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum IoDevice {
    Null,
    Sound,
    Video,
    Lcd,
    Via1,
    Via2,
    Rtc,
    Mouse,
    Emu,
}

/// 6522 register bank. The timers and handshake lines are external
/// collaborators; the emulator only needs the register file and the
/// bank-select wiring on VIA #1's output ports.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Via {
    regs: [u8; 16],
}

impl Via {
    pub fn new() -> Self {
        Self { regs: [0; 16] }
    }

    pub fn read(&self, reg: u8) -> u8 {
        self.regs[(reg & 0x0F) as usize]
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        self.regs[(reg & 0x0F) as usize] = value;
    }
}

impl Default for Via {
    fn default() -> Self {
        Self::new()
    }
}

/// GIF recorder command values as written to emulator-control register 5.
pub const GIF_CMD_PAUSE: u8 = 1;
pub const GIF_CMD_RESUME: u8 = 2;
pub const GIF_CMD_SNAP: u8 = 3;

/// Recorder state machine. `Disabled` ignores every command; a snap from
/// any enabled state captures one frame and drops back to `Paused`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum GifRecorder {
    Disabled,
    Paused,
    Active,
    SingleShot,
}

impl GifRecorder {
    pub fn command(&mut self, value: u8) {
        if *self == GifRecorder::Disabled {
            return;
        }
        match value {
            GIF_CMD_PAUSE => *self = GifRecorder::Paused,
            GIF_CMD_RESUME => *self = GifRecorder::Active,
            GIF_CMD_SNAP => *self = GifRecorder::SingleShot,
            _ => {}
        }
    }

    /// Called by the embedding once per completed frame.
    /// Returns true when the frame should be written to the recording.
    pub fn frame_done(&mut self) -> bool {
        match *self {
            GifRecorder::Active => true,
            GifRecorder::SingleShot => {
                *self = GifRecorder::Paused;
                true
            }
            _ => false,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            GifRecorder::Disabled => 0,
            GifRecorder::Paused => 1,
            GifRecorder::Active => 2,
            GifRecorder::SingleShot => 3,
        }
    }
}

/// Emulator feature registers at $9FB0-$9FBF.
///
/// 0: debugger enabled, 1: video log, 2: keyboard log, 3: echo mode,
/// 4: save on exit, 5: GIF recorder command/state, 8-11: CPU cycle counter,
/// 13: keymap index, 14/15: "16" detection bytes (15 doubles as the LED
/// status flag on write).
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct EmuControl {
    pub debugger_enabled: bool,
    pub log_video: bool,
    pub log_keyboard: bool,
    pub echo_mode: u8,
    pub save_on_exit: bool,
    pub recorder: GifRecorder,
    pub keymap: u8,
    pub led_status: bool,
}

impl EmuControl {
    pub fn new() -> Self {
        Self {
            debugger_enabled: false,
            log_video: false,
            log_keyboard: false,
            echo_mode: 0,
            save_on_exit: false,
            recorder: GifRecorder::Disabled,
            keymap: 0,
            led_status: false,
        }
    }

    pub fn read(&self, reg: u8, cpu_cycles: u32) -> u8 {
        match reg & 0x0F {
            0 => self.debugger_enabled as u8,
            1 => self.log_video as u8,
            2 => self.log_keyboard as u8,
            3 => self.echo_mode,
            4 => self.save_on_exit as u8,
            5 => self.recorder.as_byte(),
            8 => cpu_cycles as u8,
            9 => (cpu_cycles >> 8) as u8,
            10 => (cpu_cycles >> 16) as u8,
            11 => (cpu_cycles >> 24) as u8,
            13 => self.keymap,
            14 => b'1',
            15 => b'6',
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        let v = value != 0;
        match reg & 0x0F {
            0 => self.debugger_enabled = v,
            1 => self.log_video = v,
            2 => self.log_keyboard = v,
            3 => self.echo_mode = value,
            4 => self.save_on_exit = v,
            5 => self.recorder.command(value),
            13 => self.keymap = value,
            15 => self.led_status = v,
            _ => eprintln!("WARN: invalid emulator register {:x}", 0x9FB0 + (reg & 0x0F) as u16),
        }
    }
}

impl Default for EmuControl {
    fn default() -> Self {
        Self::new()
    }
}
