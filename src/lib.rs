pub mod audio;
pub mod bus;
pub mod cpu;
pub mod emulator;
pub mod ps2;
pub mod vera;

pub use bus::Bus;
pub use cpu::Cpu;
pub use emulator::Emulator;
pub use vera::{Vera, SCREEN_HEIGHT, SCREEN_WIDTH};
