use crate::bus::Bus;
use crate::cpu::Cpu;
use std::error::Error;

/// The embedding facade: one CPU, one bus, and the glue that keeps the
/// video clock and PS/2 ports fed as instructions retire.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl Emulator {
    pub fn new(num_ram_banks: usize) -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::new(num_ram_banks),
        }
    }

    /// Reset the video chip and pull the CPU through its reset vector.
    pub fn reset(&mut self) {
        self.bus.vera.reset();
        self.cpu.reset(&mut self.bus);
    }

    pub fn load_rom(&mut self, data: &[u8]) {
        self.bus.load_rom(data);
    }

    /// Load a program into memory and wire the reset vector to it.
    pub fn load_program(&mut self, start: u16, data: &[u8]) {
        self.bus.load(start, data);
        self.bus.set_reset_vector(start);
    }

    /// Execute one instruction, then advance the pixel clock by the
    /// consumed CPU cycles and give both PS/2 ports a step. Returns the
    /// cycles consumed.
    pub fn step(&mut self) -> u32 {
        self.bus.set_cpu_cycles(self.cpu.cycles);
        let cycles = self.cpu.step(&mut self.bus);
        self.bus.set_cpu_cycles(self.cpu.cycles);
        for _ in 0..cycles {
            if self.bus.vera.step() {
                self.bus.emu.recorder.frame_done();
            }
        }
        self.bus.ps2[0].step();
        self.bus.ps2[1].step();
        cycles
    }

    /// Run instructions until `budget` more cycles have elapsed, keeping
    /// the video clock in lockstep.
    pub fn run_for(&mut self, budget: u32) {
        let goal = self.cpu.cycles.wrapping_add(budget);
        while (goal.wrapping_sub(self.cpu.cycles) as i32) > 0 {
            self.step();
        }
    }

    /// Advance the pixel clock by one CPU tick without executing code.
    pub fn video_step(&mut self) -> bool {
        let new_frame = self.bus.vera.step();
        if new_frame {
            self.bus.emu.recorder.frame_done();
        }
        new_frame
    }

    pub fn ps2_step(&mut self, port: usize) {
        self.bus.ps2[port & 1].step();
    }

    pub fn framebuffer(&self) -> &[u32] {
        self.bus.vera.framebuffer()
    }

    pub fn cycles(&self) -> u32 {
        self.cpu.cycles
    }

    pub fn save_state_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn Error>> {
        let bytes = bincode::encode_to_vec(self, bincode::config::standard())?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load_state_from_file<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
    ) -> Result<(), Box<dyn Error>> {
        let bytes = std::fs::read(path)?;
        let (mut state, _): (Emulator, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())?;
        // Shadows, caches and scratch buffers are not serialized.
        state.bus.vera.rebuild_after_load();
        *self = state;
        Ok(())
    }

    /// Raw snapshot in the documented layout: low RAM, optionally the
    /// banked block, then video RAM and the video register banks.
    pub fn save_snapshot<W: std::io::Write>(
        &self,
        writer: &mut W,
        dump_ram: bool,
        dump_bank: bool,
    ) -> std::io::Result<()> {
        self.bus.save_memory(writer, dump_ram, dump_bank)?;
        self.bus.vera.save_video(writer)
    }
}

#[cfg(test)]
mod tests;
