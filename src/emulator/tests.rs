use super::*;
use crate::bus::types::GifRecorder;
use crate::cpu::FLAG_CONSTANT;

// ~525 lines x 800 dots at the VGA dot-to-CPU-clock ratio
const CYCLES_PER_FRAME: u32 = 133_500;

#[test]
fn reset_vector_brings_up_the_machine() {
    let mut emu = Emulator::new(8);
    emu.bus.write_rom(0, 0x3FFC, 0x34);
    emu.bus.write_rom(0, 0x3FFD, 0x12);
    emu.reset();

    assert_eq!(emu.cpu.pc, 0x1234);
    assert_eq!(emu.cpu.sp, 0xFD);
    assert_eq!(emu.cpu.a, 0);
    assert_eq!(emu.cpu.x, 0);
    assert_eq!(emu.cpu.y, 0);
    assert!(emu.cpu.flag(FLAG_CONSTANT));
}

#[test]
fn self_modifying_program_runs_through_the_full_machine() {
    let mut emu = Emulator::new(8);
    // LDA #$42 ; STA $0200 ; JMP $0200
    emu.load_program(0x0300, &[0xA9, 0x42, 0x8D, 0x00, 0x02, 0x4C, 0x00, 0x02]);
    emu.bus.write(0x0200, 0xEA);
    emu.reset();

    let start = emu.cycles();
    for _ in 0..4 {
        emu.step();
    }
    assert_eq!(emu.cpu.pc, 0x0201);
    assert_eq!(emu.cycles() - start, 11);
}

#[test]
fn raster_line_interrupt_reaches_the_cpu_once_per_frame() {
    let mut emu = Emulator::new(8);
    // main: CLI ; spin
    emu.load_program(0x0300, &[0x58, 0x4C, 0x01, 0x03]);
    // handler: PHA ; LDA #$02 ; STA $9F27 ; INC $0250 ; PLA ; RTI
    emu.bus.load(
        0x0400,
        &[0x48, 0xA9, 0x02, 0x8D, 0x27, 0x9F, 0xEE, 0x50, 0x02, 0x68, 0x40],
    );
    emu.bus.write_rom(0, 0x3FFE, 0x00);
    emu.bus.write_rom(0, 0x3FFF, 0x04);
    emu.reset();

    // line compare 100, line interrupt enabled
    emu.bus.write(0x9F28, 100);
    emu.bus.write(0x9F26, 0x02);

    emu.run_for(100_000);
    assert_eq!(emu.bus.read(0x0250), 1, "first frame services one line IRQ");

    emu.run_for(CYCLES_PER_FRAME);
    assert_eq!(emu.bus.read(0x0250), 2, "second frame services exactly one more");
}

#[test]
fn vsync_interrupt_wakes_a_waiting_cpu() {
    let mut emu = Emulator::new(8);
    // CLI ; WAI ; INC $0260 ; spin
    emu.load_program(0x0300, &[0x58, 0xCB, 0xEE, 0x60, 0x02, 0x4C, 0x05, 0x03]);
    // handler: PHA ; LDA #$01 ; STA $9F27 ; PLA ; RTI
    emu.bus
        .load(0x0400, &[0x48, 0xA9, 0x01, 0x8D, 0x27, 0x9F, 0x68, 0x40]);
    emu.bus.write_rom(0, 0x3FFE, 0x00);
    emu.bus.write_rom(0, 0x3FFF, 0x04);
    emu.reset();

    emu.bus.write(0x9F26, 0x01); // VSYNC enable

    emu.run_for(2 * CYCLES_PER_FRAME);
    assert_eq!(emu.bus.read(0x0260), 1, "WAI released by the frame interrupt");
}

#[test]
fn cycle_counter_is_visible_through_the_emulator_registers() {
    let mut emu = Emulator::new(8);
    emu.load_program(0x0300, &[0xEA, 0x4C, 0x01, 0x03]);
    emu.reset();
    for _ in 0..100 {
        emu.step();
    }

    let cycles = emu.cycles();
    assert_eq!(emu.bus.read(0x9FB8), cycles as u8);
    assert_eq!(emu.bus.read(0x9FB9), (cycles >> 8) as u8);
    assert_eq!(emu.bus.read(0x9FBA), (cycles >> 16) as u8);
    assert_eq!(emu.bus.read(0x9FBB), (cycles >> 24) as u8);
}

#[test]
fn gif_recorder_snaps_one_frame_then_pauses() {
    let mut emu = Emulator::new(8);
    emu.bus.emu.recorder = GifRecorder::Paused;
    emu.bus.write(0x9FB5, 3); // snap
    assert_eq!(emu.bus.read(0x9FB5), 3);

    while !emu.video_step() {}
    assert_eq!(emu.bus.emu.recorder, GifRecorder::Paused);
    assert_eq!(emu.bus.read(0x9FB5), 1);
}

#[test]
fn bincode_state_round_trips_and_rebuilds_caches() {
    let mut emu = Emulator::new(4);
    emu.load_program(0x0300, &[0xEA, 0x4C, 0x01, 0x03]);
    emu.reset();
    emu.bus.write(0x1234, 0x77);
    emu.bus.set_ram_bank(2);
    emu.bus.write(0xA000, 0x88);
    emu.bus.vera.video_space_write(0x4000, 0x99);
    emu.run_for(500);

    let path = std::env::temp_dir().join("cx16_state_round_trip.bin");
    emu.save_state_to_file(&path).unwrap();

    let mut restored = Emulator::new(4);
    restored.load_state_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.bus.read(0x1234), 0x77);
    assert_eq!(restored.bus.ram_bank(), 2);
    assert_eq!(restored.bus.read(0xA000), 0x88);
    assert_eq!(restored.bus.vera.video_space_read(0x4000), 0x99);
    assert_eq!(restored.cycles(), emu.cycles());
    assert_eq!(restored.cpu.pc, emu.cpu.pc);

    // shadows and caches come back implicitly; a frame renders cleanly
    restored.bus.write(0x9F20 + 9, 0x01); // VGA out
    while !restored.video_step() {}
}

#[test]
fn raw_snapshot_layout_is_ram_then_video_banks() {
    let emu = Emulator::new(8);

    let mut full = Vec::new();
    emu.save_snapshot(&mut full, true, true).unwrap();
    let ram_part = 0xA000 + 8 * 0x2000;
    let video_part = 0x20000 + 8 + 512 + 7 + 7 + 128 * 8;
    assert_eq!(full.len(), ram_part + video_part);

    let mut no_bank = Vec::new();
    emu.save_snapshot(&mut no_bank, true, false).unwrap();
    assert_eq!(no_bank.len(), 0xA000 + video_part);
}

#[test]
fn run_for_keeps_cpu_and_raster_in_lockstep() {
    let mut emu = Emulator::new(8);
    emu.load_program(0x0300, &[0xEA, 0x4C, 0x01, 0x03]);
    emu.reset();

    let frames_before = emu.bus.vera.frame_count();
    emu.run_for(2 * CYCLES_PER_FRAME);
    let frames_after = emu.bus.vera.frame_count();
    assert!(frames_after >= frames_before + 2);
}
