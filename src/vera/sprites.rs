// Sprite properties and the budgeted sprite line renderer. Each of the
// 128 sprites carries a derived record plus a prerendered 8-bit-per-pixel
// backbuffer with a per-line render-cost table; the line renderer spends
// a fixed cycle budget and leaves whatever it cannot afford transparent.

use super::{Vera, VideoMem, NUM_SPRITES, SCREEN_WIDTH};

// one lookup charge plus ~one clock per pixel across a scanline
const SPRITE_LINE_BUDGET: i32 = 800 + 1;

#[derive(Clone, Default)]
pub(crate) struct SpriteProps {
    signature: u32,

    pub zdepth: u8,
    pub collision_mask: u8,

    pub x: i16,
    pub y: i16,
    pub width_log2: u8,
    pub height_log2: u8,
    pub width: u16,
    pub height: u16,

    hflip: bool,
    vflip: bool,

    color_mode: u8,
    address: u32,

    pub palette_offset: u16,

    pub backbuffer: Vec<u8>,
    pub line_cost: Vec<u8>,
}

#[derive(Clone)]
pub(crate) struct SpriteCache {
    pub props: Vec<SpriteProps>,
}

impl bincode::Encode for SpriteCache {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        _encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        Ok(())
    }
}

impl<Context> bincode::Decode<Context> for SpriteCache {
    fn decode<D: bincode::de::Decoder>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::new())
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for SpriteCache {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::new())
    }
}

impl SpriteCache {
    pub fn new() -> Self {
        Self {
            props: vec![SpriteProps::default(); NUM_SPRITES],
        }
    }

    /// Re-derive one sprite's record from its attribute bytes. A change of
    /// signature (position bytes excluded) drops the rendered backbuffer.
    pub fn refresh(&mut self, index: usize, sprite_data: &[u8], mem: &VideoMem) {
        let data: [u8; 8] = sprite_data[index * 8..index * 8 + 8]
            .try_into()
            .unwrap_or_default();
        let signature = (data[0] as u32) << 24
            | (data[1] as u32) << 16
            | (data[6] as u32) << 8
            | data[7] as u32;

        {
            let props = &mut self.props[index];
            if signature != props.signature {
                props.backbuffer.clear();
                props.signature = signature;
            }

            props.zdepth = (data[6] >> 2) & 3;
            props.collision_mask = data[6] & 0xF0;

            let mut x = data[2] as i16 | ((data[3] & 3) as i16) << 8;
            let mut y = data[4] as i16 | ((data[5] & 3) as i16) << 8;
            props.width_log2 = ((data[7] >> 4) & 3) + 3;
            props.height_log2 = (data[7] >> 6) + 3;
            props.width = 1 << props.width_log2;
            props.height = 1 << props.height_log2;

            // negative-coordinate wrap fixup
            if x >= 0x400 - props.width as i16 {
                x -= 0x400;
            }
            if y >= 0x400 - props.height as i16 {
                y -= 0x400;
            }
            props.x = x;
            props.y = y;

            props.hflip = data[6] & 1 != 0;
            props.vflip = data[6] & 2 != 0;

            props.color_mode = (data[1] >> 7) & 1;
            props.address = (data[0] as u32) << 5 | ((data[1] & 0x0F) as u32) << 13;
            props.palette_offset = ((data[7] & 0x0F) as u16) << 4;
        }

        if self.props[index].backbuffer.is_empty() {
            self.build_backbuffer(index, mem);
        }
    }

    fn build_backbuffer(&mut self, index: usize, mem: &VideoMem) {
        let (width, height, width_log2) = {
            let props = &self.props[index];
            (
                props.width as usize,
                props.height as usize,
                props.width_log2,
            )
        };
        let mut buf = vec![0u8; width * height];
        let mut cost = vec![0u8; height];
        for (sy, cost_slot) in cost.iter_mut().enumerate() {
            *cost_slot = prerender_sprite_row(
                &self.props[index],
                mem,
                sy,
                &mut buf[sy << width_log2..][..width],
            );
        }
        let props = &mut self.props[index];
        props.backbuffer = buf;
        props.line_cost = cost;
    }

    /// A video-RAM write landed inside a sprite's bitmap: re-render the
    /// affected backbuffer row.
    pub fn poke_video_write(&mut self, addr: u32, mem: &VideoMem) {
        for index in 0..NUM_SPRITES {
            let props = &self.props[index];
            if props.backbuffer.is_empty() {
                continue;
            }
            let span = 2u32 << (props.width_log2 + props.height_log2);
            if addr < props.address || addr >= props.address + span {
                continue;
            }
            let row_shift = props.width_log2 - (1 - props.color_mode);
            let row = ((addr - props.address) >> row_shift) as usize;
            if row >= props.height as usize {
                continue;
            }
            let (width, width_log2) = (props.width as usize, props.width_log2);
            let mut row_buf = vec![0u8; width];
            let cost = prerender_sprite_row(&self.props[index], mem, row, &mut row_buf);
            let props = &mut self.props[index];
            props.backbuffer[row << width_log2..][..width].copy_from_slice(&row_buf);
            props.line_cost[row] = cost;
        }
    }
}

/// Render one sprite row into 8-bpp pixels and report its cycle cost:
/// one clock for the lookup, one per pixel, one more on each 32-bit
/// fetch boundary.
fn prerender_sprite_row(props: &SpriteProps, mem: &VideoMem, sy: usize, out: &mut [u8]) -> u8 {
    let mut cost = 1u8;

    let eff_sy = if props.vflip {
        props.height as usize - 1 - sy
    } else {
        sy
    };

    let (data, base) = match props.color_mode {
        0 => (mem.shadow_4bpp, (props.address as usize) << 1),
        _ => (mem.vram, props.address as usize),
    };
    let mask = data.len() - 1;
    let row_base = base + (eff_sy << props.width_log2);

    let penalty_mask = 7usize >> props.color_mode;
    let mut eff_sx: i32 = if props.hflip {
        props.width as i32 - 1
    } else {
        0
    };
    let step: i32 = if props.hflip { -1 } else { 1 };

    for (sx, slot) in out.iter_mut().enumerate() {
        cost = cost.saturating_add(if sx & penalty_mask != 0 { 1 } else { 2 });
        *slot = data[(row_base + eff_sx as usize) & mask];
        eff_sx += step;
    }
    cost
}

impl Vera {
    /// Render all active sprites for one (layer-space) line into the
    /// per-column color/z/collision scratch buffers, then resample by the
    /// horizontal scale and fold the line's collisions into the frame
    /// latch.
    pub(super) fn render_sprite_line(&mut self, y: u16, hsize: u16) {
        let hscale = self.reg_composer[1] as u32;
        let xaccum_max = (hsize.max(1) as u32 - 1) * hscale;
        let x_max = (xaccum_max >> 7) as usize;

        self.sprite_line_col.0.fill(0);
        self.sprite_line_z.0.fill(0);
        self.sprite_line_mask.0.fill(0);
        self.sprite_line_collisions.0.fill(0);

        let col = &mut self.sprite_line_col.0;
        let z = &mut self.sprite_line_z.0;
        let mask = &mut self.sprite_line_mask.0;
        let collisions = &mut self.sprite_line_collisions.0;

        let mut budget = SPRITE_LINE_BUDGET;
        for props in self.sprites.props.iter() {
            if props.zdepth == 0 {
                continue;
            }

            let line = y as i32;
            if line < props.y as i32 || line >= props.y as i32 + props.height as i32 {
                continue;
            }
            let eff_sy = (line - props.y as i32) as usize;
            if props.backbuffer.is_empty() {
                continue;
            }
            let row = &props.backbuffer[eff_sy << props.width_log2..][..props.width as usize];
            let line_cost = props.line_cost[eff_sy] as i32;

            if line_cost <= budget {
                // whole row affordable: blit it and charge the table cost
                budget -= line_cost;
                for (sx, &color) in row.iter().enumerate() {
                    let line_x = props.x as i32 + sx as i32;
                    if line_x < 0 {
                        continue;
                    }
                    let line_x = line_x as usize;
                    if line_x > x_max || line_x >= SCREEN_WIDTH {
                        continue;
                    }
                    if color > 0 {
                        collisions[line_x] |= mask[line_x] & props.collision_mask;
                        mask[line_x] |= props.collision_mask;
                        if props.zdepth > z[line_x] {
                            col[line_x] =
                                (color as u16).wrapping_add(props.palette_offset) as u8;
                            z[line_x] = props.zdepth;
                        }
                    }
                }
            } else {
                // budget exhausts mid-sprite: count down per pixel and
                // leave the rest transparent
                budget -= 1;
                let penalty_mask = 7usize >> props.color_mode;
                for (sx, &color) in row.iter().enumerate() {
                    let line_x = props.x as i32 + sx as i32;
                    if line_x < 0 {
                        continue;
                    }
                    let line_x = line_x as usize;
                    if line_x > x_max || line_x >= SCREEN_WIDTH {
                        continue;
                    }
                    budget -= if sx & penalty_mask != 0 { 1 } else { 2 };
                    if budget <= 0 {
                        break;
                    }
                    if color > 0 {
                        collisions[line_x] |= mask[line_x] & props.collision_mask;
                        mask[line_x] |= props.collision_mask;
                        if props.zdepth > z[line_x] {
                            col[line_x] =
                                (color as u16).wrapping_add(props.palette_offset) as u8;
                            z[line_x] = props.zdepth;
                        }
                    }
                }
                if budget <= 0 {
                    break;
                }
            }
        }

        let mut xaccum = xaccum_max;
        for x in (0..hsize as usize).rev() {
            let eff_x = ((xaccum >> 7) as usize).min(SCREEN_WIDTH - 1);
            col[x] = col[eff_x];
            z[x] = z[eff_x];
            self.sprite_collisions |= collisions[eff_x];
            xaccum = xaccum.wrapping_sub(hscale);
        }
    }
}
