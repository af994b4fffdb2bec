// Layer property cache. A derived record per layer is keyed by a 24-bit
// signature of the first three layer registers; records live in a 16-slot
// pool shared by both layers, evicted least-recently-used. Each record
// carries an optional backbuffer holding the full map prerendered to
// pixels, patched or dropped when video RAM underneath it changes.

use super::{VideoMem, SCREEN_HEIGHT, VRAM_SIZE};

const POOL_SIZE: usize = 16;

#[derive(Clone, Default)]
pub(crate) struct LayerProps {
    pub signature: u32,
    last_used: u64,

    pub color_depth: u8,
    pub map_base: u32,
    pub tile_base: u32,

    pub text_mode: bool,
    pub text_mode_256c: bool,
    pub tile_mode: bool,
    pub bitmap_mode: bool,

    pub hscroll: u16,
    pub vscroll: u16,

    pub mapw_log2: u8,
    pub maph_log2: u8,
    pub tilew: u16,
    pub tileh: u16,
    pub tilew_log2: u8,
    pub tileh_log2: u8,

    pub mapw_max: u16,
    pub maph_max: u16,
    pub tilew_max: u16,
    pub tileh_max: u16,
    pub layerw_max: u16,
    pub layerh_max: u16,

    pub bits_per_pixel: u8,
    pub bitmap_palette_offset: u8,

    pub layer_backbuffer: Option<Vec<u8>>,
}

#[derive(Clone)]
pub(crate) struct LayerCache {
    pool: Vec<LayerProps>,
    generation: u64,
    pub active: [Option<usize>; 2],
    pub dirty: [bool; 2],
}

// The whole cache is derived state: it encodes to nothing and decodes
// fresh with both layers dirty.
impl bincode::Encode for LayerCache {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        _encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        Ok(())
    }
}

impl<Context> bincode::Decode<Context> for LayerCache {
    fn decode<D: bincode::de::Decoder>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::new())
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for LayerCache {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        _decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::new())
    }
}

impl LayerCache {
    pub fn new() -> Self {
        Self {
            pool: Vec::new(),
            generation: 0,
            active: [None; 2],
            dirty: [true; 2],
        }
    }

    pub fn active_props(&self, layer: usize) -> Option<&LayerProps> {
        self.active[layer].map(|slot| &self.pool[slot])
    }

    pub fn slot_is_bitmap(&self, slot: usize) -> bool {
        self.pool[slot].bitmap_mode
    }

    fn touch(&mut self, slot: usize) {
        self.generation += 1;
        self.pool[slot].last_used = self.generation;
    }

    /// Rebuild the derived record for a layer whose registers changed.
    pub fn refresh(&mut self, layer: usize, reg_layer: &[[u8; 7]; 2], mem: &VideoMem) {
        let regs = reg_layer[layer];
        let signature =
            regs[0] as u32 | (regs[1] as u32) << 8 | (regs[2] as u32) << 16;

        let needs_lookup = self.active[layer]
            .map_or(true, |slot| self.pool[slot].signature != signature);
        if needs_lookup {
            // The outgoing record stays in the pool as a cache entry.
            self.active[layer] = None;
            let hit = self
                .pool
                .iter()
                .enumerate()
                .find(|(slot, props)| {
                    !self.is_pinned(*slot) && props.signature == signature
                })
                .map(|(slot, _)| slot);
            match hit {
                Some(slot) => {
                    self.touch(slot);
                    self.active[layer] = Some(slot);
                    self.refresh_scroll_slot(slot, &regs);
                }
                None => {
                    let slot = self.alloc_slot();
                    self.pool[slot] = derive_props(signature, &regs);
                    self.touch(slot);
                    self.active[layer] = Some(slot);
                }
            }
        }

        let slot = match self.active[layer] {
            Some(slot) => slot,
            None => return,
        };
        if self.pool[slot].bitmap_mode {
            self.pool[slot].bitmap_palette_offset = (regs[4] & 0x0F) << 4;
        }
        if self.pool[slot].layer_backbuffer.is_none() {
            let buf = build_backbuffer(&self.pool[slot], mem);
            self.pool[slot].layer_backbuffer = Some(buf);
        }
        self.dirty[layer] = false;
    }

    fn is_pinned(&self, slot: usize) -> bool {
        self.active[0] == Some(slot) || self.active[1] == Some(slot)
    }

    fn alloc_slot(&mut self) -> usize {
        if self.pool.len() < POOL_SIZE {
            self.pool.push(LayerProps::default());
            return self.pool.len() - 1;
        }
        self.pool
            .iter()
            .enumerate()
            .filter(|(slot, _)| !self.is_pinned(*slot))
            .min_by_key(|(_, props)| props.last_used)
            .map(|(slot, _)| slot)
            .unwrap_or(0)
    }

    /// Scroll-only register writes update the active record in place.
    pub fn refresh_scroll(&mut self, layer: usize, reg_layer: &[[u8; 7]; 2]) {
        if let Some(slot) = self.active[layer] {
            let regs = reg_layer[layer];
            self.refresh_scroll_slot(slot, &regs);
        }
    }

    fn refresh_scroll_slot(&mut self, slot: usize, regs: &[u8; 7]) {
        let props = &mut self.pool[slot];
        if !props.bitmap_mode {
            props.hscroll = regs[3] as u16 | ((regs[4] & 0x0F) as u16) << 8;
            props.vscroll = regs[5] as u16 | ((regs[6] & 0x0F) as u16) << 8;
        } else {
            props.hscroll = 0;
            props.vscroll = 0;
        }
    }

    pub fn clear_backbuffer(&mut self, slot: usize) {
        self.pool[slot].layer_backbuffer = None;
        for layer in 0..2 {
            if self.active[layer] == Some(slot) {
                self.dirty[layer] = true;
            }
        }
    }

    /// A video-RAM write landed at `addr`: patch or invalidate every
    /// allocated record it touches.
    pub fn poke_video_write(&mut self, addr: u32, mem: &VideoMem) {
        for slot in 0..self.pool.len() {
            if self.is_map_addr(slot, addr) {
                self.poke_map(slot, addr, mem);
            }
            if self.is_tile_addr(slot, addr) {
                self.poke_tile(slot, addr, mem);
            }
        }
    }

    fn is_map_addr(&self, slot: usize, addr: u32) -> bool {
        let props = &self.pool[slot];
        if props.bitmap_mode {
            return false;
        }
        addr >= props.map_base
            && addr < props.map_base + (2 << (props.mapw_log2 + props.maph_log2))
    }

    fn is_tile_addr(&self, slot: usize, addr: u32) -> bool {
        let props = &self.pool[slot];
        if addr < props.tile_base {
            return false;
        }
        let tile_size =
            props.tilew as u32 * props.tileh as u32 * props.bits_per_pixel as u32 / 8;
        let tile_count: u32 = if props.bits_per_pixel == 1 { 256 } else { 1024 };
        addr < props.tile_base + tile_size.saturating_mul(tile_count)
    }

    /// Patch the backbuffer tile whose map entry was just rewritten.
    fn poke_map(&mut self, slot: usize, addr: u32, mem: &VideoMem) {
        let mut buf = match self.pool[slot].layer_backbuffer.take() {
            Some(buf) => buf,
            None => return,
        };
        let props = &self.pool[slot];

        let entry_addr = (addr as usize & !1) & (VRAM_SIZE - 1);
        let tile_entry = mem.vram[entry_addr] as u16
            | (mem.vram[(entry_addr + 1) & (VRAM_SIZE - 1)] as u16) << 8;
        let byte1 = (tile_entry >> 8) as u8;

        let tile_index = if props.text_mode {
            (tile_entry & 0xFF) as usize
        } else {
            (tile_entry & 0x3FF) as usize
        };
        let tile_offset = tile_index << (props.tilew_log2 + props.tileh_log2);
        let vflip = !props.text_mode && byte1 & 0x08 != 0;
        let hflip = !props.text_mode && byte1 & 0x04 != 0;
        let palette_offset = byte1 & 0xF0;

        let map_addr = ((addr - props.map_base) >> 1) as usize;
        let map_x = map_addr & props.mapw_max as usize;
        let map_y = map_addr >> props.mapw_log2;
        let buffer_width = (props.mapw_max as usize + 1) << props.tilew_log2;
        let map_offset =
            buffer_width * (map_y << props.tileh_log2) + ((props.tilew as usize) * map_x);

        let (fg, bg) = if props.text_mode_256c {
            (byte1, 0)
        } else {
            (byte1 & 0x0F, byte1 >> 4)
        };

        let (shadow, shift) = mem.tile_shadow(props.color_depth);
        let shadow_base = (props.tile_base as usize) << shift;
        let smask = shadow.len() - 1;
        let bmask = buf.len() - 1;

        for ty in 0..=props.tileh_max as usize {
            let sy = if vflip {
                props.tileh_max as usize - ty
            } else {
                ty
            };
            for tx in 0..=props.tilew_max as usize {
                let sx = if hflip {
                    props.tilew_max as usize - tx
                } else {
                    tx
                };
                let pix =
                    shadow[(shadow_base + tile_offset + (sy << props.tilew_log2) + sx) & smask];
                let color = if props.text_mode {
                    if pix != 0 {
                        fg
                    } else {
                        bg
                    }
                } else if pix != 0 {
                    pix.wrapping_add(palette_offset)
                } else {
                    0
                };
                buf[(map_offset + buffer_width * ty + tx) & bmask] = color;
            }
        }

        self.pool[slot].layer_backbuffer = Some(buf);
    }

    /// Tile (or bitmap) data under this record changed. Bitmap layers are
    /// patched in place; tiled layers drop the backbuffer since the write
    /// can touch any number of placed tiles.
    fn poke_tile(&mut self, slot: usize, addr: u32, mem: &VideoMem) {
        if !self.pool[slot].bitmap_mode {
            self.clear_backbuffer(slot);
            return;
        }

        let mut buf = match self.pool[slot].layer_backbuffer.take() {
            Some(buf) => buf,
            None => return,
        };
        let props = &self.pool[slot];
        let poked = ((addr - props.tile_base) as usize) << (3 - props.color_depth);
        let pokes = 8usize >> props.color_depth;

        let (shadow, shift) = mem.tile_shadow(props.color_depth);
        let shadow_base = (props.tile_base as usize) << shift;
        let smask = shadow.len() - 1;
        let bmask = buf.len() - 1;

        for i in 0..pokes {
            let pix = shadow[(shadow_base + poked + i) & smask];
            buf[(poked + i) & bmask] = if pix != 0 {
                pix.wrapping_add(props.bitmap_palette_offset)
            } else {
                0
            };
        }

        self.pool[slot].layer_backbuffer = Some(buf);
    }
}

fn derive_props(signature: u32, regs: &[u8; 7]) -> LayerProps {
    let mut props = LayerProps {
        signature,
        ..Default::default()
    };

    props.color_depth = regs[0] & 0x3;
    props.map_base = (regs[1] as u32) << 9;
    props.tile_base = ((regs[2] & 0xFC) as u32) << 9;
    props.bitmap_mode = regs[0] & 0x4 != 0;
    props.text_mode = props.color_depth == 0 && !props.bitmap_mode;
    props.text_mode_256c = regs[0] & 0x8 != 0;
    props.tile_mode = !props.bitmap_mode && !props.text_mode;

    if !props.bitmap_mode {
        props.hscroll = regs[3] as u16 | ((regs[4] & 0x0F) as u16) << 8;
        props.vscroll = regs[5] as u16 | ((regs[6] & 0x0F) as u16) << 8;
    }

    let mut mapw = 0u16;
    let mut maph = 0u16;
    if props.tile_mode || props.text_mode {
        props.mapw_log2 = 5 + ((regs[0] >> 4) & 3);
        props.maph_log2 = 5 + ((regs[0] >> 6) & 3);
        mapw = 1 << props.mapw_log2;
        maph = 1 << props.maph_log2;

        props.tilew_log2 = 3 + (regs[2] & 1);
        props.tileh_log2 = 3 + ((regs[2] >> 1) & 1);
        props.tilew = 1 << props.tilew_log2;
        props.tileh = 1 << props.tileh_log2;
    } else {
        // bitmap mode is tiled mode with a single huge tile
        props.tilew = if regs[2] & 1 != 0 { 640 } else { 320 };
        props.tileh = SCREEN_HEIGHT as u16;
    }

    // All of these are powers of two outside bitmap mode, so wrapping
    // masks stand in for modulo.
    props.mapw_max = mapw.wrapping_sub(1);
    props.maph_max = maph.wrapping_sub(1);
    props.tilew_max = props.tilew - 1;
    props.tileh_max = props.tileh - 1;
    props.layerw_max = mapw.wrapping_mul(props.tilew).wrapping_sub(1);
    props.layerh_max = maph.wrapping_mul(props.tileh).wrapping_sub(1);

    props.bits_per_pixel = 1 << props.color_depth;

    props
}

fn map_entry_addr(props: &LayerProps, x: usize, y: usize) -> usize {
    (props.map_base as usize)
        + ((((y >> props.tileh_log2) << props.mapw_log2) + (x >> props.tilew_log2)) << 1)
}

fn build_backbuffer(props: &LayerProps, mem: &VideoMem) -> Vec<u8> {
    if props.bitmap_mode {
        let size = props.tilew as usize * props.tileh as usize;
        let (shadow, shift) = mem.tile_shadow(props.color_depth);
        let base = (props.tile_base as usize) << shift;
        let smask = shadow.len() - 1;
        let mut buf = vec![0u8; size];
        for (i, slot) in buf.iter_mut().enumerate() {
            let pix = shadow[(base + i) & smask];
            *slot = if pix != 0 {
                pix.wrapping_add(props.bitmap_palette_offset)
            } else {
                0
            };
        }
        return buf;
    }

    let width = 1usize << (props.mapw_log2 + props.tilew_log2);
    let height = 1usize << (props.maph_log2 + props.tileh_log2);
    let mut buf = vec![0u8; width * height];
    for y in 0..height {
        let row = &mut buf[width * y..width * (y + 1)];
        if props.text_mode {
            prerender_line_text(props, mem, y, row);
        } else {
            prerender_line_tile(props, mem, y, row);
        }
    }
    buf
}

fn prerender_line_text(props: &LayerProps, mem: &VideoMem, y: usize, out: &mut [u8]) {
    let yy = y & props.tileh_max as usize;
    let y_add = yy << props.tilew_log2;
    let (shadow, shift) = mem.tile_shadow(props.color_depth);
    let shadow_base = (props.tile_base as usize) << shift;
    let smask = shadow.len() - 1;
    let vmask = VRAM_SIZE - 1;

    let mut fg = 0u8;
    let mut bg = 0u8;
    let mut tile_start = 0usize;
    for (x, slot) in out.iter_mut().enumerate() {
        if x & props.tilew_max as usize == 0 {
            let map_addr = map_entry_addr(props, x, y);
            let tile_index = mem.vram[map_addr & vmask];
            let byte1 = mem.vram[(map_addr + 1) & vmask];
            if props.text_mode_256c {
                fg = byte1;
                bg = 0;
            } else {
                fg = byte1 & 0x0F;
                bg = byte1 >> 4;
            }
            tile_start = (tile_index as usize) << (props.tilew_log2 + props.tileh_log2);
        }
        let xx = x & props.tilew_max as usize;
        let pix = shadow[(shadow_base + tile_start + y_add + xx) & smask];
        *slot = if pix != 0 { fg } else { bg };
    }
}

fn prerender_line_tile(props: &LayerProps, mem: &VideoMem, y: usize, out: &mut [u8]) {
    let yy = y & props.tileh_max as usize;
    let yy_flip = yy ^ props.tileh_max as usize;
    let y_add = yy << props.tilew_log2;
    let y_add_flip = yy_flip << props.tilew_log2;
    let (shadow, shift) = mem.tile_shadow(props.color_depth);
    let shadow_base = (props.tile_base as usize) << shift;
    let smask = shadow.len() - 1;
    let vmask = VRAM_SIZE - 1;

    let mut vflip = false;
    let mut hflip = false;
    let mut palette_offset = 0u8;
    let mut tile_start = 0usize;
    for (x, slot) in out.iter_mut().enumerate() {
        if x & props.tilew_max as usize == 0 {
            let map_addr = map_entry_addr(props, x, y);
            let byte0 = mem.vram[map_addr & vmask];
            let byte1 = mem.vram[(map_addr + 1) & vmask];
            vflip = byte1 & 0x08 != 0;
            hflip = byte1 & 0x04 != 0;
            palette_offset = byte1 & 0xF0;
            let tile_index = byte0 as usize | ((byte1 & 3) as usize) << 8;
            tile_start = tile_index << (props.tilew_log2 + props.tileh_log2);
        }

        let xx = x & props.tilew_max as usize;
        let row_add = if vflip { y_add_flip } else { y_add };
        let col_add = if hflip {
            props.tilew_max as usize - xx
        } else {
            xx
        };
        let pix = shadow[(shadow_base + tile_start + row_add + col_add) & smask];
        *slot = if pix != 0 {
            pix.wrapping_add(palette_offset)
        } else {
            0
        };
    }
}
