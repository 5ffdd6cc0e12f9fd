#![allow(dead_code)]

pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];
pub const WHITE: Rgb = [0xff, 0xff, 0xff];
pub const RED: Rgb = [0xff, 0, 0];
pub const GREEN: Rgb = [0, 0xff, 0];
pub const BLUE: Rgb = [0, 0, 0xff];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn rgba(color: Rgb) -> [u8; 4] {
    [color[0], color[1], color[2], 0xff]
}

/// One RGBA pixel of a composited buffer.
pub fn pixel(buffer: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
    let offset = (y * width + x) * 4;
    [
        buffer[offset],
        buffer[offset + 1],
        buffer[offset + 2],
        buffer[offset + 3],
    ]
}

#[derive(Debug, Clone)]
pub struct FrameSpec {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// `None` leaves the graphic control extension out.
    pub disposal: Option<u8>,
    pub transparent: Option<u8>,
    pub delay: u16,
    pub interlaced: bool,
    pub local_table: Option<Vec<Rgb>>,
    /// Indices in display order, row by row.
    pub indices: Vec<u8>,
}

impl FrameSpec {
    pub fn new(width: u16, height: u16, indices: Vec<u8>) -> Self {
        assert_eq!(indices.len(), width as usize * height as usize);
        Self {
            left: 0,
            top: 0,
            width,
            height,
            disposal: Some(1),
            transparent: None,
            delay: 0,
            interlaced: false,
            local_table: None,
            indices,
        }
    }

    pub fn filled(width: u16, height: u16, index: u8) -> Self {
        Self::new(width, height, vec![index; width as usize * height as usize])
    }

    pub fn at(mut self, left: u16, top: u16) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    pub fn disposal(mut self, disposal: u8) -> Self {
        self.disposal = Some(disposal);
        self
    }

    pub fn without_control(mut self) -> Self {
        self.disposal = None;
        self
    }

    pub fn transparent(mut self, index: u8) -> Self {
        self.transparent = Some(index);
        self
    }

    pub fn delay(mut self, delay: u16) -> Self {
        self.delay = delay;
        self
    }

    pub fn interlaced(mut self) -> Self {
        self.interlaced = true;
        self
    }

    pub fn local_table(mut self, table: Vec<Rgb>) -> Self {
        self.local_table = Some(table);
        self
    }
}

/// Writes GIF streams for tests.
#[derive(Debug, Clone)]
pub struct GifBuilder {
    pub width: u16,
    pub height: u16,
    pub global_table: Option<Vec<Rgb>>,
    pub background: u8,
    pub loop_count: Option<u16>,
    pub frames: Vec<FrameSpec>,
}

impl GifBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            global_table: None,
            background: 0,
            loop_count: None,
            frames: Vec::new(),
        }
    }

    pub fn global_table(mut self, table: Vec<Rgb>) -> Self {
        self.global_table = Some(table);
        self
    }

    pub fn background(mut self, index: u8) -> Self {
        self.background = index;
        self
    }

    pub fn loop_count(mut self, count: u16) -> Self {
        self.loop_count = Some(count);
        self
    }

    pub fn frame(mut self, frame: FrameSpec) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&self.width.to_le_bytes());
        data.extend_from_slice(&self.height.to_le_bytes());

        let global = self.global_table.as_ref().map(|table| padded(table));
        let packed = match &global {
            Some(table) => 0b1000_0000 | (0b111 << 4) | size_bits(table.len()),
            None => 0b111 << 4,
        };
        data.extend_from_slice(&[packed, self.background, 0]);
        if let Some(table) = &global {
            write_table(&mut data, table);
        }

        if let Some(count) = self.loop_count {
            data.extend_from_slice(&[0x21, 0xff, 11]);
            data.extend_from_slice(b"NETSCAPE2.0");
            data.extend_from_slice(&[3, 1]);
            data.extend_from_slice(&count.to_le_bytes());
            data.push(0);
        }

        for frame in &self.frames {
            let table_len = frame
                .local_table
                .as_ref()
                .or(self.global_table.as_ref())
                .map_or(2, |table| padded(table).len());
            write_frame(&mut data, frame, table_len);
        }

        data.push(0x3b);
        data
    }
}

fn padded(table: &[Rgb]) -> Vec<Rgb> {
    let len = table.len().max(2).next_power_of_two();
    let mut table = table.to_vec();
    table.resize(len, BLACK);
    table
}

fn size_bits(len: usize) -> u8 {
    (len.trailing_zeros() - 1) as u8
}

fn write_table(data: &mut Vec<u8>, table: &[Rgb]) {
    for color in table {
        data.extend_from_slice(color);
    }
}

fn write_frame(data: &mut Vec<u8>, frame: &FrameSpec, table_len: usize) {
    if let Some(disposal) = frame.disposal {
        let packed = (disposal << 2) | frame.transparent.is_some() as u8;
        data.extend_from_slice(&[0x21, 0xf9, 4, packed]);
        data.extend_from_slice(&frame.delay.to_le_bytes());
        data.extend_from_slice(&[frame.transparent.unwrap_or(0), 0]);
    }

    data.push(0x2c);
    for value in [frame.left, frame.top, frame.width, frame.height] {
        data.extend_from_slice(&value.to_le_bytes());
    }

    let local = frame.local_table.as_ref().map(|table| padded(table));
    let mut packed = 0;
    if let Some(table) = &local {
        packed |= 0b1000_0000 | size_bits(table.len());
    }
    if frame.interlaced {
        packed |= 0b0100_0000;
    }
    data.push(packed);
    if let Some(table) = &local {
        write_table(data, table);
    }

    let indices = if frame.interlaced {
        interlace(&frame.indices, frame.width as usize, frame.height as usize)
    } else {
        frame.indices.clone()
    };

    let minimum_code_size = (table_len.trailing_zeros() as u8).max(2);
    data.push(minimum_code_size);
    for block in lzw_encode(&indices, minimum_code_size).chunks(255) {
        data.push(block.len() as u8);
        data.extend_from_slice(block);
    }
    data.push(0);
}

/// Reorders display rows into the four-pass transmission order.
pub fn interlace(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let passes = (0..height)
        .step_by(8)
        .chain((4..height).step_by(8))
        .chain((2..height).step_by(4))
        .chain((1..height).step_by(2));

    passes
        .flat_map(|row| indices[row * width..(row + 1) * width].iter().copied())
        .collect()
}

/// Encodes every index as a literal code, clearing the dictionary before it
/// fills up. Valid, if far from compact.
pub fn lzw_encode(indices: &[u8], minimum_code_size: u8) -> Vec<u8> {
    let clear_code = 1_u32 << minimum_code_size;
    let end_of_information_code = clear_code + 1;

    let mut writer = BitWriter::default();
    let mut code_size = minimum_code_size as u32 + 1;
    let mut available = clear_code + 2;
    let mut first = true;

    writer.write(clear_code, code_size);
    for &index in indices {
        if available >= 4000 {
            writer.write(clear_code, code_size);
            code_size = minimum_code_size as u32 + 1;
            available = clear_code + 2;
            first = true;
        }

        writer.write(index as u32, code_size);
        if first {
            first = false;
            continue;
        }

        available += 1;
        if available == 1 << code_size && code_size < 12 {
            code_size += 1;
        }
    }
    writer.write(end_of_information_code, code_size);

    writer.finish()
}

#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    bits: u32,
    bit_count: u32,
}

impl BitWriter {
    fn write(&mut self, code: u32, size: u32) {
        self.bits |= code << self.bit_count;
        self.bit_count += size;
        while self.bit_count >= 8 {
            self.bytes.push(self.bits as u8);
            self.bits >>= 8;
            self.bit_count -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.bits as u8);
        }
        self.bytes
    }
}

