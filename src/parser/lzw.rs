use log::{trace, warn};

use super::bit_reader::BitReader;
use super::reader::{ByteReader, EndOfStream};
use crate::error::ErrorState;

const MAX_STACK_SIZE: usize = 4096;
const MAX_CODE_SIZE: u32 = 12;

/// Colour-table indices recovered from one image data block.
#[derive(Debug)]
pub struct Decompressed {
    pub indices: Vec<u8>,
    /// How many of `indices` came from the data stream, the rest are zero.
    pub decoded: usize,
    pub errors: ErrorState,
}

/// Decodes the image data block at the reader's position (the LZW minimum
/// code size byte followed by data sub-blocks) into `pixel_count` indices.
pub fn decompress(reader: &mut ByteReader, pixel_count: usize) -> Decompressed {
    let minimum_code_size = match reader.read_byte() {
        Ok(size) => size,
        Err(EndOfStream) => {
            return Decompressed {
                indices: vec![0; pixel_count],
                decoded: 0,
                errors: ErrorState::END_OF_INPUT_STREAM
                    | ErrorState::FRAME_HAS_NO_IMAGE_DATA
                    | too_few(0, pixel_count),
            }
        }
    };

    let sub_blocks = reader.read_sub_blocks();
    let mut result = lzw_decode(&sub_blocks.data, minimum_code_size, pixel_count);
    result.errors |= sub_blocks.errors;
    if sub_blocks.blocks == 0 {
        result.errors |= ErrorState::FRAME_HAS_NO_IMAGE_DATA;
    }
    result
}

fn too_few(decoded: usize, pixel_count: usize) -> ErrorState {
    if decoded < pixel_count {
        ErrorState::TOO_FEW_PIXELS_IN_IMAGE_DATA
    } else {
        ErrorState::empty()
    }
}

/// Decodes a concatenated LZW code stream.
pub fn lzw_decode(buf: &[u8], minimum_code_size: u8, pixel_count: usize) -> Decompressed {
    let mut indices = vec![0; pixel_count];

    if minimum_code_size as u32 >= MAX_CODE_SIZE {
        warn!("lzw minimum code size {minimum_code_size} leaves no room in the dictionary");
        return Decompressed {
            indices,
            decoded: 0,
            errors: ErrorState::LZW_MINIMUM_CODE_SIZE_TOO_LARGE | too_few(0, pixel_count),
        };
    }

    let clear_code = 1_usize << minimum_code_size;
    let end_of_information_code = clear_code + 1;

    // {CODE} is stored as a link to {CODE-1} plus its last index K.
    let mut prefix = [0_u16; MAX_STACK_SIZE];
    let mut suffix = [0_u8; MAX_STACK_SIZE];
    let mut first_index = [0_u8; MAX_STACK_SIZE];
    let mut stack: Vec<u8> = Vec::with_capacity(MAX_STACK_SIZE + 1);

    for code in 0..clear_code {
        suffix[code] = code as u8;
        first_index[code] = code as u8;
    }

    let mut reader = BitReader::new(buf);
    let mut code_size = minimum_code_size as u32 + 1;
    let mut available = clear_code + 2;
    let mut last_code: Option<usize> = None;

    let mut written = 0;
    let mut errors = ErrorState::empty();

    while written < pixel_count {
        let Some(code) = reader.next(code_size) else {
            trace!("lzw code stream exhausted after {written} pixels");
            break;
        };
        let code = code as usize;

        if code == clear_code {
            code_size = minimum_code_size as u32 + 1;
            available = clear_code + 2;
            last_code = None;
            continue;
        }

        if code == end_of_information_code {
            break;
        }

        let Some(previous) = last_code else {
            if code >= clear_code {
                warn!("lzw stream starts with code {code} which is not a literal");
                errors |= ErrorState::CODE_NOT_IN_DICTIONARY;
                break;
            }
            indices[written] = code as u8;
            written += 1;
            last_code = Some(code);
            continue;
        };

        if code > available || (code == available && available >= MAX_STACK_SIZE) {
            warn!("lzw code {code} requested before it was defined (next free code {available})");
            errors |= ErrorState::CODE_NOT_IN_DICTIONARY;
            break;
        }

        // The KwKwK case: {CODE} is {CODE-1} followed by the first index of {CODE-1}.
        let (mut walk, k) = if code == available {
            (previous, first_index[previous])
        } else {
            (code, first_index[code])
        };

        stack.clear();
        if code == available {
            stack.push(k);
        }
        while walk > end_of_information_code {
            stack.push(suffix[walk]);
            walk = prefix[walk] as usize;
        }
        stack.push(suffix[walk]);

        if available < MAX_STACK_SIZE {
            prefix[available] = previous as u16;
            suffix[available] = k;
            first_index[available] = first_index[previous];
            available += 1;
            if available & ((1 << code_size) - 1) == 0 && code_size < MAX_CODE_SIZE {
                code_size += 1;
            }
        }

        for &index in stack.iter().rev() {
            if written == pixel_count {
                break;
            }
            indices[written] = index;
            written += 1;
        }

        last_code = Some(code);
    }

    if written < pixel_count {
        warn!("lzw stream produced {written} of {pixel_count} pixels");
    }
    errors |= too_few(written, pixel_count);

    Decompressed {
        indices,
        decoded: written,
        errors,
    }
}
