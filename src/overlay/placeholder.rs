use super::clip::OverlayClip;
use image::{Rgba, RgbaImage};

const SIZE: u32 = 512;
const FILL: Rgba<u8> = Rgba([0, 255, 0, 255]);
const INK: Rgba<u8> = Rgba([255, 0, 0, 255]);
const LABEL: &str = "OVERLAY";

// 5x7 glyphs, one row per byte, low 5 bits used (MSB first)
fn glyph(c: char) -> [u8; 7] {
    match c {
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        _ => [0; 7],
    }
}

/// Stand-in overlay used when the real asset cannot be loaded in time
///
/// The key-green fill is removed by the keying pass, leaving only the label.
pub fn placeholder_image() -> RgbaImage {
    let mut image = RgbaImage::from_pixel(SIZE, SIZE, FILL);

    let scale = 8;
    let advance = 6 * scale;
    let text_width = LABEL.len() as u32 * advance - scale;
    let origin_x = (SIZE - text_width) / 2;
    let origin_y = (SIZE - 7 * scale) / 2;

    for (n, c) in LABEL.chars().enumerate() {
        let rows = glyph(c);
        let gx = origin_x + n as u32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = gx + col * scale + dx;
                        let y = origin_y + row as u32 * scale + dy;
                        image.put_pixel(x, y, INK);
                    }
                }
            }
        }
    }

    image
}

pub fn placeholder_clip() -> OverlayClip {
    OverlayClip::still(placeholder_image())
}
