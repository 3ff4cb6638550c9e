use image::{imageops, RgbaImage};

/// Source region that fills a destination while preserving aspect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

/// Cover fit: scale to fill `dst`, center-cropping the overflow of `src`
///
/// Returns `None` when either side has a zero dimension.
pub fn cover_crop(src: (u32, u32), dst: (u32, u32)) -> Option<CropRect> {
    let (vw, vh) = src;
    let (dw, dh) = dst;
    if vw == 0 || vh == 0 || dw == 0 || dh == 0 {
        return None;
    }

    let scale = (dw as f32 / vw as f32).max(dh as f32 / vh as f32);
    let width = ((dw as f32 / scale).floor() as u32).clamp(1, vw);
    let height = ((dh as f32 / scale).floor() as u32).clamp(1, vh);
    Some(CropRect {
        x: (vw - width) / 2,
        y: (vh - height) / 2,
        width,
        height,
        scale,
    })
}

/// Draw `src` into all of `dst` with a cover fit
///
/// Does nothing for a zero-sized source, leaving `dst` untouched.
pub fn draw_cover(dst: &mut RgbaImage, src: &RgbaImage) {
    let Some(crop) = cover_crop(src.dimensions(), dst.dimensions()) else {
        return;
    };
    let region = imageops::crop_imm(src, crop.x, crop.y, crop.width, crop.height).to_image();
    let scaled = if region.dimensions() == dst.dimensions() {
        region
    } else {
        imageops::resize(
            &region,
            dst.width(),
            dst.height(),
            imageops::FilterType::Triangle,
        )
    };
    imageops::replace(dst, &scaled, 0, 0);
}

/// Alpha-blend `layer` over all of `dst`, stretching it to fit
pub fn draw_stretched(dst: &mut RgbaImage, layer: &RgbaImage) {
    if layer.width() == 0 || layer.height() == 0 {
        return;
    }
    if layer.dimensions() == dst.dimensions() {
        imageops::overlay(dst, layer, 0, 0);
    } else {
        let scaled = imageops::resize(
            layer,
            dst.width(),
            dst.height(),
            imageops::FilterType::Triangle,
        );
        imageops::overlay(dst, &scaled, 0, 0);
    }
}
