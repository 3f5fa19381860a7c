// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Pixel-domain reconstruction.
//!
//! After all scans are decoded, each component's coefficient grid is pushed
//! through the inverse DCT into a plane of 8-bit samples. The planes are then
//! interleaved at the requested output size with nearest-neighbor sampling,
//! color-converted according to the component count and marker hints, and
//! optionally expanded to RGBA.

use crate::dct::{dequantize_and_inverse, CoeffGrid};
use crate::error::{JpegError, Result};
use crate::frame::{Component, Frame};
use crate::memory::MemoryBudget;

/// Reconstructed samples of one component, in scan-line order.
#[derive(Debug)]
pub struct SamplePlane {
    /// Line stride; `blocks_per_line * 8`.
    pub width: usize,
    /// Number of lines; `blocks_per_column * 8`.
    pub height: usize,
    pub data: Vec<u8>,
}

impl SamplePlane {
    fn line(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }
}

/// Run the inverse DCT over every visible block of a component, producing
/// its sample plane.
pub fn build_plane(
    comp: &Component,
    grid: &CoeffGrid,
    budget: &mut MemoryBudget,
) -> Result<SamplePlane> {
    let qt = comp
        .quant_table
        .as_ref()
        .ok_or(JpegError::MissingQuantTable(comp.quant_idx))?;
    let width = comp.blocks_per_line * 8;
    let height = comp.blocks_per_column * 8;
    budget.request(width * height)?;
    let mut data = vec![0u8; width * height];
    let mut samples = [0u8; 64];

    for br in 0..comp.blocks_per_column {
        for bc in 0..comp.blocks_per_line {
            dequantize_and_inverse(grid.block(br, bc), &qt.values, &mut samples);
            for j in 0..8 {
                let dst = (br * 8 + j) * width + bc * 8;
                data[dst..dst + 8].copy_from_slice(&samples[j * 8..j * 8 + 8]);
            }
        }
    }

    Ok(SamplePlane {
        width,
        height,
        data,
    })
}

/// Interleave component planes into `width`×`height` output pixels using
/// nearest-neighbor sampling with per-component scale factors.
pub fn interleave_components(
    frame: &Frame,
    planes: &[SamplePlane],
    width: u16,
    height: u16,
    budget: &mut MemoryBudget,
) -> Result<Vec<u8>> {
    let ncomp = planes.len();
    let out_len = width as usize * height as usize * ncomp;
    budget.request(out_len)?;
    let mut data = vec![0u8; out_len];

    let scale_x = frame.samples_per_line as f64 / width as f64;
    let scale_y = frame.scan_lines as f64 / height as f64;

    for (ci, plane) in planes.iter().enumerate() {
        let comp = &frame.components[ci];
        let comp_scale_x = comp.h as f64 / frame.max_h as f64 * scale_x;
        let comp_scale_y = comp.v as f64 / frame.max_v as f64 * scale_y;

        let mut offset = ci;
        for y in 0..height as usize {
            let line = plane.line((y as f64 * comp_scale_y) as usize);
            for x in 0..width as usize {
                data[offset] = line[(x as f64 * comp_scale_x) as usize];
                offset += ncomp;
            }
        }
    }

    Ok(data)
}

fn clamp_u8(value: f64) -> u8 {
    if value <= 0.0 {
        0
    } else if value >= 255.0 {
        255
    } else {
        value as u8
    }
}

/// In-place YCbCr → RGB over interleaved 3-component data.
pub fn ycbcr_to_rgb(data: &mut [u8]) {
    for px in data.chunks_exact_mut(3) {
        let y = px[0] as f64;
        let cb = px[1] as f64;
        let cr = px[2] as f64;
        px[0] = clamp_u8(y + 1.402 * (cr - 128.0));
        px[1] = clamp_u8(y - 0.3441363 * (cb - 128.0) - 0.71413636 * (cr - 128.0));
        px[2] = clamp_u8(y + 1.772 * (cb - 128.0));
    }
}

/// In-place YCbCrK → CMYK over interleaved 4-component data. The first three
/// channels go through the YCbCr matrix and are complemented; K is untouched.
pub fn ycck_to_cmyk(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let y = px[0] as f64;
        let cb = px[1] as f64;
        let cr = px[2] as f64;
        px[0] = 255 - clamp_u8(y + 1.402 * (cr - 128.0));
        px[1] = 255 - clamp_u8(y - 0.3441363 * (cb - 128.0) - 0.71413636 * (cr - 128.0));
        px[2] = 255 - clamp_u8(y + 1.772 * (cb - 128.0));
    }
}

/// Expand interleaved component data to RGBA with alpha fixed at 255.
///
/// Grayscale replicates Y; CMYK composites through the standard ink model.
/// Two-component data has no defined RGBA rendition.
pub fn format_rgba(
    data: &[u8],
    ncomp: usize,
    width: u16,
    height: u16,
    budget: &mut MemoryBudget,
) -> Result<Vec<u8>> {
    let pixel_count = width as usize * height as usize;
    budget.request(pixel_count * 4)?;
    let mut out = vec![0u8; pixel_count * 4];

    match ncomp {
        1 => {
            for (dst, &y) in out.chunks_exact_mut(4).zip(data.iter()) {
                dst[0] = y;
                dst[1] = y;
                dst[2] = y;
                dst[3] = 255;
            }
        }
        3 => {
            for (dst, src) in out.chunks_exact_mut(4).zip(data.chunks_exact(3)) {
                dst[..3].copy_from_slice(src);
                dst[3] = 255;
            }
        }
        4 => {
            for (dst, src) in out.chunks_exact_mut(4).zip(data.chunks_exact(4)) {
                let c = src[0] as f64;
                let m = src[1] as f64;
                let y = src[2] as f64;
                let k = src[3] as f64;
                let scale = 1.0 - k / 255.0;
                dst[0] = 255 - clamp_u8(c * scale + k);
                dst[1] = 255 - clamp_u8(m * scale + k);
                dst[2] = 255 - clamp_u8(y * scale + k);
                dst[3] = 255;
            }
        }
        _ => return Err(JpegError::UnsupportedColorMode),
    }

    Ok(out)
}
