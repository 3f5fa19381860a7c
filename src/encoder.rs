// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Baseline JPEG encoder.
//!
//! Encodes RGBA pixel buffers as sequential YCbCr 4:4:4 JFIF streams using
//! the Annex K default Huffman tables and quality-scaled Annex K quantizers.
//! The forward DCT is the floating-point AAN factorization with the
//! quantizer divisions folded into precomputed reciprocals.

use byteorder::{BigEndian, WriteBytesExt};

use crate::bitio::BitWriter;
use crate::error::Result;
use crate::huffman::{encode_value, HuffmanEncodeTable};
use crate::marker;
use crate::tables::{
    BASE_CHROMA_QUANT, BASE_LUMA_QUANT, STD_CHROMA_AC_BITS, STD_CHROMA_AC_VALS,
    STD_CHROMA_DC_BITS, STD_CHROMA_DC_VALS, STD_LUMA_AC_BITS, STD_LUMA_AC_VALS, STD_LUMA_DC_BITS,
    STD_LUMA_DC_VALS,
};
use crate::zigzag::NATURAL_TO_ZIGZAG;

/// Quality used when the caller does not express a preference.
pub const DEFAULT_QUALITY: u8 = 50;

/// AAN scale factors: 1 for k=0, cos(k*pi/16)*sqrt(2) for k=1..7.
const AAN_SCALES: [f32; 8] = [
    1.0, 1.387039845, 1.306562965, 1.175875602, 1.0, 0.785694958, 0.541196100, 0.275899379,
];

/// Integer RGB→YCbCr lookups, eight 256-entry segments. Y uses segments
/// 0/1/2, Cb uses 3/4/5, Cr uses 5/6/7 (the 0.5 coefficient is shared).
const RGB_YUV_TABLE: [i32; 2048] = {
    let mut table = [0i32; 2048];
    let mut i = 0;
    while i < 256 {
        let v = i as i32;
        table[i] = 19595 * v;
        table[i + 256] = 38470 * v;
        table[i + 512] = 7471 * v + 0x8000;
        table[i + 768] = -11059 * v;
        table[i + 1024] = -21709 * v;
        table[i + 1280] = 32768 * v + 0x807FFF;
        table[i + 1536] = -27439 * v;
        table[i + 1792] = -5329 * v;
        i += 1;
    }
    table
};

/// Input pixel buffer for [`encode`]: RGBA bytes, 4 per pixel.
#[derive(Debug, Clone, Default)]
pub struct RawImage {
    pub width: u16,
    pub height: u16,
    /// RGBA samples, `4 * width * height` bytes. The alpha channel is ignored.
    pub data: Vec<u8>,
    /// Comments written as COM segments, in order.
    pub comments: Vec<String>,
    /// Raw EXIF payload written as an APP1 segment. An `Exif\0` identifier
    /// is prepended unless the buffer already starts with `Exif`.
    pub exif_buffer: Option<Vec<u8>>,
}

/// Encoder output.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u16,
    pub height: u16,
}

/// Encode an RGBA buffer as a baseline JPEG at the given quality (clamped
/// to 1..=100).
pub fn encode(image: &RawImage, quality: u8) -> Result<EncodedImage> {
    Encoder::new(quality).encode(image)
}

/// Reusable encoder holding the quality-scaled tables.
pub struct Encoder {
    /// Luma quantizer in zigzag order.
    y_table: [u8; 64],
    /// Chroma quantizer in zigzag order.
    uv_table: [u8; 64],
    fdtbl_y: [f32; 64],
    fdtbl_uv: [f32; 64],
    dc_luma: HuffmanEncodeTable,
    ac_luma: HuffmanEncodeTable,
    dc_chroma: HuffmanEncodeTable,
    ac_chroma: HuffmanEncodeTable,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl Encoder {
    pub fn new(quality: u8) -> Self {
        let quality = quality.clamp(1, 100) as i32;
        let sf = if quality < 50 {
            5000 / quality
        } else {
            200 - quality * 2
        };

        let y_table = scale_quant_table(&BASE_LUMA_QUANT, sf);
        let uv_table = scale_quant_table(&BASE_CHROMA_QUANT, sf);

        Self {
            fdtbl_y: reciprocal_table(&y_table),
            fdtbl_uv: reciprocal_table(&uv_table),
            y_table,
            uv_table,
            dc_luma: HuffmanEncodeTable::build(&STD_LUMA_DC_BITS, &STD_LUMA_DC_VALS),
            ac_luma: HuffmanEncodeTable::build(&STD_LUMA_AC_BITS, &STD_LUMA_AC_VALS),
            dc_chroma: HuffmanEncodeTable::build(&STD_CHROMA_DC_BITS, &STD_CHROMA_DC_VALS),
            ac_chroma: HuffmanEncodeTable::build(&STD_CHROMA_AC_BITS, &STD_CHROMA_AC_VALS),
        }
    }

    /// Encode one image. The stream is SOI, JFIF APP0, comments, optional
    /// EXIF, DQT, SOF0, DHT, SOS, entropy-coded data, EOI.
    pub fn encode(&self, image: &RawImage) -> Result<EncodedImage> {
        let width = image.width as usize;
        let height = image.height as usize;
        assert!(
            image.data.len() >= width * height * 4,
            "RGBA buffer shorter than 4 * width * height"
        );

        let mut out = Vec::new();
        out.write_u16::<BigEndian>(marker::SOI).unwrap();
        self.write_app0(&mut out);
        for comment in &image.comments {
            write_comment(&mut out, comment);
        }
        if let Some(exif) = &image.exif_buffer {
            write_exif(&mut out, exif);
        }
        self.write_dqt(&mut out);
        self.write_sof0(&mut out, image.width, image.height);
        self.write_dht(&mut out);
        self.write_sos(&mut out);

        // Entropy-coded data: 8x8 blocks in raster order, replicating edge
        // pixels over the padded right and bottom borders.
        let mut writer = BitWriter::new();
        let mut y_du = [0f32; 64];
        let mut u_du = [0f32; 64];
        let mut v_du = [0f32; 64];
        let mut quantized = [0i32; 64];
        let mut dc_y = 0i32;
        let mut dc_u = 0i32;
        let mut dc_v = 0i32;

        let quad_width = width * 4;
        let mut y = 0usize;
        while y < height {
            let mut x = 0usize;
            while x < quad_width {
                let start = quad_width * y + x;
                for pos in 0..64 {
                    let row = pos >> 3;
                    let col = (pos & 7) * 4;
                    let mut p = start + row * quad_width + col;
                    if y + row >= height {
                        p -= quad_width * (y + 1 + row - height);
                    }
                    if x + col >= quad_width {
                        p -= (x + col) - quad_width + 4;
                    }
                    let r = image.data[p] as usize;
                    let g = image.data[p + 1] as usize;
                    let b = image.data[p + 2] as usize;
                    y_du[pos] = (((RGB_YUV_TABLE[r]
                        + RGB_YUV_TABLE[g + 256]
                        + RGB_YUV_TABLE[b + 512])
                        >> 16)
                        - 128) as f32;
                    u_du[pos] = (((RGB_YUV_TABLE[r + 768]
                        + RGB_YUV_TABLE[g + 1024]
                        + RGB_YUV_TABLE[b + 1280])
                        >> 16)
                        - 128) as f32;
                    v_du[pos] = (((RGB_YUV_TABLE[r + 1280]
                        + RGB_YUV_TABLE[g + 1536]
                        + RGB_YUV_TABLE[b + 1792])
                        >> 16)
                        - 128) as f32;
                }

                forward_dct_quantize(&mut y_du, &self.fdtbl_y, &mut quantized);
                dc_y = encode_block(&mut writer, &quantized, dc_y, &self.dc_luma, &self.ac_luma)?;
                forward_dct_quantize(&mut u_du, &self.fdtbl_uv, &mut quantized);
                dc_u = encode_block(
                    &mut writer,
                    &quantized,
                    dc_u,
                    &self.dc_chroma,
                    &self.ac_chroma,
                )?;
                forward_dct_quantize(&mut v_du, &self.fdtbl_uv, &mut quantized);
                dc_v = encode_block(
                    &mut writer,
                    &quantized,
                    dc_v,
                    &self.dc_chroma,
                    &self.ac_chroma,
                )?;

                x += 32;
            }
            y += 8;
        }

        out.extend_from_slice(&writer.flush());
        out.write_u16::<BigEndian>(marker::EOI).unwrap();

        Ok(EncodedImage {
            data: out,
            width: image.width,
            height: image.height,
        })
    }

    fn write_app0(&self, out: &mut Vec<u8>) {
        out.write_u16::<BigEndian>(marker::APP0).unwrap();
        out.write_u16::<BigEndian>(16).unwrap();
        out.extend_from_slice(b"JFIF\0");
        out.push(1); // version 1.1
        out.push(1);
        out.push(0); // density units: none
        out.write_u16::<BigEndian>(1).unwrap(); // x density
        out.write_u16::<BigEndian>(1).unwrap(); // y density
        out.push(0); // no thumbnail
        out.push(0);
    }

    fn write_dqt(&self, out: &mut Vec<u8>) {
        out.write_u16::<BigEndian>(marker::DQT).unwrap();
        out.write_u16::<BigEndian>(132).unwrap();
        out.push(0);
        out.extend_from_slice(&self.y_table);
        out.push(1);
        out.extend_from_slice(&self.uv_table);
    }

    fn write_sof0(&self, out: &mut Vec<u8>, width: u16, height: u16) {
        out.write_u16::<BigEndian>(marker::SOF0).unwrap();
        out.write_u16::<BigEndian>(17).unwrap();
        out.push(8); // precision
        out.write_u16::<BigEndian>(height).unwrap();
        out.write_u16::<BigEndian>(width).unwrap();
        out.push(3);
        out.extend_from_slice(&[1, 0x11, 0]); // Y, 1x1, quantizer 0
        out.extend_from_slice(&[2, 0x11, 1]); // Cb, 1x1, quantizer 1
        out.extend_from_slice(&[3, 0x11, 1]); // Cr, 1x1, quantizer 1
    }

    fn write_dht(&self, out: &mut Vec<u8>) {
        let tables: [(u8, &[u8; 16], &[u8]); 4] = [
            (0x00, &STD_LUMA_DC_BITS, &STD_LUMA_DC_VALS),
            (0x10, &STD_LUMA_AC_BITS, &STD_LUMA_AC_VALS),
            (0x01, &STD_CHROMA_DC_BITS, &STD_CHROMA_DC_VALS),
            (0x11, &STD_CHROMA_AC_BITS, &STD_CHROMA_AC_VALS),
        ];
        let total: usize = tables.iter().map(|(_, b, v)| 1 + b.len() + v.len()).sum();

        out.write_u16::<BigEndian>(marker::DHT).unwrap();
        out.write_u16::<BigEndian>((2 + total) as u16).unwrap();
        for (class_id, bits, vals) in tables {
            out.push(class_id);
            out.extend_from_slice(bits);
            out.extend_from_slice(vals);
        }
    }

    fn write_sos(&self, out: &mut Vec<u8>) {
        out.write_u16::<BigEndian>(marker::SOS).unwrap();
        out.write_u16::<BigEndian>(12).unwrap();
        out.push(3);
        out.extend_from_slice(&[1, 0x00]); // Y: DC 0, AC 0
        out.extend_from_slice(&[2, 0x11]); // Cb: DC 1, AC 1
        out.extend_from_slice(&[3, 0x11]); // Cr: DC 1, AC 1
        out.push(0); // Ss
        out.push(63); // Se
        out.push(0); // Ah/Al
    }
}

/// Scale an Annex K base quantizer by the quality factor and store it in
/// zigzag order, entries clamped to 1..=255.
fn scale_quant_table(base: &[u8; 64], sf: i32) -> [u8; 64] {
    let mut table = [0u8; 64];
    for i in 0..64 {
        let t = ((base[i] as i32 * sf + 50) / 100).clamp(1, 255);
        table[NATURAL_TO_ZIGZAG[i]] = t as u8;
    }
    table
}

/// Reciprocals of the quantizer folded with the AAN output scaling, in
/// natural order: `1 / (q * aasf[row] * aasf[col] * 8)`.
fn reciprocal_table(zigzag_table: &[u8; 64]) -> [f32; 64] {
    let mut fdtbl = [0f32; 64];
    let mut k = 0;
    for row in 0..8 {
        for col in 0..8 {
            fdtbl[k] = 1.0
                / (zigzag_table[NATURAL_TO_ZIGZAG[k]] as f32
                    * AAN_SCALES[row]
                    * AAN_SCALES[col]
                    * 8.0);
            k += 1;
        }
    }
    fdtbl
}

/// Forward AAN DCT over one level-shifted 8x8 block, followed by
/// quantization (round half away from zero) and zigzag reordering.
fn forward_dct_quantize(data: &mut [f32; 64], fdtbl: &[f32; 64], out: &mut [i32; 64]) {
    // Pass 1: process rows.
    for i in (0..64).step_by(8) {
        let tmp0 = data[i] + data[i + 7];
        let tmp7 = data[i] - data[i + 7];
        let tmp1 = data[i + 1] + data[i + 6];
        let tmp6 = data[i + 1] - data[i + 6];
        let tmp2 = data[i + 2] + data[i + 5];
        let tmp5 = data[i + 2] - data[i + 5];
        let tmp3 = data[i + 3] + data[i + 4];
        let tmp4 = data[i + 3] - data[i + 4];

        // Even part
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[i] = tmp10 + tmp11;
        data[i + 4] = tmp10 - tmp11;

        let z1 = (tmp12 + tmp13) * 0.707106781; // c4
        data[i + 2] = tmp13 + z1;
        data[i + 6] = tmp13 - z1;

        // Odd part
        let tmp10 = tmp4 + tmp5;
        let tmp11 = tmp5 + tmp6;
        let tmp12 = tmp6 + tmp7;

        let z5 = (tmp10 - tmp12) * 0.382683433; // c6
        let z2 = 0.541196100 * tmp10 + z5; // c2-c6
        let z4 = 1.306562965 * tmp12 + z5; // c2+c6
        let z3 = tmp11 * 0.707106781; // c4

        let z11 = tmp7 + z3;
        let z13 = tmp7 - z3;

        data[i + 5] = z13 + z2;
        data[i + 3] = z13 - z2;
        data[i + 1] = z11 + z4;
        data[i + 7] = z11 - z4;
    }

    // Pass 2: process columns.
    for i in 0..8 {
        let tmp0 = data[i] + data[i + 56];
        let tmp7 = data[i] - data[i + 56];
        let tmp1 = data[i + 8] + data[i + 48];
        let tmp6 = data[i + 8] - data[i + 48];
        let tmp2 = data[i + 16] + data[i + 40];
        let tmp5 = data[i + 16] - data[i + 40];
        let tmp3 = data[i + 24] + data[i + 32];
        let tmp4 = data[i + 24] - data[i + 32];

        // Even part
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[i] = tmp10 + tmp11;
        data[i + 32] = tmp10 - tmp11;

        let z1 = (tmp12 + tmp13) * 0.707106781;
        data[i + 16] = tmp13 + z1;
        data[i + 48] = tmp13 - z1;

        // Odd part
        let tmp10 = tmp4 + tmp5;
        let tmp11 = tmp5 + tmp6;
        let tmp12 = tmp6 + tmp7;

        let z5 = (tmp10 - tmp12) * 0.382683433;
        let z2 = 0.541196100 * tmp10 + z5;
        let z4 = 1.306562965 * tmp12 + z5;
        let z3 = tmp11 * 0.707106781;

        let z11 = tmp7 + z3;
        let z13 = tmp7 - z3;

        data[i + 40] = z13 + z2;
        data[i + 24] = z13 - z2;
        data[i + 8] = z11 + z4;
        data[i + 56] = z11 - z4;
    }

    // Quantize and reorder into zigzag sequence.
    for i in 0..64 {
        let v = data[i] * fdtbl[i];
        out[NATURAL_TO_ZIGZAG[i]] = if v > 0.0 {
            (v + 0.5) as i32
        } else {
            (v - 0.5) as i32
        };
    }
}

/// Huffman-encode one quantized block (zigzag order): DC delta, then AC
/// run-length pairs with ZRL for 16-zero runs and a trailing EOB.
/// Returns the new DC predictor.
fn encode_block(
    writer: &mut BitWriter,
    du: &[i32; 64],
    prev_dc: i32,
    dc_table: &HuffmanEncodeTable,
    ac_table: &HuffmanEncodeTable,
) -> Result<i32> {
    let diff = du[0] - prev_dc;
    if diff == 0 {
        let (code, len) = dc_table.encode(0)?;
        writer.write_bits(code, len);
    } else {
        let (bits, size) = encode_value(diff);
        let (code, len) = dc_table.encode(size)?;
        writer.write_bits(code, len);
        writer.write_bits(bits, size);
    }

    let mut last_nonzero = 63;
    while last_nonzero > 0 && du[last_nonzero] == 0 {
        last_nonzero -= 1;
    }
    if last_nonzero == 0 {
        let (code, len) = ac_table.encode(0x00)?;
        writer.write_bits(code, len);
        return Ok(du[0]);
    }

    let mut i = 1usize;
    while i <= last_nonzero {
        let run_start = i;
        while du[i] == 0 && i <= last_nonzero {
            i += 1;
        }
        let mut zero_run = i - run_start;
        if zero_run >= 16 {
            for _ in 0..(zero_run >> 4) {
                let (code, len) = ac_table.encode(0xF0)?;
                writer.write_bits(code, len);
            }
            zero_run &= 0x0F;
        }
        let (bits, size) = encode_value(du[i]);
        let (code, len) = ac_table.encode(((zero_run as u8) << 4) | size)?;
        writer.write_bits(code, len);
        writer.write_bits(bits, size);
        i += 1;
    }

    if last_nonzero != 63 {
        let (code, len) = ac_table.encode(0x00)?;
        writer.write_bits(code, len);
    }
    Ok(du[0])
}

fn write_comment(out: &mut Vec<u8>, comment: &str) {
    out.write_u16::<BigEndian>(marker::COM).unwrap();
    let bytes: Vec<u8> = comment.chars().map(|c| c as u8).collect();
    out.write_u16::<BigEndian>((bytes.len() + 2) as u16).unwrap();
    out.extend_from_slice(&bytes);
}

fn write_exif(out: &mut Vec<u8>, exif: &[u8]) {
    out.write_u16::<BigEndian>(marker::APP1).unwrap();
    if exif.starts_with(b"Exif") {
        out.write_u16::<BigEndian>((exif.len() + 2) as u16).unwrap();
        out.extend_from_slice(exif);
    } else {
        out.write_u16::<BigEndian>((exif.len() + 7) as u16).unwrap();
        out.extend_from_slice(b"Exif\0");
        out.extend_from_slice(exif);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_scaling() {
        // Quality 50 keeps the base table; low quality scales up with clamp.
        let enc50 = Encoder::new(50);
        assert_eq!(enc50.y_table[0], 16); // DC entry, zigzag 0 == natural 0
        let enc10 = Encoder::new(10);
        assert_eq!(enc10.y_table[0], 80); // 16 * 500 / 100
        assert_eq!(enc10.uv_table[63], 255); // 99 * 500 / 100 clamps

        // Quality 100 floors every divisor at 1.
        let enc100 = Encoder::new(100);
        assert!(enc100.y_table.iter().all(|&q| q == 1));
    }

    #[test]
    fn quality_clamped_into_range() {
        // 0 is treated as 1; above 100 as 100.
        assert_eq!(Encoder::new(0).y_table, Encoder::new(1).y_table);
        assert_eq!(Encoder::new(255).y_table, Encoder::new(100).y_table);
    }

    #[test]
    fn stream_framing() {
        let image = RawImage {
            width: 8,
            height: 8,
            data: vec![128; 8 * 8 * 4],
            ..Default::default()
        };
        let out = encode(&image, 50).unwrap().data;
        assert_eq!(&out[..2], &[0xFF, 0xD8]); // SOI
        assert_eq!(&out[2..4], &[0xFF, 0xE0]); // APP0
        assert_eq!(&out[6..11], b"JFIF\0");
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xD9]); // EOI
    }

    #[test]
    fn comment_and_exif_segments_present() {
        let image = RawImage {
            width: 8,
            height: 8,
            data: vec![0; 8 * 8 * 4],
            comments: vec!["hello".into()],
            exif_buffer: Some(vec![9, 9, 9]),
        };
        let out = encode(&image, 50).unwrap().data;
        let com_at = out
            .windows(2)
            .position(|w| w == [0xFF, 0xFE])
            .expect("COM segment");
        assert_eq!(&out[com_at + 4..com_at + 9], b"hello");
        let app1_at = out
            .windows(2)
            .position(|w| w == [0xFF, 0xE1])
            .expect("APP1 segment");
        assert_eq!(&out[app1_at + 4..app1_at + 9], b"Exif\0");
        assert_eq!(&out[app1_at + 9..app1_at + 12], &[9, 9, 9]);
    }

    #[test]
    fn exif_with_identifier_written_verbatim() {
        let image = RawImage {
            width: 8,
            height: 8,
            data: vec![0; 8 * 8 * 4],
            comments: vec![],
            exif_buffer: Some(b"Exif\0\0abc".to_vec()),
        };
        let out = encode(&image, 50).unwrap().data;
        let app1_at = out.windows(2).position(|w| w == [0xFF, 0xE1]).unwrap();
        let len = u16::from_be_bytes([out[app1_at + 2], out[app1_at + 3]]) as usize;
        assert_eq!(len, 9 + 2);
        assert_eq!(&out[app1_at + 4..app1_at + 13], b"Exif\0\0abc");
    }

    #[test]
    fn flat_block_quantizes_to_dc_only() {
        let mut du = [0f32; 64]; // level-shifted mid-gray
        let enc = Encoder::new(50);
        let mut out = [0i32; 64];
        forward_dct_quantize(&mut du, &enc.fdtbl_y, &mut out);
        assert!(out.iter().all(|&c| c == 0));

        let mut du = [127f32; 64]; // level-shifted white
        forward_dct_quantize(&mut du, &enc.fdtbl_y, &mut out);
        assert_eq!(out[0], 64); // 127 * 64 / (16 * 8)
        assert!(out[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn rgb_yuv_table_matches_float_matrix() {
        for &(r, g, b) in &[(0u8, 0u8, 0u8), (255, 255, 255), (255, 0, 0), (12, 200, 99)] {
            let (ri, gi, bi) = (r as usize, g as usize, b as usize);
            let y = ((RGB_YUV_TABLE[ri] + RGB_YUV_TABLE[gi + 256] + RGB_YUV_TABLE[bi + 512])
                >> 16) as f64;
            let expected = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            assert!((y - expected).abs() <= 1.0, "Y for ({r},{g},{b})");
        }
    }
}
