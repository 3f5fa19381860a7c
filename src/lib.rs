// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! # rawjpeg
//!
//! Pure-Rust JPEG codec over in-memory buffers: a baseline, extended
//! sequential and progressive decoder (SOF0/SOF1/SOF2) and a baseline
//! encoder, with no file I/O in the core.
//!
//! Supports:
//! - Huffman-coded sequential and progressive scans, 8-bit precision
//! - Grayscale, YCbCr, RGB, and Adobe CMYK/YCCK color modes
//! - Chroma subsampling with nearest-neighbor upsampling on output
//! - Restart markers (DRI/RST), JFIF/EXIF/Adobe application segments,
//!   comment extraction
//! - Configurable resolution and memory ceilings checked before the large
//!   allocations they guard
//!
//! Does NOT support:
//! - Arithmetic coding, hierarchical or lossless frames
//! - 12-bit sample precision
//!
//! # Quick start
//!
//! ```rust,ignore
//! let jpeg = std::fs::read("photo.jpg").unwrap();
//! let image = rawjpeg::decode(&jpeg, &rawjpeg::DecoderOptions::default()).unwrap();
//! let again = rawjpeg::encode(
//!     &rawjpeg::RawImage {
//!         width: image.width,
//!         height: image.height,
//!         data: image.pixel_data,
//!         ..Default::default()
//!     },
//!     80,
//! )
//! .unwrap();
//! ```

pub mod bitio;
pub mod dct;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod huffman;
pub mod marker;
pub mod memory;
pub mod pixels;
pub mod scan;
pub mod tables;
pub mod zigzag;

use tracing::warn;

use crate::dct::CoeffGrid;
use crate::frame::{parse_sof, Frame};
use crate::huffman::HuffmanTree;
use crate::marker::{AdobeSegment, JfifHeader};
use crate::memory::MemoryBudget;
use crate::scan::ScanComponent;
use crate::tables::QuantTable;

pub use crate::encoder::{encode, EncodedImage, Encoder, RawImage, DEFAULT_QUALITY};
pub use crate::error::{JpegError, Result};

/// Decoder behavior switches. All fields have serviceable defaults.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// `None` derives the color transform from the markers; `Some(true)`
    /// forces YCbCr→RGB (3 components) or YCCK→CMYK (4 components);
    /// `Some(false)` passes the decoded channels through.
    pub color_transform: Option<bool>,
    /// Emit 4 bytes per pixel with alpha 255 (default). When false, output
    /// is one byte per component.
    pub format_as_rgba: bool,
    /// Silently drop blocks addressed outside a component grid (default).
    pub tolerant_decoding: bool,
    /// Pixel-count ceiling in megapixels, checked at SOF.
    pub max_resolution_mp: u32,
    /// Cumulative allocation ceiling in megabytes, checked before every
    /// large buffer reservation.
    pub max_memory_usage_mb: u32,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            color_transform: None,
            format_as_rgba: true,
            tolerant_decoding: true,
            max_resolution_mp: 100,
            max_memory_usage_mb: 512,
        }
    }
}

/// A decoded image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u16,
    pub height: u16,
    /// Interleaved samples; layout depends on `format_as_rgba` and the
    /// source component count.
    pub pixel_data: Vec<u8>,
    /// Raw EXIF payload from APP1, identifier stripped.
    pub exif_bytes: Option<Vec<u8>>,
    /// COM segment texts in stream order.
    pub comments: Vec<String>,
    pub color_space: &'static str,
}

/// Decode a JPEG byte stream.
pub fn decode(data: &[u8], options: &DecoderOptions) -> Result<DecodedImage> {
    Decoder::with_options(options.clone()).decode(data)
}

/// Reusable decoder configuration.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    opts: DecoderOptions,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(opts: DecoderOptions) -> Self {
        Self { opts }
    }

    /// Decode one stream. Every call starts with a fresh memory budget.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        let mut state = DecoderState::new(&self.opts);
        state.parse(data, &self.opts)?;
        state.finish(&self.opts)
    }
}

/// Everything accumulated while walking one JPEG stream.
struct DecoderState {
    budget: MemoryBudget,
    frame: Option<Frame>,
    /// Coefficient grids, parallel to `frame.components`.
    grids: Vec<CoeffGrid>,
    quant_tables: [Option<QuantTable>; 4],
    dc_trees: [Option<HuffmanTree>; 4],
    ac_trees: [Option<HuffmanTree>; 4],
    restart_interval: u16,
    #[allow(dead_code)]
    jfif: Option<JfifHeader>,
    adobe: Option<AdobeSegment>,
    exif_bytes: Option<Vec<u8>>,
    comments: Vec<String>,
    /// Offset of the first recovered-from malformed marker, if any.
    malformed_offset: Option<usize>,
}

impl DecoderState {
    fn new(opts: &DecoderOptions) -> Self {
        Self {
            budget: MemoryBudget::new(opts.max_memory_usage_mb as usize * (1 << 20)),
            frame: None,
            grids: Vec::new(),
            quant_tables: [None, None, None, None],
            dc_trees: [None, None, None, None],
            ac_trees: [None, None, None, None],
            restart_interval: 0,
            jfif: None,
            adobe: None,
            exif_bytes: None,
            comments: Vec::new(),
            malformed_offset: None,
        }
    }

    /// Walk the marker stream from SOI to EOI, dispatching on each marker.
    fn parse(&mut self, data: &[u8], opts: &DecoderOptions) -> Result<()> {
        if read_u16(data, 0).ok_or(JpegError::MissingSoi)? != marker::SOI {
            return Err(JpegError::MissingSoi);
        }
        let max_pixels = opts.max_resolution_mp as u64 * 1_000_000;
        let mut offset = 2usize;

        loop {
            let marker_offset = offset;
            let m = read_u16(data, offset).ok_or(JpegError::UnexpectedEof)?;
            offset += 2;

            match m {
                marker::EOI => break,
                marker::SOF0 | marker::SOF1 | marker::SOF2 => {
                    let segment = read_segment(data, &mut offset)?;
                    if self.frame.is_some() {
                        return Err(JpegError::MultipleFramesUnsupported);
                    }
                    let frame =
                        parse_sof(segment, m == marker::SOF2, m == marker::SOF1, max_pixels)?;
                    for comp in &frame.components {
                        let blocks = comp.blocks_per_line_for_mcu * comp.blocks_per_column_for_mcu;
                        self.budget.request(blocks * 64 * 4)?;
                        self.grids.push(CoeffGrid::new(
                            comp.blocks_per_line_for_mcu,
                            comp.blocks_per_column_for_mcu,
                        ));
                    }
                    self.frame = Some(frame);
                }
                marker::DQT => {
                    let segment = read_segment(data, &mut offset)?;
                    for (id, table) in tables::parse_dqt(segment, &mut self.budget)? {
                        self.quant_tables[id as usize] = Some(table);
                    }
                }
                marker::DHT => {
                    let segment = read_segment(data, &mut offset)?;
                    for spec in tables::parse_dht(segment, &mut self.budget)? {
                        let tree = HuffmanTree::build(&spec.bits, &spec.huffval)?;
                        if spec.class == 0 {
                            self.dc_trees[spec.id as usize] = Some(tree);
                        } else {
                            self.ac_trees[spec.id as usize] = Some(tree);
                        }
                    }
                }
                marker::DRI => {
                    let segment = read_segment(data, &mut offset)?;
                    self.restart_interval = marker::parse_dri(segment)?;
                }
                marker::DNL => {
                    // Height is taken from SOF; the DNL payload is ignored.
                    read_segment(data, &mut offset)?;
                }
                marker::SOS => {
                    let segment = read_segment(data, &mut offset)?;
                    let selectors = marker::parse_sos(segment)?;
                    let params = marker::parse_sos_params(segment)?;
                    let frame = self.frame.as_ref().ok_or(JpegError::MissingFrame)?;
                    let mut components = Vec::with_capacity(selectors.len());
                    for (id, dc_table, ac_table) in selectors {
                        let comp_idx = frame
                            .component_index(id)
                            .ok_or(JpegError::UnknownComponent(id))?;
                        components.push(ScanComponent {
                            comp_idx,
                            dc_table: dc_table as usize,
                            ac_table: ac_table as usize,
                        });
                    }
                    let consumed = scan::decode_scan(
                        data,
                        offset,
                        frame,
                        &mut self.grids,
                        &components,
                        &self.dc_trees,
                        &self.ac_trees,
                        self.restart_interval,
                        &params,
                        opts.tolerant_decoding,
                    )?;
                    offset += consumed;
                }
                marker::APP0 => {
                    let segment = read_segment(data, &mut offset)?;
                    if let Some(jfif) = marker::parse_jfif(segment) {
                        self.jfif = Some(jfif);
                    }
                }
                marker::APP1 => {
                    let segment = read_segment(data, &mut offset)?;
                    if let Some(exif) = marker::parse_exif(segment) {
                        self.exif_bytes = Some(exif);
                    }
                }
                marker::APP14 => {
                    let segment = read_segment(data, &mut offset)?;
                    if let Some(adobe) = marker::parse_adobe(segment) {
                        self.adobe = Some(adobe);
                    }
                }
                marker::COM => {
                    let segment = read_segment(data, &mut offset)?;
                    self.comments.push(marker::parse_comment(segment));
                }
                m if marker::is_app(m) => {
                    read_segment(data, &mut offset)?;
                }
                marker::FILL => {
                    // A lone fill byte: the second 0xFF starts the real marker.
                    if data.get(offset).copied() != Some(0xFF) {
                        offset -= 1;
                    }
                }
                _ => {
                    // A previous segment may have eaten the 0xFF escape of
                    // this marker; back up and retry from it.
                    if marker_offset >= 1
                        && data[marker_offset - 1] == 0xFF
                        && (0xC0..=0xFE).contains(&data[marker_offset])
                    {
                        warn!(offset = marker_offset, "re-syncing on eaten marker escape");
                        offset = marker_offset - 1;
                        continue;
                    }
                    // Misaligned APP0/APP1: trust the declared length once.
                    if m == 0x00E0 || m == 0x00E1 {
                        if let Some(first_offset) = self.malformed_offset {
                            return Err(JpegError::DualMalformedMarker {
                                first_offset,
                                second_offset: marker_offset,
                                marker: m,
                            });
                        }
                        self.malformed_offset = Some(marker_offset);
                        let len = read_u16(data, offset).ok_or(JpegError::UnexpectedEof)? as usize;
                        if len >= 2 && data.get(offset + len).copied() == Some(0xFF) {
                            warn!(
                                offset = marker_offset,
                                "skipping malformed application segment"
                            );
                            offset += len;
                            continue;
                        }
                    }
                    return Err(JpegError::UnknownMarker {
                        offset: marker_offset,
                        marker: m,
                    });
                }
            }
        }
        Ok(())
    }

    /// Turn the accumulated scans into output pixels.
    fn finish(mut self, opts: &DecoderOptions) -> Result<DecodedImage> {
        let mut frame = self.frame.take().ok_or(JpegError::MissingFrame)?;
        let ncomp = frame.components.len();
        if ncomp == 0 || ncomp > 4 {
            return Err(JpegError::UnsupportedColorMode);
        }

        // Resolve each component's quantizer slot to the table itself.
        for comp in &mut frame.components {
            let table = self.quant_tables[comp.quant_idx as usize]
                .clone()
                .ok_or(JpegError::MissingQuantTable(comp.quant_idx))?;
            comp.quant_table = Some(table);
        }

        let mut planes = Vec::with_capacity(ncomp);
        for (i, comp) in frame.components.iter().enumerate() {
            planes.push(pixels::build_plane(comp, &self.grids[i], &mut self.budget)?);
        }

        let width = frame.samples_per_line;
        let height = frame.scan_lines;
        let mut data =
            pixels::interleave_components(&frame, &planes, width, height, &mut self.budget)?;

        match ncomp {
            3 => {
                if self.color_transform_enabled(true, opts) {
                    pixels::ycbcr_to_rgb(&mut data);
                }
            }
            4 => {
                if self.adobe.is_none() {
                    return Err(JpegError::UnsupportedColorMode);
                }
                if self.color_transform_enabled(false, opts) {
                    pixels::ycck_to_cmyk(&mut data);
                }
            }
            _ => {}
        }

        let pixel_data = if opts.format_as_rgba {
            pixels::format_rgba(&data, ncomp, width, height, &mut self.budget)?
        } else if ncomp == 4 {
            // Four-component output is emitted inverse-complemented.
            for byte in &mut data {
                *byte = 255 - *byte;
            }
            data
        } else {
            data
        };

        Ok(DecodedImage {
            width,
            height,
            pixel_data,
            exif_bytes: self.exif_bytes,
            comments: self.comments,
            color_space: "srgb",
        })
    }

    /// The Adobe transform flag wins over the option, which wins over the
    /// per-component-count default.
    fn color_transform_enabled(&self, default: bool, opts: &DecoderOptions) -> bool {
        if self.adobe.map(|a| a.transform_code != 0).unwrap_or(false) {
            true
        } else if let Some(forced) = opts.color_transform {
            forced
        } else {
            default
        }
    }
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    if offset + 1 < data.len() {
        Some(u16::from_be_bytes([data[offset], data[offset + 1]]))
    } else {
        None
    }
}

/// Read one length-prefixed marker segment and advance past it. The
/// returned slice excludes the 2-byte length.
fn read_segment<'a>(data: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let len = read_u16(data, *offset).ok_or(JpegError::UnexpectedEof)? as usize;
    if len < 2 || *offset + len > data.len() {
        return Err(JpegError::UnexpectedEof);
    }
    let segment = &data[*offset + 2..*offset + len];
    *offset += len;
    Ok(segment)
}
