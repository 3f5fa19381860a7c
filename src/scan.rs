// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Entropy-coded scan decoding.
//!
//! Decodes one scan's worth of Huffman-coded data into per-component
//! [`CoeffGrid`]s. Sequential (baseline/extended) scans decode whole blocks;
//! progressive scans contribute either DC or AC coefficients for a spectral
//! band, refined across successive approximation passes. Handles interleaved
//! and single-component MCU ordering, restart markers, and cross-block
//! end-of-band runs.

use tracing::debug;

use crate::bitio::BitReader;
use crate::dct::CoeffGrid;
use crate::error::{JpegError, Result};
use crate::frame::Frame;
use crate::huffman::HuffmanTree;
use crate::marker::{is_restart, SosParams};
use crate::zigzag::ZIGZAG_TO_NATURAL;

/// Component selector for one scan, bound to its Huffman table slots.
#[derive(Debug, Clone)]
pub struct ScanComponent {
    /// Index into `Frame::components` (and the grid list).
    pub comp_idx: usize,
    /// DC Huffman table slot (0–3).
    pub dc_table: usize,
    /// AC Huffman table slot (0–3).
    pub ac_table: usize,
}

/// How blocks in this scan are decoded, selected from the frame type and
/// the SOS spectral/successive parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    Baseline,
    DcFirst,
    DcSuccessive,
    AcFirst,
    AcSuccessive,
}

/// Progressive AC successive-approximation machine. The state survives
/// across blocks of the scan; only restart boundaries reset it.
#[derive(Debug, Clone, Copy)]
enum AcState {
    Initial,
    /// Skipping zero-valued positions; when `pending` is set, a new
    /// coefficient is placed once the zeros are exhausted.
    SkippingZeros { remaining: u8, pending: Option<i32> },
    /// Placing a new coefficient at the next zero position.
    Placing { value: i32 },
    /// Inside an end-of-band run; only refinement bits are read.
    Eob,
}

struct ScanState {
    preds: Vec<i32>,
    eobrun: u32,
    ac_state: AcState,
}

/// Decode the entropy-coded data of one scan into `grids`.
///
/// `scan_start` is the offset of the first entropy-coded byte (right after
/// the SOS header). Returns the number of bytes consumed, including trailing
/// filler up to (but not including) the next marker.
#[allow(clippy::too_many_arguments)]
pub fn decode_scan(
    data: &[u8],
    scan_start: usize,
    frame: &Frame,
    grids: &mut [CoeffGrid],
    scan_components: &[ScanComponent],
    dc_trees: &[Option<HuffmanTree>; 4],
    ac_trees: &[Option<HuffmanTree>; 4],
    restart_interval: u16,
    params: &SosParams,
    tolerant: bool,
) -> Result<usize> {
    let mode = if !frame.progressive {
        ScanMode::Baseline
    } else if params.ss == 0 {
        if params.ah == 0 {
            ScanMode::DcFirst
        } else {
            ScanMode::DcSuccessive
        }
    } else if params.ah == 0 {
        ScanMode::AcFirst
    } else {
        ScanMode::AcSuccessive
    };

    // Bind the Huffman trees this scan actually uses.
    let needs_dc = matches!(mode, ScanMode::Baseline | ScanMode::DcFirst);
    let needs_ac = matches!(
        mode,
        ScanMode::Baseline | ScanMode::AcFirst | ScanMode::AcSuccessive
    );
    let mut dc_refs: Vec<Option<&HuffmanTree>> = Vec::with_capacity(scan_components.len());
    let mut ac_refs: Vec<Option<&HuffmanTree>> = Vec::with_capacity(scan_components.len());
    for sc in scan_components {
        dc_refs.push(if needs_dc {
            Some(
                dc_trees[sc.dc_table]
                    .as_ref()
                    .ok_or(JpegError::MissingHuffmanTable(sc.dc_table as u8))?,
            )
        } else {
            None
        });
        ac_refs.push(if needs_ac {
            Some(
                ac_trees[sc.ac_table]
                    .as_ref()
                    .ok_or(JpegError::MissingHuffmanTable(sc.ac_table as u8))?,
            )
        } else {
            None
        });
    }

    let single = scan_components.len() == 1;
    let mcu_expected = if single {
        let comp = &frame.components[scan_components[0].comp_idx];
        comp.blocks_per_line * comp.blocks_per_column
    } else {
        frame.mcus_per_line * frame.mcus_per_column
    };

    let interval = if restart_interval == 0 {
        mcu_expected
    } else {
        restart_interval as usize
    };

    let mut reader = BitReader::new(data, scan_start);
    let mut state = ScanState {
        preds: vec![0; scan_components.len()],
        eobrun: 0,
        ac_state: AcState::Initial,
    };
    let mut mcu = 0usize;

    while mcu < mcu_expected {
        // Each restart interval begins with cleared predictors, a cleared
        // end-of-band run, and a fresh successive-approximation state.
        for pred in &mut state.preds {
            *pred = 0;
        }
        state.eobrun = 0;
        state.ac_state = AcState::Initial;

        if single {
            let sc = &scan_components[0];
            let blocks_per_line = frame.components[sc.comp_idx].blocks_per_line;
            // The interval batch is not cut short at the expected MCU count;
            // overshooting block indices are handled per tolerance mode.
            for _ in 0..interval {
                let row = mcu / blocks_per_line;
                let col = mcu % blocks_per_line;
                decode_block_at(
                    &mut reader, grids, sc, 0, row, col, mode, &dc_refs, &ac_refs, &mut state,
                    params, tolerant,
                )?;
                mcu += 1;
            }
        } else {
            'batch: for _ in 0..interval {
                let mcu_row = mcu / frame.mcus_per_line;
                let mcu_col = mcu % frame.mcus_per_line;
                for (sci, sc) in scan_components.iter().enumerate() {
                    let comp = &frame.components[sc.comp_idx];
                    for j in 0..comp.v as usize {
                        for k in 0..comp.h as usize {
                            let row = mcu_row * comp.v as usize + j;
                            let col = mcu_col * comp.h as usize + k;
                            decode_block_at(
                                &mut reader, grids, sc, sci, row, col, mode, &dc_refs, &ac_refs,
                                &mut state, params, tolerant,
                            )?;
                        }
                    }
                }
                mcu += 1;
                if mcu == mcu_expected {
                    break 'batch;
                }
            }
        }

        if mcu >= mcu_expected {
            // Skip trailing bytes up to (but not including) the next marker.
            reader.skip_to_marker();
        }

        reader.align_to_byte();
        match reader.peek_marker() {
            Some(marker) if marker >= 0xFF00 => {
                if is_restart(marker) {
                    reader.consume_marker();
                } else {
                    // The marker parser handles what follows.
                    break;
                }
            }
            _ => return Err(JpegError::MarkerNotFound),
        }
    }

    Ok(reader.offset() - scan_start)
}

#[allow(clippy::too_many_arguments)]
fn decode_block_at(
    reader: &mut BitReader,
    grids: &mut [CoeffGrid],
    sc: &ScanComponent,
    sci: usize,
    row: usize,
    col: usize,
    mode: ScanMode,
    dc_refs: &[Option<&HuffmanTree>],
    ac_refs: &[Option<&HuffmanTree>],
    state: &mut ScanState,
    params: &SosParams,
    tolerant: bool,
) -> Result<()> {
    let grid = &mut grids[sc.comp_idx];
    if row >= grid.blocks_tall() || col >= grid.blocks_wide() {
        if tolerant {
            debug!(row, col, "dropping block outside component grid");
            return Ok(());
        }
        return Err(JpegError::BlockIndexOutOfRange);
    }
    let block = grid.block_mut(row, col);

    match mode {
        ScanMode::Baseline => decode_baseline(
            reader,
            dc_refs[sci].unwrap(),
            ac_refs[sci].unwrap(),
            &mut state.preds[sci],
            block,
        ),
        ScanMode::DcFirst => decode_dc_first(
            reader,
            dc_refs[sci].unwrap(),
            &mut state.preds[sci],
            params.al,
            block,
        ),
        ScanMode::DcSuccessive => {
            block[0] |= (next_bit(reader)? as i32) << params.al;
            Ok(())
        }
        ScanMode::AcFirst => decode_ac_first(
            reader,
            ac_refs[sci].unwrap(),
            &mut state.eobrun,
            params,
            block,
        ),
        ScanMode::AcSuccessive => decode_ac_successive(
            reader,
            ac_refs[sci].unwrap(),
            &mut state.eobrun,
            &mut state.ac_state,
            params,
            block,
        ),
    }
}

/// Read one bit of scan data, treating stream end or a stray restart marker
/// as a broken Huffman sequence.
fn next_bit(reader: &mut BitReader) -> Result<u8> {
    match reader.read_bit() {
        Ok(Some(bit)) => Ok(bit),
        Ok(None) | Err(JpegError::UnexpectedEof) => Err(JpegError::InvalidHuffmanSequence),
        Err(e) => Err(e),
    }
}

fn decode_baseline(
    reader: &mut BitReader,
    dc_tree: &HuffmanTree,
    ac_tree: &HuffmanTree,
    pred: &mut i32,
    block: &mut [i32],
) -> Result<()> {
    let t = dc_tree.decode(reader)?;
    let diff = if t == 0 {
        0
    } else {
        reader.receive_and_extend(t)?
    };
    *pred += diff;
    block[0] = *pred;

    let mut k = 1usize;
    while k < 64 {
        let rs = ac_tree.decode(reader)?;
        let s = rs & 15;
        let r = (rs >> 4) as usize;
        if s == 0 {
            if r < 15 {
                // end of block
                break;
            }
            k += 16;
            continue;
        }
        k += r;
        if k > 63 {
            return Err(JpegError::InvalidHuffmanSequence);
        }
        block[ZIGZAG_TO_NATURAL[k]] = reader.receive_and_extend(s)?;
        k += 1;
    }
    Ok(())
}

fn decode_dc_first(
    reader: &mut BitReader,
    dc_tree: &HuffmanTree,
    pred: &mut i32,
    al: u8,
    block: &mut [i32],
) -> Result<()> {
    let t = dc_tree.decode(reader)?;
    let diff = if t == 0 {
        0
    } else {
        reader.receive_and_extend(t)? << al
    };
    *pred += diff;
    block[0] = *pred;
    Ok(())
}

fn decode_ac_first(
    reader: &mut BitReader,
    ac_tree: &HuffmanTree,
    eobrun: &mut u32,
    params: &SosParams,
    block: &mut [i32],
) -> Result<()> {
    if *eobrun > 0 {
        *eobrun -= 1;
        return Ok(());
    }

    let se = params.se as usize;
    let mut k = params.ss as usize;
    while k <= se {
        let rs = ac_tree.decode(reader)?;
        let s = rs & 15;
        let r = rs >> 4;
        if s == 0 {
            if r < 15 {
                *eobrun = (1u32 << r) + reader.receive(r)? - 1;
                break;
            }
            k += 16;
            continue;
        }
        k += r as usize;
        if k > 63 {
            return Err(JpegError::InvalidHuffmanSequence);
        }
        block[ZIGZAG_TO_NATURAL[k]] = reader.receive_and_extend(s)? << params.al;
        k += 1;
    }
    Ok(())
}

fn decode_ac_successive(
    reader: &mut BitReader,
    ac_tree: &HuffmanTree,
    eobrun: &mut u32,
    state: &mut AcState,
    params: &SosParams,
    block: &mut [i32],
) -> Result<()> {
    let se = params.se as usize;
    let al = params.al;
    let mut k = params.ss as usize;

    while k <= se {
        let z = ZIGZAG_TO_NATURAL[k];
        match *state {
            AcState::Initial => {
                let rs = ac_tree.decode(reader)?;
                let s = rs & 15;
                let r = rs >> 4;
                if s == 0 {
                    if r < 15 {
                        *eobrun = (1u32 << r) + reader.receive(r)?;
                        *state = AcState::Eob;
                    } else {
                        *state = AcState::SkippingZeros {
                            remaining: 16,
                            pending: None,
                        };
                    }
                } else {
                    if s != 1 {
                        return Err(JpegError::InvalidAcEncoding(s));
                    }
                    let value = reader.receive_and_extend(1)?;
                    *state = if r > 0 {
                        AcState::SkippingZeros {
                            remaining: r,
                            pending: Some(value),
                        }
                    } else {
                        AcState::Placing { value }
                    };
                }
                // The position is re-examined under the new state.
                continue;
            }
            AcState::SkippingZeros {
                mut remaining,
                pending,
            } => {
                if block[z] != 0 {
                    refine_nonzero(reader, &mut block[z], al)?;
                } else {
                    remaining -= 1;
                    *state = if remaining == 0 {
                        match pending {
                            Some(value) => AcState::Placing { value },
                            None => AcState::Initial,
                        }
                    } else {
                        AcState::SkippingZeros { remaining, pending }
                    };
                }
            }
            AcState::Placing { value } => {
                if block[z] != 0 {
                    refine_nonzero(reader, &mut block[z], al)?;
                } else {
                    block[z] = value << al;
                    *state = AcState::Initial;
                }
            }
            AcState::Eob => {
                if block[z] != 0 {
                    refine_nonzero(reader, &mut block[z], al)?;
                }
            }
        }
        k += 1;
    }

    if matches!(state, AcState::Eob) {
        *eobrun -= 1;
        if *eobrun == 0 {
            *state = AcState::Initial;
        }
    }
    Ok(())
}

/// Apply one correction bit to an already-nonzero coefficient. The bit adds
/// one step in the coefficient's own sign direction.
fn refine_nonzero(reader: &mut BitReader, coeff: &mut i32, al: u8) -> Result<()> {
    if next_bit(reader)? != 0 {
        if *coeff >= 0 {
            *coeff += 1 << al;
        } else {
            *coeff -= 1 << al;
        }
    }
    Ok(())
}
