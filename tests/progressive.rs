// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Progressive decoding against the sequential reference.

use rawjpeg::tables::{
    STD_LUMA_AC_BITS, STD_LUMA_AC_VALS, STD_LUMA_DC_BITS, STD_LUMA_DC_VALS,
};
use rawjpeg::{decode, DecoderOptions};

fn segment(marker: u16, body: &[u8]) -> Vec<u8> {
    let mut out = marker.to_be_bytes().to_vec();
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn dqt_flat() -> Vec<u8> {
    let mut body = vec![0u8];
    body.extend_from_slice(&[1; 64]);
    segment(0xFFDB, &body)
}

fn dht(class: u8, bits: &[u8; 16], vals: &[u8]) -> Vec<u8> {
    let mut body = vec![class << 4];
    body.extend_from_slice(bits);
    body.extend_from_slice(vals);
    segment(0xFFC4, &body)
}

fn sof_gray(marker: u16) -> Vec<u8> {
    segment(marker, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0])
}

/// Sequential 8x8 mid-gray: one block of `DC category 0` + `EOB`.
fn sequential_stream() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&dqt_flat());
    data.extend_from_slice(&sof_gray(0xFFC0));
    data.extend_from_slice(&dht(0, &STD_LUMA_DC_BITS, &STD_LUMA_DC_VALS));
    data.extend_from_slice(&dht(1, &STD_LUMA_AC_BITS, &STD_LUMA_AC_VALS));
    data.extend_from_slice(&segment(0xFFDA, &[1, 1, 0x00, 0, 63, 0]));
    data.push(0x2B); // bits `00 1010`, padded
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// The same image as SOF2 with a DC scan followed by one AC band scan.
fn progressive_stream() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&dqt_flat());
    data.extend_from_slice(&sof_gray(0xFFC2));
    // Scan 1: DC first (Ss=0, Se=0, Ah=0, Al=0): bits `00`, padded.
    data.extend_from_slice(&dht(0, &STD_LUMA_DC_BITS, &STD_LUMA_DC_VALS));
    data.extend_from_slice(&segment(0xFFDA, &[1, 1, 0x00, 0, 0, 0x00]));
    data.push(0x3F);
    // Scan 2: AC first over band 1..63: a single EOB0, bits `1010`, padded.
    data.extend_from_slice(&dht(1, &STD_LUMA_AC_BITS, &STD_LUMA_AC_VALS));
    data.extend_from_slice(&segment(0xFFDA, &[1, 1, 0x00, 1, 63, 0x00]));
    data.push(0xAF);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

#[test]
fn progressive_matches_sequential() {
    let opts = DecoderOptions::default();
    let seq = decode(&sequential_stream(), &opts).unwrap();
    let prog = decode(&progressive_stream(), &opts).unwrap();
    assert_eq!(seq.width, prog.width);
    assert_eq!(seq.height, prog.height);
    assert_eq!(seq.pixel_data, prog.pixel_data);
}

#[test]
fn progressive_decodes_to_gray() {
    let image = decode(&progressive_stream(), &DecoderOptions::default()).unwrap();
    for px in image.pixel_data.chunks_exact(4) {
        assert_eq!(px, &[128, 128, 128, 255]);
    }
}

#[test]
fn dc_refinement_scan_applied() {
    // Scan 1 (Al=3): DC category 1, magnitude bit 1 → coefficient 1 << 3 = 8,
    // which lifts the block to 129.
    // Scan 2 (DC successive, Ah=3, Al=2): one `1` bit ORs in bit 2, raising
    // the coefficient to 12 and the block to 130.
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&dqt_flat());
    data.extend_from_slice(&sof_gray(0xFFC2));
    data.extend_from_slice(&dht(0, &STD_LUMA_DC_BITS, &STD_LUMA_DC_VALS));
    data.extend_from_slice(&segment(0xFFDA, &[1, 1, 0x00, 0, 0, 0x03]));
    data.push(0x5F); // `010` (category 1), magnitude `1`, padding
    data.extend_from_slice(&segment(0xFFDA, &[1, 1, 0x00, 0, 0, 0x32]));
    data.push(0xFF);
    data.push(0x00); // one `1` bit (stuffed byte), then padding
    data.extend_from_slice(&[0xFF, 0xD9]);

    let image = decode(&data, &DecoderOptions::default()).unwrap();
    assert_eq!(image.pixel_data[0], 130);
}
