// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Huffman coding tables for JPEG entropy decoding and encoding.

use crate::bitio::BitReader;
use crate::error::{JpegError, Result};

const UNASSIGNED: u16 = u16::MAX;
const LEAF_FLAG: u16 = 0x8000;

/// Canonical Huffman decode tree.
///
/// Stored as a flat vector of two-child nodes built in one pass over the
/// BITS/HUFFVAL layout. A child with the high bit set is a leaf carrying the
/// symbol in its low byte; `u16::MAX` marks an unassigned branch.
pub struct HuffmanTree {
    nodes: Vec<[u16; 2]>,
}

impl HuffmanTree {
    /// Build a decode tree from JPEG-style counts and symbols.
    ///
    /// `bits`: counts[i] = number of codes of length i+1 (16 entries).
    /// `huffval`: the symbols, in order of increasing code length.
    pub fn build(bits: &[u8; 16], huffval: &[u8]) -> Result<Self> {
        let mut nodes: Vec<[u16; 2]> = vec![[UNASSIGNED; 2]];
        let mut code: u32 = 0;
        let mut si = 0; // symbol index into huffval

        for length in 1..=16u8 {
            let count = bits[(length - 1) as usize] as usize;
            for _ in 0..count {
                if si >= huffval.len() || code >= 1u32 << length {
                    // Symbol count mismatch or code space overflow.
                    return Err(JpegError::InvalidHuffmanTable);
                }
                let symbol = huffval[si];
                si += 1;

                let mut node = 0usize;
                for depth in (1..length).rev() {
                    let bit = ((code >> depth) & 1) as usize;
                    let child = nodes[node][bit];
                    node = if child == UNASSIGNED {
                        if nodes.len() >= LEAF_FLAG as usize {
                            return Err(JpegError::InvalidHuffmanTable);
                        }
                        nodes.push([UNASSIGNED; 2]);
                        let idx = (nodes.len() - 1) as u16;
                        nodes[node][bit] = idx;
                        idx as usize
                    } else if child & LEAF_FLAG != 0 {
                        // A shorter code is a prefix of this one.
                        return Err(JpegError::InvalidHuffmanTable);
                    } else {
                        child as usize
                    };
                }
                let bit = (code & 1) as usize;
                if nodes[node][bit] != UNASSIGNED {
                    return Err(JpegError::InvalidHuffmanTable);
                }
                nodes[node][bit] = LEAF_FLAG | symbol as u16;
                code += 1;
            }
            code <<= 1;
        }

        Ok(Self { nodes })
    }

    /// Decode one Huffman symbol from the bit stream.
    ///
    /// Fails with [`JpegError::InvalidHuffmanSequence`] if the stream ends,
    /// a restart marker interrupts the symbol, or the walk escapes the tree.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u8> {
        let mut node = 0usize;
        loop {
            let bit = match reader.read_bit() {
                Ok(Some(b)) => b as usize,
                Ok(None) | Err(JpegError::UnexpectedEof) => {
                    return Err(JpegError::InvalidHuffmanSequence)
                }
                Err(e) => return Err(e),
            };
            let child = self.nodes[node][bit];
            if child == UNASSIGNED {
                return Err(JpegError::InvalidHuffmanSequence);
            }
            if child & LEAF_FLAG != 0 {
                return Ok((child & 0xFF) as u8);
            }
            node = child as usize;
        }
    }
}

/// Huffman encode table: maps symbol → (code_bits, code_length).
pub struct HuffmanEncodeTable {
    /// For each of the 256 possible symbols: (code, length).
    /// Length 0 means the symbol is not in the table.
    table: [(u16, u8); 256],
}

impl HuffmanEncodeTable {
    /// Build an encode table from JPEG-style counts and symbols.
    pub fn build(bits: &[u8; 16], huffval: &[u8]) -> Self {
        let mut table = [(0u16, 0u8); 256];
        let mut code: u32 = 0;
        let mut si = 0;

        for length in 1..=16u8 {
            let count = bits[(length - 1) as usize] as usize;
            for _ in 0..count {
                if si < huffval.len() {
                    let symbol = huffval[si] as usize;
                    table[symbol] = (code as u16, length);
                    si += 1;
                }
                code += 1;
            }
            code <<= 1;
        }

        Self { table }
    }

    /// Encode a symbol: returns (code_bits, code_length).
    /// Returns `Err` if the symbol has no code in this table.
    pub fn encode(&self, symbol: u8) -> Result<(u16, u8)> {
        let (code, len) = self.table[symbol as usize];
        if len == 0 {
            Err(JpegError::InvalidHuffmanTable)
        } else {
            Ok((code, len))
        }
    }
}

/// Extend a signed value from its JPEG "additional bits" representation.
///
/// Per ITU-T T.81 Table F.1: if the high bit is 0, the value is negative.
pub fn extend_sign(value: u32, bits: u8) -> i32 {
    if bits == 0 {
        return 0;
    }
    let half = 1i64 << (bits - 1);
    if (value as i64) < half {
        (value as i64 - (1i64 << bits) + 1) as i32
    } else {
        value as i32
    }
}

/// Encode a signed value into JPEG "additional bits" representation.
/// Returns (magnitude_bits, category/size).
pub fn encode_value(value: i32) -> (u16, u8) {
    if value == 0 {
        return (0, 0);
    }
    let abs = value.unsigned_abs();
    let size = (32 - abs.leading_zeros()) as u8;
    let bits = if value > 0 {
        value as u32
    } else {
        // For negative values, JPEG uses one's complement
        (value - 1) as u32
    };
    ((bits & ((1u32 << size) - 1)) as u16, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Standard JPEG luminance DC Huffman table (ITU-T T.81 Table K.3)
    fn lum_dc_table() -> ([u8; 16], Vec<u8>) {
        let bits = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        let vals = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        (bits, vals)
    }

    #[test]
    fn encode_decode_roundtrip() {
        let (bits, vals) = lum_dc_table();
        let enc = HuffmanEncodeTable::build(&bits, &vals);
        let tree = HuffmanTree::build(&bits, &vals).unwrap();

        for &sym in &vals {
            let (code, len) = enc.encode(sym).unwrap();

            // Place the code in the top bits of a 4-byte buffer
            let shifted = (code as u32) << (32 - len);
            let bytes = shifted.to_be_bytes();

            // Handle byte-stuffing: if any byte is 0xFF, it needs 0x00 after it
            let mut stuffed = Vec::new();
            for &b in &bytes {
                stuffed.push(b);
                if b == 0xFF {
                    stuffed.push(0x00);
                }
            }

            let mut reader = BitReader::new(&stuffed, 0);
            let decoded = tree.decode(&mut reader).unwrap();
            assert_eq!(decoded, sym, "symbol {sym} round-trip failed");
        }
    }

    #[test]
    fn reject_code_space_overflow() {
        // Three 1-bit codes cannot exist
        let mut bits = [0u8; 16];
        bits[0] = 3;
        let vals = vec![0, 1, 2];
        assert!(matches!(
            HuffmanTree::build(&bits, &vals),
            Err(JpegError::InvalidHuffmanTable)
        ));
    }

    #[test]
    fn reject_symbol_count_mismatch() {
        let mut bits = [0u8; 16];
        bits[1] = 3; // three 2-bit codes declared
        let vals = vec![0, 1]; // but only two symbols supplied
        assert!(matches!(
            HuffmanTree::build(&bits, &vals),
            Err(JpegError::InvalidHuffmanTable)
        ));
    }

    #[test]
    fn decode_walks_off_tree() {
        // Single 2-bit code "00"; input stream starts with 1-bits
        let mut bits = [0u8; 16];
        bits[1] = 1;
        let tree = HuffmanTree::build(&bits, &[42]).unwrap();
        let data = [0b1100_0000];
        let mut reader = BitReader::new(&data, 0);
        assert!(matches!(
            tree.decode(&mut reader),
            Err(JpegError::InvalidHuffmanSequence)
        ));
    }

    #[test]
    fn extend_sign_values() {
        // Category 1: value 0 → -1, value 1 → +1
        assert_eq!(extend_sign(0, 1), -1);
        assert_eq!(extend_sign(1, 1), 1);

        // Category 3: values 0–3 → -7 to -4, values 4–7 → +4 to +7
        assert_eq!(extend_sign(0, 3), -7);
        assert_eq!(extend_sign(3, 3), -4);
        assert_eq!(extend_sign(4, 3), 4);
        assert_eq!(extend_sign(7, 3), 7);

        // Category 0
        assert_eq!(extend_sign(0, 0), 0);
    }

    #[test]
    fn encode_value_roundtrip() {
        for v in -255i32..=255 {
            let (bits, size) = encode_value(v);
            if v == 0 {
                assert_eq!(size, 0);
            } else {
                let recovered = extend_sign(bits as u32, size);
                assert_eq!(recovered, v, "round-trip failed for {v}");
            }
        }
    }
}
