// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! The zigzag coefficient ordering from ITU-T T.81 Figure 5.

/// Position of each zigzag-sequence index in the natural (row-major) 8×8
/// layout. Entropy-coded data and DQT payloads run in zigzag order; blocks
/// and quantizers are stored naturally, so every deposit goes through this
/// permutation.
pub const ZIGZAG_TO_NATURAL: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Zigzag position of each natural index; the inverse permutation, used on
/// the encoding side.
pub const NATURAL_TO_ZIGZAG: [usize; 64] = {
    let mut inverse = [0usize; 64];
    let mut zi = 0;
    while zi < 64 {
        inverse[ZIGZAG_TO_NATURAL[zi]] = zi;
        zi += 1;
    }
    inverse
};
