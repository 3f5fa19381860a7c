// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Error types for JPEG decoding and encoding.

use thiserror::Error;

/// Errors that can occur while decoding or encoding a JPEG stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JpegError {
    /// The stream does not begin with an SOI marker.
    #[error("missing SOI marker (not a JPEG stream)")]
    MissingSoi,
    /// Input data is too short or truncated.
    #[error("unexpected end of JPEG data")]
    UnexpectedEof,
    /// Unrecognized marker with no recovery path.
    #[error("unknown JPEG marker 0x{marker:04X} at offset {offset}")]
    UnknownMarker { offset: usize, marker: u16 },
    /// A second malformed marker after recovery was already used once.
    #[error("malformed JPEG markers at offsets {first_offset} and {second_offset} (marker 0x{marker:04X})")]
    DualMalformedMarker {
        first_offset: usize,
        second_offset: usize,
        marker: u16,
    },
    /// A component declared a horizontal or vertical sampling factor of zero.
    #[error("invalid component sampling factor in frame header")]
    InvalidSamplingFactor,
    /// DQT precision field was neither 0 (8-bit) nor 1 (16-bit), or a
    /// destination outside 0..=3 was addressed.
    #[error("invalid quantization table spec {0}")]
    InvalidQuantSpec(u8),
    /// A canonical Huffman tree cannot be built from the DHT data.
    #[error("invalid Huffman table definition")]
    InvalidHuffmanTable,
    /// Entropy decoding walked off the code tree or ran out of bits.
    #[error("invalid Huffman code sequence in entropy-coded data")]
    InvalidHuffmanSequence,
    /// Progressive AC successive approximation decoded a magnitude category
    /// other than 0 or 1.
    #[error("invalid progressive AC encoding (magnitude category {0})")]
    InvalidAcEncoding(u8),
    /// A non-restart marker appeared in the middle of entropy-coded data.
    #[error("unexpected marker 0x{marker:04X} in entropy-coded data")]
    UnexpectedMarker { marker: u16 },
    /// Expected a restart marker after a restart interval, found none.
    #[error("restart marker was not found")]
    MarkerNotFound,
    /// More than one SOF marker in the stream.
    #[error("multiple frames are not supported")]
    MultipleFramesUnsupported,
    /// No SOF marker was seen before EOI.
    #[error("no frame header found")]
    MissingFrame,
    /// Frame pixel count exceeds the configured resolution ceiling.
    #[error("image resolution exceeds the limit by {excess_mp} megapixels")]
    ResolutionExceeded { excess_mp: u64 },
    /// Cumulative buffer allocations would exceed the configured ceiling.
    #[error("memory allocation would exceed the limit by {excess_mb} MB")]
    MemoryLimitExceeded { excess_mb: u64 },
    /// Component count outside 1..=4, or four components without an Adobe
    /// marker.
    #[error("unsupported color mode")]
    UnsupportedColorMode,
    /// A scan addressed a block outside the allocated component grid
    /// (only raised when tolerant decoding is disabled).
    #[error("block index out of range for component grid")]
    BlockIndexOutOfRange,
    /// SOS referenced a component id not present in the frame.
    #[error("scan references component {0} not present in the frame")]
    UnknownComponent(u8),
    /// A component's quantization table was never defined by a DQT segment.
    #[error("quantization table {0} was never defined")]
    MissingQuantTable(u8),
    /// A scan requires a Huffman table that was never defined by a DHT segment.
    #[error("Huffman table {0} was never defined")]
    MissingHuffmanTable(u8),
}

pub type Result<T> = std::result::Result<T, JpegError>;
