//! [![CI Status]][workflow] [![MSRV]][repo] [![Latest Version]][crates.io] [![Rust Doc Crate]][docs.rs] [![Rust Doc Main]][docs]
//!
//! [CI Status]: https://img.shields.io/github/actions/workflow/status/juntyr/numcodecs-rs/ci.yml?branch=main
//! [workflow]: https://github.com/juntyr/numcodecs-rs/actions/workflows/ci.yml?query=branch%3Amain
//!
//! [MSRV]: https://img.shields.io/badge/MSRV-1.85.0-blue
//! [repo]: https://github.com/juntyr/numcodecs-rs
//!
//! [Latest Version]: https://img.shields.io/crates/v/numcodecs-jitter-matrix
//! [crates.io]: https://crates.io/crates/numcodecs-jitter-matrix
//!
//! [Rust Doc Crate]: https://img.shields.io/docsrs/numcodecs-jitter-matrix
//! [docs.rs]: https://docs.rs/numcodecs-jitter-matrix/
//!
//! [Rust Doc Main]: https://img.shields.io/badge/docs-main-blue
//! [docs]: https://juntyr.github.io/numcodecs-rs/numcodecs_jitter_matrix
//!
//! Jitter matrix wire chunk codec implementation for the [`numcodecs`] API.
//!
//! A Jitter matrix chunk, as sent by `jit.net.send` and received by
//! `jit.net.recv`, consists of a fixed 296 byte [header][`MatrixHeader`]
//! followed by `data_size` bytes of cell data, whose rows may be padded to a
//! stride boundary. Only one- and two-dimensional matrices of `char`
//! (8-bit unsigned) samples are supported.

#[cfg(test)]
use ::serde_json as _;

use std::io::{self, Read};

use ndarray::{Array1, Ix3};
use numcodecs::{
    AnyArray, AnyArrayAssignError, AnyArrayDType, AnyArrayView, AnyArrayViewMut, AnyCowArray,
    Codec, StaticCodec, StaticCodecConfig, StaticCodecVersion,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod geometry;
mod header;
mod payload;
mod pixel;

pub use geometry::{GeometryError, MatrixGeometry};
pub use header::{
    ByteOrder, DimArray, ENVELOPE_SIZE, HEADER_SIZE, MATRIX_BYTE_ORDER, MATRIX_CHUNK_ID,
    MATRIX_CHUNK_SIZE, MAX_DIMS, MatrixHeader, SampleType, decode_header, encode_header,
    read_header,
};
pub use payload::{destride_payload, restride_payload};
pub use pixel::{ARGB_PLANES, ArgbColor, PixelBuffer};

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
/// Codec to encode `u8` arrays of shape `[dim_y, dim_x, plane_count]` into
/// Jitter matrix wire chunks, and to decode such chunks back into arrays.
///
/// Encoding never pads the rows. Decoding removes any row padding that the
/// sender inserted.
pub struct JitterMatrixCodec {
    /// Byte order of the outer chunk envelope's size field, defaults to the
    /// native byte order
    #[serde(default = "ByteOrder::native")]
    pub envelope: ByteOrder,
    /// Timestamp that is written into encoded chunks
    #[serde(default)]
    pub timestamp: f64,
    /// The codec's encoding format version. Do not provide this parameter explicitly.
    #[serde(default, rename = "_version")]
    pub version: StaticCodecVersion<1, 0, 0>,
}

impl Codec for JitterMatrixCodec {
    type Error = JitterMatrixCodecError;

    fn encode(&self, data: AnyCowArray) -> Result<AnyArray, Self::Error> {
        let AnyCowArray::U8(data) = data else {
            return Err(JitterMatrixCodecError::UnsupportedDtype(data.dtype()));
        };

        let shape = data.shape().to_vec();
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| JitterMatrixCodecError::DataNotThreeDimensional { shape })?;

        let encoded = encode(
            &PixelBuffer::from_array(data.into_owned()),
            &EncodeOptions {
                envelope: self.envelope,
                timestamp: self.timestamp,
            },
        )?;

        Ok(AnyArray::U8(Array1::from_vec(encoded).into_dyn()))
    }

    fn decode(&self, encoded: AnyCowArray) -> Result<AnyArray, Self::Error> {
        let AnyCowArray::U8(encoded) = encoded else {
            return Err(JitterMatrixCodecError::EncodedDataNotBytes {
                dtype: encoded.dtype(),
            });
        };

        if !matches!(encoded.shape(), [_]) {
            return Err(JitterMatrixCodecError::EncodedDataNotOneDimensional {
                shape: encoded.shape().to_vec(),
            });
        }

        let (_header, pixels) = decode(&AnyCowArray::U8(encoded).as_bytes(), self.envelope)?;

        Ok(AnyArray::U8(pixels.into_array().into_dyn()))
    }

    fn decode_into(
        &self,
        encoded: AnyArrayView,
        mut decoded: AnyArrayViewMut,
    ) -> Result<(), Self::Error> {
        let decoded_in = self.decode(encoded.cow())?;

        Ok(decoded.assign(&decoded_in)?)
    }
}

impl StaticCodec for JitterMatrixCodec {
    const CODEC_ID: &'static str = "jitter-matrix.rs";

    type Config<'de> = Self;

    fn from_config(config: Self::Config<'_>) -> Self {
        config
    }

    fn get_config(&self) -> StaticCodecConfig<'_, Self> {
        StaticCodecConfig::from(self)
    }
}

#[derive(Debug, Error)]
/// Errors that may occur when applying the [`JitterMatrixCodec`].
pub enum JitterMatrixCodecError {
    /// [`JitterMatrixCodec`] received fewer bytes than the fixed-size header
    #[error(
        "JitterMatrix requires a {HEADER_SIZE} byte header but only {available} bytes are available"
    )]
    TruncatedHeader {
        /// The number of available bytes
        available: usize,
    },
    /// [`JitterMatrixCodec`] received fewer payload bytes than announced by
    /// the header
    #[error(
        "JitterMatrix header announces {expected} payload bytes but only {available} bytes are available"
    )]
    TruncatedPayload {
        /// The announced data size
        expected: usize,
        /// The number of available payload bytes
        available: usize,
    },
    /// [`JitterMatrixCodec`] found an invalid matrix geometry
    #[error("JitterMatrix found an invalid matrix geometry")]
    InvalidGeometry {
        /// The source of the error
        #[from]
        source: GeometryError,
    },
    /// [`JitterMatrixCodec`] only supports `char` matrices
    #[error(
        "JitterMatrix only supports matrices of char samples but found sample type {sample_type}"
    )]
    UnsupportedSampleType {
        /// The wire representation of the unsupported sample type
        sample_type: i32,
    },
    /// [`JitterMatrixCodec`] failed to read or write a chunk
    #[error("JitterMatrix failed to read or write a chunk")]
    Io {
        /// The source of the error
        source: io::Error,
    },
    /// [`JitterMatrixCodec`] does not support the dtype
    #[error("JitterMatrix does not support the dtype {0}")]
    UnsupportedDtype(AnyArrayDType),
    /// [`JitterMatrixCodec`] can only encode three-dimensional arrays
    #[error(
        "JitterMatrix can only encode arrays of shape [dim_y, dim_x, plane_count] but received an array of shape {shape:?}"
    )]
    DataNotThreeDimensional {
        /// The unexpected shape of the array
        shape: Vec<usize>,
    },
    /// [`JitterMatrixCodec`] can only decode one-dimensional byte arrays but
    /// received an array of a different dtype
    #[error(
        "JitterMatrix can only decode one-dimensional byte arrays but received an array of dtype {dtype}"
    )]
    EncodedDataNotBytes {
        /// The unexpected dtype of the encoded array
        dtype: AnyArrayDType,
    },
    /// [`JitterMatrixCodec`] can only decode one-dimensional byte arrays but
    /// received an array of a different shape
    #[error(
        "JitterMatrix can only decode one-dimensional byte arrays but received a byte array of shape {shape:?}"
    )]
    EncodedDataNotOneDimensional {
        /// The unexpected shape of the encoded array
        shape: Vec<usize>,
    },
    /// [`JitterMatrixCodec`] cannot decode into the provided array
    #[error("JitterMatrix cannot decode into the provided array")]
    MismatchedDecodeIntoArray {
        /// The source of the error
        #[from]
        source: AnyArrayAssignError,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
/// Options for [`encode`]ing a Jitter matrix chunk
pub struct EncodeOptions {
    /// Byte order of the outer chunk envelope's size field
    pub envelope: ByteOrder,
    /// Timestamp that is written into the header
    pub timestamp: f64,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            envelope: ByteOrder::native(),
            timestamp: 0.0,
        }
    }
}

/// Decodes the Jitter matrix chunk at the start of `bytes`.
///
/// Bytes following the chunk's announced `data_size` are not read.
///
/// # Errors
///
/// Errors with
/// - [`JitterMatrixCodecError::TruncatedHeader`] if `bytes` is shorter than
///   the header
/// - [`JitterMatrixCodecError::UnsupportedSampleType`] if the matrix does not
///   contain `char` samples
/// - [`JitterMatrixCodecError::InvalidGeometry`] if the header describes an
///   invalid geometry or the payload does not contain all pixels
/// - [`JitterMatrixCodecError::TruncatedPayload`] if fewer than `data_size`
///   bytes follow the header
pub fn decode(
    bytes: &[u8],
    envelope: ByteOrder,
) -> Result<(MatrixHeader, PixelBuffer), JitterMatrixCodecError> {
    let header = decode_header(bytes, envelope)?;
    let (geometry, data_size) = validate_header(&header)?;

    let available = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let Some(payload) = available.get(..data_size) else {
        return Err(JitterMatrixCodecError::TruncatedPayload {
            expected: data_size,
            available: available.len(),
        });
    };

    let pixels = destride_payload(payload, &geometry)?;

    Ok((header, pixels))
}

/// Reads and decodes one Jitter matrix chunk from the `reader`.
///
/// At most [`HEADER_SIZE`] + `data_size` bytes are consumed, such that the
/// reader is positioned at the start of the next chunk. This also holds when
/// a complete chunk is rejected, as its payload is skipped.
///
/// # Errors
///
/// Errors with
/// - [`JitterMatrixCodecError::TruncatedHeader`] if the reader ends before
///   the complete header was read
/// - [`JitterMatrixCodecError::UnsupportedSampleType`] if the matrix does not
///   contain `char` samples
/// - [`JitterMatrixCodecError::InvalidGeometry`] if the header describes an
///   invalid geometry or the payload does not contain all pixels
/// - [`JitterMatrixCodecError::TruncatedPayload`] if the reader ends before
///   `data_size` payload bytes were read
/// - [`JitterMatrixCodecError::Io`] if reading failed
pub fn decode_from_reader<R: io::Read>(
    mut reader: R,
    envelope: ByteOrder,
) -> Result<(MatrixHeader, PixelBuffer), JitterMatrixCodecError> {
    let header = read_header(&mut reader, envelope)?;
    let (geometry, data_size) = match validate_header(&header) {
        Ok(valid) => valid,
        Err(err) => {
            // skip over the rejected payload to stay aligned with the stream
            if let Ok(data_size) = header.payload_len() {
                io::copy(&mut payload_reader(&mut reader, data_size), &mut io::sink())
                    .map_err(|source| JitterMatrixCodecError::Io { source })?;
            }
            return Err(err);
        }
    };

    let mut payload = Vec::new();
    payload_reader(&mut reader, data_size)
        .read_to_end(&mut payload)
        .map_err(|source| JitterMatrixCodecError::Io { source })?;

    if payload.len() < data_size {
        return Err(JitterMatrixCodecError::TruncatedPayload {
            expected: data_size,
            available: payload.len(),
        });
    }

    let pixels = destride_payload(&payload, &geometry)?;

    Ok((header, pixels))
}

/// Decodes each of the `chunks` independently.
///
/// A chunk that fails to decode produces an error in its own slot and does
/// not affect the other chunks.
pub fn decode_batch<'a>(
    chunks: impl IntoIterator<Item = &'a [u8]>,
    envelope: ByteOrder,
) -> Vec<Result<(MatrixHeader, PixelBuffer), JitterMatrixCodecError>> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(slice, chunk)| {
            decode(chunk, envelope).inspect_err(|err| {
                log::warn!("failed to decode Jitter matrix slice {slice}: {err}");
            })
        })
        .collect()
}

/// Encodes the `pixels` into a Jitter matrix chunk.
///
/// The chunk always describes a two-dimensional `char` matrix with unpadded
/// rows, i.e. a row stride of `plane_count * dim_x` bytes.
///
/// # Errors
///
/// Errors with [`JitterMatrixCodecError::InvalidGeometry`] if `pixels` is
/// empty or too large for the wire format.
pub fn encode(
    pixels: &PixelBuffer,
    options: &EncodeOptions,
) -> Result<Vec<u8>, JitterMatrixCodecError> {
    let mut encoded = Vec::new();
    encode_into(pixels, options, &mut encoded)?;
    Ok(encoded)
}

/// Encodes the `pixels` into a Jitter matrix chunk that is written to the
/// `writer`.
///
/// See [`encode`] for details.
///
/// # Errors
///
/// Errors with
/// - [`JitterMatrixCodecError::InvalidGeometry`] if `pixels` is empty or too
///   large for the wire format
/// - [`JitterMatrixCodecError::Io`] if writing failed
pub fn encode_into<W: io::Write>(
    pixels: &PixelBuffer,
    options: &EncodeOptions,
    mut writer: W,
) -> Result<(), JitterMatrixCodecError> {
    let geometry = MatrixGeometry::new(pixels.dim_x(), pixels.dim_y(), pixels.plane_count())?;
    let header = MatrixHeader::for_geometry(&geometry, options.timestamp)?;
    let payload = restride_payload(
        pixels,
        geometry.dim_x(),
        geometry.dim_y(),
        geometry.plane_count(),
    )?;

    log::trace!(
        "encoding Jitter matrix of {}x{}x{} into {} bytes",
        geometry.dim_x(),
        geometry.dim_y(),
        geometry.plane_count(),
        HEADER_SIZE + payload.len()
    );

    writer
        .write_all(&encode_header(&header, options.envelope))
        .and_then(|()| writer.write_all(&payload))
        .map_err(|source| JitterMatrixCodecError::Io { source })
}

fn payload_reader<R: Read>(reader: &mut R, data_size: usize) -> io::Take<&mut R> {
    reader.take(u64::try_from(data_size).unwrap_or(u64::MAX))
}

fn validate_header(
    header: &MatrixHeader,
) -> Result<(MatrixGeometry, usize), JitterMatrixCodecError> {
    if header.sample_type() != Some(SampleType::Char) {
        return Err(JitterMatrixCodecError::UnsupportedSampleType {
            sample_type: header.sample_type,
        });
    }

    let geometry = header.geometry()?;
    let data_size = header.payload_len()?;

    log::debug!(
        "decoded Jitter matrix header {:?}: {}x{}x{} with a row stride of {} plane-groups, {} payload bytes",
        header.inner_tag_str(),
        geometry.dim_x(),
        geometry.dim_y(),
        geometry.plane_count(),
        geometry.row_stride(),
        data_size,
    );

    Ok((geometry, data_size))
}
