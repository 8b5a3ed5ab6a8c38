//! Fixed-layout header of a Jitter matrix chunk.
//!
//! Layout (296 bytes):
//!
//! | Offset | Size | Field           | Byte order            |
//! |--------|------|-----------------|-----------------------|
//! | 0      | 4    | outer tag       | raw                   |
//! | 4      | 4    | outer size      | envelope (native)     |
//! | 8      | 4    | inner tag       | raw                   |
//! | 12     | 4    | inner size      | big-endian            |
//! | 16     | 4    | plane count     | big-endian            |
//! | 20     | 4    | sample type     | big-endian            |
//! | 24     | 4    | dim count       | big-endian            |
//! | 28     | 128  | 32 x dims       | big-endian            |
//! | 156    | 128  | 32 x strides    | big-endian            |
//! | 284    | 4    | data size       | big-endian            |
//! | 288    | 8    | timestamp (f64) | big-endian            |

use std::{borrow::Cow, fmt, io};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    JitterMatrixCodecError,
    geometry::{GeometryError, MatrixGeometry},
};

/// Capacity of the dimension and stride arrays on the wire
pub const MAX_DIMS: usize = 32;

/// Fixed-capacity dimension or stride array, of which only the first
/// `dim_count` entries are meaningful
pub type DimArray = [i32; MAX_DIMS];

/// Size of the outer chunk envelope (tag and size) in bytes
pub const ENVELOPE_SIZE: usize = 8;

/// Size of the complete chunk header in bytes
pub const HEADER_SIZE: usize = ENVELOPE_SIZE + 5 * 4 + 2 * MAX_DIMS * 4 + 4 + 8;

/// Chunk identifier of a Jitter matrix chunk
pub const MATRIX_CHUNK_ID: [u8; 4] = *b"JMTX";

/// Chunk size announced for a Jitter matrix chunk, i.e. the size of the
/// header without its outer envelope
pub const MATRIX_CHUNK_SIZE: i32 = 288;

/// Byte order of all header fields after the outer envelope
pub const MATRIX_BYTE_ORDER: ByteOrder = ByteOrder::Big;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
/// Byte order of multi-byte fields on the wire
pub enum ByteOrder {
    /// Least significant byte first
    Little,
    /// Most significant byte first, i.e. network byte order
    Big,
}

impl ByteOrder {
    /// The byte order of the target platform
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    const fn i32_from_bytes(self, bytes: [u8; 4]) -> i32 {
        match self {
            Self::Little => i32::from_le_bytes(bytes),
            Self::Big => i32::from_be_bytes(bytes),
        }
    }

    const fn i32_to_bytes(self, value: i32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    const fn f64_from_bytes(self, bytes: [u8; 8]) -> f64 {
        match self {
            Self::Little => f64::from_le_bytes(bytes),
            Self::Big => f64::from_be_bytes(bytes),
        }
    }

    const fn f64_to_bytes(self, value: f64) -> [u8; 8] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match self {
            Self::Little => "little",
            Self::Big => "big",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
/// Sample type of a Jitter matrix
pub enum SampleType {
    /// 8-bit unsigned integer
    Char = 0,
    /// 32-bit signed integer
    Long = 1,
    /// 32-bit floating point
    Float32 = 2,
    /// 64-bit floating point
    Float64 = 3,
}

impl SampleType {
    /// Looks up the sample type with the wire representation `value`
    #[must_use]
    pub const fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Char),
            1 => Some(Self::Long),
            2 => Some(Self::Float32),
            3 => Some(Self::Float64),
            _ => None,
        }
    }

    /// Size of one sample in bytes
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Char => 1,
            Self::Long | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
/// Header of a Jitter matrix chunk
pub struct MatrixHeader {
    /// Tag of the outer chunk envelope
    pub outer_tag: [u8; 4],
    /// Size of the outer chunk envelope, stored in the envelope byte order
    pub outer_size: i32,
    /// Tag of the matrix chunk
    pub inner_tag: [u8; 4],
    /// Size of the matrix chunk
    pub inner_size: i32,
    /// Number of planes, i.e. samples per cell
    pub plane_count: i32,
    /// Wire representation of the [`SampleType`]
    pub sample_type: i32,
    /// Number of meaningful entries in `dims` and `strides`
    pub dim_count: i32,
    /// Size of each dimension in cells
    pub dims: DimArray,
    /// Stride of each dimension in bytes
    pub strides: DimArray,
    /// Length of the payload following the header in bytes
    pub data_size: i32,
    /// Sender-side timestamp, opaque to the codec
    pub timestamp: f64,
}

impl MatrixHeader {
    /// Creates the header for an unpadded two-dimensional `u8` matrix with
    /// the provided `geometry`.
    ///
    /// Unused dimension slots are filled with `1`, unused stride slots with
    /// `0`.
    ///
    /// # Errors
    ///
    /// Errors with [`GeometryError::TooLarge`] if any size does not fit into
    /// the wire representation.
    pub fn for_geometry(geometry: &MatrixGeometry, timestamp: f64) -> Result<Self, GeometryError> {
        let to_wire = |value: usize| i32::try_from(value).map_err(|_| GeometryError::TooLarge);

        let plane_count = to_wire(geometry.plane_count())?;
        let row_bytes = geometry
            .plane_count()
            .checked_mul(geometry.dim_x())
            .ok_or(GeometryError::TooLarge)?;

        let mut dims = [1; MAX_DIMS];
        let mut strides = [0; MAX_DIMS];
        let [dim_x, dim_y, ..] = &mut dims;
        *dim_x = to_wire(geometry.dim_x())?;
        *dim_y = to_wire(geometry.dim_y())?;
        let [cell_stride, row_stride, ..] = &mut strides;
        *cell_stride = plane_count;
        *row_stride = to_wire(row_bytes)?;

        Ok(Self {
            outer_tag: MATRIX_CHUNK_ID,
            outer_size: MATRIX_CHUNK_SIZE,
            inner_tag: MATRIX_CHUNK_ID,
            inner_size: MATRIX_CHUNK_SIZE,
            plane_count,
            sample_type: SampleType::Char as i32,
            dim_count: 2,
            dims,
            strides,
            data_size: to_wire(geometry.dense_len())?,
            timestamp,
        })
    }

    /// The inner chunk tag interpreted as ASCII text
    #[must_use]
    pub fn inner_tag_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.inner_tag)
    }

    /// The [`SampleType`] of the matrix, if it is known
    #[must_use]
    pub const fn sample_type(&self) -> Option<SampleType> {
        SampleType::from_wire(self.sample_type)
    }

    /// Derives and validates the pixel geometry of the matrix.
    ///
    /// # Errors
    ///
    /// Errors with a [`GeometryError`] if the dimension count, dimensions,
    /// plane count, or row stride are invalid.
    pub fn geometry(&self) -> Result<MatrixGeometry, GeometryError> {
        MatrixGeometry::from_wire(self.dim_count, &self.dims, &self.strides, self.plane_count)
    }

    /// The number of payload bytes following the header
    ///
    /// # Errors
    ///
    /// Errors with [`GeometryError::DataSize`] if the data size is negative.
    pub fn payload_len(&self) -> Result<usize, GeometryError> {
        usize::try_from(self.data_size).map_err(|_| GeometryError::DataSize {
            data_size: self.data_size,
        })
    }
}

/// Decodes the fixed-size header from the start of `bytes`.
///
/// The outer envelope size is read in the `envelope` byte order, all fields
/// following the inner tag in [`MATRIX_BYTE_ORDER`]. Bytes after the header
/// are ignored.
///
/// # Errors
///
/// Errors with [`JitterMatrixCodecError::TruncatedHeader`] if `bytes` is
/// shorter than [`HEADER_SIZE`].
pub fn decode_header(
    bytes: &[u8],
    envelope: ByteOrder,
) -> Result<MatrixHeader, JitterMatrixCodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(JitterMatrixCodecError::TruncatedHeader {
            available: bytes.len(),
        });
    }

    let mut fields = FieldCursor {
        bytes,
        available: bytes.len(),
    };

    Ok(MatrixHeader {
        outer_tag: fields.take()?,
        outer_size: fields.i32(envelope)?,
        inner_tag: fields.take()?,
        inner_size: fields.i32(MATRIX_BYTE_ORDER)?,
        plane_count: fields.i32(MATRIX_BYTE_ORDER)?,
        sample_type: fields.i32(MATRIX_BYTE_ORDER)?,
        dim_count: fields.i32(MATRIX_BYTE_ORDER)?,
        dims: fields.dims(MATRIX_BYTE_ORDER)?,
        strides: fields.dims(MATRIX_BYTE_ORDER)?,
        data_size: fields.i32(MATRIX_BYTE_ORDER)?,
        timestamp: fields.f64(MATRIX_BYTE_ORDER)?,
    })
}

/// Reads and decodes the fixed-size header from the `reader`.
///
/// Exactly [`HEADER_SIZE`] bytes are consumed unless the reader ends early.
///
/// # Errors
///
/// Errors with
/// - [`JitterMatrixCodecError::TruncatedHeader`] if the reader ends before
///   the complete header was read
/// - [`JitterMatrixCodecError::Io`] if reading failed
pub fn read_header<R: io::Read>(
    mut reader: R,
    envelope: ByteOrder,
) -> Result<MatrixHeader, JitterMatrixCodecError> {
    let mut bytes = [0_u8; HEADER_SIZE];
    let available = read_up_to(&mut reader, &mut bytes)
        .map_err(|source| JitterMatrixCodecError::Io { source })?;

    decode_header(bytes.get(..available).unwrap_or_default(), envelope)
}

/// Encodes the `header` into its [`HEADER_SIZE`] byte wire representation.
///
/// The outer envelope size is written in the `envelope` byte order, all
/// fields following the inner tag in [`MATRIX_BYTE_ORDER`]. Both tags are
/// written as raw bytes.
#[must_use]
pub fn encode_header(header: &MatrixHeader, envelope: ByteOrder) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE);

    bytes.extend_from_slice(&header.outer_tag);
    bytes.extend_from_slice(&envelope.i32_to_bytes(header.outer_size));
    bytes.extend_from_slice(&header.inner_tag);

    for field in [
        header.inner_size,
        header.plane_count,
        header.sample_type,
        header.dim_count,
    ]
    .iter()
    .chain(&header.dims)
    .chain(&header.strides)
    .chain(std::iter::once(&header.data_size))
    {
        bytes.extend_from_slice(&MATRIX_BYTE_ORDER.i32_to_bytes(*field));
    }

    bytes.extend_from_slice(&MATRIX_BYTE_ORDER.f64_to_bytes(header.timestamp));

    bytes
}

struct FieldCursor<'a> {
    bytes: &'a [u8],
    available: usize,
}

impl FieldCursor<'_> {
    const fn take<const N: usize>(&mut self) -> Result<[u8; N], JitterMatrixCodecError> {
        let Some((field, rest)) = self.bytes.split_first_chunk::<N>() else {
            return Err(JitterMatrixCodecError::TruncatedHeader {
                available: self.available,
            });
        };
        self.bytes = rest;
        Ok(*field)
    }

    fn i32(&mut self, order: ByteOrder) -> Result<i32, JitterMatrixCodecError> {
        Ok(order.i32_from_bytes(self.take()?))
    }

    fn f64(&mut self, order: ByteOrder) -> Result<f64, JitterMatrixCodecError> {
        Ok(order.f64_from_bytes(self.take()?))
    }

    fn dims(&mut self, order: ByteOrder) -> Result<DimArray, JitterMatrixCodecError> {
        let mut dims = [0; MAX_DIMS];
        for dim in &mut dims {
            *dim = self.i32(order)?;
        }
        Ok(dims)
    }
}

/// Reads into `buf` until it is full or the reader is exhausted, returning the
/// number of bytes read.
fn read_up_to<R: io::Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while let Some(rest) = buf.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }

        match reader.read(rest) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
            Err(err) => return Err(err),
        }
    }

    Ok(filled)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample_header() -> MatrixHeader {
        let mut dims = [1; MAX_DIMS];
        dims[0] = 3;
        dims[1] = 2;
        let mut strides = [0; MAX_DIMS];
        strides[0] = 4;
        strides[1] = 16;

        MatrixHeader {
            outer_tag: *b"JMTX",
            outer_size: MATRIX_CHUNK_SIZE,
            inner_tag: *b"JMTX",
            inner_size: MATRIX_CHUNK_SIZE,
            plane_count: 4,
            sample_type: 0,
            dim_count: 2,
            dims,
            strides,
            data_size: 32,
            timestamp: 10_765_666.226_2,
        }
    }

    #[test]
    fn header_size() {
        assert_eq!(HEADER_SIZE, 296);
        assert_eq!(
            usize::try_from(MATRIX_CHUNK_SIZE).unwrap(),
            HEADER_SIZE - ENVELOPE_SIZE
        );
        assert_eq!(encode_header(&sample_header(), ByteOrder::Little).len(), HEADER_SIZE);
    }

    #[test]
    fn field_offsets() {
        let bytes = encode_header(&sample_header(), ByteOrder::Little);

        assert_eq!(&bytes[0..4], b"JMTX");
        assert_eq!(&bytes[4..8], &288_i32.to_le_bytes());
        assert_eq!(&bytes[8..12], b"JMTX");
        assert_eq!(&bytes[12..16], &288_i32.to_be_bytes());
        assert_eq!(&bytes[16..20], &4_i32.to_be_bytes());
        assert_eq!(&bytes[20..24], &0_i32.to_be_bytes());
        assert_eq!(&bytes[24..28], &2_i32.to_be_bytes());
        assert_eq!(&bytes[28..32], &3_i32.to_be_bytes());
        assert_eq!(&bytes[32..36], &2_i32.to_be_bytes());
        assert_eq!(&bytes[36..40], &1_i32.to_be_bytes());
        assert_eq!(&bytes[156..160], &4_i32.to_be_bytes());
        assert_eq!(&bytes[160..164], &16_i32.to_be_bytes());
        assert_eq!(&bytes[164..168], &0_i32.to_be_bytes());
        assert_eq!(&bytes[284..288], &32_i32.to_be_bytes());
        assert_eq!(&bytes[288..296], &10_765_666.226_2_f64.to_be_bytes());
    }

    #[test]
    fn envelope_byte_order() {
        let header = sample_header();

        let little = encode_header(&header, ByteOrder::Little);
        let big = encode_header(&header, ByteOrder::Big);

        assert_eq!(&big[4..8], &288_i32.to_be_bytes());
        assert_eq!(little[8..], big[8..]);

        assert_eq!(decode_header(&little, ByteOrder::Little).unwrap(), header);
        assert_eq!(decode_header(&big, ByteOrder::Big).unwrap(), header);

        let misread = decode_header(&little, ByteOrder::Big).unwrap();
        assert_eq!(misread.outer_size, i32::from_be_bytes(288_i32.to_le_bytes()));
        assert_eq!(misread.plane_count, header.plane_count);
    }

    #[test]
    fn truncated() {
        let bytes = encode_header(&sample_header(), ByteOrder::native());

        for len in [0, 1, ENVELOPE_SIZE, HEADER_SIZE - 1] {
            assert!(matches!(
                decode_header(&bytes[..len], ByteOrder::native()),
                Err(JitterMatrixCodecError::TruncatedHeader { available }) if available == len
            ));
        }

        assert!(matches!(
            read_header(&bytes[..100], ByteOrder::native()),
            Err(JitterMatrixCodecError::TruncatedHeader { available: 100 })
        ));
    }

    #[test]
    fn reader_consumes_exactly_the_header() {
        let mut bytes = encode_header(&sample_header(), ByteOrder::native());
        bytes.extend_from_slice(&[42; 7]);

        let mut reader = bytes.as_slice();
        let header = read_header(&mut reader, ByteOrder::native()).unwrap();

        assert_eq!(header, sample_header());
        assert_eq!(reader, &[42; 7]);
    }

    #[test]
    fn inner_tag_text() {
        let mut header = sample_header();
        assert_eq!(header.inner_tag_str(), "JMTX");

        header.inner_tag = *b"JMT\xff";
        assert_eq!(header.inner_tag_str(), "JMT\u{fffd}");
    }

    #[test]
    fn sample_types() {
        assert_eq!(SampleType::from_wire(0), Some(SampleType::Char));
        assert_eq!(SampleType::from_wire(3), Some(SampleType::Float64));
        assert_eq!(SampleType::from_wire(4), None);
        assert_eq!(SampleType::from_wire(-1), None);
        assert_eq!(SampleType::Float32.size(), 4);
    }

    #[test]
    fn header_for_geometry() {
        let geometry = MatrixGeometry::new(5, 3, 4).unwrap();
        let header = MatrixHeader::for_geometry(&geometry, 1.5).unwrap();

        assert_eq!(header.outer_tag, MATRIX_CHUNK_ID);
        assert_eq!(header.inner_tag, MATRIX_CHUNK_ID);
        assert_eq!(header.dim_count, 2);
        assert_eq!(header.plane_count, 4);
        assert_eq!(header.sample_type(), Some(SampleType::Char));
        assert_eq!(&header.dims[..3], &[5, 3, 1]);
        assert!(header.dims[2..].iter().all(|&d| d == 1));
        assert_eq!(&header.strides[..3], &[4, 20, 0]);
        assert!(header.strides[2..].iter().all(|&s| s == 0));
        assert_eq!(header.data_size, 5 * 3 * 4);
        assert_eq!(header.payload_len().unwrap(), 60);
        assert_eq!(header.geometry().unwrap(), geometry);
    }

    #[test]
    fn negative_data_size() {
        let mut header = sample_header();
        header.data_size = -1;

        assert!(matches!(
            header.payload_len(),
            Err(GeometryError::DataSize { data_size: -1 })
        ));
    }
}
