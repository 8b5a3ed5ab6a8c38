//! Pixel geometry of a Jitter matrix and the row padding arithmetic.

use thiserror::Error;

use crate::header::DimArray;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// Validated geometry of a one- or two-dimensional `u8` Jitter matrix.
///
/// On the wire, each row occupies `block` plane-groups of `plane_count`
/// bytes, of which only the first `dim_x` are pixels and the remaining `fill`
/// are padding.
pub struct MatrixGeometry {
    dim_x: usize,
    dim_y: usize,
    plane_count: usize,
    row_stride: usize,
    block: usize,
    dense_len: usize,
    required_len: usize,
}

impl MatrixGeometry {
    /// Creates the geometry of an unpadded matrix with `dim_x` columns,
    /// `dim_y` rows and `plane_count` planes.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`GeometryError::Dimension`] if `dim_x` or `dim_y` is zero
    /// - [`GeometryError::PlaneCount`] if `plane_count` is zero
    /// - [`GeometryError::TooLarge`] if the matrix size overflows
    pub fn new(dim_x: usize, dim_y: usize, plane_count: usize) -> Result<Self, GeometryError> {
        Self::with_row_stride(dim_x, dim_y, plane_count, dim_x)
    }

    /// Creates the geometry of a matrix whose rows are padded to a stride of
    /// `row_stride` plane-groups.
    ///
    /// A `row_stride` that is smaller than `dim_x` pads each row up to the
    /// next multiple of `row_stride`.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`GeometryError::Dimension`] if `dim_x` or `dim_y` is zero
    /// - [`GeometryError::PlaneCount`] if `plane_count` is zero
    /// - [`GeometryError::RowStride`] if `row_stride` is zero
    /// - [`GeometryError::TooLarge`] if the matrix size overflows
    pub fn with_row_stride(
        dim_x: usize,
        dim_y: usize,
        plane_count: usize,
        row_stride: usize,
    ) -> Result<Self, GeometryError> {
        for (axis, size) in [dim_x, dim_y].into_iter().enumerate() {
            if size == 0 {
                return Err(GeometryError::Dimension { axis, size: 0 });
            }
        }

        if plane_count == 0 {
            return Err(GeometryError::PlaneCount { plane_count: 0 });
        }

        if row_stride == 0 {
            return Err(GeometryError::RowStride {
                row_stride: 0,
                plane_count,
            });
        }

        let fill = (row_stride - dim_x % row_stride) % row_stride;
        let block = dim_x.checked_add(fill).ok_or(GeometryError::TooLarge)?;

        let dense_len = dim_x
            .checked_mul(dim_y)
            .and_then(|pixels| pixels.checked_mul(plane_count))
            .ok_or(GeometryError::TooLarge)?;
        // the last row does not need to carry its padding
        let required_len = (dim_y - 1)
            .checked_mul(block)
            .and_then(|groups| groups.checked_add(dim_x))
            .and_then(|groups| groups.checked_mul(plane_count))
            .ok_or(GeometryError::TooLarge)?;

        Ok(Self {
            dim_x,
            dim_y,
            plane_count,
            row_stride,
            block,
            dense_len,
            required_len,
        })
    }

    /// Derives the geometry from the header fields of a Jitter matrix.
    ///
    /// `strides` are given in bytes, where `strides[1]` is the size of one
    /// row. The row stride in plane-groups is thus `strides[1] / plane_count`.
    /// One-dimensional matrices, and matrices with a zero row stride, are
    /// unpadded.
    ///
    /// # Errors
    ///
    /// Errors with
    /// - [`GeometryError::DimCount`] if `dim_count` is not 1 or 2
    /// - [`GeometryError::Dimension`] if a used dimension is not positive
    /// - [`GeometryError::PlaneCount`] if `plane_count` is not positive
    /// - [`GeometryError::RowStride`] if the row stride is negative or not a
    ///   whole number of plane-groups
    /// - [`GeometryError::TooLarge`] if the matrix size overflows
    pub fn from_wire(
        dim_count: i32,
        dims: &DimArray,
        strides: &DimArray,
        plane_count: i32,
    ) -> Result<Self, GeometryError> {
        if !matches!(dim_count, 1 | 2) {
            return Err(GeometryError::DimCount { dim_count });
        }

        let [wire_dim_x, wire_dim_y, ..] = *dims;
        let [_, wire_row_stride, ..] = *strides;

        let dim_x = positive(wire_dim_x).ok_or_else(|| GeometryError::Dimension {
            axis: 0,
            size: i64::from(wire_dim_x),
        })?;
        let dim_y = if dim_count == 2 {
            positive(wire_dim_y).ok_or_else(|| GeometryError::Dimension {
                axis: 1,
                size: i64::from(wire_dim_y),
            })?
        } else {
            1
        };
        let plane_count = positive(plane_count).ok_or_else(|| GeometryError::PlaneCount {
            plane_count: i64::from(plane_count),
        })?;

        let row_stride = match (dim_count, wire_row_stride) {
            (2, row_bytes @ 1..) => {
                let row_bytes = positive(row_bytes).ok_or(GeometryError::TooLarge)?;
                if row_bytes % plane_count != 0 {
                    return Err(GeometryError::RowStride {
                        row_stride: i64::from(wire_row_stride),
                        plane_count,
                    });
                }
                row_bytes / plane_count
            }
            (2, ..=-1) => {
                return Err(GeometryError::RowStride {
                    row_stride: i64::from(wire_row_stride),
                    plane_count,
                });
            }
            _ => dim_x,
        };

        Self::with_row_stride(dim_x, dim_y, plane_count, row_stride)
    }

    /// Number of pixel columns
    #[must_use]
    pub const fn dim_x(&self) -> usize {
        self.dim_x
    }

    /// Number of pixel rows
    #[must_use]
    pub const fn dim_y(&self) -> usize {
        self.dim_y
    }

    /// Number of planes, i.e. bytes per plane-group
    #[must_use]
    pub const fn plane_count(&self) -> usize {
        self.plane_count
    }

    /// Row stride on the wire in plane-groups
    #[must_use]
    pub const fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Number of filler plane-groups at the end of each row on the wire
    #[must_use]
    pub const fn fill(&self) -> usize {
        self.block - self.dim_x
    }

    /// Number of plane-groups that each padded row occupies on the wire
    #[must_use]
    pub const fn block(&self) -> usize {
        self.block
    }

    /// Number of pixels, i.e. `dim_x * dim_y`
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.dim_x * self.dim_y
    }

    /// Number of bytes in the dense, unpadded pixel buffer
    #[must_use]
    pub const fn dense_len(&self) -> usize {
        self.dense_len
    }

    /// Minimum number of payload bytes on the wire that contain all pixels
    #[must_use]
    pub const fn required_payload_len(&self) -> usize {
        self.required_len
    }

    /// Whether the rows are padded on the wire
    #[must_use]
    pub const fn is_padded(&self) -> bool {
        self.block != self.dim_x
    }
}

fn positive(value: i32) -> Option<usize> {
    usize::try_from(value).ok().filter(|value| *value > 0)
}

#[derive(Debug, Error)]
/// Errors describing an invalid Jitter matrix geometry
pub enum GeometryError {
    /// Only one- and two-dimensional matrices are supported
    #[error("JitterMatrix only supports one- or two-dimensional matrices but found {dim_count} dimensions")]
    DimCount {
        /// The unsupported number of dimensions
        dim_count: i32,
    },
    /// Every used dimension must contain at least one cell
    #[error("JitterMatrix dimension {axis} must be positive but has size {size}")]
    Dimension {
        /// Index of the invalid dimension
        axis: usize,
        /// The invalid size
        size: i64,
    },
    /// Every cell must contain at least one plane
    #[error("JitterMatrix plane count must be positive but is {plane_count}")]
    PlaneCount {
        /// The invalid plane count
        plane_count: i64,
    },
    /// The row stride must be a positive whole number of plane-groups
    #[error(
        "JitterMatrix row stride of {row_stride} bytes is not a positive whole number of {plane_count}-byte plane-groups"
    )]
    RowStride {
        /// The invalid row stride in bytes
        row_stride: i64,
        /// The plane count, i.e. the size of one plane-group in bytes
        plane_count: usize,
    },
    /// The data size must not be negative
    #[error("JitterMatrix data size must not be negative but is {data_size}")]
    DataSize {
        /// The invalid data size
        data_size: i32,
    },
    /// The payload must contain all pixels of the matrix
    #[error("JitterMatrix payload of {data_size} bytes is smaller than the {required} bytes required by its geometry")]
    PayloadTooSmall {
        /// The size of the payload in bytes
        data_size: usize,
        /// The number of bytes required by the geometry
        required: usize,
    },
    /// A pixel buffer must match the geometry it is used with
    #[error("JitterMatrix pixel buffer of shape {found:?} does not match the expected shape {expected:?}")]
    BufferShape {
        /// The expected `[dim_y, dim_x, plane_count]` shape
        expected: [usize; 3],
        /// The actual shape of the buffer
        found: [usize; 3],
    },
    /// A pixel buffer's data must match its shape
    #[error("JitterMatrix pixel buffer requires {expected} values but received {found}")]
    BufferLength {
        /// The number of values required by the shape
        expected: usize,
        /// The number of values provided
        found: usize,
    },
    /// The matrix is too large to be represented
    #[error("JitterMatrix geometry exceeds the representable matrix size")]
    TooLarge,
}
