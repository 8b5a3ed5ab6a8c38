//! Dense pixel storage and the float channel view of ARGB matrices.

use ndarray::{Array3, ArrayView1, ArrayView3, s};

use crate::geometry::GeometryError;

/// Number of planes in an ARGB matrix
pub const ARGB_PLANES: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Dense, unpadded buffer of `dim_x * dim_y` pixels, each holding
/// `plane_count` 8-bit samples.
///
/// The samples are stored in row-major order with the shape
/// `[dim_y, dim_x, plane_count]`.
pub struct PixelBuffer {
    data: Array3<u8>,
}

impl PixelBuffer {
    /// Creates a buffer of zero-valued pixels.
    #[must_use]
    pub fn zeros(dim_x: usize, dim_y: usize, plane_count: usize) -> Self {
        Self {
            data: Array3::zeros((dim_y, dim_x, plane_count)),
        }
    }

    /// Wraps an array of shape `[dim_y, dim_x, plane_count]`.
    #[must_use]
    pub fn from_array(data: Array3<u8>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        Self { data }
    }

    /// Creates a buffer from row-major `data` with `plane_count` samples per
    /// pixel.
    ///
    /// # Errors
    ///
    /// Errors with [`GeometryError::BufferLength`] if the length of `data`
    /// does not match the shape.
    pub fn from_shape_vec(
        dim_x: usize,
        dim_y: usize,
        plane_count: usize,
        data: Vec<u8>,
    ) -> Result<Self, GeometryError> {
        let found = data.len();
        let expected = dim_x
            .checked_mul(dim_y)
            .and_then(|pixels| pixels.checked_mul(plane_count))
            .ok_or(GeometryError::TooLarge)?;

        if found != expected {
            return Err(GeometryError::BufferLength { expected, found });
        }

        let data = Array3::from_shape_vec((dim_y, dim_x, plane_count), data)
            .map_err(|_| GeometryError::BufferLength { expected, found })?;

        Ok(Self { data })
    }

    /// Creates a four-plane ARGB buffer from row-major `colors`.
    ///
    /// Each channel is scaled from `[0, 1]` to a byte by rounding `v * 255`
    /// and clamping to `[0, 255]`.
    ///
    /// # Errors
    ///
    /// Errors with [`GeometryError::BufferLength`] if the number of `colors`
    /// does not match `dim_x * dim_y`.
    pub fn from_colors(
        dim_x: usize,
        dim_y: usize,
        colors: &[ArgbColor],
    ) -> Result<Self, GeometryError> {
        let expected = dim_x.checked_mul(dim_y).ok_or(GeometryError::TooLarge)?;
        if colors.len() != expected {
            return Err(GeometryError::BufferLength {
                expected,
                found: colors.len(),
            });
        }

        let data = colors
            .iter()
            .flat_map(|color| color.to_bytes())
            .collect::<Vec<_>>();

        Self::from_shape_vec(dim_x, dim_y, ARGB_PLANES, data)
    }

    /// Number of pixel columns
    #[must_use]
    pub fn dim_x(&self) -> usize {
        self.data.dim().1
    }

    /// Number of pixel rows
    #[must_use]
    pub fn dim_y(&self) -> usize {
        self.data.dim().0
    }

    /// Number of samples per pixel
    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.data.dim().2
    }

    /// The `[dim_y, dim_x, plane_count]` shape of the buffer
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        self.data.dim().into()
    }

    /// The samples as an array of shape `[dim_y, dim_x, plane_count]`
    #[must_use]
    pub fn as_array(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// Converts into an array of shape `[dim_y, dim_x, plane_count]`
    #[must_use]
    pub fn into_array(self) -> Array3<u8> {
        self.data
    }

    /// All samples in row-major order
    #[must_use]
    pub fn samples(&self) -> &[u8] {
        self.data.as_slice().unwrap_or_default()
    }

    /// The samples of the pixel in column `x` and row `y`
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<ArrayView1<'_, u8>> {
        if x >= self.dim_x() || y >= self.dim_y() {
            return None;
        }

        Some(self.data.slice(s![y, x, ..]))
    }

    /// The pixels as row-major ARGB colours, or [`None`] if the buffer does
    /// not have exactly four planes.
    #[must_use]
    pub fn colors(&self) -> Option<Vec<ArgbColor>> {
        if self.plane_count() != ARGB_PLANES {
            return None;
        }

        Some(
            self.samples()
                .chunks_exact(ARGB_PLANES)
                .filter_map(|argb| argb.try_into().ok())
                .map(ArgbColor::from_bytes)
                .collect(),
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
/// ARGB colour with channels in `[0, 1]`
pub struct ArgbColor {
    /// Alpha channel
    pub a: f64,
    /// Red channel
    pub r: f64,
    /// Green channel
    pub g: f64,
    /// Blue channel
    pub b: f64,
}

impl ArgbColor {
    /// Maps the byte samples `[a, r, g, b]` to `[0, 1]` by dividing by 255.
    #[must_use]
    pub fn from_bytes([a, r, g, b]: [u8; 4]) -> Self {
        Self {
            a: byte_to_channel(a),
            r: byte_to_channel(r),
            g: byte_to_channel(g),
            b: byte_to_channel(b),
        }
    }

    /// Maps the channels to the byte samples `[a, r, g, b]` by rounding
    /// `v * 255`, clamped to `[0, 255]`.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 4] {
        [
            channel_to_byte(self.a),
            channel_to_byte(self.r),
            channel_to_byte(self.g),
            channel_to_byte(self.b),
        ]
    }
}

fn byte_to_channel(byte: u8) -> f64 {
    f64::from(byte) / f64::from(u8::MAX)
}

fn channel_to_byte(channel: f64) -> u8 {
    let byte = (channel * f64::from(u8::MAX))
        .round()
        .clamp(0.0, f64::from(u8::MAX));

    // NaN saturates to zero
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        byte as u8
    }
}
