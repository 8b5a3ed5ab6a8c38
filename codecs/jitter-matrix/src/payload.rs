//! Conversion between the strided wire payload and dense pixel buffers.

use crate::{
    geometry::{GeometryError, MatrixGeometry},
    pixel::PixelBuffer,
};

/// De-stripes the wire `payload` of a matrix with the provided `geometry`
/// into a dense [`PixelBuffer`].
///
/// The payload is read as a sequence of plane-groups of
/// [`MatrixGeometry::plane_count`] bytes. Plane-group `j` is a pixel iff
/// `j % block < dim_x`, all others are row filler and skipped. A trailing
/// partial plane-group, and any data after the last row, is ignored.
///
/// # Errors
///
/// Errors with [`GeometryError::PayloadTooSmall`] if the `payload` does not
/// contain all `dim_x * dim_y` pixels.
pub fn destride_payload(
    payload: &[u8],
    geometry: &MatrixGeometry,
) -> Result<PixelBuffer, GeometryError> {
    let required = geometry.required_payload_len();
    if payload.len() < required {
        return Err(GeometryError::PayloadTooSmall {
            data_size: payload.len(),
            required,
        });
    }

    if payload.len() > required {
        log::debug!(
            "JitterMatrix payload has {} bytes after the last pixel",
            payload.len() - required
        );
    }

    let mut dense = Vec::with_capacity(geometry.dense_len());

    if geometry.is_padded() {
        let (dim_x, block) = (geometry.dim_x(), geometry.block());

        for group in payload
            .chunks_exact(geometry.plane_count())
            .enumerate()
            .filter_map(|(j, group)| (j % block < dim_x).then_some(group))
            .take(geometry.pixel_count())
        {
            dense.extend_from_slice(group);
        }
    } else {
        dense.extend_from_slice(payload.get(..geometry.dense_len()).unwrap_or_default());
    }

    PixelBuffer::from_shape_vec(
        geometry.dim_x(),
        geometry.dim_y(),
        geometry.plane_count(),
        dense,
    )
}

/// Writes the `pixels` as an unpadded wire payload.
///
/// Each pixel's `plane_count` samples are written contiguously, in row-major
/// order, without any row filler.
///
/// # Errors
///
/// Errors with [`GeometryError::BufferShape`] if the shape of `pixels` does
/// not match `dim_x`, `dim_y` and `plane_count`.
pub fn restride_payload(
    pixels: &PixelBuffer,
    dim_x: usize,
    dim_y: usize,
    plane_count: usize,
) -> Result<Vec<u8>, GeometryError> {
    let expected = [dim_y, dim_x, plane_count];
    if pixels.shape() != expected {
        return Err(GeometryError::BufferShape {
            expected,
            found: pixels.shape(),
        });
    }

    // iterate over the samples in standard order
    Ok(pixels.as_array().iter().copied().collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn no_padding_is_identity_reshape() {
        let geometry = MatrixGeometry::new(3, 2, 4).unwrap();
        let payload = (0..24).collect::<Vec<u8>>();

        let pixels = destride_payload(&payload, &geometry).unwrap();

        assert_eq!(pixels.shape(), [2, 3, 4]);
        assert_eq!(pixels.samples(), payload.as_slice());
    }

    #[test]
    fn padding_is_skipped() {
        let geometry = MatrixGeometry::with_row_stride(3, 4, 1, 4).unwrap();
        let payload = b"ABCXABCXABCXABCX";

        let pixels = destride_payload(payload, &geometry).unwrap();

        assert_eq!(pixels.shape(), [4, 3, 1]);
        assert_eq!(pixels.samples(), b"ABCABCABCABC");
    }

    #[test]
    fn padding_of_multi_plane_groups() {
        // two 2-plane pixels per row, padded to four plane-groups
        let geometry = MatrixGeometry::with_row_stride(2, 2, 2, 4).unwrap();
        let payload = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];

        let pixels = destride_payload(&payload, &geometry).unwrap();

        assert_eq!(pixels.samples(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(pixels.pixel(1, 1).unwrap().to_vec(), vec![7, 8]);
    }

    #[test]
    fn last_row_filler_is_optional() {
        let geometry = MatrixGeometry::with_row_stride(3, 2, 1, 4).unwrap();

        let pixels = destride_payload(b"ABCXDEF", &geometry).unwrap();
        assert_eq!(pixels.samples(), b"ABCDEF");

        let pixels = destride_payload(b"ABCXDEFXGH", &geometry).unwrap();
        assert_eq!(pixels.samples(), b"ABCDEF");
    }

    #[test]
    fn trailing_partial_group_is_ignored() {
        let geometry = MatrixGeometry::new(2, 1, 3).unwrap();

        let pixels = destride_payload(&[1, 2, 3, 4, 5, 6, 7, 8], &geometry).unwrap();
        assert_eq!(pixels.samples(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn payload_too_small() {
        let geometry = MatrixGeometry::with_row_stride(3, 2, 1, 4).unwrap();

        assert!(matches!(
            destride_payload(b"ABCXDE", &geometry),
            Err(GeometryError::PayloadTooSmall {
                data_size: 6,
                required: 7
            })
        ));
        assert!(matches!(
            destride_payload(&[], &geometry),
            Err(GeometryError::PayloadTooSmall {
                data_size: 0,
                required: 7
            })
        ));
    }

    #[test]
    fn restride_is_unpadded_row_major() {
        let pixels = PixelBuffer::from_shape_vec(2, 3, 2, (0..12).collect()).unwrap();

        let payload = restride_payload(&pixels, 2, 3, 2).unwrap();
        assert_eq!(payload, (0..12).collect::<Vec<u8>>());

        let geometry = MatrixGeometry::new(2, 3, 2).unwrap();
        assert_eq!(destride_payload(&payload, &geometry).unwrap(), pixels);
    }

    #[test]
    fn restride_checks_shape() {
        let pixels = PixelBuffer::zeros(2, 3, 4);

        assert!(matches!(
            restride_payload(&pixels, 3, 2, 4),
            Err(GeometryError::BufferShape {
                expected: [2, 3, 4],
                found: [3, 2, 4]
            })
        ));
    }
}
