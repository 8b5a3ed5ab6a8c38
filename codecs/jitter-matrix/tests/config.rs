#![expect(missing_docs)]

use ::{log as _, schemars as _, simple_logger as _, thiserror as _};

use ndarray::Array;
use numcodecs::{AnyArray, AnyCowArray, Codec, StaticCodec};
use numcodecs_jitter_matrix::{ByteOrder, HEADER_SIZE, JitterMatrixCodec, decode};
use serde::Deserialize;
use serde_json::json;

#[test]
fn empty_config() {
    let codec = JitterMatrixCodec::from_config(Deserialize::deserialize(json!({})).unwrap());

    assert_eq!(codec.envelope, ByteOrder::native());
    assert!(codec.timestamp == 0.0);
}

#[test]
fn full_config() {
    let codec = JitterMatrixCodec::from_config(
        Deserialize::deserialize(json!({
            "envelope": "big",
            "timestamp": 10_765_666.226_2,
        }))
        .unwrap(),
    );

    assert_eq!(codec.envelope, ByteOrder::Big);
    assert!(codec.timestamp == 10_765_666.226_2);

    let config = serde_json::to_value(codec.get_config()).unwrap();
    assert_eq!(config["envelope"], json!("big"));
    assert_eq!(config["timestamp"], json!(10_765_666.226_2));
}

#[test]
#[should_panic(expected = "unknown variant `middle`")]
fn invalid_envelope() {
    let _ = JitterMatrixCodec::from_config(
        Deserialize::deserialize(json!({
            "envelope": "middle",
        }))
        .unwrap(),
    );
}

#[test]
#[should_panic(expected = "unknown field `planes`")]
fn unknown_field() {
    let _ = JitterMatrixCodec::from_config(
        Deserialize::deserialize(json!({
            "planes": 4,
        }))
        .unwrap(),
    );
}

#[test]
fn configured_envelope_is_written() {
    let codec = JitterMatrixCodec::from_config(
        Deserialize::deserialize(json!({
            "envelope": "little",
            "timestamp": 2.5,
        }))
        .unwrap(),
    );

    let data = Array::<u8, _>::from_shape_fn((2, 2, 4), |(y, x, p)| {
        u8::try_from(y * 8 + x * 4 + p).unwrap()
    });

    let AnyArray::U8(encoded) = codec
        .encode(AnyCowArray::U8(data.view().into_dyn().into()))
        .unwrap()
    else {
        panic!("JitterMatrix must encode into bytes");
    };
    let encoded = encoded.into_raw_vec_and_offset().0;

    assert_eq!(encoded.len(), HEADER_SIZE + 16);
    assert_eq!(encoded.get(4..8), Some(288_i32.to_le_bytes().as_slice()));

    let (header, pixels) = decode(&encoded, ByteOrder::Little).unwrap();
    assert!(header.timestamp == 2.5);
    assert_eq!(pixels.into_array(), data);
}
