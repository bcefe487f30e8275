//! Decoder for the encoded polyline format used by routing providers.
//!
//! Each coordinate is stored as the zig-zag encoded delta from the previous
//! point, scaled by 1e5 and split into 5-bit groups. A group is written as
//! `chunk + 63`, where bit `0x20` of the chunk flags that another group of
//! the same value follows.

use thiserror::Error;

use crate::geo::GeoPoint;

const SCALE: f64 = 1e5;
const CHAR_OFFSET: u8 = 63;
const CONTINUATION_BIT: i64 = 0x20;
const PAYLOAD_MASK: i64 = 0x1f;
// Seven groups carry 35 bits, far beyond any coordinate at 1e-5 precision.
const MAX_SHIFT: u32 = 35;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    #[error("polyline truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("invalid polyline character {byte:#04x} at byte {offset}")]
    InvalidCharacter { offset: usize, byte: u8 },

    #[error("polyline value starting at byte {offset} overflows")]
    Overflow { offset: usize },
}

/// Decodes `encoded` into points, failing on the first malformed value.
pub fn decode(encoded: &str) -> Result<Vec<GeoPoint>, PolylineError> {
    match decode_partial(encoded) {
        (points, None) => Ok(points),
        (_, Some(err)) => Err(err),
    }
}

/// Decodes as many complete points as possible.
///
/// Returns the points decoded before the first fault together with that
/// fault. A point whose longitude never arrived is dropped.
pub fn decode_partial(encoded: &str) -> (Vec<GeoPoint>, Option<PolylineError>) {
    let mut points = Vec::new();

    for item in Decoder::new(encoded) {
        match item {
            Ok(point) => points.push(point),
            Err(err) => return (points, Some(err)),
        }
    }

    (points, None)
}

struct Decoder<'a> {
    bytes: &'a [u8],
    index: usize,
    lat: i64,
    lng: i64,
    failed: bool,
}

impl<'a> Decoder<'a> {
    fn new(encoded: &'a str) -> Self {
        Self {
            bytes: encoded.as_bytes(),
            index: 0,
            lat: 0,
            lng: 0,
            failed: false,
        }
    }

    fn next_value(&mut self) -> Result<i64, PolylineError> {
        let start = self.index;
        let mut result: i64 = 0;
        let mut shift: u32 = 0;

        loop {
            let Some(&byte) = self.bytes.get(self.index) else {
                return Err(PolylineError::Truncated { offset: self.index });
            };

            if !(CHAR_OFFSET..=b'~').contains(&byte) {
                return Err(PolylineError::InvalidCharacter {
                    offset: self.index,
                    byte,
                });
            }

            if shift >= MAX_SHIFT {
                return Err(PolylineError::Overflow { offset: start });
            }

            let chunk = i64::from(byte - CHAR_OFFSET);
            result |= (chunk & PAYLOAD_MASK) << shift;
            shift += 5;
            self.index += 1;

            if chunk & CONTINUATION_BIT == 0 {
                break;
            }
        }

        Ok(if result & 1 == 1 {
            !(result >> 1)
        } else {
            result >> 1
        })
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<GeoPoint, PolylineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.bytes.len() {
            return None;
        }

        let step = self
            .next_value()
            .and_then(|dlat| self.next_value().map(|dlng| (dlat, dlng)));

        match step {
            Ok((dlat, dlng)) => {
                self.lat += dlat;
                self.lng += dlng;
                Some(Ok(GeoPoint {
                    lat: self.lat as f64 / SCALE,
                    lng: self.lng as f64 / SCALE,
                }))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, decode_partial, PolylineError};
    use crate::geo::GeoPoint;

    const CANONICAL: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn assert_close(actual: &GeoPoint, lat: f64, lng: f64) {
        assert!((actual.lat - lat).abs() < 1e-6, "lat {} != {lat}", actual.lat);
        assert!((actual.lng - lng).abs() < 1e-6, "lng {} != {lng}", actual.lng);
    }

    #[test]
    fn decodes_canonical_example() {
        let points = decode(CANONICAL).unwrap();

        assert_eq!(points.len(), 3);
        assert_close(&points[0], 38.5, -120.2);
        assert_close(&points[1], 40.7, -120.95);
        assert_close(&points[2], 43.252, -126.453);
    }

    #[test]
    fn empty_input_yields_no_points() {
        assert!(decode("").unwrap().is_empty());
        assert_eq!(decode_partial(""), (Vec::new(), None));
    }

    #[test]
    fn decoding_is_repeatable() {
        assert_eq!(decode(CANONICAL).unwrap(), decode(CANONICAL).unwrap());
    }

    #[test]
    fn stream_cut_mid_group_is_truncated() {
        // Drop the final byte so the last longitude never terminates.
        let cut = &CANONICAL[..CANONICAL.len() - 1];

        assert_eq!(
            decode(cut),
            Err(PolylineError::Truncated { offset: cut.len() })
        );

        let (points, err) = decode_partial(cut);
        assert_eq!(points.len(), 2);
        assert_close(&points[1], 40.7, -120.95);
        assert!(matches!(err, Some(PolylineError::Truncated { .. })));
    }

    #[test]
    fn point_missing_its_longitude_is_dropped() {
        // "_p~iF" is a complete latitude with no longitude after it.
        let (points, err) = decode_partial("_p~iF");

        assert!(points.is_empty());
        assert_eq!(err, Some(PolylineError::Truncated { offset: 5 }));
    }

    #[test]
    fn rejects_characters_outside_the_alphabet() {
        let (points, err) = decode_partial("_p~iF~ps|U _ulLnnqC");

        assert_eq!(points.len(), 1);
        assert_eq!(
            err,
            Some(PolylineError::InvalidCharacter {
                offset: 10,
                byte: b' '
            })
        );
    }

    #[test]
    fn endless_continuation_overflows_instead_of_spinning() {
        let encoded = "~".repeat(64);

        assert_eq!(decode(&encoded), Err(PolylineError::Overflow { offset: 0 }));
    }

    #[test]
    fn single_zero_point() {
        let points = decode("??").unwrap();

        assert_eq!(points, vec![GeoPoint { lat: 0.0, lng: 0.0 }]);
    }
}
