//! Authentication response reassembly
//!
//! The authentication response is usually longer than one OSDP reply, so the
//! reader splits it and prefixes every piece with a fragment header:
//!
//! ```text
//! ┌──────────────┬──────────┬─────────────────┬───────────────────┐
//! │ Whole length │  Offset  │ Fragment length │ Data              │
//! │  u16 (LE)    │ u16 (LE) │    u16 (LE)     │ Fragment length B │
//! └──────────────┴──────────┴─────────────────┴───────────────────┘
//! ```
//!
//! Pieces are copied into the session's incoming buffer by position. The
//! exchange is complete when a piece ends exactly at the whole length.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{Error, Result};
use crate::session::Session;

/// Fragment header size in bytes
pub const HEADER_SIZE: usize = 6;

/// One piece of a fragmented reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDescriptor {
    pub whole_length: u16,
    pub offset: u16,
    pub fragment_length: u16,
    pub data: Bytes,
}

impl FragmentDescriptor {
    /// Parse a fragment header and its data
    ///
    /// Bytes past `fragment_length` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFragment`] if the header is truncated, the
    /// whole length is zero or the data is shorter than declared.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::MalformedFragment(format!(
                "header needs {} bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        let whole_length = LittleEndian::read_u16(&data[0..2]);
        let offset = LittleEndian::read_u16(&data[2..4]);
        let fragment_length = LittleEndian::read_u16(&data[4..6]);

        if whole_length == 0 {
            return Err(Error::MalformedFragment("whole length is zero".into()));
        }

        let body = &data[HEADER_SIZE..];
        if body.len() < fragment_length as usize {
            return Err(Error::MalformedFragment(format!(
                "declares {} data bytes, {} available",
                fragment_length,
                body.len()
            )));
        }

        Ok(Self {
            whole_length,
            offset,
            fragment_length,
            data: Bytes::copy_from_slice(&body[..fragment_length as usize]),
        })
    }

    /// Encode header and data
    pub fn encode(&self) -> Bytes {
        let mut header = [0u8; HEADER_SIZE];
        LittleEndian::write_u16(&mut header[0..2], self.whole_length);
        LittleEndian::write_u16(&mut header[2..4], self.offset);
        LittleEndian::write_u16(&mut header[4..6], self.fragment_length);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.data.len());
        buf.put_slice(&header);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Split `message` into pieces of at most `max_data` bytes each
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFragment`] if `message` is empty, longer than
    /// `u16::MAX` or `max_data` is zero.
    pub fn split(message: &[u8], max_data: usize) -> Result<Vec<Self>> {
        let whole_length = u16::try_from(message.len())
            .ok()
            .filter(|len| *len > 0)
            .ok_or_else(|| {
                Error::MalformedFragment(format!("cannot fragment {} bytes", message.len()))
            })?;
        if max_data == 0 {
            return Err(Error::MalformedFragment("fragment size is zero".into()));
        }

        Ok(message
            .chunks(max_data)
            .enumerate()
            .map(|(i, chunk)| Self {
                whole_length,
                // Bounded by whole_length, so the casts cannot truncate
                offset: (i * max_data) as u16,
                fragment_length: chunk.len() as u16,
                data: Bytes::copy_from_slice(chunk),
            })
            .collect())
    }

    /// Check if this piece ends at the end of the whole message
    pub fn is_last(&self) -> bool {
        self.offset as usize + self.fragment_length as usize == self.whole_length as usize
    }
}

/// Copy a fragment into the session's incoming buffer
///
/// The buffer is allocated, zero-filled, to `whole_length` on the first
/// fragment of an exchange. Returns `true` once the fragment ending at the
/// whole length has been written.
///
/// # Errors
///
/// - [`Error::MalformedFragment`] if the fragment's whole length differs
///   from the message already in progress
/// - [`Error::FragmentOutOfBounds`] if the fragment would write past the end
///   of the buffer
///
/// The buffer is left untouched on error.
pub fn reassemble(session: &Session, fragment: &FragmentDescriptor) -> Result<bool> {
    let start = fragment.offset as usize;
    let length = fragment.data.len();

    session.with_incoming(|incoming| {
        let buffer = incoming.get_or_insert_with(|| vec![0u8; fragment.whole_length as usize]);

        if buffer.len() != fragment.whole_length as usize {
            return Err(Error::MalformedFragment(format!(
                "whole length {} does not match the {} byte message in progress",
                fragment.whole_length,
                buffer.len()
            )));
        }

        let end = start + length;
        if end > buffer.len() {
            return Err(Error::FragmentOutOfBounds {
                offset: start,
                length,
                capacity: buffer.len(),
            });
        }

        buffer[start..end].copy_from_slice(&fragment.data);
        trace!(
            "{}: fragment {}..{} of {}",
            session.reader(),
            start,
            end,
            buffer.len()
        );

        Ok(end == buffer.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkoc_types::ReaderAddress;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn session() -> Session {
        Session::new(ReaderAddress::new(Uuid::from_u128(9), 0))
    }

    #[test]
    fn test_decode() {
        let fragment = FragmentDescriptor::decode(&[0x86, 0x00, 0x10, 0x00, 0x03, 0x00, 0xAA, 0xBB, 0xCC])
            .unwrap();

        assert_eq!(fragment.whole_length, 0x86);
        assert_eq!(fragment.offset, 0x10);
        assert_eq!(fragment.fragment_length, 3);
        assert_eq!(fragment.data.as_ref(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let fragment =
            FragmentDescriptor::decode(&[0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x02, 0xFF]).unwrap();
        assert_eq!(fragment.data.as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            FragmentDescriptor::decode(&[0x01, 0x00, 0x00]),
            Err(Error::MalformedFragment(_))
        ));
        assert!(matches!(
            FragmentDescriptor::decode(&[0x08, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01]),
            Err(Error::MalformedFragment(_))
        ));
        assert!(matches!(
            FragmentDescriptor::decode(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            Err(Error::MalformedFragment(_))
        ));
    }

    #[test]
    fn test_encode() {
        let fragment = FragmentDescriptor {
            whole_length: 0x0104,
            offset: 0x0080,
            fragment_length: 2,
            data: Bytes::from_static(&[0x5A, 0x41]),
        };
        assert_eq!(
            fragment.encode().as_ref(),
            &[0x04, 0x01, 0x80, 0x00, 0x02, 0x00, 0x5A, 0x41]
        );
        assert_eq!(FragmentDescriptor::decode(&fragment.encode()).unwrap(), fragment);
    }

    #[test]
    fn test_split() {
        let message: Vec<u8> = (0..10).collect();
        let fragments = FragmentDescriptor::split(&message, 4).unwrap();

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[2].offset, 8);
        assert_eq!(fragments[2].fragment_length, 2);
        assert!(fragments[2].is_last());
        assert!(!fragments[0].is_last());

        assert!(FragmentDescriptor::split(&[], 4).is_err());
        assert!(FragmentDescriptor::split(&message, 0).is_err());
        assert!(FragmentDescriptor::split(&vec![0u8; 70_000], 128).is_err());
    }

    #[test]
    fn test_reassemble_in_order() {
        let session = session();
        let message: Vec<u8> = (0..=200).collect();

        let fragments = FragmentDescriptor::split(&message, 64).unwrap();
        let (last, rest) = fragments.split_last().unwrap();
        for fragment in rest {
            assert!(!reassemble(&session, fragment).unwrap());
        }
        assert!(reassemble(&session, last).unwrap());

        assert_eq!(session.take_incoming().unwrap(), message);
    }

    #[test]
    fn test_reassemble_single_fragment() {
        let session = session();
        let fragment = &FragmentDescriptor::split(&[0x01, 0x02, 0x03], 128).unwrap()[0];

        assert!(reassemble(&session, fragment).unwrap());
        assert_eq!(session.take_incoming().unwrap(), vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_reassemble_overwrite() {
        let session = session();
        let first = FragmentDescriptor {
            whole_length: 4,
            offset: 0,
            fragment_length: 2,
            data: Bytes::from_static(&[0x01, 0x01]),
        };
        let repeat = FragmentDescriptor {
            data: Bytes::from_static(&[0x02, 0x02]),
            ..first.clone()
        };
        let tail = FragmentDescriptor {
            offset: 2,
            data: Bytes::from_static(&[0x03, 0x03]),
            ..first.clone()
        };

        reassemble(&session, &first).unwrap();
        reassemble(&session, &repeat).unwrap();
        assert!(reassemble(&session, &tail).unwrap());
        assert_eq!(session.take_incoming().unwrap(), vec![0x02, 0x02, 0x03, 0x03]);
    }

    #[test]
    fn test_reassemble_out_of_bounds() {
        let session = session();
        let first = FragmentDescriptor {
            whole_length: 4,
            offset: 0,
            fragment_length: 2,
            data: Bytes::from_static(&[0x01, 0x02]),
        };
        let overflow = FragmentDescriptor {
            whole_length: 4,
            offset: 3,
            fragment_length: 2,
            data: Bytes::from_static(&[0x03, 0x04]),
        };

        reassemble(&session, &first).unwrap();
        assert_eq!(
            reassemble(&session, &overflow),
            Err(Error::FragmentOutOfBounds {
                offset: 3,
                length: 2,
                capacity: 4
            })
        );
        assert_eq!(session.take_incoming().unwrap(), vec![0x01, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn test_reassemble_whole_length_mismatch() {
        let session = session();
        let first = FragmentDescriptor {
            whole_length: 10,
            offset: 0,
            fragment_length: 2,
            data: Bytes::from_static(&[0x01, 0x02]),
        };
        let shorter = FragmentDescriptor {
            whole_length: 6,
            offset: 4,
            fragment_length: 2,
            data: Bytes::from_static(&[0x05, 0x06]),
        };
        let larger = FragmentDescriptor {
            whole_length: 12,
            offset: 2,
            fragment_length: 2,
            data: Bytes::from_static(&[0x03, 0x04]),
        };

        assert!(!reassemble(&session, &first).unwrap());
        assert!(matches!(
            reassemble(&session, &shorter),
            Err(Error::MalformedFragment(_))
        ));
        assert!(matches!(
            reassemble(&session, &larger),
            Err(Error::MalformedFragment(_))
        ));

        let mut expected = vec![0u8; 10];
        expected[..2].copy_from_slice(&[0x01, 0x02]);
        assert_eq!(session.take_incoming().unwrap(), expected);
    }

    fn shuffled_fragments() -> impl Strategy<Value = (Vec<u8>, usize, Vec<usize>)> {
        (proptest::collection::vec(any::<u8>(), 1..400), 1usize..80).prop_flat_map(
            |(message, size)| {
                let count = message.len().div_ceil(size);
                let order = Just((0..count).collect::<Vec<_>>()).prop_shuffle();
                (Just(message), Just(size), order)
            },
        )
    }

    proptest! {
        #[test]
        fn prop_reassembly_independent_of_arrival_order((message, size, order) in shuffled_fragments()) {
            let session = session();
            let fragments = FragmentDescriptor::split(&message, size).unwrap();

            let mut completions = 0;
            for index in order {
                let complete = reassemble(&session, &fragments[index]).unwrap();
                prop_assert_eq!(complete, index == fragments.len() - 1);
                completions += complete as usize;
            }

            prop_assert_eq!(completions, 1);
            prop_assert_eq!(session.take_incoming().unwrap(), message);
        }
    }
}
