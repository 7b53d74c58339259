//! The `Payload` newtype: a cheap, clonable, refcounted view over bytes
//! moving through a backend.

use bytes::Bytes;

/// An application-level message body.
///
/// Backed by `bytes::Bytes` rather than `Vec<u8>` so a view handed to
/// `on_received` can be sliced out of a frame body or ring record without
/// copying. Owning a `Payload` (e.g. to hand to `send_async`) is a cheap
/// refcount bump; borrowing one for a callback is a plain `&[u8]`, which
/// keeps the "the view is invalid after the callback returns" rule
/// enforced by the borrow checker rather than by convention.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(Bytes);

impl Payload {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slicing_does_not_copy_the_backing_storage() {
        let payload = Payload::from(Bytes::from_static(b"hello world"));
        let view = payload.as_bytes().slice(0..5);
        assert_eq!(view.as_ref(), b"hello");
        // Bytes::slice shares the same backing allocation; this is the
        // zero-copy property the newtype exists to preserve.
        assert_eq!(
            view.as_ptr() as usize - payload.as_slice().as_ptr() as usize,
            0
        );
    }

    #[test]
    fn empty_payload_reports_zero_length() {
        let payload = Payload::default();
        assert!(payload.is_empty());
        assert_eq!(payload.len(), 0);
    }
}
