//! Packets carried over the optical channel.

use serde::{Deserialize, Serialize};

/// An opaque packet: its payload bytes plus the uid the network stamps on
/// it at send time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    uid: u64,
    payload: Vec<u8>,
}

impl Packet {
    /// Wrap a payload; the uid stays 0 until the packet is sent
    pub fn new(payload: Vec<u8>) -> Self {
        Self { uid: 0, payload }
    }

    /// A zero-filled packet of `size` bytes
    pub fn with_size(size: usize) -> Self {
        Self::new(vec![0u8; size])
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub(crate) fn set_uid(&mut self, uid: u64) {
        self.uid = uid;
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Size in bits
    pub fn size_bits(&self) -> u64 {
        self.payload.len() as u64 * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_size() {
        let p = Packet::with_size(1024);
        assert_eq!(p.len(), 1024);
        assert_eq!(p.size_bits(), 8192);
        assert!(p.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_packet_uid_unassigned_until_stamped() {
        let mut a = Packet::new(b"a".to_vec());
        assert_eq!(a.uid(), 0);
        a.set_uid(5);
        assert_eq!(a.clone().uid(), 5);
        assert_eq!(Packet::new(b"a".to_vec()).uid(), 0);
    }
}
