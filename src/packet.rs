//! Encoded media packets.
//!
//! A packet is a lifecycle-managed buffer holding one unit of encoded data
//! plus its timing metadata. The payload is a [`bytes::Bytes`] handle, so
//! sharing a packet (`try_clone`) is a cheap reference-count bump over
//! immutable bytes. `Ready` is entered by sized allocation, by wrapping
//! caller data, or by adopting output produced by an encoder or demuxer.

use bytes::Bytes;

use crate::error::MediaResult;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::rational::Rational;

/// Timing and stream metadata, held by the packet shell
#[derive(Debug, Clone)]
struct PacketMeta {
    pts: Option<i64>,
    dts: Option<i64>,
    duration: Option<i64>,
    time_base: Rational,
    stream_index: usize,
    key: bool,
}

impl PacketMeta {
    fn empty() -> Self {
        Self {
            pts: None,
            dts: None,
            duration: None,
            time_base: Rational::new(1, 1_000_000),
            stream_index: 0,
            key: false,
        }
    }
}

/// One unit of encoded media with lifecycle-managed storage
#[derive(Debug)]
pub struct Packet {
    lifecycle: Lifecycle,
    meta: Option<PacketMeta>,
    data: Option<Bytes>,
}

impl Packet {
    /// Allocate an empty packet shell (`Created`, no payload)
    pub fn new() -> MediaResult<Self> {
        let mut pkt = Self::empty();
        let meta = pkt.lifecycle.allocate_shell(|| Ok(PacketMeta::empty()))?;
        pkt.meta = Some(meta);
        Ok(pkt)
    }

    /// A placeholder with no backing memory (`Destroyed`)
    pub fn empty() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            meta: None,
            data: None,
        }
    }

    /// Allocate a packet with a zeroed payload of `size` bytes (`Ready`)
    pub fn alloc(size: usize) -> MediaResult<Self> {
        let mut pkt = Self::new()?;
        pkt.adopt_payload(Bytes::from(vec![0u8; size]))?;
        Ok(pkt)
    }

    /// Create a `Ready` packet owning a copy of the given bytes
    pub fn from_slice(data: &[u8]) -> MediaResult<Self> {
        let mut pkt = Self::new()?;
        pkt.adopt_payload(Bytes::copy_from_slice(data))?;
        Ok(pkt)
    }

    /// Enter `Ready` by taking ownership of an already-produced payload
    pub fn adopt_payload(&mut self, payload: Bytes) -> MediaResult<()> {
        self.lifecycle.allocate_resource(|| Ok(()))?;
        self.data = Some(payload);
        Ok(())
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Check if a payload is attached
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Payload bytes, if `Ready`
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Payload size in bytes (0 when not `Ready`)
    pub fn size(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }

    /// Check if the packet carries no payload bytes
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Presentation timestamp in `time_base` units
    pub fn pts(&self) -> Option<i64> {
        self.meta.as_ref().and_then(|m| m.pts)
    }

    /// Set the presentation timestamp
    pub fn set_pts(&mut self, pts: Option<i64>) {
        if let Some(meta) = self.meta.as_mut() {
            meta.pts = pts;
        }
    }

    /// Decode timestamp in `time_base` units
    pub fn dts(&self) -> Option<i64> {
        self.meta.as_ref().and_then(|m| m.dts)
    }

    /// Set the decode timestamp
    pub fn set_dts(&mut self, dts: Option<i64>) {
        if let Some(meta) = self.meta.as_mut() {
            meta.dts = dts;
        }
    }

    /// Duration in `time_base` units
    pub fn duration(&self) -> Option<i64> {
        self.meta.as_ref().and_then(|m| m.duration)
    }

    /// Set the duration
    pub fn set_duration(&mut self, duration: Option<i64>) {
        if let Some(meta) = self.meta.as_mut() {
            meta.duration = duration;
        }
    }

    /// Time base of pts, dts and duration
    pub fn time_base(&self) -> Rational {
        self.meta
            .as_ref()
            .map_or(Rational::new(1, 1_000_000), |m| m.time_base)
    }

    /// Set the time base
    pub fn set_time_base(&mut self, time_base: Rational) {
        if let Some(meta) = self.meta.as_mut() {
            meta.time_base = time_base;
        }
    }

    /// Rescale pts, dts and duration to another time base
    pub fn rescale_ts(&mut self, to: Rational) {
        if let Some(meta) = self.meta.as_mut() {
            let from = meta.time_base;
            meta.pts = meta.pts.map(|v| from.rescale(v, to));
            meta.dts = meta.dts.map(|v| from.rescale(v, to));
            meta.duration = meta.duration.map(|v| from.rescale(v, to));
            meta.time_base = to;
        }
    }

    /// Index of the container stream this packet belongs to
    pub fn stream_index(&self) -> usize {
        self.meta.as_ref().map_or(0, |m| m.stream_index)
    }

    /// Set the container stream index
    pub fn set_stream_index(&mut self, index: usize) {
        if let Some(meta) = self.meta.as_mut() {
            meta.stream_index = index;
        }
    }

    /// Check if this packet starts a keyframe
    pub fn is_key(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.key)
    }

    /// Mark this packet as a keyframe
    pub fn set_key(&mut self, key: bool) {
        if let Some(meta) = self.meta.as_mut() {
            meta.key = key;
        }
    }

    /// Duplicate this packet (`Ready`)
    ///
    /// The payload is immutable, so the copy references the same bytes
    /// instead of duplicating them; the two packets are indistinguishable
    /// from deep copies. Metadata is copied by value and stays independent.
    pub fn try_clone(&self) -> MediaResult<Packet> {
        self.lifecycle
            .require(LifecycleState::Ready, "try_clone: packet not Ready")?;
        let meta = self.meta.as_ref().expect("Ready implies shell");
        let mut out = Packet::empty();
        let cloned = out.lifecycle.allocate_shell(|| Ok(meta.clone()))?;
        out.meta = Some(cloned);
        out.adopt_payload(self.data.clone().expect("Ready implies payload"))?;
        Ok(out)
    }

    /// Release the payload, keeping the shell (`Ready → Created`)
    pub fn unref(&mut self) -> MediaResult<()> {
        self.lifecycle.release_resource(|| Ok(()))?;
        self.data = None;
        if let Some(meta) = self.meta.as_mut() {
            *meta = PacketMeta::empty();
        }
        Ok(())
    }

    /// Move this packet out, leaving `self` `Destroyed`
    pub fn take(&mut self) -> Packet {
        Packet {
            lifecycle: self.lifecycle.take(),
            meta: self.meta.take(),
            data: self.data.take(),
        }
    }

    /// Tear down from any state. Idempotent.
    pub fn destroy(&mut self) {
        let data = &mut self.data;
        let meta = &mut self.meta;
        self.lifecycle.destroy(|| *data = None, || *meta = None);
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_sized() {
        let pkt = Packet::alloc(16).unwrap();
        assert_eq!(pkt.state(), LifecycleState::Ready);
        assert_eq!(pkt.size(), 16);
        assert!(pkt.data().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shell_only_then_adopt() {
        let mut pkt = Packet::new().unwrap();
        assert_eq!(pkt.state(), LifecycleState::Created);
        assert!(pkt.data().is_none());
        pkt.adopt_payload(Bytes::from_static(b"abc")).unwrap();
        assert_eq!(pkt.state(), LifecycleState::Ready);
        assert_eq!(pkt.data().unwrap(), b"abc");
        // adopting twice is a lifecycle violation
        assert!(pkt
            .adopt_payload(Bytes::from_static(b"xyz"))
            .unwrap_err()
            .is_precondition());
    }

    #[test]
    fn test_clone_shares_payload() {
        let mut pkt = Packet::from_slice(b"payload").unwrap();
        pkt.set_pts(Some(40));
        let copy = pkt.try_clone().unwrap();
        assert_eq!(copy.data().unwrap(), b"payload");
        assert_eq!(copy.pts(), Some(40));
        // metadata is independent of the original
        pkt.set_pts(Some(80));
        assert_eq!(copy.pts(), Some(40));
    }

    #[test]
    fn test_unref_returns_to_created() {
        let mut pkt = Packet::from_slice(b"x").unwrap();
        pkt.set_pts(Some(7));
        pkt.unref().unwrap();
        assert_eq!(pkt.state(), LifecycleState::Created);
        assert_eq!(pkt.pts(), None);
        assert_eq!(pkt.size(), 0);
    }

    #[test]
    fn test_rescale_ts() {
        let mut pkt = Packet::from_slice(b"x").unwrap();
        pkt.set_time_base(Rational::new(1, 25));
        pkt.set_pts(Some(25));
        pkt.set_dts(Some(24));
        pkt.set_duration(Some(1));
        pkt.rescale_ts(Rational::new(1, 1000));
        assert_eq!(pkt.pts(), Some(1000));
        assert_eq!(pkt.dts(), Some(960));
        assert_eq!(pkt.duration(), Some(40));
    }

    #[test]
    fn test_take_leaves_source_destroyed() {
        let mut pkt = Packet::from_slice(b"data").unwrap();
        let moved = pkt.take();
        assert_eq!(pkt.state(), LifecycleState::Destroyed);
        assert_eq!(moved.state(), LifecycleState::Ready);
        assert_eq!(moved.size(), 4);
    }
}
