//! Container I/O: multiplexing packets into a store and reading them back.
//!
//! The container artifact is an in-memory [`MediaStore`]: stream
//! descriptors, container metadata and a dts-interleaved packet sequence.
//! [`Muxer`] builds one through the usual lifecycle — describe streams
//! while `Created`, write the header to become `Ready`, then write packets
//! and `finish`. [`Demuxer`] opens a store directly into `Ready` and hands
//! packets back in interleaved order.

use std::collections::VecDeque;

use crate::dict::Dictionary;
use crate::engine::CodecId;
use crate::error::{MediaError, MediaResult};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::packet::Packet;
use crate::properties::{MediaKind, Properties};
use crate::rational::Rational;

/// One stream inside a container
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Position of the stream within the container
    pub index: usize,
    /// Codec the stream's packets are encoded with
    pub codec_id: CodecId,
    /// Format description of the stream
    pub properties: Properties,
    /// Per-stream metadata tags
    pub metadata: Dictionary,
}

/// A finished container: what a muxer writes and a demuxer reads
#[derive(Debug)]
pub struct MediaStore {
    streams: Vec<StreamDescriptor>,
    metadata: Dictionary,
    packets: VecDeque<Packet>,
}

impl MediaStore {
    /// Stream descriptors in index order
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Container-level metadata tags
    pub fn metadata(&self) -> &Dictionary {
        &self.metadata
    }

    /// Number of stored packets
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }
}

/// Interleaving key: the packet's dts (pts as fallback) in microseconds
fn interleave_key(packet: &Packet) -> i64 {
    let ts = packet.dts().or_else(|| packet.pts());
    match ts {
        Some(value) => packet.time_base().rescale(value, Rational::new(1, 1_000_000)),
        None => i64::MIN,
    }
}

/// Writes packets into a [`MediaStore`]
///
/// Shell = stream table and metadata; resource = the open packet sink.
/// Packets are interleaved by dts regardless of submission order.
#[derive(Debug)]
pub struct Muxer {
    lifecycle: Lifecycle,
    streams: Vec<StreamDescriptor>,
    metadata: Dictionary,
    packets: Vec<Packet>,
}

impl Muxer {
    /// Create a muxer with no streams (`Created`)
    pub fn new() -> MediaResult<Self> {
        let mut muxer = Self {
            lifecycle: Lifecycle::new(),
            streams: Vec::new(),
            metadata: Dictionary::new(),
            packets: Vec::new(),
        };
        muxer.lifecycle.allocate_shell(|| Ok(()))?;
        Ok(muxer)
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Set a container-level metadata tag (`Created` only)
    pub fn set_metadata(&mut self, key: &str, value: &str) -> MediaResult<()> {
        self.lifecycle
            .require(LifecycleState::Created, "set_metadata: header written")?;
        self.metadata.set(key, value);
        Ok(())
    }

    /// Declare a stream, returning its index (`Created` only)
    ///
    /// Only the essential subset of `properties` is recorded; carrying the
    /// full set across the container boundary is not meaningful.
    pub fn add_stream(
        &mut self,
        codec_id: CodecId,
        properties: &Properties,
        metadata: Dictionary,
    ) -> MediaResult<usize> {
        self.lifecycle
            .require(LifecycleState::Created, "add_stream: header written")?;
        let index = self.streams.len();
        self.streams.push(StreamDescriptor {
            index,
            codec_id,
            properties: properties.essential(),
            metadata,
        });
        Ok(index)
    }

    /// Number of declared streams
    pub fn streams_declared(&self) -> usize {
        self.streams.len()
    }

    /// Commit the stream table (`Created → Ready`)
    ///
    /// Consumes recognized entries of `options` and returns the rest.
    pub fn write_header(&mut self, options: Dictionary) -> MediaResult<Dictionary> {
        if self.streams.is_empty() {
            return Err(MediaError::InvalidInput("container has no streams".into()));
        }
        self.lifecycle.allocate_resource(|| Ok(()))?;
        log::debug!("muxer: header written, {} stream(s)", self.streams.len());
        // no header options are recognized by the in-memory store
        Ok(options)
    }

    /// Write one packet (`Ready` only)
    ///
    /// The packet is moved in and slotted into dts order.
    pub fn write_packet(&mut self, packet: Packet) -> MediaResult<()> {
        self.lifecycle
            .require(LifecycleState::Ready, "write_packet: header not written")?;
        if !packet.is_ready() {
            return Err(MediaError::InvalidInput("packet has no payload".into()));
        }
        if packet.stream_index() >= self.streams.len() {
            return Err(MediaError::InvalidInput(format!(
                "stream index {} out of range",
                packet.stream_index()
            )));
        }
        let key = interleave_key(&packet);
        // stable: equal keys keep submission order
        let at = self
            .packets
            .partition_point(|queued| interleave_key(queued) <= key);
        self.packets.insert(at, packet);
        Ok(())
    }

    /// Finalize and hand back the store (`Ready → Destroyed`)
    pub fn finish(&mut self) -> MediaResult<MediaStore> {
        self.lifecycle
            .require(LifecycleState::Ready, "finish: header not written")?;
        let store = MediaStore {
            streams: std::mem::take(&mut self.streams),
            metadata: self.metadata.clone(),
            packets: std::mem::take(&mut self.packets).into(),
        };
        self.destroy();
        log::debug!("muxer: finished, {} packet(s)", store.packet_count());
        Ok(store)
    }

    /// Tear down from any state. Idempotent.
    pub fn destroy(&mut self) {
        let packets = &mut self.packets;
        let streams = &mut self.streams;
        self.lifecycle
            .destroy(|| packets.clear(), || streams.clear());
    }
}

impl Drop for Muxer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Reads packets back out of a [`MediaStore`]
#[derive(Debug)]
pub struct Demuxer {
    lifecycle: Lifecycle,
    streams: Vec<StreamDescriptor>,
    metadata: Dictionary,
    packets: VecDeque<Packet>,
}

impl Demuxer {
    /// Open a store for reading (`Ready`)
    pub fn from_store(store: MediaStore) -> MediaResult<Self> {
        let mut demuxer = Self {
            lifecycle: Lifecycle::new(),
            streams: Vec::new(),
            metadata: store.metadata,
            packets: VecDeque::new(),
        };
        let streams = demuxer.lifecycle.allocate_shell(|| Ok(store.streams))?;
        demuxer.streams = streams;
        let packets = demuxer.lifecycle.allocate_resource(|| Ok(store.packets))?;
        demuxer.packets = packets;
        Ok(demuxer)
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Stream descriptors in index order
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Container-level metadata tags
    pub fn metadata(&self) -> &Dictionary {
        &self.metadata
    }

    /// The first stream of the given kind, if any
    pub fn best_stream(&self, kind: MediaKind) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.properties.kind == kind)
    }

    /// Next packet in interleaved order; `None` at end of file
    pub fn read_packet(&mut self) -> MediaResult<Option<Packet>> {
        self.lifecycle
            .require(LifecycleState::Ready, "read_packet: demuxer not Ready")?;
        Ok(self.packets.pop_front())
    }

    /// Tear down from any state. Idempotent.
    pub fn destroy(&mut self) {
        let packets = &mut self.packets;
        let streams = &mut self.streams;
        self.lifecycle
            .destroy(|| packets.clear(), || streams.clear());
    }
}

impl Drop for Demuxer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::PixelFormat;

    fn video_props() -> Properties {
        Properties::video(32, 16, PixelFormat::Gray8, Rational::new(25, 1))
    }

    fn packet(stream: usize, dts: i64) -> Packet {
        let mut pkt = Packet::from_slice(b"payload").unwrap();
        pkt.set_stream_index(stream);
        pkt.set_time_base(Rational::new(1, 25));
        pkt.set_dts(Some(dts));
        pkt.set_pts(Some(dts));
        pkt
    }

    #[test]
    fn test_mux_then_demux() {
        let mut muxer = Muxer::new().unwrap();
        muxer.set_metadata("title", "test reel").unwrap();
        let v = muxer
            .add_stream(CodecId::GrayVideo, &video_props(), Dictionary::new())
            .unwrap();
        assert_eq!(v, 0);
        let rest = muxer.write_header(Dictionary::new()).unwrap();
        assert!(rest.is_empty());
        for dts in 0..3 {
            muxer.write_packet(packet(0, dts)).unwrap();
        }
        let store = muxer.finish().unwrap();
        assert_eq!(muxer.state(), LifecycleState::Destroyed);
        assert_eq!(store.packet_count(), 3);

        let mut demuxer = Demuxer::from_store(store).unwrap();
        assert_eq!(demuxer.metadata().get("title"), Some("test reel"));
        let stream = demuxer.best_stream(MediaKind::Video).unwrap();
        assert_eq!(stream.codec_id, CodecId::GrayVideo);
        assert_eq!(stream.properties.width, 32);
        let mut count = 0;
        while let Some(pkt) = demuxer.read_packet().unwrap() {
            assert_eq!(pkt.dts(), Some(count));
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_packets_interleaved_by_dts() {
        let mut muxer = Muxer::new().unwrap();
        muxer
            .add_stream(CodecId::GrayVideo, &video_props(), Dictionary::new())
            .unwrap();
        muxer
            .add_stream(
                CodecId::PcmS16,
                &Properties::audio(
                    48_000,
                    crate::properties::SampleFormat::S16,
                    crate::layout::ChannelLayout::STEREO,
                ),
                Dictionary::new(),
            )
            .unwrap();
        muxer.write_header(Dictionary::new()).unwrap();
        // video arrives first, audio carries the earlier timestamps
        muxer.write_packet(packet(0, 2)).unwrap();
        muxer.write_packet(packet(0, 4)).unwrap();
        muxer.write_packet(packet(1, 1)).unwrap();
        muxer.write_packet(packet(1, 3)).unwrap();
        let store = muxer.finish().unwrap();

        let mut demuxer = Demuxer::from_store(store).unwrap();
        let mut order = Vec::new();
        while let Some(pkt) = demuxer.read_packet().unwrap() {
            order.push((pkt.stream_index(), pkt.dts().unwrap()));
        }
        assert_eq!(order, vec![(1, 1), (0, 2), (1, 3), (0, 4)]);
    }

    #[test]
    fn test_streams_record_essential_subset_only() {
        let mut props = video_props();
        props.bit_rate = 9_000_000;
        let mut muxer = Muxer::new().unwrap();
        muxer
            .add_stream(CodecId::GrayVideo, &props, Dictionary::new())
            .unwrap();
        assert_eq!(muxer.streams_declared(), 1);
        muxer.write_header(Dictionary::new()).unwrap();
        let store = muxer.finish().unwrap();
        assert_eq!(store.streams()[0].properties.bit_rate, 0);
        assert_eq!(store.streams()[0].properties.width, 32);
    }

    #[test]
    fn test_header_required_before_packets() {
        let mut muxer = Muxer::new().unwrap();
        muxer
            .add_stream(CodecId::GrayVideo, &video_props(), Dictionary::new())
            .unwrap();
        assert!(muxer
            .write_packet(packet(0, 0))
            .unwrap_err()
            .is_precondition());
        muxer.write_header(Dictionary::new()).unwrap();
        // stream table is frozen once the header is out
        assert!(muxer
            .add_stream(CodecId::PcmS16, &video_props(), Dictionary::new())
            .unwrap_err()
            .is_precondition());
    }

    #[test]
    fn test_empty_container_rejected() {
        let mut muxer = Muxer::new().unwrap();
        let err = muxer.write_header(Dictionary::new()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_stream_index_rejected() {
        let mut muxer = Muxer::new().unwrap();
        muxer
            .add_stream(CodecId::GrayVideo, &video_props(), Dictionary::new())
            .unwrap();
        muxer.write_header(Dictionary::new()).unwrap();
        let err = muxer.write_packet(packet(5, 0)).unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
