//! Built-in passthrough engine.
//!
//! Implements the [`Engine`] contract with uncompressed codecs so the
//! lifecycle and feed/drain layers are exercisable without a native
//! library. Sessions carry a bounded output queue (`queue` option) and an
//! optional encoder lookahead (`delay` option), which makes every flow
//! state of the classified-result contract reachable: a full queue reports
//! `OutputPending`, a delayed encoder reports `NeedsInput` until its
//! lookahead fills, and draining releases everything.

use std::collections::VecDeque;

use bytes::{BufMut, BytesMut};

use crate::dict::Dictionary;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameBuilder};
use crate::layout::ChannelLayout;
use crate::packet::Packet;
use crate::properties::{MediaKind, PixelFormat, Properties, SampleFormat};
use crate::rational::Rational;

use super::{CodecDescriptor, CodecId, DecodeSession, EncodeSession, Engine, EngineStatus, Session};

const VIDEO_MAGIC: &[u8; 4] = b"RAWV";
const AUDIO_MAGIC: &[u8; 4] = b"PCMA";

const DEFAULT_DECODE_QUEUE: usize = 8;
const DEFAULT_ENCODE_QUEUE: usize = 4;

/// Deterministic passthrough engine
#[derive(Debug, Default)]
pub struct SimEngine;

impl SimEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for SimEngine {
    fn descriptor(&self, id: CodecId) -> Option<CodecDescriptor> {
        let desc = match id {
            CodecId::RawVideo => CodecDescriptor {
                id,
                kind: MediaKind::Video,
                pixel_formats: Some(vec![
                    PixelFormat::Yuv420p,
                    PixelFormat::Yuv422p,
                    PixelFormat::Yuv444p,
                    PixelFormat::Nv12,
                    PixelFormat::Rgba,
                    PixelFormat::Gray8,
                ]),
                // rawvideo takes any rate; the list is simply not published
                frame_rates: None,
                sample_formats: None,
                sample_rates: None,
                channel_layouts: None,
            },
            CodecId::GrayVideo => CodecDescriptor {
                id,
                kind: MediaKind::Video,
                pixel_formats: Some(vec![PixelFormat::Gray8]),
                frame_rates: Some(vec![Rational::new(25, 1), Rational::new(30, 1)]),
                sample_formats: None,
                sample_rates: None,
                channel_layouts: None,
            },
            CodecId::PcmS16 => CodecDescriptor {
                id,
                kind: MediaKind::Audio,
                pixel_formats: None,
                frame_rates: None,
                sample_formats: Some(vec![SampleFormat::S16]),
                sample_rates: Some(vec![8_000, 16_000, 32_000, 44_100, 48_000]),
                channel_layouts: Some(vec![
                    ChannelLayout::MONO,
                    ChannelLayout::STEREO,
                    ChannelLayout::SURROUND_5_1,
                ]),
            },
        };
        Some(desc)
    }

    fn descriptor_by_name(&self, name: &str) -> Option<CodecDescriptor> {
        let id = match name {
            "rawvideo" => CodecId::RawVideo,
            "grayvideo" => CodecId::GrayVideo,
            "pcm_s16le" => CodecId::PcmS16,
            _ => return None,
        };
        self.descriptor(id)
    }

    fn open_decoder(
        &self,
        desc: &CodecDescriptor,
        props: &Properties,
        mut options: Dictionary,
    ) -> MediaResult<(Box<dyn DecodeSession>, Dictionary)> {
        validate_props(desc, props)?;
        let capacity = take_usize(&mut options, "queue")?.unwrap_or(DEFAULT_DECODE_QUEUE);
        let session: Box<dyn DecodeSession> = match desc.kind {
            MediaKind::Video => Box::new(SimVideoDecode {
                props: props.clone(),
                pipe: Pipe::new(0, capacity),
            }),
            MediaKind::Audio => Box::new(SimAudioDecode {
                props: props.clone(),
                pipe: Pipe::new(0, capacity),
            }),
            MediaKind::Subtitle => {
                return Err(MediaError::InvalidInput("no subtitle codecs".into()))
            }
        };
        Ok((session, options))
    }

    fn open_encoder(
        &self,
        desc: &CodecDescriptor,
        props: &Properties,
        mut options: Dictionary,
    ) -> MediaResult<(Box<dyn EncodeSession>, Dictionary)> {
        validate_props(desc, props)?;
        let capacity = take_usize(&mut options, "queue")?.unwrap_or(DEFAULT_ENCODE_QUEUE);
        let delay = take_usize(&mut options, "delay")?.unwrap_or(0);
        let session: Box<dyn EncodeSession> = match desc.kind {
            MediaKind::Video => Box::new(SimVideoEncode {
                props: props.clone(),
                pipe: Pipe::new(delay, capacity),
            }),
            MediaKind::Audio => Box::new(SimAudioEncode {
                props: props.clone(),
                pipe: Pipe::new(delay, capacity),
            }),
            MediaKind::Subtitle => {
                return Err(MediaError::InvalidInput("no subtitle codecs".into()))
            }
        };
        Ok((session, options))
    }
}

/// Check staged properties against a codec's published capabilities
fn validate_props(desc: &CodecDescriptor, props: &Properties) -> MediaResult<()> {
    if props.kind != desc.kind {
        return Err(MediaError::InvalidInput(format!(
            "{} is a {:?} codec, properties describe {:?}",
            desc.name(),
            desc.kind,
            props.kind
        )));
    }
    match desc.kind {
        MediaKind::Video => {
            if props.width == 0 || props.height == 0 {
                return Err(MediaError::InvalidInput("video dimensions unset".into()));
            }
            let fmt = props
                .pixel_format
                .ok_or_else(|| MediaError::InvalidInput("pixel format unset".into()))?;
            if let Some(formats) = &desc.pixel_formats {
                if !formats.contains(&fmt) {
                    return Err(MediaError::InvalidInput(format!(
                        "{} does not support {fmt:?}",
                        desc.name()
                    )));
                }
            }
        }
        MediaKind::Audio => {
            if props.sample_rate == 0 {
                return Err(MediaError::InvalidInput("sample rate unset".into()));
            }
            let fmt = props
                .sample_format
                .ok_or_else(|| MediaError::InvalidInput("sample format unset".into()))?;
            if let Some(formats) = &desc.sample_formats {
                if !formats.contains(&fmt) {
                    return Err(MediaError::InvalidInput(format!(
                        "{} does not support {fmt:?}",
                        desc.name()
                    )));
                }
            }
            if props.channel_layout.is_none() {
                return Err(MediaError::InvalidInput("channel layout unset".into()));
            }
        }
        MediaKind::Subtitle => {}
    }
    Ok(())
}

fn take_usize(options: &mut Dictionary, key: &str) -> MediaResult<Option<usize>> {
    match options.remove(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| MediaError::InvalidInput(format!("option {key}={raw} is not a count"))),
    }
}

/// Bounded output queue with optional lookahead
///
/// `reorder` holds the most recent `delay` outputs back, emulating encoder
/// lookahead; `begin_drain` releases them.
#[derive(Debug)]
struct Pipe<T> {
    ready: VecDeque<T>,
    reorder: VecDeque<T>,
    delay: usize,
    capacity: usize,
    draining: bool,
}

impl<T> Pipe<T> {
    fn new(delay: usize, capacity: usize) -> Self {
        Self {
            ready: VecDeque::new(),
            reorder: VecDeque::new(),
            delay,
            capacity: capacity.max(1),
            draining: false,
        }
    }

    fn can_accept(&self) -> bool {
        !self.draining && self.ready.len() < self.capacity
    }

    fn push(&mut self, item: T) {
        self.reorder.push_back(item);
        while self.reorder.len() > self.delay {
            if let Some(out) = self.reorder.pop_front() {
                self.ready.push_back(out);
            }
        }
    }

    fn pop(&mut self) -> (EngineStatus, Option<T>) {
        if let Some(item) = self.ready.pop_front() {
            (EngineStatus::Done, Some(item))
        } else if self.draining {
            (EngineStatus::EndOfStream, None)
        } else {
            (EngineStatus::NeedsInput, None)
        }
    }

    fn begin_drain(&mut self) {
        self.draining = true;
        self.ready.extend(self.reorder.drain(..));
    }

    fn reset(&mut self) {
        self.ready.clear();
        self.reorder.clear();
        self.draining = false;
    }
}

// ============================================================================
// Video passthrough
// ============================================================================

fn pixel_format_code(fmt: PixelFormat) -> u8 {
    match fmt {
        PixelFormat::Yuv420p => 0,
        PixelFormat::Yuv422p => 1,
        PixelFormat::Yuv444p => 2,
        PixelFormat::Nv12 => 3,
        PixelFormat::Rgba => 4,
        PixelFormat::Gray8 => 5,
    }
}

fn pixel_format_from_code(code: u8) -> Option<PixelFormat> {
    Some(match code {
        0 => PixelFormat::Yuv420p,
        1 => PixelFormat::Yuv422p,
        2 => PixelFormat::Yuv444p,
        3 => PixelFormat::Nv12,
        4 => PixelFormat::Rgba,
        5 => PixelFormat::Gray8,
        _ => return None,
    })
}

fn encode_video_frame(frame: &Frame) -> MediaResult<Packet> {
    let data = frame
        .data()
        .ok_or_else(|| MediaError::InvalidInput("frame has no storage".into()))?;
    let fmt = frame
        .pixel_format()
        .ok_or_else(|| MediaError::InvalidInput("frame has no pixel format".into()))?;

    let mut buf = BytesMut::with_capacity(13 + frame.byte_size());
    buf.put_slice(VIDEO_MAGIC);
    buf.put_u32_le(frame.width());
    buf.put_u32_le(frame.height());
    buf.put_u8(pixel_format_code(fmt));
    for plane in 0..data.plane_count() {
        let rows = data.plane(plane).map_or(0, |p| p.rows());
        for row in 0..rows {
            buf.put_slice(data.row(plane, row).unwrap_or(&[]));
        }
    }

    let mut pkt = Packet::new()?;
    pkt.adopt_payload(buf.freeze())?;
    pkt.set_time_base(frame.time_base());
    pkt.set_pts(frame.pts());
    pkt.set_dts(frame.pts());
    pkt.set_duration(frame.duration());
    pkt.set_key(true); // every uncompressed frame stands alone
    Ok(pkt)
}

fn decode_video_packet(packet: &Packet) -> MediaResult<Frame> {
    let data = packet
        .data()
        .ok_or_else(|| MediaError::InvalidInput("packet has no payload".into()))?;
    if data.len() < 13 || &data[0..4] != VIDEO_MAGIC {
        return Err(MediaError::InvalidInput("not a rawvideo payload".into()));
    }
    let width = u32::from_le_bytes(data[4..8].try_into().expect("4 bytes"));
    let height = u32::from_le_bytes(data[8..12].try_into().expect("4 bytes"));
    let fmt = pixel_format_from_code(data[12])
        .ok_or_else(|| MediaError::InvalidInput("unknown pixel format code".into()))?;

    let mut builder = FrameBuilder::video(width, height, fmt)?;
    let mut cursor = 13usize;
    for plane in 0..fmt.plane_count() {
        let row_bytes = fmt.row_bytes(plane, width);
        for row in 0..fmt.plane_rows(plane, height) {
            let src = data
                .get(cursor..cursor + row_bytes)
                .ok_or_else(|| MediaError::InvalidInput("truncated rawvideo payload".into()))?;
            builder
                .row_mut(plane, row)
                .expect("row within planned geometry")
                .copy_from_slice(src);
            cursor += row_bytes;
        }
    }

    let mut frame = Frame::new(MediaKind::Video)?;
    frame.adopt_storage_video(width, height, fmt, builder.publish())?;
    frame.set_time_base(packet.time_base());
    frame.set_pts(packet.pts());
    frame.set_duration(packet.duration());
    Ok(frame)
}

struct SimVideoDecode {
    props: Properties,
    pipe: Pipe<Frame>,
}

impl Session for SimVideoDecode {
    fn begin_drain(&mut self) -> MediaResult<()> {
        self.pipe.begin_drain();
        Ok(())
    }

    fn reset(&mut self) {
        self.pipe.reset();
    }
}

impl DecodeSession for SimVideoDecode {
    fn submit(&mut self, packet: &Packet) -> MediaResult<EngineStatus> {
        if !self.pipe.can_accept() {
            return Ok(EngineStatus::OutputPending);
        }
        let mut frame = decode_video_packet(packet)?;
        if frame.time_base() == Rational::new(1, 1_000_000) && !self.props.time_base.is_zero() {
            frame.set_time_base(self.props.time_base);
        }
        self.pipe.push(frame);
        Ok(EngineStatus::Done)
    }

    fn retrieve(&mut self) -> MediaResult<(EngineStatus, Option<Frame>)> {
        Ok(self.pipe.pop())
    }
}

struct SimVideoEncode {
    props: Properties,
    pipe: Pipe<Packet>,
}

impl EncodeSession for SimVideoEncode {
    fn submit(&mut self, frame: &Frame) -> MediaResult<EngineStatus> {
        if !self.pipe.can_accept() {
            return Ok(EngineStatus::OutputPending);
        }
        if frame.pixel_format() != self.props.pixel_format
            || frame.width() != self.props.width
            || frame.height() != self.props.height
        {
            return Err(MediaError::InvalidInput(format!(
                "frame {}x{} {:?} does not match configured {}x{} {:?}",
                frame.width(),
                frame.height(),
                frame.pixel_format(),
                self.props.width,
                self.props.height,
                self.props.pixel_format
            )));
        }
        self.pipe.push(encode_video_frame(frame)?);
        Ok(EngineStatus::Done)
    }

    fn retrieve(&mut self) -> MediaResult<(EngineStatus, Option<Packet>)> {
        Ok(self.pipe.pop())
    }
}

impl Session for SimVideoEncode {
    fn begin_drain(&mut self) -> MediaResult<()> {
        self.pipe.begin_drain();
        Ok(())
    }

    fn reset(&mut self) {
        self.pipe.reset();
    }
}

// ============================================================================
// Audio passthrough (interleaved s16)
// ============================================================================

fn encode_audio_frame(frame: &Frame) -> MediaResult<Packet> {
    let data = frame
        .data()
        .ok_or_else(|| MediaError::InvalidInput("frame has no storage".into()))?;
    let channels = frame
        .channel_layout()
        .map(|l| l.channel_count())
        .ok_or_else(|| MediaError::InvalidInput("frame has no channel layout".into()))?;

    let samples = data.row(0, 0).unwrap_or(&[]);
    let mut buf = BytesMut::with_capacity(9 + samples.len());
    buf.put_slice(AUDIO_MAGIC);
    buf.put_u32_le(frame.nb_samples() as u32);
    buf.put_u8(channels as u8);
    buf.put_slice(samples);

    let mut pkt = Packet::new()?;
    pkt.adopt_payload(buf.freeze())?;
    pkt.set_time_base(frame.time_base());
    pkt.set_pts(frame.pts());
    pkt.set_dts(frame.pts());
    pkt.set_duration(Some(frame.nb_samples() as i64));
    pkt.set_key(true);
    Ok(pkt)
}

fn decode_audio_packet(packet: &Packet, props: &Properties) -> MediaResult<Frame> {
    let data = packet
        .data()
        .ok_or_else(|| MediaError::InvalidInput("packet has no payload".into()))?;
    if data.len() < 9 || &data[0..4] != AUDIO_MAGIC {
        return Err(MediaError::InvalidInput("not a pcm payload".into()));
    }
    let nb_samples = u32::from_le_bytes(data[4..8].try_into().expect("4 bytes")) as usize;
    let channels = data[8] as usize;
    let body = &data[9..];
    if body.len() != nb_samples * channels * 2 {
        return Err(MediaError::InvalidInput("truncated pcm payload".into()));
    }
    let layout = ChannelLayout::default_for_count(channels)
        .ok_or_else(|| MediaError::InvalidInput(format!("no layout for {channels} channels")))?;

    let mut builder = FrameBuilder::audio(nb_samples, SampleFormat::S16, &layout)?;
    builder
        .row_mut(0, 0)
        .expect("single interleaved plane")
        .copy_from_slice(body);

    let mut frame = Frame::new(MediaKind::Audio)?;
    frame.adopt_storage_audio(
        nb_samples,
        SampleFormat::S16,
        props.sample_rate,
        layout,
        builder.publish(),
    )?;
    frame.set_time_base(packet.time_base());
    frame.set_pts(packet.pts());
    Ok(frame)
}

struct SimAudioDecode {
    props: Properties,
    pipe: Pipe<Frame>,
}

impl DecodeSession for SimAudioDecode {
    fn submit(&mut self, packet: &Packet) -> MediaResult<EngineStatus> {
        if !self.pipe.can_accept() {
            return Ok(EngineStatus::OutputPending);
        }
        let frame = decode_audio_packet(packet, &self.props)?;
        self.pipe.push(frame);
        Ok(EngineStatus::Done)
    }

    fn retrieve(&mut self) -> MediaResult<(EngineStatus, Option<Frame>)> {
        Ok(self.pipe.pop())
    }
}

impl Session for SimAudioDecode {
    fn begin_drain(&mut self) -> MediaResult<()> {
        self.pipe.begin_drain();
        Ok(())
    }

    fn reset(&mut self) {
        self.pipe.reset();
    }
}

struct SimAudioEncode {
    props: Properties,
    pipe: Pipe<Packet>,
}

impl EncodeSession for SimAudioEncode {
    fn submit(&mut self, frame: &Frame) -> MediaResult<EngineStatus> {
        if !self.pipe.can_accept() {
            return Ok(EngineStatus::OutputPending);
        }
        if frame.sample_format() != self.props.sample_format
            || frame.sample_rate() != self.props.sample_rate
        {
            return Err(MediaError::InvalidInput(
                "frame format does not match configured audio properties".into(),
            ));
        }
        self.pipe.push(encode_audio_frame(frame)?);
        Ok(EngineStatus::Done)
    }

    fn retrieve(&mut self) -> MediaResult<(EngineStatus, Option<Packet>)> {
        Ok(self.pipe.pop())
    }
}

impl Session for SimAudioEncode {
    fn begin_drain(&mut self) -> MediaResult<()> {
        self.pipe.begin_drain();
        Ok(())
    }

    fn reset(&mut self) {
        self.pipe.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_props() -> Properties {
        Properties::video(32, 16, PixelFormat::Gray8, Rational::new(25, 1))
    }

    #[test]
    fn test_video_payload_round_trip() {
        let mut builder = FrameBuilder::video(32, 16, PixelFormat::Gray8).unwrap();
        builder.fill_plane(0, 0xAB).unwrap();
        let mut frame = Frame::new(MediaKind::Video).unwrap();
        frame
            .adopt_storage_video(32, 16, PixelFormat::Gray8, builder.publish())
            .unwrap();
        frame.set_pts(Some(3));

        let pkt = encode_video_frame(&frame).unwrap();
        assert!(pkt.is_key());
        assert_eq!(pkt.pts(), Some(3));

        let decoded = decode_video_packet(&pkt).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.pixel_format(), Some(PixelFormat::Gray8));
        assert_eq!(decoded.data().unwrap().row(0, 5).unwrap()[0], 0xAB);
    }

    #[test]
    fn test_bad_magic_is_invalid_input() {
        let pkt = Packet::from_slice(b"garbage here, not a payload").unwrap();
        let err = decode_video_packet(&pkt).unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[test]
    fn test_pipe_capacity_reports_output_pending() {
        let engine = SimEngine::new();
        let desc = engine.descriptor(CodecId::GrayVideo).unwrap();
        let mut options = Dictionary::new();
        options.set("queue", "1");
        let (mut session, rest) = engine.open_encoder(&desc, &video_props(), options).unwrap();
        assert!(rest.is_empty());

        let frame = Frame::alloc_video(32, 16, PixelFormat::Gray8).unwrap();
        assert_eq!(session.submit(&frame).unwrap(), EngineStatus::Done);
        // queue of one is now full
        assert_eq!(session.submit(&frame).unwrap(), EngineStatus::OutputPending);
        let (status, pkt) = session.retrieve().unwrap();
        assert_eq!(status, EngineStatus::Done);
        assert!(pkt.is_some());
        assert_eq!(session.submit(&frame).unwrap(), EngineStatus::Done);
    }

    #[test]
    fn test_encoder_delay_holds_output_back() {
        let engine = SimEngine::new();
        let desc = engine.descriptor(CodecId::GrayVideo).unwrap();
        let mut options = Dictionary::new();
        options.set("delay", "2");
        let (mut session, _) = engine.open_encoder(&desc, &video_props(), options).unwrap();

        let frame = Frame::alloc_video(32, 16, PixelFormat::Gray8).unwrap();
        session.submit(&frame).unwrap();
        session.submit(&frame).unwrap();
        // two frames in lookahead, nothing ready yet
        let (status, pkt) = session.retrieve().unwrap();
        assert_eq!(status, EngineStatus::NeedsInput);
        assert!(pkt.is_none());

        session.begin_drain().unwrap();
        assert_eq!(session.retrieve().unwrap().0, EngineStatus::Done);
        assert_eq!(session.retrieve().unwrap().0, EngineStatus::Done);
        assert_eq!(session.retrieve().unwrap().0, EngineStatus::EndOfStream);
    }

    #[test]
    fn test_unknown_option_is_returned() {
        let engine = SimEngine::new();
        let desc = engine.descriptor(CodecId::RawVideo).unwrap();
        let mut options = Dictionary::new();
        options.set("queue", "2");
        options.set("preset", "fast");
        let mut props = video_props();
        props.pixel_format = Some(PixelFormat::Yuv420p);
        let (_, rest) = engine.open_decoder(&desc, &props, options).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.get("preset"), Some("fast"));
    }

    #[test]
    fn test_open_rejects_unsupported_format() {
        let engine = SimEngine::new();
        let desc = engine.descriptor(CodecId::GrayVideo).unwrap();
        let mut props = video_props();
        props.pixel_format = Some(PixelFormat::Rgba);
        let err = engine
            .open_encoder(&desc, &props, Dictionary::new())
            .err()
            .expect("open_encoder should fail");
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[test]
    fn test_audio_payload_round_trip() {
        let props = Properties::audio(48_000, SampleFormat::S16, ChannelLayout::STEREO);
        let mut frame =
            Frame::alloc_audio(256, SampleFormat::S16, 48_000, ChannelLayout::STEREO).unwrap();
        frame.set_pts(Some(1024));
        let pkt = encode_audio_frame(&frame).unwrap();
        assert_eq!(pkt.duration(), Some(256));
        let decoded = decode_audio_packet(&pkt, &props).unwrap();
        assert_eq!(decoded.nb_samples(), 256);
        assert_eq!(decoded.sample_rate(), 48_000);
        assert_eq!(decoded.channel_layout(), Some(&ChannelLayout::STEREO));
    }
}
