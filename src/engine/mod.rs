//! The engine contract.
//!
//! The underlying encode/decode capability is consumed through a small
//! classified-result interface: every engine call reports one of
//! [`EngineStatus`]'s flow states, or fails with a typed [`MediaError`]
//! (invalid arguments, out of memory, unexpected failure). The codec layer
//! maps these uniformly onto its hungry/full/drain logic and never inspects
//! engine internals.
//!
//! Decode and encode sessions are two implementations of the same
//! strategy shape — `submit`/`retrieve`/`begin_drain`/`reset` — differing
//! only in which buffer type is input and which is output.

pub mod sim;

use crate::dict::Dictionary;
use crate::error::MediaResult;
use crate::frame::Frame;
use crate::layout::ChannelLayout;
use crate::packet::Packet;
use crate::properties::{MediaKind, PixelFormat, Properties, SampleFormat};
use crate::rational::Rational;

/// Flow-state outcome of an engine call
///
/// Hard failures are not represented here; they surface as `MediaError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// The call did what was asked
    Done,
    /// The engine needs more input before it can produce output
    NeedsInput,
    /// The engine cannot accept input until pending output is drained
    OutputPending,
    /// Nothing left; the current cycle is fully drained
    EndOfStream,
}

/// Identity of a codec known to an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// Uncompressed video passthrough
    RawVideo,
    /// Grayscale-only video passthrough
    GrayVideo,
    /// Signed 16-bit PCM audio
    PcmS16,
}

impl CodecId {
    /// Canonical codec name
    pub fn name(self) -> &'static str {
        match self {
            CodecId::RawVideo => "rawvideo",
            CodecId::GrayVideo => "grayvideo",
            CodecId::PcmS16 => "pcm_s16le",
        }
    }
}

/// What an engine declares about one of its codecs
///
/// Capability lists are `None` when the engine does not publish them; a
/// query against an unpublished list is a capability-unknown condition,
/// not an empty answer.
#[derive(Debug, Clone)]
pub struct CodecDescriptor {
    /// Codec identity, fixed at construction
    pub id: CodecId,
    /// Media kind this codec handles
    pub kind: MediaKind,
    /// Supported pixel formats (video codecs)
    pub pixel_formats: Option<Vec<PixelFormat>>,
    /// Supported frame rates (video codecs)
    pub frame_rates: Option<Vec<Rational>>,
    /// Supported sample formats (audio codecs)
    pub sample_formats: Option<Vec<SampleFormat>>,
    /// Supported sample rates (audio codecs)
    pub sample_rates: Option<Vec<u32>>,
    /// Supported channel layouts (audio codecs)
    pub channel_layouts: Option<Vec<ChannelLayout>>,
}

impl CodecDescriptor {
    /// Canonical codec name
    pub fn name(&self) -> &'static str {
        self.id.name()
    }
}

/// Operations common to every open engine context
pub trait Session {
    /// Tell the engine no more input will arrive; flush buffered output.
    /// For encoders this pushes the explicit end-of-input marker.
    fn begin_drain(&mut self) -> MediaResult<()>;

    /// Discard all buffered engine state
    fn reset(&mut self);
}

/// One open decode context inside the engine
pub trait DecodeSession: Session {
    /// Hand one encoded packet to the engine
    fn submit(&mut self, packet: &Packet) -> MediaResult<EngineStatus>;

    /// Ask the engine for one decoded frame
    fn retrieve(&mut self) -> MediaResult<(EngineStatus, Option<Frame>)>;
}

/// One open encode context inside the engine
pub trait EncodeSession: Session {
    /// Hand one raw frame to the engine
    fn submit(&mut self, frame: &Frame) -> MediaResult<EngineStatus>;

    /// Ask the engine for one encoded packet
    fn retrieve(&mut self) -> MediaResult<(EngineStatus, Option<Packet>)>;
}

/// A codec engine: codec registry plus session factories
///
/// Session factories consume an options [`Dictionary`] and hand back the
/// entries they did not understand.
pub trait Engine: Send + Sync {
    /// Look up a codec by id
    fn descriptor(&self, id: CodecId) -> Option<CodecDescriptor>;

    /// Look up a codec by canonical name
    fn descriptor_by_name(&self, name: &str) -> Option<CodecDescriptor>;

    /// Open a decode session configured by `props`
    fn open_decoder(
        &self,
        desc: &CodecDescriptor,
        props: &Properties,
        options: Dictionary,
    ) -> MediaResult<(Box<dyn DecodeSession>, Dictionary)>;

    /// Open an encode session configured by `props`
    fn open_encoder(
        &self,
        desc: &CodecDescriptor,
        props: &Properties,
        options: Dictionary,
    ) -> MediaResult<(Box<dyn EncodeSession>, Dictionary)>;
}
