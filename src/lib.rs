#![deny(clippy::all)]

//! Resource-safe codec pipeline primitives.
//!
//! Every object that owns engine resources walks the same two-level
//! lifecycle — `Destroyed → Created → Ready` and back — and frees itself on
//! drop. On top of that, open codecs speak a feed/drain protocol whose
//! rejections are ordinary return values, so steady-state backpressure
//! never raises errors.

// Lifecycle state machine shared by every resource owner
pub mod lifecycle;

// Support types
pub mod dict;
pub mod error;
pub mod layout;
pub mod properties;
pub mod rational;

// Media buffers
pub mod frame;
pub mod packet;

// The engine contract and the built-in passthrough engine
pub mod engine;

// Decoders and encoders over engine sessions
pub mod codec;

// Container mux/demux
pub mod container;

// Format conversion helpers
pub mod resample;
pub mod scale;

pub use codec::{CodecBase, Decoder, Encoder};
pub use container::{Demuxer, MediaStore, Muxer, StreamDescriptor};
pub use dict::Dictionary;
pub use engine::{
    CodecDescriptor, CodecId, DecodeSession, EncodeSession, Engine, EngineStatus, Session,
};
pub use error::{MediaError, MediaResult};
pub use frame::{Frame, FrameBuilder, FrameData, PlaneDesc};
pub use layout::{Channel, ChannelLayout};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use packet::Packet;
pub use properties::{MediaKind, PixelFormat, Properties, SampleFormat};
pub use rational::Rational;
pub use resample::Resampler;
pub use scale::Scaler;
