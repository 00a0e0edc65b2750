//! Decoder: packets in, frames out.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::container::StreamDescriptor;
use crate::dict::Dictionary;
use crate::engine::{CodecId, DecodeSession, Engine};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::packet::Packet;

use super::CodecBase;

/// A decoder over an engine decode session
///
/// Derefs to [`CodecBase`] for lifecycle state, properties and capability
/// queries. Decoders cannot be cloned; engine decode state is not
/// duplicable.
#[derive(Debug)]
pub struct Decoder {
    base: CodecBase<dyn DecodeSession>,
}

impl Decoder {
    /// Create a decoder for the given codec id (`Created`; call
    /// [`open`](Decoder::open) after staging properties)
    pub fn new(engine: Arc<dyn Engine>, id: CodecId) -> MediaResult<Self> {
        let desc = engine
            .descriptor(id)
            .ok_or_else(|| MediaError::CodecNotFound(id.name().to_string()))?;
        Ok(Self {
            base: CodecBase::new(engine, desc)?,
        })
    }

    /// Create a decoder by canonical codec name
    pub fn by_name(engine: Arc<dyn Engine>, name: &str) -> MediaResult<Self> {
        let desc = engine
            .descriptor_by_name(name)
            .ok_or_else(|| MediaError::CodecNotFound(name.to_string()))?;
        Ok(Self {
            base: CodecBase::new(engine, desc)?,
        })
    }

    /// Create a decoder from a container stream descriptor
    ///
    /// Copies the stream's codec identity and essential properties, then
    /// opens the session immediately — the returned decoder is `Ready`.
    pub fn from_stream(engine: Arc<dyn Engine>, stream: &StreamDescriptor) -> MediaResult<Self> {
        let mut decoder = Self::new(engine, stream.codec_id)?;
        decoder.base.set_properties(stream.properties.essential())?;
        let rest = decoder.open(Dictionary::new())?;
        debug_assert!(rest.is_empty());
        Ok(decoder)
    }

    /// Open the decode session (`Created → Ready`)
    ///
    /// Consumes recognized entries of `options` and returns the rest.
    pub fn open(&mut self, options: Dictionary) -> MediaResult<Dictionary> {
        let engine = self.base.engine_handle();
        self.base
            .open_with(move |desc, props| engine.open_decoder(desc, props, options))
    }

    /// Submit one encoded packet
    ///
    /// Returns `Ok(false)` — rejected, no side effects — while the decoder
    /// is full or draining; drain with [`produce`](Decoder::produce) first.
    pub fn feed(&mut self, packet: &Packet) -> MediaResult<bool> {
        if !packet.is_ready() {
            return Err(MediaError::InvalidInput("packet has no payload".into()));
        }
        self.base.feed_with(|session| session.submit(packet))
    }

    /// Ask for one decoded frame
    ///
    /// `Ok(None)` means the decoder is hungry or fully drained, never an
    /// error.
    pub fn produce(&mut self) -> MediaResult<Option<Frame>> {
        self.base.produce_with(|session| session.retrieve())
    }

    /// Move this decoder out, leaving `self` `Destroyed`
    pub fn take(&mut self) -> Decoder {
        Decoder {
            base: self.base.take(),
        }
    }
}

impl Deref for Decoder {
    type Target = CodecBase<dyn DecodeSession>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for Decoder {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}
