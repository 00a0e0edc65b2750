//! Encoder: frames in, packets out.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::dict::Dictionary;
use crate::engine::{CodecId, EncodeSession, Engine};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::packet::Packet;
use crate::properties::{MediaKind, Properties};

use super::CodecBase;

/// An encoder over an engine encode session
///
/// Derefs to [`CodecBase`] for lifecycle state, properties and capability
/// queries.
#[derive(Debug)]
pub struct Encoder {
    base: CodecBase<dyn EncodeSession>,
}

impl Encoder {
    /// Create an encoder for the given codec id (`Created`; call
    /// [`open`](Encoder::open) after staging properties)
    pub fn new(engine: Arc<dyn Engine>, id: CodecId) -> MediaResult<Self> {
        let desc = engine
            .descriptor(id)
            .ok_or_else(|| MediaError::CodecNotFound(id.name().to_string()))?;
        Ok(Self {
            base: CodecBase::new(engine, desc)?,
        })
    }

    /// Create an encoder by canonical codec name
    pub fn by_name(engine: Arc<dyn Engine>, name: &str) -> MediaResult<Self> {
        let desc = engine
            .descriptor_by_name(name)
            .ok_or_else(|| MediaError::CodecNotFound(name.to_string()))?;
        Ok(Self {
            base: CodecBase::new(engine, desc)?,
        })
    }

    /// Stage the essential subset of `source`, substituting unsupported
    /// values
    ///
    /// For each essential value the codec publishes a capability list for:
    /// a supported value is kept, an unsupported one is replaced with the
    /// first entry of the list. Values the codec publishes no list for are
    /// taken as given. Non-essential staged fields are untouched. Legal
    /// only while `Created`.
    ///
    /// Returns `true` when at least one value was substituted.
    pub fn adopt_properties_from(&mut self, source: &Properties) -> MediaResult<bool> {
        let kind = self.base.kind()?;
        if source.kind != kind {
            return Err(MediaError::WrongMediaKind {
                expected: kind,
                actual: source.kind,
            });
        }
        let mut staged = self.base.staged_properties()?.clone();
        let mut essential = source.essential();
        let mut substituted = false;

        match kind {
            MediaKind::Video => {
                if let Some(format) = essential.pixel_format {
                    match self.base.supports_pixel_format(format) {
                        Ok(true) => {}
                        Ok(false) => {
                            let formats = self.base.supported_pixel_formats()?;
                            if let Some(&first) = formats.first() {
                                log::warn!(
                                    "{}: pixel format {format:?} unsupported, using {first:?}",
                                    self.base.name()?
                                );
                                essential.pixel_format = Some(first);
                                substituted = true;
                            }
                        }
                        Err(err) if err.is_capability_unknown() => {}
                        Err(err) => return Err(err),
                    }
                }
                if !essential.frame_rate.is_zero() {
                    match self.base.supports_frame_rate(essential.frame_rate) {
                        Ok(true) => {}
                        Ok(false) => {
                            let rates = self.base.supported_frame_rates()?;
                            if let Some(&first) = rates.first() {
                                log::warn!(
                                    "{}: frame rate {} unsupported, using {first}",
                                    self.base.name()?,
                                    essential.frame_rate
                                );
                                essential.frame_rate = first;
                                substituted = true;
                            }
                        }
                        Err(err) if err.is_capability_unknown() => {}
                        Err(err) => return Err(err),
                    }
                }
            }
            MediaKind::Audio => {
                if let Some(format) = essential.sample_format {
                    match self.base.supports_sample_format(format) {
                        Ok(true) => {}
                        Ok(false) => {
                            let formats = self.base.supported_sample_formats()?;
                            if let Some(&first) = formats.first() {
                                log::warn!(
                                    "{}: sample format {format:?} unsupported, using {first:?}",
                                    self.base.name()?
                                );
                                essential.sample_format = Some(first);
                                substituted = true;
                            }
                        }
                        Err(err) if err.is_capability_unknown() => {}
                        Err(err) => return Err(err),
                    }
                }
                if essential.sample_rate != 0 {
                    match self.base.supports_sample_rate(essential.sample_rate) {
                        Ok(true) => {}
                        Ok(false) => {
                            let rates = self.base.supported_sample_rates()?;
                            if let Some(&first) = rates.first() {
                                log::warn!(
                                    "{}: sample rate {} unsupported, using {first}",
                                    self.base.name()?,
                                    essential.sample_rate
                                );
                                essential.sample_rate = first;
                                substituted = true;
                            }
                        }
                        Err(err) if err.is_capability_unknown() => {}
                        Err(err) => return Err(err),
                    }
                }
                if let Some(layout) = essential.channel_layout.clone() {
                    match self.base.supports_channel_layout(&layout) {
                        Ok(true) => {}
                        Ok(false) => {
                            let layouts = self.base.supported_channel_layouts()?;
                            if let Some(first) = layouts.first().cloned() {
                                log::warn!(
                                    "{}: channel layout unsupported, using {} channels",
                                    self.base.name()?,
                                    first.channel_count()
                                );
                                essential.channel_layout = Some(first);
                                substituted = true;
                            }
                        }
                        Err(err) if err.is_capability_unknown() => {}
                        Err(err) => return Err(err),
                    }
                }
            }
            MediaKind::Subtitle => {}
        }

        staged.apply_essential_from(&essential);
        self.base.set_properties(staged)?;
        Ok(substituted)
    }

    /// Open the encode session (`Created → Ready`)
    ///
    /// Consumes recognized entries of `options` and returns the rest.
    pub fn open(&mut self, options: Dictionary) -> MediaResult<Dictionary> {
        let engine = self.base.engine_handle();
        self.base
            .open_with(move |desc, props| engine.open_encoder(desc, props, options))
    }

    /// Submit one raw frame
    ///
    /// Returns `Ok(false)` — rejected, no side effects — while the encoder
    /// is full or draining; drain with [`produce`](Encoder::produce) first.
    pub fn feed(&mut self, frame: &Frame) -> MediaResult<bool> {
        if !frame.is_ready() {
            return Err(MediaError::InvalidInput("frame has no storage".into()));
        }
        self.base.feed_with(|session| session.submit(frame))
    }

    /// Ask for one encoded packet
    ///
    /// `Ok(None)` means the encoder is hungry or fully drained, never an
    /// error.
    pub fn produce(&mut self) -> MediaResult<Option<Packet>> {
        self.base.produce_with(|session| session.retrieve())
    }

    /// Move this encoder out, leaving `self` `Destroyed`
    pub fn take(&mut self) -> Encoder {
        Encoder {
            base: self.base.take(),
        }
    }
}

impl Deref for Encoder {
    type Target = CodecBase<dyn EncodeSession>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for Encoder {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}
