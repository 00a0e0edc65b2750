//! Codec base: the feed/drain protocol over a lifecycle-managed session.
//!
//! A codec is `Ready` when its engine session exists; on top of that it
//! cycles through a secondary sub-state of three flags:
//!
//! - `hungry` — needs more input before it can produce output
//! - `full` — has output pending and cannot accept more input
//! - `draining_signaled` — the caller declared no more input will arrive
//!
//! `hungry` and `full` are never both true. Protocol rejections (feeding a
//! full or draining codec, producing from a hungry one) are ordinary
//! `false`/`None` returns — they are steady-state control flow, not
//! failures. The same machine drives decoders and encoders; the session
//! strategy supplies the direction-specific engine calls.

pub mod decoder;
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;

use std::sync::Arc;

use crate::dict::Dictionary;
use crate::engine::{CodecDescriptor, CodecId, Engine, EngineStatus, Session};
use crate::error::{precondition, MediaError, MediaResult};
use crate::layout::ChannelLayout;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::properties::{MediaKind, PixelFormat, Properties, SampleFormat};
use crate::rational::Rational;

/// The feed/drain sub-state machine
///
/// Operates only while the owning codec is `Ready`; maps the engine's
/// classified results onto the three flags.
#[derive(Debug)]
struct FeedDrain {
    hungry: bool,
    full: bool,
    draining_signaled: bool,
}

impl FeedDrain {
    fn new() -> Self {
        Self {
            hungry: true,
            full: false,
            draining_signaled: false,
        }
    }

    fn feed(&mut self, submit: impl FnOnce() -> MediaResult<EngineStatus>) -> MediaResult<bool> {
        if self.draining_signaled || self.full {
            // rejected without side effects
            return Ok(false);
        }
        match submit()? {
            EngineStatus::Done => {
                self.hungry = false;
                self.check();
                Ok(true)
            }
            EngineStatus::OutputPending => {
                self.full = true;
                self.hungry = false;
                self.check();
                Ok(false)
            }
            status @ (EngineStatus::NeedsInput | EngineStatus::EndOfStream) => Err(
                MediaError::Engine(format!("unexpected {status:?} from submit")),
            ),
        }
    }

    fn produce<O>(
        &mut self,
        retrieve: impl FnOnce() -> MediaResult<(EngineStatus, Option<O>)>,
    ) -> MediaResult<Option<O>> {
        if self.hungry {
            // nothing could be pending; skip the engine round-trip
            return Ok(None);
        }
        let (status, output) = retrieve()?;
        match status {
            EngineStatus::Done => {
                self.full = false;
                self.check();
                output
                    .map(Some)
                    .ok_or_else(|| MediaError::Engine("success without output".into()))
            }
            EngineStatus::NeedsInput => {
                self.hungry = !self.draining_signaled;
                self.full = false;
                self.check();
                Ok(None)
            }
            EngineStatus::EndOfStream => Ok(None),
            EngineStatus::OutputPending => Err(MediaError::Engine(
                "unexpected OutputPending from retrieve".into(),
            )),
        }
    }

    fn signal_end(&mut self, begin_drain: impl FnOnce() -> MediaResult<()>) -> MediaResult<()> {
        if self.draining_signaled {
            return Err(precondition("end of input already signaled"));
        }
        begin_drain()?;
        self.draining_signaled = true;
        self.hungry = false;
        self.check();
        Ok(())
    }

    fn reset(&mut self) {
        *self = FeedDrain::new();
    }

    #[inline]
    fn check(&self) {
        debug_assert!(!(self.hungry && self.full), "hungry and full both set");
        debug_assert!(
            !self.draining_signaled || !self.hungry,
            "hungry while draining"
        );
    }
}

/// Shared state and operations of decoders and encoders
///
/// Shell = codec descriptor plus staged properties; resource = the open
/// engine session. [`Decoder`] and [`Encoder`] deref to this.
pub struct CodecBase<S: ?Sized + Session> {
    engine: Arc<dyn Engine>,
    lifecycle: Lifecycle,
    desc: Option<CodecDescriptor>,
    props: Option<Properties>,
    session: Option<Box<S>>,
    fd: FeedDrain,
}

impl<S: ?Sized + Session> CodecBase<S> {
    pub(crate) fn new(engine: Arc<dyn Engine>, desc: CodecDescriptor) -> MediaResult<Self> {
        let mut base = Self {
            engine,
            lifecycle: Lifecycle::new(),
            desc: None,
            props: None,
            session: None,
            fd: FeedDrain::new(),
        };
        let kind = desc.kind;
        let shell = base.lifecycle.allocate_shell(|| Ok(desc))?;
        base.desc = Some(shell);
        base.props = Some(Properties::new(kind));
        Ok(base)
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Check if the engine session is open
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Check if the codec needs more input before producing output
    #[inline]
    pub fn is_hungry(&self) -> bool {
        self.fd.hungry
    }

    /// Check if output is pending and input cannot be accepted
    #[inline]
    pub fn is_full(&self) -> bool {
        self.fd.full
    }

    /// Check if end of input has been signaled for this cycle
    #[inline]
    pub fn is_draining_signaled(&self) -> bool {
        self.fd.draining_signaled
    }

    /// Codec identity, fixed at construction
    pub fn id(&self) -> MediaResult<CodecId> {
        Ok(self.descriptor()?.id)
    }

    /// Canonical codec name
    pub fn name(&self) -> MediaResult<&'static str> {
        Ok(self.descriptor()?.name())
    }

    /// Media kind of this codec
    pub fn kind(&self) -> MediaResult<MediaKind> {
        Ok(self.descriptor()?.kind)
    }

    fn descriptor(&self) -> MediaResult<&CodecDescriptor> {
        self.desc
            .as_ref()
            .ok_or_else(|| precondition("codec has no shell"))
    }

    fn descriptor_of_kind(&self, expected: MediaKind) -> MediaResult<&CodecDescriptor> {
        let desc = self.descriptor()?;
        if desc.kind != expected {
            return Err(MediaError::WrongMediaKind {
                expected,
                actual: desc.kind,
            });
        }
        Ok(desc)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Stage configuration, consumed when the session is opened
    ///
    /// Legal only while `Created` — the session does not exist yet.
    pub fn set_properties(&mut self, props: Properties) -> MediaResult<()> {
        self.lifecycle
            .require(LifecycleState::Created, "set_properties: codec not Created")?;
        let desc = self.descriptor()?;
        if props.kind != desc.kind {
            return Err(MediaError::WrongMediaKind {
                expected: desc.kind,
                actual: props.kind,
            });
        }
        self.props = Some(props);
        Ok(())
    }

    /// Configured properties, available once `Ready`
    pub fn properties(&self) -> MediaResult<&Properties> {
        self.lifecycle
            .require(LifecycleState::Ready, "properties: codec not Ready")?;
        Ok(self.props.as_ref().expect("Ready implies properties"))
    }

    pub(crate) fn staged_properties(&self) -> MediaResult<&Properties> {
        self.lifecycle.require(
            LifecycleState::Created,
            "staged_properties: codec not Created",
        )?;
        Ok(self.props.as_ref().expect("Created implies properties"))
    }

    // ========================================================================
    // Capability queries
    // ========================================================================

    /// Pixel formats this codec declares support for (video codecs)
    pub fn supported_pixel_formats(&self) -> MediaResult<&[PixelFormat]> {
        let desc = self.descriptor_of_kind(MediaKind::Video)?;
        desc.pixel_formats
            .as_deref()
            .ok_or(MediaError::CapabilityUnknown {
                codec: desc.name(),
                list: "pixel_formats",
            })
    }

    /// Check one pixel format against the declared list
    pub fn supports_pixel_format(&self, format: PixelFormat) -> MediaResult<bool> {
        Ok(self.supported_pixel_formats()?.contains(&format))
    }

    /// Frame rates this codec declares support for (video codecs)
    pub fn supported_frame_rates(&self) -> MediaResult<&[Rational]> {
        let desc = self.descriptor_of_kind(MediaKind::Video)?;
        desc.frame_rates
            .as_deref()
            .ok_or(MediaError::CapabilityUnknown {
                codec: desc.name(),
                list: "frame_rates",
            })
    }

    /// Check one frame rate against the declared list
    pub fn supports_frame_rate(&self, rate: Rational) -> MediaResult<bool> {
        Ok(self.supported_frame_rates()?.contains(&rate))
    }

    /// Sample formats this codec declares support for (audio codecs)
    pub fn supported_sample_formats(&self) -> MediaResult<&[SampleFormat]> {
        let desc = self.descriptor_of_kind(MediaKind::Audio)?;
        desc.sample_formats
            .as_deref()
            .ok_or(MediaError::CapabilityUnknown {
                codec: desc.name(),
                list: "sample_formats",
            })
    }

    /// Check one sample format against the declared list
    pub fn supports_sample_format(&self, format: SampleFormat) -> MediaResult<bool> {
        Ok(self.supported_sample_formats()?.contains(&format))
    }

    /// Sample rates this codec declares support for (audio codecs)
    pub fn supported_sample_rates(&self) -> MediaResult<&[u32]> {
        let desc = self.descriptor_of_kind(MediaKind::Audio)?;
        desc.sample_rates
            .as_deref()
            .ok_or(MediaError::CapabilityUnknown {
                codec: desc.name(),
                list: "sample_rates",
            })
    }

    /// Check one sample rate against the declared list
    pub fn supports_sample_rate(&self, rate: u32) -> MediaResult<bool> {
        Ok(self.supported_sample_rates()?.contains(&rate))
    }

    /// Channel layouts this codec declares support for (audio codecs)
    pub fn supported_channel_layouts(&self) -> MediaResult<&[ChannelLayout]> {
        let desc = self.descriptor_of_kind(MediaKind::Audio)?;
        desc.channel_layouts
            .as_deref()
            .ok_or(MediaError::CapabilityUnknown {
                codec: desc.name(),
                list: "channel_layouts",
            })
    }

    /// Check one channel layout against the declared list
    pub fn supports_channel_layout(&self, layout: &ChannelLayout) -> MediaResult<bool> {
        Ok(self.supported_channel_layouts()?.contains(layout))
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    pub(crate) fn engine_handle(&self) -> Arc<dyn Engine> {
        self.engine.clone()
    }

    pub(crate) fn open_with(
        &mut self,
        make: impl FnOnce(&CodecDescriptor, &Properties) -> MediaResult<(Box<S>, Dictionary)>,
    ) -> MediaResult<Dictionary> {
        let desc = self.descriptor()?.clone();
        let props = self
            .props
            .clone()
            .ok_or_else(|| precondition("open: codec has no properties"))?;
        let (session, rest) = self.lifecycle.allocate_resource(|| make(&desc, &props))?;
        self.session = Some(session);
        self.fd.reset();
        log::debug!("{}: session opened", desc.name());
        Ok(rest)
    }

    /// Close the session, returning to `Created`
    ///
    /// Staged properties survive; the codec can be reconfigured and
    /// reopened.
    pub fn close(&mut self) -> MediaResult<()> {
        self.lifecycle.release_resource(|| Ok(()))?;
        self.session = None;
        self.fd.reset();
        Ok(())
    }

    // ========================================================================
    // Feed/drain protocol
    // ========================================================================

    pub(crate) fn feed_with(
        &mut self,
        submit: impl FnOnce(&mut S) -> MediaResult<EngineStatus>,
    ) -> MediaResult<bool> {
        self.lifecycle
            .require(LifecycleState::Ready, "feed: codec not Ready")?;
        let session = self.session.as_deref_mut().expect("Ready implies session");
        self.fd.feed(|| submit(session))
    }

    pub(crate) fn produce_with<O>(
        &mut self,
        retrieve: impl FnOnce(&mut S) -> MediaResult<(EngineStatus, Option<O>)>,
    ) -> MediaResult<Option<O>> {
        self.lifecycle
            .require(LifecycleState::Ready, "produce: codec not Ready")?;
        let session = self.session.as_deref_mut().expect("Ready implies session");
        self.fd.produce(|| retrieve(session))
    }

    /// Declare that no more input will arrive in this cycle
    ///
    /// The engine starts flushing buffered output; keep calling the
    /// produce operation until it returns `None`. A second call without an
    /// intervening `reset` is a precondition violation.
    pub fn signal_end_of_input(&mut self) -> MediaResult<()> {
        self.lifecycle.require(
            LifecycleState::Ready,
            "signal_end_of_input: codec not Ready",
        )?;
        let session = self.session.as_deref_mut().expect("Ready implies session");
        let fd = &mut self.fd;
        fd.signal_end(|| session.begin_drain())?;
        log::debug!("codec: end of input signaled");
        Ok(())
    }

    /// Discard buffered engine state and restart the feed/drain cycle
    ///
    /// Identity and configured properties are unchanged.
    pub fn reset(&mut self) -> MediaResult<()> {
        self.lifecycle
            .require(LifecycleState::Ready, "reset: codec not Ready")?;
        self.session
            .as_deref_mut()
            .expect("Ready implies session")
            .reset();
        self.fd.reset();
        Ok(())
    }

    /// Move this codec out, leaving `self` `Destroyed`
    pub(crate) fn take(&mut self) -> Self {
        Self {
            engine: self.engine.clone(),
            lifecycle: self.lifecycle.take(),
            desc: self.desc.take(),
            props: self.props.take(),
            session: self.session.take(),
            fd: std::mem::replace(&mut self.fd, FeedDrain::new()),
        }
    }

    /// Tear down from any state. Idempotent.
    pub fn destroy(&mut self) {
        let session = &mut self.session;
        let desc = &mut self.desc;
        let props = &mut self.props;
        self.lifecycle.destroy(
            || *session = None,
            || {
                *desc = None;
                *props = None;
            },
        );
        self.fd.reset();
    }
}

impl<S: ?Sized + Session> Drop for CodecBase<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<S: ?Sized + Session> std::fmt::Debug for CodecBase<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecBase")
            .field("state", &self.lifecycle.state())
            .field("codec", &self.desc.as_ref().map(|d| d.name()))
            .field("hungry", &self.fd.hungry)
            .field("full", &self.fd.full)
            .field("draining_signaled", &self.fd.draining_signaled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_rejected_while_full_keeps_state() {
        let mut fd = FeedDrain::new();
        fd.feed(|| Ok(EngineStatus::OutputPending)).unwrap();
        assert!(fd.full);
        assert!(!fd.hungry);
        // rejected call must not touch the engine or the flags
        let fed = fd.feed(|| panic!("engine contacted while full")).unwrap();
        assert!(!fed);
        assert!(fd.full);
    }

    #[test]
    fn test_produce_while_hungry_skips_engine() {
        let mut fd = FeedDrain::new();
        let out: Option<u8> = fd
            .produce(|| panic!("engine contacted while hungry"))
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_needs_input_flips_back_to_hungry() {
        let mut fd = FeedDrain::new();
        fd.feed(|| Ok(EngineStatus::Done)).unwrap();
        assert!(!fd.hungry);
        let out: Option<u8> = fd.produce(|| Ok((EngineStatus::NeedsInput, None))).unwrap();
        assert!(out.is_none());
        assert!(fd.hungry);
        assert!(!fd.full);
    }

    #[test]
    fn test_double_signal_is_precondition() {
        let mut fd = FeedDrain::new();
        fd.signal_end(|| Ok(())).unwrap();
        assert!(fd.draining_signaled);
        assert!(!fd.hungry);
        let err = fd.signal_end(|| Ok(())).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_feed_after_signal_rejected() {
        let mut fd = FeedDrain::new();
        fd.signal_end(|| Ok(())).unwrap();
        let fed = fd.feed(|| panic!("engine contacted after drain")).unwrap();
        assert!(!fed);
    }

    #[test]
    fn test_end_of_stream_leaves_substate() {
        let mut fd = FeedDrain::new();
        fd.signal_end(|| Ok(())).unwrap();
        let out: Option<u8> = fd.produce(|| Ok((EngineStatus::EndOfStream, None))).unwrap();
        assert!(out.is_none());
        // drained state is terminal for the cycle
        assert!(fd.draining_signaled);
        assert!(!fd.hungry);
        let again: Option<u8> = fd.produce(|| Ok((EngineStatus::EndOfStream, None))).unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_reset_restores_initial_substate() {
        let mut fd = FeedDrain::new();
        fd.feed(|| Ok(EngineStatus::Done)).unwrap();
        fd.signal_end(|| Ok(())).unwrap();
        fd.reset();
        assert!(fd.hungry);
        assert!(!fd.full);
        assert!(!fd.draining_signaled);
    }
}
