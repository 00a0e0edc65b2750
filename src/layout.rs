//! Audio channel layout description.
//!
//! A layout is immutable once constructed. Well-known layouts are borrowed
//! from static tables; custom arrangements own their channel list. Equality
//! is structural — a custom stereo layout equals [`ChannelLayout::STEREO`].

use std::borrow::Cow;
use std::fmt;

/// A single speaker position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    BackLeft,
    BackRight,
    SideLeft,
    SideRight,
}

static MONO_CHANNELS: [Channel; 1] = [Channel::FrontCenter];
static STEREO_CHANNELS: [Channel; 2] = [Channel::FrontLeft, Channel::FrontRight];
static SURROUND_5_1_CHANNELS: [Channel; 6] = [
    Channel::FrontLeft,
    Channel::FrontRight,
    Channel::FrontCenter,
    Channel::LowFrequency,
    Channel::BackLeft,
    Channel::BackRight,
];

/// Immutable description of an audio channel arrangement
#[derive(Clone)]
pub struct ChannelLayout {
    channels: Cow<'static, [Channel]>,
}

impl ChannelLayout {
    /// Single front-center channel
    pub const MONO: ChannelLayout = ChannelLayout {
        channels: Cow::Borrowed(&MONO_CHANNELS),
    };

    /// Front left + front right
    pub const STEREO: ChannelLayout = ChannelLayout {
        channels: Cow::Borrowed(&STEREO_CHANNELS),
    };

    /// 5.1 surround
    pub const SURROUND_5_1: ChannelLayout = ChannelLayout {
        channels: Cow::Borrowed(&SURROUND_5_1_CHANNELS),
    };

    /// Create a custom (owned) layout from an explicit channel list
    pub fn custom(channels: Vec<Channel>) -> Self {
        Self {
            channels: Cow::Owned(channels),
        }
    }

    /// Default layout for a channel count, if one is defined
    pub fn default_for_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Self::MONO),
            2 => Some(Self::STEREO),
            6 => Some(Self::SURROUND_5_1),
            _ => None,
        }
    }

    /// Number of channels
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The channel positions in order
    #[inline]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Whether this layout borrows a static table rather than owning its list
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.channels, Cow::Borrowed(_))
    }
}

impl PartialEq for ChannelLayout {
    fn eq(&self, other: &Self) -> bool {
        // structural, never pointer identity
        self.channels() == other.channels()
    }
}

impl Eq for ChannelLayout {}

impl fmt::Debug for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel_count() {
            1 => write!(f, "mono"),
            2 => write!(f, "stereo"),
            6 => write!(f, "5.1"),
            n => write!(f, "{n}ch{:?}", self.channels()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let owned = ChannelLayout::custom(vec![Channel::FrontLeft, Channel::FrontRight]);
        assert_eq!(owned, ChannelLayout::STEREO);
        assert!(!owned.is_borrowed());
        assert!(ChannelLayout::STEREO.is_borrowed());
    }

    #[test]
    fn test_default_for_count() {
        assert_eq!(
            ChannelLayout::default_for_count(6),
            Some(ChannelLayout::SURROUND_5_1)
        );
        assert_eq!(ChannelLayout::default_for_count(3), None);
    }
}
