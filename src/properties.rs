//! Codec properties: the format description of an encoded stream.
//!
//! A [`Properties`] value travels between containers and codecs during
//! stream negotiation. The *essential* subset (kind + format + time base,
//! plus dimensions/frame rate for video or layout/rate for audio) is what
//! may be propagated across a format boundary such as a remux; copying the
//! full set there is unsafe.

use crate::layout::ChannelLayout;
use crate::rational::Rational;

/// Kind of media a stream or codec carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
}

/// Pixel format of a video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp
    Yuv420p,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Y plane + interleaved UV plane
    Nv12,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Grayscale, 8bpp
    Gray8,
}

impl PixelFormat {
    /// Number of data planes
    pub fn plane_count(self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
            Self::Nv12 => 2,
            Self::Rgba | Self::Gray8 => 1,
        }
    }

    /// Logical row size in bytes for a plane at the given frame width
    pub fn row_bytes(self, plane: usize, width: u32) -> usize {
        let w = width as usize;
        match self {
            Self::Yuv420p | Self::Yuv422p => {
                if plane == 0 {
                    w
                } else {
                    w.div_ceil(2)
                }
            }
            Self::Yuv444p | Self::Gray8 => w,
            Self::Nv12 => w, // UV plane interleaves two subsampled samples per pair
            Self::Rgba => w * 4,
        }
    }

    /// Number of rows for a plane at the given frame height
    pub fn plane_rows(self, plane: usize, height: u32) -> usize {
        let h = height as usize;
        match self {
            Self::Yuv420p | Self::Nv12 => {
                if plane == 0 {
                    h
                } else {
                    h.div_ceil(2)
                }
            }
            Self::Yuv422p | Self::Yuv444p | Self::Rgba | Self::Gray8 => h,
        }
    }
}

/// Sample format of an audio frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleFormat {
    /// Signed 16-bit, interleaved
    S16,
    /// Signed 16-bit, planar
    S16p,
    /// 32-bit float, interleaved
    F32,
    /// 32-bit float, planar
    F32p,
}

impl SampleFormat {
    /// Bytes per single sample
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::S16 | Self::S16p => 2,
            Self::F32 | Self::F32p => 4,
        }
    }

    /// Check if samples are stored one plane per channel
    pub fn is_planar(self) -> bool {
        matches!(self, Self::S16p | Self::F32p)
    }
}

/// Format description of an encoded stream
///
/// Always a valid value; fields irrelevant to the media kind stay at their
/// defaults and are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Properties {
    /// Media kind
    pub kind: MediaKind,
    /// Time base timestamps are expressed in
    pub time_base: Rational,
    /// Target/observed bit rate in bits per second (0 = unknown)
    pub bit_rate: i64,

    /// Video pixel format
    pub pixel_format: Option<PixelFormat>,
    /// Video width in pixels
    pub width: u32,
    /// Video height in pixels
    pub height: u32,
    /// Video sample (pixel) aspect ratio
    pub sample_aspect_ratio: Rational,
    /// Video frame rate
    pub frame_rate: Rational,

    /// Audio sample format
    pub sample_format: Option<SampleFormat>,
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    /// Audio channel layout
    pub channel_layout: Option<ChannelLayout>,
}

impl Properties {
    /// Create properties for the given media kind with everything else unset
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            time_base: Rational::new(1, 1_000_000),
            bit_rate: 0,
            pixel_format: None,
            width: 0,
            height: 0,
            sample_aspect_ratio: Rational::ONE,
            frame_rate: Rational::ZERO,
            sample_format: None,
            sample_rate: 0,
            channel_layout: None,
        }
    }

    /// Video properties with the common fields filled in
    pub fn video(width: u32, height: u32, pixel_format: PixelFormat, frame_rate: Rational) -> Self {
        let mut props = Self::new(MediaKind::Video);
        props.width = width;
        props.height = height;
        props.pixel_format = Some(pixel_format);
        props.frame_rate = frame_rate;
        if !frame_rate.is_zero() {
            props.time_base = frame_rate.invert();
        }
        props
    }

    /// Audio properties with the common fields filled in
    pub fn audio(sample_rate: u32, sample_format: SampleFormat, layout: ChannelLayout) -> Self {
        let mut props = Self::new(MediaKind::Audio);
        props.sample_rate = sample_rate;
        props.sample_format = Some(sample_format);
        props.channel_layout = Some(layout);
        if sample_rate > 0 {
            props.time_base = Rational::new(1, sample_rate as i64);
        }
        props
    }

    /// Copy of the essential subset, with every other field at its default
    ///
    /// Essential: kind, format, time base, plus dimensions / aspect ratio /
    /// frame rate for video or channel layout / sample rate for audio.
    pub fn essential(&self) -> Properties {
        let mut out = Properties::new(self.kind);
        out.time_base = self.time_base;
        match self.kind {
            MediaKind::Video => {
                out.pixel_format = self.pixel_format;
                out.width = self.width;
                out.height = self.height;
                out.sample_aspect_ratio = self.sample_aspect_ratio;
                out.frame_rate = self.frame_rate;
            }
            MediaKind::Audio => {
                out.sample_format = self.sample_format;
                out.sample_rate = self.sample_rate;
                out.channel_layout = self.channel_layout.clone();
            }
            MediaKind::Subtitle => {}
        }
        out
    }

    /// Overwrite this value's essential subset with `other`'s
    ///
    /// Non-essential fields are left untouched. The media kind must match.
    pub fn apply_essential_from(&mut self, other: &Properties) {
        debug_assert_eq!(self.kind, other.kind);
        self.time_base = other.time_base;
        match self.kind {
            MediaKind::Video => {
                self.pixel_format = other.pixel_format;
                self.width = other.width;
                self.height = other.height;
                self.sample_aspect_ratio = other.sample_aspect_ratio;
                self.frame_rate = other.frame_rate;
            }
            MediaKind::Audio => {
                self.sample_format = other.sample_format;
                self.sample_rate = other.sample_rate;
                self.channel_layout = other.channel_layout.clone();
            }
            MediaKind::Subtitle => {}
        }
    }
}
