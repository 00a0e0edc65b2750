//! Decoded media frames.
//!
//! A frame is a lifecycle-managed buffer holding one decoded picture or one
//! block of audio samples as data planes. Plane storage is built through a
//! mutable [`FrameBuilder`] and *published* into an immutable
//! `Arc<FrameData>`; after publication any number of frames may share it.
//! Strides are signed — a negative stride stores rows bottom-up — and may
//! exceed the logical row size to carry alignment padding.

use std::sync::Arc;

use crate::error::{MediaError, MediaResult};
use crate::layout::ChannelLayout;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::properties::{MediaKind, PixelFormat, SampleFormat};
use crate::rational::Rational;

/// Row alignment applied to plane strides, in bytes
const PLANE_ALIGN: usize = 32;

/// Geometry of one data plane inside a frame's storage block
#[derive(Debug, Clone, Copy)]
pub struct PlaneDesc {
    /// Byte offset of row 0 within the block
    offset: usize,
    /// Signed distance in bytes between consecutive rows
    stride: isize,
    /// Number of rows
    rows: usize,
    /// Logical (unpadded) bytes per row
    row_bytes: usize,
}

impl PlaneDesc {
    /// Signed stride in bytes
    #[inline]
    pub fn stride(&self) -> isize {
        self.stride
    }

    /// Number of rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical bytes per row (padding excluded)
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }
}

/// Immutable, reference-counted plane storage
#[derive(Debug)]
pub struct FrameData {
    block: Box<[u8]>,
    planes: Vec<PlaneDesc>,
}

impl FrameData {
    /// Number of planes
    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Plane geometry
    pub fn plane(&self, plane: usize) -> Option<&PlaneDesc> {
        self.planes.get(plane)
    }

    /// One logical row of a plane, padding excluded
    pub fn row(&self, plane: usize, row: usize) -> Option<&[u8]> {
        let desc = self.planes.get(plane)?;
        if row >= desc.rows {
            return None;
        }
        let start = desc.offset as isize + row as isize * desc.stride;
        let start = usize::try_from(start).ok()?;
        self.block.get(start..start + desc.row_bytes)
    }

    fn byte_size(&self) -> usize {
        self.block.len()
    }

    fn deep_copy(&self) -> FrameData {
        FrameData {
            block: self.block.clone(),
            planes: self.planes.clone(),
        }
    }
}

/// Mutable construction phase of frame storage
///
/// All writes happen here; `publish()` freezes the block behind an `Arc`.
pub struct FrameBuilder {
    block: Vec<u8>,
    planes: Vec<PlaneDesc>,
}

impl FrameBuilder {
    /// Plan video plane storage for the given format and dimensions
    pub fn video(width: u32, height: u32, format: PixelFormat) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidInput(format!(
                "zero frame dimension {width}x{height}"
            )));
        }
        let mut planes = Vec::with_capacity(format.plane_count());
        let mut offset = 0usize;
        for p in 0..format.plane_count() {
            let row_bytes = format.row_bytes(p, width);
            let padded = row_bytes.div_ceil(PLANE_ALIGN) * PLANE_ALIGN;
            let rows = format.plane_rows(p, height);
            planes.push(PlaneDesc {
                offset,
                stride: padded as isize,
                rows,
                row_bytes,
            });
            offset += padded * rows;
        }
        Ok(Self {
            block: vec![0; offset],
            planes,
        })
    }

    /// Plan audio plane storage: one plane for interleaved formats, one per
    /// channel for planar formats
    pub fn audio(
        nb_samples: usize,
        format: SampleFormat,
        layout: &ChannelLayout,
    ) -> MediaResult<Self> {
        if nb_samples == 0 {
            return Err(MediaError::InvalidInput("zero sample count".into()));
        }
        let channels = layout.channel_count();
        let bps = format.bytes_per_sample();
        let (plane_count, row_bytes) = if format.is_planar() {
            (channels, nb_samples * bps)
        } else {
            (1, nb_samples * channels * bps)
        };
        let padded = row_bytes.div_ceil(PLANE_ALIGN) * PLANE_ALIGN;
        let planes = (0..plane_count)
            .map(|p| PlaneDesc {
                offset: p * padded,
                stride: padded as isize,
                rows: 1,
                row_bytes,
            })
            .collect();
        Ok(Self {
            block: vec![0; plane_count * padded],
            planes,
        })
    }

    /// Flip a plane to bottom-up storage (negative stride)
    ///
    /// Row 0 then addresses the last stored row. The storage block is
    /// unchanged; only the view direction flips.
    pub fn flip_vertical(&mut self, plane: usize) -> MediaResult<()> {
        let desc = self
            .planes
            .get_mut(plane)
            .ok_or_else(|| MediaError::InvalidInput(format!("no plane {plane}")))?;
        let span = desc.stride.unsigned_abs() * (desc.rows - 1);
        if desc.stride > 0 {
            desc.offset += span;
        } else {
            desc.offset -= span;
        }
        desc.stride = -desc.stride;
        Ok(())
    }

    /// Mutable access to one logical row of a plane
    pub fn row_mut(&mut self, plane: usize, row: usize) -> Option<&mut [u8]> {
        let desc = *self.planes.get(plane)?;
        if row >= desc.rows {
            return None;
        }
        let start = desc.offset as isize + row as isize * desc.stride;
        let start = usize::try_from(start).ok()?;
        self.block.get_mut(start..start + desc.row_bytes)
    }

    /// Fill every logical row of a plane with one byte value
    pub fn fill_plane(&mut self, plane: usize, value: u8) -> MediaResult<()> {
        let rows = self
            .planes
            .get(plane)
            .ok_or_else(|| MediaError::InvalidInput(format!("no plane {plane}")))?
            .rows;
        for row in 0..rows {
            if let Some(slice) = self.row_mut(plane, row) {
                slice.fill(value);
            }
        }
        Ok(())
    }

    /// Freeze the storage; no further mutation is possible
    pub fn publish(self) -> Arc<FrameData> {
        Arc::new(FrameData {
            block: self.block.into_boxed_slice(),
            planes: self.planes,
        })
    }
}

/// Per-frame metadata, held by the frame shell
#[derive(Debug, Clone)]
struct FrameMeta {
    kind: MediaKind,
    pixel_format: Option<PixelFormat>,
    width: u32,
    height: u32,
    sample_format: Option<SampleFormat>,
    sample_rate: u32,
    nb_samples: usize,
    channel_layout: Option<ChannelLayout>,
    pts: Option<i64>,
    duration: Option<i64>,
    time_base: Rational,
}

impl FrameMeta {
    fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            pixel_format: None,
            width: 0,
            height: 0,
            sample_format: None,
            sample_rate: 0,
            nb_samples: 0,
            channel_layout: None,
            pts: None,
            duration: None,
            time_base: Rational::new(1, 1_000_000),
        }
    }
}

/// One unit of decoded media with lifecycle-managed storage
///
/// Shell = metadata, resource = the published plane storage.
#[derive(Debug)]
pub struct Frame {
    lifecycle: Lifecycle,
    meta: Option<FrameMeta>,
    data: Option<Arc<FrameData>>,
}

impl Frame {
    /// Allocate an empty frame shell (`Created`, no storage)
    pub fn new(kind: MediaKind) -> MediaResult<Self> {
        let mut frame = Self::empty();
        let meta = frame
            .lifecycle
            .allocate_shell(|| Ok(FrameMeta::empty(kind)))?;
        frame.meta = Some(meta);
        Ok(frame)
    }

    /// A placeholder with no backing memory (`Destroyed`)
    ///
    /// This is what a moved-from frame becomes.
    pub fn empty() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            meta: None,
            data: None,
        }
    }

    /// Allocate a video frame with zeroed plane storage (`Ready`)
    pub fn alloc_video(width: u32, height: u32, format: PixelFormat) -> MediaResult<Self> {
        let mut frame = Self::new(MediaKind::Video)?;
        let builder = FrameBuilder::video(width, height, format)?;
        frame.adopt_storage_video(width, height, format, builder.publish())?;
        Ok(frame)
    }

    /// Allocate an audio frame with zeroed sample storage (`Ready`)
    pub fn alloc_audio(
        nb_samples: usize,
        format: SampleFormat,
        sample_rate: u32,
        layout: ChannelLayout,
    ) -> MediaResult<Self> {
        let mut frame = Self::new(MediaKind::Audio)?;
        let builder = FrameBuilder::audio(nb_samples, format, &layout)?;
        let data = builder.publish();
        frame.adopt_storage_audio(nb_samples, format, sample_rate, layout, data)?;
        Ok(frame)
    }

    /// Enter `Ready` by adopting already-published video storage
    ///
    /// A rejected call (frame not `Created`) leaves metadata and storage
    /// untouched.
    pub fn adopt_storage_video(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Arc<FrameData>,
    ) -> MediaResult<()> {
        self.lifecycle.allocate_resource(|| Ok(()))?;
        let meta = self.meta.as_mut().expect("Created implies shell");
        meta.width = width;
        meta.height = height;
        meta.pixel_format = Some(format);
        self.data = Some(data);
        Ok(())
    }

    /// Enter `Ready` by adopting already-published audio storage
    ///
    /// A rejected call (frame not `Created`) leaves metadata and storage
    /// untouched.
    pub fn adopt_storage_audio(
        &mut self,
        nb_samples: usize,
        format: SampleFormat,
        sample_rate: u32,
        layout: ChannelLayout,
        data: Arc<FrameData>,
    ) -> MediaResult<()> {
        self.lifecycle.allocate_resource(|| Ok(()))?;
        let meta = self.meta.as_mut().expect("Created implies shell");
        meta.nb_samples = nb_samples;
        meta.sample_format = Some(format);
        meta.sample_rate = sample_rate;
        meta.channel_layout = Some(layout);
        self.data = Some(data);
        Ok(())
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Check if storage is allocated
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Media kind, if the shell exists
    pub fn kind(&self) -> Option<MediaKind> {
        self.meta.as_ref().map(|m| m.kind)
    }

    /// Video width in pixels (0 when not a video frame)
    pub fn width(&self) -> u32 {
        self.meta.as_ref().map_or(0, |m| m.width)
    }

    /// Video height in pixels (0 when not a video frame)
    pub fn height(&self) -> u32 {
        self.meta.as_ref().map_or(0, |m| m.height)
    }

    /// Video pixel format
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.meta.as_ref().and_then(|m| m.pixel_format)
    }

    /// Audio sample format
    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.meta.as_ref().and_then(|m| m.sample_format)
    }

    /// Audio sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.meta.as_ref().map_or(0, |m| m.sample_rate)
    }

    /// Number of audio samples per channel
    pub fn nb_samples(&self) -> usize {
        self.meta.as_ref().map_or(0, |m| m.nb_samples)
    }

    /// Audio channel layout
    pub fn channel_layout(&self) -> Option<&ChannelLayout> {
        self.meta.as_ref().and_then(|m| m.channel_layout.as_ref())
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

    /// Time base of pts and duration
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

    /// Published storage, if `Ready`
    pub fn data(&self) -> Option<&FrameData> {
        self.data.as_deref()
    }

    /// Check if two frames share the same underlying storage
    pub fn shares_storage_with(&self, other: &Frame) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// New frame sharing this frame's storage (`Ready`)
    pub fn share(&self) -> MediaResult<Frame> {
        self.lifecycle
            .require(LifecycleState::Ready, "share: frame not Ready")?;
        let meta = self.meta.as_ref().expect("Ready implies shell");
        let mut out = Frame::empty();
        let cloned = out.lifecycle.allocate_shell(|| Ok(meta.clone()))?;
        out.meta = Some(cloned);
        out.lifecycle.allocate_resource(|| Ok(()))?;
        out.data = self.data.clone();
        Ok(out)
    }

    /// Deep copy into independent storage (`Ready`)
    pub fn try_clone(&self) -> MediaResult<Frame> {
        let mut out = self.share()?;
        let src = out.data.as_ref().expect("Ready implies data");
        out.data = Some(Arc::new(src.deep_copy()));
        Ok(out)
    }

    /// Release storage, keeping the shell (`Ready → Created`)
    pub fn release_data(&mut self) -> MediaResult<()> {
        self.lifecycle.release_resource(|| Ok(()))?;
        self.data = None;
        Ok(())
    }

    /// Move this frame out, leaving `self` `Destroyed`
    pub fn take(&mut self) -> Frame {
        Frame {
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

    /// Total bytes of plane storage (0 unless `Ready`)
    pub fn byte_size(&self) -> usize {
        self.data().map_or(0, |d| d.byte_size())
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.destroy();
    }
}
