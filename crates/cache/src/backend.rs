//! GPU texture abstraction
//!
//! The cache only needs two GPU operations: allocate+upload and destroy.
//! Both are called on the thread that owns the graphics context.

use std::collections::HashMap;
use std::fmt;

/// Sampling filter applied when the page quad is scaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureFilter {
    /// Bilinear minification and magnification.
    #[default]
    Linear,
    Nearest,
}

/// GPU backend error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpuError {
    /// Allocation failed for lack of texture memory. Evicting other
    /// textures may help.
    #[error("out of texture memory allocating {width}x{height}")]
    OutOfMemory { width: u32, height: u32 },
    /// Any other failure; retrying will not help.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),
}

/// Texture allocation for one graphics context.
pub trait TextureBackend {
    /// Opaque handle of a live texture.
    type Texture: Copy + Eq + fmt::Debug;

    /// Allocate a `width` x `height` RGBA8 texture and upload `rgba` into it.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        filter: TextureFilter,
    ) -> Result<Self::Texture, GpuError>;

    /// Release a texture created by this backend.
    fn destroy_texture(&mut self, texture: Self::Texture);
}

/// Handle issued by [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeadlessTexture(pub u64);

#[derive(Debug, Clone, Copy)]
struct HeadlessAllocation {
    width: u32,
    height: u32,
    filter: TextureFilter,
}

impl HeadlessAllocation {
    fn bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// In-memory backend for headless runs and tests.
///
/// Tracks every live allocation and can simulate a device with limited
/// texture memory.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    live: HashMap<HeadlessTexture, HeadlessAllocation>,
    max_bytes: Option<usize>,
    fail_next: usize,
    reject_next: usize,
    created: u64,
    destroyed: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse allocations that would push live texture memory past `bytes`.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.max_bytes = Some(bytes);
        self
    }

    /// Make the next `count` allocations fail with `OutOfMemory`.
    pub fn fail_next_allocations(&mut self, count: usize) {
        self.fail_next = count;
    }

    /// Make the next `count` allocations fail with `TextureCreationFailed`.
    pub fn reject_next_allocations(&mut self, count: usize) {
        self.reject_next = count;
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_bytes(&self) -> usize {
        self.live.values().map(HeadlessAllocation::bytes).sum()
    }

    pub fn is_live(&self, texture: HeadlessTexture) -> bool {
        self.live.contains_key(&texture)
    }

    /// Dimensions of a live texture.
    pub fn texture_size(&self, texture: HeadlessTexture) -> Option<(u32, u32)> {
        self.live.get(&texture).map(|a| (a.width, a.height))
    }

    pub fn texture_filter(&self, texture: HeadlessTexture) -> Option<TextureFilter> {
        self.live.get(&texture).map(|a| a.filter)
    }

    /// Total textures ever created.
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Total textures ever destroyed.
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }
}

impl TextureBackend for HeadlessBackend {
    type Texture = HeadlessTexture;

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        filter: TextureFilter,
    ) -> Result<HeadlessTexture, GpuError> {
        let allocation = HeadlessAllocation { width, height, filter };
        if rgba.len() != allocation.bytes() {
            return Err(GpuError::TextureCreationFailed(format!(
                "expected {} bytes for {width}x{height}, got {}",
                allocation.bytes(),
                rgba.len()
            )));
        }

        if self.reject_next > 0 {
            self.reject_next -= 1;
            return Err(GpuError::TextureCreationFailed("rejected by device".to_owned()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(GpuError::OutOfMemory { width, height });
        }
        if let Some(limit) = self.max_bytes {
            if self.live_bytes() + allocation.bytes() > limit {
                return Err(GpuError::OutOfMemory { width, height });
            }
        }

        self.next_id += 1;
        let texture = HeadlessTexture(self.next_id);
        self.live.insert(texture, allocation);
        self.created += 1;
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: HeadlessTexture) {
        if self.live.remove(&texture).is_some() {
            self.destroyed += 1;
        } else {
            tracing::warn!(?texture, "destroying unknown texture");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let mut backend = HeadlessBackend::new();
        let texture = backend.create_texture(2, 2, &[0; 16], TextureFilter::Linear).unwrap();

        assert!(backend.is_live(texture));
        assert_eq!(backend.texture_size(texture), Some((2, 2)));
        assert_eq!(backend.texture_filter(texture), Some(TextureFilter::Linear));
        assert_eq!(backend.live_bytes(), 16);

        backend.destroy_texture(texture);
        assert!(!backend.is_live(texture));
        assert_eq!(backend.created(), 1);
        assert_eq!(backend.destroyed(), 1);
    }

    #[test]
    fn test_rejected_allocation_is_not_out_of_memory() {
        let mut backend = HeadlessBackend::new();
        backend.reject_next_allocations(1);

        let err = backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).unwrap_err();
        assert!(matches!(err, GpuError::TextureCreationFailed(_)));
        assert_eq!(backend.live_count(), 0);
        assert!(backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).is_ok());
    }

    #[test]
    fn test_handles_are_unique() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).unwrap();
        backend.destroy_texture(a);
        let b = backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let mut backend = HeadlessBackend::new();
        let err = backend.create_texture(2, 2, &[0; 15], TextureFilter::Linear).unwrap_err();
        assert!(matches!(err, GpuError::TextureCreationFailed(_)));
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_memory_limit() {
        let mut backend = HeadlessBackend::new().with_memory_limit(32);
        backend.create_texture(2, 2, &[0; 16], TextureFilter::Linear).unwrap();
        let second = backend.create_texture(2, 2, &[0; 16], TextureFilter::Linear).unwrap();

        let err = backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).unwrap_err();
        assert_eq!(err, GpuError::OutOfMemory { width: 1, height: 1 });

        backend.destroy_texture(second);
        assert!(backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).is_ok());
    }

    #[test]
    fn test_injected_failures() {
        let mut backend = HeadlessBackend::new();
        backend.fail_next_allocations(2);

        assert!(backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).is_err());
        assert!(backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).is_err());
        assert!(backend.create_texture(1, 1, &[0; 4], TextureFilter::Linear).is_ok());
    }

    #[test]
    fn test_destroy_unknown_is_harmless() {
        let mut backend = HeadlessBackend::new();
        backend.destroy_texture(HeadlessTexture(42));
        assert_eq!(backend.destroyed(), 0);
    }
}
