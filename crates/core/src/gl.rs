//! OpenGL texture backend
//!
//! Page textures are RGBA8, sampled bilinearly and clamped to the edge so
//! the page border does not bleed when the quad is scaled or rotated.

use glow::{HasContext, PixelUnpackData};
use pageview_cache::{GpuError, TextureBackend, TextureFilter};
use std::sync::Arc;

/// Internal format for page textures.
const RGBA8_INTERNAL_FORMAT: i32 = glow::RGBA8 as i32;

/// Texture backend for the current GL context.
pub struct GlowBackend {
    gl: Arc<glow::Context>,
}

impl GlowBackend {
    /// # Safety
    ///
    /// `gl` must be current on the calling thread whenever the backend is
    /// used, and the backend must not outlive the context.
    pub unsafe fn new(gl: Arc<glow::Context>) -> Self {
        Self { gl }
    }

    pub fn context(&self) -> &Arc<glow::Context> {
        &self.gl
    }
}

fn gl_size(value: u32) -> Result<i32, GpuError> {
    i32::try_from(value)
        .map_err(|_| GpuError::TextureCreationFailed(format!("dimension {value} exceeds GL limits")))
}

fn gl_filter(filter: TextureFilter) -> i32 {
    match filter {
        TextureFilter::Linear => glow::LINEAR as i32,
        TextureFilter::Nearest => glow::NEAREST as i32,
    }
}

impl TextureBackend for GlowBackend {
    type Texture = glow::Texture;

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        filter: TextureFilter,
    ) -> Result<glow::Texture, GpuError> {
        let (gl_width, gl_height) = (gl_size(width)?, gl_size(height)?);
        let gl = &self.gl;

        unsafe {
            let texture = gl.create_texture().map_err(GpuError::TextureCreationFailed)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, gl_filter(filter));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, gl_filter(filter));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                RGBA8_INTERNAL_FORMAT,
                gl_width,
                gl_height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(rgba)),
            );
            let error = gl.get_error();
            gl.bind_texture(glow::TEXTURE_2D, None);

            match error {
                glow::NO_ERROR => Ok(texture),
                glow::OUT_OF_MEMORY => {
                    gl.delete_texture(texture);
                    Err(GpuError::OutOfMemory { width, height })
                }
                other => {
                    gl.delete_texture(texture);
                    Err(GpuError::TextureCreationFailed(format!("GL error 0x{other:04x}")))
                }
            }
        }
    }

    fn destroy_texture(&mut self, texture: glow::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }
}
