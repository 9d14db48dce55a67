/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Pixel operations applied to the composited canvas. Inputs are straight-alpha RGBA
//! buffers; each operation returns the image to paint, or an error if nothing should be painted.

use std::future::Future;

use image::{Rgba, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PixelError {
    #[error("Buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Input buffers differ in size")]
    DimensionMismatch,

    #[error("Codec error: {0}")]
    Codec(String),
}

pub trait PixelService {
    fn grayscale(&self, width: u32, height: u32, rgba: &[u8]) -> Result<RgbaImage, PixelError>;

    /// Left half from `a`, right half from `b`. Both buffers share `width` x `height`.
    fn merge_halves(&self, width: u32, height: u32, a: &[u8], b: &[u8]) -> Result<RgbaImage, PixelError>;

    /// Re-encodes and decodes the image. `quality >= 1` is lossless, anything lower is lossy.
    fn compress(
        &self,
        width: u32,
        height: u32,
        rgba: &[u8],
        quality: f32,
    ) -> impl Future<Output = Result<RgbaImage, PixelError>>;
}

/// In-process implementation on top of the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePixelService;

impl PixelService for NativePixelService {
    fn grayscale(&self, width: u32, height: u32, rgba: &[u8]) -> Result<RgbaImage, PixelError> {
        let img = buffer(width, height, rgba)?;
        let mut processed = RgbaImage::new(width, height);

        for (x, y, pixel) in img.enumerate_pixels() {
            let gray = (
                (pixel[0] as f32 * 0.299) +
                (pixel[1] as f32 * 0.587) +
                (pixel[2] as f32 * 0.114)
            ) as u8;

            processed.put_pixel(x, y, Rgba([gray, gray, gray, pixel[3]]));
        }

        Ok(processed)
    }

    fn merge_halves(&self, width: u32, height: u32, a: &[u8], b: &[u8]) -> Result<RgbaImage, PixelError> {
        if a.len() != b.len() {
            return Err(PixelError::DimensionMismatch);
        }
        let left = buffer(width, height, a)?;
        let right = buffer(width, height, b)?;
        let split = width / 2;

        Ok(RgbaImage::from_fn(width, height, |x, y| {
            if x < split {
                *left.get_pixel(x, y)
            } else {
                *right.get_pixel(x, y)
            }
        }))
    }

    async fn compress(&self, width: u32, height: u32, rgba: &[u8], quality: f32) -> Result<RgbaImage, PixelError> {
        let img = buffer(width, height, rgba)?;
        let format = if quality >= 1.0 {
            crate::ExportFormat::Png
        } else {
            crate::ExportFormat::Jpeg {
                quality: (quality.max(0.0) * 100.0).round().clamp(1.0, 100.0) as u8,
            }
        };

        let encoded = crate::encode(&img, format).map_err(|e| PixelError::Codec(e.to_string()))?;
        let decoded = image::load_from_memory(&encoded).map_err(|e| PixelError::Codec(e.to_string()))?;
        Ok(decoded.to_rgba8())
    }
}

fn buffer(width: u32, height: u32, rgba: &[u8]) -> Result<RgbaImage, PixelError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(PixelError::BufferSize { expected, actual: rgba.len() });
    }
    RgbaImage::from_raw(width, height, rgba.to_vec())
        .ok_or(PixelError::BufferSize { expected, actual: rgba.len() })
}
