/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::hit::Handle;
use crate::{Bounds, Point};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Decoded image content. Cloning shares the pixels.
#[derive(Clone)]
pub struct Raster {
    pixels: Arc<RgbaImage>,
}

impl Raster {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels: Arc::new(pixels) }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::new(decoded.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both handles point at the same pixel buffer.
    pub fn same_content(&self, other: &Raster) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Copies a source-space sub-region into a new raster. The region must lie inside the image.
    pub fn extract(&self, x: u32, y: u32, width: u32, height: u32) -> Raster {
        Raster::new(image::imageops::crop_imm(self.pixels.as_ref(), x, y, width, height).to_image())
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum LayerMode {
    #[default]
    Idle,
    Dragging,
    Resizing(Handle),
    Cropping,
}

/// Crop selection corners in layer-local display coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CropRect {
    pub start: Point,
    pub end: Point,
}

impl CropRect {
    pub fn new(start: Point) -> Self {
        Self { start, end: start }
    }

    /// The selection as a rectangle, independent of drag direction.
    pub fn normalized(&self) -> Bounds {
        Bounds::new(
            self.start.x.min(self.end.x),
            self.start.y.min(self.end.y),
            (self.start.x - self.end.x).abs(),
            (self.start.y - self.end.y).abs(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    raster: Raster,
    bounds: Bounds,
    mode: LayerMode,
    crop: Option<CropRect>,
}

impl Layer {
    pub(crate) fn new(id: LayerId, raster: Raster, bounds: Bounds) -> Self {
        Self {
            id,
            raster,
            bounds,
            mode: LayerMode::Idle,
            crop: None,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn mode(&self) -> LayerMode {
        self.mode
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    pub fn is_cropping(&self) -> bool {
        self.mode == LayerMode::Cropping
    }

    /// Converts a canvas point into this layer's local display space.
    pub fn to_local(&self, p: Point) -> Point {
        p - self.bounds.origin()
    }

    pub(crate) fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub(crate) fn set_mode(&mut self, mode: LayerMode) {
        if mode != LayerMode::Cropping {
            self.crop = None;
        }
        self.mode = mode;
    }

    pub(crate) fn set_crop(&mut self, crop: Option<CropRect>) {
        self.crop = crop;
    }

    pub(crate) fn replace_raster(&mut self, raster: Raster, bounds: Bounds) {
        self.raster = raster;
        self.bounds = bounds;
    }
}
