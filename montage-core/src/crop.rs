/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Crop sessions on the active layer: entering and leaving crop mode, tracking the
//! selection while the pointer drags, and committing the selection into a new raster.

use tracing::{debug, info, warn};

use crate::layer::{CropRect, Layer, LayerMode};
use crate::store::LayerStore;
use crate::{Bounds, EditError, Point};

/// Enters crop mode on the active layer, or leaves it if already cropping.
/// Returns whether the layer is now cropping.
pub fn toggle(store: &mut LayerStore) -> Result<bool, EditError> {
    let cropping = match store.active_layer() {
        Some(layer) => layer.is_cropping(),
        None => {
            warn!("crop toggled without a selected layer");
            return Err(EditError::NoActiveSelection);
        }
    };

    let mode = if cropping { LayerMode::Idle } else { LayerMode::Cropping };
    store.set_active_mode(mode);
    debug!(cropping = !cropping, "crop mode toggled");
    Ok(!cropping)
}

/// Leaves crop mode without touching the layer.
pub fn cancel(store: &mut LayerStore) {
    if let Some(layer) = store.active_layer_mut() {
        if layer.is_cropping() {
            layer.set_mode(LayerMode::Idle);
            debug!(id = %layer.id(), "crop cancelled");
        }
    }
}

pub(crate) fn begin(layer: &mut Layer, pointer: Point) {
    layer.set_crop(Some(CropRect::new(layer.to_local(pointer))));
}

pub(crate) fn update(layer: &mut Layer, pointer: Point) {
    let end = layer.to_local(pointer);
    if let Some(crop) = layer.crop() {
        layer.set_crop(Some(CropRect { end, ..crop }));
    }
}

/// Ends the pointer gesture. A selection under the minimum is dropped but the layer stays
/// in crop mode so a new one can be drawn.
pub(crate) fn finish(layer: &mut Layer, min_crop: f32) {
    if let Some(crop) = layer.crop() {
        let rect = crop.normalized();
        if rect.width < min_crop || rect.height < min_crop {
            debug!(width = rect.width, height = rect.height, "crop selection too small, discarded");
            layer.set_crop(None);
        }
    }
}

/// Maps a display-space rectangle inside `display` to whole source pixels `(x, y, w, h)`,
/// scaling each axis by `source / display` and staying inside the source image.
pub fn source_region(rect: &Bounds, display: &Bounds, source_width: u32, source_height: u32) -> (u32, u32, u32, u32) {
    fn axis(start: f32, len: f32, display_len: f32, source_len: u32) -> (u32, u32) {
        let scale = source_len as f32 / display_len;
        let max = source_len.saturating_sub(1);
        let s = ((start * scale).floor().max(0.0) as u32).min(max);
        let l = ((len * scale).round().max(1.0) as u32).min(source_len - s);
        (s, l)
    }

    let (x, w) = axis(rect.x, rect.width, display.width, source_width);
    let (y, h) = axis(rect.y, rect.height, display.height, source_height);
    (x, y, w, h)
}

/// Replaces the active layer's raster with the selected region. The layer keeps its origin
/// and shrinks to the selection's display size (never below `min_size`).
pub fn commit(store: &mut LayerStore, min_crop: f32, min_size: f32) -> Result<Bounds, EditError> {
    let layer = store.active_layer_mut().ok_or(EditError::NoActiveSelection)?;
    if !layer.is_cropping() {
        return Err(EditError::NotCropping);
    }

    let bounds = layer.bounds();
    let local = Bounds::new(0.0, 0.0, bounds.width, bounds.height);
    let rect = layer
        .crop()
        .and_then(|c| c.normalized().intersect(&local))
        .unwrap_or_default();

    if rect.width < min_crop || rect.height < min_crop {
        layer.set_mode(LayerMode::Idle);
        warn!(width = rect.width, height = rect.height, "crop region too small");
        return Err(EditError::CropRegionTooSmall {
            width: rect.width,
            height: rect.height,
        });
    }

    let raster = layer.raster();
    let (sx, sy, sw, sh) = source_region(&rect, &bounds, raster.width(), raster.height());
    let cropped = raster.extract(sx, sy, sw, sh);

    let new_bounds = Bounds::new(bounds.x, bounds.y, rect.width.max(min_size), rect.height.max(min_size));
    layer.replace_raster(cropped, new_bounds);
    layer.set_mode(LayerMode::Idle);
    info!(id = %layer.id(), source = ?(sx, sy, sw, sh), "crop committed");
    Ok(new_bounds)
}
