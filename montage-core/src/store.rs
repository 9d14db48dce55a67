/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::layer::{Layer, LayerId, LayerMode, Raster};
use crate::Bounds;

/// Ordered layer collection. The last layer is topmost: painted last, hit-tested first.
#[derive(Debug, Default)]
pub struct LayerStore {
    layers: Vec<Layer>,
    active: Option<usize>,
    next_id: u64,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a layer on top of the stack and makes it active.
    pub fn append(&mut self, raster: Raster, bounds: Bounds) -> LayerId {
        self.next_id += 1;
        let id = LayerId(self.next_id);

        self.layers.push(Layer::new(id, raster, bounds));
        self.activate(Some(self.layers.len() - 1));
        info!(%id, index = self.layers.len() - 1, "layer appended");
        id
    }

    /// Removes the layer at `index`; out-of-range indices are ignored.
    pub fn remove_at(&mut self, index: usize) -> Option<Layer> {
        if index >= self.layers.len() {
            return None;
        }

        let removed = self.layers.remove(index);
        let next_active = match self.active {
            Some(active) if active == index => self.layers.len().checked_sub(1),
            Some(active) if index < active => Some(active - 1),
            other => other,
        };

        // The layer now sitting at the active slot may differ from the one that was active.
        if self.active == Some(index) {
            self.reset_modes();
        }
        self.active = next_active;
        info!(id = %removed.id(), index, active = ?self.active, "layer removed");
        Some(removed)
    }

    /// Moves the layer at `index` to the top and makes it active.
    pub fn bring_to_front(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }

        let was_active = self.active == Some(index);
        let layer = self.layers.remove(index);
        self.layers.push(layer);

        // Compare by identity: the previously active slot may now hold a different layer.
        if !was_active {
            self.reset_modes();
        }
        let top = self.layers.len() - 1;
        self.active = Some(top);
        debug!(from = index, to = top, "layer brought to front");
        true
    }

    /// Makes the layer at `index` active without reordering.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.activate(Some(index));
        true
    }

    pub fn deselect(&mut self) {
        self.activate(None);
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.and_then(|i| self.layers.get(i))
    }

    pub(crate) fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        self.active.and_then(|i| self.layers.get_mut(i))
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(Layer::id).collect()
    }

    /// Sets the active layer's mode. Every other layer drops back to idle so only one
    /// layer is ever being manipulated.
    pub(crate) fn set_active_mode(&mut self, mode: LayerMode) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        for (i, layer) in self.layers.iter_mut().enumerate() {
            if i == active {
                layer.set_mode(mode);
            } else if layer.mode() != LayerMode::Idle {
                layer.set_mode(LayerMode::Idle);
            }
        }
        true
    }

    /// Centered placement for a new raster, scaled down to fit the canvas and nudged
    /// off any existing layer origin.
    pub fn default_bounds(&self, source_width: u32, source_height: u32, config: &EditorConfig) -> Bounds {
        let src_w = source_width.max(1) as f32;
        let src_h = source_height.max(1) as f32;

        let max_w = config.canvas_width as f32 * config.placement_fraction;
        let max_h = config.canvas_height as f32 * config.placement_fraction;
        let scale = (max_w / src_w).min(max_h / src_h).min(1.0);

        let width = (src_w * scale).max(config.min_size);
        let height = (src_h * scale).max(config.min_size);
        let mut x = (config.canvas_width as f32 - width) / 2.0;
        let mut y = (config.canvas_height as f32 - height) / 2.0;

        // Each step can only collide with a different layer, so len + 1 steps always suffice.
        for _ in 0..=self.layers.len() {
            let occupied = self.layers.iter().any(|l| {
                let b = l.bounds();
                b.x == x && b.y == y
            });
            if !occupied {
                break;
            }
            x += config.cascade_offset;
            y += config.cascade_offset;
        }

        Bounds::new(x, y, width, height)
    }

    fn activate(&mut self, index: Option<usize>) {
        if self.active != index {
            self.reset_modes();
        }
        self.active = index;
    }

    fn reset_modes(&mut self) {
        for layer in &mut self.layers {
            if layer.mode() != LayerMode::Idle {
                layer.set_mode(LayerMode::Idle);
            }
        }
    }
}
