/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use tracing::debug;

use crate::config::EditorConfig;
use crate::crop;
use crate::hit::{Cursor, HitTarget, HitTester};
use crate::layer::LayerMode;
use crate::store::LayerStore;
use crate::transform::{DragGrab, ResizeGrab};
use crate::Point;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up(Point),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Idle,
    Dragging(DragGrab),
    Resizing(ResizeGrab),
    Cropping,
}

/// Turns pointer events into layer manipulation. Gestures always target the active layer.
#[derive(Debug)]
pub struct PointerInputController {
    hit: HitTester,
    gesture: Gesture,
    min_size: f32,
    min_crop: f32,
    aspect_lock: bool,
}

impl PointerInputController {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            hit: HitTester::from_config(config),
            gesture: Gesture::Idle,
            min_size: config.min_size,
            min_crop: config.min_crop_size,
            aspect_lock: config.aspect_lock,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    pub fn cursor(&self, store: &LayerStore, point: Point) -> Cursor {
        self.hit.cursor_at(store, point)
    }

    /// Drops any gesture in progress. Call after the store is changed outside of pointer input.
    pub fn reset(&mut self, store: &mut LayerStore) {
        if let Some(layer) = store.active_layer() {
            if matches!(layer.mode(), LayerMode::Dragging | LayerMode::Resizing(_)) {
                store.set_active_mode(LayerMode::Idle);
            }
        }
        self.gesture = Gesture::Idle;
    }

    /// Feeds one event through the state machine; returns whether the store changed.
    pub fn handle(&mut self, store: &mut LayerStore, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Down(p) => self.pointer_down(store, p),
            PointerEvent::Move(p) => self.pointer_move(store, p),
            PointerEvent::Up(p) => self.pointer_up(store, p),
        }
    }

    pub fn pointer_down(&mut self, store: &mut LayerStore, p: Point) -> bool {
        if let Some(layer) = store.active_layer_mut() {
            if layer.is_cropping() {
                if !layer.bounds().contains(p) {
                    return false;
                }
                crop::begin(layer, p);
                self.gesture = Gesture::Cropping;
                debug!(id = %layer.id(), x = p.x, y = p.y, "crop selection started");
                return true;
            }
        }

        match self.hit.hit_test(store, p) {
            HitTarget::Handle(handle) => {
                let Some(bounds) = store.active_layer().map(|l| l.bounds()) else {
                    return false;
                };
                self.gesture = Gesture::Resizing(ResizeGrab::new(handle, &bounds, p));
                store.set_active_mode(LayerMode::Resizing(handle));
                debug!(?handle, "resize started");
            }
            HitTarget::Layer(index) => {
                store.bring_to_front(index);
                let Some(bounds) = store.active_layer().map(|l| l.bounds()) else {
                    return false;
                };
                self.gesture = Gesture::Dragging(DragGrab::new(&bounds, p));
                store.set_active_mode(LayerMode::Dragging);
                debug!(from = index, "drag started");
            }
            HitTarget::None => {
                self.gesture = Gesture::Idle;
                store.deselect();
                debug!("selection cleared");
            }
        }
        true
    }

    pub fn pointer_move(&mut self, store: &mut LayerStore, p: Point) -> bool {
        let Some(layer) = store.active_layer_mut() else {
            self.gesture = Gesture::Idle;
            return false;
        };

        match self.gesture {
            Gesture::Idle => false,
            Gesture::Dragging(grab) => {
                let next = grab.apply(&layer.bounds(), p);
                layer.set_bounds(next);
                true
            }
            Gesture::Resizing(grab) => {
                layer.set_bounds(grab.apply(p, self.min_size, self.aspect_lock));
                true
            }
            Gesture::Cropping => {
                crop::update(layer, p);
                true
            }
        }
    }

    pub fn pointer_up(&mut self, store: &mut LayerStore, p: Point) -> bool {
        let changed = self.pointer_move(store, p);
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);

        match gesture {
            Gesture::Idle => changed,
            Gesture::Dragging(_) | Gesture::Resizing(_) => {
                store.set_active_mode(LayerMode::Idle);
                debug!(bounds = ?store.active_layer().map(|l| l.bounds()), "gesture released");
                true
            }
            Gesture::Cropping => {
                if let Some(layer) = store.active_layer_mut() {
                    crop::finish(layer, self.min_crop);
                }
                true
            }
        }
    }
}
