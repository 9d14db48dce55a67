/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Geometry for moving and resizing layers. Everything here is a pure function of the
//! state captured when the pointer went down and the current pointer position.

use crate::hit::Handle;
use crate::{Bounds, Point};

/// State captured when a layer body is grabbed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragGrab {
    offset: Point,
}

impl DragGrab {
    pub fn new(bounds: &Bounds, pointer: Point) -> Self {
        Self { offset: pointer - bounds.origin() }
    }

    /// Moves the origin so the grabbed point stays under the pointer. No clamping to the canvas.
    pub fn apply(&self, bounds: &Bounds, pointer: Point) -> Bounds {
        Bounds {
            x: pointer.x - self.offset.x,
            y: pointer.y - self.offset.y,
            ..*bounds
        }
    }
}

/// State captured when a resize handle is grabbed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeGrab {
    handle: Handle,
    original: Bounds,
    grab: Point,
}

impl ResizeGrab {
    pub fn new(handle: Handle, bounds: &Bounds, pointer: Point) -> Self {
        Self { handle, original: *bounds, grab: pointer }
    }

    pub fn apply(&self, pointer: Point, min_size: f32, aspect_lock: bool) -> Bounds {
        let delta = pointer - self.grab;
        if aspect_lock && self.handle.is_corner() {
            resize_locked(self.handle, &self.original, delta, min_size)
        } else {
            resize(self.handle, &self.original, delta, min_size)
        }
    }
}

/// Free resize: each handle moves its own edges and the opposite edges stay put.
pub fn resize(handle: Handle, orig: &Bounds, delta: Point, min_size: f32) -> Bounds {
    let (raw_w, raw_h) = match handle {
        Handle::BottomRight => (orig.width + delta.x, orig.height + delta.y),
        Handle::BottomLeft => (orig.width - delta.x, orig.height + delta.y),
        Handle::TopRight => (orig.width + delta.x, orig.height - delta.y),
        Handle::TopLeft => (orig.width - delta.x, orig.height - delta.y),
        Handle::Top => (orig.width, orig.height - delta.y),
        Handle::Bottom => (orig.width, orig.height + delta.y),
        Handle::Left => (orig.width - delta.x, orig.height),
        Handle::Right => (orig.width + delta.x, orig.height),
    };

    anchored(handle, orig, raw_w.max(min_size), raw_h.max(min_size))
}

/// Corner resize that keeps the original aspect ratio. Width follows the pointer and
/// height is derived; the minimum applies to both axes.
pub fn resize_locked(handle: Handle, orig: &Bounds, delta: Point, min_size: f32) -> Bounds {
    let aspect = orig.width / orig.height;
    let raw_w = if handle.moves_left() {
        orig.width - delta.x
    } else {
        orig.width + delta.x
    };

    let width = raw_w.max(min_size).max(min_size * aspect);
    let height = width / aspect;

    anchored(handle, orig, width, height)
}

/// Places a resized rectangle so the edges opposite `handle` keep their canvas position.
/// Uses the clamped size, not the raw delta, so a clamped layer does not drift.
fn anchored(handle: Handle, orig: &Bounds, width: f32, height: f32) -> Bounds {
    let x = if handle.moves_left() {
        orig.x + (orig.width - width)
    } else {
        orig.x
    };
    let y = if handle.moves_top() {
        orig.y + (orig.height - height)
    } else {
        orig.y
    };

    Bounds::new(x, y, width, height)
}
