/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod crop;
pub mod hit;
pub mod input;
pub mod layer;
pub mod store;
pub mod transform;

pub use config::EditorConfig;
pub use hit::{Cursor, Handle, HitTarget, HitTester};
pub use input::{PointerEvent, PointerInputController};
pub use layer::{CropRect, Layer, LayerId, LayerMode, Raster};
pub use store::LayerStore;

/// Smallest width or height a layer may be resized to.
pub const MIN_SIZE: f32 = 50.0;
/// Edge length of the square hit-box around each resize handle.
pub const HANDLE_SIZE: f32 = 8.0;
/// Crop selections narrower or shorter than this are discarded.
pub const MIN_CROP_SIZE: f32 = 10.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("No layer is selected")]
    NoActiveSelection,

    #[error("Crop region {width}x{height} is below the minimum size")]
    CropRegionTooSmall { width: f32, height: f32 },

    #[error("The active layer is not in crop mode")]
    NotCropping,

    #[error("Layer index out of range: {0}")]
    LayerIndexOutOfRange(usize),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle in canvas (display) coordinates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Edges are inclusive so a pointer resting on the outline still hits.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Overlap of two rectangles, or `None` when they do not intersect.
    pub fn intersect(&self, other: &Bounds) -> Option<Bounds> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= x || bottom <= y {
            return None;
        }
        Some(Bounds::new(x, y, right - x, bottom - y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_contains_edges() {
        let b = Bounds::new(10.0, 10.0, 20.0, 20.0);
        assert!(b.contains(Point::new(10.0, 10.0)));
        assert!(b.contains(Point::new(30.0, 30.0)));
        assert!(!b.contains(Point::new(30.1, 15.0)));
        assert!(!b.contains(Point::new(9.9, 15.0)));
    }

    #[test]
    fn bounds_intersection() {
        let a = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let b = Bounds::new(50.0, 60.0, 100.0, 100.0);
        assert_eq!(a.intersect(&b), Some(Bounds::new(50.0, 60.0, 50.0, 40.0)));
        assert_eq!(a.intersect(&Bounds::new(200.0, 0.0, 10.0, 10.0)), None);
    }

    #[test]
    fn it_serializes_bounds() {
        let json = serde_json::to_string(&Bounds::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, r#"{"x":1.0,"y":2.0,"width":3.0,"height":4.0}"#);
    }
}
