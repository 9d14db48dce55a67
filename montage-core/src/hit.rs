/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::store::LayerStore;
use crate::{Bounds, Point};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Handle {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
    Top,
    Bottom,
    Left,
    Right,
}

impl Handle {
    /// Hit-test order: corners first, then edges.
    pub const ALL: [Handle; 8] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomRight,
        Handle::BottomLeft,
        Handle::Top,
        Handle::Bottom,
        Handle::Left,
        Handle::Right,
    ];

    pub const CORNERS: [Handle; 4] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomRight,
        Handle::BottomLeft,
    ];

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Handle::TopLeft | Handle::TopRight | Handle::BottomRight | Handle::BottomLeft
        )
    }

    /// Whether dragging this handle moves the left edge.
    pub fn moves_left(self) -> bool {
        matches!(self, Handle::TopLeft | Handle::BottomLeft | Handle::Left)
    }

    /// Whether dragging this handle moves the top edge.
    pub fn moves_top(self) -> bool {
        matches!(self, Handle::TopLeft | Handle::TopRight | Handle::Top)
    }

    /// The point on `bounds` this handle sits on.
    pub fn position(self, bounds: &Bounds) -> Point {
        let mid_x = bounds.x + bounds.width / 2.0;
        let mid_y = bounds.y + bounds.height / 2.0;
        match self {
            Handle::TopLeft => Point::new(bounds.x, bounds.y),
            Handle::TopRight => Point::new(bounds.right(), bounds.y),
            Handle::BottomRight => Point::new(bounds.right(), bounds.bottom()),
            Handle::BottomLeft => Point::new(bounds.x, bounds.bottom()),
            Handle::Top => Point::new(mid_x, bounds.y),
            Handle::Bottom => Point::new(mid_x, bounds.bottom()),
            Handle::Left => Point::new(bounds.x, mid_y),
            Handle::Right => Point::new(bounds.right(), mid_y),
        }
    }

    pub fn cursor(self) -> Cursor {
        match self {
            Handle::TopLeft | Handle::BottomRight => Cursor::ResizeNwSe,
            Handle::TopRight | Handle::BottomLeft => Cursor::ResizeNeSw,
            Handle::Top | Handle::Bottom => Cursor::ResizeNs,
            Handle::Left | Handle::Right => Cursor::ResizeEw,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTarget {
    Handle(Handle),
    Layer(usize),
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Default,
    Move,
    Crosshair,
    ResizeNwSe,
    ResizeNeSw,
    ResizeNs,
    ResizeEw,
}

/// Resolves a pointer position to the handle or layer under it.
#[derive(Clone, Copy, Debug)]
pub struct HitTester {
    handle_size: f32,
    corners_only: bool,
}

impl HitTester {
    pub fn new(handle_size: f32, corners_only: bool) -> Self {
        Self { handle_size, corners_only }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.handle_size, config.aspect_lock)
    }

    pub fn handles(&self) -> &'static [Handle] {
        if self.corners_only {
            &Handle::CORNERS
        } else {
            &Handle::ALL
        }
    }

    /// Top-left corner of each handle's marker, centered on its anchor point.
    pub fn handle_anchors(&self, bounds: &Bounds) -> Vec<(Handle, Point)> {
        let half = self.handle_size / 2.0;
        self.handles()
            .iter()
            .map(|&h| {
                let p = h.position(bounds);
                (h, Point::new(p.x - half, p.y - half))
            })
            .collect()
    }

    pub fn handle_box(&self, anchor: Point) -> Bounds {
        Bounds::new(anchor.x, anchor.y, self.handle_size, self.handle_size)
    }

    pub fn handle_at(&self, bounds: &Bounds, point: Point) -> Option<Handle> {
        self.handle_anchors(bounds)
            .into_iter()
            .find(|(_, anchor)| self.handle_box(*anchor).contains(point))
            .map(|(h, _)| h)
    }

    /// Handles of the active layer win over any layer body; bodies are scanned top-down.
    pub fn hit_test(&self, store: &LayerStore, point: Point) -> HitTarget {
        if let Some(active) = store.active_layer() {
            if let Some(handle) = self.handle_at(&active.bounds(), point) {
                return HitTarget::Handle(handle);
            }
        }

        store
            .layers()
            .iter()
            .rposition(|layer| layer.bounds().contains(point))
            .map_or(HitTarget::None, HitTarget::Layer)
    }

    pub fn cursor_at(&self, store: &LayerStore, point: Point) -> Cursor {
        if let Some(active) = store.active_layer() {
            if active.is_cropping() {
                return if active.bounds().contains(point) {
                    Cursor::Crosshair
                } else {
                    Cursor::Default
                };
            }
        }

        match self.hit_test(store, point) {
            HitTarget::Handle(h) => h.cursor(),
            HitTarget::Layer(_) => Cursor::Move,
            HitTarget::None => Cursor::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Raster;
    use image::RgbaImage;

    fn store(bounds: &[Bounds]) -> LayerStore {
        let mut store = LayerStore::new();
        for b in bounds {
            store.append(Raster::new(RgbaImage::new(2, 2)), *b);
        }
        store
    }

    #[test]
    fn anchors_sit_on_corners_and_midpoints() {
        let tester = HitTester::new(8.0, false);
        let samples = [
            Bounds::new(0.0, 0.0, 100.0, 50.0),
            Bounds::new(-30.0, 12.5, 77.0, 301.0),
            Bounds::new(400.0, 400.0, 50.0, 50.0),
        ];

        for b in samples {
            let anchors = tester.handle_anchors(&b);
            let at = |h: Handle| anchors.iter().find(|(x, _)| *x == h).map(|(_, p)| *p).unwrap();
            let off = |x: f32, y: f32| Point::new(x - 4.0, y - 4.0);

            assert_eq!(anchors.len(), 8);
            assert_eq!(at(Handle::TopLeft), off(b.x, b.y));
            assert_eq!(at(Handle::TopRight), off(b.right(), b.y));
            assert_eq!(at(Handle::BottomRight), off(b.right(), b.bottom()));
            assert_eq!(at(Handle::BottomLeft), off(b.x, b.bottom()));
            assert_eq!(at(Handle::Top), off(b.x + b.width / 2.0, b.y));
            assert_eq!(at(Handle::Bottom), off(b.x + b.width / 2.0, b.bottom()));
            assert_eq!(at(Handle::Left), off(b.x, b.y + b.height / 2.0));
            assert_eq!(at(Handle::Right), off(b.right(), b.y + b.height / 2.0));
        }
    }

    #[test]
    fn handle_beats_layer_body() {
        let store = store(&[Bounds::new(50.0, 50.0, 100.0, 100.0)]);
        let tester = HitTester::new(8.0, false);

        // Inside the body and inside the bottom-right handle box.
        let p = Point::new(148.0, 148.0);
        assert!(store.layers()[0].bounds().contains(p));
        assert_eq!(tester.hit_test(&store, p), HitTarget::Handle(Handle::BottomRight));

        assert_eq!(tester.hit_test(&store, Point::new(100.0, 52.0)), HitTarget::Handle(Handle::Top));
        assert_eq!(tester.hit_test(&store, Point::new(100.0, 100.0)), HitTarget::Layer(0));
    }

    #[test]
    fn topmost_layer_wins() {
        let mut store = store(&[
            Bounds::new(0.0, 0.0, 100.0, 100.0),
            Bounds::new(50.0, 50.0, 100.0, 100.0),
        ]);
        store.deselect();
        let tester = HitTester::new(8.0, false);

        assert_eq!(tester.hit_test(&store, Point::new(75.0, 75.0)), HitTarget::Layer(1));
        assert_eq!(tester.hit_test(&store, Point::new(25.0, 25.0)), HitTarget::Layer(0));
        assert_eq!(tester.hit_test(&store, Point::new(300.0, 300.0)), HitTarget::None);
    }

    #[test]
    fn handles_only_for_active_layer() {
        let mut store = store(&[Bounds::new(0.0, 0.0, 100.0, 100.0)]);
        store.deselect();
        let tester = HitTester::new(8.0, false);

        assert_eq!(tester.hit_test(&store, Point::new(2.0, 2.0)), HitTarget::Layer(0));
        assert_eq!(tester.hit_test(&store, Point::new(-3.0, -3.0)), HitTarget::None);
    }

    #[test]
    fn aspect_lock_offers_corners_only() {
        let store = store(&[Bounds::new(0.0, 0.0, 100.0, 100.0)]);
        let tester = HitTester::new(8.0, true);

        assert_eq!(tester.handle_anchors(&store.layers()[0].bounds()).len(), 4);
        assert_eq!(tester.hit_test(&store, Point::new(50.0, 1.0)), HitTarget::Layer(0));
        assert_eq!(tester.hit_test(&store, Point::new(99.0, 99.0)), HitTarget::Handle(Handle::BottomRight));
    }

    #[test]
    fn cursor_follows_hit() {
        let mut store = store(&[Bounds::new(0.0, 0.0, 100.0, 100.0)]);
        let tester = HitTester::new(8.0, false);

        assert_eq!(tester.cursor_at(&store, Point::new(0.0, 0.0)), Cursor::ResizeNwSe);
        assert_eq!(tester.cursor_at(&store, Point::new(100.0, 0.0)), Cursor::ResizeNeSw);
        assert_eq!(tester.cursor_at(&store, Point::new(0.0, 50.0)), Cursor::ResizeEw);
        assert_eq!(tester.cursor_at(&store, Point::new(50.0, 50.0)), Cursor::Move);
        assert_eq!(tester.cursor_at(&store, Point::new(200.0, 50.0)), Cursor::Default);

        store.set_active_mode(crate::LayerMode::Cropping);
        assert_eq!(tester.cursor_at(&store, Point::new(50.0, 50.0)), Cursor::Crosshair);
        assert_eq!(tester.cursor_at(&store, Point::new(0.0, 0.0)), Cursor::Crosshair);
    }
}
