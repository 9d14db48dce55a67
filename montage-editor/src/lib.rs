/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use image::RgbaImage;
use montage_core::config::ConfigError;
use montage_core::{
    crop, Bounds, Cursor, EditError, EditorConfig, LayerId, LayerStore, Point, PointerEvent,
    PointerInputController, Raster,
};
use montage_render::{encode, ExportFormat, Guides, PixelError, PixelService, RenderError, Renderer};
use thiserror::Error;
use tiny_skia::Pixmap;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum EditorError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Merging needs at least 2 layers, found {found}")]
    InsufficientLayers { found: usize },

    #[error("Pixel operation failed: {0}")]
    ExternalOperationFailure(#[from] PixelError),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("No processed output to export")]
    NoOutput,

    #[error("Unsupported export type: {0}")]
    UnsupportedFormat(String),
}

/// One canvas: the layer stack, pointer handling, the painted frame and the output of the
/// last pixel operation. Every state change repaints before returning.
pub struct Editor {
    config: EditorConfig,
    store: LayerStore,
    controller: PointerInputController,
    renderer: Renderer,
    guides: Guides,
    output: Option<RgbaImage>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Result<Self, EditorError> {
        config.validate()?;
        let renderer = Renderer::new(&config)?;

        let mut editor = Self {
            controller: PointerInputController::new(&config),
            guides: Guides::from_config(&config),
            store: LayerStore::new(),
            renderer,
            output: None,
            config,
        };
        editor.repaint()?;
        Ok(editor)
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        Self::new(EditorConfig::from_json(json)?)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Result of the last successful pixel operation.
    pub fn output(&self) -> Option<&RgbaImage> {
        self.output.as_ref()
    }

    pub fn frame(&mut self) -> Result<&Pixmap, EditorError> {
        Ok(self.renderer.render(&self.store, &self.guides)?)
    }

    /// Decodes `bytes` and places the image on top. On failure no layer is added.
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<LayerId, EditorError> {
        let raster = Raster::decode(bytes).map_err(|e| {
            warn!(error = %e, "image decode failed");
            EditorError::Decode(e.to_string())
        })?;
        self.add_raster(raster)
    }

    pub fn add_raster(&mut self, raster: Raster) -> Result<LayerId, EditorError> {
        let bounds = self.store.default_bounds(raster.width(), raster.height(), &self.config);
        self.controller.reset(&mut self.store);
        let id = self.store.append(raster, bounds);
        self.repaint()?;
        Ok(id)
    }

    pub fn remove_layer(&mut self, index: usize) -> Result<Option<LayerId>, EditorError> {
        self.controller.reset(&mut self.store);
        let removed = self.store.remove_at(index).map(|l| l.id());
        self.repaint()?;
        Ok(removed)
    }

    pub fn bring_to_front(&mut self, index: usize) -> Result<bool, EditorError> {
        self.controller.reset(&mut self.store);
        let moved = self.store.bring_to_front(index);
        self.repaint()?;
        Ok(moved)
    }

    pub fn select(&mut self, index: usize) -> Result<bool, EditorError> {
        self.controller.reset(&mut self.store);
        let selected = self.store.select(index);
        self.repaint()?;
        Ok(selected)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Result<bool, EditorError> {
        let changed = self.controller.handle(&mut self.store, event);
        if changed {
            self.repaint()?;
        }
        Ok(changed)
    }

    pub fn pointer_down(&mut self, p: Point) -> Result<bool, EditorError> {
        self.handle_pointer(PointerEvent::Down(p))
    }

    pub fn pointer_move(&mut self, p: Point) -> Result<bool, EditorError> {
        self.handle_pointer(PointerEvent::Move(p))
    }

    pub fn pointer_up(&mut self, p: Point) -> Result<bool, EditorError> {
        self.handle_pointer(PointerEvent::Up(p))
    }

    pub fn cursor(&self, p: Point) -> Cursor {
        self.controller.cursor(&self.store, p)
    }

    /// Enters or leaves crop mode on the selected layer; returns whether it is now cropping.
    pub fn toggle_crop(&mut self) -> Result<bool, EditorError> {
        self.controller.reset(&mut self.store);
        let cropping = crop::toggle(&mut self.store)?;
        self.repaint()?;
        Ok(cropping)
    }

    pub fn cancel_crop(&mut self) -> Result<(), EditorError> {
        self.controller.reset(&mut self.store);
        crop::cancel(&mut self.store);
        self.repaint()
    }

    /// Applies the pending crop selection. A too-small selection is dropped and the layer kept.
    pub fn commit_crop(&mut self) -> Result<Bounds, EditorError> {
        self.controller.reset(&mut self.store);
        let result = crop::commit(&mut self.store, self.config.min_crop_size, self.config.min_size);
        self.repaint()?;
        Ok(result?)
    }

    pub fn grayscale<S: PixelService>(&mut self, service: &S) -> Result<(), EditorError> {
        let input = self.renderer.composite(self.store.layers())?;
        let result = service.grayscale(input.width(), input.height(), input.as_raw());
        self.accept_output("grayscale", result)
    }

    /// Splits the two topmost layers down the middle: left half from the lower one,
    /// right half from the top one. Each is rendered alone at canvas size.
    pub fn merge_images<S: PixelService>(&mut self, service: &S) -> Result<(), EditorError> {
        let layers = self.store.layers();
        if layers.len() < 2 {
            warn!(found = layers.len(), "merge needs two layers");
            return Err(EditorError::InsufficientLayers { found: layers.len() });
        }

        let top = layers.len() - 1;
        let lower = self.renderer.composite(&layers[top - 1..top])?;
        let upper = self.renderer.composite(&layers[top..])?;
        let result = service.merge_halves(lower.width(), lower.height(), lower.as_raw(), upper.as_raw());
        self.accept_output("merge", result)
    }

    /// Re-encodes the canvas at `quality` (`>= 1` is lossless). Holds the editor until the
    /// service resolves, so pixel operations never overlap.
    pub async fn compress<S: PixelService>(&mut self, service: &S, quality: f32) -> Result<(), EditorError> {
        let input = self.renderer.composite(self.store.layers())?;
        let result = service
            .compress(input.width(), input.height(), input.as_raw(), quality.clamp(0.0, 1.0))
            .await;
        self.accept_output("compress", result)
    }

    /// Encodes the layers as they appear on the canvas, without guides or selection overlay.
    pub fn export_canvas(&mut self, format: ExportFormat) -> Result<Vec<u8>, EditorError> {
        let image = self.renderer.composite(self.store.layers())?;
        let bytes = encode(&image, format)?;
        info!(mime = format.mime(), len = bytes.len(), "canvas exported");
        Ok(bytes)
    }

    /// Exports the canvas by MIME type (`image/png` or `image/jpeg`); `quality` in `[0, 1]`.
    pub fn export_canvas_as(&mut self, mime: &str, quality: f32) -> Result<Vec<u8>, EditorError> {
        let format = ExportFormat::from_mime(mime, quality).ok_or_else(|| {
            warn!(mime, "unsupported export type");
            EditorError::UnsupportedFormat(mime.to_string())
        })?;
        self.export_canvas(format)
    }

    pub fn export_output(&self, format: ExportFormat) -> Result<Vec<u8>, EditorError> {
        let image = self.output.as_ref().ok_or(EditorError::NoOutput)?;
        let bytes = encode(image, format)?;
        info!(mime = format.mime(), len = bytes.len(), "output exported");
        Ok(bytes)
    }

    fn accept_output(&mut self, operation: &str, result: Result<RgbaImage, PixelError>) -> Result<(), EditorError> {
        match result {
            Ok(image) => {
                info!(operation, width = image.width(), height = image.height(), "pixel operation finished");
                self.output = Some(image);
                Ok(())
            }
            Err(e) => {
                error!(operation, error = %e, "pixel operation failed");
                Err(EditorError::ExternalOperationFailure(e))
            }
        }
    }

    fn repaint(&mut self) -> Result<(), EditorError> {
        self.renderer.render(&self.store, &self.guides)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use montage_core::{Handle, LayerMode};
    use montage_render::NativePixelService;
    use std::cell::Cell;
    use std::future::Future;

    /// Counts calls and optionally fails every one of them.
    #[derive(Default)]
    struct RecordingService {
        calls: Cell<usize>,
        fail: bool,
    }

    impl RecordingService {
        fn failing() -> Self {
            Self { calls: Cell::new(0), fail: true }
        }

        fn answer(&self, width: u32, height: u32) -> Result<RgbaImage, PixelError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(PixelError::Codec("service unavailable".into()))
            } else {
                Ok(RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255])))
            }
        }
    }

    impl PixelService for RecordingService {
        fn grayscale(&self, width: u32, height: u32, _rgba: &[u8]) -> Result<RgbaImage, PixelError> {
            self.answer(width, height)
        }

        fn merge_halves(&self, width: u32, height: u32, _a: &[u8], _b: &[u8]) -> Result<RgbaImage, PixelError> {
            self.answer(width, height)
        }

        fn compress(
            &self,
            width: u32,
            height: u32,
            _rgba: &[u8],
            _quality: f32,
        ) -> impl Future<Output = Result<RgbaImage, PixelError>> {
            let result = self.answer(width, height);
            async move { result }
        }
    }

    fn solid(w: u32, h: u32, color: [u8; 4]) -> Raster {
        Raster::new(RgbaImage::from_pixel(w, h, Rgba(color)))
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(w, h, Rgba([20, 40, 60, 255]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn editor() -> Editor {
        Editor::new(EditorConfig::default()).unwrap()
    }

    /// Places the only layer at `{50, 50, 100, 100}` by dragging its body.
    fn editor_with_layer_at_50() -> Editor {
        let mut editor = editor();
        editor.add_raster(solid(100, 100, [200, 0, 0, 255])).unwrap();
        let b = editor.store().active_layer().unwrap().bounds();
        let grab = Point::new(b.x + 50.0, b.y + 50.0);
        editor.pointer_down(grab).unwrap();
        editor.pointer_up(Point::new(100.0, 100.0)).unwrap();
        editor
    }

    #[test]
    fn resize_scenario_from_bottom_right() {
        let mut editor = editor_with_layer_at_50();
        assert_eq!(editor.store().active_layer().unwrap().bounds(), Bounds::new(50.0, 50.0, 100.0, 100.0));

        editor.pointer_down(Point::new(150.0, 150.0)).unwrap();
        assert_eq!(
            editor.store().active_layer().unwrap().mode(),
            LayerMode::Resizing(Handle::BottomRight)
        );
        editor.pointer_move(Point::new(165.0, 170.0)).unwrap();
        editor.pointer_up(Point::new(170.0, 180.0)).unwrap();

        assert_eq!(editor.store().active_layer().unwrap().bounds(), Bounds::new(50.0, 50.0, 120.0, 130.0));
    }

    #[test]
    fn merge_needs_two_layers() {
        let mut editor = editor();
        let service = RecordingService::default();
        editor.load_image(&png_bytes(300, 200)).unwrap();

        let err = editor.merge_images(&service).unwrap_err();
        assert!(matches!(err, EditorError::InsufficientLayers { found: 1 }));
        assert_eq!(service.calls.get(), 0);
        assert!(editor.output().is_none());

        editor.load_image(&png_bytes(100, 100)).unwrap();
        editor.merge_images(&service).unwrap();
        assert_eq!(service.calls.get(), 1);
        assert_eq!(editor.output().unwrap().dimensions(), (800, 600));
    }

    #[test]
    fn tiny_crop_is_rejected() {
        let mut editor = editor_with_layer_at_50();
        let before = editor.store().active_layer().unwrap().clone();

        assert!(editor.toggle_crop().unwrap());
        editor.pointer_down(Point::new(60.0, 60.0)).unwrap();
        editor.pointer_move(Point::new(61.0, 61.0)).unwrap();
        editor.pointer_up(Point::new(62.0, 62.0)).unwrap();

        let err = editor.commit_crop().unwrap_err();
        assert!(matches!(err, EditorError::Edit(EditError::CropRegionTooSmall { .. })));

        let after = editor.store().active_layer().unwrap();
        assert_eq!(after.bounds(), before.bounds());
        assert!(after.raster().same_content(before.raster()));
        assert_eq!(after.mode(), LayerMode::Idle);
    }

    #[test]
    fn crop_commit_replaces_raster() {
        let mut editor = editor_with_layer_at_50();

        editor.toggle_crop().unwrap();
        editor.pointer_down(Point::new(60.0, 70.0)).unwrap();
        editor.pointer_up(Point::new(130.0, 140.0)).unwrap();
        let bounds = editor.commit_crop().unwrap();

        assert_eq!(bounds, Bounds::new(50.0, 50.0, 70.0, 70.0));
        let layer = editor.store().active_layer().unwrap();
        assert_eq!((layer.raster().width(), layer.raster().height()), (70, 70));
        assert!(!layer.is_cropping());
    }

    #[test]
    fn crop_without_selection_fails() {
        let mut editor = editor();
        let err = editor.toggle_crop().unwrap_err();
        assert!(matches!(err, EditorError::Edit(EditError::NoActiveSelection)));
    }

    #[test]
    fn failed_service_leaves_output_untouched() {
        let mut editor = editor();
        editor.add_raster(solid(10, 10, [0, 0, 0, 255])).unwrap();
        editor.grayscale(&RecordingService::default()).unwrap();
        let before = editor.output().cloned();

        let failing = RecordingService::failing();
        let err = editor.grayscale(&failing).unwrap_err();
        assert!(matches!(err, EditorError::ExternalOperationFailure(_)));
        assert_eq!(editor.output().cloned(), before);

        let err = pollster::block_on(editor.compress(&failing, 0.5)).unwrap_err();
        assert!(matches!(err, EditorError::ExternalOperationFailure(_)));
        assert_eq!(editor.output().cloned(), before);
        assert_eq!(failing.calls.get(), 2);
    }

    #[test]
    fn grayscale_with_native_service() {
        let mut editor = editor();
        editor.add_raster(solid(10, 10, [255, 0, 0, 255])).unwrap();
        editor.grayscale(&NativePixelService).unwrap();

        let out = editor.output().unwrap();
        let center = out.get_pixel(400, 300).0;
        assert_eq!(center, [76, 76, 76, 255]);
        // The selection overlay is not part of the input.
        let corner = out.get_pixel(0, 0).0;
        assert_eq!(corner[0], corner[1]);
    }

    #[test]
    fn lossless_compress_round_trips_canvas() {
        let mut editor = editor();
        editor.add_raster(solid(10, 10, [9, 99, 199, 255])).unwrap();
        pollster::block_on(editor.compress(&NativePixelService, 1.0)).unwrap();

        let canvas = editor.renderer.composite(editor.store.layers()).unwrap();
        assert_eq!(editor.output(), Some(&canvas));
    }

    #[test]
    fn decode_failure_adds_nothing() {
        let mut editor = editor();
        let err = editor.load_image(b"not an image").unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));
        assert!(editor.store().is_empty());
    }

    #[test]
    fn loaded_layers_cascade() {
        let mut editor = editor();
        editor.load_image(&png_bytes(300, 200)).unwrap();
        editor.load_image(&png_bytes(300, 200)).unwrap();

        let layers = editor.store().layers();
        assert_eq!(layers[0].bounds(), Bounds::new(250.0, 200.0, 300.0, 200.0));
        assert_eq!(layers[1].bounds(), Bounds::new(270.0, 220.0, 300.0, 200.0));
        assert_eq!(editor.store().active_index(), Some(1));
    }

    #[test]
    fn remove_out_of_range_is_noop() {
        let mut editor = editor();
        editor.add_raster(solid(10, 10, [0, 0, 0, 255])).unwrap();
        assert_eq!(editor.remove_layer(3).unwrap(), None);
        assert_eq!(editor.store().len(), 1);
        assert!(editor.remove_layer(0).unwrap().is_some());
        assert_eq!(editor.store().active_index(), None);
    }

    #[test]
    fn cursor_reflects_hover_target() {
        let editor = editor_with_layer_at_50();
        assert_eq!(editor.cursor(Point::new(150.0, 150.0)), Cursor::ResizeNwSe);
        assert_eq!(editor.cursor(Point::new(100.0, 100.0)), Cursor::Move);
        assert_eq!(editor.cursor(Point::new(700.0, 500.0)), Cursor::Default);
    }

    #[test]
    fn exports_png_and_output() {
        let mut editor = editor();
        editor.add_raster(solid(10, 10, [0, 0, 0, 255])).unwrap();

        let png = editor.export_canvas(ExportFormat::Png).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(matches!(editor.export_output(ExportFormat::Png), Err(EditorError::NoOutput)));

        editor.grayscale(&NativePixelService).unwrap();
        let jpeg = editor.export_output(ExportFormat::Jpeg { quality: 70 }).unwrap();
        assert!(jpeg.starts_with(&[0xff, 0xd8]));
    }

    #[test]
    fn exports_canvas_by_mime_type() {
        let mut editor = editor();
        editor.add_raster(solid(10, 10, [0, 0, 0, 255])).unwrap();

        let jpeg = editor.export_canvas_as("image/jpeg", 0.9).unwrap();
        assert!(jpeg.starts_with(&[0xff, 0xd8]));
        let png = editor.export_canvas_as("image/png", 1.0).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

        let err = editor.export_canvas_as("image/gif", 1.0).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFormat(ref m) if m == "image/gif"));
    }

    #[test]
    fn loading_repeated_images_with_smallest_cascade() {
        let mut editor = Editor::from_json(r#"{"cascade_offset": 1.0}"#).unwrap();
        editor.load_image(&png_bytes(100, 100)).unwrap();
        editor.load_image(&png_bytes(100, 100)).unwrap();

        let layers = editor.store().layers();
        assert_eq!(layers[0].bounds(), Bounds::new(350.0, 250.0, 100.0, 100.0));
        assert_eq!(layers[1].bounds(), Bounds::new(351.0, 251.0, 100.0, 100.0));
    }

    #[test]
    fn config_from_json_drives_canvas() {
        let mut editor = Editor::from_json(r#"{"canvas_width": 320, "canvas_height": 240, "show_guides": false}"#).unwrap();
        let frame = editor.frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (320, 240));

        let json = serde_json::to_string(editor.config()).unwrap();
        assert!(json.contains("\"canvas_width\":320"));
    }
}
