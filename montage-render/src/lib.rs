/*
    Montage - layered image compositing engine
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/


use std::collections::HashMap;

use image::RgbaImage;
use montage_core::config::parse_hex_rgb;
use montage_core::{EditorConfig, HitTester, Layer, LayerId, LayerStore, Raster};
use thiserror::Error;
use tiny_skia::*;
use tracing::debug;

pub mod pixel;

pub use pixel::{NativePixelService, PixelError, PixelService};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create pixmap: {0}")]
    PixmapCreationError(String),

    #[error("Invalid color format: {0}")]
    InvalidColorFormat(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Static guide lines painted under the layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guides {
    pub center_cross: bool,
}

impl Guides {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self { center_cross: config.show_guides }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportFormat {
    Png,
    /// Quality in `1..=100`.
    Jpeg { quality: u8 },
}

impl ExportFormat {
    /// Accepts `image/png` and `image/jpeg`; `quality` in `[0, 1]` only affects JPEG.
    pub fn from_mime(mime: &str, quality: f32) -> Option<Self> {
        match mime {
            "image/png" => Some(ExportFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ExportFormat::Jpeg {
                quality: (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8,
            }),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// Paints the layer stack. Output depends only on the layers, the active index and the
/// guides; the pixmap cache just avoids re-converting rasters every frame.
pub struct Renderer {
    width: u32,
    height: u32,
    background: Color,
    hit: HitTester,
    pixmap_buffer: Option<Pixmap>,
    image_cache: HashMap<LayerId, (Raster, Pixmap)>,
}

impl Renderer {
    pub fn new(config: &EditorConfig) -> Result<Self, RenderError> {
        let background = parse_color(&config.background)
            .ok_or_else(|| RenderError::InvalidColorFormat(config.background.clone()))?;

        if config.canvas_width == 0 || config.canvas_height == 0 {
            return Err(RenderError::InvalidDimensions("Canvas width/height must be > 0".into()));
        }

        Ok(Self {
            width: config.canvas_width,
            height: config.canvas_height,
            background,
            hit: HitTester::from_config(config),
            pixmap_buffer: None,
            image_cache: HashMap::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Paints a full frame: background, guides, every layer bottom to top, then the
    /// selection overlay of the active layer. Reuses the internal buffer.
    pub fn render(&mut self, store: &LayerStore, guides: &Guides) -> Result<&Pixmap, RenderError> {
        self.prune_cache(store.layers());

        if self.pixmap_buffer.as_ref().map_or(true, |p| p.width() != self.width || p.height() != self.height) {
            self.pixmap_buffer = Pixmap::new(self.width, self.height);
        }

        let pixmap = self.pixmap_buffer.as_mut()
            .ok_or_else(|| RenderError::PixmapCreationError("Invalid canvas dimensions".into()))?;

        pixmap.fill(self.background);
        if guides.center_cross {
            draw_guides(pixmap);
        }

        for layer in store.layers() {
            draw_layer(pixmap, &mut self.image_cache, layer);
        }

        if let Some(active) = store.active_layer() {
            draw_selection(pixmap, &self.hit, active);
        }

        self.pixmap_buffer.as_ref()
            .ok_or_else(|| RenderError::PixmapCreationError("Frame buffer missing".into()))
    }

    /// Renders the frame and encodes it as PNG.
    pub fn render_png(&mut self, store: &LayerStore, guides: &Guides) -> Result<Vec<u8>, RenderError> {
        self.render(store, guides)?
            .encode_png()
            .map_err(|e| RenderError::EncodingError(e.to_string()))
    }

    /// Background plus `layers` without guides or overlays, as straight-alpha RGBA.
    /// This is what the pixel operations consume.
    pub fn composite(&mut self, layers: &[Layer]) -> Result<RgbaImage, RenderError> {
        let mut pixmap = Pixmap::new(self.width, self.height)
            .ok_or_else(|| RenderError::PixmapCreationError("Invalid canvas dimensions".into()))?;

        pixmap.fill(self.background);
        for layer in layers {
            draw_layer(&mut pixmap, &mut self.image_cache, layer);
        }

        to_rgba(&pixmap)
    }

    fn prune_cache(&mut self, layers: &[Layer]) {
        let before = self.image_cache.len();
        self.image_cache.retain(|id, (raster, _)| {
            layers.iter().any(|l| l.id() == *id && l.raster().same_content(raster))
        });
        if self.image_cache.len() != before {
            debug!(evicted = before - self.image_cache.len(), "pruned raster cache");
        }
    }
}

/// Encodes straight-alpha RGBA to the requested format.
pub fn encode(img: &RgbaImage, format: ExportFormat) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    match format {
        ExportFormat::Png => {
            img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
                .map_err(|e| RenderError::EncodingError(e.to_string()))?;
        }
        ExportFormat::Jpeg { quality } => {
            let rgb = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
            image::DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(encoder)
                .map_err(|e| RenderError::EncodingError(e.to_string()))?;
        }
    }
    Ok(bytes)
}

fn draw_layer(pixmap: &mut Pixmap, cache: &mut HashMap<LayerId, (Raster, Pixmap)>, layer: &Layer) {
    let Some(source) = layer_pixmap(cache, layer) else {
        return;
    };

    let b = layer.bounds();
    let sx = b.width / source.width() as f32;
    let sy = b.height / source.height() as f32;

    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, Transform::from_row(sx, 0.0, 0.0, sy, b.x, b.y), None);
}

fn layer_pixmap<'a>(cache: &'a mut HashMap<LayerId, (Raster, Pixmap)>, layer: &Layer) -> Option<&'a Pixmap> {
    let stale = cache
        .get(&layer.id())
        .map_or(true, |(raster, _)| !raster.same_content(layer.raster()));

    if stale {
        let pixmap = to_pixmap(layer.raster().pixels())?;
        cache.insert(layer.id(), (layer.raster().clone(), pixmap));
    }
    cache.get(&layer.id()).map(|(_, p)| p)
}

fn draw_guides(pixmap: &mut Pixmap) {
    let w = pixmap.width() as f32;
    let h = pixmap.height() as f32;

    let mut pb = PathBuilder::new();
    pb.move_to(w / 2.0, 0.0);
    pb.line_to(w / 2.0, h);
    pb.move_to(0.0, h / 2.0);
    pb.line_to(w, h / 2.0);

    if let Some(path) = pb.finish() {
        let mut paint = Paint::default();
        paint.set_color_rgba8(255, 255, 255, 60);

        let stroke = Stroke {
            width: 1.0,
            dash: StrokeDash::new(vec![6.0, 4.0], 0.0),
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

fn draw_selection(pixmap: &mut Pixmap, hit: &HitTester, layer: &Layer) {
    let b = layer.bounds();
    let Some(rect) = Rect::from_xywh(b.x, b.y, b.width, b.height) else {
        return;
    };

    if layer.is_cropping() {
        draw_crop_mask(pixmap, layer, rect);
        return;
    }

    let mut outline = Paint::default();
    outline.set_color_rgba8(0x3b, 0x82, 0xf6, 255);
    outline.anti_alias = true;
    let stroke = Stroke { width: 1.5, ..Stroke::default() };
    pixmap.stroke_path(&PathBuilder::from_rect(rect), &outline, &stroke, Transform::identity(), None);

    let mut fill = Paint::default();
    fill.set_color(Color::WHITE);
    fill.anti_alias = false;
    let mut border = Paint::default();
    border.set_color_rgba8(0x3b, 0x82, 0xf6, 255);
    let thin = Stroke { width: 1.0, ..Stroke::default() };

    for (_, anchor) in hit.handle_anchors(&b) {
        let marker = hit.handle_box(anchor);
        if let Some(r) = Rect::from_xywh(marker.x, marker.y, marker.width, marker.height) {
            pixmap.fill_rect(r, &fill, Transform::identity(), None);
            pixmap.stroke_path(&PathBuilder::from_rect(r), &border, &thin, Transform::identity(), None);
        }
    }
}

/// Dims the whole layer except the pending crop selection, which gets a dashed outline.
fn draw_crop_mask(pixmap: &mut Pixmap, layer: &Layer, rect: Rect) {
    let b = layer.bounds();
    let hole = layer.crop().and_then(|c| {
        let sel = c.normalized();
        Rect::from_xywh(b.x + sel.x, b.y + sel.y, sel.width, sel.height)
    });

    let mut pb = PathBuilder::new();
    pb.push_rect(rect);
    if let Some(h) = hole {
        pb.push_rect(h);
    }

    let mut dim = Paint::default();
    dim.set_color_rgba8(0, 0, 0, 128);
    if let Some(path) = pb.finish() {
        pixmap.fill_path(&path, &dim, FillRule::EvenOdd, Transform::identity(), None);
    }

    if let Some(h) = hole {
        let mut paint = Paint::default();
        paint.set_color(Color::WHITE);
        let stroke = Stroke {
            width: 1.0,
            dash: StrokeDash::new(vec![4.0, 4.0], 0.0),
            ..Stroke::default()
        };
        pixmap.stroke_path(&PathBuilder::from_rect(h), &paint, &stroke, Transform::identity(), None);
    }
}

/// Premultiplies straight RGBA into a pixmap.
fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut pixels = Vec::with_capacity(rgba_len(image.width(), image.height()));

    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let a_f = a as f32 / 255.0;
        pixels.push((r as f32 * a_f).round() as u8);
        pixels.push((g as f32 * a_f).round() as u8);
        pixels.push((b as f32 * a_f).round() as u8);
        pixels.push(a);
    }

    Pixmap::from_vec(pixels, size)
}

/// Byte length of an RGBA8 buffer, computed in `usize` so large rasters do not overflow `u32`.
fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn to_rgba(pixmap: &Pixmap) -> Result<RgbaImage, RenderError> {
    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .ok_or_else(|| RenderError::InvalidDimensions("Pixel buffer does not match pixmap size".into()))
}

fn parse_color(hex: &str) -> Option<Color> {
    let [r, g, b] = parse_hex_rgb(hex)?;
    Some(Color::from_rgba8(r, g, b, 255))
}
