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

use crate::{HANDLE_SIZE, MIN_CROP_SIZE, MIN_SIZE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: String,
    pub min_size: f32,
    pub handle_size: f32,
    pub min_crop_size: f32,
    /// Corner-only resizing that keeps the layer's aspect ratio.
    pub aspect_lock: bool,
    pub show_guides: bool,
    pub cascade_offset: f32,
    /// Largest share of the canvas a newly placed layer may cover.
    pub placement_fraction: f32,
    pub compress_quality: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
            background: "#1e1e1e".to_string(),
            min_size: MIN_SIZE,
            handle_size: HANDLE_SIZE,
            min_crop_size: MIN_CROP_SIZE,
            aspect_lock: false,
            show_guides: true,
            cascade_offset: 20.0,
            placement_fraction: 0.8,
            compress_quality: 0.8,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::Invalid("canvas dimensions must be > 0".into()));
        }
        if !(self.min_size > 0.0) {
            return Err(ConfigError::Invalid("min_size must be > 0".into()));
        }
        if !(self.handle_size > 0.0) {
            return Err(ConfigError::Invalid("handle_size must be > 0".into()));
        }
        if !(self.min_crop_size >= 0.0) {
            return Err(ConfigError::Invalid("min_crop_size must be >= 0".into()));
        }
        if !(self.cascade_offset.is_finite() && self.cascade_offset >= 1.0) {
            return Err(ConfigError::Invalid("cascade_offset must be a finite value >= 1".into()));
        }
        if !(self.placement_fraction > 0.0 && self.placement_fraction <= 1.0) {
            return Err(ConfigError::Invalid("placement_fraction must be in (0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.compress_quality) {
            return Err(ConfigError::Invalid("compress_quality must be in [0, 1]".into()));
        }
        if parse_hex_rgb(&self.background).is_none() {
            return Err(ConfigError::Invalid(format!("background must be #rrggbb, got {}", self.background)));
        }
        Ok(())
    }
}

/// Parses `#rrggbb` into its channels.
pub fn parse_hex_rgb(hex: &str) -> Option<[u8; 3]> {
    if !hex.starts_with('#') || hex.len() != 7 {
        return None;
    }

    let r = u8::from_str_radix(hex.get(1..3)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(3..5)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(5..7)?, 16).ok()?;

    Some([r, g, b])
}
