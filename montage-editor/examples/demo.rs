use image::{Rgba, RgbaImage};
use montage_core::{EditorConfig, Point};
use montage_editor::Editor;
use montage_render::{ExportFormat, NativePixelService};
use std::fs::File;
use std::io::Write;

fn checkerboard(size: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_fn(size, size, |x, y| {
        if (x / 20 + y / 20) % 2 == 0 { Rgba(a) } else { Rgba(b) }
    });
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png).unwrap();
    bytes
}

fn main() {
    let mut editor = Editor::new(EditorConfig::default()).expect("Editor setup failed");

    editor.load_image(&checkerboard(300, [255, 0, 0, 255], [0, 0, 255, 255])).unwrap();
    editor.load_image(&checkerboard(200, [0, 200, 0, 255], [240, 240, 240, 255])).unwrap();
    println!("Loaded {} layers", editor.store().len());

    // Drag the top layer to the left, then stretch it from its bottom-right corner.
    let b = editor.store().active_layer().unwrap().bounds();
    editor.pointer_down(Point::new(b.x + 10.0, b.y + 10.0)).unwrap();
    editor.pointer_up(Point::new(b.x - 140.0, b.y + 10.0)).unwrap();

    let b = editor.store().active_layer().unwrap().bounds();
    editor.pointer_down(Point::new(b.right(), b.bottom())).unwrap();
    editor.pointer_up(Point::new(b.right() + 60.0, b.bottom() + 30.0)).unwrap();
    println!("Top layer now at {:?}", editor.store().active_layer().unwrap().bounds());

    // Crop the middle of it.
    let b = editor.store().active_layer().unwrap().bounds();
    editor.toggle_crop().unwrap();
    editor.pointer_down(Point::new(b.x + 40.0, b.y + 40.0)).unwrap();
    editor.pointer_up(Point::new(b.right() - 40.0, b.bottom() - 40.0)).unwrap();
    let cropped = editor.commit_crop().unwrap();
    println!("Cropped to {:?}", cropped);

    let frame = editor.frame().unwrap().encode_png().unwrap();
    File::create("demo_frame.png").unwrap().write_all(&frame).unwrap();

    editor.merge_images(&NativePixelService).unwrap();
    let merged = editor.export_output(ExportFormat::Png).unwrap();
    File::create("demo_merged.png").unwrap().write_all(&merged).unwrap();

    pollster::block_on(editor.compress(&NativePixelService, 0.3)).unwrap();
    let compressed = editor.export_output(ExportFormat::Jpeg { quality: 90 }).unwrap();
    File::create("demo_compressed.jpg").unwrap().write_all(&compressed).unwrap();

    println!("Wrote demo_frame.png, demo_merged.png, demo_compressed.jpg");
}
