//! Build script for the VisionAssist Tauri app.

fn main() {
    tauri_build::build();
}
