use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use omrgrade::core::db::GradingDb;
use omrgrade::omr::grid::GridGeometry;
use omrgrade::{AnswerKey, LayoutDescriptor};
use tempfile::NamedTempFile;

pub const SHEET_WIDTH: u32 = 400;
pub const SHEET_HEIGHT: u32 = 600;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const INK: Rgba<u8> = Rgba([10, 10, 10, 255]);

/// A blank white sheet at the standard test size.
pub fn blank_sheet() -> RgbaImage {
    RgbaImage::from_pixel(SHEET_WIDTH, SHEET_HEIGHT, WHITE)
}

/// Fill the bubble for (question, choice), both 0-based, where the default
/// template expects it.
pub fn fill_bubble(img: &mut RgbaImage, question: u32, choice: u8) {
    let slot = GridGeometry::default().slot(img.width(), img.height(), question, choice);
    draw_filled_circle_mut(
        img,
        (slot.center_x.round() as i32, slot.center_y.round() as i32),
        slot.radius.round() as i32,
        INK,
    );
}

/// A sheet with the given (question, choice) bubbles filled.
pub fn sheet_with_marks(marks: &[(u32, u8)]) -> RgbaImage {
    let mut img = blank_sheet();
    for (question, choice) in marks {
        fill_bubble(&mut img, *question, *choice);
    }
    img
}

pub fn test_layout(num_questions: u32) -> LayoutDescriptor {
    LayoutDescriptor::new("algebra-midterm", "v2", num_questions).with_seed(42)
}

pub fn answer_key(entries: &[(&str, u8)]) -> AnswerKey {
    entries.iter().map(|(q, c)| (q.to_string(), *c)).collect()
}

/// Writes `img` as a PNG temp file, removed when dropped.
pub fn write_png(img: &RgbaImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Creates a GradingDb backed by a temporary archive.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_test_store() -> (GradingDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("attempts.omrgrade");
    let store = GradingDb::new(&path)
        .await
        .expect("Failed to create test store");
    (store, dir)
}
