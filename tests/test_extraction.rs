//! Integration tests for bubble modeling and answer decoding.

mod common;

use image::Rgba;
use omrgrade::models::MAX_QUESTIONS;
use omrgrade::omr::decode_marks;
use omrgrade::omr::grid::GridGeometry;
use omrgrade::omr::overlay::draw_marks;
use omrgrade::{extract, preprocess};

use common::*;

fn mark(question: u32, choice: u8, filled: bool) -> BubbleMark {
    BubbleMark {
        question,
        choice,
        center_x: 0.0,
        center_y: 0.0,
        radius: 1.0,
        dark_ratio: if filled { 1.0 } else { 0.0 },
        filled,
    }
}

fn assert_close(actual: f32, expected: f32) {
    assert!((actual - expected).abs() < 1e-3, "expected {expected}, got {actual}");
}

#[test]
fn test_grid_has_five_choices_per_question() {
    let slots = GridGeometry::default().model_bubbles(SHEET_WIDTH, SHEET_HEIGHT, &test_layout(3));
    assert_eq!(slots.len(), 15);
    assert_eq!((slots[0].question, slots[0].choice), (0, 0));
    assert_eq!((slots[14].question, slots[14].choice), (2, 4));
    assert_close(slots[0].center_x, 80.0);
    assert_close(slots[0].center_y, 150.0);
    assert_close(slots[1].center_x - slots[0].center_x, 32.0);
    assert_close(slots[5].center_y - slots[0].center_y, 21.0);
    assert_close(slots[0].radius, 6.0);
}

#[test]
fn test_layout_loads_from_json() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("layout.json");
    std::fs::write(
        &path,
        r#"{"testId": "algebra-midterm", "versionId": "v2", "layoutSeed": 42, "numQuestions": 12}"#,
    )?;
    let layout = LayoutDescriptor::load(&path)?;
    assert_eq!(layout, test_layout(12));

    std::fs::write(&path, r#"{"testId": "algebra-midterm"}"#)?;
    let err = LayoutDescriptor::load(&path).expect_err("incomplete layout must be rejected");
    assert!(format!("{err}").contains("layout.json"), "error should name the file: {err}");

    let missing = dir.path().join("missing.json");
    let err = LayoutDescriptor::load(&missing).expect_err("missing layout must be rejected");
    assert!(format!("{err}").contains("missing.json"), "error should name the file: {err}");
    Ok(())
}

#[test]
fn test_question_cap() {
    let extraction = extract(&blank_sheet(), &test_layout(25));
    assert_eq!(extraction.marks.len(), (MAX_QUESTIONS * 5) as usize);
    assert!(extraction.marks.iter().all(|m| m.question < MAX_QUESTIONS));
}

#[test]
fn test_single_fill_rule() {
    let sheet = sheet_with_marks(&[(0, 0), (1, 2), (2, 1), (4, 4)]);
    let extraction = extract(&sheet, &test_layout(6));
    let answers = &extraction.answers.mcq_answers;

    assert_eq!(answers.get("q1"), Some(&0));
    assert_eq!(answers.get("q2"), Some(&2));
    assert_eq!(answers.get("q3"), Some(&1));
    assert_eq!(answers.get("q5"), Some(&4));
    assert!(!answers.contains_key("q4"), "unanswered question must be absent");
    assert!(!answers.contains_key("q6"));
    assert_eq!(answers.len(), 4);
    assert!(extraction.ambiguous.is_empty());
}

#[test]
fn test_marks_cover_every_pair_in_order() {
    let sheet = sheet_with_marks(&[(1, 3)]);
    let extraction = extract(&sheet, &test_layout(2));

    assert_eq!(extraction.marks.len(), 10);
    let filled: Vec<_> = extraction.marks.iter().filter(|m| m.filled).collect();
    assert_eq!(filled.len(), 1);
    assert_eq!(filled[0].question_id(), "q2");
    assert_eq!(filled[0].letter(), 'D');
    assert!(filled[0].dark_ratio > 0.9);
    for (i, m) in extraction.marks.iter().enumerate() {
        assert_eq!(m.question as usize, i / 5);
        assert_eq!(m.choice as usize, i % 5);
    }
}

#[test]
fn test_tie_break_keeps_lowest_choice() {
    let sheet = sheet_with_marks(&[(0, 1), (0, 3)]);
    let extraction = extract(&sheet, &test_layout(1));

    assert_eq!(extraction.answers.mcq_answers.get("q1"), Some(&1));
    assert_eq!(extraction.ambiguous, vec!["q1".to_string()]);
}

#[test]
fn test_decode_marks_with_fixed_verdicts() {
    let marks = vec![
        mark(0, 0, false),
        mark(0, 1, true),
        mark(0, 2, false),
        mark(0, 3, true),
        mark(1, 0, false),
        mark(1, 1, false),
        mark(2, 4, true),
    ];
    let (answers, ambiguous) = decode_marks(&marks);
    assert_eq!(answers.get("q1"), Some(&1));
    assert_eq!(answers.get("q2"), None);
    assert_eq!(answers.get("q3"), Some(&4));
    assert_eq!(ambiguous, vec!["q1".to_string()]);

    // same verdicts in a different order decode identically
    let mut reversed = marks.clone();
    reversed.reverse();
    assert_eq!(decode_marks(&reversed), (answers, ambiguous));
}

#[test]
fn test_blank_and_low_contrast_sheets_yield_no_answers() {
    let blank = extract(&blank_sheet(), &test_layout(20));
    assert!(blank.answers.mcq_answers.is_empty());
    assert!(blank.marks.iter().all(|m| !m.filled));

    let grey = image::RgbaImage::from_pixel(SHEET_WIDTH, SHEET_HEIGHT, Rgba([170, 170, 170, 255]));
    let extraction = extract(&grey, &test_layout(20));
    assert!(extraction.answers.mcq_answers.is_empty());
}

#[test]
fn test_half_filled_bubble_is_not_filled() {
    let mut sheet = blank_sheet();
    let slot = GridGeometry::default().slot(SHEET_WIDTH, SHEET_HEIGHT, 0, 0);
    // darken a strip covering the left quarter of the bubble
    for y in 0..SHEET_HEIGHT {
        for x in 0..(slot.center_x as u32 - 3) {
            sheet.put_pixel(x, y, INK);
        }
    }
    let extraction = extract(&sheet, &test_layout(1));
    assert!(!extraction.marks[0].filled, "ratio was {}", extraction.marks[0].dark_ratio);
    assert!(extraction.marks[0].dark_ratio > 0.0);
}

#[test]
fn test_extraction_is_deterministic() {
    let sheet = sheet_with_marks(&[(0, 2), (3, 0), (3, 4), (7, 1)]);
    let layout = test_layout(10);
    assert_eq!(extract(&sheet, &layout), extract(&sheet, &layout));
}

#[test]
fn test_identity_is_left_for_the_reviewer() {
    let extraction = extract(&sheet_with_marks(&[(0, 0)]), &test_layout(1));
    assert_eq!(extraction.answers.student_info, StudentInfo::placeholder());
    assert!(extraction.answers.short_answers.is_empty());
}

#[test]
fn test_preprocess_then_extract() -> anyhow::Result<()> {
    let sheet = sheet_with_marks(&[(0, 0), (1, 2), (2, 1)]);
    let settings = PreprocessingSettings::for_image(SHEET_WIDTH, SHEET_HEIGHT);
    let normalized = preprocess(&sheet, &settings)?;

    let extraction = OmrExtractor::default().extract(&normalized, &test_layout(3));
    assert_eq!(extraction.answers.mcq_answers.len(), 3);
    assert_eq!(extraction.answers.mcq_answers.get("q2"), Some(&2));
    Ok(())
}

#[test]
fn test_rotated_scan_is_recovered_by_rotation_setting() -> anyhow::Result<()> {
    let sheet = sheet_with_marks(&[(0, 4), (5, 0)]);
    // a sheet scanned upside down
    let upside_down = image::imageops::rotate180(&sheet);

    let mut session = PreprocessSession::new(upside_down);
    session.rotate_clockwise();
    session.rotate_clockwise();
    let normalized = session.render()?;

    let extraction = OmrExtractor::default().extract(&normalized, &test_layout(6));
    assert_eq!(extraction.answers.mcq_answers.get("q1"), Some(&4));
    assert_eq!(extraction.answers.mcq_answers.get("q6"), Some(&0));
    assert_eq!(extraction.answers.mcq_answers.len(), 2);
    Ok(())
}

#[test]
fn test_overlay_keeps_dimensions() {
    let sheet = sheet_with_marks(&[(0, 1)]);
    let extraction = extract(&sheet, &test_layout(2));
    let overlay = draw_marks(&sheet, &extraction.marks);
    assert_eq!(overlay.dimensions(), sheet.dimensions());
    assert_ne!(overlay, sheet);
}
