use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use omrgrade::core::db::{AttemptRepository, GradingDb};
use omrgrade::detection::source::load_scan;
use omrgrade::grading::load_answer_key;
use omrgrade::omr::overlay::draw_marks;
use omrgrade::{
    logger, AnswerKey, ImagePreprocessor, LayoutDescriptor, OmrExtractor, Override, PerspectiveMode,
    Point, PreprocessSession, Quad, ReviewSession, StudentInfo,
};

#[derive(Parser)]
#[command(name = "omrgrade")]
#[command(about = "Read and grade scanned multiple-choice answer sheets")]
struct Cli {
    /// Path to the scanned answer sheet
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Layout descriptor JSON ({testId, versionId, layoutSeed, numQuestions})
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,

    /// Number of questions (ignored when --layout is given)
    #[arg(long, default_value_t = 20)]
    questions: u32,

    #[arg(long, default_value = "offline")]
    test_id: String,

    #[arg(long, default_value = "1")]
    version_id: String,

    #[arg(long, default_value_t = 0)]
    seed: i64,

    /// Answer key JSON ({"q1": 0, "q2": 3, ...})
    #[arg(long, value_name = "FILE")]
    key: Option<PathBuf>,

    /// Rotation in degrees (clockwise)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    rotation: f32,

    /// Additional 90 degree turns; negative turns counter-clockwise
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    rotate_steps: i32,

    /// Brightness in percent
    #[arg(long, default_value_t = 100.0)]
    brightness: f32,

    /// Contrast in percent
    #[arg(long, default_value_t = 100.0)]
    contrast: f32,

    /// Binarization threshold (0-255)
    #[arg(long, default_value_t = 128)]
    threshold: u8,

    /// Perspective corners "x,y;x,y;x,y;x,y" (top-left, top-right, bottom-left, bottom-right)
    #[arg(long, value_parser = parse_quad)]
    corners: Option<Quad>,

    /// Actually warp the perspective quad instead of only recording it
    #[arg(long)]
    warp: bool,

    /// Student name
    #[arg(long)]
    name: Option<String>,

    /// Student id
    #[arg(long)]
    student_id: Option<String>,

    /// Reviewer correction, e.g. q3=D (repeatable)
    #[arg(long = "override", value_name = "Q=CHOICE")]
    overrides: Vec<Override>,

    /// Short-answer text, e.g. q21=photosynthesis (repeatable)
    #[arg(long = "short", value_name = "Q=TEXT", value_parser = parse_short)]
    short_answers: Vec<(String, String)>,

    /// Submit and save the attempt into this archive
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_quad(value: &str) -> Result<Quad, String> {
    let points = value
        .split(';')
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("expected x,y but got {pair:?}"))?;
            let x = x.trim().parse::<f32>().map_err(|e| e.to_string())?;
            let y = y.trim().parse::<f32>().map_err(|e| e.to_string())?;
            Ok(Point::new(x, y))
        })
        .collect::<Result<Vec<_>, String>>()?;

    match points.as_slice() {
        [top_left, top_right, bottom_left, bottom_right] => Ok(Quad {
            top_left: *top_left,
            top_right: *top_right,
            bottom_left: *bottom_left,
            bottom_right: *bottom_right,
        }),
        _ => Err(format!("expected 4 corners, got {}", points.len())),
    }
}

fn parse_short(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(q, text)| (q.trim().to_string(), text.to_string()))
        .ok_or_else(|| format!("expected Q=TEXT but got {value:?}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    logger::init(args.verbose);

    debug!("Loading image: {:?}", args.image_path);
    let img = load_scan(&args.image_path)?;
    info!("Image loaded: {}x{}", img.width(), img.height());

    let layout = match &args.layout {
        Some(path) => LayoutDescriptor::load(path)?,
        None => LayoutDescriptor::new(&args.test_id, &args.version_id, args.questions).with_seed(args.seed),
    };

    let mut session = PreprocessSession::new(img);
    {
        let settings = session.settings_mut();
        settings.set_rotation(args.rotation);
        settings.brightness = args.brightness;
        settings.contrast = args.contrast;
        settings.threshold = args.threshold;
        if let Some(corners) = args.corners {
            settings.corners = corners;
        }
        if args.warp {
            settings.perspective_mode = PerspectiveMode::Warp;
        }
    }
    for _ in 0..args.rotate_steps.unsigned_abs() {
        if args.rotate_steps > 0 {
            session.rotate_clockwise();
        } else {
            session.rotate_counter_clockwise();
        }
    }

    let normalized = match &args.debug_out {
        Some(dir) => {
            let preprocessor = ImagePreprocessor::new().with_debug(dir.clone());
            let data = preprocessor.run(session.source(), session.settings())?;
            if let Some(ratio) = data.get_float("dark_ratio") {
                debug!("Dark pixel ratio after binarization: {:.3}", ratio);
            }
            data.image
        }
        None => session.render_blocking().await?,
    };

    let normalized = Arc::new(normalized);
    let extraction = {
        let normalized = normalized.clone();
        let layout = layout.clone();
        tokio::task::spawn_blocking(move || OmrExtractor::default().extract(&normalized, &layout)).await?
    };

    if let Some(dir) = &args.debug_out {
        let overlay_path = dir.join("marks.png");
        draw_marks(&normalized, &extraction.marks).save(&overlay_path)?;
        debug!("Saved bubble overlay to {:?}", overlay_path);
    }

    println!("\n=== Extracted Answers ({}) ===", layout.test_id);
    for question in 0..layout.modeled_questions() {
        let id = omrgrade::models::question_id(question);
        let letter = extraction
            .answers
            .mcq_answers
            .get(&id)
            .map(|c| omrgrade::models::choice_letter(*c).to_string())
            .unwrap_or_else(|| "-".to_string());
        let flag = if extraction.ambiguous.contains(&id) { "  (multiple marks)" } else { "" };
        println!("  {:>4}: {}{}", id, letter, flag);
    }
    if layout.num_questions > layout.modeled_questions() {
        warn!(
            "Only the first {} of {} questions are read from the sheet",
            layout.modeled_questions(),
            layout.num_questions
        );
    }

    let key: AnswerKey = match &args.key {
        Some(path) => load_answer_key(path)?,
        None => AnswerKey::new(),
    };

    let mut review = ReviewSession::new(extraction.answers, layout, key)
        .with_original_image(args.image_path.to_string_lossy());

    review.set_identity(StudentInfo::new(
        args.name.clone().unwrap_or_default(),
        args.student_id.clone().unwrap_or_default(),
    ))?;
    for correction in &args.overrides {
        review.apply(correction)?;
    }
    for (question, text) in &args.short_answers {
        review.set_short_answer(question, text.as_str())?;
    }

    let summary = review.score();
    println!("\nScore: {}/{}", summary.correct, summary.total);

    if let Some(store_path) = &args.store {
        let attempt = review.submit()?;
        let db = GradingDb::new(store_path).await?;
        let attempt_id = db.save_attempt(&attempt).await?;
        db.save_archive().await?;
        println!("Saved attempt {} to {}", attempt_id, store_path.display());
    }

    Ok(())
}
