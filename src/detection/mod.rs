pub mod preprocessing;
pub mod settings;
pub mod source;
pub mod steps;

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;

use crate::pipeline::{Pipeline, PipelineData};
use settings::PreprocessingSettings;
use steps::*;

/// Builds the normalisation pipeline for one settings value:
/// rotation, brightness/contrast, perspective, binarization.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    debug_out: Option<PathBuf>,
}

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dump every intermediate image into `dir` (must be empty or absent).
    pub fn with_debug(mut self, dir: PathBuf) -> Self {
        self.debug_out = Some(dir);
        self
    }

    pub fn pipeline(&self, settings: &PreprocessingSettings) -> anyhow::Result<Pipeline> {
        let mut pipeline = Pipeline::new()
            .add_step(Arc::new(RotationStep { degrees: settings.rotation() }))
            .add_step(Arc::new(BrightnessContrastStep {
                brightness: settings.brightness,
                contrast: settings.contrast,
            }))
            .add_step(Arc::new(PerspectiveStep {
                corners: settings.corners,
                mode: settings.perspective_mode,
            }))
            .add_step(Arc::new(BinarizationStep { threshold: settings.threshold }));

        if let Some(dir) = &self.debug_out {
            pipeline = pipeline.with_debug(dir.clone())?;
        }
        Ok(pipeline)
    }

    /// Run the pipeline and keep the step metadata.
    pub fn run(&self, source: &RgbaImage, settings: &PreprocessingSettings) -> anyhow::Result<PipelineData> {
        self.pipeline(settings)?.run(source)
    }
}

/// Normalise `source` with `settings`. The source is never mutated, so calling
/// this again with the same inputs yields an identical buffer.
pub fn preprocess(source: &RgbaImage, settings: &PreprocessingSettings) -> anyhow::Result<RgbaImage> {
    Ok(ImagePreprocessor::new().run(source, settings)?.image)
}

/// Same as [`preprocess`] but on the blocking thread pool.
pub async fn preprocess_blocking(
    source: Arc<RgbaImage>,
    settings: PreprocessingSettings,
) -> anyhow::Result<RgbaImage> {
    tokio::task::spawn_blocking(move || preprocess(&source, &settings)).await?
}

/// A loaded source image together with the settings currently applied to it.
pub struct PreprocessSession {
    source: Arc<RgbaImage>,
    settings: PreprocessingSettings,
}

impl PreprocessSession {
    pub fn new(source: RgbaImage) -> Self {
        let settings = PreprocessingSettings::for_image(source.width(), source.height());
        Self {
            source: Arc::new(source),
            settings,
        }
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    pub fn settings(&self) -> &PreprocessingSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PreprocessingSettings {
        &mut self.settings
    }

    pub fn rotate_clockwise(&mut self) {
        self.settings.rotate_clockwise();
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.settings.rotate_counter_clockwise();
    }

    pub fn reset(&mut self) {
        let (width, height) = self.source.dimensions();
        self.settings.reset(width, height);
    }

    /// Re-derive the normalised image from the original source.
    pub fn render(&self) -> anyhow::Result<RgbaImage> {
        preprocess(&self.source, &self.settings)
    }

    pub async fn render_blocking(&self) -> anyhow::Result<RgbaImage> {
        preprocess_blocking(self.source.clone(), self.settings).await
    }
}
