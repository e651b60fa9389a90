use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result};
use tracing::debug;

/// Data that flows through the pipeline: one raster plus per-run metadata.
#[derive(Clone)]
pub struct PipelineData {
    /// The image produced by the previous step
    pub image: RgbaImage,

    /// Metadata recorded by steps (e.g., "perspective_applied")
    pub metadata: HashMap<String, MetadataValue>,
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Float(f32),
    String(String),
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image,
            metadata: HashMap::new(),
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key) {
            Some(MetadataValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.metadata.get(key) {
            Some(MetadataValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Directory receiving one PNG per step
    pub output_dir: PathBuf,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Transform the image. Steps must not depend on state from earlier runs.
    fn process(&self, data: PipelineData) -> Result<PipelineData>;

    /// Human-readable name for this step (used in logs and debug file names)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run every step on a copy of `input`; the input itself is never touched.
    pub fn run(&self, input: &RgbaImage) -> Result<PipelineData> {
        self.save_debug(input, "00_input.png")?;

        let mut data = PipelineData::from_image(input.clone());

        for (step_idx, step) in self.steps.iter().enumerate() {
            let started = Instant::now();
            data = step.process(data)?;
            debug!(
                step = step.name(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "pipeline step finished"
            );

            let filename = format!(
                "{:02}_{}.png",
                step_idx + 1,
                step.name().to_lowercase().replace(' ', "_")
            );
            self.save_debug(&data.image, &filename)?;
        }

        Ok(data)
    }

    fn save_debug(&self, image: &RgbaImage, filename: &str) -> Result<()> {
        if let Some(debug_config) = &self.debug {
            let output_path = debug_config.output_dir.join(filename);
            image
                .save(&output_path)
                .with_context(|| format!("Failed to save debug image {:?}", output_path))?;
            debug!("saved debug image {}", filename);
        }
        Ok(())
    }
}
