use crate::pipeline::{PipelineData, PipelineStep, MetadataValue};
use crate::detection::preprocessing;
use crate::detection::settings::{PerspectiveMode, Quad};
use anyhow::Result;
use tracing::{debug, warn};

/// Rotate about the image center, keeping the canvas size
pub struct RotationStep {
    pub degrees: f32,
}

impl PipelineStep for RotationStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let image = preprocessing::rotate(&data.image, self.degrees.to_radians());
        Ok(PipelineData { image, ..data }
            .with_metadata("rotation", MetadataValue::Float(self.degrees)))
    }

    fn name(&self) -> &str {
        "Rotation"
    }
}

/// Apply the brightness/contrast filter
pub struct BrightnessContrastStep {
    pub brightness: f32,
    pub contrast: f32,
}

impl PipelineStep for BrightnessContrastStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let image = preprocessing::adjust_brightness_contrast(&data.image, self.brightness, self.contrast);
        Ok(PipelineData { image, ..data })
    }

    fn name(&self) -> &str {
        "Brightness Contrast"
    }
}

/// Perspective correction. In `Passthrough` mode the quad is recorded but the
/// image is returned as is.
pub struct PerspectiveStep {
    pub corners: Quad,
    pub mode: PerspectiveMode,
}

impl PipelineStep for PerspectiveStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let (image, applied) = match self.mode {
            PerspectiveMode::Passthrough => {
                debug!("perspective corners accepted but not applied");
                (data.image, false)
            }
            PerspectiveMode::Warp => match preprocessing::warp_perspective(&data.image, &self.corners) {
                Some(warped) => (warped, true),
                None => {
                    warn!(corners = ?self.corners, "degenerate perspective quad, leaving image unwarped");
                    (data.image, false)
                }
            },
        };

        let mode = format!("{:?}", self.mode);
        Ok(PipelineData { image, metadata: data.metadata }
            .with_metadata("perspective_mode", MetadataValue::String(mode))
            .with_metadata("perspective_applied", MetadataValue::Bool(applied)))
    }

    fn name(&self) -> &str {
        "Perspective"
    }
}

/// Threshold to black and white
pub struct BinarizationStep {
    pub threshold: u8,
}

impl PipelineStep for BinarizationStep {
    fn process(&self, data: PipelineData) -> Result<PipelineData> {
        let image = preprocessing::binarize(&data.image, self.threshold);

        let total = (image.width() as u64 * image.height() as u64).max(1);
        let dark = image.pixels().filter(|p| p[0] == 0).count() as u64;
        let dark_ratio = dark as f32 / total as f32;

        Ok(PipelineData { image, ..data }
            .with_metadata("dark_ratio", MetadataValue::Float(dark_ratio)))
    }

    fn name(&self) -> &str {
        "Binarization"
    }
}
