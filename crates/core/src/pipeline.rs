//! Conversion pipeline: discover → optimize → page geometry → compose → report.
//!
//! Images are processed strictly one at a time. Each decoded buffer is
//! dropped before the next file is opened, so peak memory is bounded by the
//! largest single image rather than by the batch.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{OptimizeMode, PipelineConfig, DEFAULT_FILE_NAME};
use crate::detect::SourceFormat;
use crate::discover::{find_image_files, sort_for_processing};
use crate::encode::{copy_original, prepare_pixels, strategy_quality};
use crate::error::{ConvertError, EmptyInputError, ItemError, PersistError, SetupError};
use crate::geometry::PageGeometry;
use crate::pdf::{LopdfBuilder, PageDocumentBuilder};
use crate::progress::{emit_progress, ProgressHandler, Stage};
use crate::resample::resample_to_width;
use crate::scratch::ScratchDir;
use crate::search::{adaptive_quality, encode_within_ceiling};
use crate::strategy::{select_strategy, CompressionStrategy};

/// What to convert and where the document goes.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub file_name: String,
}

impl ConvertRequest {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

/// A decoded input file.
pub struct SourceImage {
    pub path: PathBuf,
    pub image: DynamicImage,
    pub format: Option<SourceFormat>,
    pub original_size: u64,
}

impl SourceImage {
    pub fn load(path: &Path) -> Result<Self, ItemError> {
        let original_size = std::fs::metadata(path)?.len();
        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|source| ItemError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            image,
            format: SourceFormat::from_path(path),
            original_size,
        })
    }
}

/// The scratch copy that ends up on a page.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizedImage {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub original_size: u64,
    pub byte_size: u64,
    pub strategy: CompressionStrategy,
    pub width: u32,
    pub height: u32,
    /// JPEG quality of the accepted encode; `None` for copied originals.
    pub quality: Option<u8>,
    pub attempts: u32,
}

impl OptimizedImage {
    /// Size reduction relative to the source file, in percent. Negative when
    /// the result grew.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (self.original_size as f64 - self.byte_size as f64) / self.original_size as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of optimizing every discovered file, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub items: Vec<OptimizedImage>,
    pub failures: Vec<ItemFailure>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.items.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn attempted(&self) -> usize {
        self.items.len() + self.failures.len()
    }

    pub fn dimensions(&self) -> Vec<(u32, u32)> {
        self.items.iter().map(|i| (i.width, i.height)).collect()
    }

    fn record(mut self, path: &Path, outcome: Result<OptimizedImage, ItemError>) -> Self {
        match outcome {
            Ok(item) => self.items.push(item),
            Err(e) => {
                warn!("Failed to optimize image {}: {}", display_name(path), e);
                self.failures.push(ItemFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
        self
    }
}

/// Final document size against the advisory threshold. Exceeding it never
/// fails a run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SizeReport {
    pub size_bytes: u64,
    pub threshold_bytes: u64,
    pub exceeds_threshold: bool,
}

impl SizeReport {
    pub fn new(size_bytes: u64, threshold_bytes: u64) -> Self {
        Self {
            size_bytes,
            threshold_bytes,
            exceeds_threshold: size_bytes > threshold_bytes,
        }
    }

    pub fn measure(path: &Path, threshold_bytes: u64) -> Result<Self, PersistError> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self::new(size, threshold_bytes))
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn threshold_mb(&self) -> f64 {
        self.threshold_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    pub found: usize,
    pub geometry: PageGeometry,
    pub size: SizeReport,
    pub batch: BatchResult,
}

impl ConversionReport {
    pub fn pages(&self) -> usize {
        self.batch.succeeded()
    }

    pub fn skipped(&self) -> usize {
        self.batch.failed()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Optimize the `index`-th input into `scratch`.
///
/// Decodes the file, downscales it to the configured width and then either
/// copies the original bytes or re-encodes the pixels as JPEG, depending on
/// the mode and the selected strategy.
pub fn optimize_image(
    path: &Path,
    index: usize,
    scratch: &ScratchDir,
    config: &PipelineConfig,
) -> Result<OptimizedImage, ItemError> {
    let SourceImage {
        path: source_path,
        image,
        format,
        original_size,
    } = SourceImage::load(path)?;
    let (original_w, original_h) = (image.width(), image.height());

    let image = resample_to_width(image, config.target_width);
    let (width, height) = (image.width(), image.height());
    let pixel_count = width as u64 * height as u64;

    let (strategy, start_quality) = match config.mode {
        OptimizeMode::Strategy => {
            let strategy = select_strategy(pixel_count, original_size, format);
            (strategy, strategy_quality(strategy, pixel_count))
        }
        OptimizeMode::SizeTarget => {
            let strategy = if image.color().has_alpha() {
                CompressionStrategy::ConvertAndFlattenToJpeg
            } else {
                CompressionStrategy::OptimizeJpeg
            };
            (strategy, Some(adaptive_quality(pixel_count)))
        }
    };

    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let item = match start_quality {
        None => {
            drop(image);
            let ext = source_path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_else(|| "img".to_string());
            let output_path = scratch.item_path(index, &stem, &ext);
            let byte_size = copy_original(&source_path, &output_path)?;
            OptimizedImage {
                source_path,
                output_path,
                original_size,
                byte_size,
                strategy,
                width: original_w,
                height: original_h,
                quality: None,
                attempts: 0,
            }
        }
        Some(quality) => {
            let rgb = prepare_pixels(&image, strategy);
            drop(image);
            let outcome = encode_within_ceiling(&rgb, quality, config.size_ceiling_bytes)?;
            drop(rgb);
            if !outcome.within(config.size_ceiling_bytes) {
                warn!(
                    quality = outcome.quality,
                    attempts = outcome.attempts,
                    "{}: {} KB still above the {} KB ceiling",
                    display_name(path),
                    outcome.bytes.len() / 1024,
                    config.size_ceiling_bytes / 1024
                );
            }
            let output_path = scratch.item_path(index, &stem, "jpg");
            std::fs::write(&output_path, &outcome.bytes)?;
            OptimizedImage {
                source_path,
                output_path,
                original_size,
                byte_size: outcome.bytes.len() as u64,
                strategy,
                width,
                height,
                quality: Some(outcome.quality),
                attempts: outcome.attempts,
            }
        }
    };

    let reduction = item.reduction_percent();
    if reduction > 0.0 {
        info!(
            strategy = %item.strategy,
            quality = ?item.quality,
            "{}: {} KB -> {} KB ({:.1}% reduction)",
            display_name(path),
            item.original_size / 1024,
            item.byte_size / 1024,
            reduction
        );
    } else {
        info!(
            strategy = %item.strategy,
            "{}: {} KB (kept original)",
            display_name(path),
            item.original_size / 1024
        );
    }
    Ok(item)
}

/// Optimize every file in order. Failures are recorded and skipped; the
/// returned batch preserves input order among the survivors.
pub fn optimize_batch(
    files: &[PathBuf],
    scratch: &ScratchDir,
    config: &PipelineConfig,
    progress: Option<&dyn ProgressHandler>,
) -> BatchResult {
    let total = files.len() as u64;
    let batch = files
        .iter()
        .enumerate()
        .fold(BatchResult::default(), |batch, (index, path)| {
            let name = display_name(path);
            emit_progress(progress, Stage::Optimize, index as u64 + 1, total, Some(&name));
            batch.record(path, optimize_image(path, index, scratch, config))
        });
    info!(
        "Successfully optimized {} of {} images ({} skipped)",
        batch.succeeded(),
        batch.attempted(),
        batch.failed()
    );
    batch
}

/// Convert every supported image under `request.input_dir` into one PDF,
/// laid out by `builder`.
///
/// The scratch directory is removed before this returns, whether the run
/// succeeds or fails.
pub fn convert_directory(
    request: &ConvertRequest,
    config: &PipelineConfig,
    builder: &mut dyn PageDocumentBuilder,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ConversionReport, ConvertError> {
    config.validate()?;
    if !request.input_dir.is_dir() {
        return Err(SetupError::MissingInput(request.input_dir.clone()).into());
    }
    std::fs::create_dir_all(&request.output_dir).map_err(|source| SetupError::OutputDir {
        path: request.output_dir.clone(),
        source,
    })?;

    let mut files = find_image_files(&request.input_dir).map_err(SetupError::from)?;
    if files.is_empty() {
        return Err(EmptyInputError::NoImages(request.input_dir.clone()).into());
    }
    sort_for_processing(&mut files);
    info!("Found {} image files, converting to PDF", files.len());

    let scratch = ScratchDir::create_in(&request.output_dir)?;
    let batch = optimize_batch(&files, &scratch, config, progress);
    if batch.items.is_empty() {
        return Err(EmptyInputError::AllItemsFailed {
            attempted: batch.attempted(),
        }
        .into());
    }

    let geometry =
        PageGeometry::from_dimensions(&batch.dimensions(), config.dpi).map_err(EmptyInputError::from)?;
    info!(
        "Average image dimensions: {:.1}x{:.1} pixels; page size {:.1}x{:.1} points at {} DPI",
        geometry.avg_width_px, geometry.avg_height_px, geometry.width_pt, geometry.height_pt, geometry.dpi
    );

    builder.start(&geometry);
    let total = batch.items.len() as u64;
    for (i, item) in batch.items.iter().enumerate() {
        let name = display_name(&item.output_path);
        emit_progress(progress, Stage::Compose, i as u64 + 1, total, Some(&name));
        builder.add_full_page_image(&item.output_path)?;
    }

    let output_path = request.output_path();
    builder.save(&output_path)?;
    let size = SizeReport::measure(&output_path, config.size_report_threshold_bytes)?;
    if size.exceeds_threshold {
        warn!(
            "PDF size ({:.2} MB) exceeds target of {:.1} MB",
            size.size_mb(),
            size.threshold_mb()
        );
    }

    if let Err(e) = scratch.close() {
        warn!("Failed to clean up temporary images: {}", e);
    }
    info!("Successfully created PDF: {}", output_path.display());

    Ok(ConversionReport {
        output_path,
        found: files.len(),
        geometry,
        size,
        batch,
    })
}

/// [`convert_directory`] with the `lopdf` builder.
pub fn convert_directory_to_pdf(
    request: &ConvertRequest,
    config: &PipelineConfig,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ConversionReport, ConvertError> {
    let mut builder = LopdfBuilder::new();
    if let Some(stem) = Path::new(&request.file_name).file_stem() {
        builder.set_title(stem.to_string_lossy());
    }
    convert_directory(request, config, &mut builder, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn scratch() -> (tempfile::TempDir, ScratchDir) {
        let parent = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create_in(parent.path()).unwrap();
        (parent, scratch)
    }

    #[test]
    fn small_png_is_copied_verbatim() {
        let (dir, scratch) = scratch();
        let src = dir.path().join("small.png");
        RgbImage::from_pixel(20, 10, Rgb([1, 2, 3])).save(&src).unwrap();

        let item = optimize_image(&src, 3, &scratch, &PipelineConfig::default()).unwrap();
        assert_eq!(item.strategy, CompressionStrategy::KeepOriginal);
        assert_eq!(item.quality, None);
        assert_eq!((item.width, item.height), (20, 10));
        assert_eq!(std::fs::read(&item.output_path).unwrap(), std::fs::read(&src).unwrap());
        assert!(item.output_path.file_name().unwrap().to_string_lossy().starts_with("00003-small"));
    }

    #[test]
    fn size_target_mode_reencodes_and_downscales() {
        let (dir, scratch) = scratch();
        let src = dir.path().join("wide.png");
        RgbaImage::from_pixel(1600, 400, Rgba([10, 20, 30, 0])).save(&src).unwrap();

        let config = PipelineConfig {
            mode: OptimizeMode::SizeTarget,
            ..PipelineConfig::default()
        };
        let item = optimize_image(&src, 0, &scratch, &config).unwrap();
        assert_eq!(item.strategy, CompressionStrategy::ConvertAndFlattenToJpeg);
        assert_eq!((item.width, item.height), (800, 200));
        assert_eq!(item.quality, Some(90));
        assert_eq!(item.attempts, 1);

        let decoded = image::open(&item.output_path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (800, 200));
        // Fully transparent source becomes white after flattening.
        let p = decoded.get_pixel(400, 100).0;
        assert!(p.iter().all(|&c| c >= 250), "{p:?}");
    }

    #[test]
    fn undecodable_file_is_item_error() {
        let (dir, scratch) = scratch();
        let src = dir.path().join("broken.jpg");
        std::fs::write(&src, b"not really a jpeg").unwrap();
        let err = optimize_image(&src, 0, &scratch, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, ItemError::Decode { .. }));
    }

    #[test]
    fn batch_keeps_order_and_counts_failures() {
        let (dir, scratch) = scratch();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let c = dir.path().join("c.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(&a).unwrap();
        std::fs::write(&b, b"garbage").unwrap();
        RgbImage::from_pixel(6, 6, Rgb([0, 0, 0])).save(&c).unwrap();

        let batch = optimize_batch(
            &[a.clone(), b.clone(), c.clone()],
            &scratch,
            &PipelineConfig::default(),
            None,
        );
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.failed(), 1);
        assert_eq!(batch.items[0].source_path, a);
        assert_eq!(batch.items[1].source_path, c);
        assert_eq!(batch.failures[0].path, b);
        assert_eq!(batch.dimensions(), vec![(4, 4), (6, 6)]);
    }

    #[test]
    fn size_report_threshold() {
        let under = SizeReport::new(3 * 1024 * 1024, 3 * 1024 * 1024);
        assert!(!under.exceeds_threshold);
        let over = SizeReport::new(3 * 1024 * 1024 + 1, 3 * 1024 * 1024);
        assert!(over.exceeds_threshold);
        assert!((under.size_mb() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn reduction_percent() {
        let item = OptimizedImage {
            source_path: PathBuf::from("a.jpg"),
            output_path: PathBuf::from("b.jpg"),
            original_size: 1000,
            byte_size: 250,
            strategy: CompressionStrategy::OptimizeJpeg,
            width: 1,
            height: 1,
            quality: Some(75),
            attempts: 1,
        };
        assert!((item.reduction_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn request_output_path() {
        let req = ConvertRequest::new("in", "out").with_file_name("book.pdf");
        assert_eq!(req.output_path(), PathBuf::from("out").join("book.pdf"));
        assert_eq!(ConvertRequest::new("in", "out").file_name, "images.pdf");
    }
}
