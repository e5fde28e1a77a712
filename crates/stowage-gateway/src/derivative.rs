//! Derivative (thumbnail) generation for master/slave image uploads

use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use stowage_cluster::{
    file_extension, status, FileId, MasterAndSlave, Metadata, StorageError, StorageGatewayClient,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// A requested output size, `WxH`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DerivativeSpec {
    width: u32,
    height: u32,
}

/// A cut-size string that could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed cut size {entry:?}, expected WxH with positive dimensions")]
pub struct ParseSpecError {
    entry: String,
}

impl DerivativeSpec {
    /// Both dimensions must be positive
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Parse a comma separated list (`"100x100,200x150"`), keeping order.
    ///
    /// Any malformed entry rejects the whole list. An empty string yields an
    /// empty list.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, ParseSpecError> {
        if input.trim().is_empty() {
            return Ok(Vec::new());
        }
        input.split(',').map(str::parse).collect()
    }

    /// Name given to the rendered derivative
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self, ext)
    }
}

impl fmt::Display for DerivativeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for DerivativeSpec {
    type Err = ParseSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entry = s.trim();
        let malformed = || ParseSpecError {
            entry: entry.to_string(),
        };
        let (w, h) = entry.split_once('x').ok_or_else(malformed)?;
        let width = w.parse::<u32>().map_err(|_| malformed())?;
        let height = h.parse::<u32>().map_err(|_| malformed())?;
        Self::new(width, height).ok_or_else(malformed)
    }
}

/// Failure to render one derivative
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot decode source image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("cannot encode {spec} derivative: {source}")]
    Encode {
        spec: DerivativeSpec,
        #[source]
        source: image::ImageError,
    },

    #[error("renderer task failed: {0}")]
    Task(String),
}

/// Produces a resized copy of a source image
pub trait ImageRenderer: Send + Sync {
    /// Render `source` to fit within `spec`, encoded for extension `ext`
    fn render(
        &self,
        source: &SourceImage,
        spec: DerivativeSpec,
        ext: &str,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Renderer backed by the `image` crate.
///
/// Scales down to fit inside the requested box, keeping the aspect ratio.
/// Images already smaller than the box keep their size.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThumbnailRenderer;

impl ImageRenderer for ThumbnailRenderer {
    fn render(
        &self,
        source: &SourceImage,
        spec: DerivativeSpec,
        ext: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let image = source.decode()?;
        let format = ImageFormat::from_extension(ext).unwrap_or(ImageFormat::Png);
        let width = spec.width.min(image.width());
        let height = spec.height.min(image.height());
        let mut resized = image.resize(width, height, FilterType::Triangle);
        if format == ImageFormat::Jpeg {
            resized = DynamicImage::ImageRgb8(resized.to_rgb8());
        }

        let mut out = Cursor::new(Vec::new());
        resized
            .write_to(&mut out, format)
            .map_err(|source| RenderError::Encode { spec, source })?;
        Ok(out.into_inner())
    }
}

/// Extension derivatives are encoded with: the source's own when it names a
/// known image format, PNG otherwise
pub fn derivative_extension(file_name: &str) -> String {
    let ext = file_extension(file_name).to_ascii_lowercase();
    match ImageFormat::from_extension(&ext) {
        Some(_) => ext,
        None => "png".to_string(),
    }
}

/// Where the master's bytes come from
#[derive(Clone, Debug)]
pub enum SourceImage {
    /// Staged on local disk; every render reads the file again
    Staged(PathBuf),
    /// Already in memory
    InMemory(Bytes),
}

impl SourceImage {
    /// Decode the image. Runs blocking file I/O for staged sources.
    pub fn decode(&self) -> Result<DynamicImage, RenderError> {
        match self {
            Self::Staged(path) => ImageReader::open(path)
                .and_then(ImageReader::with_guessed_format)
                .map_err(image::ImageError::IoError)
                .and_then(ImageReader::decode),
            Self::InMemory(data) => image::load_from_memory(data),
        }
        .map_err(RenderError::Decode)
    }
}

/// Result of processing one derivative spec
#[derive(Debug)]
pub enum SlaveOutcome {
    Linked(FileId),
    Skipped(String),
}

/// Uploads a master image, then renders and links one slave per spec
#[derive(Clone)]
pub struct DerivativePipeline {
    storage: StorageGatewayClient,
    renderer: Arc<dyn ImageRenderer>,
}

impl DerivativePipeline {
    pub fn new(storage: StorageGatewayClient) -> Self {
        Self::with_renderer(storage, Arc::new(ThumbnailRenderer))
    }

    pub fn with_renderer(storage: StorageGatewayClient, renderer: Arc<dyn ImageRenderer>) -> Self {
        Self { storage, renderer }
    }

    /// Upload `source` as the master and link every derivative that renders
    /// and uploads successfully, in spec order.
    ///
    /// Only a master failure fails the whole call, always as
    /// `UploadRejected`.
    #[instrument(skip(self, source, specs), fields(specs = specs.len()))]
    pub async fn derive_and_upload(
        &self,
        source: SourceImage,
        file_name: &str,
        specs: &[DerivativeSpec],
    ) -> Result<MasterAndSlave, StorageError> {
        let master = self
            .upload_master(&source, file_name)
            .await
            .map_err(master_rejected)?;
        debug!(file_id = %master, "Master uploaded");

        let slave_ext = derivative_extension(file_name);
        let mut result = MasterAndSlave::with_capacity(master, specs.len());
        for spec in specs {
            match self.derive_one(&source, result.master(), *spec, &slave_ext).await {
                SlaveOutcome::Linked(id) => result.push_slave(id),
                SlaveOutcome::Skipped(reason) => {
                    warn!(master = %result.master(), %spec, reason = %reason, "Derivative skipped");
                }
            }
        }
        Ok(result)
    }

    /// The master's bytes are only held for the duration of its upload
    async fn upload_master(
        &self,
        source: &SourceImage,
        file_name: &str,
    ) -> Result<FileId, StorageError> {
        let data = match source {
            SourceImage::InMemory(data) => data.clone(),
            SourceImage::Staged(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(StorageError::TransferFailed)?;
                self.storage
                    .transfer()
                    .read_to_bytes(file)
                    .await
                    .map_err(StorageError::TransferFailed)?
            }
        };
        self.storage
            .upload(&data, file_extension(file_name), &Metadata::with_file_name(file_name))
            .await
    }

    async fn derive_one(
        &self,
        source: &SourceImage,
        master: &FileId,
        spec: DerivativeSpec,
        ext: &str,
    ) -> SlaveOutcome {
        let renderer = Arc::clone(&self.renderer);
        let source = source.clone();
        let render_ext = ext.to_string();
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render(&source, spec, &render_ext)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))
        .and_then(|r| r);

        let bytes = match rendered {
            Ok(bytes) => bytes,
            Err(e) => return SlaveOutcome::Skipped(e.to_string()),
        };

        let meta = Metadata::with_file_name(spec.file_name(ext));
        match self
            .storage
            .upload_slave(master, &bytes, &spec.to_string(), ext, &meta)
            .await
        {
            Ok(id) => SlaveOutcome::Linked(id),
            Err(e) => SlaveOutcome::Skipped(e.to_string()),
        }
    }
}

fn master_rejected(err: StorageError) -> StorageError {
    match err {
        StorageError::UploadRejected { .. } => err,
        other => StorageError::UploadRejected {
            code: status::IO,
            reason: format!("master upload failed: {}", other),
        },
    }
}
