use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

/// Number of leading bytes sniffed for magic numbers
const SNIFF_LEN: u64 = 16;

/// Compression formats detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

/// An input ready for streaming: the original file, or a decompressed temporary copy
#[derive(Debug)]
pub enum PreparedInput {
    Plain(PathBuf),
    Decompressed(NamedTempFile),
}

impl PreparedInput {
    pub fn path(&self) -> &Path {
        match self {
            Self::Plain(path) => path,
            Self::Decompressed(file) => file.path(),
        }
    }

    pub fn is_decompressed(&self) -> bool {
        matches!(self, Self::Decompressed(_))
    }
}

/// Magic byte detection and decompression of guide inputs
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        match infer::get(data).map(|kind| kind.mime_type()) {
            Some("application/gzip") => CompressionFormat::Gzip,
            _ => CompressionFormat::Uncompressed,
        }
    }

    /// Sniff the file and, when compressed, decompress it once into a temporary file
    /// so that both the counting pass and the filter pass stream plain bytes
    pub async fn prepare(path: &Path) -> AppResult<PreparedInput> {
        let file = tokio::fs::File::open(path).await?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN).read_to_end(&mut head).await?;

        match Self::detect_compression_format(&head) {
            CompressionFormat::Uncompressed => {
                debug!("Input is uncompressed: {}", path.display());
                Ok(PreparedInput::Plain(path.to_path_buf()))
            }
            CompressionFormat::Gzip => {
                info!("Decompressing gzip input: {}", path.display());
                let source = path.to_path_buf();
                let temp = tokio::task::spawn_blocking(move || Self::decompress_gzip(&source))
                    .await
                    .map_err(|e| AppError::internal(format!("decompression task failed: {e}")))??;
                Ok(PreparedInput::Decompressed(temp))
            }
        }
    }

    #[cfg(feature = "compression-gzip")]
    fn decompress_gzip(source: &Path) -> AppResult<NamedTempFile> {
        use flate2::read::MultiGzDecoder;

        let input = std::fs::File::open(source)?;
        let mut decoder = MultiGzDecoder::new(std::io::BufReader::new(input));
        let mut temp = NamedTempFile::new()?;
        let written = std::io::copy(&mut decoder, temp.as_file_mut())?;
        debug!(
            "Decompressed {} to {} bytes at {}",
            source.display(),
            written,
            temp.path().display()
        );
        Ok(temp)
    }

    #[cfg(not(feature = "compression-gzip"))]
    fn decompress_gzip(source: &Path) -> AppResult<NamedTempFile> {
        Err(AppError::internal(format!(
            "{} is gzip compressed but gzip support is not enabled",
            source.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_uncompressed() {
        let data = b"<?xml version=\"1.0\"?><tv></tv>";
        let format = DecompressionService::detect_compression_format(data);
        assert_eq!(format, CompressionFormat::Uncompressed);
    }

    #[tokio::test]
    async fn test_prepare_plain_file_is_passed_through() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"<tv></tv>").unwrap();

        let prepared = DecompressionService::prepare(file.path()).await.unwrap();
        assert!(!prepared.is_decompressed());
        assert_eq!(prepared.path(), file.path());
    }

    #[tokio::test]
    async fn test_prepare_missing_file() {
        let result = DecompressionService::prepare(Path::new("/nonexistent/guide.xml")).await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[cfg(feature = "compression-gzip")]
    #[tokio::test]
    async fn test_prepare_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let original = b"<tv><channel id=\"a\"><display-name>A</display-name></channel></tv>";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(
            DecompressionService::detect_compression_format(&compressed),
            CompressionFormat::Gzip
        );

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&compressed).unwrap();

        let prepared = DecompressionService::prepare(file.path()).await.unwrap();
        assert!(prepared.is_decompressed());
        let contents = std::fs::read(prepared.path()).unwrap();
        assert_eq!(contents, original);
    }
}
