use anyhow::{Context, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

// @module: File and directory utilities

/// Prefix of every translated artifact and output file name
pub const TRANSLATED_PREFIX: &str = "translated_";

/// Leading bytes of a PDF file
const PDF_MAGIC: &[u8] = b"%PDF-";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @returns: `translated_<name>` next to the given file
    pub fn translated_path<P: AsRef<Path>>(file: P) -> PathBuf {
        let file = file.as_ref();
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        dir.join(Self::translated_filename(file))
    }

    // @generates: Output path for a translated document
    // @params: input_file, output_dir
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, output_dir: P2) -> PathBuf {
        output_dir.as_ref().join(Self::translated_filename(input_file.as_ref()))
    }

    fn translated_filename(file: &Path) -> String {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}{}", TRANSLATED_PREFIX, name)
    }

    /// Read a whole file
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        fs::read(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write bytes to a file, creating its directory if needed
    pub fn write_bytes<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                Self::ensure_dir(parent)?;
            }
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Detect whether a file is a PDF document by its header
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("File does not exist: {:?}", path));
        }

        let mut header = [0u8; 5];
        let mut file = fs::File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
        let read = file.read(&mut header)?;
        if read == PDF_MAGIC.len() && &header[..] == PDF_MAGIC {
            return Ok(FileType::Pdf);
        }

        Ok(FileType::Unknown)
    }
}

/// Enum representing different file types
#[derive(Debug, PartialEq, Eq)]
pub enum FileType {
    /// Portable Document Format
    Pdf,
    /// Unknown file type
    Unknown,
}
