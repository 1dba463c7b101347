//! Directory conversion: every `<stem>.mca` becomes `<stem>.mri.gz`.
//!
//! Per file the steps are strictly ordered:
//! 1. read and parse the region
//! 2. write the archive to a temporary file next to it
//! 3. flush, sync (and optionally read back) the temporary file, then sync
//!    its directory
//! 4. delete the source
//! 5. rename the temporary file to its final name
//!
//! Nothing is deleted until step 3 has succeeded, so a failure or a crash
//! never leaves a directory without either the region or its archive.

mod error;
pub mod metrics;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use flate2::Compression;
use mri_anvil::Region;
use rayon::prelude::*;
use tempfile::NamedTempFile;

pub use error::ConvertError;
pub use metrics::ConversionMetrics;

/// Extension of the files the converter picks up.
pub const REGION_EXTENSION: &str = "mca";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Worker threads, 0 for one per available CPU.
    pub jobs: usize,
    /// Gzip level, 0-9.
    pub level: u32,
    /// Read the archive back and compare before deleting the source.
    pub verify: bool,
    /// Replace an existing archive instead of failing the file.
    pub overwrite: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            jobs: 0,
            level: 6,
            verify: true,
            overwrite: false,
        }
    }
}

/// Outcome of a directory conversion.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// `(source, archive)` for every converted file.
    pub converted: Vec<(PathBuf, PathBuf)>,
    /// Files left in place, with the reason.
    pub failed: Vec<(PathBuf, ConvertError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Converter {
    options: ConvertOptions,
    metrics: ConversionMetrics,
    sync: fn(&File) -> std::io::Result<()>,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            metrics: ConversionMetrics::new(),
            sync: File::sync_all,
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn metrics(&self) -> &ConversionMetrics {
        &self.metrics
    }

    /// Convert every region file directly inside `dir`.
    ///
    /// Only failing to list the directory or to start the workers is an
    /// error here; per-file failures are collected in the report.
    pub fn convert(&self, dir: &Path) -> Result<BatchReport, ConvertError> {
        let files = region_files(dir)?;
        log::info!("Converting {} region files in {}", files.len(), dir.display());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()?;
        let outcomes: Vec<(PathBuf, Result<PathBuf, ConvertError>)> = pool.install(|| {
            files
                .into_par_iter()
                .map(|source| {
                    let outcome = self.convert_file(&source);
                    (source, outcome)
                })
                .collect()
        });

        let mut report = BatchReport::default();
        for (source, outcome) in outcomes {
            match outcome {
                Ok(archive) => report.converted.push((source, archive)),
                Err(err) => {
                    log::error!("Failed to convert {}: {}", source.display(), error_chain(&err));
                    report.failed.push((source, err));
                }
            }
        }
        Ok(report)
    }

    /// Convert one region file, returning the archive path.
    ///
    /// On error the source is left untouched, except for
    /// [`ConvertError::Rename`] where the archive is kept at a temporary path.
    pub fn convert_file(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        let outcome = self.convert_file_inner(source);
        match &outcome {
            Ok(_) => self.metrics.record_converted(),
            Err(_) => self.metrics.record_failed(),
        }
        outcome
    }

    fn convert_file_inner(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        let target = archive_path(source)?;
        if !self.options.overwrite && target.exists() {
            return Err(ConvertError::OutputExists(target));
        }

        // Pending -> Parsed
        let start = Instant::now();
        let bytes = fs::read(source).map_err(|e| io_error(source, "read", e))?;
        let region = mri_anvil::parse(&bytes).map_err(|e| ConvertError::Anvil {
            path: source.to_path_buf(),
            source: e,
        })?;
        let summary = region.summary();
        self.metrics.record_parse(start.elapsed(), bytes.len(), &summary);
        drop(bytes);
        log::debug!("{}: parsed {} chunks, {} sections", source.display(), summary.chunks, summary.sections);

        // Parsed -> Written -> Verified-Durable
        let temp = self.write_durable(&region, source, &target)?;

        // From here on the archive must survive every error.
        let (_, temp_path) = temp.keep().map_err(|e| io_error(e.file.path(), "keep", e.error))?;

        // Verified-Durable -> SourceDeleted
        if let Err(err) = fs::remove_file(source) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                log::warn!("Could not remove {}: {}", temp_path.display(), cleanup);
            }
            return Err(io_error(source, "delete", err));
        }
        log::debug!("{}: source deleted", source.display());

        // SourceDeleted -> Done
        fs::rename(&temp_path, &target).map_err(|err| ConvertError::Rename {
            temp: temp_path.clone(),
            target: target.clone(),
            source: err,
        })?;

        log::info!("Converted {} -> {}", source.display(), target.display());
        Ok(target)
    }

    /// Write the archive to a temporary file in the target's directory and
    /// make sure it is on disk. The file is removed again if any step fails.
    fn write_durable(&self, region: &Region, source: &Path, target: &Path) -> Result<NamedTempFile, ConvertError> {
        let dir = target.parent().unwrap_or(Path::new("."));
        let stem = source.file_stem().unwrap_or_default().to_string_lossy();
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{stem}."))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| io_error(dir, "create a temporary file in", e))?;
        let temp_path = temp.path().to_path_buf();

        let start = Instant::now();
        let level = Compression::new(self.options.level.min(9));
        let mut writer = mri_archive::write(region, BufWriter::new(temp.as_file_mut()), level)
            .map_err(|e| ConvertError::Archive { path: temp_path.clone(), source: e })?;
        writer.flush().map_err(|e| io_error(&temp_path, "flush", e))?;
        drop(writer);
        (self.sync)(temp.as_file()).map_err(|e| io_error(&temp_path, "sync", e))?;

        let written = temp
            .as_file()
            .metadata()
            .map_err(|e| io_error(&temp_path, "stat", e))?
            .len();
        self.metrics.record_write(start.elapsed(), written);
        log::debug!("{}: wrote {} archive bytes", source.display(), written);

        if self.options.verify {
            let start = Instant::now();
            let file = File::open(&temp_path).map_err(|e| io_error(&temp_path, "reopen", e))?;
            let reread = mri_archive::read(BufReader::new(file))
                .map_err(|e| ConvertError::Archive { path: temp_path.clone(), source: e })?;
            if reread != *region {
                return Err(ConvertError::Verify { path: temp_path });
            }
            self.metrics.record_verify(start.elapsed());
        }

        // The temp file's directory entry has to be on disk before the source
        // entry goes away.
        #[cfg(unix)]
        {
            let handle = File::open(dir).map_err(|e| io_error(dir, "open", e))?;
            (self.sync)(&handle).map_err(|e| io_error(dir, "sync", e))?;
        }

        Ok(temp)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertOptions::default())
    }
}

/// Region files directly inside `dir`, sorted by name.
pub fn region_files(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let entries = fs::read_dir(dir).map_err(|e| io_error(dir, "list", e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, "list", e))?;
        let file_type = entry.file_type().map_err(|e| io_error(&entry.path(), "stat", e))?;
        let path = entry.path();
        if file_type.is_file() && is_region_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_region_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == REGION_EXTENSION)
        && path.file_stem().is_some_and(|stem| !stem.is_empty())
}

/// `dir/<stem>.mca` -> `dir/<stem>.mri.gz`
pub fn archive_path(source: &Path) -> Result<PathBuf, ConvertError> {
    if !is_region_file(source) {
        return Err(ConvertError::NotARegionFile(source.to_path_buf()));
    }
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    Ok(source.with_file_name(format!("{stem}.{}", mri_archive::EXTENSION)))
}

fn io_error(path: &Path, op: &'static str, source: std::io::Error) -> ConvertError {
    ConvertError::Io { path: path.to_path_buf(), op, source }
}

/// `err: cause: cause...` on one line for logs.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use mri_anvil::fixtures::{LegacySectionSpec, legacy_chunk_nbt, region_bytes, sample_region_bytes, wrap_chunk};
    use mri_anvil::{AnvilError, CompressionScheme, ContainerFormatError};

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn failing_sync(_: &File) -> std::io::Result<()> {
        Err(std::io::Error::other("simulated disk failure"))
    }

    #[test]
    fn test_convert_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("test.mca");
        let bytes = sample_region_bytes();
        fs::write(&source, &bytes).unwrap();

        let converter = Converter::default();
        let report = converter.convert(dir.path()).unwrap();

        assert!(report.is_success());
        assert_eq!(report.converted.len(), 1);
        assert_eq!(dir_names(dir.path()), ["test.mri.gz"]);
        assert!(!source.exists());

        let archive = fs::read(dir.path().join("test.mri.gz")).unwrap();
        let reread = mri_archive::from_bytes(&archive).unwrap();
        assert_eq!(reread, mri_anvil::parse(&bytes).unwrap());
    }

    #[test]
    fn test_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.mca"), sample_region_bytes()).unwrap();
        fs::write(dir.path().join("bad.mca"), b"this is not a region").unwrap();

        let converter = Converter::new(ConvertOptions { jobs: 2, ..Default::default() });
        let report = converter.convert(dir.path()).unwrap();

        assert_eq!(report.converted.len(), 1);
        assert_eq!(report.converted[0].1, dir.path().join("good.mri.gz"));
        assert_eq!(report.failed.len(), 1);
        let (path, err) = &report.failed[0];
        assert_eq!(path, &dir.path().join("bad.mca"));
        assert!(matches!(err.container_format(), Some(ContainerFormatError::TooShort { .. })));

        assert_eq!(dir_names(dir.path()), ["bad.mca", "good.mri.gz"]);
        assert_eq!(converter.metrics().files_converted.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(converter.metrics().files_failed.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn test_durability_failure_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("test.mca");
        let bytes = sample_region_bytes();
        fs::write(&source, &bytes).unwrap();

        let converter = Converter { sync: failing_sync, ..Converter::default() };
        let err = converter.convert_file(&source).unwrap_err();

        assert!(matches!(err, ConvertError::Io { op: "sync", .. }));
        assert_eq!(fs::read(&source).unwrap(), bytes);
        // No final archive and no leftover temporary file
        assert_eq!(dir_names(dir.path()), ["test.mca"]);
    }

    #[cfg(unix)]
    fn failing_dir_sync(file: &File) -> std::io::Result<()> {
        if file.metadata()?.is_dir() {
            return Err(std::io::Error::other("simulated directory sync failure"));
        }
        file.sync_all()
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_synced_before_delete() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("test.mca");
        let bytes = sample_region_bytes();
        fs::write(&source, &bytes).unwrap();

        let converter = Converter { sync: failing_dir_sync, ..Converter::default() };
        let err = converter.convert_file(&source).unwrap_err();

        let ConvertError::Io { path, op: "sync", .. } = err else {
            panic!("expected a directory sync error, got {err:?}");
        };
        assert_eq!(path, dir.path());
        assert_eq!(fs::read(&source).unwrap(), bytes);
        assert_eq!(dir_names(dir.path()), ["test.mca"]);
    }

    #[test]
    fn test_bad_section_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("r.0.0.mca");
        let mut spec = LegacySectionSpec::filled(0, 7);
        spec.sky_light = Some(vec![0u8; 10]);
        let nbt = legacy_chunk_nbt(0, 0, &[spec]);
        fs::write(&source, region_bytes(&[(0, 0, wrap_chunk(&nbt, CompressionScheme::Zlib))])).unwrap();

        let err = Converter::default().convert_file(&source).unwrap_err();
        assert!(matches!(err, ConvertError::Anvil { source: AnvilError::Section { .. }, .. }));
        assert!(err.container_format().is_none());
        assert_eq!(dir_names(dir.path()), ["r.0.0.mca"]);
    }

    #[test]
    fn test_existing_archive_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("test.mca");
        fs::write(&source, sample_region_bytes()).unwrap();
        fs::write(dir.path().join("test.mri.gz"), b"older archive").unwrap();

        let err = Converter::default().convert_file(&source).unwrap_err();
        assert!(matches!(err, ConvertError::OutputExists(_)));
        assert!(source.exists());
        assert_eq!(fs::read(dir.path().join("test.mri.gz")).unwrap(), b"older archive");
    }

    #[test]
    fn test_overwrite_replaces_archive() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("test.mca");
        fs::write(&source, sample_region_bytes()).unwrap();
        fs::write(dir.path().join("test.mri.gz"), b"older archive").unwrap();

        let converter = Converter::new(ConvertOptions { overwrite: true, ..Default::default() });
        let target = converter.convert_file(&source).unwrap();
        assert!(mri_archive::is_archive(&fs::read(target).unwrap()));
        assert_eq!(dir_names(dir.path()), ["test.mri.gz"]);
    }

    #[test]
    fn test_rename_failure_keeps_archive() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("test.mca");
        let bytes = sample_region_bytes();
        fs::write(&source, &bytes).unwrap();
        // A non-empty directory in the way makes the final rename fail
        fs::create_dir(dir.path().join("test.mri.gz")).unwrap();
        fs::write(dir.path().join("test.mri.gz").join("keep"), b"").unwrap();

        let converter = Converter::new(ConvertOptions { overwrite: true, ..Default::default() });
        let err = converter.convert_file(&source).unwrap_err();

        let ConvertError::Rename { temp, .. } = err else {
            panic!("expected a rename error, got {err:?}");
        };
        let reread = mri_archive::from_bytes(&fs::read(&temp).unwrap()).unwrap();
        assert_eq!(reread, mri_anvil::parse(&bytes).unwrap());
    }

    #[test]
    fn test_only_region_files_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("r.0.0.mca"), b"").unwrap();
        fs::write(dir.path().join("r.0.0.mcc"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(dir.path().join(".mca"), b"").unwrap();
        fs::create_dir(dir.path().join("nested.mca")).unwrap();

        let files = region_files(dir.path()).unwrap();
        assert_eq!(files, [dir.path().join("r.0.0.mca")]);
    }

    #[test]
    fn test_archive_path() {
        assert_eq!(
            archive_path(Path::new("/world/region/r.1.-2.mca")).unwrap(),
            Path::new("/world/region/r.1.-2.mri.gz")
        );
        assert!(matches!(
            archive_path(Path::new("/world/level.dat")),
            Err(ConvertError::NotARegionFile(_))
        ));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Converter::default().convert(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ConvertError::Io { op: "list", .. }));
    }

    #[test]
    fn test_error_chain() {
        let err = ConvertError::Io {
            path: PathBuf::from("a.mca"),
            op: "read",
            source: std::io::Error::other("boom"),
        };
        assert_eq!(error_chain(&err), "failed to read a.mca: boom");
    }
}
