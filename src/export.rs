//! Writes rendered icons to PNG files: one at a time, as a batch into a
//! folder, or into a scratch folder for handing off to a share facility.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::coordinator::ExtractionResult;
use crate::error::ExportError;
use crate::icon_extractor::IconImage;
use crate::render::BitmapRenderer;

/// Label for a single export whose source is unknown.
pub const FALLBACK_LABEL: &str = "App";

/// One icon queued for export.
#[derive(Debug, Clone)]
pub struct ExportItem {
    pub icon: IconImage,
    pub source_label: Option<String>,
}

impl ExportItem {
    pub fn new(icon: IconImage, source_label: Option<String>) -> Self {
        Self { icon, source_label }
    }
}

impl From<&ExtractionResult> for ExportItem {
    fn from(result: &ExtractionResult) -> Self {
        Self::new(result.icon().clone(), result.source_label())
    }
}

/// `<label>_Icon_<size>x<size>.png`
pub fn export_file_name(label: &str, target_size: u32) -> String {
    let label: String = label
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{label}_Icon_{target_size}x{target_size}.png")
}

/// Label for the item at `index` (0-based) when it has no source.
pub fn positional_label(index: usize) -> String {
    format!("{FALLBACK_LABEL}_{}", index + 1)
}

/// Where exports start by default: the user's downloads directory.
pub fn default_export_dir() -> Option<PathBuf> {
    dirs::download_dir()
}

/// Suggested destination for a single export.
pub fn suggested_export_path(source_label: Option<&str>, target_size: u32) -> PathBuf {
    let name = export_file_name(source_label.unwrap_or(FALLBACK_LABEL), target_size);
    match default_export_dir() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[derive(Debug)]
pub struct ExportFailure {
    pub index: usize,
    pub label: String,
    pub error: ExportError,
}

#[derive(Debug, Default)]
pub struct BatchExport {
    pub saved: Vec<PathBuf>,
    pub failures: Vec<ExportFailure>,
}

impl BatchExport {
    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub saved_count: usize,
    pub failed_count: usize,
    pub folder: PathBuf,
}

impl ExportSummary {
    pub fn folder_name(&self) -> String {
        self.folder
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.folder.display().to_string())
    }

    pub fn message(&self) -> String {
        let plural = if self.saved_count == 1 { "" } else { "s" };
        format!(
            "Saved {} icon{plural} to {}",
            self.saved_count,
            self.folder_name()
        )
    }
}

/// Receives the one summary a batch export produces.
pub trait ExportNotifier: Send + Sync {
    fn notify(&self, summary: &ExportSummary);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ExportNotifier for LogNotifier {
    fn notify(&self, summary: &ExportSummary) {
        info!(
            saved = summary.saved_count,
            failed = summary.failed_count,
            folder = %summary.folder.display(),
            "{}",
            summary.message()
        );
    }
}

#[derive(Debug, Default)]
pub struct ExportPipeline<N = LogNotifier> {
    renderer: BitmapRenderer,
    notifier: N,
}

impl ExportPipeline<LogNotifier> {
    pub fn new() -> Self {
        Self::with_notifier(LogNotifier)
    }
}

impl<N: ExportNotifier> ExportPipeline<N> {
    pub fn with_notifier(notifier: N) -> Self {
        Self {
            renderer: BitmapRenderer::new(),
            notifier,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Renders `icon` at `target_size` and writes it to exactly `destination`.
    pub fn export_one(
        &self,
        icon: &IconImage,
        source_label: &str,
        target_size: u32,
        destination: &Path,
    ) -> Result<PathBuf, ExportError> {
        let png = self.renderer.render(icon, target_size)?.encode_png()?;
        fs::write(destination, png).map_err(|source| ExportError::Write {
            path: destination.to_path_buf(),
            source,
        })?;

        debug!(label = source_label, path = %destination.display(), "icon saved");
        Ok(destination.to_path_buf())
    }

    /// Writes every item into `folder` and emits one summary notification.
    /// A failing item is recorded and the rest still get written.
    pub fn export_batch(&self, items: &[ExportItem], target_size: u32, folder: &Path) -> BatchExport {
        let batch = self.write_all(items, target_size, folder);

        self.notifier.notify(&ExportSummary {
            saved_count: batch.saved_count(),
            failed_count: batch.failures.len(),
            folder: folder.to_path_buf(),
        });
        batch
    }

    /// Writes every item into a scratch folder for a share facility.
    /// `scratch_dir` defaults to the system temp directory. No notification.
    pub fn export_for_sharing(
        &self,
        items: &[ExportItem],
        target_size: u32,
        scratch_dir: Option<&Path>,
    ) -> BatchExport {
        let scratch = scratch_dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
        self.write_all(items, target_size, &scratch)
    }

    fn write_all(&self, items: &[ExportItem], target_size: u32, folder: &Path) -> BatchExport {
        let mut batch = BatchExport::default();
        let mut taken = HashSet::new();

        for (index, item) in items.iter().enumerate() {
            let label = item
                .source_label
                .clone()
                .unwrap_or_else(|| positional_label(index));
            let label = unique_label(label, target_size, &mut taken);
            let destination = folder.join(export_file_name(&label, target_size));

            match self.export_one(&item.icon, &label, target_size, &destination) {
                Ok(path) => batch.saved.push(path),
                Err(error) => {
                    warn!(index, label = %label, error = %error, "icon export failed");
                    batch.failures.push(ExportFailure {
                        index,
                        label,
                        error,
                    });
                }
            }
        }
        batch
    }
}

/// Suffixes `_2`, `_3`, ... onto a label whose file name is already taken in
/// this batch.
fn unique_label(label: String, target_size: u32, taken: &mut HashSet<String>) -> String {
    if taken.insert(export_file_name(&label, target_size)) {
        return label;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{label}_{n}");
        if taken.insert(export_file_name(&candidate, target_size)) {
            debug!(label = %label, renamed = %candidate, "duplicate export name");
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<ExportSummary>>);

    impl ExportNotifier for RecordingNotifier {
        fn notify(&self, summary: &ExportSummary) {
            self.0.lock().unwrap().push(summary.clone());
        }
    }

    fn icon() -> IconImage {
        IconImage::new(RgbaImage::from_pixel(4, 4, Rgba([5, 6, 7, 255])), 16)
    }

    #[test]
    fn test_file_name_convention() {
        assert_eq!(export_file_name("Notes", 512), "Notes_Icon_512x512.png");
        assert_eq!(export_file_name("a/b", 16), "a_b_Icon_16x16.png");
        assert_eq!(positional_label(0), "App_1");
    }

    #[test]
    fn test_suggested_path_names_file() {
        let path = suggested_export_path(Some("Notes"), 1024);
        assert_eq!(
            path.file_name().unwrap().to_str(),
            Some("Notes_Icon_1024x1024.png")
        );
        let fallback = suggested_export_path(None, 64);
        assert!(fallback.ends_with("App_Icon_64x64.png"));
    }

    #[test]
    fn test_export_one_writes_exact_size_png() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("custom.png");

        let written = ExportPipeline::new()
            .export_one(&icon(), "Notes", 32, &destination)
            .unwrap();

        assert_eq!(written, destination);
        let decoded = image::open(&destination).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn test_export_one_rejects_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExportPipeline::new()
            .export_one(&icon(), "Notes", 0, &dir.path().join("x.png"))
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Render(RenderError::InvalidDimensions(0))
        ));
    }

    #[test]
    fn test_batch_labels_and_single_notification() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::with_notifier(RecordingNotifier::default());
        let items = vec![
            ExportItem::new(icon(), Some("Notes".into())),
            ExportItem::new(icon(), None),
        ];

        let batch = pipeline.export_batch(&items, 512, dir.path());

        assert_eq!(batch.saved_count(), 2);
        assert!(dir.path().join("Notes_Icon_512x512.png").is_file());
        assert!(dir.path().join("App_2_Icon_512x512.png").is_file());

        let notes = pipeline.notifier().0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].saved_count, 2);
        assert_eq!(notes[0].message(), format!(
            "Saved 2 icons to {}",
            dir.path().file_name().unwrap().to_string_lossy()
        ));
    }

    #[test]
    fn test_batch_continues_after_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the target name makes that one write fail.
        fs::create_dir(dir.path().join("Blocked_Icon_8x8.png")).unwrap();

        let pipeline = ExportPipeline::with_notifier(RecordingNotifier::default());
        let items = vec![
            ExportItem::new(icon(), Some("Blocked".into())),
            ExportItem::new(icon(), Some("Fine".into())),
        ];
        let batch = pipeline.export_batch(&items, 8, dir.path());

        assert_eq!(batch.saved_count(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].index, 0);
        assert!(matches!(batch.failures[0].error, ExportError::Write { .. }));
        assert!(dir.path().join("Fine_Icon_8x8.png").is_file());

        let notes = pipeline.notifier().0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].failed_count, 1);
    }

    #[test]
    fn test_duplicate_labels_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![
            ExportItem::new(icon(), Some("Notes".into())),
            ExportItem::new(icon(), Some("Notes".into())),
            ExportItem::new(icon(), Some("Notes".into())),
        ];

        let batch = ExportPipeline::new().export_batch(&items, 8, dir.path());

        assert_eq!(
            batch.saved,
            vec![
                dir.path().join("Notes_Icon_8x8.png"),
                dir.path().join("Notes_2_Icon_8x8.png"),
                dir.path().join("Notes_3_Icon_8x8.png"),
            ]
        );
        assert!(batch.saved.iter().all(|path| path.is_file()));
    }

    #[test]
    fn test_sharing_writes_scratch_files_without_notifying() {
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::with_notifier(RecordingNotifier::default());

        let batch = pipeline.export_for_sharing(
            &[ExportItem::new(icon(), Some("Notes".into()))],
            64,
            Some(scratch.path()),
        );

        assert_eq!(batch.saved, vec![scratch.path().join("Notes_Icon_64x64.png")]);
        assert!(pipeline.notifier().0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_single_icon_message() {
        let summary = ExportSummary {
            saved_count: 1,
            failed_count: 0,
            folder: PathBuf::from("/tmp/Icons"),
        };
        assert_eq!(summary.message(), "Saved 1 icon to Icons");
    }

    #[test]
    #[traced_test]
    fn test_log_notifier_reports_folder() {
        LogNotifier.notify(&ExportSummary {
            saved_count: 3,
            failed_count: 0,
            folder: PathBuf::from("/tmp/Exports"),
        });
        assert!(logs_contain("Saved 3 icons to Exports"));
    }
}
