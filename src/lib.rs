//! Pulls icons out of dropped files and app bundles, holds them as one
//! published set per drop, and exports them as fixed-size PNGs.

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod icon_extractor;
pub mod reference;
pub mod render;

pub use classifier::{ResolvedFile, Strategy, UrlLoader};
pub use coordinator::{
    ExtractionResult, IngestEvent, IngestReport, IngestSettings, IngestStatus, IngestSummary,
    IngestionCoordinator,
};
pub use export::{BatchExport, ExportItem, ExportNotifier, ExportPipeline, LogNotifier};
pub use icon_extractor::{IconExtractor, IconImage, IconProvider, SystemIconProvider};
pub use reference::{DroppedItem, ItemReference, LoadedItem};
pub use render::{BitmapRenderer, RenderedBitmap};
