//! Terra Core
//!
//! Geospatial data access and scene assembly:
//! - Raster sources (GeoTIFF) and raster transformers
//! - GeoJSON vector sources and vector transformers
//! - Label sources and label stores
//! - Scene, dataset and pipeline configs, registered in [`core_registry`]
//!
//! # Example
//!
//! ```rust,ignore
//! use terra_core::{load_config, PipelineConfig};
//!
//! let pipeline: PipelineConfig = load_config("pipeline.yaml")?;
//! let pipeline = pipeline.update()?;
//! let scenes = pipeline.build_scenes(tmp_dir.path(), true)?;
//!
//! for scene in &scenes.train {
//!     println!("{}: {} AOI polygons", scene.id(), scene.aoi_polygons().len());
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod class_config;
pub mod crs;
pub mod dataset_config;
pub mod error;
pub mod extent;
pub mod label_source;
pub mod label_store;
pub mod pipeline;
pub mod raster_io;
pub mod raster_source;
pub mod registry;
pub mod scene;
pub mod scene_config;
mod serde_keys;
pub mod uri;
pub mod vector_source;
pub mod vector_transformer;

// Re-exports for convenience
pub use class_config::ClassConfig;
pub use crs::{
    AffineCrsTransformer, CrsTransformer, GeoTransform, Georeference, IdentityCrsTransformer, Projection,
    SharedCrsTransformer,
};
pub use dataset_config::{DatasetConfig, DatasetScenes};
pub use error::{DataError, DataResult};
pub use extent::PixelBox;
pub use label_source::{
    ClassMap, LabelSource, LabelSourceConfig, ObjectDetectionLabelSourceConfig, ObjectLabel,
    SemanticSegmentationLabelSourceConfig,
};
pub use label_store::{LabelStore, LabelStoreConfig};
pub use pipeline::{PipelineConfig, PipelineContext, TaskKind};
pub use raster_source::{
    GeoTiffSourceConfig, RasterChip, RasterSource, RasterSourceConfig, RasterTransformerConfig, ReclassTransformer,
};
pub use registry::{build_core_registry, core_registry, load_config, save_config};
pub use scene::Scene;
pub use scene_config::{scene_config_upgrader, SceneConfig};
pub use vector_source::{GeoJsonVectorSource, GeoJsonVectorSourceConfig, VectorSourceConfig};
pub use vector_transformer::{
    BufferAmount, BufferTransformer, ClassInferenceTransformer, GeometryType, VectorTransformer,
    VectorTransformerConfig,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
