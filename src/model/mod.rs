pub mod config;
pub mod label_catalog;
pub mod model_metadata;
pub mod model_storage;

pub use config::{AccountSettings, AppConfig, DeviceType, InferenceSettings, ModelSettings};
pub use label_catalog::LabelCatalog;
pub use model_metadata::{ModelMetadata, MODEL_CHANNELS, MODEL_INPUT_SIZE};
pub use model_storage::{format_metadata_info, load_metadata, load_model_with_metadata, save_model_with_metadata};
