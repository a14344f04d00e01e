pub mod config;
pub mod config_loader;
pub mod currency;
pub mod task_bridge;

pub use config::{AnomalyConfig, AppConfig, DataConfig, NoiseConfig, StatisticsConfig};
pub use config_loader::ConfigLoader;
pub use currency::CODEC_VERSION;
pub use task_bridge::{CancelToken, PollStatus, TaskBridge, TaskError, TaskHandle, TaskState};
