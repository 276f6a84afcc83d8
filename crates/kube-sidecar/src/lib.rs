pub mod aggregator;
pub mod cluster;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod notify;
pub mod publish;
pub mod reconciler;
pub mod render;
pub mod self_check;
pub mod server;
pub mod storage;
pub mod validate;
pub mod watch;

pub use aggregator::{Aggregator, FlattenedView};
pub use cluster::{ClusterWriter, KubeCluster, MemoryCluster, ObjectKind, ObjectRef};
pub use config::{load_config, load_config_from_str, Config, LoadedConfig, Selector, SelectorKind};
pub use error::{
    ClusterError, ConfigError, RenderError, Result, SidecarError, StorageError, ValidateError,
    WatchError,
};
pub use event::{Action, ChangeEvent, Entry};
pub use metrics::{MemoryValidity, PrometheusValidity, ValiditySink};
pub use notify::{HttpNotifier, MemoryNotifier, Notifier};
pub use publish::{PublishReport, Publisher};
pub use reconciler::{Outcome, Reconciler};
pub use render::Renderer;
pub use validate::Validator;
