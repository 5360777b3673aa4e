pub mod bot_classifier;
pub mod click_pipeline;
pub mod enrichment;
pub mod event_pool;
pub mod link_resolver;
pub mod realtime_hub;
pub mod webhook_dispatcher;

pub use bot_classifier::{BotCategory, BotClassifier};
pub use click_pipeline::{ClickPipeline, ClickPipelineConfig, PipelineMetrics};
pub use enrichment::{DeviceInfo, Enricher, GeoDatabase, GeoInfo};
pub use event_pool::{ClickEventPool, Pool, RequestContext, RequestContextPool, Reset};
pub use link_resolver::{LinkResolver, ResolverMetrics};
pub use realtime_hub::{RealtimeHub, RealtimeMessage};
pub use webhook_dispatcher::{DispatcherMetrics, WebhookDispatcher, WebhookDispatcherConfig};
