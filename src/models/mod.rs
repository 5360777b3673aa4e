pub mod cache_entry;
pub mod click_event;
pub mod link;
pub mod webhook;
pub mod workspace;

pub use cache_entry::CacheEntry;
pub use click_event::{ClickEvent, DeviceType};
pub use link::{Link, NewLink, RedirectKind};
pub use webhook::{DeliveryStatus, WebhookDelivery, WebhookSubscription};
pub use workspace::WorkspaceSettings;
