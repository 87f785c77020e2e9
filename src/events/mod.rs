mod bus;
mod types;

pub use bus::{EventReceiver, PanelEventBus};
pub use types::{Notification, NotificationLevel, PanelEvent, PanelEventPayload};
