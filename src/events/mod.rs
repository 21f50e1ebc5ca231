//! Decoded notifications and their delivery to subscribers.

pub mod dispatcher;
pub mod event;

pub use dispatcher::{
    DispatchReport, EventDispatcher, FnHandler, HandlerError, NotificationHandler, SubscriptionId,
};
pub use event::NotificationEvent;
