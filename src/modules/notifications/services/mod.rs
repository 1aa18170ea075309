mod dispatcher;
mod http_dispatcher;
mod log_dispatcher;

pub use dispatcher::NotificationDispatcher;
pub use http_dispatcher::HttpNotificationDispatcher;
pub use log_dispatcher::LogDispatcher;
