pub mod dispatch;
pub mod notifications;
