mod app_error;
mod channel_error;

pub use app_error::{AppError, AppResult, SendFailures};
pub use channel_error::ChannelError;
