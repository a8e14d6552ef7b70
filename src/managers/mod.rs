pub mod backup;
pub mod discovery;
pub mod dump;
pub mod logging;
pub mod notification;
pub mod pipeline;
pub mod scheduler;
