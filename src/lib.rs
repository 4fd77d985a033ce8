pub mod checker;
pub mod config;
pub mod delivery;
pub mod episode;
pub mod error;
pub mod feed;
pub mod history;
pub mod http;
pub mod pipeline;
pub mod timeofday;
pub mod worker;

// Re-export main types for convenience
pub use checker::{
    CheckerCommand, CheckerObserver, FeedChecker, LastCheckStatus, NoopObserver, SleepInhibitor,
    Status,
};
pub use config::{DownloadOptions, Settings};
pub use delivery::{DefaultDelivery, DeliveryAgent};
pub use episode::{DownloadedEpisode, Episode, EpisodeDownloader};
pub use error::{CheckError, ConfigError, DownloadError, FeedError, HistoryError};
pub use feed::{Feed, fetch_feed_bytes, parse_feed};
pub use history::{HistoryItem, HistoryStore};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use pipeline::CheckPipeline;
pub use worker::{InProcessWorker, WorkerProxy, WorkerTransport};
