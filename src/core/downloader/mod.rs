mod client;

pub use client::{DownloadJob, DownloadOutcome, Downloader};
