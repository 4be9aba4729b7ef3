//! I/O: the HTTP seam, cancellation, storage bindings and the download
//! engine that drives them.

mod cancel;
mod downloader;
mod http;
mod local;
mod storage;

pub use cancel::Cancellation;
pub use downloader::{Downloader, fetch_to};
pub use http::{BodyStream, BoxStream, HttpClient, Request, Response};
#[cfg(feature = "reqwest")]
pub use http::{ClientSetting, ReqwestClient};
pub use local::{FsRecord, LocalFile};
pub use storage::{Target, TransferRecord};
