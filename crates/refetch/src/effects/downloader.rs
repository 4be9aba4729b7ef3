use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{Instrument, Span, debug, info_span, warn};

use crate::core::headers::{
    CONTENT_LENGTH, IF_MODIFIED_SINCE, IF_RANGE, LAST_MODIFIED, RANGE, parse_content_length,
    range_from,
};
use crate::core::{fmt_http_date, parse_http_date};
use crate::data::Outcome;
use crate::effects::cancel::Cancellation;
use crate::effects::http::{HttpClient, Request, Response};
use crate::effects::local::LocalFile;
use crate::effects::storage::{Target, TransferRecord, close_quietly, discard_quietly, promote_checked};
use crate::error::{Error, Result};

/// Bytes of an unexpected response body kept for the error message.
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// Keeps one [`Target`] in sync with one URL.
///
/// Each [`serve`](Downloader::serve) inspects the committed target and any
/// leftover transfer record, then takes exactly one path:
///
/// - nothing local: download the whole resource
/// - target only: revalidate with `If-Modified-Since`
/// - transfer record: resume with `If-Range` and `Range`, or revalidate and
///   commit a record that is already complete
///
/// The downloader never retries. Failures leave the transfer record in place
/// whenever its bytes are still usable, so calling `serve` again continues
/// where the previous call stopped.
pub struct Downloader<C, T> {
    client:  C,
    url:     String,
    target:  T,
    headers: Vec<(String, String)>,
    cancel:  Cancellation,
    span:    Option<Span>,
}

impl<C, T> Downloader<C, T>
where
    C: HttpClient,
    T: Target,
{
    pub fn new(client: C, url: impl Into<String>, target: T) -> Self {
        Self {
            client,
            url: url.into(),
            target,
            headers: Vec::new(),
            cancel: Cancellation::default(),
            span: None,
        }
    }

    /// Adds a header sent with every request, ahead of the conditional ones.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Span every event of [`serve`](Downloader::serve) is recorded in.
    ///
    /// Default: `info_span!("download", url)`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn url(&self) -> &str { &self.url }

    pub fn target(&self) -> &T { &self.target }

    /// Brings the target up to date with the remote resource.
    pub async fn serve(&self) -> Result<Outcome> {
        let span = match &self.span {
            Some(span) => span.clone(),
            None => info_span!("download", url = %self.url),
        };

        self.run().instrument(span).await
    }

    async fn run(&self) -> Result<Outcome> {
        let modified = self.target.modified().await?;
        let record = self.target.record().await?;

        match (record, modified) {
            (Some(record), _) => {
                let since = record.metadata().modified;
                match since {
                    Some(since) => self.recover(record, since).await,
                    None => {
                        warn!("transfer record has no modification time, downloading again");
                        discard_quietly(record).await;
                        self.fetch_new(None).await
                    }
                }
            }
            (None, Some(modified)) => self.refresh(modified).await,
            (None, None) => {
                debug!("first download");
                self.fetch_new(None).await
            }
        }
    }

    /// Downloads the whole resource into a fresh transfer record.
    ///
    /// `response` is a 200 already received for a conditional request; when
    /// absent an unconditional GET is sent.
    async fn fetch_new(&self, response: Option<Response>) -> Result<Outcome> {
        let response = match response {
            Some(response) => response,
            None => self.send(self.request()).await?,
        };
        if response.status != 200 {
            return Err(self.server_error(response).await);
        }

        let len = parse_content_length(response.header(CONTENT_LENGTH))?;
        let modified = last_modified(&response);
        debug!(len, has_modified = modified.is_some(), "writing new transfer record");

        let body = self.cancel.guard(response.into_body());
        let bytes = self.target.replace(body, len, modified).await?;

        Ok(Outcome::Downloaded { bytes })
    }

    async fn refresh(&self, modified: SystemTime) -> Result<Outcome> {
        let since = fmt_http_date(modified);
        debug!(%since, "revalidating target");

        let response = self.send(self.request().header(IF_MODIFIED_SINCE, since)).await?;
        match response.status {
            304 => {
                debug!("target not modified");
                Ok(Outcome::NotModified)
            }
            200 => {
                debug!("target modified, downloading again");
                self.fetch_new(Some(response)).await
            }
            _ => Err(self.server_error(response).await),
        }
    }

    async fn recover(&self, mut record: T::Record, since: SystemTime) -> Result<Outcome> {
        let size = record.size().await;
        let begin = keep_on_error(&mut record, size).await?;
        let declared = record.metadata().len;

        if declared > 0 && begin > declared {
            warn!(begin, declared, "transfer record is larger than declared, downloading again");
            discard_quietly(record).await;
            return self.fetch_new(None).await;
        }
        if declared > 0 && begin == declared {
            return self.recover_refresh(record, since).await;
        }

        let if_range = fmt_http_date(since);
        debug!(begin, declared, %if_range, "requesting remaining range");

        let request = self
            .request()
            .header(IF_RANGE, if_range)
            .header(RANGE, range_from(begin));
        let response = self.send(request).await;
        let response = keep_on_error(&mut record, response).await?;

        match response.status {
            206 => self.resume(record, response, begin).await,
            200 => {
                debug!("resource changed since the transfer record was created, downloading again");
                discard_quietly(record).await;
                self.fetch_new(Some(response)).await
            }
            416 => {
                warn!(begin, "range not satisfiable, downloading again");
                discard_quietly(record).await;
                self.fetch_new(None).await
            }
            _ => {
                close_quietly(&mut record).await;
                Err(self.server_error(response).await)
            }
        }
    }

    /// The record already holds the declared length; commit it unless the
    /// resource changed.
    async fn recover_refresh(&self, mut record: T::Record, since: SystemTime) -> Result<Outcome> {
        let since = fmt_http_date(since);
        debug!(%since, "transfer record complete, revalidating");

        let response = self.send(self.request().header(IF_MODIFIED_SINCE, since)).await;
        let response = keep_on_error(&mut record, response).await?;

        match response.status {
            304 => {
                let bytes = record.promote().await?;
                Ok(Outcome::Promoted { bytes })
            }
            200 => {
                debug!("resource changed since the transfer record was created, downloading again");
                discard_quietly(record).await;
                self.fetch_new(Some(response)).await
            }
            _ => {
                close_quietly(&mut record).await;
                Err(self.server_error(response).await)
            }
        }
    }

    async fn resume(&self, mut record: T::Record, response: Response, begin: u64) -> Result<Outcome> {
        debug!(begin, "appending partial content");

        let appended = record.append(self.cancel.guard(response.into_body())).await;
        let bytes = keep_on_error(&mut record, appended).await?;
        promote_checked(record).await?;

        Ok(Outcome::Resumed { offset: begin, bytes })
    }

    fn request(&self) -> Request {
        self.headers
            .iter()
            .fold(Request::get(&self.url), |request, (name, value)| {
                request.header(name.as_str(), value.as_str())
            })
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let response = self.cancel.run(self.client.send(request)).await?;
        debug!(status = response.status, "received response");
        Ok(response)
    }

    /// The status is what callers act on, so a body still streaming when
    /// cancellation fires is given up and the error keeps its status.
    async fn server_error(&self, response: Response) -> Error {
        let status = response.status;
        let status_text = response.status_text.clone();
        let body = tokio::select! {
            biased;
            body = response.text(ERROR_BODY_LIMIT) => body,
            e = self.cancel.fired() => {
                debug!(error = %e, "gave up reading the error body");
                String::new()
            }
        };

        warn!(status, %status_text, "unexpected response");
        Error::Server {
            status,
            status_text,
            body,
        }
    }
}

fn last_modified(response: &Response) -> Option<SystemTime> {
    let value = response.header(LAST_MODIFIED)?;
    let parsed = parse_http_date(value);
    if parsed.is_none() {
        warn!(value, "cannot parse Last-Modified, ignoring it");
    }
    parsed
}

/// Closes `record` before handing back an error so its bytes survive for the
/// next attempt.
async fn keep_on_error<R: TransferRecord, V>(record: &mut R, result: Result<V>) -> Result<V> {
    if result.is_err() {
        close_quietly(record).await;
    }
    result
}

/// Downloads `url` into the file at `path`, resuming or revalidating
/// whatever an earlier call left there.
pub async fn fetch_to<C: HttpClient>(
    client: C,
    url: impl Into<String>,
    path: impl Into<PathBuf>,
) -> Result<Outcome> {
    Downloader::new(client, url, LocalFile::new(path)).serve().await
}
