use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use serde::Serialize;
use serde_json::json;

use super::{Query, ServerError};
use crate::station::{ErrorKind, Sampler, StationError};
use crate::storage::HistoryColumns;

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

const INDEX: &str = "<!DOCTYPE html>
<html>
<head><title>atmos</title></head>
<body>
<h1>atmos sensor station</h1>
<ul>
<li><a href=\"/?q=all\">/?q=all</a> full sample, recorded in history</li>
<li><a href=\"/?q=temperature\">/?q=temperature</a></li>
<li><a href=\"/?q=pressure\">/?q=pressure</a></li>
<li><a href=\"/?q=co2\">/?q=co2</a></li>
<li><a href=\"/?q=distance\">/?q=distance</a> digital inputs</li>
<li><a href=\"/?q=history\">/?q=history</a></li>
<li><a href=\"/?q=dashboard\">/?q=dashboard</a></li>
<li>/?q=output&amp;pin=N&amp;value=0|1</li>
</ul>
</body>
</html>
";

/// A response ready to be written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(200, JSON, body),
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                Self::new(500, TEXT, "serialization failed")
            }
        }
    }

    fn error(e: &StationError) -> Self {
        let kind = e.kind();
        let status = match kind {
            ErrorKind::InvalidRequest => 400,
            _ => 500,
        };
        let body = json!({ "error": e.to_string(), "kind": kind.as_str() });
        Self::new(status, JSON, body.to_string())
    }
}

/// Station calls allowed to wait behind the one in progress.
pub const PENDING_CALLS: usize = 4;

type Job = Box<dyn FnOnce(&dyn Sampler) + Send>;

/// A queued station call and the moment its caller stops waiting for it.
struct Call {
    deadline: Instant,
    job: Job,
}

/// Maps queries onto station operations.
///
/// Measurements run one at a time on a dedicated station thread fed by a
/// bounded queue. A call whose caller has already given up is dropped
/// without touching the station.
pub struct Router {
    sampler: Arc<dyn Sampler>,
    calls: mpsc::SyncSender<Call>,
    dashboard: PathBuf,
    timeout: Duration,
}

impl Router {
    pub fn new(
        sampler: Arc<dyn Sampler>,
        dashboard: PathBuf,
        timeout: Duration,
    ) -> Result<Self, ServerError> {
        let (calls, queue) = mpsc::sync_channel::<Call>(PENDING_CALLS);
        let station = Arc::clone(&sampler);
        thread::Builder::new()
            .name("station".into())
            .spawn(move || {
                // Ends once the router and its sender are gone.
                for call in queue {
                    if Instant::now() >= call.deadline {
                        debug!("Dropping station call, caller gave up");
                        continue;
                    }
                    (call.job)(station.as_ref());
                }
            })?;

        Ok(Self {
            sampler,
            calls,
            dashboard,
            timeout,
        })
    }

    /// Answer the request for `url`.
    pub fn handle(&self, url: &str) -> Response {
        match Query::parse(url) {
            Query::All => self.respond(|sampler| sampler.sample_all()),
            Query::Single(quantity) => self.respond(move |sampler| sampler.sample_one(quantity)),
            // A GPIO write never waits on sensor settle times, so it runs
            // in place and its outcome is always the one reported.
            Query::Output { pin, level } => {
                match self.sampler.apply_digital_output(pin, level) {
                    Ok(reading) => Response::json(&reading),
                    Err(e) => {
                        warn!("Output request failed: {}", e);
                        Response::error(&e)
                    }
                }
            }
            Query::History => {
                let samples = self.sampler.history_snapshot();
                Response::json(&HistoryColumns::new(&samples))
            }
            Query::Dashboard => self.dashboard(),
            Query::Malformed(reason) => Response::new(
                400,
                JSON,
                json!({ "error": reason, "kind": ErrorKind::InvalidRequest.as_str() }).to_string(),
            ),
            Query::Index => Response::new(400, HTML, INDEX),
        }
    }

    fn respond<T, F>(&self, op: F) -> Response
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&dyn Sampler) -> Result<T, StationError> + Send + 'static,
    {
        match self.call(op) {
            Ok(value) => Response::json(&value),
            Err(e) => {
                warn!("Station request failed: {}", e);
                Response::error(&e)
            }
        }
    }

    /// Queue `op` for the station thread and wait at most `timeout` for it.
    ///
    /// A full queue is reported as a timeout straight away. A call still
    /// queued when its deadline passes never runs.
    fn call<T, F>(&self, op: F) -> Result<T, StationError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Sampler) -> Result<T, StationError> + Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;
        let (tx, rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move |sampler: &dyn Sampler| {
            // The receiver is gone when the caller timed out.
            let _ = tx.send(op(sampler));
        });

        match self.calls.try_send(Call { deadline, job }) {
            Ok(()) => {}
            Err(mpsc::TrySendError::Full(_)) => {
                warn!("Station busy, {} calls already pending", PENDING_CALLS);
                return Err(StationError::Timeout);
            }
            Err(mpsc::TrySendError::Disconnected(_)) => {
                error!("Station thread is gone");
                return Err(StationError::Aborted);
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(StationError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(StationError::Aborted),
        }
    }

    fn dashboard(&self) -> Response {
        match fs::read(&self.dashboard) {
            Ok(page) => Response::new(200, HTML, page),
            Err(e) => {
                warn!("Dashboard {} unavailable: {}", self.dashboard.display(), e);
                Response::new(404, TEXT, "dashboard not found")
            }
        }
    }
}
