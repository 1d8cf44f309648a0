use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use log::{error, info, warn};
use thiserror::Error;
use tiny_http::{Header, Request, Server};

use super::Router;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("cannot listen on {address}: {details}")]
    Bind { address: String, details: String },
    #[error("failed to start worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Blocking HTTP front end: a fixed pool of workers pulling requests off one
/// listening socket and answering them through a shared [`Router`].
pub struct HttpServer {
    server: Arc<Server>,
    router: Arc<Router>,
    workers: usize,
}

impl HttpServer {
    pub fn bind(address: &str, router: Router, workers: usize) -> Result<Self, ServerError> {
        let server = Server::http(address).map_err(|e| ServerError::Bind {
            address: address.into(),
            details: e.to_string(),
        })?;

        Ok(Self {
            server: Arc::new(server),
            router: Arc::new(router),
            workers: workers.max(1),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until [`HttpServer::shutdown`] is called.
    pub fn run(&self) -> Result<(), ServerError> {
        match self.local_addr() {
            Some(addr) => info!("Listening on http://{} with {} workers", addr, self.workers),
            None => info!("Listening with {} workers", self.workers),
        }

        let handles = (0..self.workers)
            .map(|id| {
                let server = Arc::clone(&self.server);
                let router = Arc::clone(&self.router);
                thread::Builder::new()
                    .name(format!("http-{id}"))
                    .spawn(move || {
                        for request in server.incoming_requests() {
                            serve(&router, request);
                        }
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for handle in handles {
            if handle.join().is_err() {
                error!("HTTP worker panicked");
            }
        }
        info!("HTTP server stopped");
        Ok(())
    }

    /// Release every worker blocked waiting for a request.
    pub fn shutdown(&self) {
        for _ in 0..self.workers {
            self.server.unblock();
        }
    }
}

fn serve(router: &Router, request: Request) {
    let response = router.handle(request.url());

    let remote = request
        .remote_addr()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    info!(
        "{} - {} {} -> {}",
        remote,
        request.method(),
        request.url(),
        response.status
    );

    let mut reply = tiny_http::Response::from_data(response.body).with_status_code(response.status);
    match Header::from_bytes(&b"Content-Type"[..], response.content_type.as_bytes()) {
        Ok(header) => reply = reply.with_header(header),
        Err(()) => warn!("Invalid content type {:?}", response.content_type),
    }

    if let Err(e) = request.respond(reply) {
        warn!("Failed to send response to {}: {}", remote, e);
    }
}
