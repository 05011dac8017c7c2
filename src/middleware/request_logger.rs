//! Request logging middleware.
//!
//! Report requests fan out into several view queries, so slow responses are
//! logged at warn level alongside errors.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::time::{Duration, Instant};

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, info, warn};

const DEFAULT_SLOW_AFTER: Duration = Duration::from_secs(2);

/// Request logger middleware factory.
#[derive(Debug, Clone, Copy)]
pub struct RequestLogger {
    slow_after: Duration,
}

impl RequestLogger {
    /// Log responses slower than `slow_after` as warnings.
    pub fn new(slow_after: Duration) -> Self {
        Self { slow_after }
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_AFTER)
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service: Rc::new(service),
            slow_after: self.slow_after,
        }))
    }
}

/// Request logger middleware service.
pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
    slow_after: Duration,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let query = req.query_string().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let slow_after = self.slow_after;

        debug!(
            target: "api",
            method = %method,
            path = %path,
            query = %query,
            remote_addr = %remote_addr,
            "→ Request started"
        );

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            let elapsed = start.elapsed();
            let status = res.status().as_u16();

            if res.status().is_server_error() {
                warn!(
                    target: "api",
                    method = %method,
                    path = %path,
                    query = %query,
                    status = %status,
                    duration_ms = %elapsed.as_millis(),
                    "← Server error"
                );
            } else if elapsed > slow_after {
                warn!(
                    target: "api",
                    method = %method,
                    path = %path,
                    query = %query,
                    status = %status,
                    duration_ms = %elapsed.as_millis(),
                    "← Slow request"
                );
            } else {
                info!(
                    target: "api",
                    method = %method,
                    path = %path,
                    status = %status,
                    duration_ms = %elapsed.as_millis(),
                    "← Request completed"
                );
            }

            Ok(res)
        })
    }
}
