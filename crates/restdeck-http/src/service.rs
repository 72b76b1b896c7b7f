//! hyper service adapter.
//!
//! [`RestDeckService`] lets a [`Dispatcher`] serve connections accepted by
//! `hyper-util`. The dispatcher never fails, so the service error type is
//! [`Infallible`].

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use hyper::body::Incoming;
use hyper::service::Service;

use crate::body::ResponseBody;
use crate::dispatch::Dispatcher;

/// hyper `Service` that dispatches every request.
#[derive(Debug, Clone)]
pub struct RestDeckService {
    dispatcher: Dispatcher,
}

impl RestDeckService {
    /// Wrap a dispatcher.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// The wrapped dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Service<http::Request<Incoming>> for RestDeckService {
    type Response = http::Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        Box::pin(async move { Ok(dispatcher.handle(req).await) })
    }
}
