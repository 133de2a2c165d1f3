//! Request context
//!
//! A [`Context`] carries one request through its handler chain: the parsed
//! request, the response being built, the captured path parameters and the
//! position in the chain. Contexts are pooled and reused across requests.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use squall_router::Params;

use crate::error::Result;
use crate::request::{parse_query_pairs, Request};
use crate::response::{Response, StatusCode};

/// A handler is any callable taking the request context and returning an
/// error. Middleware and endpoint handlers share this shape; a middleware
/// calls [`Context::next`] to run the rest of the chain.
pub type Handler = Arc<dyn Fn(&mut Context) -> Result<()> + Send + Sync>;

/// An immutable, shareable handler chain as stored in the route trees
pub type HandlerChain = Arc<[Handler]>;

/// Wrap a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The context of a single HTTP request
pub struct Context {
    request: Request,
    response: Response,
    params: Params,
    handlers: Option<HandlerChain>,
    index: isize,
    wrote_header: bool,
    bytes_written: usize,
    query_cache: Option<Vec<(String, String)>>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Context {
            request: Request::default(),
            response: Response::ok(),
            params: Params::new(),
            handlers: None,
            index: -1,
            wrote_header: false,
            bytes_written: 0,
            query_cache: None,
        }
    }

    /// Re-initialise for a fresh request; called on checkout from the pool
    pub(crate) fn reset(&mut self, request: Request) {
        self.request = request;
        self.response = Response::ok();
        self.params = Params::new();
        self.handlers = None;
        self.index = -1;
        self.wrote_header = false;
        self.bytes_written = 0;
        self.query_cache = None;
    }

    pub(crate) fn set_route(&mut self, handlers: HandlerChain, params: Params) {
        self.handlers = Some(handlers);
        self.params = params;
    }

    pub(crate) fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    /// Execute the next handler(s) in the chain.
    ///
    /// A middleware may call this to run the remainder of the chain and then
    /// act on the response. If a handler returns an error, execution halts
    /// and the error is returned.
    pub fn next(&mut self) -> Result<()> {
        let Some(chain) = self.handlers.clone() else {
            return Ok(());
        };
        self.index += 1;
        while (self.index as usize) < chain.len() {
            let handler = chain[self.index as usize].clone();
            handler(self)?;
            self.index += 1;
        }
        Ok(())
    }

    /// Stop the execution of any remaining handlers in the chain
    pub fn abort(&mut self) {
        self.index = self.handlers.as_ref().map_or(0, |c| c.len()) as isize;
    }

    /// The incoming request
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The response being built
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable access to the response being built
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// HTTP method of the request
    pub fn method(&self) -> &str {
        &self.request.method
    }

    /// URL path of the request
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// All route parameters
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Value of a route parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Value of a route parameter, or `default` when absent
    pub fn param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.params.get(name).unwrap_or(default)
    }

    fn cached_query(&mut self) -> &[(String, String)] {
        if self.query_cache.is_none() {
            self.query_cache = Some(
                self.request
                    .query
                    .as_deref()
                    .map_or_else(Vec::new, parse_query_pairs),
            );
        }
        self.query_cache.as_deref().expect("query cache populated")
    }

    /// First value of a query parameter; `Some("")` when the key is present
    /// with an empty value, `None` when it is absent
    pub fn query(&mut self, key: &str) -> Option<&str> {
        self.cached_query()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a query parameter, or `default` when absent
    pub fn query_or<'a>(&'a mut self, key: &str, default: &'a str) -> &'a str {
        self.query(key).unwrap_or(default)
    }

    /// All values of a query parameter (`?tag=go&tag=web` yields both)
    pub fn query_array(&mut self, key: &str) -> Vec<&str> {
        self.cached_query()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// All query parameters as decoded pairs, in order
    pub fn queries(&mut self) -> &[(String, String)] {
        self.cached_query()
    }

    /// Value of a request header field
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.request.header(key)
    }

    /// Set a response header, replacing existing values
    pub fn set_header(&mut self, key: &str, value: &str) {
        self.response.set_header(key, value);
    }

    /// Append a value to a response header
    pub fn add_header(&mut self, key: &str, value: &str) {
        self.response.add_header(key, value);
    }

    /// Delete a response header
    pub fn del_header(&mut self, key: &str) {
        self.response.del_header(key);
    }

    /// Set the "Content-Type" header on the response
    pub fn set_content_type(&mut self, content_type: &str) {
        self.response.set_header("content-type", content_type);
    }

    /// Set the response status code.
    ///
    /// Writing the body first locks in the current status; overwriting an
    /// already-written status is allowed but logged.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.wrote_header && self.response.status != status {
            tracing::warn!(
                from = self.response.status.as_u16(),
                to = status.as_u16(),
                "status code overwritten"
            );
        }
        self.response.status = status;
        self.wrote_header = true;
    }

    /// Set the status code and return the context for method chaining:
    /// `ctx.status(StatusCode::NOT_FOUND).send_string("gone")`
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.set_status(status);
        self
    }

    /// Set the status code without writing a body
    pub fn send_status(&mut self, status: StatusCode) -> Result<()> {
        self.set_status(status);
        Ok(())
    }

    /// Append a string to the response body. The status is locked to its
    /// current value (200 unless set) once a body write happens.
    pub fn send_string(&mut self, s: &str) -> Result<()> {
        self.wrote_header = true;
        let mut body = self.response.body.to_vec();
        body.extend_from_slice(s.as_bytes());
        self.bytes_written += s.len();
        self.response.body = bytes::Bytes::from(body);
        Ok(())
    }

    /// Number of body bytes written so far
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Remote IP address of the client, when known
    pub fn ip(&self) -> Option<String> {
        self.request.ip()
    }

    /// Remote TCP port of the client, when known
    pub fn remote_port(&self) -> Option<u16> {
        self.request.remote_port()
    }
}

/// Pool of reusable [`Context`] objects.
///
/// Checkout clears and re-initialises the context; the guard returns it on
/// every exit path, including a handler panic.
pub(crate) struct ContextPool {
    free: Mutex<Vec<Context>>,
}

impl ContextPool {
    pub fn new() -> Self {
        ContextPool {
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn acquire(&self, request: Request) -> PooledContext<'_> {
        let mut context = self.free.lock().pop().unwrap_or_else(Context::new);
        context.reset(request);
        PooledContext {
            pool: self,
            context: Some(context),
        }
    }

    fn release(&self, context: Context) {
        self.free.lock().push(context);
    }
}

/// Scoped checkout of a pooled context; returns it to the pool on drop
pub(crate) struct PooledContext<'p> {
    pool: &'p ContextPool,
    context: Option<Context>,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.context.as_ref().expect("context present until drop")
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.context.as_mut().expect("context present until drop")
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(context);
        }
    }
}
