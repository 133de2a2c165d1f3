//! Request dispatcher
//!
//! One radix tree per HTTP method, plus a tree for the wildcard
//! pseudo-method `*` and extra slots for custom methods. Dispatch walks the
//! method's tree, falls back to the wildcard tree, then applies the OPTIONS
//! / 405 / 404 policy and the redirect rules.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use squall_router::pattern::{apply_constraints, clean_path, expand_optional_patterns};
use squall_router::Tree;

use crate::context::{Context, ContextPool, Handler, HandlerChain};
use crate::error::{Error, Result};
use crate::group::{NamedRoute, Route, RouteGroup};
use crate::request::{Method, Request};
use crate::response::{Response, StatusCode};

/// Hook invoked with the payload of a recovered handler panic
pub type PanicHook = Arc<dyn Fn(&mut Context, Box<dyn Any + Send>) -> Result<()> + Send + Sync>;

/// Hook invoked with errors returned by handlers
pub type ErrorHook = Arc<dyn Fn(&mut Context, Error) -> Result<()> + Send + Sync>;

/// HTTP request router.
///
/// Routes are registered during a single-threaded build phase; after the
/// last registration the trees are frozen and [`Router::dispatch`] is safe
/// to call from any number of threads.
pub struct Router {
    trees: Vec<Option<Tree<HandlerChain>>>,
    custom_methods: HashMap<String, usize>,
    registered: HashMap<String, Vec<String>>,
    pub(crate) named_routes: HashMap<String, NamedRoute>,
    pub(crate) root_handlers: Vec<Handler>,

    /// Redirect to the path with its trailing slash toggled when the route
    /// misses but the toggled path would hit (301 for GET, 308 otherwise)
    pub redirect_trailing_slash: bool,
    /// On a miss, clean the path (`..`, `//`), retry case-insensitively and
    /// redirect to the corrected path when it hits
    pub redirect_fixed_path: bool,
    /// Answer 405 with an `Allow` header instead of 404 when the path
    /// matches under a different method
    pub handle_method_not_allowed: bool,
    /// Synthesise replies to OPTIONS requests
    pub handle_options: bool,

    mutable_trees: bool,
    global_allowed: String,

    global_options: Option<Handler>,
    not_found: Option<Handler>,
    method_not_allowed: Option<Handler>,
    panic_hook: Option<PanicHook>,
    error_hook: Option<ErrorHook>,

    pool: ContextPool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a router with the default policy: trailing-slash and
    /// fixed-path redirects, 405 handling and OPTIONS synthesis all on.
    pub fn new() -> Self {
        let mut trees = Vec::with_capacity(Method::COUNT);
        trees.resize_with(Method::COUNT, || None);
        Router {
            trees,
            custom_methods: HashMap::new(),
            registered: HashMap::new(),
            named_routes: HashMap::new(),
            root_handlers: Vec::new(),
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
            handle_options: true,
            mutable_trees: false,
            global_allowed: String::new(),
            global_options: None,
            not_found: None,
            method_not_allowed: None,
            panic_hook: None,
            error_hook: None,
            pool: ContextPool::new(),
        }
    }

    /// Allow re-registering an existing pattern to replace its handler
    /// chain instead of failing
    pub fn set_mutable(&mut self, mutable: bool) {
        self.mutable_trees = mutable;
        for tree in self.trees.iter_mut().flatten() {
            tree.set_mutable(mutable);
        }
    }

    /// Handler invoked on synthesised OPTIONS replies, after the `Allow`
    /// header is set
    pub fn set_global_options(&mut self, handler: Handler) {
        self.global_options = Some(handler);
    }

    /// Handler invoked when no route matches; the default replies 404
    pub fn set_not_found(&mut self, handler: Handler) {
        self.not_found = Some(handler);
    }

    /// Handler invoked on method mismatch, after the `Allow` header is set;
    /// the default replies 405
    pub fn set_method_not_allowed(&mut self, handler: Handler) {
        self.method_not_allowed = Some(handler);
    }

    /// Hook invoked with recovered handler panics; without one, a panic
    /// becomes a plain 500
    pub fn set_panic_hook(&mut self, hook: PanicHook) {
        self.panic_hook = Some(hook);
    }

    /// Hook invoked with handler errors; without one, a typed
    /// [`HttpError`](crate::HttpError) is rendered directly and anything
    /// else becomes a logged 500
    pub fn set_error_hook(&mut self, hook: ErrorHook) {
        self.error_hook = Some(hook);
    }

    /// The named route registered under `name`
    pub fn route(&self, name: &str) -> Option<&NamedRoute> {
        self.named_routes.get(name)
    }

    /// Middleware prepended to every route registered directly on the router
    pub fn use_middleware(&mut self, handlers: Vec<Handler>) {
        self.root_handlers.extend(handlers);
    }

    /// Create a route group with the given path prefix, inheriting the
    /// router-level middleware
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        let handlers = self.root_handlers.clone();
        RouteGroup::new(self, prefix.to_owned(), handlers)
    }

    /// Register a handler chain for a method and pattern.
    ///
    /// Router-level middleware is prepended. The pattern may use the full
    /// syntax: typed parameters, optional segments, catch-alls.
    pub fn handle(
        &mut self,
        method: &str,
        pattern: &str,
        handlers: Vec<Handler>,
    ) -> Result<Route<'_>> {
        let mut chain = self.root_handlers.clone();
        chain.extend(handlers);
        self.register(method, pattern, chain)?;
        Ok(Route::new(&mut self.named_routes, method, pattern))
    }

    fn add<F>(&mut self, method: Method, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.handle(method.as_str(), path, vec![crate::context::handler(handler)])
    }

    /// Register a GET route
    pub fn get<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Get, path, handler)
    }

    /// Register a HEAD route
    pub fn head<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Head, path, handler)
    }

    /// Register a POST route
    pub fn post<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Post, path, handler)
    }

    /// Register a PUT route
    pub fn put<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Put, path, handler)
    }

    /// Register a PATCH route
    pub fn patch<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Patch, path, handler)
    }

    /// Register a DELETE route
    pub fn delete<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Delete, path, handler)
    }

    /// Register a CONNECT route
    pub fn connect<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Connect, path, handler)
    }

    /// Register an OPTIONS route
    pub fn options<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Options, path, handler)
    }

    /// Register a TRACE route
    pub fn trace<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Trace, path, handler)
    }

    /// Register a route matching every HTTP method
    pub fn any<F>(&mut self, path: &str, handler: F) -> Result<Route<'_>>
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.add(Method::Wild, path, handler)
    }

    /// Register an already-combined handler chain; used by route groups
    /// which have composed prefix and middleware themselves.
    pub(crate) fn register(
        &mut self,
        method: &str,
        pattern: &str,
        chain: Vec<Handler>,
    ) -> Result<()> {
        if method.is_empty() {
            return Err(Error::EmptyMethod);
        }
        if chain.is_empty() {
            return Err(Error::NoHandlers(pattern.to_owned()));
        }
        if !pattern.starts_with('/') {
            return Err(squall_router::PatternError::MissingLeadingSlash(pattern.to_owned()).into());
        }

        let chain: HandlerChain = chain.into();

        let expanded = expand_optional_patterns(pattern);
        let concrete = if expanded.is_empty() {
            vec![pattern.to_owned()]
        } else {
            expanded
        };

        let index = self.ensure_method_tree(method);
        for path in &concrete {
            let compiled = apply_constraints(path)?;
            self.registered
                .entry(method.to_owned())
                .or_default()
                .push(compiled.clone());
            let tree = self.trees[index]
                .as_mut()
                .expect("tree allocated by ensure_method_tree");
            tree.insert(&compiled, chain.clone())?;
        }

        // The cached global Allow value covers every registered method
        self.global_allowed = self.allowed("*", "");

        Ok(())
    }

    fn method_index(&self, method: &str) -> Option<usize> {
        Method::from_str(method)
            .ok()
            .map(|m| m.index())
            .or_else(|| self.custom_methods.get(method).copied())
    }

    /// Slot of the method's tree, allocating the tree (and a custom slot if
    /// needed) on first registration.
    fn ensure_method_tree(&mut self, method: &str) -> usize {
        let index = match self.method_index(method) {
            Some(index) => index,
            None => {
                self.trees.push(None);
                let index = self.trees.len() - 1;
                self.custom_methods.insert(method.to_owned(), index);
                index
            }
        };

        if self.trees[index].is_none() {
            let mut tree = Tree::new();
            tree.set_mutable(self.mutable_trees);
            self.trees[index] = Some(tree);
        }

        index
    }

    /// Comma-separated list of methods allowed for `path`, excluding
    /// `req_method`, in ascending order; `OPTIONS` is always included. For
    /// the pseudo-paths `*` and `/*` the list covers every registered
    /// method.
    fn allowed(&self, path: &str, req_method: &str) -> String {
        let mut allowed: Vec<&str> = Vec::with_capacity(Method::COUNT);

        if path == "*" || path == "/*" {
            if req_method.is_empty() {
                for name in self.registered.keys() {
                    let method = name.as_str();
                    if method == Method::Options.as_str() {
                        continue;
                    }
                    allowed.push(method);
                }
            } else {
                return self.global_allowed.clone();
            }
        } else {
            for name in self.registered.keys() {
                let method = name.as_str();
                if method == req_method || method == Method::Options.as_str() {
                    continue;
                }
                let Some(index) = self.method_index(method) else {
                    continue;
                };
                let Some(Some(tree)) = self.trees.get(index) else {
                    continue;
                };
                if tree.get(path).value.is_some() {
                    allowed.push(method);
                }
            }
        }

        if allowed.is_empty() {
            return String::new();
        }
        allowed.push(Method::Options.as_str());
        allowed.sort_unstable();
        allowed.join(", ")
    }

    /// Dispatch a request and produce its response.
    ///
    /// The request context is checked out of the pool, the matching handler
    /// chain runs, and redirect / OPTIONS / 405 / 404 policy applies on a
    /// miss. Handler panics are recovered here and never escape.
    pub fn dispatch(&self, request: Request) -> Response {
        let mut ctx = self.pool.acquire(request);
        self.dispatch_ctx(&mut ctx);
        ctx.take_response()
    }

    fn dispatch_ctx(&self, ctx: &mut Context) {
        let method = ctx.method().to_owned();
        let path = ctx.path().to_owned();
        let query = ctx.request().query.clone();

        if let Some(index) = self.method_index(&method) {
            if let Some(Some(tree)) = self.trees.get(index) {
                let hit = tree.get(&path);
                if let Some(chain) = hit.value {
                    ctx.set_route(chain.clone(), hit.params);
                    self.run_chain(ctx);
                    return;
                }
                let tsr = hit.tsr;
                if method != Method::Connect.as_str() && path != "/" {
                    if let Some(redirect) =
                        self.try_redirect(tree, tsr, &method, &path, query.as_deref())
                    {
                        *ctx.response_mut() = redirect;
                        return;
                    }
                }
            }
        }

        // Routes registered under the wildcard method; a hit is terminal
        if let Some(Some(tree)) = self.trees.get(Method::Wild.index()) {
            let hit = tree.get(&path);
            if let Some(chain) = hit.value {
                ctx.set_route(chain.clone(), hit.params);
                self.run_chain(ctx);
                return;
            }
            let tsr = hit.tsr;
            if method != Method::Connect.as_str() && path != "/" {
                if let Some(redirect) =
                    self.try_redirect(tree, tsr, &method, &path, query.as_deref())
                {
                    *ctx.response_mut() = redirect;
                    return;
                }
            }
        }

        if self.handle_options && method == Method::Options.as_str() {
            let mut allow = self.allowed(&path, Method::Options.as_str());
            if allow.is_empty() {
                allow = self.allowed("*", Method::Options.as_str());
            }
            if !allow.is_empty() {
                ctx.set_header("Allow", &allow);
                if let Some(handler) = self.global_options.clone() {
                    self.run_single(ctx, handler);
                }
                return;
            }
        } else if self.handle_method_not_allowed {
            let allow = self.allowed(&path, &method);
            if !allow.is_empty() {
                ctx.set_header("Allow", &allow);
                match self.method_not_allowed.clone() {
                    Some(handler) => self.run_single(ctx, handler),
                    None => ctx.response_mut().status = StatusCode::METHOD_NOT_ALLOWED,
                }
                return;
            }
        }

        match self.not_found.clone() {
            Some(handler) => self.run_single(ctx, handler),
            None => ctx.response_mut().status = StatusCode::NOT_FOUND,
        }
    }

    /// Build the redirect response for a near-miss, or `None` when neither
    /// redirect policy applies.
    ///
    /// Trailing-slash redirection is preferred; fixed-path recovery (clean
    /// the path, then case-insensitive lookup) runs second. The query
    /// string is carried over verbatim.
    fn try_redirect(
        &self,
        tree: &Tree<HandlerChain>,
        tsr: bool,
        method: &str,
        path: &str,
        query: Option<&str>,
    ) -> Option<Response> {
        let status = if method == Method::Get.as_str() {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::PERMANENT_REDIRECT
        };

        if tsr && self.redirect_trailing_slash {
            let mut location = if path.len() > 1 && path.ends_with('/') {
                path[..path.len() - 1].to_owned()
            } else {
                format!("{path}/")
            };
            append_query(&mut location, query);
            return Some(Response::redirect(&location, status));
        }

        if self.redirect_fixed_path {
            let cleaned = clean_path(path);
            if let Some(mut fixed) =
                tree.find_case_insensitive(&cleaned, self.redirect_trailing_slash)
            {
                append_query(&mut fixed, query);
                return Some(Response::redirect(&fixed, status));
            }
        }

        None
    }

    fn run_single(&self, ctx: &mut Context, handler: Handler) {
        ctx.set_route(vec![handler].into(), squall_router::Params::new());
        self.run_chain(ctx);
    }

    /// Run the context's handler chain, recovering panics and routing
    /// errors through the hooks.
    fn run_chain(&self, ctx: &mut Context) {
        match catch_unwind(AssertUnwindSafe(|| ctx.next())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.handle_error(ctx, err),
            Err(payload) => {
                ctx.abort();
                match &self.panic_hook {
                    Some(hook) => {
                        if let Err(err) = hook(ctx, payload) {
                            self.handle_error(ctx, err);
                        }
                    }
                    None => {
                        tracing::error!(method = ctx.method(), path = ctx.path(), "handler panicked");
                        *ctx.response_mut() = Response::internal_error("Internal Server Error");
                    }
                }
            }
        }
    }

    fn handle_error(&self, ctx: &mut Context, err: Error) {
        if let Some(hook) = &self.error_hook {
            if let Err(hook_err) = hook(ctx, err) {
                tracing::error!(error = %hook_err, "error hook failed");
                *ctx.response_mut() = Response::internal_error("Internal Server Error");
            }
            return;
        }

        match err {
            Error::Http(http_err) => {
                *ctx.response_mut() = Response::plain(http_err.status, &http_err.message);
            }
            err => {
                tracing::error!(error = %err, "unhandled handler error");
                *ctx.response_mut() = Response::internal_error("Internal Server Error");
            }
        }
    }
}

fn append_query(location: &mut String, query: Option<&str>) {
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        location.push('?');
        location.push_str(query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::handler;
    use crate::request::RequestBuilder;

    fn text_handler(text: &'static str) -> Handler {
        handler(move |ctx: &mut Context| ctx.send_string(text))
    }

    fn get(router: &Router, path: &str) -> Response {
        router.dispatch(Request::new("GET", path))
    }

    #[test]
    fn test_static_dispatch() {
        let mut router = Router::new();
        router
            .handle("GET", "/hello", vec![text_handler("Hello, squall!")])
            .unwrap();

        let res = get(&router, "/hello");
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body_string().as_deref(), Some("Hello, squall!"));
    }

    #[test]
    fn test_not_found() {
        let router = Router::new();
        let res = get(&router, "/missing");
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_typed_param_dispatch() {
        let mut router = Router::new();
        router
            .handle(
                "GET",
                "/product/{pid:[0-9]+}",
                vec![handler(|ctx: &mut Context| {
                    let pid = ctx.param("pid").unwrap_or("").to_owned();
                    ctx.send_string(&pid)
                })],
            )
            .unwrap();

        let res = get(&router, "/product/456");
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body_string().as_deref(), Some("456"));

        let res = get(&router, "/product/abc");
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_method_not_allowed() {
        let mut router = Router::new();
        router
            .handle("GET", "/onlyget", vec![text_handler("GET only")])
            .unwrap();

        let res = router.dispatch(Request::new("POST", "/onlyget"));
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("Allow"), Some("GET, OPTIONS"));
    }

    #[test]
    fn test_method_not_allowed_disabled() {
        let mut router = Router::new();
        router.handle_method_not_allowed = false;
        router
            .handle("GET", "/onlyget", vec![text_handler("GET only")])
            .unwrap();

        let res = router.dispatch(Request::new("POST", "/onlyget"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert!(res.header("Allow").is_none());
    }

    #[test]
    fn test_options_synthesis() {
        let mut router = Router::new();
        router
            .handle("GET", "/opt", vec![text_handler("GET ok")])
            .unwrap();
        router
            .handle("POST", "/opt", vec![text_handler("POST ok")])
            .unwrap();

        let res = router.dispatch(Request::new("OPTIONS", "/opt"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.header("Allow"), Some("GET, OPTIONS, POST"));
    }

    #[test]
    fn test_options_synthesis_disabled() {
        let mut router = Router::new();
        router.handle_options = false;
        router
            .handle("GET", "/opt", vec![text_handler("GET ok")])
            .unwrap();

        let res = router.dispatch(Request::new("OPTIONS", "/opt"));
        // Falls through to 405 with the Allow header
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("Allow"), Some("GET, OPTIONS"));
    }

    #[test]
    fn test_redirect_trailing_slash() {
        let mut router = Router::new();
        router
            .handle("GET", "/slash", vec![text_handler("No slash")])
            .unwrap();
        router
            .handle("GET", "/dir/", vec![text_handler("Dir")])
            .unwrap();

        let res = get(&router, "/slash/");
        assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("Location"), Some("/slash"));

        let res = get(&router, "/dir");
        assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("Location"), Some("/dir/"));

        // Non-GET methods use 308
        router
            .handle("POST", "/slash", vec![text_handler("No slash")])
            .unwrap();
        let res = router.dispatch(Request::new("POST", "/slash/"));
        assert_eq!(res.status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(res.header("Location"), Some("/slash"));
    }

    #[test]
    fn test_redirect_preserves_query() {
        let mut router = Router::new();
        router
            .handle("GET", "/home", vec![text_handler("home")])
            .unwrap();

        let request = RequestBuilder::new("GET", "/home/").query("a=1&b=2").build();
        let res = router.dispatch(request);
        assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("Location"), Some("/home?a=1&b=2"));
    }

    #[test]
    fn test_redirect_trailing_slash_disabled() {
        let mut router = Router::new();
        router.redirect_trailing_slash = false;
        router.redirect_fixed_path = false;
        router
            .handle("GET", "/slash", vec![text_handler("No slash")])
            .unwrap();

        let res = get(&router, "/slash/");
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_redirect_fixed_path() {
        let mut router = Router::new();
        router
            .handle("GET", "/About/", vec![text_handler("about")])
            .unwrap();

        let request = RequestBuilder::new("GET", "/about").query("x=1").build();
        let res = router.dispatch(request);
        assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("Location"), Some("/About/?x=1"));

        // Path cleaning happens before the case-insensitive walk
        let res = get(&router, "/..//About");
        assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("Location"), Some("/About/"));
    }

    #[test]
    fn test_no_redirect_for_root_or_connect() {
        let mut router = Router::new();
        router
            .handle("CONNECT", "/tunnel", vec![text_handler("t")])
            .unwrap();

        let res = router.dispatch(Request::new("CONNECT", "/tunnel/"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_optional_params() {
        let mut router = Router::new();
        router
            .handle(
                "GET",
                "/user/{name?}",
                vec![handler(|ctx: &mut Context| {
                    let name = ctx.param_or("name", "Guest").to_owned();
                    ctx.send_string(&format!("Hello, {name}"))
                })],
            )
            .unwrap();

        let res = get(&router, "/user/Abhishek");
        assert_eq!(res.body_string().as_deref(), Some("Hello, Abhishek"));

        let res = get(&router, "/user");
        assert_eq!(res.body_string().as_deref(), Some("Hello, Guest"));
    }

    #[test]
    fn test_wildcard_method() {
        let mut router = Router::new();
        router
            .handle("*", "/anything", vec![text_handler("wild")])
            .unwrap();

        for method in ["GET", "POST", "DELETE", "BREW"] {
            let res = router.dispatch(Request::new(method, "/anything"));
            assert_eq!(res.status, StatusCode::OK, "method {method}");
            assert_eq!(res.body_string().as_deref(), Some("wild"));
        }
    }

    #[test]
    fn test_custom_method() {
        let mut router = Router::new();
        router
            .handle("PURGE", "/cache", vec![text_handler("purged")])
            .unwrap();

        let res = router.dispatch(Request::new("PURGE", "/cache"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body_string().as_deref(), Some("purged"));

        let res = router.dispatch(Request::new("GET", "/cache"));
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("Allow"), Some("OPTIONS, PURGE"));
    }

    #[test]
    fn test_handler_http_error() {
        let mut router = Router::new();
        router
            .handle(
                "GET",
                "/secret",
                vec![handler(|_: &mut Context| {
                    Err(crate::HttpError::forbidden().into())
                })],
            )
            .unwrap();

        let res = get(&router, "/secret");
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(res.body_string().as_deref(), Some("Forbidden"));
    }

    #[test]
    fn test_handler_opaque_error_is_500() {
        let mut router = Router::new();
        router
            .handle(
                "GET",
                "/broken",
                vec![handler(|_: &mut Context| {
                    Err(Error::Internal("boom".into()))
                })],
            )
            .unwrap();

        let res = get(&router, "/broken");
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_hook() {
        let mut router = Router::new();
        router.set_error_hook(Arc::new(|ctx: &mut Context, err: Error| {
            ctx.set_status(StatusCode::IM_A_TEAPOT);
            ctx.send_string(&format!("hooked: {err}"))
        }));
        router
            .handle(
                "GET",
                "/broken",
                vec![handler(|_: &mut Context| {
                    Err(Error::Internal("boom".into()))
                })],
            )
            .unwrap();

        let res = get(&router, "/broken");
        assert_eq!(res.status, StatusCode::IM_A_TEAPOT);
        assert_eq!(
            res.body_string().as_deref(),
            Some("hooked: internal error: boom")
        );
    }

    #[test]
    fn test_panic_recovery() {
        let mut router = Router::new();
        router
            .handle(
                "GET",
                "/panic",
                vec![handler(|_: &mut Context| panic!("kaboom"))],
            )
            .unwrap();

        let res = get(&router, "/panic");
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

        // The context pool survives and the router keeps serving
        router
            .handle("GET", "/fine", vec![text_handler("ok")])
            .unwrap();
        assert_eq!(get(&router, "/fine").status, StatusCode::OK);
    }

    #[test]
    fn test_panic_hook() {
        let mut router = Router::new();
        router.set_panic_hook(Arc::new(|ctx: &mut Context, payload| {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("unknown panic");
            ctx.set_status(StatusCode::SERVICE_UNAVAILABLE);
            ctx.send_string(message)
        }));
        router
            .handle(
                "GET",
                "/panic",
                vec![handler(|_: &mut Context| panic!("kaboom"))],
            )
            .unwrap();

        let res = get(&router, "/panic");
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body_string().as_deref(), Some("kaboom"));
    }

    #[test]
    fn test_registration_errors() {
        let mut router = Router::new();
        assert!(matches!(
            router.handle("", "/x", vec![text_handler("x")]),
            Err(Error::EmptyMethod)
        ));
        assert!(matches!(
            router.handle("GET", "/x", vec![]),
            Err(Error::NoHandlers(_))
        ));
        assert!(matches!(
            router.handle("GET", "x", vec![text_handler("x")]),
            Err(Error::Pattern(_))
        ));

        router.handle("GET", "/dup", vec![text_handler("a")]).unwrap();
        assert!(matches!(
            router.handle("GET", "/dup", vec![text_handler("b")]),
            Err(Error::Insert(_))
        ));
    }

    #[test]
    fn test_mutable_router() {
        let mut router = Router::new();
        router.set_mutable(true);
        router.handle("GET", "/page", vec![text_handler("v1")]).unwrap();
        router.handle("GET", "/page", vec![text_handler("v2")]).unwrap();

        assert_eq!(get(&router, "/page").body_string().as_deref(), Some("v2"));
    }

    #[test]
    fn test_custom_not_found_handler() {
        let mut router = Router::new();
        router.set_not_found(handler(|ctx: &mut Context| {
            ctx.set_status(StatusCode::NOT_FOUND);
            ctx.send_string("custom miss")
        }));

        let res = get(&router, "/nowhere");
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body_string().as_deref(), Some("custom miss"));
    }

    #[test]
    fn test_middleware_chain_order() {
        let mut router = Router::new();
        router.use_middleware(vec![handler(|ctx: &mut Context| {
            ctx.send_string("mw:")?;
            Ok(())
        })]);
        router
            .handle("GET", "/page", vec![text_handler("page")])
            .unwrap();

        let res = get(&router, "/page");
        assert_eq!(res.body_string().as_deref(), Some("mw:page"));
    }

    #[test]
    fn test_named_route_url() {
        let mut router = Router::new();
        router
            .handle("GET", "/users/{id:int}/posts/{slug}", vec![text_handler("p")])
            .unwrap()
            .name("user-post")
            .tag("api");

        let route = router.route("user-post").unwrap();
        assert_eq!(route.template(), "/users/{id}/posts/{slug}");
        assert_eq!(route.tags(), ["api"]);
        assert_eq!(
            route.url(&[("id", "5"), ("slug", "hello world")]),
            "/users/5/posts/hello+world"
        );
        // Unknown names stay as template tokens
        assert_eq!(route.url(&[("id", "5")]), "/users/5/posts/{slug}");

        assert!(router.route("missing").is_none());
    }
}
