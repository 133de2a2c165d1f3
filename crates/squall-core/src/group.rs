//! Route groups and named routes
//!
//! A group holds a path prefix and a middleware list; routes registered
//! through it get the composed prefix and the group's middleware prepended.
//! Groups borrow the router and register through it, so ownership stays
//! one-way: router → groups → routes.

use std::collections::HashMap;

use squall_router::pattern::url_template;

use crate::context::{Context, Handler};
use crate::error::Result;
use crate::request::{urlencoding_encode, Method};
use crate::router::Router;

/// A group of routes sharing a path prefix and middleware
pub struct RouteGroup<'r> {
    router: &'r mut Router,
    prefix: String,
    handlers: Vec<Handler>,
}

impl<'r> RouteGroup<'r> {
    pub(crate) fn new(router: &'r mut Router, prefix: String, handlers: Vec<Handler>) -> Self {
        RouteGroup {
            router,
            prefix,
            handlers,
        }
    }

    /// The composed path prefix of this group
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Append middleware applied to every route registered through this
    /// group from now on
    pub fn use_middleware(&mut self, handlers: Vec<Handler>) {
        self.handlers.extend(handlers);
    }

    /// Create a child group; the prefix is concatenated and the middleware
    /// list is inherited as a copy
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        RouteGroup {
            prefix: format!("{}{}", self.prefix, prefix),
            handlers: self.handlers.clone(),
            router: &mut *self.router,
        }
    }

    /// Create a child group with its own middleware instead of the
    /// inherited copy
    pub fn group_with(&mut self, prefix: &str, handlers: Vec<Handler>) -> RouteGroup<'_> {
        RouteGroup {
            prefix: format!("{}{}", self.prefix, prefix),
            handlers,
            router: &mut *self.router,
        }
    }

    /// Register a handler chain for a method and path under this group
    pub fn handle(
        &mut self,
        method: &str,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<Route<'_>> {
        let full_path = format!("{}{}", self.prefix, path);
        let mut chain = self.handlers.clone();
        chain.extend(handlers);
        self.router.register(method, &full_path, chain)?;
        Ok(Route::new(&mut self.router.named_routes, method, &full_path))
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
}

/// Builder handle returned by route registration; names and tags the route
/// in the router's registry.
pub struct Route<'r> {
    named_routes: &'r mut HashMap<String, NamedRoute>,
    method: String,
    path: String,
    template: String,
    name: Option<String>,
    pending_tags: Vec<String>,
}

impl<'r> Route<'r> {
    pub(crate) fn new(
        named_routes: &'r mut HashMap<String, NamedRoute>,
        method: &str,
        path: &str,
    ) -> Self {
        Route {
            named_routes,
            method: method.to_owned(),
            path: path.to_owned(),
            template: url_template(path),
            name: None,
            pending_tags: Vec::new(),
        }
    }

    /// The HTTP method this route was registered under
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The full request path pattern, group prefix included
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register this route under a name, making it retrievable through
    /// [`Router::route`] for reverse URL generation
    pub fn name(mut self, name: &str) -> Self {
        self.named_routes.insert(
            name.to_owned(),
            NamedRoute {
                method: self.method.clone(),
                path: self.path.clone(),
                template: self.template.clone(),
                tags: std::mem::take(&mut self.pending_tags),
            },
        );
        self.name = Some(name.to_owned());
        self
    }

    /// Attach custom data to the route; tags become visible on the named
    /// route once `name` is (or was) called
    pub fn tag(mut self, tag: &str) -> Self {
        match &self.name {
            Some(name) => {
                if let Some(route) = self.named_routes.get_mut(name) {
                    route.tags.push(tag.to_owned());
                }
            }
            None => self.pending_tags.push(tag.to_owned()),
        }
        self
    }
}

impl std::fmt::Display for Route<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A route registered under a name, with its URL template
#[derive(Debug, Clone)]
pub struct NamedRoute {
    method: String,
    path: String,
    template: String,
    tags: Vec<String>,
}

impl NamedRoute {
    /// The HTTP method of the route
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The full pattern the route was registered with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The URL template, constraint syntax erased
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Custom data attached to the route
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Build a concrete URL from the template.
    ///
    /// Parameter values are query-escaped; parameters without a value keep
    /// their `{name}` token in the result.
    pub fn url(&self, params: &[(&str, &str)]) -> String {
        let mut url = self.template.clone();
        for (name, value) in params {
            url = url.replace(&format!("{{{name}}}"), &urlencoding_encode(value));
        }
        url
    }
}
