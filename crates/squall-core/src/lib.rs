//! squall-core: HTTP routing framework core
//!
//! Pattern-indexed request dispatch built on the squall-router radix trees:
//! per-method trees with typed parameters, trailing-slash and
//! case-insensitive redirects, OPTIONS synthesis and 405 handling, route
//! groups with middleware, named routes and a hyper-based serve loop.
//!
//! ## Example
//! ```
//! use squall_core::{Router, Request};
//!
//! let mut router = Router::new();
//! router
//!     .get("/hello/{name}", |ctx| {
//!         let name = ctx.param_or("name", "world").to_owned();
//!         ctx.send_string(&format!("Hello, {name}!"))
//!     })
//!     .unwrap();
//!
//! let response = router.dispatch(Request::new("GET", "/hello/squall"));
//! assert_eq!(response.body_string().as_deref(), Some("Hello, squall!"));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod group;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

// Re-exports
pub use context::{handler, Context, Handler, HandlerChain};
pub use error::{Error, HttpError, Result};
pub use group::{NamedRoute, Route, RouteGroup};
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use router::{ErrorHook, PanicHook, Router};
pub use server::ServerConfig;

pub use squall_router::Params;
