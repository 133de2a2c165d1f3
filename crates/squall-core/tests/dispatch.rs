//! End-to-end dispatch tests: a realistic route table exercised through the
//! full request path, from registration to response.

use squall_core::{handler, Context, Request, RequestBuilder, Response, Router, StatusCode};

fn text(body: &'static str) -> squall_core::Handler {
    handler(move |ctx: &mut Context| ctx.send_string(body))
}

fn echo_param(name: &'static str) -> squall_core::Handler {
    handler(move |ctx: &mut Context| {
        let value = ctx.param_or(name, "<none>").to_owned();
        ctx.send_string(&value)
    })
}

/// A route table covering the full pattern syntax
fn build_app() -> Router {
    let mut router = Router::new();

    router.handle("GET", "/", vec![text("index")]).unwrap();
    router.handle("GET", "/home", vec![text("home")]).unwrap();
    router
        .handle("GET", "/user/{id:int}", vec![echo_param("id")])
        .unwrap();
    router
        .handle("GET", "/product/{pid:[0-9]+}", vec![echo_param("pid")])
        .unwrap();
    router
        .handle("GET", "/{name}_world", vec![echo_param("name")])
        .unwrap();
    router
        .handle("GET", "/static/{filepath:*}", vec![echo_param("filepath")])
        .unwrap();
    router
        .handle("GET", "/greet/{who?}", vec![echo_param("who")])
        .unwrap();
    router.handle("POST", "/home", vec![text("posted")]).unwrap();
    router.handle("GET", "/About/", vec![text("about")]).unwrap();

    router
}

fn dispatch(router: &Router, method: &str, path: &str) -> Response {
    router.dispatch(Request::new(method, path))
}

#[test]
fn static_and_root_routes() {
    let app = build_app();

    assert_eq!(
        dispatch(&app, "GET", "/").body_string().as_deref(),
        Some("index")
    );
    assert_eq!(
        dispatch(&app, "GET", "/home").body_string().as_deref(),
        Some("home")
    );
    assert_eq!(dispatch(&app, "GET", "/nope").status, StatusCode::NOT_FOUND);
}

#[test]
fn typed_parameters_reject_bad_input() {
    let app = build_app();

    assert_eq!(
        dispatch(&app, "GET", "/user/42").body_string().as_deref(),
        Some("42")
    );
    assert_eq!(
        dispatch(&app, "GET", "/product/456").body_string().as_deref(),
        Some("456")
    );
    assert_eq!(
        dispatch(&app, "GET", "/product/abc").status,
        StatusCode::NOT_FOUND
    );
}

#[test]
fn inline_suffix_parameters() {
    let app = build_app();

    assert_eq!(
        dispatch(&app, "GET", "/john_world").body_string().as_deref(),
        Some("john")
    );
    assert_eq!(
        dispatch(&app, "GET", "/john-doe_world")
            .body_string()
            .as_deref(),
        Some("john-doe")
    );
    assert_eq!(
        dispatch(&app, "GET", "/johnworld").status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        dispatch(&app, "GET", "/john_worlds").status,
        StatusCode::NOT_FOUND
    );
}

#[test]
fn catch_all_binds_remainder() {
    let app = build_app();

    assert_eq!(
        dispatch(&app, "GET", "/static/css/site.css")
            .body_string()
            .as_deref(),
        Some("css/site.css")
    );
    assert_eq!(
        dispatch(&app, "GET", "/static/").body_string().as_deref(),
        Some("")
    );
}

#[test]
fn optional_parameter_registers_both_forms() {
    let app = build_app();

    assert_eq!(
        dispatch(&app, "GET", "/greet/Abhishek")
            .body_string()
            .as_deref(),
        Some("Abhishek")
    );
    assert_eq!(
        dispatch(&app, "GET", "/greet").body_string().as_deref(),
        Some("<none>")
    );
}

#[test]
fn method_not_allowed_lists_methods() {
    let app = build_app();

    let res = dispatch(&app, "DELETE", "/home");
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("Allow"), Some("GET, OPTIONS, POST"));
}

#[test]
fn options_synthesis_lists_methods() {
    let app = build_app();

    let res = dispatch(&app, "OPTIONS", "/home");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("Allow"), Some("GET, OPTIONS, POST"));
}

#[test]
fn trailing_slash_redirect_preserves_query() {
    let app = build_app();

    let res = app.dispatch(RequestBuilder::new("GET", "/home/").query("a=1").build());
    assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.header("Location"), Some("/home?a=1"));
}

#[test]
fn case_recovery_redirects_to_canonical_path() {
    let app = build_app();

    let res = app.dispatch(RequestBuilder::new("GET", "/about").query("q=x").build());
    assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.header("Location"), Some("/About/?q=x"));

    // Path normalisation runs before the case-insensitive walk
    let res = dispatch(&app, "GET", "/..//HOME");
    assert_eq!(res.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.header("Location"), Some("/home"));
}

#[test]
fn head_uses_its_own_tree() {
    let mut router = Router::new();
    router.handle("HEAD", "/ping", vec![text("pong")]).unwrap();

    assert_eq!(dispatch(&router, "HEAD", "/ping").status, StatusCode::OK);
    // GET has no registered route; it reports the allowed methods instead
    let res = dispatch(&router, "GET", "/ping");
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("Allow"), Some("HEAD, OPTIONS"));
}

#[test]
fn wildcard_method_is_a_fallback() {
    let mut router = Router::new();
    router.handle("GET", "/page", vec![text("specific")]).unwrap();
    router.handle("*", "/page", vec![text("wild")]).unwrap();

    assert_eq!(
        dispatch(&router, "GET", "/page").body_string().as_deref(),
        Some("specific")
    );
    assert_eq!(
        dispatch(&router, "POST", "/page").body_string().as_deref(),
        Some("wild")
    );
}

#[test]
fn named_route_url_matches_its_own_route() {
    let mut router = Router::new();
    router
        .handle("GET", "/users/{id:int}", vec![echo_param("id")])
        .unwrap()
        .name("user");

    let url = router.route("user").unwrap().url(&[("id", "7")]);
    assert_eq!(url, "/users/7");

    // The generated URL routes back to the same handler
    let res = dispatch(&router, "GET", &url);
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body_string().as_deref(), Some("7"));
}

#[test]
fn groups_compose_with_dispatch_policy() {
    let mut router = Router::new();
    {
        let mut api = router.group("/api");
        api.use_middleware(vec![handler(|ctx: &mut Context| {
            ctx.set_header("x-api", "1");
            Ok(())
        })]);
        api.get("/users/{id:int}", |ctx| {
            let id = ctx.param_or("id", "").to_owned();
            ctx.send_string(&id)
        })
        .unwrap();
    }

    let res = dispatch(&router, "GET", "/api/users/9");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-api"), Some("1"));
    assert_eq!(res.body_string().as_deref(), Some("9"));

    // Group routes participate in 405 handling like any other
    let res = dispatch(&router, "PUT", "/api/users/9");
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("Allow"), Some("GET, OPTIONS"));
}

#[test]
fn dispatch_is_safe_from_parallel_readers() {
    use std::sync::Arc;

    let app = Arc::new(build_app());
    let mut joins = Vec::new();

    for _ in 0..8 {
        let app = Arc::clone(&app);
        joins.push(std::thread::spawn(move || {
            for _ in 0..200 {
                assert_eq!(
                    app.dispatch(Request::new("GET", "/user/42"))
                        .body_string()
                        .as_deref(),
                    Some("42")
                );
                assert_eq!(
                    app.dispatch(Request::new("GET", "/static/a/b"))
                        .body_string()
                        .as_deref(),
                    Some("a/b")
                );
            }
        }));
    }
    for join in joins {
        join.join().unwrap();
    }
}
