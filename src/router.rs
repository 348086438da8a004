//! Declaration-ordered request router.
//!
//! Routes are tried in the order they were registered, descending into nested
//! routers where they were nested. The first full match wins; there is no
//! specificity ranking, so `/items/{id}` registered before `/items/special`
//! shadows it.
//!
//! A router is a builder. Turning it into a handler (directly, or by passing
//! it to a [`Pipeline`](crate::Pipeline)) flattens it into a [`RouteTable`]
//! where every route already carries its scope's filters, outermost first.

use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::filter::{BoxedFilter, Filter, compose};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::method::Method;
use crate::path::PathPattern;
use crate::request::{PathParams, Request};

enum Entry {
    Route { method: Option<Method>, pattern: PathPattern, handler: BoxedHandler },
    Scope { prefix: PathPattern, router: Router },
}

/// The application router.
///
/// Each builder method returns `self` so registrations chain naturally:
///
/// ```rust
/// use ferrule::{Method, Request, Response, Router};
///
/// async fn list(_: Request) -> Response { Response::text("all") }
/// async fn show(req: Request) -> Response {
///     Response::text(format!("item {}", req.param("id").unwrap_or("?")))
/// }
///
/// let app = Router::new()
///     .on(Method::Get, "/health", |_req: Request| async { "ok" })
///     .nest("/items", Router::new()
///         .get("/", list)
///         .get("/{id}", show));
/// ```
pub struct Router {
    entries: Vec<Entry>,
    filters: Vec<BoxedFilter>,
}

impl Router {
    pub fn new() -> Self {
        Self { entries: Vec::new(), filters: Vec::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path variables use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern (see [`PathPattern::parse`]).
    /// Routes are declared at startup; a bad one is a programming error.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(Some(method), path, handler)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Register a handler for every method on `path`.
    pub fn any(self, path: &str, handler: impl Handler) -> Self {
        self.add(None, path, handler)
    }

    /// Mounts `router` under `prefix`. Its routes keep their relative order
    /// and take this position in the parent's declaration order; its filters
    /// apply to its own routes only, inside this router's filters.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` is not a valid pattern.
    pub fn nest(mut self, prefix: &str, router: Router) -> Self {
        let prefix = parse_or_panic(prefix);
        self.entries.push(Entry::Scope { prefix, router });
        self
    }

    /// Adds a filter around every route of this router, including nested
    /// ones and routes registered after this call. Filters run in the order
    /// they were added.
    pub fn filter(mut self, filter: impl Filter) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Combines two independently built routers. Routes of `self` take
    /// precedence; each side keeps its own filters.
    pub fn merge(self, other: Router) -> Router {
        Router {
            entries: vec![
                Entry::Scope { prefix: PathPattern::root(), router: self },
                Entry::Scope { prefix: PathPattern::root(), router: other },
            ],
            filters: Vec::new(),
        }
    }

    /// Flattens the router into its lookup table.
    pub fn into_table(self) -> RouteTable {
        let mut routes = Vec::new();
        self.flatten(&PathPattern::root(), &[], &mut routes);
        debug!(routes = routes.len(), "route table built");
        RouteTable { routes }
    }

    fn add(mut self, method: Option<Method>, path: &str, handler: impl Handler) -> Self {
        let pattern = parse_or_panic(path);
        self.entries.push(Entry::Route { method, pattern, handler: handler.into_boxed_handler() });
        self
    }

    fn flatten(self, prefix: &PathPattern, outer: &[BoxedFilter], out: &mut Vec<CompiledRoute>) {
        let Router { entries, filters: own } = self;
        let mut filters = outer.to_vec();
        filters.extend(own);

        for entry in entries {
            match entry {
                Entry::Route { method, pattern, handler } => out.push(CompiledRoute {
                    method,
                    pattern: prefix.join(&pattern),
                    handler: compose(filters.clone(), handler),
                }),
                Entry::Scope { prefix: inner, router } => {
                    router.flatten(&prefix.join(&inner), &filters, out);
                }
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl private::Sealed for Router {}

impl Handler for Router {
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler::new(self.into_table())
    }
}

fn parse_or_panic(path: &str) -> PathPattern {
    PathPattern::parse(path).unwrap_or_else(|e| panic!("{e}"))
}

// ── RouteTable ────────────────────────────────────────────────────────────────

struct CompiledRoute {
    method: Option<Method>,
    pattern: PathPattern,
    handler: BoxedHandler,
}

/// A flattened, immutable router, shared read-only by every exchange.
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Finds the first route matching `method` and `path`.
    ///
    /// The returned handler already includes the route's filters.
    pub fn resolve(&self, method: Method, path: &str) -> Result<(BoxedHandler, PathParams), Error> {
        self.routes
            .iter()
            .filter(|route| route.method.is_none_or(|m| m == method))
            .find_map(|route| {
                let params = route.pattern.matches(path)?;
                Some((route.handler.clone(), params))
            })
            .ok_or_else(|| Error::NoRouteMatched { method: method.to_string(), path: path.to_owned() })
    }

    /// Registered patterns in match order, for diagnostics.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.pattern.as_str())
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}

impl ErasedHandler for RouteTable {
    fn call(&self, mut req: Request) -> BoxFuture {
        match self.resolve(req.method(), req.path()) {
            Ok((handler, params)) => {
                req.set_params(params);
                handler.call(req)
            }
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    async fn hello(_req: Request) -> Response {
        Response::text("hello")
    }

    async fn user(req: Request) -> Response {
        Response::text(format!("user {}", req.param("id").unwrap_or("?")))
    }

    async fn body_of(handler: &BoxedHandler, req: Request) -> String {
        let res = handler.call(req).await.unwrap();
        String::from_utf8(res.into_body().collect().await.unwrap().to_vec()).unwrap()
    }

    #[test]
    fn flattens_nested_scopes_in_declaration_order() {
        let table = Router::new()
            .get("/", hello)
            .nest("/api", Router::new()
                .get("/users/{id}", user)
                .nest("/v2/", Router::new().get("/ping", hello)))
            .get("/last", hello)
            .into_table();
        let patterns: Vec<_> = table.patterns().collect();
        assert_eq!(patterns, ["/", "/api/users/{id}", "/api/v2/ping", "/last"]);
    }

    #[tokio::test]
    async fn binds_path_variables() {
        let app = Router::new().get("/users/{id}", user).into_boxed_handler();
        assert_eq!(body_of(&app, Request::get("/users/42")).await, "user 42");
    }

    #[test]
    fn method_must_match() {
        let table = Router::new().get("/", hello).into_table();
        assert!(table.resolve(Method::Get, "/").is_ok());
        assert!(matches!(
            table.resolve(Method::Post, "/"),
            Err(Error::NoRouteMatched { method, path }) if method == "POST" && path == "/"
        ));
    }

    #[test]
    fn any_matches_every_method() {
        let table = Router::new().any("/echo", hello).into_table();
        for method in [Method::Get, Method::Post, Method::Delete, Method::Options] {
            assert!(table.resolve(method, "/echo").is_ok());
        }
    }

    #[tokio::test]
    async fn unmatched_path_fails_with_no_route() {
        let app = Router::new().get("/", hello).into_boxed_handler();
        let err = app.call(Request::get("/missing")).await.unwrap_err();
        assert!(matches!(err, Error::NoRouteMatched { .. }));
    }

    #[test]
    #[should_panic(expected = "wildcard segments are not supported")]
    fn invalid_pattern_panics_at_registration() {
        let _ = Router::new().get("/files/{*path}", hello);
    }

    #[tokio::test]
    async fn prefix_variables_are_visible_to_nested_handlers() {
        let app = Router::new()
            .nest("/users/{id}", Router::new().get("/profile", user))
            .into_boxed_handler();
        assert_eq!(body_of(&app, Request::get("/users/7/profile")).await, "user 7");
    }
}
