use axum::http::Method;
use thiserror::Error;

use super::route::{NodeId, Route, Verb};
use crate::broker::Permission;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Route {verb} {path} is already bound")]
    DuplicateRoute { verb: Verb, path: String },

    #[error("Route {verb} {path} overlaps a proxy catch-all at {proxy_path}")]
    ConflictingProxy {
        verb: Verb,
        path: String,
        proxy_path: String,
    },

    #[error("Route {verb} {path} declares a body schema but {verb} carries no body")]
    BodySchemaOnBodylessVerb { verb: Verb, path: String },

    #[error("Route {verb} {path} carries a {actual} scope but {verb} requires {expected}")]
    ScopePolicyViolation {
        verb: Verb,
        path: String,
        expected: Permission,
        actual: Permission,
    },
}

/// One path segment in the route namespace
#[derive(Debug)]
pub struct ResourceNode {
    segment: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    routes: Vec<Route>,
}

impl ResourceNode {
    fn new(segment: Option<String>, parent: Option<NodeId>) -> Self {
        Self {
            segment,
            parent,
            children: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn segment(&self) -> Option<&str> {
        self.segment.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    fn route(&self, verb: Verb) -> Option<&Route> {
        self.routes.iter().find(|r| r.verb() == verb)
    }

    fn proxy(&self) -> Option<&Route> {
        self.route(Verb::Proxy)
    }

    fn has_specific_routes(&self) -> bool {
        self.routes.iter().any(|r| r.verb() != Verb::Proxy)
    }
}

/// A route matched for a request, plus the sub-path a proxy swallowed
#[derive(Debug)]
pub struct Resolution<'a> {
    pub route: &'a Route,
    pub proxy_path: Vec<String>,
}

/// Ordered hierarchy of path segments. Nodes live in an arena; a node's
/// parent link is an index, so the tree is the only owner of its nodes.
#[derive(Debug)]
pub struct ResourceTree {
    nodes: Vec<ResourceNode>,
}

const ROOT: NodeId = NodeId(0);

impl Default for ResourceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ResourceNode::new(None, None)],
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn node(&self, id: NodeId) -> &ResourceNode {
        &self.nodes[id.0]
    }

    fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|c| self.node(*c).segment.as_deref() == Some(segment))
    }

    /// Slash-joined path of a node, `/` for the root
    pub fn path_of(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if let Some(segment) = &node.segment {
                segments.push(segment.as_str());
            }
            current = node.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn display_path(path: &[&str], verb: Verb) -> String {
        let base = format!("/{}", path.join("/"));
        if verb != Verb::Proxy {
            base
        } else if path.is_empty() {
            "/*".to_string()
        } else {
            format!("{}/*", base)
        }
    }

    /// Bind a route at `path`. The tree is left untouched when binding fails.
    pub fn bind(&mut self, path: &[&str], mut route: Route) -> Result<NodeId, RouteError> {
        let verb = route.verb();
        let display = Self::display_path(path, verb);

        if route.validator().and_then(|v| v.required_body_schema.as_ref()).is_some() && !verb.carries_body() {
            return Err(RouteError::BodySchemaOnBodylessVerb { verb, path: display });
        }

        let expected = Permission::for_verb(verb);
        if route.scope().permission != expected {
            return Err(RouteError::ScopePolicyViolation {
                verb,
                path: display,
                expected,
                actual: route.scope().permission,
            });
        }

        // Walk the existing prefix; ancestors carrying a proxy swallow everything below them
        let mut node = ROOT;
        let mut depth = 0;
        for segment in path {
            if let Some(proxy) = self.node(node).proxy() {
                return Err(RouteError::ConflictingProxy {
                    verb,
                    path: display,
                    proxy_path: proxy.path().to_string(),
                });
            }
            match self.child(node, segment) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }

        if depth == path.len() {
            let target = self.node(node);
            if target.route(verb).is_some() {
                return Err(RouteError::DuplicateRoute { verb, path: display });
            }
            if verb == Verb::Proxy {
                if target.has_specific_routes() || self.has_routes_below(node) {
                    return Err(RouteError::ConflictingProxy {
                        verb,
                        path: display.clone(),
                        proxy_path: display,
                    });
                }
            } else if let Some(proxy) = target.proxy() {
                return Err(RouteError::ConflictingProxy {
                    verb,
                    path: display,
                    proxy_path: proxy.path().to_string(),
                });
            }
        }

        for segment in &path[depth..] {
            let id = NodeId(self.nodes.len());
            self.nodes.push(ResourceNode::new(Some(segment.to_string()), Some(node)));
            self.nodes[node.0].children.push(id);
            node = id;
        }

        route.resource = Some(node);
        route.path = display;
        tracing::debug!("Bound route {}", route);
        self.nodes[node.0].routes.push(route);
        Ok(node)
    }

    fn has_routes_below(&self, id: NodeId) -> bool {
        self.node(id)
            .children
            .iter()
            .any(|c| !self.node(*c).routes.is_empty() || self.has_routes_below(*c))
    }

    /// Resolve a request path to exactly one route. Exact children win; a
    /// proxy route catches whatever sub-path its node cannot match exactly,
    /// but never the bare path of its own node.
    pub fn resolve<'a>(&'a self, segments: &[&str], method: &Method) -> Option<Resolution<'a>> {
        let mut node = ROOT;
        for (i, segment) in segments.iter().enumerate() {
            match self.child(node, segment) {
                Some(child) => node = child,
                None => {
                    return self.node(node).proxy().map(|route| Resolution {
                        route,
                        proxy_path: segments[i..].iter().map(|s| s.to_string()).collect(),
                    });
                }
            }
        }

        let target = self.node(node);
        Verb::from_method(method)
            .and_then(|verb| target.route(verb))
            .map(|route| Resolution {
                route,
                proxy_path: Vec::new(),
            })
    }

    /// All bound routes, depth-first in binding order
    pub fn routes(&self) -> Vec<&Route> {
        let mut out = Vec::new();
        self.collect_routes(ROOT, &mut out);
        out
    }

    fn collect_routes<'a>(&'a self, id: NodeId, out: &mut Vec<&'a Route>) {
        let node = self.node(id);
        out.extend(node.routes.iter());
        for child in &node.children {
            self.collect_routes(*child, out);
        }
    }
}

/// Split a request path into its non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::{Authorization, Validator};
    use crate::testing::{read_scope, write_scope, CountingHandler};
    use std::sync::Arc;

    fn route(verb: Verb) -> Route {
        let scope = if verb == Verb::Get { read_scope() } else { write_scope() };
        Route::new(verb, Authorization::IdentityRequired, scope, Arc::new(CountingHandler::ok()))
    }

    fn proxy() -> Route {
        Route::new(Verb::Proxy, Authorization::None, write_scope(), Arc::new(CountingHandler::ok()))
    }

    fn tree() -> ResourceTree {
        let mut tree = ResourceTree::new();
        tree.bind(&["auth"], proxy()).unwrap();
        tree.bind(&["destinations"], route(Verb::Get)).unwrap();
        tree.bind(&["destinations"], route(Verb::Post)).unwrap();
        tree.bind(&["destinations"], route(Verb::Delete)).unwrap();
        tree
    }

    #[test]
    fn resolves_exact_routes_by_verb() {
        let tree = tree();
        let get = tree.resolve(&["destinations"], &Method::GET).unwrap();
        assert_eq!(get.route.verb(), Verb::Get);
        assert_eq!(get.route.path(), "/destinations");
        assert!(get.proxy_path.is_empty());

        let delete = tree.resolve(&["destinations"], &Method::DELETE).unwrap();
        assert_eq!(delete.route.verb(), Verb::Delete);
    }

    #[test]
    fn unmatched_verbs_and_paths_are_not_found() {
        let tree = tree();
        assert!(tree.resolve(&["destinations"], &Method::PUT).is_none());
        assert!(tree.resolve(&["destinations", "p1"], &Method::GET).is_none());
        assert!(tree.resolve(&["places"], &Method::GET).is_none());
        assert!(tree.resolve(&[], &Method::GET).is_none());
    }

    #[test]
    fn proxy_swallows_any_depth_and_verb() {
        let tree = tree();
        let shallow = tree.resolve(&["auth", "x"], &Method::POST).unwrap();
        let deep = tree.resolve(&["auth", "login", "refresh"], &Method::GET).unwrap();
        let odd = tree.resolve(&["auth", "login"], &Method::PATCH).unwrap();

        assert!(std::ptr::eq(shallow.route, deep.route));
        assert!(std::ptr::eq(shallow.route, odd.route));
        assert_eq!(deep.route.verb(), Verb::Proxy);
        assert_eq!(deep.route.path(), "/auth/*");
        assert_eq!(deep.proxy_path, vec!["login".to_string(), "refresh".to_string()]);
    }

    #[test]
    fn proxy_does_not_match_its_own_node() {
        let tree = tree();
        for method in [Method::GET, Method::POST, Method::DELETE, Method::PATCH] {
            assert!(tree.resolve(&["auth"], &method).is_none(), "{}", method);
        }
    }

    #[test]
    fn duplicate_verb_is_rejected() {
        let mut tree = tree();
        let err = tree.bind(&["destinations"], route(Verb::Get)).unwrap_err();
        assert_eq!(
            err,
            RouteError::DuplicateRoute {
                verb: Verb::Get,
                path: "/destinations".to_string()
            }
        );
        let err = tree.bind(&["auth"], proxy()).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { verb: Verb::Proxy, .. }));
    }

    #[test]
    fn specific_route_below_or_at_proxy_conflicts() {
        let mut tree = tree();
        let below = tree.bind(&["auth", "login"], route(Verb::Post)).unwrap_err();
        assert_eq!(
            below,
            RouteError::ConflictingProxy {
                verb: Verb::Post,
                path: "/auth/login".to_string(),
                proxy_path: "/auth/*".to_string()
            }
        );
        let at = tree.bind(&["auth"], route(Verb::Get)).unwrap_err();
        assert!(matches!(at, RouteError::ConflictingProxy { .. }));
    }

    #[test]
    fn proxy_above_or_at_specific_routes_conflicts() {
        let mut tree = ResourceTree::new();
        tree.bind(&["destinations", "photos"], route(Verb::Get)).unwrap();

        let above = tree.bind(&["destinations"], proxy()).unwrap_err();
        assert!(matches!(above, RouteError::ConflictingProxy { .. }));
        let at = tree.bind(&["destinations", "photos"], proxy()).unwrap_err();
        assert!(matches!(at, RouteError::ConflictingProxy { .. }));
        let root = tree.bind(&[], proxy()).unwrap_err();
        assert!(matches!(root, RouteError::ConflictingProxy { .. }));
    }

    #[test]
    fn failed_bind_leaves_tree_untouched() {
        let mut tree = tree();
        let before = tree.routes().len();
        assert!(tree.bind(&["auth", "login", "deep"], route(Verb::Post)).is_err());
        assert_eq!(tree.routes().len(), before);
        let proxied = tree.resolve(&["auth", "login", "deep"], &Method::POST).unwrap();
        assert_eq!(proxied.route.verb(), Verb::Proxy);
    }

    #[test]
    fn body_schema_requires_body_carrying_verb() {
        let mut tree = ResourceTree::new();
        let bad = route(Verb::Delete).with_validator(Validator::new().require_body("destination"));
        let err = tree.bind(&["destinations"], bad).unwrap_err();
        assert!(matches!(err, RouteError::BodySchemaOnBodylessVerb { verb: Verb::Delete, .. }));
    }

    #[test]
    fn scope_must_follow_verb_policy() {
        let mut tree = ResourceTree::new();
        let get_with_write =
            Route::new(Verb::Get, Authorization::IdentityRequired, write_scope(), Arc::new(CountingHandler::ok()));
        let err = tree.bind(&["destinations"], get_with_write).unwrap_err();
        assert_eq!(
            err,
            RouteError::ScopePolicyViolation {
                verb: Verb::Get,
                path: "/destinations".to_string(),
                expected: Permission::Read,
                actual: Permission::Write,
            }
        );

        let post_with_read =
            Route::new(Verb::Post, Authorization::IdentityRequired, read_scope(), Arc::new(CountingHandler::ok()));
        assert!(matches!(
            tree.bind(&["destinations"], post_with_read),
            Err(RouteError::ScopePolicyViolation { verb: Verb::Post, .. })
        ));
        let proxy_with_read = Route::new(Verb::Proxy, Authorization::None, read_scope(), Arc::new(CountingHandler::ok()));
        assert!(tree.bind(&["auth"], proxy_with_read).is_err());

        assert!(tree.routes().is_empty());
        assert!(tree.resolve(&["destinations"], &Method::GET).is_none());
    }

    #[test]
    fn nodes_track_parents_and_paths() {
        let mut tree = ResourceTree::new();
        let id = tree.bind(&["v1", "destinations"], route(Verb::Get)).unwrap();
        let node = tree.node(id);
        assert_eq!(node.segment(), Some("destinations"));
        let parent = node.parent().unwrap();
        assert_eq!(tree.path_of(parent), "/v1");
        assert_eq!(tree.node(parent).parent(), Some(tree.root()));
        assert_eq!(tree.path_of(tree.root()), "/");
    }

    #[test]
    fn splits_paths_into_segments() {
        assert_eq!(segments("/auth/login/"), vec!["auth", "login"]);
        assert_eq!(segments("//destinations"), vec!["destinations"]);
        assert!(segments("/").is_empty());
    }
}
