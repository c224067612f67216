pub mod route;
pub mod tree;

pub use route::{Authorization, NodeId, Route, RouteSummary, Validator, Verb};
pub use tree::{segments, Resolution, ResourceNode, ResourceTree, RouteError};
