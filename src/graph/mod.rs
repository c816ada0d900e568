//! Routing graph between the model and the tools

pub mod router;
pub mod routing;

pub use router::{route, Route};
pub use routing::{RouteState, RoutingGraph, StepContext};
