//! A standalone expression or statement evaluated against the state of a
//! started program.
use crate::library::BodyPools;
use crate::node::Body;

/// A parsed query. References in the body are resolved against the global
/// scope when the query is run.
#[derive(Debug, Default)]
pub struct Query {
    pub body: Body,
    pub pools: BodyPools,
}
