//! Query builder for generated data-access code
//!
//! Statements are built against a [`Model`] and rendered with every literal
//! inlined. Rendering never aborts: it returns the SQL together with any
//! [`RenderError`] collected along the way.

pub mod builder;
pub mod model;
pub mod predicate;
pub mod value;

pub use builder::{
    delete, insert, select, union, update, Direction, Query, RenderError, RenderIssue, Statement,
};
pub use model::{Model, ModelDescriptor};
pub use predicate::WherePart;
pub use value::{TypeTag, Value};
