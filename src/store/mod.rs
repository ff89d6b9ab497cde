//! Storage layer - the on-disk property graph
//!
//! All graph state lives behind [`GraphStore`]; there is no ambient global
//! handle. Mutation goes through its typed API only.

pub mod schema;
pub mod sqlite;

pub use sqlite::{
    ClassRow, EdgeDirection, EdgeKind, FileRow, FunctionRow, GraphStore, NeighborRecord,
    StoreStats, VariableRow,
};

pub(crate) use sqlite::{
    insert_call_row, insert_class_row, insert_function_row, insert_import_row,
    insert_var_ref_row, insert_variable_row, link_import_edges_for_file,
    link_inherit_edges_for_file, link_method_edges_for_file, upsert_file_row,
};
