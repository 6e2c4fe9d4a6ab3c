//! Join graph: aliased relations as vertices, equi-join predicate lists as
//! edges.
//!
//! The analyser seeds each vertex with its scan production, then spans the
//! graph depth-first from the first relation; every tree edge folds the
//! neighbour into a left-deep chain of hash joins. Insertion order is kept
//! so plans are deterministic.

use crate::algebra::logical::LogicalOp;
use crate::plan::expr::Expr;

pub struct Vertex {
    pub production: Option<LogicalOp>,
    pub visited: bool,
}

pub struct Edge {
    pub u: String,
    pub v: String,
    pub conditions: Vec<Expr>,
}

#[derive(Default)]
pub struct JoinGraph {
    names: Vec<String>,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl JoinGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, name: &str, production: LogicalOp) {
        self.names.push(name.to_string());
        self.vertices.push(Vertex {
            production: Some(production),
            visited: false,
        });
    }

    pub fn vertex_mut(&mut self, name: &str) -> Option<&mut Vertex> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(&mut self.vertices[index])
    }

    pub fn first_vertex_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn has_edge(&self, u: &str, v: &str) -> bool {
        self.edges
            .iter()
            .any(|e| (e.u == u && e.v == v) || (e.u == v && e.v == u))
    }

    pub fn add_edge(&mut self, u: &str, v: &str) {
        self.edges.push(Edge {
            u: u.to_string(),
            v: v.to_string(),
            conditions: Vec::new(),
        });
    }

    pub fn edge_conditions_mut(&mut self, u: &str, v: &str) -> Option<&mut Vec<Expr>> {
        self.edges
            .iter_mut()
            .find(|e| (e.u == u && e.v == v) || (e.u == v && e.v == u))
            .map(|e| &mut e.conditions)
    }

    /// Indexes of the edges touching `name`.
    pub fn connected_edges(&self, name: &str) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.u == name || e.v == name)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    pub fn take_edge_conditions(&mut self, index: usize) -> Vec<Expr> {
        std::mem::take(&mut self.edges[index].conditions)
    }

    pub fn all_visited(&self) -> bool {
        self.vertices.iter().all(|v| v.visited)
    }
}
