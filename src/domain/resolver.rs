use crate::domain::edge::ParentEdge;
use crate::domain::error::StoreResult;
use crate::domain::graph::{GraphAssembler, TraversalGraph};
use crate::domain::node::NodeId;
use crate::domain::ports::LineageStore;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Upstream lineage resolver.
///
/// Walks "derived-from" edges backward from a root node, depth first. Output
/// order matches a recursive walk: each edge is emitted right before its
/// parent is expanded. The walk itself is iterative, so deep chains do not
/// grow the call stack.
///
/// Stateless between calls; every call builds its own visited set and output.
pub struct LineageResolver<'a, S: LineageStore + ?Sized> {
    store: &'a S,
    max_depth: Option<usize>,
}

/// A node whose parent edges are being walked.
struct Frame {
    node_id: NodeId,
    depth: usize,
    parents: std::vec::IntoIter<ParentEdge>,
    /// Parents were already walked from a deeper position; their edges are
    /// out already and only the depth is being improved.
    rewalk: bool,
}

/// What the walk knows about a node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seen {
    /// Not in the store.
    Missing,
    /// Emitted at the depth bound; parents not fetched yet.
    AtBound,
    /// Parents walked from this depth.
    Expanded(usize),
}

/// Per-call traversal state.
struct Walk {
    seen: HashMap<NodeId, Seen>,
    out: GraphAssembler,
}

impl<'a, S: LineageStore + ?Sized> LineageResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_depth: None,
        }
    }

    /// Stop expanding nodes that sit `max_depth` hops from the root.
    ///
    /// Hops count along the shortest path the walk finds: a node first met at
    /// the bound is expanded later if a shorter path reaches it. Nodes at the
    /// bound are still emitted, and the result is flagged truncated.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve the full upstream graph reachable from `root`.
    ///
    /// A missing root yields an empty graph. Any store failure aborts the
    /// whole resolution; no partial result is returned.
    pub fn resolve_upstream(&self, root: NodeId) -> StoreResult<TraversalGraph> {
        let mut walk = Walk {
            seen: HashMap::new(),
            out: GraphAssembler::new(),
        };
        let mut stack: Vec<Frame> = Vec::new();

        if let Some(frame) = self.expand(root, 0, &mut walk)? {
            stack.push(frame);
        }

        while let Some(frame) = stack.last_mut() {
            let Some(edge) = frame.parents.next() else {
                stack.pop();
                continue;
            };
            let (target, depth) = (frame.node_id, frame.depth);

            if !frame.rewalk {
                walk.out.push_edge(&edge, target);
            }
            if let Some(next) = self.expand(edge.upstream_id, depth + 1, &mut walk)? {
                stack.push(next);
            }
        }

        if walk.seen.values().any(|s| *s == Seen::AtBound) {
            walk.out.mark_truncated();
        }
        let graph = walk.out.finish();
        debug!(
            root,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            truncated = graph.truncated,
            "resolved upstream lineage"
        );
        Ok(graph)
    }

    fn at_bound(&self, depth: usize) -> bool {
        self.max_depth.is_some_and(|max| depth >= max)
    }

    /// Expand one node reached at `depth`: emit it on first sight, then fetch
    /// its parent edges unless it sits at the depth bound.
    ///
    /// Returns `None` when there is nothing to walk. Without a depth bound
    /// every node is expanded at most once.
    fn expand(&self, id: NodeId, depth: usize, walk: &mut Walk) -> StoreResult<Option<Frame>> {
        let rewalk = match walk.seen.get(&id).copied() {
            None => {
                let Some(node) = self.store.fetch_node(id)? else {
                    trace!(id, "dangling reference");
                    walk.seen.insert(id, Seen::Missing);
                    return Ok(None);
                };
                walk.out.add_node_once(&node);
                false
            }
            Some(Seen::Missing) => return Ok(None),
            Some(Seen::AtBound) => false,
            Some(Seen::Expanded(prev)) if self.max_depth.is_some() && depth < prev => true,
            Some(Seen::Expanded(_)) => {
                trace!(id, "already expanded");
                return Ok(None);
            }
        };

        if self.at_bound(depth) {
            trace!(id, depth, "depth bound reached");
            walk.seen.entry(id).or_insert(Seen::AtBound);
            return Ok(None);
        }

        let parents = self.store.fetch_parent_edges(id)?;
        trace!(id, depth, parents = parents.len(), rewalk, "expanding");
        walk.seen.insert(id, Seen::Expanded(depth));
        Ok(Some(Frame {
            node_id: id,
            depth,
            parents: parents.into_iter(),
            rewalk,
        }))
    }
}
