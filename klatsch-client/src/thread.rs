use std::collections::{hash_map, HashMap};

use crate::api::{Comment, CommentId, Error, PostId};

/// One comment with its resolved children, in display order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    pub fn id(&self) -> &CommentId {
        &self.comment.id
    }

    fn find_in<'a>(nodes: &'a [CommentNode], id: &CommentId) -> Option<&'a CommentNode> {
        for n in nodes {
            if n.comment.id == *id {
                return Some(n);
            }
            if let Some(res) = CommentNode::find_in(&n.children, id) {
                return Some(res);
            }
        }
        None
    }

    fn find_in_mut<'a>(
        nodes: &'a mut Vec<CommentNode>,
        id: &CommentId,
    ) -> Option<&'a mut CommentNode> {
        for n in nodes.iter_mut() {
            if n.comment.id == *id {
                return Some(n);
            }
            if let Some(res) = CommentNode::find_in_mut(&mut n.children, id) {
                return Some(res);
            }
        }
        None
    }
}

/// A server response normalized for linking. Wire nesting is drained into
/// encounter order and every record is validated on the way in. Duplicate
/// ids collapse: the last content wins, and the first occurrence keeps its
/// place in the order.
struct Batch {
    order: Vec<CommentId>,
    records: HashMap<CommentId, Comment>,
}

impl Batch {
    fn ingest(comments: impl IntoIterator<Item = Comment>) -> Result<Batch, Error> {
        let mut batch = Batch {
            order: Vec::new(),
            records: HashMap::new(),
        };
        for c in comments {
            batch.push(c)?;
        }
        Ok(batch)
    }

    fn push(&mut self, mut comment: Comment) -> Result<(), Error> {
        comment.validate()?;
        let replies = std::mem::take(&mut comment.replies);
        match self.records.entry(comment.id.clone()) {
            hash_map::Entry::Occupied(mut e) => e.get_mut().content = comment.content,
            hash_map::Entry::Vacant(e) => {
                self.order.push(comment.id.clone());
                e.insert(comment);
            }
        }
        for r in replies {
            self.push(r)?;
        }
        Ok(())
    }
}

// Consuming the record here is what keeps bad parent chains from looping:
// a node can only ever be materialized once.
fn assemble(
    id: &CommentId,
    records: &mut HashMap<CommentId, Comment>,
    children: &HashMap<CommentId, Vec<CommentId>>,
) -> Option<CommentNode> {
    let comment = records.remove(id)?;
    let mut node = CommentNode {
        comment,
        children: Vec::new(),
    };
    if let Some(kids) = children.get(id) {
        for kid in kids {
            if let Some(child) = assemble(kid, records, children) {
                node.children.push(child);
            }
        }
    }
    Some(node)
}

/// The reply forest of a single post.
///
/// Responses in this domain are inconsistently shaped (flat lists, pre-nested
/// trees, or a mix), so everything funnels through one normalization step and
/// a map-then-link pass; the merge operations then work on the one canonical
/// forest. A comment whose parent cannot be resolved is kept visible at the
/// top level rather than dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentTree {
    post_id: PostId,
    roots: Vec<CommentNode>,
}

impl CommentTree {
    /// Builds the forest from the root comments plus any extra records
    /// collected from eager or lazy reply fetches. Single pass to normalize,
    /// single pass to link.
    pub fn build(
        post_id: PostId,
        roots: Vec<Comment>,
        extra: Vec<Comment>,
    ) -> Result<CommentTree, Error> {
        let Batch { order, mut records } = Batch::ingest(roots.into_iter().chain(extra))?;

        let mut children: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
        let mut top: Vec<CommentId> = Vec::new();
        for id in &order {
            let parent = records.get(id).and_then(|c| c.parent_id.clone());
            match parent {
                None => top.push(id.clone()),
                Some(p) if p == *id => {
                    tracing::warn!(
                        comment = %id,
                        "comment declares itself as its own parent, keeping it top-level"
                    );
                    top.push(id.clone());
                }
                Some(p) if records.contains_key(&p) => {
                    children.entry(p).or_default().push(id.clone())
                }
                Some(p) => {
                    tracing::warn!(
                        comment = %id,
                        parent = %p,
                        "parent not loaded, keeping comment top-level"
                    );
                    top.push(id.clone());
                }
            }
        }

        let mut forest = Vec::with_capacity(top.len());
        for id in &top {
            if let Some(node) = assemble(id, &mut records, &children) {
                forest.push(node);
            }
        }
        // Records never consumed sat in a parent cycle; surface the chain
        // from its first-encountered member instead of losing it.
        for id in &order {
            if records.contains_key(id) {
                tracing::warn!(comment = %id, "comment caught in a reply cycle, keeping it top-level");
                if let Some(node) = assemble(id, &mut records, &children) {
                    forest.push(node);
                }
            }
        }

        Ok(CommentTree {
            post_id,
            roots: forest,
        })
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    pub fn roots(&self) -> &[CommentNode] {
        &self.roots
    }

    pub fn get(&self, id: &CommentId) -> Option<&CommentNode> {
        CommentNode::find_in(&self.roots, id)
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.get(id).is_some()
    }

    /// Every comment in the forest, depth-first in display order.
    pub fn comments(&self) -> Vec<&Comment> {
        fn walk<'a>(nodes: &'a [CommentNode], out: &mut Vec<&'a Comment>) {
            for n in nodes {
                out.push(&n.comment);
                walk(&n.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.roots, &mut out);
        out
    }

    pub fn len(&self) -> usize {
        fn count(nodes: &[CommentNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        count(&self.roots)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Merges one freshly created reply under `parent`, wherever that node
    /// currently sits. An unknown parent keeps the reply visible at the top
    /// level; a reply whose id is already known only refreshes its content.
    pub fn merge_reply(&mut self, parent: &CommentId, comment: Comment) -> Result<(), Error> {
        let batch = Batch::ingest([comment])?;
        self.attach_under(parent, batch);
        Ok(())
    }

    /// Merges a lazily fetched batch of replies for `parent`. The batch may
    /// be flat or carry its own nesting; replaying the same batch is a no-op
    /// apart from content refreshes, so a superseded fetch landing late does
    /// no harm.
    pub fn merge_fetched_replies(
        &mut self,
        parent: &CommentId,
        replies: Vec<Comment>,
    ) -> Result<(), Error> {
        let batch = Batch::ingest(replies)?;
        self.attach_under(parent, batch);
        Ok(())
    }

    /// Puts a freshly created top-level comment first, the way the feed
    /// shows it.
    pub fn prepend_root(&mut self, mut comment: Comment) -> Result<(), Error> {
        comment.validate()?;
        let replies = std::mem::take(&mut comment.replies);
        match CommentNode::find_in_mut(&mut self.roots, &comment.id) {
            Some(existing) => existing.comment.content = comment.content,
            None => {
                let id = comment.id.clone();
                self.roots.insert(
                    0,
                    CommentNode {
                        comment,
                        children: Vec::new(),
                    },
                );
                if !replies.is_empty() {
                    self.merge_fetched_replies(&id, replies)?;
                }
            }
        }
        Ok(())
    }

    /// Replaces one comment's text in place; everything else about the node
    /// (and the rest of the forest) stays untouched. Whether the acting user
    /// may edit this comment is the caller's concern.
    pub fn update_content(&mut self, id: &CommentId, content: String) -> Result<Comment, Error> {
        match CommentNode::find_in_mut(&mut self.roots, id) {
            Some(node) => {
                node.comment.content = content;
                Ok(node.comment.clone())
            }
            None => Err(Error::CommentNotFound(id.clone())),
        }
    }

    fn attach_under(&mut self, target: &CommentId, batch: Batch) {
        let Batch { order, mut records } = batch;

        // Ids already known anywhere in the forest only refresh content and
        // keep their place; this is what absorbs optimistic same-id merges.
        let mut fresh: Vec<CommentId> = Vec::with_capacity(order.len());
        for id in &order {
            let incoming = match records.remove(id) {
                Some(c) => c,
                None => continue,
            };
            match CommentNode::find_in_mut(&mut self.roots, id) {
                Some(existing) => existing.comment.content = incoming.content,
                None => {
                    fresh.push(id.clone());
                    records.insert(id.clone(), incoming);
                }
            }
        }

        // Link fresh records among themselves where the batch carries its
        // own structure; everything else is placed individually below.
        let mut children: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
        let mut loose: Vec<(CommentId, Option<CommentId>)> = Vec::new();
        for id in &fresh {
            let parent = records.get(id).and_then(|c| c.parent_id.clone());
            match parent {
                Some(p) if p != *id && records.contains_key(&p) => {
                    children.entry(p).or_default().push(id.clone())
                }
                other => loose.push((id.clone(), other)),
            }
        }

        for (id, parent) in loose {
            let node = match assemble(&id, &mut records, &children) {
                Some(node) => node,
                None => continue,
            };
            self.place(node, parent.as_ref(), target);
        }
        // Leftovers sat in a parent cycle inside the batch.
        for id in fresh {
            if records.contains_key(&id) {
                tracing::warn!(
                    comment = %id,
                    "comment caught in a reply cycle, attaching it to the fetch target"
                );
                if let Some(node) = assemble(&id, &mut records, &children) {
                    self.place(node, None, target);
                }
            }
        }
    }

    // Placement rules for a fresh node: its own declared parent if that node
    // is loaded, else the comment the batch was fetched for, else top-level.
    fn place(&mut self, node: CommentNode, parent: Option<&CommentId>, target: &CommentId) {
        if let Some(p) = parent {
            if *p == node.comment.id {
                tracing::warn!(
                    comment = %node.comment.id,
                    "comment declares itself as its own parent"
                );
            } else if let Some(existing) = CommentNode::find_in_mut(&mut self.roots, p) {
                existing.children.push(node);
                return;
            } else if p != target {
                tracing::warn!(
                    comment = %node.comment.id,
                    parent = %p,
                    "parent not loaded, attaching to the fetch target"
                );
            }
        }
        match CommentNode::find_in_mut(&mut self.roots, target) {
            Some(t) => t.children.push(node),
            None => {
                tracing::warn!(
                    comment = %node.comment.id,
                    target = %target,
                    "fetch target not in forest, keeping comment top-level"
                );
                self.roots.push(node);
            }
        }
    }
}
