//! Comment forest traversal.
//!
//! A forest is an ordered slice of top-level [`Comment`]s, each owning its
//! replies. All searches are pre-order (a node, then its whole subtree, then
//! its next sibling) and the first match wins.

use std::slice;

use crate::model::Comment;

/// Find the first comment with `id`, in pre-order.
pub fn find_comment<'a>(forest: &'a [Comment], id: &str) -> Option<&'a Comment> {
    PreOrder::new(forest)
        .map(|(_, comment)| comment)
        .find(|comment| comment.id == id)
}

/// Mutable counterpart of [`find_comment`].
pub(crate) fn find_comment_mut<'a>(forest: &'a mut [Comment], id: &str) -> Option<&'a mut Comment> {
    for comment in forest.iter_mut() {
        if comment.id == id {
            return Some(comment);
        }
        if let Some(found) = find_comment_mut(&mut comment.children, id) {
            return Some(found);
        }
    }
    None
}

/// Pre-order iterator over a forest, yielding `(depth, comment)`.
///
/// Top-level comments have depth 0.
pub struct PreOrder<'a> {
    stack: Vec<(usize, slice::Iter<'a, Comment>)>,
}

impl<'a> PreOrder<'a> {
    pub fn new(forest: &'a [Comment]) -> Self {
        Self {
            stack: vec![(0, forest.iter())],
        }
    }
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (usize, &'a Comment);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (depth, siblings) = self.stack.last_mut()?;
            let depth = *depth;
            match siblings.next() {
                Some(comment) => {
                    if !comment.children.is_empty() {
                        self.stack.push((depth + 1, comment.children.iter()));
                    }
                    return Some((depth, comment));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
