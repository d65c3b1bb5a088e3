// SPDX-License-Identifier: LGPL-2.1-or-later
use crate::matrix::CscPattern;

/// Column elimination tree of `A(:, col_order)`, i.e. the elimination tree of
/// `(AQ)^T (AQ)` computed without forming the product.
///
/// Nodes are pivot positions: `parent[k]` is the parent of the column placed
/// at position `k`, `None` for roots.
pub fn column_etree(pattern: &CscPattern, col_order: &[usize]) -> Vec<Option<usize>> {
    let n = col_order.len();
    let mut parent: Vec<Option<usize>> = vec![None; n];
    let mut ancestor: Vec<Option<usize>> = vec![None; n];
    // last position seen in each row
    let mut prev: Vec<Option<usize>> = vec![None; pattern.dim.nrows];

    for (k, &j) in col_order.iter().enumerate() {
        for &i in pattern.col(j) {
            let mut node = prev[i];
            // walk from node to the root of its current subtree, compressing the path to k
            while let Some(r) = node {
                if r >= k {
                    break;
                }
                let next = ancestor[r];
                ancestor[r] = Some(k);
                if next.is_none() {
                    parent[r] = Some(k);
                }
                node = next;
            }
            prev[i] = Some(k);
        }
    }
    parent
}

/// Postorder of a forest: children before parents, every subtree contiguous.
/// Children are visited in increasing index so the result is deterministic.
///
/// `post[k]` is the node placed at position `k`.
pub fn postorder(parent: &[Option<usize>]) -> Vec<usize> {
    let n = parent.len();
    let mut head: Vec<Option<usize>> = vec![None; n];
    let mut next: Vec<Option<usize>> = vec![None; n];
    for j in (0..n).rev() {
        if let Some(p) = parent[j] {
            next[j] = head[p];
            head[p] = Some(j);
        }
    }

    let mut post = Vec::with_capacity(n);
    let mut stack = Vec::new();
    for root in (0..n).filter(|&j| parent[j].is_none()) {
        stack.push(root);
        while let Some(&top) = stack.last() {
            match head[top] {
                Some(child) => {
                    head[top] = next[child];
                    stack.push(child);
                }
                None => {
                    stack.pop();
                    post.push(top);
                }
            }
        }
    }
    post
}
