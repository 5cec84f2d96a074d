use std::cmp::Ordering;

use crate::tree::HashTree;

/// Result of searching one level of a tree for a label.
///
/// `Less` and `Greater` describe where the label would sort relative to the
/// labels present in the searched subtree; a fork uses them to bracket a
/// definitive absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelLookupResult<'a> {
    /// The label exists; this is its subtree.
    Found(&'a HashTree),
    /// The label sorts before every label in the subtree.
    Less,
    /// The label sorts after every label in the subtree.
    Greater,
    /// A pruned branch could contain the label.
    Unknown,
    /// The subtree proves the label is absent.
    Absent,
}

/// Result of resolving a path to a leaf value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult<'a> {
    /// The path resolves to a leaf with these contents.
    Found(&'a [u8]),
    /// The path exists but does not name a leaf.
    NoValue,
    /// The tree proves no such path exists.
    Absent,
    /// A pruned branch hides whether the path exists.
    Unknown,
}

/// Result of resolving a path to a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeLookupResult<'a> {
    /// The subtree rooted at the path.
    Found(&'a HashTree),
    /// The tree proves no such path exists.
    Absent,
    /// A pruned branch hides whether the path exists.
    Unknown,
}

/// Searches a subtree for a label.
///
/// Labels compare as unsigned byte strings, positionally, with ties broken
/// by length; this is the order the replica sorts labels in, so a fork can
/// bracket a missing label between a `Greater` on its left branch and a
/// `Less` on its right.
pub fn find_label<'a>(label: &[u8], tree: &'a HashTree) -> LabelLookupResult<'a> {
    use LabelLookupResult::{Absent, Found, Greater, Less, Unknown};
    match tree {
        HashTree::Labeled(node_label, subtree) => match label.cmp(node_label) {
            Ordering::Equal => Found(subtree),
            Ordering::Greater => Greater,
            Ordering::Less => Less,
        },
        HashTree::Fork(f) => match find_label(label, &f.0) {
            // The left branch sorts entirely before the label: the right
            // branch decides, except that a `Less` there means the label
            // falls in the gap between the branches.
            Greater => match find_label(label, &f.1) {
                Less => Absent,
                other => other,
            },
            // Pruning on the left: the right branch can still prove
            // presence or `Greater`, but not absence.
            Unknown => match find_label(label, &f.1) {
                Less => Unknown,
                other => other,
            },
            other => other,
        },
        HashTree::Pruned(_) => Unknown,
        HashTree::Empty | HashTree::Leaf(_) => Absent,
    }
}

/// Resolves a path to the subtree rooted there.
pub fn lookup_subtree<'a>(
    path: &[impl AsRef<[u8]>],
    tree: &'a HashTree,
) -> SubtreeLookupResult<'a> {
    match path.split_first() {
        None => SubtreeLookupResult::Found(tree),
        Some((segment, rest)) => match find_label(segment.as_ref(), tree) {
            LabelLookupResult::Found(subtree) => lookup_subtree(rest, subtree),
            LabelLookupResult::Unknown => SubtreeLookupResult::Unknown,
            LabelLookupResult::Less | LabelLookupResult::Greater | LabelLookupResult::Absent => {
                SubtreeLookupResult::Absent
            }
        },
    }
}

/// Resolves a path to a leaf value.
///
/// Callers that expect a byte-string value get [`LookupResult::NoValue`]
/// when the path names an interior node, so a subtree can never be
/// mistaken for a leaf payload.
pub fn lookup_path<'a>(path: &[impl AsRef<[u8]>], tree: &'a HashTree) -> LookupResult<'a> {
    match lookup_subtree(path, tree) {
        SubtreeLookupResult::Found(HashTree::Leaf(value)) => LookupResult::Found(value),
        SubtreeLookupResult::Found(_) => LookupResult::NoValue,
        SubtreeLookupResult::Absent => LookupResult::Absent,
        SubtreeLookupResult::Unknown => LookupResult::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{fork, labeled, leaf, pruned};

    fn two_labels() -> HashTree {
        fork(labeled(*b"a", leaf(*b"x")), labeled(*b"c", leaf(*b"y")))
    }

    fn pruned_left() -> HashTree {
        fork(pruned([0xaa; 32]), labeled(*b"c", leaf(*b"y")))
    }

    #[test]
    fn found_value() {
        assert_eq!(
            lookup_path(&[b"a"], &two_labels()),
            LookupResult::Found(b"x")
        );
        assert_eq!(
            lookup_path(&[b"c"], &two_labels()),
            LookupResult::Found(b"y")
        );
    }

    #[test]
    fn absent_when_bracketed_by_both_sides() {
        assert_eq!(lookup_path(&[b"b"], &two_labels()), LookupResult::Absent);
    }

    #[test]
    fn unknown_when_pruning_hides_the_bracket() {
        assert_eq!(lookup_path(&[b"b"], &pruned_left()), LookupResult::Unknown);
        // "a" could also live in the pruned branch.
        assert_eq!(lookup_path(&[b"a"], &pruned_left()), LookupResult::Unknown);
    }

    #[test]
    fn absent_past_the_right_edge_even_under_pruning() {
        assert_eq!(lookup_path(&[b"d"], &two_labels()), LookupResult::Absent);
        assert_eq!(lookup_path(&[b"d"], &pruned_left()), LookupResult::Absent);
    }

    #[test]
    fn absent_prefix_makes_extensions_absent() {
        // Tri-valued law: once a prefix is provably absent, no extension
        // of it can be found.
        assert_eq!(
            lookup_path(&[b"b".as_slice(), b"deep".as_slice()], &two_labels()),
            LookupResult::Absent
        );
    }

    #[test]
    fn interior_nodes_have_no_value() {
        let tree = labeled(*b"sub", labeled(*b"leaf", leaf(*b"v")));
        assert_eq!(lookup_path(&[b"sub"], &tree), LookupResult::NoValue);
        assert_eq!(
            lookup_path(&[b"sub".as_slice(), b"leaf".as_slice()], &tree),
            LookupResult::Found(b"v")
        );
    }

    #[test]
    fn empty_path_returns_the_tree_itself() {
        let tree = leaf(*b"v");
        let no_segments: &[&[u8]] = &[];
        assert_eq!(lookup_path(no_segments, &tree), LookupResult::Found(b"v"));
        assert_eq!(
            lookup_subtree(no_segments, &tree),
            SubtreeLookupResult::Found(&tree)
        );
    }

    #[test]
    fn labels_compare_bytewise_with_length_tiebreak() {
        let tree = fork(labeled(*b"ab", leaf(*b"1")), labeled(*b"abc", leaf(*b"2")));
        assert_eq!(
            lookup_path(&[b"ab".as_slice()], &tree),
            LookupResult::Found(b"1")
        );
        assert_eq!(
            lookup_path(&[b"abc".as_slice()], &tree),
            LookupResult::Found(b"2")
        );
        assert_eq!(
            lookup_path(&[b"abb".as_slice()], &tree),
            LookupResult::Absent
        );
    }

    #[test]
    fn lookup_agrees_between_full_and_pruned_forms() {
        let full = fork(
            fork(labeled(*b"a", leaf(*b"x")), labeled(*b"b", leaf(*b"y"))),
            labeled(*b"c", leaf(*b"z")),
        );
        // Prune everything except the path to "c".
        let HashTree::Fork(branches) = &full else {
            unreachable!()
        };
        let pruned_form = fork(pruned(branches.0.reconstruct()), branches.1.clone());

        assert_eq!(pruned_form.reconstruct(), full.reconstruct());
        assert_eq!(
            lookup_path(&[b"c"], &pruned_form),
            LookupResult::Found(b"z")
        );
    }
}
