
use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::{ByteBuf, Bytes};
use sha2::{Digest, Sha256};

/// SHA-256 hash bytes.
pub type Hash = [u8; 32];

/// HashTree as defined in the [interface spec](https://internetcomputer.org/docs/current/references/ic-interface-spec#certificate).
///
/// Trees decoded from a certificate own their labels and leaf contents; the
/// replica prunes everything the request did not ask for, so the decoded
/// form is small.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HashTree {
    /// No child nodes; a proof of absence.
    #[default]
    Empty,
    /// Left and right child branches.
    Fork(Box<(HashTree, HashTree)>),
    /// A labeled child node.
    Labeled(Vec<u8>, Box<HashTree>),
    /// A leaf node containing a value.
    Leaf(Vec<u8>),
    /// A branch that has been removed from this view of the tree, but is
    /// not necessarily absent. Carries the root hash of the branch.
    Pruned(Hash),
}

/// Shorthand for [`HashTree::Fork`].
pub fn fork(l: HashTree, r: HashTree) -> HashTree {
    HashTree::Fork(Box::new((l, r)))
}

/// Shorthand for [`HashTree::Labeled`].
pub fn labeled(l: impl Into<Vec<u8>>, t: HashTree) -> HashTree {
    HashTree::Labeled(l.into(), Box::new(t))
}

/// Shorthand for [`HashTree::Leaf`].
pub fn leaf(contents: impl Into<Vec<u8>>) -> HashTree {
    HashTree::Leaf(contents.into())
}

/// Shorthand for [`HashTree::Pruned`].
pub fn pruned(hash: Hash) -> HashTree {
    HashTree::Pruned(hash)
}

/// Identifiably hashes a fork in the branch. Used for hashing [`HashTree::Fork`].
pub fn fork_hash(l: &Hash, r: &Hash) -> Hash {
    let mut h = domain_sep("ic-hashtree-fork");
    h.update(&l[..]);
    h.update(&r[..]);
    h.finalize().into()
}

/// Identifiably hashes a leaf node's data. Used for hashing [`HashTree::Leaf`].
pub fn leaf_hash(data: &[u8]) -> Hash {
    let mut h = domain_sep("ic-hashtree-leaf");
    h.update(data);
    h.finalize().into()
}

/// Identifiably hashes a label for this branch. Used for hashing [`HashTree::Labeled`].
pub fn labeled_hash(label: &[u8], content_hash: &Hash) -> Hash {
    let mut h = domain_sep("ic-hashtree-labeled");
    h.update(label);
    h.update(&content_hash[..]);
    h.finalize().into()
}

impl HashTree {
    /// Produces the root hash of the tree.
    pub fn reconstruct(&self) -> Hash {
        match self {
            Self::Empty => domain_sep("ic-hashtree-empty").finalize().into(),
            Self::Fork(f) => fork_hash(&f.0.reconstruct(), &f.1.reconstruct()),
            Self::Labeled(l, t) => {
                let thash = t.reconstruct();
                labeled_hash(l, &thash)
            }
            Self::Leaf(data) => leaf_hash(data),
            Self::Pruned(h) => *h,
        }
    }
}

/// Returns the non-fork nodes reachable from `tree` through forks alone,
/// left to right. A `Fork` never appears in the result.
pub fn flatten_forks(tree: &HashTree) -> Vec<&HashTree> {
    fn go<'a>(out: &mut Vec<&'a HashTree>, tree: &'a HashTree) {
        match tree {
            HashTree::Fork(f) => {
                go(out, &f.0);
                go(out, &f.1);
            }
            other => out.push(other),
        }
    }
    let mut out = Vec::new();
    go(&mut out, tree);
    out
}

impl Serialize for HashTree {
    fn serialize<S>(&self, serializer: S) -> Result<<S as Serializer>::Ok, <S as Serializer>::Error>
    where
        S: Serializer,
    {
        match self {
            HashTree::Empty => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&0u8)?;
                seq.end()
            }
            HashTree::Fork(p) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&1u8)?;
                seq.serialize_element(&p.0)?;
                seq.serialize_element(&p.1)?;
                seq.end()
            }
            HashTree::Labeled(label, tree) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&2u8)?;
                seq.serialize_element(Bytes::new(label))?;
                seq.serialize_element(&tree)?;
                seq.end()
            }
            HashTree::Leaf(leaf_bytes) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&3u8)?;
                seq.serialize_element(Bytes::new(leaf_bytes))?;
                seq.end()
            }
            HashTree::Pruned(digest) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&4u8)?;
                seq.serialize_element(Bytes::new(&digest[..]))?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for HashTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(TreeVisitor)
    }
}

struct TreeVisitor;

impl<'de> Visitor<'de> for TreeVisitor {
    type Value = HashTree;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a hash tree node encoded as a tagged array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<HashTree, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let tag: u8 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        match tag {
            0 => Ok(HashTree::Empty),
            1 => {
                let left: HashTree = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let right: HashTree = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                Ok(fork(left, right))
            }
            2 => {
                let label: ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let tree: HashTree = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                Ok(HashTree::Labeled(label.into_vec(), Box::new(tree)))
            }
            3 => {
                let contents: ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                Ok(HashTree::Leaf(contents.into_vec()))
            }
            4 => {
                let digest: ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let digest: Hash = digest.into_vec().try_into().map_err(|bytes: Vec<u8>| {
                    de::Error::invalid_length(bytes.len(), &"a 32-byte pruned digest")
                })?;
                Ok(HashTree::Pruned(digest))
            }
            other => Err(de::Error::custom(format!(
                "unknown hash tree node tag {other}"
            ))),
        }
    }
}

impl fmt::Display for HashTree {
    /// Renders the tree structure one node per line, indented by depth.
    /// Fork chains are flattened so siblings line up. Diagnostic only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tree(self, f, 0)
    }
}

fn write_tree(tree: &HashTree, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    match tree {
        HashTree::Empty => write!(f, "Empty"),
        HashTree::Fork(_) => {
            write!(f, "Fork")?;
            for child in flatten_forks(tree) {
                writeln!(f)?;
                write_tree(child, f, depth + 1)?;
            }
            Ok(())
        }
        HashTree::Labeled(label, t) => {
            write!(f, "Label({})", label_repr(label))?;
            writeln!(f)?;
            write_tree(t, f, depth + 1)
        }
        HashTree::Leaf(data) => write!(f, "Leaf(0x{})", hex::encode(data)),
        HashTree::Pruned(digest) => write!(f, "Pruned(0x{})", hex::encode(digest)),
    }
}

fn label_repr(label: &[u8]) -> String {
    match std::str::from_utf8(label) {
        Ok(text) if text.chars().all(|c| c.is_ascii_graphic() || c == ' ') => {
            format!("{text:?}")
        }
        _ => format!("0x{}", hex::encode(label)),
    }
}

fn domain_sep(s: &str) -> sha2::Sha256 {
    let buf: [u8; 1] = [s.len() as u8];
    let mut h = Sha256::new();
    h.update(&buf[..]);
    h.update(s.as_bytes());
    h
}
