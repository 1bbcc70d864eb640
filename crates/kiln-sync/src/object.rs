//! Git object encoding and hashing.
//!
//! Object ids are computed exactly as git does: SHA-1 over
//! `"<kind> <len>\0" + body`. The in-memory remote uses these so that its
//! shas match what a real git host would report for the same content.

use sha1::{Digest, Sha1};

/// Mode of a subtree inside a raw tree object (git drops the leading zero).
const RAW_TREE_MODE: &str = "40000";

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeRecord {
    pub name: String,
    pub mode: String,
    pub sha: String,
}

impl TreeRecord {
    pub fn is_tree(&self) -> bool {
        self.mode.trim_start_matches('0') == RAW_TREE_MODE
    }
}

/// Hash a loose object of `kind` with `body`.
pub(crate) fn hash_object(kind: &str, body: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{kind} {}\0", body.len()).as_bytes());
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// The git blob id of `content`.
pub fn blob_sha(content: &[u8]) -> String {
    hash_object("blob", content)
}

/// Serialize tree entries in git's canonical order.
///
/// Git compares names bytewise, with subtree names compared as if they
/// ended in `/`. Returns `None` if a sha is not 40 hex digits.
pub(crate) fn tree_body(records: &[TreeRecord]) -> Option<Vec<u8>> {
    let mut sorted: Vec<&TreeRecord> = records.iter().collect();
    sorted.sort_by_key(|r| sort_key(r));

    let mut body = Vec::new();
    for record in sorted {
        let mode = if record.is_tree() {
            RAW_TREE_MODE
        } else {
            record.mode.as_str()
        };
        body.extend_from_slice(mode.as_bytes());
        body.push(b' ');
        body.extend_from_slice(record.name.as_bytes());
        body.push(0);
        body.extend_from_slice(&decode_hex(&record.sha)?);
    }
    Some(body)
}

pub(crate) fn tree_sha(records: &[TreeRecord]) -> Option<String> {
    tree_body(records).map(|body| hash_object("tree", &body))
}

/// Serialize a commit object.
pub(crate) fn commit_body(tree: &str, parents: &[String], message: &str, timestamp: u64) -> Vec<u8> {
    let mut text = format!("tree {tree}\n");
    for parent in parents {
        text.push_str(&format!("parent {parent}\n"));
    }
    let signature = format!("kiln <kiln@localhost> {timestamp} +0000");
    text.push_str(&format!("author {signature}\ncommitter {signature}\n\n{message}"));
    if !message.ends_with('\n') {
        text.push('\n');
    }
    text.into_bytes()
}

fn sort_key(record: &TreeRecord) -> Vec<u8> {
    let mut key = record.name.as_bytes().to_vec();
    if record.is_tree() {
        key.push(b'/');
    }
    key
}

fn decode_hex(sha: &str) -> Option<[u8; 20]> {
    if sha.len() != 40 {
        return None;
    }
    let mut out = [0u8; 20];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(sha.get(i * 2..i * 2 + 2)?, 16).ok()?;
    }
    Some(out)
}
