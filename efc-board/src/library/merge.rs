//! Library dataset merging
//!
//! Remote-authoritative union: a record present remotely replaces the local
//! record with the same id; local-only records (created offline, not yet
//! synced) are kept. Local order is preserved and remote-only records are
//! appended in remote order, so merging the same snapshot twice is a no-op.

use efc_common::Phrase;
use std::collections::{HashMap, HashSet};

/// Drop repeated ids, keeping the first position and the last value
pub fn dedupe_by_id(phrases: Vec<Phrase>) -> Vec<Phrase> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut result: Vec<Phrase> = Vec::with_capacity(phrases.len());

    for phrase in phrases {
        match positions.get(&phrase.id) {
            Some(&index) => result[index] = phrase,
            None => {
                positions.insert(phrase.id.clone(), result.len());
                result.push(phrase);
            }
        }
    }

    result
}

/// Merge a remote snapshot into the local set
pub fn merge_remote_authoritative(local: &[Phrase], remote: Vec<Phrase>) -> Vec<Phrase> {
    let local = dedupe_by_id(local.to_vec());
    let remote = dedupe_by_id(remote);
    let mut remote_by_id: HashMap<&str, &Phrase> =
        remote.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<Phrase> = Vec::with_capacity(local.len() + remote.len());

    for phrase in &local {
        seen.insert(phrase.id.clone());
        match remote_by_id.remove(phrase.id.as_str()) {
            Some(remote_version) => merged.push(remote_version.clone()),
            None => merged.push(phrase.clone()),
        }
    }

    for phrase in &remote {
        if seen.insert(phrase.id.clone()) {
            merged.push(phrase.clone());
        }
    }

    merged
}

/// Records of `merged` that the remote snapshot does not contain
pub fn local_only<'a>(merged: &'a [Phrase], remote: &[Phrase]) -> Vec<&'a Phrase> {
    let remote_ids: HashSet<&str> = remote.iter().map(|p| p.id.as_str()).collect();
    merged
        .iter()
        .filter(|p| !remote_ids.contains(p.id.as_str()))
        .collect()
}

/// Merge imported records by id; the imported version wins
pub fn merge_imported(current: &[Phrase], imported: Vec<Phrase>) -> Vec<Phrase> {
    merge_remote_authoritative(current, imported)
}
