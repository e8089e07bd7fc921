//! Chain-head election among online nodes.
//!
//! Every online node reports the block it considers its head. The head the
//! network follows is elected by majority, with ties broken level by level:
//!
//! 1. most nodes reporting the block
//! 2. most distinct recent issuers (not tracked yet, passes every candidate)
//! 3. highest `pow_min`
//! 4. latest `time`
//!
//! A tie that survives all four levels goes to the lowest hash, so the
//! outcome never depends on the order nodes were polled in.

use wotcrawl_types::{BlockHead, NodeState};

/// One distinct reported head and how many nodes report it.
#[derive(Clone, Debug)]
struct Candidate<'a> {
    head: &'a BlockHead,
    count: usize,
}

/// Elect the network head among the reported blocks, or `None` when no
/// block was reported at all.
pub fn elect_head<'a, I>(heads: I) -> Option<&'a BlockHead>
where
    I: IntoIterator<Item = &'a BlockHead>,
{
    let mut candidates: Vec<Candidate<'a>> = Vec::new();
    for head in heads {
        match candidates.iter_mut().find(|c| c.head.hash == head.hash) {
            Some(candidate) => candidate.count += 1,
            None => candidates.push(Candidate { head, count: 1 }),
        }
    }

    let candidates = keep_max(candidates, |c| c.count);
    let candidates = most_distinct_issuers(candidates);
    let candidates = keep_max(candidates, |c| c.head.pow_min);
    let candidates = keep_max(candidates, |c| c.head.time);

    candidates
        .into_iter()
        .min_by(|a, b| a.head.hash.cmp(&b.head.hash))
        .map(|c| c.head)
}

/// Distinct-issuer tie-break. Nodes do not report the issuers of their last
/// blocks, so there is nothing to compare and every candidate stays tied.
fn most_distinct_issuers(candidates: Vec<Candidate<'_>>) -> Vec<Candidate<'_>> {
    candidates
}

fn keep_max<'a, K: Ord>(
    candidates: Vec<Candidate<'a>>,
    key: impl Fn(&Candidate<'a>) -> K,
) -> Vec<Candidate<'a>> {
    let Some(best) = candidates.iter().map(&key).max() else {
        return candidates;
    };
    candidates.into_iter().filter(|c| key(c) == best).collect()
}

/// New state of each online node given the reported blocks.
///
/// `blocks[i]` is the head reported by the i-th online node; the result is
/// parallel to it. Nodes on the elected head are online, every other node is
/// desynced. If no node reports a block, all of them are online.
pub fn reconcile(blocks: &[Option<&BlockHead>]) -> Vec<NodeState> {
    let Some(winner) = elect_head(blocks.iter().flatten().copied()) else {
        return vec![NodeState::Online; blocks.len()];
    };
    blocks
        .iter()
        .map(|block| match block {
            Some(head) if head.hash == winner.hash => NodeState::Online,
            _ => NodeState::Desynced,
        })
        .collect()
}
