//! JSON bodies as a node serves them, for scripting [`NullTransport`](crate::NullTransport).

/// A block from `/blockchain/current` or `/blockchain/block/{n}`.
pub fn block(number: u64, hash: &str, pow_min: u32, time: u64) -> String {
    format!(
        r#"{{"version":10,"currency":"g1","number":{number},"hash":"{hash}","medianTime":{time},"time":{time},"powMin":{pow_min},"issuer":""}}"#
    )
}

/// `/node/summary`.
pub fn summary(software: &str, version: &str, fork_window: u64) -> String {
    format!(
        r#"{{"duniter":{{"software":"{software}","version":"{version}","forkWindowSize":{fork_window}}}}}"#
    )
}

/// Unsigned raw text of a peer document.
pub fn peer_raw(currency: &str, pubkey: &str, endpoints: &[&str]) -> String {
    let mut raw = format!(
        "Version: 10\nType: Peer\nCurrency: {currency}\nPublicKey: {pubkey}\nBlock: 0-E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855\nEndpoints:\n"
    );
    for endpoint in endpoints {
        raw.push_str(endpoint);
        raw.push('\n');
    }
    raw
}

/// A peer from `/network/peering` or `/ws/peer`.
pub fn peer(currency: &str, pubkey: &str, endpoints: &[&str]) -> String {
    format!(
        r#"{{"pubkey":"{pubkey}","raw":"{}","signature":"c2lnbmF0dXJl"}}"#,
        peer_raw(currency, pubkey, endpoints).replace('\n', "\\n")
    )
}

/// `/network/peering/peers?leaves=true`.
pub fn merkle(root: &str, leaves: &[&str]) -> String {
    let leaves = leaves
        .iter()
        .map(|l| format!("\"{l}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"{{"depth":1,"nodesCount":0,"leavesCount":0,"root":"{root}","leaves":[{leaves}]}}"#
    )
}

/// `/network/peering/peers?leaf={hash}`, wrapping a [`peer`] body.
pub fn leaf(root: &str, hash: &str, peer: &str) -> String {
    format!(r#"{{"root":"{root}","leaf":{{"hash":"{hash}","value":{peer}}}}}"#)
}
