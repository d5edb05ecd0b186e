//! Rule matching against parsed transport headers.

use crate::config::{MatchField, RewriteRule};
use crate::protocol::Transport;

/// True when the configured port field of `transport` equals the rule's
/// match port. Protocol gating happens earlier: only TCP and UDP
/// segments reach the classifier.
pub fn matches(transport: &Transport<'_>, field: MatchField, rule: &RewriteRule) -> bool {
    let port = match field {
        MatchField::Source => transport.src_port(),
        MatchField::Destination => transport.dst_port(),
    };
    port == rule.match_port
}
