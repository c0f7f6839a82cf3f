//! Message classification — one authoritative namespace check
//!
//! Every inbound name is classified exactly once, in a fixed priority
//! order (advertisement, then graph update, then execution), so a name
//! matching more than one prefix always lands in the same class on every
//! node.

use crate::NodeId;

/// Namespace under which nodes advertise resource state.
pub const STATE_SCOPE: &str = "/cfn/state";
/// Namespace carrying computation-graph generations.
pub const GRAPH_SCOPE: &str = "/cfn/graph";
/// Namespace of capacity-mode execution requests.
pub const EXEC_SCOPE: &str = "/cfn/exec";
/// Namespace of utility-mode task requests.
pub const TASK_SCOPE: &str = "/cfn/task";

/// The execution-request flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecRequest {
    /// `/cfn/exec/<dst>` — run on a specific node, capacity-checked.
    Exec { dst: NodeId },
    /// `/cfn/task/<cost>` — run wherever `cost` units of utility are free.
    Task { cost: u32 },
}

/// Tagged classification of an inbound message name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageClass {
    /// `/cfn/state/<sender>/<timestamp-ms>`
    Advertisement { sender: NodeId, timestamp_ms: i64 },
    /// `/cfn/graph/update`
    GraphUpdate,
    Execution(ExecRequest),
    Unrecognized,
}

fn scoped<'a>(name: &'a str, scope: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(scope)?;
    rest.strip_prefix('/').or(if rest.is_empty() { Some("") } else { None })
}

/// Classify `name`. Priority order is fixed: advertisement, graph update,
/// execution. A name in none of the scopes, or with unparseable numeric
/// segments, is `Unrecognized` and will be dropped by the engine.
pub fn classify(name: &str) -> MessageClass {
    if let Some(rest) = scoped(name, STATE_SCOPE) {
        let mut parts = rest.splitn(2, '/');
        let sender = parts.next().and_then(|s| s.parse::<NodeId>().ok());
        let timestamp_ms = parts.next().and_then(|s| s.parse::<i64>().ok());
        return match (sender, timestamp_ms) {
            (Some(sender), Some(timestamp_ms)) => MessageClass::Advertisement {
                sender,
                timestamp_ms,
            },
            _ => MessageClass::Unrecognized,
        };
    }

    if let Some(rest) = scoped(name, GRAPH_SCOPE) {
        return if rest == "update" {
            MessageClass::GraphUpdate
        } else {
            MessageClass::Unrecognized
        };
    }

    if let Some(rest) = scoped(name, EXEC_SCOPE) {
        return match rest.split('/').next().and_then(|s| s.parse::<NodeId>().ok()) {
            Some(dst) => MessageClass::Execution(ExecRequest::Exec { dst }),
            None => MessageClass::Unrecognized,
        };
    }

    if let Some(rest) = scoped(name, TASK_SCOPE) {
        return match rest.split('/').next().and_then(|s| s.parse::<u32>().ok()) {
            Some(cost) => MessageClass::Execution(ExecRequest::Task { cost }),
            None => MessageClass::Unrecognized,
        };
    }

    MessageClass::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertisement_name() {
        assert_eq!(
            classify("/cfn/state/7/15300"),
            MessageClass::Advertisement {
                sender: 7,
                timestamp_ms: 15300
            }
        );
    }

    #[test]
    fn test_advertisement_missing_timestamp() {
        assert_eq!(classify("/cfn/state/7"), MessageClass::Unrecognized);
    }

    #[test]
    fn test_graph_update_name() {
        assert_eq!(classify("/cfn/graph/update"), MessageClass::GraphUpdate);
        assert_eq!(classify("/cfn/graph/other"), MessageClass::Unrecognized);
    }

    #[test]
    fn test_exec_name() {
        assert_eq!(
            classify("/cfn/exec/12"),
            MessageClass::Execution(ExecRequest::Exec { dst: 12 })
        );
    }

    #[test]
    fn test_task_name() {
        assert_eq!(
            classify("/cfn/task/5"),
            MessageClass::Execution(ExecRequest::Task { cost: 5 })
        );
    }

    #[test]
    fn test_task_trailing_segments_ignored() {
        assert_eq!(
            classify("/cfn/task/5/params"),
            MessageClass::Execution(ExecRequest::Task { cost: 5 })
        );
    }

    #[test]
    fn test_unrecognized_names() {
        assert_eq!(classify("/cloud/task"), MessageClass::Unrecognized);
        assert_eq!(classify("/cfn"), MessageClass::Unrecognized);
        assert_eq!(classify("/cfn/task/notanumber"), MessageClass::Unrecognized);
        assert_eq!(classify(""), MessageClass::Unrecognized);
    }

    #[test]
    fn test_prefix_must_be_a_whole_segment() {
        // "/cfn/statex/..." is not the state scope.
        assert_eq!(classify("/cfn/statex/7/1"), MessageClass::Unrecognized);
    }

    #[test]
    fn test_priority_order_is_stable() {
        // The scopes are disjoint by construction, but classification is a
        // single pass: the first matching class always wins.
        let class = classify("/cfn/state/3/99");
        assert!(matches!(class, MessageClass::Advertisement { .. }));
    }
}
