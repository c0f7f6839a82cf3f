//! Typed wire messages — one record grammar per message kind
//!
//! Grammars are strictly positional and left-to-right, with explicit count
//! fields ahead of every repeated group:
//!
//! StateAdvertisement:
//!   n, then n × peer{ [nodeid?] c o q [utility?] [rtt?] }
//!
//! GraphUpdate:
//!   graphsize, then per task:
//!   task{ name type caller inputsize, n × input{ name size },
//!         outputsize, n × output{ name size }, thunk duration }
//!
//! Execution parameters (optional request payload):
//!   [duration?]

use super::frame::{MessageKind, WireFrame};
use super::record::{RecordReader, RecordWriter};
use super::WireError;
use crate::NodeId;

/// Maximum encoded message payload. The frame body is length-prefixed with
/// a u16 and carries the kind byte alongside the payload, so anything that
/// passes this cap is guaranteed to frame.
pub const MAX_PAYLOAD: usize = u16::MAX as usize - 1;

/// Upper bound on per-message repeated groups. A peer set is expected to
/// stay in the tens; a count past this is a corrupt or hostile payload.
const MAX_COUNT: u64 = 1024;

fn check_size(payload: &[u8]) -> Result<(), WireError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::Oversize {
            got: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

fn check_count(key: &str, declared: u64) -> Result<usize, WireError> {
    if declared > MAX_COUNT {
        return Err(WireError::CountOutOfRange {
            key: key.to_string(),
            declared,
            max: MAX_COUNT,
        });
    }
    Ok(declared as usize)
}

// ============================================================================
// STATE ADVERTISEMENT
// ============================================================================

/// One peer's resource/latency metrics inside an advertisement.
///
/// `node_id` is absent when the report describes the advertisement's sender
/// itself; `utility`/`rtt` are absent in plain core-count reports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerReport {
    pub node_id: Option<NodeId>,
    pub cores: u32,
    pub occupied_cores: u32,
    pub queued_jobs: u32,
    pub utility: Option<u32>,
    pub rtt: Option<i64>,
}

/// Periodic gossip advertisement carrying one report per known node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StateAdvertisement {
    pub reports: Vec<PeerReport>,
}

impl StateAdvertisement {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut writer = RecordWriter::new();
        writer.field_u64("n", self.reports.len() as u64)?;
        for report in &self.reports {
            let mut peer = RecordWriter::new();
            if let Some(id) = report.node_id {
                peer.field_u64("nodeid", id as u64)?;
            }
            peer.field_u64("c", report.cores as u64)?;
            peer.field_u64("o", report.occupied_cores as u64)?;
            peer.field_u64("q", report.queued_jobs as u64)?;
            if let Some(utility) = report.utility {
                peer.field_u64("utility", utility as u64)?;
            }
            if let Some(rtt) = report.rtt {
                peer.field_i64("rtt", rtt)?;
            }
            writer.nested("peer", peer)?;
        }
        let payload = writer.finish();
        check_size(&payload)?;
        Ok(payload)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        check_size(payload)?;
        let mut reader = RecordReader::new(payload);
        let count = check_count("n", reader.field_u64("n")?)?;

        let mut reports = Vec::with_capacity(count);
        for _ in 0..count {
            let mut peer = reader.nested("peer")?;
            let node_id = peer.try_field_u32("nodeid")?;
            let cores = peer.field_u32("c")?;
            let occupied_cores = peer.field_u32("o")?;
            let queued_jobs = peer.field_u32("q")?;
            let utility = peer.try_field_u32("utility")?;
            let rtt = peer.try_field_i64("rtt")?;
            reports.push(PeerReport {
                node_id,
                cores,
                occupied_cores,
                queued_jobs,
                utility,
                rtt,
            });
        }
        Ok(Self { reports })
    }

    pub fn to_frame(&self) -> Result<WireFrame, WireError> {
        Ok(WireFrame::new(MessageKind::StateAdvert, self.encode()?))
    }

    pub fn from_frame(frame: &WireFrame) -> Result<Self, WireError> {
        if frame.kind != MessageKind::StateAdvert {
            return Err(WireError::InvalidKind(frame.kind.as_u8()));
        }
        Self::decode(&frame.payload)
    }
}

// ============================================================================
// GRAPH UPDATE
// ============================================================================

/// Named data dependency of a task declaration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DataDecl {
    pub name: String,
    pub size: u64,
}

/// One task declaration inside a graph update.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskDecl {
    pub name: String,
    pub kind: u32,
    pub caller: String,
    pub inputs: Vec<DataDecl>,
    pub outputs: Vec<DataDecl>,
    pub thunk: String,
    pub duration: u64,
}

/// One graph generation: a complete set of task declarations.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphUpdate {
    pub tasks: Vec<TaskDecl>,
}

fn encode_data_list(
    writer: &mut RecordWriter,
    count_key: &str,
    entry_key: &str,
    entries: &[DataDecl],
) -> Result<(), WireError> {
    writer.field_u64(count_key, entries.len() as u64)?;
    for entry in entries {
        let mut inner = RecordWriter::new();
        inner.field_str("name", &entry.name)?;
        inner.field_u64("size", entry.size)?;
        writer.nested(entry_key, inner)?;
    }
    Ok(())
}

fn decode_data_list(
    reader: &mut RecordReader<'_>,
    count_key: &str,
    entry_key: &str,
) -> Result<Vec<DataDecl>, WireError> {
    let count = check_count(count_key, reader.field_u64(count_key)?)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let mut inner = reader.nested(entry_key)?;
        entries.push(DataDecl {
            name: inner.field_str("name")?.to_string(),
            size: inner.field_u64("size")?,
        });
    }
    Ok(entries)
}

impl GraphUpdate {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut writer = RecordWriter::new();
        writer.field_u64("graphsize", self.tasks.len() as u64)?;
        for task in &self.tasks {
            let mut inner = RecordWriter::new();
            inner.field_str("name", &task.name)?;
            inner.field_u64("type", task.kind as u64)?;
            inner.field_str("caller", &task.caller)?;
            encode_data_list(&mut inner, "inputsize", "input", &task.inputs)?;
            encode_data_list(&mut inner, "outputsize", "output", &task.outputs)?;
            inner.field_str("thunk", &task.thunk)?;
            inner.field_u64("duration", task.duration)?;
            writer.nested("task", inner)?;
        }
        let payload = writer.finish();
        check_size(&payload)?;
        Ok(payload)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        check_size(payload)?;
        let mut reader = RecordReader::new(payload);
        let count = check_count("graphsize", reader.field_u64("graphsize")?)?;

        let mut tasks = Vec::with_capacity(count);
        for _ in 0..count {
            let mut inner = reader.nested("task")?;
            let name = inner.field_str("name")?.to_string();
            let kind = inner.field_u32("type")?;
            let caller = inner.field_str("caller")?.to_string();
            let inputs = decode_data_list(&mut inner, "inputsize", "input")?;
            let outputs = decode_data_list(&mut inner, "outputsize", "output")?;
            let thunk = inner.field_str("thunk")?.to_string();
            let duration = inner.field_u64("duration")?;
            tasks.push(TaskDecl {
                name,
                kind,
                caller,
                inputs,
                outputs,
                thunk,
                duration,
            });
        }
        Ok(Self { tasks })
    }

    pub fn to_frame(&self) -> Result<WireFrame, WireError> {
        Ok(WireFrame::new(MessageKind::GraphUpdate, self.encode()?))
    }

    pub fn from_frame(frame: &WireFrame) -> Result<Self, WireError> {
        if frame.kind != MessageKind::GraphUpdate {
            return Err(WireError::InvalidKind(frame.kind.as_u8()));
        }
        Self::decode(&frame.payload)
    }
}

// ============================================================================
// EXECUTION PARAMETERS
// ============================================================================

/// Encode the optional execution-request payload.
pub fn encode_exec_params(duration: Option<u64>) -> Result<Vec<u8>, WireError> {
    let mut writer = RecordWriter::new();
    if let Some(duration) = duration {
        writer.field_u64("duration", duration)?;
    }
    Ok(writer.finish())
}

/// Decode the optional execution-request payload. An empty payload is
/// valid and carries no declared duration.
pub fn decode_exec_params(payload: &[u8]) -> Result<Option<u64>, WireError> {
    check_size(payload)?;
    let mut reader = RecordReader::new(payload);
    let duration = match reader.try_field("duration")? {
        None => None,
        Some(value) => {
            let text = std::str::from_utf8(value).map_err(|_| WireError::BadText {
                key: "duration".to_string(),
            })?;
            Some(text.parse().map_err(|_| WireError::BadNumber {
                key: "duration".to_string(),
                value: text.to_string(),
            })?)
        }
    };
    Ok(duration)
}
