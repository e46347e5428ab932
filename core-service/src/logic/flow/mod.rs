//! Flow Module - Stateful packet aggregation
//!
//! - `assembler.rs`: flow table, Nth-packet snapshots, idle eviction

pub mod assembler;


pub use assembler::{
    AssemblerStats, Flow, FlowAssembler, FlowSnapshot, FlowSummary, IngestOutcome,
};
