//! Hop discovery: the prober seam, `traceroute -n` parsing and hop collection.

pub mod collector;
pub mod parser;
pub mod source;
pub mod system;

pub use collector::{collect, is_placeholder, HopCollector};
pub use parser::{
    parse_hop_line, parse_traceroute_n, parse_traceroute_n_with_target, HopLineParser, ParsedHop,
    ParsedTrace,
};
pub use source::{
    validate_target, HopSource, ReplayHopSource, StartError, TraceEvent, TraceSettings,
    EVENT_BUFFER,
};
pub use system::SystemHopSource;
