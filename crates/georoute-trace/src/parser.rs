use anyhow::{anyhow, Result};
use georoute_model::{HopEvent, TIMEOUT_PLACEHOLDER};

/// One numeric `traceroute -n` hop row, continuation lines included.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHop {
    pub ttl: u32,
    pub ip: Option<String>,
    pub rtt_ms: Vec<Option<f64>>,
}

impl ParsedHop {
    /// A row where no probe got an answer is reported with the timeout placeholder.
    pub fn into_event(self) -> HopEvent {
        HopEvent {
            ttl: self.ttl,
            address: self.ip.unwrap_or_else(|| TIMEOUT_PLACEHOLDER.to_string()),
            rtt_ms: self.rtt_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrace {
    pub target: String,
    pub hops: Vec<HopEvent>,
}

/// Incremental parser for `traceroute -n` output.
///
/// A hop is only complete once the next hop row (or the end of output) is
/// seen, because multi-responder hops continue on indented lines.
#[derive(Debug, Default)]
pub struct HopLineParser {
    target: Option<String>,
    current: Option<ParsedHop>,
}

impl HopLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Feeds one line; returns the previous hop when a new hop row starts.
    pub fn feed(&mut self, line: &str) -> Option<HopEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line.to_ascii_lowercase().starts_with("traceroute") {
            if self.target.is_none() {
                self.target = parse_target(line);
            }
            return None;
        }

        let first_token = line.split_whitespace().next()?;

        if first_token.chars().all(|c| c.is_ascii_digit()) {
            return match parse_hop_line(line) {
                Ok(hop) => self.current.replace(hop).map(ParsedHop::into_event),
                Err(err) => {
                    tracing::trace!(line, error = %err, "skipping unparsable hop line");
                    None
                }
            };
        }

        if let Some(hop) = self.current.as_mut() {
            if is_probe_start(first_token) {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                append_probe_tokens(&tokens, &mut hop.ip, &mut hop.rtt_ms);
            }
        }

        None
    }

    /// Flushes the hop still being assembled.
    pub fn finish(&mut self) -> Option<HopEvent> {
        self.current.take().map(ParsedHop::into_event)
    }
}

pub fn parse_traceroute_n(text: &str) -> Result<ParsedTrace> {
    parse_traceroute_n_inner(text, None)
}

pub fn parse_traceroute_n_with_target(text: &str, fallback_target: &str) -> Result<ParsedTrace> {
    parse_traceroute_n_inner(text, Some(fallback_target))
}

fn parse_traceroute_n_inner(text: &str, fallback_target: Option<&str>) -> Result<ParsedTrace> {
    let mut parser = HopLineParser::new();
    let mut hops: Vec<HopEvent> = text.lines().filter_map(|line| parser.feed(line)).collect();
    hops.extend(parser.finish());

    let target = match parser.target {
        Some(value) => value,
        None => fallback_target
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.to_string())
            .ok_or_else(|| anyhow!("missing target in traceroute output"))?,
    };

    Ok(ParsedTrace { target, hops })
}

fn parse_target(line: &str) -> Option<String> {
    if let Some(start) = line.find('(') {
        if let Some(end) = line[start + 1..].find(')') {
            let inside = line[start + 1..start + 1 + end].trim();
            if !inside.is_empty() {
                return Some(inside.to_string());
            }
        }
    }

    let lower = line.to_ascii_lowercase();
    let idx = lower.find("traceroute to ")?;
    let token = line[idx + "traceroute to ".len()..]
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub fn parse_hop_line(line: &str) -> Result<ParsedHop> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let first = tokens.first().ok_or_else(|| anyhow!("empty hop line"))?;

    let ttl: u32 = first
        .parse()
        .map_err(|_| anyhow!("invalid ttl token: {first}"))?;

    let mut ip: Option<String> = None;
    let mut rtt_ms: Vec<Option<f64>> = Vec::new();

    append_probe_tokens(&tokens[1..], &mut ip, &mut rtt_ms);

    Ok(ParsedHop { ttl, ip, rtt_ms })
}

// Only the first responder of a hop is kept; later ones still contribute RTTs.
fn append_probe_tokens(tokens: &[&str], ip: &mut Option<String>, rtt_ms: &mut Vec<Option<f64>>) {
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];

        if tok == "*" {
            rtt_ms.push(None);
            i += 1;
            continue;
        }

        // !H, !N, !X and friends
        if tok.starts_with('!') {
            i += 1;
            continue;
        }

        if is_ip_token(tok) {
            if ip.is_none() {
                *ip = Some(tok.to_string());
            }
            i += 1;
            continue;
        }

        let next = tokens.get(i + 1).copied();
        if let Some((val, consumed_next)) = parse_rtt(tok, next) {
            rtt_ms.push(Some(val));
            i += if consumed_next { 2 } else { 1 };
            continue;
        }

        i += 1;
    }
}

fn is_probe_start(token: &str) -> bool {
    token == "*" || is_ip_token(token)
}

fn is_ip_token(token: &str) -> bool {
    if token.ends_with("ms") {
        return false;
    }

    is_ipv4(token) || is_ipv6(token)
}

fn is_ipv4(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.len() <= 3
                && part.chars().all(|c| c.is_ascii_digit())
                && part.parse::<u8>().is_ok()
        })
}

fn is_ipv6(token: &str) -> bool {
    token.contains(':') && token.chars().all(|c| c.is_ascii_hexdigit() || c == ':')
}

fn parse_rtt(token: &str, next: Option<&str>) -> Option<(f64, bool)> {
    if let Some(num) = token.strip_suffix("ms") {
        if let Ok(val) = num.parse::<f64>() {
            return valid_rtt(val).map(|val| (val, false));
        }
    }

    let val = token.parse::<f64>().ok()?;
    match next {
        Some(next_tok) if next_tok.starts_with("ms") => valid_rtt(val).map(|val| (val, true)),
        _ => None,
    }
}

fn valid_rtt(val: f64) -> Option<f64> {
    (val.is_finite() && val >= 0.0).then_some(val)
}
