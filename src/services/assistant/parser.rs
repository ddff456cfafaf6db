//! Heuristic extraction of generated SQL from the raw model reply.
//!
//! The contract is deliberately deterministic: the first well-formed
//! ```` ```sql ```` block wins, no fencing means no SQL, and an unterminated
//! fence yields no SQL. The original reply text is always preserved verbatim.

const FENCE_OPEN: &str = "```sql";
const FENCE_CLOSE: &str = "```";

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub response_text: String,
    pub sql_query: Option<String>,
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let sql_query = raw.find(FENCE_OPEN).and_then(|start| {
        let body = &raw[start + FENCE_OPEN.len()..];
        body.find(FENCE_CLOSE)
            .map(|end| body[..end].trim().to_string())
            .filter(|sql| !sql.is_empty())
    });

    ParsedReply { response_text: raw.to_string(), sql_query }
}
