/// Phrases that mark a reply as prose about the data rather than a query.
pub const DENY_PHRASES: &[&str] = &[
    "the answer is",
    "group c",
    "total exposure of",
    "lowest aggregate",
    "concentration group",
];

const MIN_SQL_LEN: usize = 10;

/// Pull a SQL statement out of a free-text model reply.
///
/// Tried in order: a fenced ```sql block, any fenced block, the lines from
/// the first one starting with SELECT through the first one ending in `;`,
/// and finally the whole reply.
pub fn extract_sql(reply: &str) -> String {
    if let Some(body) = fenced(reply, "```sql") {
        return body;
    }
    if let Some(body) = fenced(reply, "```") {
        return strip_language_tag(&body);
    }

    let mut collected = Vec::new();
    for line in reply.lines().map(str::trim) {
        if collected.is_empty() && !line.to_uppercase().starts_with("SELECT") {
            continue;
        }
        collected.push(line);
        if line.ends_with(';') {
            break;
        }
    }
    if !collected.is_empty() {
        return collected.join("\n");
    }

    reply.trim().to_string()
}

fn fenced(reply: &str, opener: &str) -> Option<String> {
    let start = reply.find(opener)? + opener.len();
    let end = reply[start..].find("```")? + start;
    Some(reply[start..end].trim().to_string())
}

/// Drop a language tag left on the first line of an untyped fence, as in
/// "```postgresql".
fn strip_language_tag(body: &str) -> String {
    match body.split_once('\n') {
        Some((first, rest))
            if !first.trim().is_empty()
                && first.trim().chars().all(|c| c.is_ascii_alphanumeric())
                && !first.trim().eq_ignore_ascii_case("select") =>
        {
            rest.trim().to_string()
        }
        _ => body.to_string(),
    }
}

/// Loose plausibility check on extracted SQL.
pub fn validate_sql(sql: &str) -> bool {
    let upper = sql.trim().to_uppercase();
    let lower = sql.to_lowercase();
    upper.starts_with("SELECT")
        && upper.contains("FROM")
        && sql.len() > MIN_SQL_LEN
        && !DENY_PHRASES.iter().any(|phrase| lower.contains(phrase))
}
