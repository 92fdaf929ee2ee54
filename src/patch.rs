//! Sequential find/replace/insert interpreter for `<editfile>` blocks.
//!
//! Directives run strictly in document order against one decoded text
//! buffer, sharing a cursor and the span of the most recent match. A miss
//! never aborts the block: it is reported and the remaining directives still
//! execute against the unchanged state.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Find { text: String },
    FindUp { text: String, anchor: SearchAnchor },
    Replace { text: String },
    Insert { text: String, placement: Placement },
}

impl Directive {
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Find { .. } => "find",
            Directive::FindUp { .. } => "findup",
            Directive::Replace { .. } => "replace",
            Directive::Insert { .. } => "insert",
        }
    }
}

/// Backward-search bound for `findup`: the current cursor (default) or the
/// end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAnchor {
    Cursor,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// Transient interpreter state, scoped to one block: the forward-search
/// cursor and the span of the active match. Discarded at block exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchState {
    pub cursor: usize,
    pub span: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveStatus {
    Matched,
    Replaced,
    Inserted,
    NoMatch,
    NoActiveMatch,
}

impl DirectiveStatus {
    pub fn is_miss(self) -> bool {
        matches!(self, DirectiveStatus::NoMatch | DirectiveStatus::NoActiveMatch)
    }
}

#[derive(Debug, Clone)]
pub struct DirectiveReport {
    pub index: usize,
    pub kind: &'static str,
    pub status: DirectiveStatus,
}

#[derive(Debug)]
pub struct BlockResult {
    pub text: String,
    pub directives: Vec<DirectiveReport>,
}

impl BlockResult {
    pub fn misses(&self) -> usize {
        self.directives
            .iter()
            .filter(|report| report.status.is_miss())
            .count()
    }

    pub fn applied(&self) -> usize {
        self.directives.len() - self.misses()
    }
}

/// Line-ending style of the buffer at block entry: CRLF if any CRLF sequence
/// is present, LF otherwise. Detected once per block.
pub fn detect_newline(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Rewrites a directive literal to the target buffer's line-ending style.
pub fn normalize_literal(raw: &str, newline: &'static str) -> String {
    let unified = raw.replace("\r\n", "\n");
    if newline == "\n" {
        unified
    } else {
        unified.replace('\n', newline)
    }
}

/// Decodes a working-table buffer: strict UTF-8 first, then the permissive
/// single-byte fallback, which cannot fail.
pub fn decode_buffer(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

pub fn encode_buffer(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Applies one edit block's directives to `text` and returns the mutated
/// buffer plus a per-directive outcome list. Pure over its inputs; all
/// diagnostics are logged and reported, never raised.
pub fn apply_block(text: &str, directives: &[Directive]) -> BlockResult {
    let newline = detect_newline(text);
    let mut text = text.to_string();
    let mut state = MatchState::default();
    let mut reports = Vec::with_capacity(directives.len());

    for (index, directive) in directives.iter().enumerate() {
        let status = match directive {
            Directive::Find { text: raw } => {
                let needle = normalize_literal(raw, newline);
                match text[state.cursor..].find(&needle) {
                    Some(offset) => {
                        let start = state.cursor + offset;
                        let end = start + needle.len();
                        state.span = Some((start, end));
                        state.cursor = end;
                        log::debug!("find: match at {start}");
                        DirectiveStatus::Matched
                    }
                    None => {
                        log::warn!("find: no match for {}", preview(&needle));
                        DirectiveStatus::NoMatch
                    }
                }
            }
            Directive::FindUp { text: raw, anchor } => {
                let needle = normalize_literal(raw, newline);
                let bound = match anchor {
                    SearchAnchor::Cursor => state.cursor,
                    SearchAnchor::End => text.len(),
                };
                match text[..bound].rfind(&needle) {
                    Some(start) => {
                        let end = start + needle.len();
                        state.span = Some((start, end));
                        state.cursor = end;
                        log::debug!("findup: match at {start}");
                        DirectiveStatus::Matched
                    }
                    None => {
                        log::warn!("findup: no match for {}", preview(&needle));
                        DirectiveStatus::NoMatch
                    }
                }
            }
            Directive::Replace { text: raw } => match state.span {
                Some((start, end)) => {
                    let replacement = normalize_literal(raw, newline);
                    text.replace_range(start..end, &replacement);
                    let end = start + replacement.len();
                    state.span = Some((start, end));
                    state.cursor = end;
                    DirectiveStatus::Replaced
                }
                None => {
                    log::warn!("replace: no active match, skipped");
                    DirectiveStatus::NoActiveMatch
                }
            },
            Directive::Insert { text: raw, placement } => match state.span {
                Some((start, end)) => {
                    let insertion = normalize_literal(raw, newline);
                    match placement {
                        Placement::Before => {
                            text.insert_str(start, &insertion);
                            let shift = insertion.len();
                            state.span = Some((start + shift, end + shift));
                            state.cursor += shift;
                        }
                        Placement::After => {
                            text.insert_str(end, &insertion);
                            state.cursor += insertion.len();
                        }
                    }
                    DirectiveStatus::Inserted
                }
                None => {
                    log::warn!("insert: no active match, skipped");
                    DirectiveStatus::NoActiveMatch
                }
            },
        };

        reports.push(DirectiveReport {
            index,
            kind: directive.kind(),
            status,
        });
    }

    BlockResult {
        text,
        directives: reports,
    }
}

fn preview(literal: &str) -> String {
    let flat = literal.replace("\r\n", "\\n").replace('\n', "\\n");
    let mut out: String = flat.chars().take(32).collect();
    if flat.chars().count() > 32 {
        out.push_str("...");
    }
    out
}
