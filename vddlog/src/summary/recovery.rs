//! Repair of suite summaries cut off mid-write.
//!
//! The producing run appends to the summary as tests finish, so a crash
//! leaves a prefix of a valid document. Repair cuts back to the last closing
//! tag boundary we recognise and closes the remaining structure, adding a
//! `<truncated/>` marker so the rest of the pipeline knows data may be missing.

use quick_xml::escape::escape;

/// Closing tags, innermost first. A cut at one of them is completed by
/// appending it and every tag after it.
const CLOSING_TAGS: [&str; 3] = ["</test>", "</suite>", "</data>"];

/// Marker inserted before the final `</data>`.
pub const TRUNCATED_MARKER: &str = "<truncated/>";

/// Document synthesized for an empty summary file.
#[must_use]
pub fn synthesize_empty(file_name: &str) -> String {
    format!(
        "<data>{TRUNCATED_MARKER}<suite><suitefile>{}</suitefile></suite></data>\n",
        escape(file_name)
    )
}

/// Index into [`CLOSING_TAGS`] of the tag starting at `text[at..]`, if any.
fn closing_tag_at(text: &str, at: usize) -> Option<usize> {
    let rest = text.get(at..)?;
    CLOSING_TAGS.iter().position(|tag| rest.starts_with(tag))
}

/// Close the document from the tag at `CLOSING_TAGS[from]` onwards.
fn closing_suffix(from: usize) -> String {
    let mut suffix = String::new();
    for tag in CLOSING_TAGS.iter().skip(from) {
        if *tag == "</data>" {
            suffix.push_str(TRUNCATED_MARKER);
        }
        suffix.push_str(tag);
    }
    suffix
}

/// Best-effort repair of a truncated suite summary.
///
/// Empty (or whitespace-only) input yields a synthesized document naming
/// `file_name`. Otherwise the text is cut at the last `<` that begins one of
/// `</test>`, `</suite>` or `</data>` and the remaining structure is closed.
/// Input with none of those tags is returned unchanged; re-parsing it will
/// fail and the caller gives up on the file.
#[must_use]
pub fn repair_truncated(raw: &str, file_name: &str) -> String {
    if raw.trim().is_empty() {
        return synthesize_empty(file_name);
    }

    let cut = raw
        .char_indices()
        .rev()
        .filter(|(_, c)| *c == '<')
        .find_map(|(at, _)| closing_tag_at(raw, at).map(|tag| (at, tag)));

    match cut {
        Some((at, tag)) => {
            let mut repaired = raw[..at].to_owned();
            repaired.push_str(&closing_suffix(tag));
            repaired.push('\n');
            repaired
        }
        None => raw.to_owned(),
    }
}
