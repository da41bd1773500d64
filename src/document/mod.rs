//! Plain-text model of a word-processing document and token substitution
//! over it.

use std::borrow::Cow;

use crate::model::TokenMap;

/// Where a paragraph lives in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Body,
    TableCell,
    Header,
    Footer,
}

/// A paragraph as the ordered text of its runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub region: Region,
    pub runs: Vec<String>,
}

impl Paragraph {
    pub fn new(region: Region, runs: Vec<String>) -> Self {
        Self { region, runs }
    }

    /// Concatenated text of every run.
    pub fn text(&self) -> String {
        self.runs.concat()
    }
}

/// The paragraphs stored in one package part (main body, a header, a footer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub part: String,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentModel {
    pub stories: Vec<Story>,
}

impl DocumentModel {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.stories.iter().flat_map(|story| story.paragraphs.iter())
    }

    /// Text of every paragraph, one per line.
    pub fn text(&self) -> String {
        self.paragraphs()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns `true` when both models have the same stories, paragraphs and
    /// run counts, so one can be written back in place of the other.
    pub fn has_same_layout(&self, other: &DocumentModel) -> bool {
        self.stories.len() == other.stories.len()
            && self.stories.iter().zip(&other.stories).all(|(lhs, rhs)| {
                lhs.part == rhs.part
                    && lhs.paragraphs.len() == rhs.paragraphs.len()
                    && lhs
                        .paragraphs
                        .iter()
                        .zip(&rhs.paragraphs)
                        .all(|(lhs, rhs)| lhs.runs.len() == rhs.runs.len())
            })
    }
}

/// Returns a copy of `document` with every token replaced in every paragraph.
///
/// Replacement stays local to the runs a token covers: the run holding the
/// token's first character receives the value, the matched text is removed
/// from the other runs it spans, and every other run keeps its text.
/// Unchanged paragraphs are copied as they are.
pub fn substitute(document: &DocumentModel, tokens: &TokenMap) -> DocumentModel {
    let stories = document
        .stories
        .iter()
        .map(|story| Story {
            part: story.part.clone(),
            paragraphs: story
                .paragraphs
                .iter()
                .map(|paragraph| substitute_paragraph(paragraph, tokens))
                .collect(),
        })
        .collect();
    DocumentModel { stories }
}

fn substitute_paragraph(paragraph: &Paragraph, tokens: &TokenMap) -> Paragraph {
    let text = paragraph.text();
    let matches = find_tokens(&text, tokens);
    if matches.is_empty() {
        return paragraph.clone();
    }

    let mut runs = Vec::with_capacity(paragraph.runs.len());
    let mut run_start = 0;
    for run in &paragraph.runs {
        let run_end = run_start + run.len();
        let mut updated = String::with_capacity(run.len());
        let mut position = run_start;
        for found in matches
            .iter()
            .filter(|found| found.start < run_end && found.end > run_start)
        {
            if found.start >= run_start {
                updated.push_str(&text[position..found.start]);
                updated.push_str(found.value);
            }
            position = position.max(found.end.min(run_end));
        }
        updated.push_str(&text[position..run_end]);
        runs.push(updated);
        run_start = run_end;
    }
    Paragraph::new(paragraph.region, runs)
}

/// A token occurrence as a byte range of the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TokenMatch<'t> {
    start: usize,
    end: usize,
    value: &'t str,
}

/// Finds token keys in `text` in a single left-to-right pass.
///
/// At each position the longest matching key wins; matches never overlap.
fn find_tokens<'t>(text: &str, tokens: &'t TokenMap) -> Vec<TokenMatch<'t>> {
    let mut keys: Vec<(&str, &str)> = tokens
        .iter()
        .filter(|(key, _)| !key.is_empty() && text.contains(key))
        .collect();
    if keys.is_empty() {
        return Vec::new();
    }
    keys.sort_by(|lhs, rhs| rhs.0.len().cmp(&lhs.0.len()).then_with(|| lhs.0.cmp(rhs.0)));

    let mut matches = Vec::new();
    let mut position = 0;
    while let Some(rest) = text.get(position..).filter(|rest| !rest.is_empty()) {
        if let Some((key, value)) = keys.iter().find(|(key, _)| rest.starts_with(key)) {
            matches.push(TokenMatch {
                start: position,
                end: position + key.len(),
                value: *value,
            });
            position += key.len();
        } else {
            position += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    matches
}

/// Replaces token keys in `text` using the same matching as [`substitute`].
///
/// Inserted values are not scanned again, so a value containing another
/// placeholder is kept verbatim.
pub fn replace_tokens<'a>(text: &'a str, tokens: &TokenMap) -> Cow<'a, str> {
    let matches = find_tokens(text, tokens);
    if matches.is_empty() {
        return Cow::Borrowed(text);
    }

    let mut output = String::with_capacity(text.len());
    let mut position = 0;
    for found in matches {
        output.push_str(&text[position..found.start]);
        output.push_str(found.value);
        position = found.end;
    }
    output.push_str(&text[position..]);
    Cow::Owned(output)
}
