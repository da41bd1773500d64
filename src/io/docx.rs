//! Lifts a `.docx` package into a [`DocumentModel`] and writes an updated
//! model back into a copy of the package.

use quick_xml::events::{BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::document::{DocumentModel, Paragraph, Region, Story};
use crate::error::{Result, ToolError};
use crate::io::package::Package;
use crate::io::xml::{copy_without, push_reference, push_text};

const TAG_PARAGRAPH: QName = QName(b"w:p");
const TAG_TEXT: QName = QName(b"w:t");
const TAG_TABLE_CELL: QName = QName(b"w:tc");
const TAG_RUN: QName = QName(b"w:r");
const TAG_TAB: QName = QName(b"w:tab");
const TAG_BREAK: QName = QName(b"w:br");
const TAG_CARRIAGE_RETURN: QName = QName(b"w:cr");
const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";

/// Location of one `w:t` element inside the story's paragraphs, in document
/// order. `None` marks text outside any paragraph. Tabs and breaks become
/// runs of their own (`\t`, `\n`) without a segment, so they keep their
/// position and are never rewritten.
type Segment = Option<(usize, usize)>;

#[derive(Debug, Clone)]
struct StoryLayout {
    segments: Vec<Segment>,
}

/// A word-processing template held in memory.
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    package: Package,
    model: DocumentModel,
    layouts: Vec<StoryLayout>,
}

impl DocxTemplate {
    /// Reads the main document part and every header and footer it references.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let package = Package::from_bytes(bytes)?;

        let main_part = package
            .relationships("")?
            .into_iter()
            .find(|relationship| relationship.is_kind("officeDocument"))
            .map(|relationship| relationship.target)
            .unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string());

        let mut parts = vec![(main_part.clone(), Region::Body)];
        for relationship in package.relationships(&main_part)? {
            let region = if relationship.is_kind("header") {
                Region::Header
            } else if relationship.is_kind("footer") {
                Region::Footer
            } else {
                continue;
            };
            if !parts.iter().any(|(part, _)| *part == relationship.target) {
                parts.push((relationship.target, region));
            }
        }

        let mut stories = Vec::with_capacity(parts.len());
        let mut layouts = Vec::with_capacity(parts.len());
        for (part, region) in parts {
            let (story, layout) = extract_story(&part, package.required_part(&part)?, region)?;
            stories.push(story);
            layouts.push(layout);
        }
        debug!(story_count = stories.len(), "loaded document template");

        Ok(Self {
            package,
            model: DocumentModel { stories },
            layouts,
        })
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    /// Writes `updated` into a copy of the package. Only parts whose text
    /// changed are rewritten.
    pub fn render(&self, updated: &DocumentModel) -> Result<Vec<u8>> {
        if !self.model.has_same_layout(updated) {
            return Err(ToolError::InvalidPackage(
                "document model does not match the template layout".to_string(),
            ));
        }

        let mut package = self.package.clone();
        for ((original, changed), layout) in self
            .model
            .stories
            .iter()
            .zip(&updated.stories)
            .zip(&self.layouts)
        {
            if original == changed {
                continue;
            }
            let part = package.required_part(&original.part)?;
            let xml = rewrite_story(part, layout, original, changed)?;
            package.replace_part(&original.part, xml)?;
        }
        package.to_bytes()
    }
}

fn extract_story(part: &str, xml: &[u8], region: Region) -> Result<(Story, StoryLayout)> {
    let mut reader = Reader::from_reader(xml);
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut open_paragraphs: Vec<usize> = Vec::new();
    let mut cell_depth = 0usize;
    let mut run_depth = 0usize;
    let mut current: Segment = None;

    let region_here = |cell_depth: usize| match region {
        Region::Body if cell_depth > 0 => Region::TableCell,
        other => other,
    };

    loop {
        match reader.read_event()? {
            Event::Start(element) if element.name() == TAG_PARAGRAPH => {
                open_paragraphs.push(paragraphs.len());
                paragraphs.push(Paragraph::new(region_here(cell_depth), Vec::new()));
            }
            Event::Empty(element) if element.name() == TAG_PARAGRAPH => {
                paragraphs.push(Paragraph::new(region_here(cell_depth), Vec::new()));
            }
            Event::End(element) if element.name() == TAG_PARAGRAPH => {
                open_paragraphs.pop();
            }
            Event::Start(element) if element.name() == TAG_TABLE_CELL => cell_depth += 1,
            Event::End(element) if element.name() == TAG_TABLE_CELL => {
                cell_depth = cell_depth.saturating_sub(1);
            }
            Event::Start(element) if element.name() == TAG_RUN => run_depth += 1,
            Event::End(element) if element.name() == TAG_RUN => {
                run_depth = run_depth.saturating_sub(1);
            }
            Event::Start(element) | Event::Empty(element)
                if run_depth > 0 && fixed_text(element.name()).is_some() =>
            {
                if let (Some(&paragraph), Some(fixed)) =
                    (open_paragraphs.last(), fixed_text(element.name()))
                {
                    paragraphs[paragraph].runs.push(fixed.to_string());
                }
            }
            event @ (Event::Start(_) | Event::Empty(_)) if is_text_start(&event) => {
                let segment = open_paragraphs.last().map(|&paragraph| {
                    let runs = &mut paragraphs[paragraph].runs;
                    runs.push(String::new());
                    (paragraph, runs.len() - 1)
                });
                segments.push(segment);
                if matches!(event, Event::Start(_)) {
                    current = segment;
                }
            }
            Event::End(element) if element.name() == TAG_TEXT => current = None,
            Event::Text(text) => {
                if let Some((paragraph, run)) = current {
                    push_text(&mut paragraphs[paragraph].runs[run], &text)?;
                }
            }
            Event::GeneralRef(reference) => {
                if let Some((paragraph, run)) = current {
                    push_reference(&mut paragraphs[paragraph].runs[run], &reference)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((
        Story {
            part: part.to_string(),
            paragraphs,
        },
        StoryLayout { segments },
    ))
}

/// Plain-text stand-in for run content that is not a `w:t` element.
fn fixed_text(name: QName<'_>) -> Option<&'static str> {
    if name == TAG_TAB {
        Some("\t")
    } else if name == TAG_BREAK || name == TAG_CARRIAGE_RETURN {
        Some("\n")
    } else {
        None
    }
}

fn is_text_start(event: &Event<'_>) -> bool {
    match event {
        Event::Start(element) | Event::Empty(element) => element.name() == TAG_TEXT,
        _ => false,
    }
}

/// Rewrites the `w:t` elements whose text differs between `original` and
/// `updated`; everything else is copied through unchanged.
fn rewrite_story(
    xml: &[u8],
    layout: &StoryLayout,
    original: &Story,
    updated: &Story,
) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut next_segment = 0usize;

    loop {
        let event = reader.read_event()?;
        if is_text_start(&event) {
            let segment = layout.segments.get(next_segment).copied().flatten();
            next_segment += 1;

            let replacement = segment.and_then(|(paragraph, run)| {
                let before = &original.paragraphs[paragraph].runs[run];
                let after = &updated.paragraphs[paragraph].runs[run];
                (before != after).then_some(after.as_str())
            });

            if let (Some(text), Event::Start(element) | Event::Empty(element)) =
                (replacement, &event)
            {
                let mut start = copy_without(element, b"xml:space")?;
                start.push_attribute(("xml:space", "preserve"));

                writer.write_event(Event::Start(start.borrow()))?;
                writer.write_event(Event::Text(BytesText::new(text)))?;
                writer.write_event(Event::End(start.to_end()))?;
                if matches!(event, Event::Start(_)) {
                    reader.read_to_end(element.name())?;
                }
                continue;
            }
        }

        match event {
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    Ok(writer.into_inner())
}
