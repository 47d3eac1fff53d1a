//! # Pipelines
//!
//! A [`Pipeline`] is an ordered list of [`Transform`]s applied to one score.
//! Order matters: the built-in styles copy staff 1 into a new staff 2 first,
//! and everything after that works on the three-staff score.
//!
//! ## Built-in Styles
//! - [`Style::ExpandedBass`] - bass written out in full on a new staff, the
//!   shorthand staff hidden and muted
//! - [`Style::Annotated`] - the shorthand staff kept and labelled, the full
//!   voicing on a hidden staff so playback still sounds every note
//! - [`Style::Condensed`] - a single visible staff carrying the labels as a
//!   lead sheet
//!
//! ## Example
//! ```rust
//! use pavia::{Style, Transform};
//!
//! let pipeline = Style::ExpandedBass.pipeline();
//! assert_eq!(pipeline.steps()[0], Transform::CopyStaff { src: 1, tgt: 2 });
//! assert_eq!(pipeline.steps().len(), 7);
//! ```

use crate::error::Result;
use crate::measure::Alignment;
use crate::transform::Transform;
use crate::xml::{self, Element};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    ExpandedBass,
    Annotated,
    Condensed,
}

impl Style {
    pub const ALL: [Style; 3] = [Style::ExpandedBass, Style::Annotated, Style::Condensed];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Style::ExpandedBass => "expanded-bass",
            Style::Annotated => "annotated",
            Style::Condensed => "condensed",
        }
    }

    /// Inserted into output file names.
    pub fn tag(self) -> &'static str {
        match self {
            Style::ExpandedBass => "Expanded Bass",
            Style::Annotated => "Annotated",
            Style::Condensed => "Condensed",
        }
    }

    pub fn banner(self) -> &'static str {
        match self {
            Style::ExpandedBass => {
                "This score was converted by Pavia into the expanded bass style."
            }
            Style::Annotated => "This score was converted by Pavia into the annotated style.",
            Style::Condensed => {
                "This score was converted by Pavia into condensed (lead sheet) style."
            }
        }
    }

    pub fn steps(self) -> Vec<Transform> {
        use Transform::*;
        match self {
            Style::ExpandedBass => vec![
                CopyStaff { src: 1, tgt: 2 },
                CopyClef { src: 1, tgt: 2 },
                ExpandChords { staff: 2 },
                HideStaff { staff: 1 },
                MuteStaff { staff: 1 },
                FixBrackets,
                HideInvisible,
            ],
            Style::Annotated => vec![
                CopyStaff { src: 1, tgt: 2 },
                CopyClef { src: 1, tgt: 2 },
                AnnotateOnly { staff: 1 },
                ExpandChords { staff: 2 },
                HideStaff { staff: 2 },
                MuteStaff { staff: 1 },
                FixBrackets,
                HideInvisible,
            ],
            Style::Condensed => vec![
                CopyStaff { src: 1, tgt: 2 },
                CopyClef { src: 1, tgt: 2 },
                ExpandChords { staff: 2 },
                Condense,
                HideStaff { staff: 1 },
                HideStaff { staff: 2 },
                MuteStaff { staff: 1 },
                HideInvisible,
            ],
        }
    }

    pub fn pipeline(self) -> Pipeline {
        Pipeline::new(self.name(), self.steps())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    name: String,
    steps: Vec<Transform>,
    alignment: Alignment,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Transform>) -> Self {
        Self {
            name: name.into(),
            steps,
            alignment: Alignment::default(),
        }
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Run [`Transform::AddBanner`] before every other step.
    pub fn with_banner(mut self, text: impl Into<String>) -> Self {
        self.steps.insert(0, Transform::AddBanner { text: text.into() });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Transform] {
        &self.steps
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Apply every step in order. The first failure abandons the run.
    pub fn run(&self, root: &mut Element) -> Result<()> {
        for step in &self.steps {
            log::debug!("{}: {}", self.name, step);
            step.apply(root, self.alignment)?;
        }
        Ok(())
    }

    /// Parse a score member, run the pipeline over it and serialize it again.
    pub fn process(&self, content: &[u8]) -> Result<Vec<u8>> {
        let mut root = xml::parse(content)?;
        self.run(&mut root)?;
        xml::serialize(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    const FIXTURE: &str = include_str!("../tests/fixtures/accordion.mscx");

    fn run(style: Style) -> Element {
        let mut root = parse(FIXTURE.as_bytes()).unwrap();
        style.pipeline().with_alignment(Alignment::Strict).run(&mut root).unwrap();
        root
    }

    fn visible(root: &Element) -> Vec<bool> {
        root.children_of("Part", "Staff")
            .iter()
            .map(|staff| {
                staff.first_child("isStaffVisible").map(|v| v.text()) != Some("0".to_string())
            })
            .collect()
    }

    fn labels(staff: &Element) -> Vec<String> {
        staff
            .descendants("StaffText")
            .iter()
            .map(|t| t.first_child("text").unwrap().text())
            .collect()
    }

    #[test]
    fn test_style_names_round_trip() {
        for style in Style::ALL {
            assert_eq!(Style::from_name(style.name()), Some(style));
        }
        assert_eq!(Style::from_name("german"), None);
    }

    #[test]
    fn test_expanded_bass() {
        let root = run(Style::ExpandedBass);
        assert_eq!(visible(&root), vec![true, false, true]);

        let staves = root.children_of("Score", "Staff");
        assert_eq!(staves.len(), 3);
        assert_eq!(labels(staves[2]), vec!["c", "am", "g⁷", "G\nD"]);
        assert!(labels(staves[1]).is_empty());
        // Shorthand staff keeps its markings but is silent
        let marked = staves[1]
            .descendants("Fingering")
            .iter()
            .filter(|f| !f.children.is_empty())
            .count();
        assert_eq!(marked, 3);
        assert!(staves[1].descendants("play").iter().all(|p| p.text() == "0"));
        assert!(staves[2].descendants("play").iter().all(|p| p.text() == "1"));

        let part_staves = root.children_of("Part", "Staff");
        assert_eq!(part_staves[2].first_child("defaultClef").unwrap().text(), "F");
        assert_eq!(root.descendants("bracket").len(), 1);
        assert_eq!(root.descendants("barLineSpan").len(), 2);
        assert_eq!(root.children_of("Score", "showInvisible")[0].text(), "0");
    }

    #[test]
    fn test_annotated() {
        let root = run(Style::Annotated);
        assert_eq!(visible(&root), vec![true, true, false]);
        let staves = root.children_of("Score", "Staff");
        // Staff 1 keeps its markings and gains labels
        assert_eq!(labels(staves[1]), vec!["c", "am", "g⁷", "G\nD"]);
        assert_eq!(staves[1].descendants("Note").len(), 5);
        assert_eq!(labels(staves[2]), vec!["c", "am", "g⁷", "G\nD"]);
        assert_eq!(staves[2].descendants("Note").len(), 5 + 6);
    }

    #[test]
    fn test_condensed() {
        let root = run(Style::Condensed);
        assert_eq!(visible(&root), vec![true, false, false]);
        // No bracket fixing in this style: the original bracket survives
        assert_eq!(root.descendants("bracket")[0].attribute("span"), Some("2"));

        let top = root.children_of("Score", "Staff")[0];
        assert_eq!(labels(top), vec!["c", "am", "g⁷", "G\nD"]);
        let hidden: Vec<_> = top
            .descendants("Rest")
            .into_iter()
            .filter(|r| r.first_child("visible").is_some())
            .collect();
        assert_eq!(hidden.len(), 5);
    }

    #[test]
    fn test_banner_runs_first() {
        let pipeline = Style::Condensed.pipeline().with_banner("hello");
        assert_eq!(pipeline.steps()[0], Transform::AddBanner { text: "hello".to_string() });
        assert_eq!(pipeline.steps().len(), 9);
    }

    #[test]
    fn test_process_serializes() {
        let out = Style::ExpandedBass.pipeline().process(FIXTURE.as_bytes()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<isStaffVisible>0</isStaffVisible>"));
    }

    #[test]
    fn test_process_rejects_missing_staff() {
        let single = r#"<museScore><Score>
            <Part><Staff id="1"/></Part>
            <Staff id="1"/>
        </Score></museScore>"#;
        assert!(Style::Condensed.pipeline().process(single.as_bytes()).is_err());
    }
}
