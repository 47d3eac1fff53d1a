//! # Score Transforms
//!
//! Every rewrite the converter can make to a score, as one closed set of
//! operations. Each [`Transform`] mutates the tree in place and may rely on
//! what earlier transforms in the same pipeline left behind.
//!
//! ## Structural
//! - `CopyStaff` / `CopyClef` - duplicate a staff (layout and content halves) or its default clef
//! - `MuteStaff` / `HideStaff` - silence every note of a staff, or hide it
//! - `FixBrackets` - one brace over all staves, bar lines joined down to the last
//! - `HideInvisible` - turn off the score's "show invisible" flag
//! - `AddBanner` - append a text frame describing the conversion
//!
//! ## Chord-driven
//! - `ExpandChords` - write out each marked chord, drop the marking, label it
//! - `AnnotateOnly` - label each chord, leaving notes and markings alone
//! - `Condense` - overlay the bass rhythm and labels as invisible rests in
//!   the fourth voice of the top staff
//!
//! Staff numbers are 0-based positions: the n-th `Staff` under `Part` and
//! the n-th `Staff` under `Score` describe the same staff.

use crate::chord::Chord;
use crate::error::{PaviaError, Result};
use crate::measure::{measures, Alignment};
use crate::xml::Element;
use serde::Deserialize;
use std::fmt;

/// `type` attribute MuseScore uses for a brace.
const BRACE: &str = "1";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Transform {
    CopyStaff { src: usize, tgt: usize },
    CopyClef { src: usize, tgt: usize },
    MuteStaff { staff: usize },
    HideStaff { staff: usize },
    FixBrackets,
    HideInvisible,
    ExpandChords { staff: usize },
    AnnotateOnly { staff: usize },
    Condense,
    AddBanner { text: String },
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::CopyStaff { src, tgt } => write!(f, "CopyStaff({}, {})", src, tgt),
            Transform::CopyClef { src, tgt } => write!(f, "CopyClef({}, {})", src, tgt),
            Transform::MuteStaff { staff } => write!(f, "MuteStaff({})", staff),
            Transform::HideStaff { staff } => write!(f, "HideStaff({})", staff),
            Transform::FixBrackets => write!(f, "FixBrackets"),
            Transform::HideInvisible => write!(f, "HideInvisible"),
            Transform::ExpandChords { staff } => write!(f, "ExpandChords({})", staff),
            Transform::AnnotateOnly { staff } => write!(f, "AnnotateOnly({})", staff),
            Transform::Condense => write!(f, "Condense"),
            Transform::AddBanner { .. } => write!(f, "AddBanner"),
        }
    }
}

impl Transform {
    /// Apply this transform to the score rooted at `root`.
    pub fn apply(&self, root: &mut Element, alignment: Alignment) -> Result<()> {
        match self {
            Transform::CopyStaff { src, tgt } => copy_staff(root, *src, *tgt),
            Transform::CopyClef { src, tgt } => copy_clef(root, *src, *tgt),
            Transform::MuteStaff { staff } => mute_staff(root, *staff),
            Transform::HideStaff { staff } => hide_staff(root, *staff),
            Transform::FixBrackets => fix_brackets(root),
            Transform::HideInvisible => {
                hide_invisible(root);
                Ok(())
            }
            Transform::ExpandChords { staff } => expand_chords(root, *staff, alignment),
            Transform::AnnotateOnly { staff } => annotate_only(root, *staff, alignment),
            Transform::Condense => condense(root, alignment),
            Transform::AddBanner { text } => add_banner(root, text),
        }
    }
}

fn structure_error(staff: usize, message: impl Into<String>) -> PaviaError {
    PaviaError::StructureError {
        staff,
        message: message.into(),
    }
}

fn check_staff_id(staff: &Element, index: usize) -> Result<()> {
    let expected = (index + 1).to_string();
    match staff.attribute("id") {
        Some(id) if id == expected => Ok(()),
        id => Err(structure_error(
            index,
            format!("expected staff id {}, found {:?}", expected, id),
        )),
    }
}

fn copy_staff(root: &mut Element, src: usize, tgt: usize) -> Result<()> {
    let mut copies = Vec::new();
    for parent in ["Part", "Score"] {
        let paths = root.find_paths(parent, "Staff");
        if paths.len() != tgt {
            return Err(structure_error(
                tgt,
                format!(
                    "cannot copy into staff {}: {} has {} staves",
                    tgt,
                    parent,
                    paths.len()
                ),
            ));
        }
        let source = paths
            .get(src)
            .and_then(|path| root.at_path(path).map(|staff| (path, staff)));
        let Some((path, staff)) = source else {
            return Err(structure_error(src, format!("no {} staff to copy", parent)));
        };
        check_staff_id(staff, src)?;
        let mut copy = staff.clone();
        copy.set_attribute("id", (tgt + 1).to_string());
        copies.push((path.clone(), copy));
    }
    for (path, copy) in copies {
        root.insert_after_path(&path, copy);
    }
    Ok(())
}

/// Appends the clef even if the target already has one; the last clef wins
/// when the score is rendered.
fn copy_clef(root: &mut Element, src: usize, tgt: usize) -> Result<()> {
    let clef = {
        let staves = root.children_of("Part", "Staff");
        let source = staves
            .get(src)
            .ok_or_else(|| structure_error(src, "no Part staff to copy the clef from"))?;
        check_staff_id(source, src)?;
        source
            .first_child("defaultClef")
            .cloned()
            .ok_or_else(|| structure_error(src, "no defaultClef to copy"))?
    };

    let mut staves = root.children_of_mut("Part", "Staff");
    let target = staves
        .get_mut(tgt)
        .ok_or_else(|| structure_error(tgt, "no Part staff to copy the clef into"))?;
    if target.first_child("defaultClef").is_some() {
        log::warn!("staff {} already has a defaultClef; appending another", tgt);
    }
    target.push(clef);
    Ok(())
}

fn mute_staff(root: &mut Element, index: usize) -> Result<()> {
    let mut staves = root.children_of_mut("Score", "Staff");
    let staff = staves
        .get_mut(index)
        .ok_or_else(|| structure_error(index, "no Score staff to mute"))?;
    for note in staff.descendants_mut("Note") {
        note.remove_descendants("play");
        note.push(Element::with_text("play", "0"));
    }
    Ok(())
}

fn hide_staff(root: &mut Element, index: usize) -> Result<()> {
    let mut staves = root.children_of_mut("Part", "Staff");
    let staff = staves
        .get_mut(index)
        .ok_or_else(|| structure_error(index, "no Part staff to hide"))?;
    staff.remove_descendants("isStaffVisible");
    staff.push(Element::with_text("isStaffVisible", "0"));
    Ok(())
}

fn fix_brackets(root: &mut Element) -> Result<()> {
    let mut staves = root.children_of_mut("Part", "Staff");
    let count = staves.len();
    if count == 0 {
        return Err(structure_error(0, "no Part staves to bracket"));
    }
    for (i, staff) in staves.iter_mut().enumerate() {
        staff.remove_children("barLineSpan");
        staff.remove_children("bracket");
        if i == 0 {
            staff.push(
                Element::new("bracket")
                    .with_attribute("type", BRACE)
                    .with_attribute("span", count.to_string())
                    .with_attribute("col", "0"),
            );
        }
        if i + 1 < count {
            staff.push(Element::with_text("barLineSpan", "1"));
        }
    }
    Ok(())
}

fn hide_invisible(root: &mut Element) {
    for flag in root.children_of_mut("Score", "showInvisible") {
        flag.set_text("0");
    }
}

fn expand_chords(root: &mut Element, staff: usize, alignment: Alignment) -> Result<()> {
    for mut measure in measures(root, alignment)? {
        let position = measure.position();
        measure
            .node(staff)?
            .insert_before_each("Chord", &mut |node: &mut Element| {
                let chord = Chord::from_element(node)?;
                for note in chord.extra_note_nodes() {
                    node.push(note);
                }
                chord.remove_markings(node);
                chord.staff_text_nodes()
            })
            .map_err(|e| e.in_measure(staff, position))?;
    }
    Ok(())
}

fn annotate_only(root: &mut Element, staff: usize, alignment: Alignment) -> Result<()> {
    for mut measure in measures(root, alignment)? {
        let position = measure.position();
        measure
            .node(staff)?
            .insert_before_each("Chord", &mut |node: &mut Element| {
                Chord::from_element(node)?.staff_text_nodes()
            })
            .map_err(|e| e.in_measure(staff, position))?;
    }
    Ok(())
}

const CONDENSE_SOURCE: (usize, usize) = (1, 0);
const CONDENSE_TARGET: (usize, usize) = (0, 3);

fn condense(root: &mut Element, alignment: Alignment) -> Result<()> {
    let (src_staff, src_voice) = CONDENSE_SOURCE;
    let (tgt_staff, tgt_voice) = CONDENSE_TARGET;
    for mut measure in measures(root, alignment)? {
        let position = measure.position();
        let sources: Vec<Element> = measure
            .voice(src_staff, src_voice)?
            .elements()
            .filter(|e| e.name == "Chord" || e.name == "Rest")
            .cloned()
            .collect();
        let target = measure.voice(tgt_staff, tgt_voice)?;
        for source in sources {
            if source.name == "Chord" {
                let labels = Chord::from_element(&source)
                    .and_then(|chord| chord.staff_text_nodes())
                    .map_err(|e| e.in_measure(src_staff, position))?;
                for label in labels {
                    target.push(label.with_child(
                        Element::new("offset")
                            .with_attribute("x", "0")
                            .with_attribute("y", "3.7"),
                    ));
                }
            }
            target.push(invisible_rest(source));
        }
    }
    Ok(())
}

/// Same rhythm as `source`, but a hidden rest with no notes.
fn invisible_rest(mut source: Element) -> Element {
    source.remove_descendants("Note");
    source.name = "Rest".to_string();
    source.push(Element::with_text("visible", "0"));
    source
}

fn add_banner(root: &mut Element, text: &str) -> Result<()> {
    let mut staves = root.children_of_mut("Score", "Staff");
    let staff = staves
        .first_mut()
        .ok_or_else(|| structure_error(0, "no Score staff for the banner"))?;
    staff.push(
        Element::new("TBox")
            .with_child(Element::with_text("height", "1"))
            .with_child(
                Element::new("Text")
                    .with_child(Element::with_text("style", "frame"))
                    .with_child(Element::with_text("text", text)),
            ),
    );
    Ok(())
}
