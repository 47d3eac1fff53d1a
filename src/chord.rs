//! Chord model for Stradella bass shorthand.
//!
//! A bass `Chord` in the compact notation carries its written notes plus a
//! one-letter fingering (`M`, `m`, `7`, `d`) naming the chord button. From
//! that we derive the voicing notes that are not yet written and the stacked
//! note-name label printed under the staff.
//!
//! # Marking Reference
//! | Marking | Chord       | Intervals above root | Label suffix |
//! |---------|-------------|----------------------|--------------|
//! | `M`     | major       | 4, 7                 | (none)       |
//! | `m`     | minor       | 3, 7                 | `m`          |
//! | `7`     | dominant 7th| 4, 10                | `⁷`          |
//! | `d`     | diminished  | 3, 9                 | `°`          |
//!
//! # Example
//! ```
//! use pavia::chord::Chord;
//! use pavia::xml::Element;
//!
//! let node = Element::new("Chord")
//!     .with_child(
//!         Element::new("Note")
//!             .with_child(Element::new("Fingering").with_child(Element::with_text("text", "m")))
//!             .with_child(Element::with_text("pitch", "57"))
//!             .with_child(Element::with_text("tpc", "17")),
//!     );
//!
//! let chord = Chord::from_element(&node)?;
//! // A minor: C and E completed above the bass register floor
//! assert_eq!(chord.extra_pitches(), vec![60, 52]);
//! assert_eq!(chord.annotations()?, vec!["am".to_string()]);
//! # Ok::<(), pavia::PaviaError>(())
//! ```

use crate::error::{PaviaError, Result};
use crate::xml::{Element, Node, Path};
use std::collections::{BTreeMap, BTreeSet};

/// Spellings indexed by tonal pitch class, ordered along the circle of fifths.
/// Index 14 is C.
pub const TPC_NAMES: [&str; 35] = [
    "C♭♭", "G♭♭", "D♭♭", "A♭♭", "E♭♭", "B♭♭", "F♭", "C♭", "G♭", "D♭", "A♭", "E♭", "B♭", "F", "C",
    "G", "D", "A", "E", "B", "F♯", "C♯", "G♯", "D♯", "A♯", "E♯", "B♯", "F♯♯", "C♯♯", "G♯♯", "D♯♯",
    "A♯♯", "E♯♯", "B♯♯", "F♭♭",
];

/// Synthesized voicing notes are raised until they sit above this pitch.
pub const REGISTER_FLOOR: i32 = 50;

pub fn tpc_name(tpc: i32) -> Result<&'static str> {
    usize::try_from(tpc)
        .ok()
        .and_then(|i| TPC_NAMES.get(i).copied())
        .ok_or(PaviaError::InvalidTpc { tpc })
}

/// Chord-button marking found in a fingering annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marking {
    Major,
    Minor,
    Seventh,
    Diminished,
}

impl Marking {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "M" => Some(Marking::Major),
            "m" => Some(Marking::Minor),
            "7" => Some(Marking::Seventh),
            "d" => Some(Marking::Diminished),
            _ => None,
        }
    }

    pub fn intervals(self) -> &'static [i32] {
        match self {
            Marking::Major => &[4, 7],
            Marking::Minor => &[3, 7],
            Marking::Seventh => &[4, 10],
            Marking::Diminished => &[3, 9],
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Marking::Major => "",
            Marking::Minor => "m",
            Marking::Seventh => "⁷",
            Marking::Diminished => "°",
        }
    }
}

/// Harmonic reading of one `Chord` node.
///
/// Everything is computed from the node at construction; the derived
/// sequences are recomputed on every call, so they can be consumed any
/// number of times.
#[derive(Debug, Clone, Default)]
pub struct Chord {
    pitches: BTreeSet<i32>,
    tpc_by_pitch: BTreeMap<i32, i32>,
    marking: Option<Marking>,
    marking_paths: Vec<Path>,
}

impl Chord {
    /// Read pitches, spellings and chord markings from a `Chord` node.
    ///
    /// When several markings are present the last one wins, but every one of
    /// them is remembered for [`Chord::remove_markings`].
    pub fn from_element(node: &Element) -> Result<Self> {
        let mut chord = Chord::default();
        chord.collect_markings(node, &mut Vec::new());
        chord.collect_pitches(node)?;
        Ok(chord)
    }

    fn collect_markings(&mut self, element: &Element, prefix: &mut Path) {
        for (i, node) in element.children.iter().enumerate() {
            let Node::Element(child) = node else {
                continue;
            };
            prefix.push(i);
            if element.name == "Fingering" && child.name == "text" {
                if let Some(marking) = Marking::from_symbol(&child.text()) {
                    self.marking = Some(marking);
                    self.marking_paths.push(prefix.clone());
                }
            } else {
                self.collect_markings(child, prefix);
            }
            prefix.pop();
        }
    }

    fn collect_pitches(&mut self, element: &Element) -> Result<()> {
        let tpc = match element.elements().filter(|e| e.name == "tpc").last() {
            Some(tpc) => Some(parse_int(tpc)?),
            None => None,
        };
        for child in element.elements() {
            if child.name == "pitch" {
                let pitch = parse_int(child)?;
                self.pitches.insert(pitch);
                if let Some(tpc) = tpc {
                    self.tpc_by_pitch.insert(pitch, tpc);
                }
            } else {
                self.collect_pitches(child)?;
            }
        }
        Ok(())
    }

    pub fn pitches(&self) -> &BTreeSet<i32> {
        &self.pitches
    }

    pub fn marking(&self) -> Option<Marking> {
        self.marking
    }

    pub fn marking_count(&self) -> usize {
        self.marking_paths.len()
    }

    /// The highest written pitch.
    pub fn root_pitch(&self) -> Option<i32> {
        self.pitches.last().copied()
    }

    pub fn root_tpc(&self) -> Option<i32> {
        self.root_pitch()
            .and_then(|pitch| self.tpc_by_pitch.get(&pitch).copied())
    }

    pub fn tpc_of(&self, pitch: i32) -> Result<i32> {
        self.tpc_by_pitch
            .get(&pitch)
            .copied()
            .ok_or(PaviaError::MissingTpc { pitch })
    }

    pub fn intervals(&self) -> &'static [i32] {
        self.marking.map(Marking::intervals).unwrap_or_default()
    }

    pub fn suffix(&self) -> &'static str {
        self.marking.map(Marking::suffix).unwrap_or_default()
    }

    /// Voicing notes implied by the marking that are not written yet, each
    /// folded into the register just above [`REGISTER_FLOOR`].
    pub fn extra_pitches(&self) -> Vec<i32> {
        let Some(root) = self.root_pitch() else {
            return Vec::new();
        };
        self.intervals()
            .iter()
            .map(|interval| {
                let mut pitch = (root + interval).rem_euclid(12);
                while pitch <= REGISTER_FLOOR {
                    pitch += 12;
                }
                pitch
            })
            .filter(|pitch| !self.pitches.contains(pitch))
            .collect()
    }

    /// One bare `Note` per extra pitch. These carry no `tpc`.
    pub fn extra_note_nodes(&self) -> Vec<Element> {
        self.extra_pitches()
            .into_iter()
            .map(|pitch| {
                Element::new("Note").with_child(Element::with_text("pitch", pitch.to_string()))
            })
            .collect()
    }

    /// The label, one line per written pitch from the top down. The root is
    /// lower-cased and suffixed when a marking was recognized.
    pub fn annotations(&self) -> Result<Vec<String>> {
        if self.pitches.is_empty() {
            return Ok(Vec::new());
        }
        let root = self.root_pitch();
        let mut names = Vec::with_capacity(self.pitches.len());
        for &pitch in self.pitches.iter().rev() {
            let name = tpc_name(self.tpc_of(pitch)?)?;
            match self.marking {
                Some(marking) if Some(pitch) == root => {
                    names.push(format!("{}{}", name.to_lowercase(), marking.suffix()))
                }
                _ => names.push(name.to_string()),
            }
        }
        Ok(vec![names.join("\n")])
    }

    pub fn staff_text_nodes(&self) -> Result<Vec<Element>> {
        Ok(self
            .annotations()?
            .into_iter()
            .map(|text| {
                Element::new("StaffText")
                    .with_child(Element::with_text("placement", "below"))
                    .with_child(Element::with_text("text", text))
            })
            .collect())
    }

    /// Remove the recognized marking annotations from the node this chord was
    /// read from. Only valid while the node's existing children are unmoved.
    pub fn remove_markings(&self, node: &mut Element) -> usize {
        self.marking_paths
            .iter()
            .rev()
            .filter_map(|path| node.remove_at_path(path))
            .count()
    }
}

fn parse_int(element: &Element) -> Result<i32> {
    let text = element.text();
    text.trim().parse().map_err(|_| PaviaError::MalformedValue {
        element: element.name.clone(),
        value: text,
    })
}
