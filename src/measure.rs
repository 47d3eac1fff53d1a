//! Measure alignment across staves.
//!
//! Every `Staff` under `Score` holds its own run of `Measure` elements. The
//! n-th measure of each staff describes the same bar, so grouping them by
//! position gives one [`AlignedMeasure`] per bar.

use crate::error::{PaviaError, Result};
use crate::xml::Element;
use serde::Deserialize;

/// Voice slots per measure imposed by the score format.
pub const VOICES: usize = 4;

/// What to do when staves disagree on their number of measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    /// Process the common prefix and log a warning.
    #[default]
    Truncate,
    /// Fail with [`PaviaError::AlignmentMismatch`].
    Strict,
}

/// The measures at one position, one per `Score` staff, in staff order.
#[derive(Debug)]
pub struct AlignedMeasure<'a> {
    position: usize,
    measures: Vec<&'a mut Element>,
}

impl<'a> AlignedMeasure<'a> {
    /// 0-based position of this bar.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn staff_count(&self) -> usize {
        self.measures.len()
    }

    pub fn node(&mut self, staff: usize) -> Result<&mut Element> {
        let position = self.position;
        self.measures
            .get_mut(staff)
            .map(|measure| &mut **measure)
            .ok_or_else(|| PaviaError::MeasureError {
                staff,
                measure: position + 1,
                message: "no such staff".to_string(),
            })
    }

    /// Voice slot `voice` of the given staff's measure, padding the measure
    /// with empty `voice` elements until it has [`VOICES`] of them.
    pub fn voice(&mut self, staff: usize, voice: usize) -> Result<&mut Element> {
        let position = self.position;
        let out_of_range = || PaviaError::MeasureError {
            staff,
            measure: position + 1,
            message: format!("voice slot {} out of range", voice),
        };
        if voice >= VOICES {
            return Err(out_of_range());
        }
        let measure = self.node(staff)?;
        let existing = measure.elements().filter(|e| e.name == "voice").count();
        for _ in existing..VOICES {
            measure.push(Element::new("voice"));
        }
        measure
            .elements_mut()
            .filter(|e| e.name == "voice")
            .nth(voice)
            .ok_or_else(out_of_range)
    }
}

/// Group the measures of every `Score` staff by position.
pub fn measures(root: &mut Element, alignment: Alignment) -> Result<Vec<AlignedMeasure<'_>>> {
    let mut columns: Vec<std::vec::IntoIter<&mut Element>> = Vec::new();
    let mut counts = Vec::new();
    for staff in root.children_of_mut("Score", "Staff") {
        let staff_measures: Vec<&mut Element> = staff
            .elements_mut()
            .filter(|e| e.name == "Measure")
            .collect();
        counts.push(staff_measures.len());
        columns.push(staff_measures.into_iter());
    }

    let shortest = counts.iter().copied().min().unwrap_or(0);
    let longest = counts.iter().copied().max().unwrap_or(0);
    if shortest != longest {
        match alignment {
            Alignment::Strict => return Err(PaviaError::AlignmentMismatch { shortest, longest }),
            Alignment::Truncate => log::warn!(
                "staves have between {} and {} measures; processing the first {}",
                shortest,
                longest,
                shortest
            ),
        }
    }

    Ok((0..shortest)
        .map(|position| AlignedMeasure {
            position,
            measures: columns.iter_mut().filter_map(Iterator::next).collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    fn score(measure_counts: &[usize]) -> Element {
        let mut xml = String::from("<museScore><Score>");
        for (i, count) in measure_counts.iter().enumerate() {
            xml.push_str(&format!("<Staff id=\"{}\">", i + 1));
            for m in 0..*count {
                xml.push_str(&format!(
                    "<Measure><voice><Rest><durationType>measure</durationType></Rest></voice>\
                     <mark>{}.{}</mark></Measure>",
                    i, m
                ));
            }
            xml.push_str("</Staff>");
        }
        xml.push_str("</Score></museScore>");
        parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_measures_group_by_position() {
        let mut root = score(&[3, 3]);
        let mut groups = measures(&mut root, Alignment::Strict).unwrap();
        assert_eq!(groups.len(), 3);
        let group = &mut groups[2];
        assert_eq!(group.position(), 2);
        assert_eq!(group.staff_count(), 2);
        assert_eq!(group.node(1).unwrap().first_child("mark").unwrap().text(), "1.2");
        assert!(matches!(
            group.node(2),
            Err(PaviaError::MeasureError { staff: 2, measure: 3, .. })
        ));
    }

    #[test]
    fn test_mismatch_truncates_or_fails() {
        let mut root = score(&[3, 2]);
        assert_eq!(measures(&mut root, Alignment::Truncate).unwrap().len(), 2);
        assert!(matches!(
            measures(&mut root, Alignment::Strict),
            Err(PaviaError::AlignmentMismatch { shortest: 2, longest: 3 })
        ));
    }

    #[test]
    fn test_voice_pads_to_four_slots() {
        let mut root = score(&[1]);
        {
            let mut groups = measures(&mut root, Alignment::Strict).unwrap();
            let voice = groups[0].voice(0, 3).unwrap();
            assert!(voice.children.is_empty());
            voice.push(Element::new("Rest"));
            // Slot 0 keeps its original content
            assert_eq!(groups[0].voice(0, 0).unwrap().children.len(), 1);
            assert!(groups[0].voice(0, 4).is_err());
        }
        let measure = root.descendants("Measure")[0];
        let voices: Vec<_> = measure.elements().filter(|e| e.name == "voice").collect();
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[3].children.len(), 1);
    }

    #[test]
    fn test_voice_never_removes_slots() {
        let mut root = parse(
            b"<museScore><Score><Staff id=\"1\"><Measure><voice/><voice/><voice/><voice/><voice/></Measure></Staff></Score></museScore>",
        )
        .unwrap();
        let mut groups = measures(&mut root, Alignment::Strict).unwrap();
        groups[0].voice(0, 1).unwrap();
        assert_eq!(groups[0].node(0).unwrap().children.len(), 5);
    }
}
