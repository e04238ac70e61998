//! Default plate content for a new board.

use crate::board::{Plate, BOARD_COLUMNS, BOARD_ROWS};

/// Name and abbreviation of every non-empty plate, in row-major order.
/// Cells past the end of the table are empty.
const DEFAULT_PLATES: &[(&str, &str)] = &[
    ("Ambivalence", "Amb"),
    ("Art Versus Nature", "AVN"),
    ("The Need Not to Judge", "TNJ"),
    ("Calculus", "Clc"),
    ("City as Artifact", "CaA"),
    ("Coding", "Cde"),
    ("Contemplation", "Ctp"),
    ("Continuity/Eternity", "C/E"),
    ("Creation", "Crt"),
    ("Ontogeny Recapitulates Phylogeny", "ORP"),
    ("Education", "Edu"),
    ("Helplessness", "Hlp"),
    ("Intuition", "Itu"),
    ("Monetary Value", "MnV"),
    ("Wavicle", "Wav"),
    ("Freedom", "Fre"),
    ("Emotional Manipulation", "EmM"),
    ("Gestalt", "Gst"),
    ("Harmony", "Hrm"),
    ("Hidden Potential", "HdP"),
    ("Joy", "Joy"),
    ("Magic", "Mgc"),
    ("Mechanical Advantage", "McA"),
    ("Metamorphosis", "Mtm"),
    ("Nature Tending Towards Perfection", "NTP"),
    ("Myth", "Mth"),
    ("Coexisting Species", "CxS"),
    ("Perspective", "Prp"),
    ("Reaching Out", "RcO"),
    ("Return", "Rtn"),
    ("Society as Active/Passive Hierarchy", "SoH"),
    ("Structural Strength", "StS"),
    ("Struggle", "Stg"),
    ("Synergy", "Syg"),
    ("Syntax", "Stx"),
    ("Unwanted Relationships", "UwR"),
    ("Structural Improvisation", "StI"),
    ("Anthropomorphism", "Anp"),
];

pub fn default_plates() -> Vec<Plate> {
    (0..BOARD_ROWS * BOARD_COLUMNS)
        .map(|i| match DEFAULT_PLATES.get(i) {
            Some((name, abbrev)) => Plate::new(name, abbrev),
            None => Plate::empty(),
        })
        .collect()
}
