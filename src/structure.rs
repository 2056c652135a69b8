//! Reduced, immutable view of a protein complex.
//!
//! A [`Complex`] keeps one record per resolved residue with the two positions
//! the scorer needs: the CA atom for superpositions and alignments, and the
//! "main" atom (CB, or CA for glycine and CA-only models) for contacts.

use crate::error::{QsError, Result};
use crate::settings::MIN_CHAIN_LENGTH;
use nalgebra::Point3;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Residue number with an optional insertion code.
///
/// Ordered by number first; a residue without an insertion code sorts before
/// its inserted neighbours (`10 < 10A < 11`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueNumber {
    pub num: isize,
    pub ins_code: Option<char>,
}

impl ResidueNumber {
    pub fn new(num: isize, ins_code: Option<char>) -> Self {
        Self { num, ins_code }
    }
}

impl From<isize> for ResidueNumber {
    fn from(num: isize) -> Self {
        Self::new(num, None)
    }
}

impl fmt::Display for ResidueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ins_code {
            Some(code) => write!(f, "{}{}", self.num, code),
            None => write!(f, "{}", self.num),
        }
    }
}

// Written as text so it can key JSON objects
impl Serialize for ResidueNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single resolved residue.
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    /// One-letter amino acid code
    pub olc: char,
    pub number: ResidueNumber,
    /// Representative position for contacts (CB, CA for glycine)
    pub main_pos: Point3<f64>,
    /// CA position for superpositions
    pub ca_pos: Point3<f64>,
}

impl Residue {
    pub fn new(olc: char, number: ResidueNumber, main_pos: Point3<f64>, ca_pos: Point3<f64>) -> Self {
        Self {
            olc,
            number,
            main_pos,
            ca_pos,
        }
    }
}

/// An ordered polymer chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    name: String,
    residues: Vec<Residue>,
}

impl Chain {
    pub fn new(name: impl Into<String>, residues: Vec<Residue>) -> Self {
        Self {
            name: name.into(),
            residues,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// The one-letter sequence of the resolved residues.
    pub fn sequence(&self) -> String {
        self.residues.iter().map(|r| r.olc).collect()
    }

    pub fn ca_positions(&self) -> Vec<Point3<f64>> {
        self.residues.iter().map(|r| r.ca_pos).collect()
    }

    /// Mean CA position of the chain.
    pub fn center(&self) -> Point3<f64> {
        centroid(self.residues.iter().map(|r| &r.ca_pos))
    }
}

/// A named, validated collection of chains.
#[derive(Debug, Clone, PartialEq)]
pub struct Complex {
    name: String,
    chains: Vec<Chain>,
    ca_only: bool,
}

impl Complex {
    /// Build a complex, enforcing the invariants of the scorer: at least two
    /// chains, unique chain names, and no chain shorter than
    /// [`MIN_CHAIN_LENGTH`] residues.
    pub fn new(name: impl Into<String>, chains: Vec<Chain>, ca_only: bool) -> Result<Self> {
        let name = name.into();
        if chains.len() < 2 {
            return Err(QsError::InvalidInput(format!(
                "{name} has {} chain(s); at least 2 are required",
                chains.len()
            )));
        }

        let mut seen = HashSet::new();
        for chain in &chains {
            if !seen.insert(chain.name()) {
                return Err(QsError::InvalidInput(format!(
                    "{name} has duplicate chain name {}",
                    chain.name()
                )));
            }
            if chain.len() < MIN_CHAIN_LENGTH {
                return Err(QsError::InvalidInput(format!(
                    "Chain {} of {name} has {} residues; at least {MIN_CHAIN_LENGTH} are required",
                    chain.name(),
                    chain.len()
                )));
            }
        }

        Ok(Self {
            name,
            chains,
            ca_only,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain(&self, name: &str) -> Option<&Chain> {
        self.chains.iter().find(|c| c.name() == name)
    }

    pub fn chain_names(&self) -> Vec<&str> {
        self.chains.iter().map(|c| c.name()).collect()
    }

    /// Whether the structure only provides CA atoms.
    pub fn is_ca_only(&self) -> bool {
        self.ca_only
    }
}

/// Arithmetic mean of a set of points; the origin for an empty set.
pub(crate) fn centroid<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Point3<f64> {
    let (sum, n) = points.fold((nalgebra::Vector3::zeros(), 0usize), |(acc, n), p| {
        (acc + p.coords, n + 1)
    });
    if n == 0 {
        Point3::origin()
    } else {
        Point3::from(sum / n as f64)
    }
}
