use crate::structure::{Residue as QsResidue, ResidueNumber};
use nalgebra::Point3;
use pdbtbx::*;

pub trait ResidueExt {
    /// The residue one-letter code, or `None` if it's not an amino acid.
    fn resn(&self) -> Option<&str>;

    /// Residue number and insertion code.
    fn number(&self) -> ResidueNumber;

    /// Position of the first atom named `name`.
    fn atom_pos(&self, name: &str) -> Option<Point3<f64>>;

    /// Reduce the residue to its CA and representative positions.
    /// Residues without a CA atom are skipped.
    fn to_qs_residue(&self) -> Option<QsResidue>;
}

impl ResidueExt for Residue {
    fn resn(&self) -> Option<&str> {
        let aa_code = match self.name().unwrap_or("").to_uppercase().as_str() {
            "ALA" => "A",
            "ARG" => "R",
            "ASN" => "N",
            "ASP" => "D",
            "CYS" => "C",
            "GLN" => "Q",
            "GLU" => "E",
            "GLY" => "G",
            "HIS" => "H",
            "ILE" => "I",
            "LEU" => "L",
            "LYS" => "K",
            "MET" => "M",
            "MSE" => "M", // selenomethionine
            "PHE" => "F",
            "PRO" => "P",
            "SER" => "S",
            "THR" => "T",
            "TRP" => "W",
            "TYR" => "Y",
            "VAL" => "V",
            _ => "X",
        };

        match aa_code {
            "X" => None,
            _ => Some(aa_code),
        }
    }

    fn number(&self) -> ResidueNumber {
        let (num, insertion) = self.id();
        ResidueNumber::new(num, insertion.and_then(|code| code.chars().next()))
    }

    fn atom_pos(&self, name: &str) -> Option<Point3<f64>> {
        self.atoms()
            .find(|atom| atom.name() == name)
            .map(|atom| {
                let (x, y, z) = atom.pos();
                Point3::new(x, y, z)
            })
    }

    fn to_qs_residue(&self) -> Option<QsResidue> {
        let olc = self.resn()?.chars().next()?;
        let ca = self.atom_pos("CA")?;
        // Glycine and CA-only residues are represented by their CA
        let main = match olc {
            'G' => ca,
            _ => self.atom_pos("CB").unwrap_or(ca),
        };
        Some(QsResidue::new(olc, self.number(), main, ca))
    }
}
