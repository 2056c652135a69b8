//! Synthetic complexes for unit tests.

use crate::align::{GlobalAligner, MultipleAlignment, PairAlignment, SequenceAligner};
use crate::error::{QsError, Result};
use crate::structure::{Chain, Complex, Residue, ResidueNumber};
use nalgebra::{Point3, Rotation3, Vector3};

pub(crate) const SEQ_1: &str = "MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQAPILSRVGDGTQDNLSGAEKAVQ";
pub(crate) const SEQ_2: &str = "SNAEWLKRHGLDPTNFYDCVEHWQTRMLKAPDSEFIRVWQKHNCYEDTLPGMRSWF";
pub(crate) const SEQ_3: &str = "GDVEKGKKIFVQKCAQCHTVEKGGKHKTGPNLHGLFGRKTGQAPGYSYTAANKNKG";

const CHAIN_NAMES: [&str; 12] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L"];

/// An ideal alpha helix along the z axis, centered on the origin.
pub(crate) fn helix_chain(name: &str, seq: &str) -> Chain {
    let n = seq.len() as f64;
    let residues = seq
        .chars()
        .enumerate()
        .map(|(i, olc)| {
            let theta = (100.0 * i as f64).to_radians();
            let radial = Vector3::new(theta.cos(), theta.sin(), 0.0);
            let ca = Point3::new(2.3 * radial.x, 2.3 * radial.y, 1.5 * (i as f64 - n / 2.0));
            let main = if olc == 'G' { ca } else { ca + 1.5 * radial };
            Residue::new(olc, ResidueNumber::new(i as isize + 1, None), main, ca)
        })
        .collect();
    Chain::new(name, residues)
}

/// Rotate a chain about the z axis and translate it afterwards.
pub(crate) fn moved(chain: &Chain, name: &str, angle: f64, shift: Vector3<f64>) -> Chain {
    let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), angle);
    let residues = chain
        .residues()
        .iter()
        .map(|r| Residue::new(r.olc, r.number, rot * r.main_pos + shift, rot * r.ca_pos + shift))
        .collect();
    Chain::new(name, residues)
}

/// `n` copies of one helix placed with exact cyclic symmetry around z.
pub(crate) fn ring_chains(n: usize, radius: f64, seq: &str) -> Vec<Chain> {
    let base = moved(&helix_chain("X", seq), "X", 0.0, Vector3::new(radius, 0.0, 0.0));
    (0..n)
        .map(|k| {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
            moved(&base, CHAIN_NAMES[k], angle, Vector3::zeros())
        })
        .collect()
}

pub(crate) fn homo_ring(name: &str, n: usize) -> Complex {
    Complex::new(name, ring_chains(n, 14.0, SEQ_1), false).unwrap()
}

/// Two different helices side by side, 10 Å apart.
pub(crate) fn hetero_dimer(name: &str, first: &str, second: &str) -> Complex {
    let a = helix_chain(first, SEQ_1);
    let b = moved(&helix_chain(second, SEQ_2), second, 0.0, Vector3::new(10.0, 0.0, 0.0));
    Complex::new(name, vec![a, b], false).unwrap()
}

/// Three different helices on a triangle with 10 Å sides.
pub(crate) fn hetero_trimer_chains() -> Vec<Chain> {
    let a = helix_chain("A", SEQ_1);
    let b = moved(&helix_chain("B", SEQ_2), "B", 0.0, Vector3::new(10.0, 0.0, 0.0));
    let c = moved(
        &helix_chain("C", SEQ_3),
        "C",
        0.0,
        Vector3::new(5.0, 10.0 * 0.75f64.sqrt(), 0.0),
    );
    vec![a, b, c]
}

/// Global alignment that refuses every multiple alignment containing `chain`,
/// and with `pairwise` set every pairwise alignment as well.
pub(crate) struct FailingAligner {
    pub(crate) chain: &'static str,
    pub(crate) pairwise: bool,
}

impl FailingAligner {
    fn refuse(&self) -> QsError {
        QsError::AlignmentFailure(format!("chain {} cannot be aligned", self.chain))
    }
}

impl SequenceAligner for FailingAligner {
    fn align(&self, a: &Chain, b: &Chain) -> Result<PairAlignment> {
        if self.pairwise && (a.name() == self.chain || b.name() == self.chain) {
            return Err(self.refuse());
        }
        GlobalAligner::default().align(a, b)
    }

    fn align_multiple(&self, chains: &[&Chain]) -> Result<MultipleAlignment> {
        if chains.iter().any(|c| c.name() == self.chain) {
            return Err(self.refuse());
        }
        GlobalAligner::default().align_multiple(chains)
    }
}
