use std::{error::Error, fmt::Display, str::FromStr};

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// element symbols indexed by atomic number. index 0 is a dummy
pub const SYMBOLS: [&str; 55] = [
    "X", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg",
    "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn",
    "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb",
    "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Atom {
    pub atomic_number: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        let eps = 1e-8;
        let close = |a: f64, b: f64| (a - b).abs() < eps;
        self.atomic_number == other.atomic_number
            && close(self.x, other.x)
            && close(self.y, other.y)
            && close(self.z, other.z)
    }
}

impl Atom {
    pub fn new(atomic_number: usize, x: f64, y: f64, z: f64) -> Self {
        Self {
            atomic_number,
            x,
            y,
            z,
        }
    }

    pub fn new_from_label(label: &str, x: f64, y: f64, z: f64) -> Self {
        let atomic_number = SYMBOLS
            .iter()
            .position(|&s| s == label)
            .unwrap_or_else(|| panic!("unrecognized element label {label}"));
        Self::new(atomic_number, x, y, z)
    }

    pub fn label(&self) -> &str {
        SYMBOLS[self.atomic_number]
    }
}

impl FromStr for Atom {
    type Err = std::string::ParseError;

    /// accepts either an element symbol or an atomic number in the first field
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<_> = s.split_whitespace().collect();
        if fields.len() < 4 {
            panic!("malformed geometry line '{s}'");
        }
        let coords: Vec<f64> = fields[1..4]
            .iter()
            .map(|c| {
                c.parse().unwrap_or_else(|_| {
                    panic!("invalid coordinate '{c}' in geometry line '{s}'")
                })
            })
            .collect();
        Ok(match fields[0].parse::<usize>() {
            Ok(z) => Atom::new(z, coords[0], coords[1], coords[2]),
            Err(_) => Atom::new_from_label(
                fields[0], coords[0], coords[1], coords[2],
            ),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StructureError {
    AtomCountMismatch(usize, usize),
    SpeciesMismatch,
    BalanceOutOfRange,
}

impl Display for StructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureError::AtomCountMismatch(a, b) => write!(
                f,
                "origin and target structures must have the same number of \
                 atoms, got {a} and {b}"
            ),
            StructureError::SpeciesMismatch => write!(
                f,
                "origin and target structures must have the same ordering of \
                 elements"
            ),
            StructureError::BalanceOutOfRange => {
                write!(f, "balance must be between 0 and 1")
            }
        }
    }
}

impl Error for StructureError {}

/// an atomic structure with a periodic cell. `cell` rows are the lattice
/// vectors in Å
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub atoms: Vec<Atom>,
    pub cell: [[f64; 3]; 3],
}

impl Structure {
    pub fn new(atoms: Vec<Atom>, cell: [[f64; 3]; 3]) -> Self {
        Self { atoms, cell }
    }

    pub fn natoms(&self) -> usize {
        self.atoms.len()
    }

    fn cell_matrix(&self) -> na::Matrix3<f64> {
        let c = &self.cell;
        na::Matrix3::new(
            c[0][0], c[0][1], c[0][2], c[1][0], c[1][1], c[1][2], c[2][0],
            c[2][1], c[2][2],
        )
    }

    pub fn volume(&self) -> f64 {
        self.cell_matrix().determinant().abs()
    }

    /// reciprocal lattice vectors as rows, satisfying bᵢ·aⱼ = 2π δᵢⱼ
    pub fn reciprocal_cell(&self) -> na::Matrix3<f64> {
        let a = self.cell_matrix();
        let inv = a.try_inverse().expect("singular lattice");
        2.0 * std::f64::consts::PI * inv.transpose()
    }

    /// scale the cell by `factor` along the lattice vectors selected by
    /// `axes`, keeping the fractional atom positions fixed
    pub fn scale(&self, factor: f64, axes: [bool; 3]) -> Self {
        let scales = axes.map(|on| if on { factor } else { 1.0 });
        let a = self.cell_matrix();
        let d = na::Matrix3::from_diagonal(&na::Vector3::new(
            scales[0], scales[1], scales[2],
        ));
        let scaled = d * a;
        let map = a.try_inverse().expect("singular lattice") * scaled;
        let atoms = self
            .atoms
            .iter()
            .map(|atom| {
                let pos =
                    na::RowVector3::new(atom.x, atom.y, atom.z) * map;
                Atom::new(atom.atomic_number, pos[0], pos[1], pos[2])
            })
            .collect();
        let mut cell = [[0.0; 3]; 3];
        for (i, row) in cell.iter_mut().enumerate() {
            for (j, x) in row.iter_mut().enumerate() {
                *x = scaled[(i, j)];
            }
        }
        Self { atoms, cell }
    }

    /// generate a new structure whose atom positions linearly interpolate
    /// between `self` and `target`. `balance` = 0 gives `self` and 1 gives
    /// `target`
    pub fn interpolate(
        &self,
        target: &Self,
        balance: f64,
    ) -> Result<Self, StructureError> {
        if self.natoms() != target.natoms() {
            return Err(StructureError::AtomCountMismatch(
                self.natoms(),
                target.natoms(),
            ));
        }
        if self
            .atoms
            .iter()
            .zip(&target.atoms)
            .any(|(a, b)| a.atomic_number != b.atomic_number)
        {
            return Err(StructureError::SpeciesMismatch);
        }
        if !(0.0..=1.0).contains(&balance) {
            return Err(StructureError::BalanceOutOfRange);
        }
        let atoms = self
            .atoms
            .iter()
            .zip(&target.atoms)
            .map(|(a, b)| {
                Atom::new(
                    a.atomic_number,
                    balance * b.x + (1.0 - balance) * a.x,
                    balance * b.y + (1.0 - balance) * a.y,
                    balance * b.z + (1.0 - balance) * a.z,
                )
            })
            .collect();
        Ok(Self {
            atoms,
            cell: self.cell,
        })
    }
}

impl FromStr for Structure {
    type Err = std::string::ParseError;

    /// parse a block of atom lines. the cell is left as the identity and
    /// should be set by the caller
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let atoms = s
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.parse().unwrap())
            .collect();
        let mut cell = [[0.0; 3]; 3];
        for (i, row) in cell.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Ok(Self { atoms, cell })
    }
}

impl Display for Structure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for atom in &self.atoms {
            writeln!(
                f,
                "{:5}{:15.10}{:15.10}{:15.10}",
                atom.label(),
                atom.x,
                atom.y,
                atom.z,
            )?
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn diamond() -> Structure {
        Structure::new(
            vec![
                Atom::new(6, 0.0, 0.0, 0.0),
                Atom::new(6, 0.89, 0.89, 0.89),
            ],
            [[0.0, 1.78, 1.78], [1.78, 0.0, 1.78], [1.78, 1.78, 0.0]],
        )
    }

    #[test]
    fn volume() {
        let s = diamond();
        assert_abs_diff_eq!(
            s.volume(),
            2.0 * 1.78_f64.powi(3),
            epsilon = 1e-12
        );
    }

    #[test]
    fn scale_all_axes() {
        let s = diamond();
        let t = s.scale(1.1, [true; 3]);
        assert_abs_diff_eq!(
            t.volume(),
            s.volume() * 1.1_f64.powi(3),
            epsilon = 1e-10
        );
        // atoms follow the cell
        assert_abs_diff_eq!(t.atoms[1].x, 0.89 * 1.1, epsilon = 1e-10);
    }

    #[test]
    fn scale_one_axis() {
        let s = Structure::new(
            vec![Atom::new(14, 1.0, 1.0, 1.0)],
            [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]],
        );
        let t = s.scale(2.0, [false, false, true]);
        assert_abs_diff_eq!(t.volume(), 128.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t.atoms[0].x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t.atoms[0].z, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn interpolate() {
        let a = Structure::new(
            vec![Atom::new(1, 0.0, 0.0, 0.0)],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
        let b = Structure::new(
            vec![Atom::new(1, 1.0, 0.0, 0.0)],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
        let mid = a.interpolate(&b, 0.5).unwrap();
        assert_abs_diff_eq!(mid.atoms[0].x, 0.5, epsilon = 1e-12);

        let c = Structure::new(
            vec![Atom::new(2, 1.0, 0.0, 0.0)],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
        assert_eq!(
            a.interpolate(&c, 0.5),
            Err(StructureError::SpeciesMismatch)
        );
        assert_eq!(
            a.interpolate(&b, 1.5),
            Err(StructureError::BalanceOutOfRange)
        );
    }

    #[test]
    #[should_panic(expected = "malformed geometry line")]
    fn short_geometry_line() {
        let _ = "Si 0.0 0.0".parse::<Atom>();
    }

    #[test]
    #[should_panic(expected = "invalid coordinate")]
    fn bad_coordinate() {
        let _ = "Si 0.0 x 0.0".parse::<Atom>();
    }

    #[test]
    fn parse_atoms() {
        let s: Structure = "C 0.0 0.0 0.0\n6 0.89 0.89 0.89\n".parse().unwrap();
        assert_eq!(s.atoms.len(), 2);
        assert_eq!(s.atoms[0].atomic_number, 6);
        assert_eq!(s.atoms[1].atomic_number, 6);
        assert_eq!(s.atoms[1].label(), "C");
    }
}
