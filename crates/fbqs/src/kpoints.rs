use serde::{Deserialize, Serialize};

use crate::structure::Structure;

/// k-points in fractional coordinates of the reciprocal lattice. a `Mesh` is
/// expanded to the uniform grid i/n with equal weights
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Kpoints {
    Mesh([usize; 3]),
    List(Vec<[f64; 3]>),
}

impl Default for Kpoints {
    fn default() -> Self {
        Self::Mesh([1, 1, 1])
    }
}

impl Kpoints {
    pub fn fractional(&self) -> Vec<[f64; 3]> {
        match self {
            Kpoints::Mesh(mesh) => {
                let [n1, n2, n3] = *mesh;
                let mut ret = Vec::with_capacity(n1 * n2 * n3);
                for i in 0..n1 {
                    for j in 0..n2 {
                        for k in 0..n3 {
                            ret.push([
                                i as f64 / n1 as f64,
                                j as f64 / n2 as f64,
                                k as f64 / n3 as f64,
                            ]);
                        }
                    }
                }
                ret
            }
            Kpoints::List(list) => list.clone(),
        }
    }

    /// expand to Cartesian k-points with uniform weights summing to 1
    pub fn cartesian(&self, structure: &Structure) -> Vec<([f64; 3], f64)> {
        let recip = structure.reciprocal_cell();
        let frac = self.fractional();
        let weight = 1.0 / frac.len() as f64;
        frac.into_iter()
            .map(|k| {
                let kc = nalgebra::RowVector3::new(k[0], k[1], k[2]) * recip;
                ([kc[0], kc[1], kc[2]], weight)
            })
            .collect()
    }
}
