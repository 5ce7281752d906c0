// BDeu parameter estimation
//
// For a binary node with `q = 2^k` parent configurations, every cell of the
// conditional probability table receives a pseudo-count of
// `equivalent_sample_size / (2 * q)`:
//
//     P(X = 1 | pa = j) = (N(j, 1) + α / 2q) / (N(j) + α / q)
//
// so sparse training data never yields a zero probability.

use crate::bayes::factor::Factor;
use crate::bayes::{ModelError, MAX_PARENTS};
use crate::ratio::ratio;
use crate::template::TemplateId;
use crate::training::OccurrenceMatrix;

/// Conditional probability table of one binary node
#[derive(Debug, Clone, PartialEq)]
pub struct Cpt {
    pub node: TemplateId,
    /// Sorted parents; bit `i` of a configuration index is `parents[i]`
    pub parents: Vec<TemplateId>,
    /// `P(node = 1 | configuration)` per configuration index
    pub p_true: Vec<f64>,
}

impl Cpt {
    /// Configuration index of one data row
    fn configuration(&self, row: &[bool]) -> usize {
        self.parents
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &p)| acc | (usize::from(row[p]) << i))
    }

    /// The table as a factor over `parents ∪ {node}`
    pub fn to_factor(&self) -> Factor {
        let mut vars = self.parents.clone();
        vars.push(self.node);
        vars.sort_unstable();

        let node_pos = vars.binary_search(&self.node).unwrap_or_default();
        let parent_pos: Vec<usize> = self
            .parents
            .iter()
            .map(|p| vars.binary_search(p).unwrap_or_default())
            .collect();

        let values = (0..1usize << vars.len())
            .map(|idx| {
                let config = parent_pos
                    .iter()
                    .enumerate()
                    .fold(0, |acc, (i, &pos)| acc | (((idx >> pos) & 1) << i));
                let p1 = self.p_true[config];
                if (idx >> node_pos) & 1 == 1 {
                    p1
                } else {
                    1.0 - p1
                }
            })
            .collect();
        Factor::new(vars, values)
    }
}

/// Fit the CPT of `node` given its parents
pub fn fit_cpt(
    node: TemplateId,
    parents: &[TemplateId],
    data: &OccurrenceMatrix,
    equivalent_sample_size: f64,
) -> Result<Cpt, ModelError> {
    if parents.len() > MAX_PARENTS {
        return Err(ModelError::TooManyParents {
            node,
            parents: parents.len(),
        });
    }

    let mut cpt = Cpt {
        node,
        parents: parents.to_vec(),
        p_true: Vec::new(),
    };
    let configurations = 1usize << parents.len();

    let mut totals = vec![0usize; configurations];
    let mut trues = vec![0usize; configurations];
    for row in data.rows() {
        let config = cpt.configuration(row);
        totals[config] += 1;
        if row[node] {
            trues[config] += 1;
        }
    }

    let cell_prior = equivalent_sample_size / (2.0 * configurations as f64);
    cpt.p_true = totals
        .iter()
        .zip(&trues)
        .map(|(&n, &n1)| {
            ratio(
                n1 as f64 + cell_prior,
                n as f64 + 2.0 * cell_prior,
                "BDeu estimate",
            )
        })
        .collect::<Result<_, _>>()?;

    Ok(cpt)
}
