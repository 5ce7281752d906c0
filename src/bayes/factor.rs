// Factors over binary variables
//
// A factor maps every assignment of its (sorted) variables to a non-negative
// value. Assignment index bit `i` holds the value of `vars[i]`.

use crate::template::TemplateId;

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    vars: Vec<TemplateId>,
    values: Vec<f64>,
}

impl Factor {
    /// Build from sorted, distinct variables and `2^len` values
    pub fn new(vars: Vec<TemplateId>, values: Vec<f64>) -> Self {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]));
        debug_assert_eq!(values.len(), 1usize << vars.len());
        Self { vars, values }
    }

    pub fn scalar(value: f64) -> Self {
        Self::new(Vec::new(), vec![value])
    }

    pub fn vars(&self) -> &[TemplateId] {
        &self.vars
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn contains(&self, var: TemplateId) -> bool {
        self.vars.binary_search(&var).is_ok()
    }

    /// Fix `var` to `value` and drop it from the scope
    pub fn reduce(&self, var: TemplateId, value: bool) -> Factor {
        let Ok(pos) = self.vars.binary_search(&var) else {
            return self.clone();
        };
        let mut vars = self.vars.clone();
        vars.remove(pos);

        let values = (0..1usize << vars.len())
            .map(|idx| self.values[insert_bit(idx, pos, value)])
            .collect();
        Factor::new(vars, values)
    }

    /// Sum `var` out of the scope
    pub fn marginalize(&self, var: TemplateId) -> Factor {
        let Ok(pos) = self.vars.binary_search(&var) else {
            return self.clone();
        };
        let mut vars = self.vars.clone();
        vars.remove(pos);

        let values = (0..1usize << vars.len())
            .map(|idx| self.values[insert_bit(idx, pos, false)] + self.values[insert_bit(idx, pos, true)])
            .collect();
        Factor::new(vars, values)
    }

    /// Pointwise product over the union of both scopes
    pub fn product(&self, other: &Factor) -> Factor {
        let mut vars: Vec<TemplateId> = self.vars.iter().chain(&other.vars).copied().collect();
        vars.sort_unstable();
        vars.dedup();

        let left = positions(&self.vars, &vars);
        let right = positions(&other.vars, &vars);

        let values = (0..1usize << vars.len())
            .map(|idx| self.values[project(idx, &left)] * other.values[project(idx, &right)])
            .collect();
        Factor::new(vars, values)
    }
}

/// Position of each `sub` variable inside `full`
fn positions(sub: &[TemplateId], full: &[TemplateId]) -> Vec<usize> {
    sub.iter()
        .map(|v| full.binary_search(v).unwrap_or_default())
        .collect()
}

/// Index into a sub-scope from an index over the full scope
fn project(idx: usize, positions: &[usize]) -> usize {
    positions
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &pos)| acc | (((idx >> pos) & 1) << i))
}

/// Widen `idx` by inserting `bit` at position `pos`
fn insert_bit(idx: usize, pos: usize, bit: bool) -> usize {
    let low = idx & ((1 << pos) - 1);
    let high = (idx >> pos) << (pos + 1);
    high | (usize::from(bit) << pos) | low
}
