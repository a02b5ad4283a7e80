// Negative eigenvalue correction
//
// Measurement noise can make a diffusion tensor slightly indefinite. The
// correction below removes negative diffusivities: a single negative
// eigenvalue contributes a third of itself to each of the other two and is
// then zeroed, so the sum grows by |w2| / 3; otherwise negative parts are
// folded into the largest eigenvalue.

/// Corrected eigenvalues plus diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Corrected eigenvalues
    pub values: [f64; 3],

    /// Number of negative eigenvalues found in the input (0..=3)
    pub cardinality: usize,

    /// False when the corrected values are not in descending order
    pub ordered: bool,
}

impl Correction {
    /// True when the input needed any change
    pub fn changed(&self) -> bool {
        self.cardinality > 0
    }
}

/// Count of negative eigenvalues, classified on a descending triple:
/// all three, then the two smallest, then only the smallest.
pub fn negative_cardinality(w: [f64; 3]) -> usize {
    if w[0] < 0.0 && w[1] < 0.0 && w[2] < 0.0 {
        3
    } else if w[1] < 0.0 && w[2] < 0.0 {
        2
    } else if w[2] < 0.0 {
        1
    } else {
        0
    }
}

/// Fold the two smallest eigenvalues into the largest: (max(0, w0 + (w1+w2)/2), 0, 0)
fn fold_into_major(w0: f64, w1: f64, w2: f64) -> [f64; 3] {
    [(w0 + 0.5 * (w1 + w2)).max(0.0), 0.0, 0.0]
}

/// Correct a (descending) eigenvalue triple so no eigenvalue is negative.
pub fn correct(w: [f64; 3]) -> Correction {
    let [w0, w1, w2] = w;
    let cardinality = negative_cardinality(w);

    let values = match cardinality {
        3 => [0.0, 0.0, 0.0],
        2 => fold_into_major(w0, w1, w2),
        1 => {
            let share = w2 / 3.0;
            let t0 = w0 + share;
            let t1 = w1 + share;

            if t0 >= 0.0 && t1 >= 0.0 {
                [t0, t1, 0.0]
            } else if t1 < 0.0 {
                fold_into_major(w0, w1, w2)
            } else {
                [0.0, 0.0, 0.0]
            }
        }
        _ => w,
    };

    let ordered = values[0] >= values[1] && values[1] >= values[2];

    Correction {
        values,
        cardinality,
        ordered,
    }
}
