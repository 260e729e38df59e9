//! Seeded demo datasets so a fresh workspace has something to explore.
//!
//! The tables are synthetic but shaped like the classic `diamonds` and
//! `titanic` sets. Generation is deterministic for a given seed.

use crate::table::Table;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde_json::{Number, Value};

pub const DIAMONDS_SEED: u64 = 42;
pub const TITANIC_SEED: u64 = 123;

const DIAMONDS_ROWS: usize = 200;
const TITANIC_ROWS: usize = 150;

const CUTS: [&str; 5] = ["Fair", "Good", "Very Good", "Premium", "Ideal"];
const COLORS: [&str; 7] = ["D", "E", "F", "G", "H", "I", "J"];
const CLARITIES: [&str; 8] = ["IF", "VVS1", "VVS2", "VS1", "VS2", "SI1", "SI2", "I1"];

/// 200 rows: carat, cut, color, clarity, depth, table, price, x, y, z.
pub fn diamonds() -> Table {
    let mut rng = StdRng::seed_from_u64(DIAMONDS_SEED);
    let n = DIAMONDS_ROWS;

    let carat = repeat(n, || round(gamma(&mut rng, 2, 0.5), 2));
    let cut = repeat(n, || pick(&mut rng, &CUTS));
    let color = repeat(n, || pick(&mut rng, &COLORS));
    let clarity = repeat(n, || pick(&mut rng, &CLARITIES));
    let depth = repeat(n, || round(normal(&mut rng, 61.5, 1.5), 1));
    let table = repeat(n, || round(normal(&mut rng, 57.0, 2.0), 1));
    let price = repeat(n, || Value::from(gamma(&mut rng, 5, 800.0) as i64));
    let x = repeat(n, || round(normal(&mut rng, 5.7, 1.1), 2));
    let y = repeat(n, || round(normal(&mut rng, 5.7, 1.1), 2));
    let z = repeat(n, || round(normal(&mut rng, 3.5, 0.7), 2));

    build(vec![
        ("carat", carat),
        ("cut", cut),
        ("color", color),
        ("clarity", clarity),
        ("depth", depth),
        ("table", table),
        ("price", price),
        ("x", x),
        ("y", y),
        ("z", z),
    ])
}

/// 150 rows: pclass, survived, sex, age, sibsp, parch, fare, embarked.
pub fn titanic() -> Table {
    let mut rng = StdRng::seed_from_u64(TITANIC_SEED);
    let n = TITANIC_ROWS;

    let pclass = repeat(n, || weighted(&mut rng, &[1, 2, 3], &[0.2, 0.3, 0.5]));
    let survived = repeat(n, || weighted(&mut rng, &[0, 1], &[0.6, 0.4]));
    let sex = repeat(n, || weighted(&mut rng, &["male", "female"], &[0.65, 0.35]));
    let age = repeat(n, || round(gamma(&mut rng, 4, 8.0), 1));
    let sibsp = repeat(n, || Value::from(poisson(&mut rng, 0.5)));
    let parch = repeat(n, || Value::from(poisson(&mut rng, 0.4)));
    let fare = repeat(n, || round(gamma(&mut rng, 3, 10.0), 2));
    let embarked = repeat(n, || weighted(&mut rng, &["S", "C", "Q"], &[0.7, 0.2, 0.1]));

    build(vec![
        ("pclass", pclass),
        ("survived", survived),
        ("sex", sex),
        ("age", age),
        ("sibsp", sibsp),
        ("parch", parch),
        ("fare", fare),
        ("embarked", embarked),
    ])
}

// ─────────────────────────────────────────────────────────────────────────────
// Sampling helpers
// ─────────────────────────────────────────────────────────────────────────────

fn build(columns: Vec<(&str, Vec<Value>)>) -> Table {
    // Every column has the same length, so construction cannot fail.
    Table::from_columns(columns).unwrap_or_default()
}

fn repeat(n: usize, mut f: impl FnMut() -> Value) -> Vec<Value> {
    (0..n).map(|_| f()).collect()
}

fn round(value: f64, digits: i32) -> Value {
    let scale = 10f64.powi(digits);
    Number::from_f64((value * scale).round() / scale)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn pick(rng: &mut StdRng, choices: &[&str]) -> Value {
    choices
        .choose(rng)
        .map(|s| Value::from(*s))
        .unwrap_or(Value::Null)
}

fn weighted<T: Clone + Into<Value>>(rng: &mut StdRng, choices: &[T], weights: &[f64]) -> Value {
    match WeightedIndex::new(weights) {
        Ok(dist) => choices[dist.sample(rng)].clone().into(),
        Err(_) => Value::Null,
    }
}

/// Box-Muller transform.
fn normal(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Erlang sampling: sum of `shape` exponentials. Integer shapes only.
fn gamma(rng: &mut StdRng, shape: u32, scale: f64) -> f64 {
    (0..shape)
        .map(|_| -rng.gen_range(f64::EPSILON..1.0).ln())
        .sum::<f64>()
        * scale
}

/// Knuth's method; fine for the small rates used here.
fn poisson(rng: &mut StdRng, lambda: f64) -> u64 {
    let limit = (-lambda).exp();
    let mut k = 0;
    let mut p: f64 = rng.gen();
    while p > limit {
        k += 1;
        p *= rng.gen::<f64>();
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diamonds_shape() {
        let table = diamonds();
        assert_eq!(table.n_rows(), 200);
        assert_eq!(table.n_columns(), 10);
        assert_eq!(table.dtypes()["price"], "int64");
        assert_eq!(table.dtypes()["cut"], "object");
    }

    #[test]
    fn test_titanic_shape() {
        let table = titanic();
        assert_eq!(table.n_rows(), 150);
        assert_eq!(table.n_columns(), 8);
        assert!(table
            .column("survived")
            .unwrap()
            .iter()
            .all(|v| v.as_i64().is_some_and(|s| s == 0 || s == 1)));
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(diamonds(), diamonds());
        assert_eq!(titanic(), titanic());
    }

    #[test]
    fn test_categorical_values_come_from_their_levels() {
        let table = diamonds();
        assert!(table
            .column("cut")
            .unwrap()
            .iter()
            .all(|v| v.as_str().is_some_and(|s| CUTS.contains(&s))));
    }
}
