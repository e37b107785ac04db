//! Shared fixtures for integration tests

#![allow(dead_code)]

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const WINERIES: [&str; 5] = ["Chateau Alpha", "Beta Estate", "Gamma Cellars", "Delta Hill", "Epsilon"];
pub const COUNTRIES: [&str; 3] = ["US", "France", "Italy"];

/// 100 synthetic wine reviews with some missing prices, titles and wineries.
///
/// Columns: `id, price, description, title, winery, country, points`.
pub fn wine_reviews() -> DataFrame {
    wine_reviews_with_rows(100)
}

pub fn wine_reviews_with_rows(n: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    let mut ids = Vec::with_capacity(n);
    let mut prices = Vec::with_capacity(n);
    let mut descriptions = Vec::with_capacity(n);
    let mut titles = Vec::with_capacity(n);
    let mut wineries = Vec::with_capacity(n);
    let mut countries = Vec::with_capacity(n);
    let mut points = Vec::with_capacity(n);

    for i in 0..n {
        let winery_idx = i % WINERIES.len();
        let price: f64 = rng.gen_range(8.0..120.0);
        let noise: f64 = rng.gen_range(-1.0..1.0);
        let score = 80.0 + 2.5 * price.ln_1p() + winery_idx as f64 + noise;

        ids.push(i as i64);
        prices.push(if i % 9 == 4 { None } else { Some(price.round()) });
        descriptions.push(format!(
            "Notes of {}, {} finish",
            ["cherry", "oak", "plum", "citrus"][i % 4],
            "long ".repeat(i % 5 + 1).trim_end()
        ));
        titles.push(if i % 11 == 3 {
            None
        } else {
            Some(format!("{} {} {}", WINERIES[winery_idx], 2000 + i % 20, "Reserve"))
        });
        wineries.push(if i % 13 == 7 { None } else { Some(WINERIES[winery_idx]) });
        countries.push(COUNTRIES[i % COUNTRIES.len()]);
        points.push(score.round() as i64);
    }

    df!(
        "id" => ids,
        "price" => prices,
        "description" => descriptions,
        "title" => titles,
        "winery" => wineries,
        "country" => countries,
        "points" => points
    )
    .unwrap()
}

pub const FEATURES: &str = "log1p_price winery country len_title len_description";
pub const CAT_FEATURES: &str = "winery country";
