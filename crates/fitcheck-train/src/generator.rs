//! Synthetic fit dataset generation
//!
//! Product measurements are drawn around the user's own measurements, so the
//! label distribution is dominated by the noise scale. Labels come from the
//! measurement that matters most for the category: chest for tops and
//! dresses, waist for bottoms.

use fitcheck_classifiers::schema::{categories, features};
use fitcheck_core::FitLabel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::PI;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Every product type with its fit category
pub const PRODUCT_TYPES: &[(&str, &str)] = &[
    ("t-shirt", categories::UPPER_FITTED),
    ("crop top", categories::UPPER_FITTED),
    ("blouse", categories::UPPER_FITTED),
    ("fitted kurti", categories::UPPER_FITTED),
    ("tank top", categories::UPPER_FITTED),
    ("shirt", categories::UPPER_FITTED),
    ("oversized shirt", categories::UPPER_LOOSE),
    ("loose kurti", categories::UPPER_LOOSE),
    ("poncho", categories::UPPER_LOOSE),
    ("kaftan", categories::UPPER_LOOSE),
    ("hoodie", categories::UPPER_LOOSE),
    ("jeans", categories::LOWER_FITTED),
    ("formal pants", categories::LOWER_FITTED),
    ("leggings", categories::LOWER_FITTED),
    ("skinny pants", categories::LOWER_FITTED),
    ("joggers", categories::LOWER_LOOSE),
    ("palazzo", categories::LOWER_LOOSE),
    ("wide-leg pants", categories::LOWER_LOOSE),
    ("midi dress", categories::DRESSES),
    ("maxi dress", categories::DRESSES),
    ("bodycon dress", categories::DRESSES),
];

const BUST_RANGE: (f64, f64) = (75.0, 125.0);
const WAIST_RANGE: (f64, f64) = (60.0, 115.0);
const HIP_RANGE: (f64, f64) = (85.0, 135.0);

/// Standard deviation of product measurements around the user's
const PRODUCT_NOISE_CM: f64 = 2.5;

const PROGRESS_EVERY: usize = 2000;

/// One dataset row, serialized in CSV column order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedRow {
    pub fit_category: &'static str,
    pub product_type: &'static str,
    pub fit_rating: FitLabel,
    pub user_bust_cm: f64,
    pub user_waist_cm: f64,
    pub user_hip_cm: f64,
    pub product_chest_cm: f64,
    pub product_waist_cm: f64,
    pub product_hip_cm: f64,
}

/// Seeded generator of labeled user/product pairs
pub struct DatasetGenerator {
    rng: StdRng,
}

impl DatasetGenerator {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a single row for a random product type
    pub fn row(&mut self) -> GeneratedRow {
        let (product_type, category) = PRODUCT_TYPES[self.rng.gen_range(0..PRODUCT_TYPES.len())];

        let user_bust_cm = self.rng.gen_range(BUST_RANGE.0..BUST_RANGE.1);
        let user_waist_cm = self.rng.gen_range(WAIST_RANGE.0..WAIST_RANGE.1);
        let user_hip_cm = self.rng.gen_range(HIP_RANGE.0..HIP_RANGE.1);

        let product_chest_cm = user_bust_cm + self.noise();
        let product_waist_cm = user_waist_cm + self.noise();
        let product_hip_cm = user_hip_cm + self.noise();

        let diff = match category {
            categories::LOWER_FITTED | categories::LOWER_LOOSE => user_waist_cm - product_waist_cm,
            _ => user_bust_cm - product_chest_cm,
        };

        GeneratedRow {
            fit_category: category,
            product_type,
            fit_rating: FitLabel::from_difference(diff),
            user_bust_cm,
            user_waist_cm,
            user_hip_cm,
            product_chest_cm,
            product_waist_cm,
            product_hip_cm,
        }
    }

    /// Write `samples` rows as CSV with a header line
    pub fn write_csv<W: Write>(&mut self, writer: W, samples: usize) -> csv::Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for i in 0..samples {
            csv.serialize(self.row())?;
            if (i + 1) % PROGRESS_EVERY == 0 {
                info!("Generated {}/{} samples", i + 1, samples);
            }
        }
        csv.flush()?;
        Ok(())
    }

    /// Write `samples` rows to a CSV file
    pub fn write_file(&mut self, path: impl AsRef<Path>, samples: usize) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file), samples)?;
        info!("Wrote {} samples to {}", samples, path.display());
        Ok(())
    }

    /// Box-Muller sample from N(0, PRODUCT_NOISE_CM)
    fn noise(&mut self) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(1e-10);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * PRODUCT_NOISE_CM
    }
}

/// Column order of generated datasets
pub fn header() -> [&'static str; 9] {
    [
        "fit_category",
        "product_type",
        "fit_rating",
        features::USER_BUST_CM,
        features::USER_WAIST_CM,
        features::USER_HIP_CM,
        features::PRODUCT_CHEST_CM,
        features::PRODUCT_WAIST_CM,
        features::PRODUCT_HIP_CM,
    ]
}
