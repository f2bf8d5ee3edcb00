//! Classifier trait and common helpers

use fitcheck_core::{Error, Result};

/// Trait for all fit classifiers
///
/// Implementations are immutable once constructed; the dispatcher shares one
/// instance across concurrent requests.
pub trait FitClassifier: Send + Sync {
    /// Class labels in the order used by [`FitClassifier::predict_proba`]
    fn classes(&self) -> &[String];

    /// Width of the feature vector this classifier expects
    fn n_features(&self) -> usize;

    /// Per-class probabilities for one ordered feature vector
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>>;

    /// Most probable class label for one ordered feature vector
    fn predict(&self, features: &[f64]) -> Result<String> {
        let proba = self.predict_proba(features)?;
        argmax_label(self.classes(), &proba)
    }

    /// Label and probabilities from a single evaluation.
    ///
    /// Classifiers that override [`FitClassifier::predict`] with something other
    /// than the arg-max must override this too.
    fn predict_with_proba(&self, features: &[f64]) -> Result<(String, Vec<f64>)> {
        let proba = self.predict_proba(features)?;
        let label = argmax_label(self.classes(), &proba)?;
        Ok((label, proba))
    }
}

/// Label with the highest probability; ties resolve to the earliest class.
pub fn argmax_label(classes: &[String], proba: &[f64]) -> Result<String> {
    if classes.len() != proba.len() {
        return Err(Error::prediction_failed(format!(
            "{} probabilities for {} classes",
            proba.len(),
            classes.len()
        )));
    }

    let mut best: Option<(usize, f64)> = None;
    for (idx, &p) in proba.iter().enumerate() {
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((idx, p)),
        }
    }

    best.map(|(idx, _)| classes[idx].clone())
        .ok_or_else(|| Error::prediction_failed("classifier has no classes"))
}
