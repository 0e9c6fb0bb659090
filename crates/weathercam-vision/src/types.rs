use weathercam_core::InferenceError;

/// Weather categories the classifier distinguishes, in output-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherLabel {
    Sunny,
    Cloudy,
    Rain,
}

impl WeatherLabel {
    /// All labels, indexed like the classifier output.
    pub const ALL: [WeatherLabel; 3] = [WeatherLabel::Sunny, WeatherLabel::Cloudy, WeatherLabel::Rain];

    pub fn index(self) -> usize {
        match self {
            Self::Sunny => 0,
            Self::Cloudy => 1,
            Self::Rain => 2,
        }
    }

    /// Name stored in the `weather` field of published documents
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::Cloudy => "cloudy",
            Self::Rain => "rain",
        }
    }
}

impl std::fmt::Display for WeatherLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-class probabilities from one inference call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityVector([f32; 3]);

impl ProbabilityVector {
    /// Rejects NaN and infinite entries.
    pub fn new(values: [f32; 3]) -> Result<Self, InferenceError> {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite(index));
        }
        Ok(Self(values))
    }

    /// Build from a flattened `[1, 3]` output tensor.
    pub fn from_slice(values: &[f32]) -> Result<Self, InferenceError> {
        let array: [f32; 3] = values
            .try_into()
            .map_err(|_| InferenceError::ShapeMismatch {
                expected: vec![1, 3],
                actual: vec![1, values.len()],
            })?;
        Self::new(array)
    }

    pub fn get(&self, label: WeatherLabel) -> f32 {
        self.0[label.index()]
    }

    pub fn as_array(&self) -> [f32; 3] {
        self.0
    }

    /// Label with the highest probability. Exact ties go to the lowest index,
    /// so sunny beats cloudy beats rain.
    pub fn top_label(&self) -> WeatherLabel {
        let mut best = WeatherLabel::Sunny;
        for label in WeatherLabel::ALL {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }
}

impl std::fmt::Display for ProbabilityVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sunny : {:.4}, cloudy : {:.4}, rain : {:.4}",
            self.0[0], self.0[1], self.0[2]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs(values: [f32; 3]) -> ProbabilityVector {
        ProbabilityVector::new(values).unwrap()
    }

    #[test]
    fn test_top_label_picks_maximum() {
        assert_eq!(probs([0.7, 0.2, 0.1]).top_label(), WeatherLabel::Sunny);
        assert_eq!(probs([0.1, 0.8, 0.1]).top_label(), WeatherLabel::Cloudy);
        assert_eq!(probs([0.05, 0.15, 0.8]).top_label(), WeatherLabel::Rain);
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        assert_eq!(probs([0.5, 0.5, 0.0]).top_label(), WeatherLabel::Sunny);
        assert_eq!(probs([0.0, 0.5, 0.5]).top_label(), WeatherLabel::Cloudy);
        assert_eq!(probs([0.4, 0.2, 0.4]).top_label(), WeatherLabel::Sunny);
        let third = 1.0 / 3.0;
        assert_eq!(probs([third, third, third]).top_label(), WeatherLabel::Sunny);
    }

    #[test]
    fn test_exactly_one_label_for_any_input() {
        let grid = [0.0f32, 0.25, 0.5, 0.75, 1.0];
        for &a in &grid {
            for &b in &grid {
                for &c in &grid {
                    let p = probs([a, b, c]);
                    let top = p.top_label();
                    let max = a.max(b).max(c);
                    assert_eq!(p.get(top), max);
                    // nothing before the winner shares its value
                    assert!(WeatherLabel::ALL[..top.index()]
                        .iter()
                        .all(|l| p.get(*l) < max));
                }
            }
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            ProbabilityVector::new([0.1, f32::NAN, 0.2]),
            Err(InferenceError::NonFinite(1))
        ));
        assert!(matches!(
            ProbabilityVector::new([f32::INFINITY, 0.0, 0.0]),
            Err(InferenceError::NonFinite(0))
        ));
    }

    #[test]
    fn test_from_slice_wrong_length() {
        assert!(matches!(
            ProbabilityVector::from_slice(&[0.1, 0.9]),
            Err(InferenceError::ShapeMismatch { .. })
        ));
        assert_eq!(
            ProbabilityVector::from_slice(&[0.1, 0.2, 0.7]).unwrap().as_array(),
            [0.1, 0.2, 0.7]
        );
    }

    #[test]
    fn test_label_names() {
        let names: Vec<&str> = WeatherLabel::ALL.iter().map(|l| l.as_str()).collect();
        assert_eq!(names, ["sunny", "cloudy", "rain"]);
    }

    #[test]
    fn test_display_summary() {
        assert_eq!(
            probs([0.5, 0.25, 0.25]).to_string(),
            "sunny : 0.5000, cloudy : 0.2500, rain : 0.2500"
        );
    }
}
