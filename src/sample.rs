use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a sample plays in the calibration workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
    Prediction,
}

/// One processed assay photograph.
///
/// Channel means are on the 0-255 scale over the reduced region of interest;
/// `ratio` is the derived optical signal. The identity fields are for
/// presentation and never enter any computation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub name: String,
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub ratio: f64,
    /// Operator-supplied ground truth, present on training samples.
    pub concentration: Option<f64>,
    /// Filled by inverse prediction, clamped non-negative.
    pub predicted_concentration: Option<f64>,
    pub split: Option<Split>,
}

impl Sample {
    pub(crate) fn new(name: impl Into<String>, r: f64, g: f64, b: f64, ratio: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            r,
            g,
            b,
            ratio,
            concentration: None,
            predicted_concentration: None,
            split: None,
        }
    }

    #[must_use]
    pub fn with_concentration(mut self, concentration: f64) -> Self {
        self.concentration = Some(concentration);
        self
    }
}

/// First decimal number embedded in a file name.
///
/// Calibration uploads are auto-labeled this way: `100cfu.jpg` carries a
/// concentration of 100, `2.5-dilution.png` one of 2.5. Returns `None` when
/// the name contains no digits.
pub fn concentration_from_name(name: &str) -> Option<f64> {
    let bytes = name.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let mut end = start;
    while bytes.get(end).map_or(false, u8::is_ascii_digit) {
        end += 1;
    }
    // A fractional part counts only when at least one digit follows the dot.
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).map_or(false, u8::is_ascii_digit) {
        end += 1;
        while bytes.get(end).map_or(false, u8::is_ascii_digit) {
            end += 1;
        }
    }
    name[start..end].parse().ok()
}

#[cfg(test)]
mod test {
    use super::concentration_from_name;

    #[test]
    fn integer_labels_are_found() {
        approx::assert_relative_eq!(concentration_from_name("100cfu.jpg").unwrap(), 100.0);
        approx::assert_relative_eq!(concentration_from_name("img_007.jpg").unwrap(), 7.0);
    }

    #[test]
    fn fractional_labels_are_found() {
        approx::assert_relative_eq!(concentration_from_name("2.5-dilution.png").unwrap(), 2.5);
    }

    #[test]
    fn the_extension_dot_is_not_a_fraction() {
        // "5.png" must parse as 5, not swallow the extension.
        approx::assert_relative_eq!(concentration_from_name("5.png").unwrap(), 5.0);
    }

    #[test]
    fn names_without_digits_are_unlabeled() {
        assert!(concentration_from_name("blank.png").is_none());
        assert!(concentration_from_name("").is_none());
    }

    #[test]
    fn only_the_first_number_counts() {
        approx::assert_relative_eq!(concentration_from_name("10x_dil_3.jpg").unwrap(), 10.0);
    }
}
