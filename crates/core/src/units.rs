//! Unit normalisation for the quantities rules compare.
//!
//! Units are matched case-insensitively after trimming. An unrecognised unit yields `None`; the
//! caller decides whether that means "no usable value".

const POUNDS_TO_KG: f64 = 0.453_592_37;
const OUNCES_TO_KG: f64 = 0.028_349_523_125;
const INCHES_TO_CM: f64 = 2.54;

fn normalise(unit: &str) -> String {
    unit.trim().to_ascii_lowercase()
}

/// Body weight in kilograms.
pub fn weight_to_kg(value: f64, unit: &str) -> Option<f64> {
    let factor = match normalise(unit).as_str() {
        "kg" | "kilogram" | "kilograms" => 1.0,
        "g" | "gram" | "grams" => 0.001,
        "lb" | "lbs" | "[lb_av]" | "pound" | "pounds" => POUNDS_TO_KG,
        "oz" | "[oz_av]" => OUNCES_TO_KG,
        _ => return None,
    };
    Some(value * factor)
}

/// Body height in centimetres.
pub fn height_to_cm(value: f64, unit: &str) -> Option<f64> {
    let factor = match normalise(unit).as_str() {
        "cm" => 1.0,
        "m" => 100.0,
        "mm" => 0.1,
        "in" | "[in_i]" | "inch" | "inches" => INCHES_TO_CM,
        _ => return None,
    };
    Some(value * factor)
}

/// Platelet count per microlitre.
///
/// Analysers commonly report in thousands per microlitre (`10*3/uL`, numerically equal to
/// `10*9/L`).
pub fn platelets_per_ul(value: f64, unit: &str) -> Option<f64> {
    let factor = match normalise(unit).as_str() {
        "/ul" | "/mm3" | "cells/ul" => 1.0,
        "10*3/ul" | "10^3/ul" | "k/ul" | "x10e3/ul" | "10*9/l" | "10^9/l" => 1_000.0,
        _ => return None,
    };
    Some(value * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn converts_weights() {
        assert_eq!(weight_to_kg(70.0, "kg"), Some(70.0));
        assert!(close(weight_to_kg(2200.0, " g ").expect("grams"), 2.2));
        assert!(close(weight_to_kg(154.0, "LBS").expect("pounds"), 69.853_224_98));
        assert_eq!(weight_to_kg(70.0, "stone"), None);
    }

    #[test]
    fn converts_heights() {
        assert!(close(height_to_cm(1.8, "m").expect("metres"), 180.0));
        assert!(close(height_to_cm(70.0, "in").expect("inches"), 177.8));
        assert_eq!(height_to_cm(5.0, "ft"), None);
    }

    #[test]
    fn converts_platelets() {
        assert_eq!(platelets_per_ul(49.0, "10*3/uL"), Some(49_000.0));
        assert_eq!(platelets_per_ul(50_000.0, "/uL"), Some(50_000.0));
        assert_eq!(platelets_per_ul(50.0, "%"), None);
    }
}
