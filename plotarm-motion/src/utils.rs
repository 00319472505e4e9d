pub fn saturate_range(input: f64, min: f64, max: f64) -> f64 {
    let mut output = input;

    if output < min {
        output = min;
    }

    if output > max {
        output = max;
    }

    output
}

/// Saturate and report whether the value had to be changed
pub fn saturate_range_checked(input: f64, min: f64, max: f64) -> (f64, bool) {
    let output = saturate_range(input, min, max);
    (output, output != input)
}
