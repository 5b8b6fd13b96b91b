//! Sequential colour ramps shared by the static plots and the dashboard.

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Hex notation such as `#08306b`.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Named colour ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    /// White to dark blue, used for choropleths.
    Blues,
    /// White through purple to blue, used for density heatmaps.
    PuBu,
}

const BLUES: [Rgb; 5] = [
    Rgb(247, 251, 255),
    Rgb(198, 219, 239),
    Rgb(107, 174, 214),
    Rgb(33, 113, 181),
    Rgb(8, 48, 107),
];

const PUBU: [Rgb; 5] = [
    Rgb(255, 247, 251),
    Rgb(208, 209, 230),
    Rgb(116, 169, 207),
    Rgb(5, 112, 176),
    Rgb(2, 56, 88),
];

impl Ramp {
    fn stops(self) -> &'static [Rgb; 5] {
        match self {
            Self::Blues => &BLUES,
            Self::PuBu => &PUBU,
        }
    }

    /// Colour at position `fraction` in `[0, 1]`; out-of-range values are clamped.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "values are clamped to the ramp and to 0..=255"
    )]
    pub fn at(self, fraction: f64) -> Rgb {
        let stops = self.stops();
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let scaled = fraction * (stops.len() - 1) as f64;
        let lower = (scaled.floor() as usize).min(stops.len() - 2);
        let local = scaled - lower as f64;

        let (Some(from), Some(to)) = (stops.get(lower), stops.get(lower + 1)) else {
            return BLUES[0];
        };
        let mix = |start: u8, end: u8| {
            (f64::from(start) + (f64::from(end) - f64::from(start)) * local).round() as u8
        };
        Rgb(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
    }
}

/// Linear scale mapping a value range onto `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    /// Value mapped to 0.
    pub min: f64,
    /// Value mapped to 1.
    pub max: f64,
}

impl Scale {
    /// Scale spanning the finite values of `values`, or `None` if there are none.
    pub fn spanning(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|value| value.is_finite())
            .fold(None, |acc: Option<Self>, value| {
                Some(acc.map_or(Self { min: value, max: value }, |scale| Self {
                    min: scale.min.min(value),
                    max: scale.max.max(value),
                }))
            })
    }

    /// Position of `value` within the scale.
    #[must_use]
    pub fn fraction(self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            ((value - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.5
        }
    }
}
