//! Denaturant concentration from refractive index (Pace polynomials).

use crate::channel::Channel;
use crate::domain::{AvivError, AvivResult};
use std::fmt::{Display, Formatter};

/// Largest difference (M) between the refractometer estimate and the
/// titration's last x value before the header carries a warning.
pub const ENDPOINT_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denaturant {
    GdmHcl,
    Urea,
}

impl Denaturant {
    const GDM_SYNONYMS: [&'static str; 5] = ["gdn", "gdnhcl", "gdm", "gdmhcl", "g"];
    const UREA_SYNONYMS: [&'static str; 2] = ["urea", "u"];

    pub fn from_name(name: &str) -> AvivResult<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        if Self::GDM_SYNONYMS.contains(&lowered.as_str()) {
            Ok(Self::GdmHcl)
        } else if Self::UREA_SYNONYMS.contains(&lowered.as_str()) {
            Ok(Self::Urea)
        } else {
            Err(AvivError::configuration(
                "CONFIG.UNKNOWN_DENATURANT",
                format!("denaturant \"{}\" not recognized", name),
            ))
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GdmHcl => "GdmHCl",
            Self::Urea => "urea",
        }
    }

    /// Molar concentration for a refractive-index difference `dn`.
    pub fn concentration(self, dn: f64) -> f64 {
        match self {
            Self::GdmHcl => 57.147 * dn + 38.68 * dn.powi(2) - 91.60 * dn.powi(3),
            Self::Urea => 117.66 * dn + 29.753 * dn.powi(2) + 185.56 * dn.powi(3),
        }
    }
}

impl Display for Denaturant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

pub fn denaturant_concentration(name: &str, background_n: f64, sample_n: f64) -> AvivResult<f64> {
    Ok(Denaturant::from_name(name)?.concentration(sample_n - background_n))
}

/// Refractometer estimate of a titration's final denaturant concentration
/// compared with the last x value of the corrected run.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointCheck {
    pub name: String,
    pub buffer_n: f64,
    pub final_n: f64,
    pub calculated: f64,
    pub observed: f64,
}

impl EndpointCheck {
    pub fn new(name: &str, buffer_n: f64, final_n: f64, channels: &[Channel]) -> AvivResult<Self> {
        let calculated = denaturant_concentration(name, buffer_n, final_n)?;
        let observed = channels
            .first()
            .and_then(|channel| channel.x().last().copied())
            .ok_or_else(|| {
                AvivError::internal(
                    "INTERNAL.NO_ENDPOINT",
                    "no corrected channel to compare the denaturant endpoint against",
                )
            })?;
        Ok(Self {
            name: name.to_string(),
            buffer_n,
            final_n,
            calculated,
            observed,
        })
    }

    pub fn within_tolerance(&self) -> bool {
        (self.calculated - self.observed).abs() <= ENDPOINT_TOLERANCE
    }

    pub fn annotation_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Titrant type: {}", self.name),
            format!("Buffer n: {:.4}", self.buffer_n),
            format!("Final n: {:.4}", self.final_n),
            format!("Calculated [{}]: {:.2}", self.name, self.calculated),
        ];
        if !self.within_tolerance() {
            lines.push("Warning: final denaturant concentration is incorrect".to_string());
        }
        lines
    }
}
