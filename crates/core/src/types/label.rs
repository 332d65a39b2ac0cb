//! Disease labels produced by the leaf classifier.
//!
//! The variant order is the classifier's output order: output index `i`
//! means `DiseaseLabel::ALL[i]`. The trained model and this list must agree
//! exactly; the web crate checks the model's output width and, when present,
//! a label manifest stored next to the model file.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not one of the known class names.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown disease label: {0}")]
pub struct UnknownLabel(pub String);

/// A disease class the classifier can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseLabel {
    #[serde(rename = "Tomato___Bacterial_spot")]
    BacterialSpot,
    #[serde(rename = "Tomato___Early_blight")]
    EarlyBlight,
    #[serde(rename = "Tomato___Late_blight")]
    LateBlight,
    #[serde(rename = "Tomato___Leaf_Mold")]
    LeafMold,
    #[serde(rename = "Tomato___Septoria_leaf_spot")]
    SeptoriaLeafSpot,
    #[serde(rename = "Tomato___Spider_mites Two-spotted_spider_mite")]
    SpiderMites,
    #[serde(rename = "Tomato___Target_Spot")]
    TargetSpot,
    #[serde(rename = "Tomato___Tomato_Yellow_Leaf_Curl_Virus")]
    YellowLeafCurlVirus,
    #[serde(rename = "Tomato___Tomato_mosaic_virus")]
    MosaicVirus,
    #[serde(rename = "Tomato___healthy")]
    Healthy,
}

impl DiseaseLabel {
    /// Number of classes the model must output.
    pub const COUNT: usize = 10;

    /// Every label, in classifier output order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::BacterialSpot,
        Self::EarlyBlight,
        Self::LateBlight,
        Self::LeafMold,
        Self::SeptoriaLeafSpot,
        Self::SpiderMites,
        Self::TargetSpot,
        Self::YellowLeafCurlVirus,
        Self::MosaicVirus,
        Self::Healthy,
    ];

    /// Map a classifier output index to its label.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Position of this label in the classifier output.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The exact class name the model was trained with.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BacterialSpot => "Tomato___Bacterial_spot",
            Self::EarlyBlight => "Tomato___Early_blight",
            Self::LateBlight => "Tomato___Late_blight",
            Self::LeafMold => "Tomato___Leaf_Mold",
            Self::SeptoriaLeafSpot => "Tomato___Septoria_leaf_spot",
            Self::SpiderMites => "Tomato___Spider_mites Two-spotted_spider_mite",
            Self::TargetSpot => "Tomato___Target_Spot",
            Self::YellowLeafCurlVirus => "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
            Self::MosaicVirus => "Tomato___Tomato_mosaic_virus",
            Self::Healthy => "Tomato___healthy",
        }
    }

    /// Human-readable name, e.g. `Tomato Early blight`.
    #[must_use]
    pub fn display_name(self) -> String {
        humanize(self.as_str())
    }
}

/// Collapse underscore runs in a class name into single spaces.
///
/// Works for any class-name string, including ones outside [`DiseaseLabel`].
#[must_use]
pub fn humanize(class_name: &str) -> String {
    class_name
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiseaseLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_owned()))
    }
}
